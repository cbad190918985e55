use crate::errors::PipelineError;
use reqwest::{
    Client, Url,
    multipart::{Form, Part},
};
use schema::Prediction;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

const UPLOAD_FIELD: &str = "file";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Sends the test input to the service and returns what it predicted.
pub trait Invoker {
    fn invoke(&self) -> impl Future<Output = Result<Prediction, PipelineError>> + Send;
}

/// HTTP client for `POST /predict` on the inference service.
pub struct InferenceClient {
    client: Client,
    predict_url: Url,
    sample_image: PathBuf,
}

impl InferenceClient {
    pub fn new(predict_url: Url, sample_image: PathBuf) -> Result<Self, PipelineError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            predict_url,
            sample_image,
        })
    }

    /// Upload `path` as multipart field `file` and decode the prediction.
    ///
    /// A missing file fails before any request is made.
    pub async fn predict_file(&self, path: &Path) -> Result<Prediction, PipelineError> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(PipelineError::MissingFixture {
                path: path.to_path_buf(),
            });
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| PipelineError::FixtureRead {
                path: path.to_path_buf(),
                source,
            })?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let mime = guess_mime(path);

        tracing::info!(
            url = %self.predict_url,
            file = %path.display(),
            bytes = bytes.len(),
            mime,
            "Sending inference request"
        );

        let part = Part::bytes(bytes).file_name(file_name).mime_str(mime)?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let prediction: Prediction = self
            .client
            .post(self.predict_url.clone())
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        prediction.validate()?;

        tracing::info!(detections = prediction.len(), "Inference succeeded");
        Ok(prediction)
    }
}

impl Invoker for InferenceClient {
    async fn invoke(&self) -> Result<Prediction, PipelineError> {
        self.predict_file(&self.sample_image).await
    }
}

fn guess_mime(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::{Multipart, State},
        http::StatusCode,
        routing::post,
    };
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct Received {
        parts: Arc<Mutex<Vec<(String, Option<String>, Option<String>, usize)>>>,
    }

    async fn record_upload(
        State(received): State<Received>,
        mut multipart: Multipart,
    ) -> Json<serde_json::Value> {
        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let len = field.bytes().await.unwrap().len();
            received
                .parts
                .lock()
                .unwrap()
                .push((name, file_name, content_type, len));
        }
        Json(json!({
            "boxes": [[10.0, 20.0, 50.0, 80.0]],
            "scores": [0.92],
            "labels": ["person"],
        }))
    }

    async fn serve(app: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        Url::parse(&format!("http://{}/predict", addr)).unwrap()
    }

    fn write_sample(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, b"\xff\xd8\xff\xe0 fake jpeg").unwrap();
        path
    }

    #[tokio::test]
    async fn missing_fixture_fails_before_network() {
        // Nothing listens on the discard port; a request would fail differently
        let url = Url::parse("http://127.0.0.1:9/predict").unwrap();
        let client = InferenceClient::new(url, PathBuf::from("does/not/exist.jpg")).unwrap();

        let err = client.invoke().await.unwrap_err();

        assert!(matches!(err, PipelineError::MissingFixture { path } if path.ends_with("exist.jpg")));
    }

    #[tokio::test]
    async fn uploads_sample_as_file_field() {
        let received = Received::default();
        let app = Router::new()
            .route("/predict", post(record_upload))
            .with_state(received.clone());
        let url = serve(app).await;

        let dir = tempfile::tempdir().unwrap();
        let sample = write_sample(&dir, "000000000283.jpg");
        let client = InferenceClient::new(url, sample).unwrap();

        let prediction = client.invoke().await.unwrap();

        assert_eq!(prediction.labels, vec!["person"]);
        let parts = received.parts.lock().unwrap();
        assert_eq!(parts.len(), 1);
        let (name, file_name, content_type, len) = &parts[0];
        assert_eq!(name, "file");
        assert_eq!(file_name.as_deref(), Some("000000000283.jpg"));
        assert_eq!(content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(*len, b"\xff\xd8\xff\xe0 fake jpeg".len());
    }

    #[tokio::test]
    async fn error_status_is_http_error() {
        let app = Router::new().route(
            "/predict",
            post(|| async { (StatusCode::UNPROCESSABLE_ENTITY, "bad image") }),
        );
        let url = serve(app).await;
        let dir = tempfile::tempdir().unwrap();
        let client = InferenceClient::new(url, write_sample(&dir, "x.png")).unwrap();

        let err = client.invoke().await.unwrap_err();

        match err {
            PipelineError::Http(e) => {
                assert_eq!(e.status(), Some(reqwest::StatusCode::UNPROCESSABLE_ENTITY))
            }
            other => panic!("Expected Http error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn mismatched_columns_are_rejected() {
        let app = Router::new().route(
            "/predict",
            post(|| async {
                Json(json!({
                    "boxes": [[0.0, 0.0, 1.0, 1.0]],
                    "scores": [],
                    "labels": ["person"],
                }))
            }),
        );
        let url = serve(app).await;
        let dir = tempfile::tempdir().unwrap();
        let client = InferenceClient::new(url, write_sample(&dir, "x.jpg")).unwrap();

        let err = client.invoke().await.unwrap_err();

        assert!(matches!(err, PipelineError::InvalidPrediction(_)));
    }

    #[test]
    fn mime_is_guessed_from_extension() {
        assert_eq!(guess_mime(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(guess_mime(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(guess_mime(Path::new("a.png")), "image/png");
        assert_eq!(guess_mime(Path::new("a.tiff")), "application/octet-stream");
        assert_eq!(guess_mime(Path::new("noext")), "application/octet-stream");
    }
}
