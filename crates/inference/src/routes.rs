use crate::{errors::ApiError, state::AppState};
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    handler::Handler,
    http::{Method, StatusCode},
    routing::{MethodFilter, MethodRouter},
};
use schema::{HealthStatus, Prediction};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

const UPLOAD_FIELD: &str = "file";

/// One entry of the service's route table. The handler only answers
/// `method`, so the table and the router cannot disagree.
pub struct Route {
    pub method: Method,
    pub path: &'static str,
    pub summary: &'static str,
    pub handler: MethodRouter<AppState>,
}

impl Route {
    pub fn new<H, T>(
        method: Method,
        path: &'static str,
        summary: &'static str,
        handler: H,
    ) -> anyhow::Result<Self>
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        let filter = MethodFilter::try_from(method.clone())?;
        Ok(Self {
            method,
            path,
            summary,
            handler: MethodRouter::new().on(filter, handler),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct RouteDoc {
    pub method: String,
    pub path: &'static str,
    pub summary: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ApiDocs {
    pub title: &'static str,
    pub version: &'static str,
    pub routes: Vec<RouteDoc>,
}

impl ApiDocs {
    pub fn from_routes(routes: &[Route]) -> Self {
        Self {
            title: "Inference Service",
            version: env!("CARGO_PKG_VERSION"),
            routes: routes
                .iter()
                .map(|route| RouteDoc {
                    method: route.method.to_string(),
                    path: route.path,
                    summary: route.summary,
                })
                .collect(),
        }
    }
}

/// Every route the service exposes. `/docs` renders this same list.
pub fn route_table() -> anyhow::Result<Vec<Route>> {
    Ok(vec![
        Route::new(Method::GET, "/health", "Liveness check", health)?,
        Route::new(Method::GET, "/docs", "List the service routes", docs)?,
        Route::new(
            Method::POST,
            "/predict",
            "Detect objects in the image uploaded as multipart field 'file'",
            predict,
        )?,
    ])
}

pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let body_limit = state.max_upload_bytes;

    let router = route_table()?
        .into_iter()
        .fold(Router::new(), |router, route| {
            tracing::debug!(method = %route.method, path = route.path, "Registering route");
            router.route(route.path, route.handler)
        })
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    Ok(router)
}

async fn health() -> Json<HealthStatus> {
    Json(HealthStatus::ok())
}

async fn docs(State(state): State<AppState>) -> Json<Arc<ApiDocs>> {
    Json(state.docs)
}

async fn predict(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Prediction>, ApiError> {
    let start = Instant::now();

    match run_prediction(&state, multipart).await {
        Ok(prediction) => {
            state.metrics.record_success(start.elapsed(), prediction.len());
            tracing::info!(
                detections = prediction.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Prediction served"
            );
            Ok(Json(prediction))
        }
        Err(e) => {
            state.metrics.record_failure(e.status().as_u16());
            Err(e)
        }
    }
}

async fn run_prediction(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Prediction, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::BadMultipart(e.body_text()))?;
    let bytes = read_upload(&mut multipart, state.max_upload_bytes).await?;

    let detector = state.detector.clone();
    tokio::task::spawn_blocking(move || {
        let image = image::load_from_memory(&bytes)
            .map_err(|e| ApiError::UndecodableImage(e.to_string()))?;

        detector
            .predict(&image)
            .map_err(|e| ApiError::Model(format!("{:#}", e)))
    })
    .await
    .map_err(|e| ApiError::Model(format!("Prediction task failed: {}", e)))?
}

/// Pull the bytes of the upload field, skipping any other parts.
async fn read_upload(multipart: &mut Multipart, limit: usize) -> Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
        if bytes.len() > limit {
            return Err(ApiError::PayloadTooLarge { limit });
        }

        tracing::debug!(
            bytes = bytes.len(),
            "Received upload"
        );
        return Ok(bytes.to_vec());
    }

    Err(ApiError::MissingFile)
}

fn multipart_error(e: MultipartError, limit: usize) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge { limit }
    } else {
        ApiError::BadMultipart(e.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Detector;
    use axum::body::Body;
    use axum::http::{Request, header};
    use http_body_util::BodyExt;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use schema::Detection;
    use std::io::Cursor;
    use tower::ServiceExt;

    const BOUNDARY: &str = "test-boundary-7MA4YWxkTrZu0gW";

    struct FixedDetector;

    impl Detector for FixedDetector {
        fn predict(&self, _image: &DynamicImage) -> anyhow::Result<Prediction> {
            Ok(Prediction::from_detections(
                &[Detection {
                    bbox: [10.0, 20.0, 50.0, 80.0],
                    score: 0.92,
                    class_id: 0,
                }],
                |_| "person".to_string(),
            ))
        }
    }

    struct BrokenDetector;

    impl Detector for BrokenDetector {
        fn predict(&self, _image: &DynamicImage) -> anyhow::Result<Prediction> {
            anyhow::bail!("session run failed")
        }
    }

    fn router_with(detector: Arc<dyn Detector>, max_upload_bytes: usize) -> Router {
        build_router(AppState::new(detector, max_upload_bytes).unwrap()).unwrap()
    }

    fn router() -> Router {
        router_with(Arc::new(FixedDetector), 1024 * 1024)
    }

    fn png_bytes() -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(8, 8))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn multipart_request(field: &str, filename: &str, content: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                field, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri("/predict")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, serde_json::json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn docs_lists_every_route() {
        let response = router()
            .oneshot(Request::get("/docs").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let routes = body["routes"].as_array().unwrap();

        assert_eq!(routes.len(), route_table().unwrap().len());
        for (method, path) in [("GET", "/health"), ("GET", "/docs"), ("POST", "/predict")] {
            assert!(
                routes
                    .iter()
                    .any(|r| r["method"] == method && r["path"] == path),
                "{} {} missing from docs",
                method,
                path
            );
        }
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn predict_returns_columns() {
        let response = router()
            .oneshot(multipart_request("file", "sample.png", &png_bytes()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let prediction: Prediction = serde_json::from_value(body).unwrap();

        assert!(prediction.validate().is_ok());
        assert_eq!(prediction.boxes, vec![[10.0, 20.0, 50.0, 80.0]]);
        assert_eq!(prediction.labels, vec!["person"]);
    }

    #[tokio::test]
    async fn predict_without_file_field_is_bad_request() {
        let response = router()
            .oneshot(multipart_request("image", "sample.png", &png_bytes()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn predict_without_multipart_body_is_bad_request() {
        let response = router()
            .oneshot(
                Request::post("/predict")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn predict_rejects_non_image_bytes() {
        let response = router()
            .oneshot(multipart_request("file", "notes.txt", b"definitely not an image"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn predict_rejects_oversized_upload() {
        let app = router_with(Arc::new(FixedDetector), 256);

        let response = app
            .oneshot(multipart_request("file", "big.bin", &vec![0u8; 4096]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn model_failure_is_internal_error() {
        let app = router_with(Arc::new(BrokenDetector), 1024 * 1024);

        let response = app
            .oneshot(multipart_request("file", "sample.png", &png_bytes()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("session run failed"));
    }

    #[tokio::test]
    async fn routes_answer_only_their_documented_method() {
        for route in route_table().unwrap() {
            let other = if route.method == Method::GET {
                Method::POST
            } else {
                Method::GET
            };

            let response = router()
                .oneshot(
                    Request::builder()
                        .method(other.clone())
                        .uri(route.path)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(
                response.status(),
                StatusCode::METHOD_NOT_ALLOWED,
                "{} {} should not be served",
                other,
                route.path
            );
        }
    }

    #[tokio::test]
    async fn get_predict_is_method_not_allowed() {
        let response = router()
            .oneshot(Request::get("/predict").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn unroutable_method_is_rejected() {
        let result = Route::new(
            Method::from_bytes(b"PURGE").unwrap(),
            "/cache",
            "Not a method axum can route",
            health,
        );

        assert!(result.is_err());
    }

    #[test]
    fn state_docs_mirror_route_table() {
        let state = AppState::new(Arc::new(FixedDetector), 1024).unwrap();
        let table = route_table().unwrap();

        let documented: Vec<_> = state
            .docs
            .routes
            .iter()
            .map(|r| (r.method.clone(), r.path))
            .collect();
        let served: Vec<_> = table
            .iter()
            .map(|r| (r.method.to_string(), r.path))
            .collect();

        assert_eq!(documented, served);
    }
}
