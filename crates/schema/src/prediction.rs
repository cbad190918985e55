use crate::errors::SchemaError;
use serde::{Deserialize, Serialize};

/// Box corners `[x1, y1, x2, y2]` in pixels of the original image.
pub type BoundingBox = [f32; 4];

/// A single object found by the model, before labels are attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub score: f32,
    pub class_id: usize,
}

/// Response body of `POST /predict`.
///
/// Column oriented: entry `i` of `boxes`, `scores` and `labels` describes the
/// same object, so the three vectors always have the same length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub boxes: Vec<BoundingBox>,
    pub scores: Vec<f32>,
    pub labels: Vec<String>,
}

impl Prediction {
    /// Build a prediction from detections, naming each one with `label_for`.
    pub fn from_detections<F>(detections: &[Detection], label_for: F) -> Self
    where
        F: Fn(usize) -> String,
    {
        let mut prediction = Self {
            boxes: Vec::with_capacity(detections.len()),
            scores: Vec::with_capacity(detections.len()),
            labels: Vec::with_capacity(detections.len()),
        };

        for det in detections {
            prediction.boxes.push(det.bbox);
            prediction.scores.push(det.score);
            prediction.labels.push(label_for(det.class_id));
        }

        prediction
    }

    /// Check the equal-length invariant on a record that did not come from
    /// [`Prediction::from_detections`], e.g. one decoded off the wire.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let boxes = self.boxes.len();
        let scores = self.scores.len();
        let labels = self.labels.len();

        if boxes != scores || boxes != labels {
            return Err(SchemaError::LengthMismatch {
                boxes,
                scores,
                labels,
            });
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BoundingBox, f32, &str)> {
        self.boxes
            .iter()
            .zip(self.scores.iter().copied())
            .zip(self.labels.iter())
            .map(|((bbox, score), label)| (bbox, score, label.as_str()))
    }
}

/// Response body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coco_label(class_id: usize) -> String {
        match class_id {
            0 => "person".to_string(),
            16 => "dog".to_string(),
            other => format!("class_{}", other),
        }
    }

    #[test]
    fn from_detections_keeps_columns_aligned() {
        let detections = [
            Detection {
                bbox: [10.0, 20.0, 50.0, 80.0],
                score: 0.92,
                class_id: 0,
            },
            Detection {
                bbox: [100.0, 120.0, 180.0, 200.0],
                score: 0.61,
                class_id: 16,
            },
        ];

        let prediction = Prediction::from_detections(&detections, coco_label);

        assert_eq!(prediction.len(), 2);
        assert!(prediction.validate().is_ok());
        assert_eq!(prediction.labels, vec!["person", "dog"]);
        assert_eq!(prediction.boxes[1], [100.0, 120.0, 180.0, 200.0]);
        assert_eq!(prediction.scores, vec![0.92, 0.61]);
    }

    #[test]
    fn empty_prediction_is_valid() {
        let prediction = Prediction::from_detections(&[], coco_label);

        assert!(prediction.is_empty());
        assert!(prediction.validate().is_ok());
    }

    #[test]
    fn validate_rejects_mismatched_columns() {
        let prediction = Prediction {
            boxes: vec![[0.0, 0.0, 1.0, 1.0]],
            scores: vec![0.5, 0.4],
            labels: vec!["person".to_string()],
        };

        assert_eq!(
            prediction.validate(),
            Err(SchemaError::LengthMismatch {
                boxes: 1,
                scores: 2,
                labels: 1,
            })
        );
    }

    #[test]
    fn serializes_to_column_json() {
        let prediction = Prediction::from_detections(
            &[Detection {
                bbox: [10.0, 20.0, 50.0, 80.0],
                score: 0.92,
                class_id: 0,
            }],
            coco_label,
        );

        let json = serde_json::to_value(&prediction).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "boxes": [[10.0, 20.0, 50.0, 80.0]],
                "scores": [0.92f32],
                "labels": ["person"],
            })
        );
    }

    #[test]
    fn deserializes_service_response() {
        let body = r#"{"boxes": [[10.0,20.0,50.0,80.0]], "scores": [0.92], "labels": ["person"]}"#;

        let prediction: Prediction = serde_json::from_str(body).unwrap();

        let (bbox, score, label) = prediction.iter().next().unwrap();
        assert_eq!(*bbox, [10.0, 20.0, 50.0, 80.0]);
        assert!((score - 0.92).abs() < 1e-6);
        assert_eq!(label, "person");
    }

    #[test]
    fn rejects_box_with_wrong_arity() {
        let body = r#"{"boxes": [[10.0,20.0,50.0]], "scores": [0.92], "labels": ["person"]}"#;

        assert!(serde_json::from_str::<Prediction>(body).is_err());
    }

    #[test]
    fn health_status_payload() {
        let json = serde_json::to_string(&HealthStatus::ok()).unwrap();
        assert_eq!(json, r#"{"status":"ok"}"#);
    }
}
