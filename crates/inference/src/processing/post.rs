use schema::{BoundingBox, Detection};

/// Maps letterboxed model coordinates back to the original image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformParams {
    pub orig_width: u32,
    pub orig_height: u32,
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

pub struct PostProcessor {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl PostProcessor {
    pub fn new(confidence_threshold: f32, iou_threshold: f32, max_detections: usize) -> Self {
        Self {
            confidence_threshold,
            iou_threshold,
            max_detections,
        }
    }

    /// Decode a YOLO detection head into detections on the original image.
    ///
    /// Detections come back sorted by descending score, after class-aware NMS.
    #[tracing::instrument(skip(self, predictions, transform))]
    pub fn parse_detections(
        &self,
        predictions: &ndarray::ArrayViewD<f32>, // [1, 4 + num_classes, num_anchors] - cxcywh in input pixels
        transform: &TransformParams,
    ) -> anyhow::Result<Vec<Detection>> {
        let shape = predictions.shape();
        if shape.len() != 3 || shape[0] != 1 || shape[1] <= 4 {
            anyhow::bail!(
                "Unexpected detection head shape {:?}, expected [1, 4 + classes, anchors]",
                shape
            );
        }

        let num_classes = shape[1] - 4;
        let num_anchors = shape[2];

        let mut candidates = Vec::new();

        for i in 0..num_anchors {
            // Argmax over class scores; ultralytics heads already apply sigmoid
            let mut score = f32::NEG_INFINITY;
            let mut class_id = 0usize;
            for c in 0..num_classes {
                let s = predictions[[0, 4 + c, i]];
                if s > score {
                    score = s;
                    class_id = c;
                }
            }

            if score < self.confidence_threshold {
                continue;
            }

            let cx = predictions[[0, 0, i]];
            let cy = predictions[[0, 1, i]];
            let w = predictions[[0, 2, i]];
            let h = predictions[[0, 3, i]];

            let bbox = unletterbox(cxcywh_to_xyxy(cx, cy, w, h), transform);

            candidates.push(Detection {
                bbox,
                score,
                class_id,
            });
        }

        let candidate_count = candidates.len();
        let mut detections = non_max_suppression(candidates, self.iou_threshold);
        detections.truncate(self.max_detections);

        tracing::trace!(
            candidates = candidate_count,
            kept = detections.len(),
            "Post-processing complete"
        );

        Ok(detections)
    }
}

/// Convert bounding box from center-width-height format to corner format
#[inline]
fn cxcywh_to_xyxy(cx: f32, cy: f32, w: f32, h: f32) -> BoundingBox {
    [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0]
}

/// Undo the letterbox and clamp to the original image bounds.
#[inline]
fn unletterbox(bbox: BoundingBox, transform: &TransformParams) -> BoundingBox {
    let max_x = transform.orig_width as f32;
    let max_y = transform.orig_height as f32;
    [
        ((bbox[0] - transform.offset_x) / transform.scale).clamp(0.0, max_x),
        ((bbox[1] - transform.offset_y) / transform.scale).clamp(0.0, max_y),
        ((bbox[2] - transform.offset_x) / transform.scale).clamp(0.0, max_x),
        ((bbox[3] - transform.offset_y) / transform.scale).clamp(0.0, max_y),
    ]
}

#[inline]
fn area(b: &BoundingBox) -> f32 {
    (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0)
}

pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = inter_w * inter_h;

    let union = area(a) + area(b) - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

/// Greedy per-class NMS. Output is ordered by descending score.
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());

    for candidate in detections {
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && iou(&k.bbox, &candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }

    kept
}
