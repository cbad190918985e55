/// COCO class names in the order used by ultralytics detection heads.
pub const COCO_CLASSES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// Maps class ids produced by the model to human-readable names.
#[derive(Debug, Clone)]
pub struct LabelMap {
    names: Vec<String>,
}

impl LabelMap {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn coco() -> Self {
        Self::new(COCO_CLASSES.iter().map(|s| s.to_string()).collect())
    }

    pub fn name(&self, class_id: usize) -> String {
        self.names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_id))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for LabelMap {
    fn default() -> Self {
        Self::coco()
    }
}

/// Parse the `names` metadata written by ultralytics ONNX exports, a Python
/// dict literal such as `{0: 'person', 1: 'bicycle'}`.
///
/// Returns `None` when the string is not in that shape or ids are not
/// contiguous from zero.
pub fn parse_names_metadata(raw: &str) -> Option<Vec<String>> {
    let body = raw.trim().strip_prefix('{')?.strip_suffix('}')?;

    let mut entries = Vec::new();
    let mut rest = body.trim();

    while !rest.is_empty() {
        let (id, after_id) = rest.split_once(':')?;
        let id: usize = id.trim().parse().ok()?;

        let after_id = after_id.trim_start();
        let quote = after_id.chars().next().filter(|c| *c == '\'' || *c == '"')?;
        let value_and_rest = &after_id[1..];
        let end = value_and_rest.find(quote)?;
        let name = value_and_rest[..end].to_string();

        entries.push((id, name));

        rest = value_and_rest[end + 1..].trim_start();
        rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
    }

    entries.sort_by_key(|(id, _)| *id);
    if entries.iter().enumerate().any(|(i, (id, _))| i != *id) {
        return None;
    }

    Some(entries.into_iter().map(|(_, name)| name).collect())
}
