use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Prediction columns differ in length: {boxes} boxes, {scores} scores, {labels} labels")]
    LengthMismatch {
        boxes: usize,
        scores: usize,
        labels: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_formatting() {
        let err = SchemaError::LengthMismatch {
            boxes: 2,
            scores: 1,
            labels: 2,
        };
        assert_eq!(
            err.to_string(),
            "Prediction columns differ in length: 2 boxes, 1 scores, 2 labels",
            "LengthMismatch should report every column length"
        );
    }
}
