use serde::{Deserialize, Serialize};

/// Chunk-level progress of an upload session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub upload_id: String,
    pub total_chunks: usize,
    pub completed_chunks: usize,
    pub percent: u8,
}

impl UploadProgress {
    /// Builds a progress report, rounding the percentage to the nearest integer.
    pub fn new(upload_id: impl Into<String>, completed_chunks: usize, total_chunks: usize) -> Self {
        Self {
            upload_id: upload_id.into(),
            total_chunks,
            completed_chunks,
            percent: percent(completed_chunks, total_chunks),
        }
    }

    /// Returns `true` once every chunk has been accepted.
    pub fn is_finished(&self) -> bool {
        self.completed_chunks >= self.total_chunks
    }
}

/// round(100 × completed / total), clamped to 0..=100.
fn percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total) as u128;
    let total = total as u128;
    // Integer round-half-up of 100 * completed / total.
    ((200 * completed + total) / (2 * total)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_field_names() {
        let p = UploadProgress::new("u1", 1, 4);
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(
            json,
            r#"{"uploadId":"u1","totalChunks":4,"completedChunks":1,"percent":25}"#
        );
    }

    #[test]
    fn percent_rounds_to_nearest() {
        assert_eq!(UploadProgress::new("u", 1, 3).percent, 33);
        assert_eq!(UploadProgress::new("u", 2, 3).percent, 67);
        assert_eq!(UploadProgress::new("u", 1, 8).percent, 13); // 12.5 rounds up
        assert_eq!(UploadProgress::new("u", 3, 3).percent, 100);
    }

    #[test]
    fn percent_zero_total() {
        let p = UploadProgress::new("u", 0, 0);
        assert_eq!(p.percent, 0);
        assert!(p.is_finished());
    }

    #[test]
    fn percent_clamped() {
        assert_eq!(UploadProgress::new("u", 5, 3).percent, 100);
    }
}
