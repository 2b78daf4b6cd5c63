use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Chunk endpoint
// ---------------------------------------------------------------------------

/// Body returned by the chunk endpoint for a 2xx response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkUploadResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChunkUploadResponse {
    /// Converts the body into a result, using the server's error text when
    /// the chunk was refused.
    pub fn into_result(self) -> Result<(), String> {
        if self.success {
            Ok(())
        } else {
            Err(self.error.unwrap_or_else(|| "unknown error".into()))
        }
    }
}

// ---------------------------------------------------------------------------
// Completion endpoint
// ---------------------------------------------------------------------------

/// Asks the server to reassemble all chunks of an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadRequest {
    pub upload_id: String,
}

/// Body returned by the completion endpoint.
///
/// The backend decides which fields describe the assembled file, so they are
/// kept as-is. A body carrying an `error` field is a rejection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletionResponse {
    pub fields: Map<String, Value>,
}

impl CompletionResponse {
    /// Returns the server's rejection message, if any.
    pub fn error(&self) -> Option<&str> {
        match self.fields.get("error") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.as_str()),
            Some(_) => Some("completion rejected"),
        }
    }

    /// Returns a single field of the response.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

// ---------------------------------------------------------------------------
// Status endpoint
// ---------------------------------------------------------------------------

/// Payload returned by the status endpoint, passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerStatus(pub Value);
