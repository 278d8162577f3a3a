use serde::{Deserialize, Serialize};
use thiserror::Error;

use podfs_platform::exec::PodTarget;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("empty request line")]
    Empty,
}

/// Result envelope returned by every file operation.
///
/// Serializes as `{"success":true,"data":..}` or `{"success":false,"error":".."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> OpResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> OpResult<U> {
        OpResult {
            success: self.success,
            data: self.data.map(f),
            error: self.error,
        }
    }

    pub fn into_result(self) -> Result<T, String> {
        match (self.success, self.data, self.error) {
            (true, Some(data), _) => Ok(data),
            (_, _, Some(error)) => Err(error),
            _ => Err("malformed result envelope".to_string()),
        }
    }
}

impl<T> From<anyhow::Result<T>> for OpResult<T> {
    fn from(result: anyhow::Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(format!("{:#}", e)),
        }
    }
}

impl<T: Serialize> OpResult<T> {
    /// Erase the payload type, e.g. for line-oriented output.
    pub fn into_json(self) -> OpResult<serde_json::Value> {
        match self.data {
            Some(data) => match serde_json::to_value(data) {
                Ok(value) => OpResult::ok(value),
                Err(e) => OpResult::err(format!("failed to encode result: {}", e)),
            },
            None => OpResult {
                success: self.success,
                data: None,
                error: self.error,
            },
        }
    }
}

/// One file operation, as read from a JSON request line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OpRequest {
    List {
        #[serde(flatten)]
        target: PodTarget,
        path: String,
    },
    Read {
        #[serde(flatten)]
        target: PodTarget,
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_size: Option<u64>,
    },
    Stat {
        #[serde(flatten)]
        target: PodTarget,
        path: String,
    },
    Download {
        #[serde(flatten)]
        target: PodTarget,
        path: String,
    },
    Delete {
        #[serde(flatten)]
        target: PodTarget,
        path: String,
        #[serde(default)]
        is_directory: bool,
    },
    Upload {
        #[serde(flatten)]
        target: PodTarget,
        path: String,
        /// Base64-encoded file content
        content: String,
    },
}

impl OpRequest {
    pub fn name(&self) -> &'static str {
        match self {
            OpRequest::List { .. } => "list",
            OpRequest::Read { .. } => "read",
            OpRequest::Stat { .. } => "stat",
            OpRequest::Download { .. } => "download",
            OpRequest::Delete { .. } => "delete",
            OpRequest::Upload { .. } => "upload",
        }
    }
}

/// Parse one request line.
pub fn parse_request(line: &str) -> Result<OpRequest, ProtocolError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ProtocolError::Empty);
    }
    Ok(serde_json::from_str(line)?)
}

/// Encode a value as a single JSON line (without the trailing newline).
pub fn encode_line<T: Serialize>(value: &T) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(value)?)
}
