use thiserror::Error;
use super::types::RecordId;

/// 文件/表单校验错误，在任何远程调用之前返回
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("File size exceeds 10MB limit. Current size: {:.2}MB", *size as f64 / 1024.0 / 1024.0)]
    FileTooLarge {
        size: u64,
    },

    #[error("File type \"{mime_type}\" is not allowed. Supported types: images, PDF, Word documents, text files.")]
    UnsupportedType {
        mime_type: String,
    },

    #[error("Task name is required")]
    EmptyName,
}

#[derive(Error, Debug)]
pub enum DropzoneError {
    #[error("IO error {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{message}")]
    Store {
        message: String,
    },

    #[error("Server error: status code {status_code}, message: {message}")]
    Server {
        status_code: u16,
        message: String,
    },

    #[error("{record_type} with ID {id} not found")]
    NotFound {
        record_type: String,
        id: RecordId,
    },

    #[error("Cannot {action} record {id} while it is {from}")]
    InvalidTransition {
        id: RecordId,
        from: String,
        action: &'static str,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DropzoneError {
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn server_error(status_code: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status_code,
            message: message.into(),
        }
    }

    pub fn not_found(record_type: impl Into<String>, id: RecordId) -> Self {
        Self::NotFound {
            record_type: record_type.into(),
            id,
        }
    }

    pub fn invalid_transition(id: RecordId, from: impl ToString, action: &'static str) -> Self {
        Self::InvalidTransition {
            id,
            from: from.to_string(),
            action,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// 是否是校验错误（没有发生任何远程调用）
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T, E = DropzoneError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages() {
        let err = ValidationError::FileTooLarge { size: 11 * 1024 * 1024 };
        assert_eq!(err.to_string(), "File size exceeds 10MB limit. Current size: 11.00MB");

        let err = ValidationError::UnsupportedType { mime_type: "video/mp4".to_string() };
        assert!(err.to_string().starts_with("File type \"video/mp4\" is not allowed"));
    }

    #[test]
    fn test_not_found_message() {
        let err = DropzoneError::not_found("Task", RecordId(7));
        assert_eq!(err.to_string(), "Task with ID 7 not found");
    }
}
