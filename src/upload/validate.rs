use crate::core::ValidationError;
use super::types::SelectedFile;

/// 10MB
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

pub const ALLOWED_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
    "text/csv",
    "application/json",
];

/// 检查文件大小和类型，大小优先
pub fn validate_file(file: &SelectedFile) -> Result<(), ValidationError> {
    if file.size > MAX_FILE_SIZE {
        return Err(ValidationError::FileTooLarge { size: file.size });
    }

    if !ALLOWED_TYPES.contains(&file.mime_type.as_str()) {
        return Err(ValidationError::UnsupportedType {
            mime_type: file.mime_type.clone(),
        });
    }

    Ok(())
}
