mod controller;
mod service;
pub mod types;
pub mod validate;

pub use controller::{EnqueueFailure, EnqueueReport, TransferReport, UploadController, UploadEntry};
pub use service::{UploadService, SESSION_TABLE, UPLOAD_TABLE};
pub use types::{
    SelectedFile,
    UploadEvent,
    UploadPatch,
    UploadRecord,
    UploadSession,
    UploadStatus,
    UploadSummary,
};
pub use validate::{validate_file, ALLOWED_TYPES, MAX_FILE_SIZE};
