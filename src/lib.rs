pub mod config;
pub mod core;
pub mod stores;
pub mod tasks;
pub mod upload;

// 重新导出常用类型
pub use config::{Config, StoreConfig, UploadConfig};
pub use core::{
    DropzoneError,
    IntervalTicker,
    RecordId,
    RecordStore,
    Result,
    Ticker,
    ValidationError,
};

pub use stores::{HttpRecordStore, InMemoryRecordStore};

pub use tasks::{
    NewTask,
    Priority,
    Selection,
    TaskFilter,
    TaskManager,
    TaskPatch,
    TaskRecord,
    TaskStatus,
};

pub use upload::{
    SelectedFile,
    TransferReport,
    UploadController,
    UploadEvent,
    UploadRecord,
    UploadStatus,
    UploadSummary,
};
