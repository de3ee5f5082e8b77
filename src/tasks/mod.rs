mod manager;
mod service;
pub mod types;

pub use manager::TaskManager;
pub use service::{TaskService, TASK_TABLE};
pub use types::{NewTask, Priority, Selection, TaskFilter, TaskPatch, TaskRecord, TaskStatus};
