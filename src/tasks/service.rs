use std::sync::Arc;
use crate::core::types::{patch_record, FieldSpec};
use crate::core::{
    DeleteParams,
    DropzoneError,
    FetchParams,
    FieldParams,
    OrderBy,
    PagingInfo,
    RecordId,
    RecordStore,
    RecordsParams,
    Result,
    ValidationError,
    WhereClause,
};
use super::types::{NewTask, Priority, TaskPatch, TaskRecord, TaskStatus};

pub const TASK_TABLE: &str = "task_c";

const TASK_FIELDS: &[&str] = &[
    "Name",
    "Tags",
    "description_c",
    "status_c",
    "priority_c",
    "due_date_c",
    "assigned_to_c",
    "upload_c",
    "upload_session_c",
    "CreatedOn",
    "ModifiedOn",
    "CreatedBy",
    "ModifiedBy",
];

/// 按状态/优先级查询时只取列表需要的字段
const SUMMARY_FIELDS: &[&str] = &[
    "Name",
    "Tags",
    "description_c",
    "status_c",
    "priority_c",
    "due_date_c",
    "assigned_to_c",
    "CreatedOn",
];

#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn RecordStore>,
    page_size: u32,
}

impl TaskService {
    pub fn new(store: Arc<dyn RecordStore>, page_size: u32) -> Self {
        Self { store, page_size }
    }

    async fn fetch(&self, fields: &[&str], where_: Vec<WhereClause>) -> Result<Vec<TaskRecord>> {
        let params = FetchParams {
            fields: FieldSpec::list(fields),
            where_,
            order_by: vec![OrderBy::desc("CreatedOn")],
            paging_info: Some(PagingInfo { limit: self.page_size, offset: 0 }),
        };

        let response = self.store.fetch_records(TASK_TABLE, &params).await?;
        response.data
            .unwrap_or_default()
            .into_iter()
            .map(|row| Ok(serde_json::from_value(row)?))
            .collect()
    }

    /// 最新创建的在前
    pub async fn get_all(&self) -> Result<Vec<TaskRecord>> {
        self.fetch(TASK_FIELDS, Vec::new()).await
    }

    pub async fn get_by_status(&self, status: TaskStatus) -> Result<Vec<TaskRecord>> {
        self.fetch(SUMMARY_FIELDS, vec![WhereClause::exact("status_c", status.as_str())]).await
    }

    pub async fn get_by_priority(&self, priority: Priority) -> Result<Vec<TaskRecord>> {
        self.fetch(SUMMARY_FIELDS, vec![WhereClause::exact("priority_c", priority.as_str())]).await
    }

    pub async fn get_by_id(&self, id: RecordId) -> Result<TaskRecord> {
        let params = FieldParams { fields: FieldSpec::list(TASK_FIELDS) };
        let response = self.store.get_record_by_id(TASK_TABLE, id, &params).await?;

        match response.data {
            Some(row) if !row.is_null() => Ok(serde_json::from_value(row)?),
            _ => Err(DropzoneError::not_found("Task", id)),
        }
    }

    /// 名称为空时不会发出任何请求
    pub async fn create(&self, task: &NewTask) -> Result<TaskRecord> {
        if task.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }

        let params = RecordsParams { records: vec![serde_json::to_value(task.fields())?] };
        let response = self.store.create_record(TASK_TABLE, &params).await?;

        match response.into_first()? {
            Some(row) => Ok(serde_json::from_value(row)?),
            None => Err(DropzoneError::store(format!("Store returned no record for task {:?}", task.name))),
        }
    }

    /// 只发送补丁中设置了的字段
    pub async fn update(&self, id: RecordId, patch: &TaskPatch) -> Result<Option<TaskRecord>> {
        if patch.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(ValidationError::EmptyName.into());
        }

        let params = RecordsParams { records: vec![patch_record(id, patch)?] };
        let response = self.store.update_record(TASK_TABLE, &params).await?;

        match response.into_first()? {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    pub async fn update_status(&self, id: RecordId, status: TaskStatus) -> Result<Option<TaskRecord>> {
        self.update(id, &TaskPatch::default().status(status)).await
    }

    pub async fn update_priority(&self, id: RecordId, priority: Priority) -> Result<Option<TaskRecord>> {
        self.update(id, &TaskPatch::default().priority(priority)).await
    }

    pub async fn assign(&self, id: RecordId, assignee: Option<RecordId>) -> Result<Option<TaskRecord>> {
        self.update(id, &TaskPatch::default().assigned_to(assignee)).await
    }

    pub async fn delete(&self, id: RecordId) -> Result<()> {
        let params = DeleteParams { record_ids: vec![id] };
        let response = self.store.delete_record(TASK_TABLE, &params).await?;

        if response.into_deleted()? {
            Ok(())
        } else {
            Err(DropzoneError::store(format!("Task {} was not deleted", id)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::InMemoryRecordStore;

    fn service() -> (Arc<InMemoryRecordStore>, TaskService) {
        let store = Arc::new(InMemoryRecordStore::new());
        (store.clone(), TaskService::new(store, 100))
    }

    #[tokio::test]
    async fn test_create_defaults() {
        let (_store, service) = service();
        let task = service.create(&NewTask::named("Plan sprint")).await.unwrap();

        assert_eq!(task.status, TaskStatus::New);
        assert_eq!(task.priority, Priority::Medium);
        assert!(task.created_on.is_some());
    }

    #[tokio::test]
    async fn test_blank_name_never_reaches_store() {
        let (store, service) = service();
        let err = service.create(&NewTask::named("   ")).await.unwrap_err();

        assert!(err.is_validation());
        assert_eq!(store.len(TASK_TABLE).await, 0);
    }

    #[tokio::test]
    async fn test_queries_by_status_and_priority() {
        let (_store, service) = service();
        service.create(&NewTask::named("a").status(TaskStatus::Completed)).await.unwrap();
        service.create(&NewTask::named("b").priority(Priority::High)).await.unwrap();
        service.create(&NewTask::named("c").status(TaskStatus::Completed).priority(Priority::High)).await.unwrap();

        let completed: Vec<_> = service.get_by_status(TaskStatus::Completed).await.unwrap()
            .into_iter().map(|t| t.name).collect();
        assert_eq!(completed, vec!["c", "a"]);

        let high: Vec<_> = service.get_by_priority(Priority::High).await.unwrap()
            .into_iter().map(|t| t.name).collect();
        assert_eq!(high, vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_assign_and_status_updates() {
        let (_store, service) = service();
        let task = service.create(&NewTask::named("a")).await.unwrap();

        service.assign(task.id, Some(RecordId(12))).await.unwrap();
        service.update_priority(task.id, Priority::Low).await.unwrap();
        let stored = service.get_by_id(task.id).await.unwrap();

        assert_eq!(stored.assigned_to.map(|a| a.id), Some(RecordId(12)));
        assert_eq!(stored.priority, Priority::Low);
        assert_eq!(stored.name, "a");
    }

    #[tokio::test]
    async fn test_missing_task() {
        let (_store, service) = service();
        assert!(matches!(
            service.get_by_id(RecordId(5)).await,
            Err(DropzoneError::NotFound { .. })
        ));
        assert!(service.update_status(RecordId(5), TaskStatus::New).await.is_err());
        assert!(service.delete(RecordId(5)).await.is_err());
    }
}
