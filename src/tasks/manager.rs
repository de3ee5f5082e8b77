use std::sync::Arc;
use tokio::sync::RwLock;
use crate::core::{RecordId, RecordStore, Result};
use super::service::TaskService;
use super::types::{NewTask, Priority, TaskFilter, TaskPatch, TaskRecord, TaskStatus};

/// 任务列表管理器
///
/// 本地缓存只在远程调用成功之后才修改。
#[derive(Clone)]
pub struct TaskManager {
    service: TaskService,
    tasks: Arc<RwLock<Vec<TaskRecord>>>,
}

impl TaskManager {
    pub fn new(store: Arc<dyn RecordStore>, page_size: u32) -> Self {
        Self {
            service: TaskService::new(store, page_size),
            tasks: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn service(&self) -> &TaskService {
        &self.service
    }

    pub async fn load(&self) -> Result<usize> {
        let tasks = self.service.get_all().await?;
        let count = tasks.len();
        *self.tasks.write().await = tasks;

        tracing::debug!("Loaded {} task(s)", count);
        Ok(count)
    }

    pub async fn tasks(&self) -> Vec<TaskRecord> {
        self.tasks.read().await.clone()
    }

    pub async fn get(&self, id: RecordId) -> Option<TaskRecord> {
        self.tasks.read().await.iter().find(|task| task.id == id).cloned()
    }

    /// 新任务放在最前面
    pub async fn create(&self, task: NewTask) -> Result<TaskRecord> {
        let created = self.service.create(&task).await?;
        self.tasks.write().await.insert(0, created.clone());

        tracing::info!("Task {} created", created.id);
        Ok(created)
    }

    pub async fn update(&self, id: RecordId, patch: TaskPatch) -> Result<()> {
        self.service.update(id, &patch).await?;

        if let Some(task) = self.tasks.write().await.iter_mut().find(|task| task.id == id) {
            task.apply(&patch);
        }
        Ok(())
    }

    pub async fn change_status(&self, id: RecordId, status: TaskStatus) -> Result<()> {
        self.update(id, TaskPatch::default().status(status)).await
    }

    pub async fn change_priority(&self, id: RecordId, priority: Priority) -> Result<()> {
        self.update(id, TaskPatch::default().priority(priority)).await
    }

    pub async fn assign(&self, id: RecordId, assignee: Option<RecordId>) -> Result<()> {
        self.update(id, TaskPatch::default().assigned_to(assignee)).await
    }

    /// 调用方负责确认
    pub async fn delete(&self, id: RecordId) -> Result<()> {
        self.service.delete(id).await?;
        self.tasks.write().await.retain(|task| task.id != id);

        tracing::info!("Task {} deleted", id);
        Ok(())
    }

    /// 纯本地过滤，保持缓存顺序
    pub async fn filter(&self, filter: &TaskFilter) -> Vec<TaskRecord> {
        self.tasks
            .read()
            .await
            .iter()
            .filter(|task| filter.matches(task))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::InMemoryRecordStore;
    use crate::tasks::types::Selection;

    fn manager() -> TaskManager {
        TaskManager::new(Arc::new(InMemoryRecordStore::new()), 100)
    }

    #[tokio::test]
    async fn test_create_prepends() {
        let manager = manager();
        manager.create(NewTask::named("first")).await.unwrap();
        manager.create(NewTask::named("second")).await.unwrap();

        let names: Vec<_> = manager.tasks().await.into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_load_matches_local_order() {
        let manager = manager();
        manager.create(NewTask::named("first")).await.unwrap();
        manager.create(NewTask::named("second")).await.unwrap();
        let local = manager.tasks().await;

        assert_eq!(manager.load().await.unwrap(), 2);
        let loaded: Vec<_> = manager.tasks().await.into_iter().map(|t| t.id).collect();
        assert_eq!(loaded, local.into_iter().map(|t| t.id).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_failed_update_leaves_cache() {
        let manager = manager();
        let task = manager.create(NewTask::named("a")).await.unwrap();
        manager.service().delete(task.id).await.unwrap();

        assert!(manager.change_status(task.id, TaskStatus::Completed).await.is_err());
        assert_eq!(manager.get(task.id).await.unwrap().status, TaskStatus::New);
    }

    #[tokio::test]
    async fn test_delete_and_filter() {
        let manager = manager();
        let a = manager.create(NewTask::named("alpha").priority(Priority::High)).await.unwrap();
        manager.create(NewTask::named("beta").priority(Priority::Low)).await.unwrap();

        let high = manager.filter(&TaskFilter::new(Selection::All, Selection::Only(Priority::High), "")).await;
        assert_eq!(high.len(), 1);

        manager.delete(a.id).await.unwrap();
        let high = manager.filter(&TaskFilter::new(Selection::All, Selection::Only(Priority::High), "")).await;
        assert!(high.is_empty());
        assert!(manager.get(a.id).await.is_none());
    }
}
