use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use dropzone::core::{
    DeleteParams,
    FetchParams,
    FetchResponse,
    FieldParams,
    GetResponse,
    MutationResponse,
    RecordsParams,
};
use dropzone::{
    DropzoneError,
    InMemoryRecordStore,
    NewTask,
    Priority,
    RecordId,
    RecordStore,
    SelectedFile,
    Selection,
    TaskFilter,
    TaskManager,
    TaskPatch,
    TaskStatus,
    UploadConfig,
    UploadController,
    UploadEvent,
    UploadStatus,
};

/// 可注入失败的存储 - 用于测试
struct FlakyStore {
    inner: InMemoryRecordStore,
    /// 记录 Id -> 失败前允许成功的更新次数
    update_budget: Mutex<HashMap<i64, usize>>,
    fail_deletes: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: InMemoryRecordStore::new(),
            update_budget: Mutex::new(HashMap::new()),
            fail_deletes: AtomicBool::new(false),
        }
    }

    fn fail_updates_after(&self, id: RecordId, successes: usize) {
        self.update_budget.lock().unwrap().insert(id.0, successes);
    }

    fn heal(&self) {
        self.update_budget.lock().unwrap().clear();
        self.fail_deletes.store(false, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl RecordStore for FlakyStore {
    async fn fetch_records(&self, record_type: &str, params: &FetchParams) -> dropzone::Result<FetchResponse> {
        self.inner.fetch_records(record_type, params).await
    }

    async fn get_record_by_id(&self, record_type: &str, id: RecordId, params: &FieldParams) -> dropzone::Result<GetResponse> {
        self.inner.get_record_by_id(record_type, id, params).await
    }

    async fn create_record(&self, record_type: &str, params: &RecordsParams) -> dropzone::Result<MutationResponse> {
        self.inner.create_record(record_type, params).await
    }

    async fn update_record(&self, record_type: &str, params: &RecordsParams) -> dropzone::Result<MutationResponse> {
        let id = params.records.first().and_then(|record| record["Id"].as_i64());

        if let Some(id) = id {
            let mut budget = self.update_budget.lock().unwrap();
            if let Some(remaining) = budget.get_mut(&id) {
                if *remaining == 0 {
                    return Err(DropzoneError::server_error(503, "Simulated failure"));
                }
                *remaining -= 1;
            }
        }

        self.inner.update_record(record_type, params).await
    }

    async fn delete_record(&self, record_type: &str, params: &DeleteParams) -> dropzone::Result<MutationResponse> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(DropzoneError::server_error(500, "Simulated failure"));
        }
        self.inner.delete_record(record_type, params).await
    }
}

fn fast_config() -> UploadConfig {
    UploadConfig {
        step_interval: Duration::ZERO,
        ..Default::default()
    }
}

fn files(names: &[&str]) -> Vec<SelectedFile> {
    names.iter().map(|name| SelectedFile::new(*name, 1024, "text/plain")).collect()
}

#[tokio::test]
async fn test_failure_is_isolated_to_one_file() {
    let store = Arc::new(FlakyStore::new());
    let controller = UploadController::new(store.clone(), fast_config());

    let prepared = controller.enqueue(files(&["a.txt", "b.txt", "c.txt"])).await.prepared;
    let (a, b, c) = (prepared[0].id, prepared[1].id, prepared[2].id);
    // b 在 0/10/20/30 之后失败
    store.fail_updates_after(b, 4);

    let report = controller.start_transfer().await;
    assert_eq!(report.completed, vec![a, c]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, b);

    let failed = controller.get(b).await.unwrap().record;
    assert_eq!(failed.status, UploadStatus::Error);
    assert_eq!(failed.progress, 0);

    for id in [a, c] {
        let record = controller.get(id).await.unwrap().record;
        assert_eq!(record.status, UploadStatus::Completed);
        assert_eq!(record.progress, 100);
    }
}

#[tokio::test]
async fn test_retry_after_failure() {
    let store = Arc::new(FlakyStore::new());
    let controller = UploadController::new(store.clone(), fast_config());

    let id = controller.enqueue(files(&["a.txt"])).await.prepared[0].id;
    store.fail_updates_after(id, 0);

    let report = controller.start_transfer().await;
    assert_eq!(report.failed.len(), 1);
    assert_eq!(controller.get(id).await.unwrap().record.status, UploadStatus::Error);

    store.heal();
    let report = controller.retry(id).await.unwrap();
    assert_eq!(report.completed, vec![id]);

    let stored = controller.service().get_by_id(id).await.unwrap();
    assert_eq!(stored.status, UploadStatus::Completed);
    assert_eq!(stored.url.as_deref(), Some(format!("/uploads/file-{}", id).as_str()));
}

#[tokio::test]
async fn test_files_upload_one_after_another() {
    let controller = UploadController::new(Arc::new(InMemoryRecordStore::new()), fast_config());
    let mut events = controller.subscribe();

    let prepared = controller.enqueue(files(&["a.txt", "b.txt", "c.txt"])).await.prepared;
    controller.start_transfer().await;

    let mut order = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let UploadEvent::Progress { id, .. } = event {
            if order.last() != Some(&id) {
                order.push(id);
            }
        }
    }

    // 每个文件的进度连续出现，没有交错
    let expected: Vec<_> = prepared.iter().map(|record| record.id).collect();
    assert_eq!(order, expected);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_transfer() {
    let store = Arc::new(InMemoryRecordStore::new());
    let config = UploadConfig {
        step_interval: Duration::from_millis(150),
        ..Default::default()
    };
    let controller = Arc::new(UploadController::new(store, config));
    let id = controller.enqueue(files(&["slow.txt"])).await.prepared[0].id;

    let runner = controller.clone();
    let handle = tokio::spawn(async move { runner.start_transfer().await });

    // 第 150ms 和 300ms 两步已经完成
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(controller.get(id).await.unwrap().record.progress, 10);
    controller.cancel(id).await.unwrap();

    let report = handle.await.unwrap();
    assert_eq!(report.cancelled, vec![id]);
    assert!(report.completed.is_empty());

    let record = controller.get(id).await.unwrap().record;
    assert_eq!(record.status, UploadStatus::Pending);
    assert_eq!(record.progress, 0);
}

#[tokio::test]
async fn test_remove_failure_keeps_entry() {
    let store = Arc::new(FlakyStore::new());
    let controller = UploadController::new(store.clone(), fast_config());
    let id = controller.enqueue(files(&["a.txt"])).await.prepared[0].id;

    store.fail_deletes.store(true, Ordering::SeqCst);
    assert!(matches!(
        controller.remove(id).await,
        Err(DropzoneError::Server { status_code: 500, .. })
    ));
    assert!(controller.get(id).await.is_some());

    store.heal();
    controller.remove(id).await.unwrap();
    assert!(controller.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_task_workflow() {
    let manager = TaskManager::new(Arc::new(InMemoryRecordStore::new()), 100);

    let err = manager.create(NewTask::named("")).await.unwrap_err();
    assert_eq!(err.to_string(), "Task name is required");

    let report = manager
        .create(NewTask::named("Quarterly report").description("Draft numbers").tags("finance"))
        .await
        .unwrap();
    manager.create(NewTask::named("Fix login bug").priority(Priority::High)).await.unwrap();

    manager.change_status(report.id, TaskStatus::InProgress).await.unwrap();
    manager
        .update(report.id, TaskPatch::default().due_date(chrono::NaiveDate::from_ymd_opt(2024, 9, 30)))
        .await
        .unwrap();

    let local = manager.get(report.id).await.unwrap();
    assert_eq!(local.status, TaskStatus::InProgress);
    assert_eq!(local.description, "Draft numbers");
    assert_eq!(local.priority, Priority::Medium);

    let search = manager.filter(&TaskFilter::new(Selection::All, Selection::All, "FINANCE")).await;
    assert_eq!(search.len(), 1);
    assert_eq!(search[0].id, report.id);

    let in_progress = manager
        .filter(&TaskFilter::new(Selection::Only(TaskStatus::InProgress), Selection::All, ""))
        .await;
    assert_eq!(in_progress.len(), 1);

    // 远程记录和本地一致
    manager.load().await.unwrap();
    let reloaded = manager.get(report.id).await.unwrap();
    assert_eq!(reloaded.status, TaskStatus::InProgress);
    assert_eq!(reloaded.due_date, chrono::NaiveDate::from_ymd_opt(2024, 9, 30));
    assert_eq!(reloaded.description, "Draft numbers");
}
