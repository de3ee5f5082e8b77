use std::sync::Arc;
use bytes::Bytes;
use chrono::Utc;
use tokio::sync::{broadcast, Mutex, RwLock};
use crate::config::UploadConfig;
use crate::core::{DropzoneError, IntervalTicker, RecordId, RecordStore, Result, Ticker};
use super::service::UploadService;
use super::types::{
    NewUpload,
    SelectedFile,
    UploadEvent,
    UploadPatch,
    UploadRecord,
    UploadStatus,
    UploadSummary,
};
use super::validate::validate_file;

/// 本地缓存中的一项：记录 + 原始文件内容
#[derive(Debug, Clone)]
pub struct UploadEntry {
    pub record: UploadRecord,
    pub payload: Option<Bytes>,
}

#[derive(Debug)]
pub struct EnqueueFailure {
    pub name: String,
    pub error: DropzoneError,
}

/// 每个文件独立处理的结果
#[derive(Debug, Default)]
pub struct EnqueueReport {
    pub prepared: Vec<UploadRecord>,
    pub failed: Vec<EnqueueFailure>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferReport {
    pub session: Option<RecordId>,
    pub completed: Vec<RecordId>,
    pub failed: Vec<(RecordId, String)>,
    pub cancelled: Vec<RecordId>,
}

enum TransferOutcome {
    Completed,
    Cancelled,
    /// 开始前已被删除或不再是 pending
    Skipped,
}

/// 上传生命周期控制器
///
/// 持有上传记录的本地缓存，驱动 `pending → uploading → completed | error`，
/// 每一次进度变化都先写入存储再反映到本地。
pub struct UploadController {
    service: UploadService,
    ticker: Arc<dyn Ticker>,
    config: UploadConfig,
    entries: Arc<RwLock<Vec<UploadEntry>>>,
    transfer_lock: Mutex<()>,
    event_tx: broadcast::Sender<UploadEvent>,
}

impl UploadController {
    pub fn new(store: Arc<dyn RecordStore>, config: UploadConfig) -> Self {
        // 最大缓存 256 个事件
        let (event_tx, _) = broadcast::channel(256);

        Self {
            service: UploadService::new(store, config.page_size),
            ticker: Arc::new(IntervalTicker::new(config.step_interval)),
            config,
            entries: Arc::new(RwLock::new(Vec::new())),
            transfer_lock: Mutex::new(()),
            event_tx,
        }
    }

    pub fn with_ticker(mut self, ticker: Arc<dyn Ticker>) -> Self {
        self.ticker = ticker;
        self
    }

    pub fn service(&self) -> &UploadService {
        &self.service
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: UploadEvent) {
        let _ = self.event_tx.send(event);
    }

    /// 从存储重新加载，本地未持久化的状态会被丢弃
    pub async fn load(&self) -> Result<usize> {
        let records = self.service.get_all().await?;
        let count = records.len();

        *self.entries.write().await = records
            .into_iter()
            .map(|record| UploadEntry { record, payload: None })
            .collect();

        tracing::debug!("Loaded {} upload(s)", count);
        Ok(count)
    }

    pub async fn snapshot(&self) -> Vec<UploadRecord> {
        self.entries.read().await.iter().map(|entry| entry.record.clone()).collect()
    }

    pub async fn get(&self, id: RecordId) -> Option<UploadEntry> {
        self.entries.read().await.iter().find(|entry| entry.record.id == id).cloned()
    }

    pub async fn summary(&self) -> UploadSummary {
        let entries = self.entries.read().await;
        UploadSummary::from_records(entries.iter().map(|entry| &entry.record))
    }

    /// 校验并创建 pending 记录；单个文件失败不影响其他文件
    pub async fn enqueue(&self, files: Vec<SelectedFile>) -> EnqueueReport {
        let mut report = EnqueueReport::default();

        for file in files {
            let prepared = async {
                validate_file(&file)?;
                self.service.create(&NewUpload::pending(&file)).await
            };

            match prepared.await {
                Ok(record) => {
                    self.entries.write().await.push(UploadEntry {
                        record: record.clone(),
                        payload: file.payload,
                    });
                    self.emit(UploadEvent::Enqueued { id: record.id, name: record.name.clone() });
                    report.prepared.push(record);
                }
                Err(error) => {
                    tracing::warn!("Failed to prepare {}: {}", file.name, error);
                    report.failed.push(EnqueueFailure { name: file.name, error });
                }
            }
        }

        report
    }

    /// 依次上传本地所有 pending 记录
    pub async fn start_transfer(&self) -> TransferReport {
        self.run_batch(None).await
    }

    /// 只上传指定的 pending 记录
    pub async fn start_transfer_for(&self, ids: &[RecordId]) -> TransferReport {
        self.run_batch(Some(ids)).await
    }

    /// 取消只改变本地状态，正在进行的一步不会被打断，
    /// 上传循环会在下一步开始前发现并停止
    pub async fn cancel(&self, id: RecordId) -> Result<()> {
        self.reset_to_pending(id, UploadStatus::Uploading, "cancel").await?;
        tracing::info!("Upload {} cancelled", id);
        Ok(())
    }

    /// 把失败的记录重新放回 pending 并立即上传
    pub async fn retry(&self, id: RecordId) -> Result<TransferReport> {
        self.reset_to_pending(id, UploadStatus::Error, "retry").await?;
        Ok(self.run_batch(Some(&[id])).await)
    }

    /// 先删除远程记录，成功后再移出本地缓存
    pub async fn remove(&self, id: RecordId) -> Result<()> {
        self.service.delete(id).await?;
        self.entries.write().await.retain(|entry| entry.record.id != id);
        self.emit(UploadEvent::Removed { id });
        Ok(())
    }

    /// 只清空本地缓存，不删除远程记录
    pub async fn clear_all(&self) {
        self.entries.write().await.clear();
        self.emit(UploadEvent::Cleared);
    }

    async fn run_batch(&self, requested: Option<&[RecordId]>) -> TransferReport {
        let _guard = self.transfer_lock.lock().await;
        let mut report = TransferReport::default();

        let pending: Vec<UploadRecord> = self.entries
            .read()
            .await
            .iter()
            .filter(|entry| entry.record.status == UploadStatus::Pending)
            .filter(|entry| requested.is_none_or(|ids| ids.contains(&entry.record.id)))
            .map(|entry| entry.record.clone())
            .collect();

        if pending.is_empty() {
            return report;
        }

        tracing::info!("Starting transfer of {} file(s)", pending.len());

        if self.config.track_sessions {
            match self.service.create_session(&pending).await {
                Ok(session) => report.session = Some(session.id),
                Err(err) => tracing::warn!("Failed to create upload session: {}", err),
            }
        }

        // 顺序上传，保证进度可读
        for record in &pending {
            match self.transfer_one(record.id).await {
                Ok(TransferOutcome::Completed) => {
                    tracing::info!("{} uploaded successfully", record.name);
                    report.completed.push(record.id);
                }
                Ok(TransferOutcome::Cancelled) => report.cancelled.push(record.id),
                Ok(TransferOutcome::Skipped) => {}
                Err(err) => {
                    tracing::warn!("Failed to upload {}: {}", record.name, err);
                    self.mark_failed(record.id, &err).await;
                    report.failed.push((record.id, err.to_string()));
                }
            }
        }

        if let Some(session) = report.session {
            if let Err(err) = self.service.complete_session(session).await {
                tracing::warn!("Failed to complete upload session {}: {}", session, err);
            }
        }

        self.emit(UploadEvent::BatchFinished {
            completed: report.completed.len(),
            failed: report.failed.len(),
            cancelled: report.cancelled.len(),
        });

        report
    }

    async fn transfer_one(&self, id: RecordId) -> Result<TransferOutcome> {
        if !self.begin_upload(id).await {
            return Ok(TransferOutcome::Skipped);
        }

        for progress in progress_steps(self.config.step_percent) {
            self.ticker.tick().await;

            if !self.is_uploading(id).await {
                tracing::debug!("Upload {} stopped at {}%", id, progress);
                return Ok(TransferOutcome::Cancelled);
            }

            self.service.update(id, &UploadPatch::progress(progress)).await?;
            self.record_progress(id, progress).await;
        }

        if !self.is_uploading(id).await {
            return Ok(TransferOutcome::Cancelled);
        }

        let url = format!("/uploads/file-{}", id);
        let patch = UploadPatch::completed(url.clone(), Utc::now());
        self.service.update(id, &patch).await?;

        let finished = {
            let mut entries = self.entries.write().await;
            match entries.iter_mut().find(|entry| entry.record.id == id) {
                Some(entry) if entry.record.status == UploadStatus::Uploading => {
                    entry.record.apply(&patch);
                    true
                }
                _ => false,
            }
        };

        if !finished {
            return Ok(TransferOutcome::Cancelled);
        }

        self.emit(UploadEvent::StateChanged {
            id,
            from: UploadStatus::Uploading,
            to: UploadStatus::Completed,
        });
        self.emit(UploadEvent::Completed { id, url });

        Ok(TransferOutcome::Completed)
    }

    async fn begin_upload(&self, id: RecordId) -> bool {
        {
            let mut entries = self.entries.write().await;
            match entries.iter_mut().find(|entry| entry.record.id == id) {
                Some(entry) if entry.record.status == UploadStatus::Pending => {
                    entry.record.status = UploadStatus::Uploading;
                    entry.record.progress = 0;
                }
                _ => return false,
            }
        }

        self.emit(UploadEvent::StateChanged {
            id,
            from: UploadStatus::Pending,
            to: UploadStatus::Uploading,
        });
        true
    }

    async fn is_uploading(&self, id: RecordId) -> bool {
        self.entries
            .read()
            .await
            .iter()
            .any(|entry| entry.record.id == id && entry.record.status == UploadStatus::Uploading)
    }

    /// 进度只在仍处于 uploading 时前进
    async fn record_progress(&self, id: RecordId, progress: u8) {
        let advanced = {
            let mut entries = self.entries.write().await;
            match entries.iter_mut().find(|entry| entry.record.id == id) {
                Some(entry)
                    if entry.record.status == UploadStatus::Uploading
                        && progress >= entry.record.progress =>
                {
                    entry.record.progress = progress;
                    true
                }
                _ => false,
            }
        };

        if advanced {
            tracing::debug!("Upload {} at {}%", id, progress);
            self.emit(UploadEvent::Progress { id, progress });
        }
    }

    async fn mark_failed(&self, id: RecordId, error: &DropzoneError) {
        let previous = {
            let mut entries = self.entries.write().await;
            entries.iter_mut().find(|entry| entry.record.id == id).map(|entry| {
                let previous = entry.record.status;
                entry.record.status = UploadStatus::Error;
                entry.record.progress = 0;
                previous
            })
        };

        if let Some(from) = previous {
            self.emit(UploadEvent::StateChanged { id, from, to: UploadStatus::Error });
        }
        self.emit(UploadEvent::Failed { id, error: error.to_string() });
    }

    async fn reset_to_pending(&self, id: RecordId, expected: UploadStatus, action: &'static str) -> Result<()> {
        {
            let mut entries = self.entries.write().await;
            let entry = entries
                .iter_mut()
                .find(|entry| entry.record.id == id)
                .ok_or_else(|| DropzoneError::not_found("Upload", id))?;

            if entry.record.status != expected {
                return Err(DropzoneError::invalid_transition(id, entry.record.status, action));
            }

            entry.record.status = UploadStatus::Pending;
            entry.record.progress = 0;
        }

        self.emit(UploadEvent::StateChanged { id, from: expected, to: UploadStatus::Pending });
        Ok(())
    }
}

/// 0 开始按步长递增，最后一步总是 100
fn progress_steps(step_percent: u8) -> Vec<u8> {
    let step = step_percent.clamp(1, 100) as usize;
    let mut steps: Vec<u8> = (0..100u8).step_by(step).collect();
    steps.push(100);
    steps
}
