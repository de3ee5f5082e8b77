use std::sync::Arc;
use chrono::Utc;
use serde_json::json;
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
};
use super::types::{NewSession, NewUpload, UploadPatch, UploadRecord, UploadSession};

pub const UPLOAD_TABLE: &str = "upload_c";
pub const SESSION_TABLE: &str = "upload_session_c";

const UPLOAD_FIELDS: &[&str] = &[
    "Name",
    "Tags",
    "size_c",
    "type_c",
    "status_c",
    "progress_c",
    "uploaded_at_c",
    "url_c",
    "CreatedOn",
    "ModifiedOn",
];

/// 上传记录和上传会话的 CRUD
#[derive(Clone)]
pub struct UploadService {
    store: Arc<dyn RecordStore>,
    page_size: u32,
}

impl UploadService {
    pub fn new(store: Arc<dyn RecordStore>, page_size: u32) -> Self {
        Self { store, page_size }
    }

    /// 最新的在前，只取第一页
    pub async fn get_all(&self) -> Result<Vec<UploadRecord>> {
        let params = FetchParams {
            fields: FieldSpec::list(UPLOAD_FIELDS),
            order_by: vec![OrderBy::desc("CreatedOn")],
            paging_info: Some(PagingInfo { limit: self.page_size, offset: 0 }),
            ..Default::default()
        };

        let response = self.store.fetch_records(UPLOAD_TABLE, &params).await?;
        response.data
            .unwrap_or_default()
            .into_iter()
            .map(|row| Ok(serde_json::from_value(row)?))
            .collect()
    }

    pub async fn get_by_id(&self, id: RecordId) -> Result<UploadRecord> {
        let params = FieldParams { fields: FieldSpec::list(UPLOAD_FIELDS) };
        let response = self.store.get_record_by_id(UPLOAD_TABLE, id, &params).await?;

        match response.data {
            Some(row) if !row.is_null() => Ok(serde_json::from_value(row)?),
            _ => Err(DropzoneError::not_found("Upload", id)),
        }
    }

    pub async fn create(&self, upload: &NewUpload) -> Result<UploadRecord> {
        let params = RecordsParams { records: vec![serde_json::to_value(upload)?] };
        let response = self.store.create_record(UPLOAD_TABLE, &params).await?;

        match response.into_first()? {
            Some(row) => Ok(serde_json::from_value(row)?),
            None => Err(DropzoneError::store(format!("Store returned no record for {}", upload.name))),
        }
    }

    /// 部分更新，返回存储回传的记录（如果有）
    pub async fn update(&self, id: RecordId, patch: &UploadPatch) -> Result<Option<UploadRecord>> {
        let params = RecordsParams { records: vec![patch_record(id, patch)?] };
        let response = self.store.update_record(UPLOAD_TABLE, &params).await?;

        match response.into_first()? {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    pub async fn delete(&self, id: RecordId) -> Result<()> {
        let params = DeleteParams { record_ids: vec![id] };
        let response = self.store.delete_record(UPLOAD_TABLE, &params).await?;

        if response.into_deleted()? {
            Ok(())
        } else {
            Err(DropzoneError::store(format!("Upload {} was not deleted", id)))
        }
    }

    pub async fn create_session(&self, uploads: &[UploadRecord]) -> Result<UploadSession> {
        let session = NewSession::for_uploads(uploads, Utc::now());
        let params = RecordsParams { records: vec![serde_json::to_value(&session)?] };
        let response = self.store.create_record(SESSION_TABLE, &params).await?;

        match response.into_first()? {
            Some(row) => Ok(serde_json::from_value(row)?),
            None => Err(DropzoneError::store("Store returned no upload session")),
        }
    }

    pub async fn complete_session(&self, id: RecordId) -> Result<()> {
        let record = json!({
            "Id": id,
            "completed_at_c": Utc::now().to_rfc3339(),
        });
        let params = RecordsParams { records: vec![record] };
        self.store.update_record(SESSION_TABLE, &params).await?.into_first()?;
        Ok(())
    }
}
