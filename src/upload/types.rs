use std::path::Path;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use crate::core::types::{null_as_default, timestamp};
use crate::core::RecordId;

/// 上传状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// 等待上传
    #[default]
    Pending,
    /// 上传中
    Uploading,
    /// 已完成
    Completed,
    /// 失败
    Error,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Completed => "completed",
            UploadStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// 上传记录（`upload_c`）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    #[serde(rename = "Id")]
    pub id: RecordId,
    #[serde(rename = "Name", default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "Tags", default, deserialize_with = "null_as_default")]
    pub tags: String,
    /// 文件大小（字节）
    #[serde(rename = "size_c", default, deserialize_with = "null_as_default")]
    pub size: u64,
    /// MIME 类型
    #[serde(rename = "type_c", default, deserialize_with = "null_as_default")]
    pub mime_type: String,
    #[serde(rename = "status_c", default, deserialize_with = "null_as_default")]
    pub status: UploadStatus,
    /// 0..=100
    #[serde(rename = "progress_c", default, deserialize_with = "null_as_default")]
    pub progress: u8,
    #[serde(rename = "uploaded_at_c", default, with = "timestamp")]
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(rename = "url_c", default)]
    pub url: Option<String>,
    #[serde(rename = "CreatedOn", default, with = "timestamp")]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(rename = "ModifiedOn", default, with = "timestamp")]
    pub modified_on: Option<DateTime<Utc>>,
}

impl UploadRecord {
    /// 把已经持久化的部分字段合并到本地副本
    pub fn apply(&mut self, patch: &UploadPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(tags) = &patch.tags {
            self.tags = tags.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(progress) = patch.progress {
            self.progress = progress;
        }
        if let Some(uploaded_at) = patch.uploaded_at {
            self.uploaded_at = Some(uploaded_at);
        }
        if let Some(url) = &patch.url {
            self.url = Some(url.clone());
        }
    }
}

/// 创建上传记录时写入的字段
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewUpload {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Tags")]
    pub tags: String,
    #[serde(rename = "size_c")]
    pub size: u64,
    #[serde(rename = "type_c")]
    pub mime_type: String,
    #[serde(rename = "status_c")]
    pub status: UploadStatus,
    #[serde(rename = "progress_c")]
    pub progress: u8,
}

impl NewUpload {
    pub fn pending(file: &SelectedFile) -> Self {
        Self {
            name: file.name.clone(),
            tags: String::new(),
            size: file.size,
            mime_type: file.mime_type.clone(),
            status: UploadStatus::Pending,
            progress: 0,
        }
    }
}

/// 部分更新：只序列化设置了的字段
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UploadPatch {
    #[serde(rename = "Name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "Tags", skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(rename = "status_c", skip_serializing_if = "Option::is_none")]
    pub status: Option<UploadStatus>,
    #[serde(rename = "progress_c", skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(rename = "uploaded_at_c", skip_serializing_if = "Option::is_none", with = "timestamp")]
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(rename = "url_c", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl UploadPatch {
    /// 模拟上传中的一步，100% 时状态同时写为 completed
    pub fn progress(progress: u8) -> Self {
        let status = if progress >= 100 {
            UploadStatus::Completed
        } else {
            UploadStatus::Uploading
        };

        Self {
            status: Some(status),
            progress: Some(progress),
            ..Default::default()
        }
    }

    pub fn completed(url: String, uploaded_at: DateTime<Utc>) -> Self {
        Self {
            status: Some(UploadStatus::Completed),
            progress: Some(100),
            uploaded_at: Some(uploaded_at),
            url: Some(url),
            ..Default::default()
        }
    }
}

/// 一批上传的分组记录（`upload_session_c`）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSession {
    #[serde(rename = "Id")]
    pub id: RecordId,
    #[serde(rename = "Name", default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "files_c", default, with = "json_ids")]
    pub files: Vec<RecordId>,
    #[serde(rename = "total_size_c", default, deserialize_with = "null_as_default")]
    pub total_size: u64,
    #[serde(rename = "started_at_c", default, with = "timestamp")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "completed_at_c", default, with = "timestamp")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSession {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "files_c", with = "json_ids")]
    pub files: Vec<RecordId>,
    #[serde(rename = "total_size_c")]
    pub total_size: u64,
    #[serde(rename = "started_at_c", with = "timestamp")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "completed_at_c", with = "timestamp")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl NewSession {
    pub fn for_uploads(uploads: &[UploadRecord], started_at: DateTime<Utc>) -> Self {
        Self {
            name: format!("Upload Session {}", started_at.to_rfc3339()),
            files: uploads.iter().map(|upload| upload.id).collect(),
            total_size: uploads.iter().map(|upload| upload.size).sum(),
            started_at: Some(started_at),
            completed_at: None,
        }
    }
}

/// `files_c` 在存储中是 JSON 编码后的字符串
mod json_ids {
    use super::*;

    pub fn serialize<S>(ids: &[RecordId], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let encoded = serde_json::to_string(ids).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&encoded)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<RecordId>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Encoded(String),
            Plain(Vec<RecordId>),
        }

        match Option::<Repr>::deserialize(deserializer)? {
            None => Ok(Vec::new()),
            Some(Repr::Plain(ids)) => Ok(ids),
            Some(Repr::Encoded(raw)) if raw.trim().is_empty() => Ok(Vec::new()),
            Some(Repr::Encoded(raw)) => serde_json::from_str(&raw).map_err(serde::de::Error::custom),
        }
    }
}

/// 用户选择的文件
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFile {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    /// 原始文件内容，上传时使用
    pub payload: Option<Bytes>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, size: u64, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type.into(),
            payload: None,
        }
    }

    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, payload: Bytes) -> Self {
        Self {
            name: name.into(),
            size: payload.len() as u64,
            mime_type: mime_type.into(),
            payload: Some(payload),
        }
    }

    /// 读取本地文件，MIME 类型按扩展名推断
    pub async fn from_path(path: impl AsRef<Path>) -> crate::core::Result<Self> {
        let path = path.as_ref();
        let payload = Bytes::from(tokio::fs::read(path).await?);
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self::from_bytes(name, mime_type, payload))
    }
}

/// 上传事件
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// 记录已创建并加入本地列表
    Enqueued {
        id: RecordId,
        name: String,
    },
    /// 状态变更
    StateChanged {
        id: RecordId,
        from: UploadStatus,
        to: UploadStatus,
    },
    /// 进度更新（已持久化）
    Progress {
        id: RecordId,
        progress: u8,
    },
    /// 上传完成
    Completed {
        id: RecordId,
        url: String,
    },
    /// 上传失败
    Failed {
        id: RecordId,
        error: String,
    },
    Removed {
        id: RecordId,
    },
    Cleared,
    /// 一批上传处理结束
    BatchFinished {
        completed: usize,
        failed: usize,
        cancelled: usize,
    },
}

/// 列表汇总
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadSummary {
    pub total: usize,
    pub pending: usize,
    pub uploading: usize,
    pub completed: usize,
    pub failed: usize,
    pub total_bytes: u64,
    pub completed_bytes: u64,
}

impl UploadSummary {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a UploadRecord>) -> Self {
        records.into_iter().fold(Self::default(), |mut summary, record| {
            summary.total += 1;
            summary.total_bytes += record.size;
            match record.status {
                UploadStatus::Pending => summary.pending += 1,
                UploadStatus::Uploading => summary.uploading += 1,
                UploadStatus::Completed => {
                    summary.completed += 1;
                    summary.completed_bytes += record.size;
                }
                UploadStatus::Error => summary.failed += 1,
            }
            summary
        })
    }
}
