use std::str::FromStr;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize, Serializer};
use crate::core::types::{date_only, null_as_default, timestamp};
use crate::core::{DropzoneError, Lookup, RecordId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub enum TaskStatus {
    #[default]
    New,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    #[serde(rename = "On Hold")]
    OnHold,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::New,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::OnHold,
        TaskStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::New => "New",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Completed => "Completed",
            TaskStatus::OnHold => "On Hold",
            TaskStatus::Cancelled => "Cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }
}

macro_rules! label_enum {
    ($ty:ident, $kind:literal) => {
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.pad(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = DropzoneError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let value = value.trim();
                $ty::ALL
                    .into_iter()
                    .find(|candidate| candidate.as_str().eq_ignore_ascii_case(value))
                    .ok_or_else(|| DropzoneError::Config(format!("Unknown {} {:?}", $kind, value)))
            }
        }
    };
}

label_enum!(TaskStatus, "status");
label_enum!(Priority, "priority");

/// 任务记录（`task_c`）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(rename = "Id")]
    pub id: RecordId,
    #[serde(rename = "Name", default, deserialize_with = "null_as_default")]
    pub name: String,
    /// 自由文本标签
    #[serde(rename = "Tags", default, deserialize_with = "null_as_default")]
    pub tags: String,
    #[serde(rename = "description_c", default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(rename = "status_c", default, deserialize_with = "null_as_default")]
    pub status: TaskStatus,
    #[serde(rename = "priority_c", default, deserialize_with = "null_as_default")]
    pub priority: Priority,
    #[serde(rename = "due_date_c", default, with = "date_only")]
    pub due_date: Option<NaiveDate>,
    #[serde(rename = "assigned_to_c", default)]
    pub assigned_to: Option<Lookup>,
    #[serde(rename = "upload_c", default)]
    pub upload: Option<Lookup>,
    #[serde(rename = "upload_session_c", default)]
    pub upload_session: Option<Lookup>,
    #[serde(rename = "CreatedOn", default, with = "timestamp")]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(rename = "ModifiedOn", default, with = "timestamp")]
    pub modified_on: Option<DateTime<Utc>>,
    #[serde(rename = "CreatedBy", default)]
    pub created_by: Option<Lookup>,
    #[serde(rename = "ModifiedBy", default)]
    pub modified_by: Option<Lookup>,
}

fn merge_lookup(current: &mut Option<Lookup>, patch: Option<RecordId>) {
    match patch {
        Some(id) if current.as_ref().is_some_and(|lookup| lookup.id == id) => {}
        Some(id) => *current = Some(Lookup::new(id)),
        None => *current = None,
    }
}

impl TaskRecord {
    /// 把已经持久化的部分字段合并到本地副本，未设置的字段保持不变
    pub fn apply(&mut self, patch: &TaskPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(tags) = &patch.tags {
            self.tags = tags.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(assigned_to) = patch.assigned_to {
            merge_lookup(&mut self.assigned_to, assigned_to);
        }
        if let Some(upload) = patch.upload {
            merge_lookup(&mut self.upload, upload);
        }
        if let Some(upload_session) = patch.upload_session {
            merge_lookup(&mut self.upload_session, upload_session);
        }
    }
}

/// 新建任务的表单；状态和优先级缺省为 New / Medium
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTask {
    pub name: String,
    pub tags: String,
    pub description: String,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub due_date: Option<NaiveDate>,
    pub assigned_to: Option<RecordId>,
    pub upload: Option<RecordId>,
    pub upload_session: Option<RecordId>,
}

impl NewTask {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn assigned_to(mut self, id: RecordId) -> Self {
        self.assigned_to = Some(id);
        self
    }

    pub fn upload(mut self, id: RecordId) -> Self {
        self.upload = Some(id);
        self
    }

    pub(crate) fn fields(&self) -> CreateTaskFields<'_> {
        CreateTaskFields {
            name: &self.name,
            tags: &self.tags,
            description: &self.description,
            status: self.status.unwrap_or_default(),
            priority: self.priority.unwrap_or_default(),
            due_date: self.due_date,
            assigned_to: self.assigned_to,
            upload: self.upload,
            upload_session: self.upload_session,
        }
    }
}

/// 创建时真正发送的字段
#[derive(Debug, Serialize)]
pub(crate) struct CreateTaskFields<'a> {
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "Tags")]
    tags: &'a str,
    #[serde(rename = "description_c")]
    description: &'a str,
    #[serde(rename = "status_c")]
    status: TaskStatus,
    #[serde(rename = "priority_c")]
    priority: Priority,
    #[serde(rename = "due_date_c", skip_serializing_if = "Option::is_none", with = "date_only")]
    due_date: Option<NaiveDate>,
    #[serde(rename = "assigned_to_c", skip_serializing_if = "Option::is_none")]
    assigned_to: Option<RecordId>,
    #[serde(rename = "upload_c", skip_serializing_if = "Option::is_none")]
    upload: Option<RecordId>,
    #[serde(rename = "upload_session_c", skip_serializing_if = "Option::is_none")]
    upload_session: Option<RecordId>,
}

/// 部分更新
///
/// 外层 `None` 表示不修改；引用和日期字段的 `Some(None)` 会写入 `null` 清空。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskPatch {
    #[serde(rename = "Name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "Tags", skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(rename = "description_c", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "status_c", skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(rename = "priority_c", skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(rename = "due_date_c", skip_serializing_if = "Option::is_none", serialize_with = "serialize_patch_date")]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(rename = "assigned_to_c", skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Option<RecordId>>,
    #[serde(rename = "upload_c", skip_serializing_if = "Option::is_none")]
    pub upload: Option<Option<RecordId>>,
    #[serde(rename = "upload_session_c", skip_serializing_if = "Option::is_none")]
    pub upload_session: Option<Option<RecordId>>,
}

fn serialize_patch_date<S>(date: &Option<Option<NaiveDate>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    date_only::serialize(&date.flatten(), serializer)
}

impl TaskPatch {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = Some(tags.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn due_date(mut self, due_date: Option<NaiveDate>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn assigned_to(mut self, id: Option<RecordId>) -> Self {
        self.assigned_to = Some(id);
        self
    }

    pub fn upload(mut self, id: Option<RecordId>) -> Self {
        self.upload = Some(id);
        self
    }

    pub fn upload_session(mut self, id: Option<RecordId>) -> Self {
        self.upload_session = Some(id);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// 过滤条件中的一项：全部，或者精确匹配
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection<T> {
    #[default]
    All,
    Only(T),
}

impl<T: PartialEq> Selection<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(expected) => expected == value,
        }
    }
}

impl<T: FromStr> FromStr for Selection<T> {
    type Err = T::Err;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().eq_ignore_ascii_case("all") {
            Ok(Selection::All)
        } else {
            value.parse().map(Selection::Only)
        }
    }
}

/// 本地列表过滤
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub status: Selection<TaskStatus>,
    pub priority: Selection<Priority>,
    pub search: String,
}

impl TaskFilter {
    pub fn new(status: Selection<TaskStatus>, priority: Selection<Priority>, search: impl Into<String>) -> Self {
        Self {
            status,
            priority,
            search: search.into(),
        }
    }

    /// 名称、描述或标签中任意一个包含搜索词（不区分大小写）即匹配
    pub fn matches(&self, task: &TaskRecord) -> bool {
        if !self.status.matches(&task.status) || !self.priority.matches(&task.priority) {
            return false;
        }

        if self.search.is_empty() {
            return true;
        }

        let needle = self.search.to_lowercase();
        [&task.name, &task.description, &task.tags]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(id: i64, name: &str, status: TaskStatus, priority: Priority) -> TaskRecord {
        let mut task: TaskRecord = serde_json::from_value(json!({"Id": id, "Name": name})).unwrap();
        task.status = status;
        task.priority = priority;
        task
    }

    #[test]
    fn test_labels_round_trip_through_store_strings() {
        assert_eq!(serde_json::to_value(TaskStatus::InProgress).unwrap(), json!("In Progress"));
        assert_eq!("on hold".parse::<TaskStatus>().unwrap(), TaskStatus::OnHold);
        assert_eq!("Low".parse::<Priority>().unwrap(), Priority::Low);
        assert!("Urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_record_from_store_row() {
        let task: TaskRecord = serde_json::from_value(json!({
            "Id": 3,
            "Name": "Ship it",
            "Tags": "release,ops",
            "description_c": null,
            "status_c": "On Hold",
            "priority_c": "High",
            "due_date_c": "2024-06-30T00:00:00.000Z",
            "assigned_to_c": {"Id": 8, "Name": "Grace"},
            "upload_c": null,
            "CreatedOn": "2024-06-01T12:00:00Z"
        })).unwrap();

        assert_eq!(task.status, TaskStatus::OnHold);
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.description, "");
        assert_eq!(task.due_date, NaiveDate::from_ymd_opt(2024, 6, 30));
        assert_eq!(task.assigned_to.unwrap().name.as_deref(), Some("Grace"));
        assert!(task.upload.is_none());
    }

    #[test]
    fn test_create_fields_apply_defaults() {
        let value = serde_json::to_value(NewTask::named("Write docs").fields()).unwrap();
        assert_eq!(value, json!({
            "Name": "Write docs",
            "Tags": "",
            "description_c": "",
            "status_c": "New",
            "priority_c": "Medium"
        }));
    }

    #[test]
    fn test_patch_serializes_only_present_fields() {
        let patch = TaskPatch::default()
            .status(TaskStatus::Completed)
            .assigned_to(None)
            .due_date(NaiveDate::from_ymd_opt(2024, 1, 2));

        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value, json!({
            "status_c": "Completed",
            "due_date_c": "2024-01-02",
            "assigned_to_c": null
        }));
        assert!(TaskPatch::default().is_empty());
    }

    #[test]
    fn test_apply_leaves_other_fields() {
        let mut record = task(1, "Review", TaskStatus::New, Priority::High);
        record.tags = "qa".to_string();
        record.assigned_to = Some(Lookup { id: RecordId(4), name: Some("Lin".to_string()) });
        let before = record.clone();

        record.apply(&TaskPatch::default().status(TaskStatus::Completed).assigned_to(Some(RecordId(4))));

        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(record.assigned_to, before.assigned_to);
        assert_eq!(TaskRecord { status: before.status, ..record.clone() }, before);

        record.apply(&TaskPatch::default().upload(Some(RecordId(9))).assigned_to(None));
        assert_eq!(record.upload, Some(Lookup::new(RecordId(9))));
        assert!(record.assigned_to.is_none());
    }

    #[test]
    fn test_filter_matches() {
        let mut record = task(1, "Quarterly Report", TaskStatus::InProgress, Priority::High);
        record.description = "numbers for finance".to_string();
        record.tags = "Urgent".to_string();

        assert!(TaskFilter::default().matches(&record));
        assert!(TaskFilter::new(Selection::Only(TaskStatus::InProgress), Selection::All, "").matches(&record));
        assert!(!TaskFilter::new(Selection::Only(TaskStatus::New), Selection::All, "").matches(&record));
        assert!(!TaskFilter::new(Selection::All, Selection::Only(Priority::Low), "").matches(&record));
        assert!(TaskFilter::new(Selection::All, Selection::All, "REPORT").matches(&record));
        assert!(TaskFilter::new(Selection::All, Selection::All, "Finance").matches(&record));
        assert!(TaskFilter::new(Selection::All, Selection::All, "urgent").matches(&record));
        assert!(!TaskFilter::new(Selection::All, Selection::All, "payroll").matches(&record));
    }

    #[test]
    fn test_selection_parse() {
        assert_eq!("All".parse::<Selection<Priority>>().unwrap(), Selection::All);
        assert_eq!(
            "Completed".parse::<Selection<TaskStatus>>().unwrap(),
            Selection::Only(TaskStatus::Completed)
        );
    }
}
