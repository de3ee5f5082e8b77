use std::time::Duration;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use super::errors::{DropzoneError, Result};

/// 记录唯一标识（由远程存储分配）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// 对其他记录的引用，读取时为 `{Id, Name}`，写入时只发送 Id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lookup {
    #[serde(rename = "Id")]
    pub id: RecordId,
    #[serde(rename = "Name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Lookup {
    pub fn new(id: RecordId) -> Self {
        Self { id, name: None }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LookupRepr {
    Bare(RecordId),
    Object {
        #[serde(rename = "Id")]
        id: RecordId,
        #[serde(rename = "Name", default)]
        name: Option<String>,
    },
}

impl<'de> Deserialize<'de> for Lookup {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match LookupRepr::deserialize(deserializer)? {
            LookupRepr::Bare(id) => Lookup::new(id),
            LookupRepr::Object { id, name } => Lookup { id, name },
        })
    }
}

/// 字段白名单中的一项：`{"field": {"Name": "..."}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub field: FieldName,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldName {
    #[serde(rename = "Name")]
    pub name: String,
}

impl FieldSpec {
    pub fn new(name: &str) -> Self {
        Self {
            field: FieldName { name: name.to_string() },
        }
    }

    pub fn list(names: &[&str]) -> Vec<Self> {
        names.iter().map(|name| Self::new(name)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    ExactMatch,
    Contains,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WhereClause {
    pub field_name: String,
    pub operator: Operator,
    pub values: Vec<Value>,
}

impl WhereClause {
    pub fn exact(field_name: &str, value: impl Into<Value>) -> Self {
        Self {
            field_name: field_name.to_string(),
            operator: Operator::ExactMatch,
            values: vec![value.into()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortType {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    #[serde(rename = "fieldName")]
    pub field_name: String,
    pub sorttype: SortType,
}

impl OrderBy {
    pub fn desc(field_name: &str) -> Self {
        Self {
            field_name: field_name.to_string(),
            sorttype: SortType::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingInfo {
    pub limit: u32,
    pub offset: u32,
}

impl Default for PagingInfo {
    fn default() -> Self {
        Self { limit: 100, offset: 0 }
    }
}

/// `fetchRecords` 的查询参数
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchParams {
    pub fields: Vec<FieldSpec>,
    #[serde(rename = "where", default, skip_serializing_if = "Vec::is_empty")]
    pub where_: Vec<WhereClause>,
    #[serde(rename = "orderBy", default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderBy>,
    #[serde(rename = "pagingInfo", default, skip_serializing_if = "Option::is_none")]
    pub paging_info: Option<PagingInfo>,
}

/// `getRecordById` 的参数
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldParams {
    pub fields: Vec<FieldSpec>,
}

/// `createRecord` / `updateRecord` 的参数，每一项都是要写入的字段集合
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordsParams {
    pub records: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteParams {
    #[serde(rename = "RecordIds")]
    pub record_ids: Vec<RecordId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchResponse {
    #[serde(default)]
    pub data: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetResponse {
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    #[serde(rename = "fieldLabel")]
    pub field_label: String,
    pub message: String,
}

/// 单条记录的写入结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RecordResult {
    pub fn ok(data: Value) -> Self {
        Self { success: true, data: Some(data), ..Default::default() }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { success: false, message: Some(message.into()), ..Default::default() }
    }

    fn into_error(self) -> DropzoneError {
        if let Some(error) = self.errors.and_then(|errors| errors.into_iter().next()) {
            return DropzoneError::store(format!("{}: {}", error.field_label, error.message));
        }
        DropzoneError::store(self.message.unwrap_or_else(|| "Record operation failed".to_string()))
    }
}

/// create/update/delete 的统一响应
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<RecordResult>>,
}

impl MutationResponse {
    pub fn with_results(results: Vec<RecordResult>) -> Self {
        Self { success: true, message: None, results: Some(results) }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { success: false, message: Some(message.into()), results: None }
    }

    fn check(self) -> Result<Vec<RecordResult>> {
        if !self.success {
            let message = self.message.unwrap_or_else(|| "Store request failed".to_string());
            return Err(DropzoneError::store(message));
        }

        let results = self.results.unwrap_or_default();
        if let Some(failed) = results.iter().position(|r| !r.success) {
            let failed_count = results.iter().filter(|r| !r.success).count();
            tracing::warn!("{} record(s) rejected by store", failed_count);
            return Err(results[failed].clone().into_error());
        }

        Ok(results)
    }

    /// 返回第一条成功记录的数据；任何一条失败都会变成错误
    pub fn into_first(self) -> Result<Option<Value>> {
        Ok(self.check()?.into_iter().find_map(|r| r.data))
    }

    /// 删除是否至少成功了一条；没有 results 时以顶层 success 为准
    pub fn into_deleted(self) -> Result<bool> {
        let has_results = self.results.is_some();
        let results = self.check()?;
        Ok(!has_results || results.iter().any(|r| r.success))
    }
}

/// 只保存日期部分，兼容存储返回的日期时间
pub mod date_only {
    use super::*;

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S>(date: &Option<NaiveDate>, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(date) => serializer.serialize_str(&date.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => {
                let day = value.split('T').next().unwrap_or(value);
                NaiveDate::parse_from_str(day, FORMAT)
                    .map(Some)
                    .map_err(serde::de::Error::custom)
            }
        }
    }
}

/// RFC 3339 时间戳；没有时区的值按 UTC 处理
pub mod timestamp {
    use super::*;

    pub fn serialize<S>(time: &Option<DateTime<Utc>>, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match time {
            Some(time) => serializer.serialize_str(&time.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => parse(value).map(Some).map_err(serde::de::Error::custom),
        }
    }

    pub fn parse(value: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
        match DateTime::parse_from_rfc3339(value) {
            Ok(time) => Ok(time.with_timezone(&Utc)),
            Err(err) => NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| naive.and_utc())
                .map_err(|_| err),
        }
    }
}

/// 存储可能对空字段返回 `null`
pub fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// 序列化部分更新，并带上记录 Id
pub(crate) fn patch_record<T: Serialize>(id: RecordId, patch: &T) -> Result<Value> {
    let mut value = serde_json::to_value(patch)?;
    match value.as_object_mut() {
        Some(fields) => {
            fields.insert("Id".to_string(), Value::from(id.0));
            Ok(value)
        }
        None => Err(DropzoneError::internal("patch must serialize to an object")),
    }
}

// 用于序列化 Duration
pub(crate) fn serialize_millis<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

pub(crate) fn deserialize_millis<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fetch_params_wire_shape() {
        let params = FetchParams {
            fields: FieldSpec::list(&["Name", "status_c"]),
            where_: vec![WhereClause::exact("status_c", "New")],
            order_by: vec![OrderBy::desc("CreatedOn")],
            paging_info: Some(PagingInfo::default()),
        };

        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value, json!({
            "fields": [{"field": {"Name": "Name"}}, {"field": {"Name": "status_c"}}],
            "where": [{"FieldName": "status_c", "Operator": "ExactMatch", "Values": ["New"]}],
            "orderBy": [{"fieldName": "CreatedOn", "sorttype": "DESC"}],
            "pagingInfo": {"limit": 100, "offset": 0}
        }));
    }

    #[test]
    fn test_lookup_accepts_bare_id_and_object() {
        let bare: Lookup = serde_json::from_value(json!(4)).unwrap();
        assert_eq!(bare, Lookup::new(RecordId(4)));

        let object: Lookup = serde_json::from_value(json!({"Id": 5, "Name": "Ada"})).unwrap();
        assert_eq!(object.id, RecordId(5));
        assert_eq!(object.name.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_mutation_response_unpacking() {
        let response = MutationResponse::with_results(vec![RecordResult::ok(json!({"Id": 1}))]);
        assert_eq!(response.into_first().unwrap(), Some(json!({"Id": 1})));

        let response = MutationResponse::failed("quota exceeded");
        assert_eq!(response.into_first().unwrap_err().to_string(), "quota exceeded");

        let response = MutationResponse::with_results(vec![RecordResult {
            success: false,
            errors: Some(vec![FieldError {
                field_label: "Name".to_string(),
                message: "is required".to_string(),
            }]),
            ..Default::default()
        }]);
        assert_eq!(response.into_first().unwrap_err().to_string(), "Name: is required");
    }

    #[test]
    fn test_delete_unpacking() {
        assert!(MutationResponse { success: true, message: None, results: None }
            .into_deleted()
            .unwrap());
        assert!(!MutationResponse::with_results(vec![]).into_deleted().unwrap());
        assert!(MutationResponse::with_results(vec![RecordResult::failed("locked")])
            .into_deleted()
            .is_err());
    }

    #[test]
    fn test_lenient_dates() {
        #[derive(Deserialize)]
        struct Probe {
            #[serde(default, with = "date_only")]
            due: Option<NaiveDate>,
            #[serde(default, with = "timestamp")]
            at: Option<DateTime<Utc>>,
        }

        let probe: Probe = serde_json::from_value(json!({
            "due": "2024-03-09T00:00:00",
            "at": "2024-03-09T10:11:12"
        })).unwrap();
        assert_eq!(probe.due, NaiveDate::from_ymd_opt(2024, 3, 9));
        assert_eq!(probe.at.unwrap().to_rfc3339(), "2024-03-09T10:11:12+00:00");

        let empty: Probe = serde_json::from_value(json!({"due": ""})).unwrap();
        assert!(empty.due.is_none());
        assert!(empty.at.is_none());
    }
}
