use std::cmp::Ordering;
use std::collections::HashMap;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use crate::core::types::{FieldSpec, Operator, SortType};
use crate::core::{
    DeleteParams,
    FetchParams,
    FetchResponse,
    FieldParams,
    GetResponse,
    MutationResponse,
    RecordId,
    RecordResult,
    RecordStore,
    RecordsParams,
    Result,
    WhereClause,
};

type Row = Map<String, Value>;

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    tables: HashMap<String, Vec<Row>>,
}

/// 内存记录存储 - 用于测试和本地开发
#[derive(Default)]
pub struct InMemoryRecordStore {
    state: Mutex<MemoryState>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回某个表中的全部记录（不做字段投影）
    pub async fn records(&self, record_type: &str) -> Vec<Value> {
        let state = self.state.lock().await;
        state.tables
            .get(record_type)
            .map(|rows| rows.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }

    pub async fn len(&self, record_type: &str) -> usize {
        let state = self.state.lock().await;
        state.tables.get(record_type).map_or(0, Vec::len)
    }

    fn now() -> Value {
        Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    fn row_id(row: &Row) -> Option<RecordId> {
        row.get("Id").and_then(Value::as_i64).map(RecordId)
    }

    fn project(row: &Row, fields: &[FieldSpec]) -> Value {
        if fields.is_empty() {
            return Value::Object(row.clone());
        }

        let mut projected = Row::new();
        if let Some(id) = row.get("Id") {
            projected.insert("Id".to_string(), id.clone());
        }
        for spec in fields {
            if let Some(value) = row.get(&spec.field.name) {
                projected.insert(spec.field.name.clone(), value.clone());
            }
        }
        Value::Object(projected)
    }

    fn matches(row: &Row, clause: &WhereClause) -> bool {
        let field = match row.get(&clause.field_name) {
            Some(Value::Object(lookup)) => lookup.get("Id").unwrap_or(&Value::Null),
            Some(value) => value,
            None => &Value::Null,
        };

        clause.values.iter().any(|expected| match clause.operator {
            Operator::ExactMatch => field == expected,
            Operator::Contains => match (field.as_str(), expected.as_str()) {
                (Some(haystack), Some(needle)) => haystack.to_lowercase().contains(&needle.to_lowercase()),
                _ => false,
            },
        })
    }

    fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
        match (a, b) {
            (Some(Value::Number(x)), Some(Value::Number(y))) => {
                x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(Ordering::Equal)
            }
            (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
            (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
            (None | Some(Value::Null), _) => Ordering::Less,
            (_, None | Some(Value::Null)) => Ordering::Greater,
            (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
        }
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn fetch_records(&self, record_type: &str, params: &FetchParams) -> Result<FetchResponse> {
        let state = self.state.lock().await;
        let Some(rows) = state.tables.get(record_type) else {
            return Ok(FetchResponse { data: Some(Vec::new()) });
        };

        let mut selected: Vec<&Row> = rows
            .iter()
            .filter(|row| params.where_.iter().all(|clause| Self::matches(row, clause)))
            .collect();

        // 相同排序值时按 Id 同方向排序，保证结果稳定
        selected.sort_by(|a, b| {
            for order in &params.order_by {
                let ordering = Self::compare(a.get(&order.field_name), b.get(&order.field_name))
                    .then_with(|| Self::compare(a.get("Id"), b.get("Id")));
                let ordering = match order.sorttype {
                    SortType::Asc => ordering,
                    SortType::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        let paging = params.paging_info.unwrap_or_default();
        let data = selected
            .into_iter()
            .skip(paging.offset as usize)
            .take(paging.limit as usize)
            .map(|row| Self::project(row, &params.fields))
            .collect();

        Ok(FetchResponse { data: Some(data) })
    }

    async fn get_record_by_id(&self, record_type: &str, id: RecordId, params: &FieldParams) -> Result<GetResponse> {
        let state = self.state.lock().await;
        let data = state.tables
            .get(record_type)
            .and_then(|rows| rows.iter().find(|row| Self::row_id(row) == Some(id)))
            .map(|row| Self::project(row, &params.fields));

        Ok(GetResponse { data })
    }

    async fn create_record(&self, record_type: &str, params: &RecordsParams) -> Result<MutationResponse> {
        let mut state = self.state.lock().await;
        let mut results = Vec::with_capacity(params.records.len());

        for record in &params.records {
            let Some(fields) = record.as_object() else {
                results.push(RecordResult::failed("Record must be an object"));
                continue;
            };

            state.next_id += 1;
            let mut row = fields.clone();
            row.insert("Id".to_string(), Value::from(state.next_id));
            row.insert("CreatedOn".to_string(), Self::now());
            row.insert("ModifiedOn".to_string(), Self::now());

            results.push(RecordResult::ok(Value::Object(row.clone())));
            state.tables.entry(record_type.to_string()).or_default().push(row);
        }

        Ok(MutationResponse::with_results(results))
    }

    async fn update_record(&self, record_type: &str, params: &RecordsParams) -> Result<MutationResponse> {
        let mut state = self.state.lock().await;
        let rows = state.tables.entry(record_type.to_string()).or_default();
        let mut results = Vec::with_capacity(params.records.len());

        for record in &params.records {
            let Some(fields) = record.as_object() else {
                results.push(RecordResult::failed("Record must be an object"));
                continue;
            };
            let Some(id) = fields.get("Id").and_then(Value::as_i64).map(RecordId) else {
                results.push(RecordResult::failed("Record Id is required"));
                continue;
            };

            match rows.iter_mut().find(|row| Self::row_id(row) == Some(id)) {
                Some(row) => {
                    for (key, value) in fields {
                        if key != "Id" {
                            row.insert(key.clone(), value.clone());
                        }
                    }
                    row.insert("ModifiedOn".to_string(), Self::now());
                    results.push(RecordResult::ok(Value::Object(row.clone())));
                }
                None => results.push(RecordResult::failed(format!("Record with Id {} not found", id))),
            }
        }

        Ok(MutationResponse::with_results(results))
    }

    async fn delete_record(&self, record_type: &str, params: &DeleteParams) -> Result<MutationResponse> {
        let mut state = self.state.lock().await;
        let rows = state.tables.entry(record_type.to_string()).or_default();

        let results = params.record_ids
            .iter()
            .map(|id| match rows.iter().position(|row| Self::row_id(row) == Some(*id)) {
                Some(index) => {
                    rows.remove(index);
                    RecordResult { success: true, ..Default::default() }
                }
                None => RecordResult::failed(format!("Record with Id {} not found", id)),
            })
            .collect();

        Ok(MutationResponse::with_results(results))
    }
}
