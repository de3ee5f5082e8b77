use async_trait::async_trait;
use super::types::{
    DeleteParams,
    FetchParams,
    FetchResponse,
    FieldParams,
    GetResponse,
    MutationResponse,
    RecordId,
    RecordsParams,
};
use super::errors::Result;

/// 远程记录存储 trait - 所有存储实现都必须实现此接口
///
/// 每个方法都是一次单独的请求，不做自动重试；`record_type` 是存储里的表名，
/// 比如 `task_c`、`upload_c`。
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// 按条件查询记录
    async fn fetch_records(&self, record_type: &str, params: &FetchParams) -> Result<FetchResponse>;

    /// 按 Id 获取单条记录，不存在时 `data` 为空
    async fn get_record_by_id(&self, record_type: &str, id: RecordId, params: &FieldParams) -> Result<GetResponse>;

    /// 创建记录
    async fn create_record(&self, record_type: &str, params: &RecordsParams) -> Result<MutationResponse>;

    /// 部分更新记录，每条记录必须带 `Id`
    async fn update_record(&self, record_type: &str, params: &RecordsParams) -> Result<MutationResponse>;

    /// 删除记录
    async fn delete_record(&self, record_type: &str, params: &DeleteParams) -> Result<MutationResponse>;
}

/// 定时任务原语，进度模拟每一步之前等待一次
#[async_trait]
pub trait Ticker: Send + Sync {
    async fn tick(&self);
}
