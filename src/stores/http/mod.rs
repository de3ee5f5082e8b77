use std::time::Duration;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use url::Url;
use crate::config::StoreConfig;
use crate::core::{
    DeleteParams,
    DropzoneError,
    FetchParams,
    FetchResponse,
    FieldParams,
    GetResponse,
    MutationResponse,
    RecordId,
    RecordStore,
    RecordsParams,
    Result,
};

/// HTTP 记录存储客户端
#[derive(Debug, Clone)]
pub struct HttpRecordStore {
    client: Client,
    endpoint: Url,
    headers: HeaderMap,
}

impl HttpRecordStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|err| DropzoneError::Config(format!("Invalid endpoint {:?}: {}", config.endpoint, err)))?;
        if endpoint.cannot_be_a_base() {
            return Err(DropzoneError::Config(format!("Invalid endpoint {:?}", config.endpoint)));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            headers: Self::create_headers(&config.project_id, &config.public_key)?,
        })
    }

    fn create_headers(project_id: &str, public_key: &str) -> Result<HeaderMap> {
        if project_id.trim().is_empty() || public_key.trim().is_empty() {
            return Err(DropzoneError::Config(
                "store.project_id and store.public_key are required".to_string(),
            ));
        }

        let header_value = |value: &str| {
            HeaderValue::from_str(value)
                .map_err(|err| DropzoneError::Config(format!("Invalid credential header: {}", err)))
        };

        let mut headers = HeaderMap::new();
        headers.insert("x-apper-project-id", header_value(project_id)?);
        headers.insert("x-apper-public-key", header_value(public_key)?);

        Ok(headers)
    }

    /// `<endpoint>/records/<record_type>[/<suffix>]`
    pub(crate) fn record_url(&self, record_type: &str, suffix: Option<&str>) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("records").push(record_type);
            if let Some(suffix) = suffix {
                segments.push(suffix);
            }
        }
        url
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .headers(self.headers.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DropzoneError::server_error(status.as_u16(), body));
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn fetch_records(&self, record_type: &str, params: &FetchParams) -> Result<FetchResponse> {
        let url = self.record_url(record_type, Some("fetch"));
        self.send(self.client.post(url).json(params)).await
    }

    async fn get_record_by_id(&self, record_type: &str, id: RecordId, params: &FieldParams) -> Result<GetResponse> {
        let url = self.record_url(record_type, Some(&id.to_string()));
        self.send(self.client.post(url).json(params)).await
    }

    async fn create_record(&self, record_type: &str, params: &RecordsParams) -> Result<MutationResponse> {
        let url = self.record_url(record_type, None);
        self.send(self.client.post(url).json(params)).await
    }

    async fn update_record(&self, record_type: &str, params: &RecordsParams) -> Result<MutationResponse> {
        let url = self.record_url(record_type, None);
        self.send(self.client.patch(url).json(params)).await
    }

    async fn delete_record(&self, record_type: &str, params: &DeleteParams) -> Result<MutationResponse> {
        let url = self.record_url(record_type, None);
        self.send(self.client.delete(url).json(params)).await
    }
}
