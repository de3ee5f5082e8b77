use std::path::Path;
use std::time::Duration;
use serde::Deserialize;
use crate::core::types::{deserialize_millis, serialize_millis};
use crate::core::{DropzoneError, Result};

pub const ENV_PROJECT_ID: &str = "APPER_PROJECT_ID";
pub const ENV_PUBLIC_KEY: &str = "APPER_PUBLIC_KEY";
pub const ENV_ENDPOINT: &str = "DROPZONE_ENDPOINT";

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub upload: UploadConfig,
}

/// 远程存储连接配置
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub endpoint: String,
    pub project_id: String,
    pub public_key: String,
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            project_id: String::new(),
            public_key: String::new(),
            timeout_secs: 30,
        }
    }
}

/// 上传模拟配置
#[derive(Deserialize, Debug, Clone, PartialEq, serde::Serialize)]
#[serde(default)]
pub struct UploadConfig {
    /// 每一步增加的百分比
    pub step_percent: u8,
    /// 每一步之间的等待时间
    #[serde(
        rename = "step_interval_ms",
        serialize_with = "serialize_millis",
        deserialize_with = "deserialize_millis"
    )]
    pub step_interval: Duration,
    /// 每批上传是否创建 upload session
    pub track_sessions: bool,
    /// 列表查询的分页大小
    pub page_size: u32,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            step_percent: 10,
            step_interval: Duration::from_millis(150),
            track_sessions: true,
            page_size: 100,
        }
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Config> {
        let config: Config = toml::from_str(content)
            .map_err(|err| DropzoneError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 读取配置文件并应用环境变量覆盖
    pub fn load(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::from_toml(&std::fs::read_to_string(path)?)?
        } else {
            tracing::debug!("{} not found, using defaults", path.display());
            Config::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(project_id) = lookup(ENV_PROJECT_ID) {
            self.store.project_id = project_id;
        }
        if let Some(public_key) = lookup(ENV_PUBLIC_KEY) {
            self.store.public_key = public_key;
        }
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            self.store.endpoint = endpoint;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let step = self.upload.step_percent;
        if step == 0 || 100 % step != 0 {
            return Err(DropzoneError::Config(format!(
                "upload.step_percent must divide 100, got {}",
                step
            )));
        }
        if self.upload.page_size == 0 {
            return Err(DropzoneError::Config("upload.page_size must be positive".to_string()));
        }
        Ok(())
    }
}
