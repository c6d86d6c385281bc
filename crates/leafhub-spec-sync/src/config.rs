//! 配置管理模块
//!
//! 该模块负责加载 spec-sync 的配置，支持 YAML/JSON 配置文件，
//! 并允许通过 `LEAFHUB_` 前缀的环境变量覆盖。

use anyhow::{anyhow, Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::sync::DEFAULT_FIELD_MANAGER;

/// 环境变量前缀
const ENV_PREFIX: &str = "LEAFHUB";

/// spec-sync 配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// 日志级别，RUST_LOG 优先
    pub log_level: String,
    /// 是否输出 JSON 格式日志
    pub log_json: bool,
    /// 资源包通道容量
    pub channel_capacity: usize,
    /// server-side apply 使用的 field manager
    pub field_manager: String,
    /// 使用 kubeconfig 中的指定 context，未设置时自动推断
    pub kube_context: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            channel_capacity: 100,
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            kube_context: None,
        }
    }
}

impl SyncConfig {
    /// 加载配置：默认值 < 配置文件 < 环境变量
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            let format = match path.extension().and_then(|ext| ext.to_str()) {
                Some("yaml") | Some("yml") => FileFormat::Yaml,
                Some("json") => FileFormat::Json,
                _ => return Err(anyhow!("不支持的配置文件格式，仅支持 YAML 或 JSON: {:?}", path)),
            };
            builder = builder.add_source(File::from(path).format(format));
        }

        let config = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("构建配置失败")?;

        let sync_config = config
            .try_deserialize::<SyncConfig>()
            .context("配置格式错误")?;
        sync_config.validate()?;

        Ok(sync_config)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(anyhow!("channel_capacity 必须大于 0"));
        }
        if self.field_manager.is_empty() {
            return Err(anyhow!("field_manager 不能为空"));
        }

        Ok(())
    }
}
