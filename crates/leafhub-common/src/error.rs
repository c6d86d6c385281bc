//! 错误处理模块
//!
//! 该模块提供 spec-sync 的统一错误类型。除启动阶段外，所有错误都只影响单个对象，
//! 由资源包消费者记录后继续处理下一个对象。

use std::io;
use thiserror::Error;

/// Kubernetes API 中表示资源不存在的状态码
const NOT_FOUND: u16 = 404;

/// Kubernetes API 中表示资源已存在的状态码
const CONFLICT: u16 = 409;

/// spec-sync 统一错误类型
#[derive(Error, Debug)]
pub enum Error {
    /// 用户身份注解不是合法的 base64
    #[error("用户身份注解解码失败: {0}")]
    IdentityDecode(String),

    /// 无法为指定用户创建模拟客户端，失败的用户不会被缓存
    #[error("无法为用户 {user:?} 创建 Kubernetes 客户端: {source}")]
    CredentialCreation {
        user: String,
        #[source]
        source: kube::Error,
    },

    /// 资源缺少 apiVersion、kind 或 name 等必要字段
    #[error("资源无效: {0}")]
    InvalidResource(String),

    /// 目标命名空间查询或创建失败
    #[error("确保命名空间 {namespace} 存在失败: {source}")]
    NamespaceEnsure {
        namespace: String,
        #[source]
        source: kube::Error,
    },

    /// server-side apply 失败
    #[error("应用资源失败: {0}")]
    Apply(#[source] kube::Error),

    /// 删除失败（资源不存在不属于此类）
    #[error("删除资源失败: {0}")]
    Delete(#[source] kube::Error),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// JSON 错误
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] io::Error),
}

/// spec-sync 结果类型别名
pub type Result<T> = std::result::Result<T, Error>;

/// 判断 Kubernetes API 错误是否为 404，依据状态码而非错误文本
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == NOT_FOUND)
}

/// 判断 Kubernetes API 错误是否为 409（资源已存在）
pub fn is_already_exists(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == CONFLICT)
}

/// 构造一个 API 状态错误，测试和模拟客户端使用
pub fn api_error(code: u16, reason: &str, message: &str) -> kube::Error {
    kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_string(),
        message: message.to_string(),
        reason: reason.to_string(),
        code,
    })
}
