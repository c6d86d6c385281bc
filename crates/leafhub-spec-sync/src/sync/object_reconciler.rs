//! 单对象协调
//!
//! 对单个对象执行 server-side apply 或删除，所有集群调用都通过调用方给出的执行上下文发出。

use leafhub_common::{
    error::{is_already_exists, is_not_found},
    Error, Resource, Result, SyncObject, TARGET_NAMESPACE_ANNOTATION,
};
use tracing::{debug, info};

use crate::cluster::ClusterClient;

/// 默认的 field manager
pub const DEFAULT_FIELD_MANAGER: &str = "leaf-hub-spec-sync";

const NAMESPACE_KIND: &str = "Namespace";

/// 对象协调器
#[derive(Debug, Clone)]
pub struct ObjectReconciler {
    /// server-side apply 使用的 field manager
    field_manager: String,
}

impl Default for ObjectReconciler {
    fn default() -> Self {
        Self::new(DEFAULT_FIELD_MANAGER)
    }
}

impl ObjectReconciler {
    /// 创建新的对象协调器
    pub fn new(field_manager: &str) -> Self {
        Self {
            field_manager: field_manager.to_string(),
        }
    }

    /// field manager 名称
    pub fn field_manager(&self) -> &str {
        &self.field_manager
    }

    /// 强制应用对象的期望状态
    ///
    /// 应用前确保目标命名空间存在。重复应用同一对象结果相同。
    pub async fn apply(&self, client: &dyn ClusterClient, resource: &Resource) -> Result<()> {
        validate(resource)?;

        if let Some(namespace) = target_namespace(resource) {
            ensure_namespace(client, namespace).await?;
        }

        client
            .apply(resource, &self.field_manager)
            .await
            .map_err(Error::Apply)
    }

    /// 删除对象，返回是否真正删除
    ///
    /// 对象不存在时返回 `Ok(false)`。
    pub async fn delete(&self, client: &dyn ClusterClient, resource: &Resource) -> Result<bool> {
        validate(resource)?;

        match client.delete(resource).await {
            Ok(()) => Ok(true),
            Err(e) if is_not_found(&e) => {
                debug!(kind = resource.kind(), name = resource.name(), "对象不存在，无需删除");
                Ok(false)
            }
            Err(e) => Err(Error::Delete(e)),
        }
    }
}

/// 确保命名空间存在
///
/// 只有确认返回 404 时才创建；其他查询错误直接返回，不视为命名空间缺失。
/// 创建时遇到 409 说明已被并发创建，视为成功。
pub async fn ensure_namespace(client: &dyn ClusterClient, namespace: &str) -> Result<()> {
    match client.get_namespace(namespace).await {
        Ok(()) => Ok(()),
        Err(e) if is_not_found(&e) => match client.create_namespace(namespace).await {
            Ok(()) => {
                info!(namespace = namespace, "已创建目标命名空间");
                Ok(())
            }
            Err(e) if is_already_exists(&e) => Ok(()),
            Err(source) => Err(Error::NamespaceEnsure {
                namespace: namespace.to_string(),
                source,
            }),
        },
        Err(source) => Err(Error::NamespaceEnsure {
            namespace: namespace.to_string(),
            source,
        }),
    }
}

/// 对象落地前需要存在的命名空间
///
/// 目标命名空间注解优先；否则为对象自身的命名空间。Namespace 对象本身由 apply 创建。
fn target_namespace(resource: &Resource) -> Option<&str> {
    if let Some(namespace) = resource
        .annotation(TARGET_NAMESPACE_ANNOTATION)
        .filter(|namespace| !namespace.is_empty())
    {
        return Some(namespace);
    }

    if resource.kind() == NAMESPACE_KIND {
        return None;
    }

    resource.namespace()
}

fn validate(resource: &Resource) -> Result<()> {
    let missing = [
        ("apiVersion", resource.api_version()),
        ("kind", resource.kind()),
        ("metadata.name", resource.name()),
    ]
    .into_iter()
    .find(|(_, value)| value.is_empty());

    match missing {
        Some((field, _)) => Err(Error::InvalidResource(format!("缺少字段 {field}"))),
        None => Ok(()),
    }
}
