//! 集群访问模块
//!
//! 该模块定义了对本地集群发起 apply/delete/命名空间操作的客户端接口，
//! 以及按用户身份构造模拟（impersonation）客户端的工厂接口。
//! 生产实现基于 kube-rs，测试中使用 mockall 生成的模拟对象替代。

mod kube_client;

pub use kube_client::{infer_config, KubeClientFactory, KubeClusterClient};

use async_trait::async_trait;
use leafhub_common::Resource;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

/// 以某个身份访问集群的执行上下文
pub type ExecutionContext = Arc<dyn ClusterClient>;

/// 集群客户端接口
///
/// 返回原始的 Kubernetes API 错误，由调用方按状态码分类。
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// 以 server-side apply 方式强制应用资源
    async fn apply(&self, resource: &Resource, field_manager: &str) -> kube::Result<()>;

    /// 删除资源
    async fn delete(&self, resource: &Resource) -> kube::Result<()>;

    /// 查询命名空间
    async fn get_namespace(&self, name: &str) -> kube::Result<()>;

    /// 创建命名空间
    async fn create_namespace(&self, name: &str) -> kube::Result<()>;
}

/// 执行上下文工厂接口
#[cfg_attr(test, automock)]
pub trait ClientFactory: Send + Sync {
    /// 控制器自身身份的客户端
    fn controller_client(&self) -> kube::Result<ExecutionContext>;

    /// 模拟指定用户的客户端，只设置用户名，不模拟组和附加属性
    fn impersonating_client(&self, user: &str) -> kube::Result<ExecutionContext>;
}
