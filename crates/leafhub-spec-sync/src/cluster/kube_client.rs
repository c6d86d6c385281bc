//! 基于 kube-rs 的集群客户端实现

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::{
    api::{Api, DeleteParams, DynamicObject, GroupVersionKind, Patch, PatchParams, PostParams},
    config::KubeConfigOptions,
    core::ObjectMeta,
    discovery::ApiResource,
    Client, Config,
};
use leafhub_common::{Resource, SyncObject};
use std::sync::Arc;
use tracing::debug;

use super::{ClientFactory, ClusterClient, ExecutionContext};

/// 加载基础连接配置
///
/// 指定 context 时从 kubeconfig 读取，否则优先使用集群内配置，失败再回退到 kubeconfig。
pub async fn infer_config(context: Option<&str>) -> anyhow::Result<Config> {
    let config = match context {
        Some(context) => {
            let options = KubeConfigOptions {
                context: Some(context.to_string()),
                ..Default::default()
            };
            Config::from_kubeconfig(&options).await?
        }
        None => Config::infer().await?,
    };

    Ok(config)
}

/// kube-rs 集群客户端
#[derive(Clone)]
pub struct KubeClusterClient {
    /// Kubernetes 客户端
    client: Client,
}

impl KubeClusterClient {
    /// 创建新的集群客户端
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// 按对象的 apiVersion/kind 构造动态 API，设置了命名空间时使用命名空间级 API
    fn api_for(&self, resource: &Resource) -> Api<DynamicObject> {
        let (group, version) = match resource.api_version().split_once('/') {
            Some((group, version)) => (group.to_string(), version.to_string()),
            None => (String::new(), resource.api_version().to_string()),
        };
        let gvk = GroupVersionKind {
            group,
            version,
            kind: resource.kind().to_string(),
        };
        let api_resource = ApiResource::from_gvk(&gvk);

        match resource.namespace() {
            Some(namespace) => Api::namespaced_with(self.client.clone(), namespace, &api_resource),
            None => Api::all_with(self.client.clone(), &api_resource),
        }
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn apply(&self, resource: &Resource, field_manager: &str) -> kube::Result<()> {
        let params = PatchParams::apply(field_manager).force();
        self.api_for(resource)
            .patch(resource.name(), &params, &Patch::Apply(resource.as_dynamic()))
            .await?;

        debug!(kind = resource.kind(), name = resource.name(), "已应用资源");
        Ok(())
    }

    async fn delete(&self, resource: &Resource) -> kube::Result<()> {
        self.api_for(resource)
            .delete(resource.name(), &DeleteParams::default())
            .await?;

        Ok(())
    }

    async fn get_namespace(&self, name: &str) -> kube::Result<()> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        api.get(name).await?;

        Ok(())
    }

    async fn create_namespace(&self, name: &str) -> kube::Result<()> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        api.create(&PostParams::default(), &namespace).await?;

        Ok(())
    }
}

/// kube-rs 执行上下文工厂，所有客户端都从同一份基础配置复制而来
pub struct KubeClientFactory {
    /// 基础连接配置
    config: Config,
}

impl KubeClientFactory {
    /// 创建新的客户端工厂
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// 复制基础配置并只模拟指定用户，清除基础配置中可能存在的组模拟
    fn impersonation_config(&self, user: &str) -> Config {
        let mut config = self.config.clone();
        config.auth_info.impersonate = Some(user.to_string());
        config.auth_info.impersonate_groups = None;
        config
    }

    fn build(config: Config) -> kube::Result<ExecutionContext> {
        let client = Client::try_from(config)?;
        Ok(Arc::new(KubeClusterClient::new(client)))
    }
}

impl ClientFactory for KubeClientFactory {
    fn controller_client(&self) -> kube::Result<ExecutionContext> {
        Self::build(self.config.clone())
    }

    fn impersonating_client(&self, user: &str) -> kube::Result<ExecutionContext> {
        debug!(user = user, "创建用户模拟客户端");
        Self::build(self.impersonation_config(user))
    }
}
