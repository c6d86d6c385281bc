//! 用户模拟客户端缓存
//!
//! 每个出现过的用户身份对应唯一一个模拟客户端，首次出现时创建，之后在进程生命周期内复用。
//! 缓存只增不减，不做过期清理。

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use leafhub_common::{Error, Result, SyncObject, CONTROLLER_IDENTITY};

use super::identity_resolver::resolve_identity;
use crate::cluster::{ClientFactory, ExecutionContext};

/// 用户模拟管理器
pub struct ImpersonationManager {
    /// 执行上下文工厂
    factory: Arc<dyn ClientFactory>,
    /// 身份 -> 执行上下文
    clients: Mutex<HashMap<String, ExecutionContext>>,
}

impl ImpersonationManager {
    /// 创建新的用户模拟管理器，缓存中预置控制器自身的客户端
    pub fn new(factory: Arc<dyn ClientFactory>) -> Result<Self> {
        let controller_client = factory
            .controller_client()
            .map_err(|source| Error::CredentialCreation {
                user: CONTROLLER_IDENTITY.to_string(),
                source,
            })?;

        let mut clients = HashMap::new();
        clients.insert(CONTROLLER_IDENTITY.to_string(), controller_client);

        Ok(Self {
            factory,
            clients: Mutex::new(clients),
        })
    }

    /// 解析对象的用户身份并返回对应的执行上下文
    pub async fn impersonate(&self, obj: &impl SyncObject) -> Result<(String, ExecutionContext)> {
        let identity = resolve_identity(obj)?;
        let client = self.client_for(&identity).await?;

        Ok((identity, client))
    }

    /// 获取或创建指定身份的执行上下文
    ///
    /// 查找与插入在同一把锁内完成，同一身份不会重复创建。创建失败时不写入缓存，
    /// 下次遇到同一身份会重新尝试。
    pub async fn client_for(&self, identity: &str) -> Result<ExecutionContext> {
        let mut clients = self.clients.lock().await;

        if let Some(client) = clients.get(identity) {
            debug!(identity = identity, "从缓存获取执行上下文");
            return Ok(client.clone());
        }

        let client = self
            .factory
            .impersonating_client(identity)
            .map_err(|source| Error::CredentialCreation {
                user: identity.to_string(),
                source,
            })?;
        clients.insert(identity.to_string(), client.clone());

        info!(identity = identity, cached = clients.len(), "已为新用户创建模拟客户端");
        Ok(client)
    }

    /// 当前缓存的身份数量（包含控制器身份）
    pub async fn cached_identities(&self) -> usize {
        self.clients.lock().await.len()
    }
}
