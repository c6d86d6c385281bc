//! 集成测试使用的内存集群

use async_trait::async_trait;
use leafhub_common::{error::api_error, Resource, SyncObject};
use leafhub_spec_sync::{ClientFactory, ClusterClient, ExecutionContext};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

/// 对象键：apiVersion/kind/namespace/name
pub type ObjectKey = (String, String, String, String);

/// 一次集群调用记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub identity: String,
    pub operation: &'static str,
    pub name: String,
}

#[derive(Default)]
pub struct ClusterState {
    pub objects: BTreeMap<ObjectKey, serde_json::Value>,
    pub namespaces: HashSet<String>,
    pub calls: Vec<Call>,
    pub forbidden_users: HashSet<String>,
}

pub fn key_of(resource: &Resource) -> ObjectKey {
    (
        resource.api_version().to_string(),
        resource.kind().to_string(),
        resource.namespace().unwrap_or_default().to_string(),
        resource.name().to_string(),
    )
}

/// 以某个身份访问内存集群的客户端
pub struct FakeClient {
    identity: String,
    state: Arc<Mutex<ClusterState>>,
}

impl FakeClient {
    fn record(&self, state: &mut ClusterState, operation: &'static str, name: &str) -> kube::Result<()> {
        state.calls.push(Call {
            identity: self.identity.clone(),
            operation,
            name: name.to_string(),
        });
        if state.forbidden_users.contains(&self.identity) {
            return Err(api_error(403, "Forbidden", "forbidden"));
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterClient for FakeClient {
    async fn apply(&self, resource: &Resource, _field_manager: &str) -> kube::Result<()> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "apply", resource.name())?;
        let value = resource.to_value().map_err(|e| api_error(400, "BadRequest", &e.to_string()))?;
        state.objects.insert(key_of(resource), value);
        Ok(())
    }

    async fn delete(&self, resource: &Resource) -> kube::Result<()> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "delete", resource.name())?;
        match state.objects.remove(&key_of(resource)) {
            Some(_) => Ok(()),
            None => Err(api_error(404, "NotFound", "not found")),
        }
    }

    async fn get_namespace(&self, name: &str) -> kube::Result<()> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "get_namespace", name)?;
        if state.namespaces.contains(name) {
            Ok(())
        } else {
            Err(api_error(404, "NotFound", "not found"))
        }
    }

    async fn create_namespace(&self, name: &str) -> kube::Result<()> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "create_namespace", name)?;
        if state.namespaces.insert(name.to_string()) {
            Ok(())
        } else {
            Err(api_error(409, "AlreadyExists", "already exists"))
        }
    }
}

/// 内存集群的执行上下文工厂，记录每个身份的创建次数
#[derive(Default)]
pub struct FakeFactory {
    pub state: Arc<Mutex<ClusterState>>,
    pub created: Mutex<Vec<String>>,
    pub unavailable_users: Mutex<HashSet<String>>,
}

impl FakeFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn creations_for(&self, user: &str) -> usize {
        self.created.lock().unwrap().iter().filter(|u| *u == user).count()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    fn client(&self, identity: &str) -> ExecutionContext {
        self.created.lock().unwrap().push(identity.to_string());
        Arc::new(FakeClient {
            identity: identity.to_string(),
            state: self.state.clone(),
        })
    }
}

impl ClientFactory for FakeFactory {
    fn controller_client(&self) -> kube::Result<ExecutionContext> {
        Ok(self.client(""))
    }

    fn impersonating_client(&self, user: &str) -> kube::Result<ExecutionContext> {
        if self.unavailable_users.lock().unwrap().contains(user) {
            return Err(api_error(500, "InternalError", "transport unavailable"));
        }
        Ok(self.client(user))
    }
}
