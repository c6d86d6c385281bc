//! 资源包模型
//!
//! 中心集群每次通知都会下发一个资源包，包含需要创建/更新的对象和需要删除的对象。
//! 资源对象以通用的 [`DynamicObject`] 表示，通过 [`SyncObject`] 只读访问。

use kube::api::DynamicObject;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// 携带 base64 编码用户身份的注解
pub const USER_IDENTITY_ANNOTATION: &str = "open-cluster-management.io/user-identity";

/// 指定对象需要落地的目标命名空间的注解
pub const TARGET_NAMESPACE_ANNOTATION: &str =
    "hub-of-hubs.open-cluster-management.io/remoteNamespace";

/// 控制器自身身份（不做模拟）
pub const CONTROLLER_IDENTITY: &str = "";

/// 资源对象的只读访问接口
pub trait SyncObject {
    /// 对象名称，缺失时为空字符串
    fn name(&self) -> &str;
    /// 对象命名空间，集群级对象为 None
    fn namespace(&self) -> Option<&str>;
    /// 对象类型，缺失时为空字符串
    fn kind(&self) -> &str;
    /// 对象 apiVersion，缺失时为空字符串
    fn api_version(&self) -> &str;
    /// 对象注解
    fn annotations(&self) -> Option<&BTreeMap<String, String>>;

    /// 读取单个注解
    fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations()
            .and_then(|annotations| annotations.get(key))
            .map(String::as_str)
    }
}

/// 期望状态资源对象
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource(DynamicObject);

impl Resource {
    /// 从 JSON 文档解析资源
    pub fn from_value(value: serde_json::Value) -> crate::Result<Self> {
        Ok(Self(serde_json::from_value(value)?))
    }

    /// 序列化为完整的 JSON 文档，用作 apply 补丁内容
    pub fn to_value(&self) -> crate::Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.0)?)
    }

    /// 底层通用对象
    pub fn as_dynamic(&self) -> &DynamicObject {
        &self.0
    }
}

impl SyncObject for Resource {
    fn name(&self) -> &str {
        self.0.metadata.name.as_deref().unwrap_or_default()
    }

    fn namespace(&self) -> Option<&str> {
        self.0
            .metadata
            .namespace
            .as_deref()
            .filter(|namespace| !namespace.is_empty())
    }

    fn kind(&self) -> &str {
        self.0.types.as_ref().map_or("", |types| types.kind.as_str())
    }

    fn api_version(&self) -> &str {
        self.0
            .types
            .as_ref()
            .map_or("", |types| types.api_version.as_str())
    }

    fn annotations(&self) -> Option<&BTreeMap<String, String>> {
        self.0.metadata.annotations.as_ref()
    }
}

/// 资源包
///
/// 上游以 `{"objects": [...], "deletedObjects": [...]}` 格式下发，
/// 数组缺失或为 null 时视为空。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    /// 需要创建或更新的对象，按顺序处理
    #[serde(default, deserialize_with = "null_as_empty")]
    pub objects: Vec<Resource>,
    /// 需要删除的对象，在全部 objects 之后按顺序处理
    #[serde(default, deserialize_with = "null_as_empty")]
    pub deleted_objects: Vec<Resource>,
}

impl Bundle {
    /// 创建资源包
    pub fn new(objects: Vec<Resource>, deleted_objects: Vec<Resource>) -> Self {
        Self {
            objects,
            deleted_objects,
        }
    }

    /// 资源包中对象总数
    pub fn len(&self) -> usize {
        self.objects.len() + self.deleted_objects.len()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Resource>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Resource>>::deserialize(deserializer)?.unwrap_or_default())
}
