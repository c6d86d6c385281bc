//! Leaf Hub Spec Sync
//!
//! 该模块实现叶子集群上的期望状态同步：接收中心集群下发的资源包，
//! 以对象注解中携带的用户身份（模拟用户）在本地集群上应用或删除对象。
//! 使用 kube-rs 框架与 Kubernetes API 交互。

pub mod cluster;
pub mod config;
pub mod identity;
pub mod sync;

pub use cluster::{ClientFactory, ClusterClient, ExecutionContext, KubeClientFactory};
pub use config::SyncConfig;
pub use identity::{resolve_identity, ImpersonationManager};
pub use sync::{init_sync_system, read_bundles, BundleSyncer, ObjectReconciler, SyncStats};
