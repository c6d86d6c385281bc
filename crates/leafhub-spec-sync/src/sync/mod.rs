//! 资源包同步模块
//!
//! 该模块负责消费中心集群下发的资源包，并以对象携带的用户身份把期望状态落地到本地集群。
//! 包含资源包同步循环、单对象协调和资源包输入。

mod bundle_source;
mod bundle_syncer;
mod object_reconciler;

pub use bundle_source::read_bundles;
pub use bundle_syncer::{BundleSyncer, SyncStats};
pub use object_reconciler::{ensure_namespace, ObjectReconciler, DEFAULT_FIELD_MANAGER};

use leafhub_common::{Bundle, Error, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use crate::cluster::ClientFactory;
use crate::config::SyncConfig;
use crate::identity::ImpersonationManager;

/// 初始化同步系统，返回资源包发送端和尚未启动的同步器
pub fn init_sync_system(
    config: &SyncConfig,
    factory: Arc<dyn ClientFactory>,
) -> Result<(mpsc::Sender<Bundle>, BundleSyncer)> {
    if config.channel_capacity == 0 {
        return Err(Error::Config("channel_capacity 必须大于 0".to_string()));
    }

    let impersonation_manager = ImpersonationManager::new(factory)?;
    let reconciler = ObjectReconciler::new(&config.field_manager);
    let (bundle_tx, bundle_rx) = mpsc::channel(config.channel_capacity);

    info!(
        field_manager = reconciler.field_manager(),
        channel_capacity = config.channel_capacity,
        "资源包同步系统初始化完成"
    );

    Ok((bundle_tx, BundleSyncer::new(impersonation_manager, reconciler, bundle_rx)))
}
