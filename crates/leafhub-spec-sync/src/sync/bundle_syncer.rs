//! 资源包同步器
//!
//! 从入站通道逐个取出资源包，先按顺序应用 objects，再按顺序删除 deletedObjects。
//! 单个对象的失败只记录日志，不影响同一资源包中的其他对象，也不重试。
//! 停止信号只在两个资源包之间检查，正在处理的资源包会先处理完。

use leafhub_common::{Bundle, Error, Resource, SyncObject};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::identity::ImpersonationManager;
use crate::sync::object_reconciler::ObjectReconciler;

const UPDATE_OPERATION: &str = "update";
const DELETE_OPERATION: &str = "delete";
const IMPERSONATE_OPERATION: &str = "impersonate";

/// 同步统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// 已处理的资源包数量
    pub bundles: u64,
    /// 成功应用的对象数量
    pub updated: u64,
    /// 成功删除的对象数量
    pub deleted: u64,
    /// 删除时已不存在的对象数量
    pub already_absent: u64,
    /// 失败的对象数量
    pub failures: u64,
}

/// 资源包同步器
pub struct BundleSyncer {
    /// 用户模拟管理器
    impersonation_manager: ImpersonationManager,
    /// 对象协调器
    reconciler: ObjectReconciler,
    /// 资源包入站通道
    bundle_rx: mpsc::Receiver<Bundle>,
    /// 同步统计
    stats: SyncStats,
}

impl BundleSyncer {
    /// 创建新的资源包同步器
    pub fn new(
        impersonation_manager: ImpersonationManager,
        reconciler: ObjectReconciler,
        bundle_rx: mpsc::Receiver<Bundle>,
    ) -> Self {
        Self {
            impersonation_manager,
            reconciler,
            bundle_rx,
            stats: SyncStats::default(),
        }
    }

    /// 启动同步循环，直到收到停止信号或通道关闭，返回累计统计
    ///
    /// 停止信号的发送端被丢弃同样视为停止。
    pub async fn start(mut self, mut stop: oneshot::Receiver<()>) -> SyncStats {
        info!("开始同步资源包");

        loop {
            tokio::select! {
                biased;
                _ = &mut stop => {
                    info!("资源包同步已停止");
                    break;
                }
                received = self.bundle_rx.recv() => match received {
                    Some(bundle) => self.sync_bundle(&bundle).await,
                    None => {
                        info!("资源包通道已关闭，停止同步");
                        break;
                    }
                },
            }
        }

        self.stats
    }

    /// 处理单个资源包
    pub async fn sync_bundle(&mut self, bundle: &Bundle) {
        debug!(
            objects = bundle.objects.len(),
            deleted_objects = bundle.deleted_objects.len(),
            total = bundle.len(),
            "开始处理资源包"
        );

        for obj in &bundle.objects {
            self.update_object(obj).await;
        }

        for obj in &bundle.deleted_objects {
            self.delete_object(obj).await;
        }

        self.stats.bundles += 1;
    }

    async fn update_object(&mut self, obj: &Resource) {
        let (identity, client) = match self.impersonation_manager.impersonate(obj).await {
            Ok(context) => context,
            Err(e) => return self.log_failure(&e, obj, IMPERSONATE_OPERATION),
        };

        match self.reconciler.apply(client.as_ref(), obj).await {
            Ok(()) => {
                self.stats.updated += 1;
                info!(
                    name = obj.name(),
                    namespace = obj.namespace().unwrap_or_default(),
                    kind = obj.kind(),
                    identity = identity.as_str(),
                    "对象已更新"
                );
            }
            Err(e) => self.log_failure(&e, obj, UPDATE_OPERATION),
        }
    }

    async fn delete_object(&mut self, obj: &Resource) {
        let (identity, client) = match self.impersonation_manager.impersonate(obj).await {
            Ok(context) => context,
            Err(e) => return self.log_failure(&e, obj, IMPERSONATE_OPERATION),
        };

        match self.reconciler.delete(client.as_ref(), obj).await {
            Ok(true) => {
                self.stats.deleted += 1;
                info!(
                    name = obj.name(),
                    namespace = obj.namespace().unwrap_or_default(),
                    kind = obj.kind(),
                    identity = identity.as_str(),
                    "对象已删除"
                );
            }
            Ok(false) => self.stats.already_absent += 1,
            Err(e) => self.log_failure(&e, obj, DELETE_OPERATION),
        }
    }

    fn log_failure(&mut self, err: &Error, obj: &Resource, operation: &str) {
        self.stats.failures += 1;
        error!(
            error = %err,
            name = obj.name(),
            namespace = obj.namespace().unwrap_or_default(),
            kind = obj.kind(),
            operation = operation,
            "执行 {operation} 操作失败"
        );
    }

    /// 当前统计
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// 用户模拟管理器
    pub fn impersonation_manager(&self) -> &ImpersonationManager {
        &self.impersonation_manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ClusterClient, ExecutionContext, MockClientFactory, MockClusterClient};
    use leafhub_common::{error::api_error, USER_IDENTITY_ANNOTATION};
    use serde_json::json;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tokio::sync::Notify;

    /// 应用名为 `gated` 的对象时阻塞，直到测试放行
    #[derive(Default)]
    struct GatedClient {
        entered: Notify,
        release: Notify,
        applied: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ClusterClient for GatedClient {
        async fn apply(&self, resource: &Resource, _field_manager: &str) -> kube::Result<()> {
            if resource.name() == "gated" {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.applied.lock().unwrap().push(resource.name().to_string());
            Ok(())
        }

        async fn delete(&self, _resource: &Resource) -> kube::Result<()> {
            Ok(())
        }

        async fn get_namespace(&self, _name: &str) -> kube::Result<()> {
            Ok(())
        }

        async fn create_namespace(&self, _name: &str) -> kube::Result<()> {
            Ok(())
        }
    }

    fn secret(name: &str, identity: Option<&str>) -> Resource {
        let mut value = json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": { "name": name }
        });
        if let Some(identity) = identity {
            value["metadata"]["annotations"] = json!({ USER_IDENTITY_ANNOTATION: identity });
        }
        Resource::from_value(value).unwrap()
    }

    fn syncer(controller: MockClusterClient) -> (BundleSyncer, mpsc::Sender<Bundle>) {
        let controller: ExecutionContext = Arc::new(controller);
        let mut factory = MockClientFactory::new();
        factory
            .expect_controller_client()
            .returning(move || Ok(controller.clone()));
        factory.expect_impersonating_client().never();

        let manager = ImpersonationManager::new(Arc::new(factory)).unwrap();
        let (tx, rx) = mpsc::channel(4);
        (BundleSyncer::new(manager, ObjectReconciler::default(), rx), tx)
    }

    #[tokio::test]
    async fn test_objects_before_deleted_objects() {
        let mut controller = MockClusterClient::new();
        let mut sequence = mockall::Sequence::new();
        controller
            .expect_apply()
            .withf(|resource, _| resource.name() == "first")
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(()));
        controller
            .expect_apply()
            .withf(|resource, _| resource.name() == "second")
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(()));
        controller
            .expect_delete()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(()));

        let (mut syncer, _tx) = syncer(controller);
        let bundle = Bundle::new(
            vec![secret("first", None), secret("second", None)],
            vec![secret("stale", None)],
        );
        syncer.sync_bundle(&bundle).await;

        assert_eq!(
            syncer.stats(),
            &SyncStats {
                bundles: 1,
                updated: 2,
                deleted: 1,
                already_absent: 0,
                failures: 0
            }
        );
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_bundle() {
        let mut controller = MockClusterClient::new();
        controller
            .expect_apply()
            .withf(|resource, _| resource.name() == "rejected")
            .returning(|_, _| Err(api_error(422, "Invalid", "invalid")));
        controller
            .expect_apply()
            .withf(|resource, _| resource.name() == "accepted")
            .times(1)
            .returning(|_, _| Ok(()));
        controller
            .expect_delete()
            .returning(|_| Err(api_error(404, "NotFound", "not found")));

        let (mut syncer, _tx) = syncer(controller);
        let bundle = Bundle::new(
            vec![
                secret("bad-identity", Some("%%%")),
                secret("rejected", None),
                secret("accepted", None),
            ],
            vec![secret("missing", None)],
        );
        syncer.sync_bundle(&bundle).await;

        let stats = syncer.stats();
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.failures, 2);
        assert_eq!(stats.already_absent, 1);
        assert_eq!(stats.deleted, 0);
    }

    #[tokio::test]
    async fn test_start_drains_until_channel_closed() {
        let mut controller = MockClusterClient::new();
        controller.expect_apply().times(2).returning(|_, _| Ok(()));

        let (syncer, tx) = syncer(controller);
        let (_stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(syncer.start(stop_rx));

        tx.send(Bundle::new(vec![secret("a", None)], vec![])).await.unwrap();
        tx.send(Bundle::new(vec![secret("b", None)], vec![])).await.unwrap();
        drop(tx);

        let stats = task.await.unwrap();
        assert_eq!(stats.bundles, 2);
        assert_eq!(stats.updated, 2);
    }

    #[tokio::test]
    async fn test_stop_signal_ends_loop() {
        let mut controller = MockClusterClient::new();
        controller.expect_apply().never();

        let (syncer, _tx) = syncer(controller);
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(syncer.start(stop_rx));
        stop_tx.send(()).unwrap();

        let stats = task.await.unwrap();
        assert_eq!(stats, SyncStats::default());
    }

    #[tokio::test]
    async fn test_stop_during_bundle_finishes_that_bundle_only() {
        let gated = Arc::new(GatedClient::default());
        let controller: ExecutionContext = gated.clone();
        let mut factory = MockClientFactory::new();
        factory
            .expect_controller_client()
            .returning(move || Ok(controller.clone()));
        factory.expect_impersonating_client().never();

        let manager = ImpersonationManager::new(Arc::new(factory)).unwrap();
        let (tx, rx) = mpsc::channel(4);
        let syncer = BundleSyncer::new(manager, ObjectReconciler::default(), rx);

        tx.send(Bundle::new(
            vec![secret("gated", None), secret("after", None)],
            vec![],
        ))
        .await
        .unwrap();
        tx.send(Bundle::new(vec![secret("queued", None)], vec![]))
            .await
            .unwrap();

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(syncer.start(stop_rx));

        // 第一个对象正在应用时发送停止信号，再放行
        gated.entered.notified().await;
        stop_tx.send(()).unwrap();
        gated.release.notify_one();

        let stats = task.await.unwrap();
        assert_eq!(stats.bundles, 1);
        assert_eq!(stats.updated, 2);
        assert_eq!(
            *gated.applied.lock().unwrap(),
            vec!["gated".to_string(), "after".to_string()]
        );
    }
}
