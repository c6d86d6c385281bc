use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, BufReader};
use tokio::sync::oneshot;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use leafhub_spec_sync::{cluster, init_sync_system, read_bundles, KubeClientFactory, SyncConfig};

/// 叶子集群期望状态同步器
#[derive(Parser, Debug)]
#[command(name = "leafhub-spec-sync", version, about)]
struct Args {
    /// 配置文件路径（YAML 或 JSON）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 日志级别，覆盖配置文件
    #[arg(long)]
    log_level: Option<String>,

    /// NDJSON 资源包输入，`-` 表示标准输入
    #[arg(long, default_value = "-")]
    bundles: String,
}

fn init_tracing(config: &SyncConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn open_bundle_source(path: &str) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    if path == "-" {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }

    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("无法打开资源包文件: {path}"))?;
    Ok(Box::new(BufReader::new(file)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = SyncConfig::load(args.config.as_deref())?;
    if let Some(level) = args.log_level {
        config.log_level = level;
    }
    init_tracing(&config);

    info!("启动 leafhub-spec-sync");

    let kube_config = cluster::infer_config(config.kube_context.as_deref())
        .await
        .context("无法获取集群连接配置")?;
    let factory = Arc::new(KubeClientFactory::new(kube_config));
    let (bundle_tx, syncer) =
        init_sync_system(&config, factory).context("初始化资源包同步系统失败")?;

    let source = open_bundle_source(&args.bundles).await?;
    tokio::spawn(async move {
        match read_bundles(source, bundle_tx).await {
            Ok(count) => info!(bundles = count, "资源包输入结束"),
            Err(e) => error!(error = %e, "读取资源包失败"),
        }
    });

    let (stop_tx, stop_rx) = oneshot::channel();
    let mut sync_task = tokio::spawn(syncer.start(stop_rx));

    let stats = tokio::select! {
        stats = &mut sync_task => stats?,
        _ = tokio::signal::ctrl_c() => {
            info!("收到停止信号，等待当前资源包处理完成");
            let _ = stop_tx.send(());
            sync_task.await?
        }
    };

    info!(
        bundles = stats.bundles,
        updated = stats.updated,
        deleted = stats.deleted,
        failures = stats.failures,
        "leafhub-spec-sync 已退出"
    );
    Ok(())
}
