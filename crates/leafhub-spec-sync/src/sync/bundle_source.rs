//! 资源包输入
//!
//! 从按行分隔的 JSON（NDJSON）流中读取资源包并送入同步通道，每行一个资源包。

use leafhub_common::{Bundle, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// 读取资源包直到输入结束或接收端关闭，返回成功送入通道的资源包数量
///
/// 空行被忽略；无法解析的行记录告警后跳过。
pub async fn read_bundles<R>(reader: R, sender: mpsc::Sender<Bundle>) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0;
    let mut line_number = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let bundle = match serde_json::from_str::<Bundle>(line) {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!(line = line_number, error = %e, "无法解析资源包，已跳过");
                continue;
            }
        };

        debug!(
            line = line_number,
            objects = bundle.objects.len(),
            deleted_objects = bundle.deleted_objects.len(),
            "收到资源包"
        );

        if sender.send(bundle).await.is_err() {
            warn!("资源包通道已关闭，停止读取");
            break;
        }
        forwarded += 1;
    }

    Ok(forwarded)
}
