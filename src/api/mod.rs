//! 实体 API 模块
//!
//! 每个实体一个门面，组合路径拼装、REST 传输、JSON-RPC 通道与
//! 任务跟踪：
//! - 虚拟机管理 (VmApi)
//! - 快照管理 (SnapshotApi)
//! - 资源池管理 (PoolApi)
//! - 宿主机管理 (HostApi)
//! - 网络管理 (NetworkApi)
//! - 虚拟磁盘管理 (VdiApi)
//! - 存储库管理 (StorageApi)
//! - 备份作业管理 (BackupApi)
//! - 恢复管理 (RestoreApi)
//! - 任务查询与跟踪 (TaskApi)

use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};

pub mod backup;
pub mod host;
pub mod network;
pub mod pool;
pub mod restore;
pub mod snapshot;
pub mod storage;
pub mod task;
pub mod vdi;
pub mod vm;

pub use backup::BackupApi;
pub use host::HostApi;
pub use network::NetworkApi;
pub use pool::PoolApi;
pub use restore::RestoreApi;
pub use snapshot::SnapshotApi;
pub use storage::StorageApi;
pub use task::{TaskApi, WaitOptions};
pub use vdi::VdiApi;
pub use vm::VmApi;

/// 实体操作前的 ID 校验，nil UUID 不发起任何网络请求
pub(crate) fn ensure_id(operation: &str, id: Uuid) -> Result<()> {
    if id.is_nil() {
        return Err(Error::Validation(format!("{}: ID 不能为空", operation)));
    }
    Ok(())
}

/// 标签操作前的校验，空标签不发起任何网络请求
pub(crate) fn ensure_tag(operation: &str, tag: &str) -> Result<()> {
    if tag.is_empty() {
        return Err(Error::Validation(format!("{}: 标签不能为空", operation)));
    }
    Ok(())
}

/// 去掉响应体两端的空白与 JSON 引号
pub(crate) fn trim_body(body: &str) -> &str {
    body.trim().trim_matches('"')
}

/// 把方法应答折算成任务 ID
///
/// 字符串应答若是任务句柄路径则抽出 ID，否则原样返回。
pub(crate) fn task_reply_to_id(value: Value) -> String {
    let text = match value {
        Value::String(text) => text,
        other => other.to_string(),
    };
    if task::is_task_url(&text) {
        task::extract_task_id(&text).to_string()
    } else {
        text
    }
}
