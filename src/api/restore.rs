//! 恢复管理 API
//!
//! 恢复日志走 REST，元数据恢复与虚拟机备份导入只存在于
//! JSON-RPC 侧。

use reqwest::Method;
use serde_json::Value;
use tracing::info;

use crate::client::Client;
use crate::error::Result;
use crate::models::{ListOptions, ListParams, RestoreLog, RestorePoint};
use crate::path::PathBuilder;

use super::task_reply_to_id;

/// 恢复管理 API
pub struct RestoreApi<'a> {
    client: &'a Client,
}

impl<'a> RestoreApi<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// 查询恢复日志列表
    pub async fn list_logs(&self, options: &ListOptions) -> Result<Vec<RestoreLog>> {
        info!("查询恢复日志列表");
        self.client
            .request(
                Method::GET,
                &PathBuilder::new().resource("restore").resource("logs").build(),
                Some(ListParams::from(options)),
            )
            .await
    }

    /// 查询恢复日志详情
    pub async fn get_log(&self, id: &str) -> Result<RestoreLog> {
        info!("查询恢复日志详情: {}", id);
        let path = PathBuilder::new()
            .resource("restore")
            .resource("logs")
            .raw_id(id)
            .build();
        self.client.request(Method::GET, &path, None::<()>).await
    }

    /// 查询可用恢复点
    ///
    /// 服务端没有独立的恢复点端点，这里由成功的恢复日志投影。
    pub async fn list_points(&self, options: &ListOptions) -> Result<Vec<RestorePoint>> {
        let logs = self.list_logs(options).await?;
        Ok(logs
            .into_iter()
            .filter(|log| log.status.as_deref() == Some("success"))
            .map(|log| RestorePoint {
                id: log.id,
                job_id: log.job_id,
                vm_id: log.vm_id,
                timestamp: log.end.or(log.start),
            })
            .collect())
    }

    /// 恢复元数据备份，返回任务 ID
    pub async fn restore_metadata(&self, params: Value) -> Result<String> {
        info!("恢复元数据备份");
        let result = self
            .client
            .rpc_call_value("backupNg.restoreMetadata", params)
            .await?;
        Ok(task_reply_to_id(result))
    }

    /// 导入虚拟机备份，返回任务 ID
    pub async fn import_vm_backup(&self, params: Value) -> Result<String> {
        info!("导入虚拟机备份");
        let result = self
            .client
            .rpc_call_value("backupNg.importVmBackup", params)
            .await?;
        Ok(task_reply_to_id(result))
    }
}
