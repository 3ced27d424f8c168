//! 快照管理 API
//!
//! 快照的查询与删除走 REST，回滚只存在于 JSON-RPC 侧
//! （`vm.revert`）。

use reqwest::Method;
use tracing::info;
use uuid::Uuid;

use crate::client::Client;
use crate::error::Result;
use crate::models::{ListOptions, ListParams, Snapshot};
use crate::path::resource_id;
use crate::rpc::validate_result;

use super::task::ensure_task_success;
use super::{ensure_id, ensure_tag, trim_body};

/// 快照管理 API
pub struct SnapshotApi<'a> {
    client: &'a Client,
}

impl<'a> SnapshotApi<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// 查询快照详情
    pub async fn get(&self, id: Uuid) -> Result<Snapshot> {
        ensure_id("snapshot.get", id)?;
        info!("查询快照详情: {}", id);
        self.client
            .request(Method::GET, &resource_id("vm-snapshots", id), None::<()>)
            .await
    }

    /// 查询快照列表
    pub async fn list(&self, options: &ListOptions) -> Result<Vec<Snapshot>> {
        info!("查询快照列表");
        self.client
            .request(Method::GET, "vm-snapshots", Some(ListParams::from(options)))
            .await
    }

    /// 删除快照
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        ensure_id("snapshot.delete", id)?;
        info!("删除快照: {}", id);

        let body = self
            .client
            .request_text(Method::DELETE, &resource_id("vm-snapshots", id), None::<()>)
            .await?;

        let trimmed = trim_body(&body);
        if trimmed.is_empty() || trimmed == "OK" {
            return Ok(());
        }
        if let Some(task) = self.client.task().handle_task_response(&body, true).await? {
            ensure_task_success(task)?;
        }
        Ok(())
    }

    /// 回滚虚拟机到此快照
    pub async fn revert(&self, id: Uuid) -> Result<()> {
        ensure_id("snapshot.revert", id)?;
        info!("回滚到快照: {}", id);

        let result = self
            .client
            .rpc_call_value("vm.revert", serde_json::json!({ "snapshot": id }))
            .await?;
        validate_result("vm.revert", &result)
    }

    /// 添加标签
    pub async fn add_tag(&self, id: Uuid, tag: &str) -> Result<()> {
        ensure_id("snapshot.add_tag", id)?;
        ensure_tag("snapshot.add_tag", tag)?;
        info!("添加快照标签: {} -> {}", tag, id);

        let path = format!(
            "{}/tags/{}",
            resource_id("vm-snapshots", id),
            urlencoding::encode(tag)
        );
        self.client.request_text(Method::PUT, &path, None::<()>).await?;
        Ok(())
    }

    /// 移除标签
    pub async fn remove_tag(&self, id: Uuid, tag: &str) -> Result<()> {
        ensure_id("snapshot.remove_tag", id)?;
        ensure_tag("snapshot.remove_tag", tag)?;
        info!("移除快照标签: {} <- {}", tag, id);

        let path = format!(
            "{}/tags/{}",
            resource_id("vm-snapshots", id),
            urlencoding::encode(tag)
        );
        self.client
            .request_text(Method::DELETE, &path, None::<()>)
            .await?;
        Ok(())
    }
}
