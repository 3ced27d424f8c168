//! 虚拟磁盘管理 API

use reqwest::Method;
use tracing::info;
use uuid::Uuid;

use crate::client::Client;
use crate::error::Result;
use crate::models::{ListOptions, ListParams, Vdi};
use crate::path::{resource_id, PathBuilder};

use super::task::ensure_task_success;
use super::{ensure_id, ensure_tag, trim_body};

/// 虚拟磁盘管理 API
pub struct VdiApi<'a> {
    client: &'a Client,
}

impl<'a> VdiApi<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// 查询虚拟磁盘详情
    pub async fn get(&self, id: Uuid) -> Result<Vdi> {
        ensure_id("vdi.get", id)?;
        info!("查询虚拟磁盘详情: {}", id);
        self.client
            .request(Method::GET, &resource_id("vdis", id), None::<()>)
            .await
    }

    /// 查询虚拟磁盘列表
    pub async fn list(&self, options: &ListOptions) -> Result<Vec<Vdi>> {
        info!("查询虚拟磁盘列表");
        self.client
            .request(Method::GET, "vdis", Some(ListParams::from(options)))
            .await
    }

    /// 删除虚拟磁盘
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        ensure_id("vdi.delete", id)?;
        info!("删除虚拟磁盘: {}", id);

        let body = self
            .client
            .request_text(Method::DELETE, &resource_id("vdis", id), None::<()>)
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

    /// 迁移虚拟磁盘到指定存储库
    ///
    /// 迁移完成后磁盘 ID 可能变化，返回迁移后的磁盘记录。
    pub async fn migrate(&self, id: Uuid, sr_id: Uuid) -> Result<Vdi> {
        ensure_id("vdi.migrate", id)?;
        ensure_id("vdi.migrate", sr_id)?;
        info!("迁移虚拟磁盘: {} -> 存储库 {}", id, sr_id);

        let path = PathBuilder::new()
            .resource("vdis")
            .id(id)
            .actions_group()
            .action("migrate")
            .build();
        let body = self
            .client
            .request_text(Method::POST, &path, Some(serde_json::json!({ "sr_id": sr_id })))
            .await?;

        if let Some(task) = self.client.task().handle_task_response(&body, true).await? {
            let task = ensure_task_success(task)?;
            if let Some(new_id) = task.result_uuid() {
                return self.get(new_id).await;
            }
        }
        self.get(id).await
    }

    /// 添加标签
    pub async fn add_tag(&self, id: Uuid, tag: &str) -> Result<()> {
        ensure_id("vdi.add_tag", id)?;
        ensure_tag("vdi.add_tag", tag)?;
        info!("添加虚拟磁盘标签: {} -> {}", tag, id);

        let path = format!("{}/tags/{}", resource_id("vdis", id), urlencoding::encode(tag));
        self.client.request_text(Method::PUT, &path, None::<()>).await?;
        Ok(())
    }

    /// 移除标签
    pub async fn remove_tag(&self, id: Uuid, tag: &str) -> Result<()> {
        ensure_id("vdi.remove_tag", id)?;
        ensure_tag("vdi.remove_tag", tag)?;
        info!("移除虚拟磁盘标签: {} <- {}", tag, id);

        let path = format!("{}/tags/{}", resource_id("vdis", id), urlencoding::encode(tag));
        self.client.request_text(Method::DELETE, &path, None::<()>).await?;
        Ok(())
    }
}
