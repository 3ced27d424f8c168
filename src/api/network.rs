//! 网络管理 API

use reqwest::Method;
use tracing::info;
use uuid::Uuid;

use crate::client::Client;
use crate::error::Result;
use crate::models::{ListOptions, ListParams, Network};
use crate::path::resource_id;

use super::task::ensure_task_success;
use super::{ensure_id, ensure_tag, trim_body};

/// 网络管理 API
pub struct NetworkApi<'a> {
    client: &'a Client,
}

impl<'a> NetworkApi<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// 查询网络详情
    pub async fn get(&self, id: Uuid) -> Result<Network> {
        ensure_id("network.get", id)?;
        info!("查询网络详情: {}", id);
        self.client
            .request(Method::GET, &resource_id("networks", id), None::<()>)
            .await
    }

    /// 查询网络列表
    pub async fn list(&self, options: &ListOptions) -> Result<Vec<Network>> {
        info!("查询网络列表");
        self.client
            .request(Method::GET, "networks", Some(ListParams::from(options)))
            .await
    }

    /// 删除网络
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        ensure_id("network.delete", id)?;
        info!("删除网络: {}", id);

        let body = self
            .client
            .request_text(Method::DELETE, &resource_id("networks", id), None::<()>)
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

    /// 添加标签
    pub async fn add_tag(&self, id: Uuid, tag: &str) -> Result<()> {
        ensure_id("network.add_tag", id)?;
        ensure_tag("network.add_tag", tag)?;
        info!("添加网络标签: {} -> {}", tag, id);

        let path = format!(
            "{}/tags/{}",
            resource_id("networks", id),
            urlencoding::encode(tag)
        );
        self.client.request_text(Method::PUT, &path, None::<()>).await?;
        Ok(())
    }

    /// 移除标签
    pub async fn remove_tag(&self, id: Uuid, tag: &str) -> Result<()> {
        ensure_id("network.remove_tag", id)?;
        ensure_tag("network.remove_tag", tag)?;
        info!("移除网络标签: {} <- {}", tag, id);

        let path = format!(
            "{}/tags/{}",
            resource_id("networks", id),
            urlencoding::encode(tag)
        );
        self.client.request_text(Method::DELETE, &path, None::<()>).await?;
        Ok(())
    }
}
