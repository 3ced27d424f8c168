//! 资源池管理 API

use reqwest::Method;
use tracing::info;
use uuid::Uuid;

use crate::client::Client;
use crate::error::Result;
use crate::models::{ListOptions, ListParams, Pool};
use crate::path::{resource_id, PathBuilder};

use super::task::ensure_task_success;
use super::{ensure_id, ensure_tag};

/// 资源池管理 API
pub struct PoolApi<'a> {
    client: &'a Client,
}

impl<'a> PoolApi<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// 查询资源池详情
    pub async fn get(&self, id: Uuid) -> Result<Pool> {
        ensure_id("pool.get", id)?;
        info!("查询资源池详情: {}", id);
        self.client
            .request(Method::GET, &resource_id("pools", id), None::<()>)
            .await
    }

    /// 查询资源池列表
    pub async fn list(&self, options: &ListOptions) -> Result<Vec<Pool>> {
        info!("查询资源池列表");
        self.client
            .request(Method::GET, "pools", Some(ListParams::from(options)))
            .await
    }

    /// 滚动更新资源池内全部宿主机
    pub async fn rolling_update(&self, id: Uuid) -> Result<()> {
        ensure_id("pool.rolling_update", id)?;
        info!("滚动更新资源池: {}", id);

        let path = PathBuilder::new()
            .resource("pools")
            .id(id)
            .actions_group()
            .action("rolling_update")
            .build();
        let body = self.client.request_text(Method::POST, &path, None::<()>).await?;

        if let Some(task) = self.client.task().handle_task_response(&body, true).await? {
            ensure_task_success(task)?;
        }
        Ok(())
    }

    /// 添加标签
    pub async fn add_tag(&self, id: Uuid, tag: &str) -> Result<()> {
        ensure_id("pool.add_tag", id)?;
        ensure_tag("pool.add_tag", tag)?;
        info!("添加资源池标签: {} -> {}", tag, id);

        let path = format!("{}/tags/{}", resource_id("pools", id), urlencoding::encode(tag));
        self.client.request_text(Method::PUT, &path, None::<()>).await?;
        Ok(())
    }

    /// 移除标签
    pub async fn remove_tag(&self, id: Uuid, tag: &str) -> Result<()> {
        ensure_id("pool.remove_tag", id)?;
        ensure_tag("pool.remove_tag", tag)?;
        info!("移除资源池标签: {} <- {}", tag, id);

        let path = format!("{}/tags/{}", resource_id("pools", id), urlencoding::encode(tag));
        self.client.request_text(Method::DELETE, &path, None::<()>).await?;
        Ok(())
    }
}
