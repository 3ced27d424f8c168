//! 宿主机管理 API

use reqwest::Method;
use tracing::info;
use uuid::Uuid;

use crate::client::Client;
use crate::error::Result;
use crate::models::{Host, ListOptions, ListParams};
use crate::path::resource_id;

use super::{ensure_id, ensure_tag};

/// 宿主机管理 API
pub struct HostApi<'a> {
    client: &'a Client,
}

impl<'a> HostApi<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// 查询宿主机详情
    pub async fn get(&self, id: Uuid) -> Result<Host> {
        ensure_id("host.get", id)?;
        info!("查询宿主机详情: {}", id);
        self.client
            .request(Method::GET, &resource_id("hosts", id), None::<()>)
            .await
    }

    /// 查询宿主机列表
    pub async fn list(&self, options: &ListOptions) -> Result<Vec<Host>> {
        info!("查询宿主机列表");
        self.client
            .request(Method::GET, "hosts", Some(ListParams::from(options)))
            .await
    }

    /// 添加标签
    pub async fn add_tag(&self, id: Uuid, tag: &str) -> Result<()> {
        ensure_id("host.add_tag", id)?;
        ensure_tag("host.add_tag", tag)?;
        info!("添加宿主机标签: {} -> {}", tag, id);

        let path = format!("{}/tags/{}", resource_id("hosts", id), urlencoding::encode(tag));
        self.client.request_text(Method::PUT, &path, None::<()>).await?;
        Ok(())
    }

    /// 移除标签
    pub async fn remove_tag(&self, id: Uuid, tag: &str) -> Result<()> {
        ensure_id("host.remove_tag", id)?;
        ensure_tag("host.remove_tag", tag)?;
        info!("移除宿主机标签: {} <- {}", tag, id);

        let path = format!("{}/tags/{}", resource_id("hosts", id), urlencoding::encode(tag));
        self.client.request_text(Method::DELETE, &path, None::<()>).await?;
        Ok(())
    }
}
