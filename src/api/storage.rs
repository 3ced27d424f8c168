//! 存储库管理 API

use reqwest::Method;
use tracing::info;
use uuid::Uuid;

use crate::client::Client;
use crate::error::Result;
use crate::models::{ListOptions, ListParams, StorageRepository};
use crate::path::resource_id;

use super::{ensure_id, ensure_tag};

/// 存储库管理 API
pub struct StorageApi<'a> {
    client: &'a Client,
}

impl<'a> StorageApi<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// 查询存储库详情
    pub async fn get(&self, id: Uuid) -> Result<StorageRepository> {
        ensure_id("storage.get", id)?;
        info!("查询存储库详情: {}", id);
        self.client
            .request(Method::GET, &resource_id("srs", id), None::<()>)
            .await
    }

    /// 查询存储库列表
    pub async fn list(&self, options: &ListOptions) -> Result<Vec<StorageRepository>> {
        info!("查询存储库列表");
        self.client
            .request(Method::GET, "srs", Some(ListParams::from(options)))
            .await
    }

    /// 添加标签
    pub async fn add_tag(&self, id: Uuid, tag: &str) -> Result<()> {
        ensure_id("storage.add_tag", id)?;
        ensure_tag("storage.add_tag", tag)?;
        info!("添加存储库标签: {} -> {}", tag, id);

        let path = format!("{}/tags/{}", resource_id("srs", id), urlencoding::encode(tag));
        self.client.request_text(Method::PUT, &path, None::<()>).await?;
        Ok(())
    }

    /// 移除标签
    pub async fn remove_tag(&self, id: Uuid, tag: &str) -> Result<()> {
        ensure_id("storage.remove_tag", id)?;
        ensure_tag("storage.remove_tag", tag)?;
        info!("移除存储库标签: {} <- {}", tag, id);

        let path = format!("{}/tags/{}", resource_id("srs", id), urlencoding::encode(tag));
        self.client.request_text(Method::DELETE, &path, None::<()>).await?;
        Ok(())
    }
}
