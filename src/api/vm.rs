//! 虚拟机管理 API
//!
//! 提供完整的虚拟机管理功能，包括：
//! - 查询：按 ID、按过滤条件列表
//! - 创建：指向父资源池的 create_vm 动作，异步任务跟踪
//! - 电源操作：启动、关闭、重启、挂起、恢复（通配动作形式）
//! - 标签：添加、移除
//! - 快照与迁移

use reqwest::Method;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::models::{CreateVmRequest, ListOptions, ListParams, Vm};
use crate::path::{resource_id, wildcard_action, PathBuilder, VmFilter};
use crate::retry;

use super::task::ensure_task_success;
use super::{ensure_id, ensure_tag, task_reply_to_id, trim_body};

/// 虚拟机管理 API
pub struct VmApi<'a> {
    client: &'a Client,
}

impl<'a> VmApi<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    // ============================================
    // 查询
    // ============================================

    /// 查询虚拟机详情
    pub async fn get(&self, id: Uuid) -> Result<Vm> {
        ensure_id("vm.get", id)?;
        info!("查询虚拟机详情: {}", id);
        self.client
            .request(Method::GET, &resource_id("vms", id), None::<()>)
            .await
    }

    /// 查询虚拟机列表
    pub async fn list(&self, options: &ListOptions) -> Result<Vec<Vm>> {
        info!("查询虚拟机列表");
        self.client
            .request(Method::GET, "vms", Some(ListParams::from(options)))
            .await
    }

    /// 按名称检索虚拟机
    pub async fn find_by_name_label(&self, label: &str) -> Result<Vec<Vm>> {
        let filter = VmFilter {
            name_label: label.to_string(),
            ..Default::default()
        };
        self.list(&ListOptions::new().with_filter(filter.to_filter()))
            .await
    }

    // ============================================
    // 创建 / 删除
    // ============================================

    /// 创建虚拟机并等待就绪
    ///
    /// 指向父资源池的 `create_vm` 动作。任务产物携带 ID 时直接
    /// 取回新虚拟机；产物没有 ID 时按请求的名称检索，仍找不到
    /// 再尝试把原始响应体当作虚拟机记录解析。
    ///
    /// # Example
    /// ```ignore
    /// let req = CreateVmRequest::new(pool_id, "web-01", template_id)
    ///     .with_cpus(4)
    ///     .with_memory(4 * 1024 * 1024 * 1024);
    /// let vm = client.vm().create(req).await?;
    /// ```
    pub async fn create(&self, request: CreateVmRequest) -> Result<Vm> {
        ensure_id("vm.create", request.pool_id)?;
        info!("创建虚拟机: {} (资源池 {})", request.name_label, request.pool_id);

        let path = PathBuilder::new()
            .resource("pools")
            .id(request.pool_id)
            .actions_group()
            .action("create_vm")
            .build();
        let label = request.name_label.clone();
        let body = self
            .client
            .request_text(Method::POST, &path, Some(&request))
            .await?;

        match self.client.task().handle_task_response(&body, true).await? {
            Some(task) => {
                let task = ensure_task_success(task)?;
                match task.result_uuid() {
                    Some(vm_id) => self.get(vm_id).await,
                    None => self.resolve_created_vm(&label, &body).await,
                }
            }
            None => self.resolve_created_vm(&label, &body).await,
        }
    }

    /// 创建虚拟机但不等待完成，返回任务 ID
    pub async fn create_no_wait(&self, request: CreateVmRequest) -> Result<String> {
        ensure_id("vm.create", request.pool_id)?;
        info!("创建虚拟机（不等待）: {}", request.name_label);

        let path = PathBuilder::new()
            .resource("pools")
            .id(request.pool_id)
            .actions_group()
            .action("create_vm")
            .build();
        let body = self
            .client
            .request_text(Method::POST, &path, Some(&request))
            .await?;
        Ok(task_reply_to_id(Value::String(trim_body(&body).to_string())))
    }

    /// 任务产物缺少 ID 时的兜底检索
    async fn resolve_created_vm(&self, label: &str, raw_body: &str) -> Result<Vm> {
        warn!("创建任务未返回虚拟机 ID，按名称检索: {}", label);

        let candidates = self.find_by_name_label(label).await?;
        if let Some(vm) = candidates.into_iter().find(|vm| vm.name_label == label) {
            return Ok(vm);
        }

        if let Ok(vm) = serde_json::from_str::<Vm>(raw_body) {
            return Ok(vm);
        }

        Err(Error::NotFound(format!("虚拟机未找到: {}", label)))
    }

    /// 删除虚拟机
    ///
    /// 裸 "OK" 响应体视为成功。
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        ensure_id("vm.delete", id)?;
        info!("删除虚拟机: {}", id);

        let body = self
            .client
            .request_text(Method::DELETE, &resource_id("vms", id), None::<()>)
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

    // ============================================
    // 电源操作
    // ============================================

    /// 启动虚拟机
    pub async fn start(&self, id: Uuid) -> Result<()> {
        ensure_id("vm.start", id)?;
        info!("启动虚拟机: {}", id);
        self.power_action("start", id).await
    }

    /// 正常关闭虚拟机
    ///
    /// 依赖客户机代理，backoff 模式下对瞬时错误重试。
    pub async fn clean_shutdown(&self, id: Uuid) -> Result<()> {
        ensure_id("vm.clean_shutdown", id)?;
        info!("正常关闭虚拟机: {}", id);
        retry::with_backoff(
            self.client.retry_mode(),
            self.client.backoff_policy(),
            "vm.clean_shutdown",
            || self.power_action("clean_shutdown", id),
        )
        .await
    }

    /// 强制关闭虚拟机
    pub async fn hard_shutdown(&self, id: Uuid) -> Result<()> {
        ensure_id("vm.hard_shutdown", id)?;
        info!("强制关闭虚拟机: {}", id);
        self.power_action("hard_shutdown", id).await
    }

    /// 正常重启虚拟机
    ///
    /// 依赖客户机代理，backoff 模式下对瞬时错误重试。
    pub async fn clean_reboot(&self, id: Uuid) -> Result<()> {
        ensure_id("vm.clean_reboot", id)?;
        info!("正常重启虚拟机: {}", id);
        retry::with_backoff(
            self.client.retry_mode(),
            self.client.backoff_policy(),
            "vm.clean_reboot",
            || self.power_action("clean_reboot", id),
        )
        .await
    }

    /// 强制重启虚拟机
    pub async fn hard_reboot(&self, id: Uuid) -> Result<()> {
        ensure_id("vm.hard_reboot", id)?;
        info!("强制重启虚拟机: {}", id);
        self.power_action("hard_reboot", id).await
    }

    /// 挂起虚拟机
    pub async fn suspend(&self, id: Uuid) -> Result<()> {
        ensure_id("vm.suspend", id)?;
        info!("挂起虚拟机: {}", id);
        self.power_action("suspend", id).await
    }

    /// 恢复虚拟机
    pub async fn resume(&self, id: Uuid) -> Result<()> {
        ensure_id("vm.resume", id)?;
        info!("恢复虚拟机: {}", id);
        self.power_action("resume", id).await
    }

    /// 电源动作统一走通配形式，ID 放在请求体
    async fn power_action(&self, action: &str, id: Uuid) -> Result<()> {
        let path = wildcard_action("vms", action);
        let body = self
            .client
            .request_text(Method::POST, &path, Some(serde_json::json!({ "id": id })))
            .await?;

        if let Some(task) = self.client.task().handle_task_response(&body, true).await? {
            ensure_task_success(task)?;
        }
        Ok(())
    }

    // ============================================
    // 标签
    // ============================================

    /// 添加标签
    pub async fn add_tag(&self, id: Uuid, tag: &str) -> Result<()> {
        ensure_id("vm.add_tag", id)?;
        ensure_tag("vm.add_tag", tag)?;
        info!("添加虚拟机标签: {} -> {}", tag, id);

        let path = format!("{}/tags/{}", resource_id("vms", id), urlencoding::encode(tag));
        self.client
            .request_text(Method::PUT, &path, None::<()>)
            .await?;
        Ok(())
    }

    /// 移除标签
    pub async fn remove_tag(&self, id: Uuid, tag: &str) -> Result<()> {
        ensure_id("vm.remove_tag", id)?;
        ensure_tag("vm.remove_tag", tag)?;
        info!("移除虚拟机标签: {} <- {}", tag, id);

        let path = format!("{}/tags/{}", resource_id("vms", id), urlencoding::encode(tag));
        self.client
            .request_text(Method::DELETE, &path, None::<()>)
            .await?;
        Ok(())
    }

    // ============================================
    // 快照 / 迁移
    // ============================================

    /// 创建虚拟机快照，返回快照 ID
    pub async fn snapshot(&self, id: Uuid, name: &str) -> Result<Uuid> {
        ensure_id("vm.snapshot", id)?;
        info!("创建虚拟机快照: {} -> {}", id, name);

        let path = PathBuilder::new()
            .resource("vms")
            .id(id)
            .actions_group()
            .action("snapshot")
            .build();
        let body = self
            .client
            .request_text(Method::POST, &path, Some(serde_json::json!({ "name_label": name })))
            .await?;

        if let Some(task) = self.client.task().handle_task_response(&body, true).await? {
            let task = ensure_task_success(task)?;
            return task.result_uuid().ok_or_else(|| {
                Error::OperationFailed(format!("快照任务 {} 未返回快照 ID", task.id))
            });
        }

        // 响应体直接携带快照 ID
        Uuid::parse_str(trim_body(&body)).map_err(|e| Error::Decode {
            type_name: std::any::type_name::<Uuid>(),
            message: e.to_string(),
            body,
        })
    }

    /// 迁移虚拟机到指定宿主机
    pub async fn migrate(&self, id: Uuid, target_host: Uuid) -> Result<()> {
        ensure_id("vm.migrate", id)?;
        ensure_id("vm.migrate", target_host)?;
        info!("迁移虚拟机: {} -> {}", id, target_host);

        let path = PathBuilder::new()
            .resource("vms")
            .id(id)
            .actions_group()
            .action("migrate")
            .build();
        let body = self
            .client
            .request_text(
                Method::POST,
                &path,
                Some(serde_json::json!({ "targetHost": target_host })),
            )
            .await?;

        if let Some(task) = self.client.task().handle_task_response(&body, true).await? {
            ensure_task_success(task)?;
        }
        Ok(())
    }

    /// 等待指定任务并返回产物虚拟机
    ///
    /// 配合 [`VmApi::create_no_wait`] 使用。
    pub async fn wait_created(&self, task_id: &str) -> Result<Vm> {
        let task = self.client.task().wait(task_id).await?;
        let task = ensure_task_success(task)?;
        let vm_id = task.result_uuid().ok_or_else(|| {
            Error::OperationFailed(format!("任务 {} 未返回虚拟机 ID", task.id))
        })?;
        self.get(vm_id).await
    }
}
