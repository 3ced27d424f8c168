//! 备份作业管理 API
//!
//! 备份作业是双通道复合体：展示字段挂在 REST 子资源
//! `backup/jobs/{vm|metadata|mirror}` 下，settings 与 compression
//! 只能从对应种类的 JSON-RPC 方法取到，查询时在客户端合并。
//! 作业的增删改与运行只存在于 JSON-RPC 侧。

use std::collections::BTreeMap;

use reqwest::Method;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::models::{BackupJob, BackupLog, JobKind, ListOptions, ListParams};
use crate::path::PathBuilder;
use crate::rpc::validate_result;

use super::{ensure_id, task_reply_to_id};

/// 备份作业管理 API
pub struct BackupApi<'a> {
    client: &'a Client,
}

impl<'a> BackupApi<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    // ============================================
    // 作业查询（REST + JSON-RPC 合并）
    // ============================================

    /// 查询备份作业
    ///
    /// 先取 REST 记录，再调对应种类的 getJob 方法补全 settings
    /// 与 compression；补全失败只告警，按 REST 记录原样返回。
    pub async fn get_job(&self, kind: JobKind, id: Uuid) -> Result<BackupJob> {
        ensure_id("backup.get_job", id)?;
        info!("查询备份作业: {} ({})", id, kind);

        let path = PathBuilder::new()
            .resource("backup")
            .resource("jobs")
            .resource(kind.as_str())
            .id(id)
            .build();
        let mut job: BackupJob = self.client.request(Method::GET, &path, None::<()>).await?;
        job.kind = Some(kind);

        match self
            .client
            .rpc_call_value(kind.get_job_method(), serde_json::json!({ "id": id }))
            .await
        {
            Ok(value) => {
                if let Some(settings) = value.get("settings").and_then(Value::as_object) {
                    for (key, value) in settings {
                        job.settings.insert(key.clone(), value.clone());
                    }
                }
                if let Some(compression) = value.get("compression").and_then(Value::as_str) {
                    job.compression = Some(compression.to_string());
                }
            }
            Err(e) => {
                warn!("JSON-RPC 补全备份作业 {} 失败，返回 REST 记录: {}", id, e);
            }
        }

        job.schedule_id = find_schedule_id(&job.settings);
        Ok(job)
    }

    /// 查询某一种类的全部备份作业
    ///
    /// 列表端点返回作业 URL 清单，逐条解析后经 [`BackupApi::get_job`]
    /// 还原为完整记录；格式异常的路径告警跳过，不中断整个列表。
    pub async fn list_jobs(&self, kind: JobKind) -> Result<Vec<BackupJob>> {
        info!("查询备份作业列表: {}", kind);

        let path = PathBuilder::new()
            .resource("backup")
            .resource("jobs")
            .resource(kind.as_str())
            .build();
        let urls: Vec<String> = self.client.request(Method::GET, &path, None::<()>).await?;

        let mut jobs = Vec::with_capacity(urls.len());
        for url in urls {
            let segments: Vec<&str> = url.split('/').collect();
            if segments.len() < 7 {
                warn!("跳过格式异常的作业路径: {}", url);
                continue;
            }
            let Some(id) = segments.last().and_then(|s| Uuid::parse_str(s).ok()) else {
                warn!("跳过无法解析的作业 ID: {}", url);
                continue;
            };
            jobs.push(self.get_job(kind, id).await?);
        }
        Ok(jobs)
    }

    /// 查询全部种类的备份作业
    pub async fn list_all_jobs(&self) -> Result<Vec<BackupJob>> {
        let mut jobs = Vec::new();
        for kind in [JobKind::Vm, JobKind::Metadata, JobKind::Mirror] {
            jobs.extend(self.list_jobs(kind).await?);
        }
        Ok(jobs)
    }

    // ============================================
    // 作业变更（JSON-RPC）
    // ============================================

    /// 创建备份作业，返回新作业 ID
    pub async fn create_job(&self, params: Value) -> Result<Uuid> {
        info!("创建备份作业");

        let value = self.client.rpc_call_value("backupNg.createJob", params).await?;
        let id = value
            .as_str()
            .map(str::to_string)
            .or_else(|| {
                value
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .ok_or_else(|| Error::Decode {
                type_name: std::any::type_name::<Uuid>(),
                message: "createJob 应答缺少作业 ID".to_string(),
                body: value.to_string(),
            })?;

        Uuid::parse_str(&id).map_err(|e| Error::Decode {
            type_name: std::any::type_name::<Uuid>(),
            message: e.to_string(),
            body: id,
        })
    }

    /// 修改备份作业
    pub async fn edit_job(&self, params: Value) -> Result<()> {
        info!("修改备份作业");
        let result = self.client.rpc_call_value("backupNg.editJob", params).await?;
        validate_result("backupNg.editJob", &result)
    }

    /// 删除备份作业
    pub async fn delete_job(&self, id: Uuid) -> Result<()> {
        ensure_id("backup.delete_job", id)?;
        info!("删除备份作业: {}", id);

        let result = self
            .client
            .rpc_call_value("backupNg.deleteJob", serde_json::json!({ "id": id }))
            .await?;
        validate_result("backupNg.deleteJob", &result)
    }

    // ============================================
    // 作业运行
    // ============================================

    /// 运行整个备份作业
    ///
    /// 对作业中的每一台虚拟机都会执行，影响范围大；按虚拟机
    /// 范围运行请使用 [`BackupApi::run_job_for_vms`]。
    pub async fn run_job(&self, id: Uuid, schedule: Option<Uuid>) -> Result<String> {
        ensure_id("backup.run_job", id)?;
        warn!("run_job 将对作业 {} 中的每台虚拟机执行备份，确认影响范围后再调用", id);

        let mut params = serde_json::Map::new();
        params.insert("id".to_string(), serde_json::json!(id));
        if let Some(schedule) = schedule {
            params.insert("schedule".to_string(), serde_json::json!(schedule));
        }

        let result = self
            .client
            .rpc_call_value("backupNg.runJob", Value::Object(params))
            .await?;
        Ok(task_reply_to_id(result))
    }

    /// 只对指定虚拟机运行备份作业
    ///
    /// 单个 ID 以 `vm` 字段传递，多个以 `vms` 传递；空列表在
    /// 发起任何请求之前被拒绝。
    pub async fn run_job_for_vms(
        &self,
        id: Uuid,
        vm_ids: &[Uuid],
        settings: Option<Value>,
    ) -> Result<String> {
        ensure_id("backup.run_job_for_vms", id)?;
        if vm_ids.is_empty() {
            return Err(Error::Validation(
                "backup.run_job_for_vms: 虚拟机 ID 列表不能为空".to_string(),
            ));
        }
        info!("运行备份作业 {}，限定 {} 台虚拟机", id, vm_ids.len());

        let mut params = serde_json::Map::new();
        params.insert("id".to_string(), serde_json::json!(id));
        if vm_ids.len() == 1 {
            params.insert("vm".to_string(), serde_json::json!(vm_ids[0]));
        } else {
            params.insert("vms".to_string(), serde_json::json!(vm_ids));
        }
        if let Some(settings) = settings {
            params.insert("settings".to_string(), settings);
        }

        let result = self
            .client
            .rpc_call_value("backupNg.runJob", Value::Object(params))
            .await?;
        Ok(task_reply_to_id(result))
    }

    // ============================================
    // 执行日志
    // ============================================

    /// 查询备份执行日志列表
    pub async fn list_logs(&self, options: &ListOptions) -> Result<Vec<BackupLog>> {
        info!("查询备份日志列表");
        self.client
            .request(
                Method::GET,
                &PathBuilder::new().resource("backup").resource("logs").build(),
                Some(ListParams::from(options)),
            )
            .await
    }

    /// 查询备份执行日志详情
    pub async fn get_log(&self, id: &str) -> Result<BackupLog> {
        info!("查询备份日志详情: {}", id);
        let path = PathBuilder::new()
            .resource("backup")
            .resource("logs")
            .raw_id(id)
            .build();
        self.client.request(Method::GET, &path, None::<()>).await
    }
}

/// 在调度配置表中找出首个携带 exportRetention 的 UUID 键
///
/// 该键即作业的调度 ID；键按字典序遍历，结果稳定。
fn find_schedule_id(settings: &BTreeMap<String, Value>) -> Option<Uuid> {
    settings.iter().find_map(|(key, value)| {
        let id = Uuid::parse_str(key).ok()?;
        value.get("exportRetention").map(|_| id)
    })
}
