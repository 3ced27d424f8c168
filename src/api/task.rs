//! 任务查询与跟踪 API
//!
//! 变更类操作往往不直接返回结果，而是在响应体里塞一条任务句柄
//! 路径。这里提供：
//! - 句柄判别与 ID 抽取
//! - 任务状态查询
//! - 轮询等待（固定间隔、可取消、可限时）
//! - 任务中止

use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::client::Client;
use crate::error::{Error, Result};
use crate::models::{ListOptions, ListParams, Task, TaskStatus};
use crate::path::PathBuilder;

use super::trim_body;

/// 任务句柄路径前缀
pub const TASK_URL_PREFIX: &str = "/rest/v0/tasks/";

/// 轮询间隔
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// 判别响应体是否恰为任务句柄路径
///
/// 仅接受 `/rest/v0/tasks/<id>` 的精确形态，不允许多余路径片段。
pub fn is_task_url(body: &str) -> bool {
    match body.strip_prefix(TASK_URL_PREFIX) {
        Some(rest) => !rest.is_empty() && !rest.contains('/'),
        None => false,
    }
}

/// 从任务句柄路径抽取任务 ID
///
/// 已剥好前缀的裸 ID 原样通过，其余输入不做改写。
pub fn extract_task_id(body: &str) -> &str {
    body.strip_prefix(TASK_URL_PREFIX).unwrap_or(body)
}

/// 等待选项
#[derive(Debug, Clone, Default)]
pub struct WaitOptions {
    /// 取消令牌，在每次轮询迭代之间被观察
    pub cancel: Option<CancelToken>,
}

/// 任务查询与跟踪 API
pub struct TaskApi<'a> {
    client: &'a Client,
}

impl<'a> TaskApi<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// 查询任务列表
    pub async fn list(&self, options: &ListOptions) -> Result<Vec<Task>> {
        self.client
            .request(Method::GET, "tasks", Some(ListParams::from(options)))
            .await
    }

    /// 查询任务当前状态
    pub async fn get(&self, id: &str) -> Result<Task> {
        let path = PathBuilder::new().resource("tasks").raw_id(id).build();
        self.client.request(Method::GET, &path, None::<()>).await
    }

    /// 轮询任务直到终态
    pub async fn wait(&self, id: &str) -> Result<Task> {
        self.wait_with_options(id, WaitOptions::default()).await
    }

    /// 轮询任务直到终态，受取消令牌控制
    ///
    /// 每次迭代先观察取消，再查询状态；查询遇到瞬时传输错误时
    /// 记日志并等一个间隔重试，不主动升级，由调用方的时限兜底。
    pub async fn wait_with_options(&self, id: &str, options: WaitOptions) -> Result<Task> {
        info!("等待任务完成: {}", id);

        loop {
            if let Some(cancel) = &options.cancel {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
            }

            match self.get(id).await {
                Ok(task) if task.status.is_terminal() => {
                    info!("任务 {} 进入终态: {:?}", id, task.status);
                    return Ok(task);
                }
                Ok(_) => {}
                Err(e) if e.is_transient() => {
                    warn!(
                        "查询任务 {} 瞬时失败，{} 秒后重试: {}",
                        id,
                        POLL_INTERVAL.as_secs(),
                        e
                    );
                }
                Err(e) => return Err(e),
            }

            match &options.cancel {
                Some(cancel) => {
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(Error::Cancelled),
                        _ = tokio::time::sleep(POLL_INTERVAL) => {}
                    }
                }
                None => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }
    }

    /// 限时等待任务终态
    ///
    /// 超时返回携带任务 ID 与时限的超时错误。
    pub async fn wait_with_timeout(&self, id: &str, timeout: Duration) -> Result<Task> {
        match tokio::time::timeout(timeout, self.wait(id)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Deadline {
                task_id: id.to_string(),
                elapsed: timeout,
            }),
        }
    }

    /// 请求中止任务
    ///
    /// 服务端答复 `success: false` 时报错，不做重试；任务随后的
    /// 终态不保证是 failure。
    pub async fn abort(&self, id: &str) -> Result<()> {
        info!("中止任务: {}", id);

        let path = PathBuilder::new()
            .resource("tasks")
            .raw_id(id)
            .action("abort")
            .build();
        let body = self.client.request_text(Method::POST, &path, None::<()>).await?;

        if let Ok(value) = serde_json::from_str::<Value>(&body) {
            if value.get("success").and_then(Value::as_bool) == Some(false) {
                return Err(Error::OperationFailed(format!("中止任务 {} 被服务端拒绝", id)));
            }
        }
        Ok(())
    }

    /// 判别变更响应并交给跟踪器
    ///
    /// 响应体是任务句柄时返回对应任务（`wait` 为真则等到终态），
    /// 否则返回 None，由调用方按最终结果解读响应体。JSON 引号
    /// 包裹的句柄同样接受。
    pub async fn handle_task_response(&self, body: &str, wait: bool) -> Result<Option<Task>> {
        let body = trim_body(body);
        if !is_task_url(body) {
            return Ok(None);
        }

        let id = extract_task_id(body);
        let task = if wait { self.wait(id).await? } else { self.get(id).await? };
        Ok(Some(task))
    }
}

/// 终态失败折算为错误，成功原样返回
pub(crate) fn ensure_task_success(task: Task) -> Result<Task> {
    if task.status == TaskStatus::Failure {
        return Err(Error::TaskFailed {
            message: task.failure_message(),
            id: task.id,
        });
    }
    Ok(task)
}
