//! 瞬时错误的指数退避重试
//!
//! 默认关闭。配置为 backoff 模式后，仅对与客户机初始化存在竞争的
//! 少数操作生效，总时长受配置上限约束。

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::config::RetryMode;
use crate::error::Result;

/// 退避参数
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// 首次重试延迟（秒）
    pub initial_delay: u64,

    /// 单次延迟上限（秒）
    pub max_delay: u64,

    /// 延迟倍增系数
    pub backoff_multiplier: f64,

    /// 重试总时长上限（秒）
    pub max_elapsed: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: 1,
            max_delay: 60,
            backoff_multiplier: 2.0,
            max_elapsed: 300,
        }
    }
}

impl BackoffPolicy {
    /// 以配置的总时长上限构造默认退避参数
    pub fn with_max_elapsed(max_elapsed: Duration) -> Self {
        Self {
            max_elapsed: max_elapsed.as_secs(),
            ..Default::default()
        }
    }

    /// 第 attempt 次重试前的延迟: initial * multiplier^attempt，封顶 max_delay
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay = self.initial_delay as f64 * self.backoff_multiplier.powi(attempt as i32);
        let capped = delay.min(self.max_delay as f64);
        Duration::from_secs(capped as u64)
    }

    pub fn max_elapsed(&self) -> Duration {
        Duration::from_secs(self.max_elapsed)
    }
}

/// 对瞬时错误按退避策略重试
///
/// 非 backoff 模式、非瞬时错误或超出总时长上限时立即返回。
pub(crate) async fn with_backoff<T, F, Fut>(
    mode: RetryMode,
    policy: &BackoffPolicy,
    operation: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        match f().await {
            Err(e)
                if mode == RetryMode::Backoff
                    && e.is_transient()
                    && started.elapsed() < policy.max_elapsed() =>
            {
                let delay = policy.calculate_delay(attempt);
                warn!(
                    operation = operation,
                    attempt = attempt + 1,
                    delay_secs = delay.as_secs(),
                    "瞬时错误，退避后重试: {}",
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}
