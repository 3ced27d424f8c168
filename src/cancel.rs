//! 协作式取消
//!
//! 所有可长时间阻塞的操作（任务轮询、等待）都接受一个取消令牌，
//! 在每次轮询迭代之间以及发出请求之前检查取消状态。

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::Notify;

/// 可克隆的取消令牌，克隆体共享同一取消状态
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    shared: Arc<Shared>,
}

#[derive(Debug, Default)]
struct Shared {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    /// 创建未取消状态的令牌
    pub fn new() -> Self {
        Self::default()
    }

    /// 触发取消
    pub fn cancel(&self) {
        if !self.shared.cancelled.swap(true, Ordering::Relaxed) {
            self.shared.notify.notify_waiters();
        }
    }

    /// 是否已取消
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Relaxed)
    }

    /// 等待取消发生
    pub fn cancelled(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let token = self.clone();
        async move {
            if token.is_cancelled() {
                return;
            }
            loop {
                token.shared.notify.notified().await;
                if token.is_cancelled() {
                    return;
                }
            }
        }
    }
}
