//! Xen Orchestra 管理平台客户端
//!
//! 同时接入管理平台的两套远程接口：现代 REST 接口与走持久
//! WebSocket 通道的旧式 JSON-RPC 接口，向应用代码提供类型化的
//! 虚拟机、存储、快照、备份、恢复、资源池、宿主机、网络与任务
//! 访问能力。
//!
//! # 功能
//!
//! - **虚拟机管理** (`VmApi`): 创建、删除、电源操作、标签、快照、迁移
//! - **快照管理** (`SnapshotApi`): 查询、删除、回滚（JSON-RPC `vm.revert`）
//! - **资源池管理** (`PoolApi`): 查询、滚动更新、标签
//! - **宿主机管理** (`HostApi`): 查询、标签
//! - **网络管理** (`NetworkApi`): 查询、删除、标签
//! - **虚拟磁盘管理** (`VdiApi`): 查询、删除、迁移、标签
//! - **存储库管理** (`StorageApi`): 查询、标签
//! - **备份作业管理** (`BackupApi`): 双通道合并查询、增删改、运行、执行日志
//! - **恢复管理** (`RestoreApi`): 恢复日志、恢复点、元数据恢复、备份导入
//! - **任务跟踪** (`TaskApi`): 任务句柄判别、轮询等待、限时等待、中止
//!
//! # 示例
//!
//! ```ignore
//! use xoa_client::{Client, Config, CreateVmRequest, ListOptions};
//!
//! // 从环境变量构造客户端（XOA_URL / XOA_TOKEN 等）
//! let client = Client::from_env().await?;
//!
//! // 创建虚拟机并等待任务完成
//! let req = CreateVmRequest::new(pool_id, "web-01", template_id)
//!     .with_cpus(4)
//!     .with_memory(4 * 1024 * 1024 * 1024);
//! let vm = client.vm().create(req).await?;
//!
//! // 按过滤条件查询
//! let running = client
//!     .vm()
//!     .list(&ListOptions::new().with_filter("power_state:Running"))
//!     .await?;
//!
//! // 限时等待任务终态
//! let task = client
//!     .task()
//!     .wait_with_timeout("0lr4zljbe", std::time::Duration::from_secs(60))
//!     .await?;
//! ```

pub mod api;
pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod path;
pub mod retry;
pub mod rpc;

pub use cancel::CancelToken;
pub use client::Client;
pub use config::{Config, RetryMode};
pub use error::{Error, Result};

// 导出 API 模块
pub use api::{
    task::{extract_task_id, is_task_url},
    BackupApi, HostApi, NetworkApi, PoolApi, RestoreApi, SnapshotApi, StorageApi, TaskApi, VdiApi,
    VmApi, WaitOptions,
};

// 导出数据模型
pub use models::{
    // 任务
    Task, TaskResult, TaskStatus,

    // 虚拟机
    CreateVmRequest, PowerState, Vm, VmCpus, VmMemory,

    // 其余实体
    Host, Network, Pool, Snapshot, StorageRepository, Vdi,

    // 备份 / 恢复
    BackupJob, BackupLog, JobKind, RestoreLog, RestorePoint,

    // 查询选项
    ListOptions,
};

// 路径与过滤条件构造
pub use path::{resource_id, wildcard_action, FilterBuilder, PathBuilder, VmFilter};
