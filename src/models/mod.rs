//! 平台数据模型
//!
//! REST / JSON-RPC 双通道共享的实体记录与请求结构。
//! 实体字段遵循服务端对象的命名（`name_label`、`$poolId` 等），
//! 请求结构提供链式构造方法。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================
// 任务
// ============================================

/// 任务状态机: pending → running → {success, failure}，终态不可变
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Success,
    Failure,
}

impl TaskStatus {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failure)
    }
}

/// 异步任务记录，服务端持有，客户端只读
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// 任务 ID（不透明字符串，非 UUID）
    pub id: String,

    /// 任务名称
    #[serde(default)]
    pub name: String,

    /// 当前状态
    pub status: TaskStatus,

    /// 开始时间（毫秒时间戳）
    #[serde(default)]
    pub start: Option<i64>,

    /// 最近更新时间（毫秒时间戳）
    #[serde(default, rename = "updatedAt")]
    pub updated_at: Option<i64>,

    /// 结束时间（毫秒时间戳）
    #[serde(default)]
    pub end: Option<i64>,

    /// 失败原因等附加消息
    #[serde(default)]
    pub message: Option<String>,

    /// 任务产物，通常携带新建实体的 ID
    #[serde(default)]
    pub result: Option<TaskResult>,
}

/// 任务产物记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// 产物实体 ID，可能是 UUID 也可能是不透明字符串
    #[serde(default)]
    pub id: Option<String>,

    /// 其余产物字段原样保留
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Task {
    /// 产物 ID 的 UUID 形式，非 UUID 产物返回 None
    pub fn result_uuid(&self) -> Option<Uuid> {
        self.result
            .as_ref()
            .and_then(|r| r.id.as_deref())
            .and_then(|id| Uuid::parse_str(id).ok())
    }

    /// 失败消息，无消息时给出占位说明
    pub fn failure_message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| "服务端未提供失败原因".to_string())
    }
}

// ============================================
// 虚拟机
// ============================================

/// 电源状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    Running,
    Halted,
    Suspended,
    Paused,
}

impl PowerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerState::Running => "Running",
            PowerState::Halted => "Halted",
            PowerState::Suspended => "Suspended",
            PowerState::Paused => "Paused",
        }
    }
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CPU 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmCpus {
    /// 当前核数
    pub number: u32,

    /// 最大核数
    #[serde(default)]
    pub max: Option<u32>,
}

/// 内存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmMemory {
    /// 内存大小（字节）
    pub size: u64,
}

/// 虚拟机记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vm {
    /// 虚拟机 ID
    pub id: Uuid,

    /// 名称
    pub name_label: String,

    /// 描述
    #[serde(default)]
    pub name_description: String,

    /// 电源状态
    pub power_state: PowerState,

    /// 标签集合（顺序无关）
    #[serde(default)]
    pub tags: Vec<String>,

    /// CPU 配置
    #[serde(default, rename = "CPUs")]
    pub cpus: Option<VmCpus>,

    /// 内存配置
    #[serde(default)]
    pub memory: Option<VmMemory>,

    /// 所属资源池
    #[serde(default, rename = "$poolId")]
    pub pool_id: Option<Uuid>,
}

/// 创建虚拟机请求
///
/// 目标资源池通过 `pool_id` 指定（进入路径而非请求体）。
#[derive(Debug, Clone, Serialize)]
pub struct CreateVmRequest {
    /// 目标资源池 ID
    #[serde(skip)]
    pub pool_id: Uuid,

    /// 虚拟机名称
    pub name_label: String,

    /// 描述
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_description: Option<String>,

    /// 模板 ID
    pub template: Uuid,

    /// CPU 核数
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpus: Option<u32>,

    /// 内存大小（字节）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,

    /// 创建后立即启动
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot: Option<bool>,

    /// 初始标签
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
}

impl CreateVmRequest {
    pub fn new(pool_id: Uuid, name_label: impl Into<String>, template: Uuid) -> Self {
        Self {
            pool_id,
            name_label: name_label.into(),
            name_description: None,
            template,
            cpus: None,
            memory: None,
            boot: None,
            tags: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.name_description = Some(description.into());
        self
    }

    pub fn with_cpus(mut self, cpus: u32) -> Self {
        self.cpus = Some(cpus);
        self
    }

    pub fn with_memory(mut self, bytes: u64) -> Self {
        self.memory = Some(bytes);
        self
    }

    pub fn with_boot(mut self, boot: bool) -> Self {
        self.boot = Some(boot);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

// ============================================
// 快照
// ============================================

/// 虚拟机快照记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// 快照 ID
    pub id: Uuid,

    /// 名称
    pub name_label: String,

    /// 描述
    #[serde(default)]
    pub name_description: String,

    /// 快照时间（秒时间戳）
    #[serde(default)]
    pub snapshot_time: Option<i64>,

    /// 源虚拟机
    #[serde(default, rename = "$snapshot_of")]
    pub snapshot_of: Option<Uuid>,

    /// 标签集合
    #[serde(default)]
    pub tags: Vec<String>,
}

// ============================================
// 资源池 / 主机 / 网络 / 存储
// ============================================

/// 资源池记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    pub id: Uuid,
    pub name_label: String,
    #[serde(default)]
    pub name_description: String,
    /// 池主节点
    #[serde(default)]
    pub master: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// 宿主机记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub id: Uuid,
    pub name_label: String,
    #[serde(default)]
    pub name_description: String,
    /// 管理地址
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub power_state: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, rename = "$poolId")]
    pub pool_id: Option<Uuid>,
}

/// 网络记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub id: Uuid,
    pub name_label: String,
    #[serde(default)]
    pub name_description: String,
    /// 桥接名
    #[serde(default)]
    pub bridge: Option<String>,
    #[serde(default, rename = "MTU")]
    pub mtu: Option<u32>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, rename = "$poolId")]
    pub pool_id: Option<Uuid>,
}

/// 虚拟磁盘记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vdi {
    pub id: Uuid,
    pub name_label: String,
    #[serde(default)]
    pub name_description: String,
    /// 磁盘大小（字节）
    #[serde(default)]
    pub size: Option<u64>,
    /// 所在存储库
    #[serde(default, rename = "$SR")]
    pub sr: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// 存储库记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageRepository {
    pub id: Uuid,
    pub name_label: String,
    #[serde(default)]
    pub name_description: String,
    /// 存储类型（lvm、nfs、ext 等）
    #[serde(default, rename = "SR_type")]
    pub sr_type: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    /// 容量（字节）
    #[serde(default)]
    pub size: Option<i64>,
    /// 已用量（字节）
    #[serde(default)]
    pub usage: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, rename = "$poolId")]
    pub pool_id: Option<Uuid>,
}

// ============================================
// 备份 / 恢复
// ============================================

/// 备份作业种类，各自挂在独立的 REST 子资源下
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Vm,
    Metadata,
    Mirror,
}

impl JobKind {
    /// REST 子资源名
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Vm => "vm",
            JobKind::Metadata => "metadata",
            JobKind::Mirror => "mirror",
        }
    }

    /// 对应的 JSON-RPC getJob 方法
    pub fn get_job_method(&self) -> &'static str {
        match self {
            JobKind::Vm => "backupNg.getJob",
            JobKind::Metadata => "metadataBackup.getJob",
            JobKind::Mirror => "mirrorBackup.getJob",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 备份作业
///
/// 展示字段来自 REST，settings/compression 由 JSON-RPC 补全后合并。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupJob {
    /// 作业 ID
    pub id: Uuid,

    /// 作业名称
    #[serde(default)]
    pub name: String,

    /// 备份模式（full/delta）
    #[serde(default)]
    pub mode: Option<String>,

    /// 作业类型标识
    #[serde(default, rename = "type")]
    pub job_type: Option<String>,

    /// 调度配置表，按调度 ID 键控
    #[serde(default)]
    pub settings: BTreeMap<String, serde_json::Value>,

    /// 压缩算法，JSON-RPC 侧补全
    #[serde(default)]
    pub compression: Option<String>,

    /// 作业种类，由客户端在查询时填入
    #[serde(skip)]
    pub kind: Option<JobKind>,

    /// 首个携带 exportRetention 的 UUID 调度键
    #[serde(skip)]
    pub schedule_id: Option<Uuid>,
}

/// 备份执行日志
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupLog {
    /// 日志 ID（不透明字符串）
    pub id: String,

    #[serde(default, rename = "jobId")]
    pub job_id: Option<Uuid>,

    /// 执行状态（success/failure/interrupted 等）
    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub start: Option<i64>,

    #[serde(default)]
    pub end: Option<i64>,

    #[serde(default)]
    pub message: Option<String>,
}

/// 恢复执行日志
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreLog {
    /// 日志 ID（不透明字符串）
    pub id: String,

    #[serde(default, rename = "jobId")]
    pub job_id: Option<Uuid>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub start: Option<i64>,

    #[serde(default)]
    pub end: Option<i64>,

    #[serde(default)]
    pub message: Option<String>,

    /// 恢复出的虚拟机
    #[serde(default, rename = "vmId")]
    pub vm_id: Option<Uuid>,
}

/// 可用恢复点（由成功的恢复日志投影而来）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestorePoint {
    /// 恢复点 ID，沿用日志 ID
    pub id: String,

    #[serde(default)]
    pub job_id: Option<Uuid>,

    #[serde(default)]
    pub vm_id: Option<Uuid>,

    /// 恢复完成时间（毫秒时间戳）
    #[serde(default)]
    pub timestamp: Option<i64>,
}

// ============================================
// 查询选项
// ============================================

/// 列表查询选项
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// 返回条数上限
    pub limit: Option<u32>,

    /// 字段选择器，`*` 表示全部
    pub fields: Option<String>,

    /// `field:value` 合取过滤串
    pub filter: Option<String>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = Some(fields.into());
        self
    }

    /// 设置过滤串，空串视为未设置（不随查询发送）
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        let filter = filter.into();
        self.filter = if filter.is_empty() { None } else { Some(filter) };
        self
    }
}

/// 列表查询的线上参数形式
#[derive(Debug, Clone, Serialize, Default)]
pub(crate) struct ListParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl From<&ListOptions> for ListParams {
    fn from(options: &ListOptions) -> Self {
        Self {
            limit: options.limit,
            fields: options.fields.clone(),
            filter: options
                .filter
                .as_ref()
                .filter(|f| !f.is_empty())
                .cloned(),
        }
    }
}
