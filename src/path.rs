//! REST 路径拼装与过滤条件构造
//!
//! [`PathBuilder`] 按顺序累积资源名、UUID、不透明 ID、动作分组等
//! 片段，`build` 以 `/` 连接，不带首尾斜杠。拼装本身是纯函数，
//! 片段顺序是否合法由调用方保证。

use uuid::Uuid;

/// 动作端点的通配片段，服务端期望 ID 放在请求体而非路径中时使用
pub const WILDCARD: &str = "_";

/// 路径构造器
#[derive(Debug, Clone, Default)]
pub struct PathBuilder {
    segments: Vec<String>,
}

impl PathBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加资源名片段，如 `vms`、`pools`
    pub fn resource(mut self, name: &str) -> Self {
        self.segments.push(name.to_string());
        self
    }

    /// 追加 UUID 片段（规范化 8-4-4-4-12 小写形式）
    pub fn id(mut self, id: Uuid) -> Self {
        self.segments.push(id.to_string());
        self
    }

    /// 追加不透明字符串 ID 片段（任务 ID、日志 ID 等）
    pub fn raw_id(mut self, id: &str) -> Self {
        self.segments.push(id.to_string());
        self
    }

    /// 追加通配片段 `_`
    pub fn wildcard(mut self) -> Self {
        self.segments.push(WILDCARD.to_string());
        self
    }

    /// 追加动作分组片段 `actions`
    pub fn actions_group(mut self) -> Self {
        self.segments.push("actions".to_string());
        self
    }

    /// 追加动作名片段
    pub fn action(mut self, name: &str) -> Self {
        self.segments.push(name.to_string());
        self
    }

    /// 以 `/` 连接全部片段
    pub fn build(self) -> String {
        self.segments.join("/")
    }
}

/// `<resource>/<uuid>` 形式的便捷拼装
pub fn resource_id(resource: &str, id: Uuid) -> String {
    PathBuilder::new().resource(resource).id(id).build()
}

/// `<resource>/_/actions/<action>` 形式的便捷拼装
pub fn wildcard_action(resource: &str, action: &str) -> String {
    PathBuilder::new()
        .resource(resource)
        .wildcard()
        .actions_group()
        .action(action)
        .build()
}

// ============================================
// 过滤条件
// ============================================

/// 已识别的过滤字段
pub const FILTER_FIELD_POWER_STATE: &str = "power_state";
pub const FILTER_FIELD_NAME_LABEL: &str = "name_label";
pub const FILTER_FIELD_POOL_ID: &str = "pool_id";
pub const FILTER_FIELD_TAGS: &str = "tags";

/// 过滤条件构造器，产出逗号连接的 `field:value` 合取式
///
/// 字段名不做白名单限制，任意字段原样透传。
#[derive(Debug, Clone, Default)]
pub struct FilterBuilder {
    clauses: Vec<String>,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个 `field:value` 子句，value 为空时整条省略
    pub fn clause(mut self, field: &str, value: &str) -> Self {
        if !value.is_empty() {
            self.clauses.push(format!("{}:{}", field, value));
        }
        self
    }

    /// 是否没有任何子句
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// 以逗号连接全部子句，无子句时为空串
    pub fn build(self) -> String {
        self.clauses.join(",")
    }
}

/// 虚拟机过滤条件
///
/// 空字段不产生子句，全空时产出空串（调用方应省略 filter 参数
/// 而不是发送空白值）。
#[derive(Debug, Clone, Default)]
pub struct VmFilter {
    pub power_state: String,
    pub name_label: String,
    pub pool_id: String,
    pub tags: String,
}

impl VmFilter {
    /// 构造过滤字符串
    pub fn to_filter(&self) -> String {
        FilterBuilder::new()
            .clause(FILTER_FIELD_POWER_STATE, &self.power_state)
            .clause(FILTER_FIELD_NAME_LABEL, &self.name_label)
            .clause(FILTER_FIELD_POOL_ID, &self.pool_id)
            .clause(FILTER_FIELD_TAGS, &self.tags)
            .build()
    }
}
