// ==========================================
// 学校排课系统 - 操作日志领域模型
// ==========================================
// 红线: 所有课表写入必须留痕
// 用途: 审计追踪, 调课历史回溯
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,               // 日志ID (UUID)
    pub action_type: String,             // 操作类型 (存储为字符串)
    pub block_id: Option<String>,        // 关联教学块 (可选)
    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)
    pub detail: Option<String>,          // 详细描述
    pub action_ts: NaiveDateTime,        // 操作时间戳
    pub actor: String,                   // 操作人
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    ManualMove,   // 单块人工调课
    CascadeApply, // 级联变更集落库
    Lock,         // 锁定教学块
    Unlock,       // 解锁教学块
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::ManualMove => "ManualMove",
            ActionType::CascadeApply => "CascadeApply",
            ActionType::Lock => "Lock",
            ActionType::Unlock => "Unlock",
        }
    }

    /// 从字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ManualMove" => Some(ActionType::ManualMove),
            "CascadeApply" => Some(ActionType::CascadeApply),
            "Lock" => Some(ActionType::Lock),
            "Unlock" => Some(ActionType::Unlock),
            _ => None,
        }
    }
}

impl ActionLog {
    /// 创建新的操作日志
    pub fn new(action_type: ActionType, actor: &str) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            action_type: action_type.as_str().to_string(),
            block_id: None,
            payload_json: None,
            detail: None,
            action_ts: chrono::Utc::now().naive_utc(),
            actor: actor.to_string(),
        }
    }

    /// 设置关联教学块
    pub fn with_block_id(mut self, block_id: &str) -> Self {
        self.block_id = Some(block_id.to_string());
        self
    }

    /// 设置操作负载 (转换为JSON)
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Self {
        self.payload_json = serde_json::to_value(payload).ok();
        self
    }

    /// 设置详细描述
    pub fn with_detail(mut self, detail: String) -> Self {
        self.detail = Some(detail);
        self
    }
}
