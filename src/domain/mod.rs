// ==========================================
// 学校排课系统 - 领域层
// ==========================================
// 职责: 实体与值类型定义, 快照与占位推演视图
// 红线: 领域层不依赖数据库, 不依赖引擎
// ==========================================

pub mod action_log;
pub mod block;
pub mod school;
pub mod snapshot;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use block::DistributionBlock;
pub use school::{Room, SchoolClass, SchoolSettings, Teacher, DEFAULT_MAX_DAYS, DEFAULT_MAX_HOURS};
pub use snapshot::{PlacementView, ScheduleSnapshot};
pub use types::{EntityKind, PlacementSource, SlotState, TimeSlot};
