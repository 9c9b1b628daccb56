//! 数字卫兵核心 (Digital Sentinel Core)
//!
//! 把逐帧检测框变成身份稳定的跟踪目标, 并据此驱动告警与录像
pub mod config; // 监控配置参数
pub mod detection; // 跟踪/识别/区域/叠加层
pub mod error; // 核心错误类型
pub mod systems; // 检测线程、告警、录像

pub use crate::config::SentinelConfig;
pub use crate::error::SentinelError;

