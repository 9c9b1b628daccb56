//! 核心错误类型
//! Error types owned by the sentinel core

use thiserror::Error;

/// 核心错误
///
/// 外部协作者(检测源/分类器/存储)统一返回 `anyhow::Result`,
/// 这里只描述核心自身能识别的失败
#[derive(Debug, Error)]
pub enum SentinelError {
    /// 检测框非法 (NaN / 非正尺寸)
    #[error("非法检测框 #{index}: x={x} y={y} w={width} h={height}")]
    InvalidDetection {
        index: usize,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },

    /// 同一周期内同一ID出现两次
    #[error("重复的跟踪ID: {0}")]
    DuplicateId(u32),

    /// 配置解析失败
    #[error("配置解析失败: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SentinelError>;
