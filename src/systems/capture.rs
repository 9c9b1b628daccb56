//! 抓拍存储
//!
//! 告警时把当前帧交给外部存储, 返回引用标识 (路径/句柄)
//! 加密与审计由存储实现自行负责

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tracing::debug;

use crate::detection::types::Frame;

/// 抓拍存储接口
pub trait CaptureStore: Send {
    /// 保存帧并返回引用标识
    fn persist_and_protect(&mut self, frame: &Frame, at: DateTime<Local>) -> Result<String>;
}

/// 磁盘JPEG抓拍: `{dir}/detection_{YYYYmmdd_HHMMSS}_{frame_id}.jpg`
pub struct DiskCaptureStore {
    dir: PathBuf,
}

impl DiskCaptureStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl CaptureStore for DiskCaptureStore {
    fn persist_and_protect(&mut self, frame: &Frame, at: DateTime<Local>) -> Result<String> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("创建抓拍目录失败: {}", self.dir.display()))?;

        let name = format!("detection_{}_{}.jpg", at.format("%Y%m%d_%H%M%S"), frame.id);
        let path = self.dir.join(name);
        frame
            .image
            .save(&path)
            .with_context(|| format!("保存抓拍失败: {}", path.display()))?;

        debug!("📸 抓拍已保存: {}", path.display());
        Ok(path.display().to_string())
    }
}
