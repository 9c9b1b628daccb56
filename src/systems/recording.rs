//! 录像生命周期管理
//! Recording lifecycle: idle ⇄ recording
//!
//! - idle → recording: 告警触发, 以时间戳+原因命名新输出
//! - recording: 有活跃目标时空闲计数清零, 无目标时+1
//! - recording → idle: 空闲计数超过阈值时关闭输出
//! - 停止监控时强制关闭
//!
//! 录像期间每个周期同步写入当前帧 (无缓冲队列, 保证帧序)

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::detection::types::Frame;

/// 录像输出句柄
pub trait RecordingSink: Send {
    /// 追加一帧
    fn write(&mut self, frame: &Frame) -> Result<()>;
    /// 刷新并关闭
    fn finish(&mut self) -> Result<()>;
}

/// 录像输出工厂
pub trait Recorder: Send {
    /// 打开新的输出; `first` 为触发录像的帧 (用于确定分辨率)
    fn open(&mut self, name: &str, first: &Frame) -> Result<Box<dyn RecordingSink>>;
}

/// 录像原因
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordReason {
    Detection,
}

impl RecordReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordReason::Detection => "DETECTION",
        }
    }
}

/// 录像状态变化事件
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum RecordingEvent {
    Started {
        name: String,
        reason: RecordReason,
    },
    Stopped {
        name: String,
        frames: u64,
        /// 是否由停止监控强制结束
        forced: bool,
    },
}

/// 录像中的状态
struct ActiveRecording {
    name: String,
    sink: Box<dyn RecordingSink>,
    idle_frames: u32,
    frames_written: u64,
}

/// 录像管理器
pub struct RecordingManager {
    recorder: Box<dyn Recorder>,
    idle_threshold: u32,
    active: Option<ActiveRecording>,
}

impl RecordingManager {
    pub fn new(recorder: Box<dyn Recorder>, idle_threshold: u32) -> Self {
        Self {
            recorder,
            idle_threshold,
            active: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// 当前空闲计数 (未录像时为 None)
    pub fn idle_frames(&self) -> Option<u32> {
        self.active.as_ref().map(|a| a.idle_frames)
    }

    /// 开始录像; 已在录像时不做任何事
    pub fn start(
        &mut self,
        reason: RecordReason,
        now: DateTime<Local>,
        frame: &Frame,
    ) -> Option<RecordingEvent> {
        if self.active.is_some() {
            return None;
        }

        let name = format!("record_{}_{}", now.format("%Y%m%d_%H%M%S"), reason.as_str());
        match self.recorder.open(&name, frame) {
            Ok(sink) => {
                info!("🔴 开始录像: {}", name);
                self.active = Some(ActiveRecording {
                    name: name.clone(),
                    sink,
                    idle_frames: 0,
                    frames_written: 0,
                });
                Some(RecordingEvent::Started { name, reason })
            }
            Err(e) => {
                error!("❌ 打开录像输出失败: {:#}", e);
                None
            }
        }
    }

    /// 每周期调用: 更新空闲计数, 超时则停止, 否则写入当前帧
    pub fn observe(&mut self, active_count: usize, frame: &Frame) -> Option<RecordingEvent> {
        let rec = self.active.as_mut()?;

        if active_count > 0 {
            rec.idle_frames = 0;
        } else {
            rec.idle_frames += 1;
        }

        if rec.idle_frames > self.idle_threshold {
            return self.close(false);
        }

        match rec.sink.write(frame) {
            Ok(()) => rec.frames_written += 1,
            Err(e) => warn!("⚠️ 录像写入失败 (帧 {}): {:#}", frame.id, e),
        }
        None
    }

    /// 停止监控时强制结束录像
    pub fn shutdown(&mut self) -> Option<RecordingEvent> {
        self.close(true)
    }

    fn close(&mut self, forced: bool) -> Option<RecordingEvent> {
        let mut rec = self.active.take()?;
        if let Err(e) = rec.sink.finish() {
            warn!("⚠️ 关闭录像输出失败: {:#}", e);
        }
        info!(
            "⏹️ 停止录像: {} ({} 帧{})",
            rec.name,
            rec.frames_written,
            if forced { ", 强制" } else { "" }
        );
        Some(RecordingEvent::Stopped {
            name: rec.name,
            frames: rec.frames_written,
            forced,
        })
    }
}

impl Drop for RecordingManager {
    fn drop(&mut self) {
        if self.active.is_some() {
            self.shutdown();
        }
    }
}

// ========== 磁盘实现 ==========

/// 帧序列录像: `{dir}/{name}/000001.jpg ...`
pub struct FrameDirRecorder {
    dir: PathBuf,
}

impl FrameDirRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Recorder for FrameDirRecorder {
    fn open(&mut self, name: &str, _first: &Frame) -> Result<Box<dyn RecordingSink>> {
        let path = self.dir.join(name);
        fs::create_dir_all(&path)
            .with_context(|| format!("创建录像目录失败: {}", path.display()))?;
        Ok(Box::new(FrameDirSink { path, seq: 0 }))
    }
}

struct FrameDirSink {
    path: PathBuf,
    seq: u64,
}

impl RecordingSink for FrameDirSink {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        self.seq += 1;
        let file = self.path.join(format!("{:06}.jpg", self.seq));
        frame
            .image
            .save(&file)
            .with_context(|| format!("写入录像帧失败: {}", file.display()))
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}
