/// 系统架构 (System Architecture)
///
/// 检测线程 + 控制线程(界面/命令):
/// - Source:    检测源接口 (外部)
/// - Pipeline:  单周期处理 (关联/识别/特征/告警/录像)
/// - Session:   检测线程与会话控制
/// - Alert / Recording / Capture / Filter: 告警、录像、抓拍、画面增强
pub mod alert;
pub mod capture;
pub mod filter;
pub mod pipeline;
pub mod recording;
pub mod session;
pub mod source;

use serde::Serialize;

use crate::detection::overlay::FrameOverlay;
use crate::detection::types::Frame;
use crate::detection::zone::FeatureRecord;

pub use alert::{Alarm, AlertKind, AlertOrchestrator, AlertRecord, DebouncePolicy, TerminalBell};
pub use capture::{CaptureStore, DiskCaptureStore};
pub use filter::{FrameFilter, NightVision, Passthrough};
pub use pipeline::{Collaborators, CycleReport, Pipeline, Toggles};
pub use recording::{FrameDirRecorder, RecordReason, Recorder, RecordingEvent, RecordingManager, RecordingSink};
pub use session::{CycleStats, Monitor, SessionControl, SessionSummary, StopReason};
pub use source::{DetectionSource, Scenario, ScriptedSource};

// ========== 事件类型定义 ==========

/// 检测线程 → 观察者 (界面/学习组件/日志) 的单向事件
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SentinelEvent {
    /// 当前帧及其叠加层
    Frame {
        #[serde(skip)]
        frame: Frame,
        overlay: FrameOverlay,
    },
    /// 周期统计
    Stats(CycleStats),
    /// 特征记录
    Feature(FeatureRecord),
    /// 告警
    Alert(AlertRecord),
    /// 录像开始/结束
    Recording(RecordingEvent),
}
