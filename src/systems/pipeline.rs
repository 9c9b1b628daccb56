//! 单周期处理流水线
//!
//! 关联 → 属性识别(节流) → 区域/特征 → 告警 → 录像
//! 每个周期严格顺序执行, 结果以 `CycleReport` 返回

use chrono::{DateTime, Local, Timelike};
use tracing::warn;

use super::alert::{Alarm, AlertOrchestrator, AlertRecord};
use super::capture::CaptureStore;
use super::recording::{RecordReason, Recorder, RecordingEvent, RecordingManager};
use crate::config::SentinelConfig;
use crate::detection::enrichment::{EnrichmentPass, Enricher, IdentityClassifier, PoseClassifier};
use crate::detection::overlay::{build_overlay, FrameOverlay, OverlayOptions};
use crate::detection::tracker::{AssociationEngine, TrackingState};
use crate::detection::types::{BBox, Frame, Region};
use crate::detection::zone::{extract_features, FeatureRecord};
use crate::error::Result;

/// 运行时开关快照 (每周期开始时读取)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Toggles {
    pub night_mode: bool,
    pub face_recognition: bool,
    pub show_trajectories: bool,
}

impl Toggles {
    pub fn from_config(config: &SentinelConfig) -> Self {
        Self {
            night_mode: config.night_mode,
            face_recognition: config.face_recognition,
            show_trajectories: config.show_trajectories,
        }
    }
}

/// 外部协作者
pub struct Collaborators {
    /// 身份/情绪分类器 (None 表示能力不可用)
    pub identity: Option<Box<dyn IdentityClassifier>>,
    /// 姿态分类器 (None 表示能力不可用)
    pub pose: Option<Box<dyn PoseClassifier>>,
    pub capture: Box<dyn CaptureStore>,
    pub recorder: Box<dyn Recorder>,
    /// 告警提示 (None 表示静默)
    pub alarm: Option<Box<dyn Alarm>>,
}

/// 单周期输出
#[derive(Clone, Debug)]
pub struct CycleReport {
    pub cycle: u64,
    pub frame_id: u64,
    pub active_ids: Vec<u32>,
    pub features: Vec<FeatureRecord>,
    pub alert: Option<AlertRecord>,
    pub recording: Vec<RecordingEvent>,
    pub overlay: FrameOverlay,
    pub enrichment: EnrichmentPass,
    pub total_alerts: u64,
}

impl CycleReport {
    pub fn active_count(&self) -> usize {
        self.active_ids.len()
    }
}

/// 处理流水线 (由检测线程独占)
pub struct Pipeline {
    engine: AssociationEngine,
    state: TrackingState,
    enricher: Enricher,
    alerts: AlertOrchestrator,
    capture: Box<dyn CaptureStore>,
    alarm: Option<Box<dyn Alarm>>,
    recording: RecordingManager,

    frame_width: u32,
    restricted_zone: Region,

    /// 已处理周期数 (从1开始)
    cycle: u64,
}

impl Pipeline {
    pub fn new(config: &SentinelConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            identity,
            pose,
            capture,
            recorder,
            alarm,
        } = collaborators;

        Self {
            engine: AssociationEngine::from_config(config),
            state: TrackingState::new(),
            enricher: Enricher::new(
                identity,
                pose,
                config.emotion_update_interval,
                config.pose_update_interval,
            ),
            alerts: AlertOrchestrator::new(config.debounce),
            capture,
            alarm,
            recording: RecordingManager::new(recorder, config.record_timeout),
            frame_width: config.frame_width,
            restricted_zone: config.restricted_zone,
            cycle: 0,
        }
    }

    /// 处理一帧的检测结果
    ///
    /// 检测框非法时 (调试构建) 返回错误, 本周期不产生任何输出
    pub fn process(
        &mut self,
        frame: &Frame,
        detections: &[BBox],
        now: DateTime<Local>,
        toggles: Toggles,
    ) -> Result<CycleReport> {
        // 1. 关联
        let active_ids = self.engine.associate(&mut self.state, detections)?;
        self.cycle += 1;
        let cycle = self.cycle;

        // 2. 属性识别
        let enrichment = self.enricher.enrich(
            cycle,
            frame,
            &mut self.state,
            &active_ids,
            toggles.face_recognition,
        );

        // 3. 区域 + 特征
        let features = extract_features(&self.state, &active_ids, self.frame_width, now.hour());

        // 4. 告警
        let alert = self.alerts.evaluate(
            cycle,
            now,
            frame,
            &mut self.state,
            &active_ids,
            self.capture.as_mut(),
        );

        if let (Some(record), Some(alarm)) = (&alert, self.alarm.as_mut()) {
            if let Err(e) = alarm.sound(record) {
                warn!("⚠️ 告警提示失败: {}", e);
            }
        }

        // 5. 录像
        let mut recording = Vec::new();
        if alert.is_some() {
            recording.extend(self.recording.start(RecordReason::Detection, now, frame));
        }
        recording.extend(self.recording.observe(active_ids.len(), frame));

        let overlay = build_overlay(
            &self.state,
            &active_ids,
            cycle,
            OverlayOptions {
                show_trajectories: toggles.show_trajectories,
                recording: self.recording.is_recording(),
                night_mode: toggles.night_mode,
                restricted_zone: Some(self.restricted_zone),
            },
        );

        Ok(CycleReport {
            cycle,
            frame_id: frame.id,
            active_ids,
            features,
            alert,
            recording,
            overlay,
            enrichment,
            total_alerts: self.alerts.alert_count(),
        })
    }

    /// 结束会话: 强制停止录像
    pub fn shutdown(&mut self) -> Option<RecordingEvent> {
        self.recording.shutdown()
    }

    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_recording()
    }

    pub fn cycles(&self) -> u64 {
        self.cycle
    }

    pub fn alert_count(&self) -> u64 {
        self.alerts.alert_count()
    }
}
