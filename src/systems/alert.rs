//! 告警编排
//! First-sighting detection and alert emission
//!
//! 每个周期: new_ids = 活跃ID − 已告警ID
//! 非空时抓拍一次, 发出一条告警, 并把 new_ids 全部标记为已告警

use std::io::{self, Write};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::capture::CaptureStore;
use crate::detection::tracker::TrackingState;
use crate::detection::types::Frame;

/// 已告警ID的去重策略
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "lowercase")]
pub enum DebouncePolicy {
    /// 整个会话内每个ID最多告警一次
    #[default]
    Session,
    /// ID连续 `cycles` 个周期不活跃后解除去重, 再次出现时重新告警
    Ttl { cycles: u64 },
}

/// 告警类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Single,
    Multiple,
}

/// 告警记录
#[derive(Clone, Debug, Serialize)]
pub struct AlertRecord {
    pub count: usize,
    pub timestamp: DateTime<Local>,
    pub kind: AlertKind,
    pub ids: Vec<u32>,
    pub identities: Vec<String>,
    pub emotions: Vec<String>,
    pub poses: Vec<String>,
    /// 抓拍引用; 抓拍失败时为 None, 告警照常发出
    pub capture_ref: Option<String>,
}

/// 告警提示 (可选能力, 每条告警触发一次)
pub trait Alarm: Send {
    fn sound(&mut self, alert: &AlertRecord) -> anyhow::Result<()>;
}

/// 终端响铃 (写到标准错误, 不干扰标准输出的事件流)
pub struct TerminalBell;

impl Alarm for TerminalBell {
    fn sound(&mut self, _alert: &AlertRecord) -> anyhow::Result<()> {
        let mut err = io::stderr();
        err.write_all(b"\x07")?;
        err.flush()?;
        Ok(())
    }
}

/// 告警编排器
pub struct AlertOrchestrator {
    policy: DebouncePolicy,
    alert_count: u64,
}

impl AlertOrchestrator {
    pub fn new(policy: DebouncePolicy) -> Self {
        let policy = match policy {
            DebouncePolicy::Ttl { cycles } => DebouncePolicy::Ttl {
                cycles: cycles.max(1),
            },
            p => p,
        };
        Self {
            policy,
            alert_count: 0,
        }
    }

    /// 会话内已发出的告警数
    pub fn alert_count(&self) -> u64 {
        self.alert_count
    }

    pub fn policy(&self) -> DebouncePolicy {
        self.policy
    }

    /// 计算本周期新目标, 必要时抓拍并生成告警
    pub fn evaluate(
        &mut self,
        cycle: u64,
        now: DateTime<Local>,
        frame: &Frame,
        state: &mut TrackingState,
        active_ids: &[u32],
        capture: &mut dyn CaptureStore,
    ) -> Option<AlertRecord> {
        if let DebouncePolicy::Ttl { cycles } = self.policy {
            let expired = state.expire_confirmed(|_, last| cycle.saturating_sub(last) > cycles);
            if expired > 0 {
                info!("♻️ {} 个已告警ID解除去重", expired);
            }
        }

        let new_ids: Vec<u32> = active_ids
            .iter()
            .copied()
            .filter(|&id| !state.is_confirmed(id))
            .collect();

        for &id in active_ids {
            state.touch_confirmed(id, cycle);
        }

        if new_ids.is_empty() {
            return None;
        }

        let capture_ref = match capture.persist_and_protect(frame, now) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!("⚠️ 抓拍失败, 告警不附带图片: {}", e);
                None
            }
        };

        let mut identities = Vec::with_capacity(new_ids.len());
        let mut emotions = Vec::with_capacity(new_ids.len());
        let mut poses = Vec::with_capacity(new_ids.len());
        for entity in new_ids.iter().filter_map(|&id| state.get(id)) {
            identities.push(entity.identity.clone());
            emotions.push(entity.emotion.clone());
            poses.push(entity.pose.clone());
        }

        for &id in &new_ids {
            state.confirm(id, cycle);
        }
        self.alert_count += 1;

        let kind = if new_ids.len() == 1 {
            AlertKind::Single
        } else {
            AlertKind::Multiple
        };
        info!(
            "🚨 告警 #{}: {} 个新目标 {:?} ({:?})",
            self.alert_count,
            new_ids.len(),
            new_ids,
            kind
        );

        Some(AlertRecord {
            count: new_ids.len(),
            timestamp: now,
            kind,
            ids: new_ids,
            identities,
            emotions,
            poses,
            capture_ref,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::tracker::AssociationEngine;
    use crate::detection::types::BBox;
    use anyhow::{anyhow, Result};

    /// 记录抓拍次数的存储
    #[derive(Default)]
    struct CountingCapture {
        captures: usize,
        fail: bool,
    }

    impl CaptureStore for CountingCapture {
        fn persist_and_protect(&mut self, frame: &Frame, _at: DateTime<Local>) -> Result<String> {
            if self.fail {
                return Err(anyhow!("磁盘已满"));
            }
            self.captures += 1;
            Ok(format!("capture-{}", frame.id))
        }
    }

    struct Harness {
        engine: AssociationEngine,
        state: TrackingState,
        alerts: AlertOrchestrator,
        capture: CountingCapture,
        frame: Frame,
        cycle: u64,
    }

    impl Harness {
        fn new(max_missing: u32, policy: DebouncePolicy) -> Self {
            Self {
                engine: AssociationEngine::new(max_missing, 50.0, 10),
                state: TrackingState::new(),
                alerts: AlertOrchestrator::new(policy),
                capture: CountingCapture::default(),
                frame: Frame::blank(0, 640, 480),
                cycle: 0,
            }
        }

        fn step(&mut self, boxes: &[BBox]) -> Option<AlertRecord> {
            self.cycle += 1;
            let active = self.engine.associate(&mut self.state, boxes).unwrap();
            self.alerts.evaluate(
                self.cycle,
                Local::now(),
                &self.frame,
                &mut self.state,
                &active,
                &mut self.capture,
            )
        }
    }

    fn person(x: f32) -> BBox {
        BBox::new(x, 100.0, 40.0, 100.0)
    }

    #[test]
    fn test_two_new_targets_single_multiple_alert() {
        let mut h = Harness::new(10, DebouncePolicy::Session);
        let alert = h.step(&[person(10.0), person(500.0)]).unwrap();
        assert_eq!(alert.kind, AlertKind::Multiple);
        assert_eq!(alert.count, 2);
        assert_eq!(alert.ids, vec![1, 2]);
        assert_eq!(alert.identities, vec!["unknown", "unknown"]);
        assert_eq!(alert.capture_ref.as_deref(), Some("capture-0"));
        assert!(h.state.is_confirmed(1) && h.state.is_confirmed(2));
        assert_eq!(h.capture.captures, 1);
        assert_eq!(h.alerts.alert_count(), 1);
    }

    #[test]
    fn test_alert_at_most_once_per_id() {
        let mut h = Harness::new(5, DebouncePolicy::Session);
        let first = h.step(&[person(10.0)]).unwrap();
        assert_eq!(first.kind, AlertKind::Single);

        // 在丢失容忍范围内反复消失/出现
        for _ in 0..3 {
            assert!(h.step(&[]).is_none());
            assert!(h.step(&[person(12.0)]).is_none());
        }
        assert_eq!(h.alerts.alert_count(), 1);

        // 新目标只针对新ID告警
        let alert = h.step(&[person(12.0), person(400.0)]).unwrap();
        assert_eq!(alert.ids, vec![2]);
        assert_eq!(alert.kind, AlertKind::Single);
    }

    #[test]
    fn test_capture_failure_still_alerts() {
        let mut h = Harness::new(5, DebouncePolicy::Session);
        h.capture.fail = true;
        let alert = h.step(&[person(10.0)]).unwrap();
        assert!(alert.capture_ref.is_none());
        assert!(h.state.is_confirmed(1));
    }

    #[test]
    fn test_ttl_policy_rearms_after_absence() {
        let mut h = Harness::new(20, DebouncePolicy::Ttl { cycles: 3 });
        assert!(h.step(&[person(10.0)]).is_some());

        // 持续出现不会重复告警
        for _ in 0..10 {
            assert!(h.step(&[person(10.0)]).is_none());
        }

        // 缺席超过TTL后同一ID再次出现
        for _ in 0..4 {
            assert!(h.step(&[]).is_none());
        }
        let alert = h.step(&[person(10.0)]).unwrap();
        assert_eq!(alert.ids, vec![1]);
        assert_eq!(h.alerts.alert_count(), 2);
    }

    #[test]
    fn test_ttl_policy_short_absence_stays_debounced() {
        let mut h = Harness::new(20, DebouncePolicy::Ttl { cycles: 3 });
        assert!(h.step(&[person(10.0)]).is_some());
        for _ in 0..2 {
            assert!(h.step(&[]).is_none());
        }
        assert!(h.step(&[person(10.0)]).is_none());
    }

    #[test]
    fn test_confirmed_ids_subset_of_created() {
        let mut h = Harness::new(3, DebouncePolicy::Session);
        h.step(&[person(10.0), person(300.0)]);
        h.step(&[]);
        h.step(&[person(500.0)]);
        let next = h.state.next_id();
        assert!(h.state.confirmed_ids().all(|id| id >= 1 && id < next));
        assert_eq!(h.state.confirmed_count(), 3);
    }
}
