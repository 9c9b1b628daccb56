//! 目标属性识别 (身份 / 情绪 / 姿态)
//!
//! 外部分类器按固定周期调用以控制开销:
//! - 身份/情绪: 对每个活跃目标的裁剪区域分类
//! - 姿态: 整帧分类一次, 结果应用到所有活跃目标
//!
//! 分类失败或结果为空时保留原标签, 不重试

use anyhow::Result;
use image::{imageops, RgbImage};
use tracing::{debug, info, warn};

use super::tracker::TrackingState;
use super::types::Frame;

/// 身份/情绪分类结果
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FaceObservation {
    /// 匹配到的已知身份
    pub identity: Option<String>,
    /// 情绪标签 (空字符串表示无结果)
    pub emotion: String,
    pub confidence: f32,
}

/// 身份/情绪分类器接口
pub trait IdentityClassifier: Send {
    /// 对目标裁剪图分类
    fn classify(&mut self, crop: &RgbImage) -> Result<FaceObservation>;
}

/// 姿态分类器接口
pub trait PoseClassifier: Send {
    /// 对整帧分类, 未检测到人体时返回 None
    fn classify(&mut self, frame: &RgbImage) -> Result<Option<String>>;
}

/// 能力缺失时使用的空分类器
#[derive(Debug, Default)]
pub struct NullIdentityClassifier;

impl IdentityClassifier for NullIdentityClassifier {
    fn classify(&mut self, _crop: &RgbImage) -> Result<FaceObservation> {
        Ok(FaceObservation::default())
    }
}

/// 能力缺失时使用的空姿态分类器
#[derive(Debug, Default)]
pub struct NullPoseClassifier;

impl PoseClassifier for NullPoseClassifier {
    fn classify(&mut self, _frame: &RgbImage) -> Result<Option<String>> {
        Ok(None)
    }
}

/// 本周期实际运行了哪些分类器
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EnrichmentPass {
    pub identity: bool,
    pub pose: bool,
}

/// 属性识别器
pub struct Enricher {
    identity: Box<dyn IdentityClassifier>,
    pose: Box<dyn PoseClassifier>,
    identity_interval: u64,
    pose_interval: u64,
}

impl Enricher {
    /// 创建识别器; 未提供的分类器以空实现代替
    pub fn new(
        identity: Option<Box<dyn IdentityClassifier>>,
        pose: Option<Box<dyn PoseClassifier>>,
        identity_interval: u64,
        pose_interval: u64,
    ) -> Self {
        let identity = identity.unwrap_or_else(|| {
            info!("⚠️ 身份/情绪识别: 不可用 (使用空实现)");
            Box::new(NullIdentityClassifier)
        });
        let pose = pose.unwrap_or_else(|| {
            info!("⚠️ 姿态识别: 不可用 (使用空实现)");
            Box::new(NullPoseClassifier)
        });

        Self {
            identity,
            pose,
            identity_interval: identity_interval.max(1),
            pose_interval: pose_interval.max(1),
        }
    }

    /// 按周期更新活跃目标的标签
    ///
    /// `cycle` 从1开始计数; `face_recognition` 为运行时开关
    pub fn enrich(
        &mut self,
        cycle: u64,
        frame: &Frame,
        state: &mut TrackingState,
        active_ids: &[u32],
        face_recognition: bool,
    ) -> EnrichmentPass {
        let mut pass = EnrichmentPass::default();
        if active_ids.is_empty() {
            return pass;
        }

        if face_recognition && cycle % self.identity_interval == 0 {
            pass.identity = true;
            for &id in active_ids {
                let Some(entity) = state.get_mut(id) else {
                    continue;
                };
                let Some((x, y, w, h)) = entity.bbox.clamp_to(frame.width(), frame.height())
                else {
                    continue;
                };
                let crop = imageops::crop_imm(frame.image.as_ref(), x, y, w, h).to_image();

                match self.identity.classify(&crop) {
                    Ok(obs) => {
                        if let Some(identity) = obs.identity.filter(|s| !s.is_empty()) {
                            if identity != entity.identity {
                                debug!("🪪 目标 #{} 身份: {}", id, identity);
                            }
                            entity.identity = identity;
                        }
                        if !obs.emotion.is_empty() {
                            entity.emotion = obs.emotion;
                        }
                    }
                    Err(e) => warn!("⚠️ 目标 #{} 身份/情绪识别失败: {}", id, e),
                }
            }
        }

        if cycle % self.pose_interval == 0 {
            pass.pose = true;
            match self.pose.classify(frame.image.as_ref()) {
                Ok(Some(pose)) if !pose.is_empty() => {
                    for &id in active_ids {
                        if let Some(entity) = state.get_mut(id) {
                            entity.pose = pose.clone();
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("⚠️ 姿态识别失败: {}", e),
            }
        }

        pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::tracker::AssociationEngine;
    use crate::detection::types::BBox;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// 依次返回预设结果的分类器
    struct ScriptedIdentity {
        results: Vec<Result<FaceObservation>>,
        calls: Arc<AtomicUsize>,
    }

    impl IdentityClassifier for ScriptedIdentity {
        fn classify(&mut self, crop: &RgbImage) -> Result<FaceObservation> {
            assert!(crop.width() > 0 && crop.height() > 0);
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.results.is_empty() {
                return Ok(FaceObservation::default());
            }
            self.results.remove(0)
        }
    }

    struct FixedPose(Option<&'static str>);

    impl PoseClassifier for FixedPose {
        fn classify(&mut self, _frame: &RgbImage) -> Result<Option<String>> {
            Ok(self.0.map(str::to_string))
        }
    }

    struct FailingPose;

    impl PoseClassifier for FailingPose {
        fn classify(&mut self, _frame: &RgbImage) -> Result<Option<String>> {
            Err(anyhow!("模型未加载"))
        }
    }

    fn setup(boxes: &[BBox]) -> (TrackingState, Vec<u32>, Frame) {
        let engine = AssociationEngine::new(10, 50.0, 10);
        let mut state = TrackingState::new();
        let active = engine.associate(&mut state, boxes).unwrap();
        (state, active, Frame::blank(1, 640, 480))
    }

    #[test]
    fn test_cadence_gating() {
        let calls = Arc::new(AtomicUsize::new(0));
        let identity = ScriptedIdentity {
            results: vec![],
            calls: calls.clone(),
        };
        let mut enricher = Enricher::new(Some(Box::new(identity)), None, 3, 5);
        let (mut state, active, frame) = setup(&[BBox::new(10.0, 10.0, 50.0, 100.0)]);

        let mut identity_cycles = Vec::new();
        let mut pose_cycles = Vec::new();
        for cycle in 1..=10 {
            let pass = enricher.enrich(cycle, &frame, &mut state, &active, true);
            if pass.identity {
                identity_cycles.push(cycle);
            }
            if pass.pose {
                pose_cycles.push(cycle);
            }
        }
        assert_eq!(identity_cycles, vec![3, 6, 9]);
        assert_eq!(pose_cycles, vec![5, 10]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_failure_keeps_known_labels() {
        let calls = Arc::new(AtomicUsize::new(0));
        let identity = ScriptedIdentity {
            results: vec![
                Ok(FaceObservation {
                    identity: Some("alice".to_string()),
                    emotion: "happy".to_string(),
                    confidence: 0.9,
                }),
                Err(anyhow!("超时")),
                Ok(FaceObservation {
                    identity: None,
                    emotion: String::new(),
                    confidence: 0.0,
                }),
            ],
            calls,
        };
        let mut enricher = Enricher::new(Some(Box::new(identity)), None, 1, 100);
        let (mut state, active, frame) = setup(&[BBox::new(10.0, 10.0, 50.0, 100.0)]);

        for cycle in 1..=3 {
            enricher.enrich(cycle, &frame, &mut state, &active, true);
            let entity = state.get(1).unwrap();
            assert_eq!(entity.identity, "alice");
            assert_eq!(entity.emotion, "happy");
        }
    }

    #[test]
    fn test_face_recognition_toggle_skips_identity() {
        let calls = Arc::new(AtomicUsize::new(0));
        let identity = ScriptedIdentity {
            results: vec![],
            calls: calls.clone(),
        };
        let mut enricher = Enricher::new(Some(Box::new(identity)), None, 1, 1);
        let (mut state, active, frame) = setup(&[BBox::new(10.0, 10.0, 50.0, 100.0)]);

        let pass = enricher.enrich(1, &frame, &mut state, &active, false);
        assert!(!pass.identity);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_pose_applies_to_every_active_entity() {
        let mut enricher = Enricher::new(None, Some(Box::new(FixedPose(Some("sitting")))), 10, 1);
        let (mut state, active, frame) = setup(&[
            BBox::new(10.0, 10.0, 50.0, 100.0),
            BBox::new(400.0, 10.0, 50.0, 100.0),
        ]);

        enricher.enrich(1, &frame, &mut state, &active, true);
        assert!(state.entities().all(|e| e.pose == "sitting"));
    }

    #[test]
    fn test_pose_failure_or_none_is_no_update() {
        let (mut state, active, frame) = setup(&[BBox::new(10.0, 10.0, 50.0, 100.0)]);

        let mut failing = Enricher::new(None, Some(Box::new(FailingPose)), 10, 1);
        failing.enrich(1, &frame, &mut state, &active, true);
        assert_eq!(state.get(1).unwrap().pose, "standing");

        let mut empty = Enricher::new(None, Some(Box::new(FixedPose(None))), 10, 1);
        empty.enrich(1, &frame, &mut state, &active, true);
        assert_eq!(state.get(1).unwrap().pose, "standing");
    }

    #[test]
    fn test_box_outside_frame_is_skipped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let identity = ScriptedIdentity {
            results: vec![],
            calls: calls.clone(),
        };
        let mut enricher = Enricher::new(Some(Box::new(identity)), None, 1, 100);
        let (mut state, active, frame) = setup(&[BBox::new(700.0, 10.0, 50.0, 100.0)]);

        enricher.enrich(1, &frame, &mut state, &active, true);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
