//! 叠加层数据 (不负责绘制, 只描述渲染端需要画什么)
//! Overlay description handed to the renderer with every frame

use serde::Serialize;

use super::tracker::{TrackedEntity, TrackingState};
use super::types::{BBox, Point, Region};

/// 已识别身份框颜色
pub const KNOWN_COLOR: (u8, u8, u8) = (0, 255, 0);
/// 未识别身份框颜色
pub const UNKNOWN_COLOR: (u8, u8, u8) = (255, 255, 0);
/// 轨迹颜色 (按 alpha 由暗到亮)
pub const TRAIL_COLOR: (u8, u8, u8) = (0, 255, 255);

/// 单个目标的叠加信息
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntityOverlay {
    pub id: u32,
    pub bbox: BBox,
    pub center: Point,
    pub color: (u8, u8, u8),
    /// 边框粗细 (脉冲效果: 每20个周期中前10个为3)
    pub thickness: u32,
    pub label: String,
    pub emotion: String,
    pub pose: String,
}

/// 轨迹线段 (越新越亮越粗)
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrajectorySegment {
    pub from: Point,
    pub to: Point,
    pub color: (u8, u8, u8),
    pub thickness: u32,
}

/// 一帧的完整叠加描述
#[derive(Clone, Debug, Default, Serialize)]
pub struct FrameOverlay {
    pub entities: Vec<EntityOverlay>,
    pub trajectories: Vec<TrajectorySegment>,
    pub restricted_zone: Option<Region>,
    pub recording: bool,
    pub night_mode: bool,
}

/// 叠加层生成参数 (运行时开关的快照)
#[derive(Clone, Copy, Debug)]
pub struct OverlayOptions {
    pub show_trajectories: bool,
    pub recording: bool,
    pub night_mode: bool,
    pub restricted_zone: Option<Region>,
}

/// 生成本周期叠加层: 活跃目标的框 + 所有跟踪中目标的轨迹
pub fn build_overlay(
    state: &TrackingState,
    active_ids: &[u32],
    cycle: u64,
    options: OverlayOptions,
) -> FrameOverlay {
    let thickness = if cycle % 20 < 10 { 3 } else { 2 };

    let entities = active_ids
        .iter()
        .filter_map(|&id| state.get(id))
        .map(|e| entity_overlay(e, thickness))
        .collect();

    let trajectories = if options.show_trajectories {
        state.entities().flat_map(trajectory_segments).collect()
    } else {
        Vec::new()
    };

    FrameOverlay {
        entities,
        trajectories,
        restricted_zone: options.restricted_zone,
        recording: options.recording,
        night_mode: options.night_mode,
    }
}

fn entity_overlay(entity: &TrackedEntity, thickness: u32) -> EntityOverlay {
    EntityOverlay {
        id: entity.id,
        bbox: entity.bbox,
        center: entity.center,
        color: if entity.is_known() {
            KNOWN_COLOR
        } else {
            UNKNOWN_COLOR
        },
        thickness,
        label: format!("{} #{}", entity.identity, entity.id),
        emotion: entity.emotion.clone(),
        pose: entity.pose.clone(),
    }
}

/// 轨迹淡入: 第i段 alpha = i/len, 粗细 = max(1, alpha*3)
fn trajectory_segments(entity: &TrackedEntity) -> Vec<TrajectorySegment> {
    let points: Vec<Point> = entity.trajectory.iter().copied().collect();
    if points.len() < 2 {
        return Vec::new();
    }

    let len = points.len() as f32;
    points
        .windows(2)
        .enumerate()
        .map(|(i, pair)| {
            let alpha = (i + 1) as f32 / len;
            TrajectorySegment {
                from: pair[0],
                to: pair[1],
                color: (
                    (TRAIL_COLOR.0 as f32 * alpha) as u8,
                    (TRAIL_COLOR.1 as f32 * alpha) as u8,
                    (TRAIL_COLOR.2 as f32 * alpha) as u8,
                ),
                thickness: ((alpha * 3.0) as u32).max(1),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::tracker::AssociationEngine;

    fn options(show_trajectories: bool) -> OverlayOptions {
        OverlayOptions {
            show_trajectories,
            recording: true,
            night_mode: false,
            restricted_zone: None,
        }
    }

    #[test]
    fn test_overlay_labels_and_pulse() {
        let engine = AssociationEngine::new(10, 50.0, 10);
        let mut state = TrackingState::new();
        let active = engine
            .associate(&mut state, &[BBox::new(0.0, 0.0, 10.0, 10.0)])
            .unwrap();
        state.get_mut(1).unwrap().identity = "bob".to_string();

        let overlay = build_overlay(&state, &active, 3, options(true));
        assert_eq!(overlay.entities[0].label, "bob #1");
        assert_eq!(overlay.entities[0].color, KNOWN_COLOR);
        assert_eq!(overlay.entities[0].thickness, 3);
        assert!(overlay.recording);

        let overlay = build_overlay(&state, &active, 15, options(true));
        assert_eq!(overlay.entities[0].thickness, 2);
    }

    #[test]
    fn test_trajectory_segments_follow_toggle() {
        let engine = AssociationEngine::new(10, 50.0, 10);
        let mut state = TrackingState::new();
        let mut active = Vec::new();
        for step in 0..4 {
            let x = step as f32 * 5.0;
            active = engine
                .associate(&mut state, &[BBox::new(x, 0.0, 10.0, 10.0)])
                .unwrap();
        }

        let overlay = build_overlay(&state, &active, 1, options(true));
        assert_eq!(overlay.trajectories.len(), 3);
        assert_eq!(overlay.trajectories[2].thickness, 2); // alpha = 3/4
        assert_eq!(overlay.trajectories[0].thickness, 1);
        assert_eq!(overlay.trajectories[0].color, (0, 63, 63)); // alpha = 1/4
        assert_eq!(overlay.trajectories[2].color, (0, 191, 191));

        let overlay = build_overlay(&state, &active, 1, options(false));
        assert!(overlay.trajectories.is_empty());
    }
}
