//! 区域划分与特征记录
//! Zone classification and per-entity feature records for the learning side-channel

use serde::Serialize;

use super::tracker::TrackingState;
use super::types::Zone;

/// 按中心点x坐标划分区域 (帧宽整数三等分, 640 → 213 / 426)
pub fn classify_zone(x: f32, frame_width: u32) -> Zone {
    let left = frame_width / 3;
    let right = 2 * frame_width / 3;
    if x < left as f32 {
        Zone::Left
    } else if x < right as f32 {
        Zone::Center
    } else {
        Zone::Right
    }
}

/// 特征记录 (每个活跃对象每周期一条, 供外部学习组件使用)
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeatureRecord {
    pub entity_id: u32,
    pub person_count: usize,
    pub zone: Zone,
    pub emotion: String,
    pub pose: String,
    pub hour_of_day: u32,
    pub identity: String,
}

/// 为本周期所有活跃对象生成特征记录 (只读访问跟踪状态)
pub fn extract_features(
    state: &TrackingState,
    active_ids: &[u32],
    frame_width: u32,
    hour_of_day: u32,
) -> Vec<FeatureRecord> {
    let person_count = active_ids.len();
    active_ids
        .iter()
        .filter_map(|&id| state.get(id))
        .map(|entity| FeatureRecord {
            entity_id: entity.id,
            person_count,
            zone: classify_zone(entity.center.x, frame_width),
            emotion: entity.emotion.clone(),
            pose: entity.pose.clone(),
            hour_of_day,
            identity: entity.identity.clone(),
        })
        .collect()
}
