//! 帧间关联引擎 (最近邻贪心匹配)
//! Frame-to-frame association of detection boxes to tracked entities

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use tracing::{debug, warn};

use super::types::{BBox, Point, DEFAULT_EMOTION, DEFAULT_POSE, UNKNOWN_IDENTITY};
use crate::config::SentinelConfig;
use crate::error::{Result, SentinelError};

// ========== 公共数据结构 ==========

/// 轨迹 (固定容量环形缓冲, 溢出时淘汰最旧的点)
#[derive(Clone, Debug)]
pub struct Trajectory {
    points: VecDeque<Point>,
    capacity: usize,
}

impl Trajectory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// 添加轨迹点
    pub fn push(&mut self, point: Point) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 从旧到新遍历
    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.points.iter()
    }

    pub fn last(&self) -> Option<&Point> {
        self.points.back()
    }
}

/// 跟踪对象
#[derive(Clone, Debug)]
pub struct TrackedEntity {
    /// 唯一跟踪ID (单调递增, 不复用)
    pub id: u32,

    /// 当前边界框
    pub bbox: BBox,

    /// 当前中心点
    pub center: Point,

    /// 历史轨迹 (中心点)
    pub trajectory: Trajectory,

    /// 连续丢失帧数
    pub frames_missing: u32,

    /// 身份 / 情绪 / 姿态标签 (仅在识别周期更新)
    pub identity: String,
    pub emotion: String,
    pub pose: String,
}

impl TrackedEntity {
    fn new(id: u32, bbox: BBox, trajectory_capacity: usize) -> Self {
        let center = bbox.center();
        let mut trajectory = Trajectory::new(trajectory_capacity);
        trajectory.push(center);

        Self {
            id,
            bbox,
            center,
            trajectory,
            frames_missing: 0,
            identity: UNKNOWN_IDENTITY.to_string(),
            emotion: DEFAULT_EMOTION.to_string(),
            pose: DEFAULT_POSE.to_string(),
        }
    }

    /// 匹配成功: 更新框/中心/轨迹, 清零丢失计数
    fn observe(&mut self, bbox: BBox) {
        self.bbox = bbox;
        self.center = bbox.center();
        self.trajectory.push(self.center);
        self.frames_missing = 0;
    }

    /// 是否已识别出身份
    pub fn is_known(&self) -> bool {
        self.identity != UNKNOWN_IDENTITY
    }
}

// ========== 跟踪状态 ==========

/// 单次监控会话的跟踪状态
///
/// 由检测线程独占, 每个周期显式传入关联引擎
#[derive(Clone, Debug)]
pub struct TrackingState {
    /// id → 跟踪对象 (按ID有序, 即创建顺序)
    entities: BTreeMap<u32, TrackedEntity>,

    /// 下一个分配的ID
    next_id: u32,

    /// 已告警的ID → 最近一次活跃的周期序号
    confirmed: HashMap<u32, u64>,
}

impl Default for TrackingState {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackingState {
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            next_id: 1,
            confirmed: HashMap::new(),
        }
    }

    pub fn get(&self, id: u32) -> Option<&TrackedEntity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut TrackedEntity> {
        self.entities.get_mut(&id)
    }

    /// 按创建顺序遍历所有跟踪对象
    pub fn entities(&self) -> impl Iterator<Item = &TrackedEntity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    pub fn is_confirmed(&self, id: u32) -> bool {
        self.confirmed.contains_key(&id)
    }

    /// 标记已告警 (记录当前周期)
    pub fn confirm(&mut self, id: u32, cycle: u64) {
        debug_assert!(id < self.next_id, "确认了从未创建过的ID {}", id);
        self.confirmed.insert(id, cycle);
    }

    /// 刷新已告警ID的最近活跃周期
    pub fn touch_confirmed(&mut self, id: u32, cycle: u64) {
        if let Some(last) = self.confirmed.get_mut(&id) {
            *last = cycle;
        }
    }

    /// 淘汰满足条件的已告警ID, 返回淘汰数量
    pub fn expire_confirmed<F>(&mut self, mut expired: F) -> usize
    where
        F: FnMut(u32, u64) -> bool,
    {
        let before = self.confirmed.len();
        self.confirmed.retain(|&id, &mut last| !expired(id, last));
        before - self.confirmed.len()
    }

    pub fn confirmed_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.confirmed.keys().copied()
    }

    pub fn confirmed_count(&self) -> usize {
        self.confirmed.len()
    }
}

// ========== 关联引擎 ==========

/// 最近邻关联引擎
///
/// 每个周期:
/// 1. 所有对象丢失计数+1, 达到阈值的先删除 (删除发生在匹配之前)
/// 2. 按检测顺序, 为每个框寻找中心距离最近且低于阈值的未认领对象
/// 3. 匹配成功更新对象; 无可匹配对象则新建
///
/// 贪心匹配而非全局最优, 密集场景下相邻目标可能交换ID
#[derive(Clone, Debug)]
pub struct AssociationEngine {
    /// 最大允许丢失帧数
    max_missing_frames: u32,

    /// 中心点匹配距离阈值 (像素)
    match_distance: f32,

    /// 轨迹容量
    trajectory_capacity: usize,

    /// 严格模式: 非法输入让本周期失败; 否则丢弃并告警 (默认跟随调试构建)
    strict: bool,
}

impl AssociationEngine {
    pub fn new(max_missing_frames: u32, match_distance: f32, trajectory_capacity: usize) -> Self {
        Self {
            max_missing_frames: max_missing_frames.max(1),
            match_distance,
            trajectory_capacity,
            strict: cfg!(debug_assertions),
        }
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn from_config(config: &SentinelConfig) -> Self {
        Self::new(
            config.max_missing_frames,
            config.match_distance_threshold,
            config.trajectory_max_length,
        )
    }

    pub fn max_missing_frames(&self) -> u32 {
        self.max_missing_frames
    }

    /// 关联当前周期的检测框, 返回本周期活跃的ID (检测顺序)
    pub fn associate(&self, state: &mut TrackingState, detections: &[BBox]) -> Result<Vec<u32>> {
        // 0. 校验检测框 (在修改状态之前)
        let mut boxes = Vec::with_capacity(detections.len());
        for (index, bbox) in detections.iter().enumerate() {
            if bbox.is_valid() {
                boxes.push(*bbox);
            } else {
                self.reject(SentinelError::InvalidDetection {
                    index,
                    x: bbox.x,
                    y: bbox.y,
                    width: bbox.width,
                    height: bbox.height,
                })?;
            }
        }

        // 1. 老化 + 删除丢失太久的对象
        let max_missing = self.max_missing_frames;
        for entity in state.entities.values_mut() {
            entity.frames_missing += 1;
        }
        let before = state.entities.len();
        state.entities.retain(|_, e| e.frames_missing < max_missing);
        let evicted = before - state.entities.len();
        if evicted > 0 {
            debug!("🗑️ 移除 {} 个丢失对象", evicted);
        }

        // 2/3. 贪心最近邻匹配
        let mut active = Vec::with_capacity(boxes.len());
        let mut claimed: HashSet<u32> = HashSet::with_capacity(boxes.len());

        for bbox in boxes {
            let center = bbox.center();

            let mut best: Option<(u32, f32)> = None;
            for entity in state.entities.values() {
                if claimed.contains(&entity.id) || entity.frames_missing >= max_missing {
                    continue;
                }
                let dist = center.distance(&entity.center);
                if dist < self.match_distance && best.map_or(true, |(_, d)| dist < d) {
                    best = Some((entity.id, dist));
                }
            }

            let id = match best {
                Some((id, _)) => {
                    if let Some(entity) = state.entities.get_mut(&id) {
                        entity.observe(bbox);
                    }
                    id
                }
                None => {
                    // 4. 新建对象
                    let id = state.next_id;
                    if state.entities.contains_key(&id) {
                        self.reject(SentinelError::DuplicateId(id))?;
                        continue;
                    }
                    state
                        .entities
                        .insert(id, TrackedEntity::new(id, bbox, self.trajectory_capacity));
                    state.next_id += 1;
                    debug!("🆕 新目标 #{} @ ({:.0}, {:.0})", id, center.x, center.y);
                    id
                }
            };

            claimed.insert(id);
            active.push(id);
        }

        Ok(active)
    }

    /// 不变量被破坏: 严格模式直接让本周期失败, 否则丢弃并告警
    fn reject(&self, err: SentinelError) -> Result<()> {
        if self.strict {
            Err(err)
        } else {
            warn!("⚠️ 丢弃非法输入: {}", err);
            Ok(())
        }
    }
}
