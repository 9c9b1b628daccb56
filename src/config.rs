//! 监控配置 - 通过JSON文件调整参数

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::detection::types::Region;
use crate::error::Result;
use crate::systems::alert::DebouncePolicy;

/// 监控参数配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    // === 跟踪参数 ===
    pub max_missing_frames: u32,       // 最大丢失帧数
    pub match_distance_threshold: f32, // 中心点匹配距离(像素)
    pub trajectory_max_length: usize,  // 轨迹容量

    // === 识别参数 ===
    pub emotion_update_interval: u64, // 身份/情绪识别间隔(周期)
    pub pose_update_interval: u64,    // 姿态识别间隔(周期)

    // === 告警参数 ===
    pub debounce: DebouncePolicy, // 已告警ID的去重策略

    // === 录像参数 ===
    pub record_timeout: u32, // 无目标多少个周期后停止录像

    // === 画面参数 ===
    pub frame_width: u32,
    pub frame_height: u32,
    pub restricted_zone: Region, // 禁区 (仅用于叠加显示)

    // === 会话参数 ===
    pub event_queue_capacity: usize, // 事件队列容量, 满则丢弃
    pub rate_window: usize,          // 周期速率滑动窗口
    pub captures_dir: PathBuf,
    pub recordings_dir: PathBuf,

    // === 运行时开关初始值 ===
    pub night_mode: bool,
    pub face_recognition: bool,
    pub show_trajectories: bool,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            // 跟踪
            max_missing_frames: 30,
            match_distance_threshold: 100.0,
            trajectory_max_length: 30,

            // 识别
            emotion_update_interval: 10,
            pose_update_interval: 15,

            // 告警
            debounce: DebouncePolicy::Session,

            // 录像
            record_timeout: 90,

            // 画面
            frame_width: 640,
            frame_height: 480,
            restricted_zone: Region {
                x1: 400.0,
                y1: 100.0,
                x2: 600.0,
                y2: 400.0,
            },

            // 会话
            event_queue_capacity: 120,
            rate_window: 30,
            captures_dir: PathBuf::from("captures"),
            recordings_dir: PathBuf::from("recordings"),

            night_mode: false,
            face_recognition: true,
            show_trajectories: true,
        }
    }
}

impl SentinelConfig {
    /// 从JSON文件加载配置
    ///
    /// 文件不存在时写出默认配置; 解析失败时告警并使用默认值
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => match Self::from_json(&json) {
                Ok(config) => {
                    info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    warn!("⚠️ 配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    warn!("❌ 保存配置失败: {}", e);
                }
                config
            }
        }
    }

    /// 解析JSON并修正非法取值
    pub fn from_json(json: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(json)?;
        config.sanitize();
        Ok(config)
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        info!("💾 配置已保存到 {}", path.as_ref().display());
        Ok(())
    }

    /// 间隔/容量类参数至少为1
    fn sanitize(&mut self) {
        if self.emotion_update_interval == 0 {
            warn!("⚠️ emotion_update_interval 不能为0, 改为1");
            self.emotion_update_interval = 1;
        }
        if self.pose_update_interval == 0 {
            warn!("⚠️ pose_update_interval 不能为0, 改为1");
            self.pose_update_interval = 1;
        }
        if self.max_missing_frames == 0 {
            warn!("⚠️ max_missing_frames 不能为0, 改为1");
            self.max_missing_frames = 1;
        }
        self.trajectory_max_length = self.trajectory_max_length.max(1);
        self.event_queue_capacity = self.event_queue_capacity.max(1);
        self.rate_window = self.rate_window.max(1);
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        info!("🎛️ 当前监控配置:");
        info!("  最大丢失帧: {}", self.max_missing_frames);
        info!("  匹配距离: {:.1}px", self.match_distance_threshold);
        info!("  轨迹长度: {}", self.trajectory_max_length);
        info!(
            "  识别间隔: 身份/情绪 {} | 姿态 {}",
            self.emotion_update_interval, self.pose_update_interval
        );
        info!("  录像超时: {} 周期", self.record_timeout);
        info!("  告警去重: {:?}", self.debounce);
    }
}
