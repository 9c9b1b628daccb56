use std::sync::Arc;

use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// 监控系统数据结构定义
/// Data structures shared by the tracking core

// ========== 公共常量 ==========

/// 未识别身份
pub const UNKNOWN_IDENTITY: &str = "unknown";
/// 默认情绪
pub const DEFAULT_EMOTION: &str = "neutral";
/// 默认姿态
pub const DEFAULT_POSE: &str = "standing";

// ========== 数据结构 ==========

/// 检测框 (x, y, width, height), 左上角坐标
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn xmax(&self) -> f32 {
        self.x + self.width
    }

    pub fn ymax(&self) -> f32 {
        self.y + self.height
    }

    /// 中心点
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// 坐标有限且尺寸为正
    pub fn is_valid(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0
    }

    /// 裁剪到图像范围内, 返回 (x, y, w, h) 像素区域; 完全在图像外时返回 None
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let x1 = self.x.max(0.0).min(width as f32) as u32;
        let y1 = self.y.max(0.0).min(height as f32) as u32;
        let x2 = self.xmax().max(0.0).min(width as f32) as u32;
        let y2 = self.ymax().max(0.0).min(height as f32) as u32;

        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some((x1, y1, x2 - x1, y2 - y1))
    }
}

/// 二维点
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// 欧氏距离
    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// 视频帧 (检测源 → 流水线)
#[derive(Clone, Debug)]
pub struct Frame {
    pub id: u64,
    pub image: Arc<RgbImage>, // 使用Arc共享数据,避免复制
}

impl Frame {
    pub fn new(id: u64, image: RgbImage) -> Self {
        Self {
            id,
            image: Arc::new(image),
        }
    }

    /// 纯黑帧 (场景回放/测试用)
    pub fn blank(id: u64, width: u32, height: u32) -> Self {
        Self::new(id, RgbImage::from_pixel(width, height, Rgb([0, 0, 0])))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// 画面区域 (按帧宽三等分)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Left,
    Center,
    Right,
}

impl Zone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Left => "left",
            Zone::Center => "center",
            Zone::Right => "right",
        }
    }
}

/// 矩形区域 (x1, y1, x2, y2), 用于禁区叠加显示
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}
