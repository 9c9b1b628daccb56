//! 检测源接口
//!
//! 外部检测源负责采集帧并给出候选目标框, 核心只消费结果

use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::detection::types::{BBox, Frame};

/// 检测源
pub trait DetectionSource: Send {
    /// 阻塞等待下一帧; 流结束时返回 None
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// 对帧做目标检测
    fn detect(&mut self, frame: &Frame) -> Result<Vec<BBox>>;
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

/// 回放场景: 每个周期一组 [x, y, w, h]
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// 每帧间隔 (模拟摄像头帧率), 0 表示不等待
    #[serde(default)]
    pub frame_interval_ms: u64,
    pub cycles: Vec<Vec<[f32; 4]>>,
}

impl Scenario {
    /// 从JSON文件加载场景
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("读取场景文件失败: {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("解析场景文件失败: {}", path.display()))
    }

    /// 从检测框序列构造场景 (测试用)
    pub fn from_boxes(width: u32, height: u32, cycles: Vec<Vec<BBox>>) -> Self {
        Self {
            width,
            height,
            frame_interval_ms: 0,
            cycles: cycles
                .into_iter()
                .map(|boxes| {
                    boxes
                        .into_iter()
                        .map(|b| [b.x, b.y, b.width, b.height])
                        .collect()
                })
                .collect(),
        }
    }
}

/// 场景回放检测源: 产生纯黑帧, 检测结果取自场景
pub struct ScriptedSource {
    scenario: Scenario,
    cursor: usize,
}

impl ScriptedSource {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            cursor: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.scenario.cycles.len().saturating_sub(self.cursor)
    }
}

impl DetectionSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.cursor >= self.scenario.cycles.len() {
            return Ok(None);
        }
        if self.scenario.frame_interval_ms > 0 && self.cursor > 0 {
            thread::sleep(Duration::from_millis(self.scenario.frame_interval_ms));
        }
        self.cursor += 1;
        Ok(Some(Frame::blank(
            self.cursor as u64,
            self.scenario.width,
            self.scenario.height,
        )))
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<BBox>> {
        let index = (frame.id as usize)
            .checked_sub(1)
            .context("场景帧ID从1开始")?;
        let boxes = self
            .scenario
            .cycles
            .get(index)
            .with_context(|| format!("场景中不存在帧 {}", frame.id))?;
        Ok(boxes
            .iter()
            .map(|&[x, y, w, h]| BBox::new(x, y, w, h))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_source_replays_then_ends() {
        let scenario = Scenario::from_boxes(
            320,
            240,
            vec![vec![BBox::new(1.0, 2.0, 3.0, 4.0)], vec![]],
        );
        let mut source = ScriptedSource::new(scenario);

        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!((frame.id, frame.width(), frame.height()), (1, 320, 240));
        assert_eq!(
            source.detect(&frame).unwrap(),
            vec![BBox::new(1.0, 2.0, 3.0, 4.0)]
        );

        let frame = source.next_frame().unwrap().unwrap();
        assert!(source.detect(&frame).unwrap().is_empty());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_scenario_json_defaults() {
        let scenario: Scenario =
            serde_json::from_str(r#"{"cycles": [[[10, 10, 20, 20]], []]}"#).unwrap();
        assert_eq!(scenario.width, 640);
        assert_eq!(scenario.cycles.len(), 2);
        assert_eq!(scenario.cycles[0][0], [10.0, 10.0, 20.0, 20.0]);
    }
}
