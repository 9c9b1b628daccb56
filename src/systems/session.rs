//! 监控会话 (检测线程)
//!
//! 独立工作线程, 每个周期: 取帧 → (夜视) → 检测 → 流水线 → 发送事件
//! - 停止请求在周期开始时检查, 不会中断正在进行的周期
//! - 事件单向发送, 队列满时丢弃, 检测线程从不等待消费者

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde::Serialize;
use tracing::{error, info, warn};

use super::filter::FrameFilter;
use super::pipeline::{Collaborators, CycleReport, Pipeline, Toggles};
use super::source::DetectionSource;
use super::SentinelEvent;
use crate::config::SentinelConfig;
use crate::detection::types::Frame;

// ========== 会话控制 ==========

/// 会话控制面 (控制线程写, 检测线程读)
///
/// 开关在下一个周期开始时生效
#[derive(Debug)]
pub struct SessionControl {
    running: AtomicBool,
    night_mode: AtomicBool,
    face_recognition: AtomicBool,
    show_trajectories: AtomicBool,
}

impl SessionControl {
    pub fn new(initial: Toggles) -> Self {
        Self {
            running: AtomicBool::new(true),
            night_mode: AtomicBool::new(initial.night_mode),
            face_recognition: AtomicBool::new(initial.face_recognition),
            show_trajectories: AtomicBool::new(initial.show_trajectories),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// 请求停止 (在下一个周期边界生效)
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn set_night_mode(&self, on: bool) {
        self.night_mode.store(on, Ordering::Relaxed);
    }

    pub fn set_face_recognition(&self, on: bool) {
        self.face_recognition.store(on, Ordering::Relaxed);
    }

    pub fn set_show_trajectories(&self, on: bool) {
        self.show_trajectories.store(on, Ordering::Relaxed);
    }

    /// 读取当前开关快照
    pub fn toggles(&self) -> Toggles {
        Toggles {
            night_mode: self.night_mode.load(Ordering::Relaxed),
            face_recognition: self.face_recognition.load(Ordering::Relaxed),
            show_trajectories: self.show_trajectories.load(Ordering::Relaxed),
        }
    }
}

// ========== 统计 ==========

/// 每周期统计 (发送给界面)
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CycleStats {
    pub cycle: u64,
    pub active_count: usize,
    pub total_alerts: u64,
    /// 周期速率 (最近N个周期的平均值, 周期/秒)
    pub cycle_rate: f64,
}

/// 周期速率滑动平均
pub struct RateMeter {
    samples: VecDeque<f64>,
    window: usize,
}

impl RateMeter {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            samples: VecDeque::with_capacity(window),
            window,
        }
    }

    /// 记录一个周期耗时, 返回当前平均速率
    pub fn record(&mut self, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs > 0.0 {
            if self.samples.len() == self.window {
                self.samples.pop_front();
            }
            self.samples.push_back(1.0 / secs);
        }
        self.rate()
    }

    pub fn rate(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.samples.iter().sum::<f64>() / self.samples.len() as f64
        }
    }
}

// ========== 会话 ==========

/// 会话结束原因
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// 收到停止请求
    Requested,
    /// 检测源结束
    EndOfStream,
}

/// 会话总结
#[derive(Clone, Debug, Serialize)]
pub struct SessionSummary {
    pub reason: StopReason,
    pub cycles: u64,
    pub alerts: u64,
    pub entities_created: u32,
    pub failed_cycles: u64,
    pub dropped_events: u64,
}

/// 运行中会话的句柄
pub struct Monitor {
    control: Arc<SessionControl>,
    events: Receiver<SentinelEvent>,
    dropped: Arc<AtomicU64>,
    worker: Option<JoinHandle<Result<SessionSummary>>>,
}

impl Monitor {
    /// 启动检测线程
    pub fn start(
        config: SentinelConfig,
        source: Box<dyn DetectionSource>,
        filter: Box<dyn FrameFilter>,
        collaborators: Collaborators,
    ) -> Result<Self> {
        let control = Arc::new(SessionControl::new(Toggles::from_config(&config)));
        let (tx, rx) = crossbeam_channel::bounded(config.event_queue_capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));

        let worker = Worker {
            pipeline: Pipeline::new(&config, collaborators),
            source,
            filter,
            control: control.clone(),
            events: EventSender {
                tx,
                dropped: dropped.clone(),
            },
            meter: RateMeter::new(config.rate_window),
            failed_cycles: 0,
        };

        let handle = thread::Builder::new()
            .name("sentinel-detect".to_string())
            .spawn(move || worker.run())
            .context("启动检测线程失败")?;

        info!("🔍 检测线程已启动");
        Ok(Self {
            control,
            events: rx,
            dropped,
            worker: Some(handle),
        })
    }

    /// 事件接收端
    pub fn events(&self) -> &Receiver<SentinelEvent> {
        &self.events
    }

    /// 控制面 (可跨线程共享)
    pub fn control(&self) -> Arc<SessionControl> {
        self.control.clone()
    }

    /// 已丢弃的事件数
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// 请求停止并等待检测线程结束
    pub fn stop(mut self) -> Result<SessionSummary> {
        self.control.request_stop();
        self.join()
    }

    /// 等待检测线程自然结束 (检测源耗尽)
    pub fn wait(mut self) -> Result<SessionSummary> {
        self.join()
    }

    fn join(&mut self) -> Result<SessionSummary> {
        let handle = self
            .worker
            .take()
            .ok_or_else(|| anyhow!("检测线程已结束"))?;
        handle
            .join()
            .map_err(|_| anyhow!("检测线程异常退出"))?
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.control.request_stop();
            if let Err(e) = self.join() {
                warn!("⚠️ 检测线程结束异常: {:#}", e);
            }
        }
    }
}

/// 非阻塞事件发送
struct EventSender {
    tx: Sender<SentinelEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventSender {
    fn send(&self, event: SentinelEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            // 消费者已退出, 继续运行直到收到停止请求
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// 检测线程状态 (线程内独占)
struct Worker {
    pipeline: Pipeline,
    source: Box<dyn DetectionSource>,
    filter: Box<dyn FrameFilter>,
    control: Arc<SessionControl>,
    events: EventSender,
    meter: RateMeter,
    failed_cycles: u64,
}

impl Worker {
    fn run(mut self) -> Result<SessionSummary> {
        let outcome = self.run_loop();

        // 有序关闭: 先结束录像, 再释放检测源
        if let Some(event) = self.pipeline.shutdown() {
            self.events.send(SentinelEvent::Recording(event));
        }
        drop(self.source);

        let reason = outcome?;
        let summary = SessionSummary {
            reason,
            cycles: self.pipeline.cycles(),
            alerts: self.pipeline.alert_count(),
            entities_created: self.pipeline.state().next_id() - 1,
            failed_cycles: self.failed_cycles,
            dropped_events: self.events.dropped.load(Ordering::Relaxed),
        };
        info!(
            "🛑 监控结束 ({:?}): {} 周期 | {} 次告警 | {} 个目标",
            summary.reason, summary.cycles, summary.alerts, summary.entities_created
        );
        Ok(summary)
    }

    fn run_loop(&mut self) -> Result<StopReason> {
        loop {
            if !self.control.is_running() {
                return Ok(StopReason::Requested);
            }

            let started = Instant::now();
            let Some(frame) = self.source.next_frame().context("读取视频帧失败")? else {
                info!("📭 检测源已结束");
                return Ok(StopReason::EndOfStream);
            };

            let toggles = self.control.toggles();
            let frame = if toggles.night_mode {
                Frame {
                    id: frame.id,
                    image: Arc::new(self.filter.apply(&frame.image)),
                }
            } else {
                frame
            };

            let detections = self.source.detect(&frame).context("目标检测失败")?;

            let report = match self
                .pipeline
                .process(&frame, &detections, Local::now(), toggles)
            {
                Ok(report) => report,
                Err(e) => {
                    self.failed_cycles += 1;
                    error!("❌ 帧 {} 处理失败: {}", frame.id, e);
                    continue;
                }
            };

            let cycle_rate = self.meter.record(started.elapsed());
            self.emit(frame, report, cycle_rate);
        }
    }

    fn emit(&self, frame: Frame, report: CycleReport, cycle_rate: f64) {
        let stats = CycleStats {
            cycle: report.cycle,
            active_count: report.active_count(),
            total_alerts: report.total_alerts,
            cycle_rate,
        };

        for feature in report.features {
            self.events.send(SentinelEvent::Feature(feature));
        }
        if let Some(alert) = report.alert {
            self.events.send(SentinelEvent::Alert(alert));
        }
        for event in report.recording {
            self.events.send(SentinelEvent::Recording(event));
        }
        self.events.send(SentinelEvent::Stats(stats));
        self.events.send(SentinelEvent::Frame {
            frame,
            overlay: report.overlay,
        });
    }
}
