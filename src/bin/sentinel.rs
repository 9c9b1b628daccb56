/// 数字卫兵 (Digital Sentinel)
///
/// 场景回放监控: 从JSON场景读取逐帧检测框, 运行跟踪/告警/录像,
/// 事件以JSON行输出到标准输出
///
/// 系统架构:
/// 1. 检测线程: 取帧 → 关联 → 识别 → 告警 → 录像
/// 2. 主线程:   消费事件并输出
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sentinel_rs::systems::{
    Alarm, Collaborators, DiskCaptureStore, FrameDirRecorder, Monitor, NightVision, Scenario,
    ScriptedSource, SentinelEvent, TerminalBell,
};
use sentinel_rs::SentinelConfig;

/// 数字卫兵参数
#[derive(Parser, Debug)]
#[command(author, version, about = "数字卫兵 - 智能视频监控核心 (场景回放)", long_about = None)]
struct Args {
    /// 配置文件 (不存在时写出默认配置)
    #[arg(short, long, default_value = "sentinel.json")]
    config: PathBuf,

    /// 场景文件 (逐帧检测框)
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// 抓拍目录 (覆盖配置)
    #[arg(long)]
    captures: Option<PathBuf>,

    /// 录像目录 (覆盖配置)
    #[arg(long)]
    recordings: Option<PathBuf>,

    /// 启用夜视模式
    #[arg(long)]
    night_mode: bool,

    /// 关闭人脸识别
    #[arg(long)]
    no_face_recognition: bool,

    /// 关闭轨迹绘制
    #[arg(long)]
    no_trajectories: bool,

    /// 告警时终端响铃
    #[arg(long)]
    beep: bool,

    /// 同时输出每帧叠加层
    #[arg(long)]
    frames: bool,

    /// 打印配置后退出
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sentinel_rs=info,sentinel=info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut config = SentinelConfig::load(&args.config);
    if let Some(dir) = args.captures {
        config.captures_dir = dir;
    }
    if let Some(dir) = args.recordings {
        config.recordings_dir = dir;
    }
    config.night_mode |= args.night_mode;
    config.face_recognition &= !args.no_face_recognition;
    config.show_trajectories &= !args.no_trajectories;

    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }
    config.print_summary();

    let scenario_path = args
        .scenario
        .context("需要指定场景文件: --scenario <FILE>")?;
    let scenario = Scenario::load(&scenario_path)?;
    info!(
        "🚀 数字卫兵系统启动 | 场景: {} ({} 帧, {}x{})",
        scenario_path.display(),
        scenario.cycles.len(),
        scenario.width,
        scenario.height
    );

    let collaborators = Collaborators {
        identity: None,
        pose: None,
        capture: Box::new(DiskCaptureStore::new(&config.captures_dir)),
        recorder: Box::new(FrameDirRecorder::new(&config.recordings_dir)),
        alarm: args
            .beep
            .then(|| Box::new(TerminalBell) as Box<dyn Alarm>),
    };

    let monitor = Monitor::start(
        config,
        Box::new(ScriptedSource::new(scenario)),
        Box::new(NightVision),
        collaborators,
    )?;
    info!("✅ 系统就绪,开始监控...");

    // 检测线程结束后发送端关闭, 迭代自然结束
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for event in monitor.events().iter() {
        if matches!(event, SentinelEvent::Frame { .. }) && !args.frames {
            continue;
        }
        serde_json::to_writer(&mut out, &event)?;
        writeln!(out)?;
    }

    let summary = monitor.wait()?;
    info!(
        "📊 共 {} 周期 | {} 次告警 | {} 个目标 | 丢弃事件 {}",
        summary.cycles, summary.alerts, summary.entities_created, summary.dropped_events
    );
    if let Some(message) = dropped_warning(summary.dropped_events) {
        warn!("{}", message);
    }
    Ok(())
}

/// 事件被丢弃时的提示 (队列满时告警行也可能丢失)
fn dropped_warning(dropped: u64) -> Option<String> {
    (dropped > 0).then(|| {
        format!(
            "⚠️ 事件队列已满, 丢弃 {} 条事件 (可能包含告警), 可调大 event_queue_capacity",
            dropped
        )
    })
}
