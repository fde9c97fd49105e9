// src/main.rs
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use log::{debug, info, trace};
use streamplot::stream::{AxisRange, WindowSnapshot};
use streamplot::{DemoConfig, StreamPipeline};

// 一个绘图窗口的前台状态：管线 + 最新一帧 (图表控件本身不在此项目内)
struct PlotWindow {
    pipeline: StreamPipeline,
    latest: Arc<Mutex<Option<WindowSnapshot>>>,
    received: u64,
}

impl PlotWindow {
    fn open(config: &DemoConfig, index: usize) -> anyhow::Result<Self> {
        let mut pipeline = StreamPipeline::new(config.pipeline_config(index))
            .with_context(|| format!("invalid settings for window {}", index + 1))?;
        let latest = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&latest);
        let window_id = pipeline.instance_id();
        let mut axis_left = AxisRange::default();
        let mut axis_right = AxisRange::default();
        pipeline.on_sample(move |n, reader| {
            let frame = reader.frame(n);
            // 左右两条 Y 轴只在数据超出当前范围时才重新设定
            if let Some(range) = frame.left_range {
                if axis_left.follow(range) {
                    trace!("window {window_id}: left axis -> {range:?}");
                }
            }
            if let Some(range) = frame.right_range {
                if axis_right.follow(range) {
                    trace!("window {window_id}: right axis -> {range:?}");
                }
            }
            if let Ok(mut slot) = sink.lock() {
                *slot = Some(frame);
            }
        });
        Ok(Self {
            pipeline,
            latest,
            received: 0,
        })
    }

    fn latest_frame(&self) -> Option<WindowSnapshot> {
        self.latest.lock().ok().and_then(|slot| slot.clone())
    }

    fn report(&self) {
        let Some(frame) = self.latest_frame() else {
            info!("window {}: no data yet", self.pipeline.instance_id() + 1);
            return;
        };
        info!(
            "window {} ({}): {} samples received, x={:.0}, showing {} [{}..={}], left {:?}, right {:?}",
            self.pipeline.instance_id() + 1,
            self.pipeline.config().mode.tag(),
            self.received,
            frame.bounds.x_max,
            frame.len(),
            frame.bounds.imin,
            frame.bounds.imax,
            frame.left_range,
            frame.right_range,
        );
    }
}

// 读取配置：命令行第一个参数是 JSON 配置文件路径，否则使用默认值
fn load_config() -> anyhow::Result<DemoConfig> {
    match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => DemoConfig::load(&path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => {
            let config = DemoConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

// 入口函数
fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = load_config()?;
    debug!("config: {config:?}");

    let mut windows = (0..config.pipelines)
        .map(|index| PlotWindow::open(&config, index))
        .collect::<anyhow::Result<Vec<_>>>()?;
    for window in &mut windows {
        window.pipeline.start()?;
    }

    let started = Instant::now();
    let mut last_report = started;
    while started.elapsed() < config.run_time() {
        for window in &mut windows {
            window.received += window.pipeline.pump() as u64;
        }
        if last_report.elapsed() >= Duration::from_secs(1) {
            windows.iter().for_each(PlotWindow::report);
            last_report = Instant::now();
        }
        thread::sleep(config.frame_interval());
    }

    // 关闭：先停止所有生产者，再把已排队的通知取完
    for window in &mut windows {
        window.pipeline.stop();
        window.received += window.pipeline.pump() as u64;
        window.report();
        let delivery = window.pipeline.delivery();
        if delivery.dropped() > 0 {
            info!(
                "window {}: {} notifications dropped",
                window.pipeline.instance_id() + 1,
                delivery.dropped()
            );
        }
    }

    if config.dump_last_frame {
        let frames: Vec<_> = windows.iter().filter_map(PlotWindow::latest_frame).collect();
        println!("{}", serde_json::to_string_pretty(&frames)?);
    }
    Ok(())
}
