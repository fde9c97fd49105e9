// src/types.rs
use serde::{Deserialize, Serialize};

// 执行模式：同一线程产生+读取，或后台线程产生
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Inline,
    #[default]
    Offloaded,
}

impl ExecutionMode {
    pub fn tag(self) -> &'static str {
        match self {
            ExecutionMode::Inline => "ST",
            ExecutionMode::Offloaded => "MT",
        }
    }
}

// 管线状态机: Stopped -> Running -> Stopped
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum PipelineState {
    Stopped,
    Running,
}

// 两条曲线 (左轴 / 右轴)
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Trace {
    Left,
    Right,
}

// 后台发给前台的通知: 每个采样点一条, 按产生顺序
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Notification {
    pub x: f64,
    pub y_left: f64,
    pub y_right: f64,
}
