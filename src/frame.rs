// 该文件是 Kahao （卡号） 项目的一部分。
// src/frame.rs - 检测器原始输出帧定义
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use serde::{Deserialize, Serialize};

/// 像素尺寸（宽、高）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
  pub width: f32,
  pub height: f32,
}

impl Size {
  pub const fn new(width: f32, height: f32) -> Self {
    Self { width, height }
  }
}

/// 像素坐标下的矩形
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelRect {
  pub left: f32,
  pub top: f32,
  pub right: f32,
  pub bottom: f32,
}

impl PixelRect {
  pub fn width(&self) -> f32 {
    self.right - self.left
  }

  pub fn height(&self) -> f32 {
    self.bottom - self.top
  }
}

/// 推理引擎的原始输出
///
/// 两种检测器：SSD 先验框回归输出，以及逐网格单元的类别置信度输出。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectorOutput {
  /// SSD 输出，均按网络层输出顺序排列
  Ssd {
    /// 每个先验框 4 个回归值
    locations: Vec<f32>,
    /// 每个先验框 NumClasses 个类别 logit
    logits: Vec<f32>,
  },
  /// 网格输出，形状 Rows × Cols × NumClasses，行优先
  Grid { scores: Vec<f32> },
}

/// 一帧检测器输出及其来源图像尺寸
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFrame {
  pub image_size: Size,
  pub output: DetectorOutput,
}

impl RawFrame {
  pub fn ssd(image_size: Size, locations: Vec<f32>, logits: Vec<f32>) -> Self {
    Self {
      image_size,
      output: DetectorOutput::Ssd { locations, logits },
    }
  }

  pub fn grid(image_size: Size, scores: Vec<f32>) -> Self {
    Self {
      image_size,
      output: DetectorOutput::Grid { scores },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn frame_json_uses_tagged_output() {
    let frame = RawFrame::grid(Size::new(480.0, 302.0), vec![0.0, 1.0]);
    let json = serde_json::to_string(&frame).unwrap();
    assert!(json.contains("\"kind\":\"grid\""));

    let back: RawFrame = serde_json::from_str(&json).unwrap();
    match back.output {
      DetectorOutput::Grid { scores } => assert_eq!(scores, vec![0.0, 1.0]),
      DetectorOutput::Ssd { .. } => panic!("unexpected ssd output"),
    }
  }
}
