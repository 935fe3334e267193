// 该文件是 Kahao （卡号） 项目的一部分。
// src/ssd/decode.rs - 回归输出解码与 softmax
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

use thiserror::Error;
use tracing::{debug, error};

use super::{
  CornerBox, PriorTable, SSD_CENTER_VARIANCE, SSD_COORDINATES_PER_PRIOR,
  SSD_PRIORS_PER_ACTIVATION, SSD_SIZE_VARIANCE,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
  #[error("位置张量长度不匹配: 期望 {expected}, 实际 {actual}")]
  LocationLength { expected: usize, actual: usize },
  #[error("类别张量长度不匹配: 期望 {expected}, 实际 {actual}")]
  LogitLength { expected: usize, actual: usize },
  #[error("特征层布局与先验框数量不一致: 布局 {layout}, 先验框 {priors}")]
  LayoutMismatch { layout: usize, priors: usize },
  #[error("类别数量必须大于 0")]
  NoClasses,
}

/// 网络输出的特征层布局，按输出顺序排列
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMapLayout {
  /// 每层特征图尺寸（宽、高）
  pub layers: Vec<(usize, usize)>,
  pub priors_per_activation: usize,
}

impl Default for FeatureMapLayout {
  fn default() -> Self {
    Self {
      layers: vec![(38, 24), (19, 12)],
      priors_per_activation: SSD_PRIORS_PER_ACTIVATION,
    }
  }
}

impl FeatureMapLayout {
  pub fn total_priors(&self) -> usize {
    self
      .layers
      .iter()
      .map(|(w, h)| w * h * self.priors_per_activation)
      .sum()
  }
}

/// 将网络层输出顺序重排为先验框顺序
///
/// 每层数据视为 (total / height) × height 的行优先矩阵，输出其转置。
pub fn rearrange(
  values: &[f32],
  layout: &FeatureMapLayout,
  values_per_prior: usize,
) -> Result<Vec<f32>, DecodeError> {
  let expected = layout.total_priors() * values_per_prior;
  if values.len() != expected {
    return Err(DecodeError::LocationLength {
      expected,
      actual: values.len(),
    });
  }

  let mut out = Vec::with_capacity(values.len());
  let mut offset = 0;
  for &(width, height) in &layout.layers {
    let total = width * height * layout.priors_per_activation * values_per_prior;
    if total == 0 {
      continue;
    }
    let columns = total / height;
    for step in 0..height {
      for k in 0..columns {
        out.push(values[offset + k * height + step]);
      }
    }
    offset += total;
  }
  Ok(out)
}

/// 逐行 softmax，不减最大值
///
/// 指数在 f64 中计算，行和按 f32 累加；溢出时行和为 inf，该行概率全部为 0。
pub fn softmax_rows(logits: &[f32], num_classes: usize) -> Vec<f32> {
  let mut out = Vec::with_capacity(logits.len());
  for row in logits.chunks(num_classes) {
    let mut sum = 0.0f32;
    for &x in row {
      sum = (sum as f64 + (x as f64).exp()) as f32;
    }
    for &x in row {
      out.push(((x as f64).exp() / sum as f64) as f32);
    }
  }
  out
}

/// 解码结果：按先验框顺序排列的角点框与类别概率
#[derive(Debug, Clone)]
pub struct Decoded {
  pub boxes: Vec<CornerBox>,
  probabilities: Vec<f32>,
  num_classes: usize,
}

impl Decoded {
  pub fn len(&self) -> usize {
    self.boxes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.boxes.is_empty()
  }

  pub fn num_classes(&self) -> usize {
    self.num_classes
  }

  /// 第 i 个先验框的类别概率
  pub fn probabilities(&self, i: usize) -> &[f32] {
    &self.probabilities[i * self.num_classes..(i + 1) * self.num_classes]
  }
}

#[derive(Debug, Clone)]
pub struct SsdDecoder {
  priors: PriorTable,
  layout: FeatureMapLayout,
  num_classes: usize,
  center_variance: f32,
  size_variance: f32,
}

impl SsdDecoder {
  pub fn new(
    priors: PriorTable,
    layout: FeatureMapLayout,
    num_classes: usize,
  ) -> Result<Self, DecodeError> {
    if num_classes == 0 {
      return Err(DecodeError::NoClasses);
    }
    if layout.total_priors() != priors.len() {
      error!(
        "特征层布局共 {} 个先验框, 先验框表共 {} 个",
        layout.total_priors(),
        priors.len()
      );
      return Err(DecodeError::LayoutMismatch {
        layout: layout.total_priors(),
        priors: priors.len(),
      });
    }
    Ok(Self {
      priors,
      layout,
      num_classes,
      center_variance: SSD_CENTER_VARIANCE,
      size_variance: SSD_SIZE_VARIANCE,
    })
  }

  pub fn variances(mut self, center: f32, size: f32) -> Self {
    self.center_variance = center;
    self.size_variance = size;
    self
  }

  pub fn num_classes(&self) -> usize {
    self.num_classes
  }

  pub fn num_priors(&self) -> usize {
    self.priors.len()
  }

  pub fn decode(&self, locations: &[f32], logits: &[f32]) -> Result<Decoded, DecodeError> {
    let num_priors = self.priors.len();
    let expected_loc = num_priors * SSD_COORDINATES_PER_PRIOR;
    if locations.len() != expected_loc {
      error!("位置张量长度 {}, 期望 {}", locations.len(), expected_loc);
      return Err(DecodeError::LocationLength {
        expected: expected_loc,
        actual: locations.len(),
      });
    }
    let expected_cls = num_priors * self.num_classes;
    if logits.len() != expected_cls {
      error!("类别张量长度 {}, 期望 {}", logits.len(), expected_cls);
      return Err(DecodeError::LogitLength {
        expected: expected_cls,
        actual: logits.len(),
      });
    }

    let locations = rearrange(locations, &self.layout, SSD_COORDINATES_PER_PRIOR)?;
    let logits = rearrange(logits, &self.layout, self.num_classes).map_err(|_| {
      DecodeError::LogitLength {
        expected: expected_cls,
        actual: logits.len(),
      }
    })?;

    let boxes = locations
      .chunks(SSD_COORDINATES_PER_PRIOR)
      .zip(self.priors.as_slice())
      .map(|(loc, prior)| {
        let cx = loc[0] * self.center_variance * prior.w + prior.cx;
        let cy = loc[1] * self.center_variance * prior.h + prior.cy;
        let w = (((loc[2] * self.size_variance) as f64).exp() * prior.w as f64) as f32;
        let h = (((loc[3] * self.size_variance) as f64).exp() * prior.h as f64) as f32;
        [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0]
      })
      .collect::<Vec<_>>();

    let probabilities = softmax_rows(&logits, self.num_classes);
    debug!("解码先验框 {} 个", boxes.len());

    Ok(Decoded {
      boxes,
      probabilities,
      num_classes: self.num_classes,
    })
  }
}
