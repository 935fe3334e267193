// 该文件是 Kahao （卡号） 项目的一部分。
// src/ssd/priors.rs - 先验框生成
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

use std::sync::Arc;

use tracing::debug;

use crate::frame::Size;

use super::{SSD_PRIORS_PER_ACTIVATION, SSD_TRAINED_IMAGE_SIZE};

/// 中心形式的先验框，归一化坐标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prior {
  pub cx: f32,
  pub cy: f32,
  pub w: f32,
  pub h: f32,
}

/// 单个特征层的先验框参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorLayer {
  /// 特征图尺寸（宽、高）
  pub feature_map: (usize, usize),
  /// 下采样步长（宽、高）
  pub shrinkage: (f32, f32),
  pub box_size_min: f32,
  pub box_size_max: f32,
  pub aspect_ratio: f32,
}

pub const SSD_PRIOR_LAYERS: [PriorLayer; 2] = [
  PriorLayer {
    feature_map: (38, 24),
    shrinkage: (16.0, 16.0),
    box_size_min: 14.0,
    box_size_max: 30.0,
    aspect_ratio: 3.0,
  },
  PriorLayer {
    feature_map: (19, 12),
    shrinkage: (31.0, 31.0),
    box_size_min: 30.0,
    box_size_max: 45.0,
    aspect_ratio: 3.0,
  },
];

/// 只读先验框表，跨帧共享
#[derive(Debug, Clone)]
pub struct PriorTable {
  priors: Arc<[Prior]>,
}

impl PriorTable {
  pub fn new(priors: Vec<Prior>) -> Self {
    Self {
      priors: priors.into(),
    }
  }

  /// 按各层参数生成先验框，每个激活位置三个，所有值截断到 [0, 1]
  pub fn generate(layers: &[PriorLayer], trained: Size) -> Self {
    let mut priors = Vec::new();
    for layer in layers {
      generate_layer(layer, trained, &mut priors);
    }
    for prior in priors.iter_mut() {
      prior.cx = prior.cx.clamp(0.0, 1.0);
      prior.cy = prior.cy.clamp(0.0, 1.0);
      prior.w = prior.w.clamp(0.0, 1.0);
      prior.h = prior.h.clamp(0.0, 1.0);
    }
    debug!("生成先验框 {} 个", priors.len());
    Self::new(priors)
  }

  pub fn len(&self) -> usize {
    self.priors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.priors.is_empty()
  }

  pub fn as_slice(&self) -> &[Prior] {
    &self.priors
  }
}

impl Default for PriorTable {
  fn default() -> Self {
    Self::generate(&SSD_PRIOR_LAYERS, SSD_TRAINED_IMAGE_SIZE)
  }
}

fn generate_layer(layer: &PriorLayer, trained: Size, out: &mut Vec<Prior>) {
  let (map_w, map_h) = layer.feature_map;
  let scale_w = trained.width / layer.shrinkage.0;
  let scale_h = trained.height / layer.shrinkage.1;
  let ratio = layer.aspect_ratio.sqrt();

  let prior = |col: usize, row: usize, size: f32, ratio: f32| Prior {
    cx: (col as f32 + 0.5) / scale_w,
    cy: (row as f32 + 0.5) / scale_h,
    w: size / trained.width,
    h: size / trained.height * ratio,
  };

  for index in 0..map_w * map_h * SSD_PRIORS_PER_ACTIVATION {
    let row = index / SSD_PRIORS_PER_ACTIVATION / map_w;
    let col = (index / SSD_PRIORS_PER_ACTIVATION) % map_w;
    out.push(match index % SSD_PRIORS_PER_ACTIVATION {
      0 => prior(col, row, layer.box_size_min, 1.0),
      1 => prior(
        col,
        row,
        (layer.box_size_max * layer.box_size_min).sqrt(),
        ratio,
      ),
      _ => prior(col, row, layer.box_size_min, ratio),
    });
  }
}
