// 该文件是 Kahao （卡号） 项目的一部分。
// src/ssd.rs - SSD 检测输出解码
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

use serde::Serialize;

use crate::frame::{PixelRect, Size};

mod decode;
mod nms;
mod predict;
mod priors;

pub use self::decode::{Decoded, DecodeError, FeatureMapLayout, SsdDecoder, rearrange, softmax_rows};
pub use self::nms::{NMS_CANDIDATE_CAP, area_of, hard_nms, intersection_over_union};
pub use self::predict::extract_predictions;
pub use self::priors::{Prior, PriorLayer, PriorTable, SSD_PRIOR_LAYERS};

/// 训练图像尺寸
pub const SSD_TRAINED_IMAGE_SIZE: Size = Size::new(600.0, 375.0);
pub const SSD_PRIORS_PER_ACTIVATION: usize = 3;
pub const SSD_COORDINATES_PER_PRIOR: usize = 4;
pub const SSD_CENTER_VARIANCE: f32 = 0.1;
pub const SSD_SIZE_VARIANCE: f32 = 0.2;
pub const SSD_PROB_THRESHOLD: f32 = 0.5;
pub const SSD_IOU_THRESHOLD: f32 = 0.5;
pub const SSD_TOP_K: usize = 20;

/// 角点形式的归一化框 [x_min, y_min, x_max, y_max]
pub type CornerBox = [f32; 4];

/// 像素坐标下的检测框
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectionBox {
  pub rect: PixelRect,
  pub confidence: f32,
  pub label: usize,
}

impl DetectionBox {
  /// 由归一化角点框按图像尺寸放大得到
  pub fn from_normalized(bbox: &CornerBox, image_size: Size, confidence: f32, label: usize) -> Self {
    Self {
      rect: PixelRect {
        left: bbox[0] * image_size.width,
        top: bbox[1] * image_size.height,
        right: bbox[2] * image_size.width,
        bottom: bbox[3] * image_size.height,
      },
      confidence,
      label,
    }
  }

  pub fn center(&self) -> (f32, f32) {
    (
      (self.rect.left + self.rect.right) / 2.0,
      (self.rect.top + self.rect.bottom) / 2.0,
    )
  }
}
