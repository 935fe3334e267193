// 该文件是 Kahao （卡号） 项目的一部分。
// src/grid.rs - 卡片网格映射
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
use thiserror::Error;
use tracing::{debug, error};

use crate::{
  frame::{PixelRect, Size},
  ssd::DetectionBox,
};

pub const GRID_ROWS: usize = 34;
pub const GRID_COLS: usize = 51;
pub const GRID_CLASSES: usize = 3;
pub const GRID_NUMBER_CLASS: usize = 1;
pub const GRID_EXPIRY_CLASS: usize = 2;
pub const GRID_THRESHOLD: f32 = 0.5;
/// 单个数字组框在训练图像中的尺寸
pub const GRID_BOX_SIZE: Size = Size::new(80.0, 36.0);
/// 网格检测器的训练图像尺寸
pub const GRID_CARD_SIZE: Size = Size::new(480.0, 302.0);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
  #[error("网格尺寸无效: {rows}x{cols}")]
  EmptyGrid { rows: usize, cols: usize },
  #[error("网格置信度张量长度不匹配: 期望 {expected}, 实际 {actual}")]
  ScoreLength { expected: usize, actual: usize },
  #[error("类别 {class} 超出范围 (共 {classes} 类)")]
  ClassOutOfRange { class: usize, classes: usize },
  #[error("网格尺寸不一致: 期望 {expected:?}, 实际 {actual:?}")]
  GeometryMismatch {
    expected: (usize, usize),
    actual: (usize, usize),
  },
}

/// 逻辑卡片网格的几何参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridGeometry {
  pub rows: usize,
  pub cols: usize,
  pub box_size: Size,
  pub card_size: Size,
}

impl Default for GridGeometry {
  fn default() -> Self {
    Self {
      rows: GRID_ROWS,
      cols: GRID_COLS,
      box_size: GRID_BOX_SIZE,
      card_size: GRID_CARD_SIZE,
    }
  }
}

impl GridGeometry {
  pub fn new(rows: usize, cols: usize) -> Result<Self, GridError> {
    if rows == 0 || cols == 0 {
      return Err(GridError::EmptyGrid { rows, cols });
    }
    Ok(Self {
      rows,
      cols,
      ..Self::default()
    })
  }

  pub fn cells(&self) -> usize {
    self.rows * self.cols
  }
}

/// 落在网格单元上的一个检测
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridDetection {
  pub row: usize,
  pub col: usize,
  pub confidence: f32,
  pub geometry: GridGeometry,
  pub image_size: Size,
}

impl GridDetection {
  /// 还原该单元在原图中的像素矩形
  pub fn rect(&self) -> PixelRect {
    let g = &self.geometry;
    let w = g.box_size.width * self.image_size.width / g.card_size.width;
    let h = g.box_size.height * self.image_size.height / g.card_size.height;
    let x = if g.cols > 1 {
      (self.image_size.width - w) / (g.cols - 1) as f32 * self.col as f32
    } else {
      0.0
    };
    let y = if g.rows > 1 {
      (self.image_size.height - h) / (g.rows - 1) as f32 * self.row as f32
    } else {
      0.0
    };

    PixelRect {
      left: x,
      top: y,
      right: x + w,
      bottom: y + h,
    }
  }
}

/// 逐单元的类别置信度，形状 rows × cols × classes
#[derive(Debug, Clone)]
pub struct CellScores {
  rows: usize,
  cols: usize,
  classes: usize,
  scores: Vec<f32>,
}

impl CellScores {
  pub fn new(geometry: &GridGeometry, classes: usize, scores: Vec<f32>) -> Result<Self, GridError> {
    let expected = geometry.cells() * classes;
    if scores.len() != expected {
      error!("网格置信度长度 {}, 期望 {}", scores.len(), expected);
      return Err(GridError::ScoreLength {
        expected,
        actual: scores.len(),
      });
    }
    Ok(Self {
      rows: geometry.rows,
      cols: geometry.cols,
      classes,
      scores,
    })
  }

  /// 将检测框按中心点落入网格单元，每个 (行, 列, 类别) 保留最高置信度
  pub fn from_detections(
    boxes: &[DetectionBox],
    geometry: &GridGeometry,
    classes: usize,
    image_size: Size,
  ) -> Result<Self, GridError> {
    let mut cells = Self::new(geometry, classes, vec![0.0; geometry.cells() * classes])?;
    for b in boxes {
      if b.label >= classes {
        return Err(GridError::ClassOutOfRange {
          class: b.label,
          classes,
        });
      }
      let (cx, cy) = b.center();
      let row = bucket(cy / image_size.height, geometry.rows);
      let col = bucket(cx / image_size.width, geometry.cols);
      let idx = cells.index(row, col, b.label);
      if b.confidence > cells.scores[idx] {
        cells.scores[idx] = b.confidence;
      }
    }
    Ok(cells)
  }

  pub fn rows(&self) -> usize {
    self.rows
  }

  pub fn cols(&self) -> usize {
    self.cols
  }

  pub fn classes(&self) -> usize {
    self.classes
  }

  pub fn score(&self, row: usize, col: usize, class: usize) -> f32 {
    self.scores[self.index(row, col, class)]
  }

  fn index(&self, row: usize, col: usize, class: usize) -> usize {
    (row * self.cols + col) * self.classes + class
  }
}

fn bucket(normalized: f32, count: usize) -> usize {
  ((normalized * count as f32).floor().max(0.0) as usize).min(count - 1)
}

/// 将逐单元置信度转换为网格检测列表
#[derive(Debug, Clone, Copy)]
pub struct GridMapper {
  geometry: GridGeometry,
  threshold: f32,
}

impl GridMapper {
  pub fn new(geometry: GridGeometry, threshold: f32) -> Self {
    Self {
      geometry,
      threshold,
    }
  }

  pub fn geometry(&self) -> &GridGeometry {
    &self.geometry
  }

  /// 按行优先顺序输出置信度不低于阈值的单元
  pub fn map(
    &self,
    scores: &CellScores,
    class: usize,
    image_size: Size,
  ) -> Result<Vec<GridDetection>, GridError> {
    if (scores.rows, scores.cols) != (self.geometry.rows, self.geometry.cols) {
      return Err(GridError::GeometryMismatch {
        expected: (self.geometry.rows, self.geometry.cols),
        actual: (scores.rows, scores.cols),
      });
    }
    if class >= scores.classes {
      return Err(GridError::ClassOutOfRange {
        class,
        classes: scores.classes,
      });
    }

    let mut detections = Vec::new();
    for row in 0..scores.rows {
      for col in 0..scores.cols {
        let confidence = scores.score(row, col, class);
        if confidence >= self.threshold {
          detections.push(GridDetection {
            row,
            col,
            confidence,
            geometry: self.geometry,
            image_size,
          });
        }
      }
    }
    debug!("类别 {} 映射到网格单元 {} 个", class, detections.len());
    Ok(detections)
  }
}
