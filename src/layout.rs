// 该文件是 Kahao （卡号） 项目的一部分。
// src/layout.rs - 卡号布局后处理
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

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::grid::{GridDetection, GridGeometry};

mod combine;
mod search;
mod validate;

pub use self::combine::combine_close_boxes;
pub use self::search::{Adjacency, Direction, find_numbers};
pub use self::validate::{has_amex_gaps, is_evenly_spaced, spacing_deltas};

/// 常规卡号的数字组数
pub const NUMBER_WORD_COUNT: usize = 4;
/// 美国运通卡号的数字组数
pub const AMEX_WORD_COUNT: usize = 5;
/// 进入布局搜索的最大候选数
pub const MAX_BOXES_TO_DETECT: usize = 20;
pub const DELTA_ROW_FOR_COMBINE: usize = 2;
pub const DELTA_COL_FOR_COMBINE: usize = 2;
pub const DELTA_COL_FOR_AMEX_COMBINE: usize = 1;
pub const DELTA_ROW_FOR_HORIZONTAL: usize = 1;
pub const DELTA_COL_FOR_VERTICAL: usize = 1;
pub const MAX_SPACING_SPREAD: i64 = 2;
pub const AMEX_GAP_RATIO: f32 = 2.0;

/// 一条候选卡号，按阅读顺序排列的数字组
pub type Line = Vec<GridDetection>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
  Horizontal,
  Vertical,
  Amex,
  None,
}

impl LayoutKind {
  /// 依次尝试的布局
  pub const FALLBACK_ORDER: [LayoutKind; 3] = [Self::Horizontal, Self::Vertical, Self::Amex];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Horizontal => "horizontal",
      Self::Vertical => "vertical",
      Self::Amex => "amex",
      Self::None => "none",
    }
  }
}

impl fmt::Display for LayoutKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// 布局搜索的可调参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutParams {
  /// 常规布局合并邻域 (行, 列)
  pub combine: (usize, usize),
  /// 美国运通布局合并邻域 (行, 列)
  pub amex_combine: (usize, usize),
  pub adjacency: Adjacency,
  pub max_boxes: usize,
  pub max_spacing_spread: i64,
  pub amex_gap_ratio: f32,
}

impl Default for LayoutParams {
  fn default() -> Self {
    Self {
      combine: (DELTA_ROW_FOR_COMBINE, DELTA_COL_FOR_COMBINE),
      amex_combine: (DELTA_ROW_FOR_COMBINE, DELTA_COL_FOR_AMEX_COMBINE),
      adjacency: Adjacency::default(),
      max_boxes: MAX_BOXES_TO_DETECT,
      max_spacing_spread: MAX_SPACING_SPREAD,
      amex_gap_ratio: AMEX_GAP_RATIO,
    }
  }
}

/// 一帧卡号单元检测的后处理
#[derive(Debug, Clone)]
pub struct PostDetection {
  sorted: Vec<GridDetection>,
  rows: usize,
  cols: usize,
  params: LayoutParams,
}

impl PostDetection {
  /// 按置信度升序稳定排序后整体反转，再截断到 `max_boxes`
  ///
  /// 置信度相同的检测因此按输入的逆序处理。
  pub fn new(mut boxes: Vec<GridDetection>, geometry: &GridGeometry, params: LayoutParams) -> Self {
    boxes.sort_by(|a, b| a.confidence.total_cmp(&b.confidence));
    boxes.reverse();
    boxes.truncate(params.max_boxes);
    Self {
      sorted: boxes,
      rows: geometry.rows,
      cols: geometry.cols,
      params,
    }
  }

  pub fn candidates(&self) -> &[GridDetection] {
    &self.sorted
  }

  pub fn horizontal_numbers(&self) -> Vec<Line> {
    let (dr, dc) = self.params.combine;
    let combined = combine_close_boxes(&self.sorted, self.rows, self.cols, dr, dc);
    let lines = find_numbers(
      &combined,
      Direction::Horizontal,
      NUMBER_WORD_COUNT,
      &self.params.adjacency,
    );
    self.keep(lines, LayoutKind::Horizontal, |line| {
      is_evenly_spaced(&columns(line), self.params.max_spacing_spread)
    })
  }

  pub fn vertical_numbers(&self) -> Vec<Line> {
    let (dr, dc) = self.params.combine;
    let combined = combine_close_boxes(&self.sorted, self.rows, self.cols, dr, dc);
    let lines = find_numbers(
      &combined,
      Direction::Vertical,
      NUMBER_WORD_COUNT,
      &self.params.adjacency,
    );
    self.keep(lines, LayoutKind::Vertical, |line| {
      is_evenly_spaced(&rows(line), self.params.max_spacing_spread)
    })
  }

  pub fn amex_numbers(&self) -> Vec<Line> {
    let (dr, dc) = self.params.amex_combine;
    let combined = combine_close_boxes(&self.sorted, self.rows, self.cols, dr, dc);
    let lines = find_numbers(
      &combined,
      Direction::Horizontal,
      AMEX_WORD_COUNT,
      &self.params.adjacency,
    );
    self.keep(lines, LayoutKind::Amex, |line| {
      has_amex_gaps(&columns(line), self.params.amex_gap_ratio)
    })
  }

  pub fn numbers(&self, kind: LayoutKind) -> Vec<Line> {
    match kind {
      LayoutKind::Horizontal => self.horizontal_numbers(),
      LayoutKind::Vertical => self.vertical_numbers(),
      LayoutKind::Amex => self.amex_numbers(),
      LayoutKind::None => Vec::new(),
    }
  }

  /// 按回退顺序返回第一个有合格序列的布局
  pub fn first_layout(&self) -> (LayoutKind, Vec<Line>) {
    LayoutKind::FALLBACK_ORDER
      .into_iter()
      .map(|kind| (kind, self.numbers(kind)))
      .find(|(_, lines)| !lines.is_empty())
      .unwrap_or((LayoutKind::None, Vec::new()))
  }

  fn keep(&self, lines: Vec<Line>, kind: LayoutKind, valid: impl Fn(&Line) -> bool) -> Vec<Line> {
    let found = lines.len();
    let kept: Vec<Line> = lines.into_iter().filter(|l| valid(l)).collect();
    debug!("{} 布局: 序列 {} 条, 校验通过 {} 条", kind, found, kept.len());
    kept
  }
}

fn columns(line: &Line) -> Vec<usize> {
  line.iter().map(|b| b.col).collect()
}

fn rows(line: &Line) -> Vec<usize> {
  line.iter().map(|b| b.row).collect()
}

/// 选取置信度最高的有效期检测，相同时取最后出现者
pub fn select_expiry(expiry: &[GridDetection]) -> Option<GridDetection> {
  expiry.iter().fold(None, |best: Option<GridDetection>, b| match best {
    Some(current) if current.confidence.total_cmp(&b.confidence).is_gt() => Some(current),
    _ => Some(*b),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::Size;

  fn cell(geometry: GridGeometry, row: usize, col: usize, confidence: f32) -> GridDetection {
    GridDetection {
      row,
      col,
      confidence,
      geometry,
      image_size: Size::new(480.0, 302.0),
    }
  }

  fn positions(line: &Line) -> Vec<(usize, usize)> {
    line.iter().map(|b| (b.row, b.col)).collect()
  }

  #[test]
  fn candidates_sorted_and_capped() {
    let g = GridGeometry::default();
    let boxes: Vec<_> = (0..30)
      .map(|i| cell(g, i, 0, 0.5 + (i % 5) as f32 / 10.0))
      .collect();
    let post = PostDetection::new(boxes, &g, LayoutParams::default());
    let candidates = post.candidates();
    assert_eq!(candidates.len(), MAX_BOXES_TO_DETECT);
    assert!(candidates.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    // 置信度相同时后出现者在前
    assert_eq!(candidates[0].row, 29);
    assert_eq!(candidates[1].row, 24);
    assert_eq!(candidates[5].row, 4);
    assert_eq!(candidates[6].row, 28);
  }

  #[test]
  fn equal_confidence_keeps_the_later_cell() {
    let g = GridGeometry::new(9, 12).unwrap();
    let post = PostDetection::new(
      vec![cell(g, 4, 1, 0.9), cell(g, 4, 3, 0.9)],
      &g,
      LayoutParams::default(),
    );
    let (dr, dc) = LayoutParams::default().combine;
    let combined = combine_close_boxes(post.candidates(), g.rows, g.cols, dr, dc);
    assert_eq!(combined.len(), 1);
    assert_eq!((combined[0].row, combined[0].col), (4, 3));
  }

  #[test]
  fn nan_confidence_does_not_break_sorting() {
    let g = GridGeometry::default();
    let boxes = vec![cell(g, 1, 1, 0.4), cell(g, 2, 2, f32::NAN), cell(g, 3, 3, 0.8)];
    let post = PostDetection::new(boxes, &g, LayoutParams::default());
    let rows: Vec<_> = post.candidates().iter().map(|b| b.row).collect();
    assert_eq!(rows, vec![2, 3, 1]);
  }

  #[test]
  fn horizontal_layout_with_clutter() {
    let g = GridGeometry::default();
    let boxes = vec![
      cell(g, 10, 3, 0.9),
      cell(g, 10, 4, 0.6),
      cell(g, 10, 13, 0.85),
      cell(g, 11, 23, 0.8),
      cell(g, 10, 33, 0.95),
      cell(g, 30, 45, 0.7),
    ];
    let post = PostDetection::new(boxes, &g, LayoutParams::default());
    let lines = post.horizontal_numbers();
    assert_eq!(lines.len(), 1);
    assert_eq!(
      positions(&lines[0]),
      vec![(10, 3), (10, 13), (11, 23), (10, 33)]
    );
    assert!(post.vertical_numbers().is_empty());
    assert_eq!(post.first_layout().0, LayoutKind::Horizontal);
  }

  #[test]
  fn uneven_horizontal_falls_through_to_amex() {
    let g = GridGeometry::default();
    let boxes = vec![
      cell(g, 10, 2, 0.9),
      cell(g, 10, 14, 0.9),
      cell(g, 10, 18, 0.9),
      cell(g, 10, 30, 0.9),
      cell(g, 10, 34, 0.9),
    ];
    let post = PostDetection::new(boxes, &g, LayoutParams::default());
    assert!(post.horizontal_numbers().is_empty());
    assert!(post.vertical_numbers().is_empty());
    let (kind, lines) = post.first_layout();
    assert_eq!(kind, LayoutKind::Amex);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].len(), AMEX_WORD_COUNT);
  }

  #[test]
  fn vertical_layout() {
    let g = GridGeometry::default();
    let boxes = vec![
      cell(g, 2, 20, 0.9),
      cell(g, 8, 21, 0.9),
      cell(g, 14, 20, 0.9),
      cell(g, 20, 20, 0.9),
    ];
    let post = PostDetection::new(boxes, &g, LayoutParams::default());
    let (kind, lines) = post.first_layout();
    assert_eq!(kind, LayoutKind::Vertical);
    assert_eq!(
      positions(&lines[0]),
      vec![(2, 20), (8, 21), (14, 20), (20, 20)]
    );
  }

  #[test]
  fn nothing_found() {
    let g = GridGeometry::default();
    let post = PostDetection::new(Vec::new(), &g, LayoutParams::default());
    assert_eq!(post.first_layout(), (LayoutKind::None, Vec::new()));
    assert!(post.numbers(LayoutKind::None).is_empty());
  }

  #[test]
  fn expiry_picks_highest_then_last() {
    let g = GridGeometry::default();
    let expiry = [
      cell(g, 20, 10, 0.6),
      cell(g, 21, 12, 0.8),
      cell(g, 22, 30, 0.8),
    ];
    let best = select_expiry(&expiry).unwrap();
    assert_eq!((best.row, best.col), (22, 30));
    assert!(select_expiry(&[]).is_none());
  }

  #[test]
  fn kind_names() {
    assert_eq!(LayoutKind::Amex.to_string(), "amex");
    assert_eq!(serde_json::to_string(&LayoutKind::None).unwrap(), "\"none\"");
  }
}
