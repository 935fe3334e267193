// 该文件是 Kahao （卡号） 项目的一部分。
// src/layout/search.rs - 数字组序列搜索
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
use tracing::trace;

use crate::grid::GridDetection;

use super::Line;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
  /// 按列向右延伸，行差不超过给定值
  Horizontal,
  /// 按行向下延伸，列差不超过给定值
  Vertical,
}

/// 相邻判定的容差
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjacency {
  pub row_delta_horizontal: usize,
  pub col_delta_vertical: usize,
}

impl Default for Adjacency {
  fn default() -> Self {
    Self {
      row_delta_horizontal: super::DELTA_ROW_FOR_HORIZONTAL,
      col_delta_vertical: super::DELTA_COL_FOR_VERTICAL,
    }
  }
}

impl Adjacency {
  pub fn accepts(&self, direction: Direction, current: &GridDetection, next: &GridDetection) -> bool {
    match direction {
      Direction::Horizontal => {
        next.col > current.col && next.row.abs_diff(current.row) <= self.row_delta_horizontal
      }
      Direction::Vertical => {
        next.row > current.row && next.col.abs_diff(current.col) <= self.col_delta_vertical
      }
    }
  }
}

/// 深度优先枚举长度恰为 `target` 的相邻序列
///
/// 候选先按列（水平）或行（垂直）稳定排序，搜索只在排序后的列表中向后推进，
/// 因此同一序列不会重复使用同一个检测。结果按起点在排序后列表中的位置排列。
pub fn find_numbers(
  words: &[GridDetection],
  direction: Direction,
  target: usize,
  adjacency: &Adjacency,
) -> Vec<Line> {
  let mut sorted = words.to_vec();
  match direction {
    Direction::Horizontal => sorted.sort_by_key(|w| w.col),
    Direction::Vertical => sorted.sort_by_key(|w| w.row),
  }

  let mut lines = Vec::new();
  if target == 0 {
    return lines;
  }
  for (idx, word) in sorted.iter().enumerate() {
    let mut line = vec![*word];
    extend(&mut line, &sorted[idx + 1..], direction, target, adjacency, &mut lines);
  }
  trace!("{:?} 搜索长度 {} 的序列: {} 条", direction, target, lines.len());
  lines
}

fn extend(
  line: &mut Line,
  rest: &[GridDetection],
  direction: Direction,
  target: usize,
  adjacency: &Adjacency,
  lines: &mut Vec<Line>,
) {
  if line.len() == target {
    lines.push(line.clone());
    return;
  }
  let Some(&current) = line.last() else {
    return;
  };

  for (idx, next) in rest.iter().enumerate() {
    if adjacency.accepts(direction, &current, next) {
      line.push(*next);
      extend(line, &rest[idx + 1..], direction, target, adjacency, lines);
      line.pop();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{frame::Size, grid::GridGeometry};

  fn cell(row: usize, col: usize) -> GridDetection {
    GridDetection {
      row,
      col,
      confidence: 0.9,
      geometry: GridGeometry::new(20, 40).unwrap(),
      image_size: Size::new(480.0, 302.0),
    }
  }

  fn positions(line: &Line) -> Vec<(usize, usize)> {
    line.iter().map(|b| (b.row, b.col)).collect()
  }

  #[test]
  fn finds_single_horizontal_line() {
    let words = [cell(4, 10), cell(4, 1), cell(5, 7), cell(4, 4)];
    let lines = find_numbers(&words, Direction::Horizontal, 4, &Adjacency::default());
    assert_eq!(lines.len(), 1);
    assert_eq!(positions(&lines[0]), vec![(4, 1), (4, 4), (5, 7), (4, 10)]);
  }

  #[test]
  fn row_drift_beyond_tolerance_breaks_the_line() {
    let words = [cell(4, 1), cell(4, 4), cell(6, 7), cell(6, 10)];
    assert!(find_numbers(&words, Direction::Horizontal, 4, &Adjacency::default()).is_empty());
  }

  #[test]
  fn horizontal_search_ignores_vertical_chains() {
    let words = [cell(1, 5), cell(3, 5), cell(5, 5), cell(7, 5)];
    assert!(find_numbers(&words, Direction::Horizontal, 4, &Adjacency::default()).is_empty());

    let lines = find_numbers(&words, Direction::Vertical, 4, &Adjacency::default());
    assert_eq!(lines.len(), 1);
    assert_eq!(positions(&lines[0]), vec![(1, 5), (3, 5), (5, 5), (7, 5)]);
  }

  #[test]
  fn enumerates_every_combination_without_reuse() {
    // 第 2 列有两个可选单元
    let words = [cell(4, 1), cell(4, 4), cell(5, 4), cell(4, 7), cell(4, 10)];
    let lines = find_numbers(&words, Direction::Horizontal, 4, &Adjacency::default());
    assert_eq!(lines.len(), 2);
    for line in &lines {
      assert_eq!(line.len(), 4);
      let mut seen = positions(line);
      seen.dedup();
      assert_eq!(seen.len(), 4);
      assert!(line.windows(2).all(|w| w[1].col > w[0].col));
    }
  }

  #[test]
  fn lines_have_exactly_target_length() {
    let words: Vec<_> = (0..8).map(|i| cell(2, i * 3)).collect();
    for target in [1, 4, 5, 8] {
      let lines = find_numbers(&words, Direction::Horizontal, target, &Adjacency::default());
      assert!(!lines.is_empty());
      assert!(lines.iter().all(|l| l.len() == target));
    }
    assert!(find_numbers(&words, Direction::Horizontal, 9, &Adjacency::default()).is_empty());
    assert!(find_numbers(&words, Direction::Horizontal, 0, &Adjacency::default()).is_empty());
  }

  #[test]
  fn empty_candidates_give_no_lines() {
    assert!(find_numbers(&[], Direction::Vertical, 4, &Adjacency::default()).is_empty());
  }
}
