// 该文件是 Kahao （卡号） 项目的一部分。
// src/layout/combine.rs - 合并相邻网格检测
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

use tracing::debug;

use crate::grid::GridDetection;

/// 按置信度贪心合并相邻的检测
///
/// `sorted` 须已按置信度降序排列。每个仍被占用的单元清空其邻域，
/// 然后重新占用自身。清除不可撤销，后处理的框在两个簇之间时可能被重复保留。
pub fn combine_close_boxes(
  sorted: &[GridDetection],
  rows: usize,
  cols: usize,
  delta_row: usize,
  delta_col: usize,
) -> Vec<GridDetection> {
  let mut card_grid = vec![false; rows * cols];
  let inside = |b: &GridDetection| b.row < rows && b.col < cols;

  for b in sorted.iter().filter(|b| inside(b)) {
    card_grid[b.row * cols + b.col] = true;
  }

  for b in sorted.iter().filter(|b| inside(b)) {
    if !card_grid[b.row * cols + b.col] {
      continue;
    }
    let row_end = b.row.saturating_add(delta_row).min(rows - 1);
    let col_end = b.col.saturating_add(delta_col).min(cols - 1);
    for row in b.row.saturating_sub(delta_row)..=row_end {
      for col in b.col.saturating_sub(delta_col)..=col_end {
        card_grid[row * cols + col] = false;
      }
    }
    card_grid[b.row * cols + b.col] = true;
  }

  let combined: Vec<GridDetection> = sorted
    .iter()
    .filter(|b| inside(b) && card_grid[b.row * cols + b.col])
    .copied()
    .collect();
  debug!("合并相邻检测: {} -> {}", sorted.len(), combined.len());
  combined
}
