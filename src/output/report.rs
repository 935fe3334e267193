// 该文件是 Kahao （卡号） 项目的一部分。
// src/output/report.rs - 布局结果报告
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

use crate::{
  frame::{PixelRect, Size},
  grid::GridDetection,
  layout::LayoutKind,
  pipeline::LayoutResult,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellReport {
  pub row: usize,
  pub col: usize,
  pub confidence: f32,
  pub rect: PixelRect,
}

impl From<&GridDetection> for CellReport {
  fn from(cell: &GridDetection) -> Self {
    Self {
      row: cell.row,
      col: cell.col,
      confidence: cell.confidence,
      rect: cell.rect(),
    }
  }
}

/// 一帧布局结果的可序列化摘要
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutReport {
  pub kind: LayoutKind,
  pub image_size: Size,
  pub number: Option<Vec<CellReport>>,
  /// 通过校验的序列总数
  pub candidates: usize,
  pub expiry: Option<CellReport>,
}

impl From<&LayoutResult> for LayoutReport {
  fn from(result: &LayoutResult) -> Self {
    Self {
      kind: result.kind,
      image_size: result.image_size,
      number: result
        .number()
        .map(|line| line.iter().map(CellReport::from).collect()),
      candidates: result.lines.len(),
      expiry: result.expiry.as_ref().map(CellReport::from),
    }
  }
}
