// 该文件是 Kahao （卡号） 项目的一部分。
// src/ssd/nms.rs - 非极大值抑制
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

use super::CornerBox;

/// 进入主循环前保留的最大候选数
pub const NMS_CANDIDATE_CAP: usize = 200;

const IOU_EPS: f32 = 1e-5;
const AREA_SIDE_MAX: f32 = 1000.0;

/// 由左上角和右下角计算面积，边长截断到 [0, 1000]
pub fn area_of(left_top: [f32; 2], right_bottom: [f32; 2]) -> f32 {
  let w = (right_bottom[0] - left_top[0]).clamp(0.0, AREA_SIDE_MAX);
  let h = (right_bottom[1] - left_top[1]).clamp(0.0, AREA_SIDE_MAX);
  w * h
}

pub fn intersection_over_union(a: &CornerBox, b: &CornerBox) -> f32 {
  let overlap_left_top = [a[0].max(b[0]), a[1].max(b[1])];
  let overlap_right_bottom = [a[2].min(b[2]), a[3].min(b[3])];
  let overlap = area_of(overlap_left_top, overlap_right_bottom);

  let area_a = area_of([a[0], a[1]], [a[2], a[3]]);
  let area_b = area_of([b[0], b[1]], [b[2], b[3]]);

  overlap / (area_a + area_b - overlap + IOU_EPS)
}

/// 硬 NMS，返回保留下来的下标，按概率从高到低
///
/// 排序稳定，概率相同时保持原始下标顺序。`top_k` 为 None 时保留全部。
pub fn hard_nms(
  boxes: &[CornerBox],
  probabilities: &[f32],
  iou_threshold: f32,
  top_k: Option<usize>,
) -> Vec<usize> {
  let mut indexes: Vec<usize> = (0..probabilities.len().min(boxes.len())).collect();
  indexes.sort_by(|&a, &b| probabilities[b].total_cmp(&probabilities[a]));
  indexes.truncate(NMS_CANDIDATE_CAP);

  let mut picked = Vec::new();
  while let Some((&current, rest)) = indexes.split_first() {
    picked.push(current);
    if top_k.is_some_and(|k| k == picked.len()) || rest.is_empty() {
      break;
    }

    let current_box = &boxes[current];
    indexes = rest
      .iter()
      .copied()
      .filter(|&i| intersection_over_union(current_box, &boxes[i]) < iou_threshold)
      .collect();
  }

  picked
}
