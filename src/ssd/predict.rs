// 该文件是 Kahao （卡号） 项目的一部分。
// src/ssd/predict.rs - 按类别筛选并抑制检测框
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

use crate::frame::Size;

use super::{CornerBox, Decoded, DetectionBox, hard_nms};

/// 对除背景（类别 0）外的每个类别做阈值筛选和 NMS
///
/// 输出按类别升序，同一类别内按 NMS 顺序。
pub fn extract_predictions(
  decoded: &Decoded,
  image_size: Size,
  prob_threshold: f32,
  iou_threshold: f32,
  top_k: Option<usize>,
) -> Vec<DetectionBox> {
  let mut picked = Vec::new();

  for class in 1..decoded.num_classes() {
    let mut probabilities = Vec::new();
    let mut subset: Vec<CornerBox> = Vec::new();
    for i in 0..decoded.len() {
      let p = decoded.probabilities(i)[class];
      if p > prob_threshold {
        probabilities.push(p);
        subset.push(decoded.boxes[i]);
      }
    }
    if probabilities.is_empty() {
      continue;
    }

    let kept = hard_nms(&subset, &probabilities, iou_threshold, top_k);
    debug!(
      "类别 {}: 候选 {} 个, 保留 {} 个",
      class,
      probabilities.len(),
      kept.len()
    );
    picked.extend(
      kept
        .into_iter()
        .map(|i| DetectionBox::from_normalized(&subset[i], image_size, probabilities[i], class)),
    );
  }

  picked
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ssd::{FeatureMapLayout, Prior, PriorTable, SsdDecoder};

  fn decoder(priors: Vec<Prior>) -> SsdDecoder {
    let layout = FeatureMapLayout {
      layers: vec![(priors.len(), 1)],
      priors_per_activation: 1,
    };
    SsdDecoder::new(PriorTable::new(priors), layout, 3).unwrap()
  }

  #[test]
  fn keeps_best_box_per_class_and_skips_background() {
    let prior = |cx: f32| Prior {
      cx,
      cy: 0.5,
      w: 0.1,
      h: 0.1,
    };
    let decoder = decoder(vec![prior(0.2), prior(0.21), prior(0.8)]);

    // 层高为 1，重排后顺序不变
    let locations = vec![0.0; 12];
    let logits = vec![
      0.0, 4.0, 0.0, // 类别 1
      0.0, 5.0, 0.0, // 类别 1，与上一个重叠
      5.0, 0.0, 0.0, // 背景
    ];
    let decoded = decoder.decode(&locations, &logits).unwrap();
    let boxes = extract_predictions(&decoded, Size::new(100.0, 50.0), 0.5, 0.5, Some(20));

    assert_eq!(boxes.len(), 1);
    assert_eq!(boxes[0].label, 1);
    let (cx, cy) = boxes[0].center();
    assert!((cx - 21.0).abs() < 1e-3);
    assert!((cy - 25.0).abs() < 1e-3);
  }

  #[test]
  fn threshold_is_strict() {
    let decoder = decoder(vec![Prior {
      cx: 0.5,
      cy: 0.5,
      w: 0.1,
      h: 0.1,
    }]);
    // 类别 1 与类别 2 概率均为 0.5
    let decoded = decoder.decode(&[0.0; 4], &[-80.0, 0.0, 0.0]).unwrap();
    let boxes = extract_predictions(&decoded, Size::new(1.0, 1.0), 0.5, 0.5, None);
    assert!(boxes.is_empty());
  }
}
