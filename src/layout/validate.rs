// 该文件是 Kahao （卡号） 项目的一部分。
// src/layout/validate.rs - 数字组间距校验
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

/// 相邻位置之差
pub fn spacing_deltas(positions: &[usize]) -> Vec<i64> {
  positions
    .windows(2)
    .map(|w| w[1] as i64 - w[0] as i64)
    .collect()
}

/// 最大间距与最小间距之差不超过 `max_spread`
///
/// 少于两个位置时没有间距可比较，视为不合格。
pub fn is_evenly_spaced(positions: &[usize], max_spread: i64) -> bool {
  let deltas = spacing_deltas(positions);
  match (deltas.iter().min(), deltas.iter().max()) {
    (Some(min), Some(max)) => max - min <= max_spread,
    _ => false,
  }
}

/// 美国运通布局：偶数下标间距与其后奇数下标间距之比不小于 `min_ratio`
///
/// 缺少配对的奇数间距或奇数间距为零时不合格。
pub fn has_amex_gaps(positions: &[usize], min_ratio: f32) -> bool {
  let deltas = spacing_deltas(positions);
  if deltas.is_empty() {
    return false;
  }
  deltas.chunks(2).all(|pair| match pair {
    [even, odd] if *odd != 0 => *even as f32 / *odd as f32 >= min_ratio,
    _ => false,
  })
}
