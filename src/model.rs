// 该文件是 Kahao （卡号） 项目的一部分。
// src/model.rs - 模型
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

use crate::frame::{PixelRect, RawFrame};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 数字识别模型
///
/// 对图像中的一个矩形区域做识别，`Ok(None)` 表示该区域无法识别为数字。
pub trait DigitClassifier {
  type Image;
  type Error;

  fn classify(&self, image: &Self::Image, rect: &PixelRect) -> Result<Option<Digits>, Self::Error>;
}

/// 由调用方提供的模型构造器，扫描器在初始化和重试时调用
pub trait ModelFactory {
  type Image;
  type Detector: Model<Input = Self::Image, Output = RawFrame>;
  type Classifier: DigitClassifier<Image = Self::Image>;
  type Error: std::error::Error + Send + Sync + 'static;

  fn create_detector(&self) -> Result<Self::Detector, Self::Error>;
  fn create_classifier(&self) -> Result<Self::Classifier, Self::Error>;
}

/// 识别出的一组数字，每个元素取值 0..=9
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Digits(Vec<u8>);

impl Digits {
  /// 所有元素都是 0..=9 时返回 Some
  pub fn new(digits: Vec<u8>) -> Option<Self> {
    if digits.iter().all(|d| *d <= 9) {
      Some(Self(digits))
    } else {
      None
    }
  }

  pub fn as_slice(&self) -> &[u8] {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn extend(&mut self, other: &Digits) {
    self.0.extend_from_slice(&other.0);
  }
}

impl std::str::FromStr for Digits {
  type Err = char;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    s.chars()
      .map(|c| c.to_digit(10).map(|d| d as u8).ok_or(c))
      .collect::<Result<Vec<_>, _>>()
      .map(Digits)
  }
}

impl fmt::Display for Digits {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for d in &self.0 {
      write!(f, "{}", d)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn digits_reject_out_of_range() {
    assert!(Digits::new(vec![1, 2, 10]).is_none());
    assert_eq!(Digits::new(vec![4, 2]).unwrap().to_string(), "42");
  }

  #[test]
  fn digits_parse_from_str() {
    let digits: Digits = "0412".parse().unwrap();
    assert_eq!(digits.as_slice(), &[0, 4, 1, 2]);
    assert_eq!("12a".parse::<Digits>(), Err('a'));
  }
}
