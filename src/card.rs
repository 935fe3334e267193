// 该文件是 Kahao （卡号） 项目的一部分。
// src/card.rs - 卡号与有效期
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

use crate::model::Digits;

pub const CARD_NUMBER_MIN_LEN: usize = 13;
pub const CARD_NUMBER_MAX_LEN: usize = 19;
/// 美国运通卡号的分组长度
pub const AMEX_GROUP_LENGTHS: [usize; 3] = [4, 6, 5];

/// Luhn 校验
pub fn luhn_check(digits: &[u8]) -> bool {
  if digits.is_empty() {
    return false;
  }
  let sum: u32 = digits
    .iter()
    .rev()
    .enumerate()
    .map(|(i, &d)| {
      let d = d as u32;
      if i % 2 == 1 {
        let doubled = d * 2;
        if doubled > 9 { doubled - 9 } else { doubled }
      } else {
        d
      }
    })
    .sum();
  sum % 10 == 0
}

/// 长度在 13 到 19 位之间并通过 Luhn 校验
pub fn is_valid_card_number(digits: &[u8]) -> bool {
  (CARD_NUMBER_MIN_LEN..=CARD_NUMBER_MAX_LEN).contains(&digits.len()) && luhn_check(digits)
}

/// 把美国运通布局五个框的识别结果拼成 4-6-5 的 15 位数字
///
/// 第一个框是第一组。第二、三个框分别覆盖第二组的头和尾，第四、五个框覆盖第三组，
/// 两框重叠的数字只取一次：先取前框的全部，再从后框末尾补足该组长度。
pub fn stitch_amex(reads: &[Digits]) -> Option<Digits> {
  let [first, second_head, second_tail, third_head, third_tail] = reads else {
    return None;
  };
  let [first_len, second_len, third_len] = AMEX_GROUP_LENGTHS;
  if first.len() != first_len {
    return None;
  }
  let mut stitched = first.clone();
  for (head, tail, len) in [
    (second_head, second_tail, second_len),
    (third_head, third_tail, third_len),
  ] {
    let rest = len.checked_sub(head.len())?;
    if rest == 0 || rest > tail.len() {
      return None;
    }
    stitched.extend(head);
    stitched.extend(&Digits::new(tail.as_slice()[tail.len() - rest..].to_vec())?);
  }
  Some(stitched)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CardNumber(String);

impl CardNumber {
  pub fn from_digits(digits: &Digits) -> Option<Self> {
    if is_valid_card_number(digits.as_slice()) {
      Some(Self(digits.to_string()))
    } else {
      None
    }
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for CardNumber {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CardExpiry {
  pub month: u8,
  pub year: u16,
}

impl CardExpiry {
  /// 解析 MMYY 或 MMYYYY，两位年份视为 20YY
  pub fn from_digits(digits: &Digits) -> Option<Self> {
    let d = digits.as_slice();
    let number = |s: &[u8]| s.iter().fold(0u16, |acc, &x| acc * 10 + x as u16);
    let (month, year) = match d.len() {
      4 => (number(&d[..2]), 2000 + number(&d[2..])),
      6 => (number(&d[..2]), number(&d[2..])),
      _ => return None,
    };
    if !(1..=12).contains(&month) {
      return None;
    }
    Some(Self {
      month: month as u8,
      year,
    })
  }
}

impl fmt::Display for CardExpiry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:02}/{:02}", self.month, self.year % 100)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn digits(s: &str) -> Digits {
    s.parse().unwrap()
  }

  #[test]
  fn luhn() {
    assert!(luhn_check(digits("4242424242424242").as_slice()));
    assert!(luhn_check(digits("378282246310005").as_slice()));
    assert!(!luhn_check(digits("4242424242424241").as_slice()));
    assert!(!luhn_check(&[]));
  }

  #[test]
  fn card_number_length_bounds() {
    assert!(CardNumber::from_digits(&digits("4242424242424242")).is_some());
    // 通过 Luhn 但太短
    assert!(CardNumber::from_digits(&digits("0000")).is_none());
    assert!(CardNumber::from_digits(&digits("00000000000000000000")).is_none());
    assert_eq!(
      CardNumber::from_digits(&digits("378282246310005"))
        .unwrap()
        .as_str(),
      "378282246310005"
    );
  }

  #[test]
  fn amex_reads_are_stitched_into_four_six_five() {
    let reads = ["3782", "8224", "2463", "1000", "0005"].map(digits);
    let stitched = stitch_amex(&reads).unwrap();
    assert_eq!(stitched.to_string(), "378282246310005");
    assert!(CardNumber::from_digits(&stitched).is_some());

    // 组长不符时不拼接
    assert!(stitch_amex(&["378", "8224", "2463", "1000", "0005"].map(digits)).is_none());
    assert!(stitch_amex(&["3782", "822463", "2463", "1000", "0005"].map(digits)).is_none());
    assert!(stitch_amex(&["3782", "8224", "2", "1000", "0005"].map(digits)).is_none());
    assert!(stitch_amex(&reads[..4]).is_none());
  }

  #[test]
  fn expiry_formats() {
    assert_eq!(
      CardExpiry::from_digits(&digits("0427")),
      Some(CardExpiry {
        month: 4,
        year: 2027
      })
    );
    assert_eq!(
      CardExpiry::from_digits(&digits("122031")),
      Some(CardExpiry {
        month: 12,
        year: 2031
      })
    );
    assert_eq!(CardExpiry::from_digits(&digits("1327")), None);
    assert_eq!(CardExpiry::from_digits(&digits("0027")), None);
    assert_eq!(CardExpiry::from_digits(&digits("042")), None);
    assert_eq!(CardExpiry::from_digits(&digits("0427")).unwrap().to_string(), "04/27");
  }
}
