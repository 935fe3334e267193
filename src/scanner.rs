// 该文件是 Kahao （卡号） 项目的一部分。
// src/scanner.rs - 卡号扫描器
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
use tracing::{debug, error, info, warn};

use crate::{
  card::{CardExpiry, CardNumber, stitch_amex},
  grid::GridDetection,
  layout::{LayoutKind, Line},
  model::{DigitClassifier, Digits, Model, ModelFactory},
  pipeline::{Pipeline, PipelineError},
};

#[derive(Error, Debug)]
pub enum ScanError {
  #[error("模型创建失败: {0}")]
  Factory(Box<dyn std::error::Error + Send + Sync>),
  #[error("检测器推理失败: {0}")]
  Detector(Box<dyn std::error::Error + Send + Sync>),
  #[error("数字识别失败: {0}")]
  Classifier(Box<dyn std::error::Error + Send + Sync>),
  #[error("后处理失败: {0}")]
  Pipeline(#[from] PipelineError),
}

impl ScanError {
  /// 只有模型运行错误可以通过重建模型恢复
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::Detector(_) | Self::Classifier(_))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  pub max_retries: usize,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self { max_retries: 1 }
  }
}

/// 一帧的扫描结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardScan {
  /// 识别出卡号的布局，未识别出时为 None
  pub kind: LayoutKind,
  pub number: Option<CardNumber>,
  pub number_line: Option<Line>,
  pub expiry: Option<CardExpiry>,
  pub expiry_box: Option<GridDetection>,
  /// 尝试过但未能识别的序列
  pub rejected: Vec<Line>,
}

impl CardScan {
  fn empty() -> Self {
    Self {
      kind: LayoutKind::None,
      number: None,
      number_line: None,
      expiry: None,
      expiry_box: None,
      rejected: Vec::new(),
    }
  }
}

#[derive(Debug)]
pub enum ScanOutcome {
  Scanned(CardScan),
  Unrecoverable(ScanError),
}

impl ScanOutcome {
  pub fn scanned(self) -> Option<CardScan> {
    match self {
      Self::Scanned(scan) => Some(scan),
      Self::Unrecoverable(_) => None,
    }
  }
}

/// 检测、后处理与数字识别
///
/// `scan` 需要可变借用，同一扫描器同一时间只处理一帧。
pub struct CardScanner<F: ModelFactory> {
  factory: F,
  detector: F::Detector,
  classifier: F::Classifier,
  pipeline: Pipeline,
  policy: RetryPolicy,
}

impl<F> CardScanner<F>
where
  F: ModelFactory,
  <F::Detector as Model>::Error: std::error::Error + Send + Sync + 'static,
  <F::Classifier as DigitClassifier>::Error: std::error::Error + Send + Sync + 'static,
{
  pub fn init(factory: F, pipeline: Pipeline, policy: RetryPolicy) -> Result<Self, ScanError> {
    let (detector, classifier) = Self::create_models(&factory)?;
    info!("扫描器初始化完成, 最大重试次数 {}", policy.max_retries);
    Ok(Self {
      factory,
      detector,
      classifier,
      pipeline,
      policy,
    })
  }

  fn create_models(factory: &F) -> Result<(F::Detector, F::Classifier), ScanError> {
    let detector = factory
      .create_detector()
      .map_err(|e| ScanError::Factory(Box::new(e)))?;
    let classifier = factory
      .create_classifier()
      .map_err(|e| ScanError::Factory(Box::new(e)))?;
    Ok((detector, classifier))
  }

  pub fn pipeline(&self) -> &Pipeline {
    &self.pipeline
  }

  pub fn scan(&mut self, image: &F::Image) -> ScanOutcome {
    let mut retries = 0;
    loop {
      match self.scan_once(image) {
        Ok(scan) => return ScanOutcome::Scanned(scan),
        Err(e) if e.is_retryable() && retries < self.policy.max_retries => {
          retries += 1;
          warn!("{}, 重建模型后第 {} 次重试", e, retries);
          match Self::create_models(&self.factory) {
            Ok((detector, classifier)) => {
              self.detector = detector;
              self.classifier = classifier;
            }
            Err(e) => {
              error!("重建模型失败: {}", e);
              return ScanOutcome::Unrecoverable(e);
            }
          }
        }
        Err(e) => {
          error!("扫描失败: {}", e);
          return ScanOutcome::Unrecoverable(e);
        }
      }
    }
  }

  fn scan_once(&self, image: &F::Image) -> Result<CardScan, ScanError> {
    let frame = self
      .detector
      .infer(image)
      .map_err(|e| ScanError::Detector(Box::new(e)))?;
    let analysis = self.pipeline.analyze(&frame)?;

    let mut scan = CardScan::empty();
    'layouts: for kind in LayoutKind::FALLBACK_ORDER {
      for line in analysis.post.numbers(kind) {
        match self.read_line(image, &line, kind)? {
          Some(number) => {
            debug!("{} 布局识别出卡号", kind);
            scan.kind = kind;
            scan.number = Some(number);
            scan.number_line = Some(line);
            break 'layouts;
          }
          None => scan.rejected.push(line),
        }
      }
    }

    if let Some(expiry_box) = analysis.expiry {
      let digits = self.classify(image, &expiry_box)?;
      scan.expiry = digits.as_ref().and_then(CardExpiry::from_digits);
      if scan.expiry.is_some() {
        scan.expiry_box = Some(expiry_box);
      }
    }
    Ok(scan)
  }

  /// 拼接一条序列上的数字，任一组无法识别或卡号无效时返回 None
  ///
  /// 美国运通布局的五个框按 4-6-5 分组拼接。
  fn read_line(
    &self,
    image: &F::Image,
    line: &Line,
    kind: LayoutKind,
  ) -> Result<Option<CardNumber>, ScanError> {
    let mut reads = Vec::with_capacity(line.len());
    for word in line {
      match self.classify(image, word)? {
        Some(group) => reads.push(group),
        None => return Ok(None),
      }
    }
    let digits = match kind {
      LayoutKind::Amex => match stitch_amex(&reads) {
        Some(digits) => digits,
        None => {
          let lengths: Vec<usize> = reads.iter().map(Digits::len).collect();
          debug!("美国运通数字组长度不符: {:?}", lengths);
          return Ok(None);
        }
      },
      _ => reads.iter().fold(Digits::default(), |mut digits, group| {
        digits.extend(group);
        digits
      }),
    };
    Ok(CardNumber::from_digits(&digits))
  }

  fn classify(&self, image: &F::Image, cell: &GridDetection) -> Result<Option<Digits>, ScanError> {
    self
      .classifier
      .classify(image, &cell.rect())
      .map_err(|e| ScanError::Classifier(Box::new(e)))
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::Cell, rc::Rc};

  use super::*;
  use crate::{
    frame::{PixelRect, RawFrame, Size},
    grid::{GRID_CLASSES, GridGeometry},
    pipeline::PipelineBuilder,
  };

  #[derive(Error, Debug)]
  #[error("模拟错误")]
  struct MockError;

  /// 模拟输入：检测器输出以及每个像素矩形对应的识别结果
  struct MockCard {
    frame: RawFrame,
    digits: Vec<(PixelRect, Digits)>,
  }

  #[derive(Default, Clone)]
  struct Counters {
    created: Rc<Cell<usize>>,
    detector_failures: Rc<Cell<usize>>,
    classifier_failures: Rc<Cell<usize>>,
  }

  fn take_failure(failures: &Cell<usize>) -> bool {
    let left = failures.get();
    if left > 0 {
      failures.set(left - 1);
      true
    } else {
      false
    }
  }

  struct MockDetector(Counters);

  impl Model for MockDetector {
    type Input = MockCard;
    type Output = RawFrame;
    type Error = MockError;

    fn infer(&self, input: &MockCard) -> Result<RawFrame, MockError> {
      if take_failure(&self.0.detector_failures) {
        return Err(MockError);
      }
      Ok(input.frame.clone())
    }
  }

  struct MockClassifier(Counters);

  impl DigitClassifier for MockClassifier {
    type Image = MockCard;
    type Error = MockError;

    fn classify(&self, image: &MockCard, rect: &PixelRect) -> Result<Option<Digits>, MockError> {
      if take_failure(&self.0.classifier_failures) {
        return Err(MockError);
      }
      Ok(
        image
          .digits
          .iter()
          .find(|(r, _)| r == rect)
          .map(|(_, d)| d.clone()),
      )
    }
  }

  struct MockFactory(Counters);

  impl ModelFactory for MockFactory {
    type Image = MockCard;
    type Detector = MockDetector;
    type Classifier = MockClassifier;
    type Error = MockError;

    fn create_detector(&self) -> Result<MockDetector, MockError> {
      self.0.created.set(self.0.created.get() + 1);
      Ok(MockDetector(self.0.clone()))
    }

    fn create_classifier(&self) -> Result<MockClassifier, MockError> {
      Ok(MockClassifier(self.0.clone()))
    }
  }

  const IMAGE: Size = Size::new(480.0, 302.0);

  fn cell(row: usize, col: usize) -> GridDetection {
    GridDetection {
      row,
      col,
      confidence: 0.9,
      geometry: GridGeometry::default(),
      image_size: IMAGE,
    }
  }

  /// 默认网格上一行四组数字加一个有效期
  fn card(groups: [&str; 4], expiry: &str) -> MockCard {
    number_row(&[4, 16, 28, 40], &groups, expiry)
  }

  /// 第 15 行上给定列的数字组加一个有效期
  fn number_row(cols: &[usize], groups: &[&str], expiry: &str) -> MockCard {
    let geometry = GridGeometry::default();
    let mut scores = vec![0.0; geometry.cells() * GRID_CLASSES];
    let mut digits = Vec::new();
    for (&col, group) in cols.iter().zip(groups) {
      let c = cell(15, col);
      scores[(c.row * geometry.cols + c.col) * GRID_CLASSES + 1] = 0.9;
      if let Ok(d) = group.parse() {
        digits.push((c.rect(), d));
      }
    }
    let e = cell(22, 30);
    scores[(e.row * geometry.cols + e.col) * GRID_CLASSES + 2] = 0.8;
    if let Ok(d) = expiry.parse() {
      digits.push((e.rect(), d));
    }
    MockCard {
      frame: RawFrame::grid(IMAGE, scores),
      digits,
    }
  }

  fn scanner(counters: &Counters) -> CardScanner<MockFactory> {
    let pipeline = PipelineBuilder::grid().build().unwrap();
    CardScanner::init(
      MockFactory(counters.clone()),
      pipeline,
      RetryPolicy::default(),
    )
    .unwrap()
  }

  #[test]
  fn reads_number_and_expiry() {
    let counters = Counters::default();
    let mut scanner = scanner(&counters);
    let scan = scanner
      .scan(&card(["4242", "4242", "4242", "4242"], "0427"))
      .scanned()
      .unwrap();

    assert_eq!(scan.kind, LayoutKind::Horizontal);
    assert_eq!(scan.number.unwrap().as_str(), "4242424242424242");
    assert_eq!(scan.number_line.unwrap().len(), 4);
    assert_eq!(
      scan.expiry,
      Some(CardExpiry {
        month: 4,
        year: 2027
      })
    );
    assert!(scan.rejected.is_empty());
    assert_eq!(counters.created.get(), 1);
  }

  #[test]
  fn unreadable_group_abandons_the_line() {
    let counters = Counters::default();
    let mut scanner = scanner(&counters);
    let scan = scanner
      .scan(&card(["4242", "x", "4242", "4242"], "1399"))
      .scanned()
      .unwrap();
    assert_eq!(scan.kind, LayoutKind::None);
    assert!(scan.number.is_none());
    assert_eq!(scan.rejected.len(), 1);
    // 月份无效
    assert!(scan.expiry.is_none());
    assert!(scan.expiry_box.is_none());
  }

  #[test]
  fn reads_amex_number_in_four_six_five_groups() {
    let counters = Counters::default();
    let mut scanner = scanner(&counters);
    let scan = scanner
      .scan(&number_row(
        &[2, 14, 18, 30, 34],
        &["3782", "8224", "2463", "1000", "0005"],
        "0427",
      ))
      .scanned()
      .unwrap();

    assert_eq!(scan.kind, LayoutKind::Amex);
    assert_eq!(scan.number.unwrap().as_str(), "378282246310005");
    assert_eq!(scan.number_line.unwrap().len(), 5);
    assert!(scan.rejected.is_empty());
  }

  #[test]
  fn amex_reads_with_wrong_group_lengths_are_rejected() {
    let counters = Counters::default();
    let mut scanner = scanner(&counters);
    let scan = scanner
      .scan(&number_row(
        &[2, 14, 18, 30, 34],
        &["3782", "822463", "2463", "1000", "0005"],
        "0427",
      ))
      .scanned()
      .unwrap();
    assert_eq!(scan.kind, LayoutKind::None);
    assert!(scan.number.is_none());
    assert_eq!(scan.rejected.len(), 1);
  }

  #[test]
  fn luhn_failure_is_not_a_number() {
    let counters = Counters::default();
    let mut scanner = scanner(&counters);
    let scan = scanner
      .scan(&card(["4242", "4242", "4242", "4241"], "0427"))
      .scanned()
      .unwrap();
    assert!(scan.number.is_none());
    assert!(scan.expiry.is_some());
  }

  #[test]
  fn model_errors_are_retried_with_fresh_models() {
    let counters = Counters::default();
    let mut scanner = scanner(&counters);
    counters.detector_failures.set(1);
    let scan = scanner
      .scan(&card(["4242", "4242", "4242", "4242"], "0427"))
      .scanned()
      .unwrap();
    assert!(scan.number.is_some());
    assert_eq!(counters.created.get(), 2);

    counters.classifier_failures.set(1);
    assert!(scanner.scan(&card(["4242", "4242", "4242", "4242"], "0427")).scanned().is_some());
    assert_eq!(counters.created.get(), 3);
  }

  #[test]
  fn exhausted_retries_are_unrecoverable() {
    let counters = Counters::default();
    let mut scanner = scanner(&counters);
    counters.detector_failures.set(2);
    let outcome = scanner.scan(&card(["4242", "4242", "4242", "4242"], "0427"));
    match outcome {
      ScanOutcome::Unrecoverable(ScanError::Detector(e)) => assert!(e.is::<MockError>()),
      other => panic!("应为检测器错误: {:?}", other),
    }
    assert_eq!(counters.created.get(), 2);
  }

  #[test]
  fn classifier_error_keeps_its_source() {
    let counters = Counters::default();
    let mut scanner = scanner(&counters);
    counters.classifier_failures.set(2);
    match scanner.scan(&card(["4242", "4242", "4242", "4242"], "0427")) {
      ScanOutcome::Unrecoverable(ScanError::Classifier(e)) => {
        assert!(e.downcast_ref::<MockError>().is_some());
        assert_eq!(e.to_string(), "模拟错误");
      }
      other => panic!("应为识别错误: {:?}", other),
    }
  }

  #[test]
  fn pipeline_errors_are_not_retried() {
    let counters = Counters::default();
    let mut scanner = scanner(&counters);
    let broken = MockCard {
      frame: RawFrame::grid(IMAGE, vec![0.0; 3]),
      digits: Vec::new(),
    };
    assert!(matches!(
      scanner.scan(&broken),
      ScanOutcome::Unrecoverable(ScanError::Pipeline(_))
    ));
    assert_eq!(counters.created.get(), 1);
  }
}
