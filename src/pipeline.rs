// 该文件是 Kahao （卡号） 项目的一部分。
// src/pipeline.rs - 单帧布局后处理流水线
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
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl,
  frame::{DetectorOutput, RawFrame, Size},
  grid::{
    CellScores, GRID_CLASSES, GRID_EXPIRY_CLASS, GRID_NUMBER_CLASS, GRID_THRESHOLD, GridDetection,
    GridError, GridGeometry, GridMapper,
  },
  layout::{LayoutKind, LayoutParams, Line, PostDetection, select_expiry},
  model::Model,
  ssd::{
    DecodeError, FeatureMapLayout, PriorTable, SSD_IOU_THRESHOLD, SSD_PROB_THRESHOLD, SSD_TOP_K,
    SsdDecoder, extract_predictions,
  },
};

const SSD_SCHEME: &str = "ssd";
const GRID_SCHEME: &str = "grid";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
  Ssd,
  Grid,
}

impl DetectorKind {
  fn of(output: &DetectorOutput) -> Self {
    match output {
      DetectorOutput::Ssd { .. } => Self::Ssd,
      DetectorOutput::Grid { .. } => Self::Grid,
    }
  }
}

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("解码错误: {0}")]
  Decode(#[from] DecodeError),
  #[error("网格错误: {0}")]
  Grid(#[from] GridError),
  #[error("检测器输出类型不匹配: 期望 {expected:?}, 实际 {actual:?}")]
  DetectorMismatch {
    expected: DetectorKind,
    actual: DetectorKind,
  },
}

#[derive(Error, Debug)]
pub enum PipelineBuilderError {
  #[error("流水线 URL 必须使用 ssd 或 grid 方案, 实际为 {0}")]
  Scheme(String),
  #[error("参数 {key} 的值无效: {value}")]
  InvalidParameter { key: String, value: String },
  #[error("未知参数: {0}")]
  UnknownParameter(String),
  #[error("类别配置无效: 共 {classes} 类, 卡号类别 {number}, 有效期类别 {expiry:?}")]
  ClassLayout {
    classes: usize,
    number: usize,
    expiry: Option<usize>,
  },
  #[error("解码器配置错误: {0}")]
  Decode(#[from] DecodeError),
  #[error("网格配置错误: {0}")]
  Grid(#[from] GridError),
}

/// 一帧的布局结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutResult {
  pub kind: LayoutKind,
  /// 该布局下所有通过校验的序列
  pub lines: Vec<Line>,
  pub expiry: Option<GridDetection>,
  pub image_size: Size,
}

impl LayoutResult {
  /// 首选的卡号序列
  pub fn number(&self) -> Option<&Line> {
    self.lines.first()
  }

  pub fn is_found(&self) -> bool {
    self.kind != LayoutKind::None
  }
}

/// 一帧经映射后的中间结果，供扫描器按布局依次尝试
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
  pub post: PostDetection,
  pub expiry: Option<GridDetection>,
  pub image_size: Size,
}

#[derive(Debug, Clone)]
enum Stage {
  Ssd {
    decoder: SsdDecoder,
    prob_threshold: f32,
    iou_threshold: f32,
    top_k: Option<usize>,
  },
  Grid,
}

/// 解码、映射、搜索与校验
///
/// 只持有只读状态，可在线程间共享。
#[derive(Debug, Clone)]
pub struct Pipeline {
  stage: Stage,
  mapper: GridMapper,
  classes: usize,
  number_class: usize,
  expiry_class: Option<usize>,
  layout: LayoutParams,
}

impl Pipeline {
  pub fn detector_kind(&self) -> DetectorKind {
    match self.stage {
      Stage::Ssd { .. } => DetectorKind::Ssd,
      Stage::Grid => DetectorKind::Grid,
    }
  }

  pub fn geometry(&self) -> &GridGeometry {
    self.mapper.geometry()
  }

  fn cell_scores(&self, frame: &RawFrame) -> Result<CellScores, PipelineError> {
    let geometry = self.mapper.geometry();
    match (&self.stage, &frame.output) {
      (
        Stage::Ssd {
          decoder,
          prob_threshold,
          iou_threshold,
          top_k,
        },
        DetectorOutput::Ssd { locations, logits },
      ) => {
        let decoded = decoder.decode(locations, logits)?;
        let boxes = extract_predictions(
          &decoded,
          frame.image_size,
          *prob_threshold,
          *iou_threshold,
          *top_k,
        );
        debug!("SSD 检测框 {} 个", boxes.len());
        Ok(CellScores::from_detections(
          &boxes,
          geometry,
          self.classes,
          frame.image_size,
        )?)
      }
      (Stage::Grid, DetectorOutput::Grid { scores }) => {
        Ok(CellScores::new(geometry, self.classes, scores.clone())?)
      }
      (_, output) => Err(PipelineError::DetectorMismatch {
        expected: self.detector_kind(),
        actual: DetectorKind::of(output),
      }),
    }
  }

  /// 映射卡号与有效期单元，并选出有效期
  pub fn analyze(&self, frame: &RawFrame) -> Result<FrameAnalysis, PipelineError> {
    let scores = self.cell_scores(frame)?;
    let numbers = self
      .mapper
      .map(&scores, self.number_class, frame.image_size)?;
    let expiry = match self.expiry_class {
      Some(class) => select_expiry(&self.mapper.map(&scores, class, frame.image_size)?),
      None => None,
    };
    Ok(FrameAnalysis {
      post: PostDetection::new(numbers, self.mapper.geometry(), self.layout),
      expiry,
      image_size: frame.image_size,
    })
  }

  /// 按 水平 → 垂直 → 美国运通 的顺序取第一个找到序列的布局
  pub fn process(&self, frame: &RawFrame) -> Result<LayoutResult, PipelineError> {
    let analysis = self.analyze(frame)?;
    let (kind, lines) = analysis.post.first_layout();
    debug!("布局 {}: 序列 {} 条", kind, lines.len());
    Ok(LayoutResult {
      kind,
      lines,
      expiry: analysis.expiry,
      image_size: analysis.image_size,
    })
  }
}

impl Model for Pipeline {
  type Input = RawFrame;
  type Output = LayoutResult;
  type Error = PipelineError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.process(input)
  }
}

#[derive(Debug, Clone)]
pub struct PipelineBuilder {
  kind: DetectorKind,
  geometry: GridGeometry,
  threshold: f32,
  classes: usize,
  number_class: usize,
  expiry_class: Option<usize>,
  layout: LayoutParams,
  priors: Option<(PriorTable, FeatureMapLayout)>,
  prob_threshold: f32,
  iou_threshold: f32,
  top_k: Option<usize>,
}

impl PipelineBuilder {
  fn new(kind: DetectorKind) -> Self {
    Self {
      kind,
      geometry: GridGeometry::default(),
      threshold: GRID_THRESHOLD,
      classes: GRID_CLASSES,
      number_class: GRID_NUMBER_CLASS,
      expiry_class: Some(GRID_EXPIRY_CLASS),
      layout: LayoutParams::default(),
      priors: None,
      prob_threshold: SSD_PROB_THRESHOLD,
      iou_threshold: SSD_IOU_THRESHOLD,
      top_k: Some(SSD_TOP_K),
    }
  }

  pub fn ssd() -> Self {
    Self::new(DetectorKind::Ssd)
  }

  pub fn grid() -> Self {
    Self::new(DetectorKind::Grid)
  }

  pub fn with_geometry(mut self, geometry: GridGeometry) -> Self {
    self.geometry = geometry;
    self
  }

  pub fn with_threshold(mut self, threshold: f32) -> Self {
    self.threshold = threshold;
    self
  }

  pub fn with_classes(mut self, classes: usize, number: usize, expiry: Option<usize>) -> Self {
    self.classes = classes;
    self.number_class = number;
    self.expiry_class = expiry;
    self
  }

  pub fn with_layout(mut self, layout: LayoutParams) -> Self {
    self.layout = layout;
    self
  }

  pub fn with_priors(mut self, priors: PriorTable, layout: FeatureMapLayout) -> Self {
    self.priors = Some((priors, layout));
    self
  }

  pub fn with_prob_threshold(mut self, threshold: f32) -> Self {
    self.prob_threshold = threshold;
    self
  }

  pub fn with_iou_threshold(mut self, threshold: f32) -> Self {
    self.iou_threshold = threshold;
    self
  }

  pub fn with_top_k(mut self, top_k: Option<usize>) -> Self {
    self.top_k = top_k;
    self
  }

  pub fn build(self) -> Result<Pipeline, PipelineBuilderError> {
    let class_ok = |c: usize| c < self.classes;
    if !class_ok(self.number_class)
      || !self.expiry_class.is_none_or(class_ok)
      || self.expiry_class == Some(self.number_class)
    {
      return Err(PipelineBuilderError::ClassLayout {
        classes: self.classes,
        number: self.number_class,
        expiry: self.expiry_class,
      });
    }
    GridGeometry::new(self.geometry.rows, self.geometry.cols)?;
    let geometry = self.geometry;

    let stage = match self.kind {
      DetectorKind::Ssd => {
        let (priors, layout) = self.priors.unwrap_or_default();
        let decoder = SsdDecoder::new(priors, layout, self.classes)?;
        info!(
          "SSD 流水线: 先验框 {} 个, 类别 {} 个",
          decoder.num_priors(),
          decoder.num_classes()
        );
        Stage::Ssd {
          decoder,
          prob_threshold: self.prob_threshold,
          iou_threshold: self.iou_threshold,
          top_k: self.top_k,
        }
      }
      DetectorKind::Grid => {
        info!("网格流水线: {}x{}", geometry.rows, geometry.cols);
        Stage::Grid
      }
    };

    Ok(Pipeline {
      stage,
      mapper: GridMapper::new(geometry, self.threshold),
      classes: self.classes,
      number_class: self.number_class,
      expiry_class: self.expiry_class,
      layout: self.layout,
    })
  }

  fn apply(mut self, key: &str, value: &str) -> Result<Self, PipelineBuilderError> {
    let invalid = || PipelineBuilderError::InvalidParameter {
      key: key.to_string(),
      value: value.to_string(),
    };
    let float = || value.parse::<f32>().map_err(|_| invalid());
    let count = || value.parse::<usize>().map_err(|_| invalid());

    match key {
      "prob" => self.prob_threshold = float()?,
      "iou" => self.iou_threshold = float()?,
      "top_k" => {
        self.top_k = match value {
          "none" => None,
          _ => Some(count()?),
        }
      }
      "threshold" => self.threshold = float()?,
      "rows" => self.geometry.rows = count()?,
      "cols" => self.geometry.cols = count()?,
      "classes" => self.classes = count()?,
      "number" => self.number_class = count()?,
      "expiry" => {
        self.expiry_class = match value {
          "none" => None,
          _ => Some(count()?),
        }
      }
      "combine_row" => self.layout.combine.0 = count()?,
      "combine_col" => self.layout.combine.1 = count()?,
      "amex_combine_row" => self.layout.amex_combine.0 = count()?,
      "amex_combine_col" => self.layout.amex_combine.1 = count()?,
      _ => return Err(PipelineBuilderError::UnknownParameter(key.to_string())),
    }
    Ok(self)
  }
}

impl FromUrl for PipelineBuilder {
  type Error = PipelineBuilderError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    let builder = match url.scheme() {
      SSD_SCHEME => Self::ssd(),
      GRID_SCHEME => Self::grid(),
      other => return Err(PipelineBuilderError::Scheme(other.to_string())),
    };
    url
      .query_pairs()
      .try_fold(builder, |builder, (key, value)| builder.apply(&key, &value))
  }
}
