// 该文件是 Kahao （卡号） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::{
  fs::File,
  io::BufWriter,
  path::PathBuf,
  sync::atomic::{AtomicU16, Ordering},
};

use chrono::{Datelike, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RawFrame,
  output::{LayoutReport, Render},
  pipeline::LayoutResult,
  url_path,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 记录内容：报告，可选附带原始检测器输出
#[derive(Serialize)]
struct Record<'a> {
  report: LayoutReport,
  #[serde(skip_serializing_if = "Option::is_none")]
  frame: Option<&'a RawFrame>,
}

/// 按日期分目录保存每帧报告
///
/// 默认只记录找到布局的帧，`?always` 记录所有帧，`?raw` 同时保存原始输出。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  frame_counter: AtomicU16,
  always: bool,
  raw: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let always = uri.query_pairs().any(|(k, _)| k == "always");
    let raw = uri.query_pairs().any(|(k, _)| k == "raw");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(url_path(uri)),
      frame_counter: AtomicU16::new(0),
      always,
      raw,
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.json",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl Render<RawFrame, LayoutResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &RawFrame, result: &LayoutResult) -> Result<(), Self::Error> {
    if !self.always && !result.is_found() {
      return Ok(());
    }
    let path = self.frame_path()?;
    let record = Record {
      report: LayoutReport::from(result),
      frame: self.raw.then_some(frame),
    };
    serde_json::to_writer(BufWriter::new(File::create(path)?), &record)?;
    Ok(())
  }
}
