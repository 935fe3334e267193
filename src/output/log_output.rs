// 该文件是 Kahao （卡号） 项目的一部分。
// src/output/log_output.rs - 日志输出
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

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, frame::RawFrame, layout::LayoutKind, output::Render,
  pipeline::LayoutResult,
};

#[derive(Error, Debug)]
pub enum LogOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 将每帧的布局结果写入日志
pub struct LogOutput;

impl FromUrlWithScheme for LogOutput {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogOutput {
  type Error = LogOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(LogOutputError::SchemeMismatch);
    }
    Ok(LogOutput)
  }
}

impl Render<RawFrame, LayoutResult> for LogOutput {
  type Error = LogOutputError;

  fn render_result(&self, _frame: &RawFrame, result: &LayoutResult) -> Result<(), Self::Error> {
    if result.kind == LayoutKind::None {
      info!("未找到卡号布局");
    } else if let Some(line) = result.number() {
      let cells: Vec<String> = line
        .iter()
        .map(|b| format!("({}, {}) {:.2}", b.row, b.col, b.confidence))
        .collect();
      info!(
        "{} 布局, 候选 {} 条: {}",
        result.kind,
        result.lines.len(),
        cells.join(" ")
      );
    }
    if let Some(expiry) = &result.expiry {
      info!(
        "有效期: ({}, {}) {:.2}",
        expiry.row, expiry.col, expiry.confidence
      );
    }
    Ok(())
  }
}
