// 该文件是 Kahao （卡号） 项目的一部分。
// src/output/json_file.rs - 保存 JSON 报告
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

use std::{fs::File, io::BufWriter, path::PathBuf};

use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RawFrame,
  output::{LayoutReport, Render},
  pipeline::LayoutResult,
  url_path,
};

#[derive(Error, Debug)]
pub enum JsonFileOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 每帧覆盖写入同一个 JSON 文件
pub struct JsonFileOutput {
  path: PathBuf,
}

impl FromUrlWithScheme for JsonFileOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonFileOutput {
  type Error = JsonFileOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(JsonFileOutputError::SchemeMismatch);
    }
    Ok(JsonFileOutput {
      path: PathBuf::from(url_path(url)),
    })
  }
}

impl Render<RawFrame, LayoutResult> for JsonFileOutput {
  type Error = JsonFileOutputError;

  fn render_result(&self, _frame: &RawFrame, result: &LayoutResult) -> Result<(), Self::Error> {
    let writer = BufWriter::new(File::create(&self.path)?);
    serde_json::to_writer_pretty(writer, &LayoutReport::from(result))?;
    debug!("报告已写入 {}", self.path.display());
    Ok(())
  }
}
