// 该文件是 Kahao （卡号） 项目的一部分。
// src/input/frame_file.rs - 读取检测器输出转储文件
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
  io::BufReader,
  path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::RawFrame, url_path};

#[derive(Error, Debug)]
pub enum FrameFileInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("帧解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
}

fn read_frame(path: &Path) -> Result<RawFrame, FrameFileInputError> {
  let reader = BufReader::new(File::open(path)?);
  Ok(serde_json::from_reader(reader)?)
}

/// 单个 JSON 帧文件
pub struct FrameFileInput {
  frame: Option<RawFrame>,
}

impl FromUrlWithScheme for FrameFileInput {
  const SCHEME: &'static str = "frame";
}

impl FromUrl for FrameFileInput {
  type Error = FrameFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(FrameFileInputError::SchemeMismatch);
    }

    let path = url_path(url);
    let frame = read_frame(Path::new(&path))?;
    Ok(FrameFileInput { frame: Some(frame) })
  }
}

impl FrameFileInput {
  pub fn into_frames(self) -> FrameFileIter {
    FrameFileIter { inner: self }
  }
}

pub struct FrameFileIter {
  inner: FrameFileInput,
}

impl Iterator for FrameFileIter {
  type Item = RawFrame;

  fn next(&mut self) -> Option<Self::Item> {
    self.inner.frame.take()
  }
}

/// 目录中所有 `*.json` 帧文件，按文件名顺序读取
pub struct FrameDirectoryInput {
  files: Vec<PathBuf>,
}

impl FromUrlWithScheme for FrameDirectoryInput {
  const SCHEME: &'static str = "frames";
}

impl FromUrl for FrameDirectoryInput {
  type Error = FrameFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(FrameFileInputError::SchemeMismatch);
    }

    let directory = url_path(url);
    let mut files = Vec::new();
    for entry in std::fs::read_dir(&directory)? {
      let path = entry?.path();
      if path.extension().is_some_and(|ext| ext == "json") {
        files.push(path);
      }
    }
    files.sort();
    debug!("目录 {} 中找到帧文件 {} 个", directory, files.len());
    Ok(FrameDirectoryInput { files })
  }
}

impl FrameDirectoryInput {
  pub fn len(&self) -> usize {
    self.files.len()
  }

  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }

  pub fn into_frames(self) -> FrameDirectoryIter {
    FrameDirectoryIter {
      files: self.files.into_iter(),
    }
  }
}

/// 逐个读取帧文件，无法解析的文件记录错误后跳过
pub struct FrameDirectoryIter {
  files: std::vec::IntoIter<PathBuf>,
}

impl Iterator for FrameDirectoryIter {
  type Item = RawFrame;

  fn next(&mut self) -> Option<Self::Item> {
    for path in self.files.by_ref() {
      match read_frame(&path) {
        Ok(frame) => return Some(frame),
        Err(e) => error!("读取帧文件 {} 失败: {}", path.display(), e),
      }
    }
    None
  }
}
