// 该文件是 Kahao （卡号） 项目的一部分。
// src/input.rs - 输入定义
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

use crate::{FromUrl, frame::RawFrame};

#[cfg(feature = "frame_file_input")]
mod frame_file;
#[cfg(feature = "frame_file_input")]
pub use self::frame_file::{
  FrameDirectoryInput, FrameDirectoryIter, FrameFileInput, FrameFileInputError, FrameFileIter,
};

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "frame_file_input")]
  #[error("帧文件输入错误: {0}")]
  FrameFileInputError(#[from] FrameFileInputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum InputWrapper {
  #[cfg(feature = "frame_file_input")]
  FrameFile(FrameFileInput),
  #[cfg(feature = "frame_file_input")]
  FrameDirectory(FrameDirectoryInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "frame_file_input")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == FrameFileInput::SCHEME {
        return Ok(InputWrapper::FrameFile(FrameFileInput::from_url(url)?));
      }
      if url.scheme() == FrameDirectoryInput::SCHEME {
        return Ok(InputWrapper::FrameDirectory(FrameDirectoryInput::from_url(
          url,
        )?));
      }
    }
    Err(InputError::SchemeMismatch)
  }
}

impl InputWrapper {
  pub fn into_frames(self) -> InputWrapperIter {
    match self {
      #[cfg(feature = "frame_file_input")]
      InputWrapper::FrameFile(input) => InputWrapperIter::FrameFile(input.into_frames()),
      #[cfg(feature = "frame_file_input")]
      InputWrapper::FrameDirectory(input) => InputWrapperIter::FrameDirectory(input.into_frames()),
    }
  }
}

pub enum InputWrapperIter {
  #[cfg(feature = "frame_file_input")]
  FrameFile(FrameFileIter),
  #[cfg(feature = "frame_file_input")]
  FrameDirectory(FrameDirectoryIter),
}

impl Iterator for InputWrapperIter {
  type Item = RawFrame;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      #[cfg(feature = "frame_file_input")]
      InputWrapperIter::FrameFile(input) => input.next(),
      #[cfg(feature = "frame_file_input")]
      InputWrapperIter::FrameDirectory(input) => input.next(),
    }
  }
}
