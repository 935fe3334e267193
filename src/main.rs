// 该文件是 Kahao （卡号） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use kahao::{
  FromUrl,
  input::InputWrapper,
  output::OutputWrapper,
  pipeline::PipelineBuilder,
  task::{ContinuousTask, OneShotTask, RepeatShotTask, Task},
};

use args::{Args, Mode};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("后处理流水线: {}", args.pipeline);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = InputWrapper::from_url(&args.input)?;
  let pipeline = PipelineBuilder::from_url(&args.pipeline)?.build()?;
  let output = OutputWrapper::from_url(&args.output)?;

  match args.mode {
    Mode::Once => OneShotTask.run_task(input.into_frames(), pipeline, output)?,
    Mode::Repeat => RepeatShotTask::default().run_task(input.into_frames(), pipeline, output)?,
    Mode::Continuous => ContinuousTask::default()
      .with_frame_number(args.frame_number)
      .run_task(input.into_frames(), pipeline, output)?,
  }

  Ok(())
}
