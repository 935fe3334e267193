// 该文件是 Kahao （卡号） 项目的一部分。
// src/args.rs - 命令行参数
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

use clap::{Parser, ValueEnum};
use url::Url;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
  /// 只处理第一帧
  Once,
  /// 重复处理第一帧
  Repeat,
  /// 逐帧处理直到输入结束或中断
  Continuous,
}

/// Kahao 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 后处理流水线，例如 grid: 或 ssd:?prob=0.6&top_k=20
  #[arg(long, value_name = "PIPELINE", default_value = "grid:")]
  pub pipeline: Url,
  /// 输入来源，frame:///path.json 或 frames:///dir
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，log:、json:///path.json 或 folder:///dir
  #[arg(long, value_name = "OUTPUT", default_value = "log:")]
  pub output: Url,
  /// 连续模式下最多处理的帧数
  #[arg(long, value_name = "COUNT")]
  pub frame_number: Option<usize>,
  /// 运行模式
  #[arg(long, value_enum, default_value_t = Mode::Continuous)]
  pub mode: Mode,
}
