// 该文件是 Kahao （卡号） 项目的一部分。
// src/task.rs - 任务执行
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
  thread,
  time::{Duration, Instant},
};
use tracing::{info, warn};

use crate::{model::Model, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始后处理...");
    let now = Instant::now();
    let result = model.infer(&frame)?;
    info!("后处理完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&frame, &result)?;
    info!("输出完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 对第一帧重复处理若干次并统计平均耗时，前两次视为预热
pub struct RepeatShotTask {
  repeat: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { repeat: 1000 }
  }
}

impl RepeatShotTask {
  pub fn with_repeat(mut self, repeat: usize) -> Self {
    self.repeat = repeat;
    self
  }
}

const WARMUP_TIMES: usize = 2;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，重复 {} 次...", self.repeat);
    let mut times = Vec::with_capacity(self.repeat);
    for i in 0..self.repeat {
      let now = Instant::now();
      let result = model.infer(&frame)?;
      let elapsed = now.elapsed();
      info!("({})后处理完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&frame, &result)?;
      times.push(elapsed);
    }

    let measured = &times[WARMUP_TIMES.min(times.len())..];
    if !measured.is_empty() {
      warn!(
        "平均后处理时间: {:.2?}",
        measured.iter().sum::<Duration>() / measured.len() as u32
      );
    }

    Ok(())
  }
}

#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let (tx, rx) = std::sync::mpsc::channel();

    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;

    let mut frame_index = 0usize;
    let mut now = Instant::now();
    for frame in input {
      frame_index = frame_index.wrapping_add(1);
      info!("处理第 {} 帧", frame_index);
      let result = model.infer(&frame)?;
      let elapsed_a = now.elapsed();
      output.render_result(&frame, &result)?;
      let elapsed_b = now.elapsed();
      now = Instant::now();
      info!("后处理完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);
      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，退出");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;

  use thiserror::Error;

  use super::*;
  use crate::{
    frame::{RawFrame, Size},
    layout::LayoutKind,
    pipeline::{LayoutResult, PipelineBuilder},
  };

  #[derive(Error, Debug)]
  #[error("不会发生")]
  struct Never;

  #[derive(Default)]
  struct Collect(RefCell<Vec<LayoutKind>>);

  impl Render<RawFrame, LayoutResult> for &Collect {
    type Error = Never;

    fn render_result(&self, _frame: &RawFrame, result: &LayoutResult) -> Result<(), Never> {
      self.0.borrow_mut().push(result.kind);
      Ok(())
    }
  }

  fn empty_frames(n: usize) -> impl Iterator<Item = RawFrame> {
    let pipeline = PipelineBuilder::grid().build().unwrap();
    let cells = pipeline.geometry().cells() * 3;
    (0..n).map(move |_| RawFrame::grid(Size::new(480.0, 302.0), vec![0.0; cells]))
  }

  #[test]
  fn one_shot_renders_first_frame() {
    let collect = Collect::default();
    let pipeline = PipelineBuilder::grid().build().unwrap();
    OneShotTask
      .run_task(empty_frames(3), pipeline, &collect)
      .unwrap();
    assert_eq!(*collect.0.borrow(), vec![LayoutKind::None]);
  }

  #[test]
  fn one_shot_without_frames_fails() {
    let collect = Collect::default();
    let pipeline = PipelineBuilder::grid().build().unwrap();
    assert!(
      OneShotTask
        .run_task(empty_frames(0), pipeline, &collect)
        .is_err()
    );
  }

  #[test]
  fn repeat_shot_repeats_first_frame() {
    let collect = Collect::default();
    let pipeline = PipelineBuilder::grid().build().unwrap();
    RepeatShotTask::default()
      .with_repeat(5)
      .run_task(empty_frames(1), pipeline, &collect)
      .unwrap();
    assert_eq!(collect.0.borrow().len(), 5);
  }

  #[test]
  fn pipeline_errors_stop_the_task() {
    let collect = Collect::default();
    let pipeline = PipelineBuilder::grid().build().unwrap();
    let frames = std::iter::once(RawFrame::grid(Size::new(1.0, 1.0), vec![0.0; 2]));
    assert!(OneShotTask.run_task(frames, pipeline, &collect).is_err());
    assert!(collect.0.borrow().is_empty());
  }
}
