// 该文件是 Shanan Clinic （山南诊所） 项目的一部分。
// src/task.rs - 标注任务
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

use std::sync::mpsc::{self, Receiver};
use std::{thread, time::Duration};

use serde::Serialize;
use tracing::{info, warn};

use crate::{
  frame::SourceImage,
  model::DetectionProvider,
  output::Render,
  pipeline::{Annotation, Annotator},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
  pub images: usize,
  pub detections: usize,
  pub provider_failures: usize,
}

impl TaskSummary {
  fn record(&mut self, annotation: &Annotation) {
    self.images += 1;
    self.detections += annotation.detections.valid_items().count();
    if annotation.is_degraded() {
      self.provider_failures += 1;
    }
  }
}

pub trait Task<I, P, O>: Sized {
  type Error;
  fn run_task(
    self,
    input: I,
    annotator: &Annotator<'_, P>,
    output: O,
  ) -> Result<TaskSummary, Self::Error>;
}

/// 处理第一张影像。检测服务失败直接作为任务错误返回。
pub struct OneShotTask;

impl<
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = SourceImage>,
  P: DetectionProvider,
  O: Render<SourceImage, Annotation, Error = RE>,
> Task<I, P, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    mut input: I,
    annotator: &Annotator<'_, P>,
    output: O,
  ) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入影像"))?;
    info!("影像 {} 读取成功，开始检测...", frame.name());
    let now = std::time::Instant::now();
    let annotation = annotator.annotate(&frame)?;
    info!("检测与绘制完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&frame, &annotation)?;
    info!("输出完成，耗时: {:.2?}", now.elapsed());

    let mut summary = TaskSummary::default();
    summary.record(&annotation);
    Ok(summary)
  }
}

/// 逐张处理全部输入影像，直到输入耗尽、达到指定数量或收到中断信号。
///
/// 检测服务失败不会中止任务：记录错误后以空结果继续，并写入输出记录。
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  ctrlc: bool,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 安装 Ctrl-C 处理函数。每个进程只能安装一次，因此默认关闭。
  pub fn with_ctrlc(mut self, ctrlc: bool) -> Self {
    self.ctrlc = ctrlc;
    self
  }

  fn interrupt_channel(&self) -> anyhow::Result<Option<Receiver<()>>> {
    if !self.ctrlc {
      return Ok(None);
    }

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;
    Ok(Some(rx))
  }
}

impl<
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = SourceImage>,
  P: DetectionProvider,
  O: Render<SourceImage, Annotation, Error = RE>,
> Task<I, P, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    input: I,
    annotator: &Annotator<'_, P>,
    output: O,
  ) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let interrupt = self.interrupt_channel()?;

    let mut summary = TaskSummary::default();
    let mut now = std::time::Instant::now();
    for frame in input {
      info!("处理第 {} 张影像: {}", summary.images + 1, frame.name());
      let annotation = annotator.annotate_or_degrade(&frame);
      let elapsed_a = now.elapsed();
      output.render_result(&frame, &annotation)?;
      let elapsed_b = now.elapsed();
      now = std::time::Instant::now();
      info!("处理完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);
      summary.record(&annotation);

      if self
        .frame_number
        .map(|n| summary.images >= n)
        .unwrap_or(false)
      {
        info!("达到指定数量 {}, 退出任务循环", summary.images);
        break;
      }
      if interrupt.as_ref().is_some_and(|rx| rx.try_recv().is_ok()) {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    if summary.provider_failures > 0 {
      warn!(
        "共 {} 张影像检测失败，已在输出记录中注明",
        summary.provider_failures
      );
    }
    info!(
      "任务完成: {} 张影像, {} 个检测结果",
      summary.images, summary.detections
    );
    Ok(summary)
  }
}
