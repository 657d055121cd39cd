// 该文件是 Shanan Clinic （山南诊所） 项目的一部分。
// src/main.rs - 主程序
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

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use shanan_clinic::{
  FromUrl,
  config::AppConfig,
  input::InputWrapper,
  model::SidecarProvider,
  output::{OutputWrapper, draw::Compositor},
  pipeline::Annotator,
  report::{DateRange, ReportInput, ReportQuery, build_report},
  task::{ContinuousTask, OneShotTask, Task},
};

use crate::args::{AnnotateArgs, Args, Command, ReportArgs};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let config = AppConfig::load(args.config.as_deref())?;

  match args.command {
    Command::Annotate(annotate) => run_annotate(annotate, &config),
    Command::Report(report) => run_report(report, &config),
  }
}

fn run_annotate(args: AnnotateArgs, config: &AppConfig) -> Result<()> {
  info!("检测服务: {}", args.provider);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let provider = SidecarProvider::from_url(&args.provider)?;
  let compositor = Compositor::new(&config.style);
  let annotator = Annotator::new(&provider, &compositor);

  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  let summary = if args.continuous {
    ContinuousTask::default()
      .with_frame_number(args.max_images)
      .with_ctrlc(true)
      .run_task(input, &annotator, output)?
  } else {
    OneShotTask.run_task(input, &annotator, output)?
  };

  info!(
    "共处理 {} 张影像, {} 个检测结果, {} 张检测失败",
    summary.images, summary.detections, summary.provider_failures
  );
  Ok(())
}

fn run_report(args: ReportArgs, config: &AppConfig) -> Result<()> {
  let text = std::fs::read_to_string(&args.records)
    .with_context(|| format!("无法读取记录文件 {}", args.records.display()))?;
  let input: ReportInput = serde_json::from_str(&text)
    .with_context(|| format!("记录文件格式错误 {}", args.records.display()))?;

  // 日期范围无效时按全部时间统计
  let range = match (args.start_date, args.end_date) {
    (Some(start), Some(end)) if start <= end => Some(DateRange { start, end }),
    (Some(_), Some(_)) => {
      warn!("起始日期晚于结束日期，按全部时间统计");
      None
    }
    _ => None,
  };

  let today = args
    .today
    .unwrap_or_else(|| chrono::Local::now().date_naive());
  let query = ReportQuery {
    range,
    search: args.search,
  };

  let report = build_report(&input, config, today, &query);
  let json = serde_json::to_string_pretty(&report)?;

  match args.output {
    Some(path) => {
      std::fs::write(&path, json)?;
      info!("报表已写入 {}", path.display());
    }
    None => println!("{}", json),
  }
  Ok(())
}
