// 该文件是 Shanan Clinic （山南诊所） 项目的一部分。
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

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use url::Url;

/// 山南诊所 X 光片 AI 标注与报表工具
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// TOML 配置文件（样式与报表参数）
  #[arg(long, global = true, value_name = "FILE")]
  pub config: Option<PathBuf>,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// 标注影像并生成检测概要
  Annotate(AnnotateArgs),
  /// 根据诊所记录生成统计报表
  Report(ReportArgs),
}

#[derive(clap::Args, Debug)]
pub struct AnnotateArgs {
  /// 检测服务，如 sidecar:///data/detections
  #[arg(long, value_name = "PROVIDER")]
  pub provider: Url,
  /// 输入来源：image:///scan.jpg 或 folder:///scans
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径：image:///out/ 或 folder:///records?always
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 逐张处理全部输入，检测失败时继续
  #[arg(long)]
  pub continuous: bool,
  /// 最多处理的影像数
  #[arg(long, value_name = "COUNT")]
  pub max_images: Option<usize>,
}

#[derive(clap::Args, Debug)]
pub struct ReportArgs {
  /// 记录文件（JSON：patients / invoices / xrays）
  #[arg(long, value_name = "FILE")]
  pub records: PathBuf,
  /// 统计截止日期，默认今天
  #[arg(long, value_name = "YYYY-MM-DD")]
  pub today: Option<NaiveDate>,
  /// 营业额统计起始日期
  #[arg(long, value_name = "YYYY-MM-DD", requires = "end_date")]
  pub start_date: Option<NaiveDate>,
  /// 营业额统计结束日期
  #[arg(long, value_name = "YYYY-MM-DD", requires = "start_date")]
  pub end_date: Option<NaiveDate>,
  /// 按患者姓名过滤账单
  #[arg(long, default_value = "")]
  pub search: String,
  /// 报表输出文件，默认打印到标准输出
  #[arg(long, value_name = "FILE")]
  pub output: Option<PathBuf>,
}
