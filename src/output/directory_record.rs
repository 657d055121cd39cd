// 该文件是 Shanan Clinic （山南诊所） 项目的一部分。
// src/output/directory_record.rs - 按日期目录记录标注结果
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
use std::sync::atomic::{AtomicU16, Ordering};

use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{SourceImage, overlay_file_name},
  model::BlobError,
  output::Render,
  pipeline::Annotation,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("检测结果序列化错误: {0}")]
  BlobError(#[from] BlobError),
}

/// 每张影像写入 `<根目录>/<年>/<月>/<日>/` 下的一组文件：
/// 原图、标注图、检测结果 JSON 与概要文字。
///
/// 默认只记录有检测结果的影像，`?always` 时全部记录；检测服务失败的影像总是记录。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  frame_counter: AtomicU16,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(Self::new(crate::url_path(uri), always))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>, always: bool) -> Self {
    Self {
      directory: directory.into(),
      frame_counter: AtomicU16::new(0),
      always,
    }
  }

  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  /// 返回当天目录与本条记录的基础文件名
  fn record_base(&self) -> Result<(PathBuf, String), DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    let base = format!("{}-{:04X}", now.format("%H-%M-%S"), self.frame_id());
    Ok((directory, base))
  }

  fn should_record(&self, result: &Annotation) -> bool {
    self.always || result.is_degraded() || !result.detections.is_empty()
  }
}

impl Render<SourceImage, Annotation> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &SourceImage, result: &Annotation) -> Result<(), Self::Error> {
    if !self.should_record(result) {
      debug!("{} 没有检测结果，跳过记录", frame.name());
      return Ok(());
    }

    let (directory, base) = self.record_base()?;

    frame.image().to_rgb8().save(directory.join(format!("{}.png", base)))?;
    result
      .annotated
      .image
      .save(directory.join(overlay_file_name(&base)))?;
    std::fs::write(
      directory.join(format!("{}.json", base)),
      result.detections.to_blob()?,
    )?;

    let mut text = format!("{}\n{}\n", frame.name(), result.findings.text);
    if let Some(failure) = &result.provider_failure {
      warn!("{} 的记录中注明检测失败", frame.name());
      text.push_str(&format!("检测失败: {}\n", failure));
    }
    std::fs::write(directory.join(format!("{}.txt", base)), text)?;

    info!("记录 {} 到 {}/{}", frame.name(), directory.display(), base);
    Ok(())
  }
}
