// 该文件是 Shanan Clinic （山南诊所） 项目的一部分。
// src/output/save_image_file.rs - 保存标注图像文件
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

use std::path::{Path, PathBuf};

use image::ImageFormat;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::SourceImage, output::Render, pipeline::Annotation};

/// `image:///out/overlay.png` 写到指定文件；
/// `image:///out/` 这类没有图像扩展名的路径视为目录，按 `overlay_<原文件名>.png` 命名。
pub struct SaveImageFileOutput {
  path: PathBuf,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(Self::new(crate::url_path(uri)))
  }
}

impl SaveImageFileOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  fn target_path(&self, frame: &SourceImage) -> PathBuf {
    if ImageFormat::from_path(&self.path).is_ok() {
      self.path.clone()
    } else {
      self.path.join(frame.overlay_file_name())
    }
  }

  fn save_image(&self, path: &Path, image: &image::RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    image.save(path)?;
    info!("保存图像到文件: {}", path.display());

    Ok(())
  }
}

impl Render<SourceImage, Annotation> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &SourceImage, result: &Annotation) -> Result<(), Self::Error> {
    let path = self.target_path(frame);
    self.save_image(&path, &result.annotated.image)?;
    info!("{}: {}", frame.name(), result.findings.text);
    Ok(())
  }
}
