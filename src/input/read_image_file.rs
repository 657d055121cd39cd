// 该文件是 Shanan Clinic （山南诊所） 项目的一部分。
// src/input/read_image_file.rs - 读取影像文件
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

use image::{ImageFormat, ImageReader};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::SourceImage};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

fn source_name(path: &Path) -> String {
  path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_else(|| path.display().to_string())
}

fn load_source(path: &Path) -> Result<SourceImage, ImageFileInputError> {
  let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
  debug!(
    "读取影像 {} ({}x{})",
    path.display(),
    image.width(),
    image.height()
  );
  Ok(SourceImage::new(source_name(path), image))
}

/// 单张影像：`image:///path/to/scan.jpg`，打开时即解码
pub struct ImageFileInput {
  image: Option<SourceImage>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemeMismatch(url.scheme().to_string()));
    }

    Self::open(crate::url_path(url))
  }
}

impl ImageFileInput {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageFileInputError> {
    Ok(ImageFileInput {
      image: Some(load_source(path.as_ref())?),
    })
  }
}

impl Iterator for ImageFileInput {
  type Item = SourceImage;

  fn next(&mut self) -> Option<Self::Item> {
    self.image.take()
  }
}

/// 影像目录：`folder:///path/to/scans`。
///
/// 按文件名排序，逐张解码；无法解码的文件记录错误后跳过。
pub struct ImageDirectoryInput {
  pending: std::vec::IntoIter<PathBuf>,
}

impl FromUrlWithScheme for ImageDirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for ImageDirectoryInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageFileInputError::SchemeMismatch(url.scheme().to_string()));
    }

    Self::open(crate::url_path(url))
  }
}

impl ImageDirectoryInput {
  pub fn open(directory: impl AsRef<Path>) -> Result<Self, ImageFileInputError> {
    let directory = directory.as_ref();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)? {
      let path = entry?.path();
      if path.is_file() && ImageFormat::from_path(&path).is_ok() {
        files.push(path);
      }
    }
    files.sort();
    info!("目录 {} 中共有 {} 张影像", directory.display(), files.len());

    Ok(Self {
      pending: files.into_iter(),
    })
  }

  pub fn remaining(&self) -> usize {
    self.pending.len()
  }
}

impl Iterator for ImageDirectoryInput {
  type Item = SourceImage;

  fn next(&mut self) -> Option<Self::Item> {
    for path in self.pending.by_ref() {
      match load_source(&path) {
        Ok(source) => return Some(source),
        Err(e) => error!("无法读取影像 {}: {}", path.display(), e),
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::RgbImage;

  #[test]
  fn single_file_yields_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.png");
    RgbImage::new(5, 3).save(&path).unwrap();

    let url = Url::parse(&format!("image://{}", path.display())).unwrap();
    let mut input = ImageFileInput::from_url(&url).unwrap();
    let source = input.next().unwrap();
    assert_eq!(source.name(), "scan.png");
    assert_eq!((source.width(), source.height()), (5, 3));
    assert!(input.next().is_none());
  }

  #[test]
  fn missing_file_is_an_error() {
    assert!(matches!(
      ImageFileInput::open("/definitely/not/here.png"),
      Err(ImageFileInputError::IoError(_))
    ));
  }

  #[test]
  fn directory_is_sorted_and_skips_broken_files() {
    let dir = tempfile::tempdir().unwrap();
    RgbImage::new(2, 2).save(dir.path().join("b.png")).unwrap();
    RgbImage::new(2, 2).save(dir.path().join("a.png")).unwrap();
    std::fs::write(dir.path().join("broken.png"), b"not an image").unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

    let input = ImageDirectoryInput::open(dir.path()).unwrap();
    assert_eq!(input.remaining(), 3);
    let names: Vec<String> = input.map(|s| s.name().to_string()).collect();
    assert_eq!(names, vec!["a.png", "b.png"]);
  }
}
