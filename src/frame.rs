// 该文件是 Shanan Clinic （山南诊所） 项目的一部分。
// src/frame.rs - 待分析的源影像
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

use std::path::Path;

use image::DynamicImage;

const OVERLAY_PREFIX: &str = "overlay_";
const OVERLAY_EXTENSION: &str = "png";

/// 一张已解码的源影像，以及它的来源文件名。
#[derive(Debug, Clone)]
pub struct SourceImage {
  name: String,
  image: DynamicImage,
}

impl SourceImage {
  pub fn new(name: impl Into<String>, image: DynamicImage) -> Self {
    Self {
      name: name.into(),
      image,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn image(&self) -> &DynamicImage {
    &self.image
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  /// 不含扩展名的文件名，用于查找旁路检测结果和命名输出文件。
  pub fn stem(&self) -> &str {
    Path::new(&self.name)
      .file_stem()
      .and_then(|s| s.to_str())
      .unwrap_or(&self.name)
  }

  /// 标注图的约定文件名：`overlay_<原文件名>.png`
  pub fn overlay_file_name(&self) -> String {
    overlay_file_name(self.stem())
  }
}

pub fn overlay_file_name(stem: &str) -> String {
  format!("{}{}.{}", OVERLAY_PREFIX, stem, OVERLAY_EXTENSION)
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::RgbImage;

  #[test]
  fn overlay_name_follows_source_stem() {
    let source = SourceImage::new(
      "3_20250101093000_panoramic.jpg",
      DynamicImage::ImageRgb8(RgbImage::new(4, 4)),
    );
    assert_eq!(source.stem(), "3_20250101093000_panoramic");
    assert_eq!(
      source.overlay_file_name(),
      "overlay_3_20250101093000_panoramic.png"
    );
  }

  #[test]
  fn stem_without_extension_is_the_name() {
    let source = SourceImage::new("scan", DynamicImage::ImageRgb8(RgbImage::new(1, 1)));
    assert_eq!(source.stem(), "scan");
    assert_eq!(source.width(), 1);
  }
}
