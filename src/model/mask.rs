// 该文件是 Shanan Clinic （山南诊所） 项目的一部分。
// src/model/mask.rs - 分割掩码
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

use image::{GrayImage, Luma, imageops::FilterType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// 掩码与影像宽高比允许的相对偏差
const ASPECT_TOLERANCE: f64 = 0.02;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MaskError {
  #[error("掩码为空")]
  Empty,
  #[error("掩码第 {row} 行长度为 {found}，期望 {expected}")]
  Ragged {
    row: usize,
    expected: usize,
    found: usize,
  },
  #[error("掩码 ({row}, {col}) 处的值 {value} 不是 0 或 1")]
  NonBinary { row: usize, col: usize, value: f32 },
  #[error("掩码尺寸 {mask_w}x{mask_h} 与影像尺寸 {image_w}x{image_h} 宽高比不一致")]
  AspectMismatch {
    mask_w: u32,
    mask_h: u32,
    image_w: u32,
    image_h: u32,
  },
}

/// 二值分割掩码，按行存储 0/1。持久化为二维整数数组。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f32>>", into = "Vec<Vec<u8>>")]
pub struct Mask {
  width: u32,
  height: u32,
  data: Vec<u8>,
}

impl Mask {
  pub fn from_rows(rows: Vec<Vec<u8>>) -> Result<Self, MaskError> {
    let rows: Vec<Vec<f32>> = rows
      .into_iter()
      .map(|row| row.into_iter().map(f32::from).collect())
      .collect();
    Self::try_from(rows)
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn get(&self, x: u32, y: u32) -> bool {
    x < self.width && y < self.height && self.data[(y * self.width + x) as usize] != 0
  }

  /// 掩码中置位像素的数量
  pub fn count(&self) -> usize {
    self.data.iter().filter(|v| **v != 0).count()
  }

  pub fn to_rows(&self) -> Vec<Vec<u8>> {
    self
      .data
      .chunks(self.width as usize)
      .map(|row| row.to_vec())
      .collect()
  }

  /// 最近邻缩放到影像分辨率，输出 0/255 灰度图。
  pub fn resize_nearest(&self, width: u32, height: u32) -> Result<GrayImage, MaskError> {
    let mask_aspect = self.width as f64 / self.height as f64;
    let image_aspect = width as f64 / height.max(1) as f64;
    if width == 0 || height == 0 || (mask_aspect - image_aspect).abs() / image_aspect > ASPECT_TOLERANCE
    {
      return Err(MaskError::AspectMismatch {
        mask_w: self.width,
        mask_h: self.height,
        image_w: width,
        image_h: height,
      });
    }

    let gray = GrayImage::from_fn(self.width, self.height, |x, y| {
      Luma([if self.get(x, y) { 255 } else { 0 }])
    });
    if (self.width, self.height) == (width, height) {
      return Ok(gray);
    }
    Ok(image::imageops::resize(
      &gray,
      width,
      height,
      FilterType::Nearest,
    ))
  }
}

impl TryFrom<Vec<Vec<f32>>> for Mask {
  type Error = MaskError;

  fn try_from(rows: Vec<Vec<f32>>) -> Result<Self, Self::Error> {
    let expected = rows.first().map(Vec::len).unwrap_or(0);
    if expected == 0 {
      return Err(MaskError::Empty);
    }

    let mut data = Vec::with_capacity(expected * rows.len());
    for (row, values) in rows.iter().enumerate() {
      if values.len() != expected {
        return Err(MaskError::Ragged {
          row,
          expected,
          found: values.len(),
        });
      }
      for (col, value) in values.iter().enumerate() {
        let bit = if *value == 0.0 {
          0
        } else if *value == 1.0 {
          1
        } else {
          return Err(MaskError::NonBinary {
            row,
            col,
            value: *value,
          });
        };
        data.push(bit);
      }
    }

    Ok(Mask {
      width: expected as u32,
      height: rows.len() as u32,
      data,
    })
  }
}

impl From<Mask> for Vec<Vec<u8>> {
  fn from(mask: Mask) -> Self {
    mask.to_rows()
  }
}
