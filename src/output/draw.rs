// 该文件是 Shanan Clinic （山南诊所） 项目的一部分。
// src/output/draw.rs - 检测结果叠加绘制
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

use ab_glyph::{Font, FontArc, PxScale};
use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  config::StyleConfig,
  model::{Detection, DetectionSet, MalformedDetection},
};

// 掩码层以 0.4 的权重叠加到工作副本上，
// 工作副本再与原图按 0.6 / 0.4 混合
const MASK_WEIGHT: f32 = 0.4;
const OVERLAY_WEIGHT: f32 = 0.6;
const SOURCE_WEIGHT: f32 = 0.4;

const BOX_THICKNESS: i32 = 2;
const LABEL_PADDING: u32 = 4;
const FALLBACK_LABEL_OFFSET: i32 = 15;
const LABEL_TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

static EMBEDDED_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

#[derive(Error, Debug)]
pub enum RenderingDegraded {
  #[error("没有可用字体")]
  NoFont,
  #[error("字体缺少字符 '{0}'")]
  MissingGlyph(char),
  #[error("标签尺寸为空")]
  EmptyExtent,
}

/// 叠加绘制的结果。只由 (源图, 检测结果, 样式) 决定。
#[derive(Debug, Clone)]
pub struct AnnotatedImage {
  pub image: RgbImage,
  /// 依次绘制的标签文字
  pub labels: Vec<String>,
  pub rendered: usize,
  pub skipped: usize,
  pub degraded_labels: usize,
}

impl AnnotatedImage {
  fn plain(image: RgbImage) -> Self {
    Self {
      image,
      labels: Vec::new(),
      rendered: 0,
      skipped: 0,
      degraded_labels: 0,
    }
  }
}

pub struct Compositor<'a> {
  style: &'a StyleConfig,
  font: Option<FontArc>,
  scale: PxScale,
}

impl<'a> Compositor<'a> {
  pub fn new(style: &'a StyleConfig) -> Self {
    let font = load_font(style.font_path.as_deref());
    Self::with_font(style, font)
  }

  pub fn with_font(style: &'a StyleConfig, font: Option<FontArc>) -> Self {
    Self {
      style,
      font,
      scale: PxScale::from(style.font_size),
    }
  }

  pub fn style(&self) -> &'a StyleConfig {
    self.style
  }

  /// 在源图的 RGB 副本上绘制掩码、检测框和标签。源图不会被修改。
  pub fn compose(&self, source: &DynamicImage, detections: &DetectionSet) -> AnnotatedImage {
    let original = source.to_rgb8();
    if detections.is_empty() {
      return AnnotatedImage::plain(original);
    }

    let (width, height) = original.dimensions();
    let mut accepted = Vec::with_capacity(detections.len());
    let mut skipped = 0;
    for (index, detection) in detections.iter().enumerate() {
      match prepare(detection, width, height) {
        Ok((corners, mask)) => accepted.push((detection, corners, mask)),
        Err(e) => {
          warn!("跳过第 {} 个检测结果: {}", index, e);
          skipped += 1;
        }
      }
    }

    let layers: Vec<_> = accepted
      .iter()
      .filter_map(|(detection, _, mask)| {
        mask
          .as_ref()
          .map(|mask| (self.style.color_of(&detection.class_label), mask))
      })
      .collect();
    let mut image = blend_masks(&original, &layers);

    // 检框在混合之后绘制，保持边缘清晰
    for (detection, corners, _) in accepted.iter() {
      draw_box(
        &mut image,
        *corners,
        self.style.color_of(&detection.class_label),
      );
    }

    let mut labels = Vec::with_capacity(accepted.len());
    let mut degraded_labels = 0;
    for (detection, (x1, y1, _, _), _) in accepted.iter() {
      let label = self.label_text(detection);
      let drawn = match self.draw_label(&mut image, detection, (*x1, *y1), &label) {
        Ok(()) => label,
        Err((e, drawn)) => {
          warn!("标签 '{}' 绘制降级: {}", label, e);
          degraded_labels += 1;
          drawn
        }
      };
      labels.push(drawn);
    }

    debug!(
      "叠加绘制完成: {} 个检测结果, 跳过 {} 个, 标签降级 {} 个",
      accepted.len(),
      skipped,
      degraded_labels
    );

    AnnotatedImage {
      image,
      labels,
      rendered: accepted.len(),
      skipped,
      degraded_labels,
    }
  }

  fn label_text(&self, detection: &Detection) -> String {
    self.format_label(self.style.display_name(&detection.class_label), detection)
  }

  fn format_label(&self, name: &str, detection: &Detection) -> String {
    if self.style.show_confidence {
      format!("{} {:.2}", name, detection.confidence)
    } else {
      name.to_string()
    }
  }

  fn measure(&self, label: &str) -> Result<(&FontArc, u32, u32), RenderingDegraded> {
    let font = self.font.as_ref().ok_or(RenderingDegraded::NoFont)?;
    if let Some(c) = label
      .chars()
      .find(|c| !c.is_whitespace() && font.glyph_id(*c).0 == 0)
    {
      return Err(RenderingDegraded::MissingGlyph(c));
    }
    let (w, h) = text_size(self.scale, font, label);
    if w == 0 || h == 0 {
      return Err(RenderingDegraded::EmptyExtent);
    }
    Ok((font, w, h))
  }

  // 标签背景贴在检测框左上角的正上方。显示名称缺字时改用原始类别名，
  // 仍无法测量时退回无背景文字。降级时返回实际绘制的文字。
  fn draw_label(
    &self,
    image: &mut RgbImage,
    detection: &Detection,
    (x1, y1): (i32, i32),
    label: &str,
  ) -> Result<(), (RenderingDegraded, String)> {
    let color = self.style.color_of(&detection.class_label);

    let degraded = match self.measure(label) {
      Ok((font, text_w, text_h)) => {
        self.draw_measured(image, font, (x1, y1), (text_w, text_h), color, label);
        return Ok(());
      }
      Err(e) => e,
    };

    if matches!(degraded, RenderingDegraded::MissingGlyph(_)) {
      let raw = self.format_label(detection.class_label.as_str(), detection);
      if raw != label {
        if let Ok((font, text_w, text_h)) = self.measure(&raw) {
          self.draw_measured(image, font, (x1, y1), (text_w, text_h), color, &raw);
          return Err((degraded, raw));
        }
      }
    }

    if let Some(font) = self.font.as_ref() {
      draw_text_mut(
        image,
        color,
        x1,
        y1.saturating_sub(FALLBACK_LABEL_OFFSET),
        self.scale,
        font,
        label,
      );
    }
    Err((degraded, label.to_string()))
  }

  fn draw_measured(
    &self,
    image: &mut RgbImage,
    font: &FontArc,
    (x1, y1): (i32, i32),
    (text_w, text_h): (u32, u32),
    color: Rgb<u8>,
    label: &str,
  ) {
    let top = y1.saturating_sub((text_h + LABEL_PADDING) as i32);
    let rect = Rect::at(x1, top).of_size(text_w + LABEL_PADDING, text_h + LABEL_PADDING);
    draw_filled_rect_mut(image, rect, color);
    let offset = (LABEL_PADDING / 2) as i32;
    draw_text_mut(
      image,
      LABEL_TEXT_COLOR,
      x1 + offset,
      top + offset,
      self.scale,
      font,
      label,
    );
  }
}

type Corners = (i32, i32, i32, i32);

fn prepare(
  detection: &Detection,
  width: u32,
  height: u32,
) -> Result<(Corners, Option<GrayImage>), MalformedDetection> {
  detection.validate()?;
  let corners = detection
    .bbox
    .pixel_corners(width, height)
    .ok_or(MalformedDetection::OutsideImage(detection.bbox, width, height))?;
  let mask = match detection.mask.as_ref() {
    Some(mask) => Some(mask.resize_nearest(width, height)?),
    None => None,
  };
  Ok((corners, mask))
}

fn blend_masks(original: &RgbImage, layers: &[(Rgb<u8>, &GrayImage)]) -> RgbImage {
  if layers.is_empty() {
    return original.clone();
  }

  let mut working = original.clone();
  for (color, mask) in layers {
    for (x, y, m) in mask.enumerate_pixels() {
      if m[0] == 0 {
        continue;
      }
      let pixel = working.get_pixel_mut(x, y);
      for c in 0..3 {
        pixel[c] = saturate(pixel[c] as f32 + MASK_WEIGHT * color[c] as f32);
      }
    }
  }

  let mut blended = original.clone();
  for (x, y, pixel) in blended.enumerate_pixels_mut() {
    let overlay = working.get_pixel(x, y);
    if overlay == pixel {
      continue;
    }
    for c in 0..3 {
      pixel[c] = saturate(OVERLAY_WEIGHT * overlay[c] as f32 + SOURCE_WEIGHT * pixel[c] as f32);
    }
  }
  blended
}

fn saturate(v: f32) -> u8 {
  v.round().clamp(0.0, 255.0) as u8
}

// 2 像素边框：外框加一圈内缩。坐标已限制在影像范围内
fn draw_box(image: &mut RgbImage, (x1, y1, x2, y2): Corners, color: Rgb<u8>) {
  let width = (x2 - x1 + 1).max(1);
  let height = (y2 - y1 + 1).max(1);

  for inset in 0..BOX_THICKNESS {
    let w = width - 2 * inset;
    let h = height - 2 * inset;
    if w <= 0 || h <= 0 {
      break;
    }
    let rect = Rect::at(x1 + inset, y1 + inset).of_size(w as u32, h as u32);
    draw_hollow_rect_mut(image, rect, color);
  }
}

fn load_font(path: Option<&Path>) -> Option<FontArc> {
  if let Some(path) = path {
    let loaded = std::fs::read(path)
      .map_err(|e| e.to_string())
      .and_then(|data| FontArc::try_from_vec(data).map_err(|e| e.to_string()));
    match loaded {
      Ok(font) => {
        info!("加载标签字体: {}", path.display());
        return Some(font);
      }
      Err(e) => warn!("无法加载字体 {}: {}，改用内置字体", path.display(), e),
    }
  }

  match FontArc::try_from_slice(EMBEDDED_FONT) {
    Ok(font) => Some(font),
    Err(e) => {
      error!("内置字体无效: {}，标签将不会绘制", e);
      None
    }
  }
}
