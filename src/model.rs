// 该文件是 Shanan Clinic （山南诊所） 项目的一部分。
// src/model.rs - 检测结果与检测服务
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

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::frame::SourceImage;

mod mask;
pub use self::mask::{Mask, MaskError};

mod sidecar;
pub use self::sidecar::SidecarProvider;

const CARIES_LABEL: &str = "Caries";
const PERIAPICAL_LESION_LABEL: &str = "Periapical lesion";

/// 检测类别。模型只输出两类，其余标签原样保留。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ClassLabel {
  Caries,
  PeriapicalLesion,
  Unknown(String),
}

impl ClassLabel {
  pub fn as_str(&self) -> &str {
    match self {
      ClassLabel::Caries => CARIES_LABEL,
      ClassLabel::PeriapicalLesion => PERIAPICAL_LESION_LABEL,
      ClassLabel::Unknown(raw) => raw,
    }
  }
}

impl From<&str> for ClassLabel {
  fn from(raw: &str) -> Self {
    match raw {
      CARIES_LABEL => ClassLabel::Caries,
      PERIAPICAL_LESION_LABEL => ClassLabel::PeriapicalLesion,
      other => ClassLabel::Unknown(other.to_string()),
    }
  }
}

impl From<String> for ClassLabel {
  fn from(raw: String) -> Self {
    ClassLabel::from(raw.as_str())
  }
}

impl From<ClassLabel> for String {
  fn from(label: ClassLabel) -> Self {
    match label {
      ClassLabel::Unknown(raw) => raw,
      known => known.as_str().to_string(),
    }
  }
}

impl fmt::Display for ClassLabel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// 像素坐标下的检测框，持久化为 `[x1, y1, x2, y2]`。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
  pub x1: f64,
  pub y1: f64,
  pub x2: f64,
  pub y2: f64,
}

impl BoundingBox {
  pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
    Self { x1, y1, x2, y2 }
  }

  /// 截断为整数像素坐标并限制在影像范围内；限制后为空时返回 `None`
  pub fn pixel_corners(&self, width: u32, height: u32) -> Option<(i32, i32, i32, i32)> {
    if width == 0 || height == 0 {
      return None;
    }
    let max_x = (width - 1) as f64;
    let max_y = (height - 1) as f64;
    let clamp = |v: f64, max: f64| v.trunc().clamp(0.0, max) as i32;

    let (x1, y1) = (clamp(self.x1, max_x), clamp(self.y1, max_y));
    let (x2, y2) = (clamp(self.x2, max_x), clamp(self.y2, max_y));
    if x1 >= x2 || y1 >= y2 {
      return None;
    }
    Some((x1, y1, x2, y2))
  }

  fn validate(&self) -> Result<(), MalformedDetection> {
    let finite = [self.x1, self.y1, self.x2, self.y2]
      .iter()
      .all(|v| v.is_finite());
    if !finite || self.x1 >= self.x2 || self.y1 >= self.y2 {
      return Err(MalformedDetection::InvalidBox(*self));
    }
    Ok(())
  }
}

impl From<[f64; 4]> for BoundingBox {
  fn from(v: [f64; 4]) -> Self {
    BoundingBox::new(v[0], v[1], v[2], v[3])
  }
}

impl From<BoundingBox> for [f64; 4] {
  fn from(b: BoundingBox) -> Self {
    [b.x1, b.y1, b.x2, b.y2]
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
  #[serde(rename = "box")]
  pub bbox: BoundingBox,
  pub confidence: f64,
  #[serde(rename = "class_name")]
  pub class_label: ClassLabel,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub mask: Option<Mask>,
}

#[derive(Error, Debug)]
pub enum MalformedDetection {
  #[error("检测框无效: {0:?}")]
  InvalidBox(BoundingBox),
  #[error("置信度超出范围: {0}")]
  ConfidenceOutOfRange(f64),
  #[error("检测框 {0:?} 不在 {1}x{2} 影像范围内")]
  OutsideImage(BoundingBox, u32, u32),
  #[error("掩码无效: {0}")]
  Mask(#[from] MaskError),
}

impl Detection {
  pub fn new(bbox: BoundingBox, confidence: f64, class_label: ClassLabel) -> Self {
    Self {
      bbox,
      confidence,
      class_label,
      mask: None,
    }
  }

  pub fn with_mask(mut self, mask: Mask) -> Self {
    self.mask = Some(mask);
    self
  }

  pub fn validate(&self) -> Result<(), MalformedDetection> {
    self.bbox.validate()?;
    if !(0.0..=1.0).contains(&self.confidence) {
      return Err(MalformedDetection::ConfidenceOutOfRange(self.confidence));
    }
    Ok(())
  }
}

#[derive(Error, Debug)]
pub enum BlobError {
  #[error("JSON 错误: {0}")]
  Json(#[from] serde_json::Error),
  #[error("检测结果必须是 JSON 数组")]
  NotAnArray,
}

/// 一张影像的全部检测结果，按模型输出顺序排列。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DetectionSet {
  items: Vec<Detection>,
}

impl DetectionSet {
  pub fn new(items: Vec<Detection>) -> Self {
    Self { items }
  }

  pub fn empty() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.items.iter()
  }

  /// 跳过（并记录）不合法的检测结果
  pub fn valid_items(&self) -> impl Iterator<Item = &Detection> {
    self
      .items
      .iter()
      .enumerate()
      .filter_map(|(index, detection)| match detection.validate() {
        Ok(()) => Some(detection),
        Err(e) => {
          warn!("跳过第 {} 个检测结果: {}", index, e);
          None
        }
      })
  }

  pub fn to_blob(&self) -> Result<String, BlobError> {
    Ok(serde_json::to_string(self)?)
  }

  /// 解析持久化的 JSON 数组。单个元素格式错误时只跳过该元素。
  pub fn from_blob(blob: &str) -> Result<Self, BlobError> {
    match serde_json::from_str::<serde_json::Value>(blob)? {
      serde_json::Value::Array(values) => Ok(Self::from_values(values)),
      _ => Err(BlobError::NotAnArray),
    }
  }

  fn from_values(values: Vec<serde_json::Value>) -> Self {
    let items = values
      .into_iter()
      .enumerate()
      .filter_map(
        |(index, value)| match serde_json::from_value::<Detection>(value) {
          Ok(detection) => Some(detection),
          Err(e) => {
            warn!("检测结果第 {} 项格式错误，已跳过: {}", index, e);
            None
          }
        },
      )
      .collect();
    Self { items }
  }
}

impl<'de> Deserialize<'de> for DetectionSet {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>,
  {
    let values = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(Self::from_values(values))
  }
}

impl FromIterator<Detection> for DetectionSet {
  fn from_iter<I: IntoIterator<Item = Detection>>(iter: I) -> Self {
    Self::new(iter.into_iter().collect())
  }
}

impl<'a> IntoIterator for &'a DetectionSet {
  type Item = &'a Detection;
  type IntoIter = std::slice::Iter<'a, Detection>;

  fn into_iter(self) -> Self::IntoIter {
    self.items.iter()
  }
}

#[derive(Error, Debug)]
pub enum ProviderError {
  #[error("检测服务不可用: {0}")]
  Unavailable(String),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 检测服务。模型本身不透明：给一张影像，返回检测结果。
///
/// 调用可能耗时数秒，超时与重试由调用方决定。
pub trait DetectionProvider {
  fn name(&self) -> &str;

  fn detect(&self, source: &SourceImage) -> Result<DetectionSet, ProviderError>;
}

#[cfg(test)]
mod tests {
  use super::*;

  fn caries() -> Detection {
    Detection::new(
      BoundingBox::new(10.0, 10.0, 50.0, 50.0),
      0.92,
      ClassLabel::Caries,
    )
  }

  #[test]
  fn blob_round_trip_keeps_boxes_masks_and_labels() {
    let mask = Mask::from_rows(vec![vec![0, 1, 1], vec![1, 0, 0]]).unwrap();
    let set = DetectionSet::new(vec![
      caries(),
      Detection::new(
        BoundingBox::new(12.25, 3.5, 99.125, 40.75),
        0.3333,
        ClassLabel::PeriapicalLesion,
      )
      .with_mask(mask),
      Detection::new(
        BoundingBox::new(0.0, 0.0, 1.0, 1.0),
        0.5,
        ClassLabel::from("Calculus"),
      ),
    ]);

    let blob = set.to_blob().unwrap();
    let restored = DetectionSet::from_blob(&blob).unwrap();
    assert_eq!(restored, set);
  }

  #[test]
  fn blob_uses_persisted_field_names() {
    let blob = DetectionSet::new(vec![caries()]).to_blob().unwrap();
    let value: serde_json::Value = serde_json::from_str(&blob).unwrap();
    assert_eq!(value[0]["class_name"], "Caries");
    assert_eq!(value[0]["box"][2], 50.0);
    assert!(value[0].get("mask").is_none());
  }

  #[test]
  fn blob_accepts_float_masks_and_null_mask() {
    let blob = r#"[
      {"box": [1, 2, 3, 4], "confidence": 0.8, "class_name": "Periapical lesion", "mask": [[0.0, 1.0], [1.0, 1.0]]},
      {"box": [5, 6, 7, 8], "confidence": 0.4, "class_name": "Caries", "mask": null}
    ]"#;
    let set = DetectionSet::from_blob(blob).unwrap();
    assert_eq!(set.len(), 2);
    let mask = set.iter().next().unwrap().mask.as_ref().unwrap();
    assert_eq!((mask.width(), mask.height()), (2, 2));
    assert_eq!(mask.count(), 3);
    assert!(set.iter().nth(1).unwrap().mask.is_none());
  }

  #[test]
  fn malformed_elements_are_skipped() {
    let blob = r#"[
      {"box": ["a", 2, 3, 4], "confidence": 0.8, "class_name": "Caries"},
      {"box": [1, 2, 3, 4], "confidence": 0.8, "class_name": "Caries", "mask": [[0, 1], [1]]},
      {"box": [1, 2, 3, 4], "confidence": 0.7, "class_name": "Caries"}
    ]"#;
    let set = DetectionSet::from_blob(blob).unwrap();
    assert_eq!(set.len(), 1);
    assert_eq!(set.iter().next().unwrap().confidence, 0.7);
  }

  #[test]
  fn non_array_blob_is_rejected() {
    assert!(matches!(
      DetectionSet::from_blob(r#"{"box": [1, 2, 3, 4]}"#),
      Err(BlobError::NotAnArray)
    ));
    assert!(matches!(
      DetectionSet::from_blob("not json"),
      Err(BlobError::Json(_))
    ));
  }

  #[test]
  fn validation_rejects_inverted_boxes_and_bad_confidence() {
    let inverted = Detection::new(
      BoundingBox::new(50.0, 10.0, 10.0, 50.0),
      0.5,
      ClassLabel::Caries,
    );
    assert!(matches!(
      inverted.validate(),
      Err(MalformedDetection::InvalidBox(_))
    ));

    let nan = Detection::new(
      BoundingBox::new(f64::NAN, 10.0, 20.0, 50.0),
      0.5,
      ClassLabel::Caries,
    );
    assert!(nan.validate().is_err());

    let mut over = caries();
    over.confidence = 1.5;
    assert!(matches!(
      over.validate(),
      Err(MalformedDetection::ConfidenceOutOfRange(_))
    ));

    let set = DetectionSet::new(vec![inverted, caries(), over]);
    assert_eq!(set.valid_items().count(), 1);
  }

  #[test]
  fn class_labels_map_from_raw_names() {
    assert_eq!(ClassLabel::from("Caries"), ClassLabel::Caries);
    assert_eq!(
      ClassLabel::from("Periapical lesion"),
      ClassLabel::PeriapicalLesion
    );
    assert_eq!(ClassLabel::from("Calculus").as_str(), "Calculus");
  }

  #[test]
  fn pixel_corners_are_clamped_to_image() {
    let huge = BoundingBox::new(0.0, 0.0, 3.0e9, 10.0);
    assert_eq!(huge.pixel_corners(20, 20), Some((0, 0, 19, 10)));

    let negative = BoundingBox::new(-5.5, -1.0e12, 12.9, 8.0);
    assert_eq!(negative.pixel_corners(20, 20), Some((0, 0, 12, 8)));

    let outside = BoundingBox::new(100.0, 100.0, 200.0, 200.0);
    assert_eq!(outside.pixel_corners(20, 20), None);
    assert_eq!(caries().bbox.pixel_corners(0, 0), None);
  }

  #[test]
  fn blob_keeps_full_float_precision() {
    let blob = r#"[{"box": [123.45600128173828, 10.1, 50.123456789, 60.0], "confidence": 0.9234567890123, "class_name": "Caries"}]"#;
    let rewritten = DetectionSet::from_blob(blob).unwrap().to_blob().unwrap();

    let before: serde_json::Value = serde_json::from_str(blob).unwrap();
    let after: serde_json::Value = serde_json::from_str(&rewritten).unwrap();
    assert_eq!(after, before);
  }
}
