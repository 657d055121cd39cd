// 该文件是 Shanan Clinic （山南诊所） 项目的一部分。
// src/document.rs - 病历文档字段：处方药品列表
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

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentError {
  #[error("处方无效，至少需要包含一种药品。")]
  Empty,
  #[error("第 {line} 行缺少药品名称")]
  MissingName { line: usize },
  #[error("JSON 错误: {0}")]
  Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
  pub name: String,
  #[serde(default)]
  pub dosage: String,
  #[serde(default)]
  pub frequency: String,
  #[serde(default)]
  pub notes: String,
}

impl Medication {
  /// 解析 `名称, 剂量, 频次, 备注` 一行，缺省的字段为空
  fn parse_line(line: &str) -> Option<Self> {
    let mut parts = line.split(',').map(str::trim);
    let name = parts.next().unwrap_or_default();
    if name.is_empty() {
      return None;
    }
    let mut next = || parts.next().unwrap_or_default().to_string();
    Some(Self {
      name: name.to_string(),
      dosage: next(),
      frequency: next(),
      notes: next(),
    })
  }

  fn to_line(&self) -> String {
    let mut parts = vec![
      self.name.as_str(),
      self.dosage.as_str(),
      self.frequency.as_str(),
      self.notes.as_str(),
    ];
    while parts.last().is_some_and(|p| p.is_empty()) {
      parts.pop();
    }
    parts.join(", ")
  }
}

/// 处方中的药品列表，至少包含一种药品。
///
/// 持久化为 JSON 数组，反序列化时同样检查非空。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Medication>", into = "Vec<Medication>")]
pub struct Medications(Vec<Medication>);

impl Medications {
  pub fn new(items: Vec<Medication>) -> Result<Self, DocumentError> {
    if items.is_empty() {
      return Err(DocumentError::Empty);
    }
    Ok(Self(items))
  }

  /// 每行一种药品，空行忽略
  pub fn parse_text(text: &str) -> Result<Self, DocumentError> {
    let mut items = Vec::new();
    for (index, line) in text.lines().enumerate() {
      if line.trim().is_empty() {
        continue;
      }
      let medication =
        Medication::parse_line(line).ok_or(DocumentError::MissingName { line: index + 1 })?;
      items.push(medication);
    }
    Self::new(items)
  }

  pub fn to_text(&self) -> String {
    self
      .0
      .iter()
      .map(Medication::to_line)
      .collect::<Vec<_>>()
      .join("\n")
  }

  /// 病历导出用的单行，如 `阿莫西林 (0.5g, 每日三次); 布洛芬 (0.3g, 必要时)`
  pub fn record_line(&self) -> String {
    self
      .0
      .iter()
      .map(|m| format!("{} ({}, {})", m.name, m.dosage, m.frequency))
      .collect::<Vec<_>>()
      .join("; ")
  }

  pub fn to_blob(&self) -> Result<String, DocumentError> {
    Ok(serde_json::to_string(self)?)
  }

  pub fn from_blob(blob: &str) -> Result<Self, DocumentError> {
    Ok(serde_json::from_str(blob)?)
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Medication> {
    self.0.iter()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl TryFrom<Vec<Medication>> for Medications {
  type Error = DocumentError;

  fn try_from(items: Vec<Medication>) -> Result<Self, Self::Error> {
    Self::new(items)
  }
}

impl From<Medications> for Vec<Medication> {
  fn from(value: Medications) -> Self {
    value.0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_lines_with_missing_fields() {
    let meds = Medications::parse_text("阿莫西林, 0.5g, 每日三次, 饭后\n\n  布洛芬 , 0.3g \n").unwrap();
    assert_eq!(meds.len(), 2);
    let items: Vec<&Medication> = meds.iter().collect();
    assert_eq!(items[0].notes, "饭后");
    assert_eq!(items[1].name, "布洛芬");
    assert_eq!(items[1].dosage, "0.3g");
    assert_eq!(items[1].frequency, "");
  }

  #[test]
  fn formatting_trims_trailing_empty_fields() {
    let meds = Medications::parse_text("阿莫西林, 0.5g, 每日三次, 饭后\n布洛芬, 0.3g").unwrap();
    assert_eq!(meds.to_text(), "阿莫西林, 0.5g, 每日三次, 饭后\n布洛芬, 0.3g");
    assert_eq!(
      meds.record_line(),
      "阿莫西林 (0.5g, 每日三次); 布洛芬 (0.3g, )"
    );
  }

  #[test]
  fn empty_prescription_is_rejected() {
    assert!(matches!(
      Medications::parse_text("  \n\n"),
      Err(DocumentError::Empty)
    ));
    assert!(matches!(
      Medications::from_blob("[]"),
      Err(DocumentError::Json(_))
    ));
  }

  #[test]
  fn line_without_name_is_rejected() {
    assert!(matches!(
      Medications::parse_text("阿莫西林\n, 0.3g"),
      Err(DocumentError::MissingName { line: 2 })
    ));
  }

  #[test]
  fn blob_keeps_field_names() {
    let meds = Medications::parse_text("甲硝唑, 0.2g").unwrap();
    let blob = meds.to_blob().unwrap();
    assert_eq!(
      blob,
      r#"[{"name":"甲硝唑","dosage":"0.2g","frequency":"","notes":""}]"#
    );
    assert_eq!(Medications::from_blob(&blob).unwrap(), meds);
  }
}
