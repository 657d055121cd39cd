// 该文件是 Shanan Clinic （山南诊所） 项目的一部分。
// src/config.rs - 绘制样式与报表配置
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

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::Rgb;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::model::ClassLabel;

const DEFAULT_FONT_SIZE: f32 = 15.0;
const DEFAULT_FALLBACK_COLOR: [u8; 3] = [0, 255, 0];
const DEFAULT_REPORT_MONTHS: u32 = 6;
pub const MAX_REPORT_MONTHS: u32 = 120;
const DEFAULT_DIAGNOSIS_KEYWORDS: [&str; 8] = [
  "龋齿",
  "牙髓炎",
  "根尖周炎",
  "牙周炎",
  "牙龈炎",
  "智齿",
  "缺损",
  "创伤",
];

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("配置解析错误: {0}")]
  TomlError(#[from] toml::de::Error),
  #[error("配置无效: {0}")]
  Invalid(String),
}

/// 标注图的绘制样式。启动时加载一次，之后只读。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
  /// 类别 → 颜色 (RGB)
  pub colors: BTreeMap<String, [u8; 3]>,
  /// 未配置颜色的类别使用该颜色
  pub fallback_color: [u8; 3],
  /// 类别 → 显示名称
  pub labels: BTreeMap<String, String>,
  /// 标签是否附带置信度
  pub show_confidence: bool,
  /// 标签字体文件；为空时使用内置字体
  pub font_path: Option<PathBuf>,
  pub font_size: f32,
}

impl Default for StyleConfig {
  fn default() -> Self {
    let colors = BTreeMap::from([
      ("Caries".to_string(), [255, 0, 0]),
      ("Periapical lesion".to_string(), [0, 0, 255]),
    ]);
    let labels = BTreeMap::from([
      ("Caries".to_string(), "龋齿".to_string()),
      ("Periapical lesion".to_string(), "根尖周病变".to_string()),
    ]);

    Self {
      colors,
      fallback_color: DEFAULT_FALLBACK_COLOR,
      labels,
      show_confidence: true,
      font_path: None,
      font_size: DEFAULT_FONT_SIZE,
    }
  }
}

impl StyleConfig {
  pub fn color_of(&self, label: &ClassLabel) -> Rgb<u8> {
    Rgb(
      self
        .colors
        .get(label.as_str())
        .copied()
        .unwrap_or(self.fallback_color),
    )
  }

  /// 本地化名称，缺失时退回原始类别名
  pub fn display_name<'a>(&'a self, label: &'a ClassLabel) -> &'a str {
    self
      .labels
      .get(label.as_str())
      .map(String::as_str)
      .unwrap_or(label.as_str())
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
  /// 鉴别诊断关键词，按此顺序输出
  pub diagnosis_keywords: Vec<String>,
  /// 月度统计覆盖的月份数
  pub months: u32,
}

impl Default for ReportConfig {
  fn default() -> Self {
    Self {
      diagnosis_keywords: DEFAULT_DIAGNOSIS_KEYWORDS
        .iter()
        .map(|k| k.to_string())
        .collect(),
      months: DEFAULT_REPORT_MONTHS,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  pub style: StyleConfig,
  pub report: ReportConfig,
}

impl AppConfig {
  /// 读取 TOML 配置；未给出路径时使用默认值。
  pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
    let config = match path {
      Some(path) => {
        info!("读取配置文件: {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)?
      }
      None => Self::default(),
    };
    config.validate()?;
    Ok(config)
  }

  pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
    let config: AppConfig = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<(), ConfigError> {
    if !(self.style.font_size.is_finite() && self.style.font_size > 0.0) {
      return Err(ConfigError::Invalid(format!(
        "字体大小必须为正数: {}",
        self.style.font_size
      )));
    }
    if self.report.months == 0 {
      return Err(ConfigError::Invalid("统计月份数不能为 0".to_string()));
    }
    if self.report.months > MAX_REPORT_MONTHS {
      return Err(ConfigError::Invalid(format!(
        "统计月份数不能超过 {}: {}",
        MAX_REPORT_MONTHS, self.report.months
      )));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_match_clinic_palette() {
    let style = StyleConfig::default();
    assert_eq!(style.color_of(&ClassLabel::Caries), Rgb([255, 0, 0]));
    assert_eq!(
      style.color_of(&ClassLabel::PeriapicalLesion),
      Rgb([0, 0, 255])
    );
    assert_eq!(
      style.color_of(&ClassLabel::from("Calculus")),
      Rgb([0, 255, 0])
    );
    assert_eq!(style.display_name(&ClassLabel::Caries), "龋齿");
    assert!(style.show_confidence);
  }

  #[test]
  fn missing_localization_falls_back_to_raw_label() {
    let style = StyleConfig::default();
    let label = ClassLabel::from("Calculus");
    assert_eq!(style.display_name(&label), "Calculus");
  }

  #[test]
  fn partial_toml_overrides_defaults() {
    let config = AppConfig::from_toml(
      r#"
        [style]
        show_confidence = false
        font_size = 18.0

        [style.labels]
        "Caries" = "Caries"

        [report]
        months = 12
      "#,
    )
    .unwrap();

    assert!(!config.style.show_confidence);
    assert_eq!(config.style.font_size, 18.0);
    assert_eq!(config.style.display_name(&ClassLabel::Caries), "Caries");
    // 整张表被替换，未列出的类别退回原始名称
    assert_eq!(
      config.style.display_name(&ClassLabel::PeriapicalLesion),
      "Periapical lesion"
    );
    assert_eq!(config.report.months, 12);
    assert_eq!(config.report.diagnosis_keywords.len(), 8);
  }

  #[test]
  fn invalid_values_are_rejected() {
    assert!(matches!(
      AppConfig::from_toml("[style]\nfont_size = 0.0\n"),
      Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
      AppConfig::from_toml("[report]\nmonths = 0\n"),
      Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
      AppConfig::from_toml("[report]\nmonths = 4294967295\n"),
      Err(ConfigError::Invalid(_))
    ));
    assert!(AppConfig::from_toml("[report]\nmonths = 120\n").is_ok());
    assert!(matches!(
      AppConfig::from_toml("[style\n"),
      Err(ConfigError::TomlError(_))
    ));
  }

  #[test]
  fn load_without_path_uses_defaults() {
    let config = AppConfig::load(None).unwrap();
    assert_eq!(config.report.months, 6);
  }
}
