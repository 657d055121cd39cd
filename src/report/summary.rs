// 该文件是 Shanan Clinic （山南诊所） 项目的一部分。
// src/report/summary.rs - 影像检测结果的文字概要
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

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::{
  config::StyleConfig,
  model::{ClassLabel, DetectionSet},
};

pub const NO_FINDINGS_MESSAGE: &str = "分析完成，未在图像中检测到明显的病变区域。";
pub const PROVIDER_UNAVAILABLE_MESSAGE: &str = "AI检测服务不可用，本张影像未完成分析。";
pub const DISCLAIMER: &str = "提醒：AI分析结果仅供参考，最终诊断请以执业医师意见为准。";

const REPORT_PREFIX: &str = "AI分析概要：";
const CONNECTIVE: &str = "；";
const NO_LESION_LINE: &str = "影像中未发现明显龋齿或根尖周病变。";
const DIGEST_PREFIX: &str = "一份X光片显示存在: ";
const CLEAN_FINDINGS: &str = "未见异常";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FindingsReport {
  pub text: String,
  pub counts: BTreeMap<ClassLabel, usize>,
}

impl FindingsReport {
  pub fn unavailable() -> Self {
    Self {
      text: PROVIDER_UNAVAILABLE_MESSAGE.to_string(),
      counts: BTreeMap::new(),
    }
  }

  pub fn total(&self) -> usize {
    self.counts.values().sum()
  }
}

pub struct Summarizer<'a> {
  style: &'a StyleConfig,
}

impl<'a> Summarizer<'a> {
  pub fn new(style: &'a StyleConfig) -> Self {
    Self { style }
  }

  pub fn summarize(&self, detections: &DetectionSet) -> FindingsReport {
    let mut counts = BTreeMap::new();
    for detection in detections.valid_items() {
      *counts.entry(detection.class_label.clone()).or_insert(0) += 1;
    }

    if counts.is_empty() {
      return FindingsReport {
        text: NO_FINDINGS_MESSAGE.to_string(),
        counts,
      };
    }

    let parts: Vec<String> = counts
      .iter()
      .map(|(label, count)| {
        format!(
          "检测到 {} 处疑似【{}】区域",
          count,
          self.style.display_name(label)
        )
      })
      .collect();

    FindingsReport {
      text: format!(
        "{}{}。{}",
        REPORT_PREFIX,
        parts.join(CONNECTIVE),
        DISCLAIMER
      ),
      counts,
    }
  }

  /// 每张影像一行，列出去重排序后的发现；全部无发现时给出一行说明。
  pub fn digest<'s, I>(&self, sets: I) -> Vec<String>
  where
    I: IntoIterator<Item = &'s DetectionSet>,
  {
    let lines: Vec<String> = sets
      .into_iter()
      .filter_map(|set| {
        let names: BTreeSet<&str> = set
          .valid_items()
          .map(|d| self.style.display_name(&d.class_label))
          .collect();
        if names.is_empty() {
          None
        } else {
          let names: Vec<&str> = names.into_iter().collect();
          Some(format!("{}{}", DIGEST_PREFIX, names.join(", ")))
        }
      })
      .collect();

    if lines.is_empty() {
      vec![NO_LESION_LINE.to_string()]
    } else {
      lines
    }
  }

  /// 导出病历用的单行结果，如 `龋齿 (92%), 根尖周病变 (61%)`
  pub fn findings_line(&self, set: &DetectionSet) -> String {
    let findings: Vec<String> = set
      .valid_items()
      .map(|d| {
        format!(
          "{} ({:.0}%)",
          self.style.display_name(&d.class_label),
          d.confidence * 100.0
        )
      })
      .collect();
    if findings.is_empty() {
      CLEAN_FINDINGS.to_string()
    } else {
      findings.join(", ")
    }
  }
}
