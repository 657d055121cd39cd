// 该文件是 Shanan Clinic （山南诊所） 项目的一部分。
// src/report/records.rs - 报表输入记录
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

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::model::DetectionSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XRayRecord {
  pub id: u64,
  pub subject_id: u64,
  pub taken_at: NaiveDateTime,
  #[serde(default)]
  pub detections: DetectionSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
  pub id: u64,
  pub name: String,
  pub created_at: NaiveDateTime,
  #[serde(default)]
  pub differential_diagnosis: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
  pub id: u64,
  pub patient_id: u64,
  pub patient_name: String,
  pub issued_at: NaiveDateTime,
  #[serde(default)]
  pub total_amount: Option<f64>,
  #[serde(default)]
  pub paid_amount: Option<f64>,
  #[serde(default)]
  pub status: String,
}

impl InvoiceRecord {
  pub fn total(&self) -> f64 {
    self.total_amount.unwrap_or(0.0)
  }

  pub fn paid(&self) -> f64 {
    self.paid_amount.unwrap_or(0.0)
  }
}

/// 报表命令读取的全部记录
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportInput {
  pub patients: Vec<PatientRecord>,
  pub invoices: Vec<InvoiceRecord>,
  pub xrays: Vec<XRayRecord>,
}
