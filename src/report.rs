// 该文件是 Shanan Clinic （山南诊所） 项目的一部分。
// src/report.rs - 报表模块
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

pub mod aggregate;
pub mod practice;
pub mod records;
pub mod summary;

pub use aggregate::{
  AggregateRow, AggregateTable, GroupBy, KeywordCount, MonthBucket, MonthWindow, Series,
  aggregate, keyword_distribution, monthly_counts, monthly_sums,
};
pub use practice::{
  DateRange, FinancialReport, InvoiceSummary, MonthInvoices, PracticeReport, financial_report,
  practice_report,
};
pub use records::{InvoiceRecord, PatientRecord, ReportInput, XRayRecord};
pub use summary::{FindingsReport, Summarizer};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::config::AppConfig;

/// 报表命令的查询条件
#[derive(Debug, Clone, Default)]
pub struct ReportQuery {
  pub range: Option<DateRange>,
  pub search: String,
}

/// 报表命令输出的全部内容，每次按需重新计算
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClinicReport {
  pub generated_for: NaiveDate,
  pub practice: PracticeReport,
  pub financial: FinancialReport,
  pub findings_by_month: AggregateTable,
  pub findings_by_subject: AggregateTable,
  pub digest: Vec<String>,
}

pub fn build_report(
  input: &ReportInput,
  config: &AppConfig,
  today: NaiveDate,
  query: &ReportQuery,
) -> ClinicReport {
  info!(
    "生成报表: {} 名患者, {} 张账单, {} 张影像",
    input.patients.len(),
    input.invoices.len(),
    input.xrays.len()
  );

  let window = MonthWindow::ending_at(&today, config.report.months);
  let summarizer = Summarizer::new(&config.style);

  ClinicReport {
    generated_for: today,
    practice: practice_report(&input.patients, &input.invoices, today, &config.report),
    financial: financial_report(&input.invoices, query.range, &query.search),
    findings_by_month: aggregate(&input.xrays, GroupBy::TimeBucket, &window),
    findings_by_subject: aggregate(&input.xrays, GroupBy::Subject, &window),
    digest: summarizer.digest(input.xrays.iter().map(|x| &x.detections)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const RECORDS: &str = r#"{
    "patients": [
      {"id": 1, "name": "patient1", "created_at": "2026-09-02T10:00:00",
       "differential_diagnosis": "龋齿；牙髓炎"},
      {"id": 2, "name": "patient2", "created_at": "2026-10-11T16:20:00"}
    ],
    "invoices": [
      {"id": 1, "patient_id": 1, "patient_name": "patient1",
       "issued_at": "2026-09-02T11:00:00", "total_amount": 100.0, "status": "已支付"},
      {"id": 2, "patient_id": 2, "patient_name": "patient2",
       "issued_at": "2026-09-12T11:00:00", "total_amount": 50.0, "status": "未支付"}
    ],
    "xrays": [
      {"id": 1, "subject_id": 1, "taken_at": "2026-09-02T10:30:00",
       "detections": [{"box": [10, 10, 50, 50], "confidence": 0.92, "class_name": "Caries"}]},
      {"id": 2, "subject_id": 2, "taken_at": "2026-10-11T16:40:00", "detections": []}
    ]
  }"#;

  #[test]
  fn builds_every_section_from_one_input() {
    let input: ReportInput = serde_json::from_str(RECORDS).unwrap();
    let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
    let report = build_report(&input, &AppConfig::default(), today, &ReportQuery::default());

    assert_eq!(report.practice.monthly_revenue.data[4], 150.0);
    assert_eq!(report.financial.total_revenue, 150.0);
    assert_eq!(report.financial.invoices_by_month[0].month, "2026年09月");
    assert_eq!(report.findings_by_month.rows.len(), 6);
    assert_eq!(report.findings_by_month.rows[4].detections, 1);
    assert_eq!(report.findings_by_subject.rows.len(), 2);
    assert_eq!(report.digest, vec!["一份X光片显示存在: 龋齿".to_string()]);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["findings_by_month"]["group_by"], "time_bucket");
    assert_eq!(json["generated_for"], "2026-10-18");
  }

  #[test]
  fn query_limits_financial_section_only() {
    let input: ReportInput = serde_json::from_str(RECORDS).unwrap();
    let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
    let query = ReportQuery {
      range: None,
      search: "patient2".to_string(),
    };
    let report = build_report(&input, &AppConfig::default(), today, &query);

    assert_eq!(report.financial.total_revenue, 150.0);
    assert_eq!(report.financial.invoices_by_month[0].invoices.len(), 1);
    assert_eq!(report.financial.search_query, "patient2");
    assert_eq!(report.practice.monthly_new_patients.data[5], 1);
  }
}
