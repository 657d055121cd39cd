// 该文件是 Shanan Clinic （山南诊所） 项目的一部分。
// src/report/practice.rs - 诊所运营与营业额报表
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

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::ReportConfig;
use crate::report::aggregate::{
  KeywordCount, MonthWindow, Series, keyword_distribution, monthly_counts, monthly_sums,
};
use crate::report::records::{InvoiceRecord, PatientRecord};

const FINANCIAL_MONTH_FORMAT: &str = "%Y年%m月";
const ISSUE_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PracticeReport {
  pub monthly_new_patients: Series<usize>,
  pub diagnosis_distribution: Vec<KeywordCount>,
  pub monthly_revenue: Series<f64>,
}

/// 最近若干个月的新增患者、鉴别诊断分布与月营业额
pub fn practice_report(
  patients: &[PatientRecord],
  invoices: &[InvoiceRecord],
  today: NaiveDate,
  config: &ReportConfig,
) -> PracticeReport {
  let window = MonthWindow::ending_at(&today, config.months);

  let diagnoses = patients.iter().filter_map(|p| {
    p.differential_diagnosis
      .as_deref()
      .map(|text| (p.id, text))
  });

  PracticeReport {
    monthly_new_patients: monthly_counts(patients.iter().map(|p| p.created_at), &window),
    diagnosis_distribution: keyword_distribution(diagnoses, &config.diagnosis_keywords),
    monthly_revenue: monthly_sums(
      invoices.iter().map(|i| (i.issued_at, i.total_amount)),
      &window,
    ),
  }
}

/// 闭区间日期范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
  pub start: NaiveDate,
  pub end: NaiveDate,
}

impl DateRange {
  pub fn contains(&self, date: NaiveDate) -> bool {
    self.start <= date && date <= self.end
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceSummary {
  pub id: u64,
  pub issue_date: String,
  pub patient_name: String,
  pub total_amount: f64,
  pub paid_amount: f64,
  pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthInvoices {
  pub month: String,
  pub invoices: Vec<InvoiceSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialReport {
  pub total_revenue: f64,
  pub invoices_by_month: Vec<MonthInvoices>,
  pub search_query: String,
  pub range: Option<DateRange>,
}

/// 营业额报表。
///
/// 总额只受日期范围影响；账单列表再按患者姓名过滤，按开具时间倒序、按月分组。
pub fn financial_report(
  invoices: &[InvoiceRecord],
  range: Option<DateRange>,
  search: &str,
) -> FinancialReport {
  let in_range = |invoice: &&InvoiceRecord| {
    range
      .map(|r| r.contains(invoice.issued_at.date()))
      .unwrap_or(true)
  };

  let total_revenue = invoices
    .iter()
    .filter(in_range)
    .map(InvoiceRecord::total)
    .sum();

  let needle = search.trim().to_lowercase();
  let mut listed: Vec<&InvoiceRecord> = invoices
    .iter()
    .filter(in_range)
    .filter(|i| needle.is_empty() || i.patient_name.to_lowercase().contains(&needle))
    .collect();
  listed.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));

  let mut invoices_by_month: Vec<MonthInvoices> = Vec::new();
  for invoice in listed {
    let month = invoice.issued_at.format(FINANCIAL_MONTH_FORMAT).to_string();
    let summary = InvoiceSummary {
      id: invoice.id,
      issue_date: invoice.issued_at.format(ISSUE_DATE_FORMAT).to_string(),
      patient_name: invoice.patient_name.clone(),
      total_amount: invoice.total(),
      paid_amount: invoice.paid(),
      status: invoice.status.clone(),
    };
    match invoices_by_month.last_mut() {
      Some(group) if group.month == month => group.invoices.push(summary),
      _ => invoices_by_month.push(MonthInvoices {
        month,
        invoices: vec![summary],
      }),
    }
  }

  FinancialReport {
    total_revenue,
    invoices_by_month,
    search_query: search.to_string(),
    range,
  }
}
