// 该文件是 Shanan Clinic （山南诊所） 项目的一部分。
// src/report/aggregate.rs - 按月份、按患者的统计汇总
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

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use chrono::{Datelike, NaiveDateTime};
use serde::Serialize;

use crate::model::ClassLabel;
use crate::report::records::XRayRecord;

/// 自然月分桶
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthBucket {
  pub year: i32,
  pub month: u32,
}

impl MonthBucket {
  pub fn of(date: &impl Datelike) -> Self {
    Self {
      year: date.year(),
      month: date.month(),
    }
  }

  pub fn previous(self) -> Self {
    if self.month == 1 {
      Self {
        year: self.year - 1,
        month: 12,
      }
    } else {
      Self {
        year: self.year,
        month: self.month - 1,
      }
    }
  }

  pub fn label(&self) -> String {
    self.to_string()
  }

  /// 自公元 0 年 1 月起的月序号
  pub fn index(&self) -> i64 {
    self.year as i64 * 12 + self.month as i64 - 1
  }
}

impl fmt::Display for MonthBucket {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:04}-{:02}", self.year, self.month)
  }
}

/// 截止到 `end`（含）的连续 `months` 个自然月
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
  pub end: MonthBucket,
  pub months: u32,
}

impl MonthWindow {
  pub fn ending_at(date: &impl Datelike, months: u32) -> Self {
    Self {
      end: MonthBucket::of(date),
      months,
    }
  }

  /// 按时间先后排列
  pub fn buckets(&self) -> Vec<MonthBucket> {
    let mut buckets = Vec::with_capacity(self.months as usize);
    let mut current = self.end;
    for _ in 0..self.months {
      buckets.push(current);
      current = current.previous();
    }
    buckets.reverse();
    buckets
  }

  pub fn contains(&self, bucket: MonthBucket) -> bool {
    if self.months == 0 {
      return false;
    }
    let end = self.end.index();
    let first = end - (self.months as i64 - 1);
    (first..=end).contains(&bucket.index())
  }
}

/// 图表用的序列：标签与数据一一对应
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series<T> {
  pub labels: Vec<String>,
  pub data: Vec<T>,
}

fn zero_filled<T: Copy + Default>(
  window: &MonthWindow,
  values: &HashMap<MonthBucket, T>,
) -> Series<T> {
  let buckets = window.buckets();
  Series {
    labels: buckets.iter().map(MonthBucket::label).collect(),
    data: buckets
      .iter()
      .map(|b| values.get(b).copied().unwrap_or_default())
      .collect(),
  }
}

/// 每月记录数，窗口外的记录不计
pub fn monthly_counts<I>(timestamps: I, window: &MonthWindow) -> Series<usize>
where
  I: IntoIterator<Item = NaiveDateTime>,
{
  let mut counts: HashMap<MonthBucket, usize> = HashMap::new();
  for at in timestamps {
    let bucket = MonthBucket::of(&at);
    if window.contains(bucket) {
      *counts.entry(bucket).or_default() += 1;
    }
  }
  zero_filled(window, &counts)
}

/// 每月金额合计。缺失金额按 0 计，每条记录只归入其时间戳所在的月份。
pub fn monthly_sums<I>(records: I, window: &MonthWindow) -> Series<f64>
where
  I: IntoIterator<Item = (NaiveDateTime, Option<f64>)>,
{
  let mut sums: HashMap<MonthBucket, f64> = HashMap::new();
  for (at, amount) in records {
    let bucket = MonthBucket::of(&at);
    if window.contains(bucket) {
      *sums.entry(bucket).or_default() += amount.unwrap_or(0.0);
    }
  }
  zero_filled(window, &sums)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordCount {
  pub keyword: String,
  pub subjects: usize,
}

/// 关键词命中的患者数。同一患者的同一关键词只计一次，计数为 0 的关键词不输出。
pub fn keyword_distribution<'t, I>(texts: I, vocabulary: &[String]) -> Vec<KeywordCount>
where
  I: IntoIterator<Item = (u64, &'t str)>,
{
  let mut matched: HashSet<(u64, usize)> = HashSet::new();
  for (subject, text) in texts {
    for (index, keyword) in vocabulary.iter().enumerate() {
      if !keyword.is_empty() && text.contains(keyword.as_str()) {
        matched.insert((subject, index));
      }
    }
  }

  let mut counts = vec![0usize; vocabulary.len()];
  for (_, index) in matched {
    counts[index] += 1;
  }

  vocabulary
    .iter()
    .zip(counts)
    .filter(|(_, count)| *count > 0)
    .map(|(keyword, subjects)| KeywordCount {
      keyword: keyword.clone(),
      subjects,
    })
    .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
  Subject,
  TimeBucket,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateRow {
  pub key: String,
  pub images: usize,
  pub detections: usize,
  pub per_class: BTreeMap<ClassLabel, usize>,
}

impl AggregateRow {
  fn new(key: String) -> Self {
    Self {
      key,
      images: 0,
      detections: 0,
      per_class: BTreeMap::new(),
    }
  }

  fn add(&mut self, record: &XRayRecord) {
    self.images += 1;
    for detection in record.detections.valid_items() {
      self.detections += 1;
      *self
        .per_class
        .entry(detection.class_label.clone())
        .or_insert(0) += 1;
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateTable {
  pub group_by: GroupBy,
  pub rows: Vec<AggregateRow>,
}

/// 汇总窗口内的影像检测结果。按月分组时补齐空月份，按患者分组时按编号排序。
pub fn aggregate<'r, I>(records: I, group_by: GroupBy, window: &MonthWindow) -> AggregateTable
where
  I: IntoIterator<Item = &'r XRayRecord>,
{
  let in_window = records
    .into_iter()
    .filter(|r| window.contains(MonthBucket::of(&r.taken_at)));

  let rows = match group_by {
    GroupBy::TimeBucket => {
      let mut rows: BTreeMap<MonthBucket, AggregateRow> = window
        .buckets()
        .into_iter()
        .map(|b| (b, AggregateRow::new(b.label())))
        .collect();
      for record in in_window {
        if let Some(row) = rows.get_mut(&MonthBucket::of(&record.taken_at)) {
          row.add(record);
        }
      }
      rows.into_values().collect()
    }
    GroupBy::Subject => {
      let mut rows: BTreeMap<u64, AggregateRow> = BTreeMap::new();
      for record in in_window {
        rows
          .entry(record.subject_id)
          .or_insert_with(|| AggregateRow::new(record.subject_id.to_string()))
          .add(record);
      }
      rows.into_values().collect()
    }
  };

  AggregateTable { group_by, rows }
}
