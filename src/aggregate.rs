//! Chart-ready summaries over filtered records.
//!
//! Values are coerced with [`CellValue::as_f64`](crate::data::model::CellValue::as_f64);
//! missing or non-numeric values count neither in the numerator nor in the
//! denominator. A group without a single numeric value is omitted, never
//! reported as zero.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::data::model::IndicatorRecord;

/// Statistic computed per group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    #[default]
    Mean,
    Sum,
}

/// Mean of one indicator within one category and year (pie-chart slices).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryYearMean {
    pub category: String,
    pub year: i32,
    pub indicator_name: String,
    pub mean: f64,
    pub count: usize,
}

/// Mean of one indicator within one year (line-chart points).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorYearMean {
    pub indicator_name: String,
    pub year: i32,
    pub mean: f64,
    pub count: usize,
}

/// Statistic over every indicator of a category in one year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedSummary {
    pub category: String,
    pub year: i32,
    pub statistic: Statistic,
    pub value: f64,
    pub count: usize,
    /// Indicators that contributed at least one numeric value.
    pub indicators: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct Accumulator {
    sum: f64,
    count: usize,
}

impl Accumulator {
    fn push(&mut self, v: f64) {
        self.sum += v;
        self.count += 1;
    }

    fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }
}

/// Accumulate numeric values by key; keys never seeing a numeric value are
/// never inserted.
fn accumulate<'a, K, F>(records: &'a [IndicatorRecord], key: F) -> BTreeMap<K, Accumulator>
where
    K: Ord,
    F: Fn(&'a IndicatorRecord) -> K,
{
    let mut groups: BTreeMap<K, Accumulator> = BTreeMap::new();
    for rec in records {
        if let Some(v) = rec.numeric_value() {
            groups.entry(key(rec)).or_default().push(v);
        }
    }
    groups
}

/// Mean per (category, year, indicator), ordered by that key.
pub fn by_category_year(records: &[IndicatorRecord]) -> Vec<CategoryYearMean> {
    accumulate(records, |r| {
        (r.category.as_str(), r.year, r.indicator_name.as_str())
    })
    .into_iter()
    .map(|((category, year, indicator), acc)| CategoryYearMean {
        category: category.to_string(),
        year,
        indicator_name: indicator.to_string(),
        mean: acc.mean(),
        count: acc.count,
    })
    .collect()
}

/// Mean per (indicator, year), ordered by that key.
pub fn by_indicator_year(records: &[IndicatorRecord]) -> Vec<IndicatorYearMean> {
    accumulate(records, |r| (r.indicator_name.as_str(), r.year))
        .into_iter()
        .map(|((indicator, year), acc)| IndicatorYearMean {
            indicator_name: indicator.to_string(),
            year,
            mean: acc.mean(),
            count: acc.count,
        })
        .collect()
}

/// Mean or sum per (category, year) with the contributing indicators.
pub fn summarize_categories(
    records: &[IndicatorRecord],
    statistic: Statistic,
) -> Vec<AggregatedSummary> {
    let mut groups: BTreeMap<(&str, i32), (Accumulator, BTreeSet<String>)> = BTreeMap::new();
    for rec in records {
        let Some(v) = rec.numeric_value() else {
            continue;
        };
        let (acc, indicators) = groups
            .entry((rec.category.as_str(), rec.year))
            .or_default();
        acc.push(v);
        if !indicators.contains(&rec.indicator_name) {
            indicators.insert(rec.indicator_name.clone());
        }
    }

    groups
        .into_iter()
        .map(|((category, year), (acc, indicators))| AggregatedSummary {
            category: category.to_string(),
            year,
            statistic,
            value: match statistic {
                Statistic::Mean => acc.mean(),
                Statistic::Sum => acc.sum,
            },
            count: acc.count,
            indicators,
        })
        .collect()
}

/// Yearly mean series of a single indicator, ascending by year.
pub fn indicator_series(records: &[IndicatorRecord], indicator: &str) -> Vec<(i32, f64)> {
    let mut groups: BTreeMap<i32, Accumulator> = BTreeMap::new();
    for rec in records.iter().filter(|r| r.indicator_name == indicator) {
        if let Some(v) = rec.numeric_value() {
            groups.entry(rec.year).or_default().push(v);
        }
    }
    groups
        .into_iter()
        .map(|(year, acc)| (year, acc.mean()))
        .collect()
}
