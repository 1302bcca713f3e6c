use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CellValue – the raw `Value` cell of one observation
// ---------------------------------------------------------------------------

/// A dynamically-typed value cell as it arrives from the source table.
///
/// Values are kept raw until a numeric statistic is computed; [`CellValue::as_f64`]
/// is the single point where text is coerced to a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Integer(i64),
    Number(f64),
    Text(String),
    Null,
}

impl CellValue {
    /// Interpret the cell as a finite `f64`.
    ///
    /// Text is trimmed and parsed; anything that does not yield a finite
    /// number (empty text, `"n/a"`, `NaN`, infinities) is missing.
    pub fn as_f64(&self) -> Option<f64> {
        let v = match self {
            CellValue::Number(v) => *v,
            CellValue::Integer(i) => *i as f64,
            CellValue::Text(s) => s.trim().parse::<f64>().ok()?,
            CellValue::Null => return None,
        };
        v.is_finite().then_some(v)
    }

    pub fn is_missing(&self) -> bool {
        self.as_f64().is_none()
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Number(v)
    }
}

impl From<Option<f64>> for CellValue {
    fn from(v: Option<f64>) -> Self {
        v.map_or(CellValue::Null, CellValue::Number)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Number(v) => write!(f, "{v}"),
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Null => write!(f, "<null>"),
        }
    }
}

// ---------------------------------------------------------------------------
// RawRow – one row of the source table, before classification
// ---------------------------------------------------------------------------

/// One observation as produced by the loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub country: String,
    pub indicator_name: String,
    pub indicator_code: String,
    pub year: i32,
    pub value: CellValue,
}

// ---------------------------------------------------------------------------
// IndicatorRecord – a classified observation
// ---------------------------------------------------------------------------

/// A single classified observation. Never mutated after classification;
/// pipeline stages produce new sequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRecord {
    pub country: String,
    pub indicator_name: String,
    pub indicator_code: String,
    pub year: i32,
    pub value: CellValue,
    /// Derived by the category classifier.
    pub category: String,
}

impl IndicatorRecord {
    pub fn from_row(row: RawRow, category: impl Into<String>) -> Self {
        IndicatorRecord {
            country: row.country,
            indicator_name: row.indicator_name,
            indicator_code: row.indicator_code,
            year: row.year,
            value: row.value,
            category: category.into(),
        }
    }

    /// Numeric value, `None` when missing or not coercible.
    pub fn numeric_value(&self) -> Option<f64> {
        self.value.as_f64()
    }
}

// ---------------------------------------------------------------------------
// HealthDataset – the complete classified dataset
// ---------------------------------------------------------------------------

/// The classified records with pre-computed indices of the distinct
/// indicators, categories and years.
#[derive(Debug, Clone, Default)]
pub struct HealthDataset {
    pub records: Vec<IndicatorRecord>,
    pub indicators: BTreeSet<String>,
    pub categories: BTreeSet<String>,
    pub years: BTreeSet<i32>,
}

impl HealthDataset {
    /// Build the indices from classified records.
    pub fn from_records(records: Vec<IndicatorRecord>) -> Self {
        let mut indicators = BTreeSet::new();
        let mut categories = BTreeSet::new();
        let mut years = BTreeSet::new();

        for rec in &records {
            indicators.insert(rec.indicator_name.clone());
            categories.insert(rec.category.clone());
            years.insert(rec.year);
        }

        HealthDataset {
            records,
            indicators,
            categories,
            years,
        }
    }

    /// Drop every record whose category is `category` (typically `"Other"`).
    pub fn without_category(self, category: &str) -> Self {
        let before = self.records.len();
        let kept: Vec<IndicatorRecord> = self
            .records
            .into_iter()
            .filter(|r| r.category != category)
            .collect();
        log::debug!(
            "Dropped {} records classified as {category:?}",
            before - kept.len()
        );
        Self::from_records(kept)
    }

    /// Inclusive (earliest, latest) year, `None` when empty.
    pub fn year_span(&self) -> Option<(i32, i32)> {
        Some((*self.years.first()?, *self.years.last()?))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Summary figures for an overview page.
    pub fn overview(&self) -> DatasetOverview {
        DatasetOverview::of(&self.records)
    }
}

// ---------------------------------------------------------------------------
// DatasetOverview – headline figures of a record set
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetOverview {
    pub total_indicators: usize,
    pub total_records: usize,
    pub years_covered: usize,
    pub earliest_year: Option<i32>,
    pub latest_year: Option<i32>,
    /// Mean over every numeric value, `None` when no value is numeric.
    pub mean_value: Option<f64>,
    pub highest: Option<IndicatorRecord>,
    pub lowest: Option<IndicatorRecord>,
}

impl DatasetOverview {
    pub fn of(records: &[IndicatorRecord]) -> Self {
        let indicators: BTreeSet<&str> =
            records.iter().map(|r| r.indicator_name.as_str()).collect();
        let years: BTreeSet<i32> = records.iter().map(|r| r.year).collect();

        let mut sum = 0.0;
        let mut count = 0usize;
        let mut highest: Option<(&IndicatorRecord, f64)> = None;
        let mut lowest: Option<(&IndicatorRecord, f64)> = None;

        for rec in records {
            let Some(v) = rec.numeric_value() else {
                continue;
            };
            sum += v;
            count += 1;
            // Strict comparisons keep the first record on ties.
            if highest.map_or(true, |(_, h)| v > h) {
                highest = Some((rec, v));
            }
            if lowest.map_or(true, |(_, l)| v < l) {
                lowest = Some((rec, v));
            }
        }

        DatasetOverview {
            total_indicators: indicators.len(),
            total_records: records.len(),
            years_covered: years.len(),
            earliest_year: years.first().copied(),
            latest_year: years.last().copied(),
            mean_value: (count > 0).then(|| sum / count as f64),
            highest: highest.map(|(r, _)| r.clone()),
            lowest: lowest.map(|(r, _)| r.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, year: i32, value: CellValue) -> IndicatorRecord {
        IndicatorRecord {
            country: "Sri Lanka".to_string(),
            indicator_name: name.to_string(),
            indicator_code: "X.Y".to_string(),
            year,
            value,
            category: "Mortality Rates".to_string(),
        }
    }

    #[test]
    fn test_cell_value_coercion() {
        assert_eq!(CellValue::Number(1.5).as_f64(), Some(1.5));
        assert_eq!(CellValue::Integer(7).as_f64(), Some(7.0));
        assert_eq!(CellValue::Text(" 42.5 ".to_string()).as_f64(), Some(42.5));
        assert_eq!(CellValue::Text("n/a".to_string()).as_f64(), None);
        assert_eq!(CellValue::Text(String::new()).as_f64(), None);
        assert_eq!(CellValue::Number(f64::NAN).as_f64(), None);
        assert_eq!(CellValue::Text("inf".to_string()).as_f64(), None);
        assert!(CellValue::Null.is_missing());
    }

    #[test]
    fn test_dataset_indices() {
        let ds = HealthDataset::from_records(vec![
            record("A", 2001, CellValue::Number(1.0)),
            record("B", 1999, CellValue::Null),
            record("A", 2005, CellValue::Number(2.0)),
        ]);
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.indicators.len(), 2);
        assert_eq!(ds.year_span(), Some((1999, 2005)));
        assert!(HealthDataset::default().year_span().is_none());
    }

    #[test]
    fn test_without_category() {
        let mut other = record("Unmapped", 2000, CellValue::Number(3.0));
        other.category = "Other".to_string();
        let ds = HealthDataset::from_records(vec![
            record("A", 2000, CellValue::Number(1.0)),
            other,
        ])
        .without_category("Other");
        assert_eq!(ds.len(), 1);
        assert!(!ds.categories.contains("Other"));
    }

    #[test]
    fn test_overview() {
        let records = vec![
            record("A", 2000, CellValue::Number(10.0)),
            record("B", 2001, CellValue::Text("30".to_string())),
            record("B", 2002, CellValue::Null),
            record("C", 2002, CellValue::Number(-4.0)),
        ];
        let ov = DatasetOverview::of(&records);
        assert_eq!(ov.total_indicators, 3);
        assert_eq!(ov.total_records, 4);
        assert_eq!(ov.years_covered, 3);
        assert_eq!(ov.earliest_year, Some(2000));
        assert_eq!(ov.latest_year, Some(2002));
        assert_eq!(ov.mean_value, Some(12.0));
        assert_eq!(ov.highest.unwrap().indicator_name, "B");
        assert_eq!(ov.lowest.unwrap().indicator_name, "C");
    }

    #[test]
    fn test_overview_empty() {
        let ov = DatasetOverview::of(&[]);
        assert_eq!(ov.total_records, 0);
        assert!(ov.mean_value.is_none());
        assert!(ov.highest.is_none());
    }
}
