use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::model::{HealthDataset, IndicatorRecord};

// ---------------------------------------------------------------------------
// Filter criteria
// ---------------------------------------------------------------------------

/// Year range used when a dataset has no years to span.
pub const DEFAULT_YEAR_RANGE: YearRange = YearRange {
    min: 2000,
    max: 2023,
};

/// Inclusive year range. A range with `min > max` matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub min: i32,
    pub max: i32,
}

impl YearRange {
    pub fn new(min: i32, max: i32) -> Self {
        YearRange { min, max }
    }

    pub fn contains(&self, year: i32) -> bool {
        self.min <= year && year <= self.max
    }

    /// A range covering every year.
    pub fn all() -> Self {
        YearRange {
            min: i32::MIN,
            max: i32::MAX,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// User-chosen selection over a record set.
///
/// Every dimension has an explicit "unfiltered" state: `None` for the
/// keyword, an empty set for categories and indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub years: YearRange,
    /// Case-insensitive substring of the indicator name.
    pub keyword: Option<String>,
    pub categories: BTreeSet<String>,
    pub indicators: BTreeSet<String>,
    pub sort: SortOrder,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        FilterCriteria {
            years: YearRange::all(),
            keyword: None,
            categories: BTreeSet::new(),
            indicators: BTreeSet::new(),
            sort: SortOrder::Ascending,
        }
    }
}

impl FilterCriteria {
    /// Criteria selecting the whole dataset, in ascending year order.
    pub fn spanning(dataset: &HealthDataset) -> Self {
        let years = dataset
            .year_span()
            .map(|(min, max)| YearRange::new(min, max))
            .unwrap_or(DEFAULT_YEAR_RANGE);
        FilterCriteria {
            years,
            ..Self::default()
        }
    }

    pub fn with_years(mut self, min: i32, max: i32) -> Self {
        self.years = YearRange::new(min, max);
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_indicators<I, S>(mut self, indicators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indicators = indicators.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Return indices of records passing all active filters, in output order.
///
/// Filters run in a fixed order (year range, indicator selection, keyword,
/// category selection) and the survivors are stably sorted by year according
/// to `criteria.sort`, ties broken by indicator name ascending.
pub fn filtered_indices(records: &[IndicatorRecord], criteria: &FilterCriteria) -> Vec<usize> {
    let keyword = criteria.keyword.as_deref().map(str::to_lowercase);

    let mut indices: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, rec)| criteria.years.contains(rec.year))
        .filter(|(_, rec)| {
            criteria.indicators.is_empty() || criteria.indicators.contains(&rec.indicator_name)
        })
        .filter(|(_, rec)| match &keyword {
            Some(kw) => rec.indicator_name.to_lowercase().contains(kw.as_str()),
            None => true,
        })
        .filter(|(_, rec)| {
            criteria.categories.is_empty() || criteria.categories.contains(&rec.category)
        })
        .map(|(i, _)| i)
        .collect();

    // `sort_by` is stable, so equal (year, name) keys keep input order.
    indices.sort_by(|&a, &b| {
        let (ra, rb) = (&records[a], &records[b]);
        let by_year = match criteria.sort {
            SortOrder::Ascending => ra.year.cmp(&rb.year),
            SortOrder::Descending => rb.year.cmp(&ra.year),
        };
        by_year.then_with(|| ra.indicator_name.cmp(&rb.indicator_name))
    });

    indices
}

/// Filter and order `records`, returning a new sequence.
pub fn apply(records: &[IndicatorRecord], criteria: &FilterCriteria) -> Vec<IndicatorRecord> {
    let out: Vec<IndicatorRecord> = filtered_indices(records, criteria)
        .into_iter()
        .map(|i| records[i].clone())
        .collect();
    log::debug!("Filter kept {} of {} records", out.len(), records.len());
    out
}
