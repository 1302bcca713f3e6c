//! Indicator → category classification.
//!
//! A [`CategoryTable`] is built once at start-up and then only read. It keeps
//! the categories in declaration order together with a reverse index from
//! indicator name to category, so classification is a single hash lookup.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::data::model::{IndicatorRecord, RawRow};
use crate::error::ConfigError;

/// Label assigned to indicators that no category claims.
pub const OTHER_CATEGORY: &str = "Other";

/// One category and its indicator names, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub indicators: Vec<String>,
}

/// Ordered, immutable mapping from category name to indicator names.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    categories: Vec<Category>,
    /// indicator name → position in `categories`
    index: HashMap<String, usize>,
}

/// Array form of the JSON configuration.
#[derive(Debug, Deserialize)]
struct CategoryEntry {
    category: String,
    indicators: Vec<String>,
}

impl CategoryTable {
    /// Build a table, rejecting any indicator listed under two categories.
    pub fn new<I, C, L, S>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (C, L)>,
        C: Into<String>,
        L: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::build(entries, true)
    }

    /// Build a table that tolerates overlapping categories.
    ///
    /// An indicator listed under several categories belongs to the first one
    /// declared (first match wins).
    pub fn with_first_match<I, C, L, S>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (C, L)>,
        C: Into<String>,
        L: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::build(entries, false)
    }

    fn build<I, C, L, S>(entries: I, strict: bool) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (C, L)>,
        C: Into<String>,
        L: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut categories: Vec<Category> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for (name, indicators) in entries {
            let name: String = name.into();
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidCategory {
                    name,
                    reason: "name is empty".to_string(),
                });
            }
            if name == OTHER_CATEGORY {
                return Err(ConfigError::InvalidCategory {
                    name,
                    reason: "reserved for unclassified indicators".to_string(),
                });
            }
            if categories.iter().any(|c| c.name == name) {
                return Err(ConfigError::DuplicateCategory(name));
            }

            let position = categories.len();
            let mut members = Vec::new();
            for indicator in indicators {
                let indicator: String = indicator.into();
                match index.get(&indicator) {
                    Some(&owner) if owner == position => continue,
                    Some(&owner) => {
                        let first = categories[owner].name.clone();
                        if strict {
                            return Err(ConfigError::DuplicateIndicator {
                                indicator,
                                first,
                                second: name,
                            });
                        }
                        log::warn!(
                            "Indicator {indicator:?} listed under {first:?} and {name:?}; keeping {first:?}"
                        );
                    }
                    None => {
                        index.insert(indicator.clone(), position);
                    }
                }
                members.push(indicator);
            }

            categories.push(Category {
                name,
                indicators: members,
            });
        }

        log::debug!(
            "Category table: {} categories, {} indicators",
            categories.len(),
            index.len()
        );

        Ok(CategoryTable { categories, index })
    }

    /// Parse a table from JSON.
    ///
    /// Two layouts are accepted:
    ///
    /// ```json
    /// { "Mortality Rates": ["Suicide mortality rate (per 100,000 population)"] }
    /// ```
    ///
    /// ```json
    /// [ { "category": "Mortality Rates", "indicators": ["..."] } ]
    /// ```
    ///
    /// Object key order is the declaration order.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let root: JsonValue = serde_json::from_str(text)?;
        let entries: Vec<(String, Vec<String>)> = match root {
            JsonValue::Object(map) => map
                .into_iter()
                .map(|(name, list)| Ok((name, serde_json::from_value(list)?)))
                .collect::<Result<_, serde_json::Error>>()?,
            other => serde_json::from_value::<Vec<CategoryEntry>>(other)?
                .into_iter()
                .map(|e| (e.category, e.indicators))
                .collect(),
        };
        Self::new(entries)
    }

    /// Read and parse a JSON table file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let table = Self::from_json_str(&text)?;
        log::info!(
            "Loaded {} categories from {}",
            table.categories.len(),
            path.display()
        );
        Ok(table)
    }

    /// The canonical health indicator table.
    pub fn builtin() -> Self {
        let table = Self::new(BUILTIN_CATEGORIES.iter().map(|(name, list)| (*name, list.iter().copied())));
        match table {
            Ok(table) => table,
            // The builtin table is static data covered by tests.
            Err(e) => unreachable!("builtin category table is invalid: {e}"),
        }
    }

    /// Category of `indicator_name`, or [`OTHER_CATEGORY`] when unlisted.
    ///
    /// Matching is exact and case-sensitive: surrounding whitespace or
    /// punctuation differences fall through to `"Other"`.
    pub fn classify(&self, indicator_name: &str) -> &str {
        self.index
            .get(indicator_name)
            .map(|&i| self.categories[i].name.as_str())
            .unwrap_or(OTHER_CATEGORY)
    }

    /// Annotate raw rows with their category.
    pub fn classify_rows(&self, rows: Vec<RawRow>) -> Vec<IndicatorRecord> {
        rows.into_iter()
            .map(|row| {
                let category = self.classify(&row.indicator_name).to_string();
                IndicatorRecord::from_row(row, category)
            })
            .collect()
    }

    /// Categories in declaration order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Indicators declared under `category`, `None` for an unknown category.
    pub fn indicators(&self, category: &str) -> Option<&[String]> {
        self.categories
            .iter()
            .find(|c| c.name == category)
            .map(|c| c.indicators.as_slice())
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

const BUILTIN_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Maternal and Child Health",
        &[
            "Adolescent fertility rate (births per 1,000 women ages 15-19)",
            "Birth rate, crude (per 1,000 people)",
            "Births attended by skilled health staff (% of total)",
            "Low-birthweight babies (% of births)",
            "Maternal mortality ratio (modeled estimate, per 100,000 live births)",
            "Infant mortality rate (per 1,000 live births)",
            "Exclusive breastfeeding (% of children under 6 months)",
        ],
    ),
    (
        "Infectious Diseases",
        &[
            "Adults (ages 15+) and children (ages 0-14) newly infected with HIV",
            "Incidence of HIV, all (per 1,000 uninfected population)",
            "Incidence of tuberculosis (per 100,000 people)",
            "Incidence of malaria (per 1,000 population at risk)",
            "Immunization, DPT (% of children ages 12-23 months)",
        ],
    ),
    (
        "Nutrition and Food Security",
        &[
            "Prevalence of anemia among children (% of children ages 6-59 months)",
            "Prevalence of stunting, height for age (% of children under 5)",
            "Prevalence of wasting, weight for height (% of children under 5)",
            "Prevalence of underweight, weight for age (% of children under 5)",
            "Prevalence of moderate or severe food insecurity in the population (%)",
        ],
    ),
    (
        "Health Expenditures",
        &[
            "Current health expenditure (% of GDP)",
            "Current health expenditure per capita (current US$)",
            "Domestic general government health expenditure (% of GDP)",
            "Domestic private health expenditure (% of current health expenditure)",
            "Out-of-pocket expenditure (% of current health expenditure)",
        ],
    ),
    (
        "Population Health and Demographics",
        &[
            "Life expectancy at birth, female (years)",
            "Life expectancy at birth, male (years)",
            "Population growth (annual %)",
            "Population, female",
            "Population, male",
            "Women who were first married by age 18 (% of women ages 20-24)",
        ],
    ),
    (
        "Mortality Rates",
        &[
            "Mortality rate, adult, female (per 1,000 female adults)",
            "Mortality rate, infant (per 1,000 live births)",
            "Mortality rate attributed to household and ambient air pollution, age-standardized (per 100,000 population)",
            "Suicide mortality rate (per 100,000 population)",
        ],
    ),
];
