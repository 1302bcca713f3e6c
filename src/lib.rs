//! # health-trends
//!
//! Classification, filtering, aggregation and forecasting of national health
//! indicators, as consumed by a statistics dashboard.
//!
//! ```rust
//! use health_trends::prelude::*;
//!
//! let table = CategoryTable::builtin();
//! assert_eq!(table.classify("Population, female"), "Population Health and Demographics");
//!
//! let series = [(2010, 10.0), (2011, 12.0), (2012, 14.0), (2013, 16.0), (2014, 18.0)];
//! let outcome = forecast(&series, &ForecastConfig::default()).unwrap();
//! assert_eq!(outcome.result().unwrap().forecast.len(), 5);
//! ```

pub mod aggregate;
pub mod category;
pub mod data;
pub mod error;
pub mod forecast;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::aggregate::{
        by_category_year, by_indicator_year, indicator_series, summarize_categories,
        AggregatedSummary, Statistic,
    };
    pub use crate::category::{CategoryTable, OTHER_CATEGORY};
    pub use crate::data::filter::{apply, FilterCriteria, SortOrder, YearRange};
    pub use crate::data::model::{CellValue, HealthDataset, IndicatorRecord, RawRow};
    pub use crate::error::{ConfigError, FitError, ForecastError};
    pub use crate::forecast::arima::ArimaOrder;
    pub use crate::forecast::{
        forecast, forecast_indicators, ForecastConfig, ForecastOutcome, ForecastResult,
        ModelKind,
    };
}
