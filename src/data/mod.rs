//! Data layer: core types, loading, and filtering.
//!
//! Architecture:
//! ```text
//!  .csv / .json / .parquet
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse file → Vec<RawRow>
//!   └──────────┘
//!        │  CategoryTable::classify_rows
//!        ▼
//!   ┌───────────────┐
//!   │ HealthDataset  │  Vec<IndicatorRecord>, indicator/category/year index
//!   └───────────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  filter   │  FilterCriteria → ordered subset
//!   └──────────┘
//! ```

pub mod filter;
pub mod loader;
pub mod model;
