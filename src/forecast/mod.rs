//! Per-indicator forecasting.
//!
//! ```text
//!  (year, value) series
//!        │  drop non-finite, average duplicate years, sort
//!        ▼
//!   < 2 years ──────────────► InsufficientData
//!   < min_primary_years ────► linear fallback
//!   otherwise ──► ARIMA(p,d,q) ──fit error / timeout──► linear fallback
//!                     │
//!                     ▼
//!                  Primary
//! ```
//!
//! The choice of model is visible in the [`ForecastOutcome`] variant; a
//! failed primary fit is not an error for the caller.

pub mod arima;
pub mod linear;
pub mod optimize;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;

use crate::aggregate::indicator_series;
use crate::data::model::IndicatorRecord;
use crate::error::{FitError, ForecastError, Result};

use arima::{Arima, ArimaOrder};
use linear::LinearTrend;
use optimize::NelderMead;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Longest projection accepted by [`ForecastConfig::validate`].
pub const MAX_HORIZON: usize = 100;

#[derive(Debug, Clone)]
pub struct ForecastConfig {
    /// Number of years projected past the last historical year.
    pub horizon: usize,
    pub order: ArimaOrder,
    /// Series shorter than this skip the primary model.
    pub min_primary_years: usize,
    /// Iteration cap of the coefficient search.
    pub max_iterations: usize,
    /// Wall-clock budget of one primary fit. A budget too large to
    /// represent as a deadline means no deadline.
    pub time_budget: Duration,
    /// Relative convergence tolerance of the coefficient search.
    pub tolerance: f64,
    /// Size of the first simplex step, in unbounded coefficient space.
    pub initial_step: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon: 5,
            order: ArimaOrder::default(),
            min_primary_years: 5,
            max_iterations: 500,
            time_budget: Duration::from_millis(250),
            tolerance: 1e-10,
            initial_step: 0.5,
        }
    }
}

impl ForecastConfig {
    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn with_order(mut self, order: ArimaOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_initial_step(mut self, step: f64) -> Self {
        self.initial_step = step;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &str, reason: String| ForecastError::InvalidConfig {
            name: name.to_string(),
            reason,
        };
        if self.horizon == 0 || self.horizon > MAX_HORIZON {
            return Err(invalid(
                "horizon",
                format!("must be between 1 and {MAX_HORIZON}"),
            ));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(invalid("tolerance", "must be positive".to_string()));
        }
        if !(self.initial_step.is_finite() && self.initial_step > 0.0) {
            return Err(invalid("initial_step", "must be positive".to_string()));
        }
        self.order.validate()
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearValue {
    pub year: i32,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResult {
    /// De-duplicated input series, ascending by year.
    pub historical: Vec<YearValue>,
    pub model: ModelKind,
    /// Exactly `horizon` consecutive years after the last historical year.
    pub forecast: Vec<YearValue>,
    /// Change from the last historical to the last forecast value, in
    /// percent. `None` when the last historical value is zero.
    pub percent_change: Option<f64>,
}

impl ForecastResult {
    fn new(historical: Vec<YearValue>, model: ModelKind, values: Vec<f64>) -> Self {
        let last = historical[historical.len() - 1];
        let forecast: Vec<YearValue> = values
            .into_iter()
            .zip(1..)
            .map(|(value, step)| YearValue {
                year: last.year + step,
                value,
            })
            .collect();
        let percent_change = match forecast.last() {
            Some(f) if last.value != 0.0 => Some((f.value - last.value) / last.value * 100.0),
            _ => None,
        };
        ForecastResult {
            historical,
            model,
            forecast,
            percent_change,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ForecastOutcome {
    Primary(ForecastResult),
    Fallback {
        result: ForecastResult,
        /// Why the primary model was not used.
        reason: FitError,
    },
    InsufficientData {
        usable_years: usize,
    },
}

impl ForecastOutcome {
    pub fn result(&self) -> Option<&ForecastResult> {
        match self {
            ForecastOutcome::Primary(result) | ForecastOutcome::Fallback { result, .. } => {
                Some(result)
            }
            ForecastOutcome::InsufficientData { .. } => None,
        }
    }

    pub fn model_kind(&self) -> Option<ModelKind> {
        self.result().map(|r| r.model)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Drop non-finite values, average values sharing a year, sort by year.
pub fn prepare_series(series: &[(i32, f64)]) -> Vec<YearValue> {
    let mut by_year: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
    for &(year, value) in series.iter().filter(|(_, v)| v.is_finite()) {
        let slot = by_year.entry(year).or_insert((0.0, 0));
        slot.0 += value;
        slot.1 += 1;
    }
    by_year
        .into_iter()
        .map(|(year, (sum, n))| YearValue {
            year,
            value: sum / n as f64,
        })
        .collect()
}

/// Forecast one indicator's yearly series.
pub fn forecast(series: &[(i32, f64)], config: &ForecastConfig) -> Result<ForecastOutcome> {
    config.validate()?;

    let historical = prepare_series(series);
    if historical.len() < 2 {
        return Ok(ForecastOutcome::InsufficientData {
            usable_years: historical.len(),
        });
    }

    // `validate` bounds the horizon, so only the year arithmetic can fail.
    let last_year = historical[historical.len() - 1].year;
    let Some(steps) = i32::try_from(config.horizon)
        .ok()
        .filter(|&n| last_year.checked_add(n).is_some())
    else {
        return Err(ForecastError::InvalidConfig {
            name: "horizon".to_string(),
            reason: format!(
                "{} years after {last_year} is past the last representable year",
                config.horizon
            ),
        });
    };

    match fit_primary(&historical, config) {
        Ok(values) => Ok(ForecastOutcome::Primary(ForecastResult::new(
            historical,
            ModelKind::Primary,
            values,
        ))),
        Err(reason) => {
            log::info!("Using linear fallback: {reason}");
            let values = fit_fallback(&historical, steps)?;
            Ok(ForecastOutcome::Fallback {
                result: ForecastResult::new(historical, ModelKind::Fallback, values),
                reason,
            })
        }
    }
}

fn fit_primary(historical: &[YearValue], config: &ForecastConfig) -> std::result::Result<Vec<f64>, FitError> {
    if historical.len() < config.min_primary_years {
        return Err(FitError::TooShort {
            required: config.min_primary_years,
            actual: historical.len(),
        });
    }

    let mut optimizer = NelderMead::new(config.max_iterations)
        .with_tolerance(config.tolerance)
        .with_initial_step(config.initial_step);
    if let Some(deadline) = Instant::now().checked_add(config.time_budget) {
        optimizer = optimizer.with_deadline(deadline);
    }
    let values: Vec<f64> = historical.iter().map(|p| p.value).collect();
    let model = Arima::fit(config.order, &values, &optimizer)?;
    let order = model.order();
    log::debug!(
        "ARIMA({},{},{}) fitted in {} iterations: ar {:?}, ma {:?}",
        order.p,
        order.d,
        order.q,
        model.iterations(),
        model.ar_coefficients(),
        model.ma_coefficients()
    );
    model.predict(config.horizon)
}

fn fit_fallback(historical: &[YearValue], horizon: i32) -> Result<Vec<f64>> {
    let pairs: Vec<(i32, f64)> = historical.iter().map(|p| (p.year, p.value)).collect();
    let trend = LinearTrend::fit(&pairs).map_err(|e| ForecastError::FallbackFailed(e.to_string()))?;
    log::debug!(
        "Linear trend over {} years: slope {:.4}, r² {:.3}",
        trend.n_observations(),
        trend.slope(),
        trend.r_squared()
    );
    let last_year = pairs[pairs.len() - 1].0;
    let values: Vec<f64> = (1..=horizon)
        .map(|step| trend.predict_year(last_year + step))
        .collect();
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ForecastError::FallbackFailed(
            "trend produced non-finite values".to_string(),
        ));
    }
    Ok(values)
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// Forecast of one indicator within a batch.
#[derive(Debug, Clone)]
pub struct IndicatorForecast {
    pub indicator: String,
    pub outcome: Result<ForecastOutcome>,
}

/// Forecast every indicator in `indicators` from `records`, in parallel.
///
/// Each indicator succeeds or fails on its own; results follow the order of
/// `indicators`.
pub fn forecast_indicators(
    records: &[IndicatorRecord],
    indicators: &[String],
    config: &ForecastConfig,
) -> Vec<IndicatorForecast> {
    indicators
        .par_iter()
        .map(|name| {
            let series = indicator_series(records, name);
            let outcome = forecast(&series, config);
            if let Err(e) = &outcome {
                log::warn!("Forecast for {name:?} failed: {e}");
            }
            IndicatorForecast {
                indicator: name.clone(),
                outcome,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::CellValue;

    fn linear_series() -> Vec<(i32, f64)> {
        vec![(2010, 10.0), (2011, 12.0), (2012, 14.0), (2013, 16.0), (2014, 18.0)]
    }

    #[test]
    fn test_linear_series_forecast() {
        let outcome = forecast(&linear_series(), &ForecastConfig::default()).unwrap();
        let result = outcome.result().unwrap();
        assert_eq!(result.forecast.len(), 5);
        assert!(result.forecast.windows(2).all(|w| w[0].value <= w[1].value));
        let last = result.forecast[4];
        assert_eq!(last.year, 2019);
        assert!((last.value - 28.0).abs() < 1e-6);
        let pct = result.percent_change.unwrap();
        assert!((pct - (28.0 - 18.0) / 18.0 * 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_single_point_is_insufficient() {
        let outcome = forecast(&[(2020, 4.0)], &ForecastConfig::default()).unwrap();
        assert_eq!(outcome, ForecastOutcome::InsufficientData { usable_years: 1 });
        assert!(outcome.result().is_none());
        assert!(outcome.model_kind().is_none());
    }

    #[test]
    fn test_duplicates_collapse_to_one_year() {
        let outcome = forecast(&[(2020, 4.0), (2020, 6.0)], &ForecastConfig::default()).unwrap();
        assert_eq!(outcome, ForecastOutcome::InsufficientData { usable_years: 1 });
    }

    #[test]
    fn test_short_series_uses_fallback() {
        let series = [(2000, 1.0), (2002, 5.0), (2001, 3.0)];
        let outcome = forecast(&series, &ForecastConfig::default().with_horizon(2)).unwrap();
        match outcome {
            ForecastOutcome::Fallback { result, reason } => {
                assert_eq!(result.model, ModelKind::Fallback);
                assert_eq!(
                    reason,
                    FitError::TooShort {
                        required: 5,
                        actual: 3
                    }
                );
                let years: Vec<i32> = result.historical.iter().map(|p| p.year).collect();
                assert_eq!(years, [2000, 2001, 2002]);
                assert_eq!(result.forecast.len(), 2);
                assert!((result.forecast[0].value - 7.0).abs() < 1e-9);
                assert!((result.forecast[1].value - 9.0).abs() < 1e-9);
            }
            other => panic!("expected fallback, got {other:?}"),
        }
    }

    #[test]
    fn test_timeout_falls_back() {
        let series: Vec<(i32, f64)> = (0..20)
            .map(|t| (1990 + t, 50.0 + t as f64 + (t as f64).cos()))
            .collect();
        let config = ForecastConfig::default().with_time_budget(Duration::ZERO);
        match forecast(&series, &config).unwrap() {
            ForecastOutcome::Fallback { result, reason } => {
                assert!(matches!(reason, FitError::Timeout { .. }));
                assert_eq!(result.forecast.len(), 5);
                assert_eq!(result.forecast[0].year, 2010);
            }
            other => panic!("expected fallback, got {other:?}"),
        }
    }

    #[test]
    fn test_iteration_cap_falls_back() {
        let series: Vec<(i32, f64)> = (0..20)
            .map(|t| (1990 + t, 50.0 + t as f64 + (t as f64).cos()))
            .collect();
        let config = ForecastConfig::default().with_max_iterations(0);
        let outcome = forecast(&series, &config).unwrap();
        assert_eq!(outcome.model_kind(), Some(ModelKind::Fallback));
    }

    #[test]
    fn test_primary_on_long_series() {
        let series: Vec<(i32, f64)> = (0..30)
            .map(|t| (1990 + t, 80.0 - 2.0 * t as f64 + (t as f64 * 0.9).sin()))
            .collect();
        let outcome = forecast(&series, &ForecastConfig::default().with_time_budget(Duration::from_secs(5)))
            .unwrap();
        assert_eq!(outcome.model_kind(), Some(ModelKind::Primary));
        let result = outcome.result().unwrap();
        assert_eq!(result.forecast.len(), 5);
        assert!(result.forecast[4].value < result.historical[29].value);
    }

    #[test]
    fn test_zero_last_value_has_no_percent_change() {
        let outcome = forecast(&[(2000, 2.0), (2001, 0.0)], &ForecastConfig::default()).unwrap();
        let result = outcome.result().unwrap();
        assert_eq!(result.forecast.len(), 5);
        assert!(result.percent_change.is_none());
    }

    #[test]
    fn test_non_finite_values_dropped() {
        let series = [(2000, 1.0), (2001, f64::NAN), (2002, 3.0)];
        let outcome = forecast(&series, &ForecastConfig::default()).unwrap();
        assert_eq!(outcome.result().unwrap().historical.len(), 2);
    }

    #[test]
    fn test_invalid_config() {
        let zero = ForecastConfig::default().with_horizon(0);
        assert!(matches!(
            forecast(&linear_series(), &zero),
            Err(ForecastError::InvalidConfig { .. })
        ));
        let order = ForecastConfig::default().with_order(ArimaOrder::new(1, 5, 1));
        assert!(forecast(&linear_series(), &order).is_err());
    }

    #[test]
    fn test_unbounded_time_budget_has_no_deadline() {
        let series: Vec<(i32, f64)> = (0..10).map(|t| (2000 + t, t as f64)).collect();
        let config = ForecastConfig::default().with_time_budget(Duration::MAX);
        assert!(config.validate().is_ok());
        let outcome = forecast(&series, &config).unwrap();
        assert_eq!(outcome.model_kind(), Some(ModelKind::Primary));
        assert_eq!(outcome.result().unwrap().forecast.len(), 5);
    }

    #[test]
    fn test_horizon_bounds() {
        for horizon in [MAX_HORIZON + 1, usize::MAX / 2 + 2, usize::MAX] {
            let config = ForecastConfig::default().with_horizon(horizon);
            assert!(matches!(
                forecast(&linear_series(), &config),
                Err(ForecastError::InvalidConfig { .. })
            ));
        }

        let config = ForecastConfig::default().with_horizon(MAX_HORIZON);
        let outcome = forecast(&[(2000, 1.0), (2001, 2.0)], &config).unwrap();
        let result = outcome.result().unwrap();
        assert_eq!(result.forecast.len(), MAX_HORIZON);
        assert_eq!(result.forecast[MAX_HORIZON - 1].year, 2001 + MAX_HORIZON as i32);
    }

    #[test]
    fn test_years_past_i32_max_rejected() {
        let series = [(i32::MAX - 3, 1.0), (i32::MAX - 2, 2.0)];
        assert!(matches!(
            forecast(&series, &ForecastConfig::default()),
            Err(ForecastError::InvalidConfig { .. })
        ));

        let outcome = forecast(&series, &ForecastConfig::default().with_horizon(2)).unwrap();
        let years: Vec<i32> = outcome.result().unwrap().forecast.iter().map(|p| p.year).collect();
        assert_eq!(years, [i32::MAX - 1, i32::MAX]);
    }

    #[test]
    fn test_search_settings_validated() {
        for config in [
            ForecastConfig::default().with_tolerance(0.0),
            ForecastConfig::default().with_tolerance(f64::NAN),
            ForecastConfig::default().with_initial_step(-1.0),
        ] {
            assert!(config.validate().is_err());
        }
        let coarse = ForecastConfig::default()
            .with_tolerance(1e-4)
            .with_initial_step(0.1)
            .with_time_budget(Duration::from_secs(5));
        let outcome = forecast(&linear_series(), &coarse).unwrap();
        assert_eq!(outcome.result().unwrap().forecast.len(), 5);
    }

    #[test]
    fn test_batch_isolates_indicators() {
        let rec = |name: &str, year: i32, value: f64| IndicatorRecord {
            country: "Sri Lanka".to_string(),
            indicator_name: name.to_string(),
            indicator_code: "CODE".to_string(),
            year,
            value: CellValue::Number(value),
            category: "Mortality Rates".to_string(),
        };
        let mut records: Vec<IndicatorRecord> = (0..6)
            .map(|t| rec("Trend", 2000 + t, 10.0 + 2.0 * t as f64))
            .collect();
        records.push(rec("Sparse", 2010, 1.0));

        let names = vec!["Sparse".to_string(), "Trend".to_string(), "Absent".to_string()];
        let out = forecast_indicators(&records, &names, &ForecastConfig::default());
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].indicator, "Sparse");
        assert!(matches!(
            out[0].outcome,
            Ok(ForecastOutcome::InsufficientData { usable_years: 1 })
        ));
        let trend = out[1].outcome.as_ref().unwrap().result().unwrap();
        assert_eq!(trend.forecast.len(), 5);
        assert!(matches!(
            out[2].outcome,
            Ok(ForecastOutcome::InsufficientData { usable_years: 0 })
        ));
    }

    #[test]
    fn test_outcome_serializes_with_tag() {
        let outcome = forecast(&[(2000, 1.0), (2001, 2.0)], &ForecastConfig::default()).unwrap();
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "fallback");
        assert_eq!(json["result"]["model"], "fallback");
        assert_eq!(json["result"]["forecast"].as_array().unwrap().len(), 5);
    }
}
