//! Ordinary least-squares trend of value on calendar year.
//!
//! The fallback forecaster: cheap, always defined for two or more distinct
//! years, and insensitive to gaps in the series because it regresses on the
//! actual year rather than on the observation index.

use serde::Serialize;

use crate::error::FitError;

/// Fitted line `value = intercept + slope * (year - year_mean)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearTrend {
    intercept: f64,
    slope: f64,
    year_mean: f64,
    r_squared: f64,
    n_observations: usize,
}

impl LinearTrend {
    /// Fit the trend on `(year, value)` pairs.
    pub fn fit(series: &[(i32, f64)]) -> Result<Self, FitError> {
        if series.len() < 2 {
            return Err(FitError::TooShort {
                required: 2,
                actual: series.len(),
            });
        }

        let n = series.len() as f64;
        // Centre the years so the normal equations stay well conditioned.
        let year_mean = series.iter().map(|&(y, _)| y as f64).sum::<f64>() / n;
        let value_mean = series.iter().map(|&(_, v)| v).sum::<f64>() / n;

        let mut sxx = 0.0;
        let mut sxy = 0.0;
        for &(year, value) in series {
            let dx = year as f64 - year_mean;
            sxx += dx * dx;
            sxy += dx * (value - value_mean);
        }

        if sxx.abs() < 1e-10 {
            return Err(FitError::Numerical(
                "Singular design: all observations share one year".to_string(),
            ));
        }

        let slope = sxy / sxx;
        let intercept = value_mean;
        if !slope.is_finite() || !intercept.is_finite() {
            return Err(FitError::Numerical("Non-finite regression coefficients".to_string()));
        }

        let ss_tot: f64 = series.iter().map(|&(_, v)| (v - value_mean).powi(2)).sum();
        let ss_res: f64 = series
            .iter()
            .map(|&(y, v)| (v - (intercept + slope * (y as f64 - year_mean))).powi(2))
            .sum();
        let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 1.0 };

        Ok(Self {
            intercept,
            slope,
            year_mean,
            r_squared,
            n_observations: series.len(),
        })
    }

    /// Value of the trend line at `year`.
    pub fn predict_year(&self, year: i32) -> f64 {
        self.intercept + self.slope * (year as f64 - self.year_mean)
    }

    /// Change per year.
    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn r_squared(&self) -> f64 {
        self.r_squared
    }

    pub fn n_observations(&self) -> usize {
        self.n_observations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_line() {
        let series = [(2010, 10.0), (2011, 12.0), (2012, 14.0), (2013, 16.0)];
        let trend = LinearTrend::fit(&series).unwrap();
        assert!((trend.slope() - 2.0).abs() < 1e-12);
        assert!((trend.predict_year(2019) - 28.0).abs() < 1e-9);
        assert!((trend.r_squared() - 1.0).abs() < 1e-12);
        assert_eq!(trend.n_observations(), 4);
    }

    #[test]
    fn test_gapped_years() {
        // Regression is on the year, not on the position.
        let series = [(2000, 0.0), (2010, 10.0)];
        let trend = LinearTrend::fit(&series).unwrap();
        assert!((trend.predict_year(2011) - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_flat_series() {
        let trend = LinearTrend::fit(&[(2000, 5.0), (2001, 5.0), (2002, 5.0)]).unwrap();
        assert_eq!(trend.slope(), 0.0);
        assert_eq!(trend.r_squared(), 1.0);
        assert_eq!(trend.predict_year(2030), 5.0);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(matches!(
            LinearTrend::fit(&[(2000, 1.0)]),
            Err(FitError::TooShort { required: 2, actual: 1 })
        ));
        assert!(matches!(
            LinearTrend::fit(&[(2000, 1.0), (2000, 2.0)]),
            Err(FitError::Numerical(_))
        ));
    }
}
