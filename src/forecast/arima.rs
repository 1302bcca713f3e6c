//! ARIMA(p, d, q) fitted by conditional sum of squares.
//!
//! The series is differenced `d` times and centred on the mean of the
//! differenced values, which acts as the drift term. AR and MA coefficients
//! are found by minimising the conditional sum of squared one-step residuals
//! with a bounded [`NelderMead`] search. Each coefficient is reparameterised as
//! `0.99 * tanh(x)`, so every candidate stays inside (-0.99, 0.99).

use serde::{Deserialize, Serialize};

use crate::error::{FitError, ForecastError};
use crate::forecast::optimize::NelderMead;

const COEFF_BOUND: f64 = 0.99;

/// Model orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArimaOrder {
    /// AR order
    pub p: usize,
    /// Differencing order
    pub d: usize,
    /// MA order
    pub q: usize,
}

impl Default for ArimaOrder {
    fn default() -> Self {
        ArimaOrder { p: 1, d: 1, q: 1 }
    }
}

impl ArimaOrder {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        ArimaOrder { p, d, q }
    }

    /// Reject orders outside the supported range.
    pub fn validate(&self) -> Result<(), ForecastError> {
        let check = |name: &str, value: usize, max: usize| {
            if value > max {
                Err(ForecastError::InvalidConfig {
                    name: name.to_string(),
                    reason: format!("order must be <= {max}, got {value}"),
                })
            } else {
                Ok(())
            }
        };
        check("p", self.p, 3)?;
        check("d", self.d, 2)?;
        check("q", self.q, 3)
    }

    /// Smallest series length the fit accepts.
    pub fn min_observations(&self) -> usize {
        self.p + self.d + self.q + 2
    }
}

/// A fitted ARIMA model.
#[derive(Debug, Clone)]
pub struct Arima {
    order: ArimaOrder,
    ar_coeffs: Vec<f64>,
    ma_coeffs: Vec<f64>,
    /// Mean of the differenced series.
    drift: f64,
    /// Last value of each differencing level, level 0 first.
    anchors: Vec<f64>,
    /// Centred differenced series.
    centred: Vec<f64>,
    residuals: Vec<f64>,
    iterations: usize,
}

impl Arima {
    /// Fit the model on an evenly spaced series.
    pub fn fit(order: ArimaOrder, data: &[f64], optimizer: &NelderMead) -> Result<Self, FitError> {
        let required = order.min_observations();
        if data.len() < required {
            return Err(FitError::TooShort {
                required,
                actual: data.len(),
            });
        }
        if data.iter().any(|x| !x.is_finite()) {
            return Err(FitError::Numerical(
                "Data contains NaN or infinite values".to_string(),
            ));
        }

        let mut anchors = Vec::with_capacity(order.d);
        let mut differenced = data.to_vec();
        for _ in 0..order.d {
            anchors.push(differenced[differenced.len() - 1]);
            differenced = difference(&differenced);
        }

        let drift = differenced.iter().sum::<f64>() / differenced.len() as f64;
        let centred: Vec<f64> = differenced.iter().map(|w| w - drift).collect();

        let (p, q) = (order.p, order.q);
        let objective = |x: &[f64]| {
            let coeffs = bounded(x);
            let residuals = css_residuals(&centred, &coeffs[..p], &coeffs[p..]);
            residuals[p..].iter().map(|e| e * e).sum::<f64>()
        };
        let minimum = optimizer.minimize(objective, &vec![0.0; p + q])?;

        let coeffs = bounded(&minimum.point);
        let ar_coeffs = coeffs[..p].to_vec();
        let ma_coeffs = coeffs[p..].to_vec();
        let residuals = css_residuals(&centred, &ar_coeffs, &ma_coeffs);

        log::debug!(
            "ARIMA{:?} fitted in {} iterations: ar={ar_coeffs:?} ma={ma_coeffs:?} css={:.6}",
            (p, order.d, q),
            minimum.iterations,
            minimum.value
        );

        Ok(Self {
            order,
            ar_coeffs,
            ma_coeffs,
            drift,
            anchors,
            centred,
            residuals,
            iterations: minimum.iterations,
        })
    }

    /// Point forecasts for the next `steps` periods.
    pub fn predict(&self, steps: usize) -> Result<Vec<f64>, FitError> {
        let mut history = self.centred.clone();
        let mut shocks = self.residuals.clone();

        let mut diffs = Vec::with_capacity(steps);
        for _ in 0..steps {
            let mut next = 0.0;
            for (i, phi) in self.ar_coeffs.iter().enumerate() {
                if let Some(z) = history.len().checked_sub(i + 1).map(|k| history[k]) {
                    next += phi * z;
                }
            }
            for (j, theta) in self.ma_coeffs.iter().enumerate() {
                if let Some(e) = shocks.len().checked_sub(j + 1).map(|k| shocks[k]) {
                    next += theta * e;
                }
            }
            history.push(next);
            // Future shocks have expectation zero.
            shocks.push(0.0);
            diffs.push(next + self.drift);
        }

        let forecasts = integrate(diffs, &self.anchors);
        if forecasts.iter().any(|v| !v.is_finite()) {
            return Err(FitError::Numerical("Forecast is not finite".to_string()));
        }
        Ok(forecasts)
    }

    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        &self.ar_coeffs
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        &self.ma_coeffs
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

fn bounded(x: &[f64]) -> Vec<f64> {
    x.iter().map(|v| COEFF_BOUND * v.tanh()).collect()
}

fn difference(data: &[f64]) -> Vec<f64> {
    data.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Undo `anchors.len()` levels of differencing.
fn integrate(mut values: Vec<f64>, anchors: &[f64]) -> Vec<f64> {
    for &anchor in anchors.iter().rev() {
        let mut level = anchor;
        for v in values.iter_mut() {
            level += *v;
            *v = level;
        }
    }
    values
}

/// One-step residuals of an ARMA model on a centred series, conditioning on
/// zero shocks before the first `p` observations.
fn css_residuals(z: &[f64], ar: &[f64], ma: &[f64]) -> Vec<f64> {
    let p = ar.len();
    let mut e = vec![0.0; z.len()];
    for t in p..z.len() {
        let mut predicted = 0.0;
        for (i, phi) in ar.iter().enumerate() {
            predicted += phi * z[t - 1 - i];
        }
        for (j, theta) in ma.iter().enumerate() {
            if t > j {
                predicted += theta * e[t - 1 - j];
            }
        }
        e[t] = z[t] - predicted;
    }
    e
}
