//! Bounded Nelder–Mead minimiser used to fit model coefficients.

use std::time::Instant;

use crate::error::FitError;

/// Derivative-free simplex search with an iteration cap and an optional
/// wall-clock deadline.
#[derive(Debug, Clone)]
pub struct NelderMead {
    max_iterations: usize,
    tolerance: f64,
    initial_step: f64,
    deadline: Option<Instant>,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            tolerance: 1e-10,
            initial_step: 0.5,
            deadline: None,
        }
    }
}

/// Best point found by a converged search.
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
}

impl NelderMead {
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..Self::default()
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_initial_step(mut self, step: f64) -> Self {
        self.initial_step = step;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Minimise `f` starting from `start`.
    ///
    /// Converges when the objective spread across the simplex falls below
    /// the relative tolerance. Non-finite objective values away from the
    /// starting point are treated as `+inf`.
    pub fn minimize<F>(&self, f: F, start: &[f64]) -> Result<Minimum, FitError>
    where
        F: Fn(&[f64]) -> f64,
    {
        let eval = |x: &[f64]| {
            let v = f(x);
            if v.is_finite() {
                v
            } else {
                f64::INFINITY
            }
        };

        let first = f(start);
        if !first.is_finite() {
            return Err(FitError::NonFiniteObjective);
        }

        let n = start.len();
        if n == 0 {
            return Ok(Minimum {
                point: Vec::new(),
                value: first,
                iterations: 0,
            });
        }

        let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
        let mut values: Vec<f64> = Vec::with_capacity(n + 1);
        simplex.push(start.to_vec());
        values.push(first);
        for i in 0..n {
            let mut vertex = start.to_vec();
            vertex[i] += self.initial_step;
            values.push(eval(&vertex));
            simplex.push(vertex);
        }

        for iteration in 0..self.max_iterations {
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    return Err(FitError::Timeout { iterations: iteration });
                }
            }

            // Order vertices best → worst.
            let mut order: Vec<usize> = (0..=n).collect();
            order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
            simplex = order.iter().map(|&i| simplex[i].clone()).collect();
            values = order.iter().map(|&i| values[i]).collect();

            let best = values[0];
            let worst = values[n];
            if (worst - best).abs() <= self.tolerance * (best.abs() + self.tolerance) {
                return Ok(Minimum {
                    point: simplex.swap_remove(0),
                    value: best,
                    iterations: iteration,
                });
            }

            let centroid: Vec<f64> = (0..n)
                .map(|j| simplex[..n].iter().map(|v| v[j]).sum::<f64>() / n as f64)
                .collect();
            let along = |t: f64| -> Vec<f64> {
                centroid
                    .iter()
                    .zip(&simplex[n])
                    .map(|(c, w)| c + t * (c - w))
                    .collect()
            };

            let reflected = along(1.0);
            let f_reflected = eval(&reflected);

            if f_reflected < best {
                let expanded = along(2.0);
                let f_expanded = eval(&expanded);
                if f_expanded < f_reflected {
                    simplex[n] = expanded;
                    values[n] = f_expanded;
                } else {
                    simplex[n] = reflected;
                    values[n] = f_reflected;
                }
            } else if f_reflected < values[n - 1] {
                simplex[n] = reflected;
                values[n] = f_reflected;
            } else {
                let contracted = if f_reflected < worst {
                    along(0.5)
                } else {
                    along(-0.5)
                };
                let f_contracted = eval(&contracted);
                if f_contracted < f_reflected.min(worst) {
                    simplex[n] = contracted;
                    values[n] = f_contracted;
                } else {
                    // Shrink towards the best vertex.
                    let anchor = simplex[0].clone();
                    for i in 1..=n {
                        let shrunk: Vec<f64> = anchor
                            .iter()
                            .zip(&simplex[i])
                            .map(|(a, x)| a + 0.5 * (x - a))
                            .collect();
                        values[i] = eval(&shrunk);
                        simplex[i] = shrunk;
                    }
                }
            }
        }

        Err(FitError::NoConvergence {
            iterations: self.max_iterations,
        })
    }
}
