//! Predictive mean matching.
//!
//! Per draw, the regression coefficients are perturbed around their least
//! squares estimate (a Bayesian linear regression draw). Each missing cell's
//! prediction under the perturbed model is matched against the observed
//! rows' predictions under the estimate, and one of the closest donors
//! supplies the imputed value. Imputed values are therefore always values
//! that were actually observed.
//!
//! Categorical predictors enter the model through their underlying codes,
//! never their labels.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{ImputeError, Result};
use crate::settings::PmmSettings;

const PIVOT_TOLERANCE: f64 = 1e-10;

/// Model inputs over a column's rows.
#[derive(Debug, Clone)]
pub struct PmmInput<'a> {
    /// Coded target value per row; `None` where unobserved.
    pub target: &'a [Option<f64>],
    /// Coded values per predictor per row.
    pub predictors: &'a [(String, Vec<Option<f64>>)],
    /// Rows to impute.
    pub fill_rows: &'a [usize],
}

/// Donor row chosen for each fill row, from the selected draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PmmMatches {
    pub donors: Vec<(usize, usize)>,
}

fn mean(values: &[Option<f64>]) -> Option<f64> {
    let observed: Vec<f64> = values.iter().flatten().copied().collect();
    if observed.is_empty() {
        None
    } else {
        Some(observed.iter().sum::<f64>() / observed.len() as f64)
    }
}

/// Design matrix rows with an intercept; predictor gaps are mean-filled.
fn design_matrix(input: &PmmInput<'_>, settings: &PmmSettings) -> Result<Vec<Vec<f64>>> {
    let rows = input.target.len();
    let mut columns = Vec::with_capacity(input.predictors.len());
    for (name, values) in input.predictors {
        let covered = values.iter().filter(|v| v.is_some()).count();
        let coverage = if rows == 0 {
            0.0
        } else {
            covered as f64 / rows as f64
        };
        if coverage < settings.min_coverage {
            return Err(ImputeError::InsufficientCoverage {
                predictor: name.clone(),
                coverage,
                threshold: settings.min_coverage,
            });
        }
        let fill = mean(values).unwrap_or(0.0);
        columns.push(values.iter().map(|v| v.unwrap_or(fill)).collect::<Vec<f64>>());
    }
    Ok((0..rows)
        .map(|row| {
            std::iter::once(1.0)
                .chain(columns.iter().map(|column| column[row]))
                .collect()
        })
        .collect())
}

/// Invert a square matrix by Gauss-Jordan elimination with partial pivoting.
fn invert(matrix: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = matrix.len();
    let mut a: Vec<Vec<f64>> = matrix.to_vec();
    let mut inv: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();
    for col in 0..n {
        let pivot = (col..n).max_by(|&x, &y| a[x][col].abs().total_cmp(&a[y][col].abs()))?;
        if a[pivot][col].abs() < PIVOT_TOLERANCE {
            return None;
        }
        a.swap(col, pivot);
        inv.swap(col, pivot);
        let scale = a[col][col];
        for j in 0..n {
            a[col][j] /= scale;
            inv[col][j] /= scale;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[row][col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                a[row][j] -= factor * a[col][j];
                inv[row][j] -= factor * inv[col][j];
            }
        }
    }
    Some(inv)
}

/// Lower-triangular Cholesky factor of a symmetric positive definite matrix.
fn cholesky(matrix: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = matrix.len();
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[i][k] * l[j][k]).sum();
            if i == j {
                let diagonal = matrix[i][i] - sum;
                if diagonal <= 0.0 {
                    return None;
                }
                l[i][j] = diagonal.sqrt();
            } else {
                l[i][j] = (matrix[i][j] - sum) / l[j][j];
            }
        }
    }
    Some(l)
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Standard normal deviate (Box-Muller).
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = 1.0 - rng.r#gen::<f64>();
    let u2: f64 = rng.r#gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

struct Fit {
    beta: Vec<f64>,
    sigma: f64,
    degrees: usize,
    covariance_factor: Vec<Vec<f64>>,
}

fn fit(x: &[Vec<f64>], y: &[f64]) -> Result<Fit> {
    let n = x.len();
    let p = x.first().map_or(0, Vec::len);
    if n <= p {
        return Err(ImputeError::NotConverged(format!(
            "{n} observed rows for {p} coefficients"
        )));
    }
    let mut xtx = vec![vec![0.0; p]; p];
    let mut xty = vec![0.0; p];
    for (row, target) in x.iter().zip(y) {
        for i in 0..p {
            xty[i] += row[i] * target;
            for j in 0..p {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }
    let inverse = invert(&xtx)
        .ok_or_else(|| ImputeError::NotConverged("singular design matrix".to_string()))?;
    let beta: Vec<f64> = inverse.iter().map(|row| dot(row, &xty)).collect();
    let rss: f64 = x
        .iter()
        .zip(y)
        .map(|(row, target)| (target - dot(row, &beta)).powi(2))
        .sum();
    let degrees = n - p;
    let covariance_factor = cholesky(&inverse).ok_or_else(|| {
        ImputeError::NotConverged("coefficient covariance is not positive definite".to_string())
    })?;
    Ok(Fit {
        beta,
        sigma: (rss / degrees as f64).sqrt(),
        degrees,
        covariance_factor,
    })
}

fn perturbed_beta(fit: &Fit, rng: &mut StdRng) -> Vec<f64> {
    let chi_square: f64 = (0..fit.degrees)
        .map(|_| standard_normal(rng).powi(2))
        .sum();
    let sigma = if chi_square > 0.0 {
        fit.sigma * (fit.degrees as f64 / chi_square).sqrt()
    } else {
        fit.sigma
    };
    let z: Vec<f64> = (0..fit.beta.len()).map(|_| standard_normal(rng)).collect();
    fit.beta
        .iter()
        .enumerate()
        .map(|(i, b)| b + sigma * dot(&fit.covariance_factor[i][..=i], &z[..=i]))
        .collect()
}

/// Choose one donor row per fill row.
pub fn match_donors(input: &PmmInput<'_>, settings: &PmmSettings) -> Result<PmmMatches> {
    if settings.draws == 0 || settings.donors == 0 {
        return Err(ImputeError::Config(
            "draws and donors must be positive".to_string(),
        ));
    }
    if settings.selected_draw >= settings.draws {
        return Err(ImputeError::Config(format!(
            "selected draw {} of {} draws",
            settings.selected_draw, settings.draws
        )));
    }
    let design = design_matrix(input, settings)?;
    let observed: Vec<usize> = (0..input.target.len())
        .filter(|row| input.target[*row].is_some())
        .collect();
    if observed.is_empty() {
        return Err(ImputeError::NoObserved);
    }
    let x: Vec<Vec<f64>> = observed.iter().map(|row| design[*row].clone()).collect();
    let y: Vec<f64> = observed
        .iter()
        .filter_map(|row| input.target[*row])
        .collect();
    let fit = fit(&x, &y)?;
    let observed_predictions: Vec<f64> = x.iter().map(|row| dot(row, &fit.beta)).collect();

    let mut rng = StdRng::seed_from_u64(settings.seed);
    let mut selected = Vec::new();
    for draw in 0..settings.draws {
        let beta = perturbed_beta(&fit, &mut rng);
        let mut donors = Vec::with_capacity(input.fill_rows.len());
        for &row in input.fill_rows {
            let prediction = dot(&design[row], &beta);
            let mut ranked: Vec<(f64, usize)> = observed_predictions
                .iter()
                .enumerate()
                .map(|(idx, predicted)| ((predicted - prediction).abs(), idx))
                .collect();
            ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            let pool = settings.donors.min(ranked.len());
            let pick = ranked[rng.gen_range(0..pool)].1;
            donors.push((row, observed[pick]));
        }
        if draw == settings.selected_draw {
            selected = donors;
        }
    }
    Ok(PmmMatches { donors: selected })
}
