//! Penalized least squares
//!
//! The forecasting models are fitted as a sequence of ridge-type problems
//! `min ||y - X·b||² + Σ λ_j b_j²`, each solved through the normal equations
//! with a Cholesky factorization.

use crate::{MathError, Result};
use nalgebra::{DMatrix, DVector};

/// Relative diagonal jitter tried when the normal equations are not positive definite
const JITTER_STEPS: [f64; 3] = [1e-10, 1e-8, 1e-6];

/// Build a dense design matrix from row-major feature rows.
pub fn design_matrix(rows: &[Vec<f64>], columns: usize) -> Result<DMatrix<f64>> {
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns) {
        return Err(MathError::InvalidInput(format!(
            "Design row {} has {} columns, expected {}",
            i,
            row.len(),
            columns
        )));
    }

    Ok(DMatrix::from_fn(rows.len(), columns, |i, j| rows[i][j]))
}

/// Solve `min ||target - design·b||² + Σ penalties_j · b_j²`.
pub fn penalized_least_squares(
    design: &DMatrix<f64>,
    target: &DVector<f64>,
    penalties: &[f64],
) -> Result<DVector<f64>> {
    let (n, p) = design.shape();
    if n == 0 || p == 0 {
        return Err(MathError::InsufficientData(
            "Empty design matrix".to_string(),
        ));
    }
    if target.len() != n {
        return Err(MathError::InvalidInput(format!(
            "Target has {} rows, design has {}",
            target.len(),
            n
        )));
    }
    if penalties.len() != p {
        return Err(MathError::InvalidInput(format!(
            "Expected {} penalties, got {}",
            p,
            penalties.len()
        )));
    }
    if penalties.iter().any(|l| !l.is_finite() || *l < 0.0) {
        return Err(MathError::InvalidInput(
            "Penalties must be finite and non-negative".to_string(),
        ));
    }

    let mut gram = design.tr_mul(design);
    for (j, lambda) in penalties.iter().enumerate() {
        gram[(j, j)] += lambda;
    }
    let rhs = design.tr_mul(target);

    if let Some(chol) = gram.clone().cholesky() {
        return Ok(chol.solve(&rhs));
    }

    let scale = (gram.trace() / p as f64).abs().max(1.0);
    for jitter in JITTER_STEPS {
        let mut regularized = gram.clone();
        for j in 0..p {
            regularized[(j, j)] += jitter * scale;
        }
        if let Some(chol) = regularized.cholesky() {
            return Ok(chol.solve(&rhs));
        }
    }

    Err(MathError::CalculationError(
        "Normal equations are not positive definite".to_string(),
    ))
}

/// Multiply each row of `design` by the matching entry of `weights`.
pub fn scale_rows(design: &DMatrix<f64>, weights: &[f64]) -> Result<DMatrix<f64>> {
    if weights.len() != design.nrows() {
        return Err(MathError::InvalidInput(format!(
            "Expected {} row weights, got {}",
            design.nrows(),
            weights.len()
        )));
    }

    let mut scaled = design.clone();
    for (i, w) in weights.iter().enumerate() {
        let mut row = scaled.row_mut(i);
        row *= *w;
    }
    Ok(scaled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn recovers_exact_line_without_penalty() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![1.0, i as f64]).collect();
        let x = design_matrix(&rows, 2).unwrap();
        let y = DVector::from_iterator(10, (0..10).map(|i| 3.0 + 2.0 * i as f64));

        let b = penalized_least_squares(&x, &y, &[0.0, 0.0]).unwrap();
        assert_relative_eq!(b[0], 3.0, epsilon = 1e-9);
        assert_relative_eq!(b[1], 2.0, epsilon = 1e-9);
    }

    #[test]
    fn penalty_shrinks_towards_zero() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let x = design_matrix(&rows, 1).unwrap();
        let y = DVector::from_iterator(10, (0..10).map(|i| 2.0 * i as f64));

        let free = penalized_least_squares(&x, &y, &[0.0]).unwrap();
        let shrunk = penalized_least_squares(&x, &y, &[1000.0]).unwrap();
        assert!(shrunk[0].abs() < free[0].abs());
    }

    #[test]
    fn penalty_makes_collinear_design_solvable() {
        // Two identical columns
        let rows: Vec<Vec<f64>> = (0..5).map(|i| vec![i as f64, i as f64]).collect();
        let x = design_matrix(&rows, 2).unwrap();
        let y = DVector::from_iterator(5, (0..5).map(|i| i as f64));

        let b = penalized_least_squares(&x, &y, &[1e-6, 1e-6]).unwrap();
        assert_relative_eq!(b[0], b[1], epsilon = 1e-6);
        assert_relative_eq!(b[0] + b[1], 1.0, epsilon = 1e-4);
    }

    #[test]
    fn shape_mismatches_are_rejected() {
        assert!(design_matrix(&[vec![1.0], vec![1.0, 2.0]], 1).is_err());

        let x = design_matrix(&[vec![1.0], vec![2.0]], 1).unwrap();
        let y = DVector::from_vec(vec![1.0, 2.0]);
        assert!(penalized_least_squares(&x, &y, &[0.0, 1.0]).is_err());
        assert!(penalized_least_squares(&x, &y, &[-1.0]).is_err());
    }

    #[test]
    fn rows_are_scaled() {
        let x = design_matrix(&[vec![1.0, 2.0], vec![3.0, 4.0]], 2).unwrap();
        let scaled = scale_rows(&x, &[2.0, 0.5]).unwrap();
        assert_relative_eq!(scaled[(0, 1)], 4.0);
        assert_relative_eq!(scaled[(1, 0)], 1.5);
    }
}
