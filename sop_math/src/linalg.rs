//! Dense penalised least squares for small design matrices

use crate::{MathError, Result};

/// Solve `min ||X b - y||^2 + sum_j penalties[j] * b_j^2`.
///
/// `design` holds one row per observation. The normal equations are solved
/// with a Cholesky factorisation, so the penalised Gram matrix must be
/// positive definite.
pub fn ridge_least_squares(design: &[Vec<f64>], y: &[f64], penalties: &[f64]) -> Result<Vec<f64>> {
    if design.is_empty() || design.len() != y.len() {
        return Err(MathError::InvalidInput(format!(
            "Design rows ({}) must match observations ({}) and be non-empty",
            design.len(),
            y.len()
        )));
    }

    let cols = design[0].len();
    if cols == 0 || penalties.len() != cols || design.iter().any(|row| row.len() != cols) {
        return Err(MathError::InvalidInput(
            "Design rows and penalties must share one non-zero width".to_string(),
        ));
    }

    let mut gram = vec![vec![0.0; cols]; cols];
    let mut rhs = vec![0.0; cols];
    for (row, &target) in design.iter().zip(y) {
        for i in 0..cols {
            rhs[i] += row[i] * target;
            for j in 0..=i {
                gram[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..cols {
        gram[i][i] += penalties[i];
        for j in 0..i {
            gram[j][i] = gram[i][j];
        }
    }

    cholesky_solve(gram, &rhs)
}

/// Solve `A x = b` for symmetric positive-definite `A`
pub fn cholesky_solve(mut a: Vec<Vec<f64>>, b: &[f64]) -> Result<Vec<f64>> {
    let n = a.len();
    if b.len() != n || a.iter().any(|row| row.len() != n) {
        return Err(MathError::InvalidInput(
            "Matrix must be square and match the right-hand side".to_string(),
        ));
    }

    // In-place lower factor L with A = L L^T
    for j in 0..n {
        let mut diag = a[j][j];
        for k in 0..j {
            diag -= a[j][k] * a[j][k];
        }
        if !diag.is_finite() || diag <= 1e-12 {
            return Err(MathError::CalculationError(format!(
                "Matrix is not positive definite (pivot {} = {:e})",
                j, diag
            )));
        }
        let diag = diag.sqrt();
        a[j][j] = diag;

        for i in j + 1..n {
            let mut value = a[i][j];
            for k in 0..j {
                value -= a[i][k] * a[j][k];
            }
            a[i][j] = value / diag;
        }
    }

    // Forward substitution: L z = b
    let mut z = vec![0.0; n];
    for i in 0..n {
        let mut value = b[i];
        for k in 0..i {
            value -= a[i][k] * z[k];
        }
        z[i] = value / a[i][i];
    }

    // Back substitution: L^T x = z
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut value = z[i];
        for k in i + 1..n {
            value -= a[k][i] * x[k];
        }
        x[i] = value / a[i][i];
    }

    if x.iter().any(|v| !v.is_finite()) {
        return Err(MathError::CalculationError(
            "Least squares solution is not finite".to_string(),
        ));
    }

    Ok(x)
}
