//! Classical multidimensional scaling.
//!
//! Squared distances are double-centred into the Gram matrix
//! `B = -1/2 (D² - rowMean - colMean + totalMean)` and the top two
//! eigenpairs of `B` give the 2D embedding. The eigendecomposition is a
//! cyclic Jacobi routine for real symmetric matrices, which is ample at the
//! matrix sizes this engine sees (≤ 1000²). Eigenvector sign is
//! implementation-defined: the embedding is valid up to reflection about
//! each axis.

use ndarray::Array2;

use crate::error::{ArboraError, Result};

const MAX_JACOBI_SWEEPS: usize = 64;
const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// Embeds a symmetric, zero-diagonal distance matrix into two dimensions.
///
/// Returns an `n × 2` coordinate matrix. When the second eigenvalue is not
/// positive the second dimension collapses to zero; when the first is not
/// positive all coordinates are zero.
///
/// # Errors
/// Returns [`ArboraError::NumericFailure`] when the input is not square or
/// not symmetric, or when the eigendecomposition fails to converge.
pub fn classical_mds(distances: &Array2<f64>) -> Result<Array2<f64>> {
    let n = distances.nrows();
    if distances.ncols() != n {
        return Err(ArboraError::NumericFailure {
            routine: "classical MDS",
            message: format!(
                "distance matrix must be square, got {}x{}",
                n,
                distances.ncols()
            ),
        });
    }
    for i in 0..n {
        for j in (i + 1)..n {
            if (distances[[i, j]] - distances[[j, i]]).abs() > SYMMETRY_TOLERANCE {
                return Err(ArboraError::NumericFailure {
                    routine: "classical MDS",
                    message: format!("distance matrix is not symmetric at ({i}, {j})"),
                });
            }
        }
    }

    let gram = double_centre(distances);
    let (mut eigenvalues, eigenvectors) = jacobi_eigen(gram)?;

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]));
    eigenvalues.sort_by(|a, b| b.total_cmp(a));

    let mut coordinates = Array2::<f64>::zeros((n, 2));
    for (dimension, &column) in order.iter().take(2).enumerate() {
        let eigenvalue = eigenvalues[dimension];
        if eigenvalue <= 0.0 {
            break;
        }
        let scale = eigenvalue.sqrt();
        for row in 0..n {
            coordinates[[row, dimension]] = eigenvectors[[row, column]] * scale;
        }
    }
    Ok(coordinates)
}

/// `B = -1/2 (D² - rowMean·1ᵀ - 1·colMeanᵀ + totalMean)`.
fn double_centre(distances: &Array2<f64>) -> Array2<f64> {
    let n = distances.nrows();
    let squared = distances.mapv(|d| d * d);

    let mut row_means = vec![0.0; n];
    let mut col_means = vec![0.0; n];
    let mut total = 0.0;
    for i in 0..n {
        for j in 0..n {
            let value = squared[[i, j]];
            row_means[i] += value;
            col_means[j] += value;
            total += value;
        }
    }
    let denominator = n.max(1) as f64;
    for mean in row_means.iter_mut().chain(col_means.iter_mut()) {
        *mean /= denominator;
    }
    total /= denominator * denominator;

    let mut gram = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            gram[[i, j]] = -0.5 * (squared[[i, j]] - row_means[i] - col_means[j] + total);
        }
    }
    gram
}

/// Cyclic Jacobi eigendecomposition of a real symmetric matrix.
///
/// Returns the eigenvalues (unordered) and the matrix whose columns are the
/// matching eigenvectors.
fn jacobi_eigen(mut matrix: Array2<f64>) -> Result<(Vec<f64>, Array2<f64>)> {
    let n = matrix.nrows();
    let mut vectors = Array2::<f64>::eye(n);
    let scale = matrix.iter().map(|v| v * v).sum::<f64>().sqrt();
    let tolerance = (scale * 1e-14).max(f64::MIN_POSITIVE);

    for _sweep in 0..MAX_JACOBI_SWEEPS {
        let off_diagonal: f64 = (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .map(|(i, j)| matrix[[i, j]] * matrix[[i, j]])
            .sum::<f64>()
            .sqrt();
        if off_diagonal <= tolerance {
            let eigenvalues = (0..n).map(|i| matrix[[i, i]]).collect();
            return Ok((eigenvalues, vectors));
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = matrix[[p, q]];
                if apq.abs() <= tolerance / (n as f64) {
                    continue;
                }
                let theta = (matrix[[q, q]] - matrix[[p, p]]) / (2.0 * apq);
                let t = if theta >= 0.0 {
                    1.0 / (theta + (theta * theta + 1.0).sqrt())
                } else {
                    1.0 / (theta - (theta * theta + 1.0).sqrt())
                };
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = matrix[[k, p]];
                    let akq = matrix[[k, q]];
                    matrix[[k, p]] = c * akp - s * akq;
                    matrix[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = matrix[[p, k]];
                    let aqk = matrix[[q, k]];
                    matrix[[p, k]] = c * apk - s * aqk;
                    matrix[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = vectors[[k, p]];
                    let vkq = vectors[[k, q]];
                    vectors[[k, p]] = c * vkp - s * vkq;
                    vectors[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    Err(ArboraError::NumericFailure {
        routine: "Jacobi eigendecomposition",
        message: format!("no convergence after {MAX_JACOBI_SWEEPS} sweeps"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::array;

    fn euclidean(coords: &Array2<f64>, i: usize, j: usize) -> f64 {
        let dx = coords[[i, 0]] - coords[[j, 0]];
        let dy = coords[[i, 1]] - coords[[j, 1]];
        (dx * dx + dy * dy).sqrt()
    }

    #[test]
    fn equilateral_triangle_embeds_isometrically() {
        let distances = array![[0.0, 1.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 0.0]];
        let coords = classical_mds(&distances).expect("triangle embeds");
        for i in 0..3 {
            for j in (i + 1)..3 {
                assert!((euclidean(&coords, i, j) - 1.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn planar_cloud_round_trips() {
        let points: Array2<f64> =
            array![[0.0, 0.0], [3.0, 0.0], [3.0, 4.0], [-1.0, 2.0], [0.5, -2.5]];
        let n = points.nrows();
        let mut distances = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            for j in 0..n {
                let dx = points[[i, 0]] - points[[j, 0]];
                let dy = points[[i, 1]] - points[[j, 1]];
                distances[[i, j]] = (dx * dx + dy * dy).sqrt();
            }
        }
        let coords = classical_mds(&distances).expect("planar cloud embeds");
        for i in 0..n {
            for j in 0..n {
                assert!((euclidean(&coords, i, j) - distances[[i, j]]).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn collinear_points_collapse_second_dimension() {
        let distances = array![[0.0, 1.0, 2.0], [1.0, 0.0, 1.0], [2.0, 1.0, 0.0]];
        let coords = classical_mds(&distances).expect("line embeds");
        // The second eigenvalue is zero up to rounding, so the second
        // dimension is zero or vanishingly small.
        for row in 0..3 {
            assert!(coords[[row, 1]].abs() < 1e-6);
        }
    }

    #[test]
    fn asymmetric_input_is_rejected() {
        let distances = array![[0.0, 1.0], [2.0, 0.0]];
        let err = classical_mds(&distances).expect_err("asymmetry must fail");
        assert_eq!(err.code(), crate::ArboraErrorCode::NumericFailure);
    }

    #[test]
    fn single_point_embeds_at_origin() {
        let distances = Array2::<f64>::zeros((1, 1));
        let coords = classical_mds(&distances).expect("single point embeds");
        assert_eq!(coords, Array2::<f64>::zeros((1, 2)));
    }
}
