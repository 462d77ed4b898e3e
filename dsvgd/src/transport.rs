//! Optimal transport distances between particle populations.

use ndarray::{Array2, ArrayView2};

use crate::{Result, SamplerErr};

/// 2-Wasserstein distance between the uniform empirical measures over the rows of `a`
/// and `b`.
///
/// The larger population must hold a whole multiple of the smaller one's rows. Each
/// row of the smaller population is split into that many equal atoms, which turns the
/// problem into a square assignment solved exactly.
///
/// # Errors
/// `ShapeMismatch` if the dimensions differ or the sizes are not multiples,
/// `NonFinite` if a coordinate is not finite.
pub fn wasserstein2(a: ArrayView2<f32>, b: ArrayView2<f32>) -> Result<f32> {
    if a.ncols() != b.ncols() {
        return Err(SamplerErr::ShapeMismatch {
            what: "transport dimension",
            got: b.ncols(),
            expected: a.ncols(),
        });
    }

    let (small, large) = if a.nrows() <= b.nrows() { (a, b) } else { (b, a) };

    if small.nrows() == 0 || large.nrows() % small.nrows() != 0 {
        return Err(SamplerErr::ShapeMismatch {
            what: "transport support, as a multiple of the smaller one",
            got: large.nrows(),
            expected: small.nrows(),
        });
    }

    for (index, row) in a.rows().into_iter().chain(b.rows()).enumerate() {
        if row.iter().any(|x| !x.is_finite()) {
            return Err(SamplerErr::NonFinite {
                step: 0,
                what: "transport support",
                index,
            });
        }
    }

    let n = large.nrows();
    let copies = n / small.nrows();
    let cost = Array2::from_shape_fn((n, n), |(i, j)| {
        large
            .row(i)
            .iter()
            .zip(small.row(j / copies))
            .map(|(&x, &y)| f64::from(x - y).powi(2))
            .sum::<f64>()
    });

    let total = min_cost_assignment(&cost);
    Ok((total / n as f64).max(0.0).sqrt() as f32)
}

/// Minimum total cost of a perfect matching on a square cost matrix.
///
/// Shortest augmenting paths with row and column potentials, `O(n^3)`.
fn min_cost_assignment(cost: &Array2<f64>) -> f64 {
    let n = cost.nrows();

    // 1-indexed, index 0 is the virtual source column.
    let mut u = vec![0.0; n + 1];
    let mut v = vec![0.0; n + 1];
    let mut matched_row = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];

    for i in 1..=n {
        matched_row[0] = i;
        let mut j0 = 0;
        let mut minv = vec![f64::INFINITY; n + 1];
        let mut used = vec![false; n + 1];

        loop {
            used[j0] = true;
            let i0 = matched_row[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0;

            for j in 1..=n {
                if used[j] {
                    continue;
                }

                let reduced = cost[[i0 - 1, j - 1]] - u[i0] - v[j];
                if reduced < minv[j] {
                    minv[j] = reduced;
                    way[j] = j0;
                }

                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }

            for j in 0..=n {
                if used[j] {
                    u[matched_row[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }

            j0 = j1;
            if matched_row[j0] == 0 {
                break;
            }
        }

        while j0 != 0 {
            let j1 = way[j0];
            matched_row[j0] = matched_row[j1];
            j0 = j1;
        }
    }

    (1..=n).map(|j| cost[[matched_row[j] - 1, j - 1]]).sum()
}
