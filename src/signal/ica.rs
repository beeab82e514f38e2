//! Independent-component decomposition for artifact removal (spec
//! §4.B step 3), with an automatic eye/muscle heuristic.
//!
//! FastICA (deflationary, `tanh` negentropy approximation) over
//! whitened channels. Components are flagged as artifacts by excess
//! kurtosis (eye blinks and muscle activity are strongly non-Gaussian
//! and produce high-kurtosis sources) and projected out before the
//! signal is reconstructed.

use ndarray::{Array1, Array2};

const MAX_ICA_ITERS: usize = 200;
const ICA_TOLERANCE: f32 = 1e-6;
/// Excess-kurtosis threshold above which a component is treated as an
/// artifact. Gaussian sources have excess kurtosis 0; eye/muscle
/// artifacts typically exceed this by a wide margin.
const ARTIFACT_KURTOSIS_THRESHOLD: f32 = 5.0;

/// Remove high-kurtosis independent components from `data` (channels x
/// samples). Returns the reconstructed signal with artifact components
/// zeroed out. A no-op if fewer than 2 channels or 2 samples are given.
pub fn remove_artifacts(data: &Array2<f32>) -> Array2<f32> {
    let (c, t) = data.dim();
    if c < 2 || t < 2 {
        return data.clone();
    }

    let (centered, means) = center_rows(data);
    let (whitened, whitening, mean_removed_cov_ok) = whiten(&centered);
    if !mean_removed_cov_ok {
        return data.clone();
    }

    let n_components = c;
    let unmixing = fastica_deflation(&whitened, n_components);

    // sources = unmixing * whitened  -> (n_components, t)
    let sources = unmixing.dot(&whitened);

    let mut kept_sources = sources.clone();
    for mut row in kept_sources.rows_mut() {
        let k = excess_kurtosis(row.as_slice().unwrap());
        if k > ARTIFACT_KURTOSIS_THRESHOLD {
            row.fill(0.0);
        }
    }

    // Reconstruct: whitened_clean = pinv(unmixing) * kept_sources.
    // unmixing rows are orthonormal in whitened space, so its inverse
    // is its transpose.
    let mixing = unmixing.t();
    let whitened_clean = mixing.dot(&kept_sources);

    // Undo whitening: centered_clean = whitening_inv * whitened_clean.
    let centered_clean = match invert_square(&whitening) {
        Some(inv) => inv.dot(&whitened_clean),
        None => return data.clone(),
    };

    let mut out = centered_clean;
    for (mut row, &m) in out.rows_mut().into_iter().zip(means.iter()) {
        row.mapv_inplace(|v| v + m);
    }
    out
}

fn center_rows(data: &Array2<f32>) -> (Array2<f32>, Array1<f32>) {
    let means: Array1<f32> = data.map_axis(ndarray::Axis(1), |row| row.mean().unwrap_or(0.0));
    let mut centered = data.clone();
    for (mut row, &m) in centered.rows_mut().into_iter().zip(means.iter()) {
        row.mapv_inplace(|v| v - m);
    }
    (centered, means)
}

/// PCA-whiten rows of `centered` (channels x samples). Returns
/// (whitened data, whitening matrix W such that whitened = W * centered,
/// success flag).
fn whiten(centered: &Array2<f32>) -> (Array2<f32>, Array2<f32>, bool) {
    let (c, t) = centered.dim();
    let cov = centered.dot(&centered.t()) / (t as f32).max(1.0);
    let (eigvals, eigvecs) = match jacobi_eigen(&cov) {
        Some(r) => r,
        None => return (centered.clone(), Array2::eye(c), false),
    };

    let mut w = Array2::<f32>::zeros((c, c));
    for i in 0..c {
        let lambda = eigvals[i].max(1e-8).sqrt();
        for j in 0..c {
            w[[i, j]] = eigvecs[[j, i]] / lambda;
        }
    }
    let whitened = w.dot(centered);
    (whitened, w, true)
}

fn invert_square(m: &Array2<f32>) -> Option<Array2<f32>> {
    let n = m.nrows();
    if m.ncols() != n {
        return None;
    }
    let mut aug = Array2::<f32>::zeros((n, 2 * n));
    aug.slice_mut(ndarray::s![.., ..n]).assign(m);
    for i in 0..n {
        aug[[i, n + i]] = 1.0;
    }
    for col in 0..n {
        let pivot_row = (col..n).max_by(|&a, &b| {
            aug[[a, col]].abs().partial_cmp(&aug[[b, col]].abs()).unwrap()
        })?;
        if aug[[pivot_row, col]].abs() < 1e-10 {
            return None;
        }
        if pivot_row != col {
            let (mut r1, mut r2) = aug.multi_slice_mut((ndarray::s![col, ..], ndarray::s![pivot_row, ..]));
            ndarray::Zip::from(&mut r1).and(&mut r2).for_each(std::mem::swap);
        }
        let pivot = aug[[col, col]];
        aug.row_mut(col).mapv_inplace(|v| v / pivot);
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = aug[[row, col]];
            if factor != 0.0 {
                let pivot_row = aug.row(col).to_owned();
                let mut target = aug.row_mut(row);
                target.scaled_add(-factor, &pivot_row);
            }
        }
    }
    Some(aug.slice(ndarray::s![.., n..]).to_owned())
}

/// Jacobi eigenvalue algorithm for a symmetric matrix. Returns
/// (eigenvalues, eigenvectors-as-columns), or `None` if it doesn't
/// converge within a generous iteration budget.
fn jacobi_eigen(sym: &Array2<f32>) -> Option<(Array1<f32>, Array2<f32>)> {
    let n = sym.nrows();
    let mut a = sym.clone();
    let mut v = Array2::<f32>::eye(n);

    for _sweep in 0..100 {
        let mut off_diag = 0.0f32;
        for p in 0..n {
            for q in (p + 1)..n {
                off_diag += a[[p, q]] * a[[p, q]];
            }
        }
        if off_diag.sqrt() < 1e-8 {
            break;
        }
        for p in 0..n {
            for q in (p + 1)..n {
                if a[[p, q]].abs() < 1e-12 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * a[[p, q]]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                let app = a[[p, p]];
                let aqq = a[[q, q]];
                let apq = a[[p, q]];
                a[[p, p]] = c * c * app - 2.0 * s * c * apq + s * s * aqq;
                a[[q, q]] = s * s * app + 2.0 * s * c * apq + c * c * aqq;
                a[[p, q]] = 0.0;
                a[[q, p]] = 0.0;

                for i in 0..n {
                    if i != p && i != q {
                        let aip = a[[i, p]];
                        let aiq = a[[i, q]];
                        a[[i, p]] = c * aip - s * aiq;
                        a[[p, i]] = a[[i, p]];
                        a[[i, q]] = s * aip + c * aiq;
                        a[[q, i]] = a[[i, q]];
                    }
                }
                for i in 0..n {
                    let vip = v[[i, p]];
                    let viq = v[[i, q]];
                    v[[i, p]] = c * vip - s * viq;
                    v[[i, q]] = s * vip + c * viq;
                }
            }
        }
    }

    let eigvals: Array1<f32> = (0..n).map(|i| a[[i, i]]).collect();
    Some((eigvals, v))
}

/// Deflationary FastICA: extracts `n_components` unmixing rows one at a
/// time from whitened data (rows x samples), each orthogonalized
/// against previously extracted ones.
fn fastica_deflation(whitened: &Array2<f32>, n_components: usize) -> Array2<f32> {
    let (c, t) = whitened.dim();
    let mut w_rows: Vec<Array1<f32>> = Vec::with_capacity(n_components);

    // Deterministic seed pattern instead of random init, so ICA output
    // (and therefore preprocessing) is reproducible.
    for k in 0..n_components.min(c) {
        let mut w = Array1::<f32>::zeros(c);
        w[k % c] = 1.0;
        if c > 1 {
            w[(k + 1) % c] = 0.3;
        }
        let norm = w.dot(&w).sqrt();
        w.mapv_inplace(|v| v / norm);

        for _iter in 0..MAX_ICA_ITERS {
            // g(u) = tanh(u), g'(u) = 1 - tanh(u)^2
            let proj = w.dot(whitened); // (t,)
            let g: Array1<f32> = proj.mapv(|u| u.tanh());
            let g_prime_mean: f32 = proj.mapv(|u| 1.0 - u.tanh().powi(2)).mean().unwrap_or(0.0);

            let mut w_new = whitened.dot(&g) / t as f32;
            w_new = &w_new - &(w.clone() * g_prime_mean);

            // Deflationary orthogonalization against previous components.
            for prev in &w_rows {
                let proj_prev = w_new.dot(prev);
                w_new = &w_new - &(prev.clone() * proj_prev);
            }

            let norm = w_new.dot(&w_new).sqrt();
            if norm < 1e-10 {
                break;
            }
            w_new.mapv_inplace(|v| v / norm);

            let delta = (w_new.dot(&w) - 1.0).abs();
            w = w_new;
            if delta < ICA_TOLERANCE {
                break;
            }
        }
        w_rows.push(w);
    }

    let mut unmixing = Array2::<f32>::zeros((w_rows.len(), c));
    for (i, row) in w_rows.iter().enumerate() {
        unmixing.row_mut(i).assign(row);
    }
    unmixing
}

fn excess_kurtosis(values: &[f32]) -> f32 {
    let n = values.len() as f32;
    if n < 4.0 {
        return 0.0;
    }
    let mean = values.iter().sum::<f32>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
    if var <= 1e-12 {
        return 0.0;
    }
    let m4 = values.iter().map(|v| (v - mean).powi(4)).sum::<f32>() / n;
    m4 / (var * var) - 3.0
}
