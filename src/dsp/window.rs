use std::cell::RefCell;
use std::collections::HashMap;

thread_local! {
    static HANN_CACHE: RefCell<HashMap<usize, Vec<f64>>> = RefCell::new(HashMap::new());
    static DPSS_CACHE: RefCell<HashMap<(usize, u64), Vec<f64>>> = RefCell::new(HashMap::new());
}

pub fn hann_window(size: usize) -> Vec<f64> {
    if size < 2 {
        return vec![1.0; size];
    }
    HANN_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .entry(size)
            .or_insert_with(|| {
                (0..size)
                    .map(|i| {
                        0.5 * (1.0
                            - (2.0 * std::f64::consts::PI * i as f64 / (size - 1) as f64).cos())
                    })
                    .collect()
            })
            .clone()
    })
}

/// Zeroth-order discrete prolate spheroidal sequence (Slepian window).
///
/// `width` is the window bandwidth as a fraction of the sampling rate; the
/// syllable-spectrogram presets use `4.0 / size`. The window is the
/// eigenvector for the largest eigenvalue of the symmetric tridiagonal
/// matrix that commutes with the spectral concentration operator. The
/// eigenvalue is located by Sturm-sequence bisection and the eigenvector by
/// inverse iteration, then the result is normalized to a peak of 1.
pub fn dpss_window(size: usize, width: f64) -> Vec<f64> {
    if size < 2 {
        return vec![1.0; size];
    }
    DPSS_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .entry((size, width.to_bits()))
            .or_insert_with(|| compute_dpss(size, width))
            .clone()
    })
}

fn compute_dpss(n: usize, width: f64) -> Vec<f64> {
    let half_bw = width / 2.0;
    let cos_2pw = (2.0 * std::f64::consts::PI * half_bw).cos();

    // diag[i] = ((N-1-2i)/2)^2 cos(2πW), off[i] couples elements i and i+1.
    let diag: Vec<f64> = (0..n)
        .map(|i| {
            let d = ((n - 1) as f64 - 2.0 * i as f64) / 2.0;
            d * d * cos_2pw
        })
        .collect();
    let off: Vec<f64> = (1..n).map(|i| i as f64 * (n - i) as f64 / 2.0).collect();

    let lambda = largest_eigenvalue(&diag, &off);

    // Inverse iteration: each solve amplifies the eigen-direction by the
    // reciprocal distance to lambda, so a couple of sweeps are enough.
    let mut v = vec![1.0 / (n as f64).sqrt(); n];
    for _ in 0..4 {
        v = solve_shifted_tridiagonal(&diag, &off, lambda, &v);
        let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        for x in &mut v {
            *x /= norm;
        }
    }

    // Fix the arbitrary eigenvector sign and scale to peak 1.
    let peak = v
        .iter()
        .copied()
        .max_by(|a, b| a.abs().partial_cmp(&b.abs()).unwrap())
        .unwrap_or(1.0);
    v.iter().map(|x| x / peak).collect()
}

/// Number of eigenvalues of the tridiagonal strictly below `x`, by the
/// Sturm sequence of leading-minor pivots.
fn eigenvalues_below(diag: &[f64], off: &[f64], x: f64) -> usize {
    let floor = 1e-300;
    let mut count = 0;
    let mut q = 1.0f64;
    for (i, &d) in diag.iter().enumerate() {
        q = if i == 0 {
            d - x
        } else {
            d - x - off[i - 1] * off[i - 1] / q
        };
        // A vanishing pivot sits on an eigenvalue; nudge it negative so the
        // count stays monotone in x.
        if q.abs() < floor {
            q = -floor;
        }
        if q < 0.0 {
            count += 1;
        }
    }
    count
}

/// Largest eigenvalue of the symmetric tridiagonal, by bisection between the
/// Gershgorin bounds.
fn largest_eigenvalue(diag: &[f64], off: &[f64]) -> f64 {
    let n = diag.len();
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for (i, &d) in diag.iter().enumerate() {
        let mut r = 0.0;
        if i > 0 {
            r += off[i - 1].abs();
        }
        if i + 1 < n {
            r += off[i].abs();
        }
        lo = lo.min(d - r);
        hi = hi.max(d + r);
    }

    while hi - lo > f64::EPSILON * hi.abs().max(lo.abs()).max(1.0) {
        let mid = lo + (hi - lo) / 2.0;
        if mid <= lo || mid >= hi {
            break;
        }
        if eigenvalues_below(diag, off, mid) >= n {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    lo + (hi - lo) / 2.0
}

/// Solve `(T - shift I) x = rhs` for the symmetric tridiagonal `T` by the
/// Thomas algorithm. Pivots are floored in magnitude; the system is solved
/// arbitrarily close to an eigenvalue, where the huge amplification is
/// exactly what inverse iteration relies on.
fn solve_shifted_tridiagonal(diag: &[f64], off: &[f64], shift: f64, rhs: &[f64]) -> Vec<f64> {
    let n = diag.len();
    let scale = diag
        .iter()
        .map(|d| d.abs())
        .fold(1.0f64, f64::max);
    let pivmin = f64::EPSILON * scale;
    let guard = |p: f64| {
        if p.abs() < pivmin {
            if p < 0.0 {
                -pivmin
            } else {
                pivmin
            }
        } else {
            p
        }
    };

    let mut upper = vec![0.0f64; n];
    let mut x = vec![0.0f64; n];

    let mut pivot = guard(diag[0] - shift);
    if n > 1 {
        upper[0] = off[0] / pivot;
    }
    x[0] = rhs[0] / pivot;
    for i in 1..n {
        pivot = guard(diag[i] - shift - off[i - 1] * upper[i - 1]);
        if i + 1 < n {
            upper[i] = off[i] / pivot;
        }
        x[i] = (rhs[i] - off[i - 1] * x[i - 1]) / pivot;
    }
    for i in (0..n - 1).rev() {
        x[i] -= upper[i] * x[i + 1];
    }
    x
}
