//! Polynomial helpers. Coefficients are stored highest power first.

use rustfft::num_complex::Complex64;

use super::ToolkitError;

const MAX_ITERATIONS: usize = 2_000;
const TOLERANCE: f64 = 1e-12;

/// Drop leading zero coefficients, keeping at least one entry.
pub fn trim(coeffs: &[f64]) -> Vec<f64> {
    let first = coeffs.iter().position(|&c| c != 0.0);
    match first {
        Some(idx) => coeffs[idx..].to_vec(),
        None => vec![0.0],
    }
}

pub fn degree(coeffs: &[f64]) -> usize {
    trim(coeffs).len() - 1
}

pub fn is_zero(coeffs: &[f64]) -> bool {
    coeffs.iter().all(|&c| c == 0.0)
}

/// Horner evaluation at a complex point.
pub fn eval(coeffs: &[f64], s: Complex64) -> Complex64 {
    coeffs
        .iter()
        .fold(Complex64::new(0.0, 0.0), |acc, &c| acc * s + c)
}

pub fn mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, &x) in a.iter().enumerate() {
        for (j, &y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    trim(&out)
}

pub fn add(a: &[f64], b: &[f64]) -> Vec<f64> {
    let n = a.len().max(b.len());
    let mut out = vec![0.0; n];
    for (i, &x) in a.iter().enumerate() {
        out[n - a.len() + i] += x;
    }
    for (i, &y) in b.iter().enumerate() {
        out[n - b.len() + i] += y;
    }
    trim(&out)
}

pub fn scale(a: &[f64], k: f64) -> Vec<f64> {
    trim(&a.iter().map(|&x| x * k).collect::<Vec<_>>())
}

/// Left-pad `coeffs` with zeros to `len` entries.
pub fn pad_to(coeffs: &[f64], len: usize) -> Vec<f64> {
    if coeffs.len() >= len {
        return coeffs.to_vec();
    }
    let mut out = vec![0.0; len - coeffs.len()];
    out.extend_from_slice(coeffs);
    out
}

/// All complex roots, via Durand-Kerner on the monic polynomial.
///
/// Roots at the origin are factored out exactly before iterating, since the
/// iteration converges only linearly on repeated roots.
pub fn roots(coeffs: &[f64]) -> Result<Vec<Complex64>, ToolkitError> {
    let mut c = trim(coeffs);
    if is_zero(&c) {
        return Err(ToolkitError::InvalidModel(
            "cannot take the roots of the zero polynomial".into(),
        ));
    }

    let mut out = Vec::new();
    while c.len() > 1 && c[c.len() - 1] == 0.0 {
        c.pop();
        out.push(Complex64::new(0.0, 0.0));
    }

    let n = c.len() - 1;
    match n {
        0 => return Ok(out),
        1 => {
            out.push(Complex64::new(-c[1] / c[0], 0.0));
            return Ok(out);
        }
        _ => {}
    }

    let lead = c[0];
    let monic: Vec<f64> = c.iter().map(|&x| x / lead).collect();

    // Fujiwara bound on root magnitude.
    let radius = monic
        .iter()
        .enumerate()
        .skip(1)
        .map(|(k, &a)| a.abs().powf(1.0 / k as f64))
        .fold(0.0f64, f64::max)
        .max(1e-3)
        * 2.0;

    let seed = Complex64::from_polar(1.0, 0.4);
    let mut z: Vec<Complex64> = (0..n)
        .map(|k| {
            let angle = 2.0 * std::f64::consts::PI * k as f64 / n as f64;
            Complex64::from_polar(radius, angle) * seed
        })
        .collect();

    for _ in 0..MAX_ITERATIONS {
        let mut max_step = 0.0f64;
        for i in 0..n {
            let mut denom = Complex64::new(1.0, 0.0);
            for j in 0..n {
                if i != j {
                    denom *= z[i] - z[j];
                }
            }
            if denom.norm() == 0.0 {
                denom = Complex64::new(TOLERANCE, 0.0);
            }
            let step = eval(&monic, z[i]) / denom;
            z[i] -= step;
            max_step = max_step.max(step.norm() / (1.0 + z[i].norm()));
        }
        if max_step < TOLERANCE {
            break;
        }
    }

    if z.iter().any(|r| !r.re.is_finite() || !r.im.is_finite()) {
        return Err(ToolkitError::Numerical(format!(
            "root finding diverged for a degree {n} polynomial"
        )));
    }

    // Real coefficients: snap near-real roots onto the axis.
    for r in &mut z {
        if r.im.abs() <= 1e-9 * (1.0 + r.re.abs()) {
            r.im = 0.0;
        }
    }
    out.extend(z);
    out.sort_by(|a, b| a.re.total_cmp(&b.re).then(a.im.total_cmp(&b.im)));
    Ok(out)
}
