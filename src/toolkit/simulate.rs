//! Time-domain simulation: state-space realisation of a transfer function,
//! fixed-step RK4, and the time/frequency grids used by default.

use rustfft::num_complex::Complex64;

use super::ToolkitError;
use super::model::TransferFunction;
use super::poly;

/// Largest internal RK4 step between two requested sample times.
const MAX_STEP: f64 = 0.01;

pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

pub fn logspace(start_exp: f64, stop_exp: f64, n: usize) -> Vec<f64> {
    linspace(start_exp, stop_exp, n)
        .into_iter()
        .map(|e| 10f64.powf(e))
        .collect()
}

/// Frequency grid spanning two decades beyond the slowest and fastest
/// pole/zero.
pub fn default_omega(features: &[Complex64], points: usize) -> Vec<f64> {
    let mags: Vec<f64> = features
        .iter()
        .map(|z| z.norm())
        .filter(|m| *m > 1e-9 && m.is_finite())
        .collect();
    let (lo, hi) = if mags.is_empty() {
        (1.0, 1.0)
    } else {
        (
            mags.iter().copied().fold(f64::INFINITY, f64::min),
            mags.iter().copied().fold(0.0f64, f64::max),
        )
    };
    logspace(lo.log10().floor() - 1.0, hi.log10().ceil() + 1.0, points)
}

/// Simulation horizon long enough for the slowest stable pole to settle.
pub fn default_horizon(poles: &[Complex64]) -> f64 {
    if poles.iter().any(|p| p.re > -1e-6) {
        return 20.0;
    }
    let slowest = poles
        .iter()
        .map(|p| -p.re)
        .fold(f64::INFINITY, f64::min);
    if !slowest.is_finite() {
        return 10.0;
    }
    (7.0 / slowest).clamp(1.0, 100.0)
}

/// One explicit RK4 step of `dx/dt = f(t, x)`.
pub fn rk4_step<F>(f: &F, t: f64, x: &[f64], h: f64) -> Result<Vec<f64>, ToolkitError>
where
    F: Fn(f64, &[f64]) -> Result<Vec<f64>, ToolkitError>,
{
    let axpy = |a: &[f64], k: &[f64], s: f64| -> Vec<f64> {
        a.iter().zip(k).map(|(ai, ki)| ai + s * ki).collect()
    };
    let k1 = f(t, x)?;
    let k2 = f(t + 0.5 * h, &axpy(x, &k1, 0.5 * h))?;
    let k3 = f(t + 0.5 * h, &axpy(x, &k2, 0.5 * h))?;
    let k4 = f(t + h, &axpy(x, &k3, h))?;
    Ok(x.iter()
        .enumerate()
        .map(|(i, xi)| xi + h / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]))
        .collect())
}

/// Controllable canonical realisation of a proper transfer function.
#[derive(Clone, Debug)]
struct Realization {
    /// Denominator coefficients `a1..an` of the monic denominator.
    a: Vec<f64>,
    c: Vec<f64>,
    d: f64,
}

impl Realization {
    fn from_tf(tf: &TransferFunction) -> Result<Self, ToolkitError> {
        if !tf.is_proper() {
            return Err(ToolkitError::InvalidModel(format!(
                "cannot simulate improper transfer function {tf}"
            )));
        }
        let den = tf.den();
        let lead = den[0];
        let n = den.len() - 1;
        let a: Vec<f64> = den[1..].iter().map(|x| x / lead).collect();
        let b: Vec<f64> = poly::pad_to(tf.num(), n + 1)
            .iter()
            .map(|x| x / lead)
            .collect();
        let d = b[0];
        let c = (0..n).map(|i| b[i + 1] - a[i] * d).collect();
        Ok(Self { a, c, d })
    }

    fn order(&self) -> usize {
        self.a.len()
    }

    fn derivative(&self, x: &[f64], u: f64) -> Vec<f64> {
        let mut dx = vec![0.0; x.len()];
        if let Some(first) = dx.first_mut() {
            *first = u - self.a.iter().zip(x).map(|(a, xi)| a * xi).sum::<f64>();
        }
        for i in 1..x.len() {
            dx[i] = x[i - 1];
        }
        dx
    }

    fn output(&self, x: &[f64], u: f64) -> f64 {
        self.c.iter().zip(x).map(|(c, xi)| c * xi).sum::<f64>() + self.d * u
    }
}

/// Forced response of `tf` from rest, with the input linearly interpolated
/// between sample times.
pub fn simulate(
    tf: &TransferFunction,
    time: &[f64],
    input: &[f64],
) -> Result<Vec<f64>, ToolkitError> {
    if time.len() != input.len() {
        return Err(ToolkitError::DimensionMismatch(format!(
            "{} time points but {} input samples",
            time.len(),
            input.len()
        )));
    }
    let sys = Realization::from_tf(tf)?;
    let mut x = vec![0.0; sys.order()];
    let mut out = Vec::with_capacity(time.len());
    if let Some(&u0) = input.first() {
        out.push(sys.output(&x, u0));
    }

    for k in 1..time.len() {
        let (t0, t1) = (time[k - 1], time[k]);
        let (u0, u1) = (input[k - 1], input[k]);
        let span = t1 - t0;
        if span < 0.0 {
            return Err(ToolkitError::InvalidModel("time points must be increasing".into()));
        }
        let substeps = ((span / MAX_STEP).ceil() as usize).max(1);
        let h = span / substeps as f64;
        let u_at = |t: f64| {
            if span == 0.0 {
                u1
            } else {
                u0 + (u1 - u0) * (t - t0) / span
            }
        };
        let f = |t: f64, state: &[f64]| -> Result<Vec<f64>, ToolkitError> {
            Ok(sys.derivative(state, u_at(t)))
        };
        let mut t = t0;
        for _ in 0..substeps {
            x = rk4_step(&f, t, &x, h)?;
            t += h;
        }
        out.push(sys.output(&x, u1));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_order_step_matches_closed_form() {
        let tf = TransferFunction::new(&[1.0], &[1.0, 1.0]).unwrap();
        let time = linspace(0.0, 5.0, 51);
        let input = vec![1.0; time.len()];
        let y = simulate(&tf, &time, &input).unwrap();
        for (t, yk) in time.iter().zip(&y) {
            let exact = 1.0 - (-t).exp();
            assert!((yk - exact).abs() < 1e-6, "t={t}: {yk} vs {exact}");
        }
    }

    #[test]
    fn biproper_feedthrough_is_immediate() {
        // (s + 2) / (s + 1) has unit high-frequency gain.
        let tf = TransferFunction::new(&[1.0, 2.0], &[1.0, 1.0]).unwrap();
        let time = linspace(0.0, 1.0, 11);
        let y = simulate(&tf, &time, &vec![1.0; time.len()]).unwrap();
        assert!((y[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn improper_model_is_rejected() {
        let tf = TransferFunction::new(&[1.0, 0.0, 0.0], &[1.0, 1.0]).unwrap();
        let time = linspace(0.0, 1.0, 3);
        assert!(simulate(&tf, &time, &[1.0; 3]).is_err());
    }

    #[test]
    fn omega_grid_brackets_features() {
        let omega = default_omega(&[Complex64::new(-1.0, 0.0), Complex64::new(-20.0, 0.0)], 100);
        assert!((omega[0] - 0.1).abs() < 1e-12);
        assert!((omega[99] - 1000.0).abs() < 1e-9);
    }
}
