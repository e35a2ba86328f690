//! System models: transfer functions, MIMO transfer matrices, nonlinear
//! state-update systems and the saturation nonlinearity.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use rustfft::num_complex::Complex64;

use super::ToolkitError;
use super::poly;

/// SISO rational transfer function `num(s) / den(s)`.
#[derive(Clone, Debug, PartialEq)]
pub struct TransferFunction {
    num: Vec<f64>,
    den: Vec<f64>,
}

impl TransferFunction {
    pub fn new(num: &[f64], den: &[f64]) -> Result<Self, ToolkitError> {
        if num.is_empty() || den.is_empty() {
            return Err(ToolkitError::InvalidModel(
                "transfer function needs numerator and denominator coefficients".into(),
            ));
        }
        if poly::is_zero(den) {
            return Err(ToolkitError::InvalidModel("denominator is identically zero".into()));
        }
        Ok(Self {
            num: poly::trim(num),
            den: poly::trim(den),
        })
    }

    /// The Laplace variable `s`, for building models arithmetically.
    pub fn s() -> Self {
        Self {
            num: vec![1.0, 0.0],
            den: vec![1.0],
        }
    }

    pub fn gain(k: f64) -> Self {
        Self {
            num: vec![k],
            den: vec![1.0],
        }
    }

    pub fn num(&self) -> &[f64] {
        &self.num
    }

    pub fn den(&self) -> &[f64] {
        &self.den
    }

    pub fn eval(&self, s: Complex64) -> Complex64 {
        poly::eval(&self.num, s) / poly::eval(&self.den, s)
    }

    pub fn is_proper(&self) -> bool {
        poly::degree(&self.num) <= poly::degree(&self.den)
    }

    pub fn poles(&self) -> Result<Vec<Complex64>, ToolkitError> {
        poly::roots(&self.den)
    }

    pub fn zeros(&self) -> Result<Vec<Complex64>, ToolkitError> {
        if poly::is_zero(&self.num) {
            return Ok(Vec::new());
        }
        poly::roots(&self.num)
    }

    pub fn powi(&self, n: u32) -> Self {
        (0..n).fold(Self::gain(1.0), |acc, _| &acc * self)
    }

    /// Closed loop `k G / (1 + k G)` under unity negative feedback.
    pub fn unity_feedback(&self, k: f64) -> Self {
        let num = poly::scale(&self.num, k);
        let den = poly::add(&self.den, &num);
        Self { num, den }
    }

    /// Characteristic polynomial `den + k num` of the unity feedback loop.
    pub fn characteristic(&self, k: f64) -> Vec<f64> {
        poly::add(&self.den, &poly::scale(&self.num, k))
    }
}

impl fmt::Display for TransferFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} / {:?}", self.num, self.den)
    }
}

impl Mul for &TransferFunction {
    type Output = TransferFunction;

    fn mul(self, rhs: &TransferFunction) -> TransferFunction {
        TransferFunction {
            num: poly::mul(&self.num, &rhs.num),
            den: poly::mul(&self.den, &rhs.den),
        }
    }
}

impl Mul for TransferFunction {
    type Output = TransferFunction;

    fn mul(self, rhs: TransferFunction) -> TransferFunction {
        &self * &rhs
    }
}

impl Mul<f64> for TransferFunction {
    type Output = TransferFunction;

    fn mul(self, k: f64) -> TransferFunction {
        TransferFunction {
            num: poly::scale(&self.num, k),
            den: self.den,
        }
    }
}

impl Mul<TransferFunction> for f64 {
    type Output = TransferFunction;

    fn mul(self, tf: TransferFunction) -> TransferFunction {
        tf * self
    }
}

impl Add for TransferFunction {
    type Output = TransferFunction;

    fn add(self, rhs: TransferFunction) -> TransferFunction {
        if self.den == rhs.den {
            return TransferFunction {
                num: poly::add(&self.num, &rhs.num),
                den: self.den,
            };
        }
        TransferFunction {
            num: poly::add(
                &poly::mul(&self.num, &rhs.den),
                &poly::mul(&rhs.num, &self.den),
            ),
            den: poly::mul(&self.den, &rhs.den),
        }
    }
}

impl Add<f64> for TransferFunction {
    type Output = TransferFunction;

    fn add(self, k: f64) -> TransferFunction {
        self + TransferFunction::gain(k)
    }
}

impl Neg for TransferFunction {
    type Output = TransferFunction;

    fn neg(self) -> TransferFunction {
        self * -1.0
    }
}

impl Sub for TransferFunction {
    type Output = TransferFunction;

    fn sub(self, rhs: TransferFunction) -> TransferFunction {
        self + (-rhs)
    }
}

impl Div for TransferFunction {
    type Output = TransferFunction;

    fn div(self, rhs: TransferFunction) -> TransferFunction {
        TransferFunction {
            num: poly::mul(&self.num, &rhs.den),
            den: poly::mul(&self.den, &rhs.num),
        }
    }
}

/// Named linear system as an `outputs x inputs` matrix of transfer functions.
#[derive(Clone, Debug, PartialEq)]
pub struct LtiSystem {
    name: String,
    cells: Vec<Vec<TransferFunction>>,
}

impl LtiSystem {
    pub fn siso(name: impl Into<String>, tf: TransferFunction) -> Self {
        Self {
            name: name.into(),
            cells: vec![vec![tf]],
        }
    }

    pub fn tf(name: impl Into<String>, num: &[f64], den: &[f64]) -> Result<Self, ToolkitError> {
        Ok(Self::siso(name, TransferFunction::new(num, den)?))
    }

    /// Build from nested `[output][input]` coefficient lists.
    pub fn mimo(
        name: impl Into<String>,
        num: &[&[&[f64]]],
        den: &[&[&[f64]]],
    ) -> Result<Self, ToolkitError> {
        let name = name.into();
        if num.is_empty() || num.len() != den.len() {
            return Err(ToolkitError::DimensionMismatch(format!(
                "{name}: numerator has {} rows, denominator {}",
                num.len(),
                den.len()
            )));
        }
        let inputs = num[0].len();
        let mut cells = Vec::with_capacity(num.len());
        for (row_num, row_den) in num.iter().zip(den) {
            if row_num.len() != inputs || row_den.len() != inputs || inputs == 0 {
                return Err(ToolkitError::DimensionMismatch(format!(
                    "{name}: transfer matrix rows must all have {inputs} columns"
                )));
            }
            let row = row_num
                .iter()
                .zip(row_den.iter())
                .map(|(n, d)| TransferFunction::new(n, d))
                .collect::<Result<Vec<_>, _>>()?;
            cells.push(row);
        }
        Ok(Self { name, cells })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn outputs(&self) -> usize {
        self.cells.len()
    }

    pub fn inputs(&self) -> usize {
        self.cells.first().map_or(0, Vec::len)
    }

    pub fn is_siso(&self) -> bool {
        self.outputs() == 1 && self.inputs() == 1
    }

    pub fn cell(&self, output: usize, input: usize) -> &TransferFunction {
        &self.cells[output][input]
    }

    pub fn as_siso(&self) -> Result<&TransferFunction, ToolkitError> {
        if self.is_siso() {
            Ok(&self.cells[0][0])
        } else {
            Err(ToolkitError::NotSiso(self.name.clone()))
        }
    }

    pub fn poles(&self) -> Result<Vec<Complex64>, ToolkitError> {
        let mut out = Vec::new();
        for tf in self.cells.iter().flatten() {
            out.extend(tf.poles()?);
        }
        Ok(out)
    }

    pub fn zeros(&self) -> Result<Vec<Complex64>, ToolkitError> {
        let mut out = Vec::new();
        for tf in self.cells.iter().flatten() {
            out.extend(tf.zeros()?);
        }
        Ok(out)
    }
}

/// Named scalar parameters handed to a nonlinear update function.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params(BTreeMap<String, f64>);

impl Params {
    pub fn from_pairs(pairs: &[(&str, f64)]) -> Self {
        Self(pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect())
    }

    pub fn get(&self, key: &str) -> Result<f64, ToolkitError> {
        self.0
            .get(key)
            .copied()
            .ok_or_else(|| ToolkitError::MissingParameter(key.to_string()))
    }
}

pub type UpdateFn =
    dyn Fn(f64, &[f64], &[f64], &Params) -> Result<Vec<f64>, ToolkitError> + Send + Sync;

/// Nonlinear system `dx/dt = f(t, x, u, params)`.
pub struct NonlinearSystem {
    name: String,
    states: usize,
    inputs: usize,
    update: Box<UpdateFn>,
}

impl NonlinearSystem {
    pub fn new<F>(name: impl Into<String>, states: usize, inputs: usize, update: F) -> Self
    where
        F: Fn(f64, &[f64], &[f64], &Params) -> Result<Vec<f64>, ToolkitError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            states,
            inputs,
            update: Box::new(update),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn states(&self) -> usize {
        self.states
    }

    pub fn inputs(&self) -> usize {
        self.inputs
    }

    pub fn update(
        &self,
        t: f64,
        x: &[f64],
        u: &[f64],
        params: &Params,
    ) -> Result<Vec<f64>, ToolkitError> {
        let dx = (self.update)(t, x, u, params)?;
        if dx.len() != self.states {
            return Err(ToolkitError::DimensionMismatch(format!(
                "{}: update returned {} derivatives for {} states",
                self.name,
                dx.len(),
                self.states
            )));
        }
        Ok(dx)
    }
}

impl fmt::Debug for NonlinearSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NonlinearSystem")
            .field("name", &self.name)
            .field("states", &self.states)
            .field("inputs", &self.inputs)
            .finish_non_exhaustive()
    }
}

/// Symmetric saturation `clamp(x, -limit, limit)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SaturationNonlinearity {
    limit: f64,
}

impl SaturationNonlinearity {
    pub fn new(limit: f64) -> Result<Self, ToolkitError> {
        if !(limit > 0.0) {
            return Err(ToolkitError::InvalidModel(format!(
                "saturation limit must be positive, got {limit}"
            )));
        }
        Ok(Self { limit })
    }

    pub fn limit(&self) -> f64 {
        self.limit
    }

    /// Describing function gain for a sinusoid of amplitude `a`.
    pub fn describing_function(&self, amplitude: f64) -> Complex64 {
        if amplitude <= self.limit {
            return Complex64::new(1.0, 0.0);
        }
        let b = self.limit / amplitude;
        let gain = 2.0 / std::f64::consts::PI * (b.asin() + b * (1.0 - b * b).sqrt());
        Complex64::new(gain, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_builds_expected_polynomials() {
        let s = TransferFunction::s();
        let h = (s.clone() + 0.3) / (s.powi(4) + 4.0 * s.powi(3) + 6.25 * s.powi(2));
        assert_eq!(h.num(), &[1.0, 0.3]);
        assert_eq!(h.den(), &[1.0, 4.0, 6.25, 0.0, 0.0]);
    }

    #[test]
    fn scaling_keeps_denominator() {
        let h = TransferFunction::new(&[1.0], &[1.0, 2.0, 2.0, 1.0]).unwrap() * 8.0;
        assert_eq!(h.num(), &[8.0]);
        assert_eq!(h.den(), &[1.0, 2.0, 2.0, 1.0]);
    }

    #[test]
    fn mimo_rejects_ragged_rows() {
        let res = LtiSystem::mimo(
            "bad",
            &[&[&[1.0], &[1.0]], &[&[1.0]]],
            &[&[&[1.0, 1.0], &[1.0, 1.0]], &[&[1.0, 1.0]]],
        );
        assert!(matches!(res, Err(ToolkitError::DimensionMismatch(_))));
    }

    #[test]
    fn saturation_gain_drops_above_limit() {
        let sat = SaturationNonlinearity::new(1.0).unwrap();
        assert_eq!(sat.describing_function(0.5).re, 1.0);
        let g2 = sat.describing_function(2.0).re;
        let g4 = sat.describing_function(4.0).re;
        assert!(g2 < 1.0 && g4 < g2 && g4 > 0.0);
    }

    #[test]
    fn missing_param_is_reported_by_name() {
        let params = Params::from_pairs(&[("m", 1.0)]);
        assert_eq!(params.get("m").unwrap(), 1.0);
        match params.get("g") {
            Err(ToolkitError::MissingParameter(name)) => assert_eq!(name, "g"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
