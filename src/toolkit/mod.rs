//! Analysis-library boundary.
//!
//! The harness talks to control-systems analysis only through
//! [`ControlToolkit`]. Entry points whose call shape changed between library
//! generations return [`ApiCall`], so an unsupported shape is an explicit
//! value rather than a caught error.

pub mod builtin;
pub mod model;
pub mod poly;
pub mod response;
pub mod simulate;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::figure::{AxesId, Figure, LayoutMismatch};

pub use builtin::BuiltinToolkit;
pub use model::{LtiSystem, NonlinearSystem, Params, SaturationNonlinearity, TransferFunction};
pub use response::{
    DescribingFunctionResponse, FrequencyResponse, StepResponse, StepResponseList, TimeResponse,
};

#[derive(Debug, thiserror::Error)]
pub enum ToolkitError {
    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("{0} is not a SISO system")]
    NotSiso(String),

    #[error("missing parameter `{0}`")]
    MissingParameter(String),

    #[error("numerical failure: {0}")]
    Numerical(String),

    #[error(transparent)]
    Layout(#[from] LayoutMismatch),
}

/// Generation of the analysis API being driven.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApiLevel {
    /// Per-object calls only: plotting and step responses take one system.
    Legacy,
    /// Unified calls accepting lists of systems.
    #[default]
    Current,
}

impl FromStr for ApiLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "legacy" => Ok(Self::Legacy),
            "current" => Ok(Self::Current),
            other => Err(format!("unknown api level `{other}` (expected legacy or current)")),
        }
    }
}

impl fmt::Display for ApiLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Legacy => "legacy",
            Self::Current => "current",
        })
    }
}

/// An entry point the installed toolkit does not offer in the requested shape.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{call}: {reason}")]
pub struct Unsupported {
    pub call: &'static str,
    pub reason: String,
}

/// Result of a call whose shape may be missing from the installed toolkit.
#[must_use]
#[derive(Clone, Debug, PartialEq)]
pub enum ApiCall<T> {
    Supported(T),
    UnsupportedApi(Unsupported),
}

impl<T> ApiCall<T> {
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Supported(_))
    }

    pub fn supported(self) -> Result<T, Unsupported> {
        match self {
            Self::Supported(value) => Ok(value),
            Self::UnsupportedApi(u) => Err(u),
        }
    }

    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<ApiCall<U>, E> {
        match self {
            Self::Supported(value) => f(value).map(ApiCall::Supported),
            Self::UnsupportedApi(u) => Ok(ApiCall::UnsupportedApi(u)),
        }
    }
}

/// Initial-condition layout and integration settings for a phase portrait.
#[derive(Clone, Debug, PartialEq)]
pub struct PhasePlaneSpec {
    /// `[x_min, x_max, y_min, y_max]`.
    pub bounds: [f64; 4],
    /// Integration time, forwards and backwards from each initial condition.
    pub time: f64,
    /// Meshgrid of initial conditions, `(columns, rows)`.
    pub grid: (usize, usize),
    /// Direction arrows per trajectory.
    pub arrows: usize,
    /// Seed grid for the equilibrium search; `None` skips separatrices.
    pub separatrix_grid: Option<(usize, usize)>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RootLocusOptions {
    /// Overlay constant-damping and natural-frequency gridlines.
    pub grid: bool,
    /// Draw into this axes instead of laying out a fresh 1x1 figure.
    pub axes: Option<AxesId>,
}

/// Control-systems analysis and plotting calls used by the gallery.
pub trait ControlToolkit {
    fn api_level(&self) -> ApiLevel;

    /// Frequency responses on each system's default grid.
    fn frequency_response(
        &self,
        systems: &[&LtiSystem],
    ) -> Result<Vec<FrequencyResponse>, ToolkitError>;

    /// Bode magnitude/phase grid for one or more systems.
    fn bode_plot(
        &self,
        systems: &[&LtiSystem],
        figure: &mut Figure,
    ) -> Result<ApiCall<()>, ToolkitError>;

    fn nichols_plot(
        &self,
        responses: &[FrequencyResponse],
        figure: &mut Figure,
    ) -> Result<(), ToolkitError>;

    fn nyquist_plot(&self, systems: &[&LtiSystem], figure: &mut Figure)
    -> Result<(), ToolkitError>;

    fn describing_function_response(
        &self,
        h: &TransferFunction,
        nonlinearity: &SaturationNonlinearity,
        amplitudes: &[f64],
    ) -> Result<DescribingFunctionResponse, ToolkitError>;

    fn phase_plane_plot(
        &self,
        system: &NonlinearSystem,
        spec: &PhasePlaneSpec,
        params: &Params,
        figure: &mut Figure,
    ) -> Result<(), ToolkitError>;

    fn pole_zero_plot(
        &self,
        systems: &[&LtiSystem],
        figure: &mut Figure,
    ) -> Result<(), ToolkitError>;

    fn root_locus_plot(
        &self,
        systems: &[&LtiSystem],
        options: RootLocusOptions,
        figure: &mut Figure,
    ) -> Result<(), ToolkitError>;

    /// Interactive-design layout: Bode, root locus and closed-loop step.
    fn sisotool(&self, system: &LtiSystem, figure: &mut Figure) -> Result<(), ToolkitError>;

    fn step_response(
        &self,
        systems: &[&LtiSystem],
    ) -> Result<ApiCall<StepResponseList>, ToolkitError>;

    /// Forced response from rest; `inputs` is one sample row per input.
    fn input_output_response(
        &self,
        system: &LtiSystem,
        time: &[f64],
        inputs: &[Vec<f64>],
    ) -> Result<TimeResponse, ToolkitError>;

    /// Merge responses over the same time grid into one multi-trace response.
    fn combine_time_responses(
        &self,
        responses: Vec<TimeResponse>,
        trace_labels: Option<&[&str]>,
    ) -> Result<TimeResponse, ToolkitError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_level_parses_both_generations() {
        assert_eq!("legacy".parse::<ApiLevel>().unwrap(), ApiLevel::Legacy);
        assert_eq!("current".parse::<ApiLevel>().unwrap(), ApiLevel::Current);
        assert!("v2".parse::<ApiLevel>().is_err());
    }

    #[test]
    fn try_map_passes_unsupported_through() {
        let call: ApiCall<u8> = ApiCall::UnsupportedApi(Unsupported {
            call: "step_response",
            reason: "list of systems".into(),
        });
        let mapped: Result<ApiCall<u16>, ()> = call.try_map(|v| Ok(u16::from(v)));
        assert!(!mapped.unwrap().is_supported());
    }
}
