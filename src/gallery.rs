//! The gallery itself: shared systems and the ordered scenario list.

use std::f64::consts::PI;

use crate::error::GalleryError;
use crate::scenario::{GalleryEntry, Scenario};
use crate::toolkit::simulate::linspace;
use crate::toolkit::{
    ApiCall, ControlToolkit, LtiSystem, NonlinearSystem, Params, PhasePlaneSpec,
    RootLocusOptions, SaturationNonlinearity, ToolkitError, TransferFunction,
};

pub fn sys1() -> Result<LtiSystem, ToolkitError> {
    LtiSystem::tf("sys1", &[1.0], &[1.0, 2.0, 1.0])
}

pub fn sys2() -> Result<LtiSystem, ToolkitError> {
    LtiSystem::tf("sys2", &[1.0, 0.2], &[1.0, 1.0, 3.0, 1.0, 1.0])
}

pub fn sys_mimo1() -> Result<LtiSystem, ToolkitError> {
    LtiSystem::mimo(
        "sys_mimo1",
        &[&[&[1.0], &[0.1]], &[&[0.2], &[1.0]]],
        &[
            &[&[1.0, 0.6, 1.0], &[1.0, 1.0, 1.0]],
            &[&[1.0, 0.4, 1.0], &[1.0, 2.0, 1.0]],
        ],
    )
}

pub fn sys_mimo2() -> Result<LtiSystem, ToolkitError> {
    LtiSystem::mimo(
        "sys_mimo2",
        &[&[&[1.0], &[0.1]], &[&[0.2], &[1.0]]],
        &[
            &[&[1.0, 0.2, 1.0], &[1.0, 24.0, 22.0, 5.0]],
            &[&[1.0, 4.0, 16.0, 21.0], &[1.0, 0.1]],
        ],
    )
}

fn mimo_pair(_: &dyn ControlToolkit) -> Result<(LtiSystem, LtiSystem), GalleryError> {
    Ok((sys_mimo1()?, sys_mimo2()?))
}

fn siso_pair(_: &dyn ControlToolkit) -> Result<(LtiSystem, LtiSystem), GalleryError> {
    Ok((sys1()?, sys2()?))
}

/// Every gallery scenario, in page order.
pub fn scenarios() -> Vec<Box<dyn GalleryEntry>> {
    vec![
        bode(),
        describing_function(),
        nichols(),
        nyquist(),
        phase_plane(),
        pole_zero(),
        root_locus(),
        sisotool(),
        step_response(),
        time_response(),
    ]
}

fn bode() -> Box<dyn GalleryEntry> {
    Scenario::new("Bode plot", mimo_pair, |tk, (m1, m2), fig| {
        Ok(tk.bode_plot(&[m1, m2], fig)?)
    })
    .with_fallback(|tk, (m1, m2), fig| {
        tk.bode_plot(&[m1], fig)?.supported()?;
        tk.bode_plot(&[m2], fig)?.supported()?;
        Ok(())
    })
    .boxed()
}

struct DescribingFunctionInputs {
    h: TransferFunction,
    saturation: SaturationNonlinearity,
    amplitudes: Vec<f64>,
}

fn describing_function() -> Box<dyn GalleryEntry> {
    Scenario::new(
        "Describing function plot",
        |_| {
            Ok(DescribingFunctionInputs {
                h: TransferFunction::new(&[1.0], &[1.0, 2.0, 2.0, 1.0])? * 8.0,
                saturation: SaturationNonlinearity::new(1.0)?,
                amplitudes: linspace(1.0, 4.0, 10),
            })
        },
        |tk, inputs: &DescribingFunctionInputs, fig| {
            tk.describing_function_response(&inputs.h, &inputs.saturation, &inputs.amplitudes)?
                .plot(fig)?;
            Ok(ApiCall::Supported(()))
        },
    )
    .boxed()
}

fn nichols() -> Box<dyn GalleryEntry> {
    Scenario::new("Nichols chart", siso_pair, |tk, (s1, s2), fig| {
        let responses = tk.frequency_response(&[s1, s2])?;
        tk.nichols_plot(&responses, fig)?;
        Ok(ApiCall::Supported(()))
    })
    .boxed()
}

fn nyquist() -> Box<dyn GalleryEntry> {
    Scenario::new("Nyquist plot", siso_pair, |tk, (s1, s2), fig| {
        tk.nyquist_plot(&[s1, s2], fig)?;
        Ok(ApiCall::Supported(()))
    })
    .boxed()
}

/// Damped inverted pendulum driven by a torque input.
pub fn inverted_pendulum() -> NonlinearSystem {
    NonlinearSystem::new("invpend", 2, 1, |_t, x, u, params: &Params| {
        let (m, l, b, g) = (
            params.get("m")?,
            params.get("l")?,
            params.get("b")?,
            params.get("g")?,
        );
        Ok(vec![x[1], -b / m * x[1] + (g * l / m) * x[0].sin() + u[0] / m])
    })
}

fn phase_plane() -> Box<dyn GalleryEntry> {
    Scenario::new(
        "Phase plane plot",
        |_| {
            let spec = PhasePlaneSpec {
                bounds: [-2.0 * PI, 2.0 * PI, -2.0, 2.0],
                time: 5.0,
                grid: (5, 8),
                arrows: 3,
                separatrix_grid: Some((12, 9)),
            };
            let params = Params::from_pairs(&[("m", 1.0), ("l", 1.0), ("b", 0.2), ("g", 1.0)]);
            Ok((inverted_pendulum(), spec, params))
        },
        |tk, (sys, spec, params), fig| {
            tk.phase_plane_plot(sys, spec, params, fig)?;
            Ok(ApiCall::Supported(()))
        },
    )
    .boxed()
}

fn pole_zero() -> Box<dyn GalleryEntry> {
    Scenario::new(
        "Pole/zero map",
        |_| {
            let t = LtiSystem::tf(
                "T",
                &[
                    -9.0250000e-01,
                    -4.7200750e+01,
                    -8.6812900e+02,
                    5.6261850e+03,
                    2.1258472e+05,
                    8.4724600e+05,
                    1.0192000e+06,
                    2.3520000e+05,
                ],
                &[
                    9.02500000e-03,
                    9.92862812e-01,
                    4.96974094e+01,
                    1.35705659e+03,
                    2.09294163e+04,
                    1.64898435e+05,
                    6.54572220e+05,
                    1.25274600e+06,
                    1.02420000e+06,
                    2.35200000e+05,
                ],
            )?;
            Ok((t, sys2()?))
        },
        |tk, (t, s2), fig| {
            tk.pole_zero_plot(&[t, s2], fig)?;
            Ok(ApiCall::Supported(()))
        },
    )
    .boxed()
}

fn root_locus() -> Box<dyn GalleryEntry> {
    Scenario::new(
        "Root locus plot",
        |_| Ok((LtiSystem::tf("sys1", &[1.0, 2.0], &[1.0, 2.0, 3.0])?, sys2()?)),
        |tk, (s1, s2), fig| {
            let cells = fig.subplots(2, 1);
            for (id, grid) in cells.into_iter().zip([true, false]) {
                let options = RootLocusOptions {
                    grid,
                    axes: Some(id),
                };
                tk.root_locus_plot(&[s1, s2], options, fig)?;
            }
            fig.set_title("Root locus plots (w/ specified axes)");
            Ok(ApiCall::Supported(()))
        },
    )
    .boxed()
}

fn sisotool() -> Box<dyn GalleryEntry> {
    Scenario::new(
        "sisotool",
        |_| {
            let s = TransferFunction::s();
            let h = (s.clone() + 0.3) / (s.powi(4) + 4.0 * s.powi(3) + 6.25 * s.powi(2));
            Ok(LtiSystem::siso("H", h))
        },
        |tk, h, fig| {
            tk.sisotool(h, fig)?;
            Ok(ApiCall::Supported(()))
        },
    )
    .boxed()
}

fn step_response() -> Box<dyn GalleryEntry> {
    Scenario::new("step response", mimo_pair, |tk, (m1, m2), fig| {
        Ok(tk.step_response(&[m1, m2])?.try_map(|list| list.plot(fig))?)
    })
    .with_fallback(|tk, (m1, m2), fig| {
        tk.step_response(&[m1])?.supported()?.plot(fig)?;
        tk.step_response(&[m2])?.supported()?.plot(fig)?;
        Ok(())
    })
    .boxed()
}

const TRACE_LABELS: [&str; 2] = ["resp1", "resp2"];

fn time_response() -> Box<dyn GalleryEntry> {
    Scenario::new(
        "time response",
        |_| {
            let t = linspace(0.0, 10.0, 50);
            let sin: Vec<f64> = t.iter().map(|t| t.sin()).collect();
            let cos2: Vec<f64> = t.iter().map(|t| (2.0 * t).cos()).collect();
            Ok((sys_mimo1()?, t, [vec![sin.clone(), cos2.clone()], vec![cos2, sin]]))
        },
        |tk, (sys, t, inputs), fig| {
            let responses = inputs
                .iter()
                .map(|u| tk.input_output_response(sys, t, u))
                .collect::<Result<Vec<_>, _>>()?;
            let combined = tk.combine_time_responses(responses, Some(&TRACE_LABELS[..]))?;
            if combined.trace_labels() != TRACE_LABELS {
                return Err(GalleryError::Check {
                    scenario: "time response".into(),
                    message: format!(
                        "combined response carries traces {:?}, expected {:?}",
                        combined.trace_labels(),
                        TRACE_LABELS
                    ),
                });
            }
            combined.plot(fig, true)?;
            Ok(ApiCall::Supported(()))
        },
    )
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_names_are_unique_and_ordered() {
        let names: Vec<&str> = scenarios().iter().map(|s| s.name()).collect();
        assert_eq!(names.len(), 10);
        assert_eq!(names[0], "Bode plot");
        assert_eq!(names[6], "Root locus plot");
        assert_eq!(names[9], "time response");
        let mut sorted = names.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), names.len());
    }

    #[test]
    fn only_list_calls_carry_fallbacks() {
        let with: Vec<&str> = scenarios()
            .iter()
            .filter(|s| s.has_fallback())
            .map(|s| s.name())
            .collect();
        assert_eq!(with, ["Bode plot", "step response"]);
    }

    #[test]
    fn shared_systems_have_expected_shapes() {
        let m1 = sys_mimo1().unwrap();
        let m2 = sys_mimo2().unwrap();
        assert_eq!((m1.outputs(), m1.inputs()), (2, 2));
        assert_eq!((m2.outputs(), m2.inputs()), (2, 2));
        assert!(sys1().unwrap().is_siso());
    }

    #[test]
    fn pendulum_update_matches_equations() {
        let params = Params::from_pairs(&[("m", 1.0), ("l", 1.0), ("b", 0.2), ("g", 1.0)]);
        let dx = inverted_pendulum()
            .update(0.0, &[PI / 2.0, 1.0], &[0.5], &params)
            .unwrap();
        assert!((dx[0] - 1.0).abs() < 1e-12);
        assert!((dx[1] - (-0.2 + 1.0 + 0.5)).abs() < 1e-12);
    }

    #[test]
    fn pendulum_requires_all_parameters() {
        let params = Params::from_pairs(&[("m", 1.0)]);
        assert!(inverted_pendulum().update(0.0, &[0.0, 0.0], &[0.0], &params).is_err());
    }
}
