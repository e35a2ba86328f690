//! Small in-process implementation of [`ControlToolkit`].
//!
//! It exists so the gallery has something concrete to drive. It can
//! impersonate the legacy API generation, where the list-taking plot and
//! step-response calls are missing.

use rustfft::num_complex::Complex64;
use tracing::debug;

use crate::figure::{AxesId, Figure, GridStyle, MarkerShape, Point, Trace};

use super::model::{LtiSystem, NonlinearSystem, Params, SaturationNonlinearity, TransferFunction};
use super::response::{
    DescribingFunctionResponse, FrequencyResponse, Intersection, ResponseTrace, StepResponse,
    StepResponseList, TimeResponse,
};
use super::simulate::{default_horizon, default_omega, linspace, logspace, rk4_step, simulate};
use super::{
    ApiCall, ApiLevel, ControlToolkit, PhasePlaneSpec, RootLocusOptions, ToolkitError, Unsupported,
};

/// Nyquist curves are radially clipped to this magnitude.
const NYQUIST_MAX_MAGNITUDE: f64 = 20.0;
const LOCUS_GAINS: usize = 200;
const PHASE_PLANE_STEPS: usize = 200;
const BISECTION_STEPS: usize = 60;

#[derive(Clone, Debug)]
pub struct BuiltinToolkit {
    level: ApiLevel,
    frequency_points: usize,
    time_points: usize,
}

impl Default for BuiltinToolkit {
    fn default() -> Self {
        Self::new(ApiLevel::Current)
    }
}

impl BuiltinToolkit {
    pub fn new(level: ApiLevel) -> Self {
        Self {
            level,
            frequency_points: 400,
            time_points: 300,
        }
    }

    fn single_system_only(&self, call: &'static str, count: usize) -> Option<Unsupported> {
        if self.level == ApiLevel::Legacy && count > 1 {
            debug!(call, count, "list-of-systems call unavailable at legacy api level");
            return Some(Unsupported {
                call,
                reason: format!("legacy API accepts one system per call, got {count}"),
            });
        }
        None
    }

    fn shared_omega(&self, systems: &[&LtiSystem]) -> Result<Vec<f64>, ToolkitError> {
        let mut features = Vec::new();
        for sys in systems {
            features.extend(sys.poles()?);
            features.extend(sys.zeros()?);
        }
        Ok(default_omega(&features, self.frequency_points))
    }

    fn step_time(&self, systems: &[&LtiSystem]) -> Result<Vec<f64>, ToolkitError> {
        let mut horizon: f64 = 0.0;
        for sys in systems {
            horizon = horizon.max(default_horizon(&sys.poles()?));
        }
        Ok(linspace(0.0, horizon, self.time_points))
    }
}

fn require_systems(call: &str, systems: &[&LtiSystem]) -> Result<(), ToolkitError> {
    if systems.is_empty() {
        return Err(ToolkitError::InvalidModel(format!("{call} needs at least one system")));
    }
    Ok(())
}

fn names(systems: &[&LtiSystem]) -> String {
    systems
        .iter()
        .map(|s| s.name())
        .collect::<Vec<_>>()
        .join(", ")
}

fn to_points(values: &[Complex64]) -> Vec<Point> {
    values.iter().map(|z| (z.re, z.im)).collect()
}

fn clip_magnitude(z: Complex64, max: f64) -> Complex64 {
    let mag = z.norm();
    if mag > max { z * (max / mag) } else { z }
}

/// Closed-loop pole branches for gains from zero upward, matched greedily so
/// each branch stays continuous.
fn locus_branches(tf: &TransferFunction) -> Result<Vec<Vec<Point>>, ToolkitError> {
    let mut gains = vec![0.0];
    gains.extend(logspace(-3.0, 3.0, LOCUS_GAINS));

    let start = super::poly::roots(&tf.characteristic(0.0))?;
    let mut branches: Vec<Vec<Complex64>> = start.into_iter().map(|r| vec![r]).collect();

    for &k in &gains[1..] {
        let mut next = super::poly::roots(&tf.characteristic(k))?;
        if next.len() != branches.len() {
            return Err(ToolkitError::Numerical(format!(
                "root locus order changed from {} to {} at gain {k}",
                branches.len(),
                next.len()
            )));
        }
        for branch in &mut branches {
            let Some(&last) = branch.last() else {
                continue;
            };
            let (idx, _) = next
                .iter()
                .enumerate()
                .map(|(i, r)| (i, (r - last).norm()))
                .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best });
            branch.push(next.swap_remove(idx));
        }
    }
    Ok(branches.iter().map(|b| to_points(b)).collect())
}

fn push_pole_zero_markers(
    axes: &mut crate::figure::Axes,
    color: usize,
    poles: &[Complex64],
    zeros: &[Complex64],
    label: Option<&str>,
) {
    let mut pole_trace = Trace::markers(MarkerShape::Cross, color, to_points(poles));
    if let Some(label) = label {
        pole_trace = pole_trace.labelled(label);
    }
    axes.push(pole_trace);
    if !zeros.is_empty() {
        axes.push(Trace::markers(MarkerShape::Circle, color, to_points(zeros)));
    }
}

fn bisect(mut lo: f64, mut hi: f64, f: impl Fn(f64) -> f64) -> f64 {
    let f_lo = f(lo);
    for _ in 0..BISECTION_STEPS {
        let mid = 0.5 * (lo + hi);
        if (f(mid) > 0.0) == (f_lo > 0.0) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

type Jacobian = [[f64; 2]; 2];

fn numeric_jacobian<F>(f: &F, x: [f64; 2]) -> Result<Jacobian, ToolkitError>
where
    F: Fn(&[f64]) -> Result<Vec<f64>, ToolkitError>,
{
    let eps = 1e-6;
    let mut jac = [[0.0; 2]; 2];
    for col in 0..2 {
        let mut plus = x;
        let mut minus = x;
        plus[col] += eps;
        minus[col] -= eps;
        let fp = f(&plus)?;
        let fm = f(&minus)?;
        for row in 0..2 {
            jac[row][col] = (fp[row] - fm[row]) / (2.0 * eps);
        }
    }
    Ok(jac)
}

fn newton_equilibrium<F>(f: &F, start: [f64; 2]) -> Result<Option<[f64; 2]>, ToolkitError>
where
    F: Fn(&[f64]) -> Result<Vec<f64>, ToolkitError>,
{
    let mut x = start;
    for _ in 0..50 {
        let fx = f(&x)?;
        if fx[0].hypot(fx[1]) < 1e-10 {
            return Ok(Some(x));
        }
        let j = numeric_jacobian(f, x)?;
        let det = j[0][0] * j[1][1] - j[0][1] * j[1][0];
        if det.abs() < 1e-12 {
            return Ok(None);
        }
        x[0] -= (j[1][1] * fx[0] - j[0][1] * fx[1]) / det;
        x[1] -= (-j[1][0] * fx[0] + j[0][0] * fx[1]) / det;
        if !x[0].is_finite() || !x[1].is_finite() {
            return Ok(None);
        }
    }
    let fx = f(&x)?;
    Ok((fx[0].hypot(fx[1]) < 1e-8).then_some(x))
}

/// Real eigenpairs of a saddle, `(stable, unstable)` eigenvectors.
fn saddle_directions(j: &Jacobian) -> Option<([f64; 2], [f64; 2])> {
    let tr = j[0][0] + j[1][1];
    let det = j[0][0] * j[1][1] - j[0][1] * j[1][0];
    if det >= 0.0 {
        return None;
    }
    let root = (tr * tr - 4.0 * det).sqrt();
    let eigvec = |lambda: f64| {
        let v = if j[0][1].abs() > 1e-12 {
            [j[0][1], lambda - j[0][0]]
        } else {
            [lambda - j[1][1], j[1][0]]
        };
        let n = v[0].hypot(v[1]);
        [v[0] / n, v[1] / n]
    };
    Some((eigvec(0.5 * (tr - root)), eigvec(0.5 * (tr + root))))
}

impl ControlToolkit for BuiltinToolkit {
    fn api_level(&self) -> ApiLevel {
        self.level
    }

    fn frequency_response(
        &self,
        systems: &[&LtiSystem],
    ) -> Result<Vec<FrequencyResponse>, ToolkitError> {
        require_systems("frequency_response", systems)?;
        systems
            .iter()
            .map(|sys| {
                let omega = self.shared_omega(&[*sys])?;
                Ok(FrequencyResponse::compute(sys, omega))
            })
            .collect()
    }

    fn bode_plot(
        &self,
        systems: &[&LtiSystem],
        figure: &mut Figure,
    ) -> Result<ApiCall<()>, ToolkitError> {
        if let Some(unsupported) = self.single_system_only("bode_plot", systems.len()) {
            return Ok(ApiCall::UnsupportedApi(unsupported));
        }
        require_systems("bode_plot", systems)?;
        let omega = self.shared_omega(systems)?;
        for sys in systems {
            FrequencyResponse::compute(sys, omega.clone()).bode_into(figure)?;
        }
        figure.set_title(format!("Bode plot for {}", names(systems)));
        Ok(ApiCall::Supported(()))
    }

    fn nichols_plot(
        &self,
        responses: &[FrequencyResponse],
        figure: &mut Figure,
    ) -> Result<(), ToolkitError> {
        for response in responses {
            response.nichols_into(figure)?;
        }
        let joined: Vec<&str> = responses.iter().map(FrequencyResponse::system).collect();
        figure.set_title(format!("Nichols chart for {}", joined.join(", ")));
        Ok(())
    }

    fn nyquist_plot(
        &self,
        systems: &[&LtiSystem],
        figure: &mut Figure,
    ) -> Result<(), ToolkitError> {
        require_systems("nyquist_plot", systems)?;
        let omega = self.shared_omega(systems)?;
        let mut curves = Vec::with_capacity(systems.len());
        for sys in systems {
            let tf = sys.as_siso()?;
            let values: Vec<Complex64> = omega
                .iter()
                .map(|&w| clip_magnitude(tf.eval(Complex64::new(0.0, w)), NYQUIST_MAX_MAGNITUDE))
                .collect();
            curves.push((sys.name(), values));
        }

        figure.ensure_grid(1, 1)?;
        figure.set_title(format!("Nyquist plot for {}", names(systems)));
        let Some(axes) = figure.grid_axes_mut(0, 0) else {
            return Ok(());
        };
        axes.set_labels("Real", "Imaginary");
        axes.grid = GridStyle::Cartesian;
        for (name, values) in curves {
            let color = axes.next_color();
            let mirror: Vec<Point> = values.iter().map(|z| (z.re, -z.im)).collect();
            axes.push(Trace::line(color, to_points(&values)).labelled(name));
            axes.push(Trace::dashed(color, mirror));
        }
        let color = axes.next_color();
        axes.push(Trace::markers(MarkerShape::Cross, color, vec![(-1.0, 0.0)]));
        Ok(())
    }

    fn describing_function_response(
        &self,
        h: &TransferFunction,
        nonlinearity: &SaturationNonlinearity,
        amplitudes: &[f64],
    ) -> Result<DescribingFunctionResponse, ToolkitError> {
        let (Some(&a_min), Some(&a_max)) = (
            amplitudes.iter().min_by(|a, b| a.total_cmp(b)),
            amplitudes.iter().max_by(|a, b| a.total_cmp(b)),
        ) else {
            return Err(ToolkitError::InvalidModel(
                "describing function needs at least one amplitude".into(),
            ));
        };

        let mut features = h.poles()?;
        features.extend(h.zeros()?);
        let omega = default_omega(&features, self.frequency_points);
        let eval = |w: f64| h.eval(Complex64::new(0.0, w));
        let nyquist: Vec<Complex64> = omega.iter().map(|&w| eval(w)).collect();
        let locus = amplitudes
            .iter()
            .map(|&a| -1.0 / nonlinearity.describing_function(a))
            .collect();

        // Saturation has a real describing function, so crossings sit on the
        // negative real axis where Im H(jw) changes sign.
        let mut intersections = Vec::new();
        for pair in omega.windows(2) {
            let (z0, z1) = (eval(pair[0]), eval(pair[1]));
            if (z0.im > 0.0) == (z1.im > 0.0) {
                continue;
            }
            let w = bisect(pair[0], pair[1], |w| eval(w).im);
            let point = eval(w);
            if point.re >= 0.0 {
                continue;
            }
            let target = -1.0 / point.re;
            let gain = |a: f64| nonlinearity.describing_function(a).re - target;
            if (gain(a_min) > 0.0) == (gain(a_max) > 0.0) {
                continue;
            }
            let amplitude = bisect(a_min, a_max, gain);
            intersections.push(Intersection {
                amplitude,
                omega: w,
                point,
            });
        }
        debug!(found = intersections.len(), "describing function intersections");

        Ok(DescribingFunctionResponse {
            omega,
            nyquist,
            amplitudes: amplitudes.to_vec(),
            locus,
            intersections,
        })
    }

    fn phase_plane_plot(
        &self,
        system: &NonlinearSystem,
        spec: &PhasePlaneSpec,
        params: &Params,
        figure: &mut Figure,
    ) -> Result<(), ToolkitError> {
        if system.states() != 2 {
            return Err(ToolkitError::InvalidModel(format!(
                "{}: phase plane needs 2 states, has {}",
                system.name(),
                system.states()
            )));
        }
        let [x_min, x_max, y_min, y_max] = spec.bounds;
        let pad_x = 0.1 * (x_max - x_min);
        let pad_y = 0.1 * (y_max - y_min);
        let inside = |x: &[f64]| {
            x[0] >= x_min - pad_x && x[0] <= x_max + pad_x && x[1] >= y_min - pad_y
                && x[1] <= y_max + pad_y
        };
        let u = vec![0.0; system.inputs()];
        let field = |x: &[f64]| system.update(0.0, x, &u, params);
        let h = spec.time / PHASE_PLANE_STEPS as f64;

        let integrate = |start: [f64; 2], direction: f64| -> Result<Vec<Point>, ToolkitError> {
            let f = |_t: f64, x: &[f64]| -> Result<Vec<f64>, ToolkitError> {
                Ok(field(x)?.into_iter().map(|v| v * direction).collect())
            };
            let mut x = start.to_vec();
            let mut points = vec![(x[0], x[1])];
            for k in 0..PHASE_PLANE_STEPS {
                x = rk4_step(&f, k as f64 * h, &x, h)?;
                if !x.iter().all(|v| v.is_finite()) || !inside(&x) {
                    break;
                }
                points.push((x[0], x[1]));
            }
            Ok(points)
        };

        let mut streams = Vec::new();
        let mut arrows = Vec::new();
        let (nx, ny) = spec.grid;
        for &x0 in &linspace(x_min, x_max, nx) {
            for &y0 in &linspace(y_min, y_max, ny) {
                let mut path: Vec<Point> = integrate([x0, y0], -1.0)?;
                path.reverse();
                path.pop();
                path.extend(integrate([x0, y0], 1.0)?);
                for a in 1..=spec.arrows {
                    let idx = a * path.len() / (spec.arrows + 1);
                    if let Some(&p) = path.get(idx) {
                        arrows.push(p);
                    }
                }
                streams.push(path);
            }
        }

        let mut equilibria: Vec<[f64; 2]> = Vec::new();
        let mut stable_lines = Vec::new();
        let mut unstable_lines = Vec::new();
        if let Some((sx, sy)) = spec.separatrix_grid {
            let tol = 1e-9 * (x_max - x_min).max(y_max - y_min);
            for &x0 in &linspace(x_min, x_max, sx) {
                for &y0 in &linspace(y_min, y_max, sy) {
                    let Some(eq) = newton_equilibrium(&field, [x0, y0])? else {
                        continue;
                    };
                    let in_bounds = eq[0] >= x_min - tol
                        && eq[0] <= x_max + tol
                        && eq[1] >= y_min - tol
                        && eq[1] <= y_max + tol;
                    let known = equilibria
                        .iter()
                        .any(|e| (e[0] - eq[0]).hypot(e[1] - eq[1]) < 1e-5);
                    if in_bounds && !known {
                        equilibria.push(eq);
                    }
                }
            }
            let delta = 1e-3 * (x_max - x_min).max(y_max - y_min);
            for eq in &equilibria {
                let jac = numeric_jacobian(&field, *eq)?;
                let Some((stable, unstable)) = saddle_directions(&jac) else {
                    continue;
                };
                for sign in [1.0, -1.0] {
                    let s0 = [eq[0] + sign * delta * stable[0], eq[1] + sign * delta * stable[1]];
                    stable_lines.push(integrate(s0, -1.0)?);
                    let u0 = [
                        eq[0] + sign * delta * unstable[0],
                        eq[1] + sign * delta * unstable[1],
                    ];
                    unstable_lines.push(integrate(u0, 1.0)?);
                }
            }
            debug!(
                equilibria = equilibria.len(),
                separatrices = stable_lines.len() + unstable_lines.len(),
                "phase plane separatrices"
            );
        }

        figure.ensure_grid(1, 1)?;
        figure.set_title(format!("Phase portrait for {}", system.name()));
        let Some(axes) = figure.grid_axes_mut(0, 0) else {
            return Ok(());
        };
        axes.set_labels("x[0]", "x[1]");
        axes.grid = GridStyle::Cartesian;
        let stream_color = axes.next_color();
        for path in streams {
            axes.push(Trace::line(stream_color, path));
        }
        axes.push(Trace::markers(MarkerShape::Triangle, stream_color, arrows));
        if spec.separatrix_grid.is_some() {
            let stable_color = axes.next_color();
            let unstable_color = axes.next_color();
            for line in stable_lines {
                axes.push(Trace::dashed(stable_color, line));
            }
            for line in unstable_lines {
                axes.push(Trace::dashed(unstable_color, line));
            }
            let eq_color = axes.next_color();
            let points = equilibria.iter().map(|e| (e[0], e[1])).collect();
            axes.push(Trace::markers(MarkerShape::Circle, eq_color, points).labelled("equilibria"));
        }
        Ok(())
    }

    fn pole_zero_plot(
        &self,
        systems: &[&LtiSystem],
        figure: &mut Figure,
    ) -> Result<(), ToolkitError> {
        require_systems("pole_zero_plot", systems)?;
        let mut maps = Vec::with_capacity(systems.len());
        for sys in systems {
            maps.push((sys.name(), sys.poles()?, sys.zeros()?));
        }
        figure.ensure_grid(1, 1)?;
        figure.set_title(format!("Pole/zero plot for {}", names(systems)));
        let Some(axes) = figure.grid_axes_mut(0, 0) else {
            return Ok(());
        };
        axes.set_labels("Real", "Imaginary");
        axes.grid = GridStyle::Cartesian;
        for (name, poles, zeros) in maps {
            let color = axes.next_color();
            push_pole_zero_markers(axes, color, &poles, &zeros, Some(name));
        }
        Ok(())
    }

    fn root_locus_plot(
        &self,
        systems: &[&LtiSystem],
        options: RootLocusOptions,
        figure: &mut Figure,
    ) -> Result<(), ToolkitError> {
        require_systems("root_locus_plot", systems)?;
        let mut loci = Vec::with_capacity(systems.len());
        for sys in systems {
            let tf = sys.as_siso()?;
            loci.push((sys.name(), locus_branches(tf)?, tf.poles()?, tf.zeros()?));
        }

        let id = match options.axes {
            Some(id) => id,
            None => {
                figure.ensure_grid(1, 1)?;
                figure.set_title(format!("Root locus plot for {}", names(systems)));
                AxesId(0)
            }
        };
        let axes = figure.axes_mut(id).ok_or_else(|| {
            ToolkitError::InvalidModel(format!("figure has no axes {}", id.0))
        })?;
        axes.title = Some(format!("Root locus for {}", names(systems)));
        axes.set_labels("Real", "Imaginary");
        axes.grid = if options.grid {
            GridStyle::SPlane
        } else {
            GridStyle::None
        };
        for (name, branches, poles, zeros) in loci {
            let color = axes.next_color();
            for (n, branch) in branches.into_iter().enumerate() {
                let trace = Trace::line(color, branch);
                axes.push(if n == 0 { trace.labelled(name) } else { trace });
            }
            push_pole_zero_markers(axes, color, &poles, &zeros, None);
        }
        Ok(())
    }

    fn sisotool(&self, system: &LtiSystem, figure: &mut Figure) -> Result<(), ToolkitError> {
        let tf = system.as_siso()?;
        let response = FrequencyResponse::compute(system, self.shared_omega(&[system])?);
        let branches = locus_branches(tf)?;
        let (poles, zeros) = (tf.poles()?, tf.zeros()?);

        let closed = tf.unity_feedback(1.0);
        let closed_poles = closed.poles()?;
        let time = linspace(0.0, default_horizon(&closed_poles), self.time_points);
        let step = simulate(&closed, &time, &vec![1.0; time.len()])?;

        let ids = figure.subplots(2, 2);
        figure.set_title(format!("Sisotool: {}", system.name()));
        let omega = response.omega().to_vec();

        if let Some(axes) = figure.axes_mut(ids[0]) {
            axes.title = Some("Bode plot".to_string());
            axes.y_label = Some("Magnitude (dB)".to_string());
            axes.log_x = true;
            axes.grid = GridStyle::Cartesian;
            let points = omega.iter().copied().zip(response.magnitude_db(0, 0)).collect();
            let color = axes.next_color();
            axes.push(Trace::line(color, points));
        }
        if let Some(axes) = figure.axes_mut(ids[1]) {
            axes.title = Some("Root locus".to_string());
            axes.set_labels("Real", "Imaginary");
            axes.grid = GridStyle::SPlane;
            let color = axes.next_color();
            for branch in branches {
                axes.push(Trace::line(color, branch));
            }
            push_pole_zero_markers(axes, color, &poles, &zeros, None);
            let gain_color = axes.next_color();
            axes.push(
                Trace::markers(MarkerShape::Triangle, gain_color, to_points(&closed_poles))
                    .labelled("k = 1"),
            );
        }
        if let Some(axes) = figure.axes_mut(ids[2]) {
            axes.set_labels("Frequency (rad/s)", "Phase (deg)");
            axes.log_x = true;
            axes.grid = GridStyle::Cartesian;
            let points = omega.iter().copied().zip(response.phase_deg(0, 0)).collect();
            let color = axes.next_color();
            axes.push(Trace::line(color, points));
        }
        if let Some(axes) = figure.axes_mut(ids[3]) {
            axes.title = Some("Closed-loop step response".to_string());
            axes.set_labels("Time (s)", "y");
            axes.grid = GridStyle::Cartesian;
            let points = time.iter().copied().zip(step).collect();
            let color = axes.next_color();
            axes.push(Trace::line(color, points));
        }
        Ok(())
    }

    fn step_response(
        &self,
        systems: &[&LtiSystem],
    ) -> Result<ApiCall<StepResponseList>, ToolkitError> {
        if let Some(unsupported) = self.single_system_only("step_response", systems.len()) {
            return Ok(ApiCall::UnsupportedApi(unsupported));
        }
        require_systems("step_response", systems)?;
        let time = self.step_time(systems)?;
        let ones = vec![1.0; time.len()];
        let mut list = Vec::with_capacity(systems.len());
        for sys in systems {
            let mut outputs = Vec::with_capacity(sys.outputs());
            for o in 0..sys.outputs() {
                let row = (0..sys.inputs())
                    .map(|i| simulate(sys.cell(o, i), &time, &ones))
                    .collect::<Result<Vec<_>, _>>()?;
                outputs.push(row);
            }
            list.push(StepResponse::new(sys.name().to_string(), time.clone(), outputs));
        }
        Ok(ApiCall::Supported(StepResponseList(list)))
    }

    fn input_output_response(
        &self,
        system: &LtiSystem,
        time: &[f64],
        inputs: &[Vec<f64>],
    ) -> Result<TimeResponse, ToolkitError> {
        if inputs.len() != system.inputs() {
            return Err(ToolkitError::DimensionMismatch(format!(
                "{} has {} inputs, got {} input rows",
                system.name(),
                system.inputs(),
                inputs.len()
            )));
        }
        let mut outputs = Vec::with_capacity(system.outputs());
        for o in 0..system.outputs() {
            let mut y = vec![0.0; time.len()];
            for (i, u) in inputs.iter().enumerate() {
                let part = simulate(system.cell(o, i), time, u)?;
                for (acc, v) in y.iter_mut().zip(part) {
                    *acc += v;
                }
            }
            outputs.push(y);
        }
        Ok(TimeResponse::new(
            time.to_vec(),
            (0..system.inputs()).map(|i| format!("u[{i}]")).collect(),
            (0..system.outputs()).map(|o| format!("y[{o}]")).collect(),
            vec![ResponseTrace {
                label: system.name().to_string(),
                inputs: inputs.to_vec(),
                outputs,
            }],
        ))
    }

    fn combine_time_responses(
        &self,
        responses: Vec<TimeResponse>,
        trace_labels: Option<&[&str]>,
    ) -> Result<TimeResponse, ToolkitError> {
        let Some(first) = responses.first() else {
            return Err(ToolkitError::InvalidModel("no responses to combine".into()));
        };
        let time = first.time().to_vec();
        let input_names = first.input_names().to_vec();
        let output_names = first.output_names().to_vec();

        let mut traces = Vec::new();
        for resp in responses {
            let same_grid = resp.time().len() == time.len()
                && resp
                    .time()
                    .iter()
                    .zip(&time)
                    .all(|(a, b)| (a - b).abs() <= 1e-9 * (1.0 + b.abs()));
            if !same_grid {
                return Err(ToolkitError::DimensionMismatch(
                    "combined responses must share one time grid".into(),
                ));
            }
            if resp.input_names() != input_names.as_slice()
                || resp.output_names() != output_names.as_slice()
            {
                return Err(ToolkitError::DimensionMismatch(
                    "combined responses must have the same signals".into(),
                ));
            }
            traces.extend(resp.into_traces());
        }

        if let Some(labels) = trace_labels {
            if labels.len() != traces.len() {
                return Err(ToolkitError::DimensionMismatch(format!(
                    "{} trace labels for {} traces",
                    labels.len(),
                    traces.len()
                )));
            }
            for (trace, label) in traces.iter_mut().zip(labels) {
                trace.label = label.to_string();
            }
        }
        Ok(TimeResponse::new(time, input_names, output_names, traces))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sys1() -> LtiSystem {
        LtiSystem::tf("sys1", &[1.0], &[1.0, 2.0, 1.0]).unwrap()
    }

    fn sys2() -> LtiSystem {
        LtiSystem::tf("sys2", &[1.0, 0.2], &[1.0, 1.0, 3.0, 1.0, 1.0]).unwrap()
    }

    #[test]
    fn legacy_rejects_lists_but_accepts_single_systems() {
        let tk = BuiltinToolkit::new(ApiLevel::Legacy);
        let (a, b) = (sys1(), sys2());
        let mut fig = Figure::new(1, "bode");
        assert!(!tk.bode_plot(&[&a, &b], &mut fig).unwrap().is_supported());
        assert!(fig.is_empty());
        assert!(tk.bode_plot(&[&a], &mut fig).unwrap().is_supported());
        assert!(!tk.step_response(&[&a, &b]).unwrap().is_supported());
        assert!(tk.step_response(&[&a]).unwrap().is_supported());
    }

    #[test]
    fn root_locus_starts_at_open_loop_poles() {
        let tf = TransferFunction::new(&[1.0, 2.0], &[1.0, 2.0, 3.0]).unwrap();
        let branches = locus_branches(&tf).unwrap();
        assert_eq!(branches.len(), 2);
        for branch in &branches {
            assert_eq!(branch.len(), LOCUS_GAINS + 1);
            assert!((branch[0].0 + 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn describing_function_finds_saturation_crossing() {
        let tk = BuiltinToolkit::default();
        let h = TransferFunction::new(&[1.0], &[1.0, 2.0, 2.0, 1.0]).unwrap() * 8.0;
        let sat = SaturationNonlinearity::new(1.0).unwrap();
        let amps = linspace(1.0, 4.0, 10);
        let resp = tk.describing_function_response(&h, &sat, &amps).unwrap();
        assert_eq!(resp.intersections.len(), 1);
        let hit = resp.intersections[0];
        // Phase crossover of 8/((s+1)(s^2+s+1)) is at w = sqrt(2), H = -8/3.
        assert!((hit.omega - 2f64.sqrt()).abs() < 1e-6);
        assert!((hit.point.re + 8.0 / 3.0).abs() < 1e-6);
        let n = sat.describing_function(hit.amplitude).re;
        assert!((n - 3.0 / 8.0).abs() < 1e-6);
    }

    #[test]
    fn combine_rejects_wrong_label_count() {
        let tk = BuiltinToolkit::default();
        let sys = sys1();
        let time = linspace(0.0, 1.0, 5);
        let r1 = tk
            .input_output_response(&sys, &time, &[vec![1.0; 5]])
            .unwrap();
        let r2 = r1.clone();
        let err = tk.combine_time_responses(vec![r1, r2], Some(&["only-one"][..]));
        assert!(matches!(err, Err(ToolkitError::DimensionMismatch(_))));
    }

    #[test]
    fn phase_plane_finds_pendulum_saddle() {
        let tk = BuiltinToolkit::default();
        let pendulum = NonlinearSystem::new("pend", 2, 1, |_t, x, u, p| {
            Ok(vec![x[1], -p.get("b")? * x[1] + x[0].sin() + u[0]])
        });
        let spec = PhasePlaneSpec {
            bounds: [-1.0, 1.0, -1.0, 1.0],
            time: 2.0,
            grid: (2, 2),
            arrows: 1,
            separatrix_grid: Some((3, 3)),
        };
        let mut fig = Figure::new(1, "phase");
        tk.phase_plane_plot(&pendulum, &spec, &Params::from_pairs(&[("b", 0.2)]), &mut fig)
            .unwrap();
        let axes = &fig.axes()[0];
        let eq = axes
            .traces
            .iter()
            .find(|t| t.label.as_deref() == Some("equilibria"))
            .unwrap();
        assert_eq!(eq.points.len(), 1);
        let dashed = axes
            .traces
            .iter()
            .filter(|t| t.style == crate::figure::TraceStyle::Dashed)
            .count();
        assert_eq!(dashed, 4);
    }
}
