//! Computed responses. Each response knows how to draw itself onto the
//! current figure, reusing an existing axes grid of the same shape so that
//! repeated calls overlay onto one figure.

use rustfft::num_complex::Complex64;

use crate::figure::{Figure, GridStyle, MarkerShape, Trace};

use super::ToolkitError;
use super::model::LtiSystem;

const FREQUENCY_LABEL: &str = "Frequency (rad/s)";
const TIME_LABEL: &str = "Time (s)";

fn unwrap_degrees(raw: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut out: Vec<f64> = Vec::new();
    let mut offset = 0.0;
    for deg in raw {
        if let Some(&prev) = out.last() {
            let mut adjusted = deg + offset;
            while adjusted - prev > 180.0 {
                offset -= 360.0;
                adjusted -= 360.0;
            }
            while adjusted - prev < -180.0 {
                offset += 360.0;
                adjusted += 360.0;
            }
            out.push(adjusted);
        } else {
            out.push(deg);
        }
    }
    out
}

/// Frequency response of every input/output pair over a shared grid.
#[derive(Clone, Debug, PartialEq)]
pub struct FrequencyResponse {
    system: String,
    omega: Vec<f64>,
    /// `[output][input][k]`.
    data: Vec<Vec<Vec<Complex64>>>,
}

impl FrequencyResponse {
    pub fn compute(system: &LtiSystem, omega: Vec<f64>) -> Self {
        let data = (0..system.outputs())
            .map(|o| {
                (0..system.inputs())
                    .map(|i| {
                        let tf = system.cell(o, i);
                        omega
                            .iter()
                            .map(|&w| tf.eval(Complex64::new(0.0, w)))
                            .collect()
                    })
                    .collect()
            })
            .collect();
        Self {
            system: system.name().to_string(),
            omega,
            data,
        }
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    pub fn omega(&self) -> &[f64] {
        &self.omega
    }

    pub fn outputs(&self) -> usize {
        self.data.len()
    }

    pub fn inputs(&self) -> usize {
        self.data.first().map_or(0, Vec::len)
    }

    pub fn cell(&self, output: usize, input: usize) -> &[Complex64] {
        &self.data[output][input]
    }

    pub fn magnitude_db(&self, output: usize, input: usize) -> Vec<f64> {
        self.cell(output, input)
            .iter()
            .map(|g| 20.0 * g.norm().max(1e-300).log10())
            .collect()
    }

    pub fn phase_deg(&self, output: usize, input: usize) -> Vec<f64> {
        unwrap_degrees(self.cell(output, input).iter().map(|g| g.arg().to_degrees()))
    }

    /// Magnitude and phase rows per output, one column per input.
    pub fn bode_into(&self, figure: &mut Figure) -> Result<(), ToolkitError> {
        let (outputs, inputs) = (self.outputs(), self.inputs());
        figure.ensure_grid(2 * outputs, inputs)?;
        for o in 0..outputs {
            for i in 0..inputs {
                let mag: Vec<(f64, f64)> = self
                    .omega
                    .iter()
                    .copied()
                    .zip(self.magnitude_db(o, i))
                    .collect();
                let phase: Vec<(f64, f64)> = self
                    .omega
                    .iter()
                    .copied()
                    .zip(self.phase_deg(o, i))
                    .collect();
                let first_cell = o == 0 && i == 0;
                let bottom_row = o + 1 == outputs;

                if let Some(axes) = figure.grid_axes_mut(2 * o, i) {
                    axes.log_x = true;
                    axes.grid = GridStyle::Cartesian;
                    axes.y_label = Some(format!("y[{o}] magnitude (dB)"));
                    if o == 0 {
                        axes.title = Some(format!("From u[{i}]"));
                    }
                    let mut trace = Trace::line(axes.next_color(), mag);
                    if first_cell {
                        trace = trace.labelled(&self.system);
                    }
                    axes.push(trace);
                }
                if let Some(axes) = figure.grid_axes_mut(2 * o + 1, i) {
                    axes.log_x = true;
                    axes.grid = GridStyle::Cartesian;
                    axes.y_label = Some(format!("y[{o}] phase (deg)"));
                    if bottom_row {
                        axes.x_label = Some(FREQUENCY_LABEL.to_string());
                    }
                    let color = axes.next_color();
                    axes.push(Trace::line(color, phase));
                }
            }
        }
        Ok(())
    }

    /// Open-loop gain versus phase for a SISO response.
    pub fn nichols_into(&self, figure: &mut Figure) -> Result<(), ToolkitError> {
        if self.outputs() != 1 || self.inputs() != 1 {
            return Err(ToolkitError::NotSiso(self.system.clone()));
        }
        figure.ensure_grid(1, 1)?;
        let points: Vec<(f64, f64)> = self
            .phase_deg(0, 0)
            .into_iter()
            .zip(self.magnitude_db(0, 0))
            .collect();
        if let Some(axes) = figure.grid_axes_mut(0, 0) {
            axes.title = Some("Nichols chart".to_string());
            axes.set_labels("Phase (deg)", "Magnitude (dB)");
            axes.grid = GridStyle::Cartesian;
            let color = axes.next_color();
            axes.push(Trace::line(color, points).labelled(&self.system));
        }
        Ok(())
    }
}

/// Step responses of one system, one response per input channel.
#[derive(Clone, Debug, PartialEq)]
pub struct StepResponse {
    system: String,
    time: Vec<f64>,
    /// `[output][input][k]`.
    outputs: Vec<Vec<Vec<f64>>>,
}

impl StepResponse {
    pub(crate) fn new(system: String, time: Vec<f64>, outputs: Vec<Vec<Vec<f64>>>) -> Self {
        Self {
            system,
            time,
            outputs,
        }
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn output(&self, output: usize, input: usize) -> &[f64] {
        &self.outputs[output][input]
    }

    /// One axes per output/input pair.
    pub fn plot(&self, figure: &mut Figure) -> Result<(), ToolkitError> {
        let outputs = self.outputs.len();
        let inputs = self.outputs.first().map_or(0, Vec::len);
        figure.ensure_grid(outputs, inputs)?;
        for (o, row) in self.outputs.iter().enumerate() {
            for (i, y) in row.iter().enumerate() {
                let Some(axes) = figure.grid_axes_mut(o, i) else {
                    continue;
                };
                axes.grid = GridStyle::Cartesian;
                axes.y_label = Some(format!("y[{o}]"));
                if o == 0 {
                    axes.title = Some(format!("Step response from u[{i}]"));
                }
                if o + 1 == outputs {
                    axes.x_label = Some(TIME_LABEL.to_string());
                }
                let points = self.time.iter().copied().zip(y.iter().copied()).collect();
                let mut trace = Trace::line(axes.next_color(), points);
                if o == 0 && i == 0 {
                    trace = trace.labelled(&self.system);
                }
                axes.push(trace);
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepResponseList(pub Vec<StepResponse>);

impl StepResponseList {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn plot(&self, figure: &mut Figure) -> Result<(), ToolkitError> {
        for response in &self.0 {
            response.plot(figure)?;
        }
        Ok(())
    }
}

/// One simulation run inside a [`TimeResponse`].
#[derive(Clone, Debug, PartialEq)]
pub struct ResponseTrace {
    pub label: String,
    /// `[input][k]`.
    pub inputs: Vec<Vec<f64>>,
    /// `[output][k]`.
    pub outputs: Vec<Vec<f64>>,
}

/// Input/output time series, possibly several labelled traces over one grid.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeResponse {
    time: Vec<f64>,
    input_names: Vec<String>,
    output_names: Vec<String>,
    traces: Vec<ResponseTrace>,
}

impl TimeResponse {
    pub(crate) fn new(
        time: Vec<f64>,
        input_names: Vec<String>,
        output_names: Vec<String>,
        traces: Vec<ResponseTrace>,
    ) -> Self {
        Self {
            time,
            input_names,
            output_names,
            traces,
        }
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn traces(&self) -> &[ResponseTrace] {
        &self.traces
    }

    pub fn trace_labels(&self) -> Vec<&str> {
        self.traces.iter().map(|t| t.label.as_str()).collect()
    }

    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    pub(crate) fn into_traces(self) -> Vec<ResponseTrace> {
        self.traces
    }

    /// One axes per signal, outputs first. Stacked vertically, or side by
    /// side when `transpose` is set. Every trace overlays on each axes.
    pub fn plot(&self, figure: &mut Figure, transpose: bool) -> Result<(), ToolkitError> {
        let n_out = self.output_names.len();
        let n = n_out + self.input_names.len();
        let (rows, cols) = if transpose { (1, n) } else { (n, 1) };
        figure.ensure_grid(rows, cols)?;

        for signal in 0..n {
            let (row, col) = if transpose { (0, signal) } else { (signal, 0) };
            let Some(axes) = figure.grid_axes_mut(row, col) else {
                continue;
            };
            let is_output = signal < n_out;
            let name = if is_output {
                &self.output_names[signal]
            } else {
                &self.input_names[signal - n_out]
            };
            axes.title = Some(name.clone());
            axes.grid = GridStyle::Cartesian;
            axes.x_label = Some(TIME_LABEL.to_string());
            for trace in &self.traces {
                let series = if is_output {
                    &trace.outputs[signal]
                } else {
                    &trace.inputs[signal - n_out]
                };
                let points: Vec<(f64, f64)> =
                    self.time.iter().copied().zip(series.iter().copied()).collect();
                let color = axes.next_color();
                let line = if is_output {
                    Trace::line(color, points)
                } else {
                    Trace::dashed(color, points)
                };
                axes.push(line.labelled(&trace.label));
            }
        }
        Ok(())
    }
}

/// Crossing of the linear part's Nyquist curve with the `-1/N(A)` locus.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Intersection {
    pub amplitude: f64,
    pub omega: f64,
    pub point: Complex64,
}

/// Describing-function analysis of a linear block closed by a nonlinearity.
#[derive(Clone, Debug, PartialEq)]
pub struct DescribingFunctionResponse {
    pub omega: Vec<f64>,
    pub nyquist: Vec<Complex64>,
    pub amplitudes: Vec<f64>,
    pub locus: Vec<Complex64>,
    pub intersections: Vec<Intersection>,
}

impl DescribingFunctionResponse {
    pub fn plot(&self, figure: &mut Figure) -> Result<(), ToolkitError> {
        figure.ensure_grid(1, 1)?;
        let Some(axes) = figure.grid_axes_mut(0, 0) else {
            return Ok(());
        };
        axes.title = Some("Describing function analysis".to_string());
        axes.set_labels("Real", "Imaginary");
        axes.grid = GridStyle::Cartesian;

        let curve = self.nyquist.iter().map(|z| (z.re, z.im)).collect();
        let color = axes.next_color();
        axes.push(Trace::line(color, curve).labelled("H(jw)"));

        let locus: Vec<(f64, f64)> = self.locus.iter().map(|z| (z.re, z.im)).collect();
        let color = axes.next_color();
        axes.push(Trace::line(color, locus.clone()).labelled("-1/N(A)"));
        axes.push(Trace::markers(MarkerShape::Circle, color, locus));

        for hit in &self.intersections {
            let color = axes.next_color();
            axes.push(
                Trace::markers(MarkerShape::Cross, color, vec![(hit.point.re, hit.point.im)])
                    .labelled(format!("A = {:.2}, w = {:.2}", hit.amplitude, hit.omega)),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwrap_removes_branch_jumps() {
        let raw = [170.0, 179.0, -179.0, -170.0];
        let out = unwrap_degrees(raw.into_iter());
        assert_eq!(out, vec![170.0, 179.0, 181.0, 190.0]);
    }

    #[test]
    fn bode_overlays_on_matching_grid() {
        let sys = LtiSystem::tf("g", &[1.0], &[1.0, 1.0]).unwrap();
        let resp = FrequencyResponse::compute(&sys, vec![0.1, 1.0, 10.0]);
        let mut fig = Figure::new(1, "bode");
        resp.bode_into(&mut fig).unwrap();
        resp.bode_into(&mut fig).unwrap();
        assert_eq!(fig.layout(), (2, 1));
        assert_eq!(fig.curve_count(), 4);
        let colors: Vec<usize> = fig.axes()[0].traces.iter().map(|t| t.color).collect();
        assert_eq!(colors, vec![0, 1]);
    }

    #[test]
    fn transposed_time_plot_lays_out_one_row() {
        let resp = TimeResponse::new(
            vec![0.0, 1.0],
            vec!["u[0]".into()],
            vec!["y[0]".into(), "y[1]".into()],
            vec![ResponseTrace {
                label: "run".into(),
                inputs: vec![vec![0.0, 1.0]],
                outputs: vec![vec![0.0, 0.5], vec![0.0, 0.2]],
            }],
        );
        let mut fig = Figure::new(1, "time");
        resp.plot(&mut fig, true).unwrap();
        assert_eq!(fig.layout(), (1, 3));
        assert_eq!(fig.axes()[2].traces[0].style, crate::figure::TraceStyle::Dashed);
    }
}
