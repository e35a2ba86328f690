//! Figure → SVG page, via plotters.

use std::error::Error;
use std::ops::Range;

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::error::GalleryError;
use crate::figure::{Axes, Figure, GridStyle, MarkerShape, Point, TraceStyle};

const DAMPING_RATIOS: [f64; 6] = [0.1, 0.3, 0.5, 0.7, 0.9, 0.97];
const GRID_SAMPLES: usize = 90;

/// Render `figure` as one standalone SVG document of `size` pixels.
pub fn render_svg(figure: &Figure, size: (u32, u32)) -> Result<String, GalleryError> {
    let mut svg = String::new();
    draw_figure(&mut svg, figure, size).map_err(|err| GalleryError::Render {
        figure: figure.number(),
        message: err.to_string(),
    })?;
    Ok(svg)
}

fn draw_figure(svg: &mut String, figure: &Figure, size: (u32, u32)) -> Result<(), Box<dyn Error>> {
    let root = SVGBackend::with_string(svg, size).into_drawing_area();
    root.fill(&WHITE)?;
    let caption = figure.title().unwrap_or(figure.label());
    let body = root.titled(caption, ("sans-serif", 22))?;

    let (rows, cols) = figure.layout();
    if rows == 0 || cols == 0 {
        body.draw(&Text::new(
            "(empty figure)",
            (20, 20),
            ("sans-serif", 16).into_font(),
        ))?;
    } else {
        let panels = body.split_evenly((rows, cols));
        for (panel, axes) in panels.iter().zip(figure.axes()) {
            draw_axes(panel, axes)?;
        }
    }

    root.present()?;
    Ok(())
}

fn transform(axes: &Axes, p: Point) -> Option<Point> {
    let x = if axes.log_x {
        if p.0 <= 0.0 {
            return None;
        }
        p.0.log10()
    } else {
        p.0
    };
    (x.is_finite() && p.1.is_finite()).then_some((x, p.1))
}

fn padded(lo: f64, hi: f64) -> Range<f64> {
    if !lo.is_finite() || !hi.is_finite() {
        return -1.0..1.0;
    }
    if (hi - lo).abs() < 1e-12 {
        return (lo - 1.0)..(hi + 1.0);
    }
    let pad = 0.05 * (hi - lo);
    (lo - pad)..(hi + pad)
}

fn data_bounds(axes: &Axes) -> (Range<f64>, Range<f64>) {
    let (mut x0, mut x1) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut y0, mut y1) = (f64::INFINITY, f64::NEG_INFINITY);
    for trace in &axes.traces {
        for p in trace.points.iter().filter_map(|&p| transform(axes, p)) {
            x0 = x0.min(p.0);
            x1 = x1.max(p.0);
            y0 = y0.min(p.1);
            y1 = y1.max(p.1);
        }
    }
    (padded(x0, x1), padded(y0, y1))
}

/// Split a polyline into the runs that stay inside the plot window.
fn clip(points: &[Point], xr: &Range<f64>, yr: &Range<f64>) -> Vec<Vec<Point>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for &(x, y) in points {
        if xr.contains(&x) && yr.contains(&y) {
            current.push((x, y));
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if current.len() > 1 {
        runs.push(current);
    }
    runs.retain(|r| r.len() > 1);
    runs
}

/// Constant damping rays and natural frequency arcs in the left half plane.
fn s_plane_grid(xr: &Range<f64>, yr: &Range<f64>) -> Vec<Vec<Point>> {
    let reach = xr.start.abs().max(xr.end.abs()).max(yr.start.abs()).max(yr.end.abs());
    let mut lines = Vec::new();
    for zeta in DAMPING_RATIOS {
        let angle = zeta.acos();
        for sign in [1.0, -1.0] {
            let ray: Vec<Point> = (0..=GRID_SAMPLES)
                .map(|k| {
                    let r = reach * k as f64 / GRID_SAMPLES as f64;
                    (-r * angle.cos(), sign * r * angle.sin())
                })
                .collect();
            lines.extend(clip(&ray, xr, yr));
        }
    }
    for k in 1..=4 {
        let wn = reach * k as f64 / 4.0;
        let arc: Vec<Point> = (0..=GRID_SAMPLES)
            .map(|i| {
                let theta = std::f64::consts::FRAC_PI_2
                    + std::f64::consts::PI * i as f64 / GRID_SAMPLES as f64;
                (wn * theta.cos(), wn * theta.sin())
            })
            .collect();
        lines.extend(clip(&arc, xr, yr));
    }
    lines
}

fn draw_axes(panel: &DrawingArea<SVGBackend<'_>, Shift>, axes: &Axes) -> Result<(), Box<dyn Error>> {
    let (xr, yr) = data_bounds(axes);

    let mut builder = ChartBuilder::on(panel);
    builder.margin(10).x_label_area_size(35).y_label_area_size(60);
    if let Some(title) = &axes.title {
        builder.caption(title, ("sans-serif", 16));
    }
    let mut chart = builder.build_cartesian_2d(xr.clone(), yr.clone())?;

    let log_label = |v: &f64| format!("{:.3}", 10f64.powf(*v));
    let mut mesh = chart.configure_mesh();
    if let Some(x) = &axes.x_label {
        mesh.x_desc(x.as_str());
    }
    if let Some(y) = &axes.y_label {
        mesh.y_desc(y.as_str());
    }
    if axes.log_x {
        mesh.x_label_formatter(&log_label);
    }
    if axes.grid != GridStyle::Cartesian {
        mesh.disable_mesh();
    }
    mesh.draw()?;

    if axes.grid == GridStyle::SPlane {
        for line in s_plane_grid(&xr, &yr) {
            chart.draw_series(std::iter::once(PathElement::new(line, BLACK.mix(0.15))))?;
        }
    }

    let mut has_legend = false;
    for trace in &axes.traces {
        let points: Vec<Point> = trace
            .points
            .iter()
            .filter_map(|&p| transform(axes, p))
            .collect();
        let color = Palette99::pick(trace.color).to_rgba();
        let line_style = color.stroke_width(2);

        let anno = match trace.style {
            TraceStyle::Line => chart.draw_series(LineSeries::new(points, line_style))?,
            TraceStyle::Dashed => {
                chart.draw_series(DashedLineSeries::new(points, 8, 5, color.stroke_width(1)))?
            }
            TraceStyle::Markers(MarkerShape::Cross) => {
                chart.draw_series(points.into_iter().map(|p| Cross::new(p, 5, line_style)))?
            }
            TraceStyle::Markers(MarkerShape::Circle) => {
                chart.draw_series(points.into_iter().map(|p| Circle::new(p, 4, line_style)))?
            }
            TraceStyle::Markers(MarkerShape::Triangle) => chart.draw_series(
                points
                    .into_iter()
                    .map(|p| TriangleMarker::new(p, 4, color.filled())),
            )?,
        };
        if let Some(label) = &trace.label {
            has_legend = true;
            anno.label(label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], line_style));
        }
    }

    if has_legend {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::figure::Trace;

    #[test]
    fn renders_every_axes_into_one_svg() {
        let mut fig = Figure::new(7, "grid");
        let ids = fig.subplots(2, 1);
        for id in ids {
            let axes = fig.axes_mut(id).unwrap();
            axes.grid = GridStyle::SPlane;
            axes.push(Trace::line(0, vec![(-2.0, -1.0), (-1.0, 0.0), (-0.5, 1.0)]).labelled("sys"));
        }
        let svg = render_svg(&fig, (640, 480)).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("grid"));
    }

    #[test]
    fn empty_figure_still_renders() {
        let svg = render_svg(&Figure::new(1, "blank"), (320, 240)).unwrap();
        assert!(svg.contains("empty figure"));
    }

    #[test]
    fn log_axis_drops_non_positive_x() {
        let mut axes = Axes::default();
        axes.log_x = true;
        assert_eq!(transform(&axes, (0.0, 1.0)), None);
        assert_eq!(transform(&axes, (100.0, 1.0)), Some((2.0, 1.0)));
    }

    #[test]
    fn clip_splits_runs_at_window_edges() {
        let pts = vec![(0.0, 0.0), (0.5, 0.5), (5.0, 5.0), (0.2, 0.1), (0.3, 0.3)];
        let runs = clip(&pts, &(-1.0..1.0), &(-1.0..1.0));
        assert_eq!(runs.len(), 2);
    }
}
