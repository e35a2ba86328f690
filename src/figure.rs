//! Retained figure model: a figure is a grid of axes, each axes holds
//! labelled traces. Nothing here touches a drawing backend; `render` turns a
//! finished figure into a page.

pub type Point = (f64, f64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerShape {
    Cross,
    Circle,
    Triangle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceStyle {
    Line,
    Dashed,
    Markers(MarkerShape),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Trace {
    pub label: Option<String>,
    pub style: TraceStyle,
    /// Palette index.
    pub color: usize,
    pub points: Vec<Point>,
}

impl Trace {
    pub fn line(color: usize, points: Vec<Point>) -> Self {
        Self {
            label: None,
            style: TraceStyle::Line,
            color,
            points,
        }
    }

    pub fn dashed(color: usize, points: Vec<Point>) -> Self {
        Self {
            style: TraceStyle::Dashed,
            ..Self::line(color, points)
        }
    }

    pub fn markers(shape: MarkerShape, color: usize, points: Vec<Point>) -> Self {
        Self {
            style: TraceStyle::Markers(shape),
            ..Self::line(color, points)
        }
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Gridline overlay drawn behind the traces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GridStyle {
    #[default]
    None,
    Cartesian,
    /// Constant damping rays and natural-frequency arcs in the s-plane.
    SPlane,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Axes {
    pub title: Option<String>,
    pub x_label: Option<String>,
    pub y_label: Option<String>,
    pub grid: GridStyle,
    /// Plot x on a log10 scale; trace x values stay in linear units.
    pub log_x: bool,
    pub traces: Vec<Trace>,
    color_cycle: usize,
}

impl Axes {
    /// Next palette index, cycling per axes the way successive plot calls
    /// onto the same axes pick fresh colours.
    pub fn next_color(&mut self) -> usize {
        let c = self.color_cycle;
        self.color_cycle += 1;
        c
    }

    pub fn push(&mut self, trace: Trace) {
        self.traces.push(trace);
    }

    pub fn set_labels(&mut self, x: &str, y: &str) {
        self.x_label = Some(x.to_string());
        self.y_label = Some(y.to_string());
    }

    /// Everything but the gridline style, for comparing curve content.
    pub fn same_content(&self, other: &Axes) -> bool {
        self.traces == other.traces
            && self.title == other.title
            && self.x_label == other.x_label
            && self.y_label == other.y_label
            && self.log_x == other.log_x
    }
}

/// Index into `Figure::axes`, row-major.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AxesId(pub usize);

#[derive(Debug, thiserror::Error)]
#[error("figure already has a {have_rows}x{have_cols} layout, requested {rows}x{cols}")]
pub struct LayoutMismatch {
    pub have_rows: usize,
    pub have_cols: usize,
    pub rows: usize,
    pub cols: usize,
}

/// One drawing surface; becomes exactly one page.
#[derive(Clone, Debug, PartialEq)]
pub struct Figure {
    number: u32,
    label: String,
    title: Option<String>,
    rows: usize,
    cols: usize,
    axes: Vec<Axes>,
}

impl Figure {
    pub fn new(number: u32, label: impl Into<String>) -> Self {
        Self {
            number,
            label: label.into(),
            title: None,
            rows: 0,
            cols: 0,
            axes: Vec::new(),
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Figure-level title above the axes grid.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    pub fn layout(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn axes(&self) -> &[Axes] {
        &self.axes
    }

    pub fn axes_mut(&mut self, id: AxesId) -> Option<&mut Axes> {
        self.axes.get_mut(id.0)
    }

    pub fn is_empty(&self) -> bool {
        self.curve_count() == 0
    }

    pub fn curve_count(&self) -> usize {
        self.axes.iter().map(|a| a.traces.len()).sum()
    }

    /// Drop all axes and the title, keeping number and label.
    pub fn clear(&mut self) {
        self.title = None;
        self.rows = 0;
        self.cols = 0;
        self.axes.clear();
    }

    /// Replace the layout with a fresh `rows x cols` grid and return the ids
    /// in row-major order.
    pub fn subplots(&mut self, rows: usize, cols: usize) -> Vec<AxesId> {
        self.rows = rows;
        self.cols = cols;
        self.axes = vec![Axes::default(); rows * cols];
        (0..rows * cols).map(AxesId).collect()
    }

    /// Create a `rows x cols` grid on an empty figure, or reuse the existing
    /// one when it already has that shape.
    pub fn ensure_grid(&mut self, rows: usize, cols: usize) -> Result<(), LayoutMismatch> {
        if self.axes.is_empty() {
            self.subplots(rows, cols);
            return Ok(());
        }
        if (self.rows, self.cols) != (rows, cols) {
            return Err(LayoutMismatch {
                have_rows: self.rows,
                have_cols: self.cols,
                rows,
                cols,
            });
        }
        Ok(())
    }

    pub fn grid_axes_mut(&mut self, row: usize, col: usize) -> Option<&mut Axes> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.axes.get_mut(row * self.cols + col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_grid_reuses_matching_layout() {
        let mut fig = Figure::new(1, "bode");
        fig.ensure_grid(2, 1).unwrap();
        fig.grid_axes_mut(0, 0)
            .unwrap()
            .push(Trace::line(0, vec![(0.0, 0.0), (1.0, 1.0)]));
        fig.ensure_grid(2, 1).unwrap();
        assert_eq!(fig.curve_count(), 1);
        assert!(fig.ensure_grid(1, 1).is_err());
    }

    #[test]
    fn clear_drops_axes_and_title() {
        let mut fig = Figure::new(3, "step");
        fig.set_title("partial");
        fig.subplots(2, 2);
        fig.clear();
        assert_eq!(fig.layout(), (0, 0));
        assert!(fig.axes().is_empty());
        assert!(fig.title().is_none());
        assert_eq!(fig.number(), 3);
    }

    #[test]
    fn color_cycle_is_per_axes() {
        let mut fig = Figure::new(1, "x");
        let ids = fig.subplots(1, 2);
        assert_eq!(fig.axes_mut(ids[0]).unwrap().next_color(), 0);
        assert_eq!(fig.axes_mut(ids[0]).unwrap().next_color(), 1);
        assert_eq!(fig.axes_mut(ids[1]).unwrap().next_color(), 0);
    }
}
