//! Drawing a [`Figure`] with `plotters`.

use std::path::Path;

use plotters::{coord::Shift, prelude::*};

use super::{Color, Figure, LineDash, Style, Trace};
use crate::Error;

#[derive(Debug, Clone)]
pub struct PlotConfig {
    /// Image width in pixels (default: 1024)
    pub width: u32,
    /// Image height in pixels (default: 768)
    pub height: u32,
    pub background: RGBColor,
    /// Line width in pixels (default: 2)
    pub line_width: u32,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            background: WHITE,
            line_width: 2,
        }
    }
}

fn plot_err(e: impl std::fmt::Display) -> Error {
    Error::Plot(e.to_string())
}

fn rgb(color: Color) -> RGBColor {
    match color {
        Color::Blue => BLUE,
        Color::Red => RED,
        Color::Black => BLACK,
        Color::Magenta => MAGENTA,
        Color::Green => RGBColor(0, 128, 0),
    }
}

/// Render `figure` to `path`, as SVG for a `.svg` extension and as a bitmap otherwise.
pub fn render(figure: &Figure, path: &Path, config: &PlotConfig) -> Result<(), Error> {
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("png");
    log::debug!("Rendering {} figure to {}", figure.plot_type, path.display());

    match ext {
        "svg" => {
            let root = SVGBackend::new(path, (config.width, config.height)).into_drawing_area();
            draw(root, figure, config)
        }
        _ => {
            let root = BitMapBackend::new(path, (config.width, config.height)).into_drawing_area();
            draw(root, figure, config)
        }
    }
}

fn draw<DB: DrawingBackend>(
    root: DrawingArea<DB, Shift>,
    figure: &Figure,
    config: &PlotConfig,
) -> Result<(), Error>
where
    DB::ErrorType: 'static,
{
    root.fill(&config.background).map_err(plot_err)?;

    for (idx, panel) in figure.layout.panels.iter().enumerate() {
        let (rows, cols, index) = panel.grid;
        let Some(area) = root.split_evenly((rows, cols)).into_iter().nth(index - 1) else {
            return Err(Error::Plot(format!(
                "subplot {index} outside of a {rows}x{cols} grid"
            )));
        };

        let traces = figure.traces(idx);
        let (x_range, y_range) = ranges(traces, panel.x_from_zero, figure.ylim(idx));

        let mut builder = ChartBuilder::on(&area);
        builder
            .margin(8)
            .x_label_area_size(if panel.xlabel.is_some() { 40 } else { 20 })
            .y_label_area_size(70);
        if idx == 0 && figure.layout.show_title && !figure.title.is_empty() {
            builder.caption(&figure.title, ("sans-serif", 24).into_font());
        }
        let mut chart = builder
            .build_cartesian_2d(x_range.clone(), y_range.clone())
            .map_err(plot_err)?;

        chart
            .configure_mesh()
            .x_desc(panel.xlabel.as_deref().unwrap_or_default())
            .y_desc(&panel.ylabel)
            .label_style(("sans-serif", 12))
            .draw()
            .map_err(plot_err)?;

        let scale = (
            (x_range.end - x_range.start).abs(),
            (y_range.end - y_range.start).abs(),
        );
        let mut labelled = false;
        for trace in traces {
            let style = ShapeStyle::from(&rgb(trace.color)).stroke_width(config.line_width);
            let segments = styled_segments(&trace.points, trace.dash, scale);
            let annotation = chart
                .draw_series(
                    segments
                        .into_iter()
                        .map(|segment| PathElement::new(segment, style)),
                )
                .map_err(plot_err)?;
            if let Some(label) = &trace.label {
                labelled = true;
                annotation
                    .label(label.as_str())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
            }

            if trace.style == Style::LineMarkers {
                chart
                    .draw_series(
                        trace
                            .points
                            .iter()
                            .map(|p| Cross::new(*p, 4, style)),
                    )
                    .map_err(plot_err)?;
            }
        }

        if labelled {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperRight)
                .background_style(&config.background.mix(0.8))
                .border_style(&BLACK)
                .draw()
                .map_err(plot_err)?;
        }
    }

    root.present().map_err(plot_err)?;
    Ok(())
}

/// Axis ranges covering all traces of a panel.
fn ranges(
    traces: &[Trace],
    x_from_zero: bool,
    ylim: Option<(f64, f64)>,
) -> (std::ops::Range<f64>, std::ops::Range<f64>) {
    let bounds = |values: &mut dyn Iterator<Item = f64>| {
        values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        })
    };
    let (mut x_lo, mut x_hi) = bounds(&mut traces.iter().flat_map(|t| t.points.iter().map(|p| p.0)));
    if x_from_zero {
        x_lo = 0.0;
    }
    if !(x_lo.is_finite() && x_hi.is_finite()) || x_hi <= x_lo {
        x_hi = if x_lo.is_finite() { x_lo + 1.0 } else { 1.0 };
        x_lo = if x_lo.is_finite() { x_lo } else { 0.0 };
    }

    let (y_lo, y_hi) = match ylim {
        Some((lo, hi)) if hi > lo => (lo, hi),
        _ => {
            let (lo, hi) = bounds(&mut traces.iter().flat_map(|t| t.points.iter().map(|p| p.1)));
            if !(lo.is_finite() && hi.is_finite()) {
                (0.0, 1.0)
            } else if hi - lo < f64::EPSILON {
                (lo - 0.5, hi + 0.5)
            } else {
                let pad = 0.05 * (hi - lo);
                (lo - pad, hi + pad)
            }
        }
    };

    (x_lo..x_hi, y_lo..y_hi)
}

/// Split a polyline into the visible pieces of `dash`.
///
/// Dash lengths are measured with the x and y distances divided by `scale`, so dashes look the
/// same in every panel.
pub fn styled_segments(
    points: &[(f64, f64)],
    dash: LineDash,
    scale: (f64, f64),
) -> Vec<Vec<(f64, f64)>> {
    let pattern = dash.pattern();
    if pattern.is_empty() || points.len() < 2 {
        return vec![points.to_vec()];
    }
    let (sx, sy) = (
        if scale.0 > 0.0 { scale.0 } else { 1.0 },
        if scale.1 > 0.0 { scale.1 } else { 1.0 },
    );

    let mut segments = Vec::new();
    let mut current = vec![points[0]];
    let mut on = true;
    let mut idx = 0;
    let mut remaining = pattern[0];

    for w in points.windows(2) {
        let ((x0, y0), (x1, y1)) = (w[0], w[1]);
        let length = ((x1 - x0) / sx).hypot((y1 - y0) / sy);
        let mut pos = 0.0;

        while length - pos > remaining {
            pos += remaining;
            let f = pos / length;
            let p = (x0 + f * (x1 - x0), y0 + f * (y1 - y0));
            if on {
                current.push(p);
                segments.push(std::mem::take(&mut current));
            } else {
                current = vec![p];
            }
            on = !on;
            idx = (idx + 1) % pattern.len();
            remaining = pattern[idx];
        }

        remaining -= length - pos;
        if on {
            current.push((x1, y1));
        }
    }

    if on && current.len() >= 2 {
        segments.push(current);
    }
    segments
}
