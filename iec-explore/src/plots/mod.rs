//! The menu of diagnostic plots.
//!
//! A [`PlotType`] names one of the fixed figure layouts. A [`Figure`] is created for a layout and
//! collects one set of traces per simulation run, so that repeated runs overlay in the same
//! panels with a new line dash each time.

use std::{fmt::Display, str::FromStr};

use itertools::Itertools;

use crate::{results::SimResult, Error};

mod render;

pub use render::{render, PlotConfig};

/// Column sections at the outlet of the column.
const OUT_P: &str = "column.column_section[8].outlet.c[1]";
const OUT_A: &str = "column.column_section[8].outlet.c[2]";
const OUT_E: &str = "column.column_section[8].outlet.c[3]";
const UV: &str = "uv_detector.value";
const CONDUCTIVITY: &str = "conductivity_detector.value";
const F_SAMPLE: &str = "tank_sample.Fsp";
const F_BUFFER1: &str = "tank_buffer1.Fsp";
const F_BUFFER2: &str = "tank_buffer2.Fsp";
const V_HARVEST: &str = "tank_harvest.V";
const POOLING: &str = "control_pooling.out";

/// Accumulated pumped volume.
pub const PUMPED_VOLUME: &str = "ackF";
pub const SCALING: &str = "control_buffer2.scaling";
pub const FLOW_RATE: &str = "F";
pub const COLUMN_VOLUME: &str = "column.V";

/// Samples of the column profiles drawn in the loading plots.
const PROFILE_SAMPLES: [usize; 10] = [10, 50, 150, 200, 250, 300, 350, 400, 450, 500];
/// Components of the profiles: adsorbed product and adsorbed antagonist.
const PROFILE_COMPONENTS: [(usize, Color); 2] = [(4, Color::Blue), (5, Color::Red)];

/// Factor the salt concentration is drawn with to share an axis with the proteins.
const SALT_SCALE: f64 = 0.05;

/// Fixed y range of the elution panels.
const ELUTION_YLIM: (f64, f64) = (0.0, 0.45);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlotType {
    Loading,
    LoadingCombined,
    Elution,
    ElutionVsVolume,
    ElutionVsCv,
    ElutionVsVolumeAll,
    ElutionConductivityVsVolume,
    ElutionConductivityVsVolumeAll,
    ElutionCombined,
    ElutionVsVolumeCombined,
    ElutionConductivityVsVolumeCombined,
    ElutionConductivityVsVolumeCombinedAll,
    ElutionConductivityVsCvCombinedAll,
    ElutionConductivityCombinedAll,
    ElutionPooling,
    ElutionVsCvPooling,
    Pooling,
    ColumnOutlet,
}

impl PlotType {
    pub const ALL: [PlotType; 18] = [
        Self::Loading,
        Self::LoadingCombined,
        Self::Elution,
        Self::ElutionVsVolume,
        Self::ElutionVsCv,
        Self::ElutionVsVolumeAll,
        Self::ElutionConductivityVsVolume,
        Self::ElutionConductivityVsVolumeAll,
        Self::ElutionCombined,
        Self::ElutionVsVolumeCombined,
        Self::ElutionConductivityVsVolumeCombined,
        Self::ElutionConductivityVsVolumeCombinedAll,
        Self::ElutionConductivityVsCvCombinedAll,
        Self::ElutionConductivityCombinedAll,
        Self::ElutionPooling,
        Self::ElutionVsCvPooling,
        Self::Pooling,
        Self::ColumnOutlet,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Loading => "Loading",
            Self::LoadingCombined => "Loading-combined",
            Self::Elution => "Elution",
            Self::ElutionVsVolume => "Elution-vs-volume",
            Self::ElutionVsCv => "Elution-vs-CV",
            Self::ElutionVsVolumeAll => "Elution-vs-volume-all",
            Self::ElutionConductivityVsVolume => "Elution-conductivity-vs-volume",
            Self::ElutionConductivityVsVolumeAll => "Elution-conductivity-vs-volume-all",
            Self::ElutionCombined => "Elution-combined",
            Self::ElutionVsVolumeCombined => "Elution-vs-volume-combined",
            Self::ElutionConductivityVsVolumeCombined => "Elution-conductivity-vs-volume-combined",
            Self::ElutionConductivityVsVolumeCombinedAll => {
                "Elution-conductivity-vs-volume-combined-all"
            }
            Self::ElutionConductivityVsCvCombinedAll => "Elution-conductivity-vs-CV-combined-all",
            Self::ElutionConductivityCombinedAll => "Elution-conductivity-combined-all",
            Self::ElutionPooling => "Elution-pooling",
            Self::ElutionVsCvPooling => "Elution-vs-CV-pooling",
            Self::Pooling => "Pooling",
            Self::ColumnOutlet => "Column-outlet",
        }
    }

    pub fn layout(&self) -> Layout {
        use XAxis::*;
        match self {
            Self::Loading => {
                // Runs are told apart by the first profile only
                let mut first = profiles(Panel::new((2, 1, 1), "c[PS] and c[AS][mg/mL]"));
                for series in first.series.iter_mut().skip(1) {
                    series.solid = true;
                }
                let mut last = final_profile(
                    Panel::new((2, 1, 2), "c[PS] and c[AS][mg/mL]")
                        .xlabel("Sections in column - inlet to outlet"),
                    Style::LineMarkers,
                );
                for series in &mut last.series {
                    series.solid = true;
                }
                Layout::new(vec![first, last])
            }
            Self::LoadingCombined => Layout::new(vec![
                Panel::new((2, 2, 1), "c[P] and c[A][mg/mL]").with(Series::new(
                    Time,
                    "tank_mixing.outlet.c[1]",
                    Color::Blue,
                )),
                profiles(Panel::new((2, 2, 2), "c[PS] and c[AS][mg/mL]")),
                Panel::new((2, 2, 3), "Tank_waste [mL]")
                    .xlabel("Time [min]")
                    .with(Series::new(Time, "tank_waste.V", Color::Blue)),
                final_profile(
                    Panel::new((2, 2, 4), "c[PS] and c[AS][mg/mL]")
                        .xlabel("Section in column - inlet to outlet"),
                    Style::Line,
                ),
            ]),
            Self::Elution => elution(TimeFromDesorption, "Time [min] - relative start desorption"),
            Self::ElutionVsVolume => elution(
                VolumeFromDesorption,
                "Pumped liquid volume [mL] - relative start desorption",
            ),
            Self::ElutionVsCv => elution(
                CvFromDesorption,
                "Pumped liquid volume [CV] - relative start desorption",
            ),
            Self::ElutionVsVolumeAll => elution(Volume, "Pumped liquid volume [mL]"),
            Self::ElutionConductivityVsVolume => elution_conductivity(VolumeFromDesorption, true),
            Self::ElutionConductivityVsVolumeAll => elution_conductivity(Volume, false),
            Self::ElutionCombined => Layout::new(vec![
                Panel::new((2, 1, 1), "c[P], c[A], c[E] [mg/mL]")
                    .with(Series::new(Time, OUT_P, Color::Blue).label("P"))
                    .with(Series::new(Time, OUT_A, Color::Red).label("A"))
                    .with(
                        Series::new(Time, OUT_E, Color::Magenta)
                            .scaled(SALT_SCALE)
                            .label("E"),
                    ),
                Panel::new((8, 1, 5), "F sample [mL/min]")
                    .with(Series::new(Time, F_SAMPLE, Color::Green).step()),
                Panel::new((8, 1, 6), "F buff1 [mL/min]")
                    .with(Series::new(Time, F_BUFFER1, Color::Green)),
                Panel::new((8, 1, 7), "F buff2 [mL/min]")
                    .with(Series::new(Time, F_BUFFER2, Color::Green)),
                Panel::new((8, 1, 8), "V prod [L]")
                    .xlabel("Time [min]")
                    .with(Series::new(Time, V_HARVEST, Color::Green).step()),
            ]),
            Self::ElutionVsVolumeCombined => {
                let x = VolumeFromDesorption;
                Layout::new(vec![
                    Panel::new((2, 1, 1), "c[P], c[A], c[E] [mg/mL]")
                        .with(Series::new(x, OUT_P, Color::Blue).label("P"))
                        .with(Series::new(x, OUT_A, Color::Red).label("A"))
                        .with(
                            Series::new(x, OUT_E, Color::Magenta)
                                .scaled(SALT_SCALE)
                                .label("E"),
                        ),
                    Panel::new((8, 1, 5), "F sample").with(Series::new(x, F_SAMPLE, Color::Green)),
                    Panel::new((8, 1, 6), "F buffer 1")
                        .with(Series::new(x, F_BUFFER1, Color::Green)),
                    Panel::new((8, 1, 7), "F buffer 2")
                        .with(Series::new(x, F_BUFFER2, Color::Green)),
                    Panel::new((8, 1, 8), "V harvest [mL]")
                        .xlabel("Pumped liquid volume [mL]")
                        .with(Series::new(x, V_HARVEST, Color::Green)),
                ])
            }
            Self::ElutionConductivityVsVolumeCombined => {
                let mut layout = conductivity_combined(
                    VolumeFromDesorption,
                    "Pumped liquid volume [mL]",
                    Style::Line,
                );
                layout.show_title = false;
                for panel in &mut layout.panels {
                    panel.x_from_zero = true;
                }
                layout.panels[0].ylim = YLimit::MaxOf(OUT_P.to_owned());
                layout
            }
            Self::ElutionConductivityVsVolumeCombinedAll => {
                conductivity_combined(Volume, "Pumped liquid volume [mL]", Style::Step)
            }
            Self::ElutionConductivityVsCvCombinedAll => {
                conductivity_combined(Cv, "Pumped liquid volume [CV]", Style::Step)
            }
            Self::ElutionConductivityCombinedAll => {
                let mut layout = conductivity_combined(
                    TimeFromDesorption,
                    "Time [min] - relative start desorption",
                    Style::Step,
                );
                layout.show_title = false;
                layout
            }
            Self::ElutionPooling => elution_pooling(
                TimeFromDesorption,
                "c[P]+c[A] c[E]  [mg/mL]",
                "Time [min]",
                YLimit::Fixed(ELUTION_YLIM.0, ELUTION_YLIM.1),
            ),
            Self::ElutionVsCvPooling => elution_pooling(
                Cv,
                "c[P]+c[A], c[E]  [mg/mL]",
                "Pumped liquid volume [CV]",
                YLimit::Auto,
            ),
            Self::Pooling => Layout::new(vec![
                Panel::new((3, 1, 1), "m[P], m[A] - harvest  [mg]")
                    .with(Series::new(Time, "tank_harvest.m[1]", Color::Blue).label("P"))
                    .with(Series::new(Time, "tank_harvest.m[2]", Color::Red).label("A")),
                Panel::new((3, 1, 2), "m[P], m[A] - waste  [mg]")
                    .with(Series::new(Time, "tank_waste.m[1]", Color::Blue).label("P"))
                    .with(Series::new(Time, "tank_waste.m[2]", Color::Red).label("A")),
                Panel::new((3, 1, 3), "Pooling [0/1]")
                    .xlabel("Time [min]")
                    .with(Series::new(Time, POOLING, Color::Black).step()),
            ]),
            Self::ColumnOutlet => Layout::new(vec![
                Panel::new((3, 1, 1), "c[P]")
                    .with(Series::new(Time, "column.outlet.c[1]", Color::Blue).label("P")),
                Panel::new((3, 1, 2), "c[A]")
                    .with(Series::new(Time, "column.outlet.c[2]", Color::Red).label("A")),
                Panel::new((3, 1, 3), "c[E]")
                    .xlabel("Time [min]")
                    .with(Series::new(Time, "column.outlet.c[3]", Color::Magenta).label("E")),
            ]),
        }
    }
}

impl Display for PlotType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for PlotType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|t| t.key() == s)
            .copied()
            .ok_or_else(|| {
                Error::UnknownPlotType(
                    s.to_owned(),
                    Self::ALL.iter().map(PlotType::key).join(", "),
                )
            })
    }
}

/// Every concentration profile in blue and red for the product and the antagonist.
fn profiles(mut panel: Panel) -> Panel {
    for (component, color) in PROFILE_COMPONENTS {
        for sample in PROFILE_SAMPLES {
            panel = panel.with(Series::profile(sample, component, color));
        }
    }
    panel
}

fn final_profile(mut panel: Panel, style: Style) -> Panel {
    let last = PROFILE_SAMPLES[PROFILE_SAMPLES.len() - 1];
    for (component, color) in PROFILE_COMPONENTS {
        let mut series = Series::profile(last, component, color);
        series.style = style;
        panel = panel.with(series);
    }
    panel
}

fn elution(x: XAxis, xlabel: &str) -> Layout {
    let ylim = YLimit::Fixed(ELUTION_YLIM.0, ELUTION_YLIM.1);
    Layout::new(vec![
        Panel::new((2, 1, 1), "c[P] and c[A]  [mg/mL]")
            .from_zero()
            .ylim(ylim.clone())
            .with(Series::new(x, OUT_P, Color::Blue).label("P"))
            .with(Series::new(x, OUT_A, Color::Red).label("A")),
        Panel::new((2, 1, 2), "c[P]+c[A] c[E]  [mg/mL]")
            .xlabel(xlabel)
            .from_zero()
            .ylim(ylim)
            .with(Series::new(x, UV, Color::Black).label("UV"))
            .with(
                Series::new(x, OUT_E, Color::Magenta)
                    .scaled(SALT_SCALE)
                    .label("salt"),
            ),
    ])
}

fn elution_conductivity(x: XAxis, fixed_ylim: bool) -> Layout {
    let ylim = if fixed_ylim {
        YLimit::Fixed(ELUTION_YLIM.0, ELUTION_YLIM.1)
    } else {
        YLimit::Auto
    };
    Layout::new(vec![
        Panel::new((3, 1, 1), "c[P] and c[A]  [mg/mL]")
            .from_zero()
            .ylim(ylim.clone())
            .with(Series::new(x, OUT_P, Color::Blue).label("P"))
            .with(Series::new(x, OUT_A, Color::Red).label("A")),
        Panel::new((3, 1, 2), "UV-detector []")
            .from_zero()
            .ylim(ylim)
            .with(Series::new(x, UV, Color::Black)),
        Panel::new((3, 1, 3), "Conductivity [mS/cm]")
            .xlabel("Pumped liquid volume [mL]")
            .from_zero()
            .with(Series::new(x, CONDUCTIVITY, Color::Magenta)),
    ])
}

fn conductivity_combined(x: XAxis, xlabel: &str, sample_style: Style) -> Layout {
    let mut sample = Series::new(x, F_SAMPLE, Color::Green);
    sample.style = sample_style;
    Layout::new(vec![
        Panel::new((2, 1, 1), "c[P], c[A] [mg/mL]")
            .with(Series::new(x, OUT_P, Color::Blue).label("P"))
            .with(Series::new(x, OUT_A, Color::Red).label("A")),
        Panel::new((10, 1, 6), "c [mS/cm]").with(Series::new(x, CONDUCTIVITY, Color::Magenta)),
        Panel::new((10, 1, 7), "F load [mL/min]").with(sample),
        Panel::new((10, 1, 8), "Fb1 [mL/min]").with(Series::new(x, F_BUFFER1, Color::Green)),
        Panel::new((10, 1, 9), "Fb2 [mL/min]").with(Series::new(x, F_BUFFER2, Color::Green)),
        Panel::new((10, 1, 10), "V [mL]")
            .xlabel(xlabel)
            .with(Series::new(x, V_HARVEST, Color::Green)),
    ])
}

fn elution_pooling(x: XAxis, detector_label: &str, xlabel: &str, ylim: YLimit) -> Layout {
    Layout::new(vec![
        Panel::new((3, 1, 1), "c[P] and c[A]  [mg/mL]")
            .from_zero()
            .ylim(ylim.clone())
            .with(Series::new(x, OUT_P, Color::Blue).label("P"))
            .with(Series::new(x, OUT_A, Color::Red).label("A")),
        Panel::new((3, 1, 2), detector_label)
            .from_zero()
            .ylim(ylim)
            .with(Series::new(x, UV, Color::Black).label("UV"))
            .with(
                Series::new(x, OUT_E, Color::Magenta)
                    .scaled(SALT_SCALE)
                    .label("salt"),
            ),
        Panel::new((6, 1, 5), "Pooling [0/1]")
            .xlabel(xlabel)
            .from_zero()
            .with(Series::new(x, POOLING, Color::Black).step()),
    ])
}

/// Model values the x axes are computed from, read once per run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AxisContext {
    /// The `start_desorption` parameter
    pub start_desorption: f64,
    /// `control_buffer2.scaling`
    pub scaling: Option<f64>,
    /// `F`
    pub flow_rate: Option<f64>,
    /// `column.V`
    pub column_volume: Option<f64>,
}

impl AxisContext {
    fn need(value: Option<f64>, name: &str) -> Result<f64, Error> {
        value.ok_or_else(|| Error::UnknownVariable(name.to_owned()))
    }

    fn scaling(&self) -> Result<f64, Error> {
        Self::need(self.scaling, SCALING)
    }

    fn flow_rate(&self) -> Result<f64, Error> {
        Self::need(self.flow_rate, FLOW_RATE)
    }

    fn column_volume(&self) -> Result<f64, Error> {
        Self::need(self.column_volume, COLUMN_VOLUME)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XAxis {
    Time,
    /// Section number 1..8 along the column
    Section,
    TimeFromDesorption,
    Volume,
    VolumeFromDesorption,
    Cv,
    CvFromDesorption,
}

impl XAxis {
    /// Result columns the axis is computed from.
    pub fn variables(&self) -> &'static [&'static str] {
        match self {
            Self::Time | Self::TimeFromDesorption => &["time"],
            Self::Section => &[],
            Self::Volume | Self::VolumeFromDesorption | Self::Cv | Self::CvFromDesorption => {
                &[PUMPED_VOLUME]
            }
        }
    }

    /// Model values the axis needs besides the result columns.
    pub fn context_variables(&self) -> &'static [&'static str] {
        match self {
            Self::Time | Self::Section | Self::Volume => &[],
            Self::TimeFromDesorption => &[SCALING],
            Self::VolumeFromDesorption => &[FLOW_RATE, SCALING],
            Self::Cv => &[COLUMN_VOLUME],
            Self::CvFromDesorption => &[FLOW_RATE, SCALING, COLUMN_VOLUME],
        }
    }

    /// Axis values for every sample of `result`.
    pub fn values(&self, result: &SimResult, ctx: &AxisContext) -> Result<Vec<f64>, Error> {
        let volume_offset = || -> Result<f64, Error> {
            Ok(ctx.start_desorption * ctx.flow_rate()? / ctx.scaling()?)
        };
        match self {
            Self::Time => result.time(),
            Self::Section => Ok((1..=crate::results::NUM_SECTIONS).map(|s| s as f64).collect()),
            Self::TimeFromDesorption => {
                let offset = ctx.start_desorption / ctx.scaling()?;
                Ok(result.time()?.into_iter().map(|t| t - offset).collect())
            }
            Self::Volume => result.series(PUMPED_VOLUME),
            Self::VolumeFromDesorption => {
                let offset = volume_offset()?;
                Ok(result
                    .series(PUMPED_VOLUME)?
                    .into_iter()
                    .map(|v| v - offset)
                    .collect())
            }
            Self::Cv => {
                let v = ctx.column_volume()?;
                Ok(result
                    .series(PUMPED_VOLUME)?
                    .into_iter()
                    .map(|x| x / v)
                    .collect())
            }
            Self::CvFromDesorption => {
                let offset = volume_offset()?;
                let v = ctx.column_volume()?;
                Ok(result
                    .series(PUMPED_VOLUME)?
                    .into_iter()
                    .map(|x| (x - offset) / v)
                    .collect())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Variable(String),
    /// Concentration of `component` in the eight column sections at sample `sample`
    Profile { sample: usize, component: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Line,
    /// Piecewise constant, each value held up to its sample
    Step,
    LineMarkers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Blue,
    Red,
    Black,
    Magenta,
    Green,
}

/// Line dash of one run. Runs after the first cycle through the dashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineDash {
    Solid,
    Dashed,
    Dotted,
    DashDot,
}

impl LineDash {
    const CYCLE: [LineDash; 4] = [Self::Solid, Self::Dashed, Self::Dotted, Self::DashDot];

    pub fn for_run(run: usize) -> Self {
        Self::CYCLE[run % Self::CYCLE.len()]
    }

    /// Alternating on and off lengths, as fractions of the panel size.
    pub fn pattern(&self) -> &'static [f64] {
        match self {
            Self::Solid => &[],
            Self::Dashed => &[0.03, 0.015],
            Self::Dotted => &[0.005, 0.01],
            Self::DashDot => &[0.03, 0.01, 0.005, 0.01],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub x: XAxis,
    pub source: Source,
    pub scale: f64,
    pub color: Color,
    pub style: Style,
    pub label: Option<String>,
    /// Drawn solid in every run instead of with the run's dash
    pub solid: bool,
}

impl Series {
    pub fn new(x: XAxis, variable: &str, color: Color) -> Self {
        Self {
            x,
            source: Source::Variable(variable.to_owned()),
            scale: 1.0,
            color,
            style: Style::Line,
            label: None,
            solid: false,
        }
    }

    pub fn profile(sample: usize, component: usize, color: Color) -> Self {
        Self {
            x: XAxis::Section,
            source: Source::Profile { sample, component },
            scale: 1.0,
            color,
            style: Style::Line,
            label: None,
            solid: false,
        }
    }

    fn scaled(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    fn step(mut self) -> Self {
        self.style = Style::Step;
        self
    }

    fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_owned());
        self
    }

    /// Result columns needed to draw the series.
    pub fn variables(&self) -> Vec<String> {
        let mut vars = self
            .x
            .variables()
            .iter()
            .map(|v| v.to_string())
            .collect_vec();
        match &self.source {
            Source::Variable(name) => vars.push(name.clone()),
            Source::Profile { component, .. } => vars.extend(
                (1..=crate::results::NUM_SECTIONS)
                    .map(|section| SimResult::section_variable(section, *component)),
            ),
        }
        vars
    }

    /// Points of the series for `result`, non-finite values dropped.
    pub fn points(&self, result: &SimResult, ctx: &AxisContext) -> Result<Vec<(f64, f64)>, Error> {
        let x = self.x.values(result, ctx)?;
        let y = match &self.source {
            Source::Variable(name) => result.series(name)?,
            Source::Profile { sample, component } => {
                result.profile(*sample, *component)?.to_vec()
            }
        };
        let points = x
            .into_iter()
            .zip(y)
            .map(|(x, y)| (x, y * self.scale))
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect_vec();
        Ok(match self.style {
            Style::Step => step_points(&points),
            Style::Line | Style::LineMarkers => points,
        })
    }
}

/// Turn samples into a staircase where each value is held back to the previous sample.
pub fn step_points(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut out = Vec::with_capacity(points.len() * 2);
    if let Some(first) = points.first() {
        out.push(*first);
    }
    for w in points.windows(2) {
        let ((x0, _), (x1, y1)) = (w[0], w[1]);
        out.push((x0, y1));
        out.push((x1, y1));
    }
    out
}

/// Y range of a panel.
#[derive(Debug, Clone, PartialEq)]
pub enum YLimit {
    Auto,
    Fixed(f64, f64),
    /// From zero up to 1.05 times the largest value of the variable in the last run
    MaxOf(String),
}

/// Subplot position as `(rows, cols, index)` with a 1-based index, row by row.
pub type Grid = (usize, usize, usize);

#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub grid: Grid,
    pub ylabel: String,
    pub xlabel: Option<String>,
    pub series: Vec<Series>,
    /// Start the x axis at zero
    pub x_from_zero: bool,
    pub ylim: YLimit,
}

impl Panel {
    pub fn new(grid: Grid, ylabel: &str) -> Self {
        Self {
            grid,
            ylabel: ylabel.to_owned(),
            xlabel: None,
            series: Vec::new(),
            x_from_zero: false,
            ylim: YLimit::Auto,
        }
    }

    fn xlabel(mut self, xlabel: &str) -> Self {
        self.xlabel = Some(xlabel.to_owned());
        self
    }

    fn from_zero(mut self) -> Self {
        self.x_from_zero = true;
        self
    }

    fn ylim(mut self, ylim: YLimit) -> Self {
        self.ylim = ylim;
        self
    }

    fn with(mut self, series: Series) -> Self {
        self.series.push(series);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub panels: Vec<Panel>,
    /// Draw the figure title above the first panel
    pub show_title: bool,
}

impl Layout {
    fn new(panels: Vec<Panel>) -> Self {
        Self {
            panels,
            show_title: true,
        }
    }

    /// Result columns the layout draws, without duplicates.
    pub fn variables(&self) -> Vec<String> {
        self.panels
            .iter()
            .flat_map(|p| &p.series)
            .flat_map(Series::variables)
            .chain(self.panels.iter().filter_map(|p| match &p.ylim {
                YLimit::MaxOf(name) => Some(name.clone()),
                _ => None,
            }))
            .filter(|v| v != "time")
            .unique()
            .collect()
    }

    /// Model values needed to compute the x axes.
    pub fn context_variables(&self) -> Vec<&'static str> {
        self.panels
            .iter()
            .flat_map(|p| &p.series)
            .flat_map(|s| s.x.context_variables().iter().copied())
            .unique()
            .collect()
    }
}

/// One drawn line.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub points: Vec<(f64, f64)>,
    pub color: Color,
    pub style: Style,
    pub dash: LineDash,
    pub label: Option<String>,
}

/// A figure and the traces of every run drawn into it so far.
#[derive(Debug, Clone)]
pub struct Figure {
    pub title: String,
    pub plot_type: PlotType,
    pub layout: Layout,
    /// Traces per panel
    traces: Vec<Vec<Trace>>,
    /// Y range per panel as of the last run
    ylims: Vec<Option<(f64, f64)>>,
    runs: usize,
}

impl Figure {
    pub fn new(title: &str, plot_type: PlotType) -> Self {
        let layout = plot_type.layout();
        let n = layout.panels.len();
        Self {
            title: title.to_owned(),
            plot_type,
            layout,
            traces: vec![Vec::new(); n],
            ylims: vec![None; n],
            runs: 0,
        }
    }

    pub fn runs(&self) -> usize {
        self.runs
    }

    pub fn traces(&self, panel: usize) -> &[Trace] {
        self.traces.get(panel).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn ylim(&self, panel: usize) -> Option<(f64, f64)> {
        self.ylims.get(panel).copied().flatten()
    }

    /// Draw the result of one run into every panel with the next line dash.
    ///
    /// Nothing is added if any series cannot be evaluated.
    pub fn add_run(&mut self, result: &SimResult, ctx: &AxisContext) -> Result<(), Error> {
        let dash = LineDash::for_run(self.runs);
        let mut traces = Vec::with_capacity(self.layout.panels.len());
        let mut ylims = Vec::with_capacity(self.layout.panels.len());

        for panel in &self.layout.panels {
            let panel_traces = panel
                .series
                .iter()
                .map(|series| {
                    Ok(Trace {
                        points: series.points(result, ctx)?,
                        color: series.color,
                        style: series.style,
                        dash: if series.solid { LineDash::Solid } else { dash },
                        label: series.label.clone(),
                    })
                })
                .collect::<Result<Vec<_>, Error>>()?;
            traces.push(panel_traces);

            ylims.push(match &panel.ylim {
                YLimit::Auto => None,
                YLimit::Fixed(lo, hi) => Some((*lo, *hi)),
                YLimit::MaxOf(name) => {
                    let max = result
                        .series(name)?
                        .into_iter()
                        .filter(|v| v.is_finite())
                        .fold(f64::NEG_INFINITY, f64::max);
                    max.is_finite().then_some((0.0, 1.05 * max))
                }
            });
        }

        for ((all, new), (ylim, new_ylim)) in self
            .traces
            .iter_mut()
            .zip(traces)
            .zip(self.ylims.iter_mut().zip(ylims))
        {
            all.extend(new);
            if new_ylim.is_some() {
                *ylim = new_ylim;
            }
        }
        self.runs += 1;
        log::debug!("Added run {} to {} figure", self.runs, self.plot_type);
        Ok(())
    }
}
