//! Output backends. Each one loads the profile data up front, then `plot`
//! renders it to its own artifact.

use std::path::Path;

use anyhow::Result;
use perprof::{Backend, ParserOptions, PerfError, ProfileData, ProfilerOptions, Rgb};

mod html;
mod image;
mod raw;
mod tikz;
mod vector;

pub use html::HtmlProfiler;
pub use image::ImageProfiler;
pub use raw::RawProfiler;
pub use tikz::TikzProfiler;

pub trait Profiler {
    fn data(&self) -> &ProfileData;

    fn options(&self) -> &ProfilerOptions;

    /// Main artifact path, `None` when writing to stdout.
    fn output(&self) -> Option<&Path>;

    fn plot(&self) -> Result<()>;
}

/// Load the tables and pick the profiler for `profiler.backend`.
pub fn build_profiler(
    parser: &ParserOptions,
    profiler: &ProfilerOptions,
) -> Result<Box<dyn Profiler>, PerfError> {
    let data = ProfileData::load(parser, profiler)?;
    let options = profiler.clone();
    Ok(match profiler.backend {
        Backend::Bokeh => Box::new(HtmlProfiler::new(data, options)),
        Backend::Tikz => Box::new(TikzProfiler::new(data, options)),
        Backend::Mp => Box::new(ImageProfiler::new(data, options)),
        Backend::Raw => Box::new(RawProfiler::new(data, options)),
    })
}

/// Refuse to clobber an existing file unless `--force` was given.
pub(crate) fn check_output(path: &Path, force: bool) -> Result<(), PerfError> {
    if path.exists() && !force {
        return Err(PerfError::OutputExists(path.to_path_buf()));
    }
    Ok(())
}

/// Right end of the ratio axis.
pub(crate) fn x_limit(data: &ProfileData, options: &ProfilerOptions) -> f64 {
    match options.tau {
        Some(tau) if tau > 1.0 => tau,
        _ => (data.max_tau() * 1.05).max(1.1),
    }
}

/// Staircase vertices for one solver's curve, running on to `x_end`.
pub(crate) fn step_points(breakpoints: &[f64], curve: &[f64], x_end: f64) -> Vec<(f64, f64)> {
    let mut points = Vec::with_capacity(breakpoints.len() * 2 + 1);
    let mut last = None;
    for (&tau, &value) in breakpoints.iter().zip(curve) {
        if let Some(previous) = last {
            points.push((tau, previous));
        }
        points.push((tau, value));
        last = Some(value);
    }
    if let Some(value) = last {
        if breakpoints.last().map_or(false, |&tau| tau < x_end) {
            points.push((x_end, value));
        }
    }
    points
}

const PALETTE: [Rgb; 8] = [
    Rgb(31, 119, 180),
    Rgb(214, 39, 40),
    Rgb(44, 160, 44),
    Rgb(255, 127, 14),
    Rgb(148, 103, 189),
    Rgb(140, 86, 75),
    Rgb(227, 119, 194),
    Rgb(23, 190, 207),
];

const GRAYS: [Rgb; 4] = [Rgb(0, 0, 0), Rgb(90, 90, 90), Rgb(150, 150, 150), Rgb(200, 200, 200)];

pub(crate) fn solver_color(index: usize, black_and_white: bool) -> Rgb {
    if black_and_white {
        GRAYS[index % GRAYS.len()]
    } else {
        PALETTE[index % PALETTE.len()]
    }
}
