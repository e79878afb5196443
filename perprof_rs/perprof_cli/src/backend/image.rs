use std::panic;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use perprof::{Backend, OutputFormat, PerfError, ProfileData, ProfilerOptions, Rgb};
use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::info;

use super::vector::{VectorBackend, VectorFormat};
use super::{check_output, solver_color, step_points, x_limit, Profiler};

const CHART_SIZE: (u32, u32) = (900, 600);

/// Raster and vector images drawn with plotters.
pub struct ImageProfiler {
    data: ProfileData,
    options: ProfilerOptions,
    output: PathBuf,
}

impl ImageProfiler {
    pub fn new(data: ProfileData, options: ProfilerOptions) -> Self {
        let output = options
            .output_path()
            .unwrap_or_else(|| PathBuf::from(format!("{}.png", options.output)));
        Self {
            data,
            options,
            output,
        }
    }

    fn render(&self, format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Png => {
                let root = BitMapBackend::new(&self.output, CHART_SIZE).into_drawing_area();
                draw_profile(root, &self.data, &self.options)
            }
            OutputFormat::Svg => {
                let root = SVGBackend::new(&self.output, CHART_SIZE).into_drawing_area();
                draw_profile(root, &self.data, &self.options)
            }
            other => match VectorFormat::for_output(other) {
                Some(vector) => {
                    let root =
                        VectorBackend::new(&self.output, vector, CHART_SIZE).into_drawing_area();
                    draw_profile(root, &self.data, &self.options)
                }
                None => Err(PerfError::UnsupportedFormat {
                    backend: Backend::Mp,
                    format: other,
                }
                .into()),
            },
        }
    }
}

impl Profiler for ImageProfiler {
    fn data(&self) -> &ProfileData {
        &self.data
    }

    fn options(&self) -> &ProfilerOptions {
        &self.options
    }

    fn output(&self) -> Option<&Path> {
        Some(&self.output)
    }

    fn plot(&self) -> Result<()> {
        self.data.ensure_plottable()?;
        check_output(&self.output, self.options.force)?;
        let format = self.options.output_format.unwrap_or(OutputFormat::Png);
        render_guard(|| self.render(format))?;
        info!("wrote {}", self.output.display());
        Ok(())
    }
}

/// Font lookup inside plotters can panic on hosts without usable fonts.
fn render_guard(render: impl FnOnce() -> Result<()>) -> Result<()> {
    panic::catch_unwind(panic::AssertUnwindSafe(render))
        .map_err(|_| anyhow!("plotting backend panicked"))?
}

fn rgb_color(Rgb(r, g, b): Rgb) -> RGBColor {
    RGBColor(r, g, b)
}

fn draw_profile<DB>(
    root: DrawingArea<DB, Shift>,
    data: &ProfileData,
    opts: &ProfilerOptions,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let area = root;
    area.fill(&opts.page_background.map(rgb_color).unwrap_or(WHITE))?;

    // Semilog plots use log2 of the ratio on a linear axis and label ticks
    // with the ratio itself.
    let semilog = opts.semilog;
    let to_axis = |x: f64| if semilog { x.log2() } else { x };
    let x_end = x_limit(data, opts);

    let mut chart = ChartBuilder::on(&area)
        .margin(25)
        .caption(&opts.title, ("sans-serif", 24))
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 50)
        .build_cartesian_2d(to_axis(1.0)..to_axis(x_end), 0.0..1.02)?;

    if let Some(background) = opts.background {
        chart.plotting_area().fill(&rgb_color(background))?;
    }

    chart
        .configure_mesh()
        .x_desc(opts.xlabel.as_str())
        .y_desc(opts.ylabel.as_str())
        .x_label_formatter(&|v| {
            if semilog {
                format!("{:.2}", 2f64.powf(*v))
            } else {
                format!("{:.2}", v)
            }
        })
        .y_label_formatter(&|v| format!("{:.0}%", v * 100.0))
        .light_line_style(&BLACK.mix(0.05))
        .draw()?;

    for (s, name) in data.solvers().iter().enumerate() {
        let color = rgb_color(solver_color(s, opts.black_and_white));
        let style = ShapeStyle {
            color: color.to_rgba(),
            filled: false,
            stroke_width: 2,
        };
        let points = step_points(data.breakpoints(), data.curve(s), x_end)
            .into_iter()
            .map(|(x, y)| (to_axis(x), y));
        chart
            .draw_series(LineSeries::new(points, style))?
            .label(name.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 30, y)], color.stroke_width(2)));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK.mix(0.3))
        .position(SeriesLabelPosition::LowerRight)
        .draw()?;

    area.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::build_profiler;
    use crate::backend::tests::{good_files, options_in, parser_with};
    use std::fs;

    #[test]
    fn vector_formats_are_written() {
        let dir = tempfile::tempdir().unwrap();
        for (format, magic) in [
            (OutputFormat::Pdf, "%PDF-1.4"),
            (OutputFormat::Eps, "%!PS-Adobe-3.0 EPSF-3.0"),
            (OutputFormat::Ps, "%!PS-Adobe-3.0"),
        ] {
            let options = ProfilerOptions {
                semilog: format == OutputFormat::Ps,
                background: Some(Rgb(240, 240, 240)),
                ..options_in(dir.path(), Backend::Mp, Some(format))
            };
            let profiler = build_profiler(&parser_with(good_files()), &options).unwrap();
            profiler.plot().unwrap();
            let path = profiler.output().unwrap();
            assert_eq!(path.extension().unwrap(), format.extension());
            let written = fs::read_to_string(path).unwrap();
            assert!(written.starts_with(magic), "{format}");
            assert!(written.contains("(Alpha)"), "{format}");
        }
    }

    #[test]
    fn html_is_not_an_image() {
        let dir = tempfile::tempdir().unwrap();
        let options = options_in(dir.path(), Backend::Mp, Some(OutputFormat::Pdf));
        let data = ProfileData::load(&parser_with(good_files()), &options).unwrap();
        let profiler = ImageProfiler::new(data, options);
        let err = profiler.render(OutputFormat::Html).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PerfError>(),
            Some(PerfError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn guard_turns_panics_into_errors() {
        let err = render_guard(|| panic!("no fonts")).unwrap_err();
        assert!(err.to_string().contains("panicked"));
    }
}
