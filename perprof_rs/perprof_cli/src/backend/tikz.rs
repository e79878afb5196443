use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use perprof::{OutputFormat, ProfileData, ProfilerOptions, Rgb};
use pgfplots::axis::plot::coordinate::Coordinate2D;
use pgfplots::axis::plot::Type2D::ConstLeft;
use pgfplots::axis::plot::{Plot2D, PlotKey};
use pgfplots::axis::{Axis, AxisKey};
use pgfplots::{Engine, Picture};
use tracing::{info, warn};

use super::{check_output, solver_color, step_points, x_limit, Profiler};

/// pgfplots source, optionally compiled to PDF with pdflatex.
pub struct TikzProfiler {
    data: ProfileData,
    options: ProfilerOptions,
    output: PathBuf,
}

impl TikzProfiler {
    pub fn new(data: ProfileData, options: ProfilerOptions) -> Self {
        let output = options
            .output_path()
            .unwrap_or_else(|| PathBuf::from(format!("{}.tex", options.output)));
        Self {
            data,
            options,
            output,
        }
    }

    fn compile_pdf(&self) -> bool {
        self.options.output_format == Some(OutputFormat::Pdf)
    }

    fn axis(&self) -> Axis {
        let opts = &self.options;
        let x_end = x_limit(&self.data, opts);

        let mut axis = Axis::new();
        axis.set_title(escape_tex(&opts.title));
        axis.add_key(AxisKey::Custom(format!(
            "xlabel={{{}}}, ylabel={{{}}}",
            escape_tex(&opts.xlabel),
            escape_tex(&opts.ylabel)
        )));
        axis.add_key(AxisKey::Custom(format!(
            "width=12cm, height=8cm, xmin=1, xmax={x_end}, ymin=0, ymax=1.02, legend pos=south east, tick align=outside, tick pos=left"
        )));
        if opts.semilog {
            axis.add_key(AxisKey::Custom(String::from("xmode=log, log basis x=2")));
        }
        if let Some(background) = opts.background {
            axis.add_key(AxisKey::Custom(format!(
                "axis background/.style={{fill={}}}",
                xcolor(background)
            )));
        }

        let entries: Vec<String> = self
            .data
            .solvers()
            .iter()
            .map(|name| format!("{{{}}}", escape_tex(name)))
            .collect();
        axis.add_key(AxisKey::Custom(format!(
            "legend entries={{{}}}",
            entries.join(",")
        )));

        for s in 0..self.data.solvers().len() {
            let mut plot = Plot2D::new();
            plot.add_key(PlotKey::Type2D(ConstLeft));
            plot.add_key(PlotKey::Custom(format!(
                "draw={}, thick",
                xcolor(solver_color(s, opts.black_and_white))
            )));
            plot.coordinates = step_points(self.data.breakpoints(), self.data.curve(s), x_end)
                .into_iter()
                .map(Coordinate2D::from)
                .collect();
            axis.plots.push(plot);
        }
        axis
    }

    fn picture(&self) -> Picture {
        let mut picture = Picture::new();
        picture.axes.push(self.axis());
        picture
    }

    fn render(&self, picture: &Picture) -> String {
        let body = if self.options.standalone || self.compile_pdf() {
            picture.standalone_string()
        } else {
            picture.to_string()
        };
        format!(
            "% Performance profile generated by perprof on {}\n{}\n",
            Utc::now().format("%Y-%m-%d %H:%M UTC"),
            body
        )
    }
}

impl Profiler for TikzProfiler {
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
        let pdf = self.output.with_extension("pdf");
        if self.compile_pdf() {
            check_output(&pdf, self.options.force)?;
        }
        if self.options.page_background.is_some() {
            warn!("--page-background is ignored by the tikz backend");
        }

        let picture = self.picture();
        fs::write(&self.output, self.render(&picture))
            .with_context(|| format!("failed to write {}", self.output.display()))?;
        info!("wrote {}", self.output.display());

        if self.compile_pdf() {
            let dir = match self.output.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            let jobname = self
                .output
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .ok_or_else(|| anyhow!("output {} has no file name", self.output.display()))?;
            picture
                .to_pdf(&dir, jobname, Engine::PdfLatex)
                .map_err(|e| anyhow!("pdflatex failed on {}: {e:?}", self.output.display()))?;
            info!("wrote {}", pdf.display());
        }
        Ok(())
    }
}

fn xcolor(Rgb(r, g, b): Rgb) -> String {
    format!("{{rgb,255:red,{r};green,{g};blue,{b}}}")
}

fn escape_tex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str(r"\textbackslash{}"),
            '~' => out.push_str(r"\textasciitilde{}"),
            '^' => out.push_str(r"\textasciicircum{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::build_profiler;
    use crate::backend::tests::{good_files, options_in, parser_with};
    use perprof::{Backend, PerfError};

    #[test]
    fn writes_embeddable_tikz() {
        let dir = tempfile::tempdir().unwrap();
        let options = options_in(dir.path(), Backend::Tikz, Some(OutputFormat::Tex));
        let profiler = build_profiler(&parser_with(good_files()), &options).unwrap();
        profiler.plot().unwrap();

        let tex = fs::read_to_string(dir.path().join("profile.tex")).unwrap();
        assert!(tex.contains(r"\begin{tikzpicture}"));
        assert!(!tex.contains(r"\documentclass"));
        assert!(tex.contains("legend entries={{Alpha},{Beta},{Gamma}}"));
        assert_eq!(tex.matches("const plot").count(), 3);
        assert!(!dir.path().join("profile.pdf").exists());
    }

    #[test]
    fn standalone_wraps_a_document() {
        let dir = tempfile::tempdir().unwrap();
        let options = ProfilerOptions {
            standalone: true,
            semilog: true,
            ..options_in(dir.path(), Backend::Tikz, Some(OutputFormat::Tex))
        };
        build_profiler(&parser_with(good_files()), &options)
            .unwrap()
            .plot()
            .unwrap();
        let tex = fs::read_to_string(dir.path().join("profile.tex")).unwrap();
        assert!(tex.contains(r"\documentclass"));
        assert!(tex.contains("xmode=log"));
    }

    #[test]
    fn existing_pdf_leaves_tex_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let tex = dir.path().join("profile.tex");
        let pdf = dir.path().join("profile.pdf");
        fs::write(&pdf, "old pdf").unwrap();
        let options = options_in(dir.path(), Backend::Tikz, Some(OutputFormat::Pdf));
        let err = build_profiler(&parser_with(good_files()), &options)
            .unwrap()
            .plot()
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PerfError>(),
            Some(PerfError::OutputExists(path)) if *path == pdf
        ));
        assert!(!tex.exists());
        assert_eq!(fs::read_to_string(&pdf).unwrap(), "old pdf");
    }

    #[test]
    fn escapes_latex_specials() {
        assert_eq!(escape_tex("50% of A_1 & B"), r"50\% of A\_1 \& B");
        assert_eq!(xcolor(Rgb(1, 2, 3)), "{rgb,255:red,1;green,2;blue,3}");
    }
}
