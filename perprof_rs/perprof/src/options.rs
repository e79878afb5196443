use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::{PerfError, Result};

/// Stem used for rendered artifacts unless `--output` overrides it.
pub const DEFAULT_OUTPUT_STEM: &str = "performance-profile";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Interactive web chart.
    Bokeh,
    /// pgfplots code for LaTeX documents.
    Tikz,
    /// Raster and vector image files.
    Mp,
    /// Plain numbers, no drawing.
    Raw,
}

impl Default for Backend {
    fn default() -> Self {
        Backend::Tikz
    }
}

impl Backend {
    pub const ALL: [Backend; 4] = [Backend::Bokeh, Backend::Tikz, Backend::Mp, Backend::Raw];

    pub fn name(self) -> &'static str {
        match self {
            Backend::Bokeh => "bokeh",
            Backend::Tikz => "tikz",
            Backend::Mp => "mp",
            Backend::Raw => "raw",
        }
    }

    pub fn formats(self) -> &'static [OutputFormat] {
        match self {
            Backend::Bokeh => &[OutputFormat::Html],
            Backend::Tikz => &[OutputFormat::Pdf, OutputFormat::Tex],
            Backend::Mp => &[
                OutputFormat::Png,
                OutputFormat::Eps,
                OutputFormat::Pdf,
                OutputFormat::Ps,
                OutputFormat::Svg,
            ],
            Backend::Raw => &[],
        }
    }

    pub fn default_format(self) -> Option<OutputFormat> {
        self.formats().first().copied()
    }

    pub fn supports(self, format: OutputFormat) -> bool {
        self.formats().contains(&format)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Html,
    Pdf,
    Tex,
    Png,
    Eps,
    Ps,
    Svg,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Tex => "tex",
            OutputFormat::Png => "png",
            OutputFormat::Eps => "eps",
            OutputFormat::Ps => "ps",
            OutputFormat::Svg => "svg",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// How a successful run is decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compare {
    /// The exit flag alone decides.
    ExitFlag,
    /// The exit flag plus feasibility and objective value against the best solver.
    OptimalValues,
}

impl Default for Compare {
    fn default() -> Self {
        Compare::ExitFlag
    }
}

/// Where a solver table comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum TableSource {
    File(PathBuf),
    Embedded {
        name: &'static str,
        contents: &'static str,
    },
}

impl TableSource {
    /// Name used in diagnostics and as the default solver name.
    pub fn display_name(&self) -> String {
        match self {
            TableSource::File(path) => path.display().to_string(),
            TableSource::Embedded { name, .. } => (*name).to_string(),
        }
    }

    pub fn default_solver_name(&self) -> String {
        match self {
            TableSource::File(path) => path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("solver")
                .to_string(),
            TableSource::Embedded { name, .. } => (*name).to_string(),
        }
    }
}

/// Everything the table parser and [`crate::ProfileData`] need to know.
#[derive(Clone, Debug, PartialEq)]
pub struct ParserOptions {
    pub sources: Vec<TableSource>,
    pub subset: Option<Vec<String>>,
    /// Exit flags counted as success unless a table header overrides them.
    pub success: Vec<String>,
    pub compare: Compare,
    pub unconstrained: bool,
    /// Times below this are raised to it.
    pub mintime: f64,
    /// Times above this count as failures.
    pub maxtime: f64,
    pub infeasibility_tolerance: f64,
    pub fval_tolerance: f64,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            subset: None,
            success: vec!["c".to_string()],
            compare: Compare::ExitFlag,
            unconstrained: false,
            mintime: 0.0,
            maxtime: f64::INFINITY,
            infeasibility_tolerance: 1e-4,
            fval_tolerance: 1e-4,
        }
    }
}

impl ParserOptions {
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(PerfError::InvalidParameter("no input files supplied".into()));
        }
        if self.success.is_empty() {
            return Err(PerfError::InvalidParameter(
                "at least one success flag is required".into(),
            ));
        }
        if !(self.mintime >= 0.0) {
            return Err(PerfError::InvalidParameter(format!(
                "mintime must be non-negative, got {}",
                self.mintime
            )));
        }
        if !(self.maxtime > self.mintime) {
            return Err(PerfError::InvalidParameter(format!(
                "maxtime ({}) must exceed mintime ({})",
                self.maxtime, self.mintime
            )));
        }
        for (name, tol) in [
            ("infeasibility tolerance", self.infeasibility_tolerance),
            ("fval tolerance", self.fval_tolerance),
        ] {
            if !(tol >= 0.0) || !tol.is_finite() {
                return Err(PerfError::InvalidParameter(format!(
                    "{name} must be a finite non-negative number, got {tol}"
                )));
            }
        }
        Ok(())
    }
}

/// An sRGB colour given on the command line as `r,g,b`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

impl FromStr for Rgb {
    type Err = PerfError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let channel = |raw: &str| {
            raw.parse::<u8>().map_err(|_| {
                PerfError::InvalidParameter(format!(
                    "colour '{s}' must be three comma separated values in 0..=255"
                ))
            })
        };
        match parts.as_slice() {
            [r, g, b] => Ok(Rgb(channel(*r)?, channel(*g)?, channel(*b)?)),
            _ => Err(PerfError::InvalidParameter(format!(
                "colour '{s}' must be three comma separated values in 0..=255"
            ))),
        }
    }
}

/// Resolved rendering configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct ProfilerOptions {
    pub backend: Backend,
    /// `None` only for the raw backend.
    pub output_format: Option<OutputFormat>,
    pub output: String,
    /// Whether `output` was set explicitly.
    pub output_given: bool,
    pub title: String,
    pub xlabel: String,
    pub ylabel: String,
    pub semilog: bool,
    pub tau: Option<f64>,
    pub black_and_white: bool,
    pub background: Option<Rgb>,
    pub page_background: Option<Rgb>,
    pub standalone: bool,
    pub force: bool,
}

impl Default for ProfilerOptions {
    fn default() -> Self {
        Self {
            backend: Backend::Tikz,
            output_format: Backend::Tikz.default_format(),
            output: DEFAULT_OUTPUT_STEM.to_string(),
            output_given: false,
            title: "Performance Profile".to_string(),
            xlabel: "Performance ratio".to_string(),
            ylabel: "Problems solved".to_string(),
            semilog: false,
            tau: None,
            black_and_white: false,
            background: None,
            page_background: None,
            standalone: false,
            force: false,
        }
    }
}

impl ProfilerOptions {
    pub fn for_backend(backend: Backend) -> Self {
        Self {
            backend,
            output_format: backend.default_format(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        match (self.backend, self.output_format) {
            (Backend::Raw, None) => {}
            (backend, Some(format)) if backend.supports(format) => {}
            (backend, Some(format)) => {
                return Err(PerfError::UnsupportedFormat { backend, format })
            }
            (backend, None) => {
                return Err(PerfError::InvalidParameter(format!(
                    "the {backend} backend needs an output format"
                )))
            }
        }
        if let Some(tau) = self.tau {
            if !(tau >= 1.0) || !tau.is_finite() {
                return Err(PerfError::InvalidParameter(format!(
                    "tau must be a finite value >= 1, got {tau}"
                )));
            }
        }
        if self.output.trim().is_empty() {
            return Err(PerfError::InvalidParameter("output name is empty".into()));
        }
        Ok(())
    }

    /// Path of the artifact written by `plot`.
    ///
    /// The tikz backend always writes its `.tex` source here, and the PDF
    /// (when requested) is compiled next to it.
    pub fn output_path(&self) -> Option<PathBuf> {
        let ext = match (self.backend, self.output_format) {
            (Backend::Tikz, _) => "tex",
            (Backend::Raw, _) => {
                if self.output_given {
                    "txt"
                } else {
                    return None;
                }
            }
            (_, Some(format)) => format.extension(),
            (_, None) => return None,
        };
        Some(PathBuf::from(format!("{}.{}", self.output, ext)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_formats() {
        assert_eq!(Backend::Bokeh.default_format(), Some(OutputFormat::Html));
        assert_eq!(Backend::Tikz.default_format(), Some(OutputFormat::Pdf));
        assert_eq!(Backend::Mp.default_format(), Some(OutputFormat::Png));
        assert_eq!(Backend::Raw.default_format(), None);
        assert!(Backend::Mp.supports(OutputFormat::Svg));
        assert!(!Backend::Bokeh.supports(OutputFormat::Png));
        assert!(!Backend::Tikz.supports(OutputFormat::Html));
    }

    #[test]
    fn output_paths() {
        let mut opts = ProfilerOptions::for_backend(Backend::Mp);
        opts.output_format = Some(OutputFormat::Eps);
        assert_eq!(
            opts.output_path(),
            Some(PathBuf::from("performance-profile.eps"))
        );

        let tikz = ProfilerOptions::for_backend(Backend::Tikz);
        assert_eq!(
            tikz.output_path(),
            Some(PathBuf::from("performance-profile.tex"))
        );

        let mut raw = ProfilerOptions::for_backend(Backend::Raw);
        assert_eq!(raw.output_path(), None);
        raw.output = "dump".into();
        raw.output_given = true;
        assert_eq!(raw.output_path(), Some(PathBuf::from("dump.txt")));
    }

    #[test]
    fn rejects_mismatched_format() {
        let mut opts = ProfilerOptions::for_backend(Backend::Bokeh);
        opts.output_format = Some(OutputFormat::Png);
        assert!(matches!(
            opts.validate(),
            Err(PerfError::UnsupportedFormat {
                backend: Backend::Bokeh,
                format: OutputFormat::Png
            })
        ));
    }

    #[test]
    fn rejects_small_tau() {
        let mut opts = ProfilerOptions::for_backend(Backend::Raw);
        opts.tau = Some(0.5);
        assert!(opts.validate().is_err());
        opts.tau = Some(4.0);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn parses_colours() {
        assert_eq!("255, 0,16".parse::<Rgb>().unwrap(), Rgb(255, 0, 16));
        assert_eq!(Rgb(255, 0, 16).to_hex(), "#ff0010");
        assert!("1,2".parse::<Rgb>().is_err());
        assert!("1,2,300".parse::<Rgb>().is_err());
    }

    #[test]
    fn validates_time_limits() {
        let mut opts = ParserOptions {
            sources: vec![TableSource::File(PathBuf::from("a.table"))],
            ..ParserOptions::default()
        };
        assert!(opts.validate().is_ok());
        opts.mintime = 5.0;
        opts.maxtime = 2.0;
        assert!(opts.validate().is_err());
        opts.maxtime = f64::NAN;
        assert!(opts.validate().is_err());
    }
}
