use std::ffi::OsString;
use std::path::PathBuf;

use clap::{ArgAction, ArgGroup, Parser, ValueEnum, ValueHint};
use perprof::demo::demo_sources;
use perprof::{
    load_subset, Backend, Compare, OutputFormat, ParserOptions, PerfError, ProfilerOptions, Rgb,
    TableSource, DEFAULT_OUTPUT_STEM,
};

#[derive(Parser, Debug)]
#[command(
    name = "perprof",
    author,
    version,
    about = "Draw performance profiles comparing solver benchmark results",
    long_about = None
)]
#[command(group(ArgGroup::new("backend").args(["bokeh", "tikz", "mp", "raw"])))]
#[command(group(ArgGroup::new("format").args(["html", "pdf", "tex", "png", "eps", "ps", "svg"])))]
pub struct Args {
    /// Solver result tables, one per solver
    #[arg(value_hint = ValueHint::FilePath, required_unless_present = "demo")]
    pub files: Vec<PathBuf>,

    /// Interactive HTML chart
    #[arg(long, action = ArgAction::SetTrue)]
    pub bokeh: bool,

    /// pgfplots code for LaTeX (default backend)
    #[arg(long, action = ArgAction::SetTrue)]
    pub tikz: bool,

    /// Image files (png, eps, pdf, ps, svg)
    #[arg(long, action = ArgAction::SetTrue)]
    pub mp: bool,

    /// Print the profile as plain numbers
    #[arg(long, action = ArgAction::SetTrue)]
    pub raw: bool,

    #[arg(long, action = ArgAction::SetTrue)]
    pub html: bool,

    #[arg(long, action = ArgAction::SetTrue)]
    pub pdf: bool,

    #[arg(long, action = ArgAction::SetTrue)]
    pub tex: bool,

    #[arg(long, action = ArgAction::SetTrue)]
    pub png: bool,

    #[arg(long, action = ArgAction::SetTrue)]
    pub eps: bool,

    #[arg(long, action = ArgAction::SetTrue)]
    pub ps: bool,

    #[arg(long, action = ArgAction::SetTrue)]
    pub svg: bool,

    /// Use the bundled example tables instead of input files
    #[arg(long, action = ArgAction::SetTrue, conflicts_with = "files")]
    pub demo: bool,

    /// How a run counts as solved
    #[arg(long, value_enum, default_value_t = CompareOpt::Exitflag)]
    pub compare: CompareOpt,

    /// Problems have no constraints, so the primal column is not read
    #[arg(long, action = ArgAction::SetTrue)]
    pub unconstrained: bool,

    /// File listing the problems to compare, one per line
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub subset: Option<PathBuf>,

    /// Exit flags counting as success (comma separated)
    #[arg(long, default_value = "c")]
    pub success: String,

    /// Times above this count as failures
    #[arg(long)]
    pub maxtime: Option<f64>,

    /// Times below this are raised to it
    #[arg(long, default_value_t = 0.0)]
    pub mintime: f64,

    /// Primal/dual infeasibility accepted with --compare optimalvalues
    #[arg(long, default_value_t = 1e-4)]
    pub infeasibility_tolerance: f64,

    /// Relative objective gap accepted with --compare optimalvalues
    #[arg(long, default_value_t = 1e-4)]
    pub fval_tolerance: f64,

    /// Largest performance ratio shown
    #[arg(long)]
    pub tau: Option<f64>,

    /// Logarithmic (base 2) ratio axis
    #[arg(long, action = ArgAction::SetTrue)]
    pub semilog: bool,

    #[arg(long = "black-and-white", action = ArgAction::SetTrue)]
    pub black_and_white: bool,

    /// Plot area colour as r,g,b
    #[arg(long)]
    pub background: Option<Rgb>,

    /// Page colour as r,g,b
    #[arg(long)]
    pub page_background: Option<Rgb>,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub xlabel: Option<String>,

    #[arg(long)]
    pub ylabel: Option<String>,

    /// Wrap tikz output in a complete LaTeX document
    #[arg(long, action = ArgAction::SetTrue)]
    pub standalone: bool,

    /// Output file name without extension
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub output: Option<String>,

    /// Overwrite existing output files
    #[arg(short, long, action = ArgAction::SetTrue)]
    pub force: bool,

    /// Verbose logging
    #[arg(short, long, action = ArgAction::SetTrue)]
    pub verbose: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum CompareOpt {
    Exitflag,
    Optimalvalues,
}

impl From<CompareOpt> for Compare {
    fn from(value: CompareOpt) -> Self {
        match value {
            CompareOpt::Exitflag => Compare::ExitFlag,
            CompareOpt::Optimalvalues => Compare::OptimalValues,
        }
    }
}

impl Args {
    pub fn backend(&self) -> Backend {
        if self.bokeh {
            Backend::Bokeh
        } else if self.mp {
            Backend::Mp
        } else if self.raw {
            Backend::Raw
        } else {
            Backend::Tikz
        }
    }

    /// The explicitly requested output format, if any.
    pub fn output_format(&self) -> Option<OutputFormat> {
        [
            (self.html, OutputFormat::Html),
            (self.pdf, OutputFormat::Pdf),
            (self.tex, OutputFormat::Tex),
            (self.png, OutputFormat::Png),
            (self.eps, OutputFormat::Eps),
            (self.ps, OutputFormat::Ps),
            (self.svg, OutputFormat::Svg),
        ]
        .into_iter()
        .find_map(|(set, format)| set.then_some(format))
    }
}

/// Parse command-line tokens (without the program name).
pub fn set_arguments<I, T>(tokens: I) -> Result<Args, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let argv = std::iter::once(OsString::from("perprof")).chain(tokens.into_iter().map(Into::into));
    Args::try_parse_from(argv)
}

/// Resolve parsed arguments into parser and profiler options.
pub fn process_arguments(args: &Args) -> Result<(ParserOptions, ProfilerOptions), PerfError> {
    let backend = args.backend();
    let output_format = match (backend, args.output_format()) {
        (Backend::Raw, Some(format)) => {
            return Err(PerfError::UnsupportedFormat { backend, format })
        }
        (_, Some(format)) => Some(format),
        (_, None) => backend.default_format(),
    };

    let subset = args.subset.as_deref().map(load_subset).transpose()?;

    let sources = if args.demo {
        demo_sources()
    } else {
        args.files.iter().cloned().map(TableSource::File).collect()
    };

    let parser = ParserOptions {
        sources,
        subset,
        success: args
            .success
            .split(',')
            .map(str::trim)
            .filter(|flag| !flag.is_empty())
            .map(str::to_string)
            .collect(),
        compare: args.compare.into(),
        unconstrained: args.unconstrained,
        mintime: args.mintime,
        maxtime: args.maxtime.unwrap_or(f64::INFINITY),
        infeasibility_tolerance: args.infeasibility_tolerance,
        fval_tolerance: args.fval_tolerance,
    };
    parser.validate()?;

    let defaults = ProfilerOptions::for_backend(backend);
    let profiler = ProfilerOptions {
        backend,
        output_format,
        output: args
            .output
            .clone()
            .unwrap_or_else(|| DEFAULT_OUTPUT_STEM.to_string()),
        output_given: args.output.is_some(),
        title: args.title.clone().unwrap_or(defaults.title),
        xlabel: args.xlabel.clone().unwrap_or(defaults.xlabel),
        ylabel: args.ylabel.clone().unwrap_or(defaults.ylabel),
        semilog: args.semilog,
        tau: args.tau,
        black_and_white: args.black_and_white,
        background: args.background,
        page_background: args.page_background,
        standalone: args.standalone,
        force: args.force,
    };
    profiler.validate()?;

    Ok((parser, profiler))
}
