//! Solver result tables and problem subsets.
//!
//! A table is an optional YAML header between two `---` lines followed by one
//! whitespace separated row per problem:
//!
//! ```text
//! ---
//! algname: Alpha
//! success: c,optimal
//! free_format: true
//! ---
//! HS21   c  0.12
//! HS35   d  3.00
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::options::{Compare, ParserOptions, TableSource};
use crate::{PerfError, Result};

/// One parsed solver table.
#[derive(Clone, Debug, PartialEq)]
pub struct SolverTable {
    pub algname: String,
    /// Rows in file order.
    pub rows: Vec<ProblemResult>,
}

impl SolverTable {
    pub fn solved_count(&self) -> usize {
        self.rows.iter().filter(|r| r.solved).count()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProblemResult {
    pub problem: String,
    /// The exit flag is one of the success flags.
    pub solved: bool,
    pub time: f64,
    /// Present for solved rows when comparing optimal values.
    pub objective: Option<Objective>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Objective {
    pub fval: f64,
    /// `None` for unconstrained problems.
    pub primal: Option<f64>,
    pub dual: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Header {
    algname: Option<String>,
    success: Option<SuccessFlags>,
    free_format: Option<bool>,
    col_name: Option<usize>,
    col_exit: Option<usize>,
    col_time: Option<usize>,
    col_fval: Option<usize>,
    col_primal: Option<usize>,
    col_dual: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SuccessFlags {
    List(Vec<String>),
    Joined(String),
}

impl SuccessFlags {
    fn into_flags(self) -> Vec<String> {
        let raw = match self {
            SuccessFlags::List(list) => list,
            SuccessFlags::Joined(joined) => joined.split(',').map(str::to_string).collect(),
        };
        raw.into_iter()
            .map(|flag| flag.trim().to_string())
            .filter(|flag| !flag.is_empty())
            .collect()
    }
}

/// Zero-based column positions.
#[derive(Clone, Copy, Debug)]
struct Columns {
    name: usize,
    exit: usize,
    time: usize,
    fval: usize,
    primal: usize,
    dual: usize,
}

impl Columns {
    fn from_header(header: &Header, table: &str) -> Result<Self> {
        let pick = |value: Option<usize>, default: usize, key: &str| match value {
            None => Ok(default - 1),
            Some(0) => Err(PerfError::Header {
                table: table.to_string(),
                message: format!("{key} is 1-based, got 0"),
            }),
            Some(col) => Ok(col - 1),
        };
        Ok(Self {
            name: pick(header.col_name, 1, "col_name")?,
            exit: pick(header.col_exit, 2, "col_exit")?,
            time: pick(header.col_time, 3, "col_time")?,
            fval: pick(header.col_fval, 4, "col_fval")?,
            primal: pick(header.col_primal, 5, "col_primal")?,
            dual: pick(header.col_dual, 6, "col_dual")?,
        })
    }

    /// Number of columns a row needs under the given comparison mode.
    fn required(&self, compare: Compare, unconstrained: bool) -> usize {
        let mut needed = self.name.max(self.exit).max(self.time);
        if compare == Compare::OptimalValues {
            needed = needed.max(self.fval).max(self.dual);
            if !unconstrained {
                needed = needed.max(self.primal);
            }
        }
        needed + 1
    }
}

/// Read and validate one table.
pub fn parse_table(source: &TableSource, opts: &ParserOptions) -> Result<SolverTable> {
    match source {
        TableSource::File(path) => {
            let text = read_text(path)?;
            parse_named(
                &source.display_name(),
                &source.default_solver_name(),
                &text,
                opts,
            )
        }
        TableSource::Embedded { name, contents } => parse_named(name, name, contents, opts),
    }
}

/// Undecodable bytes are bad input, not an I/O failure.
fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| PerfError::io(path, e))?;
    String::from_utf8(bytes).map_err(|e| {
        let valid = e.utf8_error().valid_up_to();
        let line = e.as_bytes()[..valid].iter().filter(|&&b| b == b'\n').count() + 1;
        PerfError::Encoding {
            table: path.display().to_string(),
            line,
        }
    })
}

/// Parse a table from text; `name` labels diagnostics and is the fallback
/// solver name.
pub fn parse_str(name: &str, text: &str, opts: &ParserOptions) -> Result<SolverTable> {
    parse_named(name, name, text, opts)
}

fn parse_named(
    table: &str,
    default_algname: &str,
    text: &str,
    opts: &ParserOptions,
) -> Result<SolverTable> {
    let (header, body_start) = split_header(table, text)?;
    let columns = Columns::from_header(&header, table)?;
    let required = columns.required(opts.compare, opts.unconstrained);
    let free_format = header.free_format.unwrap_or(false);
    let success = match header.success {
        Some(flags) => flags.into_flags(),
        None => opts.success.clone(),
    };
    if success.is_empty() {
        return Err(PerfError::Header {
            table: table.to_string(),
            message: "success lists no exit flags".into(),
        });
    }
    let algname = header
        .algname
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| default_algname.to_string());

    let mut rows = Vec::new();
    let mut seen = HashSet::new();
    for (idx, line) in text.lines().enumerate().skip(body_start) {
        let line_no = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() < required {
            return Err(PerfError::MissingColumns {
                table: table.to_string(),
                line: line_no,
                found: fields.len(),
                required,
            });
        }

        let problem = fields[columns.name];
        let flag = fields[columns.exit];
        if !free_format && flag != "c" && flag != "d" {
            return Err(PerfError::InvalidExitFlag {
                table: table.to_string(),
                line: line_no,
                flag: flag.to_string(),
            });
        }
        let solved = success.iter().any(|s| s == flag);

        let raw_time = fields[columns.time];
        let time: f64 = raw_time
            .parse()
            .ok()
            .filter(|t: &f64| t.is_finite())
            .ok_or_else(|| PerfError::InvalidTime {
                table: table.to_string(),
                line: line_no,
                value: raw_time.to_string(),
            })?;
        if time <= 0.0 {
            return Err(PerfError::NonPositiveTime {
                table: table.to_string(),
                line: line_no,
                problem: problem.to_string(),
            });
        }

        if !seen.insert(problem) {
            return Err(PerfError::DuplicateProblem {
                table: table.to_string(),
                line: line_no,
                problem: problem.to_string(),
            });
        }

        let objective = if solved && opts.compare == Compare::OptimalValues {
            let number = |column: &'static str, idx: usize| -> Result<f64> {
                let raw = fields[idx];
                raw.parse::<f64>()
                    .ok()
                    .filter(|v| !v.is_nan())
                    .ok_or_else(|| PerfError::InvalidValue {
                        table: table.to_string(),
                        line: line_no,
                        column,
                        value: raw.to_string(),
                    })
            };
            Some(Objective {
                fval: number("fval", columns.fval)?,
                primal: if opts.unconstrained {
                    None
                } else {
                    Some(number("primal", columns.primal)?)
                },
                dual: number("dual", columns.dual)?,
            })
        } else {
            None
        };

        rows.push(ProblemResult {
            problem: problem.to_string(),
            solved,
            time,
            objective,
        });
    }

    if rows.is_empty() {
        return Err(PerfError::EmptyTable {
            table: table.to_string(),
        });
    }

    let table_out = SolverTable { algname, rows };
    if table_out.solved_count() == 0 {
        warn!("{}: {} solved no problem", table, table_out.algname);
    }
    debug!(
        "{}: loaded {} problems for {} ({} solved)",
        table,
        table_out.rows.len(),
        table_out.algname,
        table_out.solved_count()
    );
    Ok(table_out)
}

/// Returns the header and the index of the first body line.
fn split_header(table: &str, text: &str) -> Result<(Header, usize)> {
    let lines: Vec<&str> = text.lines().collect();
    let Some(open) = lines.iter().position(|l| !l.trim().is_empty()) else {
        return Ok((Header::default(), lines.len()));
    };
    if lines[open].trim_end() != "---" {
        return Ok((Header::default(), 0));
    }
    let close = lines[open + 1..]
        .iter()
        .position(|l| matches!(l.trim_end(), "---" | "..."))
        .map(|offset| open + 1 + offset)
        .ok_or_else(|| PerfError::Header {
            table: table.to_string(),
            message: "header opened with '---' is never closed".into(),
        })?;

    let yaml = lines[open + 1..close].join("\n");
    let header = if yaml.trim().is_empty() {
        Header::default()
    } else {
        serde_yaml::from_str(&yaml).map_err(|e| PerfError::Header {
            table: table.to_string(),
            message: e.to_string(),
        })?
    };
    Ok((header, close + 1))
}

/// Read a subset file: one problem name per line, `#` starts a comment.
pub fn load_subset(path: &Path) -> Result<Vec<String>> {
    let text = read_text(path)?;
    let names: Vec<String> = text
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        return Err(PerfError::EmptySubset(path.to_path_buf()));
    }
    debug!("{}: subset of {} problems", path.display(), names.len());
    Ok(names)
}
