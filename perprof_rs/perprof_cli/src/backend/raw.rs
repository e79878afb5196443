use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use perprof::{write_raw, ProfileData, ProfilerOptions};
use tracing::info;

use super::{check_output, Profiler};

/// Breakpoint table on stdout, or in `<output>.txt` when `--output` is given.
pub struct RawProfiler {
    data: ProfileData,
    options: ProfilerOptions,
    output: Option<PathBuf>,
}

impl RawProfiler {
    pub fn new(data: ProfileData, options: ProfilerOptions) -> Self {
        let output = options.output_path();
        Self {
            data,
            options,
            output,
        }
    }
}

impl Profiler for RawProfiler {
    fn data(&self) -> &ProfileData {
        &self.data
    }

    fn options(&self) -> &ProfilerOptions {
        &self.options
    }

    fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    fn plot(&self) -> Result<()> {
        match &self.output {
            Some(path) => {
                check_output(path, self.options.force)?;
                let file = File::create(path)
                    .with_context(|| format!("failed to create {}", path.display()))?;
                write_raw(&self.data, BufWriter::new(file))?;
                info!("wrote {}", path.display());
            }
            None => {
                let stdout = io::stdout();
                write_raw(&self.data, stdout.lock())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::build_profiler;
    use crate::backend::tests::{good_files, options_in, parser_with, sample};
    use perprof::Backend;
    use std::fs;

    #[test]
    fn writes_table_file_when_named() {
        let dir = tempfile::tempdir().unwrap();
        let options = options_in(dir.path(), Backend::Raw, None);
        let profiler = build_profiler(&parser_with(good_files()), &options).unwrap();
        profiler.plot().unwrap();

        let text = fs::read_to_string(dir.path().join("profile.txt")).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("tau Alpha Beta Gamma"));
        let last = lines.last().unwrap();
        let values: Vec<f64> = last
            .split(' ')
            .skip(1)
            .map(|v| v.parse().unwrap())
            .collect();
        assert!(values.iter().all(|v| *v > 0.0 && *v <= 1.0));
    }

    #[test]
    fn dumps_even_without_successes() {
        let dir = tempfile::tempdir().unwrap();
        let options = options_in(dir.path(), Backend::Raw, None);
        let profiler =
            build_profiler(&parser_with(vec![sample("no-success.sample")]), &options).unwrap();
        profiler.plot().unwrap();
        let text = fs::read_to_string(dir.path().join("profile.txt")).unwrap();
        assert_eq!(text.lines().nth(1), Some("1.000000 0.000000"));
    }
}
