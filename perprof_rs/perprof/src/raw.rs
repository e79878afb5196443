use std::io::Write;

use crate::profile::ProfileData;
use crate::{PerfError, Result};

/// Dump the profile as a space separated table: a `tau <solver>...` header
/// and one row per breakpoint.
pub fn write_raw<W: Write>(data: &ProfileData, out: W) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .from_writer(out);

    let mut header = vec!["tau".to_string()];
    header.extend(data.solvers().iter().cloned());
    writer.write_record(&header).map_err(csv_error)?;

    for (k, tau) in data.breakpoints().iter().enumerate() {
        let mut record = vec![format!("{:.6}", tau)];
        for s in 0..data.solvers().len() {
            record.push(format!("{:.6}", data.curve(s)[k]));
        }
        writer.write_record(&record).map_err(csv_error)?;
    }
    writer
        .flush()
        .map_err(|e| PerfError::io("<raw output>", e))?;
    Ok(())
}

fn csv_error(err: csv::Error) -> PerfError {
    match err.into_kind() {
        csv::ErrorKind::Io(source) => PerfError::io("<raw output>", source),
        other => PerfError::InvalidParameter(format!("failed to write raw table: {other:?}")),
    }
}
