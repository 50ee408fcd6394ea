#![forbid(unsafe_code)]

//! Append-only CSV files.
//!
//! Files are opened in append mode per call and closed when the writer is
//! dropped, on success or error. Nothing already in a file is ever rewritten.

use anyhow::{Context, Result};
use std::{
    borrow::Cow,
    fs::{self, OpenOptions},
    io::{BufWriter, Write},
    path::Path,
};

const RECORD_TERMINATOR: &str = "\r\n";

/// Appends one CSV line per record, each ended by CRLF. Values are quoted
/// only when they contain a delimiter, a quote or a line break; embedded
/// quotes are doubled.
pub fn append_records<I, R>(path: &Path, records: I) -> Result<usize>
where
    I: IntoIterator<Item = R>,
    R: AsRef<[String]>,
{
    let mut writer = open_append(path)?;
    let mut written = 0;
    for record in records {
        let line = record
            .as_ref()
            .iter()
            .map(|value| csv_field(value))
            .collect::<Vec<_>>()
            .join(",");
        write!(writer, "{line}{RECORD_TERMINATOR}")
            .with_context(|| format!("Writing {}", path.display()))?;
        written += 1;
    }
    writer
        .flush()
        .with_context(|| format!("Flushing {}", path.display()))?;
    tracing::debug!(path = %path.display(), rows = written, "appended CSV records");
    Ok(written)
}

/// Appends lines that are already formatted. `header` is written first only
/// when the file does not exist yet, so an accumulating file carries it once.
pub fn append_lines(path: &Path, lines: &[String], header: Option<&str>) -> Result<()> {
    let is_new = !path.exists();
    let mut writer = open_append(path)?;
    if is_new && let Some(header) = header {
        writeln!(writer, "{header}").with_context(|| format!("Writing {}", path.display()))?;
    }
    for line in lines {
        writeln!(writer, "{line}").with_context(|| format!("Writing {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("Flushing {}", path.display()))?;
    tracing::debug!(path = %path.display(), rows = lines.len(), "appended rows");
    Ok(())
}

fn open_append(path: &Path) -> Result<BufWriter<fs::File>> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("Creating {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Opening {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn appends_without_header_and_quotes_minimally() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("data/channels.csv");
        append_records(&path, vec![vec!["plain".into(), "a,b".into(), "say \"hi\"".into()]])?;
        append_records(&path, vec![vec!["second".into(), String::new(), "x".into()]])?;

        let contents = fs::read_to_string(&path)?;
        assert_eq!(contents, "plain,\"a,b\",\"say \"\"hi\"\"\"\r\nsecond,,x\r\n");
        Ok(())
    }

    #[test]
    fn header_only_lands_in_a_new_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("TH_videos.csv");
        append_lines(&path, &["\"r1\"".into()], Some("\"h\""))?;
        append_lines(&path, &["\"r2\"".into()], Some("\"h\""))?;
        assert_eq!(fs::read_to_string(&path)?, "\"h\"\n\"r1\"\n\"r2\"\n");
        Ok(())
    }

    #[test]
    fn no_header_when_not_requested() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("out.csv");
        append_lines(&path, &["\"r1\"".into()], None)?;
        assert_eq!(fs::read_to_string(&path)?, "\"r1\"\n");
        Ok(())
    }
}
