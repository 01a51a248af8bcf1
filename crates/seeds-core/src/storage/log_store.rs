use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::{format_row, parse_row, LogSchema, StoreError};
use crate::observation::Observation;

/// Append-only observation log.
///
/// The store holds no file handle between calls; every operation opens the
/// file, does its work and releases it, so concurrent readers (the status job)
/// always see whole rows.
#[derive(Debug, Clone)]
pub struct LogStore {
    path: PathBuf,
    schema: LogSchema,
}

impl LogStore {
    pub fn new(path: impl Into<PathBuf>, schema: LogSchema) -> Self {
        Self {
            path: path.into(),
            schema,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> LogSchema {
        self.schema
    }

    fn io_error(&self, action: &'static str) -> impl FnOnce(io::Error) -> StoreError + '_ {
        move |source| StoreError::Io {
            action,
            path: self.path.clone(),
            source,
        }
    }

    /// Append one row, writing the header first if the file is new or empty.
    ///
    /// A previous write cut short before its newline is terminated first, so
    /// the torn row stays on its own line.
    pub fn append(&self, observation: &Observation) -> Result<(), StoreError> {
        let row = format_row(self.schema, observation)?;
        let needs_header = self.check_header()?.is_none();

        let mut chunk = String::with_capacity(row.len() + 64);
        if needs_header {
            info!("Creating log {} ({:?})", self.path.display(), self.schema);
            chunk.push_str(&self.schema.header());
            chunk.push('\n');
        } else if !self.ends_with_newline()? {
            warn!("{} ends in a partial row", self.path.display());
            chunk.push('\n');
        }
        chunk.push_str(&row);
        chunk.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(self.io_error("open"))?;
        file.write_all(chunk.as_bytes())
            .map_err(self.io_error("append to"))?;
        file.flush().map_err(self.io_error("flush"))?;

        debug!("Logged {}", row);
        Ok(())
    }

    /// Every row, oldest first. A missing file reads as empty.
    pub fn read_all(&self) -> Result<Vec<Observation>, StoreError> {
        self.tail(usize::MAX)
    }

    /// The last `n` rows, oldest first; all rows when fewer exist.
    ///
    /// Only the returned rows are parsed, so an old malformed row does not
    /// break the trend window.
    pub fn tail(&self, n: usize) -> Result<Vec<Observation>, StoreError> {
        self.tail_rows(n)?.into_iter().collect()
    }

    /// Like [`tail`](Self::tail), but each row is parsed on its own: a damaged
    /// row comes back as its error without hiding the rows around it. Only a
    /// failure to read the file or a schema mismatch fails the whole call.
    pub fn tail_rows(
        &self,
        n: usize,
    ) -> Result<Vec<Result<Observation, StoreError>>, StoreError> {
        let Some(lines) = self.data_lines()? else {
            return Ok(Vec::new());
        };

        let skip = lines.len().saturating_sub(n);
        Ok(lines
            .into_iter()
            .skip(skip)
            .map(|(line, text)| parse_row(self.schema, &self.path, line, &text))
            .collect())
    }

    /// Most recent row, if any.
    pub fn last(&self) -> Result<Option<Observation>, StoreError> {
        Ok(self.tail(1)?.pop())
    }

    fn open_existing(&self) -> Result<Option<File>, StoreError> {
        match File::open(&self.path) {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error("open")(e)),
        }
    }

    /// Header of an existing, non-empty log, verified against the schema.
    fn check_header(&self) -> Result<Option<String>, StoreError> {
        let Some(file) = self.open_existing()? else {
            return Ok(None);
        };
        let mut header = String::new();
        BufReader::new(file)
            .read_line(&mut header)
            .map_err(self.io_error("read"))?;
        let header = header.trim_end_matches(['\r', '\n']);

        if header.is_empty() {
            return Ok(None);
        }
        self.verify_header(header)?;
        Ok(Some(header.to_string()))
    }

    /// Whether the last byte of a non-empty log is a newline.
    fn ends_with_newline(&self) -> Result<bool, StoreError> {
        let Some(mut file) = self.open_existing()? else {
            return Ok(true);
        };
        if file.metadata().map_err(self.io_error("stat"))?.len() == 0 {
            return Ok(true);
        }

        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))
            .map_err(self.io_error("seek in"))?;
        file.read_exact(&mut last).map_err(self.io_error("read"))?;
        Ok(last[0] == b'\n')
    }

    fn verify_header(&self, header: &str) -> Result<(), StoreError> {
        if header == self.schema.header() {
            Ok(())
        } else {
            Err(StoreError::SchemaMismatch {
                path: self.path.clone(),
                expected: self.schema,
                found: header.to_string(),
            })
        }
    }

    /// Non-blank data lines with their 1-based line numbers, or `None` when
    /// the log does not exist yet.
    fn data_lines(&self) -> Result<Option<Vec<(usize, String)>>, StoreError> {
        let Some(file) = self.open_existing()? else {
            return Ok(None);
        };

        let mut lines = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(self.io_error("read"))?;
            let line = line.trim_end_matches('\r');
            if index == 0 {
                if line.is_empty() {
                    return Ok(None);
                }
                self.verify_header(line)?;
                continue;
            }
            if !line.trim().is_empty() {
                lines.push((index + 1, line.to_string()));
            }
        }
        Ok(Some(lines))
    }
}
