use csv::{QuoteStyle, StringRecord, StringRecordsIntoIter, WriterBuilder};
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Input CSV {path} has no column named {column:?}")]
    MissingColumn { path: PathBuf, column: String },

    #[error("Row {line} of {path} has no value for column {column:?}")]
    MissingCell {
        path: PathBuf,
        line: u64,
        column: String,
    },
}

/// Truncate-and-write CSV output.
///
/// The header is written on creation, so even an export with zero rows
/// leaves a valid file behind. Every field is quoted; embedded quotes are
/// doubled. Rows must have exactly as many fields as the header.
pub struct CsvExport {
    writer: csv::Writer<File>,
    path: PathBuf,
    rows: usize,
}

impl CsvExport {
    pub fn create(path: &Path, header: &[&str]) -> Result<Self, ExportError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ExportError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let file = File::create(path).map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .from_writer(file);

        let mut export = Self {
            writer,
            path: path.to_path_buf(),
            rows: 0,
        };
        export.write(header)?;
        debug!(path = %path.display(), columns = header.len(), "created CSV export");
        Ok(export)
    }

    pub fn write_row<I, T>(&mut self, row: I) -> Result<(), ExportError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.write(row)?;
        self.rows += 1;
        Ok(())
    }

    /// Flush to disk and return the number of data rows written.
    pub fn finish(mut self) -> Result<usize, ExportError> {
        self.writer.flush().map_err(|source| ExportError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(self.rows)
    }

    fn write<I, T>(&mut self, row: I) -> Result<(), ExportError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writer
            .write_record(row)
            .map_err(|source| ExportError::Csv {
                path: self.path.clone(),
                source,
            })
    }
}

/// Header-name → column-position lookup for a previously exported CSV.
#[derive(Debug, Clone)]
pub struct ColumnIndex {
    path: PathBuf,
    columns: HashMap<String, usize>,
}

impl ColumnIndex {
    pub fn from_header(path: &Path, header: &StringRecord) -> Self {
        let columns = header
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), i))
            .collect();
        Self {
            path: path.to_path_buf(),
            columns,
        }
    }

    /// Fail early if any of `names` is not a column of the input.
    pub fn require(&self, names: &[&str]) -> Result<(), ExportError> {
        match names.iter().find(|name| !self.columns.contains_key(**name)) {
            Some(missing) => Err(ExportError::MissingColumn {
                path: self.path.clone(),
                column: missing.to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn field<'r>(&self, record: &'r StringRecord, name: &str) -> Result<&'r str, ExportError> {
        let index = self
            .columns
            .get(name)
            .ok_or_else(|| ExportError::MissingColumn {
                path: self.path.clone(),
                column: name.to_string(),
            })?;
        record.get(*index).ok_or_else(|| ExportError::MissingCell {
            path: self.path.clone(),
            line: record.position().map(|p| p.line()).unwrap_or_default(),
            column: name.to_string(),
        })
    }
}

/// Open an input CSV, index its header row and hand back the remaining rows.
pub fn open_input(path: &Path) -> Result<(ColumnIndex, StringRecordsIntoIter<File>), ExportError> {
    let csv_error = |source| ExportError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(csv_error)?;
    let header = reader.headers().map_err(csv_error)?.clone();
    debug!(path = %path.display(), columns = header.len(), "indexed input CSV header");
    Ok((ColumnIndex::from_header(path, &header), reader.into_records()))
}

/// Map a row-level read failure from [`open_input`]'s iterator.
pub fn row_error(path: &Path, source: csv::Error) -> ExportError {
    ExportError::Csv {
        path: path.to_path_buf(),
        source,
    }
}
