//! Delimited-text task source backed by the `csv` crate.
//!
//! Records are `name,status,result` without a header row by default. A
//! missing or empty `result` reads as an empty string.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::{Task, TaskStatus};
use crate::error::SourceError;
use crate::ports::{ItemReader, ItemSource};

#[derive(Debug, Deserialize)]
struct TaskRecord {
    name: String,
    status: TaskStatus,
    #[serde(default)]
    result: String,
}

/// Reads [`Task`]s from a delimited file.
#[derive(Debug, Clone)]
pub struct CsvItemSource {
    path: PathBuf,
    delimiter: u8,
    has_headers: bool,
    max_item_count: Option<usize>,
}

impl CsvItemSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: b',',
            has_headers: false,
            max_item_count: None,
        }
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Skip the first row.
    pub fn has_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = has_headers;
        self
    }

    /// Stop after this many records.
    pub fn max_item_count(mut self, max: usize) -> Self {
        self.max_item_count = Some(max);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ItemSource<Task> for CsvItemSource {
    async fn open(&self) -> Result<Box<dyn ItemReader<Task>>, SourceError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.path.display().to_string(),
                source,
            })?;

        let records = csv::ReaderBuilder::new()
            .has_headers(self.has_headers)
            .delimiter(self.delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(Cursor::new(bytes))
            .into_deserialize::<TaskRecord>();

        Ok(Box::new(CsvReader {
            records,
            remaining: self.max_item_count,
        }))
    }
}

struct CsvReader {
    records: csv::DeserializeRecordsIntoIter<Cursor<Vec<u8>>, TaskRecord>,
    remaining: Option<usize>,
}

#[async_trait]
impl ItemReader<Task> for CsvReader {
    async fn read(&mut self) -> Result<Option<Task>, SourceError> {
        if self.remaining == Some(0) {
            return Ok(None);
        }
        let Some(record) = self.records.next() else {
            return Ok(None);
        };
        let record = record.map_err(|e| SourceError::Parse {
            line: e.position().map(|p| p.line()).unwrap_or(0),
            message: e.to_string(),
        })?;

        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        Ok(Some(Task::from_parts(record.name, record.status, record.result)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn csv_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    async fn read_all(source: &CsvItemSource) -> Result<Vec<Task>, SourceError> {
        let mut reader = source.open().await?;
        let mut tasks = Vec::new();
        while let Some(task) = reader.read().await? {
            tasks.push(task);
        }
        Ok(tasks)
    }

    #[tokio::test]
    async fn reads_headerless_records_with_missing_results() {
        let file = csv_file("t1,NEW,\nt2,IN_PROGRESS\nt3, DONE ,Processed\n");

        let tasks = read_all(&CsvItemSource::new(file.path())).await.unwrap();

        assert_eq!(
            tasks,
            vec![
                Task::from_parts("t1", TaskStatus::New, ""),
                Task::from_parts("t2", TaskStatus::InProgress, ""),
                Task::from_parts("t3", TaskStatus::Done, "Processed"),
            ]
        );
    }

    #[tokio::test]
    async fn max_item_count_caps_every_open() {
        let file = csv_file("t1,NEW,\nt2,NEW,\nt3,NEW,\n");
        let source = CsvItemSource::new(file.path()).max_item_count(1);

        for _ in 0..2 {
            let tasks = read_all(&source).await.unwrap();
            assert_eq!(tasks, vec![Task::new("t1")]);
        }
    }

    #[tokio::test]
    async fn headers_and_delimiter_are_configurable() {
        let file = csv_file("name;status;result\nt1;NEW;\n");
        let source = CsvItemSource::new(file.path()).has_headers(true).delimiter(b';');

        assert_eq!(read_all(&source).await.unwrap(), vec![Task::new("t1")]);
    }

    #[tokio::test]
    async fn unknown_status_is_a_parse_error() {
        let file = csv_file("t1,NEW,\nt2,SLEEPING,\n");

        let err = read_all(&CsvItemSource::new(file.path())).await.unwrap_err();

        assert!(matches!(err, SourceError::Parse { line: 2, .. }), "{err:?}");
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvItemSource::new(dir.path().join("absent.csv"));

        assert!(matches!(read_all(&source).await, Err(SourceError::Io { .. })));
    }
}
