//! Append-only text file sink.

use std::fmt::Display;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::error::SinkError;
use crate::ports::ItemSink;

/// Writes one line per item (`Display` + `\n`).
///
/// Each chunk write opens the file in append mode, writes every line and
/// closes it again. A write that fails partway is cut back to the previous
/// file length, so a chunk is either fully appended or not at all. The mutex
/// keeps concurrent chunk writes from interleaving.
#[derive(Debug)]
pub struct FileItemSink {
    path: PathBuf,
    lock: Mutex<()>,

    /// Bytes written before an injected failure.
    #[cfg(test)]
    fail_after: Option<usize>,
}

impl FileItemSink {
    /// Sink at `path`, starting from an empty file.
    pub async fn create(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let sink = Self::append_to(path);
        sink.truncate().await?;
        Ok(sink)
    }

    /// Sink at `path` that keeps whatever the file already holds.
    pub fn append_to(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            #[cfg(test)]
            fail_after: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn truncate(&self) -> Result<(), SinkError> {
        let _guard = self.lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "output file removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn append(&self, file: &mut File, bytes: &[u8]) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;

        #[cfg(test)]
        if let Some(n) = self.fail_after {
            file.write_all(&bytes[..n.min(bytes.len())]).await?;
            file.flush().await?;
            return Err(io::Error::other("injected write failure"));
        }
        file.write_all(bytes).await?;
        file.flush().await
    }
}

#[async_trait]
impl<O> ItemSink<O> for FileItemSink
where
    O: Display + Send + Sync + 'static,
{
    async fn write(&self, items: &[O]) -> Result<(), SinkError> {
        let mut buf = String::new();
        for item in items {
            buf.push_str(&item.to_string());
            buf.push('\n');
        }

        let _guard = self.lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let previous_len = file.metadata().await?.len();

        if let Err(e) = self.append(&mut file, buf.as_bytes()).await {
            if let Err(rollback) = file.set_len(previous_len).await {
                error!(
                    path = %self.path.display(),
                    error = %rollback,
                    "could not roll back partial chunk write"
                );
            }
            return Err(e.into());
        }
        Ok(())
    }

    async fn reset(&self) -> Result<(), SinkError> {
        self.truncate().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Task, TaskStatus};

    fn done(name: &str) -> Task {
        Task::from_parts(name, TaskStatus::Done, "Processed")
    }

    #[tokio::test]
    async fn create_discards_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.txt");
        std::fs::write(&path, "stale\n").unwrap();

        let sink = FileItemSink::create(&path).await.unwrap();
        sink.write(&[done("t1")]).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Task(name=t1, status=DONE, result=Processed)\n"
        );
    }

    #[tokio::test]
    async fn chunks_are_appended_in_write_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.txt");
        let sink = FileItemSink::create(&path).await.unwrap();

        sink.write(&[done("t1"), done("t2")]).await.unwrap();
        sink.write(&[done("t3")]).await.unwrap();

        let lines: Vec<String> = std::fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();
        assert_eq!(
            lines,
            vec![
                "Task(name=t1, status=DONE, result=Processed)",
                "Task(name=t2, status=DONE, result=Processed)",
                "Task(name=t3, status=DONE, result=Processed)",
            ]
        );
    }

    #[tokio::test]
    async fn reset_then_rerun_leaves_only_the_new_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.txt");
        let sink = FileItemSink::append_to(&path);

        sink.write(&[done("old")]).await.unwrap();
        ItemSink::<Task>::reset(&sink).await.unwrap();
        ItemSink::<Task>::reset(&sink).await.unwrap();
        sink.write(&[done("t1")]).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Task(name=t1, status=DONE, result=Processed)\n"
        );
    }

    #[tokio::test]
    async fn failed_write_leaves_no_partial_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.txt");
        let mut sink = FileItemSink::create(&path).await.unwrap();
        sink.write(&[done("t1")]).await.unwrap();

        sink.fail_after = Some(12);
        let err = sink.write(&[done("t2"), done("t3")]).await;
        assert!(matches!(err, Err(SinkError::Io(_))));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Task(name=t1, status=DONE, result=Processed)\n"
        );

        sink.fail_after = None;
        sink.write(&[done("t2"), done("t3")]).await.unwrap();
        let lines: Vec<String> = std::fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();
        assert_eq!(
            lines,
            vec![
                "Task(name=t1, status=DONE, result=Processed)",
                "Task(name=t2, status=DONE, result=Processed)",
                "Task(name=t3, status=DONE, result=Processed)",
            ]
        );
    }

    #[tokio::test]
    async fn create_works_without_an_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.txt");

        FileItemSink::create(&path).await.unwrap();

        assert!(!path.exists());
    }
}
