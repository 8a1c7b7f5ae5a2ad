// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Checkpoint stream naming and access.
//!
//! A checkpoint is a directory (`bundle_path`) plus a `label`. Region state
//! lives in flat files named `<label>.<region>.<stream>` inside it. A
//! [`BundleIo`] hands out one stream at a time; the claim is released when
//! the reader or writer is dropped.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleMode {
    Read,
    Write,
}

#[derive(Debug)]
pub struct BundleIo {
    bundle_path: PathBuf,
    label: String,
    region_name: String,
    mode: BundleMode,
    open: Arc<Mutex<Option<String>>>,
}

/// Clears the open-stream slot when dropped
#[derive(Debug)]
struct StreamClaim {
    open: Arc<Mutex<Option<String>>>,
}

impl Drop for StreamClaim {
    fn drop(&mut self) {
        *self.open.lock() = None;
    }
}

impl BundleIo {
    pub fn new(bundle_path: &Path, label: &str, region_name: &str, mode: BundleMode) -> Self {
        Self {
            bundle_path: bundle_path.to_path_buf(),
            label: label.to_string(),
            region_name: region_name.to_string(),
            mode,
            open: Arc::new(Mutex::new(None)),
        }
    }

    pub fn bundle_path(&self) -> &Path {
        &self.bundle_path
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn region_name(&self) -> &str {
        &self.region_name
    }

    pub fn mode(&self) -> BundleMode {
        self.mode
    }

    /// `bundle_path/label.region.stream`
    pub fn path(&self, stream: &str) -> PathBuf {
        self.bundle_path
            .join(format!("{}.{}.{}", self.label, self.region_name, stream))
    }

    pub fn exists(&self, stream: &str) -> bool {
        self.path(stream).is_file()
    }

    pub fn output_stream(&self, stream: &str) -> EngineResult<BundleWriter> {
        self.check_mode(BundleMode::Write, stream)?;
        let claim = self.claim(stream)?;
        let path = self.path(stream);
        debug!(target: "nupic-engine", "writing checkpoint stream {}", path.display());
        let file = File::create(&path)?;
        Ok(BundleWriter {
            inner: BufWriter::new(file),
            _claim: claim,
        })
    }

    pub fn input_stream(&self, stream: &str) -> EngineResult<BundleReader> {
        self.check_mode(BundleMode::Read, stream)?;
        let claim = self.claim(stream)?;
        let path = self.path(stream);
        debug!(target: "nupic-engine", "reading checkpoint stream {}", path.display());
        let file = File::open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                EngineError::BadCheckpoint(format!("missing stream {}", path.display()))
            }
            _ => EngineError::Io(e),
        })?;
        Ok(BundleReader {
            inner: BufReader::new(file),
            _claim: claim,
        })
    }

    fn check_mode(&self, wanted: BundleMode, stream: &str) -> EngineResult<()> {
        if self.mode != wanted {
            return Err(EngineError::WrongStreamMode(format!(
                "{:?} stream '{}' requested from a {:?} bundle",
                wanted, stream, self.mode
            )));
        }
        Ok(())
    }

    fn claim(&self, stream: &str) -> EngineResult<StreamClaim> {
        let mut open = self.open.lock();
        if let Some(current) = open.as_ref() {
            return Err(EngineError::StreamAlreadyOpen(format!(
                "'{}' requested while '{}' is open for region '{}'",
                stream, current, self.region_name
            )));
        }
        *open = Some(stream.to_string());
        Ok(StreamClaim {
            open: Arc::clone(&self.open),
        })
    }
}

#[derive(Debug)]
pub struct BundleWriter {
    inner: BufWriter<File>,
    _claim: StreamClaim,
}

impl BundleWriter {
    /// Flush and release the stream
    pub fn finish(mut self) -> EngineResult<()> {
        self.inner.flush()?;
        Ok(())
    }
}

impl Write for BundleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[derive(Debug)]
pub struct BundleReader {
    inner: BufReader<File>,
    _claim: StreamClaim,
}

impl Read for BundleReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_stream_naming() {
        let bundle = BundleIo::new(Path::new("/tmp/x.nta"), "network", "R1", BundleMode::Write);
        assert_eq!(bundle.path("main"), PathBuf::from("/tmp/x.nta/network.R1.main"));
    }

    #[test]
    fn test_one_stream_at_a_time() {
        let dir = tempdir().unwrap();
        let writer_bundle = BundleIo::new(dir.path(), "net", "A", BundleMode::Write);

        let mut first = writer_bundle.output_stream("main").unwrap();
        assert!(matches!(
            writer_bundle.output_stream("aux"),
            Err(EngineError::StreamAlreadyOpen(_))
        ));
        first.write_all(b"hello").unwrap();
        first.finish().unwrap();

        let second = writer_bundle.output_stream("aux").unwrap();
        drop(second);

        assert!(matches!(
            writer_bundle.input_stream("main"),
            Err(EngineError::WrongStreamMode(_))
        ));

        let reader_bundle = BundleIo::new(dir.path(), "net", "A", BundleMode::Read);
        assert!(reader_bundle.exists("main"));
        let mut text = String::new();
        reader_bundle
            .input_stream("main")
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "hello");

        assert!(matches!(
            reader_bundle.input_stream("missing"),
            Err(EngineError::BadCheckpoint(_))
        ));
    }
}
