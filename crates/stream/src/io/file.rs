//! Local file backend (`file:///path`).

use super::{interrupted, OpenRequest, StreamHandle, StreamIo};
use crate::error::StreamError;
use std::fs::File;
use std::io::{self, Read};
use tracing::debug;

/// Reads a local file front to back.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileStreamIo;

impl StreamIo for FileStreamIo {
    fn open(&self, request: &OpenRequest) -> io::Result<Box<dyn StreamHandle>> {
        if request.is_interrupted() {
            return Err(interrupted());
        }
        let path = request.url.to_file_path().map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                StreamError::InvalidAddress {
                    address: request.url.to_string(),
                    reason: "not a local file path".to_string(),
                },
            )
        })?;
        let file = File::open(&path)?;
        debug!(path = %path.display(), "Opened file stream");

        Ok(Box::new(FileHandle {
            file: Some(file),
            request: request.clone(),
        }))
    }
}

struct FileHandle {
    file: Option<File>,
    request: OpenRequest,
}

impl StreamHandle for FileHandle {
    fn read_partial(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.request.is_interrupted() {
            return Err(interrupted());
        }
        match self.file.as_mut() {
            Some(file) => file.read(buf),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "file closed")),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        self.file.take();
        Ok(())
    }
}
