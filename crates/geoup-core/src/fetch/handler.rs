//! Easy2 handlers: one streams an update body into a staged file, the other
//! collects a small text body (filename lookup, error pages).

use std::io::{self, Write};
use std::str;

use flate2::write::GzDecoder;

use crate::error::UpdateError;
use crate::storage::{LocalFileWriter, StagedFile};

use super::parse;

/// Bytes of a non-2xx body kept for the error message.
const ERROR_BODY_LIMIT: usize = 512;
/// Upper bound for bodies read into memory by [`Collector`].
const COLLECT_LIMIT: usize = 64 * 1024;

/// Where a 2xx body goes: straight into the staged file or through gunzip first.
pub(super) enum BodySink {
    Plain(StagedFile),
    Gzip(GzDecoder<StagedFile>),
}

impl BodySink {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            BodySink::Plain(f) => f.write_all(data),
            BodySink::Gzip(d) => d.write_all(data),
        }
    }

    pub(super) fn finish(self) -> io::Result<StagedFile> {
        match self {
            BodySink::Plain(f) => Ok(f),
            BodySink::Gzip(d) => d.finish(),
        }
    }
}

/// Handler state for one update transfer.
pub(super) struct DownloadHandler {
    writer: LocalFileWriter,
    pub(super) response_headers: Vec<String>,
    pub(super) sink: Option<BodySink>,
    pub(super) error_body: Vec<u8>,
    /// Set when the write callback aborted the transfer.
    pub(super) error: Option<UpdateError>,
}

impl DownloadHandler {
    pub(super) fn new(writer: LocalFileWriter) -> Self {
        Self {
            writer,
            response_headers: Vec::new(),
            sink: None,
            error_body: Vec::new(),
            error: None,
        }
    }

    fn open_sink(&self) -> Result<BodySink, UpdateError> {
        let staged = self.writer.stage()?;
        if parse::parse_update_headers(&self.response_headers).gzip {
            Ok(BodySink::Gzip(GzDecoder::new(staged)))
        } else {
            Ok(BodySink::Plain(staged))
        }
    }

    /// Finish decoding and hand back the staged file. An empty 2xx body
    /// still yields an (empty) staged file.
    pub(super) fn take_staged(&mut self) -> Result<StagedFile, UpdateError> {
        let sink = match self.sink.take() {
            Some(s) => s,
            None => self.open_sink()?,
        };
        sink.finish().map_err(body_error)
    }

    pub(super) fn error_text(&self) -> String {
        String::from_utf8_lossy(&self.error_body).trim().to_string()
    }
}

/// Corrupt or truncated compressed data is a protocol problem; anything else is the disk.
fn body_error(e: io::Error) -> UpdateError {
    match e.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof => {
            UpdateError::Protocol(format!("invalid gzip body: {}", e))
        }
        _ => UpdateError::write_io("write staged database", e),
    }
}

impl curl::easy::Handler for DownloadHandler {
    fn header(&mut self, data: &[u8]) -> bool {
        if let Ok(s) = str::from_utf8(data) {
            let line = s.trim_end();
            if line.starts_with("HTTP/") {
                self.response_headers.clear();
                self.error_body.clear();
            }
            self.response_headers.push(line.to_string());
        }
        true
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, curl::easy::WriteError> {
        let status = parse::status_code(&self.response_headers).unwrap_or(0);
        if !(200..300).contains(&status) {
            let room = ERROR_BODY_LIMIT.saturating_sub(self.error_body.len());
            self.error_body.extend_from_slice(&data[..data.len().min(room)]);
            return Ok(data.len());
        }

        if self.sink.is_none() {
            match self.open_sink() {
                Ok(s) => self.sink = Some(s),
                Err(e) => {
                    self.error = Some(e);
                    return Ok(0);
                }
            }
        }
        let Some(sink) = self.sink.as_mut() else {
            return Ok(0);
        };
        match sink.write_all(data) {
            Ok(()) => Ok(data.len()),
            Err(e) => {
                tracing::warn!("database write failed: {}", e);
                self.error = Some(body_error(e));
                Ok(0) // abort transfer
            }
        }
    }
}

/// Collects headers and a bounded body in memory.
#[derive(Default)]
pub(super) struct Collector {
    pub(super) body: Vec<u8>,
}

impl curl::easy::Handler for Collector {
    fn write(&mut self, data: &[u8]) -> Result<usize, curl::easy::WriteError> {
        let room = COLLECT_LIMIT.saturating_sub(self.body.len());
        self.body.extend_from_slice(&data[..data.len().min(room)]);
        Ok(data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curl::easy::Handler;

    #[test]
    fn corrupt_or_truncated_gzip_is_a_protocol_error() {
        for kind in [
            io::ErrorKind::InvalidInput,
            io::ErrorKind::InvalidData,
            io::ErrorKind::UnexpectedEof,
        ] {
            let err = body_error(io::Error::new(kind, "bad"));
            assert!(matches!(err, UpdateError::Protocol(_)), "{:?}", kind);
        }
        let err = body_error(io::Error::new(io::ErrorKind::Other, "disk full"));
        assert!(matches!(err, UpdateError::WriteIo { .. }));
    }

    #[test]
    fn collector_stops_at_limit() {
        let mut c = Collector::default();
        let chunk = vec![b'x'; COLLECT_LIMIT / 2 + 1];
        assert!(matches!(c.write(&chunk), Ok(n) if n == chunk.len()));
        assert!(matches!(c.write(&chunk), Ok(n) if n == chunk.len()));
        assert_eq!(c.body.len(), COLLECT_LIMIT);
    }
}
