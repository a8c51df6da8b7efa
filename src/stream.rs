//! # JSON Streaming
//!
//! Writes a stored benchmark to a response sink as one JSON array without
//! materializing it: runs are decoded and encoded one at a time, so memory use
//! stays flat no matter how many runs a benchmark holds.
//!
//! The bytes produced are identical to the compact JSON encoding of the whole
//! run list followed by a newline.

use crate::defaults::JSON_FLUSH_INTERVAL;
use crate::error::{EngineError, Result};
use crate::storage::{BenchmarkStore, RunStream};
use std::io::{self, BufWriter, Write};
use tracing::debug;

/// Content type announced for streamed JSON
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// HTTP status sent before a successful stream
pub const STATUS_OK: u16 = 200;

/// Destination of a streamed response
///
/// `send_head` is called once, before the first body byte. Writes after the
/// client went away must fail; the streamer reports them as
/// [`EngineError::SinkClosed`].
pub trait ResponseSink: Write {
    fn send_head(&mut self, status: u16, content_type: &str) -> io::Result<()>;
}

impl<S: ResponseSink + ?Sized> ResponseSink for &mut S {
    fn send_head(&mut self, status: u16, content_type: &str) -> io::Result<()> {
        (**self).send_head(status, content_type)
    }
}

/// In-memory response, mainly for tests and small payloads
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResponseBuffer {
    pub status: Option<u16>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Write for ResponseBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ResponseSink for ResponseBuffer {
    fn send_head(&mut self, status: u16, content_type: &str) -> io::Result<()> {
        self.status = Some(status);
        self.content_type = Some(content_type.to_string());
        Ok(())
    }
}

/// Body-only sink over any writer, such as a file or stdout
pub struct PlainSink<W>(pub W);

impl<W: Write> Write for PlainSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<W: Write> ResponseSink for PlainSink<W> {
    fn send_head(&mut self, _status: u16, _content_type: &str) -> io::Result<()> {
        Ok(())
    }
}

/// Stream benchmark `id` to `sink` as a JSON array of runs
///
/// The data file is opened before the head is sent, so a missing benchmark is
/// reported as [`EngineError::NotFound`] with nothing written. The sink is
/// flushed every [`JSON_FLUSH_INTERVAL`] runs.
pub fn stream_json<S: ResponseSink>(store: &BenchmarkStore, id: u32, mut sink: S) -> Result<()> {
    let runs = store.open_runs(id)?;
    sink.send_head(STATUS_OK, JSON_CONTENT_TYPE)
        .map_err(|e| EngineError::sink(id, e))?;

    let mut out = BufWriter::new(&mut sink);
    let sink_err = |e| EngineError::sink(id, e);

    let streamed = match runs {
        RunStream::Legacy(runs) => {
            serde_json::to_writer(&mut out, runs.as_slice()).map_err(|e| EngineError::json(id, e))?;
            out.write_all(b"\n").map_err(sink_err)?;
            runs.len()
        }
        RunStream::Streaming(decoder) => {
            out.write_all(b"[").map_err(sink_err)?;
            let mut count = 0;
            for run in decoder {
                let run = run?;
                if count > 0 {
                    out.write_all(b",").map_err(sink_err)?;
                }
                serde_json::to_writer(&mut out, &run).map_err(|e| EngineError::json(id, e))?;
                count += 1;

                if count % JSON_FLUSH_INTERVAL == 0 {
                    out.flush().map_err(sink_err)?;
                }
            }
            out.write_all(b"]\n").map_err(sink_err)?;
            count
        }
    };

    out.flush().map_err(sink_err)?;
    debug!("Streamed {} runs of benchmark {} as JSON", streamed, id);
    Ok(())
}
