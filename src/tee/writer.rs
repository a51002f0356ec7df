//! `io::Write` handle over a shared interceptor

use std::io::{self, Write};
use std::sync::Arc;

use tracing_subscriber::fmt::MakeWriter;

use super::interceptor::Interceptor;

/// Cloneable writer that feeds everything into an [`Interceptor`]
///
/// Hand this to code that should write "to stdout" without touching the
/// process-wide descriptor. It also works as a `tracing_subscriber` writer.
#[derive(Clone)]
pub struct TeeWriter {
    tee: Arc<Interceptor>,
}

impl TeeWriter {
    pub fn new(tee: Arc<Interceptor>) -> Self {
        Self { tee }
    }

    /// The interceptor behind this writer
    pub fn interceptor(&self) -> &Arc<Interceptor> {
        &self.tee
    }
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tee.write_bytes(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.tee.flush()?;
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for TeeWriter {
    type Writer = TeeWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
