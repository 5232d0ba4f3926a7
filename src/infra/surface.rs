//! Render surfaces that emit the assembled document instead of running it.

use std::io::{self, Write};

use tracing::{debug, warn};

use crate::application::bridge::MessagePort;
use crate::application::ports::{RenderPass, RenderSurface};

/// Writes every assembled document to a byte sink.
#[derive(Debug)]
pub struct DocumentWriter<W> {
    sink: W,
    written: u64,
}

impl<W: Write + Send> DocumentWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink, written: 0 }
    }

    /// Documents written successfully so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    fn write_pass(&mut self, pass: &RenderPass) -> io::Result<()> {
        self.sink.write_all(pass.document.as_str().as_bytes())?;
        self.sink.write_all(b"\n")?;
        self.sink.flush()
    }
}

impl<W: Write + Send> RenderSurface for DocumentWriter<W> {
    fn load(&mut self, pass: &RenderPass, _port: &MessagePort) {
        match self.write_pass(pass) {
            Ok(()) => {
                self.written += 1;
                debug!(generation = pass.generation, "document written");
            }
            Err(err) => warn!(
                generation = pass.generation,
                error = %err,
                "failed to write preview document"
            ),
        }
    }
}
