//! `tracing` output for the game.
//!
//! Scripts can only log through `ns.print`, so events are formatted into a
//! shared buffer and handed to the game after every pass.

use std::{
    io,
    sync::{
        Arc,
        Mutex,
        OnceLock,
    },
};

use tracing::{
    Level,
    Subscriber,
};
use tracing_subscriber::fmt::MakeWriter;

use crate::env::Console;

static LOG_BUFFER: OnceLock<LogBuffer> = OnceLock::new();

#[derive(Clone, Debug, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    /// Takes every complete line written so far.
    pub fn drain(&self) -> Vec<String> {
        let mut bytes = match self.0.lock() {
            Ok(bytes) => bytes,
            Err(poisoned) => poisoned.into_inner(),
        };

        let complete = match bytes.iter().rposition(|b| *b == b'\n') {
            Some(last_newline) => last_newline + 1,
            None => return vec![],
        };

        let text = String::from_utf8_lossy(&bytes[.. complete]).into_owned();
        bytes.drain(.. complete);

        text.lines().map(str::to_owned).collect()
    }

    /// Moves the buffered lines into the script log.
    pub fn flush_to(
        &self,
        console: &impl Console,
    ) {
        for line in self.drain() {
            console.print(&line);
        }
    }
}

impl io::Write for LogBuffer {
    fn write(
        &mut self,
        buf: &[u8],
    ) -> io::Result<usize> {
        let mut bytes = match self.0.lock() {
            Ok(bytes) => bytes,
            Err(poisoned) => poisoned.into_inner(),
        };
        bytes.extend_from_slice(buf);

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> LogBuffer {
        self.clone()
    }
}

/// Plain one-line events without timestamps, the game stamps its own.
pub fn subscriber(
    buffer: LogBuffer,
    level: Level,
) -> impl Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_writer(buffer)
        .without_time()
        .with_target(false)
        .with_max_level(level)
        .finish()
}

/// Installs the global subscriber once and returns its buffer.
pub fn init(level: Level) -> &'static LogBuffer {
    LOG_BUFFER.get_or_init(|| {
        let buffer = LogBuffer::default();

        // fails only if another subscriber is installed, then we log nowhere
        let _ = tracing::subscriber::set_global_default(subscriber(
            buffer.clone(),
            level,
        ));

        buffer
    })
}
