//! Console tracing setup for the launcher binary.
//!
//! All diagnostics go to stderr. `RUST_LOG` overrides the level chosen from
//! the run flags. While a spinner is attached to the [`ConsoleWriter`], each
//! event is written with the spinner suspended so lines never land inside it.

use crate::config::UpdateOptions;
use indicatif::ProgressBar;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

/// Stderr writer that yields to an active progress bar.
#[derive(Clone, Default)]
pub struct ConsoleWriter {
    active: Arc<Mutex<Option<ProgressBar>>>,
}

impl ConsoleWriter {
    /// Suspend `bar` around every log line until [`ConsoleWriter::detach`].
    pub fn attach(&self, bar: ProgressBar) {
        *self.active.lock().unwrap_or_else(|e| e.into_inner()) = Some(bar);
    }

    /// Write log lines straight to stderr again.
    pub fn detach(&self) {
        *self.active.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn current_bar(&self) -> Option<ProgressBar> {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl<'a> MakeWriter<'a> for ConsoleWriter {
    type Writer = ConsoleLine;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleLine {
            bar: self.current_bar(),
        }
    }
}

/// Writer for a single formatted event.
pub struct ConsoleLine {
    bar: Option<ProgressBar>,
}

impl Write for ConsoleLine {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &self.bar {
            Some(bar) => bar.suspend(|| io::stderr().write(buf)),
            None => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// Default filter directive for the given run flags.
pub fn default_directive(options: &UpdateOptions) -> &'static str {
    if options.verbose {
        "omx_launcher=info"
    } else if options.silent {
        "omx_launcher=error"
    } else {
        "omx_launcher=warn"
    }
}

/// Install the global tracing subscriber and return its console writer.
/// Safe to call more than once; later calls are ignored.
pub fn init(options: &UpdateOptions) -> ConsoleWriter {
    let console = ConsoleWriter::default();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(options)));
    let _ = tracing_subscriber::fmt()
        .with_writer(console.clone())
        .with_target(false)
        .with_env_filter(filter)
        .try_init();
    console
}
