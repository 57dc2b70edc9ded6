//! Where streamed text goes while a turn is still arriving.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

/// Receives incremental text during streaming. Shared across tasks, so
/// implementations use interior mutability.
pub trait DisplaySink: Send + Sync {
    fn on_content(&self, chunk: &str);
    fn on_reasoning(&self, _chunk: &str) {}
    fn on_stream_end(&self) {}
}

/// Discards everything. Used when nobody is watching (sub-agents, tests).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DisplaySink for NullSink {
    fn on_content(&self, _chunk: &str) {}
}

/// Prints to stdout as text arrives. Reasoning is shown under a `[thinking]`
/// header and the answer under `[answer]` once reasoning has been seen.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    reasoning_open: AtomicBool,
    wrote_anything: AtomicBool,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
        self.wrote_anything.store(true, Ordering::Relaxed);
    }
}

impl DisplaySink for ConsoleSink {
    fn on_content(&self, chunk: &str) {
        if self.reasoning_open.swap(false, Ordering::Relaxed) {
            self.write("\n\n[answer]\n");
        }
        self.write(chunk);
    }

    fn on_reasoning(&self, chunk: &str) {
        if !self.reasoning_open.swap(true, Ordering::Relaxed) {
            self.write("[thinking]\n");
        }
        self.write(chunk);
    }

    fn on_stream_end(&self) {
        self.reasoning_open.store(false, Ordering::Relaxed);
        if self.wrote_anything.swap(false, Ordering::Relaxed) {
            self.write("\n");
            self.wrote_anything.store(false, Ordering::Relaxed);
        }
    }
}
