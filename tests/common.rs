#![allow(dead_code)]

use once_cell::sync::Lazy;
use std::sync::{Mutex, Once};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static START: Once = Once::new();
static GUARD: Lazy<Mutex<Option<tracing_appender::non_blocking::WorkerGuard>>> = Lazy::new(|| Mutex::new(None));

/// dotenv + tracing (stderr and a rolling `logs/tests.log`) for integration tests.
/// Idempotent.
pub fn init() {
    START.call_once(|| {
        let _ = dotenvy::dotenv();
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new("toolchat=debug,openai=debug,tools=debug,warn"))
            .expect("env filter");

        let (file_nb, guard) = tracing_appender::non_blocking(rolling::daily("logs", "tests.log"));
        *GUARD.lock().unwrap() = Some(guard);

        let stderr_layer = fmt::layer().with_target(true).with_test_writer();
        let file_layer = fmt::layer().with_ansi(false).with_target(true).with_writer(file_nb);

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .with(file_layer)
            .try_init();

        tracing::info!(target: "test_init", "test tracing initialized");
    });
}

/// Live tests need an endpoint; `CHAT_API_BASE` must be set explicitly.
pub fn skip_if_no_endpoint() -> bool {
    if std::env::var("CHAT_API_BASE").is_err() {
        eprintln!("[skip] CHAT_API_BASE not set; skipping live endpoint test");
        true
    } else {
        false
    }
}
