#![allow(dead_code)]

use coil::{Runtime, RuntimeBuilder};

use std::sync::Once;
use std::time::Duration;
use tracing::Level;

static INIT: Once = Once::new();

/// Installs a fmt subscriber writing through the test harness, once per
/// test binary. Set `COIL_TRACE=1` to see scheduler events.
pub fn init_tracing() {
    INIT.call_once(|| {
        let level = if std::env::var_os("COIL_TRACE").is_some() {
            Level::TRACE
        } else {
            Level::WARN
        };

        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .try_init();
    });
}

/// A runtime with a short poll cap, so that tests never sit in a long OS
/// wait.
pub fn runtime() -> Runtime {
    init_tracing();

    RuntimeBuilder::new()
        .max_poll_wait(Duration::from_millis(50))
        .build()
        .expect("failed to build runtime")
}
