use std::time::Duration;

/// Upper bound for waiting on dispatched events in tests
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// Short window used to assert that nothing else arrives
pub const QUIET_PERIOD: Duration = Duration::from_millis(150);

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = env_logger::builder().is_test(true).try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}
