//! Core infrastructure module for HugeWood.
//!
//! - [`types`]: option enums and type aliases
//! - [`constants`]: defaults and numeric thresholds
//! - [`error`]: the library error type
//! - [`random`]: the explicit per-tree random stream

pub mod constants;
pub mod error;
pub mod random;
pub mod types;

pub use constants::*;
pub use error::{Result, WoodError};
pub use random::Random;
pub use types::*;

use std::sync::Once;

static LOGGING_INIT: Once = Once::new();

/// Installs the `env_logger` backend once per process.
///
/// `RUST_LOG` defaults to `info` when unset. Calling this more than once,
/// or after another logger was installed, is harmless.
pub fn initialize_core() -> Result<()> {
    LOGGING_INIT.call_once(|| {
        if std::env::var("RUST_LOG").is_err() {
            std::env::set_var("RUST_LOG", "info");
        }
        let _ = env_logger::try_init();
        log::debug!("hugewood {} core initialized", HUGEWOOD_VERSION);
    });
    Ok(())
}

/// Check if the core module is initialized
pub fn is_core_initialized() -> bool {
    LOGGING_INIT.is_completed()
}
