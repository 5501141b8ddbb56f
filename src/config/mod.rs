//! Configuration for sudo-proxy.
//!
//! TOML configuration with hierarchy merging, loaded from:
//!
//! 1. System config: `/etc/sudo-proxy/config.toml`
//! 2. User config: `~/.config/sudo-proxy/config.toml`
//! 3. An explicit extra file supplied by the host application
//!
//! Missing files are skipped; later sources override earlier ones for any
//! scalar they set. No file at all is fine - everything has a default.
//!
//! ```toml
//! [timeouts]
//! ready_secs = 120
//! call_secs = 300
//! close_secs = 5
//!
//! [elevation]
//! frontend = "/usr/bin/pkexec"
//! ```

mod error;
mod loader;
mod schema;

pub use error::ConfigError;
pub use loader::{ConfigLoader, SYSTEM_CONFIG_PATH, USER_CONFIG_DIR, USER_CONFIG_FILE};
pub use schema::{ElevationConfig, SudoConfig, TimeoutConfig, Timeouts};
