//! How the elevated helper process is obtained.
//!
//! The proxy core does not know how elevation works; it asks a [`Launch`]
//! implementation for a connected duplex channel and takes it from there.
//! Two implementations ship with the crate:
//!
//! - [`SudoLauncher`]: re-executes the current binary under `pkexec` or
//!   `sudo` and hands back the socket the elevated copy connects to
//! - [`LocalLauncher`]: serves the dispatcher on an in-process task, for
//!   tests and unelevated development runs
//!
//! Host applications must call [`helper::run_if_helper`] first thing in
//! `main()`; that is the hook through which the re-executed elevated copy
//! finds its way into the serve loop instead of starting the application
//! proper.

pub mod helper;
mod sudo_unix;

pub use sudo_unix::{HELPER_FLAG, SudoLauncher};

use crate::allowlist::Elevated;
use crate::dispatch::Dispatcher;
use crate::rpc::FramedChannel;
use std::future::Future;
use std::io;
use thiserror::Error;
use tokio::net::UnixStream;
use tracing::error;

/// What the launcher is told about the proxy it is elevating for.
///
/// Carries the target's declared name (for credential prompts and audit
/// logs) and nothing privileged.
#[derive(Debug, Clone)]
pub struct ProxyDescriptor {
    /// The target's declared name.
    pub name: String,
}

impl ProxyDescriptor {
    /// Descriptor for a named target.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Errors from spawning the elevated helper.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// No elevation front-end (pkexec, sudo) is available.
    #[error("No elevation mechanism available on this system")]
    NoMechanism,

    /// The user refused the credential prompt, or the front-end failed.
    #[error("Elevation refused: {0}")]
    Refused(String),

    /// The elevated helper never connected back.
    #[error("Timed out waiting for the elevated helper to connect")]
    AcceptTimeout,

    /// Socket or process plumbing failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A source of connected channels to an elevated dispatcher.
pub trait Launch {
    /// Spawn (or fake) the elevated process and return the unprivileged
    /// end of the channel once the dispatcher side is attached to the
    /// other end. Blocks until the channel exists or elevation is refused;
    /// the readiness handshake itself is the proxy's job.
    fn spawn_elevated(
        &self,
        descriptor: &ProxyDescriptor,
    ) -> impl Future<Output = Result<UnixStream, LaunchError>> + Send;
}

/// In-process launcher: no elevation, no second process.
///
/// Builds a fresh target per `start()` and serves its dispatcher on a
/// spawned task over a socketpair. Gives the full protocol (handshake,
/// dispatch, shutdown) without privileges, which is what integration tests
/// and `--no-elevate` development runs want.
pub struct LocalLauncher<F> {
    make_target: F,
}

impl<F> LocalLauncher<F> {
    /// Launcher that builds its dispatcher target with `make_target`.
    pub fn new(make_target: F) -> Self {
        Self { make_target }
    }
}

impl<T, F> Launch for LocalLauncher<F>
where
    T: Elevated + Send + 'static,
    F: Fn() -> T + Send + Sync,
{
    async fn spawn_elevated(
        &self,
        _descriptor: &ProxyDescriptor,
    ) -> Result<UnixStream, LaunchError> {
        let (ours, theirs) = UnixStream::pair()?;
        let dispatcher = Dispatcher::new((self.make_target)(), FramedChannel::new(theirs));
        tokio::spawn(async move {
            if let Err(e) = dispatcher.serve().await {
                error!("in-process dispatcher terminated: {}", e);
            }
        });
        Ok(ours)
    }
}
