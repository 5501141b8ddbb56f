//! Elevation via a re-executed copy of the current binary.
//!
//! The launcher binds a unix socket in a freshly created mode-0700
//! directory, then runs `pkexec <current_exe> --sudo-proxy-helper <socket>`
//! (or `sudo` when pkexec is absent). The elevated copy detects the helper
//! flag through [`super::helper::run_if_helper`], connects back to the
//! socket, and serves its dispatcher. Only the spawning user can reach the
//! socket directory, and it is removed as soon as the connection is
//! accepted.

use super::{Launch, LaunchError, ProxyDescriptor};
use crate::privilege;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::{UnixListener, UnixStream};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Hidden argv flag marking a process as the elevated helper.
///
/// Contract: `<exe> --sudo-proxy-helper <socket-path>`. Host applications
/// never pass this themselves; it exists only on the re-executed command
/// line.
pub const HELPER_FLAG: &str = "--sudo-proxy-helper";

/// Default bound on waiting for the elevated copy to connect back. Generous
/// because a human is typing a password in between.
pub const DEFAULT_ACCEPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Launcher that spawns a root-elevated copy of the current executable.
pub struct SudoLauncher {
    frontend: Option<PathBuf>,
    accept_timeout: Duration,
}

impl SudoLauncher {
    /// Launcher using the first elevation front-end found on `PATH`
    /// (pkexec preferred, then sudo).
    pub fn new() -> Self {
        Self {
            frontend: None,
            accept_timeout: DEFAULT_ACCEPT_TIMEOUT,
        }
    }

    /// Launcher honouring a loaded configuration: its elevation front-end
    /// if one is set, and its readiness timeout as the accept bound (the
    /// helper must connect before it can signal readiness).
    pub fn from_config(config: &crate::config::SudoConfig) -> Self {
        Self {
            frontend: config.elevation.frontend.clone(),
            accept_timeout: config.timeouts().ready,
        }
    }

    /// Use a specific elevation front-end binary.
    #[must_use]
    pub fn with_frontend(mut self, frontend: PathBuf) -> Self {
        self.frontend = Some(frontend);
        self
    }

    /// Bound the wait for the elevated copy to connect back.
    #[must_use]
    pub fn with_accept_timeout(mut self, timeout: Duration) -> Self {
        self.accept_timeout = timeout;
        self
    }

    fn resolve_frontend(&self) -> Result<PathBuf, LaunchError> {
        match &self.frontend {
            Some(path) => Ok(path.clone()),
            None => privilege::elevation_frontend().ok_or(LaunchError::NoMechanism),
        }
    }
}

impl Default for SudoLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl Launch for SudoLauncher {
    async fn spawn_elevated(
        &self,
        descriptor: &ProxyDescriptor,
    ) -> Result<UnixStream, LaunchError> {
        let frontend = self.resolve_frontend()?;

        // Private rendezvous directory; the path leaks nothing and the mode
        // keeps other users out of the handshake.
        let dir = tempfile::Builder::new()
            .prefix("sudo-proxy-")
            .tempdir()?;
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o700))?;
        let socket_path = dir.path().join("helper.sock");
        let listener = UnixListener::bind(&socket_path)?;

        let exe = std::env::current_exe()?;
        info!(
            target_name = %descriptor.name,
            frontend = %frontend.display(),
            "requesting elevation"
        );

        let mut child = Command::new(&frontend)
            .arg(&exe)
            .arg(HELPER_FLAG)
            .arg(&socket_path)
            .spawn()?;

        enum Wait {
            Connected(UnixStream),
            FrontendExited(std::process::ExitStatus),
            TimedOut,
        }

        let outcome = tokio::select! {
            accepted = listener.accept() => Wait::Connected(accepted?.0),
            status = child.wait() => Wait::FrontendExited(status?),
            _ = tokio::time::sleep(self.accept_timeout) => Wait::TimedOut,
        };

        match outcome {
            Wait::Connected(stream) => {
                debug!(target_name = %descriptor.name, "elevated helper connected");
                Ok(stream)
            }
            // The front-end exiting before the helper connects means the
            // prompt was dismissed or the helper crashed on boot.
            Wait::FrontendExited(status) => Err(LaunchError::Refused(format!(
                "elevation front-end exited with {status} before the helper connected"
            ))),
            Wait::TimedOut => {
                if let Err(e) = child.kill().await {
                    warn!("failed to kill stalled elevation front-end: {}", e);
                }
                Err(LaunchError::AcceptTimeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_frontend_resolved_verbatim() {
        // An explicit front-end bypasses PATH discovery entirely.
        let launcher = SudoLauncher::new().with_frontend(PathBuf::from("/usr/bin/pkexec"));
        assert_eq!(
            launcher.resolve_frontend().unwrap(),
            PathBuf::from("/usr/bin/pkexec")
        );
    }

    #[tokio::test]
    async fn test_front_end_exit_is_refused() {
        // `false` exits immediately without ever connecting back.
        let launcher = SudoLauncher::new()
            .with_frontend(PathBuf::from("/bin/false"))
            .with_accept_timeout(Duration::from_secs(5));

        let err = launcher
            .spawn_elevated(&ProxyDescriptor::new("test-target"))
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::Refused(_)));
    }
}
