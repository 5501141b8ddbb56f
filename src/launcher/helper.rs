//! Startup hook for the elevated helper process.
//!
//! The elevated copy of the application is the same binary as the
//! unprivileged one; what makes it the helper is the hidden
//! [`HELPER_FLAG`] on its command line. Host applications call
//! [`run_if_helper`] before doing anything else:
//!
//! ```ignore
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     if sudo_proxy::launcher::helper::run_if_helper(|| UpdaterApp::new()).await? {
//!         // This process was the elevated helper; it has served its
//!         // dispatcher to completion and must exit now.
//!         return Ok(());
//!     }
//!     // Normal application startup.
//!     Ok(())
//! }
//! ```

use super::HELPER_FLAG;
use crate::allowlist::Elevated;
use crate::dispatch::{DispatchError, Dispatcher};
use crate::rpc::FramedChannel;
use std::path::{Path, PathBuf};
use tokio::net::UnixStream;
use tracing::info;

/// Extract the helper socket path from this process's command line, if the
/// process was spawned as the elevated helper.
pub fn helper_socket_from_args() -> Option<PathBuf> {
    let mut args = std::env::args_os();
    while let Some(arg) = args.next() {
        if arg == HELPER_FLAG {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

/// Connect back to the launcher's socket and serve the dispatcher for
/// `target` until shutdown.
pub async fn serve_helper<T: Elevated>(
    target: T,
    socket_path: &Path,
) -> Result<(), DispatchError> {
    let stream = UnixStream::connect(socket_path)
        .await
        .map_err(crate::rpc::ChannelError::from)?;
    info!(target_name = %target.name(), "helper connected, serving");
    Dispatcher::new(target, FramedChannel::new(stream)).serve().await
}

/// If this process is the elevated helper, build the target, serve its
/// dispatcher to completion, and return `true`; otherwise return `false`
/// immediately.
///
/// The target is built inside the elevated process, so `make_target` must
/// not depend on unprivileged-process state.
pub async fn run_if_helper<T, F>(make_target: F) -> Result<bool, DispatchError>
where
    T: Elevated,
    F: FnOnce() -> T,
{
    let Some(socket_path) = helper_socket_from_args() else {
        return Ok(false);
    };
    serve_helper(make_target(), &socket_path).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_flag_means_not_helper() {
        // The test runner's argv never carries the hidden flag.
        assert!(helper_socket_from_args().is_none());
    }
}
