//! Root-capability queries.
//!
//! Pure, side-effect-free predicates the proxy may consult before deciding
//! whether an elevation attempt is worth making. Nothing here elevates
//! anything.

use std::path::PathBuf;

/// Elevation front-ends we know how to drive, in preference order. pkexec
/// first: it prompts graphically and does not need a controlling terminal.
const FRONTENDS: &[&str] = &["pkexec", "sudo"];

/// Whether this process currently has root privileges.
pub fn has_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Whether this process could plausibly obtain root: either it already has
/// it, or an elevation front-end exists on `PATH`.
pub fn can_get_root() -> bool {
    has_root() || elevation_frontend().is_some()
}

/// Locate the preferred elevation front-end on `PATH`.
pub(crate) fn elevation_frontend() -> Option<PathBuf> {
    FRONTENDS.iter().find_map(|name| find_in_path(name))
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
