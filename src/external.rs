//! Hands URLs that do not belong to the bundle to the OS default handler.

use std::io;

use tracing::{info, warn};

use crate::navigation::ExternalOpener;

/// Launches the platform handler for one URL.
pub type Launcher = fn(&str) -> io::Result<()>;

/// Opens URLs with the system default browser through the `open` crate.
///
/// The URL reaches the OS as a single argument (`ShellExecuteW` on Windows,
/// `open` on macOS, `xdg-open` and friends elsewhere), never through a
/// command interpreter. The handler is detached: the shell never waits for
/// it, and a failure to launch is logged, not propagated.
#[derive(Debug, Clone, Copy)]
pub struct OsOpener {
    launcher: Launcher,
}

impl OsOpener {
    /// Opener with a custom launcher in place of the system one.
    pub fn with_launcher(launcher: Launcher) -> Self {
        Self { launcher }
    }
}

impl Default for OsOpener {
    fn default() -> Self {
        Self::with_launcher(system_launcher)
    }
}

fn system_launcher(url: &str) -> io::Result<()> {
    open::that_detached(url)
}

impl ExternalOpener for OsOpener {
    fn open_external(&self, url: &str) {
        match (self.launcher)(url) {
            Ok(()) => info!(url, "Delegated to default browser"),
            Err(e) => warn!(url, error = %e, "Cannot launch default browser"),
        }
    }
}
