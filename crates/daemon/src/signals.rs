//! Termination signal listener for `procman start`

use std::io;

/// Ctrl+C / SIGTERM listener
///
/// On unix the handlers are registered by `install`, so a signal arriving
/// before `recv` is first polled is still observed instead of killing the
/// supervisor with the default action.
pub struct ShutdownSignal {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignal {
    /// Register the signal handlers (requires a running tokio runtime)
    pub fn install() -> io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            Ok(Self {
                interrupt: signal(SignalKind::interrupt())?,
                terminate: signal(SignalKind::terminate())?,
            })
        }

        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Wait for Ctrl+C, or SIGTERM on unix
    pub async fn recv(mut self) -> io::Result<()> {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = self.interrupt.recv() => Ok(()),
                _ = self.terminate.recv() => Ok(()),
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use nix::sys::signal::{raise, Signal};
    use std::time::Duration;

    #[tokio::test]
    async fn test_sigterm_before_recv_is_observed() {
        let listener = ShutdownSignal::install().unwrap();

        // delivered before anyone waits on the listener
        raise(Signal::SIGTERM).unwrap();

        tokio::time::timeout(Duration::from_secs(5), listener.recv())
            .await
            .expect("SIGTERM was not observed")
            .unwrap();
    }
}
