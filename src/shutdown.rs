use std::fmt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Which OS signal asked the run to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Interrupt => write!(f, "interrupt"),
            ShutdownSignal::Terminate => write!(f, "terminate"),
        }
    }
}

/// Cancel `token` once, on the first interrupt or terminate signal. The
/// listener also ends quietly when the token is cancelled by someone else.
pub fn spawn_signal_listener(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let signal = tokio::select! {
            signal = next_signal() => signal,
            _ = token.cancelled() => return,
        };

        info!("Received {} signal, waiting for in-flight work", signal);
        token.cancel();
    })
}

async fn next_signal() -> ShutdownSignal {
    tokio::select! {
        _ = interrupt() => ShutdownSignal::Interrupt,
        _ = terminate() => ShutdownSignal::Terminate,
    }
}

// A listener that cannot be installed never resolves; the other one, or the
// token, still ends the run.
async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Interrupt signal unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            warn!("Terminate signal unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
