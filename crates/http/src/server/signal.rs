use tracing::{info, warn};

use crate::server::StopHandle;

/// Stops the server on `SIGINT`, `SIGTERM` or `SIGHUP`. Returns early if the
/// server stops for another reason first.
#[cfg(unix)]
pub(crate) async fn stop_on_signal(stop: StopHandle) {
    use tokio::signal::unix::{SignalKind, signal};

    let signals = (signal(SignalKind::interrupt()), signal(SignalKind::terminate()), signal(SignalKind::hangup()));
    let (mut interrupt, mut terminate, mut hangup) = match signals {
        (Ok(interrupt), Ok(terminate), Ok(hangup)) => (interrupt, terminate, hangup),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
            warn!(cause = %e, "failed to install signal handlers");
            return;
        }
    };

    let name = tokio::select! {
        _ = stop.stopped() => return,
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = hangup.recv() => "SIGHUP",
    };

    info!(signal = name, "received signal, stopping server");
    stop.stop();
}

#[cfg(not(unix))]
pub(crate) async fn stop_on_signal(stop: StopHandle) {
    tokio::select! {
        _ = stop.stopped() => {}
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => {
                info!(signal = "ctrl-c", "received signal, stopping server");
                stop.stop();
            }
            Err(e) => warn!(cause = %e, "failed to install signal handler"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_once_stopped_elsewhere() {
        let stop = StopHandle::new();
        let waiting = tokio::spawn(stop_on_signal(stop.clone()));

        stop.stop();

        waiting.await.unwrap();
    }
}
