use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use crate::event::{DaemonEvent, HostEvent};

pub const STDIN_CLOSED: &str = "process.stdin-closed";

/// Parses one line of host input. Blank lines and anything that is not an
/// event object are dropped.
pub fn parse_line(line: &str) -> Option<HostEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<HostEvent>(line) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!("Ignoring malformed event line: {e}");
            None
        }
    }
}

/// Reads newline-delimited JSON events from `reader` and forwards them as
/// [`DaemonEvent::Host`]. When the input ends, sends a shutdown.
pub async fn read_events<R>(reader: R, tx: mpsc::Sender<DaemonEvent>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let Some(event) = parse_line(&line) else { continue };
                if tx.send(DaemonEvent::Host(event)).await.is_err() {
                    return;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Failed to read host input: {e}");
                break;
            }
        }
    }
    let _ = tx.send(DaemonEvent::Shutdown(STDIN_CLOSED.to_string())).await;
}

/// Turns termination signals into [`DaemonEvent::Shutdown`] and SIGUSR1 into
/// [`DaemonEvent::DigestRequested`].
#[cfg(unix)]
pub async fn watch_signals(tx: mpsc::Sender<DaemonEvent>) {
    use tokio::signal::unix::{signal, SignalKind};

    let handlers = (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
        signal(SignalKind::user_defined1()),
    );
    let (mut interrupt, mut terminate, mut usr1) = match handlers {
        (Ok(i), Ok(t), Ok(u)) => (i, t, u),
        _ => {
            tracing::warn!("Failed to install signal handlers");
            return;
        }
    };

    loop {
        let event = tokio::select! {
            _ = interrupt.recv() => DaemonEvent::Shutdown("process.SIGINT".to_string()),
            _ = terminate.recv() => DaemonEvent::Shutdown("process.SIGTERM".to_string()),
            _ = usr1.recv() => DaemonEvent::DigestRequested("request.SIGUSR1".to_string()),
        };
        if tx.send(event).await.is_err() {
            break;
        }
    }
}

#[cfg(not(unix))]
pub async fn watch_signals(tx: mpsc::Sender<DaemonEvent>) {
    if tokio::signal::ctrl_c().await.is_ok() {
        let _ = tx.send(DaemonEvent::Shutdown("process.SIGINT".to_string())).await;
    }
}
