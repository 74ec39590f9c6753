//! Read loop for a single beacon link.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, BufReader};
use tokio::sync::watch;

use super::handler::{AggregatorHandler, ConnectionInfo};
use super::wire::{self, Frame};
use crate::error::RelayError;

/// Runs the read loop for one beacon link until EOF, a transport fault or
/// shutdown.
///
/// - Each line is parsed and dispatched to the handler before the next line
///   is read, preserving per-link order.
/// - A malformed line (bad JSON, invalid UTF-8, over-long) reports an error
///   and the loop continues.
/// - A read failure reports an error and closes the link.
///
/// `on_connect` is called first and `on_disconnect` last, unless the task is
/// aborted.
pub async fn run_connection<S>(
    stream: S,
    info: ConnectionInfo,
    handler: Arc<dyn AggregatorHandler>,
    mut shutdown: watch::Receiver<Option<Duration>>,
) where
    S: AsyncRead + Unpin + Send,
{
    handler.on_connect(&info).await;
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::with_capacity(256);

    loop {
        tokio::select! {
            frame = wire::read_frame(&mut reader, &mut buf) => {
                match frame {
                    Ok(Frame::Line(line)) => match wire::parse_line(&line) {
                        Ok(Some(raw)) => handler.on_data(&info, raw).await,
                        Ok(None) => {}
                        Err(err) => handler.on_error(&info, err).await,
                    },
                    Ok(Frame::Invalid(err)) => handler.on_error(&info, err).await,
                    Ok(Frame::Eof) => break,
                    Err(err) => {
                        handler.on_error(&info, RelayError::Transport(err)).await;
                        break;
                    }
                }
            }
            _ = shutdown_requested(&mut shutdown) => break,
        }
    }

    handler.on_disconnect(&info).await;
    tracing::debug!(connection_id = %info.id, peer = %info.peer, "beacon link closed");
}

/// Resolves once shutdown is signalled, yielding the grace period.
///
/// The `watch` borrow is released before returning so callers stay `Send`.
pub(super) async fn shutdown_requested(
    shutdown: &mut watch::Receiver<Option<Duration>>,
) -> Duration {
    let grace = shutdown.wait_for(Option::is_some).await.ok().and_then(|g| *g);
    grace.unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::RawDetection;
    use async_trait::async_trait;
    use std::net::SocketAddr;
    use tokio::io::AsyncWriteExt;
    use tokio::sync::Mutex;

    #[derive(Debug, Default)]
    struct Recorder {
        log: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AggregatorHandler for Recorder {
        async fn on_connect(&self, _info: &ConnectionInfo) {
            self.log.lock().await.push("connect".to_string());
        }
        async fn on_disconnect(&self, _info: &ConnectionInfo) {
            self.log.lock().await.push("disconnect".to_string());
        }
        async fn on_data(&self, _info: &ConnectionInfo, detection: RawDetection) {
            self.log.lock().await.push(format!("data:{}", detection.baton_address));
        }
        async fn on_error(&self, _info: &ConnectionInfo, error: RelayError) {
            let kind = match error {
                RelayError::Transport(_) => "error:transport",
                _ => "error",
            };
            self.log.lock().await.push(kind.to_string());
        }
    }

    fn info() -> ConnectionInfo {
        ConnectionInfo::new(SocketAddr::from(([127, 0, 0, 1], 40_000)))
    }

    #[tokio::test]
    async fn malformed_line_keeps_link_open() {
        let recorder = Arc::new(Recorder::default());
        let (_tx, rx) = watch::channel(None);
        let input: &[u8] = b"{\"batonMAC\":\"A\",\"stationMAC\":\"X\",\"time\":1}\n\
                             garbage\n\
                             \n\
                             {\"batonMAC\":\"B\",\"stationMAC\":\"X\",\"time\":2}\n";

        let handler: Arc<dyn AggregatorHandler> = Arc::clone(&recorder) as _;
        run_connection(input, info(), handler, rx).await;

        let log = recorder.log.lock().await.clone();
        assert_eq!(
            log,
            vec!["connect", "data:A", "error", "data:B", "disconnect"]
        );
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn link_and_shutdown_futures_are_send() {
        let (tx, mut rx) = watch::channel(None);
        let (_client, server) = tokio::io::duplex(64);
        let handler: Arc<dyn AggregatorHandler> = Arc::new(Recorder::default());

        let link = run_connection(server, info(), handler, rx.clone());
        assert_send(&link);
        drop(link);

        let waiting = shutdown_requested(&mut rx);
        assert_send(&waiting);
        tx.send_replace(Some(Duration::from_millis(250)));
        let Ok(grace) = tokio::time::timeout(Duration::from_secs(1), waiting).await else {
            panic!("shutdown was not observed");
        };
        assert_eq!(grace, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn shutdown_closes_idle_link() {
        let recorder = Arc::new(Recorder::default());
        let (tx, rx) = watch::channel(None);
        let (client, server) = tokio::io::duplex(64);

        let handler: Arc<dyn AggregatorHandler> = Arc::clone(&recorder) as _;
        let task = tokio::spawn(run_connection(server, info(), handler, rx));
        tx.send_replace(Some(Duration::from_secs(1)));

        let Ok(Ok(())) = tokio::time::timeout(Duration::from_secs(2), task).await else {
            panic!("link did not close on shutdown");
        };
        drop(client);
        let log = recorder.log.lock().await.clone();
        assert_eq!(log, vec!["connect", "disconnect"]);
    }

    #[tokio::test]
    async fn partial_line_is_delivered_at_eof() {
        let recorder = Arc::new(Recorder::default());
        let (_tx, rx) = watch::channel(None);
        let (mut client, server) = tokio::io::duplex(256);

        let handler: Arc<dyn AggregatorHandler> = Arc::clone(&recorder) as _;
        let task = tokio::spawn(run_connection(server, info(), handler, rx));
        let _ = client
            .write_all(b"{\"batonMAC\":\"C\",\"stationMAC\":\"X\",\"time\":3}")
            .await;
        drop(client);

        let _ = tokio::time::timeout(Duration::from_secs(2), task).await;
        let log = recorder.log.lock().await.clone();
        assert_eq!(log, vec!["connect", "data:C", "disconnect"]);
    }

    #[tokio::test]
    async fn invalid_utf8_line_keeps_link_open() {
        let recorder = Arc::new(Recorder::default());
        let (_tx, rx) = watch::channel(None);
        let input: &[u8] = b"{\"batonMAC\":\"A\",\"stationMAC\":\"X\",\"time\":1}\n\
                             \xff\xfe garbage\n\
                             {\"batonMAC\":\"B\",\"stationMAC\":\"X\",\"time\":2}\n";

        let handler: Arc<dyn AggregatorHandler> = Arc::clone(&recorder) as _;
        run_connection(input, info(), handler, rx).await;

        let log = recorder.log.lock().await.clone();
        assert_eq!(
            log,
            vec!["connect", "data:A", "error", "data:B", "disconnect"]
        );
    }

    #[tokio::test]
    async fn endless_line_is_dropped_and_link_recovers() {
        let recorder = Arc::new(Recorder::default());
        let (_tx, rx) = watch::channel(None);
        let (mut client, server) = tokio::io::duplex(1024);

        let handler: Arc<dyn AggregatorHandler> = Arc::clone(&recorder) as _;
        let task = tokio::spawn(run_connection(server, info(), handler, rx));

        let noise = vec![b'z'; wire::MAX_LINE_BYTES * 64];
        let _ = client.write_all(&noise).await;
        let _ = client
            .write_all(b"\n{\"batonMAC\":\"D\",\"stationMAC\":\"X\",\"time\":4}\n")
            .await;
        drop(client);

        let Ok(Ok(())) = tokio::time::timeout(Duration::from_secs(2), task).await else {
            panic!("link did not finish");
        };
        let log = recorder.log.lock().await.clone();
        assert_eq!(log, vec!["connect", "error", "data:D", "disconnect"]);
    }
}
