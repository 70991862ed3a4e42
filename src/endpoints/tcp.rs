//! TCP endpoints: the network relay server and outbound source clients.

use crate::endpoint_core::{run_reader_loop, run_relay_writer, EndpointCore, ExponentialBackoff, StreamEnd};
use crate::error::{LoggerError, Result};
use crate::queue::DropOldestQueue;
use crate::router::{RawQueue, RelayQueue, SourceId};
use ahash::AHashMap;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Registration messages from connection handlers to the feeder.
#[derive(Debug)]
enum FeederControl {
    Started { id: u64, queue: RelayQueue },
    Stopped { id: u64 },
}

/// Runs the network relay server until cancelled.
///
/// One feeder task fans every line of `queue` out to a private queue per
/// connected client; handlers register on connect and deregister when the
/// connection closes.
pub async fn run_relay_server(
    address: String,
    queue: RelayQueue,
    client_capacity: usize,
    token: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| LoggerError::network(&address, e))?;
    info!("Relay server listening on {}", address);
    serve_relay(listener, queue, client_capacity, token).await
}

/// Accept loop of the relay server on an already bound listener.
pub async fn serve_relay(
    listener: TcpListener,
    queue: RelayQueue,
    client_capacity: usize,
    token: CancellationToken,
) -> Result<()> {
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let mut join_set = JoinSet::new();
    join_set.spawn(run_feeder(queue, control_rx, token.clone()));

    let mut next_id: u64 = 0;
    loop {
        tokio::select! {
            accept_res = listener.accept() => {
                match accept_res {
                    Ok((stream, addr)) => {
                        info!("Relay client connected from {}", addr);
                        next_id += 1;
                        let id = next_id;
                        let private: RelayQueue = Arc::new(DropOldestQueue::new(client_capacity));
                        if control_tx.send(FeederControl::Started { id, queue: private.clone() }).is_err() {
                            break;
                        }
                        let control_tx = control_tx.clone();
                        let token = token.child_token();
                        join_set.spawn(async move {
                            handle_client(stream, addr.to_string(), private, token).await;
                            let _ = control_tx.send(FeederControl::Stopped { id });
                        });
                    }
                    Err(e) => error!("Relay accept error: {}", e),
                }
            }
            _ = join_set.join_next(), if !join_set.is_empty() => {}
            _ = token.cancelled() => break,
        }
    }

    join_set.shutdown().await;
    Ok(())
}

async fn run_feeder(
    queue: RelayQueue,
    mut control_rx: mpsc::UnboundedReceiver<FeederControl>,
    token: CancellationToken,
) {
    let mut clients: AHashMap<u64, RelayQueue> = AHashMap::new();

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            control = control_rx.recv() => match control {
                Some(FeederControl::Started { id, queue }) => {
                    clients.insert(id, queue);
                    debug!("Relay feeder: {} client(s)", clients.len());
                }
                Some(FeederControl::Stopped { id }) => {
                    clients.remove(&id);
                    debug!("Relay feeder: {} client(s)", clients.len());
                }
                None => break,
            },
            line = queue.pop() => fan_out(&clients, line),
        }
    }
}

fn fan_out(clients: &AHashMap<u64, RelayQueue>, line: Bytes) {
    for client in clients.values() {
        client.push(line.clone());
    }
}

async fn handle_client(stream: TcpStream, name: String, queue: RelayQueue, token: CancellationToken) {
    let (mut read, write) = stream.into_split();

    // Relay clients only listen; reading is just for noticing the hang-up.
    let closed = async move {
        let mut buf = [0u8; 512];
        loop {
            match read.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
    };

    tokio::select! {
        res = run_relay_writer(write, queue, token.clone(), &name) => {
            if let Err(e) = res {
                debug!("Relay client {} write failed: {}", name, e);
            }
        }
        _ = closed => {}
    }
    info!("Relay client {} disconnected", name);
}

/// Runs a network source client until cancelled.
///
/// The peer address is the source name. Every way a connection can end
/// (refused, timed out, EOF, read error) is treated as a lost connection and
/// retried with exponential backoff, reset after each successful connect.
pub async fn run_client(
    address: String,
    connect_timeout: Duration,
    inbound: RawQueue,
    token: CancellationToken,
) -> Result<()> {
    let core = EndpointCore::new(SourceId::new(&address), inbound);
    let mut backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(60), 2.0);

    info!("Connecting to network source {}", address);
    loop {
        if token.is_cancelled() {
            break;
        }

        let connect = tokio::time::timeout(connect_timeout, TcpStream::connect(&address));
        let attempt = tokio::select! {
            _ = token.cancelled() => break,
            res = connect => res,
        };

        match attempt {
            Ok(Ok(stream)) => {
                info!("Connected to {}", address);
                backoff.reset();
                match run_reader_loop(stream, &core, &token, None).await {
                    Ok(StreamEnd::Cancelled) => break,
                    Ok(StreamEnd::Eof) => warn!("Connection to {} closed by peer", address),
                    Err(e) => warn!("Connection to {} lost: {}", address, e),
                }
            }
            Ok(Err(e)) => warn!("Failed to connect to {}: {}", address, e),
            Err(_) => warn!("Connecting to {} timed out after {:?}", address, connect_timeout),
        }

        let wait = backoff.next_backoff();
        debug!("Retrying {} in {:?}", address, wait);
        tokio::select! {
            _ = tokio::time::sleep(wait) => {},
            _ = token.cancelled() => break,
        }
    }
    info!("Network source {} stopped.", address);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_out_reaches_every_client() {
        let a: RelayQueue = Arc::new(DropOldestQueue::new(4));
        let b: RelayQueue = Arc::new(DropOldestQueue::new(4));
        let mut clients = AHashMap::new();
        clients.insert(1, a.clone());
        clients.insert(2, b.clone());

        fan_out(&clients, Bytes::from_static(b"!AIVDM"));
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);

        clients.remove(&2);
        fan_out(&clients, Bytes::from_static(b"!AIVDM"));
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 1);
    }
}
