//! Serial endpoints: sentence readers and the relay server.
//!
//! A reader owns one device and feeds every sentence line into the hub. The
//! relay server owns a second device and writes relayed lines to it. Both
//! reopen their device after any failure; transport errors never leave
//! this module.

use crate::config::{SerialConfig, SerialServerConfig};
use crate::endpoint_core::{run_reader_loop, run_relay_writer, write_line, EndpointCore, StreamEnd};
use crate::error::{LoggerError, Result};
use crate::router::{RawQueue, RelayQueue, SourceId};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const REOPEN_DELAY: Duration = Duration::from_secs(1);
const CARRIER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs a serial reader until cancelled, reopening the device after errors
/// or read timeouts.
pub async fn run_reader(config: SerialConfig, inbound: RawQueue, token: CancellationToken) -> Result<()> {
    let core = EndpointCore::new(SourceId::new(&config.name), inbound);

    loop {
        match read_once(&config, &core, &token).await {
            Ok(StreamEnd::Cancelled) => {
                info!("Serial reader {} stopped (cancelled).", config.name);
                break;
            }
            Ok(StreamEnd::Eof) => {
                warn!("Serial port {} closed, reopening...", config.device);
            }
            Err(e) => {
                if token.is_cancelled() {
                    break;
                }
                warn!("Serial port {} error: {}. Reopening in 1s...", config.device, e);
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(REOPEN_DELAY) => {},
            _ = token.cancelled() => break,
        }
    }
    Ok(())
}

async fn read_once(config: &SerialConfig, core: &EndpointCore, token: &CancellationToken) -> Result<StreamEnd> {
    let port = open_port(&config.device, config.baud, config.flow_control.into())?;
    info!(
        "Serial reader {} opened {} at {} baud",
        config.name, config.device, config.baud
    );
    run_reader_loop(port, core, token, Some(config.read_timeout())).await
}

/// Runs the serial relay server until cancelled.
///
/// With `require_carrier`, queued lines are only written while the device
/// raises carrier detect; otherwise they stay queued and the oldest are
/// evicted as new ones arrive.
pub async fn run_relay_server(
    config: SerialServerConfig,
    queue: RelayQueue,
    token: CancellationToken,
) -> Result<()> {
    loop {
        let res = match open_port(&config.device, config.baud, config.flow_control.into()) {
            Ok(port) => {
                info!("Serial relay server opened {} at {} baud", config.device, config.baud);
                if config.require_carrier {
                    relay_with_carrier(port, &config.device, &queue, &token).await
                } else {
                    run_relay_writer(port, queue.clone(), token.clone(), &config.device).await
                }
            }
            Err(e) => Err(e),
        };

        if token.is_cancelled() {
            break;
        }
        match res {
            Ok(()) => warn!("Serial relay {} ended, reopening...", config.device),
            Err(e) => error!("Serial relay {} error: {}. Reopening in 1s...", config.device, e),
        }

        tokio::select! {
            _ = tokio::time::sleep(REOPEN_DELAY) => {},
            _ = token.cancelled() => break,
        }
    }
    info!("Serial relay server {} stopped.", config.device);
    Ok(())
}

async fn relay_with_carrier(
    mut port: SerialStream,
    device: &str,
    queue: &RelayQueue,
    token: &CancellationToken,
) -> Result<()> {
    let mut poll = tokio::time::interval(CARRIER_POLL_INTERVAL);
    let mut had_carrier = false;

    loop {
        tokio::select! {
            _ = token.cancelled() => return Ok(()),
            _ = poll.tick() => {}
        }

        let carrier = port
            .read_carrier_detect()
            .map_err(|e| LoggerError::serial(device, e))?;
        if carrier != had_carrier {
            debug!("Serial relay {}: carrier {}", device, if carrier { "up" } else { "down" });
            had_carrier = carrier;
        }
        if !carrier {
            continue;
        }

        let mut wrote = false;
        while let Some(line) = queue.try_pop() {
            write_line(&mut port, &line)
                .await
                .map_err(|e| LoggerError::serial_io(device, e))?;
            wrote = true;
        }
        if wrote {
            port.flush().await.map_err(|e| LoggerError::serial_io(device, e))?;
        }
    }
}

#[allow(unused_mut)]
fn open_port(device: &str, baud: u32, flow_control: tokio_serial::FlowControl) -> Result<SerialStream> {
    let mut port = tokio_serial::new(device, baud)
        .flow_control(flow_control)
        .open_native_async()
        .map_err(|e| LoggerError::serial(device, e))?;

    #[cfg(unix)]
    if let Err(e) = port.set_exclusive(false) {
        warn!("Failed to set exclusive mode on {}: {}", device, e);
    }

    Ok(port)
}
