//! Register I/O boundary and the Modbus-RTU serial transport.
//!
//! The gateway talks to the adapter exclusively through the [`RegisterIo`]
//! trait, so the same orchestration code runs against the real RS-485 link,
//! a TCP bridge or the in-memory bank used by the tests. [`RtuTransport`] is
//! the production implementation: half-duplex serial with explicit
//! driver-enable turnaround and a single receive deadline per exchange.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{timeout, timeout_at, Instant};
use tokio_serial::{SerialPort, SerialStream};

use crate::config::RtuConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::protocol::{self, FunctionCode, RegisterKind, MAX_READ_WORDS, WRITE_REPLY_LEN};

/// Polymorphic boundary between the gateway and whatever carries the
/// registers.
#[async_trait]
pub trait RegisterIo: Send + Sync {
    /// Read `count` registers starting at `address` from the given table.
    async fn read_registers(
        &mut self,
        kind: RegisterKind,
        address: u16,
        count: u16,
    ) -> GatewayResult<Vec<u16>>;

    /// Write registers starting at `address` into the holding table.
    async fn write_registers(&mut self, address: u16, words: &[u16]) -> GatewayResult<()>;
}

/// Counters maintained by the RTU transport.
#[derive(Debug, Clone, Default)]
pub struct TransportStats {
    pub requests_sent: u64,
    pub responses_received: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Control of the RS-485 driver-enable / receiver-enable lines.
///
/// Transceivers differ: some boards route DE and RE to separate GPIOs, some
/// tie them to one pin, and many USB dongles switch direction themselves. The
/// transport calls [`LineDirection::set_transmit`] right before writing the
/// request and [`LineDirection::set_receive`] as soon as the bytes have left
/// the UART.
pub trait LineDirection: Send + Sync {
    fn set_transmit(&mut self);
    fn set_receive(&mut self);
}

/// No-op direction control for transceivers with automatic turnaround.
pub struct AutoDirection;

impl LineDirection for AutoDirection {
    fn set_transmit(&mut self) {}
    fn set_receive(&mut self) {}
}

/// Modbus-RTU master over a serial port.
pub struct RtuTransport {
    port: SerialStream,
    slave_id: u8,
    timeout: Duration,
    direction: Box<dyn LineDirection>,
    stats: TransportStats,
}

impl RtuTransport {
    /// Open the serial port described by `config`.
    pub fn open(config: &RtuConfig) -> GatewayResult<Self> {
        let builder = tokio_serial::new(&config.port, config.baud_rate)
            .data_bits(config.serial_data_bits())
            .stop_bits(config.serial_stop_bits())
            .parity(config.serial_parity());
        let port = SerialStream::open(&builder)?;

        Ok(Self {
            port,
            slave_id: config.slave_id,
            timeout: Duration::from_millis(config.timeout_ms),
            direction: Box::new(AutoDirection),
            stats: TransportStats::default(),
        })
    }

    /// Replace the direction control, e.g. with a GPIO-driven DE/RE pair.
    pub fn with_direction(mut self, direction: Box<dyn LineDirection>) -> Self {
        self.direction = direction;
        self
    }

    /// Slave id this transport addresses.
    pub fn slave_id(&self) -> u8 {
        self.slave_id
    }

    /// Snapshot of the transport counters.
    pub fn stats(&self) -> TransportStats {
        self.stats.clone()
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    /// One request/reply exchange on the half-duplex line.
    ///
    /// Flushes stale input, raises the driver, writes the request, drops back
    /// to receive and then collects bytes under a single deadline until
    /// `expected_len` arrived or the deadline passed. Anything shorter than a
    /// minimal frame (5 bytes) is a timeout; callers decide what a short but
    /// plausible frame means.
    async fn transceive(&mut self, request: &[u8], expected_len: usize) -> GatewayResult<Vec<u8>> {
        log::trace!("tx frame: {}", hex::encode_upper(request));
        self.port
            .clear(tokio_serial::ClearBuffer::Input)
            .map_err(|e| GatewayError::io(e.to_string()))?;

        self.direction.set_transmit();
        let io_timeout = self.timeout;
        let port = &mut self.port;
        let sent = timeout(io_timeout, async move {
            port.write_all(request).await?;
            port.flush().await?;
            Ok::<_, std::io::Error>(())
        })
        .await;
        self.direction.set_receive();

        match sent {
            Err(_) => {
                self.stats.timeouts += 1;
                self.stats.errors += 1;
                return Err(GatewayError::timeout("send request", self.timeout_ms()));
            }
            Ok(Err(e)) => {
                self.stats.errors += 1;
                return Err(GatewayError::io(e.to_string()));
            }
            Ok(Ok(())) => {}
        }
        self.stats.requests_sent += 1;
        self.stats.bytes_sent += request.len() as u64;

        let mut buf = vec![0u8; expected_len];
        let mut total = 0usize;
        let deadline = Instant::now() + self.timeout;
        while total < expected_len {
            match timeout_at(deadline, self.port.read(&mut buf[total..])).await {
                Err(_) => break,
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => total += n,
                Ok(Err(e)) => {
                    self.stats.errors += 1;
                    return Err(GatewayError::io(e.to_string()));
                }
            }
        }
        buf.truncate(total);
        self.stats.bytes_received += total as u64;
        log::trace!("rx frame: {}", hex::encode_upper(&buf));

        if total < 5 {
            self.stats.timeouts += 1;
            self.stats.errors += 1;
            return Err(GatewayError::timeout("receive reply", self.timeout_ms()));
        }
        self.stats.responses_received += 1;
        Ok(buf)
    }
}

#[async_trait]
impl RegisterIo for RtuTransport {
    async fn read_registers(
        &mut self,
        kind: RegisterKind,
        address: u16,
        count: u16,
    ) -> GatewayResult<Vec<u16>> {
        if count == 0 || count > MAX_READ_WORDS {
            return Err(GatewayError::invalid_argument(format!(
                "read of {count} registers"
            )));
        }

        let function = kind.read_function();
        let request = protocol::encode_read_request(self.slave_id, kind, address, count);
        let expected = protocol::read_reply_len(count);
        let reply = self.transceive(&request, expected).await?;

        if let Some(err) = protocol::detect_exception(&reply, function) {
            self.stats.errors += 1;
            return Err(err);
        }
        if reply.len() < expected {
            self.stats.timeouts += 1;
            self.stats.errors += 1;
            return Err(GatewayError::timeout("receive reply", self.timeout_ms()));
        }
        protocol::decode_read_reply(&reply, self.slave_id, function, count).map_err(|e| {
            self.stats.errors += 1;
            e
        })
    }

    async fn write_registers(&mut self, address: u16, words: &[u16]) -> GatewayResult<()> {
        let request = protocol::encode_write_request(self.slave_id, address, words)?;
        let reply = self.transceive(&request, WRITE_REPLY_LEN).await?;

        if let Some(err) = protocol::detect_exception(&reply, FunctionCode::WriteMultiple) {
            self.stats.errors += 1;
            return Err(err);
        }
        if reply.len() < WRITE_REPLY_LEN {
            self.stats.timeouts += 1;
            self.stats.errors += 1;
            return Err(GatewayError::timeout("receive reply", self.timeout_ms()));
        }
        protocol::decode_write_reply(&reply, self.slave_id, address, words.len() as u16).map_err(
            |e| {
                self.stats.errors += 1;
                e
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RtuConfig;

    #[test]
    fn test_auto_direction_is_noop() {
        let mut direction = AutoDirection;
        direction.set_transmit();
        direction.set_receive();
    }

    #[test]
    fn test_rtu_transport_open() {
        // Opening fails on machines without the port; the constructor itself
        // must not panic either way.
        let result = RtuTransport::open(&RtuConfig::default());
        println!("RTU transport open result: {:?}", result.is_ok());
    }
}
