//! Gateway orchestration: discovery, polling, throttling and the
//! prepare/commit write protocol.
//!
//! The gateway owns the cached view of the whole fleet (system status plus
//! one [`Unit`] record per slot) and is the only component that touches the
//! register I/O. Every transport operation goes through the throttle so two
//! exchanges are never closer together than `throttle_ms`, which the adapter
//! requires on its half-duplex side.
//!
//! Writes follow a two-phase discipline. The adapter keeps separate input
//! (observed state) and holding (commanded state) tables, and a write-multiple
//! replaces all three holding words at once, so the gateway must know the
//! current holding contents before it can change one field:
//!
//! 1. `prepare_write` refreshes the per-unit holding shadow from the adapter
//!    unless a recent read or write already vouches for it, then reconciles
//!    the shadow with the last observed status (flushing immediately if the
//!    two disagreed).
//! 2. The operator verb mutates the cached *status* view, the single source
//!    of truth for intent between the two phases.
//! 3. `commit_write` folds the status into the shadow and flushes it if
//!    anything changed. A staged filter reset is released with a second write
//!    because the adapter latches the reset only on the 15→0 transition.
//!
//! After a successful flush the unit's status polling is suppressed for
//! `cache_write_s`: the adapter reports stale or transitional values while it
//! forwards the command onto the indoor bus.

use log::{info, warn};
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::config::{GatewayConfig, RegisteredUnits};
use crate::error::{GatewayError, GatewayResult};
use crate::logging::{EventLogger, GatewayEvent};
use crate::protocol::RegisterKind;
use crate::registers::{
    capability_address, error_address, holding_address, status_address, FanDirection, FanSpeed,
    OperatingMode, SystemStatus, UnitCapability, UnitError, UnitHolding, UnitStatus, MAX_UNITS,
    SYSTEM_STATUS_ADDRESS, SYSTEM_STATUS_WORDS, UNIT_CAPABILITY_WORDS, UNIT_ERROR_WORDS,
    UNIT_HOLDING_WORDS, UNIT_STATUS_WORDS,
};
use crate::transport::RegisterIo;

/// Bus id of a unit slot: group = index/16 + 1, number = index%16.
pub fn unit_id(index: u8) -> String {
    format!("{}-{:02}", index / 16 + 1, index % 16)
}

/// Cached record of one unit slot.
#[derive(Debug, Clone)]
pub struct Unit {
    /// Set once both capability and status reads succeeded during discovery.
    pub present: bool,
    pub index: u8,
    pub id: String,
    pub capability: UnitCapability,
    pub status: UnitStatus,
    pub holding: UnitHolding,
    pub error: UnitError,
    pub last_error_read: Option<Instant>,
}

impl Unit {
    fn new(index: u8) -> Self {
        Self {
            present: false,
            index,
            id: unit_id(index),
            capability: UnitCapability::new(),
            status: UnitStatus::new(),
            holding: UnitHolding::new(),
            error: UnitError::new(),
            last_error_read: None,
        }
    }

    /// Host-facing snapshot of the live status fields.
    pub fn summary(&self) -> UnitSummary {
        UnitSummary {
            index: self.index,
            id: self.id.clone(),
            power: self.status.power(),
            mode: self.status.mode(),
            current_mode: self.status.current_mode(),
            setpoint_c: self.status.setpoint_celsius(),
            current_temperature_c: self.status.current_temperature_celsius(),
            fan_speed: self.status.fan_speed(),
            fan_direction: self.status.fan_direction(),
            filter_warning: self.status.filter_warning(),
        }
    }
}

/// Serialisable per-unit state for the host surface.
#[derive(Debug, Clone, Serialize)]
pub struct UnitSummary {
    pub index: u8,
    pub id: String,
    pub power: bool,
    pub mode: OperatingMode,
    pub current_mode: OperatingMode,
    pub setpoint_c: f32,
    pub current_temperature_c: f32,
    pub fan_speed: FanSpeed,
    pub fan_direction: FanDirection,
    pub filter_warning: bool,
}

/// The gateway state machine.
///
/// Not internally synchronised: wrap it in
/// [`SharedGateway`](crate::service::SharedGateway) (or any exclusive lock)
/// and hold the lock across a whole logical operation.
pub struct Gateway {
    io: Box<dyn RegisterIo>,
    config: GatewayConfig,
    events: EventLogger,
    system_status: SystemStatus,
    units: Vec<Unit>,
    last_op: Option<Instant>,
}

impl Gateway {
    /// Create a gateway over the given register I/O.
    pub fn new(io: Box<dyn RegisterIo>, config: GatewayConfig) -> Self {
        Self {
            io,
            config,
            events: EventLogger::disabled(),
            system_status: SystemStatus::new(),
            units: (0..MAX_UNITS as u8).map(Unit::new).collect(),
            last_op: None,
        }
    }

    /// Install a structured event sink.
    pub fn with_events(mut self, events: EventLogger) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Last system status read by discovery.
    pub fn system_status(&self) -> &SystemStatus {
        &self.system_status
    }

    /// All 64 unit records, present or not.
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// One unit record; errors on an out-of-range index.
    pub fn unit(&self, index: u8) -> GatewayResult<&Unit> {
        self.units
            .get(index as usize)
            .ok_or_else(|| GatewayError::invalid_argument(format!("unit index {index}")))
    }

    /// Number of units marked present by the last discovery.
    pub fn discovered_count(&self) -> usize {
        self.units.iter().filter(|u| u.present).count()
    }

    /// Snapshots of every present unit, for the host's unit list.
    pub fn unit_summaries(&self) -> Vec<UnitSummary> {
        self.units
            .iter()
            .filter(|u| u.present)
            .map(Unit::summary)
            .collect()
    }

    /// Snapshot of the present units for the host's persistence layer.
    pub fn registered_units(&self) -> RegisteredUnits {
        let mut bitmap = 0u64;
        let mut ids = Vec::new();
        for unit in self.units.iter().filter(|u| u.present) {
            bitmap |= 1 << unit.index;
            ids.push(unit.id.clone());
        }
        RegisteredUnits { bitmap, ids }
    }

    /// Mark units present from a persisted snapshot, without bus I/O.
    ///
    /// Lets a host serve its unit list before the first discovery of a new
    /// session; the next discovery replaces everything.
    pub fn restore_units(&mut self, registered: &RegisteredUnits) {
        for index in 0..MAX_UNITS as u8 {
            self.units[index as usize] = Unit::new(index);
            self.units[index as usize].present = registered.is_registered(index);
        }
    }

    fn ensure_present(&self, index: u8) -> GatewayResult<()> {
        let unit = self.unit(index)?;
        if !unit.present {
            return Err(GatewayError::unit_not_found(index));
        }
        Ok(())
    }

    /// Sleep off whatever remains of the inter-operation gap.
    async fn throttle(&self) {
        let Some(last) = self.last_op else {
            return;
        };
        let gap = Duration::from_millis(self.config.throttle_ms);
        let elapsed = last.elapsed();
        if elapsed < gap {
            tokio::time::sleep(gap - elapsed).await;
        }
    }

    async fn read(&mut self, kind: RegisterKind, address: u16, count: u16) -> GatewayResult<Vec<u16>> {
        self.throttle().await;
        let result = self.io.read_registers(kind, address, count).await;
        self.last_op = Some(Instant::now());
        if let Err(GatewayError::Timeout { operation, .. }) = &result {
            self.events.emit(GatewayEvent::TransportTimeout {
                operation: operation.clone(),
            });
        }
        result
    }

    async fn write(&mut self, address: u16, words: &[u16]) -> GatewayResult<()> {
        self.throttle().await;
        let result = self.io.write_registers(address, words).await;
        self.last_op = Some(Instant::now());
        if let Err(GatewayError::Timeout { operation, .. }) = &result {
            self.events.emit(GatewayEvent::TransportTimeout {
                operation: operation.clone(),
            });
        }
        result
    }

    /// Scan the bus and rebuild the unit table.
    ///
    /// Fails only if the system status itself cannot be read. A slot is
    /// enumerated when its connected bit is set and its error bit is clear;
    /// it becomes present only after both the capability and status reads
    /// succeed, and a failure of either just leaves that slot absent.
    pub async fn discover_units(&mut self) -> GatewayResult<usize> {
        let words = self
            .read(
                RegisterKind::Input,
                SYSTEM_STATUS_ADDRESS,
                SYSTEM_STATUS_WORDS as u16,
            )
            .await?;
        self.system_status = SystemStatus::from_words(&words);

        for index in 0..MAX_UNITS as u8 {
            self.units[index as usize] = Unit::new(index);

            if !self.system_status.unit_connected(index) || self.system_status.unit_error(index) {
                continue;
            }

            let capability = match self
                .read(
                    RegisterKind::Input,
                    capability_address(index),
                    UNIT_CAPABILITY_WORDS as u16,
                )
                .await
            {
                Ok(words) => words,
                Err(err) => {
                    warn!("capability read failed for unit {index}: {err}");
                    continue;
                }
            };

            let status = match self
                .read(
                    RegisterKind::Input,
                    status_address(index),
                    UNIT_STATUS_WORDS as u16,
                )
                .await
            {
                Ok(words) => words,
                Err(err) => {
                    warn!("status read failed for unit {index}: {err}");
                    continue;
                }
            };

            let unit = &mut self.units[index as usize];
            unit.capability = UnitCapability::from_words(&capability);
            unit.status = UnitStatus::from_words(&status);
            unit.present = true;
        }

        let count = self.discovered_count();
        info!("discovered {count} units");
        self.events
            .emit(GatewayEvent::DiscoverComplete { unit_count: count });
        Ok(count)
    }

    /// Refresh the status of every present unit.
    ///
    /// Units written within `cache_write_s` are skipped so transitional
    /// adapter state never overwrites the operator's staged intent. Per-unit
    /// failures are reported as events and do not stop the sweep.
    pub async fn poll_status(&mut self) -> GatewayResult<()> {
        let now = Instant::now();
        let suppress = Duration::from_secs(self.config.cache_write_s);

        for index in 0..MAX_UNITS as u8 {
            let unit = &self.units[index as usize];
            if !unit.present || unit.holding.write_within(now, suppress) {
                continue;
            }

            match self
                .read(
                    RegisterKind::Input,
                    status_address(index),
                    UNIT_STATUS_WORDS as u16,
                )
                .await
            {
                Ok(words) => self.units[index as usize].status = UnitStatus::from_words(&words),
                Err(err) => {
                    warn!("status poll failed for unit {index}: {err}");
                    self.events.emit(GatewayEvent::PollError {
                        unit: index,
                        message: err.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Read a unit's error report, served from cache within `cache_error_s`.
    pub async fn read_error(&mut self, index: u8) -> GatewayResult<UnitError> {
        self.ensure_present(index)?;
        let now = Instant::now();
        let cache = Duration::from_secs(self.config.cache_error_s);

        if let Some(last) = self.units[index as usize].last_error_read {
            if now.duration_since(last) < cache {
                return Ok(self.units[index as usize].error);
            }
        }

        let words = self
            .read(
                RegisterKind::Input,
                error_address(index),
                UNIT_ERROR_WORDS as u16,
            )
            .await?;
        let unit = &mut self.units[index as usize];
        unit.error = UnitError::from_words(&words);
        unit.last_error_read = Some(now);
        Ok(unit.error)
    }

    async fn holding_read(&mut self, index: u8, now: Instant) -> GatewayResult<()> {
        let words = self
            .read(
                RegisterKind::Holding,
                holding_address(index),
                UNIT_HOLDING_WORDS as u16,
            )
            .await?;
        let holding = &mut self.units[index as usize].holding;
        holding.load_words(&words);
        holding.mark_read(now);
        Ok(())
    }

    async fn holding_write_if_dirty(&mut self, index: u8, now: Instant) -> GatewayResult<()> {
        if !self.units[index as usize].holding.is_dirty() {
            return Ok(());
        }
        let words = *self.units[index as usize].holding.words();
        let address = holding_address(index);
        self.write(address, &words).await?;
        self.units[index as usize].holding.mark_written(now);
        self.events.emit(GatewayEvent::WriteComplete {
            unit: index,
            address,
        });
        Ok(())
    }

    /// First phase of a write: make the holding shadow trustworthy.
    ///
    /// Reloads the shadow from the adapter when it was never read, or when it
    /// carries no staged change and neither a read nor a write vouches for it
    /// within `cache_write_s`. After a reload the shadow is reconciled with
    /// the last observed status, and any difference is flushed straight back
    /// so the adapter and shadow agree before the operator's change lands.
    pub async fn prepare_write(&mut self, index: u8) -> GatewayResult<()> {
        self.ensure_present(index)?;
        let now = Instant::now();
        let window = Duration::from_secs(self.config.cache_write_s);

        let holding = &self.units[index as usize].holding;
        let must_reload = holding.never_read()
            || (!holding.is_dirty()
                && !holding.read_within(now, window)
                && !holding.write_within(now, window));
        if !must_reload {
            return Ok(());
        }

        self.holding_read(index, now).await?;

        let unit = &mut self.units[index as usize];
        let status = unit.status;
        unit.holding.sync_from_status(&status);
        if unit.holding.is_dirty() {
            return self.holding_write_if_dirty(index, now).await;
        }
        Ok(())
    }

    /// Second phase of a write: fold staged intent into the shadow and flush.
    ///
    /// If the shadow leaves this with the filter-reset nibble asserted, it is
    /// released and written a second time to complete the reset pulse.
    pub async fn commit_write(&mut self, index: u8) -> GatewayResult<()> {
        self.ensure_present(index)?;
        let now = Instant::now();

        let unit = &mut self.units[index as usize];
        let status = unit.status;
        unit.holding.sync_from_status(&status);
        self.holding_write_if_dirty(index, now).await?;

        if self.units[index as usize].holding.filter_reset() {
            self.units[index as usize].holding.set_filter_reset(false);
            self.holding_write_if_dirty(index, now).await?;
        }
        Ok(())
    }

    /// Switch a unit on or off.
    pub async fn set_power(&mut self, index: u8, on: bool) -> GatewayResult<()> {
        self.prepare_write(index).await?;
        self.units[index as usize].status.set_power(on);
        self.commit_write(index).await
    }

    /// Change the operating mode. Also powers the unit on; a mode change on
    /// a stopped unit is meaningless to the adapter.
    pub async fn set_mode(&mut self, index: u8, mode: OperatingMode) -> GatewayResult<()> {
        self.prepare_write(index).await?;
        let status = &mut self.units[index as usize].status;
        status.set_power(true);
        status.set_mode(mode);
        self.commit_write(index).await
    }

    /// Change the temperature setpoint in °C.
    pub async fn set_setpoint(&mut self, index: u8, celsius: f32) -> GatewayResult<()> {
        self.prepare_write(index).await?;
        self.units[index as usize]
            .status
            .set_setpoint_celsius(celsius);
        self.commit_write(index).await
    }

    /// Change the fan speed step.
    pub async fn set_fan_speed(&mut self, index: u8, speed: FanSpeed) -> GatewayResult<()> {
        self.prepare_write(index).await?;
        self.units[index as usize].status.set_fan_speed(speed);
        self.commit_write(index).await
    }

    /// Change the louvre direction.
    pub async fn set_fan_direction(
        &mut self,
        index: u8,
        direction: FanDirection,
    ) -> GatewayResult<()> {
        self.prepare_write(index).await?;
        self.units[index as usize]
            .status
            .set_fan_direction(direction);
        self.commit_write(index).await
    }

    /// Acknowledge a filter warning.
    ///
    /// Stages the reset nibble directly on the holding shadow; commit then
    /// performs the assert and release writes back to back.
    pub async fn filter_reset(&mut self, index: u8) -> GatewayResult<()> {
        self.prepare_write(index).await?;
        self.units[index as usize].holding.set_filter_reset(true);
        self.commit_write(index).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_id_format() {
        assert_eq!(unit_id(0), "1-00");
        assert_eq!(unit_id(15), "1-15");
        assert_eq!(unit_id(16), "2-00");
        assert_eq!(unit_id(17), "2-01");
        assert_eq!(unit_id(63), "4-15");
    }

    #[test]
    fn test_new_gateway_has_empty_fleet() {
        let gateway = Gateway::new(
            Box::new(crate::register_bank::RegisterBank::new()),
            GatewayConfig::default(),
        );
        assert_eq!(gateway.discovered_count(), 0);
        assert_eq!(gateway.units().len(), MAX_UNITS);
        assert_eq!(gateway.unit(12).unwrap().id, "1-12");
        assert!(gateway.unit(64).is_err());
    }

    #[test]
    fn test_restore_units_from_snapshot() {
        let mut gateway = Gateway::new(
            Box::new(crate::register_bank::RegisterBank::new()),
            GatewayConfig::default(),
        );
        let registered = RegisteredUnits {
            bitmap: (1 << 3) | (1 << 40),
            ids: vec!["1-03".to_string(), "3-08".to_string()],
        };
        gateway.restore_units(&registered);
        assert_eq!(gateway.discovered_count(), 2);
        assert!(gateway.unit(3).unwrap().present);
        assert!(gateway.unit(40).unwrap().present);
        assert_eq!(gateway.unit(40).unwrap().id, "3-08");
        assert_eq!(gateway.registered_units(), registered);
    }
}
