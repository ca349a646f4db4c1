//! Typed views over the adapter's fixed-layout register tables.
//!
//! Each view wraps the raw words of one table region and exposes the fields
//! as plain Rust types through the bit codec. The register map is fixed by
//! the adapter firmware:
//!
//! | Region            | Table   | Address      | Words |
//! |-------------------|---------|--------------|-------|
//! | System status     | input   | 0            | 9     |
//! | Unit capability   | input   | 1000 + 3·i   | 3     |
//! | Unit status       | input   | 2000 + 6·i   | 6     |
//! | Unit holding      | holding | 2000 + 3·i   | 3     |
//! | Unit error        | input   | 3600 + 2·i   | 2     |
//!
//! [`UnitHolding`] is the writeable shadow: its setters track a dirty flag
//! with bit precision so the gateway only flushes when something actually
//! changed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

use crate::codec;

/// Number of unit slots on the indoor bus.
pub const MAX_UNITS: usize = 64;

/// Address and size of the system status region (input table).
pub const SYSTEM_STATUS_ADDRESS: u16 = 0;
pub const SYSTEM_STATUS_WORDS: usize = 9;

/// Base address and per-unit size of the capability region (input table).
pub const UNIT_CAPABILITY_ADDRESS: u16 = 1000;
pub const UNIT_CAPABILITY_WORDS: usize = 3;

/// Base address and per-unit size of the status region (input table).
pub const UNIT_STATUS_ADDRESS: u16 = 2000;
pub const UNIT_STATUS_WORDS: usize = 6;

/// Base address and per-unit size of the holding region (holding table).
pub const UNIT_HOLDING_ADDRESS: u16 = 2000;
pub const UNIT_HOLDING_WORDS: usize = 3;

/// Base address and per-unit size of the error region (input table).
pub const UNIT_ERROR_ADDRESS: u16 = 3600;
pub const UNIT_ERROR_WORDS: usize = 2;

/// Input-table address of unit `index`'s capability words.
pub fn capability_address(index: u8) -> u16 {
    UNIT_CAPABILITY_ADDRESS + u16::from(index) * UNIT_CAPABILITY_WORDS as u16
}

/// Input-table address of unit `index`'s status words.
pub fn status_address(index: u8) -> u16 {
    UNIT_STATUS_ADDRESS + u16::from(index) * UNIT_STATUS_WORDS as u16
}

/// Holding-table address of unit `index`'s holding words.
pub fn holding_address(index: u8) -> u16 {
    UNIT_HOLDING_ADDRESS + u16::from(index) * UNIT_HOLDING_WORDS as u16
}

/// Input-table address of unit `index`'s error words.
pub fn error_address(index: u8) -> u16 {
    UNIT_ERROR_ADDRESS + u16::from(index) * UNIT_ERROR_WORDS as u16
}

/// Commanded or observed operating mode of a unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum OperatingMode {
    #[default]
    Fan = 0,
    Heat = 1,
    Cool = 2,
    Auto = 3,
    Vent = 4,
    Undefined = 5,
    Slave = 6,
    Dry = 7,
}

impl OperatingMode {
    /// Decode the 4-bit field value; out-of-range values read as undefined.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => OperatingMode::Fan,
            1 => OperatingMode::Heat,
            2 => OperatingMode::Cool,
            3 => OperatingMode::Auto,
            4 => OperatingMode::Vent,
            6 => OperatingMode::Slave,
            7 => OperatingMode::Dry,
            _ => OperatingMode::Undefined,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperatingMode::Fan => "fan",
            OperatingMode::Heat => "heat",
            OperatingMode::Cool => "cool",
            OperatingMode::Auto => "auto",
            OperatingMode::Vent => "vent",
            OperatingMode::Undefined => "undefined",
            OperatingMode::Slave => "slave",
            OperatingMode::Dry => "dry",
        })
    }
}

/// Fan speed step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum FanSpeed {
    #[default]
    Auto = 0,
    Low = 1,
    LowMedium = 2,
    Medium = 3,
    HighMedium = 4,
    High = 5,
}

impl FanSpeed {
    /// Decode the 3-bit field value; out-of-range values read as auto.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => FanSpeed::Low,
            2 => FanSpeed::LowMedium,
            3 => FanSpeed::Medium,
            4 => FanSpeed::HighMedium,
            5 => FanSpeed::High,
            _ => FanSpeed::Auto,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for FanSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FanSpeed::Auto => "auto",
            FanSpeed::Low => "low",
            FanSpeed::LowMedium => "low-medium",
            FanSpeed::Medium => "medium",
            FanSpeed::HighMedium => "high-medium",
            FanSpeed::High => "high",
        })
    }
}

/// Fan louvre direction step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum FanDirection {
    #[default]
    P0 = 0,
    P1 = 1,
    P2 = 2,
    P3 = 3,
    P4 = 4,
    Stop = 6,
    Swing = 7,
}

impl FanDirection {
    /// Decode the 3-bit field value; the unused value 5 reads as P0.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => FanDirection::P1,
            2 => FanDirection::P2,
            3 => FanDirection::P3,
            4 => FanDirection::P4,
            6 => FanDirection::Stop,
            7 => FanDirection::Swing,
            _ => FanDirection::P0,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for FanDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FanDirection::P0 => "p0",
            FanDirection::P1 => "p1",
            FanDirection::P2 => "p2",
            FanDirection::P3 => "p3",
            FanDirection::P4 => "p4",
            FanDirection::Stop => "stop",
            FanDirection::Swing => "swing",
        })
    }
}

fn copy_words<const N: usize>(words: &[u16]) -> [u16; N] {
    let mut out = [0u16; N];
    let n = words.len().min(N);
    out[..n].copy_from_slice(&words[..n]);
    out
}

fn celsius_from_tenths(tenths: i32) -> f32 {
    tenths as f32 / 10.0
}

fn tenths_from_celsius(celsius: f32) -> i32 {
    // Half-away-from-zero, matching the adapter's own rounding.
    (celsius * 10.0).round() as i32
}

/// Adapter-wide status: initialisation flag and per-unit connection/error
/// bitmaps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatus {
    words: [u16; SYSTEM_STATUS_WORDS],
}

impl SystemStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_words(words: &[u16]) -> Self {
        Self {
            words: copy_words(words),
        }
    }

    pub fn words(&self) -> &[u16; SYSTEM_STATUS_WORDS] {
        &self.words
    }

    /// Whether the adapter has finished initialising its bus scan.
    pub fn initialized(&self) -> bool {
        codec::bit_get(&self.words, 0)
    }

    /// Whether another controller shares the indoor bus.
    pub fn other_controller_present(&self) -> bool {
        codec::bit_get(&self.words, 1)
    }

    /// Whether unit `index` is connected to the bus.
    pub fn unit_connected(&self, index: u8) -> bool {
        if index as usize >= MAX_UNITS {
            return false;
        }
        codec::bit_get(&self.words, 16 + u16::from(index))
    }

    /// Whether unit `index` is flagged as faulted in the bitmap.
    pub fn unit_error(&self, index: u8) -> bool {
        if index as usize >= MAX_UNITS {
            return false;
        }
        codec::bit_get(&self.words, 80 + u16::from(index))
    }
}

/// Static capabilities reported per unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitCapability {
    words: [u16; UNIT_CAPABILITY_WORDS],
}

impl UnitCapability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_words(words: &[u16]) -> Self {
        Self {
            words: copy_words(words),
        }
    }

    pub fn words(&self) -> &[u16; UNIT_CAPABILITY_WORDS] {
        &self.words
    }

    pub fn supports_fan_mode(&self) -> bool {
        codec::bit_get(&self.words, 0)
    }

    pub fn supports_cool(&self) -> bool {
        codec::bit_get(&self.words, 1)
    }

    pub fn supports_heat(&self) -> bool {
        codec::bit_get(&self.words, 2)
    }

    pub fn supports_auto(&self) -> bool {
        codec::bit_get(&self.words, 3)
    }

    pub fn supports_dry(&self) -> bool {
        codec::bit_get(&self.words, 4)
    }

    pub fn supports_fan_direction(&self) -> bool {
        codec::bit_get(&self.words, 11)
    }

    pub fn supports_fan_speed(&self) -> bool {
        codec::bit_get(&self.words, 15)
    }

    /// Number of louvre direction steps the unit offers.
    pub fn fan_direction_steps(&self) -> u8 {
        codec::uint_get(&self.words, 8, 3) as u8
    }

    /// Number of fan speed steps the unit offers.
    pub fn fan_speed_steps(&self) -> u8 {
        codec::uint_get(&self.words, 12, 3) as u8
    }

    /// Upper cooling setpoint bound in °C.
    pub fn cool_setpoint_upper(&self) -> i8 {
        codec::sint_get(&self.words, 16, 8) as i8
    }

    /// Lower cooling setpoint bound in °C.
    pub fn cool_setpoint_lower(&self) -> i8 {
        codec::sint_get(&self.words, 24, 8) as i8
    }

    /// Upper heating setpoint bound in °C.
    pub fn heat_setpoint_upper(&self) -> i8 {
        codec::sint_get(&self.words, 32, 8) as i8
    }

    /// Lower heating setpoint bound in °C.
    pub fn heat_setpoint_lower(&self) -> i8 {
        codec::sint_get(&self.words, 40, 8) as i8
    }
}

/// Live unit state as read from the input table.
///
/// The setters stage operator intent on the cached view between
/// `prepare_write` and `commit_write`; they never touch the bus themselves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStatus {
    words: [u16; UNIT_STATUS_WORDS],
}

impl UnitStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_words(words: &[u16]) -> Self {
        Self {
            words: copy_words(words),
        }
    }

    pub fn words(&self) -> &[u16; UNIT_STATUS_WORDS] {
        &self.words
    }

    pub fn power(&self) -> bool {
        codec::bit_get(&self.words, 0)
    }

    pub fn set_power(&mut self, on: bool) {
        codec::bit_set(&mut self.words, 0, on);
    }

    pub fn fan_direction(&self) -> FanDirection {
        FanDirection::from_u8(codec::uint_get(&self.words, 8, 3) as u8)
    }

    pub fn set_fan_direction(&mut self, direction: FanDirection) {
        codec::uint_set(&mut self.words, 8, 3, u32::from(direction.to_u8()));
    }

    pub fn fan_speed(&self) -> FanSpeed {
        FanSpeed::from_u8(codec::uint_get(&self.words, 12, 3) as u8)
    }

    pub fn set_fan_speed(&mut self, speed: FanSpeed) {
        codec::uint_set(&mut self.words, 12, 3, u32::from(speed.to_u8()));
    }

    /// Commanded operating mode.
    pub fn mode(&self) -> OperatingMode {
        OperatingMode::from_u8(codec::uint_get(&self.words, 16, 4) as u8)
    }

    pub fn set_mode(&mut self, mode: OperatingMode) {
        codec::uint_set(&mut self.words, 16, 4, u32::from(mode.to_u8()));
    }

    /// Non-zero filter counter means the filter warning is raised.
    pub fn filter_warning(&self) -> bool {
        codec::uint_get(&self.words, 20, 4) != 0
    }

    /// Mode the unit is actually running in right now. Observed only; the
    /// holding table has no counterpart field.
    pub fn current_mode(&self) -> OperatingMode {
        OperatingMode::from_u8(codec::uint_get(&self.words, 24, 4) as u8)
    }

    /// Temperature setpoint in °C.
    pub fn setpoint_celsius(&self) -> f32 {
        celsius_from_tenths(codec::sint_get(&self.words, 32, 16))
    }

    pub fn set_setpoint_celsius(&mut self, celsius: f32) {
        codec::sint_set(&mut self.words, 32, 16, tenths_from_celsius(celsius));
    }

    /// Measured room temperature in °C.
    pub fn current_temperature_celsius(&self) -> f32 {
        celsius_from_tenths(codec::sint_get(&self.words, 64, 16))
    }
}

/// Writeable shadow of a unit's holding registers.
///
/// Layout mirrors the first three status words for power/fan/mode/setpoint,
/// plus two command fields with no status counterpart: fan-control enable
/// (bits 4..7, value 6) and filter reset (bits 20..23, value 15).
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitHolding {
    words: [u16; UNIT_HOLDING_WORDS],
    dirty: bool,
    last_read: Option<Instant>,
    last_write: Option<Instant>,
}

impl UnitHolding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn words(&self) -> &[u16; UNIT_HOLDING_WORDS] {
        &self.words
    }

    /// Overwrite the shadow words with freshly read register contents.
    ///
    /// Timestamps and the dirty flag are left alone; callers stamp the read
    /// via [`UnitHolding::mark_read`].
    pub fn load_words(&mut self, words: &[u16]) {
        self.words = copy_words(words);
    }

    /// Whether the shadow carries staged changes not yet written out.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether the shadow has never been loaded from the adapter.
    pub fn never_read(&self) -> bool {
        self.last_read.is_none()
    }

    pub fn mark_read(&mut self, now: Instant) {
        self.last_read = Some(now);
    }

    /// Record a successful flush: the shadow and the adapter agree again.
    pub fn mark_written(&mut self, now: Instant) {
        self.last_write = Some(now);
        self.dirty = false;
    }

    pub fn read_within(&self, now: Instant, window: Duration) -> bool {
        match self.last_read {
            Some(at) => now.duration_since(at) < window,
            None => false,
        }
    }

    pub fn write_within(&self, now: Instant, window: Duration) -> bool {
        match self.last_write {
            Some(at) => now.duration_since(at) < window,
            None => false,
        }
    }

    pub fn power(&self) -> bool {
        codec::bit_get(&self.words, 0)
    }

    pub fn set_power(&mut self, on: bool) {
        self.dirty |= codec::bit_set(&mut self.words, 0, on);
    }

    pub fn mode(&self) -> OperatingMode {
        OperatingMode::from_u8(codec::uint_get(&self.words, 16, 4) as u8)
    }

    pub fn set_mode(&mut self, mode: OperatingMode) {
        self.dirty |= codec::uint_set(&mut self.words, 16, 4, u32::from(mode.to_u8()));
    }

    pub fn setpoint_celsius(&self) -> f32 {
        celsius_from_tenths(codec::sint_get(&self.words, 32, 16))
    }

    pub fn set_setpoint_celsius(&mut self, celsius: f32) {
        self.dirty |= codec::sint_set(&mut self.words, 32, 16, tenths_from_celsius(celsius));
    }

    pub fn fan_speed(&self) -> FanSpeed {
        FanSpeed::from_u8(codec::uint_get(&self.words, 12, 3) as u8)
    }

    /// Stage a fan speed. The adapter ignores fan fields unless the
    /// fan-control enable nibble holds 6, so that is raised too.
    pub fn set_fan_speed(&mut self, speed: FanSpeed) {
        self.dirty |= codec::uint_set(&mut self.words, 12, 3, u32::from(speed.to_u8()));
        self.set_fan_control_enabled(true);
    }

    pub fn fan_direction(&self) -> FanDirection {
        FanDirection::from_u8(codec::uint_get(&self.words, 8, 3) as u8)
    }

    /// Stage a louvre direction; raises fan-control enable like
    /// [`UnitHolding::set_fan_speed`].
    pub fn set_fan_direction(&mut self, direction: FanDirection) {
        self.dirty |= codec::uint_set(&mut self.words, 8, 3, u32::from(direction.to_u8()));
        self.set_fan_control_enabled(true);
    }

    pub fn fan_control_enabled(&self) -> bool {
        codec::uint_get(&self.words, 4, 4) == 6
    }

    pub fn set_fan_control_enabled(&mut self, enabled: bool) {
        let value = if enabled { 6 } else { 0 };
        self.dirty |= codec::uint_set(&mut self.words, 4, 4, value);
    }

    pub fn filter_reset(&self) -> bool {
        codec::uint_get(&self.words, 20, 4) != 0
    }

    /// Stage the filter reset command nibble: 15 asserts, 0 releases. The
    /// adapter latches the reset on the 15→0 transition, so a reset is
    /// always two writes.
    pub fn set_filter_reset(&mut self, asserted: bool) {
        let value = if asserted { 15 } else { 0 };
        self.dirty |= codec::uint_set(&mut self.words, 20, 4, value);
    }

    /// Fold the live status values into the shadow.
    ///
    /// Copies power, fan direction, fan speed, commanded mode and setpoint;
    /// filter-reset and fan-control enable keep whatever the shadow holds
    /// (fan-control enable is raised as a side effect of the fan setters).
    /// Dirty flips only if some field actually differed.
    pub fn sync_from_status(&mut self, status: &UnitStatus) {
        self.set_power(status.power());
        self.set_fan_direction(status.fan_direction());
        self.set_fan_speed(status.fan_speed());
        self.set_mode(status.mode());
        self.set_setpoint_celsius(status.setpoint_celsius());
    }
}

/// Decoded error report of a unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitError {
    words: [u16; UNIT_ERROR_WORDS],
}

impl UnitError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_words(words: &[u16]) -> Self {
        Self {
            words: copy_words(words),
        }
    }

    pub fn words(&self) -> &[u16; UNIT_ERROR_WORDS] {
        &self.words
    }

    /// Two-character manufacturer error code, e.g. "A3".
    pub fn code(&self) -> String {
        let c0 = codec::uint_get(&self.words, 0, 8) as u8 as char;
        let c1 = codec::uint_get(&self.words, 8, 8) as u8 as char;
        format!("{c0}{c1}")
    }

    pub fn subcode(&self) -> u8 {
        codec::uint_get(&self.words, 16, 6) as u8
    }

    pub fn is_error(&self) -> bool {
        codec::bit_get(&self.words, 24)
    }

    pub fn is_alarm(&self) -> bool {
        codec::bit_get(&self.words, 25)
    }

    pub fn is_warning(&self) -> bool {
        codec::bit_get(&self.words, 26)
    }

    pub fn unit_number(&self) -> u8 {
        codec::uint_get(&self.words, 28, 4) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_status_bitmaps() {
        // Adapter initialised + other controller, unit 0 connected, unit 0
        // flagged faulted.
        let status =
            SystemStatus::from_words(&[0x0003, 0x0001, 0, 0, 0, 0x0001, 0, 0, 0]);
        assert!(status.initialized());
        assert!(status.other_controller_present());
        assert!(status.unit_connected(0));
        assert!(!status.unit_connected(1));
        assert!(status.unit_error(0));
        assert!(!status.unit_error(1));
        assert!(!status.unit_connected(64));
    }

    #[test]
    fn test_status_accessors() {
        // Power on, mode COOL, setpoint +23.5 °C.
        let mut words = [0u16; UNIT_STATUS_WORDS];
        words[0] = 0x0001;
        words[1] = 0x0002;
        words[2] = 235;
        let status = UnitStatus::from_words(&words);
        assert!(status.power());
        assert_eq!(status.mode(), OperatingMode::Cool);
        assert_eq!(status.setpoint_celsius(), 23.5);
        assert!(!status.filter_warning());
    }

    #[test]
    fn test_status_negative_temperature() {
        let mut status = UnitStatus::new();
        status.set_setpoint_celsius(-5.5);
        assert_eq!(status.words()[2], 0x8000 | 55);
        assert_eq!(status.setpoint_celsius(), -5.5);
    }

    #[test]
    fn test_setpoint_rounding_is_half_away_from_zero() {
        let mut status = UnitStatus::new();
        status.set_setpoint_celsius(22.25);
        assert_eq!(status.setpoint_celsius(), 22.3);
        status.set_setpoint_celsius(-22.25);
        assert_eq!(status.setpoint_celsius(), -22.3);
    }

    #[test]
    fn test_capability_decoding() {
        let mut words = [0u16; UNIT_CAPABILITY_WORDS];
        // fan + cool + heat + auto, 3 direction steps, 5 speed steps,
        // direction and speed control available.
        words[0] = 0x000F | (3 << 8) | (1 << 11) | (5 << 12) | (1 << 15);
        // cool bounds 32 / 16 °C, heat bounds 30 / -10 °C.
        words[1] = 32 | (16 << 8);
        words[2] = 30 | ((0x80 | 10) << 8);
        let cap = UnitCapability::from_words(&words);
        assert!(cap.supports_fan_mode());
        assert!(cap.supports_cool());
        assert!(cap.supports_heat());
        assert!(cap.supports_auto());
        assert!(!cap.supports_dry());
        assert!(cap.supports_fan_direction());
        assert!(cap.supports_fan_speed());
        assert_eq!(cap.fan_direction_steps(), 3);
        assert_eq!(cap.fan_speed_steps(), 5);
        assert_eq!(cap.cool_setpoint_upper(), 32);
        assert_eq!(cap.cool_setpoint_lower(), 16);
        assert_eq!(cap.heat_setpoint_upper(), 30);
        assert_eq!(cap.heat_setpoint_lower(), -10);
    }

    #[test]
    fn test_holding_dirty_precision() {
        let mut holding = UnitHolding::new();
        assert!(!holding.is_dirty());

        holding.set_power(false); // already off
        assert!(!holding.is_dirty());

        holding.set_power(true);
        assert!(holding.is_dirty());

        holding.mark_written(Instant::now());
        assert!(!holding.is_dirty());

        holding.set_power(true); // unchanged again
        assert!(!holding.is_dirty());
    }

    #[test]
    fn test_holding_fan_setters_raise_control_enable() {
        let mut holding = UnitHolding::new();
        holding.set_fan_speed(FanSpeed::High);
        assert_eq!(holding.fan_speed(), FanSpeed::High);
        assert!(holding.fan_control_enabled());
        assert_eq!(holding.words()[0] >> 4 & 0xF, 6);
        assert!(holding.is_dirty());
    }

    #[test]
    fn test_holding_filter_reset_nibble() {
        let mut holding = UnitHolding::new();
        holding.set_filter_reset(true);
        assert!(holding.filter_reset());
        assert_eq!(holding.words()[1] >> 4 & 0xF, 15);
        holding.set_filter_reset(false);
        assert!(!holding.filter_reset());
        assert_eq!(holding.words()[1] >> 4 & 0xF, 0);
    }

    #[test]
    fn test_sync_from_status() {
        let mut words = [0u16; UNIT_STATUS_WORDS];
        words[0] = 0x0001 | (2 << 8) | (3 << 12); // power, dir P2, speed medium
        words[1] = 0x0002; // mode cool
        words[2] = 235;
        let status = UnitStatus::from_words(&words);

        let mut holding = UnitHolding::new();
        holding.sync_from_status(&status);
        assert!(holding.is_dirty());
        assert!(holding.power());
        assert_eq!(holding.fan_direction(), FanDirection::P2);
        assert_eq!(holding.fan_speed(), FanSpeed::Medium);
        assert_eq!(holding.mode(), OperatingMode::Cool);
        assert_eq!(holding.setpoint_celsius(), 23.5);
        // The fan setters raised the enable nibble during sync.
        assert!(holding.fan_control_enabled());

        // Syncing again from the same status changes nothing.
        holding.mark_written(Instant::now());
        holding.sync_from_status(&status);
        assert!(!holding.is_dirty());
    }

    #[test]
    fn test_sync_does_not_touch_filter_reset() {
        let status = UnitStatus::new();
        let mut holding = UnitHolding::new();
        holding.set_filter_reset(true);
        holding.sync_from_status(&status);
        assert!(holding.filter_reset());
    }

    #[test]
    fn test_cache_windows() {
        let mut holding = UnitHolding::new();
        assert!(holding.never_read());
        let t0 = Instant::now();
        holding.mark_read(t0);
        assert!(!holding.never_read());
        assert!(holding.read_within(t0 + Duration::from_secs(10), Duration::from_secs(35)));
        assert!(!holding.read_within(t0 + Duration::from_secs(40), Duration::from_secs(35)));
        assert!(!holding.write_within(t0, Duration::from_secs(35)));
        holding.mark_written(t0);
        assert!(holding.write_within(t0 + Duration::from_secs(1), Duration::from_secs(35)));
    }

    #[test]
    fn test_unit_error_decoding() {
        let mut words = [0u16; UNIT_ERROR_WORDS];
        words[0] = u16::from(b'A') | (u16::from(b'3') << 8);
        words[1] = 0x0005 | (1 << 8) | (1 << 10) | (7 << 12);
        let error = UnitError::from_words(&words);
        assert_eq!(error.code(), "A3");
        assert_eq!(error.subcode(), 5);
        assert!(error.is_error());
        assert!(!error.is_alarm());
        assert!(error.is_warning());
        assert_eq!(error.unit_number(), 7);
    }

    #[test]
    fn test_region_addresses() {
        assert_eq!(capability_address(0), 1000);
        assert_eq!(capability_address(5), 1015);
        assert_eq!(status_address(5), 2030);
        assert_eq!(holding_address(5), 2015);
        assert_eq!(error_address(5), 3610);
    }
}
