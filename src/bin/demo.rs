//! End-to-end demo against the in-memory register bank.
//!
//! Seeds a synthetic two-unit fleet, runs discovery, lists the units and
//! walks one of them through a few operator commands. Useful as a smoke test
//! and as a reference for wiring the gateway into a host:
//!
//! ```bash
//! cargo run --bin demo
//! ```

use d3net_gateway::{
    EventLogger, FanSpeed, Gateway, GatewayConfig, GatewayResult, OperatingMode, RegisterBank,
    RegisterKind, SharedGateway,
};

/// Stage one healthy unit in the bank's input and holding tables.
fn seed_unit(bank: &RegisterBank, index: u16) -> GatewayResult<()> {
    // fan/cool/heat/auto capable, 5 fan steps, cool 32..16 °C, heat 30..10 °C.
    let capability = [
        0x000F | (3 << 8) | (1 << 11) | (5 << 12) | (1 << 15),
        32 | (16 << 8),
        30 | (10 << 8),
    ];
    // Powered on, fan medium, cooling to 22.0 °C, room at 24.5 °C.
    let status = [0x0001 | (3 << 12), 0x0002, 220, 0, 245, 0];
    let holding = [0x0001 | (3 << 12) | (6 << 4), 0x0002, 220];

    bank.write(RegisterKind::Input, 1000 + 3 * index, &capability)?;
    bank.write(RegisterKind::Input, 2000 + 6 * index, &status)?;
    bank.write(RegisterKind::Holding, 2000 + 3 * index, &holding)?;
    Ok(())
}

#[tokio::main]
async fn main() -> GatewayResult<()> {
    let bank = RegisterBank::new();

    // Adapter initialised, units 0 and 17 connected.
    let mut system = [0u16; 9];
    system[0] = 0x0001;
    system[1] = 0x0001;
    system[2] = 0x0002;
    bank.write(RegisterKind::Input, 0, &system)?;
    seed_unit(&bank, 0)?;
    seed_unit(&bank, 17)?;

    let gateway = Gateway::new(Box::new(bank), GatewayConfig::default())
        .with_events(EventLogger::console());
    let shared = SharedGateway::new(gateway);

    let mut gateway = shared.lock_write().await?;
    let count = gateway.discover_units().await?;
    println!("\ndiscovered {count} units:");
    for unit in gateway.unit_summaries() {
        println!(
            "  {}: power={} mode={} setpoint={:.1}°C room={:.1}°C fan={}",
            unit.id, unit.power, unit.mode, unit.setpoint_c, unit.current_temperature_c,
            unit.fan_speed
        );
    }

    println!("\nsetting unit 1-00 to heat at 21.0 °C, fan high...");
    gateway.set_mode(0, OperatingMode::Heat).await?;
    gateway.set_setpoint(0, 21.0).await?;
    gateway.set_fan_speed(0, FanSpeed::High).await?;

    let unit = gateway.unit(0)?;
    println!(
        "unit {} now: mode={} setpoint={:.1}°C fan={}",
        unit.id,
        unit.status.mode(),
        unit.status.setpoint_celsius(),
        unit.status.fan_speed()
    );

    println!(
        "\nregistered-unit snapshot: {}",
        gateway.registered_units().to_json()?
    );
    Ok(())
}
