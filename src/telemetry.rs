use anyhow::{anyhow, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

static TELEMETRY: OnceCell<Telemetry> = OnceCell::new();

/// Flight mode and arming status as last reported by the flight controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    pub mode: String,
    pub armed: bool,
}

/// Battery report. A field the controller did not fill in stays `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatteryState {
    #[serde(default)]
    pub voltage: Option<f64>,
    #[serde(default)]
    pub current: Option<f64>,
    #[serde(default)]
    pub charge: Option<f64>,
    #[serde(default)]
    pub percentage: Option<f64>,
}

/// Holds the last vehicle and battery message seen on the bus.
///
/// Writers replace the whole record behind an `Arc`, so a reader on another
/// thread gets either the old record or the new one, never a mix.
#[derive(Debug, Default)]
pub struct Telemetry {
    vehicle: RwLock<Option<Arc<VehicleState>>>,
    battery: RwLock<Option<Arc<BatteryState>>>,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide holder shared by the bus callbacks and the UI.
    pub fn instance() -> &'static Self {
        TELEMETRY.get_or_init(Self::new)
    }

    pub fn update_vehicle(&self, state: VehicleState) -> Result<()> {
        let mut slot = self
            .vehicle
            .write()
            .map_err(|e| anyhow!("Lock error: {}", e))?;
        *slot = Some(Arc::new(state));
        Ok(())
    }

    pub fn update_battery(&self, state: BatteryState) -> Result<()> {
        let mut slot = self
            .battery
            .write()
            .map_err(|e| anyhow!("Lock error: {}", e))?;
        *slot = Some(Arc::new(state));
        Ok(())
    }

    /// `Ok(None)` until the first vehicle message arrives.
    pub fn vehicle(&self) -> Result<Option<Arc<VehicleState>>> {
        let slot = self
            .vehicle
            .read()
            .map_err(|e| anyhow!("Lock error: {}", e))?;
        Ok(slot.clone())
    }

    /// `Ok(None)` until the first battery message arrives.
    pub fn battery(&self) -> Result<Option<Arc<BatteryState>>> {
        let slot = self
            .battery
            .read()
            .map_err(|e| anyhow!("Lock error: {}", e))?;
        Ok(slot.clone())
    }
}
