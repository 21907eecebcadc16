use anyhow::Result;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{info, warn};

use crate::bus::{Bus, Handler, Names};
use crate::telemetry::{BatteryState, Telemetry, VehicleState};

/// Subscribes the vehicle-state and battery handlers. Each message replaces
/// the stored record; undecodable messages are logged and dropped.
pub async fn attach<B: Bus>(bus: &B, names: &Names, telemetry: &'static Telemetry) -> Result<()> {
    bus.subscribe(
        &names.state,
        handler(names.state.clone(), move |state: VehicleState| {
            telemetry.update_vehicle(state)
        }),
    )
    .await?;

    bus.subscribe(
        &names.battery,
        handler(names.battery.clone(), move |state: BatteryState| {
            telemetry.update_battery(state)
        }),
    )
    .await?;

    info!("Telemetry ingestion attached");
    Ok(())
}

fn handler<T, F>(topic: String, store: F) -> Handler
where
    T: DeserializeOwned,
    F: Fn(T) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(move |payload: &[u8]| match serde_json::from_slice::<T>(payload) {
        Ok(message) => {
            if let Err(e) = store(message) {
                warn!("Failed to store message from {}: {}", topic, e);
            }
        }
        Err(e) => warn!("Dropping undecodable message on {}: {}", topic, e),
    })
}
