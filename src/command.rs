use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::bus::{Bus, Names};

pub const TAKEOFF_ALTITUDE: f64 = 1.0;
pub const LAND_ALTITUDE: f64 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    FlightMode,
    Arming,
}

/// One operator control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Manual,
    Stabilized,
    Offboard,
    Hold,
    Arm,
    Disarm,
    Takeoff,
    Land,
}

impl Command {
    /// Controls in display order: the flight-mode row, then the arming row.
    pub const ALL: [Command; 8] = [
        Command::Manual,
        Command::Stabilized,
        Command::Offboard,
        Command::Hold,
        Command::Arm,
        Command::Disarm,
        Command::Takeoff,
        Command::Land,
    ];

    pub fn group(self) -> Group {
        match self {
            Command::Manual | Command::Stabilized | Command::Offboard | Command::Hold => {
                Group::FlightMode
            }
            Command::Arm | Command::Disarm | Command::Takeoff | Command::Land => Group::Arming,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Command::Manual => "Manual",
            Command::Stabilized => "Stabilized",
            Command::Offboard => "Offboard",
            Command::Hold => "Hold",
            Command::Arm => "Arm",
            Command::Disarm => "Disarm",
            Command::Takeoff => "Takeoff",
            Command::Land => "Land",
        }
    }

    pub fn in_group(group: Group) -> impl Iterator<Item = Command> {
        Self::ALL.into_iter().filter(move |c| c.group() == group)
    }

    pub fn request(self) -> ServiceRequest {
        match self {
            Command::Manual => ServiceRequest::SetMode(SetModeRequest::new("MANUAL")),
            Command::Stabilized => ServiceRequest::SetMode(SetModeRequest::new("STABILIZED")),
            Command::Offboard => ServiceRequest::SetMode(SetModeRequest::new("OFFBOARD")),
            Command::Hold => ServiceRequest::SetMode(SetModeRequest::new("HOLD")),
            Command::Arm => ServiceRequest::Arming(ArmingRequest { value: true }),
            Command::Disarm => ServiceRequest::Arming(ArmingRequest { value: false }),
            Command::Takeoff => ServiceRequest::Takeoff(AltitudeRequest {
                altitude: TAKEOFF_ALTITUDE,
            }),
            Command::Land => ServiceRequest::Land(AltitudeRequest {
                altitude: LAND_ALTITUDE,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetModeRequest {
    pub custom_mode: String,
}

impl SetModeRequest {
    fn new(mode: &str) -> Self {
        Self {
            custom_mode: mode.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArmingRequest {
    pub value: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AltitudeRequest {
    pub altitude: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServiceRequest {
    SetMode(SetModeRequest),
    Arming(ArmingRequest),
    Takeoff(AltitudeRequest),
    Land(AltitudeRequest),
}

impl ServiceRequest {
    pub fn service<'a>(&self, names: &'a Names) -> &'a str {
        match self {
            ServiceRequest::SetMode(_) => &names.set_mode,
            ServiceRequest::Arming(_) => &names.arming,
            ServiceRequest::Takeoff(_) => &names.takeoff,
            ServiceRequest::Land(_) => &names.land,
        }
    }

    pub fn body(&self) -> Result<Value> {
        let body = match self {
            ServiceRequest::SetMode(r) => serde_json::to_value(r)?,
            ServiceRequest::Arming(r) => serde_json::to_value(r)?,
            ServiceRequest::Takeoff(r) | ServiceRequest::Land(r) => serde_json::to_value(r)?,
        };
        Ok(body)
    }

    /// Decodes the reply with the schema that belongs to this request.
    pub fn decode(&self, response: Value) -> Result<ServiceResponse> {
        let decoded = match self {
            ServiceRequest::SetMode(_) => ServiceResponse::SetMode(serde_json::from_value(response)?),
            _ => ServiceResponse::Command(serde_json::from_value(response)?),
        };
        Ok(decoded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SetModeResponse {
    pub mode_sent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceResponse {
    SetMode(SetModeResponse),
    Command(CommandResponse),
}

impl ServiceResponse {
    /// The flag that says whether the controller took the command.
    pub fn accepted(&self) -> bool {
        match self {
            ServiceResponse::SetMode(r) => r.mode_sent,
            ServiceResponse::Command(r) => r.success,
        }
    }
}

/// Sends the service call behind `command` and waits for the reply.
///
/// `Err` means the call itself did not complete (transport failure, timeout
/// or an unreadable reply); a rejected command is `Ok` with
/// `accepted() == false`.
pub async fn dispatch<B: Bus>(bus: &B, names: &Names, command: Command) -> Result<ServiceResponse> {
    let request = command.request();
    let service = request.service(names);
    info!("Dispatching {} via {}", command.label(), service);

    let outcome: Result<ServiceResponse> = async {
        let reply = bus.call(service, request.body()?).await?;
        request
            .decode(reply)
            .with_context(|| format!("Unexpected response from {}", service))
    }
    .await;

    match &outcome {
        Ok(response) => info!(
            "{} {}",
            command.label(),
            if response.accepted() { "accepted" } else { "rejected" }
        ),
        Err(e) => error!("{} failed: {:#}", command.label(), e),
    }
    outcome
}
