use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Inbound webhook update and command acknowledgement payloads.
pub mod command;
/// Game projections exposed to the transport.
pub mod game;
/// Health check payloads.
pub mod health;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
