//! Telemetry record - the request body of `/detect-anomaly/`
//!
//! Field names mirror the vehicle gateway's JSON schema. All fields are
//! required except `ext` and `passPoints`, which default to empty.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One telemetry message: protocol header plus vehicle state body.
/// Immutable once received; lives for the duration of one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub header: Header,
    pub body: Body,
}

/// Protocol control fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub ctl: i64,
    pub data_category: i64,
    pub data_len: i64,
    pub prefix: i64,
    pub timestamp: i64,
    pub ver: i64,
}

/// Current vehicle position.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub elevation: i64,
    pub latitude: f64,
    pub longitude: f64,
}

/// Route destination coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// Vehicle state fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    pub dest_location: DestLocation,
    pub engine_torque: i64,
    /// Free-form extension map, may be absent.
    #[serde(default)]
    pub ext: HashMap<String, serde_json::Value>,
    pub heading: f64,
    pub message_id: i64,
    /// Route waypoints, may be absent.
    #[serde(default)]
    pub pass_points: Vec<serde_json::Value>,
    pub pass_points_num: i64,
    pub position: Position,
    pub steering_angle: i64,
    pub tap_pos: i64,
    #[serde(rename = "timestampGNSS")]
    pub timestamp_gnss: i64,
    pub vehicle_id: String,
    #[serde(rename = "velocityGNSS")]
    pub velocity_gnss: f64,
}

#[cfg(test)]
pub(crate) fn zero_record(vehicle_id: &str) -> TelemetryRecord {
    TelemetryRecord {
        header: Header {
            ctl: 0,
            data_category: 0,
            data_len: 0,
            prefix: 0,
            timestamp: 0,
            ver: 0,
        },
        body: Body {
            dest_location: DestLocation {
                latitude: 0.0,
                longitude: 0.0,
            },
            engine_torque: 0,
            ext: HashMap::new(),
            heading: 0.0,
            message_id: 0,
            pass_points: Vec::new(),
            pass_points_num: 0,
            position: Position {
                elevation: 0,
                latitude: 0.0,
                longitude: 0.0,
            },
            steering_angle: 0,
            tap_pos: 0,
            timestamp_gnss: 0,
            vehicle_id: vehicle_id.to_string(),
            velocity_gnss: 0.0,
        },
    }
}
