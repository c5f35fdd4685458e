//! Feature layout and extraction
//!
//! The layout table below is the single source of truth for the model's
//! input vector. The order is part of the trained contract: changing it
//! invalidates both the persisted weights and the scaler.

use crate::models::TelemetryRecord;

/// Total number of input features
pub const FEATURE_COUNT: usize = 12;

/// Feature names in the exact order they appear in the vector
pub const FEATURE_LAYOUT: [&str; FEATURE_COUNT] = [
    "timestamp",       // 0: header timestamp
    "velocity_gnss",   // 1: GNSS velocity
    "longitude",       // 2: current position
    "latitude",        // 3: current position
    "elevation",       // 4: current position
    "heading",         // 5: heading angle
    "tap_pos",         // 6: throttle pedal position
    "steering_angle",  // 7: steering wheel angle
    "engine_torque",   // 8: engine torque
    "timestamp_gnss",  // 9: GNSS timestamp
    "message_id",      // 10: message id
    "pass_points_num", // 11: waypoint count
];

/// Flatten a telemetry record into the model's input vector, returning the
/// features together with the vehicle id they describe.
pub fn extract(record: &TelemetryRecord) -> ([f32; FEATURE_COUNT], &str) {
    let header = &record.header;
    let body = &record.body;

    let features = [
        header.timestamp as f32,
        body.velocity_gnss as f32,
        body.position.longitude as f32,
        body.position.latitude as f32,
        body.position.elevation as f32,
        body.heading as f32,
        body.tap_pos as f32,
        body.steering_angle as f32,
        body.engine_torque as f32,
        body.timestamp_gnss as f32,
        body.message_id as f32,
        body.pass_points_num as f32,
    ];

    (features, &body.vehicle_id)
}
