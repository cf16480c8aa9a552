//! Metric names recorded by the broker.

/// Rooms created (counter).
pub const ROOMS_CREATED_TOTAL: &str = "rmx_rooms_created_total";
/// Live rooms (gauge).
pub const ROOMS_ACTIVE: &str = "rmx_rooms_active";
/// Connections admitted into a room (counter).
pub const CONNECTIONS_ADMITTED_TOTAL: &str = "rmx_connections_admitted_total";
/// Live room members (gauge).
pub const CONNECTIONS_ACTIVE: &str = "rmx_connections_active";
/// Admissions refused because the room was full or closed (counter).
pub const ADMISSIONS_REJECTED_TOTAL: &str = "rmx_admissions_rejected_total";
/// Frames fanned out by rooms (counter).
pub const BROADCAST_FRAMES_TOTAL: &str = "rmx_broadcast_frames_total";
/// Per-member deliveries that failed (counter).
pub const DELIVERY_FAILURES_TOTAL: &str = "rmx_delivery_failures_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_are_prefixed_snake_case() {
        let names = [
            ROOMS_CREATED_TOTAL,
            ROOMS_ACTIVE,
            CONNECTIONS_ADMITTED_TOTAL,
            CONNECTIONS_ACTIVE,
            ADMISSIONS_REJECTED_TOTAL,
            BROADCAST_FRAMES_TOTAL,
            DELIVERY_FAILURES_TOTAL,
        ];
        for name in names {
            assert!(name.starts_with("rmx_"));
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
