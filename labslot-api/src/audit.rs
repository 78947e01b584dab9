use std::sync::Arc;

use tracing::info;

use crate::command::{ReservationData, ResourceData};

/// Audit logger for committed schedule changes.
///
/// Records go to the `audit` tracing target so they can be filtered or
/// routed separately from operational logs.
pub struct AuditLogger {
    enabled: bool,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self { enabled: true }
    }

    pub fn new_noop() -> Self {
        Self { enabled: false }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    // Resource events
    pub fn resource_registered(&self, resource: &ResourceData) {
        if self.enabled {
            info!(
                target: "audit",
                resource_id = %resource.id,
                name = %resource.name,
                "Resource registered: {} ({})",
                resource.name,
                resource.id
            );
        }
    }

    pub fn resource_removed(&self, resource_id: &str) {
        if self.enabled {
            info!(target: "audit", resource_id, "Resource removed: {}", resource_id);
        }
    }

    // Reservation events
    pub fn reservation_created(&self, reservation: &ReservationData) {
        if self.enabled {
            info!(
                target: "audit",
                reservation_id = reservation.id,
                resource_id = %reservation.resource_id,
                start = %reservation.start_time.to_rfc3339(),
                end = %reservation.end_time.to_rfc3339(),
                "Reservation created: {} on {}",
                reservation.id,
                reservation.resource_id
            );
        }
    }

    pub fn reservation_cancelled(&self, reservation: &ReservationData) {
        if self.enabled {
            info!(
                target: "audit",
                reservation_id = reservation.id,
                resource_id = %reservation.resource_id,
                "Reservation cancelled: {} on {}",
                reservation.id,
                reservation.resource_id
            );
        }
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

pub fn create_audit_logger(enabled: bool) -> Arc<AuditLogger> {
    if enabled {
        Arc::new(AuditLogger::new())
    } else {
        Arc::new(AuditLogger::new_noop())
    }
}
