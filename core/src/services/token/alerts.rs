//! Security alert sink for reuse detections.
//!
//! The engine publishes a [`ReuseAlert`] whenever a non-active token is
//! presented. What happens to the alert is a deployment concern: the
//! default sink emits a structured log line on the `security` target,
//! and production wiring can swap in a sink that feeds a SIEM or pager.

use async_trait::async_trait;
use tracing::warn;

use crate::domain::events::ReuseAlert;

/// Destination for security-classified events
#[async_trait]
pub trait SecurityAlertSink: Send + Sync {
    /// Deliver one alert. Implementations must not fail the caller:
    /// delivery problems are theirs to log and absorb.
    async fn publish(&self, alert: ReuseAlert);
}

/// Default sink logging alerts on the `security` target
pub struct TracingAlertSink;

#[async_trait]
impl SecurityAlertSink for TracingAlertSink {
    async fn publish(&self, alert: ReuseAlert) {
        warn!(
            target: "security",
            event = alert.event_type(),
            user_id = %alert.user_id,
            device_id = %alert.device_id,
            family_id = %alert.family_id,
            jti = %alert.jti,
            "refresh token reuse detected; family revoked"
        );
    }
}
