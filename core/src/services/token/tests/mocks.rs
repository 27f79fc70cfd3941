//! Test doubles for rotation service tests

use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::events::ReuseAlert;
use crate::services::token::SecurityAlertSink;

/// Alert sink that records every published alert
pub struct CapturingAlertSink {
    alerts: Mutex<Vec<ReuseAlert>>,
}

impl CapturingAlertSink {
    pub fn new() -> Self {
        Self {
            alerts: Mutex::new(Vec::new()),
        }
    }

    pub fn alerts(&self) -> Vec<ReuseAlert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SecurityAlertSink for CapturingAlertSink {
    async fn publish(&self, alert: ReuseAlert) {
        self.alerts.lock().unwrap().push(alert);
    }
}
