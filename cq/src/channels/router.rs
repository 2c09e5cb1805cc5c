//! Chooses the channel for the next user message

use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

use crate::coordination::{Channel, OperationStatus, StatusTracker};

/// Where the next message goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteDecision {
    pub channel: Channel,
    pub interim_messages_reset: bool,
}

impl RouteDecision {
    pub fn main() -> Self {
        Self {
            channel: Channel::Main,
            interim_messages_reset: true,
        }
    }

    pub fn secondary() -> Self {
        Self {
            channel: Channel::Secondary,
            interim_messages_reset: false,
        }
    }
}

/// Routes on the main status, with a scan of the namespace as fallback
pub struct ChannelRouter {
    status: StatusTracker,
    cooldown: Duration,
}

impl ChannelRouter {
    pub fn new(status: StatusTracker, cooldown: Duration) -> Self {
        Self { status, cooldown }
    }

    /// Secondary while a main operation is in flight, main otherwise
    ///
    /// Routing to main waits out the cooldown after a completed operation
    /// and clears the completion flag.
    pub async fn route(&self) -> RouteDecision {
        debug!(namespace = %self.status.records().namespace(), "ChannelRouter::route: called");
        if self.status.is_processing(Channel::Main).await {
            debug!("ChannelRouter::route: main status is processing");
            return RouteDecision::secondary();
        }
        if self.running_record_present().await {
            debug!("ChannelRouter::route: found a running record in the namespace");
            return RouteDecision::secondary();
        }

        if let Some(flag) = self.status.read_completion().await {
            if flag.ready_for_new_operation {
                let elapsed = (Utc::now() - flag.timestamp).to_std().unwrap_or_default();
                if let Some(remaining) = self.cooldown.checked_sub(elapsed)
                    && !remaining.is_zero()
                {
                    info!(?remaining, "Waiting out cooldown after completed operation");
                    tokio::time::sleep(remaining).await;
                }
            }
            self.status.clear_completion().await;
        }
        RouteDecision::main()
    }

    /// Newest-first scan for any record whose `status` field says running
    async fn running_record_present(&self) -> bool {
        let running = Value::from(OperationStatus::Running.to_string());
        self.status
            .records()
            .scan()
            .await
            .iter()
            .rev()
            .any(|item| item.value.get("status") == Some(&running))
    }
}
