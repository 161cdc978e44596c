//! End-of-run notification to a Microsoft Teams webhook.

use log::{info, warn};
use serde_json::json;

use crate::{error::RunError, procedure::RunOutcome};

/// Compose the message posted at the end of a run.
///
/// Covers both runs that executed, whatever their outcome, and runs that
/// failed before the first coordinate could be measured.
pub fn run_message(
    light_engine_id: &str,
    channel: usize,
    result: Result<&RunOutcome, &RunError>,
) -> String {
    let status = match result {
        Ok(RunOutcome::Completed) => "completed".to_string(),
        Ok(RunOutcome::Cancelled) => "was cancelled".to_string(),
        Ok(RunOutcome::Failed(err)) => format!("failed: {err}"),
        Err(err) => format!("could not start: {err}"),
    };
    format!("Characterization of {light_engine_id} channel {channel} {status}.")
}

/// Posts a plain-text message to an incoming-webhook URL.
///
/// Delivery failures are logged and swallowed; the notification must never
/// change the outcome of the run it reports on.
pub struct TeamsNotifier {
    webhook_url: String,
}

impl TeamsNotifier {
    /// Create a notifier for the given incoming-webhook URL.
    pub fn new(webhook_url: impl Into<String>) -> Self {
        TeamsNotifier {
            webhook_url: webhook_url.into(),
        }
    }

    /// Post a text message.
    pub fn send(&self, text: &str) {
        match ureq::post(&self.webhook_url).send_json(json!({ "text": text })) {
            Ok(_) => info!("notification delivered"),
            Err(err) => warn!("could not deliver notification: {err}"),
        }
    }
}
