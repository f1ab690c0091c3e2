//! One-shot digital inputs (calibration request, confirm)

use tracing::{info, warn};

use crate::bridge::Bridge;
use crate::message::Message;
use crate::runtime::{ActionHandle, Runtime};

/// A watched digital action
#[derive(Debug, Clone)]
pub struct DigitalBinding {
    pub action: ActionHandle,
    pub path: String,
    /// Event name sent to the server; unnamed actions are read and discarded
    pub event: Option<String>,
}

/// Emits a named event on each rising edge of a watched action
#[derive(Debug, Clone, Default)]
pub struct DigitalEventWatch {
    bindings: Vec<DigitalBinding>,
}

impl DigitalEventWatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watch(&mut self, action: ActionHandle, path: &str, event: Option<String>) {
        self.bindings.push(DigitalBinding {
            action,
            path: path.to_string(),
            event,
        });
    }

    pub fn bindings(&self) -> &[DigitalBinding] {
        &self.bindings
    }

    /// Inspect every watched action once, returns the number of events sent
    pub fn poll(&self, runtime: &dyn Runtime, bridge: &mut dyn Bridge) -> usize {
        let mut sent = 0;
        for binding in &self.bindings {
            let data = match runtime.digital_action(binding.action) {
                Ok(data) => data,
                Err(e) => {
                    warn!(action = %binding.path, error = %e, "Failed to read digital action");
                    continue;
                }
            };

            if !(data.changed && data.state) {
                continue;
            }

            if let Some(name) = &binding.event {
                info!(action = %binding.path, event = %name, "Sending user action");
                bridge.send_message(Message::UserAction { name: name.clone() });
                sent += 1;
            }
        }
        sent
    }
}
