//! Receipt gating and read-receipt debouncing.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::protocol::{ReceiptEvent, ReceiptType};

/// Default minimum interval between forwarded self read receipts per chat.
pub const DEFAULT_READ_COOLDOWN: Duration = Duration::from_secs(15);

/// What to do with a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptVerdict {
    Forward,
    /// Sent by a linked (non-primary) device.
    SkipLinkedDevice,
    /// Own read receipt inside the cooldown window for its chat.
    Debounced,
}

impl ReceiptVerdict {
    pub const fn is_forward(self) -> bool {
        matches!(self, Self::Forward)
    }
}

/// Filters receipts before they become webhook events.
///
/// Reading a chat on the phone emits one read receipt per message; only the
/// first per chat per cooldown window is forwarded. Entries are never
/// evicted.
pub struct ReceiptGate {
    /// Map of chat id (device suffix stripped) to last forwarded own read receipt.
    last_forwarded: Mutex<HashMap<String, Instant>>,
    cooldown: Duration,
}

impl ReceiptGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            last_forwarded: Mutex::new(HashMap::new()),
            cooldown,
        }
    }

    /// Decide whether `receipt` is forwarded.
    ///
    /// Linked-device receipts are dropped before the debounce state is
    /// consulted.
    pub async fn check(&self, receipt: &ReceiptEvent) -> ReceiptVerdict {
        if receipt.sender.device != 0 {
            debug!(
                chat = %receipt.chat,
                sender = %receipt.sender,
                "Skipping receipt from linked device"
            );
            return ReceiptVerdict::SkipLinkedDevice;
        }

        if receipt.kind != ReceiptType::Read || !receipt.is_from_me {
            return ReceiptVerdict::Forward;
        }

        let chat = receipt.chat.to_non_device().to_string();
        let now = Instant::now();
        let mut map = self.last_forwarded.lock().await;

        if let Some(last) = map.get(&chat) {
            if now.duration_since(*last) < self.cooldown {
                debug!(chat = %chat, "Debouncing own read receipt");
                return ReceiptVerdict::Debounced;
            }
        }

        map.insert(chat, now);
        ReceiptVerdict::Forward
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

impl Default for ReceiptGate {
    fn default() -> Self {
        Self::new(DEFAULT_READ_COOLDOWN)
    }
}
