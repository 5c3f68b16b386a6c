// Per-commodity purchase debounce
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::models::Commodity;

pub const PURCHASE_COOLDOWN: Duration = Duration::from_secs(2);

/// Rejects a purchase started too soon after the previous one of the same
/// commodity. Lossy on purpose: a rejected caller logs and moves on.
#[derive(Debug)]
pub struct PurchaseCooldown {
    window: Duration,
    last_purchase: Mutex<HashMap<Commodity, Instant>>,
}

impl Default for PurchaseCooldown {
    fn default() -> Self {
        Self::new(PURCHASE_COOLDOWN)
    }
}

impl PurchaseCooldown {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_purchase: Mutex::new(HashMap::new()),
        }
    }

    /// Claim the slot for `commodity`. False while the window is still open.
    pub fn try_acquire(&self, commodity: Commodity) -> bool {
        let mut last = self.last_purchase.lock();
        let now = Instant::now();
        if let Some(at) = last.get(&commodity) {
            if now.duration_since(*at) < self.window {
                return false;
            }
        }
        last.insert(commodity, now);
        true
    }

    /// Record a purchase that did not go through `try_acquire`.
    pub fn record(&self, commodity: Commodity) {
        self.last_purchase.lock().insert(commodity, Instant::now());
    }

    pub fn remaining(&self, commodity: Commodity) -> Option<Duration> {
        let last = self.last_purchase.lock();
        let elapsed = last.get(&commodity)?.elapsed();
        self.window.checked_sub(elapsed).filter(|d| !d.is_zero())
    }
}
