use parking_lot::Mutex;
use std::collections::HashMap;

use crate::models::Vessel;

/// Unordered port pair: (a, b) and (b, a) are the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortPair(String, String);

impl PortPair {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self(a.to_string(), b.to_string())
        } else {
            Self(b.to_string(), a.to_string())
        }
    }
}

/// Hijacking risk (percent) per port pair, fed from roster responses.
#[derive(Debug, Default)]
pub struct HijackingRiskCache {
    risks: Mutex<HashMap<PortPair, f64>>,
}

impl HijackingRiskCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        self.risks.lock().get(&PortPair::new(a, b)).copied()
    }

    pub fn record(&self, a: &str, b: &str, risk: f64) {
        self.risks.lock().insert(PortPair::new(a, b), risk);
    }

    /// Record every route in `vessels` that reports a risk; returns the count.
    pub fn snapshot_from(&self, vessels: &[Vessel]) -> usize {
        let mut risks = self.risks.lock();
        let mut updated = 0;
        for vessel in vessels {
            let Some(route) = &vessel.route else { continue };
            let (Some(destination), Some(risk)) = (route.destination.as_deref(), route.hijacking_risk) else {
                continue;
            };
            risks.insert(PortPair::new(&route.origin, destination), risk);
            updated += 1;
        }
        updated
    }

    pub fn len(&self) -> usize {
        self.risks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.risks.lock().is_empty()
    }
}
