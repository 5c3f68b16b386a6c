// Cache module - in-memory lookups refreshed from the game
pub mod auto_price;
pub mod hijacking_risk;

pub use auto_price::AutoPriceCache;
pub use hijacking_risk::HijackingRiskCache;
