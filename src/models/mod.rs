// Models module - Game data structures and API payloads

pub mod vessel;
pub mod bunker;
pub mod port;
pub mod responses;

// Re-export all models for easier imports
pub use vessel::*;
pub use bunker::*;
pub use port::*;
pub use responses::*;
