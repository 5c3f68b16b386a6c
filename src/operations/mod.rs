// Operations module - policy and dispatch logic run by the controller

pub mod consumption;
pub mod rebuy;
pub mod departure;
pub mod reconcile;

pub use consumption::*;
pub use rebuy::*;
pub use departure::*;
pub use reconcile::*;
