//! Plain data records of the network: buses, branches (lines and transformers) and generators.
mod branch;
mod bus;
mod generator;
mod units;

pub use branch::*;
pub use bus::*;
pub use generator::*;
pub use units::*;
