pub mod elements;
pub mod error;
pub mod network;
pub mod post_processing;
pub mod powerflow;
pub mod shortcircuit;
pub mod solver;
pub mod system;
