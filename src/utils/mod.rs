pub mod fill;
pub mod indicators;
pub mod stats;
