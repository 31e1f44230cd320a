//! Statistical models behind the benchmark analytics.

pub mod ewm;

pub use ewm::EwmLinearModel;
