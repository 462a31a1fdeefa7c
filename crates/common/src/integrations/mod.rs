//! Demand partner integrations.

pub mod justpremium;

pub use justpremium::{register_adapters, JustPremiumAdapter, JustPremiumConfig, Services};
