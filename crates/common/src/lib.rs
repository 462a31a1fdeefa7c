//! Header-bidding adapter for JustPremium demand.
//!
//! The adapter turns publisher slot constraints into a zone-keyed bid request
//! and pairs the zone-keyed response back onto the requesting slots.
//!
//! # Modules
//!
//! - [`auction`]: Zone conditions, bid matching, price transforms and the
//!   wrapper collaborator traits
//! - [`error`]: Error types and error handling utilities
//! - [`integrations`]: The JustPremium adapter and its configuration
//! - [`settings`]: Configuration management and validation
//! - [`test_support`]: Testing utilities

pub mod auction;
pub mod error;
pub mod integrations;
pub mod settings;
