//! Room-by-room inventory core for household moves.
//!
//! Identical item configurations in a room are grouped by a deterministic
//! key ([`grouping`]); the boxes room is topped up with packing boxes as the
//! shipment weight crosses 200 lb bands ([`autobox`]). [`inventory`] ties both
//! together per stop and [`api`] exposes it over HTTP.

pub mod api;
pub mod autobox;
pub mod catalog;
pub mod config;
pub mod error;
pub mod grouping;
pub mod inventory;
pub mod model;
pub mod store;
pub mod tags;
pub mod types;

pub use error::{Error, Result};
