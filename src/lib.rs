//! StateSet lot returns
//!
//! Lot-level reconciliation for returns of completed deliveries. A return
//! session offers, per delivered product line, every lot whose delivered
//! quantity has not yet been sent back, and the committed return writes one
//! move line per selected lot.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod commands;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod models;
pub mod repositories;
pub mod services;

pub use errors::ServiceError;
pub use models::{LotOption, QtyPrecision, ReturnLine, ReturnWizard};
pub use services::LotReturnService;
