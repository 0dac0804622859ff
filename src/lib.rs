// src/lib.rs

pub mod config;
pub mod core;
pub mod document;
pub mod error;
pub mod persistence;
pub mod store;
pub use crate::core::engine::CorrEngine;
pub use crate::error::{CorrError, CorrResult, ValidationError};
