//! # Honor Ledger Common Library
//!
//! Shared code for the honor ledger services:
//! - Error types
//! - Configuration loading
//! - Database pool initialization and schema creation

pub mod config;
pub mod db;
pub mod error;

pub use error::{ConflictKind, Error, Result};
