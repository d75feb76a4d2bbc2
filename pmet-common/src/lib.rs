//! # PMET Common Library
//!
//! Shared code for the PMET tools including:
//! - Common error type
//! - Bootstrap configuration loading and folder resolution

pub mod config;
pub mod error;

pub use error::{Error, Result};
