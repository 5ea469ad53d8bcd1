//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the crate:
//! - Math types and the rigid transform
//! - Logging initialisation
//! - Logic cycle timing

pub mod math;
pub mod time;
pub mod logging;
