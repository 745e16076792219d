//! HTTP Routes
//!
//! Route handlers organized by functionality.

pub mod health;
pub mod page;
