//! HTTP route handlers

pub mod error;
pub mod matches;
pub mod rules;
pub mod status;
pub mod stream;
