//! # Realtime Core
//!
//! Core modules shared by the reporter and viewer: the domain error type and
//! the cancellable tick scheduler that drives every polling loop.

mod error;
mod schedule;

pub use crate::error::*;
pub use crate::schedule::*;
