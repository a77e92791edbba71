//! # Bustrack
//!
//! Live bus tracking. Operators report their bus's position while on duty;
//! riders follow a bus along its route and see which stop it reaches next.
//!
//! The [`reporter`] and [`viewer`] crates hold the behaviour and talk to
//! their host through the collaborator traits in [`common`]. This crate
//! provides an in-memory host for tests and the demo binary.

pub mod demo;
pub mod provider;

pub use common;
pub use realtime;
pub use reporter;
pub use viewer;

pub use self::provider::MemoryProvider;
