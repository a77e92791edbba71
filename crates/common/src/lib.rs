//! # Common
//!
//! Domain model, geospatial utilities, and the collaborator interfaces shared
//! by the reporter and the viewer.

pub mod fleet;
pub mod geo;
pub mod position;
pub mod provider;
pub mod route;
pub mod session;

pub use self::fleet::*;
pub use self::position::*;
pub use self::provider::*;
pub use self::route::*;
pub use self::session::*;
