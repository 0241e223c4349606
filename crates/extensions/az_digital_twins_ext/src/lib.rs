//! An output binding forwarding JSON patches to an Azure Digital Twins instance.
//!
//! A request either targets a single twin, named by the `twinId` metadata,
//! or a batch of twins, each operation path being prefixed by the twin id
//! (e.g. `{"op": "replace", "path": "/myTwinId/property1", "value": 42}`).
mod binding;
pub mod client;
pub mod config;
pub mod error;
pub mod patch;

pub use binding::*;
pub use config::DigitalTwinsConfig;
pub use error::*;
