#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]

pub mod alert;
pub mod config;
pub mod decode;
pub mod diagnostics;
pub mod endpoint_core;
pub mod endpoints {
    pub mod replay;
    pub mod serial;
    pub mod tcp;
}
pub mod error;
pub mod geo;
pub mod high_level;
pub mod hub;
pub mod lookup;
pub mod notification;
pub mod queue;
pub mod reassembly;
pub mod registry;
pub mod router;
pub mod routing;
pub mod stats;
pub mod storage;
pub mod vessel;

pub use high_level::Logger;
