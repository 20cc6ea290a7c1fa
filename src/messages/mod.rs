//! Message types exchanged with model transports.

mod types;

pub use types::*;
