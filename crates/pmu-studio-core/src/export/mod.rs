//! Export of studio records.

mod clients;

pub use clients::*;
