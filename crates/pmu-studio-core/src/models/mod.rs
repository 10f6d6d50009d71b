//! Domain models for the studio back office.

mod analysis;
mod client;
mod consent;
mod rewards;
mod team;

pub use analysis::*;
pub use client::*;
pub use consent::*;
pub use rewards::*;
pub use team::*;
