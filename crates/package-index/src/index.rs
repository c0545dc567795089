//! Live package index.
//!
//! ## Module Structure
//!
//! - `manager` - Main API (PackageIndex): lookups, rescans, status
//! - `shared` - Generation state shared with the debounce thread
//!
//! Readers hold the shared side of one `RwLock` for the duration of a query.
//! A rebuild takes the exclusive side for the whole scan and swaps the
//! snapshot and content store in one assignment.

mod manager;
mod shared;

pub use manager::PackageIndex;
pub use shared::{Generation, SharedPackageIndex};
