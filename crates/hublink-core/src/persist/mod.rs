//! Artifact persistence: atomic JSON files and flat CSV tables.

mod atomic;
mod table;

pub use atomic::{atomic_read_json, atomic_write_bytes, atomic_write_json};
pub use table::{read_csv, require_input, write_csv};
