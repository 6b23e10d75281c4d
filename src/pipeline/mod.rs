//! Pipeline entry points.
//!
//! - `run_fetch`: Pull the listing, filter codes and download the export
//! - `run_split`: Split a downloaded export into per-partner files
//! - `run_all`: Both, in sequence
//! - `run_login`: Refresh credentials without fetching anything

pub mod filter;
pub mod run;
pub mod split;

pub use filter::{DateRange, filter_train_codes, parse_departure_datetime};
pub use run::{run_all, run_fetch, run_login, run_split};
pub use split::{sanitize_filename, split_sheet};
