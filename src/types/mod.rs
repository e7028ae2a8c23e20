//! Type definitions for voxmeter

mod error;
pub mod lenient;
mod usage;

pub use error::*;
pub use usage::*;
