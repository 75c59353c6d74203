mod cents;
mod helpers;

pub mod op;
mod secret;

pub use cents::{BasisPoints, Cents, CentsConversionError, BPS_DENOMINATOR};
pub use helpers::{parse_boolean_flag, parse_duration_secs};
pub use secret::Secret;
