mod cents;

pub mod op;
mod secret;

pub use cents::{Cents, CentsConversionError, CURRENCY_CODE, CURRENCY_SYMBOL};
pub use secret::Secret;
