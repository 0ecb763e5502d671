mod amount;

pub mod op;
mod secret;

pub use amount::{Amount, AmountConversionError};
pub use secret::Secret;
