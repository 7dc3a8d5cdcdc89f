//! Conversions between source values and their exported JSON form.

pub mod hex;
pub mod temporal;
pub mod value;
