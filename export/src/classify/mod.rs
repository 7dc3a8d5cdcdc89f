//! Classification of entities and lookups derived from their root rows.

mod address;
mod simple_shop;

pub use address::{AddressIndex, AddressRole, LocationAddresses, ResolvedAddresses};
pub use simple_shop::{SimpleShopClassifier, SimpleShopInfo};
