//! Read access to the relational source.

mod base;
pub mod mysql;
mod query;

pub use base::Source;
pub use query::{
    ACTIVE_EMPLOYEES_COLUMN, ACTIVE_LOCATIONS_COLUMN, COUNT_COLUMN, QueryParam, SourceQuery,
    quote_identifier,
};
