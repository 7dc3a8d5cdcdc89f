use futures::TryStreamExt;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use super::simple_shop::LOCATION_ID_COLUMN;
use crate::category::ADDRESS_TABLE;
use crate::error::ExportResult;
use crate::source::Source;
use crate::types::Row;

/// Primary key column of the `Address` table.
const ADDRESS_ID_COLUMN: &str = "addressId";

/// The roles in which an entity or one of its locations references an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressRole {
    Primary,
    Billing,
    Mailing,
    Physical,
}

impl AddressRole {
    pub const ALL: [AddressRole; 4] = [
        AddressRole::Primary,
        AddressRole::Billing,
        AddressRole::Mailing,
        AddressRole::Physical,
    ];

    /// Column of the `Entity` or `EntityLocation` row referencing the address.
    pub fn column(&self) -> &'static str {
        match self {
            AddressRole::Primary => "primaryAddressId",
            AddressRole::Billing => "billingAddressId",
            AddressRole::Mailing => "mailingAddressId",
            AddressRole::Physical => "physicalAddressId",
        }
    }
}

impl fmt::Display for AddressRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AddressRole::Primary => "primary",
            AddressRole::Billing => "billing",
            AddressRole::Mailing => "mailing",
            AddressRole::Physical => "physical",
        };
        f.write_str(name)
    }
}

/// Addresses of one entity, resolved by role.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedAddresses {
    pub primary: Option<Row>,
    pub billing: Option<Row>,
    pub mailing: Option<Row>,
    pub physical: Option<Row>,
}

impl ResolvedAddresses {
    fn slot(&mut self, role: AddressRole) -> &mut Option<Row> {
        match role {
            AddressRole::Primary => &mut self.primary,
            AddressRole::Billing => &mut self.billing,
            AddressRole::Mailing => &mut self.mailing,
            AddressRole::Physical => &mut self.physical,
        }
    }

    pub fn get(&self, role: AddressRole) -> Option<&Row> {
        match role {
            AddressRole::Primary => self.primary.as_ref(),
            AddressRole::Billing => self.billing.as_ref(),
            AddressRole::Mailing => self.mailing.as_ref(),
            AddressRole::Physical => self.physical.as_ref(),
        }
    }
}

/// Addresses of one `EntityLocation` row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationAddresses {
    pub entity_location_id: serde_json::Value,
    #[serde(flatten)]
    pub addresses: ResolvedAddresses,
}

/// All addresses keyed by `addressId`.
///
/// Addresses are shared between referrers, so they are indexed once per run instead of
/// being loaded per entity.
#[derive(Debug, Clone, Default)]
pub struct AddressIndex {
    by_id: HashMap<String, Row>,
}

impl AddressIndex {
    /// Builds the index from a full scan of the `Address` table.
    pub async fn load<S>(source: &S, batch_size: usize) -> ExportResult<Self>
    where
        S: Source,
    {
        let pages: Vec<Vec<Row>> = source
            .scan_table(ADDRESS_TABLE, batch_size)
            .try_collect()
            .await?;

        Ok(Self::from_rows(pages.into_iter().flatten()))
    }

    pub fn from_rows(rows: impl IntoIterator<Item = Row>) -> Self {
        let by_id = rows
            .into_iter()
            .filter_map(|row| {
                let key = row.get(ADDRESS_ID_COLUMN).and_then(address_key)?;
                Some((key, row))
            })
            .collect();

        Self { by_id }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Resolves every address role referenced by an `Entity` or `EntityLocation` row.
    ///
    /// Dangling or empty references resolve to [`None`].
    pub fn resolve(&self, referrer: &Row) -> ResolvedAddresses {
        let mut resolved = ResolvedAddresses::default();
        for role in AddressRole::ALL {
            *resolved.slot(role) = referrer
                .get(role.column())
                .and_then(address_key)
                .and_then(|key| self.by_id.get(&key))
                .cloned();
        }

        resolved
    }

    /// Resolves the addresses of every location that references at least one.
    pub fn resolve_locations(&self, locations: &[Row]) -> Vec<LocationAddresses> {
        locations
            .iter()
            .filter_map(|location| {
                let addresses = self.resolve(location);
                if addresses == ResolvedAddresses::default() {
                    return None;
                }

                Some(LocationAddresses {
                    entity_location_id: location
                        .get(LOCATION_ID_COLUMN)
                        .cloned()
                        .unwrap_or(serde_json::Value::Null),
                    addresses,
                })
            })
            .collect()
    }
}

/// Normalizes numeric and string identifiers to the same lookup key.
fn address_key(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Number(number) => Some(number.to_string()),
        serde_json::Value::String(text) if !text.trim().is_empty() => {
            Some(text.trim().to_string())
        }
        _ => None,
    }
}
