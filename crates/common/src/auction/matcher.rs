//! Raw bid pool keyed by zone.
//!
//! Bids are claimed destructively: [`ZoneBids::take_matching`] removes the bid
//! it returns, so one response can never hand the same bid to two slots.

use error_stack::{Report, ResultExt};
use serde_json::Value as Json;
use std::collections::HashMap;

use crate::error::HtbError;

use super::types::{RawBid, SlotConstraint};
use super::zone::ZoneId;

/// Candidate bids per zone, in the order the source returned them.
///
/// A zone may be reached through several response keys (`"1163"`, `"01163"`).
/// Each key keeps its own list, searched in object key order: the canonical
/// integer key first, then the others as they appeared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneBids {
    zones: HashMap<ZoneId, Vec<KeyedBids>>,
}

#[derive(Debug, Clone, PartialEq)]
struct KeyedBids {
    key: String,
    bids: Vec<RawBid>,
}

impl ZoneBids {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bids under a response key. Keys without a leading integer are
    /// ignored and bids under a key already present join its list.
    pub fn insert(&mut self, key: &str, bids: Vec<RawBid>) {
        let Some(zone) = ZoneId::parse(key) else {
            log::debug!("Skipping response key '{}': not a zone id", key);
            return;
        };

        let lists = self.zones.entry(zone).or_default();
        if let Some(list) = lists.iter_mut().find(|list| list.key == key) {
            list.bids.extend(bids);
        } else if is_index_key(key) {
            lists.insert(
                0,
                KeyedBids {
                    key: key.to_string(),
                    bids,
                },
            );
        } else {
            lists.push(KeyedBids {
                key: key.to_string(),
                bids,
            });
        }
    }

    /// Decode a response payload of the form `{ "<zone>": [bid, ...] }`.
    ///
    /// Decoding never fails: a payload that is not an object yields an empty
    /// pool, and keys without a leading integer, non-array values or entries
    /// that are not bid objects are skipped.
    #[must_use]
    pub fn from_json(payload: &Json) -> Self {
        let mut pool = Self::new();

        let Some(object) = payload.as_object() else {
            log::warn!("Bid response is not a JSON object, treating as no bids");
            return pool;
        };

        for (key, value) in object {
            let Some(entries) = value.as_array() else {
                log::debug!("Skipping response key '{}': bids are not an array", key);
                continue;
            };

            let bids = entries
                .iter()
                .filter_map(|entry| match serde_json::from_value::<RawBid>(entry.clone()) {
                    Ok(bid) => Some(bid),
                    Err(e) => {
                        log::debug!("Skipping undecodable bid under '{}': {}", key, e);
                        None
                    }
                })
                .collect();

            pool.insert(key, bids);
        }

        pool
    }

    /// Claim a bid for the constraint's zone whose format the constraint
    /// accepts, removing it from the pool.
    ///
    /// Keys are searched in turn and the first key holding an acceptable bid
    /// gives up its last-registered one. A constraint without a zone never
    /// matches.
    pub fn take_matching(&mut self, constraint: &SlotConstraint) -> Option<RawBid> {
        let zone = constraint.zone_id?;
        self.zones.get_mut(&zone)?.iter_mut().find_map(|list| {
            let index = list
                .bids
                .iter()
                .rposition(|bid| constraint.accepts(bid.format.as_deref()))?;
            Some(list.bids.remove(index))
        })
    }

    /// Unclaimed bids for a zone, in search order.
    #[must_use]
    pub fn remaining_in(&self, zone: ZoneId) -> Vec<&RawBid> {
        self.zones
            .get(&zone)
            .into_iter()
            .flatten()
            .flat_map(|list| &list.bids)
            .collect()
    }

    /// Number of bids not yet claimed across every zone.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.zones
            .values()
            .flatten()
            .map(|list| list.bids.len())
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

/// True for keys an object orders ahead of all others: canonical decimal
/// integers below `u32::MAX`.
fn is_index_key(key: &str) -> bool {
    let canonical = key == "0" || !key.starts_with('0');
    canonical
        && key.bytes().all(|b| b.is_ascii_digit())
        && key.parse::<u32>().is_ok_and(|index| index < u32::MAX)
}

/// Decode a raw response body into JSON.
///
/// # Errors
///
/// Returns an error if the body is not valid JSON.
pub fn parse_payload(body: &str) -> Result<Json, Report<HtbError>> {
    serde_json::from_str(body).change_context(HtbError::Response {
        message: "Bid response is not valid JSON".to_string(),
    })
}

impl FromIterator<(ZoneId, Vec<RawBid>)> for ZoneBids {
    fn from_iter<T: IntoIterator<Item = (ZoneId, Vec<RawBid>)>>(iter: T) -> Self {
        let mut pool = Self::new();
        for (zone, bids) in iter {
            pool.insert(&zone.to_string(), bids);
        }
        pool
    }
}
