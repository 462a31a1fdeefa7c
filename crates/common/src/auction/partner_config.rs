//! Publisher-side partner configuration.

use std::collections::BTreeMap;
use std::fmt;

use error_stack::{Report, ResultExt};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;
use validator::Validate;

use crate::error::HtbError;

use super::bid_transformer::BidTransformerConfig;
use super::types::{SlotConstraint, SlotRequest};

/// Partner slots, their mapping onto wrapper slots, and an optional price
/// transformer override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PartnerConfig {
    /// Partner slot name to its zone constraint.
    pub x_slots: BTreeMap<String, SlotConstraint>,
    /// Wrapper slot id to the partner slot names it requests.
    pub mapping: SlotMapping,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub bid_transformer: Option<BidTransformerConfig>,
}

impl PartnerConfig {
    /// Parse and validate a partner config from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a partner config or the
    /// bid transformer override is invalid.
    pub fn from_json_str(json: &str) -> Result<Self, Report<HtbError>> {
        let config: Self = serde_json::from_str(json).change_context(HtbError::Configuration {
            message: "Failed to parse partner config".to_string(),
        })?;

        config.validate().change_context(HtbError::Configuration {
            message: "Partner config validation failed".to_string(),
        })?;

        Ok(config)
    }

    /// Expand the mapping into one slot request per mapped partner slot, each
    /// with a fresh request id.
    #[must_use]
    pub fn slot_requests(&self) -> Vec<SlotRequest> {
        let mut requests = Vec::new();

        for (ht_slot_id, names) in self.mapping.iter() {
            for name in names {
                let Some(constraint) = self.x_slots.get(name) else {
                    log::warn!(
                        "Wrapper slot {} maps unknown partner slot '{}', skipping",
                        ht_slot_id,
                        name
                    );
                    continue;
                };

                requests.push(SlotRequest::new(
                    ht_slot_id,
                    name.as_str(),
                    format!("_{}", Uuid::new_v4().simple()),
                    constraint.clone(),
                ));
            }
        }

        requests
    }
}

/// Wrapper slot ids and their partner slot names, in document order.
///
/// Slot requests are matched in this order, so it decides which slot claims
/// which bid. A repeated wrapper slot id keeps its first position and takes the
/// last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotMapping(Vec<(String, Vec<String>)>);

impl SlotMapping {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(ht_slot_id, names)| (ht_slot_id.as_str(), names.as_slice()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn set(&mut self, ht_slot_id: String, names: Vec<String>) {
        match self.0.iter_mut().find(|(id, _)| *id == ht_slot_id) {
            Some((_, existing)) => *existing = names,
            None => self.0.push((ht_slot_id, names)),
        }
    }
}

impl FromIterator<(String, Vec<String>)> for SlotMapping {
    fn from_iter<T: IntoIterator<Item = (String, Vec<String>)>>(iter: T) -> Self {
        let mut mapping = Self::default();
        for (ht_slot_id, names) in iter {
            mapping.set(ht_slot_id, names);
        }
        mapping
    }
}

impl Serialize for SlotMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (ht_slot_id, names) in &self.0 {
            map.serialize_entry(ht_slot_id, names)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SlotMapping {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SlotMappingVisitor;

        impl<'de> Visitor<'de> for SlotMappingVisitor {
            type Value = SlotMapping;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of wrapper slot ids to partner slot names")
            }

            fn visit_map<A>(self, mut access: A) -> Result<SlotMapping, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut mapping = SlotMapping::default();
                while let Some((ht_slot_id, names)) = access.next_entry()? {
                    mapping.set(ht_slot_id, names);
                }
                Ok(mapping)
            }
        }

        deserializer.deserialize_map(SlotMappingVisitor)
    }
}
