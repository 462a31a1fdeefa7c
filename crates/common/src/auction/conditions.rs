//! Zone-condition compiler.
//!
//! Several publisher slots may target the same JustPremium zone, each with its
//! own allow/exclude format lists. The bid request carries one condition per
//! zone, so the per-slot rules are folded into the least restrictive condition
//! that still honors every slot:
//!
//! - any unrestricted slot makes the whole zone unrestricted;
//! - allow lists are unioned (first occurrence order);
//! - exclude lists are intersected across the slots that declared one;
//! - a surviving exclude set wins over the allow union, minus any format the
//!   union allows;
//! - a zone left with nothing to allow or exclude is unrestricted.
//!
//! On the wire a condition is `1` (unrestricted) or `[allow, exclude]`.

use error_stack::{Report, ResultExt};
use serde::ser::SerializeTuple;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

use crate::error::HtbError;

use super::types::SlotConstraint;
use super::zone::ZoneId;

/// Wire value for an unrestricted zone.
const UNRESTRICTED_MARKER: u8 = 1;

/// Compiled format condition for one zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneCondition {
    /// Every format is eligible.
    Unrestricted,
    /// At most one of the two lists is non-empty.
    Restricted {
        allow: Vec<String>,
        exclude: Vec<String>,
    },
}

impl ZoneCondition {
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        matches!(self, ZoneCondition::Unrestricted)
    }

    #[must_use]
    pub fn allow(&self) -> &[String] {
        match self {
            ZoneCondition::Unrestricted => &[],
            ZoneCondition::Restricted { allow, .. } => allow,
        }
    }

    #[must_use]
    pub fn exclude(&self) -> &[String] {
        match self {
            ZoneCondition::Unrestricted => &[],
            ZoneCondition::Restricted { exclude, .. } => exclude,
        }
    }
}

impl Serialize for ZoneCondition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ZoneCondition::Unrestricted => serializer.serialize_u8(UNRESTRICTED_MARKER),
            ZoneCondition::Restricted { allow, exclude } => {
                let mut tuple = serializer.serialize_tuple(2)?;
                tuple.serialize_element(allow)?;
                tuple.serialize_element(exclude)?;
                tuple.end()
            }
        }
    }
}

/// Compiled conditions keyed by zone, in ascending zone order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ZoneConditions(BTreeMap<ZoneId, ZoneCondition>);

impl ZoneConditions {
    #[must_use]
    pub fn get(&self, zone: ZoneId) -> Option<&ZoneCondition> {
        self.0.get(&zone)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ZoneId, &ZoneCondition)> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encode the conditions as the JSON object sent in the `c` parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn to_json(&self) -> Result<String, Report<HtbError>> {
        serde_json::to_string(self).change_context(HtbError::Request {
            message: "Failed to serialize zone conditions".to_string(),
        })
    }
}

impl FromIterator<(ZoneId, ZoneCondition)> for ZoneConditions {
    fn from_iter<T: IntoIterator<Item = (ZoneId, ZoneCondition)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Running state for one zone while slots are folded in.
#[derive(Debug, Default)]
struct ZoneAccumulator {
    unrestricted: bool,
    allow: Vec<String>,
    /// Exclude format with its number of appearances, first-seen order.
    exclude_counts: Vec<(String, usize)>,
    /// Slots that declared a non-empty exclude list.
    excluding_slots: usize,
}

impl ZoneAccumulator {
    fn add(&mut self, constraint: &SlotConstraint) {
        if self.unrestricted {
            return;
        }

        if constraint.is_unrestricted() {
            self.unrestricted = true;
            return;
        }

        for format in &constraint.allow {
            if !self.allow.contains(format) {
                self.allow.push(format.clone());
            }
        }

        for format in &constraint.exclude {
            match self.exclude_counts.iter_mut().find(|(f, _)| f == format) {
                Some((_, count)) => *count += 1,
                None => self.exclude_counts.push((format.clone(), 1)),
            }
        }

        if !constraint.exclude.is_empty() {
            self.excluding_slots += 1;
        }
    }

    fn finish(self) -> ZoneCondition {
        if self.unrestricted {
            return ZoneCondition::Unrestricted;
        }

        let excluding_slots = self.excluding_slots;
        let mut allow = self.allow;
        // A format repeated inside one slot's list overshoots the slot count
        // and is dropped, same as a format missing from some slot.
        let mut exclude: Vec<String> = self
            .exclude_counts
            .into_iter()
            .filter(|(_, count)| *count == excluding_slots)
            .map(|(format, _)| format)
            .collect();

        if !exclude.is_empty() {
            exclude.retain(|format| !allow.contains(format));
            allow.clear();
        }

        if allow.is_empty() && exclude.is_empty() {
            ZoneCondition::Unrestricted
        } else {
            ZoneCondition::Restricted { allow, exclude }
        }
    }
}

/// Fold per-slot constraints into one condition per zone.
pub fn compile_zone_conditions<'a, I>(constraints: I) -> ZoneConditions
where
    I: IntoIterator<Item = &'a SlotConstraint>,
{
    let mut zones: BTreeMap<ZoneId, ZoneAccumulator> = BTreeMap::new();

    for constraint in constraints {
        let Some(zone) = constraint.zone_id else {
            log::debug!("Leaving slot without a zone out of the conditions");
            continue;
        };
        zones.entry(zone).or_default().add(constraint);
    }

    let conditions: ZoneConditions = zones
        .into_iter()
        .map(|(zone, acc)| (zone, acc.finish()))
        .collect();

    log::debug!("Compiled conditions for {} zones", conditions.len());

    conditions
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn zone() -> ZoneId {
        ZoneId::new(1163)
    }

    #[test]
    fn test_unrestricted_slot_overrides_restrictions() {
        let constraints = vec![
            SlotConstraint::new(1163).with_allow(["lb"]),
            SlotConstraint::new(1163),
            SlotConstraint::new(1163).with_exclude(["wp"]),
        ];

        let conditions = compile_zone_conditions(&constraints);
        assert_eq!(conditions.get(zone()), Some(&ZoneCondition::Unrestricted));
    }

    #[test]
    fn test_unrestricted_slot_first_also_wins() {
        let constraints = vec![
            SlotConstraint::new(1163),
            SlotConstraint::new(1163).with_allow(["lb"]),
        ];

        let conditions = compile_zone_conditions(&constraints);
        assert!(conditions
            .get(zone())
            .is_some_and(ZoneCondition::is_unrestricted));
    }

    #[test]
    fn test_allow_lists_are_unioned_in_first_seen_order() {
        let constraints = vec![
            SlotConstraint::new(1163).with_allow(["lb"]),
            SlotConstraint::new(1163).with_allow(["wp", "lb"]),
        ];

        let conditions = compile_zone_conditions(&constraints);
        let condition = conditions.get(zone()).expect("zone should be compiled");
        assert_eq!(condition.allow(), ["lb".to_string(), "wp".to_string()]);
        assert!(condition.exclude().is_empty());
    }

    #[test]
    fn test_single_exclude_list() {
        let constraints = vec![SlotConstraint::new(1163).with_exclude(["lb"])];

        let conditions = compile_zone_conditions(&constraints);
        let condition = conditions.get(zone()).expect("zone should be compiled");
        assert!(condition.allow().is_empty());
        assert_eq!(condition.exclude(), ["lb".to_string()]);
    }

    #[test]
    fn test_disjoint_excludes_collapse_to_unrestricted() {
        let constraints = vec![
            SlotConstraint::new(1163).with_exclude(["a"]),
            SlotConstraint::new(1163).with_exclude(["b"]),
        ];

        let conditions = compile_zone_conditions(&constraints);
        assert_eq!(conditions.get(zone()), Some(&ZoneCondition::Unrestricted));
    }

    #[test]
    fn test_excludes_are_intersected() {
        let constraints = vec![
            SlotConstraint::new(1163).with_exclude(["a", "b", "c"]),
            SlotConstraint::new(1163).with_exclude(["c", "a"]),
        ];

        let conditions = compile_zone_conditions(&constraints);
        let condition = conditions.get(zone()).expect("zone should be compiled");
        assert_eq!(condition.exclude(), ["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_mixed_zone_keeps_exclude_minus_allow() {
        let constraints = vec![
            SlotConstraint::new(1163).with_allow(["lb", "wp"]),
            SlotConstraint::new(1163).with_exclude(["wp", "ca"]),
        ];

        let conditions = compile_zone_conditions(&constraints);
        assert_eq!(
            conditions.get(zone()),
            Some(&ZoneCondition::Restricted {
                allow: vec![],
                exclude: vec!["ca".to_string()],
            })
        );
    }

    #[test]
    fn test_mixed_zone_fully_overlapping_becomes_unrestricted() {
        let constraints = vec![
            SlotConstraint::new(1163).with_allow(["lb"]),
            SlotConstraint::new(1163).with_exclude(["lb"]),
        ];

        let conditions = compile_zone_conditions(&constraints);
        assert_eq!(conditions.get(zone()), Some(&ZoneCondition::Unrestricted));
    }

    #[test]
    fn test_repeated_exclude_within_one_slot_is_dropped() {
        let constraints = vec![SlotConstraint::new(1163).with_exclude(["a", "a", "b"])];

        let conditions = compile_zone_conditions(&constraints);
        let condition = conditions.get(zone()).expect("zone should be compiled");
        assert_eq!(condition.exclude(), ["b".to_string()]);
    }

    #[test]
    fn test_zones_are_compiled_independently() {
        let constraints = vec![
            SlotConstraint::new(1163).with_allow(["lb"]),
            SlotConstraint::new(20),
            SlotConstraint::new(1163).with_allow(["wp"]),
        ];

        let conditions = compile_zone_conditions(&constraints);
        assert_eq!(conditions.len(), 2);
        assert!(conditions
            .get(ZoneId::new(20))
            .is_some_and(ZoneCondition::is_unrestricted));
        let condition = conditions.get(zone()).expect("zone should be compiled");
        assert_eq!(condition.allow(), ["lb".to_string(), "wp".to_string()]);
    }

    #[test]
    fn test_wire_encoding() {
        let constraints = vec![
            SlotConstraint::new(1163).with_allow(["lb", "wp"]),
            SlotConstraint::new(20),
            SlotConstraint::new(7).with_exclude(["ca"]),
        ];

        let conditions = compile_zone_conditions(&constraints);
        let encoded: serde_json::Value =
            serde_json::from_str(&conditions.to_json().expect("should encode"))
                .expect("should be valid JSON");

        assert_eq!(
            encoded,
            json!({
                "7": [[], ["ca"]],
                "20": 1,
                "1163": [["lb", "wp"], []]
            })
        );
    }

    #[test]
    fn test_slot_without_zone_is_left_out() {
        let constraints = vec![
            SlotConstraint {
                zone_id: None,
                allow: Vec::new(),
                exclude: Vec::new(),
            },
            SlotConstraint::new(1163).with_allow(["lb"]),
        ];

        let conditions = compile_zone_conditions(&constraints);
        assert_eq!(conditions.len(), 1);
        let condition = conditions.get(zone()).expect("zone should be compiled");
        assert_eq!(condition.allow(), ["lb".to_string()]);
    }

    #[test]
    fn test_empty_input() {
        let conditions = compile_zone_conditions(std::iter::empty());
        assert!(conditions.is_empty());
        assert_eq!(conditions.to_json().expect("should encode"), "{}");
    }
}
