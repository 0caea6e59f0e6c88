//! Remediation ledger
//!
//! Sub-record values that could not be merged automatically are recorded
//! against their owning contact for a human operator to fix. Phone-role
//! failures go to `bad_phone_nums`; address, email, note and list-membership
//! failures go to `bad_m2m`. Both maps are keyed by the contact's remote id.
//! Sub-record field failures are named `collection.column`, such as
//! `addresses.state_code`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Ledger section an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemediationCategory {
    Phone,
    Relation,
}

/// One unmergeable value
#[derive(Debug, Clone, PartialEq)]
pub struct RemediationEntry {
    pub contact_cc_id: i64,
    pub field_name: String,
    pub raw_value: Value,
    pub category: RemediationCategory,
}

impl RemediationEntry {
    pub fn phone(contact_cc_id: i64, role: &str, raw: &str) -> Self {
        Self {
            contact_cc_id,
            field_name: role.to_string(),
            raw_value: Value::String(raw.to_string()),
            category: RemediationCategory::Phone,
        }
    }

    pub fn relation(contact_cc_id: i64, field_name: &str, raw: Value) -> Self {
        Self {
            contact_cc_id,
            field_name: field_name.to_string(),
            raw_value: raw,
            category: RemediationCategory::Relation,
        }
    }

    /// `{field_name: raw_value}`, the shape stored in the snapshot ledger
    pub fn as_json(&self) -> Value {
        let mut map = Map::new();
        map.insert(self.field_name.clone(), self.raw_value.clone());
        Value::Object(map)
    }
}

/// In-memory ledger, serialized as the snapshot's `to_remediate` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemediationLedger {
    #[serde(default)]
    pub bad_phone_nums: BTreeMap<String, Vec<Value>>,
    #[serde(default)]
    pub bad_m2m: BTreeMap<String, Vec<Value>>,
}

impl RemediationLedger {
    pub fn record(&mut self, entry: &RemediationEntry) {
        let section = match entry.category {
            RemediationCategory::Phone => &mut self.bad_phone_nums,
            RemediationCategory::Relation => &mut self.bad_m2m,
        };
        section
            .entry(entry.contact_cc_id.to_string())
            .or_default()
            .push(entry.as_json());
    }

    /// Append entries from `other` that this ledger does not already hold
    pub fn merge(&mut self, other: &RemediationLedger) {
        for (mine, theirs) in [
            (&mut self.bad_phone_nums, &other.bad_phone_nums),
            (&mut self.bad_m2m, &other.bad_m2m),
        ] {
            for (contact, values) in theirs {
                let existing = mine.entry(contact.clone()).or_default();
                for value in values {
                    if !existing.contains(value) {
                        existing.push(value.clone());
                    }
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.bad_phone_nums.values().map(Vec::len).sum::<usize>()
            + self.bad_m2m.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_routes_by_category() {
        let mut ledger = RemediationLedger::default();
        ledger.record(&RemediationEntry::phone(42, "work_phone", "1"));
        ledger.record(&RemediationEntry::relation(42, "addresses", json!({"id": "a1"})));

        assert_eq!(ledger.bad_phone_nums["42"], vec![json!({"work_phone": "1"})]);
        assert_eq!(ledger.bad_m2m["42"], vec![json!({"addresses": {"id": "a1"}})]);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_merge_skips_duplicates() {
        let mut a = RemediationLedger::default();
        a.record(&RemediationEntry::phone(1, "fax", "12"));
        let mut b = a.clone();
        b.record(&RemediationEntry::phone(2, "fax", "34"));

        a.merge(&b);
        assert_eq!(a.len(), 2);
        a.merge(&b);
        assert_eq!(a.len(), 2);
    }
}
