use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::{EquipmentError, Result};

pub type DatasetId = Uuid;

pub const COL_NAME: &str = "Equipment Name";
pub const COL_TYPE: &str = "Type";
pub const COL_FLOWRATE: &str = "Flowrate";
pub const COL_PRESSURE: &str = "Pressure";
pub const COL_TEMPERATURE: &str = "Temperature";

/// Header labels every upload must carry (exact, case-sensitive).
pub const REQUIRED_COLUMNS: [&str; 5] = [COL_NAME, COL_TYPE, COL_FLOWRATE, COL_PRESSURE, COL_TEMPERATURE];

/// Identity handed to the core by the boundary layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
    pub display_name: String,
}

impl Owner {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self { id: id.into(), display_name: display_name.into() }
    }

    /// Owner whose display name is its identifier.
    pub fn named(id: impl Into<String>) -> Self {
        let id = id.into();
        Self { display_name: id.clone(), id }
    }
}

/// Category label -> row count, kept in order of first occurrence.
///
/// Serializes as a JSON object. Order is for display only; equality ignores it.
#[derive(Clone, Debug, Default)]
pub struct Distribution {
    entries: Vec<(String, u64)>,
    index: HashMap<String, usize>,
}

impl Distribution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, label: &str) {
        match self.index.get(label) {
            Some(&i) => self.entries[i].1 += 1,
            None => {
                self.index.insert(label.to_string(), self.entries.len());
                self.entries.push((label.to_string(), 1));
            }
        }
    }

    fn push(&mut self, label: String, count: u64) -> bool {
        if self.index.contains_key(&label) {
            return false;
        }
        self.index.insert(label.clone(), self.entries.len());
        self.entries.push((label, count));
        true
    }

    pub fn get(&self, label: &str) -> Option<u64> {
        self.index.get(label).map(|&i| self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, c)| c).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(l, c)| (l.as_str(), *c))
    }

    /// Strict decode of a stored distribution. Anything other than an object of
    /// non-negative integers is treated as corruption.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| EquipmentError::Storage(format!("corrupt type distribution: {e}")))
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .entries
            .iter()
            .map(|(l, c)| (l.clone(), serde_json::Value::from(*c)))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

impl PartialEq for Distribution {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(l, c)| other.get(l) == Some(c))
    }
}

impl<const N: usize> From<[(&str, u64); N]> for Distribution {
    fn from(pairs: [(&str, u64); N]) -> Self {
        let mut d = Self::new();
        for (label, count) in pairs {
            d.push(label.to_string(), count);
        }
        d
    }
}

impl Serialize for Distribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, count) in &self.entries {
            map.serialize_entry(label, count)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Distribution {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct DistributionVisitor;

        impl<'de> Visitor<'de> for DistributionVisitor {
            type Value = Distribution;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of category label to non-negative count")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Distribution, A::Error> {
                let mut d = Distribution::new();
                while let Some((label, count)) = access.next_entry::<String, u64>()? {
                    if !d.push(label.clone(), count) {
                        return Err(serde::de::Error::custom(format!("duplicate label '{label}'")));
                    }
                }
                Ok(d)
            }
        }

        deserializer.deserialize_map(DistributionVisitor)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EquipmentRow {
    /// Zero-based position in the source file.
    pub position: u32,
    pub name: String,
    pub category: String,
    pub flowrate: f64,
    pub pressure: f64,
    pub temperature: f64,
}

/// Aggregates derived from one upload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_count: u64,
    pub avg_flowrate: f64,
    pub avg_pressure: f64,
    pub avg_temperature: f64,
    pub distribution: Distribution,
}

/// Dataset metadata and aggregates, without child rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub id: DatasetId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub owner: Owner,
    pub source_hash: String, // hex BLAKE3 of the uploaded bytes
    pub summary: Summary,
}

impl DatasetRecord {
    /// Load-time consistency check for records read back from storage.
    pub fn check_consistency(&self) -> Result<()> {
        let total = self.summary.distribution.total();
        if total != self.summary.total_count {
            return Err(EquipmentError::Storage(format!(
                "dataset {}: distribution sums to {total}, total_count is {}",
                self.id, self.summary.total_count
            )));
        }
        Ok(())
    }
}

/// A dataset with all of its equipment rows, in source order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub record: DatasetRecord,
    pub equipment: Vec<EquipmentRow>,
}

/// Everything a store needs to persist one ingestion.
#[derive(Clone, Debug)]
pub struct NewDataset {
    pub name: String,
    pub owner: Owner,
    pub source_hash: String,
    pub summary: Summary,
    pub equipment: Vec<EquipmentRow>,
}

pub fn source_hash(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distribution_keeps_first_occurrence_order() {
        let mut d = Distribution::new();
        for label in ["Pump", "Valve", "Pump", "Tank", "Valve", "Pump"] {
            d.increment(label);
        }
        let order: Vec<_> = d.iter().collect();
        assert_eq!(order, vec![("Pump", 3), ("Valve", 2), ("Tank", 1)]);
        assert_eq!(d.total(), 6);
    }

    #[test]
    fn distribution_labels_are_case_sensitive() {
        let mut d = Distribution::new();
        d.increment("pump");
        d.increment("Pump");
        d.increment("Pump ");
        assert_eq!(d.len(), 3);
    }

    #[test]
    fn distribution_serializes_as_object() {
        let d = Distribution::from([("A", 2), ("B", 1)]);
        assert_eq!(serde_json::to_string(&d).unwrap(), r#"{"A":2,"B":1}"#);
    }

    #[test]
    fn corrupt_distribution_fails_loudly() {
        let bad = serde_json::json!({"A": -1});
        assert!(matches!(Distribution::from_json(bad), Err(EquipmentError::Storage(_))));

        let not_a_map = serde_json::json!("{\"A\": 2}");
        assert!(Distribution::from_json(not_a_map).is_err());
    }

    #[test]
    fn equality_ignores_order() {
        assert_eq!(Distribution::from([("A", 2), ("B", 1)]), Distribution::from([("B", 1), ("A", 2)]));
    }

    #[test]
    fn source_hash_is_hex_blake3() {
        let h = source_hash(b"Equipment Name,Type\n");
        assert_eq!(h.len(), 64);
        assert_eq!(h, source_hash(b"Equipment Name,Type\n"));
    }
}
