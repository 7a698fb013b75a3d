//! Shelter record domain model

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::Coord;

/// Categorical state of a shelter.
///
/// Intermediate data may carry several candidate values for one shelter; the
/// list form keeps them until they are collapsed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShelterType {
    Single(String),
    Many(Vec<String>),
}

impl ShelterType {
    /// All values in order, whatever the form
    pub fn values(&self) -> Vec<&str> {
        match self {
            ShelterType::Single(value) => vec![value.as_str()],
            ShelterType::Many(values) => values.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, ShelterType::Many(_))
    }
}

/// One shelter observation from one source, or the merge of two.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    /// Secondary name, set only when two records were merged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(default)]
    pub coord: Option<Coord>,
    #[serde(default)]
    pub altitude: Option<i64>,
    #[serde(default)]
    pub places: Option<i64>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub shelter_type: Option<ShelterType>,
    /// Sparse feature flags; a missing key reads as 0
    #[serde(default)]
    pub info_comp: BTreeMap<String, u32>,
    #[serde(default)]
    pub description: Vec<String>,
    #[serde(default)]
    pub remarque: Vec<String>,
    /// Provenance URLs in first-seen order
    #[serde(default)]
    pub links: Vec<String>,

    // Serialized as null when absent
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub departement: Option<String>,
    #[serde(default)]
    pub modified_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_couchage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_eau: Option<String>,

    /// Non-canonical fields, carried verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Record {
    /// Field names owned by the record type. Anything else goes to `extra`.
    pub const CANONICAL_FIELDS: [&'static str; 15] = [
        "name",
        "surname",
        "coord",
        "altitude",
        "places",
        "type",
        "info_comp",
        "description",
        "remarque",
        "links",
        "region",
        "departement",
        "modified_at",
        "info_couchage",
        "info_eau",
    ];

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_coord(mut self, lat: f64, long: f64) -> Self {
        self.coord = Some(Coord::new(lat, long));
        self
    }

    pub fn with_places(mut self, places: i64) -> Self {
        self.places = Some(places);
        self
    }

    pub fn with_altitude(mut self, altitude: i64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.links.push(link.into());
        self
    }

    pub fn with_type(mut self, value: impl Into<String>) -> Self {
        self.shelter_type = Some(ShelterType::Single(value.into()));
        self
    }

    pub fn with_flag(mut self, key: impl Into<String>, value: u32) -> Self {
        self.info_comp.insert(key.into(), value);
        self
    }

    /// Flag value, 0 when unset
    pub fn flag(&self, key: &str) -> u32 {
        self.info_comp.get(key).copied().unwrap_or(0)
    }

    /// Coordinate usable for distance computation
    pub fn valid_coord(&self) -> Option<&Coord> {
        self.coord.as_ref().filter(|c| c.is_valid())
    }

    /// Whether any provenance link contains `marker`
    pub fn has_provenance(&self, marker: &str) -> bool {
        !marker.is_empty() && self.links.iter().any(|link| link.contains(marker))
    }

    /// Produced by merging two records
    pub fn is_merged(&self) -> bool {
        self.surname.is_some()
    }

    /// Matches a lookup by display name or secondary name
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.surname.as_deref() == Some(name)
    }
}
