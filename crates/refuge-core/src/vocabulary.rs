//! Vocabulary-driven ingestion
//!
//! Source catalogs disagree on how they spell a flag ("Sans", "non", `2`,
//! `true`) or a shelter type ("Fermée", "cabane fermee"). All of those literal
//! tables live here, as data, so a run can override them from configuration.
//! [`Vocabulary::shape`] turns one raw JSON object into a canonical
//! [`Record`], reporting every value it had to coerce.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

use crate::domain::{Coord, Record, ShelterType};
use crate::error::{DataIssue, InputError};

/// Literal coercion tables applied at ingestion and by the categorical merge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    /// Type values that win any categorical conflict
    pub closed_types: Vec<String>,
    /// Type values that yield to any more specific value
    pub generic_types: Vec<String>,
    /// info_comp keys that carry a count instead of a 0/1 flag
    pub legacy_numeric_flags: Vec<String>,
    /// Lowercased flag spellings and the 0/1 they stand for
    pub flag_tokens: BTreeMap<String, u32>,
    /// Lowercased type spellings and their canonical value
    pub type_aliases: BTreeMap<String, String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        let zero = [
            "",
            "0",
            "sans",
            "non",
            "no",
            "nada",
            "néant",
            "rien",
            "?",
            "à apporter",
            "pas de bois à proximité",
            "pas de source",
            "pas à proximité immédiate",
        ];
        let one = ["1", "oui", "si", "sí", "yes"];

        let mut flag_tokens = BTreeMap::new();
        for token in zero {
            flag_tokens.insert(token.to_string(), 0);
        }
        for token in one {
            flag_tokens.insert(token.to_string(), 1);
        }

        let type_aliases = [
            ("cabane fermee", "fermée"),
            ("cabane fermée", "fermée"),
            ("cabane ouverte", "non gardé"),
            ("orri toue abri en pierre", "orri"),
        ]
        .into_iter()
        .map(|(alias, canonical)| (alias.to_string(), canonical.to_string()))
        .collect();

        Self {
            closed_types: vec!["fermée".to_string()],
            generic_types: vec!["non gardé".to_string()],
            legacy_numeric_flags: vec!["places_matelas".to_string()],
            flag_tokens,
            type_aliases,
        }
    }
}

/// Records shaped from one input document, with the defects absorbed on the way
#[derive(Debug, Clone, Default)]
pub struct ShapedRecords {
    pub records: Vec<Record>,
    pub issues: Vec<DataIssue>,
}

/// Extract the record array from a document.
///
/// Accepts a bare JSON array or an object with a `nodes` array.
pub fn record_values(root: Value) -> Result<Vec<Value>, InputError> {
    match root {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("nodes") {
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(InputError::NotARecordSet(
                "`nodes` is not an array".to_string(),
            )),
            None => Err(InputError::NotARecordSet(
                "object has no `nodes` array".to_string(),
            )),
        },
        other => Err(InputError::NotARecordSet(format!(
            "expected an array, found {}",
            json_kind(&other)
        ))),
    }
}

impl Vocabulary {
    /// Shape every record of a document
    pub fn shape_all(&self, root: Value) -> Result<ShapedRecords, InputError> {
        let mut shaped = ShapedRecords::default();
        for (index, raw) in record_values(root)?.iter().enumerate() {
            let (record, issues) = self.shape(raw, index)?;
            shaped.records.push(record);
            shaped.issues.extend(issues);
        }
        Ok(shaped)
    }

    /// Turn one raw JSON object into a canonical record.
    ///
    /// A record without a string `name`, or with a field whose JSON kind can
    /// never be coerced, is rejected. Values of the right kind but unclean
    /// content are coerced and reported.
    pub fn shape(&self, raw: &Value, index: usize) -> Result<(Record, Vec<DataIssue>), InputError> {
        let obj = raw.as_object().ok_or_else(|| InputError::Malformed {
            index,
            reason: format!("expected an object, found {}", json_kind(raw)),
        })?;

        let name = match obj.get("name") {
            Some(Value::String(name)) => name.clone(),
            Some(other) => {
                return Err(InputError::Malformed {
                    index,
                    reason: format!("`name` must be a string, found {}", json_kind(other)),
                })
            }
            None => {
                return Err(InputError::Malformed {
                    index,
                    reason: "missing `name`".to_string(),
                })
            }
        };

        let mut shaper = Shaper {
            vocabulary: self,
            index,
            name: &name,
            issues: Vec::new(),
        };

        let record = Record {
            surname: shaper.optional_text(obj, "surname")?,
            coord: shaper.coord(obj.get("coord")),
            altitude: shaper.number(obj, "altitude"),
            places: shaper.number(obj, "places"),
            shelter_type: shaper.shelter_type(obj.get("type"))?,
            info_comp: shaper.info_comp(obj.get("info_comp"))?,
            description: shaper.text_list(obj, "description")?,
            remarque: shaper.text_list(obj, "remarque")?,
            links: shaper.text_list(obj, "links")?,
            region: shaper.optional_text(obj, "region")?,
            departement: shaper.optional_text(obj, "departement")?,
            modified_at: shaper.optional_text(obj, "modified_at")?,
            info_couchage: shaper.optional_text(obj, "info_couchage")?,
            info_eau: shaper.optional_text(obj, "info_eau")?,
            extra: extra_fields(obj),
            name: name.clone(),
        };

        Ok((record, shaper.issues))
    }

    /// Canonical spelling of a type value
    pub fn canonical_type(&self, value: &str) -> String {
        let trimmed = value.trim();
        let lowered = trimmed.to_lowercase();
        if let Some(canonical) = self.type_aliases.get(&lowered) {
            return canonical.clone();
        }
        if self.is_closed(&lowered) || self.is_generic(&lowered) {
            return lowered;
        }
        trimmed.to_string()
    }

    pub fn is_closed(&self, value: &str) -> bool {
        self.closed_types.iter().any(|t| t == value)
    }

    pub fn is_generic(&self, value: &str) -> bool {
        self.generic_types.iter().any(|t| t == value)
    }

    pub fn is_legacy_numeric(&self, key: &str) -> bool {
        self.legacy_numeric_flags.iter().any(|k| k == key)
    }

    /// Resolve two scalar type values for the same shelter.
    ///
    /// A closed value wins, a generic value yields to a specific one, and
    /// anything else keeps `a`.
    pub fn merge_categorical(&self, a: &str, b: &str) -> String {
        if self.is_closed(a) {
            return a.to_string();
        }
        if self.is_closed(b) {
            return b.to_string();
        }
        if self.is_generic(a) && !self.is_generic(b) {
            return b.to_string();
        }
        a.to_string()
    }

    /// Fold a multi-valued type into one value with the categorical rule
    pub fn collapse_type(&self, value: &ShelterType) -> ShelterType {
        let mut canonical: Vec<String> = Vec::new();
        for v in value.values() {
            let c = self.canonical_type(v);
            if !canonical.contains(&c) {
                canonical.push(c);
            }
        }
        let mut iter = canonical.into_iter();
        let first = iter.next().unwrap_or_default();
        let folded = iter.fold(first, |acc, next| self.merge_categorical(&acc, &next));
        ShelterType::Single(folded)
    }

    /// Coerce one raw flag value. `None` means the value is not recognized.
    pub fn coerce_flag(&self, key: &str, raw: &Value) -> Option<u32> {
        match raw {
            Value::Null => Some(0),
            Value::Bool(b) => Some(u32::from(*b)),
            Value::Number(n) => n.as_f64().map(|v| self.flag_from_number(key, v)),
            Value::String(s) => {
                let token = s.trim().trim_end_matches('.').trim().to_lowercase();
                if let Some(value) = self.flag_tokens.get(&token) {
                    return Some(*value);
                }
                token
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .map(|v| self.flag_from_number(key, v))
            }
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    fn flag_from_number(&self, key: &str, value: f64) -> u32 {
        if value < 1.0 {
            0
        } else if self.is_legacy_numeric(key) {
            value.round().min(f64::from(u32::MAX)) as u32
        } else {
            1
        }
    }
}

/// Non-canonical fields, copied verbatim
fn extra_fields(obj: &Map<String, Value>) -> BTreeMap<String, Value> {
    obj.iter()
        .filter(|(key, _)| !Record::CANONICAL_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Per-record shaping state
struct Shaper<'a> {
    vocabulary: &'a Vocabulary,
    index: usize,
    name: &'a str,
    issues: Vec<DataIssue>,
}

impl Shaper<'_> {
    fn malformed(&self, field: &str, found: &Value) -> InputError {
        InputError::Malformed {
            index: self.index,
            reason: format!("`{}` has unsupported kind {}", field, json_kind(found)),
        }
    }

    fn coerced(&mut self, field: &str, raw: &Value, coerced: &str) {
        debug!(record = self.name, field, raw = %raw, coerced, "coerced raw value");
        self.issues.push(DataIssue::NumericCoercion {
            record: self.name.to_string(),
            field: field.to_string(),
            raw: raw.to_string(),
            coerced: coerced.to_string(),
        });
    }

    fn number(&mut self, obj: &Map<String, Value>, field: &str) -> Option<i64> {
        let raw = obj.get(field)?;
        let parsed = match raw {
            Value::Null => return None,
            Value::Number(n) => n.as_f64(),
            Value::String(s) if s.trim().is_empty() => return None,
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match parsed.filter(|v| v.is_finite()) {
            Some(v) => Some(v.round() as i64),
            None => {
                self.coerced(field, raw, "null");
                None
            }
        }
    }

    fn coord(&mut self, raw: Option<&Value>) -> Option<Coord> {
        let raw = raw?;
        if raw.is_null() {
            return None;
        }
        let axis = |key: &str| -> Option<f64> {
            match raw.get(key)? {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }
        };
        match (axis("lat"), axis("long")) {
            (Some(lat), Some(long)) => Some(Coord::new(lat, long)),
            _ => {
                self.coerced("coord", raw, "null");
                None
            }
        }
    }

    fn optional_text(
        &mut self,
        obj: &Map<String, Value>,
        field: &str,
    ) -> Result<Option<String>, InputError> {
        match obj.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(v @ (Value::Number(_) | Value::Bool(_))) => Ok(Some(v.to_string())),
            Some(other) => Err(self.malformed(field, other)),
        }
    }

    fn text_list(
        &mut self,
        obj: &Map<String, Value>,
        field: &str,
    ) -> Result<Vec<String>, InputError> {
        match obj.get(field) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::String(s)) if s.is_empty() => Ok(Vec::new()),
            Some(Value::String(s)) => Ok(vec![s.clone()]),
            Some(Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Null => {}
                        Value::String(s) if s.is_empty() => {}
                        Value::String(s) => out.push(s.clone()),
                        v @ (Value::Number(_) | Value::Bool(_)) => out.push(v.to_string()),
                        other => return Err(self.malformed(field, other)),
                    }
                }
                Ok(out)
            }
            Some(other) => Err(self.malformed(field, other)),
        }
    }

    fn shelter_type(&mut self, raw: Option<&Value>) -> Result<Option<ShelterType>, InputError> {
        let vocabulary = self.vocabulary;
        match raw {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(ShelterType::Single(vocabulary.canonical_type(s)))),
            Some(Value::Array(items)) => {
                let mut values: Vec<String> = Vec::new();
                for item in items {
                    match item {
                        Value::Null => {}
                        Value::String(s) if s.trim().is_empty() => {}
                        Value::String(s) => {
                            let canonical = vocabulary.canonical_type(s);
                            if !values.contains(&canonical) {
                                values.push(canonical);
                            }
                        }
                        other => return Err(self.malformed("type", other)),
                    }
                }
                Ok(match values.len() {
                    0 => None,
                    1 => values.pop().map(ShelterType::Single),
                    _ => Some(ShelterType::Many(values)),
                })
            }
            Some(other) => Err(self.malformed("type", other)),
        }
    }

    fn info_comp(&mut self, raw: Option<&Value>) -> Result<BTreeMap<String, u32>, InputError> {
        let entries = match raw {
            None | Some(Value::Null) => return Ok(BTreeMap::new()),
            Some(Value::Object(entries)) => entries,
            Some(other) => return Err(self.malformed("info_comp", other)),
        };

        let mut flags = BTreeMap::new();
        for (key, value) in entries {
            let flag = match self.vocabulary.coerce_flag(key, value) {
                Some(flag) => flag,
                None => {
                    self.coerced(&format!("info_comp.{}", key), value, "0");
                    0
                }
            };
            flags.insert(key.clone(), flag);
        }
        Ok(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flag_tokens() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.coerce_flag("cheminee", &json!("Sans")), Some(0));
        assert_eq!(vocab.coerce_flag("eau", &json!("Non. ")), Some(0));
        assert_eq!(vocab.coerce_flag("eau", &json!("oui")), Some(1));
        assert_eq!(vocab.coerce_flag("bois", &json!("à apporter")), Some(0));
        assert_eq!(vocab.coerce_flag("bois", &json!(true)), Some(1));
        assert_eq!(vocab.coerce_flag("poele", &json!(2)), Some(1));
        assert_eq!(vocab.coerce_flag("poele", &json!("3")), Some(1));
        assert_eq!(vocab.coerce_flag("eau", &json!("Torrent")), None);
    }

    #[test]
    fn test_legacy_numeric_flag_keeps_count() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.coerce_flag("places_matelas", &json!(6)), Some(6));
        assert_eq!(vocab.coerce_flag("places_matelas", &json!("4")), Some(4));
        assert_eq!(vocab.coerce_flag("places_matelas", &json!(0)), Some(0));
    }

    #[test]
    fn test_canonical_type() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.canonical_type("Fermée"), "fermée");
        assert_eq!(vocab.canonical_type("cabane fermee"), "fermée");
        assert_eq!(vocab.canonical_type("cabane ouverte"), "non gardé");
        assert_eq!(vocab.canonical_type("orri toue abri en pierre"), "orri");
        assert_eq!(vocab.canonical_type(" gardé "), "gardé");
    }

    #[test]
    fn test_merge_categorical() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.merge_categorical("non gardé", "fermée"), "fermée");
        assert_eq!(vocab.merge_categorical("fermée", "orri"), "fermée");
        assert_eq!(vocab.merge_categorical("non gardé", "orri"), "orri");
        assert_eq!(vocab.merge_categorical("orri", "non gardé"), "orri");
        assert_eq!(vocab.merge_categorical("orri", "gardé"), "orri");
    }

    #[test]
    fn test_collapse_type() {
        let vocab = Vocabulary::default();
        let closed = ShelterType::Many(vec!["Fermée".into(), "cabane fermee".into()]);
        assert_eq!(vocab.collapse_type(&closed), ShelterType::Single("fermée".into()));

        let orri = ShelterType::Many(vec![
            "cabane ouverte".into(),
            "orri toue abri en pierre".into(),
        ]);
        assert_eq!(vocab.collapse_type(&orri), ShelterType::Single("orri".into()));

        let shepherd = ShelterType::Many(vec![
            "cabane ouverte".into(),
            "cabane ouverte mais ocupee par le berger l ete".into(),
        ]);
        assert_eq!(
            vocab.collapse_type(&shepherd),
            ShelterType::Single("cabane ouverte mais ocupee par le berger l ete".into())
        );
    }

    #[test]
    fn test_shape_full_record() {
        let vocab = Vocabulary::default();
        let raw = json!({
            "name": "Cabane de l'Estagnol",
            "coord": {"lat": 42.61, "long": "1.4321"},
            "altitude": 2012.6,
            "places": "?",
            "type": ["cabane ouverte"],
            "info_comp": {"cheminee": "Sans", "eau": "Torrent", "places_matelas": 4},
            "description": "Petite cabane",
            "remarque": null,
            "links": ["https://www.refuges.info/point/1"],
            "source": "pyrenees-refuges",
        });

        let (record, issues) = vocab.shape(&raw, 0).unwrap();
        assert_eq!(record.coord, Some(Coord::new(42.61, 1.4321)));
        assert_eq!(record.altitude, Some(2013));
        assert_eq!(record.places, None);
        assert_eq!(record.shelter_type, Some(ShelterType::Single("non gardé".into())));
        assert_eq!(record.flag("cheminee"), 0);
        assert_eq!(record.flag("eau"), 0);
        assert_eq!(record.flag("places_matelas"), 4);
        assert_eq!(record.description, vec!["Petite cabane".to_string()]);
        assert!(record.remarque.is_empty());
        assert_eq!(record.extra.get("source"), Some(&json!("pyrenees-refuges")));

        let fields: Vec<String> = issues
            .iter()
            .filter_map(|issue| match issue {
                DataIssue::NumericCoercion { field, .. } => Some(field.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(fields, vec!["places".to_string(), "info_comp.eau".to_string()]);
    }

    #[test]
    fn test_shape_rejects_nameless_record() {
        let vocab = Vocabulary::default();
        let err = vocab.shape(&json!({"coord": {"lat": 1.0, "long": 2.0}}), 7).unwrap_err();
        assert!(matches!(err, InputError::Malformed { index: 7, .. }));

        let err = vocab.shape(&json!({"name": 12}), 0).unwrap_err();
        assert!(matches!(err, InputError::Malformed { index: 0, .. }));
    }

    #[test]
    fn test_unusable_coord_is_dropped() {
        let vocab = Vocabulary::default();
        let (record, issues) = vocab
            .shape(&json!({"name": "Orri", "coord": {"lat": "n/a", "long": 1.0}}), 0)
            .unwrap();
        assert!(record.coord.is_none());
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn test_record_values_accepts_nodes_wrapper() {
        let values = record_values(json!({"nodes": [{"name": "a"}, {"name": "b"}]})).unwrap();
        assert_eq!(values.len(), 2);
        assert!(record_values(json!({"items": []})).is_err());
        assert!(record_values(json!("refuges")).is_err());
    }
}
