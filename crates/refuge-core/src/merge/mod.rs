//! Field merge for matched records
//!
//! Two records judged to describe the same shelter are combined field by
//! field. Which rule applies to which field is data ([`MergePolicy`]), so a
//! run can override it from configuration. Every merge reports which side
//! each field came from.

mod pairs;

pub use pairs::{merge_pairs, NamePair, PairMergeOutcome, UnresolvedPair, UnresolvedReason};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::config::EngineConfig;
use crate::domain::{Coord, Record, ShelterType};
use crate::error::ConfigError;
use crate::vocabulary::Vocabulary;

/// Mergeable record fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Coord,
    Altitude,
    Places,
    /// `name` and `surname` together
    Name,
    Links,
    #[serde(rename = "type")]
    Type,
    Description,
    Remarque,
    InfoComp,
    Region,
    Departement,
    ModifiedAt,
    InfoCouchage,
    InfoEau,
    /// Every non-canonical field
    Extra,
}

/// Shape of a field's value, which decides the strategies it admits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Coordinate,
    Numeric,
    Names,
    LinkSet,
    Categorical,
    TextList,
    Flags,
    OptionalText,
    Extra,
}

impl Field {
    pub const ALL: [Field; 15] = [
        Field::Coord,
        Field::Altitude,
        Field::Places,
        Field::Name,
        Field::Links,
        Field::Type,
        Field::Description,
        Field::Remarque,
        Field::InfoComp,
        Field::Region,
        Field::Departement,
        Field::ModifiedAt,
        Field::InfoCouchage,
        Field::InfoEau,
        Field::Extra,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Coord => "coord",
            Field::Altitude => "altitude",
            Field::Places => "places",
            Field::Name => "name",
            Field::Links => "links",
            Field::Type => "type",
            Field::Description => "description",
            Field::Remarque => "remarque",
            Field::InfoComp => "info_comp",
            Field::Region => "region",
            Field::Departement => "departement",
            Field::ModifiedAt => "modified_at",
            Field::InfoCouchage => "info_couchage",
            Field::InfoEau => "info_eau",
            Field::Extra => "extra",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Field::Coord => FieldKind::Coordinate,
            Field::Altitude | Field::Places => FieldKind::Numeric,
            Field::Name => FieldKind::Names,
            Field::Links => FieldKind::LinkSet,
            Field::Type => FieldKind::Categorical,
            Field::Description | Field::Remarque => FieldKind::TextList,
            Field::InfoComp => FieldKind::Flags,
            Field::Region
            | Field::Departement
            | Field::ModifiedAt
            | Field::InfoCouchage
            | Field::InfoEau => FieldKind::OptionalText,
            Field::Extra => FieldKind::Extra,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "surname" {
            return Ok(Field::Name);
        }
        Field::ALL
            .iter()
            .find(|f| f.as_str() == s)
            .copied()
            .ok_or_else(|| ConfigError::UnknownField(s.to_string()))
    }
}

/// Conflict-resolution rule for one field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStrategy {
    /// Coordinate with more decimal digits; tie keeps the left one
    MostPrecise,
    /// Larger value; zero or absent yields to the other side
    NumericMax,
    /// Value of the side carrying the provenance marker, falling back to the other
    PrimarySource,
    /// Order-preserving union without duplicates
    UnionList,
    /// Left then right, duplicates kept
    Concat,
    /// Closed wins, generic yields, otherwise left; lists are unioned
    Categorical,
    /// Key-wise OR; legacy numeric keys prefer the non-zero count
    FlagOr,
    /// Left when present, otherwise right
    PreferNonNull,
}

impl FieldStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldStrategy::MostPrecise => "most_precise",
            FieldStrategy::NumericMax => "numeric_max",
            FieldStrategy::PrimarySource => "primary_source",
            FieldStrategy::UnionList => "union_list",
            FieldStrategy::Concat => "concat",
            FieldStrategy::Categorical => "categorical",
            FieldStrategy::FlagOr => "flag_or",
            FieldStrategy::PreferNonNull => "prefer_non_null",
        }
    }

    /// Whether this strategy can combine values of `kind`
    pub fn supports(&self, kind: FieldKind) -> bool {
        use FieldKind::*;
        match self {
            FieldStrategy::PrimarySource => true,
            FieldStrategy::MostPrecise => kind == Coordinate,
            FieldStrategy::NumericMax => kind == Numeric,
            FieldStrategy::UnionList => matches!(kind, LinkSet | TextList | Categorical),
            FieldStrategy::Concat => matches!(kind, LinkSet | TextList),
            FieldStrategy::Categorical => kind == Categorical,
            FieldStrategy::FlagOr => kind == Flags,
            FieldStrategy::PreferNonNull => kind != Names,
        }
    }
}

impl fmt::Display for FieldStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field-to-strategy table
#[derive(Debug, Clone, PartialEq)]
pub struct MergePolicy {
    strategies: BTreeMap<Field, FieldStrategy>,
}

impl Default for MergePolicy {
    fn default() -> Self {
        let strategies = Field::ALL
            .iter()
            .map(|&field| {
                let strategy = match field {
                    Field::Coord => FieldStrategy::MostPrecise,
                    Field::Altitude | Field::Places => FieldStrategy::NumericMax,
                    Field::Name => FieldStrategy::PrimarySource,
                    Field::Links => FieldStrategy::UnionList,
                    Field::Type => FieldStrategy::Categorical,
                    Field::Description | Field::Remarque => FieldStrategy::Concat,
                    Field::InfoComp => FieldStrategy::FlagOr,
                    Field::Region
                    | Field::Departement
                    | Field::ModifiedAt
                    | Field::InfoCouchage
                    | Field::InfoEau
                    | Field::Extra => FieldStrategy::PreferNonNull,
                };
                (field, strategy)
            })
            .collect();
        Self { strategies }
    }
}

impl MergePolicy {
    pub fn strategy(&self, field: Field) -> FieldStrategy {
        self.strategies
            .get(&field)
            .copied()
            .unwrap_or(FieldStrategy::PreferNonNull)
    }

    /// Replace the strategy of one field
    pub fn with_override(
        mut self,
        field: Field,
        strategy: FieldStrategy,
    ) -> Result<Self, ConfigError> {
        if !strategy.supports(field.kind()) {
            return Err(ConfigError::UnsupportedStrategy {
                field: field.to_string(),
                strategy: strategy.to_string(),
            });
        }
        self.strategies.insert(field, strategy);
        Ok(self)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, FieldStrategy)> + '_ {
        self.strategies.iter().map(|(f, s)| (*f, *s))
    }
}

/// Which input a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

/// Origin of one merged field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    Left,
    Right,
    /// Values from both sides were combined
    Both,
}

impl From<Side> for FieldSource {
    fn from(side: Side) -> Self {
        match side {
            Side::Left => FieldSource::Left,
            Side::Right => FieldSource::Right,
        }
    }
}

/// Merged record and the audit of where its fields came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeResult {
    pub merged: Record,
    /// Side whose links carry the provenance marker (left when ambiguous)
    pub primary: Side,
    pub fields_from_left: Vec<String>,
    pub fields_from_right: Vec<String>,
    pub fields_combined: Vec<String>,
}

impl MergeResult {
    fn note(&mut self, field: impl Into<String>, source: FieldSource) {
        let field = field.into();
        match source {
            FieldSource::Left => self.fields_from_left.push(field),
            FieldSource::Right => self.fields_from_right.push(field),
            FieldSource::Both => self.fields_combined.push(field),
        }
    }
}

/// Applies a merge policy and completes output records
#[derive(Debug, Clone)]
pub struct Merger {
    policy: MergePolicy,
    vocabulary: Vocabulary,
    provenance_marker: String,
    required_flags: Vec<String>,
    collapse_type_lists: bool,
}

impl Default for Merger {
    fn default() -> Self {
        Self {
            policy: MergePolicy::default(),
            vocabulary: Vocabulary::default(),
            provenance_marker: "refuges.info".to_string(),
            required_flags: EngineConfig::default().merge.required_flags,
            collapse_type_lists: false,
        }
    }
}

impl Merger {
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            policy: config.merge_policy()?,
            vocabulary: config.vocabulary.clone(),
            provenance_marker: config.merge.provenance_marker.clone(),
            required_flags: config.merge.required_flags.clone(),
            collapse_type_lists: config.merge.collapse_type_lists,
        })
    }

    pub fn policy(&self) -> &MergePolicy {
        &self.policy
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Side whose links contain the provenance marker; left when neither or both do
    pub fn primary_side(&self, a: &Record, b: &Record) -> Side {
        if !a.has_provenance(&self.provenance_marker) && b.has_provenance(&self.provenance_marker)
        {
            Side::Right
        } else {
            Side::Left
        }
    }

    /// Combine two records describing the same shelter. `a` is the left record.
    pub fn merge(&self, a: &Record, b: &Record) -> MergeResult {
        let primary = self.primary_side(a, b);
        let mut result = MergeResult {
            merged: Record::default(),
            primary,
            fields_from_left: Vec::new(),
            fields_from_right: Vec::new(),
            fields_combined: Vec::new(),
        };
        let mut merged = Record::default();

        // Names: primary keeps `name`, the other side becomes `surname`
        let (main, other) = match primary {
            Side::Left => (a, b),
            Side::Right => (b, a),
        };
        merged.name = main.name.clone();
        merged.surname = if !other.name.is_empty() {
            Some(other.name.clone())
        } else {
            other.surname.clone().or_else(|| main.surname.clone())
        };
        result.note("name", primary.into());
        result.note("surname", opposite(primary));

        let (coord, source) = self.merge_coord(a, b, primary);
        merged.coord = coord;
        result.note(Field::Coord.as_str(), source);

        let (altitude, source) = self.merge_number(Field::Altitude, a.altitude, b.altitude, primary);
        merged.altitude = altitude;
        result.note(Field::Altitude.as_str(), source);

        let (places, source) = self.merge_number(Field::Places, a.places, b.places, primary);
        merged.places = places;
        result.note(Field::Places.as_str(), source);

        let (links, source) = self.merge_text_list(Field::Links, &a.links, &b.links, primary);
        merged.links = links;
        result.note(Field::Links.as_str(), source);

        let (shelter_type, source) = self.merge_type(a, b, primary);
        merged.shelter_type = shelter_type;
        result.note(Field::Type.as_str(), source);

        let (description, source) =
            self.merge_text_list(Field::Description, &a.description, &b.description, primary);
        merged.description = description;
        result.note(Field::Description.as_str(), source);

        let (remarque, source) =
            self.merge_text_list(Field::Remarque, &a.remarque, &b.remarque, primary);
        merged.remarque = remarque;
        result.note(Field::Remarque.as_str(), source);

        let (info_comp, source) = self.merge_flags(a, b, primary);
        merged.info_comp = info_comp;
        result.note(Field::InfoComp.as_str(), source);

        for (field, left, right, slot) in [
            (Field::Region, &a.region, &b.region, &mut merged.region),
            (
                Field::Departement,
                &a.departement,
                &b.departement,
                &mut merged.departement,
            ),
            (
                Field::ModifiedAt,
                &a.modified_at,
                &b.modified_at,
                &mut merged.modified_at,
            ),
            (
                Field::InfoCouchage,
                &a.info_couchage,
                &b.info_couchage,
                &mut merged.info_couchage,
            ),
            (Field::InfoEau, &a.info_eau, &b.info_eau, &mut merged.info_eau),
        ] {
            let (value, source) = self.merge_optional(field, left, right, primary);
            *slot = value;
            result.note(field.as_str(), source);
        }

        for (key, value, source) in self.merge_extra(a, b, primary) {
            merged.extra.insert(key.clone(), value);
            result.note(key, source);
        }

        result.merged = merged;
        result
    }

    /// Fill the required info_comp flags with 0 and, when configured, fold
    /// multi-valued types into one value.
    pub fn complete(&self, mut record: Record) -> Record {
        for flag in &self.required_flags {
            record.info_comp.entry(flag.clone()).or_insert(0);
        }
        if self.collapse_type_lists {
            if let Some(t) = record.shelter_type.as_ref().filter(|t| t.is_list()) {
                record.shelter_type = Some(self.vocabulary.collapse_type(t));
            }
        }
        record
    }

    fn merge_coord(&self, a: &Record, b: &Record, primary: Side) -> (Option<Coord>, FieldSource) {
        match self.policy.strategy(Field::Coord) {
            FieldStrategy::MostPrecise => most_precise_coord(a.coord.as_ref(), b.coord.as_ref()),
            FieldStrategy::PrimarySource => from_primary(&a.coord, &b.coord, primary),
            _ => prefer_non_null(&a.coord, &b.coord),
        }
    }

    fn merge_number(
        &self,
        field: Field,
        a: Option<i64>,
        b: Option<i64>,
        primary: Side,
    ) -> (Option<i64>, FieldSource) {
        match self.policy.strategy(field) {
            FieldStrategy::NumericMax => {
                let merged = merge_numeric(a, b);
                let source = if merged == a || merged.is_none() {
                    FieldSource::Left
                } else {
                    FieldSource::Right
                };
                (merged, source)
            }
            FieldStrategy::PrimarySource => from_primary(&a, &b, primary),
            _ => prefer_non_null(&a, &b),
        }
    }

    fn merge_text_list(
        &self,
        field: Field,
        a: &[String],
        b: &[String],
        primary: Side,
    ) -> (Vec<String>, FieldSource) {
        let source = match (a.is_empty(), b.is_empty()) {
            (false, false) => FieldSource::Both,
            (true, false) => FieldSource::Right,
            _ => FieldSource::Left,
        };
        match self.policy.strategy(field) {
            FieldStrategy::UnionList => (merge_list(a, b), source),
            FieldStrategy::Concat => (concat(a, b), source),
            FieldStrategy::PrimarySource => {
                let (main, other) = match primary {
                    Side::Left => (a, b),
                    Side::Right => (b, a),
                };
                if main.is_empty() && !other.is_empty() {
                    (other.to_vec(), opposite(primary))
                } else {
                    (main.to_vec(), primary.into())
                }
            }
            _ => {
                if a.is_empty() && !b.is_empty() {
                    (b.to_vec(), FieldSource::Right)
                } else {
                    (a.to_vec(), FieldSource::Left)
                }
            }
        }
    }

    fn merge_type(
        &self,
        a: &Record,
        b: &Record,
        primary: Side,
    ) -> (Option<ShelterType>, FieldSource) {
        let (ta, tb) = match (&a.shelter_type, &b.shelter_type) {
            (Some(ta), Some(tb)) => (ta, tb),
            _ => return prefer_non_null(&a.shelter_type, &b.shelter_type),
        };
        match self.policy.strategy(Field::Type) {
            FieldStrategy::Categorical => match (ta, tb) {
                (ShelterType::Single(x), ShelterType::Single(y)) => {
                    let value = self.vocabulary.merge_categorical(x, y);
                    let source = if &value == x {
                        FieldSource::Left
                    } else {
                        FieldSource::Right
                    };
                    (Some(ShelterType::Single(value)), source)
                }
                _ => (Some(union_types(ta, tb)), FieldSource::Both),
            },
            FieldStrategy::UnionList => (Some(union_types(ta, tb)), FieldSource::Both),
            FieldStrategy::PrimarySource => {
                from_primary(&a.shelter_type, &b.shelter_type, primary)
            }
            _ => prefer_non_null(&a.shelter_type, &b.shelter_type),
        }
    }

    fn merge_flags(
        &self,
        a: &Record,
        b: &Record,
        primary: Side,
    ) -> (BTreeMap<String, u32>, FieldSource) {
        match self.policy.strategy(Field::InfoComp) {
            FieldStrategy::PrimarySource => {
                let (main, other) = match primary {
                    Side::Left => (&a.info_comp, &b.info_comp),
                    Side::Right => (&b.info_comp, &a.info_comp),
                };
                if main.is_empty() && !other.is_empty() {
                    (other.clone(), opposite(primary))
                } else {
                    (main.clone(), primary.into())
                }
            }
            FieldStrategy::PreferNonNull => {
                if a.info_comp.is_empty() && !b.info_comp.is_empty() {
                    (b.info_comp.clone(), FieldSource::Right)
                } else {
                    (a.info_comp.clone(), FieldSource::Left)
                }
            }
            _ => {
                let source = match (a.info_comp.is_empty(), b.info_comp.is_empty()) {
                    (false, false) => FieldSource::Both,
                    (true, false) => FieldSource::Right,
                    _ => FieldSource::Left,
                };
                (
                    merge_info_comp(&a.info_comp, &b.info_comp, &self.vocabulary),
                    source,
                )
            }
        }
    }

    fn merge_optional(
        &self,
        field: Field,
        a: &Option<String>,
        b: &Option<String>,
        primary: Side,
    ) -> (Option<String>, FieldSource) {
        match self.policy.strategy(field) {
            FieldStrategy::PrimarySource => from_primary(a, b, primary),
            _ => prefer_non_null(a, b),
        }
    }

    fn merge_extra(&self, a: &Record, b: &Record, primary: Side) -> Vec<(String, Value, FieldSource)> {
        let use_primary = self.policy.strategy(Field::Extra) == FieldStrategy::PrimarySource;
        let mut keys: Vec<&String> = a.extra.keys().collect();
        for key in b.extra.keys() {
            if !a.extra.contains_key(key) {
                keys.push(key);
            }
        }

        keys.into_iter()
            .map(|key| {
                let left = a.extra.get(key).filter(|v| !v.is_null()).cloned();
                let right = b.extra.get(key).filter(|v| !v.is_null()).cloned();
                let (value, source) = if use_primary {
                    from_primary(&left, &right, primary)
                } else {
                    prefer_non_null(&left, &right)
                };
                (key.clone(), value.unwrap_or(Value::Null), source)
            })
            .collect()
    }
}

fn opposite(side: Side) -> FieldSource {
    match side {
        Side::Left => FieldSource::Right,
        Side::Right => FieldSource::Left,
    }
}

/// Larger of two values, treating zero and absent as unknown.
///
/// When both are unknown the left value wins, so an explicit zero survives.
pub fn merge_numeric(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a.filter(|v| *v != 0), b.filter(|v| *v != 0)) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (Some(x), None) => Some(x),
        (None, Some(y)) => Some(y),
        (None, None) => a.or(b),
    }
}

/// Order-preserving union without duplicates
pub fn merge_list(a: &[String], b: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(a.len() + b.len());
    for item in a.iter().chain(b) {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

/// `a` followed by `b`
pub fn concat(a: &[String], b: &[String]) -> Vec<String> {
    a.iter().chain(b).cloned().collect()
}

/// Key-wise OR over the union of keys.
///
/// Legacy numeric keys keep a count: the left one unless it is zero.
pub fn merge_info_comp(
    a: &BTreeMap<String, u32>,
    b: &BTreeMap<String, u32>,
    vocabulary: &Vocabulary,
) -> BTreeMap<String, u32> {
    a.keys()
        .chain(b.keys())
        .map(|key| {
            let x = a.get(key).copied().unwrap_or(0);
            let y = b.get(key).copied().unwrap_or(0);
            let value = if vocabulary.is_legacy_numeric(key) {
                if x != 0 {
                    x
                } else {
                    y
                }
            } else {
                u32::from(x >= 1 || y >= 1)
            };
            (key.clone(), value)
        })
        .collect()
}

/// Coordinate with more decimal digits. Valid beats invalid; ties keep `a`.
pub fn most_precise_coord(a: Option<&Coord>, b: Option<&Coord>) -> (Option<Coord>, FieldSource) {
    let valid_a = a.filter(|c| c.is_valid());
    let valid_b = b.filter(|c| c.is_valid());
    match (valid_a, valid_b) {
        (Some(x), Some(y)) if y.precision() > x.precision() => (Some(*y), FieldSource::Right),
        (Some(x), _) => (Some(*x), FieldSource::Left),
        (None, Some(y)) => (Some(*y), FieldSource::Right),
        (None, None) => match (a, b) {
            (None, Some(y)) => (Some(*y), FieldSource::Right),
            _ => (a.copied(), FieldSource::Left),
        },
    }
}

/// `a` when present, otherwise `b`
pub fn prefer_non_null<T: Clone>(a: &Option<T>, b: &Option<T>) -> (Option<T>, FieldSource) {
    match (a, b) {
        (None, Some(y)) => (Some(y.clone()), FieldSource::Right),
        _ => (a.clone(), FieldSource::Left),
    }
}

fn from_primary<T: Clone>(a: &Option<T>, b: &Option<T>, primary: Side) -> (Option<T>, FieldSource) {
    match primary {
        Side::Left => prefer_non_null(a, b),
        Side::Right => match (b, a) {
            (None, Some(x)) => (Some(x.clone()), FieldSource::Left),
            _ => (b.clone(), FieldSource::Right),
        },
    }
}

fn union_types(a: &ShelterType, b: &ShelterType) -> ShelterType {
    let mut values: Vec<String> = Vec::new();
    for v in a.values().into_iter().chain(b.values()) {
        if !values.iter().any(|existing| existing == v) {
            values.push(v.to_string());
        }
    }
    if values.len() == 1 {
        ShelterType::Single(values.remove(0))
    } else {
        ShelterType::Many(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_merge_numeric() {
        assert_eq!(merge_numeric(Some(5), None), Some(5));
        assert_eq!(merge_numeric(None, None), None);
        assert_eq!(merge_numeric(Some(3), Some(7)), Some(7));
        assert_eq!(merge_numeric(Some(0), Some(4)), Some(4));
        assert_eq!(merge_numeric(Some(0), None), Some(0));
        assert_eq!(merge_numeric(None, Some(0)), Some(0));
    }

    #[test]
    fn test_merge_list() {
        assert_eq!(
            merge_list(&strings(&["a", "b"]), &strings(&["b", "c"])),
            strings(&["a", "b", "c"])
        );
        assert_eq!(
            concat(&strings(&["x"]), &strings(&["x", "y"])),
            strings(&["x", "x", "y"])
        );
    }

    #[test]
    fn test_merge_info_comp_or_and_legacy() {
        let vocab = Vocabulary::default();
        let a: BTreeMap<String, u32> =
            [("eau".to_string(), 0), ("bois".to_string(), 1), ("places_matelas".to_string(), 0)]
                .into_iter()
                .collect();
        let b: BTreeMap<String, u32> =
            [("eau".to_string(), 1), ("cheminee".to_string(), 0), ("places_matelas".to_string(), 6)]
                .into_iter()
                .collect();

        let merged = merge_info_comp(&a, &b, &vocab);
        assert_eq!(merged["eau"], 1);
        assert_eq!(merged["bois"], 1);
        assert_eq!(merged["cheminee"], 0);
        assert_eq!(merged["places_matelas"], 6);
    }

    #[test]
    fn test_most_precise_coord() {
        let coarse = Coord::new(42.801, 0.627);
        let fine = Coord::new(42.8011, 0.6271);
        assert_eq!(most_precise_coord(Some(&coarse), Some(&fine)).0, Some(fine));
        assert_eq!(most_precise_coord(Some(&fine), Some(&coarse)).0, Some(fine));

        let twin = Coord::new(42.802, 0.628);
        assert_eq!(
            most_precise_coord(Some(&coarse), Some(&twin)),
            (Some(coarse), FieldSource::Left)
        );

        let broken = Coord::new(142.80111, 0.62711);
        assert_eq!(most_precise_coord(Some(&broken), Some(&coarse)).0, Some(coarse));
    }

    #[test]
    fn test_primary_side_by_provenance() {
        let merger = Merger::default();
        let plain = Record::new("Cabane Areng");
        let linked = Record::new("Cabane d'Areng").with_link("https://www.refuges.info/point/12");

        assert_eq!(merger.primary_side(&plain, &linked), Side::Right);
        assert_eq!(merger.primary_side(&linked, &plain), Side::Left);
        assert_eq!(merger.primary_side(&plain, &plain), Side::Left);
        assert_eq!(merger.primary_side(&linked, &linked), Side::Left);
    }

    #[test]
    fn test_merge_names_follow_primary() {
        let merger = Merger::default();
        let left = Record::new("Cabane Areng").with_link("https://pyrenees-refuges.com/fr/affiche.php?numenr=1");
        let right = Record::new("Cabane d'Areng").with_link("https://www.refuges.info/point/12");

        let result = merger.merge(&left, &right);
        assert_eq!(result.primary, Side::Right);
        assert_eq!(result.merged.name, "Cabane d'Areng");
        assert_eq!(result.merged.surname.as_deref(), Some("Cabane Areng"));
        assert_eq!(result.merged.links.len(), 2);
        assert_eq!(result.merged.links[0], left.links[0]);
    }

    #[test]
    fn test_merge_type_rules() {
        let merger = Merger::default();
        let closed = Record::new("a").with_type("fermée");
        let open = Record::new("b").with_type("non gardé");
        let orri = Record::new("c").with_type("orri");

        let merged = merger.merge(&open, &closed).merged;
        assert_eq!(merged.shelter_type, Some(ShelterType::Single("fermée".into())));

        let merged = merger.merge(&open, &orri).merged;
        assert_eq!(merged.shelter_type, Some(ShelterType::Single("orri".into())));

        let mut listed = Record::new("d");
        listed.shelter_type = Some(ShelterType::Many(vec!["orri".into(), "gardé".into()]));
        let merged = merger.merge(&orri, &listed).merged;
        assert_eq!(
            merged.shelter_type,
            Some(ShelterType::Many(vec!["orri".into(), "gardé".into()]))
        );
    }

    #[test]
    fn test_merge_keeps_every_field() {
        let merger = Merger::default();
        let mut left = Record::new("Refugi de Baborte").with_altitude(2438);
        left.description = strings(&["left text"]);
        left.region = Some("Catalunya".into());
        left.extra.insert("source_id".into(), json!(17));
        left.extra.insert("owner".into(), Value::Null);

        let mut right = Record::new("Refuge de Baborte").with_places(10);
        right.description = strings(&["right text"]);
        right.departement = Some("Ariège".into());
        right.info_eau = Some("Source à 5min".into());
        right.extra.insert("owner".into(), json!("Commune"));
        right.extra.insert("ele_source".into(), json!("api"));

        let result = merger.merge(&left, &right);
        let merged = &result.merged;
        assert_eq!(merged.altitude, Some(2438));
        assert_eq!(merged.places, Some(10));
        assert_eq!(merged.description, strings(&["left text", "right text"]));
        assert_eq!(merged.region.as_deref(), Some("Catalunya"));
        assert_eq!(merged.departement.as_deref(), Some("Ariège"));
        assert_eq!(merged.info_eau.as_deref(), Some("Source à 5min"));
        assert_eq!(merged.extra["source_id"], json!(17));
        assert_eq!(merged.extra["owner"], json!("Commune"));
        assert_eq!(merged.extra["ele_source"], json!("api"));

        assert!(result.fields_combined.contains(&"description".to_string()));
        assert!(result.fields_from_right.contains(&"places".to_string()));
        assert!(result.fields_from_left.contains(&"altitude".to_string()));
    }

    #[test]
    fn test_complete_fills_required_flags() {
        let merger = Merger::default();
        let record = merger.complete(Record::new("Orri").with_flag("eau", 1));
        assert_eq!(record.flag("eau"), 1);
        assert_eq!(record.info_comp.get("mezzanine/etage"), Some(&0));
        assert_eq!(record.info_comp.len(), 8);
    }

    #[test]
    fn test_complete_collapses_types_when_configured() {
        let mut config = EngineConfig::default();
        config.merge.collapse_type_lists = true;
        let merger = Merger::from_config(&config).unwrap();

        let mut record = Record::new("Cabane");
        record.shelter_type = Some(ShelterType::Many(vec!["Fermée".into(), "cabane fermee".into()]));
        let record = merger.complete(record);
        assert_eq!(record.shelter_type, Some(ShelterType::Single("fermée".into())));
    }

    #[test]
    fn test_policy_override() {
        let policy = MergePolicy::default()
            .with_override(Field::Places, FieldStrategy::PrimarySource)
            .unwrap();
        assert_eq!(policy.strategy(Field::Places), FieldStrategy::PrimarySource);
        assert!(MergePolicy::default()
            .with_override(Field::InfoComp, FieldStrategy::Concat)
            .is_err());
        assert_eq!("surname".parse::<Field>().unwrap(), Field::Name);
    }

    #[test]
    fn test_primary_source_override_takes_primary_value() {
        let mut config = EngineConfig::default();
        config
            .merge
            .strategies
            .insert("places".into(), FieldStrategy::PrimarySource);
        let merger = Merger::from_config(&config).unwrap();

        let left = Record::new("a").with_places(12);
        let right = Record::new("b")
            .with_places(4)
            .with_link("https://www.refuges.info/point/3");
        assert_eq!(merger.merge(&left, &right).merged.places, Some(4));
    }
}
