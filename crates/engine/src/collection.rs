//! Dynamic collections of repeatable items.
//!
//! Each collection keeps an editable draft plus an ordered list of committed
//! items. Drafts are validated with the same violations and numeric coercion
//! as ordinary fields; a rejected draft stays in the buffer so it can be
//! corrected in place. Two items never share an identity (trimmed,
//! case-insensitive), and aggregates are computed from the items on demand.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

use crate::numeric;
use crate::types::{
    Animal, AnimalDraft, ForageDraft, ForageEntry, RuleViolation, WaterSource, WaterSourceDraft,
};

/// Largest head count accepted for a single species line.
pub const MAX_ANIMALS_PER_LINE: i64 = 100_000;

const MAX_NAME_LEN: usize = 80;

// ──────────────────────────────────────────────
// Keys and ids
// ──────────────────────────────────────────────

/// The collections a form can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollectionKey {
    Animals,
    Forage,
    WaterSources,
}

impl CollectionKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKey::Animals => "animals",
            CollectionKey::Forage => "forage",
            CollectionKey::WaterSources => "water_sources",
        }
    }

    pub fn parse(s: &str) -> Option<CollectionKey> {
        match s {
            "animals" => Some(CollectionKey::Animals),
            "forage" => Some(CollectionKey::Forage),
            "water_sources" => Some(CollectionKey::WaterSources),
            _ => None,
        }
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CollectionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Stable handle of a committed item. Never reused within a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ItemId(u64);

impl ItemId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// A rejected attribute of a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftViolation {
    pub attribute: &'static str,
    pub violation: RuleViolation,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectionError {
    #[error("'{identity}' is already in the list")]
    Duplicate { identity: String },

    #[error("item is invalid: {}", describe(.0))]
    Invalid(Vec<DraftViolation>),

    #[error("no item with id {}", .0.get())]
    UnknownItem(ItemId),
}

fn describe(violations: &[DraftViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.attribute, v.violation))
        .collect::<Vec<_>>()
        .join("; ")
}

// ──────────────────────────────────────────────
// Items
// ──────────────────────────────────────────────

/// A kind of item that can live in a [`Collection`].
pub trait CollectionItem: Clone + Serialize {
    type Draft: Clone + Default + fmt::Debug;

    const KEY: CollectionKey;

    /// Validate a draft and build the item, or report every bad attribute.
    fn from_draft(draft: &Self::Draft) -> Result<Self, Vec<DraftViolation>>;

    /// Editable copy of a committed item.
    fn to_draft(&self) -> Self::Draft;

    /// Raw identity text; compared after trimming and lowercasing.
    fn identity(&self) -> String;
}

/// Normalised identity used for duplicate detection.
pub fn identity_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn required_text(
    attribute: &'static str,
    raw: &str,
    errors: &mut Vec<DraftViolation>,
) -> Option<String> {
    let text = raw.trim();
    let violation = if text.is_empty() {
        RuleViolation::Required
    } else if text.chars().count() > MAX_NAME_LEN {
        RuleViolation::TooLong { max: MAX_NAME_LEN }
    } else {
        return Some(text.to_string());
    };
    errors.push(DraftViolation {
        attribute,
        violation,
    });
    None
}

fn optional_text(attribute: &'static str, raw: &str, errors: &mut Vec<DraftViolation>) -> String {
    let text = raw.trim();
    if text.chars().count() > MAX_NAME_LEN {
        errors.push(DraftViolation {
            attribute,
            violation: RuleViolation::TooLong { max: MAX_NAME_LEN },
        });
    }
    text.to_string()
}

fn coerced<T>(
    attribute: &'static str,
    raw: &str,
    parse: impl FnOnce(&str) -> Result<T, RuleViolation>,
    errors: &mut Vec<DraftViolation>,
) -> Option<T> {
    if raw.trim().is_empty() {
        errors.push(DraftViolation {
            attribute,
            violation: RuleViolation::Required,
        });
        return None;
    }
    match parse(raw) {
        Ok(v) => Some(v),
        Err(violation) => {
            errors.push(DraftViolation {
                attribute,
                violation,
            });
            None
        }
    }
}

impl CollectionItem for Animal {
    type Draft = AnimalDraft;
    const KEY: CollectionKey = CollectionKey::Animals;

    fn from_draft(draft: &AnimalDraft) -> Result<Self, Vec<DraftViolation>> {
        let mut errors = Vec::new();
        let species = required_text("species", &draft.species, &mut errors);
        let quantity = coerced(
            "quantity",
            &draft.quantity,
            |raw| numeric::parse_integer(raw, 1, MAX_ANIMALS_PER_LINE),
            &mut errors,
        );
        match (species, quantity) {
            (Some(species), Some(quantity)) if errors.is_empty() => Ok(Animal {
                species,
                quantity: u32::try_from(quantity).unwrap_or(u32::MAX),
            }),
            _ => Err(errors),
        }
    }

    fn to_draft(&self) -> AnimalDraft {
        AnimalDraft::new(self.species.clone(), self.quantity.to_string())
    }

    fn identity(&self) -> String {
        self.species.clone()
    }
}

impl CollectionItem for ForageEntry {
    type Draft = ForageDraft;
    const KEY: CollectionKey = CollectionKey::Forage;

    fn from_draft(draft: &ForageDraft) -> Result<Self, Vec<DraftViolation>> {
        let mut errors = Vec::new();
        let forage_type = required_text("type", &draft.forage_type, &mut errors);
        let variety = optional_text("variety", &draft.variety, &mut errors);
        let hectares = coerced(
            "hectares",
            &draft.hectares,
            numeric::parse_positive_decimal,
            &mut errors,
        );
        let usage = optional_text("use", &draft.usage, &mut errors);
        match (forage_type, hectares) {
            (Some(forage_type), Some(hectares)) if errors.is_empty() => Ok(ForageEntry {
                forage_type,
                variety,
                hectares,
                usage,
            }),
            _ => Err(errors),
        }
    }

    fn to_draft(&self) -> ForageDraft {
        ForageDraft::new(
            self.forage_type.clone(),
            self.variety.clone(),
            self.hectares.to_string(),
            self.usage.clone(),
        )
    }

    fn identity(&self) -> String {
        format!("{} {}", self.forage_type, self.variety)
    }
}

impl CollectionItem for WaterSource {
    type Draft = WaterSourceDraft;
    const KEY: CollectionKey = CollectionKey::WaterSources;

    fn from_draft(draft: &WaterSourceDraft) -> Result<Self, Vec<DraftViolation>> {
        let mut errors = Vec::new();
        match required_text("name", &draft.name, &mut errors) {
            Some(name) => Ok(WaterSource { name }),
            None => Err(errors),
        }
    }

    fn to_draft(&self) -> WaterSourceDraft {
        WaterSourceDraft::new(self.name.clone())
    }

    fn identity(&self) -> String {
        self.name.clone()
    }
}

// ──────────────────────────────────────────────
// Collection
// ──────────────────────────────────────────────

/// Ordered list of committed items plus one draft buffer.
#[derive(Debug, Clone)]
pub struct Collection<T: CollectionItem> {
    items: Vec<(ItemId, T)>,
    draft: T::Draft,
    next_id: u64,
}

impl<T: CollectionItem> Default for Collection<T> {
    fn default() -> Self {
        Collection {
            items: Vec::new(),
            draft: T::Draft::default(),
            next_id: 1,
        }
    }
}

impl<T: CollectionItem> Collection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(&self) -> CollectionKey {
        T::KEY
    }

    pub fn draft(&self) -> &T::Draft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut T::Draft {
        &mut self.draft
    }

    /// Validate `draft` and append it.
    ///
    /// On success the draft buffer is cleared. On failure the rejected draft
    /// is kept in the buffer so it can be corrected.
    pub fn add(&mut self, draft: T::Draft) -> Result<ItemId, CollectionError> {
        match self.admit(&draft, None) {
            Ok(item) => {
                let id = ItemId(self.next_id);
                self.next_id += 1;
                self.items.push((id, item));
                self.draft = T::Draft::default();
                Ok(id)
            }
            Err(e) => {
                self.draft = draft;
                Err(e)
            }
        }
    }

    /// Commit whatever is in the draft buffer.
    pub fn commit_draft(&mut self) -> Result<ItemId, CollectionError> {
        let draft = self.draft.clone();
        self.add(draft)
    }

    /// Replace an item in place. Duplicate detection ignores the item itself.
    pub fn update(&mut self, id: ItemId, draft: T::Draft) -> Result<(), CollectionError> {
        let pos = self
            .position(id)
            .ok_or(CollectionError::UnknownItem(id))?;
        let item = self.admit(&draft, Some(id))?;
        self.items[pos].1 = item;
        Ok(())
    }

    pub fn remove(&mut self, id: ItemId) -> Result<T, CollectionError> {
        let pos = self
            .position(id)
            .ok_or(CollectionError::UnknownItem(id))?;
        Ok(self.items.remove(pos).1)
    }

    pub fn get(&self, id: ItemId) -> Option<&T> {
        self.items.iter().find(|(i, _)| *i == id).map(|(_, t)| t)
    }

    /// Committed items in entry order.
    pub fn list(&self) -> Vec<&T> {
        self.items.iter().map(|(_, t)| t).collect()
    }

    pub fn entries(&self) -> &[(ItemId, T)] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.draft = T::Draft::default();
    }

    fn position(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|(i, _)| *i == id)
    }

    fn admit(&self, draft: &T::Draft, skip: Option<ItemId>) -> Result<T, CollectionError> {
        let item = T::from_draft(draft).map_err(CollectionError::Invalid)?;
        let key = identity_key(&item.identity());
        let clash = self
            .items
            .iter()
            .filter(|(i, _)| Some(*i) != skip)
            .any(|(_, existing)| identity_key(&existing.identity()) == key);
        if clash {
            return Err(CollectionError::Duplicate {
                identity: item.identity().trim().to_string(),
            });
        }
        Ok(item)
    }
}

impl Collection<Animal> {
    /// Total head count across all species lines.
    pub fn total_herd(&self) -> u64 {
        self.items.iter().map(|(_, a)| u64::from(a.quantity)).sum()
    }
}

impl Collection<ForageEntry> {
    pub fn total_hectares(&self) -> Decimal {
        self.items
            .iter()
            .map(|(_, f)| f.hectares)
            .sum::<Decimal>()
            .normalize()
    }
}

/// The three collections of one application.
#[derive(Debug, Clone, Default)]
pub struct Collections {
    pub animals: Collection<Animal>,
    pub forage: Collection<ForageEntry>,
    pub water_sources: Collection<WaterSource>,
}

impl Collections {
    /// Number of committed items; drafts never count.
    pub fn len(&self, key: CollectionKey) -> usize {
        match key {
            CollectionKey::Animals => self.animals.len(),
            CollectionKey::Forage => self.forage.len(),
            CollectionKey::WaterSources => self.water_sources.len(),
        }
    }

    pub fn is_empty(&self, key: CollectionKey) -> bool {
        self.len(key) == 0
    }

    /// Committed items of one collection as JSON, in entry order.
    pub fn to_json(&self, key: CollectionKey) -> serde_json::Value {
        fn items<T: CollectionItem>(c: &Collection<T>) -> serde_json::Value {
            serde_json::to_value(c.list()).unwrap_or(serde_json::Value::Array(Vec::new()))
        }
        match key {
            CollectionKey::Animals => items(&self.animals),
            CollectionKey::Forage => items(&self.forage),
            CollectionKey::WaterSources => items(&self.water_sources),
        }
    }

    pub fn clear(&mut self) {
        self.animals.clear();
        self.forage.clear();
        self.water_sources.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    #[test]
    fn duplicate_species_rejected_case_insensitively() {
        let mut animals: Collection<Animal> = Collection::new();
        animals.add(AnimalDraft::new("Vaca", "3")).unwrap();
        let err = animals.add(AnimalDraft::new("vaca ", "2")).unwrap_err();
        assert_eq!(
            err,
            CollectionError::Duplicate {
                identity: "vaca".into()
            }
        );
        assert_eq!(animals.len(), 1);
        // the rejected draft is kept for correction
        assert_eq!(animals.draft().species, "vaca ");
    }

    #[test]
    fn inner_spacing_is_part_of_the_identity() {
        let mut water: Collection<WaterSource> = Collection::new();
        water.add(WaterSourceDraft::new("Quebrada Honda")).unwrap();
        water.add(WaterSourceDraft::new("Quebrada  Honda")).unwrap();
        assert_eq!(water.len(), 2);
        assert!(water.add(WaterSourceDraft::new(" quebrada honda ")).is_err());
    }

    #[test]
    fn invalid_draft_is_retained_with_every_violation() {
        let mut animals: Collection<Animal> = Collection::new();
        let err = animals.add(AnimalDraft::new("  ", "cero")).unwrap_err();
        match err {
            CollectionError::Invalid(v) => {
                assert_eq!(v.len(), 2);
                assert_eq!(v[0].attribute, "species");
                assert_eq!(v[1].violation, RuleViolation::NotANumber);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(animals.draft().quantity, "cero");
        assert!(animals.is_empty());

        animals.draft_mut().species = "Toro".into();
        animals.draft_mut().quantity = "1".into();
        animals.commit_draft().unwrap();
        assert_eq!(animals.len(), 1);
        assert_eq!(animals.draft(), &AnimalDraft::default());
    }

    #[test]
    fn zero_quantity_is_out_of_range() {
        let mut animals: Collection<Animal> = Collection::new();
        let err = animals.add(AnimalDraft::new("Cabra", "0")).unwrap_err();
        assert_eq!(
            err,
            CollectionError::Invalid(vec![DraftViolation {
                attribute: "quantity",
                violation: RuleViolation::OutOfRange {
                    min: 1,
                    max: MAX_ANIMALS_PER_LINE
                },
            }])
        );
    }

    #[test]
    fn ids_are_stable_and_never_reused() {
        let mut sources: Collection<WaterSource> = Collection::new();
        let a = sources.add(WaterSourceDraft::new("Pozo")).unwrap();
        let b = sources.add(WaterSourceDraft::new("Quebrada")).unwrap();
        sources.remove(a).unwrap();
        let c = sources.add(WaterSourceDraft::new("Pozo")).unwrap();
        assert!(c > b);
        assert_eq!(sources.get(b).map(|s| s.name.as_str()), Some("Quebrada"));
        assert_eq!(sources.remove(a), Err(CollectionError::UnknownItem(a)));
    }

    #[test]
    fn update_checks_duplicates_against_other_items() {
        let mut animals: Collection<Animal> = Collection::new();
        let vaca = animals.add(AnimalDraft::new("Vaca", "3")).unwrap();
        animals.add(AnimalDraft::new("Toro", "1")).unwrap();

        animals.update(vaca, AnimalDraft::new("VACA", "5")).unwrap();
        assert_eq!(animals.total_herd(), 6);

        let err = animals.update(vaca, AnimalDraft::new("toro", "5")).unwrap_err();
        assert!(matches!(err, CollectionError::Duplicate { .. }));
    }

    #[test]
    fn forage_identity_is_type_and_variety() {
        let mut forage: Collection<ForageEntry> = Collection::new();
        forage
            .add(ForageDraft::new("Pasto", "Brachiaria", "2,5", "pastoreo"))
            .unwrap();
        forage
            .add(ForageDraft::new("Pasto", "Estrella", "1.25", "pastoreo"))
            .unwrap();
        let err = forage
            .add(ForageDraft::new(" pasto ", "BRACHIARIA", "1", "corte"))
            .unwrap_err();
        assert!(matches!(err, CollectionError::Duplicate { .. }));
        assert_eq!(forage.total_hectares(), Decimal::from_str("3.75").unwrap());
    }

    #[test]
    fn items_keep_entry_order() {
        let mut animals: Collection<Animal> = Collection::new();
        animals.add(AnimalDraft::new("Vaca", "3")).unwrap();
        animals.add(AnimalDraft::new("Toro", "1")).unwrap();
        let species: Vec<_> = animals.list().iter().map(|a| a.species.clone()).collect();
        assert_eq!(species, vec!["Vaca", "Toro"]);
        assert_eq!(animals.total_herd(), 4);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(u8, u32),
        Remove(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..6, 1u32..500).prop_map(|(s, q)| Op::Add(s, q)),
            (0usize..8).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn total_herd_is_sum_of_current_quantities(ops in prop::collection::vec(op(), 0..40)) {
            let mut animals: Collection<Animal> = Collection::new();
            for op in ops {
                match op {
                    Op::Add(species, qty) => {
                        let _ = animals.add(AnimalDraft::new(format!("species-{species}"), qty.to_string()));
                    }
                    Op::Remove(idx) => {
                        if let Some((id, _)) = animals.entries().get(idx).cloned() {
                            animals.remove(id).unwrap();
                        }
                    }
                }
                let expected: u64 = animals.list().iter().map(|a| u64::from(a.quantity)).sum();
                prop_assert_eq!(animals.total_herd(), expected);
            }
        }
    }
}
