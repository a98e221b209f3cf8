//! Styling-variable publishing
//!
//! Derived values reach the rendering layer as named string variables. All
//! writes belonging to one frame are collected in a [`VariableBatch`] and
//! committed at once, so a reader never observes a half-updated frame.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::color::{OklabColor, Rgb};

/// Prefix shared by every published variable
pub const VARIABLE_PREFIX: &str = "--chroma-";

/// Layout version of the published variable set
pub const SCHEMA_VERSION: u32 = 1;

/// Variable carrying [`SCHEMA_VERSION`]
pub const SCHEMA_VERSION_VARIABLE: &str = "--chroma-schema-version";

/// Full variable name for `suffix`
pub fn variable_name(suffix: &str) -> String {
    format!("{}{}", VARIABLE_PREFIX, suffix)
}

/// Palette role of a published color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorRole {
    /// Anchor color
    Primary,
    /// First harmonic
    Secondary,
    /// Second harmonic
    Accent,
}

impl ColorRole {
    /// All roles in publish order
    pub const ALL: [ColorRole; 3] = [ColorRole::Primary, ColorRole::Secondary, ColorRole::Accent];

    /// Variable stem
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Accent => "accent",
        }
    }
}

/// Variable writes for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableBatch {
    entries: BTreeMap<String, String>,
}

impl VariableBatch {
    /// Empty batch stamped with the schema version
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(SCHEMA_VERSION_VARIABLE.to_string(), SCHEMA_VERSION.to_string());
        Self { entries }
    }

    /// Set a raw value; `suffix` is appended to [`VARIABLE_PREFIX`]
    pub fn set(&mut self, suffix: &str, value: impl Into<String>) {
        self.entries.insert(variable_name(suffix), value.into());
    }

    /// Set a number with fixed precision. Non-finite values publish as 0.
    pub fn set_number(&mut self, suffix: &str, value: f32) {
        let value = if value.is_finite() { value } else { 0.0 };
        self.set(suffix, format!("{:.4}", value));
    }

    /// Publish `<role>` as hex and `<role>-rgb` as an `r,g,b` triplet
    pub fn set_color(&mut self, role: ColorRole, rgb: Rgb) {
        let stem = role.as_str();
        self.set(stem, rgb.to_hex());
        self.set(&format!("{}-rgb", stem), rgb.to_triplet());
    }

    /// Publish the OKLab and LCh components of `<role>`
    pub fn set_oklab(&mut self, role: ColorRole, color: OklabColor) {
        let stem = role.as_str();
        let lch = color.to_lch();
        self.set_number(&format!("{}-l", stem), color.l);
        self.set_number(&format!("{}-a", stem), color.a);
        self.set_number(&format!("{}-b", stem), color.b);
        self.set_number(&format!("{}-chroma", stem), lch.c);
        self.set_number(&format!("{}-hue", stem), lch.h);
    }

    /// Value for a full variable name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Number of variables, including the schema version
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Never true: a batch always carries the schema version
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Variables in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Default for VariableBatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Write-only sink for committed batches.
///
/// Implementations must apply a batch atomically.
pub trait VariableStore: Send + Sync {
    /// Apply every write in `batch`
    fn commit(&self, batch: VariableBatch);
}

impl<T: VariableStore + ?Sized> VariableStore for Arc<T> {
    fn commit(&self, batch: VariableBatch) {
        (**self).commit(batch)
    }
}

/// Point-in-time view of a [`SharedVariableStore`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableSnapshot {
    /// Number of batches committed so far
    pub generation: u64,
    /// All variables
    pub values: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct StoreInner {
    generation: u64,
    values: BTreeMap<String, String>,
}

/// In-memory store shared between the frame loop and readers
#[derive(Debug, Clone, Default)]
pub struct SharedVariableStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl SharedVariableStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a full variable name
    pub fn get(&self, name: &str) -> Option<String> {
        self.inner.read().values.get(name).cloned()
    }

    /// Number of committed batches
    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    /// Consistent copy of every variable
    pub fn snapshot(&self) -> VariableSnapshot {
        let inner = self.inner.read();
        VariableSnapshot {
            generation: inner.generation,
            values: inner.values.clone(),
        }
    }
}

impl VariableStore for SharedVariableStore {
    fn commit(&self, batch: VariableBatch) {
        let mut inner = self.inner.write();
        inner.values.extend(batch.entries);
        inner.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_carries_schema_version() {
        let batch = VariableBatch::new();
        assert_eq!(batch.get(SCHEMA_VERSION_VARIABLE), Some("1"));
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_color_and_oklab_variables() {
        let mut batch = VariableBatch::new();
        let rgb = Rgb::new(203, 166, 247);
        batch.set_color(ColorRole::Accent, rgb);
        batch.set_oklab(ColorRole::Accent, OklabColor::from(rgb));

        assert_eq!(batch.get("--chroma-accent"), Some("#cba6f7"));
        assert_eq!(batch.get("--chroma-accent-rgb"), Some("203,166,247"));
        for suffix in ["l", "a", "b", "chroma", "hue"] {
            assert!(batch.get(&format!("--chroma-accent-{}", suffix)).is_some());
        }
    }

    #[test]
    fn test_non_finite_numbers_publish_zero() {
        let mut batch = VariableBatch::new();
        batch.set_number("pulse-intensity", f32::NAN);
        assert_eq!(batch.get("--chroma-pulse-intensity"), Some("0.0000"));
    }

    #[test]
    fn test_store_commit_is_whole_batch() {
        let store = SharedVariableStore::new();
        let reader = store.clone();

        let mut batch = VariableBatch::new();
        batch.set_number("visual-intensity", 0.5);
        batch.set("mood", "calm");
        store.commit(batch);

        let snapshot = reader.snapshot();
        assert_eq!(snapshot.generation, 1);
        assert_eq!(snapshot.values.len(), 3);
        assert_eq!(reader.get("--chroma-mood").as_deref(), Some("calm"));
    }

    #[test]
    fn test_store_through_arc_dyn() {
        let store = SharedVariableStore::new();
        let sink: Arc<dyn VariableStore> = Arc::new(store.clone());
        sink.commit(VariableBatch::new());
        sink.commit(VariableBatch::new());
        assert_eq!(store.generation(), 2);
    }
}
