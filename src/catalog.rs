//! Catalog of placeable items.
//!
//! A catalog is a static lookup table mapping item keys to display text and
//! asset paths. It is loaded once at startup and never mutated at runtime.
//! The built-in table covers a set of common medical instruments; hosts can
//! replace it wholesale with [`Catalog::from_entries`] or
//! [`Catalog::from_json_str`].

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// One placeable item: key, user-facing text, and the asset it loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Stable lookup key (also used by [`ArCommand::SelectItem`](crate::ArCommand::SelectItem)).
    pub key: String,
    /// Name shown in the selection list and info panel.
    pub display_name: String,
    /// Path to the glTF asset, relative to the asset root.
    pub asset_path: String,
    /// Short description shown in the info panel.
    pub description: String,
}

/// Key and display name pair used to populate host selection lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogListing {
    /// Stable lookup key.
    pub key: String,
    /// Name shown in the selection list.
    pub display_name: String,
}

/// Immutable item table, keyed by string identifier.
#[derive(Resource, Debug, Clone)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::medical_kit()
    }
}

impl Catalog {
    /// Build a catalog from pre-constructed entries, rejecting duplicate keys.
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self, CatalogError> {
        let mut seen = std::collections::HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.key.clone()) {
                return Err(CatalogError::DuplicateKey(entry.key.clone()));
            }
        }
        Ok(Self { entries })
    }

    /// Parse a catalog from a JSON array of entries.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(json)?;
        Self::from_entries(entries)
    }

    /// Look up an entry by key.
    pub fn get(&self, key: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|entry| entry.key == key)
    }

    /// All entries, in listing order.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Key/name pairs for populating a host selection list.
    pub fn listings(&self) -> Vec<CatalogListing> {
        self.entries
            .iter()
            .map(|entry| CatalogListing {
                key: entry.key.clone(),
                display_name: entry.display_name.clone(),
            })
            .collect()
    }

    /// The built-in medical instrument table.
    pub fn medical_kit() -> Self {
        let entry = |key: &str, name: &str, path: &str, description: &str| CatalogEntry {
            key: key.to_owned(),
            display_name: name.to_owned(),
            asset_path: path.to_owned(),
            description: description.to_owned(),
        };
        Self {
            entries: vec![
                entry(
                    "iv-fluid",
                    "IV Fluid Bag",
                    "models/iv_fluid.glb",
                    "Sterile fluid bag for intravenous infusion therapy.",
                ),
                entry(
                    "medical-scissors",
                    "Medical Scissors",
                    "models/medical_scissors.glb",
                    "Blunt-tipped scissors for cutting dressings and tape.",
                ),
                entry(
                    "gauze",
                    "Gauze",
                    "models/gauze.glb",
                    "Absorbent woven pad for wound dressing.",
                ),
                entry(
                    "oximeter",
                    "Pulse Oximeter",
                    "models/oximeter.glb",
                    "Fingertip clip measuring blood oxygen saturation and pulse.",
                ),
                entry(
                    "penlight",
                    "Penlight",
                    "models/penlight.glb",
                    "Pocket light for examining pupil response and the throat.",
                ),
                entry(
                    "bandage",
                    "Bandage Roll",
                    "models/bandage.glb",
                    "Elastic roll for securing dressings and supporting joints.",
                ),
                entry(
                    "reflex-hammer",
                    "Reflex Hammer",
                    "models/reflex_hammer.glb",
                    "Rubber-headed hammer for testing deep tendon reflexes.",
                ),
                entry(
                    "stethoscope",
                    "Stethoscope",
                    "models/stethoscope.glb",
                    "Acoustic instrument for listening to heart and lung sounds.",
                ),
                entry(
                    "syringe",
                    "Syringe",
                    "models/syringe.glb",
                    "Graduated barrel and plunger for drawing and injecting fluids.",
                ),
                entry(
                    "blood-pressure-monitor",
                    "Blood Pressure Monitor",
                    "models/blood_pressure_monitor.glb",
                    "Cuff and gauge for measuring arterial blood pressure.",
                ),
                entry(
                    "iv-pole",
                    "IV Pole",
                    "models/iv_pole.glb",
                    "Wheeled stand holding infusion bags at height.",
                ),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_is_complete_and_unique() {
        let catalog = Catalog::medical_kit();
        assert_eq!(catalog.entries().len(), 11);
        assert_eq!(catalog.listings().len(), 11);

        let stethoscope = catalog.get("stethoscope").unwrap();
        assert_eq!(stethoscope.display_name, "Stethoscope");
        assert!(stethoscope.asset_path.ends_with(".glb"));

        assert!(catalog.get("tricorder").is_none());
    }

    #[test]
    fn json_roundtrip() {
        let json = r#"[
            {
                "key": "probe",
                "display_name": "Probe",
                "asset_path": "models/probe.glb",
                "description": "A probe."
            }
        ]"#;
        let catalog = Catalog::from_json_str(json).unwrap();
        assert_eq!(catalog.get("probe").unwrap().display_name, "Probe");
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let entry = CatalogEntry {
            key: "probe".into(),
            display_name: "Probe".into(),
            asset_path: "models/probe.glb".into(),
            description: String::new(),
        };
        let err = Catalog::from_entries(vec![entry.clone(), entry]).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateKey(key) if key == "probe"));
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(matches!(
            Catalog::from_json_str("not json"),
            Err(CatalogError::Parse(_))
        ));
    }
}
