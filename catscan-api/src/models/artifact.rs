//! Stored image artifacts and the slots that hold them
//!
//! An artifact lives in the external artifact store and is referenced locally
//! by its opaque id and retrievable URL. Both halves are always present
//! together: a slot is either fully populated or empty.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

use super::UnknownVariant;

/// Kinds of artifact slots
///
/// Images use original/preview/roi/remove_bg; result details use
/// roi/heatmap; results use landmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Original,
    /// Bounding-box preview
    Preview,
    /// Region of interest
    Roi,
    RemoveBg,
    Heatmap,
    Landmark,
}

impl SlotKind {
    /// Slots carried by a scan image
    pub const IMAGE_SLOTS: [SlotKind; 4] = [
        SlotKind::Original,
        SlotKind::Preview,
        SlotKind::Roi,
        SlotKind::RemoveBg,
    ];

    /// Slots carried by a result detail
    pub const DETAIL_SLOTS: [SlotKind; 2] = [SlotKind::Roi, SlotKind::Heatmap];

    /// Column prefix in the database (`<prefix>_id`, `<prefix>_url`)
    pub fn column_prefix(&self) -> &'static str {
        match self {
            SlotKind::Original => "original",
            SlotKind::Preview => "preview",
            SlotKind::Roi => "roi",
            SlotKind::RemoveBg => "remove_bg",
            SlotKind::Heatmap => "heatmap",
            SlotKind::Landmark => "landmark",
        }
    }

    pub fn id_column(&self) -> String {
        format!("{}_id", self.column_prefix())
    }

    pub fn url_column(&self) -> String {
        format!("{}_url", self.column_prefix())
    }
}

impl FromStr for SlotKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "original" => Ok(SlotKind::Original),
            "preview" => Ok(SlotKind::Preview),
            "roi" => Ok(SlotKind::Roi),
            "remove_bg" => Ok(SlotKind::RemoveBg),
            "heatmap" => Ok(SlotKind::Heatmap),
            "landmark" => Ok(SlotKind::Landmark),
            other => Err(UnknownVariant::new("artifact slot", other)),
        }
    }
}

/// Artifact slot errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtifactError {
    #[error("{slot:?} artifact has an id but no url")]
    MissingUrl { slot: SlotKind },

    #[error("{slot:?} artifact has a url but no id")]
    MissingId { slot: SlotKind },

    #[error("{slot:?} is not a valid slot here")]
    SlotNotAllowed { slot: SlotKind },
}

/// A stored artifact reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub url: String,
}

impl Artifact {
    /// Build a slot value from optional halves
    ///
    /// Blank strings count as absent. Returns `Ok(None)` when both halves are
    /// absent and an error when exactly one is present.
    pub fn from_parts(
        slot: SlotKind,
        id: Option<String>,
        url: Option<String>,
    ) -> Result<Option<Self>, ArtifactError> {
        let id = id.filter(|s| !s.trim().is_empty());
        let url = url.filter(|s| !s.trim().is_empty());

        match (id, url) {
            (Some(id), Some(url)) => Ok(Some(Self { id, url })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(ArtifactError::MissingUrl { slot }),
            (None, Some(_)) => Err(ArtifactError::MissingId { slot }),
        }
    }
}

/// Artifact pair as received on the wire, halves optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Mapping from slot kind to a populated artifact
///
/// Empty slots are simply absent from the map, so a half-populated slot
/// cannot be represented.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactSlots(BTreeMap<SlotKind, Artifact>);

impl ArtifactSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate wire input against the allowed slot kinds
    pub fn from_inputs(
        inputs: BTreeMap<SlotKind, ArtifactInput>,
        allowed: &[SlotKind],
    ) -> Result<Self, ArtifactError> {
        let mut slots = Self::new();
        for (slot, input) in inputs {
            if !allowed.contains(&slot) {
                return Err(ArtifactError::SlotNotAllowed { slot });
            }
            if let Some(artifact) = Artifact::from_parts(slot, input.id, input.url)? {
                slots.set(slot, artifact);
            }
        }
        Ok(slots)
    }

    pub fn get(&self, slot: SlotKind) -> Option<&Artifact> {
        self.0.get(&slot)
    }

    /// Populate a slot, replacing any previous artifact
    pub fn set(&mut self, slot: SlotKind, artifact: Artifact) {
        self.0.insert(slot, artifact);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotKind, &Artifact)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }

    /// Id/url column values for a slot, in that order
    pub fn columns(&self, slot: SlotKind) -> (Option<&str>, Option<&str>) {
        match self.get(slot) {
            Some(a) => (Some(a.id.as_str()), Some(a.url.as_str())),
            None => (None, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(id: Option<&str>, url: Option<&str>) -> ArtifactInput {
        ArtifactInput {
            id: id.map(String::from),
            url: url.map(String::from),
        }
    }

    #[test]
    fn test_from_parts_requires_both_halves() {
        assert_eq!(
            Artifact::from_parts(SlotKind::Roi, Some("a".into()), None),
            Err(ArtifactError::MissingUrl { slot: SlotKind::Roi })
        );
        assert_eq!(
            Artifact::from_parts(SlotKind::Roi, None, Some("http://x".into())),
            Err(ArtifactError::MissingId { slot: SlotKind::Roi })
        );
        assert_eq!(Artifact::from_parts(SlotKind::Roi, None, None), Ok(None));
    }

    #[test]
    fn test_blank_strings_are_absent() {
        assert_eq!(
            Artifact::from_parts(SlotKind::Original, Some("  ".into()), Some(String::new())),
            Ok(None)
        );
    }

    #[test]
    fn test_from_inputs_skips_empty_slots() {
        let mut inputs = BTreeMap::new();
        inputs.insert(SlotKind::Original, input(Some("f1"), Some("http://s/f1")));
        inputs.insert(SlotKind::Preview, input(None, None));

        let slots = ArtifactSlots::from_inputs(inputs, &SlotKind::IMAGE_SLOTS).unwrap();

        assert_eq!(slots.len(), 1);
        assert_eq!(slots.get(SlotKind::Original).unwrap().id, "f1");
        assert!(slots.get(SlotKind::Preview).is_none());
    }

    #[test]
    fn test_from_inputs_rejects_foreign_slot() {
        let mut inputs = BTreeMap::new();
        inputs.insert(SlotKind::Heatmap, input(Some("h"), Some("http://s/h")));

        assert_eq!(
            ArtifactSlots::from_inputs(inputs, &SlotKind::IMAGE_SLOTS),
            Err(ArtifactError::SlotNotAllowed { slot: SlotKind::Heatmap })
        );
    }

    #[test]
    fn test_slots_serialize_as_snake_case_map() {
        let mut slots = ArtifactSlots::new();
        slots.set(
            SlotKind::RemoveBg,
            Artifact {
                id: "b1".into(),
                url: "http://s/b1".into(),
            },
        );

        let json = serde_json::to_value(&slots).unwrap();
        assert_eq!(json["remove_bg"]["id"], "b1");
        assert_eq!(slots.columns(SlotKind::RemoveBg), (Some("b1"), Some("http://s/b1")));
        assert_eq!(slots.columns(SlotKind::Roi), (None, None));
    }

    #[test]
    fn test_slot_names_parse() {
        assert_eq!("remove_bg".parse::<SlotKind>(), Ok(SlotKind::RemoveBg));
        assert_eq!("preview".parse::<SlotKind>(), Ok(SlotKind::Preview));
        assert!("thumbnail".parse::<SlotKind>().is_err());
    }
}
