//! Material definitions, priority ordering, and overlay texture slots.
//!
//! Materials are authored externally and supplied to the engine wholesale;
//! the engine only references them by id.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// External asset library entry: an id the host can resolve to image data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLibraryItem {
    pub id: String,
    pub url: String,
}

/// Lookup over the externally-supplied asset list.
#[derive(Debug, Clone, Default)]
pub struct AssetLibrary {
    items: HashMap<String, AssetLibraryItem>,
}

impl AssetLibrary {
    /// Build a library from the host's asset list.
    pub fn new(items: Vec<AssetLibraryItem>) -> Self {
        Self {
            items: items.into_iter().map(|i| (i.id.clone(), i)).collect(),
        }
    }

    /// Look up an asset by id.
    pub fn get(&self, id: &str) -> Option<&AssetLibraryItem> {
        self.items.get(id)
    }

    /// Whether the library contains the given id.
    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }
}

/// How a material's base texture may be rotated per cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationMode {
    /// Random quarter-turn rotation rolled once per placement.
    #[default]
    Random90,
    /// Always drawn upright.
    None,
}

/// Texture slots for a material: the base look plus edge/corner blending
/// art. Every slot is an asset id; `None` means "not authored", while
/// `Some("")` is an explicitly empty slot that inference must respect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialTextures {
    pub base: Option<String>,
    pub edge_horizontal: Option<String>,
    pub edge_vertical: Option<String>,
    /// Legacy single edge texture, rotated to the needed orientation.
    pub edge: Option<String>,
    pub corner_ne: Option<String>,
    pub corner_nw: Option<String>,
    pub corner_se: Option<String>,
    pub corner_sw: Option<String>,
    /// Single rotatable corner texture, rotated to the needed corner.
    pub corner: Option<String>,
    /// Legacy corner pair applied via mirroring instead of rotation.
    pub corner_horizontal: Option<String>,
    pub corner_vertical: Option<String>,
}

impl MaterialTextures {
    /// True when no overlay slot (everything but `base`) was authored at
    /// all, which is the only case where inference may run.
    pub fn overlays_unauthored(&self) -> bool {
        self.edge_horizontal.is_none()
            && self.edge_vertical.is_none()
            && self.edge.is_none()
            && self.corner_ne.is_none()
            && self.corner_nw.is_none()
            && self.corner_se.is_none()
            && self.corner_sw.is_none()
            && self.corner.is_none()
            && self.corner_horizontal.is_none()
            && self.corner_vertical.is_none()
    }
}

/// An externally-authored tile material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialDefinition {
    pub id: String,
    /// Integer ranking deciding which of two adjacent materials paints
    /// the blending edge/corner.
    pub priority: i32,
    /// Position in the authored definition list; breaks priority ties.
    pub definition_index: usize,
    #[serde(default)]
    pub rotation_mode: RotationMode,
    /// When set, this material never paints overlays onto neighbors.
    #[serde(default)]
    pub no_overlay: bool,
    #[serde(default)]
    pub textures: MaterialTextures,
}

/// The full material set for a board, swapped wholesale by the host.
#[derive(Debug, Clone, Default)]
pub struct MaterialSet {
    by_id: HashMap<String, MaterialDefinition>,
}

impl MaterialSet {
    /// Build a set from the authored definition list, running texture
    /// inference against the asset library for materials that define no
    /// overlay art of their own.
    pub fn new(mut definitions: Vec<MaterialDefinition>, library: &AssetLibrary) -> Self {
        for def in &mut definitions {
            if def.textures.overlays_unauthored() {
                infer_overlay_textures(&mut def.textures, library);
            }
        }
        Self {
            by_id: definitions.into_iter().map(|d| (d.id.clone(), d)).collect(),
        }
    }

    /// Parse the host's JSON definition list.
    pub fn from_json(json: &str, library: &AssetLibrary) -> Result<Self, serde_json::Error> {
        let definitions: Vec<MaterialDefinition> = serde_json::from_str(json)?;
        Ok(Self::new(definitions, library))
    }

    /// Look up a material by id.
    pub fn get(&self, id: &str) -> Option<&MaterialDefinition> {
        self.by_id.get(id)
    }

    /// Decide whether material `a` paints a blending overlay onto a cell
    /// occupied by `b` (`None` = empty cell).
    ///
    /// False when the materials are the same or `a` opts out; otherwise a
    /// strict total order: higher priority wins, ties broken by the later
    /// definition index. Empty cells always receive overlays.
    pub fn should_overlay(&self, a: &str, b: Option<&str>) -> bool {
        let Some(mat_a) = self.by_id.get(a) else {
            return false;
        };
        if mat_a.no_overlay {
            return false;
        }
        let Some(b) = b else {
            return true;
        };
        if a == b {
            return false;
        }
        let Some(mat_b) = self.by_id.get(b) else {
            return true;
        };
        if mat_a.priority != mat_b.priority {
            mat_a.priority > mat_b.priority
        } else {
            mat_a.definition_index > mat_b.definition_index
        }
    }
}

/// Suffixes tried against the base asset id, most specific first.
/// Both historical corner spellings are accepted.
const INFERENCE_SUFFIXES: &[(&str, Slot)] = &[
    ("_overlay_ne_corner", Slot::CornerNe),
    ("_overlay_corner_ne", Slot::CornerNe),
    ("_overlay_nw_corner", Slot::CornerNw),
    ("_overlay_corner_nw", Slot::CornerNw),
    ("_overlay_se_corner", Slot::CornerSe),
    ("_overlay_corner_se", Slot::CornerSe),
    ("_overlay_sw_corner", Slot::CornerSw),
    ("_overlay_corner_sw", Slot::CornerSw),
    ("_overlay_horizontal", Slot::EdgeHorizontal),
    ("_overlay_vertical", Slot::EdgeVertical),
    ("_overlay_corner", Slot::Corner),
    ("_overlay", Slot::Edge),
];

#[derive(Debug, Clone, Copy)]
enum Slot {
    EdgeHorizontal,
    EdgeVertical,
    Edge,
    CornerNe,
    CornerNw,
    CornerSe,
    CornerSw,
    Corner,
}

/// Fill overlay slots by matching the asset library's naming convention
/// against the material's base asset id. Only ids actually present in
/// the library are accepted; the first (most specific) match per slot
/// wins.
fn infer_overlay_textures(textures: &mut MaterialTextures, library: &AssetLibrary) {
    let Some(base) = textures.base.clone() else {
        return;
    };
    for (suffix, slot) in INFERENCE_SUFFIXES {
        let candidate = format!("{base}{suffix}");
        if !library.contains(&candidate) {
            continue;
        }
        let target = match slot {
            Slot::EdgeHorizontal => &mut textures.edge_horizontal,
            Slot::EdgeVertical => &mut textures.edge_vertical,
            Slot::Edge => &mut textures.edge,
            Slot::CornerNe => &mut textures.corner_ne,
            Slot::CornerNw => &mut textures.corner_nw,
            Slot::CornerSe => &mut textures.corner_se,
            Slot::CornerSw => &mut textures.corner_sw,
            Slot::Corner => &mut textures.corner,
        };
        if target.is_none() {
            *target = Some(candidate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material(id: &str, priority: i32, index: usize) -> MaterialDefinition {
        MaterialDefinition {
            id: id.to_string(),
            priority,
            definition_index: index,
            rotation_mode: RotationMode::Random90,
            no_overlay: false,
            textures: MaterialTextures::default(),
        }
    }

    fn library(ids: &[&str]) -> AssetLibrary {
        AssetLibrary::new(
            ids.iter()
                .map(|id| AssetLibraryItem {
                    id: (*id).to_string(),
                    url: format!("https://assets.example/{id}.png"),
                })
                .collect(),
        )
    }

    #[test]
    fn test_priority_decides() {
        let set = MaterialSet::new(
            vec![material("grass", 2, 0), material("dirt", 1, 1)],
            &AssetLibrary::default(),
        );
        assert!(set.should_overlay("grass", Some("dirt")));
        assert!(!set.should_overlay("dirt", Some("grass")));
    }

    #[test]
    fn test_tie_broken_by_definition_index() {
        let set = MaterialSet::new(
            vec![material("a", 5, 0), material("b", 5, 1)],
            &AssetLibrary::default(),
        );
        // Exactly one direction wins, decided solely by index
        assert!(set.should_overlay("b", Some("a")));
        assert!(!set.should_overlay("a", Some("b")));
    }

    #[test]
    fn test_same_material_never_overlays() {
        let set = MaterialSet::new(vec![material("a", 5, 0)], &AssetLibrary::default());
        assert!(!set.should_overlay("a", Some("a")));
    }

    #[test]
    fn test_no_overlay_flag() {
        let mut quiet = material("quiet", 9, 0);
        quiet.no_overlay = true;
        let set = MaterialSet::new(vec![quiet, material("b", 1, 1)], &AssetLibrary::default());
        assert!(!set.should_overlay("quiet", Some("b")));
        assert!(!set.should_overlay("quiet", None));
    }

    #[test]
    fn test_empty_cell_receives_overlay() {
        let set = MaterialSet::new(vec![material("a", 1, 0)], &AssetLibrary::default());
        assert!(set.should_overlay("a", None));
    }

    #[test]
    fn test_inference_fills_unauthored_slots() {
        let lib = library(&[
            "stone",
            "stone_overlay_horizontal",
            "stone_overlay_vertical",
            "stone_overlay_corner",
        ]);
        let mut def = material("stone", 1, 0);
        def.textures.base = Some("stone".to_string());
        let set = MaterialSet::new(vec![def], &lib);

        let textures = &set.get("stone").unwrap().textures;
        assert_eq!(
            textures.edge_horizontal.as_deref(),
            Some("stone_overlay_horizontal")
        );
        assert_eq!(
            textures.edge_vertical.as_deref(),
            Some("stone_overlay_vertical")
        );
        assert_eq!(textures.corner.as_deref(), Some("stone_overlay_corner"));
    }

    #[test]
    fn test_inference_prefers_named_corners() {
        let lib = library(&[
            "sand",
            "sand_overlay_ne_corner",
            "sand_overlay_nw_corner",
            "sand_overlay_se_corner",
            "sand_overlay_sw_corner",
            "sand_overlay_corner",
        ]);
        let mut def = material("sand", 1, 0);
        def.textures.base = Some("sand".to_string());
        let set = MaterialSet::new(vec![def], &lib);

        let textures = &set.get("sand").unwrap().textures;
        assert_eq!(textures.corner_ne.as_deref(), Some("sand_overlay_ne_corner"));
        assert_eq!(textures.corner_sw.as_deref(), Some("sand_overlay_sw_corner"));
        // The generic corner still lands in its own slot; selection
        // prefers the fully-named family at composite time.
        assert_eq!(textures.corner.as_deref(), Some("sand_overlay_corner"));
    }

    #[test]
    fn test_inference_never_overrides_authored_config() {
        let lib = library(&["wood", "wood_overlay"]);
        let mut def = material("wood", 1, 0);
        def.textures.base = Some("wood".to_string());
        // Explicitly authored (even if empty): inference must not run
        def.textures.edge = Some(String::new());
        let set = MaterialSet::new(vec![def], &lib);

        let textures = &set.get("wood").unwrap().textures;
        assert_eq!(textures.edge.as_deref(), Some(""));
        assert!(textures.edge_horizontal.is_none());
    }

    #[test]
    fn test_definition_json_roundtrip() {
        let json = r#"[
            {
                "id": "grass",
                "priority": 3,
                "definition_index": 0,
                "rotation_mode": "random90",
                "textures": { "base": "grass" }
            },
            { "id": "water", "priority": 1, "definition_index": 1, "rotation_mode": "none" }
        ]"#;
        let set = MaterialSet::from_json(json, &AssetLibrary::default()).unwrap();
        assert_eq!(set.get("grass").unwrap().priority, 3);
        assert_eq!(set.get("water").unwrap().rotation_mode, RotationMode::None);
        assert!(!set.get("water").unwrap().no_overlay);
    }
}
