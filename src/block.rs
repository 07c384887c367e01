//! Block type table: `BlockDefinition`, the process-wide `BlockRegistry`,
//! and the in-chunk `Block` value.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Slot index reserved for air. Always present, always not solid/opaque.
pub const AIR: u8 = 0;

/// A single in-chunk voxel. Three bytes: type index, packed light, flags.
///
/// Raw data only — never owning anything, always stored inline in a
/// chunk's block array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Block {
    pub type_index: u8,
    /// High nibble: outdoor (sky) light 0..15. Low nibble: indoor light 0..15.
    light: u8,
    /// Reserved for future per-block flags; unused today.
    pub flags: u8,
}

impl Block {
    pub const AIR: Block = Block { type_index: AIR, light: 0, flags: 0 };

    pub fn new(type_index: u8) -> Self {
        Block { type_index, light: 0, flags: 0 }
    }

    pub fn is_air(&self) -> bool {
        self.type_index == AIR
    }

    pub fn outdoor_light(&self) -> u8 {
        self.light >> 4
    }

    pub fn indoor_light(&self) -> u8 {
        self.light & 0x0F
    }

    pub fn set_light(&mut self, outdoor: u8, indoor: u8) {
        self.light = ((outdoor & 0x0F) << 4) | (indoor & 0x0F);
    }
}

/// A sprite-sheet cell reference `(u, v)` into the texture atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SpriteCoords {
    pub u: u8,
    pub v: u8,
}

/// Immutable per-type configuration. Loaded once at startup and never
/// mutated; looked up by `type_index` for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct BlockDefinition {
    pub name: String,
    pub is_visible: bool,
    pub is_solid: bool,
    pub is_opaque: bool,
    pub top_sprite: SpriteCoords,
    pub bottom_sprite: SpriteCoords,
    pub side_sprite: SpriteCoords,
    pub indoor_lighting: u8,
}

impl BlockDefinition {
    fn air() -> Self {
        BlockDefinition {
            name: "air".to_string(),
            is_visible: false,
            is_solid: false,
            is_opaque: false,
            top_sprite: SpriteCoords { u: 0, v: 0 },
            bottom_sprite: SpriteCoords { u: 0, v: 0 },
            side_sprite: SpriteCoords { u: 0, v: 0 },
            indoor_lighting: 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read block definition file {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("failed to parse block definition file {path}: {source}")]
    Parse { path: String, source: serde_json::Error },
    #[error("block definition table is full (max {0} entries)")]
    TableFull(usize),
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    blocks: Vec<RawBlockDefinition>,
}

#[derive(Debug, Deserialize)]
struct RawBlockDefinition {
    name: String,
    #[serde(rename = "isVisible")]
    is_visible: bool,
    #[serde(rename = "isSolid")]
    is_solid: bool,
    #[serde(rename = "isOpaque")]
    is_opaque: bool,
    #[serde(rename = "topSpriteCoords")]
    top_sprite_coords: [u8; 2],
    #[serde(rename = "bottomSpriteCoords")]
    bottom_sprite_coords: [u8; 2],
    #[serde(rename = "sideSpriteCoords")]
    side_sprite_coords: [u8; 2],
    #[serde(rename = "indoorLighting")]
    indoor_lighting: u8,
}

impl From<RawBlockDefinition> for BlockDefinition {
    fn from(raw: RawBlockDefinition) -> Self {
        BlockDefinition {
            name: raw.name,
            is_visible: raw.is_visible,
            is_solid: raw.is_solid,
            is_opaque: raw.is_opaque,
            top_sprite: SpriteCoords { u: raw.top_sprite_coords[0], v: raw.top_sprite_coords[1] },
            bottom_sprite: SpriteCoords {
                u: raw.bottom_sprite_coords[0],
                v: raw.bottom_sprite_coords[1],
            },
            side_sprite: SpriteCoords {
                u: raw.side_sprite_coords[0],
                v: raw.side_sprite_coords[1],
            },
            indoor_lighting: raw.indoor_lighting,
        }
    }
}

/// Process-wide, ordered block-type table. Slot 0 is always air; the
/// array order is permanent once chunks have been saved against it.
pub struct BlockRegistry {
    definitions: Vec<BlockDefinition>,
}

impl BlockRegistry {
    /// A registry containing only air, useful for tests and as a
    /// fallback before a real definition file has been loaded.
    pub fn empty() -> Self {
        BlockRegistry { definitions: vec![BlockDefinition::air()] }
    }

    /// Loads `{ "blocks": [ ... ] }` from `path`. Array order becomes
    /// `type_index` order; slot 0 is reserved for air and prepended
    /// automatically unless the first entry is already named `"air"`.
    pub fn load_from_json(path: &Path) -> Result<Self, RegistryError> {
        let text = fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let doc: RawDocument =
            serde_json::from_str(&text).map_err(|source| RegistryError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        let mut definitions: Vec<BlockDefinition> = Vec::with_capacity(doc.blocks.len() + 1);
        let mut raw_iter = doc.blocks.into_iter();
        match raw_iter.next() {
            Some(first) if first.name == "air" => definitions.push(first.into()),
            Some(first) => {
                definitions.push(BlockDefinition::air());
                definitions.push(first.into());
            }
            None => definitions.push(BlockDefinition::air()),
        }
        for raw in raw_iter {
            definitions.push(raw.into());
        }

        if definitions.len() > u8::MAX as usize + 1 {
            return Err(RegistryError::TableFull(definitions.len()));
        }

        log::info!("loaded {} block definitions from {}", definitions.len(), path.display());
        Ok(BlockRegistry { definitions })
    }

    /// Table lookup by `type_index`. Always returns a valid definition:
    /// an index past the end of the table falls back to air rather than
    /// returning nothing, fixing the unconditional-null lookup bug
    /// observed in the system this crate is descended from.
    pub fn definition(&self, type_index: u8) -> &BlockDefinition {
        self.definitions.get(type_index as usize).unwrap_or(&self.definitions[0])
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn is_opaque(&self, type_index: u8) -> bool {
        self.definition(type_index).is_opaque
    }

    pub fn is_solid(&self, type_index: u8) -> bool {
        self.definition(type_index).is_solid
    }

    /// Stamps every non-air block's indoor (emission) channel from its
    /// definition's `indoor_lighting`. The RLE save format only persists
    /// `type_index`, not light, so this runs after both generation and
    /// load — otherwise a block's static emission never reaches the mesh
    /// builder's G channel (spec.md 3, 4.4).
    pub fn seed_indoor_lighting(&self, blocks: &mut [Block]) {
        for block in blocks.iter_mut() {
            if block.is_air() {
                continue;
            }
            let indoor = self.definition(block.type_index).indoor_lighting;
            block.set_light(block.outdoor_light(), indoor);
        }
    }

    /// Looks up a `type_index` by definition name. Used by the terrain
    /// generator to resolve its palette once per world rather than
    /// hardcoding type indices.
    pub fn index_of(&self, name: &str) -> Option<u8> {
        self.definitions.iter().position(|def| def.name == name).map(|i| i as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_json(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn air_is_always_slot_zero() {
        let registry = BlockRegistry::empty();
        assert_eq!(registry.definition(0).name, "air");
        assert!(!registry.is_opaque(0));
        assert!(!registry.is_solid(0));
    }

    #[test]
    fn load_from_json_prepends_air_when_missing() {
        let json = r#"{
            "blocks": [
                { "name": "stone", "isVisible": true, "isSolid": true, "isOpaque": true,
                  "topSpriteCoords": [1,0], "bottomSpriteCoords": [1,0],
                  "sideSpriteCoords": [1,0], "indoorLighting": 0 }
            ]
        }"#;
        let file = write_temp_json(json);
        let registry = BlockRegistry::load_from_json(file.path()).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.definition(0).name, "air");
        assert_eq!(registry.definition(1).name, "stone");
        assert!(registry.is_opaque(1));
    }

    #[test]
    fn out_of_range_index_falls_back_to_air() {
        let registry = BlockRegistry::empty();
        let def = registry.definition(200);
        assert_eq!(def.name, "air");
    }

    #[test]
    fn block_light_packs_into_one_byte() {
        let mut block = Block::new(1);
        block.set_light(15, 4);
        assert_eq!(block.outdoor_light(), 15);
        assert_eq!(block.indoor_light(), 4);
    }

    #[test]
    fn seed_indoor_lighting_copies_definition_emission_and_skips_air() {
        let json = r#"{
            "blocks": [
                { "name": "glowstone", "isVisible": true, "isSolid": true, "isOpaque": true,
                  "topSpriteCoords": [2,0], "bottomSpriteCoords": [2,0],
                  "sideSpriteCoords": [2,0], "indoorLighting": 14 }
            ]
        }"#;
        let file = write_temp_json(json);
        let registry = BlockRegistry::load_from_json(file.path()).unwrap();
        let mut blocks = [Block::AIR, Block::new(1)];
        registry.seed_indoor_lighting(&mut blocks);
        assert_eq!(blocks[0].indoor_light(), 0);
        assert_eq!(blocks[1].indoor_light(), 14);
    }
}
