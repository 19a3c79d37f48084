use crate::grid::{Color, TileCatalog};
use crate::tile_keys::TileKeyError;

/// Atlas slot of the map's own tile set.
pub const MAP_TILE_SET: TileSetId = TileSetId(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct TileSetId(pub u32);

/// Straight RGBA8 pixels, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileImage {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl TileImage {
    /// `None` when `rgba` does not hold exactly `width * height` pixels.
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Option<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(4)?;
        if rgba.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            rgba,
        })
    }

    pub fn filled(width: u32, height: u32, color: [u8; 4]) -> Self {
        let rgba = color
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            rgba,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let bytes = self.rgba.get(offset..offset + 4)?;
        Some([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn crop(&self, left: u32, top: u32, width: u32, height: u32) -> Self {
        let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
        let row_bytes = width as usize * 4;
        for y in top..top + height {
            let start = (y as usize * self.width as usize + left as usize) * 4;
            rgba.extend_from_slice(&self.rgba[start..start + row_bytes]);
        }
        Self {
            width,
            height,
            rgba,
        }
    }
}

/// One tile set: sliced tile images plus the names pointing into them.
#[derive(Debug, Clone)]
pub struct TileAtlas {
    source: String,
    tile_width: u32,
    tile_height: u32,
    tiles: Vec<TileImage>,
    catalog: TileCatalog,
}

impl TileAtlas {
    /// Cuts `sheet` row-major into `tile_width x tile_height` tiles; partial
    /// tiles at the right and bottom edges are dropped. Pixels matching
    /// `color_key` become transparent.
    pub fn slice(
        source: impl Into<String>,
        sheet: &TileImage,
        tile_width: u32,
        tile_height: u32,
        color_key: Option<Color>,
        catalog: TileCatalog,
    ) -> Result<Self, TileKeyError> {
        let columns = sheet.width.checked_div(tile_width).unwrap_or(0);
        let rows = sheet.height.checked_div(tile_height).unwrap_or(0);
        let mut tiles = Vec::with_capacity(columns as usize * rows as usize);
        for row in 0..rows {
            for column in 0..columns {
                let mut tile =
                    sheet.crop(column * tile_width, row * tile_height, tile_width, tile_height);
                if let Some(key) = color_key {
                    apply_color_key(&mut tile, key);
                }
                tiles.push(tile);
            }
        }
        let tile_count = u32::try_from(tiles.len()).unwrap_or(u32::MAX);
        Ok(Self {
            source: source.into(),
            tile_width,
            tile_height,
            tiles,
            catalog: catalog.with_tile_count(tile_count)?,
        })
    }

    /// An atlas whose image could not be loaded. Names still resolve; every
    /// tile draws as a flat fallback.
    pub fn without_images(
        source: impl Into<String>,
        tile_width: u32,
        tile_height: u32,
        catalog: TileCatalog,
    ) -> Self {
        Self {
            source: source.into(),
            tile_width,
            tile_height,
            tiles: Vec::new(),
            catalog,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tile_size(&self) -> (u32, u32) {
        (self.tile_width, self.tile_height)
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn tile(&self, index: u32) -> Option<&TileImage> {
        self.tiles.get(index as usize)
    }

    pub fn catalog(&self) -> &TileCatalog {
        &self.catalog
    }
}

fn apply_color_key(tile: &mut TileImage, key: Color) {
    for pixel in tile.rgba.chunks_exact_mut(4) {
        if pixel[..3] == key {
            pixel[3] = 0;
        }
    }
}

/// Atlases addressed by `TileSetId`; slot 0 is the map's tile set.
#[derive(Debug, Clone, Default)]
pub struct TileAtlases {
    atlases: Vec<TileAtlas>,
}

impl TileAtlases {
    pub fn push(&mut self, atlas: TileAtlas) -> TileSetId {
        self.atlases.push(atlas);
        TileSetId((self.atlases.len() - 1) as u32)
    }

    pub fn get(&self, id: TileSetId) -> Option<&TileAtlas> {
        self.atlases.get(id.0 as usize)
    }

    pub fn find_by_source(&self, source: &str) -> Option<TileSetId> {
        self.atlases
            .iter()
            .position(|atlas| atlas.source == source)
            .map(|index| TileSetId(index as u32))
    }

    pub fn len(&self) -> usize {
        self.atlases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atlases.is_empty()
    }
}
