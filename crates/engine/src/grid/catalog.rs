use std::collections::BTreeMap;

use crate::tile_keys::{validate_group_name, ParsedTileKey, TileKey, TileKeyError};

/// Tile names of one tile set, independent of its pixels.
///
/// Groups are kept in name order; terrain classification and `group_of`
/// depend on that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TileCatalog {
    tile_count: Option<u32>,
    groups: BTreeMap<String, Vec<u32>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedTile<'a> {
    Single { tile: u32, group: Option<&'a str> },
    Sequence { frames: &'a [u32], group: &'a str },
}

impl<'a> ResolvedTile<'a> {
    pub fn group(&self) -> Option<&'a str> {
        match self {
            ResolvedTile::Single { group, .. } => *group,
            ResolvedTile::Sequence { group, .. } => Some(group),
        }
    }

    /// Tile shown at `phase`; sequences cycle on the integer part.
    pub fn frame(&self, phase: f64) -> u32 {
        match self {
            ResolvedTile::Single { tile, .. } => *tile,
            ResolvedTile::Sequence { frames, .. } => frames[cycle_index(phase, frames.len())],
        }
    }
}

pub(crate) fn cycle_index(phase: f64, len: usize) -> usize {
    if len == 0 || !phase.is_finite() {
        return 0;
    }
    (phase.floor() as i64).rem_euclid(len as i64) as usize
}

impl TileCatalog {
    pub fn new(groups: BTreeMap<String, Vec<u32>>) -> Result<Self, TileKeyError> {
        for name in groups.keys() {
            validate_group_name(name)?;
        }
        Ok(Self {
            tile_count: None,
            groups,
        })
    }

    /// Bounds every index against the sliced tile count of the image.
    pub fn with_tile_count(mut self, tile_count: u32) -> Result<Self, TileKeyError> {
        for index in self.groups.values().flatten() {
            if *index >= tile_count {
                return Err(TileKeyError::IndexOutOfRange {
                    index: *index,
                    tile_count,
                });
            }
        }
        self.tile_count = Some(tile_count);
        Ok(self)
    }

    pub fn tile_count(&self) -> Option<u32> {
        self.tile_count
    }

    pub fn groups(&self) -> impl Iterator<Item = (&str, &[u32])> {
        self.groups
            .iter()
            .map(|(name, tiles)| (name.as_str(), tiles.as_slice()))
    }

    /// First group in name order that contains `tile`.
    pub fn group_of(&self, tile: u32) -> Option<&str> {
        self.groups
            .iter()
            .find(|(_, tiles)| tiles.contains(&tile))
            .map(|(name, _)| name.as_str())
    }

    pub fn resolve(&self, key: &TileKey) -> Result<ResolvedTile<'_>, TileKeyError> {
        match key.parse()? {
            ParsedTileKey::Index(index) => {
                self.check_index(index)?;
                Ok(ResolvedTile::Single {
                    tile: index,
                    group: self.group_of(index),
                })
            }
            ParsedTileKey::Group(name) => {
                let (group, frames) = self.group(name)?;
                match frames {
                    [] => Err(TileKeyError::EmptyGroup {
                        group: name.to_string(),
                    }),
                    [single] => Ok(ResolvedTile::Single {
                        tile: *single,
                        group: Some(group),
                    }),
                    frames => Ok(ResolvedTile::Sequence { frames, group }),
                }
            }
            ParsedTileKey::GroupFrame(name, frame) => {
                let (group, frames) = self.group(name)?;
                let tile = frames
                    .get(frame)
                    .copied()
                    .ok_or_else(|| TileKeyError::FrameOutOfRange {
                        group: name.to_string(),
                        frame,
                    })?;
                Ok(ResolvedTile::Single {
                    tile,
                    group: Some(group),
                })
            }
        }
    }

    fn group(&self, name: &str) -> Result<(&str, &[u32]), TileKeyError> {
        self.groups
            .get_key_value(name)
            .map(|(group, frames)| (group.as_str(), frames.as_slice()))
            .ok_or_else(|| TileKeyError::UnknownGroup {
                group: name.to_string(),
            })
    }

    fn check_index(&self, index: u32) -> Result<(), TileKeyError> {
        match self.tile_count {
            Some(tile_count) if index >= tile_count => {
                Err(TileKeyError::IndexOutOfRange { index, tile_count })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> TileCatalog {
        let mut groups = BTreeMap::new();
        groups.insert("grass".to_string(), vec![0]);
        groups.insert("water".to_string(), vec![4, 5, 6]);
        groups.insert("wet".to_string(), vec![5]);
        TileCatalog::new(groups)
            .and_then(|catalog| catalog.with_tile_count(8))
            .expect("catalog")
    }

    #[test]
    fn resolves_every_key_form() {
        let catalog = catalog();
        assert_eq!(
            catalog.resolve(&TileKey::Index(5)),
            Ok(ResolvedTile::Single {
                tile: 5,
                group: Some("water")
            })
        );
        assert_eq!(
            catalog.resolve(&TileKey::from("grass")),
            Ok(ResolvedTile::Single {
                tile: 0,
                group: Some("grass")
            })
        );
        assert_eq!(
            catalog.resolve(&TileKey::from("water/2")),
            Ok(ResolvedTile::Single {
                tile: 6,
                group: Some("water")
            })
        );
        let animated = catalog.resolve(&TileKey::from("water")).expect("sequence");
        assert_eq!(animated.frame(0.0), 4);
        assert_eq!(animated.frame(1.9), 5);
        assert_eq!(animated.frame(3.0), 4);
    }

    #[test]
    fn group_of_uses_name_order() {
        let catalog = catalog();
        assert_eq!(catalog.group_of(5), Some("water"));
        assert_eq!(catalog.group_of(7), None);
    }

    #[test]
    fn rejects_unknown_and_out_of_range_keys() {
        let catalog = catalog();
        assert!(matches!(
            catalog.resolve(&TileKey::from("lava")),
            Err(TileKeyError::UnknownGroup { .. })
        ));
        assert!(matches!(
            catalog.resolve(&TileKey::from("water/3")),
            Err(TileKeyError::FrameOutOfRange { frame: 3, .. })
        ));
        assert!(matches!(
            catalog.resolve(&TileKey::Index(8)),
            Err(TileKeyError::IndexOutOfRange { index: 8, .. })
        ));
    }

    #[test]
    fn tile_count_check_covers_group_members() {
        let mut groups = BTreeMap::new();
        groups.insert("far".to_string(), vec![12]);
        let catalog = TileCatalog::new(groups).expect("names are valid");
        assert!(catalog.with_tile_count(4).is_err());
    }
}
