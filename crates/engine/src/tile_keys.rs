use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reference to a tile inside a tile set.
///
/// Descriptors write either a bare index (`3`), a group name (`"water"`), or a
/// single frame of a group (`"water/2"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TileKey {
    Index(u32),
    Name(String),
}

impl Default for TileKey {
    fn default() -> Self {
        TileKey::Index(0)
    }
}

impl From<u32> for TileKey {
    fn from(index: u32) -> Self {
        TileKey::Index(index)
    }
}

impl From<&str> for TileKey {
    fn from(name: &str) -> Self {
        TileKey::Name(name.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedTileKey<'a> {
    Index(u32),
    Group(&'a str),
    GroupFrame(&'a str, usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileKeyError {
    #[error("tile key must not be empty")]
    Empty,
    #[error("tile key '{key}' has more than one '/' separator")]
    TooManySeparators { key: String },
    #[error("tile key '{key}' has a non-numeric frame index")]
    InvalidFrameIndex { key: String },
    #[error("tile group name contains invalid character '{character}'")]
    InvalidCharacter { character: char },
    #[error("unknown tile group '{group}'")]
    UnknownGroup { group: String },
    #[error("tile group '{group}' has no frame {frame}")]
    FrameOutOfRange { group: String, frame: usize },
    #[error("tile group '{group}' is empty")]
    EmptyGroup { group: String },
    #[error("tile index {index} is outside the tile set ({tile_count} tiles)")]
    IndexOutOfRange { index: u32, tile_count: u32 },
}

impl TileKey {
    pub fn parse(&self) -> Result<ParsedTileKey<'_>, TileKeyError> {
        match self {
            TileKey::Index(index) => Ok(ParsedTileKey::Index(*index)),
            TileKey::Name(name) => parse_named_key(name),
        }
    }
}

fn parse_named_key(key: &str) -> Result<ParsedTileKey<'_>, TileKeyError> {
    if key.is_empty() {
        return Err(TileKeyError::Empty);
    }
    let mut parts = key.split('/');
    let group = parts.next().unwrap_or_default();
    let frame = parts.next();
    if parts.next().is_some() {
        return Err(TileKeyError::TooManySeparators {
            key: key.to_string(),
        });
    }
    validate_group_name(group)?;
    match frame {
        None => Ok(ParsedTileKey::Group(group)),
        Some(raw) => raw
            .parse::<usize>()
            .map(|frame| ParsedTileKey::GroupFrame(group, frame))
            .map_err(|_| TileKeyError::InvalidFrameIndex {
                key: key.to_string(),
            }),
    }
}

pub(crate) fn validate_group_name(group: &str) -> Result<(), TileKeyError> {
    if group.is_empty() {
        return Err(TileKeyError::Empty);
    }
    for ch in group.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-') {
            continue;
        }
        return Err(TileKeyError::InvalidCharacter { character: ch });
    }
    Ok(())
}
