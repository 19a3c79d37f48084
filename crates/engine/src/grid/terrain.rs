use std::collections::BTreeMap;

/// Terrain class used for cells without a named group, and the fallback table
/// consulted for every mover.
pub const DEFAULT_TERRAIN: &str = "default";
pub const DEFAULT_MOVER: &str = "default";

/// Traversal multipliers keyed by mover class then terrain class.
///
/// Lookup order for `(mover, terrain)`: the mover's own table, then the
/// `default` mover table, then `1.0`. Stored multipliers are either finite and
/// positive or `f32::INFINITY` (impassable).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TerrainCostModel {
    movers: BTreeMap<String, BTreeMap<String, f32>>,
}

impl TerrainCostModel {
    /// Every terrain costs `1.0` for every mover.
    pub fn uniform() -> Self {
        Self::default()
    }

    /// Builds the model from a descriptor table where `None`, zero, negative,
    /// and non-finite multipliers all mean impassable.
    pub fn from_table(table: BTreeMap<String, BTreeMap<String, Option<f32>>>) -> Self {
        let movers = table
            .into_iter()
            .map(|(mover, terrains)| {
                let terrains = terrains
                    .into_iter()
                    .map(|(terrain, multiplier)| (terrain, normalize_multiplier(multiplier)))
                    .collect();
                (mover, terrains)
            })
            .collect();
        Self { movers }
    }

    pub fn with_multiplier(mut self, mover: &str, terrain: &str, multiplier: f32) -> Self {
        self.set_multiplier(mover, terrain, multiplier);
        self
    }

    pub fn set_multiplier(&mut self, mover: &str, terrain: &str, multiplier: f32) {
        self.movers
            .entry(mover.to_string())
            .or_default()
            .insert(terrain.to_string(), normalize_multiplier(Some(multiplier)));
    }

    pub fn multiplier(&self, mover: &str, terrain: Option<&str>) -> f32 {
        let terrain = terrain.unwrap_or(DEFAULT_TERRAIN);
        self.lookup(mover, terrain)
            .or_else(|| self.lookup(DEFAULT_MOVER, terrain))
            .unwrap_or(1.0)
    }

    pub fn is_passable(&self, mover: &str, terrain: Option<&str>) -> bool {
        self.multiplier(mover, terrain).is_finite()
    }

    /// Smallest multiplier `mover` can meet on any terrain, at most `1.0`.
    /// Scaling Manhattan distance by it keeps the A* heuristic admissible.
    pub fn min_multiplier(&self, mover: &str) -> f32 {
        [mover, DEFAULT_MOVER]
            .into_iter()
            .filter_map(|name| self.movers.get(name))
            .flat_map(BTreeMap::values)
            .copied()
            .filter(|multiplier| multiplier.is_finite())
            .fold(1.0, f32::min)
    }

    pub fn movers(&self) -> impl Iterator<Item = &str> {
        self.movers.keys().map(String::as_str)
    }

    fn lookup(&self, mover: &str, terrain: &str) -> Option<f32> {
        self.movers.get(mover)?.get(terrain).copied()
    }
}

fn normalize_multiplier(multiplier: Option<f32>) -> f32 {
    match multiplier {
        Some(value) if value.is_finite() && value > 0.0 => value,
        _ => f32::INFINITY,
    }
}
