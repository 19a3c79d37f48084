use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use tracing::warn;

use super::{GridBounds, GridPoint};

const NEIGHBOR_OFFSETS: [(i32, i32); 4] = [(0, 1), (1, 0), (0, -1), (-1, 0)];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathResult {
    /// Start to goal, both inclusive.
    Found(Vec<GridPoint>),
    NoPath,
}

impl PathResult {
    pub fn is_found(&self) -> bool {
        matches!(self, PathResult::Found(_))
    }

    pub fn points(&self) -> &[GridPoint] {
        match self {
            PathResult::Found(points) => points,
            PathResult::NoPath => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.points().len()
    }

    pub fn is_empty(&self) -> bool {
        self.points().is_empty()
    }
}

/// Cells reachable within a budget, each with the most budget left over on
/// arrival.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReachableSet {
    remaining: BTreeMap<GridPoint, f32>,
}

impl ReachableSet {
    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    pub fn contains(&self, point: GridPoint) -> bool {
        self.remaining.contains_key(&point)
    }

    pub fn remaining(&self, point: GridPoint) -> Option<f32> {
        self.remaining.get(&point).copied()
    }

    pub fn points(&self) -> impl Iterator<Item = GridPoint> + '_ {
        self.remaining.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (GridPoint, f32)> + '_ {
        self.remaining.iter().map(|(point, left)| (*point, *left))
    }
}

pub fn manhattan_distance(a: GridPoint, b: GridPoint) -> u32 {
    a.x.abs_diff(b.x).saturating_add(a.y.abs_diff(b.y))
}

/// A* over the 4-neighborhood of `bounds`.
///
/// `edge_cost(from, to)` returning a non-finite or negative value marks `to`
/// as impassable from `from`. Ties in the open set break on
/// `(f, h, y, x, insertion order)` so results are reproducible.
pub fn a_star<H, C>(
    bounds: GridBounds,
    start: GridPoint,
    goal: GridPoint,
    mut heuristic: H,
    mut edge_cost: C,
) -> PathResult
where
    H: FnMut(GridPoint) -> f32,
    C: FnMut(GridPoint, GridPoint) -> f32,
{
    let (Some(start_index), Some(goal_index)) = (bounds.index_of(start), bounds.index_of(goal))
    else {
        return PathResult::NoPath;
    };
    if start == goal {
        return PathResult::Found(vec![start]);
    }

    let node_count = bounds.cell_count();
    let mut best_g = vec![f32::INFINITY; node_count];
    let mut parent = vec![None::<usize>; node_count];
    let mut open = BinaryHeap::new();
    let mut next_insertion = 0u64;

    let start_h = sanitize_heuristic(heuristic(start));
    best_g[start_index] = 0.0;
    open.push(OpenNode {
        point: start,
        index: start_index,
        g_cost: 0.0,
        h_cost: start_h,
        f_cost: start_h,
        insertion_order: next_insertion,
    });
    next_insertion += 1;

    while let Some(current) = open.pop() {
        if current.g_cost > best_g[current.index] {
            continue;
        }
        if current.index == goal_index {
            return reconstruct_path(&parent, bounds, start_index, goal_index);
        }

        for neighbor in neighbors(current.point) {
            let Some(neighbor_index) = bounds.index_of(neighbor) else {
                continue;
            };
            let step = edge_cost(current.point, neighbor);
            if !step.is_finite() || step < 0.0 {
                continue;
            }

            let tentative_g = current.g_cost + step;
            if tentative_g >= best_g[neighbor_index] {
                continue;
            }

            best_g[neighbor_index] = tentative_g;
            parent[neighbor_index] = Some(current.index);
            let h_cost = sanitize_heuristic(heuristic(neighbor));
            open.push(OpenNode {
                point: neighbor,
                index: neighbor_index,
                g_cost: tentative_g,
                h_cost,
                f_cost: tentative_g + h_cost,
                insertion_order: next_insertion,
            });
            next_insertion += 1;
        }
    }

    PathResult::NoPath
}

/// Budget-limited flood from `start`.
///
/// A neighbor is recorded only when the budget left after stepping onto it is
/// non-negative and strictly more than its best recorded value, so the walk
/// terminates on cyclic grids as long as costs are non-negative.
pub fn reachable<C>(bounds: GridBounds, start: GridPoint, budget: f32, mut edge_cost: C) -> ReachableSet
where
    C: FnMut(GridPoint, GridPoint) -> f32,
{
    let mut result = ReachableSet::default();
    if budget.is_nan() || budget <= 0.0 {
        if budget < 0.0 {
            warn!(budget, "reachable_negative_budget_rejected");
        }
        return result;
    }
    let Some(start_index) = bounds.index_of(start) else {
        return result;
    };

    let mut best = vec![f32::NEG_INFINITY; bounds.cell_count()];
    best[start_index] = budget;
    let mut stack = vec![(start, start_index, budget)];

    while let Some((point, index, left)) = stack.pop() {
        if left < best[index] {
            continue;
        }
        for neighbor in neighbors(point) {
            let Some(neighbor_index) = bounds.index_of(neighbor) else {
                continue;
            };
            let step = edge_cost(point, neighbor);
            if step.is_nan() || step < 0.0 {
                continue;
            }
            let remaining = left - step;
            if remaining < 0.0 || remaining <= best[neighbor_index] {
                continue;
            }
            best[neighbor_index] = remaining;
            stack.push((neighbor, neighbor_index, remaining));
        }
    }

    result.remaining = best
        .into_iter()
        .enumerate()
        .filter(|(_, left)| *left >= 0.0)
        .map(|(index, left)| (bounds.point_of(index), left))
        .collect();
    result
}

fn neighbors(point: GridPoint) -> impl Iterator<Item = GridPoint> {
    NEIGHBOR_OFFSETS.into_iter().filter_map(move |(dx, dy)| {
        Some(GridPoint::new(
            point.x.checked_add(dx)?,
            point.y.checked_add(dy)?,
        ))
    })
}

fn sanitize_heuristic(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenNode {
    point: GridPoint,
    index: usize,
    g_cost: f32,
    h_cost: f32,
    f_cost: f32,
    insertion_order: u64,
}

impl OpenNode {
    fn order(&self, other: &Self) -> Ordering {
        self.f_cost
            .total_cmp(&other.f_cost)
            .then_with(|| self.h_cost.total_cmp(&other.h_cost))
            .then_with(|| self.point.y.cmp(&other.point.y))
            .then_with(|| self.point.x.cmp(&other.point.x))
            .then_with(|| self.insertion_order.cmp(&other.insertion_order))
    }
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.order(other) == Ordering::Equal
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    // Reversed: `BinaryHeap` pops the greatest element.
    fn cmp(&self, other: &Self) -> Ordering {
        other.order(self)
    }
}

fn reconstruct_path(
    parent: &[Option<usize>],
    bounds: GridBounds,
    start_index: usize,
    goal_index: usize,
) -> PathResult {
    let mut cursor = goal_index;
    let mut indices = vec![cursor];
    while cursor != start_index {
        let Some(next) = parent.get(cursor).copied().flatten() else {
            return PathResult::NoPath;
        };
        cursor = next;
        indices.push(cursor);
    }
    indices.reverse();
    PathResult::Found(indices.into_iter().map(|index| bounds.point_of(index)).collect())
}
