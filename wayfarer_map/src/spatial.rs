// Coordinate-keyed spatial index: one quadtree per z-layer.
//
// Answers "which rooms occupy this coordinate / box / radius" in better than
// linear time. Each z-layer is a `Plane` holding a quadtree over (x, y); a
// leaf stores a map from (x, y) to a small room-id set directly (several
// rooms may legally share one coordinate), and subdivides into four
// quadrant children once it holds more than `MAX_LEAF_ENTRIES` coordinate
// entries — but never below `MIN_SQUARE_SIZE`, so pathologically dense
// leaves beyond that point are accepted as-is.
//
// The union bounding box of all occupied coordinates is cached and lazily
// recomputed: mutations only mark it dirty, `update_bounds()` pays the full
// scan on demand. A long map import would otherwise pay O(N) per edit.
//
// Equality between two indices means identical occupancy, not identical
// tree shape — insertion order must not be observable.
//
// See also: `store.rs` which owns one of these and keeps it coherent with
// the room arena, `candidate.rs` for the textual counterpart.

use crate::types::{Bounds, Coordinate, RoomId, RoomIdSet};
use rustc_hash::FxHashMap;

/// Maximum coordinate entries in a leaf before subdivision.
const MAX_LEAF_ENTRIES: usize = 32;
/// Minimum square side length; leaves this small never subdivide.
const MIN_SQUARE_SIZE: i32 = 4;
/// Half-extent of a freshly created plane's root square.
const INITIAL_HALF_SIZE: i32 = 64;

// ---------------------------------------------------------------------------
// Quadtree node
// ---------------------------------------------------------------------------

/// A square region of one plane. Half-open bounds: `[min, max)`.
#[derive(Clone, Debug)]
struct QuadtreeNode {
    min_x: i32,
    min_y: i32,
    max_x: i32,
    max_y: i32,
    /// Four quadrant children (NW, NE, SW, SE); `None` for a leaf.
    children: Option<Box<[QuadtreeNode; 4]>>,
    /// Leaf storage; always empty on internal nodes.
    entries: FxHashMap<(i32, i32), RoomIdSet>,
}

impl QuadtreeNode {
    fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
            children: None,
            entries: FxHashMap::default(),
        }
    }

    fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.min_x && x < self.max_x && y >= self.min_y && y < self.max_y
    }

    fn center(&self) -> (i32, i32) {
        (
            self.min_x + (self.max_x - self.min_x) / 2,
            self.min_y + (self.max_y - self.min_y) / 2,
        )
    }

    fn width(&self) -> i32 {
        self.max_x - self.min_x
    }

    /// Index of the quadrant containing (x, y): NW=0, NE=1, SW=2, SE=3.
    fn quadrant(&self, x: i32, y: i32) -> usize {
        let (cx, cy) = self.center();
        match (x >= cx, y >= cy) {
            (false, true) => 0,
            (true, true) => 1,
            (false, false) => 2,
            (true, false) => 3,
        }
    }

    fn subdivide(&mut self) {
        debug_assert!(self.children.is_none());
        let (cx, cy) = self.center();
        let mut children = Box::new([
            QuadtreeNode::new(self.min_x, cy, cx, self.max_y),
            QuadtreeNode::new(cx, cy, self.max_x, self.max_y),
            QuadtreeNode::new(self.min_x, self.min_y, cx, cy),
            QuadtreeNode::new(cx, self.min_y, self.max_x, cy),
        ]);
        for ((x, y), ids) in self.entries.drain() {
            let q = {
                let (qx, qy) = (x >= cx, y >= cy);
                match (qx, qy) {
                    (false, true) => 0,
                    (true, true) => 1,
                    (false, false) => 2,
                    (true, false) => 3,
                }
            };
            children[q].entries.insert((x, y), ids);
        }
        self.children = Some(children);
    }

    /// Returns true if the id was newly inserted (not already present).
    fn insert(&mut self, id: RoomId, x: i32, y: i32) -> bool {
        if self.children.is_some() {
            let idx = self.quadrant(x, y);
            if let Some(children) = self.children.as_mut() {
                return children[idx].insert(id, x, y);
            }
        }
        let inserted = self.entries.entry((x, y)).or_default().insert(id);
        if self.entries.len() > MAX_LEAF_ENTRIES && self.width() > MIN_SQUARE_SIZE {
            self.subdivide();
        }
        inserted
    }

    /// Returns true if the id was present and removed.
    fn remove(&mut self, id: RoomId, x: i32, y: i32) -> bool {
        if self.children.is_some() {
            let idx = self.quadrant(x, y);
            if let Some(children) = self.children.as_mut() {
                return children[idx].remove(id, x, y);
            }
        }
        match self.entries.get_mut(&(x, y)) {
            Some(set) => {
                let removed = set.remove(id);
                if set.is_empty() {
                    self.entries.remove(&(x, y));
                }
                removed
            }
            None => false,
        }
    }

    fn find_at(&self, x: i32, y: i32) -> RoomIdSet {
        match &self.children {
            Some(children) => children[self.quadrant(x, y)].find_at(x, y),
            None => self.entries.get(&(x, y)).cloned().unwrap_or_default(),
        }
    }

    /// Collect every room in the inclusive (x, y) box into `out`.
    fn find_in_box(&self, min_x: i32, min_y: i32, max_x: i32, max_y: i32, out: &mut RoomIdSet) {
        if max_x < self.min_x || min_x >= self.max_x || max_y < self.min_y || min_y >= self.max_y {
            return;
        }
        match &self.children {
            Some(children) => {
                for child in children.iter() {
                    child.find_in_box(min_x, min_y, max_x, max_y, out);
                }
            }
            None => {
                for (&(x, y), ids) in &self.entries {
                    if x >= min_x && x <= max_x && y >= min_y && y <= max_y {
                        out.extend_from(ids);
                    }
                }
            }
        }
    }

    fn for_each(&self, f: &mut impl FnMut(RoomId, i32, i32)) {
        match &self.children {
            Some(children) => {
                for child in children.iter() {
                    child.for_each(f);
                }
            }
            None => {
                for (&(x, y), ids) in &self.entries {
                    for id in ids.iter() {
                        f(id, x, y);
                    }
                }
            }
        }
    }

    fn count(&self) -> usize {
        match &self.children {
            Some(children) => children.iter().map(QuadtreeNode::count).sum(),
            None => self.entries.values().map(RoomIdSet::len).sum(),
        }
    }
}

// ---------------------------------------------------------------------------
// Plane — all rooms at one z level
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct Plane {
    z: i32,
    root: QuadtreeNode,
}

impl Plane {
    fn new(z: i32, x: i32, y: i32) -> Self {
        Self {
            z,
            root: QuadtreeNode::new(
                x - INITIAL_HALF_SIZE,
                y - INITIAL_HALF_SIZE,
                x + INITIAL_HALF_SIZE,
                y + INITIAL_HALF_SIZE,
            ),
        }
    }

    /// Grow the root square (rebuilding the tree) until it covers (x, y).
    /// Growth doubles the extent each time, so this amortizes away.
    fn ensure_contains(&mut self, x: i32, y: i32) {
        if self.root.contains(x, y) {
            return;
        }
        let mut entries: Vec<(RoomId, i32, i32)> = Vec::new();
        self.root.for_each(&mut |id, ex, ey| entries.push((id, ex, ey)));

        let (cx, cy) = self.root.center();
        let mut half = self.root.width() / 2;
        while !(x >= cx - half && x < cx + half && y >= cy - half && y < cy + half) {
            half *= 2;
        }
        self.root = QuadtreeNode::new(cx - half, cy - half, cx + half, cy + half);
        for (id, ex, ey) in entries {
            self.root.insert(id, ex, ey);
        }
    }

    fn insert(&mut self, id: RoomId, x: i32, y: i32) -> bool {
        self.ensure_contains(x, y);
        self.root.insert(id, x, y)
    }

    fn remove(&mut self, id: RoomId, x: i32, y: i32) -> bool {
        if !self.root.contains(x, y) {
            return false;
        }
        self.root.remove(id, x, y)
    }
}

// ---------------------------------------------------------------------------
// SpatialIndex
// ---------------------------------------------------------------------------

/// The per-layer quadtree index over all room coordinates.
#[derive(Clone, Debug, Default)]
pub struct SpatialIndex {
    planes: FxHashMap<i32, Plane>,
    /// Cached union bounding box; `None` while empty or dirty.
    bounds: Option<Bounds>,
    bounds_dirty: bool,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a room at a coordinate. Idempotent: inserting a room at a
    /// coordinate it already occupies is a no-op.
    pub fn insert(&mut self, id: RoomId, coord: Coordinate) {
        let plane = self
            .planes
            .entry(coord.z)
            .or_insert_with(|| Plane::new(coord.z, coord.x, coord.y));
        plane.insert(id, coord.x, coord.y);

        match (&mut self.bounds, self.bounds_dirty) {
            (Some(bounds), false) => bounds.extend_to(coord),
            _ => self.bounds_dirty = true,
        }
    }

    /// Remove a room from a coordinate. Removing a room that is not listed
    /// there is a programmer error: debug-asserts, logged no-op in release.
    pub fn remove(&mut self, id: RoomId, coord: Coordinate) {
        let removed = self
            .planes
            .get_mut(&coord.z)
            .is_some_and(|plane| plane.remove(id, coord.x, coord.y));
        if !removed {
            debug_assert!(removed, "remove of unlisted room {id} at {coord}");
            log::warn!("spatial index: remove of unlisted room {id} at {coord}");
            return;
        }
        // Shrinking bounds exactly would need a scan; defer it.
        if self.bounds.is_none_or(|b| on_boundary(&b, coord)) {
            self.bounds = None;
            self.bounds_dirty = true;
        }
    }

    /// Move a room between coordinates. No-op if `from == to`.
    pub fn move_room(&mut self, id: RoomId, from: Coordinate, to: Coordinate) {
        if from == to {
            return;
        }
        self.remove(id, from);
        self.insert(id, to);
    }

    /// All rooms at exactly `coord`. Unknown z-layers yield an empty set.
    pub fn find_at(&self, coord: Coordinate) -> RoomIdSet {
        match self.planes.get(&coord.z) {
            Some(plane) if plane.root.contains(coord.x, coord.y) => {
                plane.root.find_at(coord.x, coord.y)
            }
            _ => RoomIdSet::new(),
        }
    }

    pub fn has_room_at(&self, coord: Coordinate) -> bool {
        !self.find_at(coord).is_empty()
    }

    /// All rooms inside an inclusive box.
    pub fn find_in_bounds(&self, bounds: Bounds) -> RoomIdSet {
        let mut out = RoomIdSet::new();
        for z in bounds.min.z..=bounds.max.z {
            if let Some(plane) = self.planes.get(&z) {
                plane
                    .root
                    .find_in_box(bounds.min.x, bounds.min.y, bounds.max.x, bounds.max.y, &mut out);
            }
        }
        out
    }

    /// All rooms within Chebyshev distance `radius` of `center`.
    pub fn find_in_radius(&self, center: Coordinate, radius: i32) -> RoomIdSet {
        let r = radius.max(0);
        self.find_in_bounds(Bounds {
            min: Coordinate::new(center.x - r, center.y - r, center.z - r),
            max: Coordinate::new(center.x + r, center.y + r, center.z + r),
        })
    }

    pub fn for_each(&self, mut f: impl FnMut(RoomId, Coordinate)) {
        for plane in self.planes.values() {
            let z = plane.z;
            plane
                .root
                .for_each(&mut |id, x, y| f(id, Coordinate::new(x, y, z)));
        }
    }

    /// Total number of (room, coordinate) entries.
    pub fn len(&self) -> usize {
        self.planes.values().map(|p| p.root.count()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The cached bounds, if currently known. Never recomputes.
    pub fn bounds(&self) -> Option<Bounds> {
        if self.bounds_dirty { None } else { self.bounds }
    }

    pub fn needs_bounds_update(&self) -> bool {
        self.bounds_dirty
    }

    /// Recompute bounds by a full scan. The only place that pays O(N).
    pub fn update_bounds(&mut self) -> Option<Bounds> {
        let mut bounds: Option<Bounds> = None;
        self.for_each(|_, coord| match &mut bounds {
            Some(b) => b.extend_to(coord),
            None => bounds = Some(Bounds::at(coord)),
        });
        self.bounds = bounds;
        self.bounds_dirty = false;
        bounds
    }

    fn occupancy(&self) -> Vec<(Coordinate, RoomId)> {
        let mut all = Vec::with_capacity(self.len());
        self.for_each(|id, coord| all.push((coord, id)));
        all.sort_unstable();
        all
    }
}

fn on_boundary(bounds: &Bounds, coord: Coordinate) -> bool {
    coord.x == bounds.min.x
        || coord.x == bounds.max.x
        || coord.y == bounds.min.y
        || coord.y == bounds.max.y
        || coord.z == bounds.min.z
        || coord.z == bounds.max.z
}

/// Occupancy equality: same rooms at the same coordinates, regardless of
/// tree shape or insertion order.
impl PartialEq for SpatialIndex {
    fn eq(&self, other: &Self) -> bool {
        self.occupancy() == other.occupancy()
    }
}

impl Eq for SpatialIndex {}
