// THEORY:
// The `GroupFinder` is the engine of the spatial grouping layer. It takes a binary
// mask and partitions its foreground cells into maximal connected regions, then
// summarizes each region as a `Group` and ranks them.
//
// Algorithm steps:
// 1.  **Visited Grid**: A flat `Vec<bool>` the size of the mask, all false. It is
//     allocated per call and never escapes it.
// 2.  **Row-Major Seeding**: Cells are scanned row 0 first, left to right. Every
//     foreground cell that is not yet visited seeds a new region.
// 3.  **Explicit Frontier**: Each region is grown with a `Vec` used as a stack
//     rather than recursion, so a frame-sized region cannot overflow the call
//     stack. A popped cell is dropped if it is off the grid, already visited or
//     background; otherwise it is claimed and its neighbors are pushed.
// 4.  **Aggregation**: The claimed cells become one `Group` (size + truncated
//     centroid). The member list is discarded afterwards.
// 5.  **Ranking**: The groups are collected into a `GroupList`, which orders them
//     by size, then centroid y, then centroid x, all descending.
//
// The traversal order only changes which cell is claimed first, never which
// cells end up in a region, so the output is deterministic for a given mask.

use crate::core_modules::error::StructureError;
use crate::core_modules::group::{Group, GroupList};
use crate::core_modules::raster::{BinaryRaster, Coordinate};

/// Which neighbors count as touching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Connectivity {
    /// Up, down, left and right only. Diagonal cells are separate regions.
    #[default]
    Four,
    /// The four edge neighbors plus the four corner neighbors.
    Eight,
}

const EDGE_NEIGHBORS: [(i64, i64); 4] = [(0, -1), (0, 1), (-1, 0), (1, 0)];
const ALL_NEIGHBORS: [(i64, i64); 8] = [
    (0, -1),
    (0, 1),
    (-1, 0),
    (1, 0),
    (-1, -1),
    (1, -1),
    (-1, 1),
    (1, 1),
];

impl Connectivity {
    /// `(dx, dy)` offsets of the neighbors of a cell.
    pub fn offsets(self) -> &'static [(i64, i64)] {
        match self {
            Connectivity::Four => &EDGE_NEIGHBORS,
            Connectivity::Eight => &ALL_NEIGHBORS,
        }
    }
}

/// Finds connected foreground regions in a binary mask.
pub trait BinaryGroupFinder {
    /// Returns every connected region, largest first.
    fn find_connected_groups(&self, image: &BinaryRaster) -> GroupList;

    /// Validates `rows` as a binary mask and then finds its regions.
    /// Nothing is traversed if the rows are structurally invalid.
    fn find_groups_in_rows(&self, rows: Vec<Vec<u8>>) -> Result<GroupList, StructureError> {
        let image = BinaryRaster::from_rows(rows)?;
        Ok(self.find_connected_groups(&image))
    }
}

/// Iterative flood fill over the mask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FloodFillGroupFinder {
    connectivity: Connectivity,
}

impl FloodFillGroupFinder {
    pub fn new(connectivity: Connectivity) -> Self {
        Self { connectivity }
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    /// Claims every cell reachable from `seed` and returns them.
    fn grow_region(
        &self,
        image: &BinaryRaster,
        seed: Coordinate,
        visited: &mut [bool],
    ) -> Vec<Coordinate> {
        let width = image.width() as i64;
        let height = image.height() as i64;
        let mut members = Vec::new();
        let mut frontier: Vec<(i64, i64)> = vec![(seed.x as i64, seed.y as i64)];

        while let Some((x, y)) = frontier.pop() {
            if x < 0 || x >= width || y < 0 || y >= height {
                continue;
            }
            let index = (y * width + x) as usize;
            if visited[index] || !image.is_foreground(x as u32, y as u32) {
                continue;
            }

            visited[index] = true;
            members.push(Coordinate::new(x as u32, y as u32));

            for (dx, dy) in self.connectivity.offsets() {
                frontier.push((x + dx, y + dy));
            }
        }

        members
    }
}

impl BinaryGroupFinder for FloodFillGroupFinder {
    fn find_connected_groups(&self, image: &BinaryRaster) -> GroupList {
        let width = image.width();
        let mut visited = vec![false; image.cells().len()];
        let mut groups = Vec::new();

        for (index, &cell) in image.cells().iter().enumerate() {
            if cell != 1 || visited[index] {
                continue;
            }
            let seed = Coordinate::new(index as u32 % width, index as u32 / width);
            let members = self.grow_region(image, seed, &mut visited);
            if let Some(group) = Group::from_members(&members) {
                groups.push(group);
            }
        }

        GroupList::from(groups)
    }
}
