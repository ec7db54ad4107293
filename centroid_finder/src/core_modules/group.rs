// THEORY:
// A `Group` is the summary of one connected region of foreground cells within a
// single frame. It is a "dumb" value: the size of the region and its integer
// centroid. The member cells themselves are dropped once the summary exists.
//
// Key architectural principles:
// 1.  **Immutable Output**: Groups and `GroupList`s are pure values with no link
//     back to the raster that produced them. They can be shared across threads
//     and compared for equality.
// 2.  **One Total Order**: Groups rank by size, then by centroid `y`, then by
//     centroid `x`. A `GroupList` always holds its groups in descending order, so
//     the "dominant" region is always first.
// 3.  **Exact Integer Centroid**: The centroid is the truncated integer mean of
//     member positions, never a rounded float.

use crate::core_modules::raster::Coordinate;
use std::cmp::Ordering;

/// One connected region: how many cells it has and where its center is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Group {
    /// Number of foreground cells in the region. Always at least 1.
    pub size: usize,
    /// Truncated mean position of the region's cells.
    pub centroid: Coordinate,
}

impl Group {
    pub fn new(size: usize, centroid: Coordinate) -> Self {
        Self { size, centroid }
    }

    /// Summarizes a set of member cells. Returns `None` for an empty set.
    pub fn from_members(members: &[Coordinate]) -> Option<Self> {
        if members.is_empty() {
            return None;
        }
        let size = members.len() as u64;
        let (sum_x, sum_y) = members.iter().fold((0u64, 0u64), |(sx, sy), c| {
            (sx + c.x as u64, sy + c.y as u64)
        });
        Some(Self {
            size: members.len(),
            centroid: Coordinate::new((sum_x / size) as u32, (sum_y / size) as u32),
        })
    }
}

impl Ord for Group {
    fn cmp(&self, other: &Self) -> Ordering {
        self.size
            .cmp(&other.size)
            .then(self.centroid.y.cmp(&other.centroid.y))
            .then(self.centroid.x.cmp(&other.centroid.x))
    }
}

impl PartialOrd for Group {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Groups found in one raster, largest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupList(Vec<Group>);

impl GroupList {
    /// The highest ranked group, if any region was found.
    pub fn top(&self) -> Option<&Group> {
        self.0.first()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Group> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Group] {
        &self.0
    }
}

impl From<Vec<Group>> for GroupList {
    /// Sorts into descending rank order.
    fn from(mut groups: Vec<Group>) -> Self {
        groups.sort_unstable_by(|a, b| b.cmp(a));
        Self(groups)
    }
}

impl IntoIterator for GroupList {
    type Item = Group;
    type IntoIter = std::vec::IntoIter<Group>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a GroupList {
    type Item = &'a Group;
    type IntoIter = std::slice::Iter<'a, Group>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(size: usize, x: u32, y: u32) -> Group {
        Group::new(size, Coordinate::new(x, y))
    }

    #[test]
    fn test_centroid_truncates() {
        let members = [Coordinate::new(0, 0), Coordinate::new(1, 0), Coordinate::new(1, 1)];
        // sum_x = 2, sum_y = 1, size = 3
        assert_eq!(Group::from_members(&members), Some(group(3, 0, 0)));

        let members = [Coordinate::new(3, 5), Coordinate::new(4, 6)];
        assert_eq!(Group::from_members(&members), Some(group(2, 3, 5)));
    }

    #[test]
    fn test_empty_members_have_no_group() {
        assert_eq!(Group::from_members(&[]), None);
    }

    #[test]
    fn test_size_dominates() {
        assert!(group(5, 0, 0) > group(4, 9, 9));
    }

    #[test]
    fn test_y_breaks_ties_before_x() {
        assert!(group(3, 0, 5) > group(3, 9, 4));
        assert!(group(3, 6, 4) > group(3, 5, 4));
        assert_eq!(group(3, 5, 4).cmp(&group(3, 5, 4)), Ordering::Equal);
    }

    #[test]
    fn test_list_is_sorted_descending() {
        let list = GroupList::from(vec![
            group(1, 0, 0),
            group(3, 1, 1),
            group(3, 2, 1),
            group(3, 0, 2),
            group(2, 5, 5),
        ]);
        let ranked: Vec<Group> = list.iter().copied().collect();
        assert_eq!(
            ranked,
            vec![
                group(3, 0, 2),
                group(3, 2, 1),
                group(3, 1, 1),
                group(2, 5, 5),
                group(1, 0, 0),
            ]
        );
        assert_eq!(list.top(), Some(&group(3, 0, 2)));
    }

    #[test]
    fn test_empty_list_has_no_top() {
        let list = GroupList::default();
        assert!(list.is_empty());
        assert_eq!(list.top(), None);
    }
}
