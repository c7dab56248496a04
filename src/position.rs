use super::*;
use std::fmt;

/// Side length of one terrain region cell.
pub const REGION_SIZE: i32 = 16;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}
impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Full 3 axis squared distance.
    pub fn distance_squared(self, other: BlockPos) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        let dz = (self.z - other.z) as i64;
        dx * dx + dy * dy + dz * dz
    }

    /// Squared distance over x/z only, as if `other` were at this position's
    /// height. Used for all interest range checks so that observers on
    /// towers or in caves are not penalized for vertical distance.
    pub fn planar_distance_squared(self, other: BlockPos) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dz = (self.z - other.z) as i64;
        dx * dx + dz * dz
    }
}
impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

pub fn square(v: i32) -> i64 {
    let v = v as i64;
    v * v
}

#[test]
fn test_planar_distance_ignores_height() {
    let anchor = BlockPos::new(0, 64, 0);
    let high = BlockPos::new(3, 200, 4);

    assert_eq!(anchor.planar_distance_squared(high), 25);
    assert!(anchor.distance_squared(high) > 25);
}
