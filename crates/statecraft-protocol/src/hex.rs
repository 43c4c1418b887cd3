use serde::{Deserialize, Serialize};

/// Axial hex coordinate. The third cube axis is `s = -q - r`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hex {
    pub q: i32,
    pub r: i32,
}

impl Hex {
    pub const ORIGIN: Hex = Hex { q: 0, r: 0 };

    pub const DIRECTIONS: [Hex; 6] = [
        Hex { q: 1, r: 0 },
        Hex { q: 1, r: -1 },
        Hex { q: 0, r: -1 },
        Hex { q: -1, r: 0 },
        Hex { q: -1, r: 1 },
        Hex { q: 0, r: 1 },
    ];

    #[inline]
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    #[inline]
    pub const fn s(self) -> i32 {
        -self.q - self.r
    }

    pub fn neighbors(self) -> impl Iterator<Item = Hex> {
        Self::DIRECTIONS.into_iter().map(move |d| self + d)
    }

    #[inline]
    pub fn distance(self, other: Hex) -> i32 {
        let dq = (self.q - other.q).abs();
        let dr = (self.r - other.r).abs();
        let ds = (self.s() - other.s()).abs();
        dq.max(dr).max(ds)
    }

    /// Every hex within `radius`, center first, then by increasing distance.
    /// Order within a distance band is fixed (by q, then r).
    pub fn within(self, radius: i32) -> Vec<Hex> {
        let radius = radius.max(0);
        let mut out = Vec::with_capacity((3 * radius * (radius + 1) + 1) as usize);
        for dist in 0..=radius {
            for dq in -dist..=dist {
                for dr in (-dist).max(-dq - dist)..=dist.min(-dq + dist) {
                    let h = Hex::new(self.q + dq, self.r + dr);
                    if self.distance(h) == dist {
                        out.push(h);
                    }
                }
            }
        }
        out
    }
}

impl std::ops::Add for Hex {
    type Output = Hex;

    fn add(self, other: Hex) -> Hex {
        Hex::new(self.q + other.q, self.r + other.r)
    }
}

impl std::ops::Sub for Hex {
    type Output = Hex;

    fn sub(self, other: Hex) -> Hex {
        Hex::new(self.q - other.q, self.r - other.r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_cube_max_norm() {
        assert_eq!(Hex::ORIGIN.distance(Hex::new(3, -1)), 3);
        assert_eq!(Hex::new(-2, 2).distance(Hex::new(1, -1)), 3);
    }

    #[test]
    fn within_counts_match_hex_area() {
        assert_eq!(Hex::ORIGIN.within(0), vec![Hex::ORIGIN]);
        assert_eq!(Hex::ORIGIN.within(1).len(), 7);
        assert_eq!(Hex::new(4, -2).within(2).len(), 19);
        let ring = Hex::ORIGIN.within(2);
        assert_eq!(ring[0], Hex::ORIGIN);
        assert!(ring.windows(2).all(|w| Hex::ORIGIN.distance(w[0]) <= Hex::ORIGIN.distance(w[1])));
    }

    #[test]
    fn neighbors_are_adjacent() {
        let c = Hex::new(2, 5);
        assert!(c.neighbors().all(|n| c.distance(n) == 1));
    }
}
