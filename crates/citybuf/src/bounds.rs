//! Axis-aligned extents and the recentring vector derived from them.

use crate::error::{Result, WrapError};
use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box over one or more point sets.
///
/// Built once from positions and never mutated afterwards. `center_vec` is
/// the negated midpoint: adding it to any point of the set moves the box
/// centre to the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
    pub zmin: f64,
    pub zmax: f64,

    /// Span along x (`xmax - xmin`), never negative.
    pub xdom: f64,
    /// Span along y.
    pub ydom: f64,
    /// Span along z.
    pub zdom: f64,

    /// Translation that moves the box centre to the origin.
    pub center_vec: DVec3,
}

/// Running min/max accumulator; `None` until a finite point is seen.
#[derive(Default)]
struct Extents {
    lo: Option<DVec3>,
    hi: Option<DVec3>,
}

impl Extents {
    #[inline]
    fn update(&mut self, p: [f64; 3]) {
        // Skip NaN / inf so one bad vertex cannot poison the whole box.
        if !(p[0].is_finite() && p[1].is_finite() && p[2].is_finite()) {
            return;
        }

        let v = DVec3::from_array(p);
        self.lo = Some(self.lo.map_or(v, |lo| lo.min(v)));
        self.hi = Some(self.hi.map_or(v, |hi| hi.max(v)));
    }

    fn finish(self, name: &str) -> Result<BoundingBox> {
        match (self.lo, self.hi) {
            (Some(lo), Some(hi)) => Ok(BoundingBox::from_corners(lo, hi)),
            _ => Err(WrapError::EmptyGeometry {
                name: name.to_owned(),
            }),
        }
    }
}

impl BoundingBox {
    fn from_corners(lo: DVec3, hi: DVec3) -> Self {
        let span = hi - lo;
        let mid = (lo + hi) * 0.5;

        Self {
            xmin: lo.x,
            xmax: hi.x,
            ymin: lo.y,
            ymax: hi.y,
            zmin: lo.z,
            zmax: hi.z,
            xdom: span.x,
            ydom: span.y,
            zdom: span.z,
            center_vec: -mid,
        }
    }

    /// Box over an `(N, 3)` point array. Non-finite points are ignored.
    pub fn from_points(points: &[[f64; 3]]) -> Result<Self> {
        Self::from_point_sets("points", std::iter::once(points))
    }

    /// Box over a flat `[x0, y0, z0, x1, ...]` array.
    ///
    /// A trailing partial triple is ignored.
    pub fn from_flat(flat: &[f64]) -> Result<Self> {
        let mut extents = Extents::default();
        for c in flat.chunks_exact(3) {
            extents.update([c[0], c[1], c[2]]);
        }
        extents.finish("points")
    }

    /// One box spanning several point sets, without concatenating them.
    ///
    /// `name` only shows up in the `EmptyGeometry` error.
    pub fn from_point_sets<'a, I>(name: &str, sets: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a [[f64; 3]]>,
    {
        let mut extents = Extents::default();
        for set in sets {
            for &p in set {
                extents.update(p);
            }
        }
        extents.finish(name)
    }

    #[inline]
    pub fn min(&self) -> DVec3 {
        DVec3::new(self.xmin, self.ymin, self.zmin)
    }

    #[inline]
    pub fn max(&self) -> DVec3 {
        DVec3::new(self.xmax, self.ymax, self.zmax)
    }

    #[inline]
    pub fn mid_point(&self) -> DVec3 {
        -self.center_vec
    }

    /// Length of the box diagonal; cameras use it to frame the scene.
    #[inline]
    pub fn diagonal(&self) -> f64 {
        DVec3::new(self.xdom, self.ydom, self.zdom).length()
    }

    pub fn contains(&self, p: [f64; 3]) -> bool {
        (self.xmin..=self.xmax).contains(&p[0])
            && (self.ymin..=self.ymax).contains(&p[1])
            && (self.zmin..=self.zmax).contains(&p[2])
    }

    /// Smallest box enclosing both `self` and `other`.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        Self::from_corners(self.min().min(other.min()), self.max().max(other.max()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extents_and_center() {
        let bb = BoundingBox::from_points(&[[1.0, 2.0, 3.0], [5.0, -2.0, 4.0], [3.0, 0.0, 7.0]])
            .unwrap();

        assert_eq!((bb.xmin, bb.xmax), (1.0, 5.0));
        assert_eq!((bb.ymin, bb.ymax), (-2.0, 2.0));
        assert_eq!((bb.zmin, bb.zmax), (3.0, 7.0));
        assert_eq!((bb.xdom, bb.ydom, bb.zdom), (4.0, 4.0, 4.0));
        assert_eq!(bb.center_vec, DVec3::new(-3.0, 0.0, -5.0));
        assert_eq!(bb.mid_point(), DVec3::new(3.0, 0.0, 5.0));
    }

    #[test]
    fn test_flat_matches_points() {
        let flat = [0.0, 0.0, 0.0, 2.0, 4.0, 6.0, 7.0];
        let a = BoundingBox::from_flat(&flat).unwrap();
        let b = BoundingBox::from_points(&[[0.0, 0.0, 0.0], [2.0, 4.0, 6.0]]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_and_non_finite() {
        assert!(matches!(
            BoundingBox::from_points(&[]),
            Err(WrapError::EmptyGeometry { .. })
        ));
        assert!(matches!(
            BoundingBox::from_points(&[[f64::NAN, 0.0, 0.0]]),
            Err(WrapError::EmptyGeometry { .. })
        ));

        let bb = BoundingBox::from_points(&[[f64::INFINITY, 0.0, 0.0], [1.0, 1.0, 1.0]]).unwrap();
        assert_eq!(bb.xdom, 0.0);
        assert_eq!(bb.center_vec, DVec3::new(-1.0, -1.0, -1.0));
    }

    #[test]
    fn test_point_sets_and_union() {
        let a: &[[f64; 3]] = &[[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]];
        let b: &[[f64; 3]] = &[[10.0, -5.0, 2.0]];

        let global = BoundingBox::from_point_sets("scene", [a, b]).unwrap();
        let union = BoundingBox::from_points(a)
            .unwrap()
            .union(&BoundingBox::from_points(b).unwrap());

        assert_eq!(global, union);
        assert!(global.contains([5.0, 0.0, 1.5]));
        assert!(!global.contains([11.0, 0.0, 1.5]));
        assert!(global.xdom >= 0.0 && global.ydom >= 0.0 && global.zdom >= 0.0);
    }

    #[test]
    fn test_diagonal() {
        let bb = BoundingBox::from_points(&[[0.0, 0.0, 0.0], [3.0, 4.0, 0.0]]).unwrap();
        assert!((bb.diagonal() - 5.0).abs() < 1e-12);
    }
}
