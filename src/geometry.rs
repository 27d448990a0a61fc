//! Geometry primitives consumed by the mesh and partition subsystems
//! (§1 lists "geometry primitives" as an out-of-scope external collaborator;
//! this module gives that collaborator the narrow, concrete shape the core
//! needs to compile and to drive the §8 test scenarios end to end).

use crate::num_vec::Vector;

/// A 2D or 3D coordinate. `DIM` is 2 or 3, enforced where it matters by
/// `Mesh::dimensions()` rather than by the type system, mirroring the
/// teacher's runtime-checked dimensionality (data dimension is also only
/// known at runtime).
pub type Coord = Vector<f64, 3>;

pub fn coord2(x: f64, y: f64) -> Coord {
    Vector::from([x, y, 0.0])
}

pub fn coord3(x: f64, y: f64, z: f64) -> Coord {
    Vector::from([x, y, z])
}

pub fn distance(a: &Coord, b: &Coord, dims: usize) -> f64 {
    let mut sum = 0.0;
    for d in 0..dims {
        let diff = a[d] - b[d];
        sum += diff * diff;
    }
    sum.sqrt()
}

/// Axis-aligned bounding box in 2 or 3 dimensions. Invariant: `min[d] <=
/// max[d]` for every populated dimension (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    dims: usize,
    min: [f64; 3],
    max: [f64; 3],
}

impl BoundingBox {
    /// An empty box: `min = +inf`, `max = -inf` per dimension, so that the
    /// first `expand` call establishes real bounds.
    pub fn empty(dims: usize) -> Self {
        Self {
            dims,
            min: [f64::INFINITY; 3],
            max: [f64::NEG_INFINITY; 3],
        }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn is_empty(&self) -> bool {
        (0..self.dims).any(|d| self.min[d] > self.max[d])
    }

    pub fn from_point(dims: usize, point: &Coord) -> Self {
        let mut b = Self::empty(dims);
        b.expand_point(point);
        b
    }

    /// Union a single point into this box.
    pub fn expand_point(&mut self, point: &Coord) {
        for d in 0..self.dims {
            if point[d] < self.min[d] {
                self.min[d] = point[d];
            }
            if point[d] > self.max[d] {
                self.max[d] = point[d];
            }
        }
    }

    /// Union another box into this one (§3: `expand`).
    pub fn expand(&mut self, other: &BoundingBox) {
        for d in 0..self.dims {
            if other.min[d] < self.min[d] {
                self.min[d] = other.min[d];
            }
            if other.max[d] > self.max[d] {
                self.max[d] = other.max[d];
            }
        }
    }

    /// Grow the box uniformly by `factor` along every dimension about its
    /// own center (used for the partition's safety factor, §4.3). `factor`
    /// is a multiplier on the half-width, so `factor = 1.0` is a no-op and
    /// `factor = 1.0 + safetyFactor` grows each side by `safetyFactor`.
    pub fn inflate(&self, factor: f64) -> Self {
        let mut out = self.clone();
        if self.is_empty() {
            return out;
        }
        for d in 0..self.dims {
            let half = (self.max[d] - self.min[d]) * 0.5 * factor.max(0.0);
            let center = (self.max[d] + self.min[d]) * 0.5;
            out.min[d] = center - half;
            out.max[d] = center + half;
        }
        out
    }

    pub fn contains(&self, point: &Coord) -> bool {
        if self.is_empty() {
            return false;
        }
        (0..self.dims).all(|d| point[d] >= self.min[d] && point[d] <= self.max[d])
    }

    /// Intersection test (§3: "intersection tests").
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        (0..self.dims).all(|d| self.min[d] <= other.max[d] && other.min[d] <= self.max[d])
    }

    pub fn min(&self, d: usize) -> f64 {
        self.min[d]
    }

    pub fn max(&self, d: usize) -> f64 {
        self.max[d]
    }

    /// Wire representation per §6: `[min0,max0,min1,max1,(min2,max2)?]`.
    pub fn to_wire(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.dims * 2);
        for d in 0..self.dims {
            out.push(self.min[d]);
            out.push(self.max[d]);
        }
        out
    }

    pub fn from_wire(dims: usize, values: &[f64]) -> Self {
        let mut b = Self::empty(dims);
        for d in 0..dims {
            b.min[d] = values[2 * d];
            b.max[d] = values[2 * d + 1];
        }
        b
    }
}

/// Result of the convexity oracle used by §4.2's quad decomposition: whether
/// the four points are convex, and their canonical order `[v0,v1,v2,v3]`
/// around the quad.
pub struct ConvexQuad {
    pub is_convex: bool,
    pub order: [usize; 4],
}

/// Checks whether four coplanar 2D points (indices into `points`) form a
/// convex quadrilateral, using the sign of the cross product at each vertex
/// walked in input order. Returns the input order unchanged: callers that
/// need a specific winding should sort before calling.
pub fn convex_quad_oracle(points: &[Coord; 4]) -> ConvexQuad {
    let cross = |a: &Coord, b: &Coord, c: &Coord| -> f64 {
        let ux = b[0] - a[0];
        let uy = b[1] - a[1];
        let vx = c[0] - b[0];
        let vy = c[1] - b[1];
        ux * vy - uy * vx
    };
    let mut signs = [0.0; 4];
    for i in 0..4 {
        let a = &points[i];
        let b = &points[(i + 1) % 4];
        let c = &points[(i + 2) % 4];
        signs[i] = cross(a, b, c);
    }
    let is_convex = signs.iter().all(|s| *s >= 0.0) || signs.iter().all(|s| *s <= 0.0);
    ConvexQuad {
        is_convex,
        order: [0, 1, 2, 3],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn bounding_box_expand_and_intersect() {
        let mut a = BoundingBox::empty(2);
        a.expand_point(&coord2(0.0, 0.0));
        a.expand_point(&coord2(1.0, 1.0));
        assert!(!a.is_empty());
        assert_relative_eq!(a.min(0), 0.0);
        assert_relative_eq!(a.max(0), 1.0);

        let mut b = BoundingBox::empty(2);
        b.expand_point(&coord2(0.5, 0.5));
        b.expand_point(&coord2(1.5, 1.5));
        assert!(a.intersects(&b));

        let mut c = BoundingBox::empty(2);
        c.expand_point(&coord2(5.0, 5.0));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn bounding_box_contains_region() {
        // Scenario 5 in §8: provider mesh in [0,1]^2, receiver region
        // [0.5,1.5]x[0.5,1.5]; only points with both coords >= 0.5 qualify.
        let mut region = BoundingBox::empty(2);
        region.expand_point(&coord2(0.5, 0.5));
        region.expand_point(&coord2(1.5, 1.5));

        let pts = [
            coord2(0.2, 0.2),
            coord2(0.6, 0.6),
            coord2(0.9, 0.4),
            coord2(0.7, 0.8),
        ];
        let kept: Vec<_> = pts.iter().filter(|p| region.contains(p)).collect();
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn empty_box_is_empty() {
        let b = BoundingBox::empty(3);
        assert!(b.is_empty());
        assert!(!b.contains(&coord3(0.0, 0.0, 0.0)));
    }

    #[test]
    fn wire_roundtrip() {
        let mut b = BoundingBox::empty(3);
        b.expand_point(&coord3(-1.0, -2.0, -3.0));
        b.expand_point(&coord3(4.0, 5.0, 6.0));
        let wire = b.to_wire();
        let back = BoundingBox::from_wire(3, &wire);
        assert_eq!(b, back);
    }

    #[test]
    fn convex_quad_detects_square() {
        let pts = [
            coord2(0.0, 0.0),
            coord2(1.0, 0.0),
            coord2(1.0, 1.0),
            coord2(0.0, 1.0),
        ];
        assert!(convex_quad_oracle(&pts).is_convex);
    }
}
