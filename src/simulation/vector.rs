//! 3D vector math for particle state
//!
//! `NVec3` is nalgebra's `Vector3<f64>`, which already provides add, subtract,
//! scale, dot, cross, magnitude and exact component equality. `VectorExt` adds
//! the few operations the contact model needs in a zero-safe form.

use nalgebra::Vector3;

pub type NVec3 = Vector3<f64>;

pub trait VectorExt {
    /// Unit vector in the same direction, or the zero vector when the
    /// magnitude is zero (nalgebra's `normalize` would produce NaNs)
    fn normalize_or_zero(&self) -> NVec3;

    /// Euclidean distance between two points
    fn distance(&self, other: &NVec3) -> f64;

    /// Component lying in the plane with the given unit normal
    fn project_onto_plane(&self, unit_normal: &NVec3) -> NVec3;

    /// True when every component is finite
    fn all_finite(&self) -> bool;
}

impl VectorExt for NVec3 {
    fn normalize_or_zero(&self) -> NVec3 {
        let n = self.norm();
        if n == 0.0 {
            NVec3::zeros()
        } else {
            self / n
        }
    }

    fn distance(&self, other: &NVec3) -> f64 {
        (self - other).norm()
    }

    fn project_onto_plane(&self, unit_normal: &NVec3) -> NVec3 {
        self - unit_normal * self.dot(unit_normal)
    }

    fn all_finite(&self) -> bool {
        self.iter().all(|c| c.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_zero_vector_is_zero() {
        assert_eq!(NVec3::zeros().normalize_or_zero(), NVec3::zeros());
    }

    #[test]
    fn normalize_has_unit_length() {
        let v = NVec3::new(3.0, 0.0, 4.0).normalize_or_zero();
        assert!((v.norm() - 1.0).abs() < 1e-15);
        assert_eq!(v, NVec3::new(0.6, 0.0, 0.8));
    }

    #[test]
    fn plane_projection_drops_normal_component() {
        let v = NVec3::new(1.0, 2.0, 3.0);
        let p = v.project_onto_plane(&NVec3::z());
        assert_eq!(p, NVec3::new(1.0, 2.0, 0.0));
        assert_eq!(p.dot(&NVec3::z()), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = NVec3::new(0.0, 0.0, 0.0);
        let b = NVec3::new(1.0, 2.0, 2.0);
        assert_eq!(a.distance(&b), 3.0);
        assert_eq!(b.distance(&a), 3.0);
    }

    #[test]
    fn finite_check_catches_nan() {
        assert!(NVec3::new(1.0, 2.0, 3.0).all_finite());
        assert!(!NVec3::new(1.0, f64::NAN, 3.0).all_finite());
        assert!(!NVec3::new(f64::INFINITY, 0.0, 0.0).all_finite());
    }
}
