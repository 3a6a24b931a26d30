//! Math utilities for touch hit testing and gesture deltas.

use bevy::math::Ray3d;
use bevy::prelude::*;

/// Minimum pinch span (in pixels) accepted as a scale baseline.
const MIN_SPAN: f32 = 1e-3;

/// Solve intersection between a ray and a sphere. Returns distance along the
/// ray if there is an intersection, otherwise `None`.
pub(crate) fn ray_sphere_intersection(ray: &Ray3d, center: Vec3, radius: f32) -> Option<f32> {
    let m = ray.origin - center;
    let b = m.dot(*ray.direction);
    let c = m.length_squared() - radius * radius;

    // Exit if ray origin is outside sphere (c > 0) and ray is pointing away
    // from sphere (b > 0).
    if c > 0.0 && b > 0.0 {
        return None;
    }

    let discr = b * b - c;
    if discr < 0.0 {
        return None;
    }

    let t = -b - discr.sqrt();
    if t < 0.0 {
        Some(0.0)
    } else {
        Some(t)
    }
}

/// Distance and orientation of the segment between two touch points.
///
/// The angle is measured in screen space (y down), counter-clockwise from +x.
pub(crate) fn touch_span_angle(a: Vec2, b: Vec2) -> (f32, f32) {
    let d = b - a;
    (d.length(), d.to_angle())
}

/// Uniform scale factor produced by a pinch, guarded against a degenerate
/// baseline span.
pub(crate) fn pinch_scale(base_scale: f32, base_span: f32, span: f32) -> f32 {
    base_scale * (span / base_span.max(MIN_SPAN))
}

/// Wrap an angle difference into (-PI, PI].
pub(crate) fn wrap_angle(angle: f32) -> f32 {
    use std::f32::consts::PI;
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

/// Yaw (rotation about +Y) encoded in a quaternion.
pub(crate) fn yaw_of(rotation: Quat) -> f32 {
    rotation.to_euler(EulerRot::YXZ).0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::{FRAC_PI_2, PI};

    fn ray(origin: Vec3, dir: Vec3) -> Ray3d {
        Ray3d::new(origin, Dir3::new(dir).unwrap())
    }

    #[test]
    fn sphere_hit_and_miss() {
        let r = ray(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
        let t = ray_sphere_intersection(&r, Vec3::ZERO, 1.0).unwrap();
        assert_relative_eq!(t, 4.0, epsilon = 1e-5);

        assert!(ray_sphere_intersection(&r, Vec3::new(3.0, 0.0, 0.0), 1.0).is_none());
        // Pointing away from the sphere.
        let away = ray(Vec3::new(0.0, 0.0, 5.0), Vec3::Z);
        assert!(ray_sphere_intersection(&away, Vec3::ZERO, 1.0).is_none());
    }

    #[test]
    fn span_and_angle() {
        let (span, angle) = touch_span_angle(Vec2::new(100.0, 100.0), Vec2::new(300.0, 100.0));
        assert_relative_eq!(span, 200.0);
        assert_relative_eq!(angle, 0.0);

        let (_, angle) = touch_span_angle(Vec2::new(0.0, 0.0), Vec2::new(0.0, 50.0));
        assert_relative_eq!(angle, FRAC_PI_2, epsilon = 1e-5);
    }

    #[test]
    fn pinch_scale_is_proportional_and_guarded() {
        assert_relative_eq!(pinch_scale(1.0, 200.0, 400.0), 2.0);
        assert_relative_eq!(pinch_scale(2.0, 200.0, 100.0), 1.0);
        // A zero baseline must not divide by zero.
        assert!(pinch_scale(1.0, 0.0, 100.0).is_finite());
    }

    #[test]
    fn angle_wrapping() {
        assert_relative_eq!(wrap_angle(0.0), 0.0);
        assert_relative_eq!(wrap_angle(2.0 * PI + 0.1), 0.1, epsilon = 1e-5);
        assert_relative_eq!(wrap_angle(-2.0 * PI - 0.1), -0.1, epsilon = 1e-5);
    }

    #[test]
    fn yaw_roundtrip() {
        let q = Quat::from_rotation_y(0.7);
        assert_relative_eq!(yaw_of(q), 0.7, epsilon = 1e-5);
    }
}
