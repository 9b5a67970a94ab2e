//! Collision collaborators run by the simulator after every integration substep.
//!
//! The simulator never decides what the scene looks like. It hands its
//! position and velocity buffers to a `Boundary`, which may push particles
//! out of obstacles and reflect their velocities in place.

use glam::Vec3;

/// Resolves collisions for the active particles, mutating them in place.
pub trait Boundary: Send {
    fn resolve(
        &mut self,
        positions: &mut [Vec3],
        velocities: &mut [Vec3],
        count: usize,
        particle_radius: f32,
    );
}

impl<F> Boundary for F
where
    F: FnMut(&mut [Vec3], &mut [Vec3], usize, f32) + Send,
{
    fn resolve(
        &mut self,
        positions: &mut [Vec3],
        velocities: &mut [Vec3],
        count: usize,
        particle_radius: f32,
    ) {
        self(positions, velocities, count, particle_radius)
    }
}

/// Leaves particles untouched.
pub struct NoBoundary;

impl Boundary for NoBoundary {
    fn resolve(&mut self, _: &mut [Vec3], _: &mut [Vec3], _: usize, _: f32) {}
}

/// Half-space `dot(normal, p) + offset >= 0`. Particles live on the side the
/// normal points to.
#[derive(Clone, Copy, Debug)]
pub struct Plane {
    pub normal: Vec3,
    pub offset: f32,
}

impl Plane {
    /// Plane through `point` facing `normal`.
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let normal = normal.normalize();
        Self {
            normal,
            offset: -normal.dot(point),
        }
    }

    #[inline]
    pub fn signed_distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p) + self.offset
    }
}

/// A set of planes with restitution.
///
/// A particle closer than its radius to a plane is pushed back onto the
/// surface, and the inward component of its velocity is reflected and
/// scaled by `restitution`.
pub struct PlaneBoundary {
    pub planes: Vec<Plane>,
    /// 0 = fully inelastic, 1 = perfectly elastic
    pub restitution: f32,
}

impl PlaneBoundary {
    pub fn new(planes: Vec<Plane>, restitution: f32) -> Self {
        Self {
            planes,
            restitution,
        }
    }

    /// Axis-aligned box: six inward-facing planes.
    pub fn axis_aligned_box(min: Vec3, max: Vec3, restitution: f32) -> Self {
        let planes = vec![
            Plane::from_point_normal(min, Vec3::X),
            Plane::from_point_normal(max, Vec3::NEG_X),
            Plane::from_point_normal(min, Vec3::Y),
            Plane::from_point_normal(max, Vec3::NEG_Y),
            Plane::from_point_normal(min, Vec3::Z),
            Plane::from_point_normal(max, Vec3::NEG_Z),
        ];
        Self::new(planes, restitution)
    }
}

impl Boundary for PlaneBoundary {
    fn resolve(
        &mut self,
        positions: &mut [Vec3],
        velocities: &mut [Vec3],
        count: usize,
        particle_radius: f32,
    ) {
        for i in 0..count {
            for plane in &self.planes {
                let dist = plane.signed_distance(positions[i]);
                if dist < particle_radius {
                    positions[i] += plane.normal * (particle_radius - dist);
                    let vn = velocities[i].dot(plane.normal);
                    if vn < 0.0 {
                        velocities[i] -= plane.normal * vn * (1.0 + self.restitution);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_pushes_out_and_bounces() {
        let mut floor = PlaneBoundary::new(vec![Plane::from_point_normal(Vec3::ZERO, Vec3::Y)], 0.5);
        let mut pos = vec![Vec3::new(0.0, -0.2, 0.0)];
        let mut vel = vec![Vec3::new(1.0, -2.0, 0.0)];

        floor.resolve(&mut pos, &mut vel, 1, 0.1);

        assert!((pos[0].y - 0.1).abs() < 1e-6, "pushed onto surface: {:?}", pos[0]);
        assert!((vel[0].y - 1.0).abs() < 1e-6, "reflected with restitution: {:?}", vel[0]);
        assert_eq!(vel[0].x, 1.0, "tangential velocity untouched");
    }

    #[test]
    fn test_box_keeps_particles_inside() {
        let mut walls = PlaneBoundary::axis_aligned_box(Vec3::splat(-1.0), Vec3::splat(1.0), 0.0);
        let mut pos = vec![Vec3::new(2.0, -3.0, 0.5)];
        let mut vel = vec![Vec3::new(5.0, -5.0, 0.0)];

        walls.resolve(&mut pos, &mut vel, 1, 0.05);

        assert!(pos[0].x <= 0.95 + 1e-5 && pos[0].y >= -0.95 - 1e-5, "{:?}", pos[0]);
        assert!(vel[0].x <= 0.0 && vel[0].y >= 0.0, "{:?}", vel[0]);
    }

    #[test]
    fn test_only_active_particles_resolved() {
        let mut floor = PlaneBoundary::new(vec![Plane::from_point_normal(Vec3::ZERO, Vec3::Y)], 0.0);
        let mut pos = vec![Vec3::new(0.0, -1.0, 0.0); 2];
        let mut vel = vec![Vec3::ZERO; 2];

        floor.resolve(&mut pos, &mut vel, 1, 0.0);

        assert_eq!(pos[0].y, 0.0);
        assert_eq!(pos[1].y, -1.0);
    }
}
