use glam::{Vec3, Vec4};

/// SoA particle storage.
///
/// Every buffer is allocated at `max_count`; only the first `count` entries
/// are simulated and rendered. Index `i` names the same particle until it is
/// removed, and growing `count` only appends.
pub struct ParticleSet {
    pub count: usize,
    max_count: usize,
    pub position: Vec<Vec3>,
    pub velocity: Vec<Vec3>,
    pub acceleration: Vec<Vec3>,
    pub mass: Vec<f32>,
    /// SPH density estimate from the last density pass
    pub density: Vec<f32>,
    pub pressure: Vec<f32>,
    /// Optional per-particle RGBA used by the diffuse pass
    pub color: Option<Vec<Vec4>>,
}

impl ParticleSet {
    pub fn new(max_count: usize) -> Self {
        Self {
            count: 0,
            max_count,
            position: vec![Vec3::ZERO; max_count],
            velocity: vec![Vec3::ZERO; max_count],
            acceleration: vec![Vec3::ZERO; max_count],
            mass: vec![1.0; max_count],
            density: vec![0.0; max_count],
            pressure: vec![0.0; max_count],
            color: None,
        }
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    /// Allocate the color channel, filled with `default`.
    pub fn enable_color(&mut self, default: Vec4) {
        if self.color.is_none() {
            self.color = Some(vec![default; self.max_count]);
        }
    }

    /// Append particles after the active range.
    ///
    /// Anything past `max_count` is dropped; the return value is the number
    /// actually added.
    pub fn add_particles(&mut self, positions: &[Vec3], velocities: &[Vec3], mass: f32) -> usize {
        let room = self.max_count - self.count;
        let added = positions.len().min(room);
        if added < positions.len() {
            tracing::warn!(
                requested = positions.len(),
                added,
                max_count = self.max_count,
                "particle buffers full, dropping overflow particles"
            );
        }
        for k in 0..added {
            let i = self.count + k;
            self.position[i] = positions[k];
            self.velocity[i] = velocities.get(k).copied().unwrap_or(Vec3::ZERO);
            self.acceleration[i] = Vec3::ZERO;
            self.mass[i] = mass;
            self.density[i] = 0.0;
            self.pressure[i] = 0.0;
        }
        self.count += added;
        added
    }

    /// Change the active count without touching buffer contents.
    ///
    /// Requests above capacity are truncated to `max_count`.
    pub fn set_active_count(&mut self, count: usize) -> usize {
        if count > self.max_count {
            tracing::warn!(
                requested = count,
                max_count = self.max_count,
                "active count exceeds capacity, truncating"
            );
        }
        self.count = count.min(self.max_count);
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_particles_appends_without_reordering() {
        let mut set = ParticleSet::new(4);
        set.add_particles(&[Vec3::X, Vec3::Y], &[], 1.0);
        set.add_particles(&[Vec3::Z], &[Vec3::ONE], 2.0);
        assert_eq!(set.count, 3);
        assert_eq!(set.position[0], Vec3::X);
        assert_eq!(set.position[1], Vec3::Y);
        assert_eq!(set.position[2], Vec3::Z);
        assert_eq!(set.velocity[2], Vec3::ONE);
        assert_eq!(set.mass[2], 2.0);
    }

    #[test]
    fn test_add_particles_truncates_at_capacity() {
        let mut set = ParticleSet::new(2);
        let added = set.add_particles(&[Vec3::X, Vec3::Y, Vec3::Z], &[], 1.0);
        assert_eq!(added, 2);
        assert_eq!(set.count, 2);
        assert_eq!(set.set_active_count(10), 2);
    }
}
