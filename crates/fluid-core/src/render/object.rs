//! Particle sources and the render objects that wrap them.

use glam::{Vec3, Vec4};

use crate::render::backend::{ParticleBatch, ParticleShader, RenderBackend};
use crate::render::camera::Camera;
use crate::simulator::Simulator;

/// Supplies particle buffers to the renderer.
///
/// Buffers are read-only for the duration of a frame; `advance` is the only
/// place a source may change them.
pub trait ParticleSource: Send {
    fn count(&self) -> usize;

    fn positions(&self) -> &[Vec3];

    fn velocities(&self) -> Option<&[Vec3]> {
        None
    }

    fn colors(&self) -> Option<&[Vec4]> {
        None
    }

    /// `false` while buffers are still being loaded.
    fn is_ready(&self) -> bool {
        true
    }

    /// Move the source forward by `dt` seconds.
    fn advance(&mut self, _dt: f32) {}
}

/// Host-filled buffers, e.g. a decoded precomputed frame.
#[derive(Clone, Debug, Default)]
pub struct BufferSource {
    pub positions: Vec<Vec3>,
    pub velocities: Option<Vec<Vec3>>,
    pub colors: Option<Vec<Vec4>>,
    /// Number of leading particles to draw.
    pub count: usize,
    pub ready: bool,
}

impl BufferSource {
    pub fn new(positions: Vec<Vec3>) -> Self {
        let count = positions.len();
        Self {
            positions,
            velocities: None,
            colors: None,
            count,
            ready: true,
        }
    }

    /// Replace positions and, when given, velocities. Count follows the new
    /// position buffer.
    pub fn set_positions(&mut self, positions: Vec<Vec3>, velocities: Option<Vec<Vec3>>) {
        self.count = positions.len();
        self.positions = positions;
        self.velocities = velocities;
    }
}

impl ParticleSource for BufferSource {
    fn count(&self) -> usize {
        self.count.min(self.positions.len())
    }

    fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    fn velocities(&self) -> Option<&[Vec3]> {
        self.velocities.as_deref()
    }

    fn colors(&self) -> Option<&[Vec4]> {
        self.colors.as_deref()
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}

/// Particles owned by an SPH simulator, stepped on `advance`.
pub struct SimulationSource {
    pub simulator: Simulator,
}

impl SimulationSource {
    pub fn new(simulator: Simulator) -> Self {
        Self { simulator }
    }
}

impl ParticleSource for SimulationSource {
    fn count(&self) -> usize {
        self.simulator.particles.count
    }

    fn positions(&self) -> &[Vec3] {
        &self.simulator.particles.position
    }

    fn velocities(&self) -> Option<&[Vec3]> {
        Some(&self.simulator.particles.velocity)
    }

    fn colors(&self) -> Option<&[Vec4]> {
        self.simulator.particles.color.as_deref()
    }

    fn advance(&mut self, dt: f32) {
        self.simulator.step(dt);
    }
}

/// A particle source plus how it is drawn.
pub struct RenderObject {
    pub source: Box<dyn ParticleSource>,
    /// World-space particle diameter.
    pub particle_size: f32,
    /// Thickness contributed by the center of one particle.
    pub particle_thickness_alpha: f32,
    /// Lower priorities draw first.
    pub priority: i32,
    /// Diffuse color when the source has no per-particle colors.
    pub default_color: Vec4,
}

impl RenderObject {
    pub fn new(source: Box<dyn ParticleSource>) -> Self {
        Self {
            source,
            particle_size: 0.1,
            particle_thickness_alpha: 0.05,
            priority: 0,
            default_color: Vec4::ONE,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.source.is_ready()
    }

    pub fn count(&self) -> usize {
        self.source.count()
    }

    /// Issue one draw for `shader`. Nothing is drawn for an empty source.
    pub fn draw<B: RenderBackend + ?Sized>(&self, backend: &mut B, camera: &Camera, shader: ParticleShader) {
        let count = self.count();
        if count == 0 {
            return;
        }
        let velocities = match shader {
            ParticleShader::Depth { write_velocity: true } => self.source.velocities(),
            _ => None,
        };
        let colors = match shader {
            ParticleShader::Diffuse => self.source.colors(),
            _ => None,
        };
        let batch = ParticleBatch {
            positions: self.source.positions(),
            velocities,
            colors,
            count,
            particle_size: self.particle_size,
            thickness_alpha: self.particle_thickness_alpha,
            default_color: self.default_color,
        };
        backend.draw_particles(camera, &batch, shader);
    }
}
