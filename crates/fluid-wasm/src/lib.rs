use fluid_core::boundary::PlaneBoundary;
use fluid_core::config::SphConfig;
use fluid_core::materials::MaterialPreset;
use fluid_core::simulator::Simulator;
use glam::Vec3;
use wasm_bindgen::prelude::*;

mod block;
mod frame;

use block::{block_positions, BlockDims};
pub use frame::{decode_frame, FrameError, ParticleFrame};

/// GPU-compatible particle struct: 32 bytes, matches the WGSL `Particle`
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GpuParticle {
    position: [f32; 3], // 12 bytes
    radius: f32,        //  4 bytes
    velocity: [f32; 3], // 12 bytes
    speed: f32,         //  4 bytes
}

impl GpuParticle {
    fn new(position: Vec3, radius: f32, velocity: Vec3) -> Self {
        Self {
            position: position.to_array(),
            radius,
            velocity: velocity.to_array(),
            speed: velocity.length(),
        }
    }
}

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// SPH fluid in a box, stepped from JavaScript.
#[wasm_bindgen]
pub struct FluidWorld {
    sim: Simulator,
    gpu_buffer: Vec<GpuParticle>,
    box_min: Vec3,
    box_max: Vec3,
    restitution: f32,
}

#[wasm_bindgen]
impl FluidWorld {
    #[wasm_bindgen(constructor)]
    pub fn new(max_particles: usize) -> Result<FluidWorld, JsValue> {
        web_sys::console::log_1(&format!("WASM FluidWorld created: {} particles max", max_particles).into());

        let sim = Simulator::new(max_particles, SphConfig::default()).map_err(js_error)?;
        let mut world = FluidWorld {
            sim,
            gpu_buffer: Vec::with_capacity(max_particles),
            box_min: Vec3::new(-1.0, 0.0, -1.0),
            box_max: Vec3::new(1.0, 2.0, 1.0),
            restitution: 0.3,
        };
        world.install_box();
        world.write_gpu_output();
        Ok(world)
    }

    /// Advance by `dt` seconds. Returns wall time spent in milliseconds.
    #[wasm_bindgen]
    pub fn step(&mut self, dt: f32) -> f32 {
        let start = js_sys::Date::now();
        self.sim.step(dt);
        self.write_gpu_output();
        (js_sys::Date::now() - start) as f32
    }

    #[wasm_bindgen]
    pub fn get_gpu_buffer_ptr(&self) -> *const f32 {
        self.gpu_buffer.as_ptr() as *const f32
    }

    #[wasm_bindgen]
    pub fn get_gpu_buffer_byte_length(&self) -> usize {
        bytemuck::cast_slice::<GpuParticle, u8>(&self.gpu_buffer).len()
    }

    #[wasm_bindgen]
    pub fn particle_count(&self) -> usize {
        self.sim.particles.count
    }

    /// Set one simulation scalar by name. Rejected values leave the world
    /// untouched.
    #[wasm_bindgen]
    pub fn set_parameter(&mut self, name: &str, value: f32) -> Result<(), JsValue> {
        if name == "smoothing_radius" {
            return self.sim.set_smoothing_radius(value).map_err(js_error);
        }
        let mut config = self.sim.config().clone();
        match name {
            "density_reference" => config.density_reference = value,
            "pressure_constant" => config.pressure_constant = value,
            "viscosity" => config.viscosity = value,
            "min_time_step" => config.min_time_step = value,
            "max_velocity" => config.max_velocity = value,
            "max_acceleration" => config.max_acceleration = value,
            "particle_radius" => config.particle_radius = value,
            _ => return Err(JsValue::from_str(&format!("Unknown parameter '{}'", name))),
        }
        self.sim.set_config(config).map_err(js_error)
    }

    #[wasm_bindgen]
    pub fn set_gravity(&mut self, x: f32, y: f32, z: f32) -> Result<(), JsValue> {
        let mut config = self.sim.config().clone();
        config.gravity = Vec3::new(x, y, z);
        self.sim.set_config(config).map_err(js_error)
    }

    /// Apply "water", "honey" or "mist".
    #[wasm_bindgen]
    pub fn set_material(&mut self, name: &str) -> Result<(), JsValue> {
        let preset = MaterialPreset::by_name(name)
            .ok_or_else(|| JsValue::from_str(&format!("Unknown material '{}'", name)))?;
        let mut config = self.sim.config().clone();
        preset.apply_to(&mut config);
        self.sim.set_config(config).map_err(js_error)
    }

    #[wasm_bindgen]
    pub fn set_box(
        &mut self,
        min_x: f32, min_y: f32, min_z: f32,
        max_x: f32, max_y: f32, max_z: f32,
        restitution: f32,
    ) {
        self.box_min = Vec3::new(min_x, min_y, min_z);
        self.box_max = Vec3::new(max_x, max_y, max_z);
        self.restitution = restitution.clamp(0.0, 1.0);
        self.install_box();
    }

    /// Append an `nx * ny * nz` block of particles with its minimum corner at
    /// `(x, y, z)`. Positions are jittered by up to `jitter * spacing` so the
    /// block does not stay a perfect lattice. Returns how many were added.
    #[wasm_bindgen]
    pub fn spawn_block(
        &mut self,
        x: f32, y: f32, z: f32,
        nx: u32, ny: u32, nz: u32,
        spacing: f32,
        jitter: f32,
    ) -> usize {
        let mut seed_bytes = [0u8; 4];
        if getrandom::getrandom(&mut seed_bytes).is_err() {
            web_sys::console::warn_1(&"getrandom unavailable, spawning without random seed".into());
        }
        let seed = (u32::from_le_bytes(seed_bytes) % 65_536) as f32;

        let dims = BlockDims { nx, ny, nz };
        let room = self.sim.particles.max_count().saturating_sub(self.sim.particles.count);
        let positions = block_positions(Vec3::new(x, y, z), dims, spacing, jitter, seed, room);
        let added = self.sim.add_particles(&positions, &[]);
        if added < dims.count() {
            web_sys::console::warn_1(
                &format!("spawn_block: capacity reached, {} of {} particles added", added, dims.count()).into(),
            );
        }
        self.write_gpu_output();
        added
    }

    /// Remove every particle.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.sim.particles.set_active_count(0);
        self.write_gpu_output();
    }

    /// Replace the simulated particles with a precomputed frame. Particles
    /// beyond the world capacity are dropped.
    #[wasm_bindgen]
    pub fn load_frame(&mut self, bytes: &[u8]) -> Result<usize, JsValue> {
        let frame = decode_frame(bytes).map_err(js_error)?;
        if frame.radius > 0.0 {
            let mut config = self.sim.config().clone();
            config.particle_radius = frame.radius;
            self.sim.set_config(config).map_err(js_error)?;
        }
        self.sim.particles.set_active_count(0);
        let count = self.sim.add_particles(&frame.positions, &[]);
        self.write_gpu_output();
        Ok(count)
    }
}

impl FluidWorld {
    fn install_box(&mut self) {
        self.sim.set_boundary(Box::new(PlaneBoundary::axis_aligned_box(
            self.box_min,
            self.box_max,
            self.restitution,
        )));
    }

    fn write_gpu_output(&mut self) {
        let radius = self.sim.config().particle_radius;
        let particles = &self.sim.particles;
        self.gpu_buffer.clear();
        self.gpu_buffer.extend(
            (0..particles.count).map(|i| GpuParticle::new(particles.position[i], radius, particles.velocity[i])),
        );
    }
}
