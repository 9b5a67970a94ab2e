//! Registered fluids and the targets that render them.
//!
//! Every render object draws into exactly one [`TargetRenderer`]. Objects
//! registered without an explicit target share an automatically created one
//! per camera (and diffuse setting). A target goes away with its last
//! object unless it was marked to be kept.

use tracing::{debug, trace};

use crate::error::{ensure_finite, ensure_positive, ConfigError, RenderError};
use crate::params::Parameter;
use crate::render::backend::{RenderBackend, TextureId};
use crate::render::camera::{Camera, CameraId};
use crate::render::object::RenderObject;
use crate::render::target::{TargetRenderer, TargetSettings};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u32);

/// Where a new render object should be drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Registration {
    /// Explicit target; when `None` a shared default target is used.
    pub target: Option<TargetId>,
    /// Camera of the default target; `None` renders for any camera.
    pub camera: Option<CameraId>,
    /// Whether the default target generates a diffuse channel.
    pub generate_diffuse: bool,
}

/// What happened during one `render_frame`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub targets_composited: usize,
    /// Targets skipped because their composite pass was not ready.
    pub targets_skipped: usize,
    pub objects_rendered: usize,
}

struct TargetEntry {
    id: TargetId,
    renderer: TargetRenderer,
    camera: Option<CameraId>,
    /// Created by the registry and shared by objects without an explicit target.
    shared_default: bool,
    /// Dispose when the last object drawing into it is removed.
    remove_when_unused: bool,
}

struct ObjectEntry {
    id: ObjectId,
    object: RenderObject,
    target: TargetId,
}

#[derive(Default)]
pub struct FluidRegistry {
    objects: Vec<ObjectEntry>,
    targets: Vec<TargetEntry>,
    next_object: u32,
    next_target: u32,
}

impl FluidRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Create a target for objects registered with an explicit target. Like
    /// the default targets it is disposed with its last object; see
    /// [`set_remove_when_unused`](Self::set_remove_when_unused) to keep it.
    pub fn create_target(&mut self, camera: Option<CameraId>, settings: TargetSettings) -> Result<TargetId, ConfigError> {
        settings.validate()?;
        Ok(self.insert_target(camera, settings, false))
    }

    fn insert_target(&mut self, camera: Option<CameraId>, settings: TargetSettings, shared_default: bool) -> TargetId {
        let id = TargetId(self.next_target);
        self.next_target += 1;
        self.targets.push(TargetEntry {
            id,
            renderer: TargetRenderer::new(settings),
            camera,
            shared_default,
            remove_when_unused: true,
        });
        id
    }

    /// Release a target and its resources. A target that objects still draw
    /// into is kept and `Ok(false)` is returned.
    pub fn remove_target<B: RenderBackend + ?Sized>(&mut self, backend: &mut B, id: TargetId) -> Result<bool, RenderError> {
        let index = self.target_index(id)?;
        if self.objects.iter().any(|o| o.target == id) {
            return Ok(false);
        }
        let mut entry = self.targets.remove(index);
        entry.renderer.dispose(backend);
        debug!(target = id.0, "fluid target removed");
        Ok(true)
    }

    /// With `false`, the target survives without objects until
    /// [`remove_target`](Self::remove_target).
    pub fn set_remove_when_unused(&mut self, id: TargetId, remove: bool) -> Result<(), RenderError> {
        let index = self.target_index(id)?;
        self.targets[index].remove_when_unused = remove;
        Ok(())
    }

    pub fn target(&self, id: TargetId) -> Option<&TargetRenderer> {
        self.targets.iter().find(|t| t.id == id).map(|t| &t.renderer)
    }

    /// Direct access for settings not covered by [`Parameter`].
    pub fn target_mut(&mut self, id: TargetId) -> Option<&mut TargetRenderer> {
        self.targets.iter_mut().find(|t| t.id == id).map(|t| &mut t.renderer)
    }

    pub fn target_of(&self, id: ObjectId) -> Option<TargetId> {
        self.objects.iter().find(|o| o.id == id).map(|o| o.target)
    }

    pub fn object(&self, id: ObjectId) -> Option<&RenderObject> {
        self.objects.iter().find(|o| o.id == id).map(|o| &o.object)
    }

    fn target_index(&self, id: TargetId) -> Result<usize, RenderError> {
        self.targets
            .iter()
            .position(|t| t.id == id)
            .ok_or(RenderError::UnknownTarget(id))
    }

    fn object_index(&self, id: ObjectId) -> Result<usize, RenderError> {
        self.objects
            .iter()
            .position(|o| o.id == id)
            .ok_or(RenderError::UnknownObject(id))
    }

    /// Register a fluid. Without an explicit target, the object joins the
    /// default target of its camera and diffuse setting, creating it if needed.
    pub fn add_render_object(&mut self, object: RenderObject, registration: Registration) -> Result<ObjectId, RenderError> {
        ensure_positive("particle_size", object.particle_size)?;
        let target = match registration.target {
            Some(target) => {
                self.target_index(target)?;
                target
            }
            None => self.default_target(registration.camera, registration.generate_diffuse),
        };

        let id = ObjectId(self.next_object);
        self.next_object += 1;
        self.objects.push(ObjectEntry { id, object, target });
        self.sync_particle_size(target);
        debug!(object = id.0, target = target.0, "render object added");
        Ok(id)
    }

    fn default_target(&mut self, camera: Option<CameraId>, generate_diffuse: bool) -> TargetId {
        let existing = self.targets.iter().find(|t| {
            t.shared_default && t.camera == camera && t.renderer.settings().generate_diffuse == generate_diffuse
        });
        match existing {
            Some(entry) => entry.id,
            None => {
                let settings = TargetSettings {
                    generate_diffuse,
                    ..TargetSettings::default()
                };
                self.insert_target(camera, settings, true)
            }
        }
    }

    /// Unregister a fluid and hand it back. A target left without objects is
    /// disposed unless it was marked to be kept.
    pub fn remove_render_object<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        id: ObjectId,
    ) -> Result<RenderObject, RenderError> {
        let index = self.object_index(id)?;
        let entry = self.objects.remove(index);
        let target = entry.target;

        let orphaned = !self.objects.iter().any(|o| o.target == target);
        if orphaned {
            if let Some(pos) = self.targets.iter().position(|t| t.id == target && t.remove_when_unused) {
                let mut removed = self.targets.remove(pos);
                removed.renderer.dispose(backend);
                debug!(target = target.0, "orphaned fluid target removed");
            }
        } else {
            self.sync_particle_size(target);
        }
        Ok(entry.object)
    }

    /// The shared depth channel has to fit the largest particle drawn into it.
    fn sync_particle_size(&mut self, target: TargetId) {
        let max_size = self
            .objects
            .iter()
            .filter(|o| o.target == target)
            .map(|o| o.object.particle_size)
            .fold(None, |acc: Option<f32>, s| Some(acc.map_or(s, |a| a.max(s))));
        if let (Some(size), Some(entry)) = (max_size, self.targets.iter_mut().find(|t| t.id == target)) {
            entry.renderer.set_fixed_particle_size(size);
        }
    }

    /// Apply a tunable to an object or to the target it draws into.
    pub fn set_parameter(&mut self, id: ObjectId, param: Parameter) -> Result<(), RenderError> {
        let index = self.object_index(id)?;
        let target = self.objects[index].target;

        if param.is_object_level() {
            let object = &mut self.objects[index].object;
            match param {
                Parameter::ParticleSize(size) => {
                    object.particle_size = ensure_positive("particle_size", size)?;
                }
                Parameter::ThicknessAlpha(alpha) => {
                    object.particle_thickness_alpha = ensure_finite("thickness_alpha", alpha)?;
                }
                Parameter::Priority(priority) => object.priority = priority,
                _ => {}
            }
            self.sync_particle_size(target);
            return Ok(());
        }

        let index = self.target_index(target)?;
        let renderer = &mut self.targets[index].renderer;
        match param {
            Parameter::FluidColor(color) => renderer.set_fluid_color(color)?,
            Parameter::Density(density) => renderer.set_density(density)?,
            Parameter::RefractionStrength(strength) => renderer.set_refraction_strength(strength)?,
            Parameter::IndexOfRefraction(ior) => renderer.set_index_of_refraction(ior)?,
            Parameter::BlurKernel(kind, radius) => renderer.set_blur_kernel_radius(kind, radius)?,
            Parameter::BlurEnabled(kind, enabled) => renderer.set_blur_enabled(kind, enabled),
            Parameter::MapSize(kind, size) => renderer.set_map_size(kind, size)?,
            Parameter::GenerateDiffuse(enabled) => renderer.set_generate_diffuse(enabled),
            Parameter::UseVelocity(enabled) => renderer.set_use_velocity(enabled),
            Parameter::FixedThicknessMode(enabled) => renderer.set_fixed_thickness_mode(enabled),
            Parameter::Debug(feature) => renderer.set_debug(feature),
            Parameter::ParticleSize(_) | Parameter::ThicknessAlpha(_) | Parameter::Priority(_) => {}
        }
        Ok(())
    }

    /// [`set_parameter`](Self::set_parameter) for string-keyed hosts.
    pub fn set_parameter_by_name(&mut self, id: ObjectId, name: &str, values: &[f32]) -> Result<(), RenderError> {
        let param = Parameter::parse(name, values)?;
        self.set_parameter(id, param)
    }

    /// Environment map reflected by the fluid of `target`.
    pub fn set_environment(&mut self, target: TargetId, texture: Option<TextureId>) -> Result<(), RenderError> {
        let index = self.target_index(target)?;
        self.targets[index].renderer.set_environment(texture);
        Ok(())
    }

    /// Captured scene depth for fixed thickness mode.
    pub fn set_background_depth(&mut self, target: TargetId, texture: Option<TextureId>) -> Result<(), RenderError> {
        let index = self.target_index(target)?;
        self.targets[index].renderer.set_background_depth(texture);
        Ok(())
    }

    /// Advance every particle source, e.g. step simulations.
    pub fn update(&mut self, dt: f32) {
        for entry in &mut self.objects {
            entry.object.source.advance(dt);
        }
    }

    /// Render every target that belongs to `camera` and has objects.
    ///
    /// Objects are drawn in ascending priority; equal priorities keep
    /// registration order. Without a camera nothing is rendered.
    pub fn render_frame<B: RenderBackend + ?Sized>(&mut self, backend: &mut B, camera: Option<&Camera>) -> FrameStats {
        let mut stats = FrameStats::default();
        let Some(camera) = camera else {
            trace!("no camera, fluid rendering suppressed");
            return stats;
        };

        let mut order: Vec<&ObjectEntry> = self.objects.iter().collect();
        order.sort_by_key(|o| o.object.priority);

        for entry in &mut self.targets {
            if entry.camera.is_some_and(|c| c != camera.id) {
                continue;
            }
            let objects: Vec<&RenderObject> = order
                .iter()
                .filter(|o| o.target == entry.id)
                .map(|o| &o.object)
                .collect();
            if objects.is_empty() {
                continue;
            }

            let renderer = &mut entry.renderer;
            renderer.ensure_initialized(backend);
            renderer.clear_targets(backend);
            renderer.render(backend, camera, &objects);
            stats.objects_rendered += objects.iter().filter(|o| o.is_ready()).count();

            if renderer.composite(backend, camera) {
                stats.targets_composited += 1;
            } else {
                stats.targets_skipped += 1;
            }
        }
        stats
    }

    /// Release every target. Registered objects stay; their targets are
    /// rebuilt on the next frame.
    pub fn dispose<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        for entry in &mut self.targets {
            entry.renderer.dispose(backend);
        }
    }
}
