//! Per-camera pipeline: channels, blur and the composite pass.
//!
//! Structural settings (map sizes, blur topology, diffuse generation, debug
//! mode, velocity, fixed thickness) only mark the target dirty; the rebuild
//! happens once, before the next frame that renders it. Everything else is
//! applied on the spot.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{ensure_finite, ensure_positive, ConfigError};
use crate::render::backend::{CompositeTextures, ParticleShader, PassId, RenderBackend, TextureId};
use crate::render::blur::{BlurSettings, MAX_BLUR_KERNEL_RADIUS};
use crate::render::camera::Camera;
use crate::render::channel::{Channel, ChannelKind};
use crate::render::object::RenderObject;
use crate::render::shading::{CompositeDefines, CompositeUniforms, DebugFeature};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetState {
    Uninitialized,
    Ready,
    NeedsReinit,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetSettings {
    /// Width of the depth map; `None` renders at output resolution.
    pub depth_map_size: Option<u32>,
    pub thickness_map_size: Option<u32>,
    pub diffuse_map_size: Option<u32>,
    pub depth_blur: BlurSettings,
    pub thickness_blur: BlurSettings,
    pub diffuse_blur: BlurSettings,
    pub generate_diffuse: bool,
    pub debug: bool,
    pub debug_feature: DebugFeature,
    pub use_velocity: bool,
    pub fixed_thickness_mode: bool,

    pub fluid_color: Vec3,
    /// Absorption density for Beer-Lambert.
    pub density: f32,
    pub refraction_strength: f32,
    pub index_of_refraction: f32,
    pub specular_power: f32,
    pub fresnel_clamp: f32,
    /// Below this accumulated thickness a fragment shows the background.
    pub minimum_thickness: f32,
    /// Thickness assumed everywhere in fixed thickness mode.
    pub fixed_thickness: f32,
    /// World-space direction the light travels.
    pub light_direction: Vec3,
    /// How fast speed lightens the fluid color.
    pub velocity_tint: f32,
    pub reflection_color: Vec3,
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            depth_map_size: None,
            thickness_map_size: Some(256),
            diffuse_map_size: None,
            depth_blur: BlurSettings {
                kernel_radius: 17,
                scale: 0.05,
                depth_falloff: 1.0,
                ..BlurSettings::default()
            },
            thickness_blur: BlurSettings {
                kernel_radius: 5,
                scale: 0.2,
                depth_falloff: 1.0,
                ..BlurSettings::default()
            },
            diffuse_blur: BlurSettings {
                enabled: false,
                ..BlurSettings::default()
            },
            generate_diffuse: false,
            debug: false,
            debug_feature: DebugFeature::DepthBlurredTexture,
            use_velocity: false,
            fixed_thickness_mode: false,
            fluid_color: Vec3::new(0.085, 0.6375, 0.765),
            density: 2.0,
            refraction_strength: 0.1,
            index_of_refraction: 1.33,
            specular_power: 250.0,
            fresnel_clamp: 1.0,
            minimum_thickness: 0.0,
            fixed_thickness: 0.5,
            light_direction: Vec3::new(0.0, -1.0, 0.0),
            velocity_tint: 0.02,
            reflection_color: Vec3::new(0.7, 0.8, 0.9),
        }
    }
}

impl TargetSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for size in [self.depth_map_size, self.thickness_map_size, self.diffuse_map_size] {
            if size == Some(0) {
                return Err(ConfigError::ZeroMapSize);
            }
        }
        self.depth_blur.validate()?;
        self.thickness_blur.validate()?;
        self.diffuse_blur.validate()?;
        ensure_finite("density", self.density)?;
        ensure_finite("refraction_strength", self.refraction_strength)?;
        ensure_positive("index_of_refraction", self.index_of_refraction)?;
        ensure_finite("specular_power", self.specular_power)?;
        ensure_finite("fresnel_clamp", self.fresnel_clamp)?;
        ensure_finite("minimum_thickness", self.minimum_thickness)?;
        ensure_finite("fixed_thickness", self.fixed_thickness)?;
        ensure_finite("velocity_tint", self.velocity_tint)?;
        if !self.fluid_color.is_finite() {
            return Err(ConfigError::NonFinite { name: "fluid_color" });
        }
        if !self.light_direction.is_finite() {
            return Err(ConfigError::NonFinite { name: "light_direction" });
        }
        Ok(())
    }

    pub fn map_size(&self, kind: ChannelKind) -> Option<u32> {
        match kind {
            ChannelKind::Depth => self.depth_map_size,
            ChannelKind::Thickness => self.thickness_map_size,
            ChannelKind::Diffuse => self.diffuse_map_size,
        }
    }

    pub fn blur(&self, kind: ChannelKind) -> &BlurSettings {
        match kind {
            ChannelKind::Depth => &self.depth_blur,
            ChannelKind::Thickness => &self.thickness_blur,
            ChannelKind::Diffuse => &self.diffuse_blur,
        }
    }

    fn blur_mut(&mut self, kind: ChannelKind) -> &mut BlurSettings {
        match kind {
            ChannelKind::Depth => &mut self.depth_blur,
            ChannelKind::Thickness => &mut self.thickness_blur,
            ChannelKind::Diffuse => &mut self.diffuse_blur,
        }
    }

    /// True when going from `self` to `other` changes which textures or
    /// which composite program exist.
    pub fn is_structural_change(&self, other: &TargetSettings) -> bool {
        let blur_topology = |a: &BlurSettings, b: &BlurSettings| a.enabled != b.enabled || a.size_divisor != b.size_divisor;
        self.depth_map_size != other.depth_map_size
            || self.thickness_map_size != other.thickness_map_size
            || self.diffuse_map_size != other.diffuse_map_size
            || blur_topology(&self.depth_blur, &other.depth_blur)
            || blur_topology(&self.thickness_blur, &other.thickness_blur)
            || blur_topology(&self.diffuse_blur, &other.diffuse_blur)
            || self.generate_diffuse != other.generate_diffuse
            || self.debug != other.debug
            || self.debug_feature != other.debug_feature
            || self.use_velocity != other.use_velocity
            || self.fixed_thickness_mode != other.fixed_thickness_mode
    }

    pub fn composite_defines(&self) -> CompositeDefines {
        CompositeDefines {
            diffuse_texture: self.generate_diffuse,
            debug: self.debug,
            debug_texture: self.debug && self.debug_feature.is_texture(),
            debug_show_normal: self.debug && self.debug_feature == DebugFeature::Normals,
            debug_diffuse_rendering: self.debug && self.debug_feature == DebugFeature::DiffuseRendering,
            velocity: self.use_velocity,
            fixed_thickness: self.fixed_thickness_mode,
        }
    }
}

/// Texture size for a map of `size` texels across on an output of
/// `output` texels, keeping the output aspect ratio.
pub fn map_dimensions(size: Option<u32>, output: (u32, u32)) -> (u32, u32) {
    let (ow, oh) = (output.0.max(1), output.1.max(1));
    match size {
        None => (ow, oh),
        Some(s) => {
            let aspect = ow as f32 / oh as f32;
            (s.max(1), ((s as f32 / aspect).floor() as u32).max(1))
        }
    }
}

/// Everything needed to turn particles into shaded fluid for one camera.
#[derive(Debug)]
pub struct TargetRenderer {
    settings: TargetSettings,
    state: TargetState,
    output_size: (u32, u32),
    depth: Option<Channel>,
    diffuse: Option<Channel>,
    thickness: Option<Channel>,
    composite_pass: Option<PassId>,
    /// Largest particle diameter among the objects drawn into this target.
    fixed_particle_size: f32,
    background_depth: Option<TextureId>,
    environment: Option<TextureId>,
}

impl Default for TargetRenderer {
    fn default() -> Self {
        Self::new(TargetSettings::default())
    }
}

impl TargetRenderer {
    pub fn new(settings: TargetSettings) -> Self {
        Self {
            settings,
            state: TargetState::Uninitialized,
            output_size: (0, 0),
            depth: None,
            diffuse: None,
            thickness: None,
            composite_pass: None,
            fixed_particle_size: 0.1,
            background_depth: None,
            environment: None,
        }
    }

    pub fn settings(&self) -> &TargetSettings {
        &self.settings
    }

    pub fn state(&self) -> TargetState {
        self.state
    }

    pub fn needs_initialization(&self) -> bool {
        self.state != TargetState::Ready
    }

    fn mark_dirty(&mut self) {
        if self.state == TargetState::Ready {
            self.state = TargetState::NeedsReinit;
        }
    }

    pub fn channel(&self, kind: ChannelKind) -> Option<&Channel> {
        match kind {
            ChannelKind::Depth => self.depth.as_ref(),
            ChannelKind::Thickness => self.thickness.as_ref(),
            ChannelKind::Diffuse => self.diffuse.as_ref(),
        }
    }

    fn channel_mut(&mut self, kind: ChannelKind) -> Option<&mut Channel> {
        match kind {
            ChannelKind::Depth => self.depth.as_mut(),
            ChannelKind::Thickness => self.thickness.as_mut(),
            ChannelKind::Diffuse => self.diffuse.as_mut(),
        }
    }

    pub fn composite_pass(&self) -> Option<PassId> {
        self.composite_pass
    }

    /// Replace all settings. Rebuilds lazily only if something structural
    /// changed; blur parameters reach existing channels immediately.
    pub fn set_settings(&mut self, settings: TargetSettings) -> Result<(), ConfigError> {
        settings.validate()?;
        let structural = self.settings.is_structural_change(&settings);
        self.settings = settings;
        if structural {
            self.mark_dirty();
        } else {
            self.sync_blur_params();
        }
        Ok(())
    }

    fn sync_blur_params(&mut self) {
        for kind in [ChannelKind::Depth, ChannelKind::Thickness, ChannelKind::Diffuse] {
            let blur = *self.settings.blur(kind);
            if let Some(channel) = self.channel_mut(kind) {
                channel.set_blur_params(&blur);
            }
        }
    }

    pub fn set_map_size(&mut self, kind: ChannelKind, size: Option<u32>) -> Result<(), ConfigError> {
        if size == Some(0) {
            return Err(ConfigError::ZeroMapSize);
        }
        let slot = match kind {
            ChannelKind::Depth => &mut self.settings.depth_map_size,
            ChannelKind::Thickness => &mut self.settings.thickness_map_size,
            ChannelKind::Diffuse => &mut self.settings.diffuse_map_size,
        };
        if *slot != size {
            *slot = size;
            self.mark_dirty();
        }
        Ok(())
    }

    pub fn set_blur_enabled(&mut self, kind: ChannelKind, enabled: bool) {
        let blur = self.settings.blur_mut(kind);
        if blur.enabled != enabled {
            blur.enabled = enabled;
            self.mark_dirty();
        }
    }

    pub fn set_blur_size_divisor(&mut self, kind: ChannelKind, divisor: u32) -> Result<(), ConfigError> {
        if divisor == 0 {
            return Err(ConfigError::InvalidSizeDivisor(divisor));
        }
        let blur = self.settings.blur_mut(kind);
        if blur.size_divisor != divisor {
            blur.size_divisor = divisor;
            self.mark_dirty();
        }
        Ok(())
    }

    /// Kernel width only; applies without reinitialization.
    pub fn set_blur_kernel_radius(&mut self, kind: ChannelKind, radius: u32) -> Result<(), ConfigError> {
        if radius > MAX_BLUR_KERNEL_RADIUS {
            return Err(ConfigError::BlurKernelTooLarge(radius));
        }
        self.settings.blur_mut(kind).kernel_radius = radius;
        self.sync_blur_params();
        Ok(())
    }

    pub fn set_generate_diffuse(&mut self, enabled: bool) {
        if self.settings.generate_diffuse != enabled {
            self.settings.generate_diffuse = enabled;
            self.mark_dirty();
        }
    }

    pub fn set_debug(&mut self, feature: Option<DebugFeature>) {
        let debug = feature.is_some();
        let feature = feature.unwrap_or(self.settings.debug_feature);
        if self.settings.debug != debug || self.settings.debug_feature != feature {
            self.settings.debug = debug;
            self.settings.debug_feature = feature;
            self.mark_dirty();
        }
    }

    pub fn set_use_velocity(&mut self, enabled: bool) {
        if self.settings.use_velocity != enabled {
            self.settings.use_velocity = enabled;
            self.mark_dirty();
        }
    }

    pub fn set_fixed_thickness_mode(&mut self, enabled: bool) {
        if self.settings.fixed_thickness_mode != enabled {
            self.settings.fixed_thickness_mode = enabled;
            self.mark_dirty();
        }
    }

    pub fn set_fluid_color(&mut self, color: Vec3) -> Result<(), ConfigError> {
        if !color.is_finite() {
            return Err(ConfigError::NonFinite { name: "fluid_color" });
        }
        self.settings.fluid_color = color;
        Ok(())
    }

    pub fn set_density(&mut self, density: f32) -> Result<(), ConfigError> {
        self.settings.density = ensure_finite("density", density)?;
        Ok(())
    }

    pub fn set_refraction_strength(&mut self, strength: f32) -> Result<(), ConfigError> {
        self.settings.refraction_strength = ensure_finite("refraction_strength", strength)?;
        Ok(())
    }

    pub fn set_index_of_refraction(&mut self, ior: f32) -> Result<(), ConfigError> {
        self.settings.index_of_refraction = ensure_positive("index_of_refraction", ior)?;
        Ok(())
    }

    pub fn fixed_particle_size(&self) -> f32 {
        self.fixed_particle_size
    }

    /// Diameter used to cap the depth blur radius.
    pub fn set_fixed_particle_size(&mut self, size: f32) {
        self.fixed_particle_size = size;
    }

    /// Scene depth captured before the fluid, read in fixed thickness mode.
    pub fn set_background_depth(&mut self, texture: Option<TextureId>) {
        self.background_depth = texture;
    }

    /// Lat-long environment reflected by the fluid surface. Without one the
    /// flat `reflection_color` is used.
    pub fn set_environment(&mut self, texture: Option<TextureId>) {
        self.environment = texture;
    }

    /// Initialize if dirty or if the output was resized since the last
    /// initialization.
    pub fn ensure_initialized<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        if self.needs_initialization() || backend.output_size() != self.output_size {
            self.initialize(backend);
        }
    }

    /// Tear down and reallocate every channel and the composite pass.
    pub fn initialize<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        self.release(backend);

        let output = backend.output_size();
        let use_velocity = self.settings.use_velocity;
        let create = |backend: &mut B, kind: ChannelKind, settings: &TargetSettings| {
            let (w, h) = map_dimensions(settings.map_size(kind), output);
            Channel::create(backend, kind, w, h, kind.format(use_velocity), *settings.blur(kind))
        };

        self.depth = Some(create(backend, ChannelKind::Depth, &self.settings));
        if self.settings.generate_diffuse {
            self.diffuse = Some(create(backend, ChannelKind::Diffuse, &self.settings));
        }
        self.thickness = Some(create(backend, ChannelKind::Thickness, &self.settings));

        let defines = self.settings.composite_defines();
        self.composite_pass = Some(backend.create_composite_pass(&defines));

        self.output_size = output;
        self.state = TargetState::Ready;
        debug!(
            width = output.0,
            height = output.1,
            defines = ?defines.to_defines(),
            "fluid target initialized"
        );
    }

    fn release<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        for channel in [self.depth.take(), self.diffuse.take(), self.thickness.take()]
            .into_iter()
            .flatten()
        {
            channel.dispose(backend);
        }
        if let Some(pass) = self.composite_pass.take() {
            backend.release_pass(pass);
        }
    }

    /// Release all GPU resources. The target can be initialized again.
    pub fn dispose<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        self.release(backend);
        self.state = TargetState::Uninitialized;
        debug!("fluid target disposed");
    }

    /// Reset every channel to its empty value.
    pub fn clear_targets<B: RenderBackend + ?Sized>(&self, backend: &mut B) {
        if self.needs_initialization() {
            return;
        }
        for channel in [&self.depth, &self.diffuse, &self.thickness].into_iter().flatten() {
            backend.bind_target(channel.texture());
            backend.clear(channel.kind().clear_value());
            backend.unbind_target();
        }
    }

    /// Draw `objects` into the channels, one channel at a time (depth, then
    /// diffuse, then thickness), then blur. Objects that are not ready are
    /// skipped. No-op while the target awaits initialization.
    pub fn render<B: RenderBackend + ?Sized>(&self, backend: &mut B, camera: &Camera, objects: &[&RenderObject]) {
        if self.needs_initialization() {
            trace!("fluid target not initialized, frame skipped");
            return;
        }
        let passes = [
            (&self.depth, ParticleShader::Depth { write_velocity: self.settings.use_velocity }),
            (&self.diffuse, ParticleShader::Diffuse),
            (&self.thickness, ParticleShader::Thickness),
        ];
        for (channel, shader) in passes {
            let Some(channel) = channel else {
                continue;
            };
            backend.bind_target(channel.texture());
            for object in objects.iter().filter(|o| o.is_ready()) {
                object.draw(backend, camera, shader);
            }
            backend.unbind_target();
        }
        self.apply_blur(backend, camera);
    }

    /// Pixel radius of a depth-1 particle in the depth blur target.
    pub fn projected_particle_constant(&self, camera: &Camera) -> f32 {
        let Some((_, blur_height)) = self.depth.as_ref().and_then(Channel::blur_size) else {
            return 0.0;
        };
        self.fixed_particle_size * 0.5 * camera.projection.y_axis.y * 0.5 * blur_height as f32
    }

    pub fn apply_blur<B: RenderBackend + ?Sized>(&self, backend: &mut B, camera: &Camera) {
        if let Some(depth) = &self.depth {
            depth.apply_blur(backend, self.projected_particle_constant(camera));
        }
        if let Some(diffuse) = &self.diffuse {
            diffuse.apply_blur(backend, 0.0);
        }
        if let Some(thickness) = &self.thickness {
            thickness.apply_blur(backend, 0.0);
        }
    }

    pub fn composite_uniforms(&self, camera: &Camera) -> CompositeUniforms {
        let s = &self.settings;
        let texel_size = match &self.depth {
            Some(depth) => {
                let (w, h) = depth.blur_size().unwrap_or((depth.width(), depth.height()));
                [1.0 / w as f32, 1.0 / h as f32]
            }
            None => [0.0; 2],
        };
        let ior = s.index_of_refraction;
        let f0 = ((ior - 1.0) / (ior + 1.0)).powi(2);
        CompositeUniforms {
            inv_projection: camera.projection.inverse().to_cols_array(),
            view: camera.view.to_cols_array(),
            inv_view: camera.view.inverse().to_cols_array(),
            fluid_color: s.fluid_color.extend(1.0).to_array(),
            light_direction: s.light_direction.extend(0.0).to_array(),
            reflection_color: s.reflection_color.extend(1.0).to_array(),
            texel_size,
            density: s.density,
            refraction_strength: s.refraction_strength,
            eta: 1.0 / ior,
            f0,
            fresnel_clamp: s.fresnel_clamp,
            specular_power: s.specular_power,
            minimum_thickness: s.minimum_thickness,
            fixed_thickness: s.fixed_thickness,
            velocity_tint: s.velocity_tint,
            camera_far: camera.far,
        }
    }

    fn debug_texture(&self) -> Option<(TextureId, DebugFeature)> {
        if !self.settings.debug {
            return None;
        }
        let feature = self.settings.debug_feature;
        let texture = match feature {
            DebugFeature::DepthTexture => self.depth.as_ref().map(Channel::texture),
            DebugFeature::DepthBlurredTexture => self.depth.as_ref().map(Channel::output_texture),
            DebugFeature::ThicknessTexture => self.thickness.as_ref().map(Channel::texture),
            DebugFeature::ThicknessBlurredTexture => self.thickness.as_ref().map(Channel::output_texture),
            DebugFeature::DiffuseTexture => self.diffuse.as_ref().map(Channel::output_texture),
            DebugFeature::Normals | DebugFeature::DiffuseRendering => None,
        }?;
        Some((texture, feature))
    }

    /// Shade the fluid over the output. Returns `false` when the frame was
    /// skipped because the target or its composite program is not ready.
    pub fn composite<B: RenderBackend + ?Sized>(&self, backend: &mut B, camera: &Camera) -> bool {
        if self.needs_initialization() {
            return false;
        }
        let (Some(pass), Some(depth), Some(thickness)) = (self.composite_pass, &self.depth, &self.thickness) else {
            return false;
        };
        if !backend.is_pass_ready(pass) {
            trace!(pass = pass.0, "composite pass not ready, frame skipped");
            return false;
        }
        let textures = CompositeTextures {
            depth: depth.output_texture(),
            depth_raw: depth.texture(),
            thickness: thickness.output_texture(),
            diffuse: self.diffuse.as_ref().map(Channel::output_texture),
            background_depth: self.background_depth,
            environment: self.environment,
            debug: self.debug_texture(),
        };
        backend.composite(pass, &textures, &self.composite_uniforms(camera));
        true
    }
}
