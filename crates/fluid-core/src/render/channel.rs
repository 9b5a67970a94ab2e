//! One render target of the pipeline plus its blur targets.

use glam::Vec4;
use tracing::debug;

use crate::render::backend::{RenderBackend, TextureDesc, TextureFormat, TextureId};
use crate::render::blur::{BlurAxis, BlurKernel, BlurPass, BlurSettings};
use crate::render::FAR_DEPTH;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelKind {
    Depth,
    Thickness,
    Diffuse,
}

impl ChannelKind {
    pub fn label(self) -> &'static str {
        match self {
            ChannelKind::Depth => "fluid depth",
            ChannelKind::Thickness => "fluid thickness",
            ChannelKind::Diffuse => "fluid diffuse",
        }
    }

    /// Depth gains a second float channel when velocity is written.
    pub fn format(self, use_velocity: bool) -> TextureFormat {
        match self {
            ChannelKind::Depth if use_velocity => TextureFormat::Rg32Float,
            ChannelKind::Depth => TextureFormat::R32Float,
            ChannelKind::Thickness => TextureFormat::R16Float,
            ChannelKind::Diffuse => TextureFormat::Rgba8Unorm,
        }
    }

    pub fn clear_value(self) -> Vec4 {
        match self {
            ChannelKind::Depth => Vec4::new(FAR_DEPTH, 0.0, 0.0, 1.0),
            ChannelKind::Thickness | ChannelKind::Diffuse => Vec4::ZERO,
        }
    }

    /// Color is blurred plainly; depth and thickness must keep their edges.
    pub fn blur_kernel(self) -> BlurKernel {
        match self {
            ChannelKind::Diffuse => BlurKernel::Gaussian,
            ChannelKind::Depth | ChannelKind::Thickness => BlurKernel::Bilateral,
        }
    }
}

#[derive(Debug)]
struct BlurTargets {
    /// Output of the X pass.
    intermediate: TextureId,
    /// Output of the Y pass.
    blurred: TextureId,
    width: u32,
    height: u32,
}

/// A primary texture the particles are drawn into, and, when blurring is
/// enabled, two textures of `size / size_divisor` for the separable blur.
#[derive(Debug)]
pub struct Channel {
    kind: ChannelKind,
    width: u32,
    height: u32,
    format: TextureFormat,
    texture: TextureId,
    blur_targets: Option<BlurTargets>,
    blur: BlurSettings,
}

impl Channel {
    pub fn create<B: RenderBackend + ?Sized>(
        backend: &mut B,
        kind: ChannelKind,
        width: u32,
        height: u32,
        format: TextureFormat,
        blur: BlurSettings,
    ) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let texture = backend.create_texture(&TextureDesc {
            label: kind.label(),
            width,
            height,
            format,
        });

        let blur_targets = if blur.enabled {
            let divisor = blur.size_divisor.max(1);
            let bw = (width / divisor).max(1);
            let bh = (height / divisor).max(1);
            let desc = TextureDesc {
                label: kind.label(),
                width: bw,
                height: bh,
                format,
            };
            Some(BlurTargets {
                intermediate: backend.create_texture(&desc),
                blurred: backend.create_texture(&desc),
                width: bw,
                height: bh,
            })
        } else {
            None
        };

        debug!(channel = kind.label(), width, height, blur = blur.enabled, "channel created");

        Self {
            kind,
            width,
            height,
            format,
            texture,
            blur_targets,
            blur,
        }
    }

    pub fn dispose<B: RenderBackend + ?Sized>(self, backend: &mut B) {
        backend.release_texture(self.texture);
        if let Some(targets) = self.blur_targets {
            backend.release_texture(targets.intermediate);
            backend.release_texture(targets.blurred);
        }
        debug!(channel = self.kind.label(), "channel disposed");
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// The texture particles are drawn into.
    pub fn texture(&self) -> TextureId {
        self.texture
    }

    pub fn blurred_texture(&self) -> Option<TextureId> {
        self.blur_targets.as_ref().map(|t| t.blurred)
    }

    /// Blurred texture when blurring is enabled, primary otherwise.
    pub fn output_texture(&self) -> TextureId {
        self.blurred_texture().unwrap_or(self.texture)
    }

    /// Size of the blur targets, if any.
    pub fn blur_size(&self) -> Option<(u32, u32)> {
        self.blur_targets.as_ref().map(|t| (t.width, t.height))
    }

    pub fn blur_settings(&self) -> &BlurSettings {
        &self.blur
    }

    /// Update the parameters read at blur time. `enabled` and
    /// `size_divisor` are fixed at creation and ignored here.
    pub fn set_blur_params(&mut self, settings: &BlurSettings) {
        self.blur.kernel_radius = settings.kernel_radius;
        self.blur.scale = settings.scale;
        self.blur.depth_falloff = settings.depth_falloff;
    }

    /// Blur the primary texture into the blurred texture. The primary texture
    /// is only read. No-op when blurring is disabled.
    pub fn apply_blur<B: RenderBackend + ?Sized>(&self, backend: &mut B, projected_particle_constant: f32) {
        let Some(targets) = &self.blur_targets else {
            return;
        };
        let kernel = self.kind.blur_kernel();
        let pass_x = BlurPass::new(kernel, BlurAxis::X, &self.blur, projected_particle_constant);
        let pass_y = BlurPass::new(kernel, BlurAxis::Y, &self.blur, projected_particle_constant);
        backend.blur(self.texture, targets.intermediate, &pass_x);
        backend.blur(targets.intermediate, targets.blurred, &pass_y);
    }
}
