//! CPU implementation of [`RenderBackend`].
//!
//! Every texture is a [`Image`]; particles are rasterized as sphere
//! imposters, blur and composite run the same math the shaders run. Slow,
//! but deterministic, which makes it the reference the pipeline is tested
//! against. It also records every pass it executes.

use std::collections::HashMap;

use glam::{Vec2, Vec4};
use tracing::trace;

use crate::render::backend::{
    CompositeTextures, ParticleBatch, ParticleShader, PassId, RenderBackend, TextureDesc, TextureFormat,
    TextureId,
};
use crate::render::blur::{blur_image, BlurPass};
use crate::render::camera::Camera;
use crate::render::image::Image;
use crate::render::shading::{composite_image, CompositeDefines, CompositeUniforms, FragmentInputs};
use crate::render::FAR_DEPTH;

/// One executed backend operation.
#[derive(Clone, Debug, PartialEq)]
pub enum PassEvent {
    Clear(TextureId),
    Draw {
        target: TextureId,
        shader: ParticleShader,
        count: usize,
    },
    Blur {
        src: TextureId,
        dst: TextureId,
    },
    Composite(PassId),
}

struct Texture {
    desc: TextureDesc,
    image: Image,
    /// Depth test buffer of color targets.
    zbuffer: Option<Vec<f32>>,
}

struct CompositePass {
    defines: CompositeDefines,
    ready: bool,
}

pub struct SoftwareBackend {
    output: Image,
    textures: HashMap<u32, Texture>,
    next_texture: u32,
    passes: HashMap<u32, CompositePass>,
    next_pass: u32,
    bound: Option<TextureId>,
    passes_ready: bool,
    draw_calls: usize,
    trace: Vec<PassEvent>,
}

impl SoftwareBackend {
    /// Backend with an output of `width x height` filled with `background`.
    pub fn new(width: u32, height: u32, background: Vec4) -> Self {
        Self {
            output: Image::new(width.max(1), height.max(1), background),
            textures: HashMap::new(),
            next_texture: 0,
            passes: HashMap::new(),
            next_pass: 0,
            bound: None,
            passes_ready: true,
            draw_calls: 0,
            trace: Vec::new(),
        }
    }

    pub fn output(&self) -> &Image {
        &self.output
    }

    /// Replace the scene color, e.g. with a new size.
    pub fn set_output(&mut self, image: Image) {
        self.output = image;
    }

    /// Register a host-provided image, such as a captured background depth
    /// or an environment map.
    pub fn insert_image(&mut self, label: &'static str, format: TextureFormat, image: Image) -> TextureId {
        let id = self.next_texture;
        self.next_texture += 1;
        let desc = TextureDesc {
            label,
            width: image.width,
            height: image.height,
            format,
        };
        self.textures.insert(
            id,
            Texture {
                desc,
                image,
                zbuffer: None,
            },
        );
        TextureId(id)
    }

    pub fn image(&self, id: TextureId) -> Option<&Image> {
        self.textures.get(&id.0).map(|t| &t.image)
    }

    pub fn texture_desc(&self, id: TextureId) -> Option<&TextureDesc> {
        self.textures.get(&id.0).map(|t| &t.desc)
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_passes(&self) -> usize {
        self.passes.len()
    }

    pub fn pass_defines(&self, id: PassId) -> Option<&CompositeDefines> {
        self.passes.get(&id.0).map(|p| &p.defines)
    }

    /// Emulate shader compilation: while `false`, composite passes report
    /// not ready.
    pub fn set_passes_ready(&mut self, ready: bool) {
        self.passes_ready = ready;
        for pass in self.passes.values_mut() {
            pass.ready = ready;
        }
    }

    pub fn draw_calls(&self) -> usize {
        self.draw_calls
    }

    pub fn trace(&self) -> &[PassEvent] {
        &self.trace
    }

    pub fn clear_trace(&mut self) {
        self.trace.clear();
        self.draw_calls = 0;
    }
}

impl RenderBackend for SoftwareBackend {
    fn output_size(&self) -> (u32, u32) {
        (self.output.width, self.output.height)
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> TextureId {
        let id = self.next_texture;
        self.next_texture += 1;
        let zbuffer = (desc.format == TextureFormat::Rgba8Unorm)
            .then(|| vec![FAR_DEPTH; desc.width as usize * desc.height as usize]);
        self.textures.insert(
            id,
            Texture {
                desc: *desc,
                image: Image::new(desc.width, desc.height, Vec4::ZERO),
                zbuffer,
            },
        );
        TextureId(id)
    }

    fn release_texture(&mut self, id: TextureId) {
        self.textures.remove(&id.0);
        if self.bound == Some(id) {
            self.bound = None;
        }
    }

    fn create_composite_pass(&mut self, defines: &CompositeDefines) -> PassId {
        let id = self.next_pass;
        self.next_pass += 1;
        self.passes.insert(
            id,
            CompositePass {
                defines: *defines,
                ready: self.passes_ready,
            },
        );
        PassId(id)
    }

    fn release_pass(&mut self, id: PassId) {
        self.passes.remove(&id.0);
    }

    fn is_pass_ready(&self, id: PassId) -> bool {
        self.passes.get(&id.0).is_some_and(|p| p.ready)
    }

    fn bind_target(&mut self, id: TextureId) {
        self.bound = Some(id);
    }

    fn clear(&mut self, value: Vec4) {
        let Some(id) = self.bound else {
            return;
        };
        if let Some(texture) = self.textures.get_mut(&id.0) {
            texture.image.fill(value);
            if let Some(z) = &mut texture.zbuffer {
                z.fill(FAR_DEPTH);
            }
            self.trace.push(PassEvent::Clear(id));
        }
    }

    fn draw_particles(&mut self, camera: &Camera, batch: &ParticleBatch<'_>, shader: ParticleShader) {
        let Some(id) = self.bound else {
            return;
        };
        let Some(texture) = self.textures.get_mut(&id.0) else {
            return;
        };
        self.draw_calls += 1;
        self.trace.push(PassEvent::Draw {
            target: id,
            shader,
            count: batch.count,
        });
        rasterize(texture, camera, batch, shader);
    }

    fn unbind_target(&mut self) {
        self.bound = None;
    }

    fn blur(&mut self, src: TextureId, dst: TextureId, pass: &BlurPass) {
        let Some(source) = self.textures.get(&src.0).map(|t| t.image.clone()) else {
            return;
        };
        let Some(target) = self.textures.get_mut(&dst.0) else {
            return;
        };
        blur_image(&source, &mut target.image, pass.kernel, &pass.uniforms);
        self.trace.push(PassEvent::Blur { src, dst });
    }

    fn composite(&mut self, pass: PassId, textures: &CompositeTextures, uniforms: &CompositeUniforms) {
        let Some(defines) = self.passes.get(&pass.0).map(|p| p.defines) else {
            return;
        };
        let lookup = |id: TextureId| self.textures.get(&id.0).map(|t| &t.image);
        let (Some(depth), Some(depth_raw), Some(thickness)) = (
            lookup(textures.depth),
            lookup(textures.depth_raw),
            lookup(textures.thickness),
        ) else {
            trace!("composite input missing, skipped");
            return;
        };
        let background = self.output.clone();
        let inputs = FragmentInputs {
            background: &background,
            depth,
            depth_raw,
            thickness,
            diffuse: textures.diffuse.and_then(lookup),
            background_depth: textures.background_depth.and_then(lookup),
            environment: textures.environment.and_then(lookup),
            debug: textures
                .debug
                .and_then(|(id, feature)| lookup(id).map(|img| (img, feature))),
        };
        composite_image(&mut self.output, &inputs, uniforms, &defines);
        self.trace.push(PassEvent::Composite(pass));
    }
}

fn rasterize(texture: &mut Texture, camera: &Camera, batch: &ParticleBatch<'_>, shader: ParticleShader) {
    let (w, h) = (texture.image.width, texture.image.height);
    let pixels_per_unit = camera.pixels_per_unit(w, h);
    let radius = batch.particle_size * 0.5;
    let count = batch.count.min(batch.positions.len());

    for i in 0..count {
        let Some((uv, depth)) = camera.project(batch.positions[i]) else {
            continue;
        };
        let center = uv * Vec2::new(w as f32, h as f32);
        let extent = pixels_per_unit * (radius / depth);
        if !(extent.x > 0.0 && extent.y > 0.0) {
            continue;
        }
        let x0 = (center.x - extent.x).floor().max(0.0) as u32;
        let y0 = (center.y - extent.y).floor().max(0.0) as u32;
        let x1 = ((center.x + extent.x).ceil().max(0.0) as u32).min(w);
        let y1 = ((center.y + extent.y).ceil().max(0.0) as u32).min(h);

        for y in y0..y1 {
            for x in x0..x1 {
                let offset = (Vec2::new(x as f32 + 0.5, y as f32 + 0.5) - center) / extent;
                let r2 = offset.length_squared();
                if r2 > 1.0 {
                    continue;
                }
                let nz = (1.0 - r2).sqrt();
                let frag_depth = depth - nz * radius;
                let idx = texture.image.index(x, y);

                match shader {
                    ParticleShader::Depth { write_velocity } => {
                        if frag_depth < texture.image.data[idx].x {
                            let speed = match (write_velocity, batch.velocities) {
                                (true, Some(v)) => v.get(i).map_or(0.0, |v| v.length()),
                                _ => 0.0,
                            };
                            texture.image.data[idx] = Vec4::new(frag_depth, speed, 0.0, 1.0);
                        }
                    }
                    ParticleShader::Thickness => {
                        texture.image.data[idx].x += batch.thickness_alpha * nz;
                    }
                    ParticleShader::Diffuse => {
                        let Some(z) = &mut texture.zbuffer else {
                            continue;
                        };
                        if frag_depth < z[idx] {
                            z[idx] = frag_depth;
                            let color = batch
                                .colors
                                .and_then(|c| c.get(i).copied())
                                .unwrap_or(batch.default_color);
                            texture.image.data[idx] = color.clamp(Vec4::ZERO, Vec4::ONE);
                        }
                    }
                }
            }
        }
    }
}
