//! Screen-space fluid shading, ported from the composite fragment shader.
//!
//! Per fragment: reconstruct the view position from depth, estimate the
//! normal from neighboring positions, refract the background through the
//! fluid with Beer-Lambert absorption, blend with the environment seen along
//! the reflected ray by Fresnel and add a specular highlight. Fragments without fluid keep the background.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4, Vec4Swizzles};
use serde::{Deserialize, Serialize};

use std::f32::consts::{PI, TAU};

use crate::math::{mix, reflect, refract};
use crate::render::camera::view_pos_from_depth;
use crate::render::image::Image;
use crate::render::FAR_DEPTH;

/// What the debug overlay shows instead of the shaded fluid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebugFeature {
    DepthTexture,
    DepthBlurredTexture,
    ThicknessTexture,
    ThicknessBlurredTexture,
    DiffuseTexture,
    Normals,
    DiffuseRendering,
}

impl DebugFeature {
    pub const ALL: [DebugFeature; 7] = [
        DebugFeature::DepthTexture,
        DebugFeature::DepthBlurredTexture,
        DebugFeature::ThicknessTexture,
        DebugFeature::ThicknessBlurredTexture,
        DebugFeature::DiffuseTexture,
        DebugFeature::Normals,
        DebugFeature::DiffuseRendering,
    ];

    /// Shows a channel texture directly rather than a shading term.
    pub fn is_texture(self) -> bool {
        !matches!(self, DebugFeature::Normals | DebugFeature::DiffuseRendering)
    }
}

/// Compile-time feature switches of the composite program.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompositeDefines {
    pub diffuse_texture: bool,
    pub debug: bool,
    pub debug_texture: bool,
    pub debug_show_normal: bool,
    pub debug_diffuse_rendering: bool,
    pub velocity: bool,
    pub fixed_thickness: bool,
}

impl CompositeDefines {
    /// Preprocessor symbols for shader-based backends.
    pub fn to_defines(&self) -> Vec<&'static str> {
        let mut defines = Vec::new();
        if self.diffuse_texture {
            defines.push("FLUIDRENDERING_DIFFUSETEXTURE");
        }
        if self.debug {
            defines.push("FLUIDRENDERING_DEBUG");
        }
        if self.debug_texture {
            defines.push("FLUIDRENDERING_DEBUG_TEXTURE");
        }
        if self.debug_show_normal {
            defines.push("FLUIDRENDERING_DEBUG_SHOWNORMAL");
        }
        if self.debug_diffuse_rendering {
            defines.push("FLUIDRENDERING_DEBUG_DIFFUSERENDERING");
        }
        if self.velocity {
            defines.push("FLUIDRENDERING_VELOCITY");
        }
        if self.fixed_thickness {
            defines.push("FLUIDRENDERING_FIXED_THICKNESS");
        }
        defines
    }
}

/// Uniform block of the composite pass.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct CompositeUniforms {
    pub inv_projection: [f32; 16],
    pub view: [f32; 16],
    pub inv_view: [f32; 16],
    /// rgb, a unused
    pub fluid_color: [f32; 4],
    /// World-space direction the light travels, w unused
    pub light_direction: [f32; 4],
    /// Reflected color when no environment texture is bound, w unused
    pub reflection_color: [f32; 4],
    /// Texel size of the depth texture
    pub texel_size: [f32; 2],
    pub density: f32,
    pub refraction_strength: f32,
    /// Ratio of indices of refraction, air over fluid
    pub eta: f32,
    /// Reflectance at normal incidence
    pub f0: f32,
    pub fresnel_clamp: f32,
    pub specular_power: f32,
    pub minimum_thickness: f32,
    pub fixed_thickness: f32,
    pub velocity_tint: f32,
    pub camera_far: f32,
}

/// Images a fragment can read.
pub struct FragmentInputs<'a> {
    /// Scene color as it was before compositing.
    pub background: &'a Image,
    pub depth: &'a Image,
    pub depth_raw: &'a Image,
    pub thickness: &'a Image,
    pub diffuse: Option<&'a Image>,
    pub background_depth: Option<&'a Image>,
    /// Lat-long map, see [`equirect_uv`].
    pub environment: Option<&'a Image>,
    pub debug: Option<(&'a Image, DebugFeature)>,
}

/// Per-frame values unpacked from `CompositeUniforms`.
struct Unpacked {
    inv_projection: Mat4,
    view: Mat4,
    inv_view: Mat4,
    fluid_color: Vec3,
    light_direction: Vec3,
    reflection_color: Vec3,
    texel_size: Vec2,
}

impl Unpacked {
    fn new(u: &CompositeUniforms) -> Self {
        Self {
            inv_projection: Mat4::from_cols_array(&u.inv_projection),
            view: Mat4::from_cols_array(&u.view),
            inv_view: Mat4::from_cols_array(&u.inv_view),
            fluid_color: Vec4::from(u.fluid_color).xyz(),
            light_direction: Vec4::from(u.light_direction).xyz(),
            reflection_color: Vec4::from(u.reflection_color).xyz(),
            texel_size: Vec2::from(u.texel_size),
        }
    }
}

/// Fresnel reflectance (Schlick), clamped to `[0, clamp]`.
#[inline]
pub fn fresnel(cos_theta: f32, f0: f32, clamp: f32) -> f32 {
    let m = (1.0 - cos_theta).clamp(0.0, 1.0);
    (f0 + (1.0 - f0) * m.powi(5)).clamp(0.0, clamp)
}

/// Fraction of light surviving `thickness` of fluid with color `color`.
///
/// Channels where the fluid is bright are absorbed less.
#[inline]
pub fn beer_lambert(color: Vec3, density: f32, thickness: f32) -> Vec3 {
    let absorb = (Vec3::ONE - color) * (-density * thickness);
    Vec3::new(absorb.x.exp(), absorb.y.exp(), absorb.z.exp())
}

/// Lat-long texture coordinate of a world-space direction: `-Z` is the
/// horizontal center, `+Y` the top row.
pub fn equirect_uv(dir: Vec3) -> Vec2 {
    let dir = dir.normalize_or_zero();
    Vec2::new(
        0.5 + dir.x.atan2(-dir.z) / TAU,
        0.5 + dir.y.clamp(-1.0, 1.0).asin() / PI,
    )
}

/// Normal from finite differences of neighboring view positions.
///
/// Per axis, the smaller of the forward and backward differences (by depth
/// change) is used, which keeps silhouettes from smearing into the
/// background. Falls back to facing the camera when degenerate.
pub fn estimate_normal<F>(uv: Vec2, texel: Vec2, view_pos_at: F) -> Vec3
where
    F: Fn(Vec2) -> Vec3,
{
    let center = view_pos_at(uv);
    let dx = Vec2::new(texel.x, 0.0);
    let dy = Vec2::new(0.0, texel.y);

    let mut ddx = view_pos_at(uv + dx) - center;
    let ddx_back = center - view_pos_at(uv - dx);
    if ddx.z.abs() > ddx_back.z.abs() {
        ddx = ddx_back;
    }
    let mut ddy = view_pos_at(uv + dy) - center;
    let ddy_back = center - view_pos_at(uv - dy);
    if ddy.z.abs() > ddy_back.z.abs() {
        ddy = ddy_back;
    }

    let n = ddx.cross(ddy);
    if n.is_finite() {
        n.try_normalize().unwrap_or(Vec3::Z)
    } else {
        Vec3::Z
    }
}

/// Shade one fragment. `None` means no fluid: keep the background.
pub fn shade_fragment(
    uv: Vec2,
    inputs: &FragmentInputs<'_>,
    u: &CompositeUniforms,
    defines: &CompositeDefines,
) -> Option<Vec4> {
    if defines.debug_texture {
        if let Some((image, feature)) = inputs.debug {
            return Some(debug_texture_color(image.sample(uv), feature, u.camera_far));
        }
    }

    let thickness = if defines.fixed_thickness {
        let fluid_depth = inputs.depth_raw.sample(uv).x;
        let background_depth = inputs
            .background_depth
            .map(|img| img.sample(uv).x)
            .unwrap_or(FAR_DEPTH);
        if fluid_depth >= u.camera_far || fluid_depth > background_depth {
            return None;
        }
        u.fixed_thickness
    } else {
        let t = inputs.thickness.sample(uv).x;
        if t < u.minimum_thickness {
            return None;
        }
        t
    };

    let depth_sample = inputs.depth.sample(uv);
    if depth_sample.x <= 0.0 || depth_sample.x >= u.camera_far {
        return None;
    }

    let un = Unpacked::new(u);
    let view_pos_at = |p: Vec2| view_pos_from_depth(p, inputs.depth.sample(p).x, &un.inv_projection);
    let view_pos = view_pos_from_depth(uv, depth_sample.x, &un.inv_projection);
    let normal = estimate_normal(uv, un.texel_size, view_pos_at);

    if defines.debug_show_normal {
        return Some((normal * 0.5 + Vec3::splat(0.5)).extend(1.0));
    }

    let ray_dir = view_pos.normalize();

    let mut diffuse_color = match (defines.diffuse_texture, inputs.diffuse) {
        (true, Some(img)) => img.sample(uv).xyz(),
        _ => un.fluid_color,
    };
    if defines.velocity {
        let speed = depth_sample.y;
        diffuse_color = mix(diffuse_color, Vec3::ONE, (speed * u.velocity_tint).clamp(0.0, 1.0));
    }

    let light_dir = (un.view * (-un.light_direction).extend(0.0))
        .xyz()
        .try_normalize()
        .unwrap_or(Vec3::Z);

    if defines.debug_diffuse_rendering {
        let lambert = light_dir.dot(normal).max(0.0);
        return Some((diffuse_color * lambert).extend(1.0));
    }

    let half = (light_dir - ray_dir).try_normalize().unwrap_or(normal);
    let specular = half.dot(normal).max(0.0).powf(u.specular_power);

    let refraction_dir = refract(ray_dir, normal, u.eta);
    let offset_uv = uv + Vec2::new(refraction_dir.x, refraction_dir.y) * thickness * u.refraction_strength;
    let transmitted = inputs.background.sample(offset_uv).xyz();
    let refraction_color = transmitted * beer_lambert(diffuse_color, u.density, thickness);

    let reflection_color = match inputs.environment {
        Some(env) => {
            let world_dir = un.inv_view.transform_vector3(reflect(ray_dir, normal));
            env.sample(equirect_uv(world_dir)).xyz()
        }
        None => un.reflection_color,
    };

    let f = fresnel(normal.dot(-ray_dir), u.f0, u.fresnel_clamp);
    let color = mix(refraction_color, reflection_color, f) + Vec3::splat(specular);
    Some(color.extend(1.0))
}

fn debug_texture_color(texel: Vec4, feature: DebugFeature, camera_far: f32) -> Vec4 {
    match feature {
        DebugFeature::DepthTexture | DebugFeature::DepthBlurredTexture => {
            let d = if texel.x >= camera_far { 1.0 } else { texel.x / camera_far };
            Vec3::splat(d).extend(1.0)
        }
        DebugFeature::ThicknessTexture | DebugFeature::ThicknessBlurredTexture => {
            Vec3::splat(texel.x.clamp(0.0, 1.0)).extend(1.0)
        }
        _ => texel.xyz().extend(1.0),
    }
}

/// Composite a whole image: every texel of `output` either keeps its color
/// or gets the shaded fluid color.
pub fn composite_image(
    output: &mut Image,
    inputs: &FragmentInputs<'_>,
    uniforms: &CompositeUniforms,
    defines: &CompositeDefines,
) {
    for y in 0..output.height {
        for x in 0..output.width {
            let uv = output.uv_of(x, y);
            if let Some(color) = shade_fragment(uv, inputs, uniforms, defines) {
                output.set(x, y, color);
            }
        }
    }
}
