use glam::{Vec2, Vec3, Vec4};
use fluid_core::render::camera::view_pos_from_depth;
use fluid_core::render::shading::{
    beer_lambert, composite_image, equirect_uv, estimate_normal, fresnel, shade_fragment, CompositeDefines,
    CompositeUniforms, FragmentInputs,
};
use fluid_core::render::{Camera, CameraId, DebugFeature, Image, TargetRenderer, TargetSettings, FAR_DEPTH};

const SIZE: u32 = 4;

fn camera() -> Camera {
    Camera::look_at(CameraId(0), Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 1.0, 1.0, 0.1, 100.0)
}

fn uniforms(settings: TargetSettings) -> CompositeUniforms {
    let mut u = TargetRenderer::new(settings).composite_uniforms(&camera());
    u.texel_size = [1.0 / SIZE as f32; 2];
    u
}

fn filled(value: Vec4) -> Image {
    Image::new(SIZE, SIZE, value)
}

struct Scene {
    background: Image,
    depth: Image,
    thickness: Image,
    background_depth: Image,
    environment: Option<Image>,
}

impl Scene {
    /// Flat fluid sheet at view depth 5 in front of a red background.
    fn new() -> Self {
        Self {
            background: filled(Vec4::new(1.0, 0.0, 0.0, 1.0)),
            depth: filled(Vec4::new(5.0, 0.0, 0.0, 1.0)),
            thickness: filled(Vec4::new(0.5, 0.0, 0.0, 1.0)),
            background_depth: filled(Vec4::splat(FAR_DEPTH)),
            environment: None,
        }
    }

    fn inputs(&self) -> FragmentInputs<'_> {
        FragmentInputs {
            background: &self.background,
            depth: &self.depth,
            depth_raw: &self.depth,
            thickness: &self.thickness,
            diffuse: None,
            background_depth: Some(&self.background_depth),
            environment: self.environment.as_ref(),
            debug: None,
        }
    }
}

#[test]
fn test_fixed_thickness_background_in_front_shows_background() {
    let mut scene = Scene::new();
    // an occluder at depth 3 sits between the camera and the fluid
    scene.background_depth = filled(Vec4::splat(3.0));
    let settings = TargetSettings {
        fixed_thickness_mode: true,
        ..TargetSettings::default()
    };
    let defines = settings.composite_defines();
    let u = uniforms(settings);

    let mut output = scene.background.clone();
    composite_image(&mut output, &scene.inputs(), &u, &defines);

    assert_eq!(output, scene.background, "background must be untouched");
}

#[test]
fn test_fixed_thickness_fluid_in_front_is_shaded() {
    let scene = Scene::new();
    let settings = TargetSettings {
        fixed_thickness_mode: true,
        ..TargetSettings::default()
    };
    let defines = settings.composite_defines();
    let u = uniforms(settings);

    let color = shade_fragment(Vec2::splat(0.5), &scene.inputs(), &u, &defines);

    let color = color.expect("fluid in front of the background must be shaded");
    assert!(color.is_finite());
    assert_ne!(color, scene.background.get(2, 2));
}

#[test]
fn test_thin_fluid_shows_background() {
    let mut scene = Scene::new();
    scene.thickness = filled(Vec4::new(0.001, 0.0, 0.0, 1.0));
    let settings = TargetSettings {
        minimum_thickness: 0.01,
        ..TargetSettings::default()
    };
    let defines = settings.composite_defines();
    let u = uniforms(settings);

    assert_eq!(shade_fragment(Vec2::splat(0.5), &scene.inputs(), &u, &defines), None);
}

#[test]
fn test_empty_depth_shows_background() {
    let mut scene = Scene::new();
    scene.depth = filled(Vec4::new(FAR_DEPTH, 0.0, 0.0, 1.0));
    scene.thickness = filled(Vec4::ZERO);
    let settings = TargetSettings::default();
    let defines = settings.composite_defines();
    let u = uniforms(settings);

    let mut output = scene.background.clone();
    composite_image(&mut output, &scene.inputs(), &u, &defines);
    assert_eq!(output, scene.background);
}

#[test]
fn test_thicker_fluid_absorbs_more() {
    let settings = TargetSettings {
        fluid_color: Vec3::new(0.2, 0.6, 0.9),
        ..TargetSettings::default()
    };
    let defines = settings.composite_defines();
    let u = uniforms(settings);
    let uv = Vec2::splat(0.5);

    let mut scene = Scene::new();
    scene.thickness = filled(Vec4::new(0.1, 0.0, 0.0, 1.0));
    let thin = shade_fragment(uv, &scene.inputs(), &u, &defines).unwrap();
    scene.thickness = filled(Vec4::new(2.0, 0.0, 0.0, 1.0));
    let thick = shade_fragment(uv, &scene.inputs(), &u, &defines).unwrap();

    // the red background is absorbed strongly by a blue-green fluid
    assert!(thick.x < thin.x, "thick {:?} vs thin {:?}", thick, thin);
}

#[test]
fn test_flat_sheet_faces_camera() {
    let cam = camera();
    let inv = cam.projection.inverse();
    let n = estimate_normal(Vec2::splat(0.5), Vec2::splat(0.25), |uv| view_pos_from_depth(uv, 5.0, &inv));
    assert!((n - Vec3::Z).length() < 1e-4, "normal {:?}", n);
}

#[test]
fn test_normal_ignores_silhouette_side() {
    let cam = camera();
    let inv = cam.projection.inverse();
    // sheet at depth 5 on the left, far background on the right
    let depth = |uv: Vec2| if uv.x > 0.55 { 50.0 } else { 5.0 };
    let n = estimate_normal(Vec2::splat(0.5), Vec2::splat(0.1), |uv| view_pos_from_depth(uv, depth(uv), &inv));
    assert!((n - Vec3::Z).length() < 1e-3, "the far side must not tilt the normal: {:?}", n);
}

/// Sheet whose depth grows by `step` per row; positive `step` tilts the
/// normal upward.
fn tilted_depth(step: f32) -> Image {
    let mut depth = filled(Vec4::ZERO);
    for y in 0..SIZE {
        for x in 0..SIZE {
            depth.set(x, y, Vec4::new(6.0 + (y as f32 - 2.0) * step, 0.0, 0.0, 1.0));
        }
    }
    depth
}

/// Lat-long map, white above the horizon when `sky` is set, below it otherwise.
fn half_lit_environment(sky: bool) -> Image {
    let mut env = filled(Vec4::new(0.0, 0.0, 0.0, 1.0));
    for y in 0..SIZE {
        let upper = y >= SIZE / 2;
        if upper == sky {
            for x in 0..SIZE {
                env.set(x, y, Vec4::ONE);
            }
        }
    }
    env
}

#[test]
fn test_reflection_follows_normal() {
    let settings = TargetSettings::default();
    let defines = settings.composite_defines();
    let u = uniforms(settings);
    let uv = Vec2::splat(0.5);

    let shade = |step: f32, sky: bool| {
        let mut scene = Scene::new();
        scene.depth = tilted_depth(step);
        scene.environment = Some(half_lit_environment(sky));
        shade_fragment(uv, &scene.inputs(), &u, &defines).unwrap()
    };

    // a surface tilted up reflects the upper half of the environment
    assert!(shade(0.5, true).x > shade(0.5, false).x);
    // tilted down, the lower half
    assert!(shade(-0.5, false).x > shade(-0.5, true).x);
}

#[test]
fn test_environment_replaces_flat_reflection() {
    let settings = TargetSettings {
        reflection_color: Vec3::ZERO,
        ..TargetSettings::default()
    };
    let defines = settings.composite_defines();
    let u = uniforms(settings);
    let uv = Vec2::splat(0.5);

    let mut scene = Scene::new();
    let flat = shade_fragment(uv, &scene.inputs(), &u, &defines).unwrap();
    scene.environment = Some(filled(Vec4::new(0.0, 1.0, 0.0, 1.0)));
    let mapped = shade_fragment(uv, &scene.inputs(), &u, &defines).unwrap();

    assert!(mapped.y > flat.y, "mapped {:?} flat {:?}", mapped, flat);
    assert_eq!(mapped.x, flat.x);
}

#[test]
fn test_equirect_uv_axes() {
    assert!((equirect_uv(Vec3::NEG_Z) - Vec2::splat(0.5)).length() < 1e-6);
    assert!((equirect_uv(Vec3::Y).y - 1.0).abs() < 1e-6);
    assert!(equirect_uv(Vec3::NEG_Y).y.abs() < 1e-6);
    assert!((equirect_uv(Vec3::X).x - 0.75).abs() < 1e-6);
}

#[test]
fn test_fresnel_limits() {
    assert!((fresnel(1.0, 0.02, 1.0) - 0.02).abs() < 1e-6, "head-on reflects f0");
    assert!((fresnel(0.0, 0.02, 1.0) - 1.0).abs() < 1e-6, "grazing reflects everything");
    assert_eq!(fresnel(0.0, 0.02, 0.4), 0.4, "clamped");
}

#[test]
fn test_beer_lambert() {
    assert_eq!(beer_lambert(Vec3::ONE, 3.0, 10.0), Vec3::ONE, "white fluid absorbs nothing");
    let t = beer_lambert(Vec3::new(0.0, 0.5, 1.0), 1.0, 1.0);
    assert!((t.x - (-1.0_f32).exp()).abs() < 1e-6);
    assert!((t.y - (-0.5_f32).exp()).abs() < 1e-6);
    assert_eq!(t.z, 1.0);
}

#[test]
fn test_debug_depth_texture() {
    let scene = Scene::new();
    let settings = TargetSettings {
        debug: true,
        debug_feature: DebugFeature::DepthTexture,
        ..TargetSettings::default()
    };
    let defines = settings.composite_defines();
    let u = uniforms(settings);
    let mut inputs = scene.inputs();
    inputs.debug = Some((&scene.depth, DebugFeature::DepthTexture));

    let color = shade_fragment(Vec2::splat(0.5), &inputs, &u, &defines).unwrap();
    assert!((color.x - 5.0 / 100.0).abs() < 1e-6);
}

#[test]
fn test_debug_normals() {
    let scene = Scene::new();
    let settings = TargetSettings {
        debug: true,
        debug_feature: DebugFeature::Normals,
        ..TargetSettings::default()
    };
    let defines = settings.composite_defines();
    assert!(defines.debug_show_normal && !defines.debug_texture);
    let u = uniforms(settings);

    let color = shade_fragment(Vec2::splat(0.5), &scene.inputs(), &u, &defines).unwrap();
    assert!((color.truncate() - Vec3::new(0.5, 0.5, 1.0)).length() < 1e-3);
}

#[test]
fn test_velocity_lightens_fluid() {
    let settings = TargetSettings {
        use_velocity: true,
        debug: true,
        debug_feature: DebugFeature::DiffuseRendering,
        light_direction: Vec3::new(0.0, 0.0, -1.0),
        ..TargetSettings::default()
    };
    let defines = settings.composite_defines();
    let u = uniforms(settings);
    let uv = Vec2::splat(0.5);

    let mut scene = Scene::new();
    let slow = shade_fragment(uv, &scene.inputs(), &u, &defines).unwrap();
    scene.depth = filled(Vec4::new(5.0, 40.0, 0.0, 1.0));
    let fast = shade_fragment(uv, &scene.inputs(), &u, &defines).unwrap();

    assert!(fast.x > slow.x, "fast {:?} slow {:?}", fast, slow);
}

#[test]
fn test_defines_strings() {
    let defines = CompositeDefines {
        diffuse_texture: true,
        velocity: true,
        fixed_thickness: true,
        ..CompositeDefines::default()
    };
    assert_eq!(
        defines.to_defines(),
        vec![
            "FLUIDRENDERING_DIFFUSETEXTURE",
            "FLUIDRENDERING_VELOCITY",
            "FLUIDRENDERING_FIXED_THICKNESS"
        ]
    );
    assert!(CompositeDefines::default().to_defines().is_empty());
}

#[test]
fn test_uniform_layout() {
    let u = uniforms(TargetSettings::default());
    assert_eq!(std::mem::size_of::<CompositeUniforms>() % 16, 0);
    assert_eq!(bytemuck::bytes_of(&u).len(), std::mem::size_of::<CompositeUniforms>());
    assert!((u.eta - 1.0 / 1.33).abs() < 1e-6);
    assert!((u.f0 - 0.02).abs() < 1e-3);
    assert_eq!(u.camera_far, 100.0);
}
