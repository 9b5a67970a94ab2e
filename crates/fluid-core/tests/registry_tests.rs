use glam::{Vec3, Vec4};
use fluid_core::config::SphConfig;
use fluid_core::error::{ConfigError, RenderError};
use fluid_core::params::Parameter;
use fluid_core::render::software::PassEvent;
use fluid_core::render::{
    BufferSource, Camera, CameraId, ChannelKind, ParticleShader, ParticleSource, RenderObject, SimulationSource,
    SoftwareBackend, TargetSettings, TargetState,
};
use fluid_core::simulator::Simulator;
use fluid_core::{FluidRegistry, ObjectId, Registration, TargetId};

const BACKGROUND: Vec4 = Vec4::new(0.1, 0.1, 0.1, 1.0);

fn camera(id: u32) -> Camera {
    Camera::look_at(CameraId(id), Vec3::new(0.0, 0.0, 4.0), Vec3::ZERO, 0.8, 1.0, 0.1, 50.0)
}

fn object(count: usize) -> RenderObject {
    let positions = (0..count).map(|i| Vec3::new(i as f32 * 0.05, 0.0, 0.0)).collect();
    let mut object = RenderObject::new(Box::new(BufferSource::new(positions)));
    object.particle_size = 0.5;
    object
}

fn for_camera(id: u32) -> Registration {
    Registration {
        camera: Some(CameraId(id)),
        ..Registration::default()
    }
}

#[test]
fn test_empty_object_draws_nothing() {
    let mut backend = SoftwareBackend::new(16, 16, BACKGROUND);
    let mut registry = FluidRegistry::new();
    registry.add_render_object(object(0), Registration::default()).unwrap();

    let stats = registry.render_frame(&mut backend, Some(&camera(0)));

    assert_eq!(backend.draw_calls(), 0, "no draw calls for an empty object");
    assert_eq!(stats.targets_composited, 1);
    assert!(
        backend.output().data.iter().all(|&c| c == BACKGROUND),
        "composite must show pure background"
    );
}

#[test]
fn test_objects_share_default_target_per_camera() {
    let mut registry = FluidRegistry::new();
    let a = registry.add_render_object(object(1), for_camera(1)).unwrap();
    let b = registry.add_render_object(object(1), for_camera(1)).unwrap();
    let c = registry.add_render_object(object(1), for_camera(2)).unwrap();
    let d = registry
        .add_render_object(
            object(1),
            Registration {
                generate_diffuse: true,
                ..for_camera(1)
            },
        )
        .unwrap();

    assert_eq!(registry.target_of(a), registry.target_of(b));
    assert_ne!(registry.target_of(a), registry.target_of(c));
    assert_ne!(registry.target_of(a), registry.target_of(d));
    assert_eq!(registry.target_count(), 3);
}

#[test]
fn test_orphaned_default_target_is_disposed() {
    let mut backend = SoftwareBackend::new(16, 16, BACKGROUND);
    let mut registry = FluidRegistry::new();
    let a = registry.add_render_object(object(2), Registration::default()).unwrap();
    let b = registry.add_render_object(object(2), Registration::default()).unwrap();
    registry.render_frame(&mut backend, Some(&camera(0)));
    assert!(backend.live_textures() > 0);

    registry.remove_render_object(&mut backend, a).unwrap();
    assert_eq!(registry.target_count(), 1, "target still has an object");

    let removed = registry.remove_render_object(&mut backend, b).unwrap();
    assert_eq!(removed.count(), 2);
    assert_eq!(registry.target_count(), 0);
    assert_eq!(backend.live_textures(), 0);
    assert_eq!(backend.live_passes(), 0);
}

#[test]
fn test_orphaned_explicit_target_is_disposed() {
    let mut backend = SoftwareBackend::new(16, 16, BACKGROUND);
    let mut registry = FluidRegistry::new();
    let target = registry.create_target(None, TargetSettings::default()).unwrap();
    let id = registry
        .add_render_object(
            object(2),
            Registration {
                target: Some(target),
                ..Registration::default()
            },
        )
        .unwrap();
    registry.render_frame(&mut backend, Some(&camera(0)));
    assert!(backend.live_textures() > 0);

    registry.remove_render_object(&mut backend, id).unwrap();

    assert_eq!(registry.target_count(), 0);
    assert!(registry.target(target).is_none());
    assert_eq!(backend.live_textures(), 0);
    assert_eq!(backend.live_passes(), 0);
}

#[test]
fn test_kept_target_outlives_objects() {
    let mut backend = SoftwareBackend::new(16, 16, BACKGROUND);
    let mut registry = FluidRegistry::new();
    let target = registry.create_target(None, TargetSettings::default()).unwrap();
    registry.set_remove_when_unused(target, false).unwrap();
    let id = registry
        .add_render_object(
            object(1),
            Registration {
                target: Some(target),
                ..Registration::default()
            },
        )
        .unwrap();

    assert_eq!(registry.remove_target(&mut backend, target), Ok(false), "still in use");
    registry.remove_render_object(&mut backend, id).unwrap();
    assert_eq!(registry.target_count(), 1);
    assert_eq!(registry.remove_target(&mut backend, target), Ok(true));
    assert_eq!(registry.target_count(), 0);
}

#[test]
fn test_largest_particle_size_wins() {
    let mut backend = SoftwareBackend::new(16, 16, BACKGROUND);
    let mut registry = FluidRegistry::new();
    let small = registry.add_render_object(object(1), Registration::default()).unwrap();
    let mut big = object(1);
    big.particle_size = 1.5;
    let big = registry.add_render_object(big, Registration::default()).unwrap();
    let target = registry.target_of(small).unwrap();

    assert_eq!(registry.target(target).unwrap().fixed_particle_size(), 1.5);

    registry.remove_render_object(&mut backend, big).unwrap();
    assert_eq!(registry.target(target).unwrap().fixed_particle_size(), 0.5);

    registry.set_parameter(small, Parameter::ParticleSize(0.8)).unwrap();
    assert_eq!(registry.target(target).unwrap().fixed_particle_size(), 0.8);
}

#[test]
fn test_priority_orders_draws() {
    let mut backend = SoftwareBackend::new(16, 16, BACKGROUND);
    let mut registry = FluidRegistry::new();
    let late = registry.add_render_object(object(1), Registration::default()).unwrap();
    registry.add_render_object(object(2), Registration::default()).unwrap();
    registry.add_render_object(object(3), Registration::default()).unwrap();
    registry.set_parameter(late, Parameter::Priority(10)).unwrap();

    registry.render_frame(&mut backend, Some(&camera(0)));

    let depth_counts: Vec<usize> = backend
        .trace()
        .iter()
        .filter_map(|e| match e {
            PassEvent::Draw {
                shader: ParticleShader::Depth { .. },
                count,
                ..
            } => Some(*count),
            _ => None,
        })
        .collect();
    assert_eq!(depth_counts, vec![2, 3, 1]);
}

#[test]
fn test_unknown_handles_rejected() {
    let mut backend = SoftwareBackend::new(4, 4, BACKGROUND);
    let mut registry = FluidRegistry::new();

    assert_eq!(
        registry.set_parameter(ObjectId(7), Parameter::Density(1.0)),
        Err(RenderError::UnknownObject(ObjectId(7)))
    );
    assert!(matches!(
        registry.remove_render_object(&mut backend, ObjectId(0)),
        Err(RenderError::UnknownObject(_))
    ));
    assert_eq!(
        registry.remove_target(&mut backend, TargetId(3)),
        Err(RenderError::UnknownTarget(TargetId(3)))
    );
    assert_eq!(
        registry.set_remove_when_unused(TargetId(3), false),
        Err(RenderError::UnknownTarget(TargetId(3)))
    );
    assert_eq!(
        registry.set_environment(TargetId(3), None),
        Err(RenderError::UnknownTarget(TargetId(3)))
    );
    let explicit = Registration {
        target: Some(TargetId(9)),
        ..Registration::default()
    };
    assert!(matches!(
        registry.add_render_object(object(1), explicit),
        Err(RenderError::UnknownTarget(TargetId(9)))
    ));
    assert_eq!(registry.object_count(), 0);
}

#[test]
fn test_invalid_particle_size_rejected() {
    let mut registry = FluidRegistry::new();
    let mut bad = object(1);
    bad.particle_size = 0.0;
    assert!(matches!(
        registry.add_render_object(bad, Registration::default()),
        Err(RenderError::Config(ConfigError::NonPositive { .. }))
    ));
    assert_eq!(registry.target_count(), 0);
}

#[test]
fn test_no_camera_renders_nothing() {
    let mut backend = SoftwareBackend::new(16, 16, BACKGROUND);
    let mut registry = FluidRegistry::new();
    let id = registry.add_render_object(object(3), Registration::default()).unwrap();

    let stats = registry.render_frame(&mut backend, None);

    assert_eq!(stats.targets_composited, 0);
    assert!(backend.trace().is_empty());
    let target = registry.target_of(id).unwrap();
    assert_eq!(registry.target(target).unwrap().state(), TargetState::Uninitialized);
}

#[test]
fn test_targets_render_only_for_their_camera() {
    let mut backend = SoftwareBackend::new(16, 16, BACKGROUND);
    let mut registry = FluidRegistry::new();
    registry.add_render_object(object(1), for_camera(1)).unwrap();
    registry.add_render_object(object(1), for_camera(2)).unwrap();
    registry.add_render_object(object(1), Registration::default()).unwrap();

    let stats = registry.render_frame(&mut backend, Some(&camera(1)));

    assert_eq!(stats.targets_composited, 2, "own camera plus the camera-less target");
    assert_eq!(stats.objects_rendered, 2);
}

#[test]
fn test_pass_not_ready_skips_target() {
    let mut backend = SoftwareBackend::new(16, 16, BACKGROUND);
    backend.set_passes_ready(false);
    let mut registry = FluidRegistry::new();
    registry.add_render_object(object(2), Registration::default()).unwrap();

    let stats = registry.render_frame(&mut backend, Some(&camera(0)));

    assert_eq!(stats.targets_composited, 0);
    assert_eq!(stats.targets_skipped, 1);
    assert!(backend.output().data.iter().all(|&c| c == BACKGROUND));
}

#[test]
fn test_structural_parameter_rebuilds_next_frame() {
    let mut backend = SoftwareBackend::new(16, 16, BACKGROUND);
    let mut registry = FluidRegistry::new();
    let id = registry.add_render_object(object(2), Registration::default()).unwrap();
    let target = registry.target_of(id).unwrap();
    registry.render_frame(&mut backend, Some(&camera(0)));

    registry.set_parameter_by_name(id, "generate_diffuse", &[1.0]).unwrap();
    assert_eq!(registry.target(target).unwrap().state(), TargetState::NeedsReinit);

    registry.render_frame(&mut backend, Some(&camera(0)));
    let renderer = registry.target(target).unwrap();
    assert_eq!(renderer.state(), TargetState::Ready);
    assert!(renderer.channel(ChannelKind::Diffuse).is_some());
}

#[test]
fn test_parameter_by_name_errors() {
    let mut registry = FluidRegistry::new();
    let id = registry.add_render_object(object(1), Registration::default()).unwrap();

    assert!(matches!(
        registry.set_parameter_by_name(id, "glitter", &[1.0]),
        Err(RenderError::Config(ConfigError::UnknownParameter(_)))
    ));
    assert!(matches!(
        registry.set_parameter_by_name(id, "index_of_refraction", &[-1.0]),
        Err(RenderError::Config(ConfigError::NonPositive { .. }))
    ));
    registry.set_parameter_by_name(id, "fluid_color", &[1.0, 0.0, 0.0]).unwrap();
    let target = registry.target_of(id).unwrap();
    assert_eq!(registry.target(target).unwrap().settings().fluid_color, Vec3::X);
}

#[test]
fn test_oversized_blur_kernel_rejected() {
    let mut backend = SoftwareBackend::new(16, 16, BACKGROUND);
    let mut registry = FluidRegistry::new();
    let id = registry.add_render_object(object(3), Registration::default()).unwrap();
    let target = registry.target_of(id).unwrap();

    assert_eq!(
        registry.set_parameter_by_name(id, "thickness_blur_kernel", &[1e10]),
        Err(RenderError::Config(ConfigError::BlurKernelTooLarge(u32::MAX)))
    );
    assert_eq!(
        registry.set_parameter(id, Parameter::BlurKernel(ChannelKind::Thickness, 1_000_000)),
        Err(RenderError::Config(ConfigError::BlurKernelTooLarge(1_000_000)))
    );
    assert_eq!(
        registry.target(target).unwrap().settings().thickness_blur,
        TargetSettings::default().thickness_blur
    );

    registry.render_frame(&mut backend, Some(&camera(0)));
    assert!(backend.output().data.iter().all(|c| c.is_finite()));
}

#[test]
fn test_update_steps_simulations() {
    let mut sim = Simulator::new(4, SphConfig::default()).unwrap();
    sim.add_particles(&[Vec3::new(0.0, 1.0, 0.0)], &[]);
    let mut registry = FluidRegistry::new();
    let id = registry
        .add_render_object(RenderObject::new(Box::new(SimulationSource::new(sim))), Registration::default())
        .unwrap();

    registry.update(1.0 / 60.0);

    let source = &registry.object(id).unwrap().source;
    assert_eq!(source.count(), 1);
    assert!(source.positions()[0].y < 1.0, "particle should fall");
    assert!(source.velocities().unwrap()[0].y < 0.0);
}

#[test]
fn test_dispose_keeps_objects() {
    let mut backend = SoftwareBackend::new(16, 16, BACKGROUND);
    let mut registry = FluidRegistry::new();
    registry.add_render_object(object(2), Registration::default()).unwrap();
    registry.render_frame(&mut backend, Some(&camera(0)));

    registry.dispose(&mut backend);
    assert_eq!(backend.live_textures(), 0);
    assert_eq!(registry.object_count(), 1);

    let stats = registry.render_frame(&mut backend, Some(&camera(0)));
    assert_eq!(stats.targets_composited, 1, "targets rebuild after dispose");
}
