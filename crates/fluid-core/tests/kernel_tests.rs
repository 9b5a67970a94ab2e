use glam::Vec3;
use std::f32::consts::PI;
use fluid_core::error::ConfigError;
use fluid_core::fluids::KernelConstants;

#[test]
fn test_constants_match_radius() {
    let h = 0.2_f32;
    let k = KernelConstants::new(h).unwrap();
    assert!((k.radius_sq() - h * h).abs() < 1e-7);
    assert!((k.poly6_constant() - 315.0 / (64.0 * PI * h.powi(9))).abs() / k.poly6_constant() < 1e-5);
    assert!((k.spiky_constant() + 45.0 / (PI * h.powi(6))).abs() / k.viscosity_constant() < 1e-5);
    assert_eq!(k.spiky_constant(), -k.viscosity_constant());
}

#[test]
fn test_invalid_radius_rejected() {
    for r in [0.0, -0.1, f32::NAN, f32::INFINITY] {
        assert!(
            matches!(KernelConstants::new(r), Err(ConfigError::InvalidSmoothingRadius(_))),
            "radius {} must be rejected",
            r
        );
    }
}

#[test]
fn test_poly6_kernel_zero_distance() {
    let h = 0.1_f32;
    let k = KernelConstants::new(h).unwrap();
    // At r=0 the (h^2 - r^2)^3 term equals h^6, so peak = coeff * h^6
    let peak = k.poly6_constant() * h.powi(6);
    let result = k.poly6(0.0);
    assert!(
        (result - peak).abs() < peak * 1e-5,
        "poly6(0) = {result}, expected {peak}"
    );
}

#[test]
fn test_poly6_kernel_at_and_beyond_boundary() {
    let h = 0.1_f32;
    let k = KernelConstants::new(h).unwrap();
    assert_eq!(k.poly6(h * h), 0.0, "poly6 at h should be 0.0");
    assert_eq!(k.poly6((h + 0.01) * (h + 0.01)), 0.0, "poly6 beyond h should be 0.0");
}

#[test]
fn test_poly6_kernel_decreasing() {
    let k = KernelConstants::new(0.1).unwrap();
    let mut prev = k.poly6(0.0);
    for i in 1..10 {
        let r = i as f32 * 0.01;
        let w = k.poly6(r * r);
        assert!(w < prev, "poly6 must fall off with distance");
        prev = w;
    }
}

#[test]
fn test_spiky_gradient_zero_distance() {
    let k = KernelConstants::new(0.1).unwrap();
    let r = Vec3::new(1e-7, 0.0, 0.0);
    assert_eq!(k.spiky_gradient(r, r.length()), Vec3::ZERO, "near-zero r_len should return ZERO");
}

#[test]
fn test_spiky_gradient_at_boundary() {
    let h = 0.1_f32;
    let k = KernelConstants::new(h).unwrap();
    let r = Vec3::new(h, 0.0, 0.0);
    assert_eq!(k.spiky_gradient(r, h), Vec3::ZERO, "gradient at boundary should return ZERO");
}

#[test]
fn test_spiky_gradient_direction() {
    let k = KernelConstants::new(0.1).unwrap();
    let r = Vec3::new(0.05, 0.0, 0.0);
    let grad = k.spiky_gradient(r, r.length());

    // The coefficient is negative, so the gradient points opposite to r.
    assert!(grad.x < 0.0, "gradient x should be negative, got {}", grad.x);
    assert!(grad.y.abs() < 1e-10, "gradient y should be ~0, got {}", grad.y);
    assert!(grad.z.abs() < 1e-10, "gradient z should be ~0, got {}", grad.z);
}

#[test]
fn test_viscosity_laplacian_linear_falloff() {
    let h = 0.2_f32;
    let k = KernelConstants::new(h).unwrap();
    assert_eq!(k.viscosity_laplacian(h), 0.0);
    let half = k.viscosity_laplacian(h * 0.5);
    let quarter = k.viscosity_laplacian(h * 0.75);
    assert!((half - 2.0 * quarter).abs() < half * 1e-5, "{} vs {}", half, quarter);
}
