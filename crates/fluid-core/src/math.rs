use glam::Vec3;

/// Hash float to [0,1). Cheap deterministic jitter for spawned particles.
pub fn hash11(p: f32) -> f32 {
    let mut p = (p * 0.1031).fract();
    p *= p + 33.33;
    p *= p + p;
    p.fract()
}

/// GLSL-style `mix(a, b, t)` for vectors.
#[inline]
pub fn mix(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    a * (1.0 - t) + b * t
}

/// Rescale `v` to length `max` if it is longer, keeping its direction.
#[inline]
pub fn clamp_length(v: Vec3, max: f32) -> Vec3 {
    let len_sq = v.length_squared();
    if len_sq > max * max {
        v * (max / len_sq.sqrt())
    } else {
        v
    }
}

/// Port of GLSL `reflect`: mirror `i` about the plane with normal `n`.
#[inline]
pub fn reflect(i: Vec3, n: Vec3) -> Vec3 {
    i - 2.0 * n.dot(i) * n
}

/// Port of GLSL `refract`. Returns zero on total internal reflection.
#[inline]
pub fn refract(i: Vec3, n: Vec3, eta: f32) -> Vec3 {
    let n_dot_i = n.dot(i);
    let k = 1.0 - eta * eta * (1.0 - n_dot_i * n_dot_i);
    if k < 0.0 {
        Vec3::ZERO
    } else {
        eta * i - (eta * n_dot_i + k.sqrt()) * n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_length_preserves_direction() {
        let v = Vec3::new(3.0, 4.0, 0.0);
        let c = clamp_length(v, 1.0);
        assert!((c.length() - 1.0).abs() < 1e-6);
        assert!((c.normalize() - v.normalize()).length() < 1e-6);
        assert_eq!(clamp_length(v, 10.0), v);
    }

    #[test]
    fn test_refract_straight_through() {
        let i = Vec3::new(0.0, 0.0, -1.0);
        let n = Vec3::new(0.0, 0.0, 1.0);
        let r = refract(i, n, 1.0 / 1.33);
        assert!((r - i).length() < 1e-6, "normal incidence should not bend: {:?}", r);
    }

    #[test]
    fn test_refract_total_internal_reflection() {
        let i = Vec3::new(1.0, 0.0, -0.05).normalize();
        let n = Vec3::Z;
        assert_eq!(refract(i, n, 1.5), Vec3::ZERO);
    }

    #[test]
    fn test_reflect_flips_normal_component() {
        let r = reflect(Vec3::new(1.0, -1.0, 0.0), Vec3::Y);
        assert_eq!(r, Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_hash11_range() {
        for i in 0..1000 {
            let h = hash11(i as f32 * 0.37);
            assert!((0.0..1.0).contains(&h), "hash11 out of range: {}", h);
        }
    }
}
