use glam::{Mat4, Vec2, Vec3, Vec4Swizzles};

/// Identifies a camera across frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CameraId(pub u32);

/// View and projection supplied by the host every frame.
///
/// Right-handed view space: the camera looks down `-Z`, so a point in front
/// of it has view-space depth `-view_pos.z > 0`.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub id: CameraId,
    pub view: Mat4,
    pub projection: Mat4,
    pub far: f32,
}

impl Camera {
    /// Perspective camera looking from `eye` at `target`, `+Y` up.
    pub fn look_at(
        id: CameraId,
        eye: Vec3,
        target: Vec3,
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    ) -> Self {
        Self {
            id,
            view: Mat4::look_at_rh(eye, target, Vec3::Y),
            projection: Mat4::perspective_rh(fov_y, aspect, near, far),
            far,
        }
    }

    /// Distance along the view axis, positive in front of the camera.
    #[inline]
    pub fn view_depth(&self, world: Vec3) -> f32 {
        -self.view.transform_point3(world).z
    }

    /// Screen uv (origin bottom-left) and view depth of a world point, or
    /// `None` when the point is behind the camera.
    pub fn project(&self, world: Vec3) -> Option<(Vec2, f32)> {
        let view_pos = self.view.transform_point3(world);
        let depth = -view_pos.z;
        if depth <= 0.0 {
            return None;
        }
        let clip = self.projection * view_pos.extend(1.0);
        let ndc = clip.xy() / clip.w;
        Some((ndc * 0.5 + Vec2::splat(0.5), depth))
    }

    /// Pixels covered by one world unit at view depth 1, for a target of
    /// `width x height` texels.
    #[inline]
    pub fn pixels_per_unit(&self, width: u32, height: u32) -> Vec2 {
        Vec2::new(
            self.projection.x_axis.x * 0.5 * width as f32,
            self.projection.y_axis.y * 0.5 * height as f32,
        )
    }
}

/// Reconstruct a view-space position from screen uv and linear view depth.
///
/// Unprojects a point on the near plane to get the view ray through `uv`,
/// then scales it so that its depth equals `depth`.
#[inline]
pub fn view_pos_from_depth(uv: Vec2, depth: f32, inv_projection: &Mat4) -> Vec3 {
    let ndc = uv * 2.0 - Vec2::ONE;
    let near = *inv_projection * ndc.extend(0.0).extend(1.0);
    let ray = near.xyz() / near.w;
    ray * (depth / -ray.z)
}
