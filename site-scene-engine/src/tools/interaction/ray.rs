use crate::engine::assets::placement::ObjectId;
use crate::engine::scene::objects::{MeshEntry, MeshRegistry};
use bevy::prelude::*;

/// Distance along the ray to a placed object's oriented box.
pub fn ray_hits_entry(origin: Vec3, direction: Vec3, entry: &MeshEntry) -> Option<f32> {
    let local_from_object = entry.transform().compute_matrix().inverse();
    let o = local_from_object.transform_point3(origin);
    let d = local_from_object.transform_vector3(direction);
    let half = entry.size * 0.5;
    ray_aabb_hit_t(o, d, -half, half)
}

/// Slab-method ray/AABB intersection. Returns the entry distance, or the exit
/// distance when the ray starts inside the box.
pub fn ray_aabb_hit_t(origin: Vec3, direction: Vec3, min: Vec3, max: Vec3) -> Option<f32> {
    let mut t_near = f32::NEG_INFINITY;
    let mut t_far = f32::INFINITY;

    for axis in 0..3 {
        let (o, d) = (origin[axis], direction[axis]);
        if d == 0.0 {
            if o < min[axis] || o > max[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let (mut t0, mut t1) = ((min[axis] - o) * inv, (max[axis] - o) * inv);
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_near = t_near.max(t0);
        t_far = t_far.min(t1);
        if t_near > t_far {
            return None;
        }
    }

    if t_far < 0.0 {
        return None;
    }
    Some(if t_near >= 0.0 { t_near } else { t_far })
}

/// Nearest object hit by the ray, if any.
pub fn pick_nearest(origin: Vec3, direction: Vec3, registry: &MeshRegistry) -> Option<ObjectId> {
    registry
        .iter()
        .filter_map(|(id, entry)| ray_hits_entry(origin, direction, entry).map(|t| (id, t)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hits_box_from_outside() {
        let t = ray_aabb_hit_t(Vec3::new(0.0, 10.0, 0.0), Vec3::NEG_Y, Vec3::splat(-1.0), Vec3::ONE);
        assert_eq!(t, Some(9.0));
    }

    #[test]
    fn misses_box_beside_ray() {
        let t = ray_aabb_hit_t(Vec3::new(3.0, 10.0, 0.0), Vec3::NEG_Y, Vec3::splat(-1.0), Vec3::ONE);
        assert_eq!(t, None);
    }

    #[test]
    fn box_behind_origin_is_missed() {
        let t = ray_aabb_hit_t(Vec3::new(0.0, 10.0, 0.0), Vec3::Y, Vec3::splat(-1.0), Vec3::ONE);
        assert_eq!(t, None);
    }

    #[test]
    fn inside_origin_reports_exit() {
        let t = ray_aabb_hit_t(Vec3::ZERO, Vec3::X, Vec3::splat(-1.0), Vec3::ONE);
        assert_eq!(t, Some(1.0));
    }
}
