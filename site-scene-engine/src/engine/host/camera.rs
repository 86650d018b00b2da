use super::HostSurface;
use super::adapter::HostAdapter;
use crate::engine::config::{ClipDepth, EngineConfig, HostFrame};
use crate::engine::core::events::RenderFrameEvent;
use crate::engine::scene::root::SiteFrame;
use bevy::math::{DMat4, DVec3, DVec4};
use bevy::prelude::*;
use constants::coordinate_system::MAP_AXIS_SWAP;

/// Camera supplied by the host each frame, resolved to map engine-local
/// meters straight to clip space.
#[derive(Resource, Debug, Clone)]
pub struct HostCamera {
    host_matrix: Option<DMat4>,
    clip_from_local: DMat4,
    local_from_clip: DMat4,
    clip_depth: ClipDepth,
    pub frames: u64,
}

impl Default for HostCamera {
    fn default() -> Self {
        Self {
            host_matrix: None,
            clip_from_local: DMat4::IDENTITY,
            local_from_clip: DMat4::IDENTITY,
            clip_depth: ClipDepth::default(),
            frames: 0,
        }
    }
}

impl HostCamera {
    pub fn has_matrix(&self) -> bool {
        self.host_matrix.is_some()
    }

    pub fn clip_from_local(&self) -> DMat4 {
        self.clip_from_local
    }

    /// Store a new host matrix. Singular matrices are dropped and the previous
    /// camera kept.
    pub fn set_host_matrix(
        &mut self,
        matrix: &[f64; 16],
        frame: &SiteFrame,
        host_frame: HostFrame,
        clip_depth: ClipDepth,
    ) -> bool {
        let previous = self.host_matrix.replace(DMat4::from_cols_array(matrix));
        self.clip_depth = clip_depth;
        if self.recompose(frame, host_frame) {
            true
        } else {
            self.host_matrix = previous;
            self.recompose(frame, host_frame);
            false
        }
    }

    /// Rebuild the local-to-clip matrix after the host matrix or the site
    /// origin changed.
    pub fn recompose(&mut self, frame: &SiteFrame, host_frame: HostFrame) -> bool {
        let Some(host) = self.host_matrix else {
            return false;
        };
        let clip_from_local = match host_frame {
            HostFrame::Local => host,
            HostFrame::Mercator => {
                host * DMat4::from_cols_array_2d(&MAP_AXIS_SWAP) * frame.world_from_local
            }
        };

        let det = clip_from_local.determinant();
        if det == 0.0 || !det.is_finite() {
            warn!("Host camera matrix is not invertible, ignoring");
            return false;
        }
        self.clip_from_local = clip_from_local;
        self.local_from_clip = clip_from_local.inverse();
        true
    }

    /// Screen position of a local point, `None` behind the camera.
    pub fn project(&self, local: Vec3, surface: &HostSurface) -> Option<Vec2> {
        if !self.has_matrix() {
            return None;
        }
        let clip = self.clip_from_local * DVec4::from((local.as_dvec3(), 1.0));
        if clip.w <= f64::EPSILON {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(Vec2::new(
            ((ndc.x + 1.0) * 0.5 * f64::from(surface.width)) as f32,
            ((1.0 - ndc.y) * 0.5 * f64::from(surface.height)) as f32,
        ))
    }

    /// Ray through a screen point in local meters: `(origin, unit direction)`.
    pub fn screen_ray(&self, screen: Vec2, surface: &HostSurface) -> Option<(Vec3, Vec3)> {
        if !self.has_matrix() || surface.width <= 0.0 || surface.height <= 0.0 {
            return None;
        }
        let ndc_x = 2.0 * f64::from(screen.x) / f64::from(surface.width) - 1.0;
        let ndc_y = 1.0 - 2.0 * f64::from(screen.y) / f64::from(surface.height);

        let near = self
            .local_from_clip
            .project_point3(DVec3::new(ndc_x, ndc_y, self.clip_depth.near()));
        let far = self
            .local_from_clip
            .project_point3(DVec3::new(ndc_x, ndc_y, 1.0));
        let direction = (far - near).try_normalize()?;
        if !near.is_finite() {
            return None;
        }
        Some((near.as_vec3(), direction.as_vec3()))
    }
}

/// Ground-plane (y = `height`) intersection of a ray.
pub fn ray_ground_hit(origin: Vec3, direction: Vec3, height: f32) -> Option<Vec3> {
    if direction.y.abs() < f32::EPSILON {
        return None;
    }
    let t = (height - origin.y) / direction.y;
    (t >= 0.0).then(|| origin + direction * t)
}

pub fn apply_render_frame(
    mut events: EventReader<RenderFrameEvent>,
    mut camera: ResMut<HostCamera>,
    mut adapter: Option<ResMut<HostAdapter>>,
    frame: Res<SiteFrame>,
    config: Res<EngineConfig>,
) {
    let Some(RenderFrameEvent { matrix }) = events.read().last() else {
        return;
    };
    camera.set_host_matrix(matrix, &frame, config.host_frame, config.clip_depth);
    camera.frames += 1;
    if let Some(adapter) = adapter.as_deref_mut() {
        adapter.request_repaint();
    }
}

/// Keep the composed camera in step with origin changes.
pub fn recompose_on_origin_change(
    frame: Res<SiteFrame>,
    mut camera: ResMut<HostCamera>,
    config: Res<EngineConfig>,
) {
    if frame.is_changed() && camera.has_matrix() {
        camera.recompose(&frame, config.host_frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn top_down() -> DMat4 {
        let projection = DMat4::perspective_rh(60f64.to_radians(), 1.0, 0.1, 100.0);
        let view = DMat4::look_at_rh(
            DVec3::new(0.0, 20.0, 0.0),
            DVec3::ZERO,
            DVec3::NEG_Z,
        );
        projection * view
    }

    fn surface() -> HostSurface {
        HostSurface::new(800.0, 800.0, "test")
    }

    #[test]
    fn centre_ray_points_straight_down() {
        let mut camera = HostCamera::default();
        assert!(camera.set_host_matrix(
            &top_down().to_cols_array(),
            &SiteFrame::default(),
            HostFrame::Local,
            ClipDepth::ZeroToOne,
        ));
        let (origin, direction) = camera.screen_ray(Vec2::new(400.0, 400.0), &surface()).unwrap();
        assert!(Vec2::new(origin.x, origin.z).length() < 1e-3);
        assert!((direction - Vec3::NEG_Y).length() < 1e-4);

        let hit = ray_ground_hit(origin, direction, 0.0).unwrap();
        assert!(hit.length() < 1e-3);
    }

    #[test]
    fn projection_and_ray_agree() {
        let mut camera = HostCamera::default();
        camera.set_host_matrix(
            &top_down().to_cols_array(),
            &SiteFrame::default(),
            HostFrame::Local,
            ClipDepth::ZeroToOne,
        );
        let point = Vec3::new(3.0, 0.0, 4.0);
        let screen = camera.project(point, &surface()).unwrap();
        // North (+z in local, -z in this camera's up) is towards the bottom.
        assert!(screen.x > 400.0 && screen.y > 400.0);

        let (origin, direction) = camera.screen_ray(screen, &surface()).unwrap();
        let hit = ray_ground_hit(origin, direction, 0.0).unwrap();
        assert!((hit - point).length() < 1e-2, "hit {hit:?}");
    }

    #[test]
    fn singular_matrix_is_ignored() {
        let mut camera = HostCamera::default();
        assert!(!camera.set_host_matrix(
            &[0.0; 16],
            &SiteFrame::default(),
            HostFrame::Local,
            ClipDepth::ZeroToOne,
        ));
        assert!(!camera.has_matrix());
        assert!(camera.screen_ray(Vec2::ZERO, &surface()).is_none());
    }

    #[test]
    fn parallel_ray_misses_ground() {
        assert!(ray_ground_hit(Vec3::Y, Vec3::X, 0.0).is_none());
        assert!(ray_ground_hit(Vec3::Y, Vec3::Y, 0.0).is_none());
    }
}
