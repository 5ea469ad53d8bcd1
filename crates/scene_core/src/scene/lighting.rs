//! Scene light registry and cascaded shadow map splits

use std::sync::Arc;

use crate::config::ShadowConfig;
use crate::foundation::math::{utils, Mat4, Point3, Vec3};
use crate::scene::components::{Camera, Cascade, DirectionalLight, Light, PointLight, SpotLight};

/// Lights currently attached to entities of a scene
#[derive(Debug, Default)]
pub struct LightSet {
    directional: Vec<Arc<DirectionalLight>>,
    point: Vec<Arc<PointLight>>,
    spot: Vec<Arc<SpotLight>>,
}

impl LightSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a light, ignoring duplicates
    pub fn add(&mut self, light: Light) -> bool {
        if self.contains(&light) {
            log::debug!("LightSet: light already registered");
            return false;
        }
        match light {
            Light::Directional(light) => self.directional.push(light),
            Light::Point(light) => self.point.push(light),
            Light::Spot(light) => self.spot.push(light),
        }
        true
    }

    /// Unregister a light
    pub fn remove(&mut self, light: &Light) -> bool {
        fn remove_from<T>(list: &mut Vec<Arc<T>>, light: &Arc<T>) -> bool {
            let before = list.len();
            list.retain(|candidate| !Arc::ptr_eq(candidate, light));
            list.len() != before
        }

        match light {
            Light::Directional(light) => remove_from(&mut self.directional, light),
            Light::Point(light) => remove_from(&mut self.point, light),
            Light::Spot(light) => remove_from(&mut self.spot, light),
        }
    }

    /// Check if a light is registered
    pub fn contains(&self, light: &Light) -> bool {
        match light {
            Light::Directional(light) => self.directional.iter().any(|l| Arc::ptr_eq(l, light)),
            Light::Point(light) => self.point.iter().any(|l| Arc::ptr_eq(l, light)),
            Light::Spot(light) => self.spot.iter().any(|l| Arc::ptr_eq(l, light)),
        }
    }

    /// Registered directional lights
    pub fn directional_lights(&self) -> &[Arc<DirectionalLight>] {
        &self.directional
    }

    /// Registered point lights
    pub fn point_lights(&self) -> &[Arc<PointLight>] {
        &self.point
    }

    /// Registered spot lights
    pub fn spot_lights(&self) -> &[Arc<SpotLight>] {
        &self.spot
    }

    /// Total number of lights
    pub fn len(&self) -> usize {
        self.directional.len() + self.point.len() + self.spot.len()
    }

    /// Check if no light is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recompute the cascades of every shadow casting directional light
    pub fn update_cascades(&self, camera: &Camera, config: &ShadowConfig) {
        for light in self.directional.iter().filter(|light| light.casts_shadows()) {
            light.set_cascades(compute_cascades(camera, &light.direction(), config));
        }
    }
}

/// View distances splitting `[near, far]` into `count` slices
///
/// Practical split scheme: a blend weighted by `lambda` between the
/// logarithmic and the uniform distributions. The last value is `far`.
pub fn split_distances(near: f32, far: f32, count: usize, lambda: f32) -> Vec<f32> {
    #[allow(clippy::cast_precision_loss)]
    let count_f = count as f32;
    (1..=count)
        .map(|index| {
            #[allow(clippy::cast_precision_loss)]
            let ratio = index as f32 / count_f;
            let logarithmic = near * (far / near).powf(ratio);
            let uniform = (far - near).mul_add(ratio, near);
            utils::lerp(uniform, logarithmic, lambda)
        })
        .collect()
}

/// Cascades of a directional light covering the camera frustum
///
/// Each slice is enclosed in a bounding sphere so the projection stays
/// stable while the camera rotates.
pub fn compute_cascades(camera: &Camera, light_direction: &Vec3, config: &ShadowConfig) -> Vec<Cascade> {
    let Some(direction) = light_direction.try_normalize(f32::EPSILON) else {
        return Vec::new();
    };

    let near = camera.near();
    let far = camera.far().min(config.shadow_distance);
    if near <= 0.0 || far <= near {
        log::debug!("Cascades: unusable depth range {near}..{far}");
        return Vec::new();
    }

    let count = config.cascade_count.clamp(1, ShadowConfig::MAX_CASCADES);
    let up = if direction.cross(&Vec3::y()).norm_squared() <= f32::EPSILON {
        Vec3::z()
    } else {
        Vec3::y()
    };

    let mut cascades = Vec::with_capacity(count);
    let mut slice_near = near;
    for slice_far in split_distances(near, far, count, config.split_lambda) {
        let Some(corners) = camera.frustum_corners(slice_near, slice_far) else {
            return Vec::new();
        };

        let center = corners.iter().sum::<Vec3>() / 8.0;
        let radius = corners
            .iter()
            .map(|corner| (corner - center).norm())
            .fold(0.0_f32, f32::max);
        let radius = (radius * 16.0).ceil() / 16.0;

        let eye = Point3::from(center - direction * radius);
        let view = Mat4::look_at_rh(&eye, &Point3::from(center), &up);
        let projection = Mat4::new_orthographic(-radius, radius, -radius, radius, 0.0, radius * 2.0);

        cascades.push(Cascade {
            near: slice_near,
            far: slice_far,
            radius,
            view_projection: projection * view,
        });
        slice_near = slice_far;
    }

    cascades
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Transform, Vec4};
    use approx::assert_relative_eq;

    #[test]
    fn test_split_distances_bounds() {
        let splits = split_distances(1.0, 100.0, 4, 0.5);

        assert_eq!(splits.len(), 4);
        assert_relative_eq!(splits[3], 100.0, epsilon = 1e-3);
        assert!(splits.windows(2).all(|pair| pair[0] < pair[1]));

        let uniform = split_distances(1.0, 101.0, 4, 0.0);
        assert_relative_eq!(uniform[0], 26.0, epsilon = 1e-3);

        let logarithmic = split_distances(1.0, 10_000.0, 4, 1.0);
        assert_relative_eq!(logarithmic[1], 100.0, epsilon = 1e-2);
    }

    #[test]
    fn test_cascades_cover_slices() {
        let camera = Camera::perspective("main", 60.0, 1.0, 0.5, 200.0);
        camera.set_world(&Transform::from_position(Vec3::new(0.0, 5.0, 0.0)));
        let config = ShadowConfig::default();

        let cascades = compute_cascades(&camera, &Vec3::new(0.0, -1.0, 0.2), &config);

        assert_eq!(cascades.len(), 4);
        assert_relative_eq!(cascades[0].near, 0.5);
        assert_relative_eq!(cascades[3].far, 200.0, epsilon = 1e-3);

        // Every corner of a slice lands inside its cascade clip volume.
        for cascade in &cascades {
            let corners = camera.frustum_corners(cascade.near, cascade.far).unwrap();
            for corner in corners {
                let clip = cascade.view_projection * Vec4::new(corner.x, corner.y, corner.z, 1.0);
                assert!(clip.x.abs() <= 1.0 + 1e-3);
                assert!(clip.y.abs() <= 1.0 + 1e-3);
                assert!(clip.z.abs() <= 1.0 + 1e-3);
            }
        }
    }

    #[test]
    fn test_light_set_registration() {
        let mut lights = LightSet::new();
        let sun = Light::Directional(Arc::new(DirectionalLight::new(Vec3::repeat(1.0), 1.0, true)));
        let lamp = Light::Point(Arc::new(PointLight::new(Vec3::repeat(1.0), 1.0, 5.0)));

        assert!(lights.add(sun.clone()));
        assert!(!lights.add(sun.clone()));
        assert!(lights.add(lamp.clone()));
        assert_eq!(lights.len(), 2);

        assert!(lights.remove(&sun));
        assert!(!lights.remove(&sun));
        assert_eq!(lights.point_lights().len(), 1);
        assert!(lights.directional_lights().is_empty());
    }

    #[test]
    fn test_update_cascades_skips_non_casting_lights() {
        let mut lights = LightSet::new();
        let caster = Arc::new(DirectionalLight::new(Vec3::repeat(1.0), 1.0, true));
        let plain = Arc::new(DirectionalLight::new(Vec3::repeat(1.0), 1.0, false));
        lights.add(Light::Directional(Arc::clone(&caster)));
        lights.add(Light::Directional(Arc::clone(&plain)));

        lights.update_cascades(&Camera::default(), &ShadowConfig::default());

        assert_eq!(caster.cascades().len(), 4);
        assert!(plain.cascades().is_empty());
    }
}
