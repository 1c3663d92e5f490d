use bevy::{
    pbr::light_consts,
    prelude::*,
    render::camera::{ClearColorConfig, RenderTarget},
};
use serde::{Deserialize, Serialize};

use super::export::{encode_data_url, ExportError, ImageExportFormat};
use crate::config::RgbColor;

/// Camera placement and zoom limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CameraSettings {
    pub initial_distance: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub zoom_step: f32,
    pub fov_degrees: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            initial_distance: 5.0,
            min_distance: 1.0,
            max_distance: 20.0,
            zoom_step: 0.5,
            fov_degrees: 75.0,
        }
    }
}

impl CameraSettings {
    pub fn clamp_distance(&self, distance: f32) -> f32 {
        distance.clamp(self.min_distance, self.max_distance)
    }
}

/// Parent of everything the scene owns.
#[derive(Component, Debug, Default)]
pub struct SceneRoot;

#[derive(Component, Debug, Default)]
pub struct SceneCamera;

#[derive(Component, Debug, Default)]
pub struct SceneLight;

#[derive(Debug, Clone)]
pub(crate) struct Surface {
    pub(crate) camera: Entity,
    pub(crate) target: RenderTarget,
    pub(crate) size: UVec2,
}

/// Owns the camera, the lights and every object added to the scene.
///
/// All mutation goes through [`Commands`], so changes land at the next sync
/// point; the bookkeeping here is updated immediately.
#[derive(Resource, Debug)]
pub struct SceneManager {
    camera_settings: CameraSettings,
    background: RgbColor,
    /// Point the camera looks at
    target: Vec3,
    /// Unit vector from the target towards the camera
    view_axis: Vec3,
    distance: f32,
    root: Option<Entity>,
    pub(crate) surface: Option<Surface>,
    objects: Vec<Entity>,
    pub(crate) camera_dirty: bool,
    pub(crate) redraw_requested: bool,
    frames: u64,
}

impl Default for SceneManager {
    fn default() -> Self {
        Self::new(CameraSettings::default(), RgbColor::new(0x22, 0x22, 0x22))
    }
}

impl SceneManager {
    pub fn new(camera_settings: CameraSettings, background: RgbColor) -> Self {
        Self {
            target: Vec3::ZERO,
            view_axis: Vec3::Z,
            distance: camera_settings.clamp_distance(camera_settings.initial_distance),
            camera_settings,
            background,
            root: None,
            surface: None,
            objects: Vec::new(),
            camera_dirty: false,
            redraw_requested: false,
            frames: 0,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.surface.is_some()
    }

    pub fn camera_settings(&self) -> &CameraSettings {
        &self.camera_settings
    }

    pub fn camera(&self) -> Option<Entity> {
        self.surface.as_ref().map(|surface| surface.camera)
    }

    pub fn root(&self) -> Option<Entity> {
        self.root
    }

    pub fn size(&self) -> Option<UVec2> {
        self.surface.as_ref().map(|surface| surface.size)
    }

    pub fn target(&self) -> Option<&RenderTarget> {
        self.surface.as_ref().map(|surface| &surface.target)
    }

    pub fn objects(&self) -> &[Entity] {
        &self.objects
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.objects.contains(&entity)
    }

    pub fn background(&self) -> RgbColor {
        self.background
    }

    pub fn camera_distance(&self) -> f32 {
        self.distance
    }

    pub fn camera_position(&self) -> Vec3 {
        self.target + self.view_axis * self.distance
    }

    pub fn camera_target(&self) -> Vec3 {
        self.target
    }

    /// Number of redraws issued through [`SceneManager::render`].
    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub(crate) fn record_frame(&mut self) {
        self.frames += 1;
    }

    /// Sets up camera and lights drawing into `target`. Tears down a previous
    /// surface first.
    pub fn initialize(&mut self, commands: &mut Commands, target: RenderTarget, size: UVec2) {
        if self.is_initialized() {
            debug!("scene already initialized, tearing down the previous surface");
            self.dispose(commands);
        }

        let root = commands
            .spawn((SpatialBundle::default(), SceneRoot, Name::new("scene root")))
            .id();
        self.spawn_lights(commands, root);

        commands.insert_resource(AmbientLight {
            color: Color::srgb_u8(0x40, 0x40, 0x40),
            brightness: 400.0,
        });

        let camera = commands
            .spawn((
                Camera3dBundle {
                    camera: Camera {
                        target: target.clone(),
                        clear_color: ClearColorConfig::Custom(self.background.to_color()),
                        ..default()
                    },
                    projection: PerspectiveProjection {
                        fov: self.camera_settings.fov_degrees.to_radians(),
                        aspect_ratio: aspect_ratio(size),
                        near: 0.1,
                        far: 1000.0,
                    }
                    .into(),
                    transform: self.camera_transform(),
                    ..default()
                },
                SceneCamera,
                Name::new("scene camera"),
            ))
            .id();

        self.root = Some(root);
        self.surface = Some(Surface {
            camera,
            target,
            size,
        });
        self.camera_dirty = true;
        info!("scene initialized at {}x{}", size.x, size.y);
    }

    fn spawn_lights(&self, commands: &mut Commands, root: Entity) {
        let directional = commands
            .spawn((
                DirectionalLightBundle {
                    directional_light: DirectionalLight {
                        illuminance: light_consts::lux::AMBIENT_DAYLIGHT,
                        shadows_enabled: true,
                        ..default()
                    },
                    transform: Transform::from_xyz(10.0, 10.0, 5.0)
                        .looking_at(Vec3::ZERO, Vec3::Y),
                    ..default()
                },
                SceneLight,
            ))
            .id();
        let key = commands
            .spawn((
                PointLightBundle {
                    point_light: PointLight {
                        color: Color::WHITE,
                        intensity: 700_000.0,
                        range: 100.0,
                        ..default()
                    },
                    transform: Transform::from_xyz(-10.0, 10.0, 10.0),
                    ..default()
                },
                SceneLight,
            ))
            .id();
        let rim = commands
            .spawn((
                PointLightBundle {
                    point_light: PointLight {
                        color: Color::srgb_u8(0x87, 0xce, 0xeb),
                        intensity: 500_000.0,
                        range: 100.0,
                        ..default()
                    },
                    transform: Transform::from_xyz(10.0, -10.0, -10.0),
                    ..default()
                },
                SceneLight,
            ))
            .id();
        commands
            .entity(root)
            .push_children(&[directional, key, rim]);
    }

    pub fn camera_transform(&self) -> Transform {
        // looking straight up or down, Y cannot be the up vector
        let up = if self.view_axis.y.abs() > 0.999 {
            Vec3::NEG_Z
        } else {
            Vec3::Y
        };
        Transform::from_translation(self.camera_position()).looking_at(self.target, up)
    }

    /// Moves the camera to `position`, still looking at the current target.
    /// Zoom keeps working along the new view axis.
    pub fn set_camera_position(&mut self, position: Vec3) -> bool {
        self.place_camera(position, self.target)
    }

    /// Points the camera at `target` without moving it.
    pub fn set_camera_target(&mut self, target: Vec3) -> bool {
        self.place_camera(self.camera_position(), target)
    }

    fn place_camera(&mut self, position: Vec3, target: Vec3) -> bool {
        let offset = position - target;
        let Some(view_axis) = offset.try_normalize() else {
            warn!("camera at {position} cannot look at itself, ignoring");
            return false;
        };
        self.target = target;
        self.view_axis = view_axis;
        self.distance = offset.length();
        self.camera_dirty = true;
        true
    }

    pub fn resize(&mut self, size: UVec2) {
        let Some(surface) = self.surface.as_mut() else {
            warn!("resize({}x{}) before the scene was initialized", size.x, size.y);
            return;
        };
        surface.size = size;
        self.camera_dirty = true;
    }

    /// Parents `entity` under the scene root. Returns false when it could not be added.
    pub fn add_object(&mut self, commands: &mut Commands, entity: Entity) -> bool {
        let Some(root) = self.root else {
            warn!("add_object({entity:?}) before the scene was initialized");
            return false;
        };
        if self.contains(entity) {
            return true;
        }
        commands.entity(root).add_child(entity);
        self.objects.push(entity);
        true
    }

    /// Despawns `entity` with all of its descendants.
    pub fn remove_object(&mut self, commands: &mut Commands, entity: Entity) -> bool {
        let Some(index) = self.objects.iter().position(|e| *e == entity) else {
            warn!("remove_object({entity:?}): not part of the scene");
            return false;
        };
        self.objects.remove(index);
        if let Some(entity) = commands.get_entity(entity) {
            entity.despawn_recursive();
        }
        true
    }

    /// Removes every object, keeping camera and lights.
    pub fn clear_objects(&mut self, commands: &mut Commands) {
        for entity in std::mem::take(&mut self.objects) {
            if let Some(entity) = commands.get_entity(entity) {
                entity.despawn_recursive();
            }
        }
    }

    /// Requests one redraw of the current scene state.
    pub fn render(&mut self) -> bool {
        if !self.is_initialized() {
            warn!("render() before the scene was initialized");
            return false;
        }
        self.redraw_requested = true;
        true
    }

    /// Moves the camera one step towards (positive `delta`) or away from its
    /// target, within the configured limits.
    pub fn zoom(&mut self, delta: f32) -> f32 {
        if delta == 0.0 || delta.is_nan() {
            return self.distance;
        }
        let step = self.camera_settings.zoom_step * delta.signum();
        self.distance = self.camera_settings.clamp_distance(self.distance - step);
        self.camera_dirty = true;
        self.distance
    }

    pub fn set_background(&mut self, color: RgbColor) {
        self.background = color;
        self.camera_dirty = true;
    }

    /// Frees every object, the lights and the camera. Safe to call repeatedly.
    pub fn dispose(&mut self, commands: &mut Commands) {
        self.clear_objects(commands);
        if let Some(surface) = self.surface.take() {
            if let Some(camera) = commands.get_entity(surface.camera) {
                camera.despawn_recursive();
            }
        }
        if let Some(root) = self.root.take() {
            if let Some(root) = commands.get_entity(root) {
                root.despawn_recursive();
            }
            info!("scene disposed");
        }
        self.camera_dirty = false;
        self.redraw_requested = false;
    }

    /// Encodes `frame`, the last image drawn into the render target, as a `data:` URL.
    pub fn export_image(
        &self,
        frame: &Image,
        format: ImageExportFormat,
        quality: f32,
    ) -> Result<String, ExportError> {
        if !self.is_initialized() {
            return Err(ExportError::NotInitialized);
        }
        let image = frame
            .clone()
            .try_into_dynamic()
            .map_err(|err| ExportError::Image(err.to_string()))?;
        encode_data_url(&image, format, quality)
    }
}

pub(crate) fn aspect_ratio(size: UVec2) -> f32 {
    if size.y == 0 {
        1.0
    } else {
        size.x as f32 / size.y as f32
    }
}
