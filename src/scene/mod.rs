use bevy::{
    prelude::*,
    render::{
        camera::{ClearColorConfig, RenderTarget},
        render_resource::Extent3d,
    },
    window::{PrimaryWindow, RequestRedraw, WindowRef, WindowResized},
};

mod export;
mod manager;

pub use export::{encode_data_url, ExportError, ImageExportFormat};
pub use manager::{CameraSettings, SceneCamera, SceneLight, SceneManager, SceneRoot};

use crate::config::RgbColor;
use crate::Text3dSet;

/// Inserts the [`SceneManager`] and keeps its camera in sync.
pub struct SceneLifecyclePlugin {
    pub camera: CameraSettings,
    pub background: RgbColor,
    /// Initialize the scene on the primary window at startup, if there is one
    pub attach_to_primary_window: bool,
}

impl Default for SceneLifecyclePlugin {
    fn default() -> Self {
        Self {
            camera: CameraSettings::default(),
            background: RgbColor::new(0x22, 0x22, 0x22),
            attach_to_primary_window: true,
        }
    }
}

impl Plugin for SceneLifecyclePlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<SceneManager>() {
            app.insert_resource(SceneManager::new(self.camera, self.background));
        }
        app.add_event::<RequestRedraw>()
            .add_event::<WindowResized>()
            .add_systems(
                Update,
                (follow_window_resize, sync_scene_camera)
                    .chain()
                    .in_set(Text3dSet::Scene),
            );
        if self.attach_to_primary_window {
            app.add_systems(PostStartup, attach_to_primary_window);
        }
    }
}

fn attach_to_primary_window(
    mut commands: Commands,
    mut scene: ResMut<SceneManager>,
    windows: Query<&Window, With<PrimaryWindow>>,
) {
    let Ok(window) = windows.get_single() else {
        debug!("no primary window, scene waits for an explicit initialize");
        return;
    };
    scene.initialize(
        &mut commands,
        RenderTarget::Window(WindowRef::Primary),
        window.physical_size(),
    );
}

fn follow_window_resize(
    mut resized: EventReader<WindowResized>,
    mut scene: ResMut<SceneManager>,
    windows: Query<&Window, With<PrimaryWindow>>,
) {
    if resized.is_empty() {
        return;
    }
    resized.clear();
    if !matches!(scene.target(), Some(RenderTarget::Window(WindowRef::Primary))) {
        return;
    }
    if let Ok(window) = windows.get_single() {
        scene.resize(window.physical_size());
    }
}

fn sync_scene_camera(
    mut scene: ResMut<SceneManager>,
    mut cameras: Query<(&mut Transform, &mut Camera, &mut Projection), With<SceneCamera>>,
    images: Option<ResMut<Assets<Image>>>,
    mut redraw: EventWriter<RequestRedraw>,
) {
    if scene.camera_dirty {
        let synced = scene.surface.clone().is_some_and(|surface| {
            let Ok((mut transform, mut camera, mut projection)) = cameras.get_mut(surface.camera)
            else {
                return false;
            };
            *transform = scene.camera_transform();
            camera.clear_color = ClearColorConfig::Custom(scene.background().to_color());
            if let Projection::Perspective(perspective) = projection.as_mut() {
                perspective.aspect_ratio = manager::aspect_ratio(surface.size);
            }
            if let (RenderTarget::Image(handle), Some(mut images)) = (&surface.target, images) {
                if let Some(image) = images.get_mut(handle) {
                    let size = Extent3d {
                        width: surface.size.x.max(1),
                        height: surface.size.y.max(1),
                        depth_or_array_layers: 1,
                    };
                    if image.texture_descriptor.size != size {
                        image.resize(size);
                    }
                }
            }
            true
        });
        if synced {
            scene.camera_dirty = false;
        }
    }

    if scene.redraw_requested {
        scene.redraw_requested = false;
        scene.record_frame();
        redraw.send(RequestRedraw);
    }
}
