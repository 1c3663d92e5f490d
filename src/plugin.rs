use std::time::Duration;

use bevy::prelude::*;

use super::animation::TextAnimationPlugin;
use super::config::EditorSettings;
use super::font::FontProviderPlugin;
use super::pipeline::TextPipelinePlugin;
use super::scene::SceneLifecyclePlugin;
use super::Text3dSet;

/// Everything the editor core needs: fonts, the update pipeline, the scene and
/// the animation loop.
#[derive(Default)]
pub struct Text3dEditorPlugin {
    pub settings: EditorSettings,
    /// Skip initializing the scene on the primary window, e.g. to render into an image
    pub headless: bool,
}

impl Text3dEditorPlugin {
    pub fn new(settings: EditorSettings) -> Self {
        Self {
            settings,
            headless: false,
        }
    }

    pub fn headless(mut self) -> Self {
        self.headless = true;
        self
    }
}

impl Plugin for Text3dEditorPlugin {
    fn build(&self, app: &mut App) {
        // apps without the render plugins still need somewhere to put text meshes
        if !app.world().contains_resource::<Assets<Mesh>>() {
            app.init_asset::<Mesh>();
        }
        if !app.world().contains_resource::<Assets<StandardMaterial>>() {
            app.init_asset::<StandardMaterial>();
        }

        let settings = &self.settings;
        app.configure_sets(
            Update,
            (
                Text3dSet::Fonts,
                Text3dSet::Pipeline,
                Text3dSet::Animation,
                Text3dSet::Scene,
            )
                .chain(),
        )
        .add_plugins(FontProviderPlugin {
            table: settings.fonts.clone(),
            retry: settings.font_retry,
        })
        .add_plugins(SceneLifecyclePlugin {
            camera: settings.camera,
            background: settings.background,
            attach_to_primary_window: !self.headless,
        })
        .add_plugins(TextPipelinePlugin {
            debounce: Duration::from_millis(settings.debounce_ms),
            init_timeout: Duration::from_millis(settings.init_timeout_ms),
        })
        .add_plugins(TextAnimationPlugin);
    }
}
