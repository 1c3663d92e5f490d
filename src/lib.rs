use bevy::prelude::SystemSet;

pub mod animation;
pub mod config;
pub mod font;
pub mod pipeline;
mod plugin;
pub mod scene;
pub mod text_mesh;

pub use animation::{AnimationCommand, AnimationController, AnimationKind};
pub use config::{EditorSettings, FontKey, ProjectDocument, RgbColor, TextStyleConfig};
pub use font::{Font, FontProvider, FontProviderReady};
pub use pipeline::{RequestTextUpdate, TextPipelineEvent, TextUpdatePipeline};
pub use plugin::Text3dEditorPlugin;
pub use scene::SceneManager;
pub use text_mesh::{build_text, BuiltText, TextMesh};

/// Order of the editor systems inside `Update`.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Text3dSet {
    Fonts,
    Pipeline,
    Animation,
    Scene,
}
