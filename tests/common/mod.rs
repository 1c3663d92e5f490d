#![allow(dead_code)]

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use bevy::ecs::system::RunSystemOnce;
use bevy::prelude::*;
use bevy::render::camera::RenderTarget;
use bevy::time::TimeUpdateStrategy;

use bevy_extruded_text::font::{FontSource, FontTable, RetryPolicy};
use bevy_extruded_text::{
    EditorSettings, FontProvider, SceneManager, Text3dEditorPlugin, TextPipelineEvent,
};

pub const FRAME: Duration = Duration::from_millis(20);
const MAX_FRAMES: usize = 500;

pub fn fixture_font_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/fonts/DejaVuSans.ttf")
}

/// Both universal fallbacks served from the bundled test font.
pub fn fixture_table() -> FontTable {
    let source = FontSource::Local(fixture_font_path());
    FontTable::default()
        .with_source("helvetiker", source.clone())
        .with_source("optimer", source)
}

/// Every font points at a file that does not exist.
pub fn missing_table() -> FontTable {
    let source = FontSource::Local(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("no/such.ttf"));
    let mut table = FontTable::default();
    for entry in table.sources.values_mut() {
        *entry = source.clone();
    }
    table
}

pub fn settings(table: FontTable) -> EditorSettings {
    EditorSettings {
        debounce_ms: 100,
        init_timeout_ms: 2_000,
        font_retry: RetryPolicy {
            max_retries: 0,
            base_delay_ms: 10,
        },
        fonts: table,
        ..default()
    }
}

#[derive(Resource, Default)]
pub struct PipelineLog(pub Vec<TextPipelineEvent>);

fn collect_pipeline_events(
    mut events: EventReader<TextPipelineEvent>,
    mut log: ResMut<PipelineLog>,
) {
    log.0.extend(events.read().cloned());
}

/// Headless app with the whole editor core and an initialized scene that
/// renders into an image.
pub fn editor_app(settings: EditorSettings, provider: Option<FontProvider>) -> App {
    let mut app = App::new();
    app.add_plugins((MinimalPlugins, AssetPlugin::default()))
        .insert_resource(TimeUpdateStrategy::ManualDuration(FRAME));
    if let Some(provider) = provider {
        app.insert_resource(provider);
    }
    app.add_plugins(Text3dEditorPlugin::new(settings).headless())
        .init_resource::<PipelineLog>()
        .add_systems(Last, collect_pipeline_events);
    app.finish();
    app.cleanup();

    app.world_mut()
        .run_system_once(|mut commands: Commands, mut scene: ResMut<SceneManager>| {
            scene.initialize(
                &mut commands,
                RenderTarget::Image(Handle::default()),
                UVec2::new(800, 600),
            );
        });
    app
}

/// Updates `app` until `done` holds. Returns false when it never did.
pub fn run_until(app: &mut App, mut done: impl FnMut(&mut App) -> bool) -> bool {
    for _ in 0..MAX_FRAMES {
        app.update();
        if done(app) {
            return true;
        }
        // font loads run on the io pool
        thread::sleep(Duration::from_millis(2));
    }
    false
}

pub fn pipeline_log(app: &App) -> &[TextPipelineEvent] {
    &app.world().resource::<PipelineLog>().0
}

pub fn installed(app: &App, generation: u64) -> bool {
    pipeline_log(app).iter().any(|event| {
        matches!(event, TextPipelineEvent::Installed { generation: g, .. } if *g == generation)
    })
}
