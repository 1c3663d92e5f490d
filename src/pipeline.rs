//! Debounced text rebuilds.
//!
//! Requests coalesce behind a short timer. When it fires, the installed text is
//! disposed, the font is resolved, the geometry is built and the new text is
//! swapped into the scene, all inside one system run once the font is there.

use std::task::Poll;
use std::time::Duration;

use bevy::prelude::*;

use crate::config::TextStyleConfig;
use crate::font::FontProvider;
use crate::scene::SceneManager;
use crate::text_mesh::{build_text, TextMesh};
use crate::Text3dSet;

/// Asks the pipeline to show the wrapped config once the debounce delay has passed.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct RequestTextUpdate(pub TextStyleConfig);

#[derive(Event, Debug, Clone, PartialEq)]
pub enum TextPipelineEvent {
    /// The previously installed text was removed from the scene
    Disposed { entity: Entity, generation: u64 },
    Installed {
        entity: Entity,
        generation: u64,
        transform: Transform,
    },
    Failed { generation: u64, message: String },
    /// A build still waiting for its font was overtaken by a newer request
    Discarded { generation: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Pending,
    Building,
}

#[derive(Debug)]
struct PendingUpdate {
    config: TextStyleConfig,
    timer: Timer,
    generation: u64,
}

#[derive(Debug, Clone)]
pub struct InFlightBuild {
    pub config: TextStyleConfig,
    pub generation: u64,
    /// Time spent waiting for the font provider to become ready
    pub waited: Duration,
}

/// The text currently in the scene.
#[derive(Debug, Clone)]
pub struct InstalledText {
    pub entity: Entity,
    pub mesh: TextMesh,
    pub generation: u64,
    pub config: TextStyleConfig,
}

/// Outcome of a debounce timer firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired {
    pub generation: u64,
    /// Generation of an unfinished build that was dropped in favour of this one
    pub superseded: Option<u64>,
}

#[derive(Resource, Debug)]
pub struct TextUpdatePipeline {
    debounce: Duration,
    init_timeout: Duration,
    pending: Option<PendingUpdate>,
    in_flight: Option<InFlightBuild>,
    current: Option<InstalledText>,
    next_generation: u64,
    last_error: Option<String>,
}

impl Default for TextUpdatePipeline {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(10))
    }
}

impl TextUpdatePipeline {
    pub fn new(debounce: Duration, init_timeout: Duration) -> Self {
        Self {
            debounce,
            init_timeout,
            pending: None,
            in_flight: None,
            current: None,
            next_generation: 1,
            last_error: None,
        }
    }

    /// Schedules a rebuild with `config`, replacing any request still waiting
    /// on the debounce timer. Returns the generation of the request.
    pub fn request_update(&mut self, config: TextStyleConfig) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        if let Some(replaced) = self.pending.take() {
            trace!("text update {} coalesced into {generation}", replaced.generation);
        }
        self.pending = Some(PendingUpdate {
            config,
            timer: Timer::new(self.debounce, TimerMode::Once),
            generation,
        });
        generation
    }

    /// Drops the request waiting on the debounce timer. A build that already
    /// started is not affected.
    pub fn cancel_pending(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// True from the moment the debounce fires until the build finished.
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn state(&self) -> PipelineState {
        if self.in_flight.is_some() {
            PipelineState::Building
        } else if self.pending.is_some() {
            PipelineState::Pending
        } else {
            PipelineState::Idle
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn init_timeout(&self) -> Duration {
        self.init_timeout
    }

    pub fn current(&self) -> Option<&InstalledText> {
        self.current.as_ref()
    }

    pub fn current_entity(&self) -> Option<Entity> {
        self.current.as_ref().map(|current| current.entity)
    }

    /// Config of the text currently in the scene.
    pub fn current_config(&self) -> Option<&TextStyleConfig> {
        self.current.as_ref().map(|current| &current.config)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn in_flight(&self) -> Option<&InFlightBuild> {
        self.in_flight.as_ref()
    }

    /// Advances the debounce timer. When it fires, the pending request
    /// becomes the in-flight build.
    pub fn tick(&mut self, delta: Duration) -> Option<Fired> {
        let pending = self.pending.as_mut()?;
        pending.timer.tick(delta);
        if !pending.timer.finished() {
            return None;
        }
        let pending = self.pending.take()?;
        let superseded = self
            .in_flight
            .replace(InFlightBuild {
                config: pending.config,
                generation: pending.generation,
                waited: Duration::ZERO,
            })
            .map(|stale| stale.generation);
        Some(Fired {
            generation: pending.generation,
            superseded,
        })
    }

    pub fn take_current(&mut self) -> Option<InstalledText> {
        self.current.take()
    }

    fn finish_installed(&mut self, installed: InstalledText) {
        self.in_flight = None;
        self.last_error = None;
        self.current = Some(installed);
    }

    fn finish_failed(&mut self, message: String) {
        self.in_flight = None;
        self.last_error = Some(message);
    }
}

pub struct TextPipelinePlugin {
    pub debounce: Duration,
    pub init_timeout: Duration,
}

impl Default for TextPipelinePlugin {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(100),
            init_timeout: Duration::from_secs(10),
        }
    }
}

impl Plugin for TextPipelinePlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<TextUpdatePipeline>() {
            app.insert_resource(TextUpdatePipeline::new(self.debounce, self.init_timeout));
        }
        app.add_event::<RequestTextUpdate>()
            .add_event::<TextPipelineEvent>()
            .add_systems(Update, run_text_pipeline.in_set(Text3dSet::Pipeline));
    }
}

#[allow(clippy::too_many_arguments)]
fn run_text_pipeline(
    mut requests: EventReader<RequestTextUpdate>,
    mut pipeline: ResMut<TextUpdatePipeline>,
    mut provider: ResMut<FontProvider>,
    mut scene: ResMut<SceneManager>,
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    time: Res<Time<Real>>,
    mut events: EventWriter<TextPipelineEvent>,
) {
    for RequestTextUpdate(config) in requests.read() {
        pipeline.request_update(config.clone());
    }

    // clearing, disposing or re-initializing the scene takes the text along
    if pipeline
        .current()
        .is_some_and(|current| !scene.contains(current.entity))
    {
        if let Some(orphan) = pipeline.take_current() {
            orphan.mesh.release(&mut meshes, &mut materials);
            debug!("text update {} left the scene, released", orphan.generation);
            events.send(TextPipelineEvent::Disposed {
                entity: orphan.entity,
                generation: orphan.generation,
            });
        }
    }

    if let Some(fired) = pipeline.tick(time.delta()) {
        debug!("text update {} fired", fired.generation);
        if let Some(stale) = fired.superseded {
            debug!("text update {stale} discarded, a newer one fired");
            events.send(TextPipelineEvent::Discarded { generation: stale });
        }
        // the old text goes before anything new is built
        if let Some(installed) = pipeline.take_current() {
            installed.mesh.release(&mut meshes, &mut materials);
            if scene.contains(installed.entity) {
                scene.remove_object(&mut commands, installed.entity);
            } else if let Some(entity) = commands.get_entity(installed.entity) {
                entity.despawn_recursive();
            }
            debug!("text update {} disposed", installed.generation);
            events.send(TextPipelineEvent::Disposed {
                entity: installed.entity,
                generation: installed.generation,
            });
        }
    }

    let init_timeout = pipeline.init_timeout();
    let Some(build) = pipeline.in_flight.as_mut() else {
        return;
    };

    let degraded = !provider.is_ready();
    if degraded {
        let before = build.waited;
        build.waited += time.delta();
        if build.waited < init_timeout {
            return;
        }
        if before < init_timeout {
            warn!("fonts not ready after {init_timeout:?}, building in degraded mode");
        }
    }

    let font = if degraded {
        provider.resolve_now(&build.config.font_family)
    } else {
        match provider.resolve(&build.config.font_family) {
            Poll::Pending => return,
            Poll::Ready(font) => font,
        }
    };
    let generation = build.generation;
    let config = build.config.clone();

    let built = build_text(&config, font.as_ref()).or_else(|err| {
        if font.is_none() {
            return Err(err);
        }
        warn!("outline build failed ({err}), using character boxes");
        build_text(&config, None)
    });

    match built {
        Ok(built) => {
            let (entity, mesh) = built.spawn(&mut commands, &mut meshes, &mut materials);
            scene.add_object(&mut commands, entity);
            scene.render();
            info!(
                "text update {generation} installed{}",
                if mesh.is_character_group() {
                    " as character boxes"
                } else {
                    ""
                }
            );
            pipeline.finish_installed(InstalledText {
                entity,
                mesh,
                generation,
                config: config.clone(),
            });
            events.send(TextPipelineEvent::Installed {
                entity,
                generation,
                transform: config.transform(),
            });
        }
        Err(err) => {
            error!("text update {generation} failed: {err}");
            pipeline.finish_failed(err.to_string());
            events.send(TextPipelineEvent::Failed {
                generation,
                message: err.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(16);

    fn pipeline() -> TextUpdatePipeline {
        TextUpdatePipeline::new(Duration::from_millis(100), Duration::from_secs(1))
    }

    #[test]
    fn fires_after_the_debounce_delay() {
        let mut pipeline = pipeline();
        assert_eq!(pipeline.state(), PipelineState::Idle);
        let generation = pipeline.request_update(TextStyleConfig::new("a"));
        assert_eq!(pipeline.state(), PipelineState::Pending);
        assert!(!pipeline.is_busy());

        assert!(pipeline.tick(Duration::from_millis(60)).is_none());
        let fired = pipeline.tick(Duration::from_millis(60)).unwrap();
        assert_eq!(fired.generation, generation);
        assert_eq!(fired.superseded, None);
        assert!(pipeline.is_busy());
        assert_eq!(pipeline.state(), PipelineState::Building);
    }

    #[test]
    fn rapid_requests_coalesce_into_the_last() {
        let mut pipeline = pipeline();
        let mut last = 0;
        for text in ["a", "ab", "abc", "abcd"] {
            last = pipeline.request_update(TextStyleConfig::new(text));
            assert!(pipeline.tick(FRAME).is_none());
        }
        let mut fired = None;
        for _ in 0..10 {
            if let Some(f) = pipeline.tick(FRAME) {
                fired = Some(f);
                break;
            }
        }
        assert_eq!(fired.unwrap().generation, last);
        assert_eq!(pipeline.in_flight().unwrap().config.text, "abcd");
        assert!(pipeline.tick(Duration::from_secs(1)).is_none());
    }

    #[test]
    fn cancel_only_drops_the_timer() {
        let mut pipeline = pipeline();
        pipeline.request_update(TextStyleConfig::new("a"));
        pipeline.tick(Duration::from_millis(100)).unwrap();
        pipeline.request_update(TextStyleConfig::new("b"));
        assert!(pipeline.cancel_pending());
        assert!(!pipeline.cancel_pending());
        assert!(pipeline.is_busy());
        assert_eq!(pipeline.in_flight().unwrap().config.text, "a");
    }

    #[test]
    fn newer_fire_supersedes_a_waiting_build() {
        let mut pipeline = pipeline();
        let first = pipeline.request_update(TextStyleConfig::new("a"));
        pipeline.tick(Duration::from_millis(100)).unwrap();
        let second = pipeline.request_update(TextStyleConfig::new("b"));
        let fired = pipeline.tick(Duration::from_millis(100)).unwrap();
        assert_eq!(fired.generation, second);
        assert_eq!(fired.superseded, Some(first));
    }

    #[test]
    fn failure_clears_busy_state() {
        let mut pipeline = pipeline();
        pipeline.request_update(TextStyleConfig::new("a"));
        pipeline.tick(Duration::from_millis(100)).unwrap();
        pipeline.finish_failed("boom".to_string());
        assert!(!pipeline.is_busy());
        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert_eq!(pipeline.last_error(), Some("boom"));
    }
}
