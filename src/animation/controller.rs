use std::time::Duration;

use bevy::prelude::*;

use super::{AnimationFrame, AnimationKind};

/// What an animated entity has to be put back to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Restore {
    pub target: Entity,
    pub transform: Transform,
    pub kind: AnimationKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationSession {
    pub target: Entity,
    pub kind: AnimationKind,
    /// Transform of the target when the session started
    pub baseline: Transform,
    pub started_at: Duration,
    /// The target was despawned and the session waits for a replacement
    pub detached: bool,
}

/// Runs at most one animation at a time.
///
/// Frames are computed from the baseline and the elapsed time alone, so a
/// session never drifts and [`AnimationController::stop`] restores exactly.
#[derive(Resource, Debug, Clone)]
pub struct AnimationController {
    session: Option<AnimationSession>,
    speed: f32,
}

impl Default for AnimationController {
    fn default() -> Self {
        Self {
            session: None,
            speed: 1.0,
        }
    }
}

impl AnimationController {
    /// Starts animating `target`. A running session is stopped first and
    /// returned so its target can be restored.
    pub fn start(
        &mut self,
        target: Entity,
        kind: AnimationKind,
        baseline: Transform,
        now: Duration,
    ) -> Option<Restore> {
        let previous = self.stop();
        debug!("animation {kind} started on {target:?}");
        self.session = Some(AnimationSession {
            target,
            kind,
            baseline,
            started_at: now,
            detached: false,
        });
        previous
    }

    /// Ends the session. Returns the pose to put back, unless the target is
    /// already gone.
    pub fn stop(&mut self) -> Option<Restore> {
        let session = self.session.take()?;
        debug!("animation {} stopped", session.kind);
        if session.detached {
            return None;
        }
        Some(Restore {
            target: session.target,
            transform: session.baseline,
            kind: session.kind,
        })
    }

    pub fn is_running(&self, kind: AnimationKind) -> bool {
        self.session.is_some_and(|session| session.kind == kind)
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_detached(&self) -> bool {
        self.session.is_some_and(|session| session.detached)
    }

    pub fn session(&self) -> Option<&AnimationSession> {
        self.session.as_ref()
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Changes the playback rate. Elapsed time is rescaled as a whole, so the
    /// phase jumps to where the new rate would have put it.
    pub fn set_speed(&mut self, multiplier: f32) {
        if !multiplier.is_finite() || multiplier < 0.0 {
            warn!("ignoring animation speed {multiplier}");
            return;
        }
        self.speed = multiplier;
    }

    pub fn elapsed(&self, now: Duration) -> Option<f32> {
        let session = self.session.as_ref()?;
        Some(now.saturating_sub(session.started_at).as_secs_f32() * self.speed)
    }

    pub fn sample(&self, now: Duration) -> Option<(Entity, AnimationFrame)> {
        let session = self.session.as_ref().filter(|session| !session.detached)?;
        let t = self.elapsed(now)?;
        Some((session.target, session.kind.sample(&session.baseline, t)))
    }

    /// Moves the running session onto a new entity, keeping kind, start time and speed.
    pub fn retarget(&mut self, target: Entity, baseline: Transform) {
        if let Some(session) = self.session.as_mut() {
            debug!("animation {} moved to {target:?}", session.kind);
            session.target = target;
            session.baseline = baseline;
            session.detached = false;
        }
    }

    /// Parks the session when `entity`, its target, was despawned. Sampling
    /// stops until [`AnimationController::retarget`] hands it a new target.
    pub fn detach(&mut self, entity: Entity) -> bool {
        match self.session.as_mut() {
            Some(session) if session.target == entity => {
                debug!("animation {} lost its target {entity:?}", session.kind);
                session.detached = true;
                true
            }
            _ => false,
        }
    }

    /// Stops and forgets everything, including the speed.
    pub fn dispose(&mut self) -> Option<Restore> {
        let restore = self.stop();
        self.speed = 1.0;
        restore
    }
}
