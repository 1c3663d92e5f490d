use std::f32::consts::FRAC_PI_4;
use std::fmt;
use std::str::FromStr;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

mod controller;

pub use controller::{AnimationController, AnimationSession, Restore};

use crate::pipeline::{TextPipelineEvent, TextUpdatePipeline};
use crate::text_mesh::TextMesh;
use crate::Text3dSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationKind {
    Rotate,
    Float,
    Pulse,
    Wave,
}

impl AnimationKind {
    pub const ALL: [AnimationKind; 4] = [
        AnimationKind::Rotate,
        AnimationKind::Float,
        AnimationKind::Pulse,
        AnimationKind::Wave,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnimationKind::Rotate => "rotate",
            AnimationKind::Float => "float",
            AnimationKind::Pulse => "pulse",
            AnimationKind::Wave => "wave",
        }
    }

    /// Pose `t` seconds into the animation, relative to `baseline`.
    pub fn sample(&self, baseline: &Transform, t: f32) -> AnimationFrame {
        let (rx, ry, rz) = baseline.rotation.to_euler(EulerRot::XYZ);
        let mut translation = baseline.translation;
        let mut scale = baseline.scale;
        let mut emissive = None;

        let (dx, dy, dz) = match self {
            AnimationKind::Rotate => ((3.0 * t).sin() * 0.1, t, (2.1 * t).cos() * 0.05),
            AnimationKind::Float => {
                translation.y += (2.0 * t).sin() * 0.3;
                ((3.0 * t).sin() * 0.05, 0.0, 0.5 * t)
            }
            AnimationKind::Pulse => {
                let multiplier = 1.0 + (3.0 * t).sin() * 0.2;
                scale *= multiplier;
                emissive = Some(((multiplier - 1.0) * 0.5).max(0.0));
                (0.0, 1.5 * t, 0.0)
            }
            AnimationKind::Wave => {
                translation.x += (2.5 * t).sin() * 0.4;
                translation.y += (3.0 * t + FRAC_PI_4).cos() * 0.2;
                ((1.25 * t).sin() * 0.1, 0.0, (2.1 * t).cos() * 0.15)
            }
        };

        AnimationFrame {
            transform: Transform {
                translation,
                rotation: Quat::from_euler(EulerRot::XYZ, rx + dx, ry + dy, rz + dz),
                scale,
            },
            emissive,
        }
    }
}

impl fmt::Display for AnimationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnimationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnimationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown animation `{s}`"))
    }
}

/// One sampled pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationFrame {
    pub transform: Transform,
    /// Glow factor for the material, only set by pulse
    pub emissive: Option<f32>,
}

/// Drives the [`AnimationController`] for callers without direct access to it.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub enum AnimationCommand {
    Start { target: Entity, kind: AnimationKind },
    Stop,
    SetSpeed(f32),
    Dispose,
}

pub struct TextAnimationPlugin;

impl Plugin for TextAnimationPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<AnimationController>()
            .add_event::<AnimationCommand>()
            .add_systems(
                Update,
                (
                    apply_animation_commands,
                    retarget_animation,
                    animate_target.run_if(animation_running),
                )
                    .chain()
                    .in_set(Text3dSet::Animation),
            );
    }
}

fn animation_running(controller: Res<AnimationController>) -> bool {
    controller.is_active()
}

fn set_emissive(
    target: Entity,
    intensity: f32,
    text_meshes: &Query<&TextMesh>,
    materials: &mut Assets<StandardMaterial>,
) {
    let Ok(text_mesh) = text_meshes.get(target) else {
        return;
    };
    for handle in text_mesh.materials() {
        if let Some(material) = materials.get_mut(handle) {
            let base = material.base_color.to_linear();
            material.emissive = LinearRgba::rgb(
                base.red * intensity,
                base.green * intensity,
                base.blue * intensity,
            );
        }
    }
}

fn restore(
    restore: Restore,
    transforms: &mut Query<&mut Transform>,
    text_meshes: &Query<&TextMesh>,
    materials: &mut Assets<StandardMaterial>,
) {
    if let Ok(mut transform) = transforms.get_mut(restore.target) {
        *transform = restore.transform;
    }
    if restore.kind == AnimationKind::Pulse {
        set_emissive(restore.target, 0.0, text_meshes, materials);
    }
}

fn apply_animation_commands(
    mut events: EventReader<AnimationCommand>,
    mut controller: ResMut<AnimationController>,
    mut transforms: Query<&mut Transform>,
    text_meshes: Query<&TextMesh>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    time: Res<Time>,
) {
    for command in events.read() {
        let previous = match *command {
            AnimationCommand::Start { target, kind } => {
                let Ok(baseline) = transforms.get(target).copied() else {
                    warn!("cannot animate {target:?}: it has no transform");
                    continue;
                };
                controller.start(target, kind, baseline, time.elapsed())
            }
            AnimationCommand::Stop => controller.stop(),
            AnimationCommand::SetSpeed(multiplier) => {
                controller.set_speed(multiplier);
                None
            }
            AnimationCommand::Dispose => controller.dispose(),
        };
        if let Some(previous) = previous {
            restore(previous, &mut transforms, &text_meshes, &mut materials);
        }
    }
}

/// Keeps a running animation on the text after the pipeline swapped it, and
/// ends it when the text went away for good.
fn retarget_animation(
    mut events: EventReader<TextPipelineEvent>,
    mut controller: ResMut<AnimationController>,
    pipeline: Option<Res<TextUpdatePipeline>>,
) {
    for event in events.read() {
        match event {
            TextPipelineEvent::Installed {
                entity, transform, ..
            } => controller.retarget(*entity, *transform),
            TextPipelineEvent::Disposed { entity, .. } => {
                controller.detach(*entity);
            }
            TextPipelineEvent::Failed { .. } | TextPipelineEvent::Discarded { .. } => {}
        }
    }

    let replacement_pending = pipeline.is_some_and(|pipeline| pipeline.is_busy());
    if controller.is_detached() && !replacement_pending {
        debug!("animated text is gone with nothing to replace it");
        controller.stop();
    }
}

fn animate_target(
    controller: Res<AnimationController>,
    mut transforms: Query<&mut Transform>,
    text_meshes: Query<&TextMesh>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    time: Res<Time>,
) {
    let Some((target, frame)) = controller.sample(time.elapsed()) else {
        return;
    };
    if let Ok(mut transform) = transforms.get_mut(target) {
        *transform = frame.transform;
    }
    if let Some(intensity) = frame.emissive {
        set_emissive(target, intensity, &text_meshes, &mut materials);
    }
}
