mod common;

use bevy::ecs::system::RunSystemOnce;
use bevy::prelude::*;
use bevy::render::camera::RenderTarget;
use proptest::prelude::*;

use bevy_extruded_text::scene::{CameraSettings, SceneCamera, SceneLight};
use bevy_extruded_text::SceneManager;
use common::{editor_app, fixture_table, settings};

fn count<F: bevy::ecs::query::QueryFilter>(app: &mut App) -> usize {
    let world = app.world_mut();
    world.query_filtered::<Entity, F>().iter(world).count()
}

#[test]
fn initializing_twice_keeps_one_camera() {
    let mut app = editor_app(settings(fixture_table()), None);
    app.update();
    assert_eq!(count::<With<SceneCamera>>(&mut app), 1);
    assert_eq!(count::<With<SceneLight>>(&mut app), 3);

    app.world_mut()
        .run_system_once(|mut commands: Commands, mut scene: ResMut<SceneManager>| {
            scene.initialize(
                &mut commands,
                RenderTarget::Image(Handle::default()),
                UVec2::new(320, 240),
            );
        });
    app.update();

    assert_eq!(count::<With<SceneCamera>>(&mut app), 1);
    assert_eq!(count::<With<SceneLight>>(&mut app), 3);
    let scene = app.world().resource::<SceneManager>();
    assert_eq!(scene.size(), Some(UVec2::new(320, 240)));
}

#[test]
fn dispose_is_idempotent() {
    let mut app = editor_app(settings(fixture_table()), None);
    app.update();

    app.world_mut()
        .run_system_once(|mut commands: Commands, mut scene: ResMut<SceneManager>| {
            scene.dispose(&mut commands);
            scene.dispose(&mut commands);
        });
    app.update();

    assert_eq!(count::<With<SceneCamera>>(&mut app), 0);
    assert_eq!(count::<With<SceneLight>>(&mut app), 0);
    let mut scene = app.world_mut().resource_mut::<SceneManager>();
    assert!(!scene.is_initialized());
    assert!(!scene.render());
}

#[test]
fn removing_an_object_takes_its_children_along() {
    let mut app = editor_app(settings(fixture_table()), None);
    app.update();

    let (parent, child) = app.world_mut().run_system_once(
        |mut commands: Commands, mut scene: ResMut<SceneManager>| {
            let parent = commands.spawn(SpatialBundle::default()).id();
            let child = commands
                .spawn(SpatialBundle::default())
                .set_parent(parent)
                .id();
            assert!(scene.add_object(&mut commands, parent));
            (parent, child)
        },
    );
    assert!(app.world().resource::<SceneManager>().contains(parent));

    let removed = app.world_mut().run_system_once(
        move |mut commands: Commands, mut scene: ResMut<SceneManager>| {
            scene.remove_object(&mut commands, parent)
        },
    );
    assert!(removed);
    assert!(app.world().get_entity(parent).is_none());
    assert!(app.world().get_entity(child).is_none());
    assert!(!app.world().resource::<SceneManager>().contains(parent));
}

#[test]
fn render_counts_frames() {
    let mut app = editor_app(settings(fixture_table()), None);
    app.update();

    let before = app.world().resource::<SceneManager>().frames_rendered();
    assert!(app.world_mut().resource_mut::<SceneManager>().render());
    app.update();
    assert_eq!(
        app.world().resource::<SceneManager>().frames_rendered(),
        before + 1
    );
}

fn camera_transform(app: &mut App) -> Transform {
    let world = app.world_mut();
    *world
        .query_filtered::<&Transform, With<SceneCamera>>()
        .single(world)
}

#[test]
fn placed_camera_reaches_the_scene() {
    let mut app = editor_app(settings(fixture_table()), None);
    app.update();

    {
        let mut scene = app.world_mut().resource_mut::<SceneManager>();
        assert!(scene.set_camera_target(Vec3::new(1.0, 2.0, 0.0)));
        assert!(scene.set_camera_position(Vec3::new(1.0, 2.0, 8.0)));
        // a camera cannot sit on its own target
        assert!(!scene.set_camera_position(Vec3::new(1.0, 2.0, 0.0)));
    }
    app.update();

    let transform = camera_transform(&mut app);
    let scene = app.world().resource::<SceneManager>();
    assert_eq!(scene.camera_distance(), 8.0);
    assert_eq!(transform, scene.camera_transform());
    assert!(transform.translation.abs_diff_eq(Vec3::new(1.0, 2.0, 8.0), 1e-5));
    assert!((*transform.forward()).abs_diff_eq(Vec3::NEG_Z, 1e-5));

    app.world_mut().resource_mut::<SceneManager>().zoom(1.0);
    app.update();

    let zoomed = camera_transform(&mut app);
    let scene = app.world().resource::<SceneManager>();
    let distance = scene.camera_distance();
    assert!(distance < 8.0);
    // zooming slides along the view axis towards the target
    assert!(zoomed
        .translation
        .abs_diff_eq(Vec3::new(1.0, 2.0, distance), 1e-5));
    assert_eq!(scene.camera_target(), Vec3::new(1.0, 2.0, 0.0));
}

proptest! {
    #[test]
    fn zoom_stays_within_limits(deltas in prop::collection::vec(-3.0f32..3.0, 0..64)) {
        let settings = CameraSettings::default();
        let mut scene = SceneManager::new(settings, Default::default());
        for delta in deltas {
            let distance = scene.zoom(delta);
            prop_assert!(distance >= settings.min_distance && distance <= settings.max_distance);
        }
    }
}
