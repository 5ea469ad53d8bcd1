//! Scene core demo
//!
//! Runs a headless scene for a few hundred logic cycles:
//! - Static rocks scattered at random positions
//! - Short-lived ship nodes spawned in waves and trimmed once expired
//! - A player ship driven through the node controller, carrying the primary camera
//! - A shadow casting sun
//!
//! Usage: `scene_demo [config.toml|config.ron]`

use std::f32::consts::PI;
use std::sync::Arc;

use rand::prelude::*;
use scene_core::foundation::logging::{self, LevelFilter};
use scene_core::foundation::time::Stopwatch;
use scene_core::prelude::*;
use scene_core::scene::DirectionalLight;

// Demo settings
const NUM_ROCKS: usize = 200;
const SHIPS_PER_WAVE: usize = 8;
const WAVE_INTERVAL: u64 = 30; // cycles
const SHIP_LIFESPAN_US: u64 = 2_000_000;
const TOTAL_CYCLES: u64 = 600;
const REPORT_INTERVAL: u64 = 100; // cycles

fn random_position(rng: &mut impl Rng, extent: f32) -> Vec3 {
    Vec3::new(
        rng.gen_range(-extent..extent),
        rng.gen_range(-extent..extent),
        rng.gen_range(-extent..extent),
    )
}

fn spawn_rocks(scene: &Scene, rng: &mut impl Rng, extent: f32) {
    for index in 0..NUM_ROCKS {
        let rock = scene.create_static_entity(&format!("rock_{index}"));
        let size = rng.gen_range(0.5..4.0);
        let mut body = rock.body();
        body.set_position(random_position(rng, extent));
        body.set_scale(size);
        body.core_mut()
            .add_visual("mesh", Arc::new(BoundedVisual::cube("rock", 1.0)));
        body.core_mut()
            .set_collision_model(Some(Arc::new(SphereModel::new(1.0))));
    }
    log::info!("Spawned {NUM_ROCKS} rocks");
}

fn spawn_wave(scene: &Scene, rng: &mut impl Rng, wave: u64, extent: f32) -> Result<(), SceneError> {
    let fleet = scene.create_node(scene.root(), &format!("wave_{wave}"), Transform::identity())?;
    for index in 0..SHIPS_PER_WAVE {
        let local = Transform::from_position(random_position(rng, extent));
        let ship = scene.create_node(fleet, &format!("ship_{index}"), local)?;
        scene.with_node_tree(|tree| {
            if let Some(node) = tree.get_mut(ship) {
                node.set_lifespan_us(Some(SHIP_LIFESPAN_US));
                node.core_mut()
                    .add_visual("hull", Arc::new(BoundedVisual::cube("hull", 0.8)));
                node.core_mut()
                    .set_collision_model(Some(Arc::new(SphereModel::new(0.8))));
            }
        });
    }
    log::debug!("Wave {wave} spawned");
    Ok(())
}

fn spawn_player(scene: &Scene) -> Result<NodeKey, SceneError> {
    let player = scene.create_node(scene.root(), "player", Transform::identity())?;
    scene.with_node_tree(|tree| {
        if let Some(node) = tree.get_mut(player) {
            node.core_mut()
                .add_camera("eye", Camera::perspective("eye", 60.0, 16.0 / 9.0, 0.1, 1000.0), true);
            node.core_mut()
                .add_visual("hull", Arc::new(BoundedVisual::cube("player", 1.0)));
            node.core_mut()
                .set_collision_model(Some(Arc::new(SphereModel::new(1.0))));
        }
    });
    scene.attach_node_controller(player)?;
    Ok(player)
}

fn spawn_sun(scene: &Scene) -> Arc<StaticEntity> {
    let sun = scene.create_static_entity("sun");
    {
        let mut body = sun.body();
        body.rotate(&Vec3::x_axis(), -PI / 3.0);
        let light = DirectionalLight::new(Vec3::new(1.0, 0.95, 0.8), 1.0, true);
        body.core_mut().add_light("sun", Light::Directional(Arc::new(light)));
    }
    sun
}

fn report(scene: &Scene) {
    let stats = scene.stats();
    log::info!(
        "cycle {} ({} ms): {} nodes, {} statics, rendering {} elements / {} sectors, physics {} elements / {} sectors",
        stats.cycle,
        scene.lifetime_ms(),
        stats.node_count,
        stats.static_entity_count,
        stats.rendering_elements,
        stats.rendering_sectors,
        stats.physics_elements,
        stats.physics_sectors,
    );
}

fn run(config: SceneConfig) -> Result<(), SceneError> {
    let extent = config.boundary * 0.9;
    let scene = Scene::new("demo", config)?;
    let mut rng = thread_rng();

    spawn_rocks(&scene, &mut rng, extent);
    let _sun = spawn_sun(&scene);
    let player = spawn_player(&scene)?;
    let camera = scene
        .primary_camera()
        .map_or_else(|| "none".to_string(), |camera| camera.name().to_string());
    log::info!("Player {player:?} spawned, primary camera: {camera}");

    let mut stopwatch = Stopwatch::start_new();
    for cycle in 0..TOTAL_CYCLES {
        if cycle % WAVE_INTERVAL == 0 {
            spawn_wave(&scene, &mut rng, cycle / WAVE_INTERVAL, extent * 0.5)?;
        }

        scene.push_control_input(ControlInput::Translate {
            delta: Vec3::new(0.0, 0.0, -0.5),
            space: TransformSpace::Local,
        });
        scene.push_control_input(ControlInput::Rotate {
            axis: Vec3::y_axis(),
            angle: 0.01,
            space: TransformSpace::Parent,
        });

        scene.process_logics();

        if (cycle + 1) % REPORT_INTERVAL == 0 {
            report(&scene);
        }
    }
    stopwatch.stop();

    let player_position = scene.with_node_tree(|tree| tree.world(player).map(|world| world.position));
    log::info!(
        "Ran {TOTAL_CYCLES} cycles in {:?}, player ended at {player_position:?}",
        stopwatch.elapsed()
    );

    scene.release_node_controller();
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_with_level(LevelFilter::Info);

    log::info!("Starting scene core demo");

    let config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading scene settings from {path}");
            SceneConfig::load_from_file(&path)?
        }
        None => SceneConfig::default(),
    };

    match run(config) {
        Ok(()) => {
            log::info!("Scene core demo completed successfully");
            Ok(())
        }
        Err(e) => {
            log::error!("Scene core demo failed: {e}");
            Err(e.into())
        }
    }
}
