//! Property tests for archetype/world operations.
//!
//! These generate random sequences of spawn/destroy/add/remove ops and
//! verify that structural invariants hold after each step.

use ecs_core::command::CreateRecord;
use ecs_core::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Clone, PartialEq)]
struct Pos {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct Vel {
    dx: f32,
    dy: f32,
}

#[derive(Debug, Clone)]
enum EcsOp {
    SpawnPos(f32, f32),
    SpawnPosVel(f32, f32, f32, f32),
    Despawn(usize),
    InsertVel(usize, f32, f32),
    RemoveVel(usize),
    QueryPos,
    QueryPosVel,
}

fn finite_f32() -> impl Strategy<Value = f32> {
    (-1_000_000i32..1_000_000i32).prop_map(|v| v as f32 * 0.01)
}

fn ecs_op_strategy() -> impl Strategy<Value = EcsOp> {
    prop_oneof![
        (finite_f32(), finite_f32()).prop_map(|(x, y)| EcsOp::SpawnPos(x, y)),
        (finite_f32(), finite_f32(), finite_f32(), finite_f32())
            .prop_map(|(x, y, dx, dy)| EcsOp::SpawnPosVel(x, y, dx, dy)),
        (0..100usize).prop_map(EcsOp::Despawn),
        (0..100usize, finite_f32(), finite_f32()).prop_map(|(i, dx, dy)| EcsOp::InsertVel(i, dx, dy)),
        (0..100usize).prop_map(EcsOp::RemoveVel),
        Just(EcsOp::QueryPos),
        Just(EcsOp::QueryPosVel),
    ]
}

fn new_world() -> (World, ComponentTypeId, ComponentTypeId) {
    let registry = ComponentTypeRegistry::new();
    let pos = registry.register::<Pos>();
    let vel = registry.register::<Vel>();
    (World::new(registry), pos, vel)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    #[test]
    fn ecs_random_ops_preserve_invariants(ops in prop::collection::vec(ecs_op_strategy(), 1..50)) {
        let (mut world, pos, vel) = new_world();
        let mut alive: Vec<Entity> = Vec::new();

        for op in ops {
            match op {
                EcsOp::SpawnPos(x, y) => {
                    let e = world.spawn_from_record(CreateRecord {
                        components: vec![(pos, Box::new(Pos { x, y }))],
                    });
                    alive.push(e);
                }
                EcsOp::SpawnPosVel(x, y, dx, dy) => {
                    let e = world.spawn_from_record(CreateRecord {
                        components: vec![(pos, Box::new(Pos { x, y })), (vel, Box::new(Vel { dx, dy }))],
                    });
                    alive.push(e);
                }
                EcsOp::Despawn(idx) => {
                    if !alive.is_empty() {
                        let idx = idx % alive.len();
                        let e = alive.remove(idx);
                        world.destroy(e);
                    }
                }
                EcsOp::InsertVel(idx, dx, dy) => {
                    if !alive.is_empty() {
                        let idx = idx % alive.len();
                        world.queue_add_component(alive[idx], vel, Box::new(Vel { dx, dy }));
                        world.apply_pending_component_ops();
                    }
                }
                EcsOp::RemoveVel(idx) => {
                    if !alive.is_empty() {
                        let idx = idx % alive.len();
                        world.queue_remove_component(alive[idx], vel);
                        world.apply_pending_component_ops();
                    }
                }
                EcsOp::QueryPos => {
                    let count = world.query::<(&Pos,)>().count();
                    prop_assert!(count <= alive.len());
                }
                EcsOp::QueryPosVel => {
                    let count = world.query::<(&Pos, &Vel)>().count();
                    prop_assert!(count <= alive.len());
                }
            }

            prop_assert_eq!(world.alive_count(), alive.len());
            for &e in &alive {
                prop_assert!(world.is_alive(e));
            }
            prop_assert!(world.debug_validate());
        }
    }

    /// After destroying an entity, its old handle must never be reported
    /// alive again, even once its index is recycled by a later spawn.
    #[test]
    fn stale_entities_detected_after_destroy_and_recycle(
        spawn_count in 1..20usize,
        destroy_indices in prop::collection::vec(0..20usize, 1..10),
    ) {
        let (mut world, pos, _vel) = new_world();

        let mut entities: Vec<Entity> = Vec::new();
        for i in 0..spawn_count {
            entities.push(world.spawn_from_record(CreateRecord {
                components: vec![(pos, Box::new(Pos { x: i as f32, y: 0.0 }))],
            }));
        }

        let mut stale: Vec<Entity> = Vec::new();
        for idx in destroy_indices {
            if !entities.is_empty() {
                let idx = idx % entities.len();
                let e = entities.remove(idx);
                world.destroy(e);
                stale.push(e);
            }
        }

        for _ in 0..stale.len() {
            entities.push(world.spawn_from_record(CreateRecord {
                components: vec![(pos, Box::new(Pos { x: 999.0, y: 999.0 }))],
            }));
        }

        for &e in &stale {
            prop_assert!(!world.is_alive(e));
        }
        for &e in &entities {
            prop_assert!(world.is_alive(e));
        }
    }

    /// Adding then removing a component must migrate the entity across
    /// archetypes without disturbing components it kept throughout.
    #[test]
    fn archetype_migration_preserves_data(
        initial_x in finite_f32(),
        initial_y in finite_f32(),
        vel_dx in finite_f32(),
        vel_dy in finite_f32(),
        do_remove in proptest::bool::ANY,
    ) {
        let (mut world, pos, vel) = new_world();

        let e = world.spawn_from_record(CreateRecord {
            components: vec![(pos, Box::new(Pos { x: initial_x, y: initial_y }))],
        });

        world.queue_add_component(e, vel, Box::new(Vel { dx: vel_dx, dy: vel_dy }));
        world.apply_pending_component_ops();

        let (archetype_id, slot) = world.entities().location(e).unwrap();
        let archetype = world.archetypes().get(archetype_id);
        let stored_pos = archetype.column::<Pos>(pos).unwrap().get(slot).unwrap();
        prop_assert_eq!(stored_pos.x, initial_x);
        prop_assert_eq!(stored_pos.y, initial_y);
        let stored_vel = archetype.column::<Vel>(vel).unwrap().get(slot).unwrap();
        prop_assert_eq!(stored_vel.dx, vel_dx);
        prop_assert_eq!(stored_vel.dy, vel_dy);

        if do_remove {
            world.queue_remove_component(e, vel);
            world.apply_pending_component_ops();

            let (archetype_id, slot) = world.entities().location(e).unwrap();
            let archetype = world.archetypes().get(archetype_id);
            let stored_pos = archetype.column::<Pos>(pos).unwrap().get(slot).unwrap();
            prop_assert_eq!(stored_pos.x, initial_x);
            prop_assert_eq!(stored_pos.y, initial_y);
            prop_assert!(!archetype.signature().contains(vel));
        }
    }

    /// Entities sharing an archetype must keep independent component data.
    #[test]
    fn multiple_entities_independent_data(count in 2..50usize) {
        let (mut world, pos, _vel) = new_world();

        let mut entities = Vec::new();
        for i in 0..count {
            entities.push(world.spawn_from_record(CreateRecord {
                components: vec![(pos, Box::new(Pos { x: i as f32, y: (i * 2) as f32 }))],
            }));
        }

        for (i, &e) in entities.iter().enumerate() {
            let (archetype_id, slot) = world.entities().location(e).unwrap();
            let stored = world.archetypes().get(archetype_id).column::<Pos>(pos).unwrap().get(slot).unwrap();
            prop_assert_eq!(stored.x, i as f32);
            prop_assert_eq!(stored.y, (i * 2) as f32);
        }

        if count > 2 {
            let mid = count / 2;
            let mid_e = entities.remove(mid);
            world.destroy(mid_e);

            prop_assert_eq!(world.alive_count(), entities.len());
            for &e in &entities {
                prop_assert!(world.is_alive(e));
            }
        }
    }
}
