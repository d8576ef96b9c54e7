use std::ops::Range;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use super::actor::{Actor, Locomotion};
use super::entity::{Body, EntityId, TickContext};
use super::geometry::Facing;

pub const WALK_TICKS: Range<i32> = 32..300;
pub const IDLE_TICKS_AFTER_WALK: i32 = 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveScript {
    /// Never moves.
    #[default]
    Stand,
    /// Walk in a random direction, stop for a while, repeat. Respects map edges
    /// and other entities.
    Wander,
    /// Endless random walking with no pauses, no clamping and no collision.
    Patrol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    WalkTicks,
    IdleTicks,
}

const COUNTER_COUNT: usize = 2;

impl Counter {
    const fn index(self) -> usize {
        match self {
            Counter::WalkTicks => 0,
            Counter::IdleTicks => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    values: [i32; COUNTER_COUNT],
}

impl Counters {
    pub fn get(&self, counter: Counter) -> i32 {
        self.values[counter.index()]
    }

    pub fn set(&mut self, counter: Counter, value: i32) {
        self.values[counter.index()] = value;
    }
}

#[derive(Debug, Clone)]
pub struct Npc {
    actor: Actor,
    script: MoveScript,
    rng: StdRng,
    counters: Counters,
}

impl Npc {
    /// Without a seed the generator is seeded from the OS.
    pub fn new(actor: Actor, script: MoveScript, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            actor,
            script,
            rng,
            counters: Counters::default(),
        }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub(crate) fn actor_mut(&mut self) -> &mut Actor {
        &mut self.actor
    }

    pub fn script(&self) -> MoveScript {
        self.script
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub(crate) fn step(&mut self, id: EntityId, body: &mut Body, context: &TickContext<'_>) {
        match self.script {
            MoveScript::Stand => self.actor.set_locomotion(Locomotion::Standing),
            MoveScript::Wander => self.wander(id, body, context),
            MoveScript::Patrol => self.patrol(body, context),
        }
        self.actor.animate();
    }

    fn wander(&mut self, id: EntityId, body: &mut Body, context: &TickContext<'_>) {
        let walk_ticks = self.counters.get(Counter::WalkTicks);
        if walk_ticks <= 0 {
            match self.actor.locomotion() {
                Locomotion::Standing => {
                    let idle_ticks = self.counters.get(Counter::IdleTicks);
                    if idle_ticks > 0 {
                        self.counters.set(Counter::IdleTicks, idle_ticks - 1);
                    } else {
                        self.start_walk();
                    }
                }
                Locomotion::Walking => {
                    self.actor.set_locomotion(Locomotion::Standing);
                    self.counters
                        .set(Counter::IdleTicks, IDLE_TICKS_AFTER_WALK);
                }
            }
            return;
        }

        self.counters.set(Counter::WalkTicks, walk_ticks - 1);
        if self.actor.locomotion() != Locomotion::Walking {
            return;
        }

        let before = body.position();
        let delta = self.actor.facing().unit() * context.npc_step;
        body.move_by(delta.x, delta.y);
        if body.clamp_within(context.world_size) {
            body.ran_into_obstacle = true;
        }
        if context.overlaps_other(id, &body.bounds()) {
            body.set_position(before);
            body.ran_into_obstacle = true;
        }

        if body.ran_into_obstacle {
            body.ran_into_obstacle = false;
            self.start_walk();
        }
    }

    fn patrol(&mut self, body: &mut Body, context: &TickContext<'_>) {
        let walk_ticks = self.counters.get(Counter::WalkTicks);
        if walk_ticks <= 0 {
            self.start_walk();
            return;
        }
        self.counters.set(Counter::WalkTicks, walk_ticks - 1);
        let delta = self.actor.facing().unit() * context.npc_step;
        body.move_by(delta.x, delta.y);
    }

    fn start_walk(&mut self) {
        let facing = Facing::ALL[self.rng.gen_range(0..Facing::ALL.len())];
        self.actor.set_facing(facing);
        self.actor.set_locomotion(Locomotion::Walking);
        self.counters
            .set(Counter::WalkTicks, self.rng.gen_range(WALK_TICKS));
    }
}
