use serde::Deserialize;

use crate::TextureKey;

use super::geometry::{Facing, Rect, Vec2};
use super::render::Tint;

pub const WALK_CYCLE_FRAMES: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locomotion {
    Standing,
    Walking,
}

/// Sprite sheet layout an actor is cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameSet {
    /// Hand-packed player sheet, 27px wide strides with taller north/south poses.
    Avatar,
    /// Regular 48x64 grid, one row per facing.
    Townsfolk,
}

// Walk frames 0 and 2 reuse the standing column; 1 and 3 are the two stride poses.
const AVATAR_WALK_COLUMNS: [i32; WALK_CYCLE_FRAMES as usize] = [56, 104, 56, 8];
const TOWNSFOLK_WALK_COLUMNS: [i32; WALK_CYCLE_FRAMES as usize] = [48, 96, 48, 0];
const TOWNSFOLK_CELL: (i32, i32) = (48, 64);

impl FrameSet {
    /// Collision box size for actors drawn from this sheet.
    pub fn body_size(self) -> (i32, i32) {
        match self {
            FrameSet::Avatar => (31, 22),
            FrameSet::Townsfolk => (32, 32),
        }
    }

    pub fn pose(self, facing: Facing, locomotion: Locomotion, frame: u8) -> Rect {
        let frame = (frame % WALK_CYCLE_FRAMES) as usize;
        match self {
            FrameSet::Avatar => {
                let row = match facing {
                    Facing::North => 16,
                    Facing::East => 82,
                    Facing::South => 144,
                    Facing::West => 210,
                };
                match (locomotion, facing) {
                    (Locomotion::Standing, Facing::North | Facing::South) => {
                        Rect::new(56, row, 31, 47)
                    }
                    (Locomotion::Standing, Facing::East | Facing::West) => {
                        Rect::new(56, row, 27, 45)
                    }
                    (Locomotion::Walking, _) => Rect::new(AVATAR_WALK_COLUMNS[frame], row, 27, 45),
                }
            }
            FrameSet::Townsfolk => {
                let (cell_w, cell_h) = TOWNSFOLK_CELL;
                let row = match facing {
                    Facing::North => 0,
                    Facing::East => 1,
                    Facing::South => 2,
                    Facing::West => 3,
                } * cell_h;
                let column = match locomotion {
                    Locomotion::Standing => TOWNSFOLK_WALK_COLUMNS[0],
                    Locomotion::Walking => TOWNSFOLK_WALK_COLUMNS[frame],
                };
                Rect::new(column, row, cell_w, cell_h)
            }
        }
    }
}

/// Animation and presentation state shared by the player and NPCs.
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    texture: TextureKey,
    frames: FrameSet,
    facing: Facing,
    locomotion: Locomotion,
    frame: u8,
    countdown: u32,
    speed: u32,
    tint: Tint,
    screen_position: Vec2,
    source: Rect,
}

impl Actor {
    pub fn new(texture: TextureKey, frames: FrameSet, facing: Facing, speed: u32) -> Self {
        Self {
            texture,
            frames,
            facing,
            locomotion: Locomotion::Standing,
            frame: 0,
            countdown: 0,
            speed,
            tint: Tint::WHITE,
            screen_position: Vec2::ZERO,
            source: frames.pose(facing, Locomotion::Standing, 0),
        }
    }

    pub fn with_locomotion(mut self, locomotion: Locomotion) -> Self {
        self.locomotion = locomotion;
        self.source = self.frames.pose(self.facing, locomotion, self.frame);
        self
    }

    pub fn with_tint(mut self, tint: Tint) -> Self {
        self.tint = tint;
        self
    }

    pub fn texture(&self) -> &TextureKey {
        &self.texture
    }

    pub fn frames(&self) -> FrameSet {
        self.frames
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn locomotion(&self) -> Locomotion {
        self.locomotion
    }

    pub fn frame(&self) -> u8 {
        self.frame
    }

    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    pub fn speed(&self) -> u32 {
        self.speed
    }

    pub fn tint(&self) -> Tint {
        self.tint
    }

    pub fn source_rect(&self) -> Rect {
        self.source
    }

    pub fn screen_position(&self) -> Vec2 {
        self.screen_position
    }

    pub fn set_facing(&mut self, facing: Facing) {
        self.facing = facing;
    }

    pub fn set_locomotion(&mut self, locomotion: Locomotion) {
        self.locomotion = locomotion;
    }

    pub(crate) fn set_screen_position(&mut self, position: Vec2) {
        self.screen_position = position;
    }

    /// One animation tick. Only walking consumes the countdown; a zero speed
    /// advances every tick.
    pub fn animate(&mut self) {
        if self.locomotion == Locomotion::Walking {
            if self.countdown == 0 {
                self.frame = (self.frame + 1) % WALK_CYCLE_FRAMES;
                self.countdown = self.speed;
            }
            self.countdown = self.countdown.saturating_sub(1);
        }
        self.source = self.frames.pose(self.facing, self.locomotion, self.frame);
    }
}
