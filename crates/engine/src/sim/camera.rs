use super::geometry::{Axis, Vec2};

/// Camera regime for one axis on a given tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollZone {
    /// Map fits in the viewport; nothing scrolls.
    Pinned,
    LowEdge,
    Scrolling,
    HighEdge,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisView {
    pub offset: f32,
    pub screen: f32,
    pub zone: ScrollZone,
}

/// Scroll policy for a single axis.
///
/// Inside the scrolling zone the avatar sits at `anchor` on screen and the world
/// moves under it. Near either map edge the offset is held and the avatar walks
/// across the screen instead. The high edge starts where the offset reaches
/// `map_extent - viewport_extent`, i.e. `anchor + (viewport_extent - 2 * anchor)`
/// short of the far edge, so the screen position and offset always add up to the
/// avatar's world coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisScroll {
    map_extent: f32,
    viewport_extent: f32,
    anchor: f32,
}

impl AxisScroll {
    pub fn new(map_extent: f32, viewport_extent: f32, anchor: f32) -> Self {
        Self {
            map_extent,
            viewport_extent,
            anchor: anchor.clamp(0.0, viewport_extent.max(0.0)),
        }
    }

    pub fn scrolls(&self) -> bool {
        self.map_extent > self.viewport_extent
    }

    pub fn max_offset(&self) -> f32 {
        (self.map_extent - self.viewport_extent).max(0.0)
    }

    /// Space kept between the scrolling zone and the far map edge, beyond the
    /// anchor distance itself.
    pub fn far_margin(&self) -> f32 {
        self.viewport_extent - 2.0 * self.anchor
    }

    pub fn zone(&self, world: f32) -> ScrollZone {
        if !self.scrolls() {
            ScrollZone::Pinned
        } else if world < self.anchor {
            ScrollZone::LowEdge
        } else if world > self.map_extent - self.anchor - self.far_margin() {
            ScrollZone::HighEdge
        } else {
            ScrollZone::Scrolling
        }
    }

    pub fn view(&self, world: f32) -> AxisView {
        let zone = self.zone(world);
        let offset = match zone {
            ScrollZone::Pinned | ScrollZone::LowEdge => 0.0,
            ScrollZone::Scrolling => world - self.anchor,
            ScrollZone::HighEdge => self.max_offset(),
        };
        AxisView {
            offset,
            screen: world - offset,
            zone,
        }
    }
}

/// Both axes of the scroll policy for one loaded map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraRig {
    horizontal: AxisScroll,
    vertical: AxisScroll,
}

impl CameraRig {
    pub fn new(map_size: Vec2, viewport: Vec2, anchor: Vec2) -> Self {
        Self {
            horizontal: AxisScroll::new(map_size.x, viewport.x, anchor.x),
            vertical: AxisScroll::new(map_size.y, viewport.y, anchor.y),
        }
    }

    pub fn axis(&self, axis: Axis) -> &AxisScroll {
        match axis {
            Axis::Horizontal => &self.horizontal,
            Axis::Vertical => &self.vertical,
        }
    }

    /// Returns `(offset, screen)` for an avatar at `world`.
    pub fn follow(&self, world: Vec2) -> (Vec2, Vec2) {
        let x = self.horizontal.view(world.x);
        let y = self.vertical.view(world.y);
        (Vec2::new(x.offset, y.offset), Vec2::new(x.screen, y.screen))
    }
}
