use engine::map::MapSource;
use engine::sim::{LoadError, RenderSink, Tint, World, WorldConfig};
use engine::{AppPaths, InputAction, InputSnapshot, Scene, SceneCommand};
use tracing::info;

use super::settings::GameSettings;

const HUD_POSITION: (i32, i32) = (8, 8);
const HUD_TINT: Tint = Tint::rgba(255, 255, 255, 255);
const MENU_BANNER: &str = "PAUSED";
const MENU_TINT: Tint = Tint::rgba(255, 224, 96, 255);

/// The walkable overworld: one map, the avatar and the configured townsfolk.
pub(crate) struct OverworldScene {
    settings: GameSettings,
    world: World,
    map_source: Box<dyn MapSource>,
    menu_open: bool,
}

impl OverworldScene {
    pub(crate) fn new(
        settings: GameSettings,
        config: WorldConfig,
        map_source: Box<dyn MapSource>,
    ) -> Self {
        let world = World::new(WorldConfig {
            show_boundaries: settings.show_boundaries,
            ..config
        });
        Self {
            settings,
            world,
            map_source,
            menu_open: false,
        }
    }

    fn hud_visible(&self) -> bool {
        self.world.show_boundaries()
    }

    fn toggle_debug_overlay(&mut self) {
        let show = !self.world.show_boundaries();
        self.world.set_show_boundaries(show);
        info!(show_boundaries = show, "debug_overlay_toggled");
    }

    fn menu_banner_position(&self) -> (i32, i32) {
        let config = self.world.config();
        let width = MENU_BANNER.len() as i32 * 8;
        ((config.viewport_width as i32 - width) / 2, config.viewport_height as i32 / 2)
    }
}

impl Scene for OverworldScene {
    fn load(&mut self, _paths: &AppPaths) -> Result<(), LoadError> {
        self.menu_open = false;
        self.world.load(
            &*self.map_source,
            &self.settings.map_id,
            &self.settings.cast,
        )
    }

    fn update(&mut self, input: &InputSnapshot) -> SceneCommand {
        if input.quit_requested() {
            return SceneCommand::Quit;
        }
        if input.newly_pressed(InputAction::DebugOverlay) {
            self.toggle_debug_overlay();
        }
        if input.newly_pressed(InputAction::Menu) {
            self.menu_open = !self.menu_open;
        } else if self.menu_open && input.newly_pressed(InputAction::Cancel) {
            self.menu_open = false;
        }

        if self.menu_open {
            self.world.update(&input.with_movement_frozen());
        } else {
            self.world.update(input);
        }
        SceneCommand::None
    }

    fn draw(&self, sink: &mut dyn RenderSink) {
        self.world.draw(sink);
        if self.hud_visible() {
            if let Some(line) = self.world.debug_line() {
                sink.draw_text(&line, HUD_POSITION, HUD_TINT);
            }
        }
        if self.menu_open {
            sink.draw_text(MENU_BANNER, self.menu_banner_position(), MENU_TINT);
        }
    }

    fn unload(&mut self) {
        self.menu_open = false;
        self.world.unload();
    }

    fn debug_title(&self) -> Option<String> {
        let map_id = self.world.map_id()?;
        match self.world.debug_line() {
            Some(line) if self.hud_visible() => Some(format!("Overworld [{map_id}] {line}")),
            _ => Some(format!("Overworld [{map_id}]")),
        }
    }
}
