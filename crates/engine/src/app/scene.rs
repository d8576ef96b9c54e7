use tracing::info;

use crate::sim::{LoadError, RenderSink};
use crate::AppPaths;

use super::InputSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    Quit,
}

pub trait Scene {
    fn load(&mut self, paths: &AppPaths) -> Result<(), LoadError>;
    fn update(&mut self, input: &InputSnapshot) -> SceneCommand;
    fn draw(&self, sink: &mut dyn RenderSink);
    fn unload(&mut self);
    fn debug_title(&self) -> Option<String> {
        None
    }
}

/// Gates a scene so update and draw only reach it between a successful load and unload.
pub(crate) struct SceneRuntime {
    scene: Box<dyn Scene>,
    is_loaded: bool,
}

impl SceneRuntime {
    pub(crate) fn new(scene: Box<dyn Scene>) -> Self {
        Self {
            scene,
            is_loaded: false,
        }
    }

    pub(crate) fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    pub(crate) fn load(&mut self, paths: &AppPaths) -> Result<(), LoadError> {
        if self.is_loaded {
            return Ok(());
        }
        self.scene.load(paths)?;
        self.is_loaded = true;
        info!("scene_loaded");
        Ok(())
    }

    pub(crate) fn update(&mut self, input: &InputSnapshot) -> SceneCommand {
        if !self.is_loaded {
            return SceneCommand::None;
        }
        self.scene.update(input)
    }

    pub(crate) fn draw(&self, sink: &mut dyn RenderSink) {
        if self.is_loaded {
            self.scene.draw(sink);
        }
    }

    pub(crate) fn debug_title(&self) -> Option<String> {
        if !self.is_loaded {
            return None;
        }
        self.scene.debug_title()
    }

    pub(crate) fn shutdown(&mut self) {
        if self.is_loaded {
            self.scene.unload();
            self.is_loaded = false;
            info!("scene_unloaded");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::rc::Rc;
    use std::cell::RefCell;

    use super::*;
    use crate::map::MapLoadError;
    use crate::sim::{DrawList, Tint};

    #[derive(Debug, Default)]
    struct Calls {
        loads: u32,
        updates: u32,
        draws: u32,
        unloads: u32,
    }

    struct TestScene {
        calls: Rc<RefCell<Calls>>,
        fail_load: bool,
    }

    impl Scene for TestScene {
        fn load(&mut self, _paths: &AppPaths) -> Result<(), LoadError> {
            self.calls.borrow_mut().loads += 1;
            if self.fail_load {
                return Err(LoadError::Map {
                    map_id: "broken".to_string(),
                    source: MapLoadError::UnknownMap {
                        map_id: "broken".to_string(),
                    },
                });
            }
            Ok(())
        }

        fn update(&mut self, input: &InputSnapshot) -> SceneCommand {
            self.calls.borrow_mut().updates += 1;
            if input.quit_requested() {
                SceneCommand::Quit
            } else {
                SceneCommand::None
            }
        }

        fn draw(&self, sink: &mut dyn RenderSink) {
            self.calls.borrow_mut().draws += 1;
            sink.draw_text("hello", (0, 0), Tint::WHITE);
        }

        fn unload(&mut self) {
            self.calls.borrow_mut().unloads += 1;
        }

        fn debug_title(&self) -> Option<String> {
            Some("test".to_string())
        }
    }

    fn paths() -> AppPaths {
        AppPaths::from_root(PathBuf::from("/nonexistent"))
    }

    fn runtime(fail_load: bool) -> (SceneRuntime, Rc<RefCell<Calls>>) {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let scene = TestScene {
            calls: Rc::clone(&calls),
            fail_load,
        };
        (SceneRuntime::new(Box::new(scene)), calls)
    }

    #[test]
    fn unloaded_scene_receives_nothing() {
        let (mut runtime, calls) = runtime(false);
        let mut sink = DrawList::new();

        assert_eq!(runtime.update(&InputSnapshot::empty()), SceneCommand::None);
        runtime.draw(&mut sink);
        runtime.shutdown();

        assert!(runtime.debug_title().is_none());
        assert!(sink.commands().is_empty());
        let calls = calls.borrow();
        assert_eq!((calls.updates, calls.draws, calls.unloads), (0, 0, 0));
    }

    #[test]
    fn failed_load_keeps_scene_gated() {
        let (mut runtime, calls) = runtime(true);
        assert!(runtime.load(&paths()).is_err());
        assert!(!runtime.is_loaded());

        runtime.update(&InputSnapshot::empty());
        assert_eq!(calls.borrow().updates, 0);
    }

    #[test]
    fn load_is_idempotent_and_shutdown_unloads_once() {
        let (mut runtime, calls) = runtime(false);
        runtime.load(&paths()).expect("load");
        runtime.load(&paths()).expect("second load");

        let quit = InputSnapshot::new(Default::default(), Default::default(), true);
        assert_eq!(runtime.update(&quit), SceneCommand::Quit);
        let mut sink = DrawList::new();
        runtime.draw(&mut sink);
        assert_eq!(sink.commands().len(), 1);
        assert_eq!(runtime.debug_title().as_deref(), Some("test"));

        runtime.shutdown();
        runtime.shutdown();
        let calls = calls.borrow();
        assert_eq!((calls.loads, calls.unloads), (1, 1));
    }
}
