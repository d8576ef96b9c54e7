mod input;
mod loop_runner;
mod rendering;
mod scene;

pub use input::{ActionStates, ButtonState, InputAction, InputSnapshot};
pub use loop_runner::{run_app, AppError, LoopConfig};
pub use rendering::Renderer;
pub use scene::{Scene, SceneCommand};
