mod font;
mod renderer;

pub use renderer::Renderer;
