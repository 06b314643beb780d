pub mod canvas;
pub mod compositor;
pub mod filters;
pub mod image;
pub mod position;
pub mod shapes;
pub mod surface;
pub mod text;
