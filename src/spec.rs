pub mod load;
pub mod macros;
pub mod model;
