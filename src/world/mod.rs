pub mod resolver;
pub mod state;
