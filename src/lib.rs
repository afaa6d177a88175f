pub mod config;
pub mod driver;
pub mod kernel;
pub mod plan;
pub mod world;

pub use config::PilotConfig;
pub use kernel::reactor::Reactor;
