pub mod error;
pub mod event;
pub mod factory;
pub mod level;
pub mod loader;
pub mod step;
pub mod world;
