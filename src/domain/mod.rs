pub mod activation;
pub mod entity;
pub mod geometry;
pub mod grid;
pub mod moveable;
pub mod player;
pub mod tile;
pub mod water;
