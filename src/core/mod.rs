pub mod alignment;
pub mod cluster;
pub mod correspondence;
pub mod datum;
pub mod engine;
pub mod frantz;
pub mod tabulation;
pub mod types;
pub mod view;
pub mod zone;
