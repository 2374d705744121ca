//! Grainflow: a granular sand automaton. Only cells in the active set are
//! evaluated each tick; resting sand goes dormant and is swept for
//! disturbances periodically.

pub mod active;
pub mod cell;
pub mod grid;
pub mod rng;
pub mod rules;
pub mod sim;
pub mod worldgen;

pub use active::ActiveSet;
pub use cell::{Cell, Material, MaterialConfig, SandVariant, Status};
pub use grid::{Grid, GridError, Pos};
pub use rng::{RandomSource, SeededRandom};
pub use sim::{SimStats, Simulation};
pub use worldgen::{WorldGenError, WorldParams};
