pub mod core;
pub mod cutoffs;
pub mod results;
pub mod roster;
pub mod subjects;
