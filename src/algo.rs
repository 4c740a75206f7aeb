//! The collection of implemented algorithms.

pub mod cobyla;

pub use cobyla::Cobyla;
