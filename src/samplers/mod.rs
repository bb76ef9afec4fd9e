//! Minimal-sample drawing strategies.
//!
//! The estimation driver only needs uniform sampling without replacement;
//! the sampler is deterministic for a fixed seed so that whole estimation
//! runs are reproducible.

pub mod uniform;

pub use uniform::UniformSampler;
