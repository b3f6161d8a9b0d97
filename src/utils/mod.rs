//! Helpers for applications embedding the engine.

pub mod bootstrap;
