//! Adapters between the outside world and the domain layer.

pub mod rest;
