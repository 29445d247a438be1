//! IO layer: the ways the outside world reaches the domain. Only REST for now.

pub mod rest;

pub use rest::*;
