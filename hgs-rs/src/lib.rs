//! Generator scripts and generic circuits.
//!
//! [`script`] is a small dynamically typed language used to compute the
//! arguments of a generic circuit.  [`template`] expands such circuits: each
//! instance runs its arguments script, specializes a private copy of the
//! circuit, and hands it to the [`model`] builder, which recurses into nested
//! circuits up to a fixed depth.

pub mod circuit;
pub mod cli;
pub mod config;
pub mod library;
pub mod model;
pub mod script;
pub mod template;
