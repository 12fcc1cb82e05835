//! Shared types, on-disk layout constants, and trait contracts for the SFS
//! filesystem engine.
//!
//! This crate draws the boundary between "what a filesystem layer looks
//! like from the outside" (`fs`, `types`) and "how bytes get in and out of
//! the backing image" (`controller`). The engine crate (`sfs-engine`)
//! depends on this crate and provides the one concrete type implementing
//! all of the traits declared here.

#![deny(missing_docs)]

pub mod controller;
pub mod error;
pub mod fs;
pub mod types;
