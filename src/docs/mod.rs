//! # Documentation Modules
//!
//! Longer-form guidance for writing handlers that the guard layer accepts.
//!
//! ## Available Documentation
//!
//! - [`determinism`]: Why replayed handler code must be deterministic and which guard catches what
//! - [`policy`]: How strict and permissive policy decide between failing and logging
//!
//! These modules are documentation-only and do not contain executable code.

pub mod determinism;
pub mod policy;
