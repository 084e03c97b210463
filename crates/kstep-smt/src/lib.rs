#![doc = include_str!("../README.md")]

//! SMT encoding and solver integration for discrete-time transition systems.
//!
//! This crate provides the term language, the per-index variable arena and
//! unroller, the maritime and Euclid transition systems, bounded model
//! checking and k-induction drivers, with pluggable in-process Z3 and
//! SMT-LIB2 process backends.

pub mod backends;
pub mod bmc;
pub mod encoder;
pub mod solver;
pub mod sorts;
pub mod terms;
