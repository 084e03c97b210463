#![doc = include_str!("../README.md")]

//! kstep verification engine.
//!
//! This crate orchestrates a verification run: scenario validation, system
//! construction, BMC or k-induction through a chosen solver backend,
//! counterexample extraction and replay, and result reporting.

pub mod counterexample;
pub mod pipeline;
pub mod result;
