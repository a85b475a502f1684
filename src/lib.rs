//! Configuration engine and stage execution for mzkit pipeline runs.
//!
//! Layers, leaf first:
//! - config: JSON document, schema checks, dot-path overrides, parameter resolution
//! - pipeline: per-stage execution and run-level coordination
//! - invoke: the process-backed module runner (`bin` and `R` modules)
//! - settings / report: run folder bootstrap and the success report

pub mod config;
pub mod error;
pub mod invoke;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod settings;

pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
pub(crate) mod testing;
