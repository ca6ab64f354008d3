//! Batch loader that populates a dataset repository with climate,
//! environmental and species-occurrence reference data.

pub mod app;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod materialize;
pub mod metadata;
pub mod pipeline;
pub mod repository;
pub mod sources;
