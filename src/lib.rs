//! Dataset validation and checkpoint evaluation for an X-ray report
//! generation pipeline.
//!
//! * [`pipeline::run_validation`] loads a report table, resolves its images,
//!   draws a seeded train/test split and summarises words and pixel
//!   intensities per split.
//! * [`pipeline::run_evaluation`] loads a saved checkpoint with the
//!   preprocessed splits, builds batch generators and reports what a
//!   training or evaluation run would see.
//! * [`app::XReportViewer`] plots the split histograms in a window.

pub mod app;
pub mod checkpoint;
pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod state;
pub mod ui;
