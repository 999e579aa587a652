//! Data layer: report tables, sampling, text and pixel statistics, batching.
//!
//! Architecture:
//! ```text
//!  .csv / .json / .parquet       images/
//!        │                          │
//!        ▼                          │
//!   ┌──────────┐                    │
//!   │  loader   │  parse file → ReportDataset, resolve image paths
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  sample   │  seeded subset → train / test split
//!   └──────────┘
//!        │
//!        ├──────────────┬──────────────┐
//!        ▼              ▼              ▼
//!   ┌─────────┐   ┌──────────┐   ┌───────────┐
//!   │ tokens  │   │  pixels  │   │ generator │  batches for a saved model
//!   └─────────┘   └──────────┘   └───────────┘
//! ```

pub mod generator;
pub mod loader;
pub mod model;
pub mod pixels;
pub mod sample;
pub mod tokens;
