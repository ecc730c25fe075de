//! # olist-elt — ELT pipeline for the Olist e-commerce dataset
//!
//! Ingests the dataset's CSV files and the Brazilian public-holiday feed,
//! loads them verbatim into SQLite, runs a fixed catalog of nine analytical
//! queries, and writes one declarative chart document per result.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use olist_elt::prelude::*;
//!
//! let config = PipelineConfig::default();
//! let summary = Pipeline::new(config).run().await?;
//! println!("{} queries, {} charts", summary.queries_ok, summary.charts_written);
//! ```
//!
//! ## Stages
//!
//! | Stage     | Input                   | Output                      |
//! |-----------|-------------------------|-----------------------------|
//! | extract   | CSV dir + holiday feed  | frames keyed by table name  |
//! | load      | frames + store          | replaced tables             |
//! | transform | loaded store            | one frame per catalog entry |
//! | render    | catalog results         | one chart spec per entry    |

pub mod config;
pub mod error;
pub mod extract;
pub mod frame;
pub mod load;
pub mod pipeline;
pub mod render;
pub mod store;
pub mod transform;

pub mod prelude {
    pub use crate::config::PipelineConfig;
    pub use crate::error::{EltError, EltResult};
    pub use crate::extract::Dataset;
    pub use crate::frame::{Cell, Frame};
    pub use crate::pipeline::{Pipeline, PipelineSummary};
    pub use crate::store::Store;
    pub use crate::transform::{QueryName, QueryResult, TransformReport};
}
