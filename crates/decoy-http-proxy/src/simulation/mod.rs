//! Simulation documents and the canonical pair model.
//!
//! - `types` - Pairs, response templates, schema version and metadata
//! - `views` - JSON wire shapes
//! - `normalize` - v1/v2 import into the canonical model
//! - `export` - Rendering back to a document

mod export;
mod normalize;
mod types;
mod views;

pub use export::{export, export_json, EXPORTER_VERSION};
pub use normalize::{import_json, normalize};
pub use types::{Pair, ResponseTemplate, SchemaVersion, Simulation, SimulationMeta};
pub use views::SimulationView;
