//! Request matching predicates.
//!
//! # Module Structure
//!
//! - `matcher_type` - The closed set of matcher types and their document keys
//! - `registry` - Pattern compilation and single-value evaluation
//! - `structured` - JSON, JSONPath, XML and XPath comparisons
//! - `field_matcher` - Field matchers, per-field specs and header specs
//! - `request` - Whole-request matcher with per-field reporting

mod field_matcher;
mod matcher_type;
mod registry;
mod request;
mod structured;

pub use field_matcher::{FieldMatcher, FieldSpec, HeaderSpec};
pub use matcher_type::{MatcherType, UnknownMatcherType};
pub use registry::{evaluate, CompiledPattern, PatternError};
pub use request::{MatcherReport, RequestField, RequestMatcher};
