//! Query-string driven list features: filtering, sorting, field selection
//! and pagination of a collection read.

pub mod api_features;
pub mod params;
pub mod types;

pub use api_features::ApiFeatures;
pub use params::{FilterValue, ParamValue, QueryParams, ReservedKey};
pub use types::{CompareOp, Condition, FilterClause, Pagination};
