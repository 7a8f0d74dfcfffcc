use super::params::{QueryParams, ReservedKey};
use super::types::{FilterClause, Pagination};
use crate::config::FeaturesConfig;
use crate::query::{CollectionQuery, Projection, SortField};

/// Applies the query-string features of a list request to a collection query,
/// in the fixed order filter -> sort -> field selection -> pagination.
///
/// ```ignore
/// let query = ApiFeatures::new(FindQuery::new(), &params, &config.features)
///     .filter()
///     .sort()
///     .limit_fields()
///     .paginate()
///     .into_query();
/// ```
///
/// Each stage runs once; running a stage twice is not supported.
pub struct ApiFeatures<'a, Q: CollectionQuery> {
    query: Q,
    params: &'a QueryParams,
    config: &'a FeaturesConfig,
}

impl<'a, Q: CollectionQuery> ApiFeatures<'a, Q> {
    pub fn new(query: Q, params: &'a QueryParams, config: &'a FeaturesConfig) -> Self {
        Self { query, params, config }
    }

    /// Every non-reserved key becomes an equality or comparison constraint
    pub fn filter(mut self) -> Self {
        let clause = FilterClause::from_params(self.params);
        self.query.find(clause.to_engine_filter());
        self
    }

    /// Requested sort, or the configured default so page boundaries stay stable
    pub fn sort(mut self) -> Self {
        let requested = self
            .params
            .control(ReservedKey::Sort)
            .map(SortField::parse_list)
            .unwrap_or_default();

        let fields = if requested.is_empty() {
            SortField::parse_list(&self.config.default_sort)
        } else {
            requested
        };
        self.query.sort(fields);
        self
    }

    /// Requested projection, or everything except the internal fields
    pub fn limit_fields(mut self) -> Self {
        let projection = self
            .params
            .control(ReservedKey::Fields)
            .map(Projection::parse_list)
            .filter(|projection| !projection.is_empty())
            .unwrap_or_else(|| Projection::excluding(self.config.hidden_fields.iter().cloned()));
        self.query.select(projection);
        self
    }

    pub fn paginate(mut self) -> Self {
        let pagination = Pagination::from_params(self.params, self.config);
        self.query.skip(pagination.skip());
        self.query.limit(pagination.limit);
        self
    }

    /// All four stages in order
    pub fn apply(self) -> Self {
        self.filter().sort().limit_fields().paginate()
    }

    pub fn into_query(self) -> Q {
        self.query
    }
}
