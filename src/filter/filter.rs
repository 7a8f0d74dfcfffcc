use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{FieldPath, SqlResult};
use crate::query::{FindQuery, Projection, SortField};
use crate::types::Document;

/// Builds parameterized SQL for a document table of shape `(id uuid, doc jsonb)`
pub struct Filter {
    table_name: String,
    where_data: Document,
    projection: Projection,
    order_data: Vec<SortField>,
    limit: Option<u64>,
    offset: u64,
}

impl Filter {
    pub const DOC_COLUMN: &'static str = "doc";
    pub const ID_COLUMN: &'static str = "id";

    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        Self::validate_table_name(&table_name)?;
        Ok(Self {
            table_name,
            where_data: Document::new(),
            projection: Projection::all(),
            order_data: vec![],
            limit: None,
            offset: 0,
        })
    }

    pub fn assign(&mut self, query: &FindQuery) -> Result<&mut Self, FilterError> {
        self.where_clause(query.filter.clone())?;
        self.select(query.projection.clone())?;
        self.order(query.sort.clone())?;
        self.limit(query.limit, query.skip);
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: Document) -> Result<&mut Self, FilterError> {
        // Compile once up front so malformed filters fail before any statement is built
        FilterWhere::generate(&conditions, Self::DOC_COLUMN, 0)?;
        self.where_data = conditions;
        Ok(self)
    }

    pub fn select(&mut self, projection: Projection) -> Result<&mut Self, FilterError> {
        if projection.is_mixed() {
            return Err(FilterError::InvalidProjection(
                "Cannot mix field inclusion and exclusion".to_string(),
            ));
        }
        for field in projection.include().iter().chain(projection.exclude()) {
            FieldPath::parse(field)?;
        }
        self.projection = projection;
        Ok(self)
    }

    pub fn order(&mut self, fields: Vec<SortField>) -> Result<&mut Self, FilterError> {
        FilterOrder::validate(&fields)?;
        self.order_data = fields;
        Ok(self)
    }

    pub fn limit(&mut self, limit: Option<u64>, offset: u64) -> &mut Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_clause, params) = self.where_sql(0)?;
        let order_clause = FilterOrder::generate(Self::DOC_COLUMN, Self::ID_COLUMN, &self.order_data)?;

        let query = [
            format!("SELECT {} AS \"{}\"", self.build_select_clause(), Self::DOC_COLUMN),
            format!("FROM \"{}\"", self.table_name),
            format!("WHERE {}", where_clause),
            order_clause,
            self.build_limit_clause(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Ok(SqlResult { query, params })
    }

    pub fn to_count_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_clause, params) = self.where_sql(0)?;
        let query = format!(
            "SELECT COUNT(*) AS count FROM \"{}\" WHERE {}",
            self.table_name, where_clause
        );
        Ok(SqlResult { query, params })
    }

    /// Merge `$1` into the first matching document and return the result
    pub fn to_update_one_sql(&self, patch: Document) -> Result<SqlResult, FilterError> {
        let (first_match, where_params) = self.first_match_sql(1)?;
        let query = format!(
            "UPDATE \"{table}\" SET \"{doc}\" = \"{doc}\" || $1 WHERE \"{id}\" = ({first_match}) RETURNING \"{doc}\"",
            table = self.table_name,
            doc = Self::DOC_COLUMN,
            id = Self::ID_COLUMN,
        );
        let mut params = vec![Value::Object(patch)];
        params.extend(where_params);
        Ok(SqlResult { query, params })
    }

    pub fn to_delete_one_sql(&self) -> Result<SqlResult, FilterError> {
        let (first_match, params) = self.first_match_sql(0)?;
        let query = format!(
            "DELETE FROM \"{table}\" WHERE \"{id}\" = ({first_match}) RETURNING \"{doc}\"",
            table = self.table_name,
            doc = Self::DOC_COLUMN,
            id = Self::ID_COLUMN,
        );
        Ok(SqlResult { query, params })
    }

    pub fn to_delete_many_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_clause, params) = self.where_sql(0)?;
        let query = format!("DELETE FROM \"{}\" WHERE {}", self.table_name, where_clause);
        Ok(SqlResult { query, params })
    }

    fn where_sql(&self, starting_param_index: usize) -> Result<(String, Vec<Value>), FilterError> {
        FilterWhere::generate(&self.where_data, Self::DOC_COLUMN, starting_param_index)
    }

    fn first_match_sql(&self, starting_param_index: usize) -> Result<(String, Vec<Value>), FilterError> {
        let (where_clause, params) = self.where_sql(starting_param_index)?;
        let order_clause = FilterOrder::generate(Self::DOC_COLUMN, Self::ID_COLUMN, &self.order_data)?;
        let query = format!(
            "SELECT \"{}\" FROM \"{}\" WHERE {} {} LIMIT 1",
            Self::ID_COLUMN,
            self.table_name,
            where_clause,
            order_clause
        );
        Ok((query, params))
    }

    fn validate_table_name(name: &str) -> Result<(), FilterError> {
        let mut chars = name.chars();
        let valid_start = chars
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .ok_or_else(|| FilterError::InvalidTableName("Table name cannot be empty".to_string()))?;
        if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(FilterError::InvalidTableName(format!("Invalid table name format: {}", name)));
        }
        Ok(())
    }

    fn build_select_clause(&self) -> String {
        let doc = format!("\"{}\"", Self::DOC_COLUMN);
        if self.projection.is_inclusion() {
            let keys = self
                .projection
                .included_fields()
                .iter()
                .map(|f| format!("'{}'", f))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "COALESCE((SELECT jsonb_object_agg(f.key, f.value) FROM jsonb_each({}) AS f WHERE f.key IN ({})), '{{}}'::jsonb)",
                doc, keys
            )
        } else if !self.projection.exclude().is_empty() {
            let keys = self
                .projection
                .exclude()
                .iter()
                .map(|f| format!("'{}'", f))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{} - ARRAY[{}]::text[]", doc, keys)
        } else {
            doc
        }
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), 0) => format!("LIMIT {}", to_bigint(l)),
            (Some(l), o) => format!("LIMIT {} OFFSET {}", to_bigint(l), to_bigint(o)),
            (None, 0) => String::new(),
            (None, o) => format!("OFFSET {}", to_bigint(o)),
        }
    }
}

/// LIMIT and OFFSET take a bigint; anything past it still means "no rows"
fn to_bigint(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::CollectionQuery;
    use serde_json::json;

    fn filter_for(query: &FindQuery) -> Filter {
        let mut filter = Filter::new("movies").unwrap();
        filter.assign(query).unwrap();
        filter
    }

    #[test]
    fn select_with_defaults() {
        let sql = filter_for(&FindQuery::new()).to_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT \"doc\" AS \"doc\" FROM \"movies\" WHERE 1=1 ORDER BY \"id\" ASC"
        );
        assert!(sql.params.is_empty());
    }

    #[test]
    fn select_with_exclusion_projection_and_paging() {
        let mut query = FindQuery::new();
        query
            .select(Projection::excluding(["__v"]))
            .sort(vec![SortField::desc("createdAt")])
            .skip(20)
            .limit(10);
        let sql = filter_for(&query).to_sql().unwrap();
        assert!(sql.query.starts_with("SELECT \"doc\" - ARRAY['__v']::text[] AS \"doc\""));
        assert!(sql.query.contains("ORDER BY CASE jsonb_typeof(\"doc\" -> 'createdAt')"));
        assert!(sql.query.contains("\"doc\" -> 'createdAt' DESC, \"id\" ASC"));
        assert!(sql.query.ends_with("LIMIT 10 OFFSET 20"));
    }

    #[test]
    fn inclusion_projection_keeps_identity() {
        let mut query = FindQuery::new();
        query.select(Projection::parse_list("title,year"));
        let sql = filter_for(&query).to_sql().unwrap();
        assert!(sql.query.contains("WHERE f.key IN ('_id', 'title', 'year')"));
    }

    #[test]
    fn mixed_projection_is_rejected() {
        let mut filter = Filter::new("movies").unwrap();
        let result = filter.select(Projection::parse_list("title,-summary"));
        assert!(matches!(result, Err(FilterError::InvalidProjection(_))));
    }

    #[test]
    fn update_binds_patch_before_filter_params() {
        let query = FindQuery::matching(json!({"_id": "abc"}).as_object().cloned().unwrap());
        let patch = json!({"title": "Heat"}).as_object().cloned().unwrap();
        let sql = filter_for(&query).to_update_one_sql(patch).unwrap();
        assert!(sql.query.starts_with("UPDATE \"movies\" SET \"doc\" = \"doc\" || $1 WHERE \"id\" = (SELECT \"id\""));
        assert!(sql.query.contains("jsonb_array_elements($2)"));
        assert!(sql.query.ends_with("LIMIT 1) RETURNING \"doc\""));
        assert_eq!(sql.params, vec![json!({"title": "Heat"}), json!(["abc"])]);
    }

    #[test]
    fn delete_one_targets_first_match() {
        let query = FindQuery::matching(json!({"_id": "abc"}).as_object().cloned().unwrap());
        let sql = filter_for(&query).to_delete_one_sql().unwrap();
        assert!(sql.query.starts_with("DELETE FROM \"movies\" WHERE \"id\" = (SELECT \"id\" FROM \"movies\""));
        assert!(sql.query.contains("jsonb_array_elements($1)"));
    }

    #[test]
    fn count_uses_where_clause_only() {
        let query = FindQuery::matching(json!({"year": {"$gte": 2000}}).as_object().cloned().unwrap());
        let sql = filter_for(&query).to_count_sql().unwrap();
        assert!(sql.query.starts_with("SELECT COUNT(*) AS count FROM \"movies\" WHERE EXISTS"));
        assert_eq!(sql.params, vec![json!(2000)]);
    }

    #[test]
    fn huge_offsets_stay_within_bigint() {
        let params = crate::features::QueryParams::parse("page=9223372036854775807&limit=1000");
        let features = crate::config::AppConfig::development().features;
        let query = crate::features::ApiFeatures::new(FindQuery::new(), &params, &features)
            .apply()
            .into_query();
        assert_eq!(query.skip, u64::MAX);

        let sql = filter_for(&query).to_sql().unwrap();
        assert!(sql.query.ends_with("LIMIT 1000 OFFSET 9223372036854775807"), "{}", sql.query);
    }

    #[test]
    fn validates_table_names() {
        assert!(Filter::new("movies").is_ok());
        assert!(Filter::new("_movies_2").is_ok());
        assert!(Filter::new("").is_err());
        assert!(Filter::new("1movies").is_err());
        assert!(Filter::new("movies; drop").is_err());
    }
}
