use super::error::FilterError;
use super::types::FieldPath;
use crate::query::{SortDirection, SortField};

pub struct FilterOrder;

impl FilterOrder {
    pub fn validate(fields: &[SortField]) -> Result<(), FilterError> {
        for field in fields {
            FieldPath::parse(&field.field)?;
        }
        Ok(())
    }

    /// ORDER BY over document fields. Missing fields sort lowest, and the row id
    /// breaks ties so repeated reads page identically.
    pub fn generate(column: &str, id_column: &str, fields: &[SortField]) -> Result<String, FilterError> {
        let mut parts = Vec::with_capacity(fields.len() * 3 + 1);
        for field in fields {
            let expr = FieldPath::parse(&field.field)?.to_sql(column);
            parts.extend(Self::sort_keys(&expr, field.direction));
        }
        parts.push(format!("\"{}\" ASC", id_column));
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }

    /// Kind rank first (null < string < number < boolean < array < object),
    /// then strings in byte order, then the jsonb value itself
    fn sort_keys(expr: &str, direction: SortDirection) -> [String; 3] {
        let dir = direction.to_sql();
        let nulls = match direction {
            SortDirection::Asc => "NULLS FIRST",
            SortDirection::Desc => "NULLS LAST",
        };
        [
            format!(
                "CASE jsonb_typeof({e}) WHEN 'null' THEN 0 WHEN 'string' THEN 1 WHEN 'number' THEN 2 \
                 WHEN 'boolean' THEN 3 WHEN 'array' THEN 4 WHEN 'object' THEN 5 END {dir} {nulls}",
                e = expr
            ),
            format!(
                "(CASE WHEN jsonb_typeof({e}) = 'string' THEN ({e}) #>> '{{}}' END) COLLATE \"C\" {dir}",
                e = expr
            ),
            format!("{} {}", expr, dir),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_priority_order_with_tie_breaker() {
        let sql = FilterOrder::generate("doc", "id", &SortField::parse_list("-year,title")).unwrap();
        let year = sql.find("jsonb_typeof(\"doc\" -> 'year')").unwrap();
        let title = sql.find("jsonb_typeof(\"doc\" -> 'title')").unwrap();
        assert!(year < title);
        assert!(sql.contains("WHEN 'object' THEN 5 END DESC NULLS LAST"));
        assert!(sql.contains("WHEN 'object' THEN 5 END ASC NULLS FIRST"));
        assert!(sql.ends_with("\"doc\" -> 'title' ASC, \"id\" ASC"));
    }

    #[test]
    fn strings_sort_in_byte_order() {
        let sql = FilterOrder::generate("doc", "id", &[SortField::asc("title")]).unwrap();
        assert_eq!(
            sql,
            "ORDER BY CASE jsonb_typeof(\"doc\" -> 'title') WHEN 'null' THEN 0 WHEN 'string' THEN 1 \
             WHEN 'number' THEN 2 WHEN 'boolean' THEN 3 WHEN 'array' THEN 4 WHEN 'object' THEN 5 END ASC NULLS FIRST, \
             (CASE WHEN jsonb_typeof(\"doc\" -> 'title') = 'string' THEN (\"doc\" -> 'title') #>> '{}' END) COLLATE \"C\" ASC, \
             \"doc\" -> 'title' ASC, \"id\" ASC"
        );
    }

    #[test]
    fn empty_sort_still_orders_by_id() {
        assert_eq!(FilterOrder::generate("doc", "id", &[]).unwrap(), "ORDER BY \"id\" ASC");
    }

    #[test]
    fn rejects_unsafe_sort_fields() {
        assert!(FilterOrder::validate(&[SortField::asc("year desc; --")]).is_err());
    }
}
