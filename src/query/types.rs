use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Document, ID_FIELD};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    pub direction: SortDirection,
}

impl SortField {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Desc }
    }

    /// Parse `-year,title` into `[year desc, title asc]`, keeping left-to-right priority
    pub fn parse_list(list: &str) -> Vec<SortField> {
        list.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty() && *part != "-")
            .map(|part| match part.strip_prefix('-') {
                Some(field) => SortField::desc(field.trim()),
                None => SortField::asc(part),
            })
            .collect()
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            SortDirection::Asc => write!(f, "{}", self.field),
            SortDirection::Desc => write!(f, "-{}", self.field),
        }
    }
}

/// Field projection. Empty means "all fields".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl Projection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn including<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { include: fields.into_iter().map(Into::into).collect(), exclude: vec![] }
    }

    pub fn excluding<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { include: vec![], exclude: fields.into_iter().map(Into::into).collect() }
    }

    /// Parse `title,year` (inclusion) or `-summary,-actors` (exclusion)
    pub fn parse_list(list: &str) -> Self {
        let mut projection = Self::default();
        for part in list.split(',').map(str::trim).filter(|p| !p.is_empty() && *p != "-") {
            match part.strip_prefix('-') {
                Some(field) => push_unique(&mut projection.exclude, field.trim()),
                None => push_unique(&mut projection.include, part),
            }
        }
        projection
    }

    pub fn include(&self) -> &[String] {
        &self.include
    }

    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn is_inclusion(&self) -> bool {
        !self.include.is_empty()
    }

    /// Inclusion and exclusion cannot be combined, except for dropping the identity field
    pub fn is_mixed(&self) -> bool {
        self.is_inclusion() && self.exclude.iter().any(|f| f != ID_FIELD)
    }

    /// Whether the identity field survives an inclusion projection
    pub fn keeps_id(&self) -> bool {
        !self.exclude.iter().any(|f| f == ID_FIELD)
    }

    /// Fields an inclusion projection returns, identity field first
    pub fn included_fields(&self) -> Vec<String> {
        let mut fields = Vec::with_capacity(self.include.len() + 1);
        if self.keeps_id() {
            fields.push(ID_FIELD.to_string());
        }
        for field in &self.include {
            push_unique(&mut fields, field);
        }
        fields
    }

    /// Apply to an in-memory document. Callers reject mixed projections first.
    pub fn apply(&self, doc: &Document) -> Document {
        if self.is_inclusion() {
            self.included_fields()
                .into_iter()
                .filter_map(|field| doc.get(&field).map(|v| (field, v.clone())))
                .collect()
        } else {
            doc.iter()
                .filter(|(key, _)| !self.exclude.contains(key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        }
    }
}

fn push_unique(fields: &mut Vec<String>, field: &str) {
    if !fields.iter().any(|f| f == field) {
        fields.push(field.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sort_list_keeps_priority_and_direction() {
        let fields = SortField::parse_list("-year, title,,-");
        assert_eq!(fields, vec![SortField::desc("year"), SortField::asc("title")]);
        let rendered: Vec<String> = fields.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["-year", "title"]);
    }

    #[test]
    fn inclusion_always_keeps_identity() {
        let projection = Projection::parse_list("title,year");
        assert_eq!(projection.included_fields(), vec!["_id", "title", "year"]);

        let doc = json!({"_id": "a", "title": "Alien", "year": 1979, "summary": "x", "__v": 0});
        let projected = projection.apply(doc.as_object().unwrap());
        assert_eq!(json!(projected), json!({"_id": "a", "title": "Alien", "year": 1979}));
    }

    #[test]
    fn identity_can_be_dropped_from_inclusion() {
        let projection = Projection::parse_list("title,-_id");
        assert!(!projection.is_mixed());
        assert_eq!(projection.included_fields(), vec!["title"]);
    }

    #[test]
    fn exclusion_hides_named_fields() {
        let projection = Projection::excluding(["__v"]);
        let doc = json!({"_id": "a", "title": "Alien", "__v": 3});
        assert_eq!(json!(projection.apply(doc.as_object().unwrap())), json!({"_id": "a", "title": "Alien"}));
    }

    #[test]
    fn mixed_projection_is_detected() {
        assert!(Projection::parse_list("title,-summary").is_mixed());
        assert!(!Projection::parse_list("-summary,-actors").is_mixed());
    }
}
