//! Per-genre aggregations over already-filtered movie documents.

use std::cmp::Ordering;

use serde_json::{json, Value};

use crate::database::eval::compare_values;
use crate::types::Document;

/// Accumulators for one genre group
#[derive(Debug, Clone)]
struct GenreGroup {
    genre: Value,
    count: u64,
    rating_total: f64,
    rating_sum: f64,
    rating_count: u64,
    min_duration: Option<f64>,
    max_duration: Option<f64>,
}

impl GenreGroup {
    fn new(genre: Value) -> Self {
        Self {
            genre,
            count: 0,
            rating_total: 0.0,
            rating_sum: 0.0,
            rating_count: 0,
            min_duration: None,
            max_duration: None,
        }
    }

    fn add(&mut self, movie: &Document) {
        self.count += 1;
        if let Some(quantity) = movie.get("ratingQuantity").and_then(Value::as_f64) {
            self.rating_total += quantity;
        }
        if let Some(average) = movie.get("ratingAverage").and_then(Value::as_f64) {
            self.rating_sum += average;
            self.rating_count += 1;
        }
        if let Some(duration) = movie.get("duration").and_then(Value::as_f64) {
            self.min_duration = Some(self.min_duration.map_or(duration, |m| m.min(duration)));
            self.max_duration = Some(self.max_duration.map_or(duration, |m| m.max(duration)));
        }
    }

    fn avg_rate(&self) -> Value {
        if self.rating_count == 0 {
            Value::Null
        } else {
            number(self.rating_sum / self.rating_count as f64)
        }
    }
}

/// One entry per genre element; documents without genres are skipped
fn group_by_genre(movies: &[Document]) -> Vec<GenreGroup> {
    let mut groups: Vec<GenreGroup> = Vec::new();
    for movie in movies {
        let genres: Vec<&Value> = match movie.get("genre") {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(Value::Null) | None => vec![],
            Some(single) => vec![single],
        };
        for genre in genres {
            match groups.iter_mut().find(|g| g.genre == *genre) {
                Some(group) => group.add(movie),
                None => {
                    let mut group = GenreGroup::new(genre.clone());
                    group.add(movie);
                    groups.push(group);
                }
            }
        }
    }
    groups
}

/// Larger groups first, then genre name
fn by_count_desc(a: &GenreGroup, b: &GenreGroup) -> Ordering {
    b.count.cmp(&a.count).then_with(|| compare_values(&a.genre, &b.genre))
}

/// Movie counts, rating totals and durations per genre, largest first, without `excluded`
pub fn genre_stats(movies: &[Document], excluded: &str) -> Vec<Value> {
    let mut groups = group_by_genre(movies);
    groups.sort_by(by_count_desc);
    groups
        .into_iter()
        .filter(|g| g.genre.as_str() != Some(excluded))
        .map(|g| {
            json!({
                "_id": g.genre,
                "num": g.count,
                "totalRatings": number(g.rating_total),
                "avgRate": g.avg_rate(),
                "minDuration": g.min_duration.map(number),
                "maxDuration": g.max_duration.map(number),
            })
        })
        .collect()
}

/// The `limit` genres with the most movies
pub fn top_genres(movies: &[Document], limit: usize) -> Vec<Value> {
    let mut groups = group_by_genre(movies);
    groups.sort_by(by_count_desc);
    groups
        .into_iter()
        .take(limit)
        .map(|g| {
            let avg_rate = g.avg_rate();
            json!({
                "_id": g.genre,
                "numMovies": g.count,
                "avgRate": avg_rate,
                "totalRatings": number(g.rating_total),
            })
        })
        .collect()
}

/// Whole numbers render without a fractional part
fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        json!(value as i64)
    } else {
        json!(value)
    }
}
