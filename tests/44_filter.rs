mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;

use common::{titles, TestServer};

async fn seeded() -> Result<TestServer> {
    let server = TestServer::spawn().await?;
    server.seed_catalog().await?;
    Ok(server)
}

#[tokio::test]
async fn equality_filter_on_plain_field() -> Result<()> {
    let server = seeded().await?;

    let movies = server.list("?director=Nolan&sort=title").await?;

    assert_eq!(titles(&movies), vec!["Inception", "Memento", "The Dark Knight"]);
    Ok(())
}

#[tokio::test]
async fn numeric_text_matches_numbers() -> Result<()> {
    let server = seeded().await?;

    let movies = server.list("?year=2001&sort=title").await?;

    assert_eq!(titles(&movies), vec!["Amelie", "Spirited Away"]);
    Ok(())
}

#[tokio::test]
async fn comparison_operators_build_ranges() -> Result<()> {
    let server = seeded().await?;

    let movies = server.list("?year[gte]=2001&year[lt]=2010&sort=year,title").await?;
    assert_eq!(titles(&movies), vec!["Amelie", "Spirited Away", "The Dark Knight"]);

    let long = server.list("?duration[gt]=150&sort=-duration").await?;
    assert_eq!(titles(&long), vec!["Heat", "The Dark Knight"]);

    let short = server.list("?duration[lte]=122&sort=duration").await?;
    assert_eq!(titles(&short), vec!["Memento", "Amelie"]);
    Ok(())
}

#[tokio::test]
async fn array_fields_match_any_element() -> Result<()> {
    let server = seeded().await?;

    let movies = server.list("?genre=Drama&sort=title").await?;

    assert_eq!(titles(&movies), vec!["Heat", "Spirited Away", "The Dark Knight"]);
    Ok(())
}

#[tokio::test]
async fn repeated_key_means_any_of() -> Result<()> {
    let server = seeded().await?;

    let movies = server.list("?director=Mann&director=Jeunet&sort=title").await?;

    assert_eq!(titles(&movies), vec!["Amelie", "Heat"]);
    Ok(())
}

#[tokio::test]
async fn reserved_keys_never_filter() -> Result<()> {
    let server = seeded().await?;

    let movies = server.list("?page=1&limit=50&sort=title&fields=title").await?;

    assert_eq!(movies.len(), 6);
    Ok(())
}

#[tokio::test]
async fn sort_uses_left_to_right_priority() -> Result<()> {
    let server = seeded().await?;

    let movies = server.list("?sort=-year,title&fields=title,year").await?;

    assert_eq!(
        titles(&movies),
        vec!["Inception", "The Dark Knight", "Amelie", "Spirited Away", "Memento", "Heat"]
    );
    Ok(())
}

#[tokio::test]
async fn default_order_is_stable() -> Result<()> {
    let server = seeded().await?;

    let first = titles(&server.list("").await?);
    let second = titles(&server.list("").await?);

    assert_eq!(first.len(), 6);
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn fields_project_exactly() -> Result<()> {
    let server = seeded().await?;

    let movies = server.list("?fields=title,year&sort=title").await?;

    assert_eq!(movies.len(), 6);
    for movie in &movies {
        let mut keys: Vec<&String> = movie.as_object().map(|m| m.keys().collect()).unwrap_or_default();
        keys.sort();
        assert_eq!(keys, vec!["_id", "title", "year"], "unexpected projection: {}", movie);
    }
    Ok(())
}

#[tokio::test]
async fn default_projection_hides_version() -> Result<()> {
    let server = seeded().await?;

    let movies = server.list("").await?;

    assert!(movies.iter().all(|m| m.get("__v").is_none()));
    assert!(movies.iter().all(|m| m.get("title").is_some()));
    Ok(())
}

#[tokio::test]
async fn exclusion_projection_drops_fields() -> Result<()> {
    let server = seeded().await?;

    let movies = server.list("?fields=-genre,-director").await?;

    assert_eq!(movies.len(), 6);
    for movie in &movies {
        assert!(movie.get("genre").is_none() && movie.get("director").is_none(), "{}", movie);
        assert!(movie.get("title").is_some());
    }
    Ok(())
}

#[tokio::test]
async fn mixed_projection_is_rejected() -> Result<()> {
    let server = seeded().await?;

    let (status, body) = server.get("/api/v1/movies?fields=title,-year").await?;

    assert_eq!(status, StatusCode::BAD_REQUEST, "unexpected body: {}", body);
    assert_eq!(body["status"], "fail");
    Ok(())
}

#[tokio::test]
async fn unknown_operator_is_rejected() -> Result<()> {
    let server = seeded().await?;

    let (status, body) = server.get("/api/v1/movies?title[regex]=Heat").await?;

    assert_eq!(status, StatusCode::BAD_REQUEST, "unexpected body: {}", body);
    assert_eq!(body["status"], "fail");
    Ok(())
}

#[tokio::test]
async fn pagination_skips_whole_pages() -> Result<()> {
    let server = seeded().await?;

    let page_one = server.list("?sort=year,title&limit=2").await?;
    assert_eq!(titles(&page_one), vec!["Heat", "Memento"]);

    let page_two = server.list("?sort=year,title&limit=2&page=2").await?;
    assert_eq!(titles(&page_two), vec!["Amelie", "Spirited Away"]);

    let past_end = server.list("?sort=year,title&limit=2&page=9").await?;
    assert!(past_end.is_empty());
    Ok(())
}

#[tokio::test]
async fn bad_page_and_limit_fall_back() -> Result<()> {
    let server = seeded().await?;

    let clamped = server.list("?sort=year,title&limit=2&page=0").await?;
    assert_eq!(titles(&clamped), vec!["Heat", "Memento"]);

    let defaulted = server.list("?sort=year,title&limit=lots").await?;
    assert_eq!(defaulted.len(), 6);
    Ok(())
}

#[tokio::test]
async fn results_count_matches_page() -> Result<()> {
    let server = seeded().await?;

    let (status, body) = server.get("/api/v1/movies?limit=4").await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], 4);
    assert_eq!(body["data"]["movies"].as_array().map(Vec::len), Some(4));
    assert!(body["data"]["movies"][0].get("durationInHours").map(Value::is_number).unwrap_or(false));
    Ok(())
}
