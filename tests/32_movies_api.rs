mod common;

use anyhow::Result;
use reqwest::{header, StatusCode};
use serde_json::{json, Value};

use common::{titles, TestServer};

#[tokio::test]
async fn create_get_update_delete_round() -> Result<()> {
    let server = TestServer::spawn().await?;

    let (status, body) = server
        .post("/api/v1/movies", &json!({"title": "No Country for Old Men", "year": 2007, "duration": 122}))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
    assert_eq!(body["status"], "success");
    let movie = &body["data"]["movie"];
    let id = movie["_id"].as_str().unwrap_or_default().to_string();
    assert!(!id.is_empty(), "missing _id: {}", body);
    assert_eq!(movie["slug"], "no-country-for-old-men");
    assert_eq!(movie["durationInHours"], json!(2.0));
    assert!(movie["createdAt"].is_string());
    assert!(movie.get("__v").is_none(), "__v leaked: {}", movie);

    let (status, body) = server.get(&format!("/api/v1/movies/{}", id)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["movie"]["title"], "No Country for Old Men");

    let (status, body) = server
        .put(&format!("/api/v1/movies/{}", id), &json!({"title": "No Country", "ratingAverage": 8.1}))
        .await?;
    assert_eq!(status, StatusCode::OK, "update failed: {}", body);
    let updated = &body["data"]["updatedMovie"];
    assert_eq!(updated["slug"], "no-country");
    assert_eq!(updated["year"], 2007);
    assert_eq!(updated["ratingAverage"], json!(8.1));

    let (status, body) = server.delete(&format!("/api/v1/movies/{}", id)).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, body) = server.get(&format!("/api/v1/movies/{}", id)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "fail");
    assert_eq!(body["message"], "No movie with that ID!");
    Ok(())
}

#[tokio::test]
async fn missing_and_malformed_ids() -> Result<()> {
    let server = TestServer::spawn().await?;

    let (status, body) = server.get("/api/v1/movies/not-a-uuid").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid _id: not-a-uuid");

    let unknown = "3f2b8c1e-9d4a-4f6e-8b7a-1c2d3e4f5a6b";
    for (status, body) in [
        server.get(&format!("/api/v1/movies/{}", unknown)).await?,
        server.put(&format!("/api/v1/movies/{}", unknown), &json!({"year": 1})).await?,
        server.delete(&format!("/api/v1/movies/{}", unknown)).await?,
    ] {
        assert_eq!(status, StatusCode::NOT_FOUND, "unexpected body: {}", body);
        assert_eq!(body["message"], "No movie with that ID!");
    }
    Ok(())
}

#[tokio::test]
async fn invalid_bodies_are_rejected() -> Result<()> {
    let server = TestServer::spawn().await?;

    let (status, body) = server.post("/api/v1/movies", &json!(["Heat"])).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid data!");

    let res = server
        .client
        .post(server.url("/api/v1/movies"))
        .header(header::CONTENT_TYPE, "application/json")
        .body("{\"title\": ")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<Value>().await?;
    assert_eq!(body["code"], "INVALID_JSON");

    let (status, body) = server.post("/api/v1/movies", &json!({"title": "Heat", "__v": 7})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "System field '__v' cannot be set via API");
    assert_eq!(body["code"], "VALIDATION_ERROR");
    Ok(())
}

#[tokio::test]
async fn duplicate_title_is_a_conflict() -> Result<()> {
    let server = TestServer::spawn().await?;
    server.create_movie(json!({"title": "Heat", "year": 1995})).await?;

    let (status, body) = server.post("/api/v1/movies", &json!({"title": "Heat", "year": 2023})).await?;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "fail");
    assert_eq!(body["message"], "Duplicate field value: Heat. Please use another value!");
    Ok(())
}

#[tokio::test]
async fn request_bodies_are_sanitized() -> Result<()> {
    let server = TestServer::spawn().await?;

    let (status, body) = server
        .post(
            "/api/v1/movies",
            &json!({"title": "<b>Heat</b>", "__proto__": {"admin": true}, "cast": [{"name": "<i>Al</i>"}]}),
        )
        .await?;

    assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
    let movie = &body["data"]["movie"];
    assert_eq!(movie["title"], "&lt;b&gt;Heat&lt;/b&gt;");
    assert_eq!(movie["cast"][0]["name"], "&lt;i&gt;Al&lt;/i&gt;");
    assert!(movie.get("__proto__").is_none());
    Ok(())
}

#[tokio::test]
async fn punctuation_survives_and_stays_filterable() -> Result<()> {
    let server = TestServer::spawn().await?;

    let (status, body) = server
        .post("/api/v1/movies", &json!({"title": "Schindler's List", "summary": "Tom & Jerry / 5"}))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
    let movie = &body["data"]["movie"];
    assert_eq!(movie["title"], "Schindler's List");
    assert_eq!(movie["slug"], "schindler-s-list");
    assert_eq!(movie["summary"], "Tom & Jerry / 5");

    let found = server.list("?title=Schindler%27s%20List").await?;
    assert_eq!(titles(&found), vec!["Schindler's List"]);

    let found = server.list("?summary=Tom%20%26%20Jerry%20%2F%205").await?;
    assert_eq!(found.len(), 1);
    Ok(())
}

#[tokio::test]
async fn unreleased_movies_stay_hidden() -> Result<()> {
    let server = TestServer::spawn().await?;
    server.seed_catalog().await?;
    let hidden = server
        .create_movie(json!({"title": "Director Cut", "isReleased": false}))
        .await?;

    let all = server.list("").await?;
    assert_eq!(all.len(), 6);
    assert!(!titles(&all).iter().any(|t| t == "Unreleased Cut" || t == "Director Cut"));

    // The hook replaces a caller's own isReleased constraint
    let explicit = server.list("?isReleased=false").await?;
    assert_eq!(explicit.len(), 6);
    assert!(!titles(&explicit).iter().any(|t| t == "Unreleased Cut"));

    let (status, _) = server.get(&format!("/api/v1/movies/{}", hidden)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = server.delete(&format!("/api/v1/movies/{}", hidden)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn top_five_alias_overrides_query() -> Result<()> {
    let server = TestServer::spawn().await?;
    server.seed_catalog().await?;

    let (status, body) = server.get("/api/v1/movies/top-5?limit=50&sort=title&fields=director").await?;

    assert_eq!(status, StatusCode::OK, "unexpected body: {}", body);
    assert_eq!(body["results"], 5);
    let movies = body["data"]["movies"].as_array().cloned().unwrap_or_default();
    assert_eq!(
        titles(&movies),
        vec!["The Dark Knight", "Inception", "Spirited Away", "Memento", "Amelie"]
    );
    for movie in &movies {
        let mut keys: Vec<&String> = movie.as_object().map(|m| m.keys().collect()).unwrap_or_default();
        keys.sort();
        assert_eq!(keys, vec!["_id", "ratingAverage", "title", "year"]);
    }
    Ok(())
}

#[tokio::test]
async fn top_five_keeps_caller_filters() -> Result<()> {
    let server = TestServer::spawn().await?;
    server.seed_catalog().await?;

    let movies = {
        let (status, body) = server.get("/api/v1/movies/top-5?director=Nolan").await?;
        assert_eq!(status, StatusCode::OK);
        body["data"]["movies"].as_array().cloned().unwrap_or_default()
    };

    assert_eq!(titles(&movies), vec!["The Dark Knight", "Inception", "Memento"]);
    Ok(())
}

#[tokio::test]
async fn movie_stats_group_by_genre() -> Result<()> {
    let server = TestServer::spawn().await?;
    server.seed_catalog().await?;

    let (status, body) = server.get("/api/v1/movies/movies-stat").await?;

    assert_eq!(status, StatusCode::OK, "unexpected body: {}", body);
    let stats = body["data"]["stats"].as_array().cloned().unwrap_or_default();
    let genres: Vec<&str> = stats.iter().filter_map(|s| s["_id"].as_str()).collect();
    assert_eq!(genres, vec!["Action", "Thriller", "Animation", "Comedy", "Mystery", "Romance"]);

    let action = &stats[0];
    assert_eq!(action["num"], 2);
    assert_eq!(action["totalRatings"], 4800);
    assert_eq!(action["minDuration"], 148);
    assert_eq!(action["maxDuration"], 152);
    Ok(())
}

#[tokio::test]
async fn top_genre_for_a_year() -> Result<()> {
    let server = TestServer::spawn().await?;
    server.seed_catalog().await?;

    let (status, body) = server.get("/api/v1/movies/top-genre/2001").await?;
    assert_eq!(status, StatusCode::OK, "unexpected body: {}", body);
    let stats = body["data"]["stats"].as_array().cloned().unwrap_or_default();
    let genres: Vec<&str> = stats.iter().filter_map(|s| s["_id"].as_str()).collect();
    assert_eq!(genres, vec!["Animation", "Comedy", "Drama", "Romance"]);
    assert_eq!(stats[0]["numMovies"], 1);
    assert_eq!(stats[0]["totalRatings"], 900);

    let (status, body) = server.get("/api/v1/movies/top-genre/next-year").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "fail");
    Ok(())
}
