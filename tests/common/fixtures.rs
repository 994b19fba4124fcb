//! Fixed catalog data shared by the movie tests

use greenlight::{db::MovieRepository, models::Movie, AppState};

use super::factories::movie;

/// Catalog used by the listing tests, in insertion order
pub fn catalog() -> Vec<Movie> {
    vec![
        movie("Moana", 2016, &["animation", "adventure"]),
        movie("Black Panther", 2018, &["action", "adventure"]),
        movie("Deadpool", 2016, &["action", "comedy"]),
        movie("The Breakfast Club", 1986, &["drama"]),
        movie("The Club", 2015, &["drama", "thriller"]),
    ]
}

/// Insert [`catalog`] and return the stored movies
pub async fn seed_catalog(state: &AppState) -> Vec<Movie> {
    let repo = MovieRepository::new(&state.db);
    let mut stored = Vec::new();
    for mut movie in catalog() {
        repo.insert(&mut movie).await.expect("insert movie");
        stored.push(movie);
    }
    stored
}
