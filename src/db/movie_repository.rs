//! Movie catalog repository

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::{bounded, format_timestamp, parse_timestamp, StoreError};
use crate::models::{Filters, Metadata, Movie, Runtime};

#[derive(Debug, sqlx::FromRow)]
struct MovieRow {
    id: i64,
    created_at: String,
    title: String,
    year: i32,
    runtime: i32,
    genres: String,
    version: i32,
}

impl TryFrom<MovieRow> for Movie {
    type Error = StoreError;

    fn try_from(row: MovieRow) -> Result<Self, Self::Error> {
        let genres = serde_json::from_str(&row.genres)
            .map_err(|e| StoreError::Corrupt(format!("invalid genres for movie {}: {}", row.id, e)))?;

        Ok(Movie {
            id: row.id,
            created_at: parse_timestamp(&row.created_at)?,
            title: row.title,
            year: row.year,
            runtime: Runtime(row.runtime),
            genres,
            version: row.version,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ListedMovieRow {
    total: i64,
    #[sqlx(flatten)]
    movie: MovieRow,
}

fn encode_genres(genres: &[String]) -> Result<String, StoreError> {
    serde_json::to_string(genres).map_err(|e| StoreError::Corrupt(e.to_string()))
}

pub struct MovieRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MovieRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert `movie`, filling in its `id` and `version`
    pub async fn insert(&self, movie: &mut Movie) -> Result<(), StoreError> {
        let (id, version) = bounded(
            sqlx::query_as::<_, (i64, i32)>(
                r#"
                INSERT INTO movies (created_at, title, year, runtime, genres)
                VALUES (?, ?, ?, ?, ?)
                RETURNING id, version
                "#,
            )
            .bind(format_timestamp(&movie.created_at))
            .bind(&movie.title)
            .bind(movie.year)
            .bind(movie.runtime.0)
            .bind(encode_genres(&movie.genres)?)
            .fetch_one(self.pool),
        )
        .await?;

        movie.id = id;
        movie.version = version;
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<Movie, StoreError> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }

        let row = bounded(
            sqlx::query_as::<_, MovieRow>(
                r#"
                SELECT id, created_at, title, year, runtime, genres, version
                FROM movies
                WHERE id = ?
                "#,
            )
            .bind(id)
            .fetch_optional(self.pool),
        )
        .await?;

        row.ok_or(StoreError::NotFound)?.try_into()
    }

    /// Optimistic-locking update; bumps `movie.version` on success
    pub async fn update(&self, movie: &mut Movie) -> Result<(), StoreError> {
        let version = bounded(
            sqlx::query_scalar::<_, i32>(
                r#"
                UPDATE movies
                SET title = ?, year = ?, runtime = ?, genres = ?, version = version + 1
                WHERE id = ? AND version = ?
                RETURNING version
                "#,
            )
            .bind(&movie.title)
            .bind(movie.year)
            .bind(movie.runtime.0)
            .bind(encode_genres(&movie.genres)?)
            .bind(movie.id)
            .bind(movie.version)
            .fetch_optional(self.pool),
        )
        .await?;

        movie.version = version.ok_or(StoreError::EditConflict)?;
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<(), StoreError> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }

        let result = bounded(sqlx::query("DELETE FROM movies WHERE id = ?").bind(id).execute(self.pool))
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Filtered, sorted, paginated listing
    ///
    /// `title` matches case-insensitively anywhere in the title; every entry of
    /// `genres` must be present on a movie for it to match.
    pub async fn list(
        &self,
        title: &str,
        genres: &[String],
        filters: &Filters,
    ) -> Result<(Vec<Movie>, Metadata), StoreError> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT COUNT(*) OVER() AS total, id, created_at, title, year, runtime, genres, version \
             FROM movies WHERE 1 = 1",
        );

        if !title.is_empty() {
            query
                .push(" AND instr(lower(title), lower(")
                .push_bind(title.to_string())
                .push(")) > 0");
        }

        for genre in genres {
            query
                .push(" AND EXISTS (SELECT 1 FROM json_each(movies.genres) WHERE json_each.value = ")
                .push_bind(genre.clone())
                .push(")");
        }

        // sort_column only yields safelisted names
        query
            .push(" ORDER BY ")
            .push(filters.sort_column())
            .push(if filters.sort_descending() { " DESC" } else { " ASC" })
            .push(", id ASC LIMIT ")
            .push_bind(filters.limit())
            .push(" OFFSET ")
            .push_bind(filters.offset());

        let rows = bounded(query.build_query_as::<ListedMovieRow>().fetch_all(self.pool)).await?;

        let total = rows.first().map(|r| r.total).unwrap_or(0);
        let movies = rows
            .into_iter()
            .map(|r| Movie::try_from(r.movie))
            .collect::<Result<Vec<_>, _>>()?;

        Ok((movies, Metadata::calculate(total, filters.page, filters.page_size)))
    }
}
