//! Content store: cached movie-domain collections and the operations that fill them
//!
//! Every cached collection is replaced wholesale by its fetch. `is_loading` and
//! `error` are shared by all content operations, so two operations in flight at
//! the same time overwrite each other's flags.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::watch;

use super::lifecycle::{Busy, Lifecycle, StateCell};
use super::types::{Category, Comment, Movie, NewComment, RatingReceipt, RatingRecord, RatingSubmission};
use crate::transport::{self, Transport, TransportError};

/// Content operations, each with its user-facing failure message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentOp {
    FetchMovies,
    FetchPopularMovies,
    FetchCategories,
    FetchMoviesByCategory,
    GetMovie,
    FetchRecommendations,
    RateMovie,
    FetchRatingHistory,
    FetchComments,
    AddComment,
}

impl ContentOp {
    pub fn name(self) -> &'static str {
        match self {
            ContentOp::FetchMovies => "fetch_movies",
            ContentOp::FetchPopularMovies => "fetch_popular_movies",
            ContentOp::FetchCategories => "fetch_categories",
            ContentOp::FetchMoviesByCategory => "fetch_movies_by_category",
            ContentOp::GetMovie => "get_movie",
            ContentOp::FetchRecommendations => "fetch_recommendations",
            ContentOp::RateMovie => "rate_movie",
            ContentOp::FetchRatingHistory => "fetch_rating_history",
            ContentOp::FetchComments => "fetch_comments",
            ContentOp::AddComment => "add_comment",
        }
    }

    pub fn failure_message(self) -> &'static str {
        match self {
            ContentOp::FetchMovies => "获取电影列表失败",
            ContentOp::FetchPopularMovies => "获取热门电影失败",
            ContentOp::FetchCategories => "获取电影分类失败",
            ContentOp::FetchMoviesByCategory => "获取分类电影失败",
            ContentOp::GetMovie => "获取电影详情失败",
            ContentOp::FetchRecommendations => "获取推荐电影失败",
            ContentOp::RateMovie => "评分失败",
            ContentOp::FetchRatingHistory => "获取评分历史失败",
            ContentOp::FetchComments => "获取评论失败",
            ContentOp::AddComment => "添加评论失败",
        }
    }
}

/// Everything the content store caches
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContentState {
    pub all_movies: Vec<Movie>,
    pub popular_movies: Vec<Movie>,
    pub categories: Vec<Category>,
    pub recommendations: Vec<Movie>,
    pub rating_history: Vec<RatingRecord>,
    pub is_loading: bool,
    /// Message of the most recent failed operation, cleared when the next one starts
    pub error: Option<String>,
}

impl Lifecycle for ContentState {
    fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
    }
}

/// Handle to the content store; clones share the same state
#[derive(Clone)]
pub struct ContentStore {
    transport: Arc<dyn Transport>,
    state: StateCell<ContentState>,
}

impl ContentStore {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            state: StateCell::new(ContentState::default()),
        }
    }

    pub fn state(&self) -> ContentState {
        self.state.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<ContentState> {
        self.state.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.state.read(|s| s.is_loading)
    }

    pub fn error(&self) -> Option<String> {
        self.state.read(|s| s.error.clone())
    }

    pub fn all_movies(&self) -> Vec<Movie> {
        self.state.read(|s| s.all_movies.clone())
    }

    pub fn popular_movies(&self) -> Vec<Movie> {
        self.state.read(|s| s.popular_movies.clone())
    }

    pub fn categories(&self) -> Vec<Category> {
        self.state.read(|s| s.categories.clone())
    }

    pub fn recommendations(&self) -> Vec<Movie> {
        self.state.read(|s| s.recommendations.clone())
    }

    pub fn rating_history(&self) -> Vec<RatingRecord> {
        self.state.read(|s| s.rating_history.clone())
    }

    // ========================================================================
    // Cached collections
    // ========================================================================

    pub async fn fetch_movies(&self) -> bool {
        self.refresh(ContentOp::FetchMovies, "/movies", |state, movies| {
            state.all_movies = movies;
        })
        .await
    }

    pub async fn fetch_popular_movies(&self) -> bool {
        self.refresh(ContentOp::FetchPopularMovies, "/movies/popular", |state, movies| {
            state.popular_movies = movies;
        })
        .await
    }

    pub async fn fetch_categories(&self) -> bool {
        self.refresh(ContentOp::FetchCategories, "/categories", |state, categories| {
            state.categories = categories;
        })
        .await
    }

    pub async fn fetch_recommendations(&self) -> bool {
        self.refresh(ContentOp::FetchRecommendations, "/recommendations", |state, movies| {
            state.recommendations = movies;
        })
        .await
    }

    pub async fn fetch_rating_history(&self) -> bool {
        self.refresh(ContentOp::FetchRatingHistory, "/ratings/history", |state, history| {
            state.rating_history = history;
        })
        .await
    }

    /// Fetch `path` and replace one cached collection with the result.
    /// On failure the previous contents are kept.
    async fn refresh<T: DeserializeOwned>(
        &self,
        op: ContentOp,
        path: &str,
        apply: impl FnOnce(&mut ContentState, T),
    ) -> bool {
        let busy = self.state.begin(op.name(), |s| s.error = None);

        match transport::get_json::<T>(self.transport.as_ref(), path).await {
            Ok(value) => {
                busy.commit(|s| apply(s, value));
                true
            }
            Err(e) => {
                self.record_failure(&busy, op, &e);
                false
            }
        }
    }

    fn record_failure(&self, busy: &Busy<'_, ContentState>, op: ContentOp, cause: &TransportError) {
        busy.fail(cause, |s| s.error = Some(op.failure_message().to_string()));
    }

    // ========================================================================
    // Uncached reads
    // ========================================================================

    /// Movies of one category, filtered by the backend. Empty on failure.
    pub async fn fetch_movies_by_category(&self, category_id: &str) -> Vec<Movie> {
        let op = ContentOp::FetchMoviesByCategory;
        let busy = self.state.begin(op.name(), |s| s.error = None);
        let path = format!("/categories/{}/movies", urlencoding::encode(category_id));

        match transport::get_json(self.transport.as_ref(), &path).await {
            Ok(movies) => movies,
            Err(e) => {
                self.record_failure(&busy, op, &e);
                Vec::new()
            }
        }
    }

    /// A single movie. `None` both when the backend has no such movie and when the
    /// request fails; only the failure sets `error`.
    pub async fn get_movie(&self, id: &str) -> Option<Movie> {
        let op = ContentOp::GetMovie;
        let busy = self.state.begin(op.name(), |s| s.error = None);
        let path = format!("/movies/{}", urlencoding::encode(id));

        match transport::get_json::<Option<Movie>>(self.transport.as_ref(), &path).await {
            Ok(movie) => {
                if movie.is_none() {
                    tracing::debug!(movie_id = id, "Movie not found");
                }
                movie
            }
            Err(e) => {
                self.record_failure(&busy, op, &e);
                None
            }
        }
    }

    /// Comments of one movie. Never cached; empty on failure.
    pub async fn fetch_comments(&self, movie_id: &str) -> Vec<Comment> {
        let op = ContentOp::FetchComments;
        let busy = self.state.begin(op.name(), |s| s.error = None);
        let path = format!("/movies/{}/comments", urlencoding::encode(movie_id));

        match transport::get_json(self.transport.as_ref(), &path).await {
            Ok(comments) => comments,
            Err(e) => {
                self.record_failure(&busy, op, &e);
                Vec::new()
            }
        }
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Post a comment. The backend assigns id and date; nothing local is updated,
    /// so callers re-fetch comments to see it.
    pub async fn add_comment(&self, comment: NewComment) -> Option<Comment> {
        let op = ContentOp::AddComment;
        let busy = self.state.begin(op.name(), |s| s.error = None);
        let path = format!("/movies/{}/comments", urlencoding::encode(&comment.movie_id));

        match transport::post_json::<_, Comment>(self.transport.as_ref(), &path, &comment).await {
            Ok(created) => {
                tracing::info!(movie_id = %created.movie_id, comment_id = %created.id, "Comment added");
                Some(created)
            }
            Err(e) => {
                self.record_failure(&busy, op, &e);
                None
            }
        }
    }

    /// Submit a rating, then refresh the rating history.
    ///
    /// Returns whether the rating itself was accepted; a failed history refresh
    /// does not change the result.
    pub async fn rate_movie(&self, movie_id: &str, rating: f32) -> bool {
        let op = ContentOp::RateMovie;
        let busy = self.state.begin(op.name(), |s| s.error = None);
        let submission = RatingSubmission {
            movie_id: movie_id.to_string(),
            rating,
        };

        match transport::post_json::<_, RatingReceipt>(self.transport.as_ref(), "/ratings", &submission).await {
            Ok(receipt) => {
                if !receipt.success {
                    tracing::warn!(movie_id, rating, "Rating accepted without a success flag");
                }
                if !self.fetch_rating_history().await {
                    tracing::warn!(movie_id, "Rating history refresh failed after rating");
                }
                true
            }
            Err(e) => {
                self.record_failure(&busy, op, &e);
                false
            }
        }
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Case-insensitive substring search over the cached movie list.
    ///
    /// Fetches the list first when nothing is cached yet.
    pub async fn search_movies(&self, query: &str) -> Vec<Movie> {
        if self.state.read(|s| s.all_movies.is_empty()) {
            tracing::debug!(query, "Movie cache empty, fetching before search");
            self.fetch_movies().await;
        }

        let needle = query.to_lowercase();
        let results: Vec<Movie> = self.state.read(|s| {
            s.all_movies
                .iter()
                .filter(|movie| movie.matches_query(&needle))
                .cloned()
                .collect()
        });
        tracing::debug!(query, matches = results.len(), "Search completed");
        results
    }
}
