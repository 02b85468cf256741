//! Client-side data and session layer for a movie browsing and rating service.
//!
//! [`ContentStore`](model::ContentStore) caches movies, categories, recommendations
//! and rating history; [`SessionStore`](model::SessionStore) owns the login state.
//! Both talk to the backend through a [`Transport`](transport::Transport) and are
//! wired together once per run by [`AppContext`](context::AppContext).

pub mod auth;
pub mod config;
pub mod context;
pub mod logging;
pub mod model;
pub mod transport;
