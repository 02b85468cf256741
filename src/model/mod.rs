//! Model module - Application state and data types
//!
//! This module contains the stores that own all non-UI application state.
//! It is organized into submodules by responsibility:
//!
//! - `types`: Domain records exchanged with the backend
//! - `lifecycle`: Observable state cell and the busy/commit/fail operation guard
//! - `content`: Movie, category, recommendation and rating caches
//! - `session`: Authentication lifecycle and current user

mod types;
mod lifecycle;
mod content;
mod session;

pub use types::{
    AuthResponse, Category, Comment, LoginCredentials, Movie, NewComment, ProfileUpdate,
    RatingReceipt, RatingRecord, RatingSubmission, User, UserRegistration,
};

pub use lifecycle::{Busy, Lifecycle, StateCell};

pub use content::{ContentOp, ContentState, ContentStore};

pub use session::{
    AuthPhase, SessionState, SessionStore, LOGIN_FALLBACK_MESSAGE, REGISTRATION_FALLBACK_MESSAGE,
};
