//! Domain records exchanged with the movie service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A movie as served by the backend
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_title: Option<String>,
    pub year: i32,
    pub description: String,
    pub poster: String,
    pub backdrop: String,
    /// Average rating, expected in `0.0..=5.0`
    pub rating: f32,
    /// Category ids. Not checked against the known categories.
    #[serde(default)]
    pub categories: Vec<String>,
}

impl Movie {
    /// Case-insensitive substring match over title, original title and description.
    ///
    /// `needle` must already be lowercased.
    pub fn matches_query(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self
                .original_title
                .as_ref()
                .is_some_and(|t| t.to_lowercase().contains(needle))
            || self.description.to_lowercase().contains(needle)
    }

    pub fn in_category(&self, category_id: &str) -> bool {
        self.categories.iter().any(|c| c == category_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

/// A user comment on a movie. `id` and `date` are assigned by the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub movie_id: String,
    pub user_id: String,
    pub username: String,
    pub content: String,
    #[serde(deserialize_with = "iso8601::deserialize")]
    pub date: DateTime<Utc>,
}

/// Comment payload before the backend has assigned an id and timestamp
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub movie_id: String,
    pub user_id: String,
    pub username: String,
    pub content: String,
}

impl NewComment {
    pub fn into_comment(self, id: String, date: DateTime<Utc>) -> Comment {
        Comment {
            id,
            movie_id: self.movie_id,
            user_id: self.user_id,
            username: self.username,
            content: self.content,
            date,
        }
    }
}

/// One entry of the current user's rating history
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingRecord {
    pub movie_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub rating: f32,
    #[serde(deserialize_with = "iso8601::deserialize")]
    pub date: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSubmission {
    pub movie_id: String,
    pub rating: f32,
}

/// Body returned by `POST /ratings`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingReceipt {
    #[serde(default)]
    pub success: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profession: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Partial user record sent to `PUT /users/update`; only set fields are serialized.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profession: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegistration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub gender: String,
    pub age: u32,
    pub profession: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

/// Body returned by `/login` and `/register`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// ISO-8601 timestamps with or without an offset. Offset-free values are read as UTC.
mod iso8601 {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, de::Error};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid ISO-8601 timestamp '{}'", raw)))
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
            return Some(t.with_timezone(&Utc));
        }
        // Naive backends send "2023-10-01T12:30:00" or "2023-10-01 12:30:00.123"
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
    }
}
