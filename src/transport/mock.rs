//! In-process backend with seeded demo data
//!
//! Answers the same routes as the real service so the stores can run without a
//! server. Tests use the failure injection and the call log.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::{Method, Transport, TransportError};
use crate::model::{AuthResponse, Category, Comment, Movie, NewComment, RatingReceipt, RatingRecord, User};

pub const MOCK_TOKEN: &str = "mock_token_123456";

const POPULAR_COUNT: usize = 4;
const RECOMMENDATION_RANGE: std::ops::Range<usize> = 2..6;

/// Mutable catalogue served by [`MockBackend`]
#[derive(Clone, Debug)]
pub struct MockData {
    pub movies: Vec<Movie>,
    pub categories: Vec<Category>,
    pub comments: Vec<Comment>,
    pub rating_history: Vec<RatingRecord>,
    pub user: User,
}

pub struct MockBackend {
    latency: Duration,
    data: Mutex<MockData>,
    failures: Mutex<HashMap<(Method, String), TransportError>>,
    calls: Mutex<Vec<(Method, String)>>,
}

impl MockBackend {
    /// Seeded backend without artificial latency
    pub fn new() -> Self {
        Self::with_data(MockData::seeded())
    }

    pub fn with_data(data: MockData) -> Self {
        Self {
            latency: Duration::ZERO,
            data: Mutex::new(data),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Delay every response by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make every `method` request to `path` fail with `error` until cleared
    pub fn fail(&self, method: Method, path: &str, error: TransportError) {
        lock(&self.failures).insert((method, path.to_string()), error);
    }

    pub fn clear_failure(&self, method: Method, path: &str) {
        lock(&self.failures).remove(&(method, path.to_string()));
    }

    pub fn set_movies(&self, movies: Vec<Movie>) {
        lock(&self.data).movies = movies;
    }

    pub fn data(&self) -> MockData {
        lock(&self.data).clone()
    }

    /// Every request received so far, in order
    pub fn calls(&self) -> Vec<(Method, String)> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self, method: Method, path: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|(m, p)| *m == method && p == path)
            .count()
    }

    async fn handle(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, TransportError> {
        crate::log_api_request!(method, path, latency_ms = self.latency.as_millis() as u64);
        lock(&self.calls).push((method, path.to_string()));

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let injected = lock(&self.failures).get(&(method, path.to_string())).cloned();
        let result = match injected {
            Some(error) => Err(error),
            None => self.route(method, path, body.unwrap_or(Value::Null)),
        };
        crate::log_api_result!(method, path, result);
        result
    }

    fn route(&self, method: Method, path: &str, body: Value) -> Result<Value, TransportError> {
        // Ids arrive percent-encoded, match on the decoded segments
        let decoded: Vec<String> = path.trim_matches('/').split('/').map(decode_segment).collect();
        let segments: Vec<&str> = decoded.iter().map(String::as_str).collect();
        let mut data = lock(&self.data);

        match (method, segments.as_slice()) {
            (Method::Get, ["movies"]) => reply(path, &data.movies),
            (Method::Get, ["movies", "popular"]) => {
                let popular: Vec<&Movie> = data.movies.iter().take(POPULAR_COUNT).collect();
                reply(path, &popular)
            }
            (Method::Get, ["movies", id]) => {
                let movie = data.movies.iter().find(|m| m.id == *id);
                reply(path, &movie)
            }
            (Method::Get, ["movies", id, "comments"]) => {
                let comments: Vec<&Comment> = data.comments.iter().filter(|c| c.movie_id == *id).collect();
                reply(path, &comments)
            }
            (Method::Post, ["movies", _, "comments"]) => {
                let new_comment: NewComment = parse_body(path, body)?;
                let comment = new_comment.into_comment((data.comments.len() + 1).to_string(), Utc::now());
                data.comments.push(comment.clone());
                reply(path, &comment)
            }
            (Method::Get, ["categories"]) => reply(path, &data.categories),
            (Method::Get, ["categories", id, "movies"]) => {
                let movies: Vec<&Movie> = data.movies.iter().filter(|m| m.in_category(id)).collect();
                reply(path, &movies)
            }
            (Method::Get, ["recommendations"]) => {
                let end = RECOMMENDATION_RANGE.end.min(data.movies.len());
                let start = RECOMMENDATION_RANGE.start.min(end);
                reply(path, &data.movies[start..end])
            }
            (Method::Get, ["ratings", "history"]) => reply(path, &data.rating_history),
            (Method::Post, ["ratings"]) => reply(path, &RatingReceipt { success: true }),
            (Method::Get, ["users", "me"]) => reply(path, &data.user),
            (Method::Post, ["login"]) => reply(
                path,
                &AuthResponse {
                    token: MOCK_TOKEN.to_string(),
                    user: data.user.clone(),
                },
            ),
            (Method::Post, ["register"]) => {
                let user: User = merged(path, &data.user, body)?;
                reply(
                    path,
                    &AuthResponse {
                        token: MOCK_TOKEN.to_string(),
                        user,
                    },
                )
            }
            (Method::Put, ["users", "update"]) => {
                let user: User = merged(path, &data.user, body)?;
                reply(path, &user)
            }
            _ => Err(TransportError::status(path, 404, Some("not found"))),
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockBackend {
    async fn get(&self, path: &str) -> Result<Value, TransportError> {
        self.handle(Method::Get, path, None).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, TransportError> {
        self.handle(Method::Post, path, Some(body)).await
    }

    async fn put(&self, path: &str, body: Value) -> Result<Value, TransportError> {
        self.handle(Method::Put, path, Some(body)).await
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn decode_segment(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

fn reply<T: Serialize + ?Sized>(path: &str, value: &T) -> Result<Value, TransportError> {
    serde_json::to_value(value).map_err(|e| TransportError::Encode {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

fn parse_body<T: serde::de::DeserializeOwned>(path: &str, body: Value) -> Result<T, TransportError> {
    serde_json::from_value(body).map_err(|e| TransportError::status(path, 400, Some(&e.to_string())))
}

/// Overlay the fields of `patch` on `base`, the way the service merges partial records
fn merged<T: Serialize + serde::de::DeserializeOwned>(path: &str, base: &T, patch: Value) -> Result<T, TransportError> {
    let mut value = reply(path, base)?;
    if let (Value::Object(target), Value::Object(fields)) = (&mut value, patch) {
        for (key, field) in fields {
            target.insert(key, field);
        }
    }
    parse_body(path, value)
}

#[allow(clippy::too_many_arguments)]
fn movie(
    id: &str,
    title: &str,
    original_title: &str,
    year: i32,
    description: &str,
    poster: &str,
    backdrop: &str,
    rating: f32,
    categories: &[&str],
) -> Movie {
    Movie {
        id: id.to_string(),
        title: title.to_string(),
        original_title: Some(original_title.to_string()),
        year,
        description: description.to_string(),
        poster: format!("https://image.tmdb.org/t/p/w500/{}", poster),
        backdrop: format!("https://image.tmdb.org/t/p/w500/{}", backdrop),
        rating,
        categories: categories.iter().map(|c| c.to_string()).collect(),
    }
}

fn timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_default()
}

impl MockData {
    /// The demo catalogue
    pub fn seeded() -> Self {
        let movies = vec![
            movie("1", "肖申克的救赎", "The Shawshank Redemption", 1994,
                "两个被囚禁在肖申克监狱的男人在数年间找到慰藉和救赎。",
                "rlEE82K5m03rRZidFKNzCN67xQ2.jpg", "kXfqcdQKsToO0OUXHcrrNCHDBzO.jpg", 4.7, &["1", "2"]),
            movie("2", "教父", "The Godfather", 1972,
                "迈克尔·科莱昂试图摆脱家族犯罪业务，但发现这比他想象的要困难得多。",
                "y03tzUKvkRCYwJ5NWys4W4bnS9m.jpg", "tmU7GeKVybMWFButWEGl2M4GeiP.jpg", 4.5, &["1", "3"]),
            movie("3", "杰出公民", "El ciudadano ilustre", 1994,
                "一个获得了诺贝尔文学奖的作家，回到阔别已久的家乡，却让一系列的麻烦接踵而至。",
                "bH63pZizNIJoYCE6kkVoj1lzkK.jpg", "wGMwHYp64UV0vxXdTIIiriDfXxl.jpg", 4.6, &["1", "3"]),
            movie("4", "盗梦空间", "Inception", 2010,
                "一个熟练的窃贼能够进入他人潜意识深处，进行企业间谍活动。",
                "aBGVsKeDn5gtegkyajPGBHWev25.jpg", "8ZTVqvKDQ8emSGUEMjsS4yHAwrp.jpg", 4.4, &["4", "5"]),
            movie("5", "星际穿越", "Interstellar", 2014,
                "一队宇航员通过虫洞旅行，寻找新家园以拯救人类。",
                "v7Iib57HHgSEI9B7XYRF6qrs11T.jpg", "l33oR0mnvf20avWyIMxW02EtQxn.jpg", 4.5, &["4", "5"]),
            movie("6", "千与千寻", "Spirited Away", 2001,
                "10岁的千寻在搬家途中进入了神灵世界，不得不努力工作来解救变成猪的父母。",
                "b0c3TgnAqCfDLqzaAG2IoVxw3c4.jpg", "m4TUa2ciEWSlk37rOsjiSIvZDXE.jpg", 4.6, &["6", "7"]),
            movie("7", "这个杀手不太冷", "Léon: The Professional", 1994,
                "12岁女孩玛蒂尔达的家人被警察杀害后，她被杀手莱昂收养。",
                "jGcGdr049jROZGXS0mD78daypvr.jpg", "bguFhzIGpQdGQ6uizm07oMKbgHi.jpg", 4.4, &["1", "8"]),
            movie("8", "泰坦尼克号", "Titanic", 1997,
                "富家女罗丝与穷画家杰克在1912年命运多舛的泰坦尼克号首航上相爱。",
                "gi2X1IQHOzm53xUKCm8r1N7zvm8.jpg", "sCzcYW9h55WcesOqA12cgEr9Exw.jpg", 4.2, &["9", "10"]),
        ];

        let categories = [
            ("1", "剧情"), ("2", "犯罪"), ("3", "黑帮"), ("4", "科幻"), ("5", "冒险"),
            ("6", "动画"), ("7", "奇幻"), ("8", "动作"), ("9", "爱情"), ("10", "灾难"),
        ]
        .into_iter()
        .map(|(id, name)| Category {
            id: id.to_string(),
            name: name.to_string(),
        })
        .collect();

        let comments = vec![
            Comment {
                id: "1".into(),
                movie_id: "1".into(),
                user_id: "1".into(),
                username: "电影爱好者".into(),
                content: "这部电影太精彩了，每次看都有新的感受，演员的表演令人震撼。".into(),
                date: timestamp("2023-10-15T08:30:00Z"),
            },
            Comment {
                id: "2".into(),
                movie_id: "1".into(),
                user_id: "2".into(),
                username: "影评人".into(),
                content: "经典之作，情节设计巧妙，人物塑造深刻，值得反复观看。".into(),
                date: timestamp("2023-09-20T14:15:00Z"),
            },
        ];

        let rating_history = vec![
            RatingRecord {
                movie_id: "1".into(),
                user_id: None,
                rating: 4.5,
                date: timestamp("2023-10-01T12:30:00Z"),
            },
            RatingRecord {
                movie_id: "3".into(),
                user_id: None,
                rating: 5.0,
                date: timestamp("2023-09-15T18:45:00Z"),
            },
        ];

        let user = User {
            id: "1".into(),
            username: "测试用户".into(),
            email: "test@example.com".into(),
            gender: Some("男".into()),
            age: Some(28),
            profession: Some("technician/engineer".into()),
            avatar: Some("https://images.pexels.com/photos/1040880/pexels-photo-1040880.jpeg?auto=compress&cs=tinysrgb&w=1260&h=750&dpr=2".into()),
        };

        Self {
            movies,
            categories,
            comments,
            rating_history,
            user,
        }
    }
}
