use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use sovreddit_types::{EntitySchema, Identity};

use crate::error::{SyncError, SyncResult};

const MODEL_API_PATH: &str = "/api/v1/model";

/// List queries against the read model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
    PostsForSubreddit { sub_sov_id: String },
    CommentsForPost { post_sov_id: String },
    UserPosts { user_sov_id: Identity },
    UserComments { user_sov_id: Identity },
    UserFeed { user_sov_id: Identity },
    UserSubreddits { user_sov_id: Identity },
    SubredditsByName { name: String },
}

/// Eventually-consistent query surface.
///
/// An empty result means "not visible yet", never an error.
#[async_trait]
pub trait ReadModel: Send + Sync {
    /// Fetch a single record by schema and primary key
    async fn fetch_value(&self, schema: EntitySchema, primary_key: &str) -> SyncResult<Option<Value>>;

    /// List the records of a relation
    async fn list_values(&self, relation: &Relation) -> SyncResult<Vec<Value>>;
}

/// Typed access on top of any [`ReadModel`]
#[async_trait]
pub trait ReadModelExt: ReadModel {
    async fn fetch_entity<T>(&self, schema: EntitySchema, primary_key: &str) -> SyncResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.fetch_value(schema, primary_key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn list<T>(&self, relation: &Relation) -> SyncResult<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.list_values(relation)
            .await?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(SyncError::from))
            .collect()
    }
}

impl<R: ReadModel + ?Sized> ReadModelExt for R {}

#[derive(Debug, Default, Deserialize)]
struct ModelPage {
    #[serde(default)]
    models: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FetchBody {
    Wrapped { data: Option<ModelPage> },
    Bare(ModelPage),
}

impl FetchBody {
    fn into_first(self) -> Option<Value> {
        let page = match self {
            FetchBody::Wrapped { data } => data.unwrap_or_default(),
            FetchBody::Bare(page) => page,
        };
        page.models.and_then(|models| models.into_iter().next())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListBody {
    Bare(Vec<Value>),
    Wrapped { data: Option<Vec<Value>> },
}

impl ListBody {
    fn into_items(self) -> Vec<Value> {
        match self {
            ListBody::Bare(items) => items,
            ListBody::Wrapped { data } => data.unwrap_or_default(),
        }
    }
}

/// HTTP client for the read-model API
#[derive(Clone)]
pub struct ReadClient {
    client: Client,
    base_url: String,
}

impl ReadClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client: Client::new(),
            base_url: format!("{}{}", base_url.trim_end_matches('/'), MODEL_API_PATH),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> SyncResult<Self> {
        self.client = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// Append percent-encoded path segments to the model API base
    fn endpoint(&self, segments: &[&str]) -> SyncResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SyncError::Internal(format!("Invalid read URL {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| SyncError::Internal(format!("Read URL {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn read_body<T: DeserializeOwned>(response: reqwest::Response) -> SyncResult<Option<T>> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(match status.as_u16() {
                408 | 429 | 500..=599 => SyncError::Network(format!("HTTP {}: {}", status, text)),
                _ => SyncError::Api(format!("HTTP {}: {}", status, text)),
            });
        }

        let text = response.text().await?;
        if text.trim().is_empty() || text.trim() == "null" {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&text)?))
    }
}

#[async_trait]
impl ReadModel for ReadClient {
    async fn fetch_value(&self, schema: EntitySchema, primary_key: &str) -> SyncResult<Option<Value>> {
        let url = self.endpoint(&["fetch", schema.as_str(), primary_key])?;
        debug!("Fetching {} {}", schema, primary_key);

        let response = self.client.get(url).send().await?;
        let body: Option<FetchBody> = Self::read_body(response).await?;
        Ok(body.and_then(FetchBody::into_first))
    }

    async fn list_values(&self, relation: &Relation) -> SyncResult<Vec<Value>> {
        let request = match relation {
            Relation::PostsForSubreddit { sub_sov_id } => self
                .client
                .post(self.endpoint(&["get_posts_for_subreddit"])?)
                .json(&json!({ "sub_sov_id": sub_sov_id })),
            Relation::CommentsForPost { post_sov_id } => self
                .client
                .post(self.endpoint(&["get_comments_for_posts"])?)
                .json(&json!({ "post_sov_id": post_sov_id })),
            Relation::UserPosts { user_sov_id } => self
                .client
                .post(self.endpoint(&["get_user_posts"])?)
                .json(&json!({ "user_sov_id": user_sov_id })),
            Relation::UserComments { user_sov_id } => self
                .client
                .post(self.endpoint(&["get_user_comments"])?)
                .json(&json!({ "user_sov_id": user_sov_id })),
            Relation::UserFeed { user_sov_id } => self
                .client
                .post(self.endpoint(&["get_user_feed"])?)
                .json(&json!({ "user_sov_id": user_sov_id })),
            Relation::UserSubreddits { user_sov_id } => self
                .client
                .get(self.endpoint(&["get_user_subs", user_sov_id.as_str()])?),
            Relation::SubredditsByName { name } => self
                .client
                .post(self.endpoint(&["search_subreddits_by_name"])?)
                .json(&json!({ "name": name })),
        };

        let response = request.send().await?;
        let body: Option<ListBody> = Self::read_body(response).await?;
        Ok(body.map(ListBody::into_items).unwrap_or_default())
    }
}
