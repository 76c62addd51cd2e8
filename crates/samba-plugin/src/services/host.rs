//! Mattermost host API.
//!
//! The plugin reads users, channels and teams from the Mattermost server and
//! writes channel posts and ephemeral posts back to it. [`HostApi`] is the
//! seam; [`MattermostClient`] talks to the REST API v4 with a bot token and
//! [`mock::MockHost`] keeps everything in memory for tests.

use crate::errors::PluginError;
use crate::models::{Channel, Post, Team, User};
use reqwest::{Client, Method, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{instrument, warn};

/// Timeout for each Mattermost request in seconds.
const HOST_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Operations the plugin needs from the Mattermost server.
#[async_trait::async_trait]
pub trait HostApi: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<User, PluginError>;

    async fn get_channel(&self, channel_id: &str) -> Result<Channel, PluginError>;

    async fn get_team(&self, team_id: &str) -> Result<Team, PluginError>;

    /// Whether `user_id` belongs to `channel_id`.
    async fn is_channel_member(&self, channel_id: &str, user_id: &str)
        -> Result<bool, PluginError>;

    /// Create a channel post and return it as stored.
    async fn create_post(&self, post: Post) -> Result<Post, PluginError>;

    /// Show a post to one user only.
    async fn send_ephemeral_post(&self, user_id: &str, post: Post) -> Result<Post, PluginError>;

    /// Public base URL of the Mattermost server, if known.
    fn site_url(&self) -> Option<&str>;
}

/// Body of `POST /api/v4/posts/ephemeral`.
#[derive(Serialize)]
struct EphemeralPostRequest<'a> {
    user_id: &'a str,
    post: &'a Post,
}

/// Mattermost REST API v4 client authenticated as a bot.
#[derive(Clone)]
pub struct MattermostClient {
    client: Client,

    /// Server base URL, without a trailing slash.
    base_url: String,

    /// `{base_url}/api/v4`. Request paths are appended segment by segment.
    api_base: Url,

    bot_token: SecretString,
}

impl MattermostClient {
    /// Create a new Mattermost client.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::Internal` if the HTTP client cannot be built or
    /// `base_url` is not an http(s) URL.
    pub fn new(base_url: &str, bot_token: SecretString) -> Result<Self, PluginError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        let mut api_base = Url::parse(&base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| PluginError::Internal("invalid Mattermost server URL".to_string()))?;
        api_base
            .path_segments_mut()
            .map_err(|()| PluginError::Internal("invalid Mattermost server URL".to_string()))?
            .pop_if_empty()
            .extend(["api", "v4"]);

        let client = Client::builder()
            .timeout(Duration::from_secs(HOST_REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| {
                warn!(target: "ds.services.host", error = %e, "Failed to build HTTP client");
                PluginError::Internal("failed to build Mattermost HTTP client".to_string())
            })?;

        Ok(Self {
            client,
            base_url,
            api_base,
            bot_token,
        })
    }

    /// API URL for `segments`. Each segment is percent-encoded, so IDs
    /// cannot add path components of their own.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, PluginError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| PluginError::Internal("invalid Mattermost server URL".to_string()))?
            .extend(segments);
        Ok(url)
    }

    async fn request<B, T>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
        what: &str,
    ) -> Result<T, PluginError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(method, segments, body, what).await?;
        response.json::<T>().await.map_err(|e| {
            PluginError::HostApi(format!("failed to decode {} response: {}", what, e))
        })
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
        what: &str,
    ) -> Result<reqwest::Response, PluginError> {
        let url = self.endpoint(segments)?;

        let mut request = self
            .client
            .request(method, url)
            .header(
                "Authorization",
                format!("Bearer {}", self.bot_token.expose_secret()),
            )
            .header("Accept", "application/json");

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            warn!(target: "ds.services.host", error = %e, what, "Mattermost request failed");
            PluginError::HostApi(format!("{} failed: {}", what, e))
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PluginError::NotFound(format!("{} not found", what)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                target: "ds.services.host",
                what,
                status = status.as_u16(),
                "Mattermost returned error"
            );
            return Err(PluginError::HostApi(format!(
                "{} failed: status={}, body={}",
                what,
                status.as_u16(),
                body
            )));
        }

        Ok(response)
    }
}

#[async_trait::async_trait]
impl HostApi for MattermostClient {
    #[instrument(skip(self))]
    async fn get_user(&self, user_id: &str) -> Result<User, PluginError> {
        self.request::<(), _>(Method::GET, &["users", user_id], None, "user")
            .await
    }

    #[instrument(skip(self))]
    async fn get_channel(&self, channel_id: &str) -> Result<Channel, PluginError> {
        self.request::<(), _>(Method::GET, &["channels", channel_id], None, "channel")
            .await
    }

    #[instrument(skip(self))]
    async fn get_team(&self, team_id: &str) -> Result<Team, PluginError> {
        self.request::<(), _>(Method::GET, &["teams", team_id], None, "team")
            .await
    }

    #[instrument(skip(self))]
    async fn is_channel_member(
        &self,
        channel_id: &str,
        user_id: &str,
    ) -> Result<bool, PluginError> {
        let result = self
            .send::<()>(
                Method::GET,
                &["channels", channel_id, "members", user_id],
                None,
                "channel member",
            )
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(PluginError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip_all, fields(channel_id = %post.channel_id))]
    async fn create_post(&self, post: Post) -> Result<Post, PluginError> {
        // The server authors REST posts as the token owner; `user_id` is informational.
        self.request(Method::POST, &["posts"], Some(&post), "post")
            .await
    }

    #[instrument(skip(self, post), fields(channel_id = %post.channel_id))]
    async fn send_ephemeral_post(&self, user_id: &str, post: Post) -> Result<Post, PluginError> {
        let body = EphemeralPostRequest {
            user_id,
            post: &post,
        };
        self.request(
            Method::POST,
            &["posts", "ephemeral"],
            Some(&body),
            "ephemeral post",
        )
        .await
    }

    fn site_url(&self) -> Option<&str> {
        Some(&self.base_url)
    }
}

/// In-memory host for tests.
pub mod mock {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Mutex, MutexGuard};

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mock Mattermost server.
    #[derive(Default)]
    pub struct MockHost {
        users: HashMap<String, User>,
        channels: HashMap<String, Channel>,
        teams: HashMap<String, Team>,
        site_url: Option<String>,

        /// `(channel_id, user_id)` pairs that are not members. Everyone else is.
        non_members: HashSet<(String, String)>,

        /// Whether `create_post` should fail.
        fail_posts: AtomicBool,

        posts: Mutex<Vec<Post>>,
        ephemeral_posts: Mutex<Vec<(String, Post)>>,
        create_post_calls: AtomicUsize,
        next_post_id: AtomicUsize,
    }

    impl MockHost {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_user(mut self, user: User) -> Self {
            self.users.insert(user.id.clone(), user);
            self
        }

        pub fn with_channel(mut self, channel: Channel) -> Self {
            self.channels.insert(channel.id.clone(), channel);
            self
        }

        pub fn with_team(mut self, team: Team) -> Self {
            self.teams.insert(team.id.clone(), team);
            self
        }

        pub fn with_site_url(mut self, site_url: &str) -> Self {
            self.site_url = Some(site_url.to_string());
            self
        }

        pub fn with_non_member(mut self, channel_id: &str, user_id: &str) -> Self {
            self.non_members
                .insert((channel_id.to_string(), user_id.to_string()));
            self
        }

        /// Make every `create_post` call fail from now on.
        pub fn fail_posts(&self) {
            self.fail_posts.store(true, Ordering::SeqCst);
        }

        /// Channel posts created so far.
        pub fn posts(&self) -> Vec<Post> {
            lock(&self.posts).clone()
        }

        /// Ephemeral posts sent so far, with their recipient.
        pub fn ephemeral_posts(&self) -> Vec<(String, Post)> {
            lock(&self.ephemeral_posts).clone()
        }

        /// Number of `create_post` attempts, failed ones included.
        pub fn create_post_calls(&self) -> usize {
            self.create_post_calls.load(Ordering::SeqCst)
        }

        fn assign_id(&self, mut post: Post) -> Post {
            if post.id.is_empty() {
                let n = self.next_post_id.fetch_add(1, Ordering::SeqCst);
                post.id = format!("post-{}", n + 1);
            }
            post
        }
    }

    #[async_trait::async_trait]
    impl HostApi for MockHost {
        async fn get_user(&self, user_id: &str) -> Result<User, PluginError> {
            self.users
                .get(user_id)
                .cloned()
                .ok_or_else(|| PluginError::NotFound("user not found".to_string()))
        }

        async fn get_channel(&self, channel_id: &str) -> Result<Channel, PluginError> {
            self.channels
                .get(channel_id)
                .cloned()
                .ok_or_else(|| PluginError::NotFound("channel not found".to_string()))
        }

        async fn get_team(&self, team_id: &str) -> Result<Team, PluginError> {
            self.teams
                .get(team_id)
                .cloned()
                .ok_or_else(|| PluginError::NotFound("team not found".to_string()))
        }

        async fn is_channel_member(
            &self,
            channel_id: &str,
            user_id: &str,
        ) -> Result<bool, PluginError> {
            let key = (channel_id.to_string(), user_id.to_string());
            Ok(!self.non_members.contains(&key))
        }

        async fn create_post(&self, post: Post) -> Result<Post, PluginError> {
            self.create_post_calls.fetch_add(1, Ordering::SeqCst);

            if self.fail_posts.load(Ordering::SeqCst) {
                return Err(PluginError::HostApi(
                    "post failed: status=500, body=mock failure".to_string(),
                ));
            }

            let post = self.assign_id(post);
            lock(&self.posts).push(post.clone());
            Ok(post)
        }

        async fn send_ephemeral_post(
            &self,
            user_id: &str,
            post: Post,
        ) -> Result<Post, PluginError> {
            let post = self.assign_id(post);
            lock(&self.ephemeral_posts).push((user_id.to_string(), post.clone()));
            Ok(post)
        }

        fn site_url(&self) -> Option<&str> {
            self.site_url.as_deref()
        }
    }

}
