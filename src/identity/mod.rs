use once_cell::sync::Lazy;
use reqwest::header;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

// One connection pool for the whole process; clients are otherwise built
// per invocation from the configured secrets.
static HTTP: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity provider rejected the caller token")]
    Unauthorized { details: String },

    #[error("identity response did not contain a user id")]
    MissingUserId,

    #[error("identity provider refused the delete request")]
    DeleteFailed { details: String },

    #[error("identity provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid identity provider base url: {0}")]
    InvalidBaseUrl(String),
}

/// Shape of the auth server's "current user" payload. Only the id is
/// consumed; everything else the provider returns is ignored.
#[derive(Debug, Deserialize)]
struct UserRecord {
    #[serde(default)]
    id: Option<String>,
}

/// Client for the identity provider's auth API.
///
/// Wraps two endpoints: the caller-facing whoami lookup and the
/// service-role-only admin delete. The two calls within one deletion are
/// strictly sequential and never retried.
pub struct IdentityClient {
    http: reqwest::Client,
    base_url: Url,
    service_role_key: String,
}

impl IdentityClient {
    pub fn new(base_url: &str, service_role_key: &str) -> Result<Self, IdentityError> {
        let base_url =
            Url::parse(base_url).map_err(|e| IdentityError::InvalidBaseUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(IdentityError::InvalidBaseUrl(format!(
                "{} cannot serve as a base url",
                base_url
            )));
        }

        Ok(Self {
            http: HTTP.clone(),
            base_url,
            service_role_key: service_role_key.to_string(),
        })
    }

    /// Verify the caller's token and return their user id.
    ///
    /// GET {base}/auth/v1/user with the caller token as bearer credential
    /// and the service-role key as api key. A non-success status maps to
    /// `Unauthorized` with the upstream body as best-effort diagnostic; an
    /// unparseable body or a missing/empty id maps to `MissingUserId`.
    pub async fn current_user(&self, bearer_token: &str) -> Result<String, IdentityError> {
        let url = self.endpoint(&["auth", "v1", "user"]);
        let res = self
            .http
            .get(url)
            .bearer_auth(bearer_token)
            .header("apikey", &self.service_role_key)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        if !res.status().is_success() {
            let details = res.text().await.unwrap_or_default();
            return Err(IdentityError::Unauthorized { details });
        }

        let user = match res.json::<UserRecord>().await {
            Ok(user) => user,
            Err(_) => return Err(IdentityError::MissingUserId),
        };

        match user.id {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(IdentityError::MissingUserId),
        }
    }

    /// Delete a user through the admin API, authenticating with the
    /// service-role key both as api key and as bearer credential.
    pub async fn delete_user(&self, user_id: &str) -> Result<(), IdentityError> {
        let url = self.endpoint(&["auth", "v1", "admin", "users", user_id]);
        let res = self
            .http
            .delete(url)
            .bearer_auth(&self.service_role_key)
            .header("apikey", &self.service_role_key)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        if !res.status().is_success() {
            let details = res.text().await.unwrap_or_default();
            return Err(IdentityError::DeleteFailed { details });
        }

        Ok(())
    }

    // Appends segments to the base url path; each segment is
    // percent-encoded as a whole, a user id never splits into extra
    // path components.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments.iter().copied());
        }
        url
    }
}
