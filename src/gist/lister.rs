use anyhow::Result;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, LINK, USER_AGENT};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::GistRecord;
use super::link::{LinkError, next_link};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Basic-auth pair used for listing requests and for fetching private gists.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Why a listing run produced no gists.
///
/// Any of these aborts the whole listing; records from pages that were
/// already read are dropped.
#[derive(Debug, Error)]
pub enum ListError {
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("listing {url} returned {status}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },
    #[error("listing {url} returned a body that is not a gist array")]
    Body {
        url: String,
        body: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("listing {url} returned a bad Link header")]
    Link {
        url: String,
        #[source]
        source: LinkError,
    },
}

impl ListError {
    /// Response body to show the operator, pretty-printed when it is JSON.
    pub fn payload(&self) -> Option<String> {
        let body = match self {
            ListError::Status { body, .. } | ListError::Body { body, .. } => body,
            _ => return None,
        };
        let pretty = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| serde_json::to_string_pretty(&v).ok());
        Some(pretty.unwrap_or_else(|| body.clone()))
    }
}

/// Gist object as returned by the listing endpoint. Only the fields the
/// mirror needs are read.
#[derive(Debug, Deserialize)]
struct RawGist {
    id: String,
    #[serde(default)]
    git_pull_url: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    description: Option<String>,
    public: bool,
    files: Map<String, Value>,
}

impl From<RawGist> for GistRecord {
    fn from(raw: RawGist) -> Self {
        GistRecord {
            id: raw.id,
            pull_url: raw.git_pull_url,
            created_at: raw.created_at,
            description: raw.description.unwrap_or_default(),
            files: raw.files.into_iter().map(|(name, _)| name).collect(),
            public: raw.public,
        }
    }
}

/// Client for the user gist listing.
pub struct GistLister {
    client: Client,
    api_url: String,
    credentials: Option<Credentials>,
}

impl GistLister {
    pub fn new(api_url: &str, credentials: Option<Credentials>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("gist-mirror/", env!("CARGO_PKG_VERSION"))),
        );
        let client = Client::builder().default_headers(headers).build()?;
        Ok(GistLister {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn listing_url(&self, user: &str) -> String {
        format!("{}/users/{}/gists", self.api_url, user)
    }

    /// Fetch every gist of `user`, following `rel="next"` links until the
    /// last page.
    ///
    /// Private gists are dropped unless `include_private` is set. Records keep
    /// API order across pages. Pages are requested one after another; the
    /// next URL is only known once the current response is in.
    ///
    /// # Errors
    /// Fails on the first page that cannot be fetched, has a non-success
    /// status, or cannot be parsed. Nothing collected so far is returned.
    pub fn list(&self, user: &str, include_private: bool) -> Result<Vec<GistRecord>, ListError> {
        let mut gists = Vec::new();
        let mut skipped = 0usize;
        let mut seen = HashSet::new();
        let mut next = Some(self.listing_url(user));

        while let Some(url) = next.take() {
            if !seen.insert(url.clone()) {
                warn!(url = %url, "next link points at an already fetched page, stopping");
                break;
            }
            debug!(page = seen.len(), url = %url, "fetching gist page");

            let (raw, link) = self.fetch_page(&url)?;
            next = match link {
                Some(header) => next_link(&header).map_err(|source| ListError::Link {
                    url: url.clone(),
                    source,
                })?,
                None => None,
            };

            for g in raw {
                if !g.public && !include_private {
                    skipped += 1;
                    continue;
                }
                gists.push(GistRecord::from(g));
            }
        }

        info!(
            user,
            gists = gists.len(),
            skipped_private = skipped,
            pages = seen.len(),
            "listed gists"
        );
        Ok(gists)
    }

    fn fetch_page(&self, url: &str) -> Result<(Vec<RawGist>, Option<String>), ListError> {
        let transport = |source| ListError::Transport {
            url: url.to_string(),
            source,
        };

        let mut req = self.client.get(url);
        if let Some(c) = &self.credentials {
            req = req.basic_auth(&c.user, Some(&c.token));
        }
        let resp = req.send().map_err(transport)?;

        let status = resp.status();
        let link = resp
            .headers()
            .get(LINK)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
        let body = resp.text().map_err(transport)?;

        if !status.is_success() {
            return Err(ListError::Status {
                url: url.to_string(),
                status,
                body,
            });
        }

        let raw: Vec<RawGist> = serde_json::from_str(&body).map_err(|source| ListError::Body {
            url: url.to_string(),
            body: body.clone(),
            source,
        })?;
        Ok((raw, link))
    }
}
