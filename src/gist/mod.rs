//! Gist listing.
//!
//! [`GistLister`] walks the paginated `GET /users/<user>/gists` listing and
//! turns every gist into a [`GistRecord`]. Pagination follows the `Link`
//! response header (see [`link`]).

mod link;
mod lister;

pub use lister::{Credentials, DEFAULT_API_URL, GistLister, ListError};

/// One gist as reported by the listing API.
///
/// Built fresh on every run; nothing about it is persisted apart from the
/// remote and branch it produces in the mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GistRecord {
    /// Stable, unique gist id. Also the remote name in the mirror.
    pub id: String,
    /// Git URL the gist history is fetched from.
    pub pull_url: String,
    /// ISO-8601 creation time, kept as the API spelled it.
    pub created_at: String,
    pub description: String,
    /// File names in API order.
    pub files: Vec<String>,
    pub public: bool,
}
