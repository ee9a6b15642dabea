//! Request routing.

use std::borrow::Cow;

use hyper::Method;

const LIST_PREFIX: &str = "/api/content/list/";
const FETCH_PREFIX: &str = "/api/content/fetch/";

/// A recognized endpoint, with its path parameters percent-decoded but not
/// yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Health,
    List {
        owner: String,
        area: String,
    },
    Fetch {
        owner: String,
        area: String,
        file_name: String,
    },
}

impl Route {
    /// Match `method` and `path` against the known endpoints.
    pub fn parse(method: &Method, path: &str) -> Option<Self> {
        if method != Method::GET {
            return None;
        }

        if path == "/health" {
            return Some(Self::Health);
        }

        if let Some(rest) = path.strip_prefix(LIST_PREFIX) {
            let [owner, area] = segments::<2>(rest)?;
            return Some(Self::List { owner, area });
        }

        if let Some(rest) = path.strip_prefix(FETCH_PREFIX) {
            let [owner, area, file_name] = segments::<3>(rest)?;
            return Some(Self::Fetch {
                owner,
                area,
                file_name,
            });
        }

        None
    }

    /// Owner, area and (for fetches) file name of a content route.
    pub fn content_target(&self) -> Option<(&str, &str, Option<&str>)> {
        match self {
            Self::Health => None,
            Self::List { owner, area } => Some((owner, area, None)),
            Self::Fetch {
                owner,
                area,
                file_name,
            } => Some((owner, area, Some(file_name))),
        }
    }

    /// Operation name used in logs and the audit trail.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::List { .. } => "content.list",
            Self::Fetch { .. } => "content.fetch",
        }
    }
}

/// Split `rest` into exactly `N` non-empty, decoded segments.
fn segments<const N: usize>(rest: &str) -> Option<[String; N]> {
    let parts: Vec<String> = rest.split('/').map(decode).collect();
    if parts.iter().any(String::is_empty) {
        return None;
    }
    parts.try_into().ok()
}

fn decode(segment: &str) -> String {
    // Undecodable input is passed through and left to validation to reject.
    urlencoding::decode(segment)
        .unwrap_or(Cow::Borrowed(segment))
        .into_owned()
}
