//! Base URL resolution and exempt-path matching.

use url::Url;

use crate::auth::{LOGIN_PATH, LOGOUT_PATH};
use crate::error::{ApiError, ApiResult};
use crate::refresh::REFRESH_PATH;

/// The configured API root.
///
/// The path always ends with `/`, so request paths resolve below it:
/// `https://host/api` + `/auth/login` is `https://host/api/auth/login`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(Url);

impl BaseUrl {
    /// Parse an absolute base URL. Query and fragment are dropped.
    pub fn parse(input: &str) -> Result<Self, url::ParseError> {
        let mut url = Url::parse(input.trim())?;
        if url.cannot_be_a_base() {
            return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase);
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url.set_query(None);
        url.set_fragment(None);
        Ok(Self(url))
    }

    /// The base as a [`Url`].
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Resolve a request path (leading `/` optional, query allowed).
    pub fn join(&self, path: &str) -> ApiResult<Url> {
        self.0
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::unknown(format!("Invalid request path {:?}: {}", path, e)))
    }

    /// Non-empty path segments of `url` below the base path.
    ///
    /// Returns `None` when `url` is on another origin or outside the base path.
    pub fn relative_segments(&self, url: &Url) -> Option<Vec<String>> {
        if url.origin() != self.0.origin() {
            return None;
        }

        let base = segments(&self.0);
        let target = segments(url);
        let under_base = target.len() >= base.len()
            && base
                .iter()
                .zip(&target)
                .all(|(b, t)| b.eq_ignore_ascii_case(t));

        under_base.then(|| target[base.len()..].iter().map(|s| s.to_string()).collect())
    }
}

impl std::fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

fn segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|parts| parts.filter(|part| !part.is_empty()).collect())
        .unwrap_or_default()
}

/// Endpoints that never carry a bearer credential and never trigger a refresh.
///
/// Matching is exact on normalized path segments below the base URL,
/// ASCII case-insensitive. `/auth/refresh/history` is not exempt.
/// A URL outside the base (another origin or path) is treated as exempt so
/// credentials never leave the API.
#[derive(Debug, Clone)]
pub struct ExemptPaths {
    routes: Vec<Vec<String>>,
}

impl ExemptPaths {
    /// Build from a list of paths such as `/auth/login`.
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let routes = paths
            .into_iter()
            .map(|path| {
                path.as_ref()
                    .split('/')
                    .filter(|part| !part.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .collect();
        Self { routes }
    }

    /// Whether `url` is exempt from credentials and refresh.
    pub fn is_exempt(&self, base: &BaseUrl, url: &Url) -> bool {
        let Some(segments) = base.relative_segments(url) else {
            return true;
        };

        self.routes.iter().any(|route| {
            route.len() == segments.len()
                && route
                    .iter()
                    .zip(&segments)
                    .all(|(r, s)| r.eq_ignore_ascii_case(s))
        })
    }
}

impl Default for ExemptPaths {
    fn default() -> Self {
        Self::new([LOGIN_PATH, REFRESH_PATH, LOGOUT_PATH])
    }
}
