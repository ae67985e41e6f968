//! Cache-Control layers.

use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::predicate::{Clock, SystemClock};
use crate::request::Request;
use crate::response::Response;

use super::Handler;

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Directives for a `Cache-Control` header.
///
/// Only directives that were set are rendered. `public` and `private` are
/// mutually exclusive; setting one clears the other.
///
/// # Examples
///
/// ```
/// use request_guards::web::CacheControlOptions;
///
/// let options = CacheControlOptions::new().public().max_age(600).must_revalidate();
/// assert_eq!(
///     options.header_value().as_deref(),
///     Some("public, must-revalidate, max-age=600")
/// );
/// assert_eq!(CacheControlOptions::new().header_value(), None);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheControlOptions {
    public: bool,
    private: bool,
    no_cache: bool,
    no_store: bool,
    no_transform: bool,
    must_revalidate: bool,
    proxy_revalidate: bool,
    max_age: Option<u64>,
    s_maxage: Option<u64>,
}

impl CacheControlOptions {
    /// Creates options with nothing set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `public`.
    pub fn public(mut self) -> Self {
        self.public = true;
        self.private = false;
        self
    }

    /// Sets `private`.
    pub fn private(mut self) -> Self {
        self.private = true;
        self.public = false;
        self
    }

    /// Sets `no-cache`.
    pub fn no_cache(mut self) -> Self {
        self.no_cache = true;
        self
    }

    /// Sets `no-store`.
    pub fn no_store(mut self) -> Self {
        self.no_store = true;
        self
    }

    /// Sets `no-transform`.
    pub fn no_transform(mut self) -> Self {
        self.no_transform = true;
        self
    }

    /// Sets `must-revalidate`.
    pub fn must_revalidate(mut self) -> Self {
        self.must_revalidate = true;
        self
    }

    /// Sets `proxy-revalidate`.
    pub fn proxy_revalidate(mut self) -> Self {
        self.proxy_revalidate = true;
        self
    }

    /// Sets `max-age` in seconds.
    pub fn max_age(mut self, seconds: u64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    /// Sets `s-maxage` in seconds.
    pub fn s_maxage(mut self, seconds: u64) -> Self {
        self.s_maxage = Some(seconds);
        self
    }

    fn directives(&self) -> Vec<(&'static str, Option<u64>)> {
        let flags = [
            ("public", self.public),
            ("private", self.private),
            ("no-cache", self.no_cache),
            ("no-store", self.no_store),
            ("no-transform", self.no_transform),
            ("must-revalidate", self.must_revalidate),
            ("proxy-revalidate", self.proxy_revalidate),
        ];
        let mut directives: Vec<(&'static str, Option<u64>)> = flags
            .into_iter()
            .filter(|(_, set)| *set)
            .map(|(name, _)| (name, None))
            .collect();
        if let Some(age) = self.max_age {
            directives.push(("max-age", Some(age)));
        }
        if let Some(age) = self.s_maxage {
            directives.push(("s-maxage", Some(age)));
        }
        directives
    }

    /// Renders the header value, or `None` when nothing is set.
    pub fn header_value(&self) -> Option<String> {
        let rendered: Vec<String> = self
            .directives()
            .into_iter()
            .map(|(name, value)| match value {
                Some(v) => format!("{name}={v}"),
                None => name.to_string(),
            })
            .collect();
        if rendered.is_empty() {
            None
        } else {
            Some(rendered.join(", "))
        }
    }

    /// Merges these directives into an existing header value.
    ///
    /// Directives already present keep their position and take the new
    /// value; new directives are appended.
    fn merge_into(&self, existing: Option<&str>) -> Option<String> {
        let mut merged: Vec<(String, Option<String>)> = existing
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| match part.split_once('=') {
                Some((k, v)) => (k.trim().to_ascii_lowercase(), Some(v.trim().to_string())),
                None => (part.to_ascii_lowercase(), None),
            })
            .collect();

        for (name, value) in self.directives() {
            if name == "public" {
                merged.retain(|(k, _)| k.as_str() != "private");
            }
            if name == "private" {
                merged.retain(|(k, _)| k.as_str() != "public");
            }
            let value = value.map(|v| v.to_string());
            match merged.iter_mut().find(|(k, _)| k.as_str() == name) {
                Some(slot) => slot.1 = value,
                None => merged.push((name.to_string(), value)),
            }
        }

        if merged.is_empty() {
            return None;
        }
        Some(
            merged
                .into_iter()
                .map(|(k, v)| match v {
                    Some(v) => format!("{k}={v}"),
                    None => k,
                })
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

/// Applies [`CacheControlOptions`] to every response of the inner handler.
#[derive(Debug)]
pub struct CacheControl<H> {
    options: CacheControlOptions,
    inner: H,
}

impl<H: Handler> CacheControl<H> {
    /// Wraps `inner` with the given directives.
    pub fn new(options: CacheControlOptions, inner: H) -> Self {
        Self { options, inner }
    }

    /// Returns the configured directives.
    pub fn options(&self) -> &CacheControlOptions {
        &self.options
    }
}

impl<H: Handler> Handler for CacheControl<H> {
    fn handle(&self, request: &Request) -> Result<Response, Error> {
        let mut response = self.inner.handle(request)?;
        if let Some(value) = self.options.merge_into(response.header("cache-control")) {
            response.set_header("Cache-Control", value);
        }
        Ok(response)
    }
}

/// Marks every response of the inner handler as uncacheable.
///
/// Sets `Cache-Control: private, no-cache, no-store, must-revalidate,
/// max-age=0` and, unless already present, an `Expires` header at the current
/// time.
pub struct NeverCache<H> {
    clock: Arc<dyn Clock>,
    inner: H,
}

impl<H: Handler> NeverCache<H> {
    /// Wraps `inner`, reading time from the system clock.
    pub fn new(inner: H) -> Self {
        Self::with_clock(inner, Arc::new(SystemClock))
    }

    /// Wraps `inner`, reading time from `clock`.
    pub fn with_clock(inner: H, clock: Arc<dyn Clock>) -> Self {
        Self { clock, inner }
    }
}

impl<H: fmt::Debug> fmt::Debug for NeverCache<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NeverCache")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<H: Handler> Handler for NeverCache<H> {
    fn handle(&self, request: &Request) -> Result<Response, Error> {
        let mut response = self.inner.handle(request)?;
        if response.header("expires").is_none() {
            let now = self.clock.now().format(HTTP_DATE).to_string();
            response.set_header("Expires", now);
        }
        let options = CacheControlOptions::new()
            .max_age(0)
            .no_cache()
            .no_store()
            .must_revalidate()
            .private();
        if let Some(value) = options.merge_into(response.header("cache-control")) {
            response.set_header("Cache-Control", value);
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::predicate::FixedClock;
    use crate::request::Method;

    fn get() -> Request {
        Request::new("req-cache", Method::Get, "/")
    }

    #[test]
    fn unset_options_render_nothing() {
        assert_eq!(CacheControlOptions::new().header_value(), None);

        let endpoint = CacheControl::new(
            CacheControlOptions::new(),
            |_: &Request| -> Result<Response, Error> { Ok(Response::ok("x")) },
        );
        assert_eq!(endpoint.handle(&get()).unwrap().header("cache-control"), None);
    }

    #[test]
    fn set_options_are_rendered_in_order() {
        let options = CacheControlOptions::new()
            .s_maxage(60)
            .no_transform()
            .private()
            .max_age(30);
        assert_eq!(
            options.header_value().as_deref(),
            Some("private, no-transform, max-age=30, s-maxage=60")
        );
    }

    #[test]
    fn public_and_private_are_exclusive() {
        let options = CacheControlOptions::new().private().public();
        assert_eq!(options.header_value().as_deref(), Some("public"));
    }

    #[test]
    fn layer_merges_with_existing_header() {
        let inner = |_: &Request| -> Result<Response, Error> {
            Ok(Response::ok("x").with_header("Cache-Control", "private, max-age=5"))
        };
        let endpoint = CacheControl::new(CacheControlOptions::new().public().max_age(300), inner);
        let response = endpoint.handle(&get()).unwrap();
        assert_eq!(response.header("cache-control"), Some("max-age=300, public"));
    }

    #[test]
    fn never_cache_sets_headers() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 16, 5, 0).unwrap();
        let endpoint = NeverCache::with_clock(
            |_: &Request| -> Result<Response, Error> { Ok(Response::ok("x")) },
            Arc::new(FixedClock(at)),
        );
        let response = endpoint.handle(&get()).unwrap();
        assert_eq!(
            response.header("cache-control"),
            Some("private, no-cache, no-store, must-revalidate, max-age=0")
        );
        assert_eq!(response.header("expires"), Some("Sat, 09 Mar 2024 16:05:00 GMT"));
    }

    #[derive(Debug)]
    struct Landing;

    impl Handler for Landing {
        fn handle(&self, _: &Request) -> Result<Response, Error> {
            Ok(Response::ok("landing"))
        }
    }

    #[test]
    fn never_cache_debug_shows_inner_layers() {
        let endpoint =
            NeverCache::new(CacheControl::new(CacheControlOptions::new().public(), Landing));
        let rendered = format!("{endpoint:?}");
        assert!(rendered.starts_with("NeverCache"));
        assert!(rendered.contains("Landing"));
        assert!(rendered.contains("public: true"));
        assert!(rendered.ends_with(".. }"));
    }

    #[test]
    fn never_cache_keeps_existing_expires() {
        let endpoint = NeverCache::new(|_: &Request| -> Result<Response, Error> {
            Ok(Response::ok("x").with_header("Expires", "0"))
        });
        assert_eq!(endpoint.handle(&get()).unwrap().header("expires"), Some("0"));
    }
}
