//! Records for the url map graph.
//!
//! Records reference each other by stable id, never by pointer; a record is
//! always loadable on its own and tolerates missing neighbors. The hydrated
//! [`ResolvedUrlMap`] aggregate is what the cache holds: it carries everything
//! a consumer needs so a cache hit never goes back to the store.

use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Keyword arguments handed to the renderer, iteration order preserved.
pub type Options = IndexMap<String, serde_json::Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SiteId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UrlMapId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentMapId(pub u64);

/// A web property served by this deployment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    pub domain: String,
}

impl Site {
    pub fn new<D>(id: u32, domain: D) -> Self
    where
        D: Into<String>,
    {
        Site {
            id: SiteId(id),
            domain: domain.into(),
        }
    }
}

/// Names a renderable target together with the keyword arguments the renderer
/// is invoked with. Referenced (not owned) by [`UrlMap`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentMap {
    /// `None` until the record has been persisted.
    pub id: Option<ContentMapId>,
    pub view: String,
    pub options: Options,
    pub created: SystemTime,
    pub modified: SystemTime,
}

impl ContentMap {
    pub fn new<V>(view: V) -> Self
    where
        V: Into<String>,
    {
        let now = SystemTime::now();
        ContentMap {
            id: None,
            view: view.into(),
            options: Options::new(),
            created: now,
            modified: now,
        }
    }

    pub fn with_option<K>(mut self, key: K, value: serde_json::Value) -> Self
    where
        K: Into<String>,
    {
        self.options.insert(key.into(), value);
        self
    }
}

/// Maps a (site, path) pair to an outcome:
///
/// 1. a renderable view, via `content_map` together with status 200,
/// 2. a permanent or temporary redirect, via the reflexive `redirect`
///    reference together with status 301 or 302,
/// 3. an arbitrary status code, for example 410 to mark a resource as gone.
///
/// The `fingerprint` is recomputed on every save and doubles as the cache key
/// and the store uniqueness constraint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UrlMap {
    /// `None` until the record has been persisted.
    pub id: Option<UrlMapId>,
    pub site: SiteId,
    pub path: String,
    pub force_secure: bool,
    pub fingerprint: String,
    pub status_code: u16,
    pub canonical: Option<UrlMapId>,
    pub redirect: Option<UrlMapId>,
    pub content_map: Option<ContentMapId>,
    pub on_sitemap: bool,
    pub created: SystemTime,
    pub modified: SystemTime,
}

impl UrlMap {
    pub fn new<P>(site: SiteId, path: P) -> Self
    where
        P: Into<String>,
    {
        let now = SystemTime::now();
        UrlMap {
            id: None,
            site,
            path: path.into(),
            force_secure: true,
            fingerprint: String::new(),
            status_code: 200,
            canonical: None,
            redirect: None,
            content_map: None,
            on_sitemap: true,
            created: now,
            modified: now,
        }
    }

    /// `https` or `http`, based on the `force_secure` field.
    pub fn protocol(&self) -> &'static str {
        if self.force_secure { "https" } else { "http" }
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status_code)
    }

    /// A terminal does not itself redirect: it renders (200) or is gone (410).
    pub fn is_terminal(&self) -> bool {
        self.status_code == 200 || self.status_code == 410
    }
}

/// A redirect target hydrated together with its site, enough to build the
/// absolute `Location` URL without another lookup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RedirectTarget {
    pub record: UrlMap,
    pub site: Site,
}

impl RedirectTarget {
    pub fn absolute_url(&self) -> String {
        format!(
            "{}://{}{}",
            self.record.protocol(),
            self.site.domain,
            self.record.path
        )
    }
}

/// A [`UrlMap`] with its associations eagerly attached. This is the cached
/// value: self-contained, so consumers of a hit never re-query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedUrlMap {
    pub record: UrlMap,
    pub site: Site,
    pub content_map: Option<ContentMap>,
    pub redirect: Option<RedirectTarget>,
}

impl ResolvedUrlMap {
    pub fn absolute_url(&self) -> String {
        format!(
            "{}://{}{}",
            self.record.protocol(),
            self.site.domain,
            self.record.path
        )
    }
}
