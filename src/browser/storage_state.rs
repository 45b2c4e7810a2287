//! Serialized browser storage snapshots
//!
//! A [`StorageState`] is the opaque blob the session store persists per
//! site: cookies plus per-origin localStorage captured after login.
//! Everything outside this module treats the serialized form as opaque.

use crate::browser::{BrowserError, BrowserResult};
use chromiumoxide::cdp::browser_protocol::network::{
    Cookie, CookieParam, CookieSameSite, TimeSinceEpoch,
};
use serde::{Deserialize, Serialize};

/// Snapshot of a browsing context's persistent state
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StorageState {
    #[serde(default)]
    pub cookies: Vec<StoredCookie>,

    #[serde(default)]
    pub origins: Vec<OriginState>,
}

/// One captured cookie
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    /// Unix seconds; absent for session cookies
    pub expires: Option<f64>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: Option<String>,
}

/// localStorage contents for one origin
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OriginState {
    pub origin: String,
    pub local_storage: Vec<StorageItem>,
}

/// One localStorage key/value pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageItem {
    pub name: String,
    pub value: String,
}

impl StorageState {
    /// Builds a snapshot from CDP cookies (origins are added separately)
    pub fn from_cookies(cookies: Vec<Cookie>) -> Self {
        let cookies = cookies
            .into_iter()
            .map(|c| StoredCookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                expires: (c.expires > 0.0).then_some(c.expires),
                http_only: c.http_only,
                secure: c.secure,
                same_site: c.same_site.map(|s| same_site_str(&s).to_string()),
            })
            .collect();

        Self {
            cookies,
            origins: Vec::new(),
        }
    }

    /// CDP cookie parameters for restoring this snapshot into a context
    pub fn cookie_params(&self) -> BrowserResult<Vec<CookieParam>> {
        self.cookies
            .iter()
            .map(|c| {
                let mut builder = CookieParam::builder()
                    .name(c.name.clone())
                    .value(c.value.clone())
                    .domain(c.domain.clone())
                    .path(c.path.clone())
                    .http_only(c.http_only)
                    .secure(c.secure);

                if let Some(expires) = c.expires {
                    builder = builder.expires(TimeSinceEpoch::new(expires));
                }
                if let Some(same_site) = c.same_site.as_deref().and_then(same_site_from_str) {
                    builder = builder.same_site(same_site);
                }

                builder.build().map_err(BrowserError::Config)
            })
            .collect()
    }

    /// The localStorage items captured for an origin, if any
    pub fn origin_items(&self, origin: &str) -> Option<&[StorageItem]> {
        self.origins
            .iter()
            .find(|o| o.origin == origin)
            .map(|o| o.local_storage.as_slice())
    }

    /// True when the snapshot holds nothing worth persisting
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.origins.iter().all(|o| o.local_storage.is_empty())
    }

    /// Serializes the snapshot to its opaque stored form
    pub fn to_json(&self) -> BrowserResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a snapshot from its opaque stored form
    pub fn from_json(blob: &str) -> BrowserResult<Self> {
        Ok(serde_json::from_str(blob)?)
    }
}

fn same_site_str(s: &CookieSameSite) -> &'static str {
    match s {
        CookieSameSite::Strict => "Strict",
        CookieSameSite::Lax => "Lax",
        CookieSameSite::None => "None",
    }
}

fn same_site_from_str(s: &str) -> Option<CookieSameSite> {
    match s {
        "Strict" => Some(CookieSameSite::Strict),
        "Lax" => Some(CookieSameSite::Lax),
        "None" => Some(CookieSameSite::None),
        _ => None,
    }
}
