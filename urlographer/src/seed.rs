//! Imports a human-edited YAML fixture into the store, resolving references
//! by domain, path, and view name.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use mapstore::fingerprint::fingerprint;
use mapstore::{
    ContentMap, ContentMapId, MapError, MapService, Options, Site, Store, StoreError, UrlMap,
};
use router::canonicalize_path;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read fixture: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse fixture: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error(transparent)]
    Map(#[from] MapError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("url map {0:?} references unknown site {1:?}")]
    UnknownSite(String, String),

    #[error("url map {0:?} references unknown view {1:?}")]
    UnknownView(String, String),

    #[error("redirect target of {0:?} does not exist in the fixture or the store")]
    UnresolvedRedirect(String),
}

#[derive(Debug, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub sites: Vec<SeedSite>,
    #[serde(default)]
    pub content_maps: Vec<SeedContentMap>,
    #[serde(default)]
    pub url_maps: Vec<SeedUrlMap>,
}

#[derive(Debug, Deserialize)]
pub struct SeedSite {
    pub id: u32,
    pub domain: String,
}

#[derive(Debug, Deserialize)]
pub struct SeedContentMap {
    pub view: String,
    #[serde(default)]
    pub options: Options,
}

fn default_status() -> u16 {
    200
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct SeedUrlMap {
    /// Site domain
    pub site: String,
    pub path: String,
    #[serde(default = "default_status")]
    pub status_code: u16,
    #[serde(default = "default_true")]
    pub force_secure: bool,
    #[serde(default = "default_true")]
    pub on_sitemap: bool,
    /// Path of the redirect target, on the same site
    #[serde(default)]
    pub redirect: Option<String>,
    /// View name of the content map to attach
    #[serde(default)]
    pub view: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub sites: usize,
    pub content_maps: usize,
    pub url_maps: usize,
}

pub async fn import_file(maps: &MapService, path: &Path) -> Result<ImportSummary, SeedError> {
    let fixture: Fixture = serde_yaml::from_reader(File::open(path)?)?;
    import(maps, fixture).await
}

/// Saves the fixture through the service so the full validation and cache
/// lifecycle applies. Redirect targets may appear later in the fixture than
/// their sources; rows are retried until the graph stops making progress.
pub async fn import(maps: &MapService, fixture: Fixture) -> Result<ImportSummary, SeedError> {
    let mut summary = ImportSummary::default();

    for site in fixture.sites {
        maps.store()
            .put_site(Site::new(site.id, site.domain))
            .await?;
        summary.sites += 1;
    }

    let mut views: HashMap<String, ContentMapId> = HashMap::new();
    for seed in fixture.content_maps {
        let mut content_map = ContentMap::new(seed.view.clone());
        content_map.options = seed.options;
        let saved = maps.save_content_map(content_map).await?;
        if let Some(id) = saved.id {
            views.insert(seed.view, id);
        }
        summary.content_maps += 1;
    }

    let mut pending = fixture.url_maps;
    while !pending.is_empty() {
        let mut remaining = Vec::new();
        let mut progressed = false;

        for seed in pending {
            let Some(site) = maps.site_by_domain(&seed.site).await? else {
                return Err(SeedError::UnknownSite(seed.path, seed.site));
            };
            let path = canonicalize_path(&seed.path);

            let redirect = match &seed.redirect {
                None => None,
                Some(target_path) => {
                    let target_path = canonicalize_path(target_path);
                    match maps
                        .store()
                        .url_map_by_fingerprint(&fingerprint(site.id, &target_path))
                        .await?
                    {
                        Some(target) => target.id,
                        None => {
                            // target not imported yet; retry on the next pass
                            remaining.push(seed);
                            continue;
                        }
                    }
                }
            };

            let content_map = match &seed.view {
                None => None,
                Some(view) => match views.get(view) {
                    Some(id) => Some(*id),
                    None => return Err(SeedError::UnknownView(seed.path, view.clone())),
                },
            };

            let mut map = UrlMap::new(site.id, path);
            map.status_code = seed.status_code;
            map.force_secure = seed.force_secure;
            map.on_sitemap = seed.on_sitemap;
            map.redirect = redirect;
            map.content_map = content_map;
            maps.save_url_map(map).await?;
            summary.url_maps += 1;
            progressed = true;
        }

        if !remaining.is_empty() && !progressed {
            return Err(SeedError::UnresolvedRedirect(remaining.swap_remove(0).path));
        }
        pending = remaining;
    }

    Ok(summary)
}
