//! Invariant checks run explicitly before every persist.
//!
//! Validation never corrects a record; a violation is surfaced to the caller
//! as a [`ValidationError`]. The duplicate-fingerprint check lives in
//! [`crate::service::MapService`] because it needs the store; everything here
//! is pure.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::entities::{ContentMap, UrlMap};

pub const MAX_PATH_LENGTH: usize = 2000;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("url map with this fingerprint already exists")]
    DuplicateFingerprint,

    #[error("you cannot redirect a url to itself")]
    SelfRedirect,

    #[error("status code {0} requires a redirect")]
    RedirectRequired(u16),

    #[error("status code {0} requires a content map")]
    ContentMapRequired(u16),

    #[error("ensure the path has at most {MAX_PATH_LENGTH} characters (it has {0})")]
    PathTooLong(usize),

    #[error("{0} is not a valid http status code")]
    InvalidStatusCode(u16),

    #[error("{0:?} is not a registered view")]
    UnknownView(String),
}

/// Checks every store-independent [`UrlMap`] invariant. The fingerprint must
/// already be recomputed by the caller.
pub fn validate_url_map(map: &UrlMap) -> Result<(), ValidationError> {
    if map.path.len() > MAX_PATH_LENGTH {
        return Err(ValidationError::PathTooLong(map.path.len()));
    }

    if !(100..1000).contains(&map.status_code) {
        return Err(ValidationError::InvalidStatusCode(map.status_code));
    }

    if let (Some(id), Some(redirect)) = (map.id, map.redirect)
        && id == redirect
    {
        return Err(ValidationError::SelfRedirect);
    }

    if matches!(map.status_code, 301 | 302) && map.redirect.is_none() {
        return Err(ValidationError::RedirectRequired(map.status_code));
    }

    if map.status_code == 200 && map.content_map.is_none() {
        return Err(ValidationError::ContentMapRequired(map.status_code));
    }

    Ok(())
}

/// A [`ContentMap`] must name a view the host can actually render.
pub fn validate_content_map(
    map: &ContentMap,
    registered_views: &BTreeSet<String>,
) -> Result<(), ValidationError> {
    if !registered_views.contains(&map.view) {
        return Err(ValidationError::UnknownView(map.view.clone()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ContentMapId, SiteId, UrlMapId};

    fn map_with_status(status_code: u16) -> UrlMap {
        let mut map = UrlMap::new(SiteId(1), "/test_path");
        map.status_code = status_code;
        map
    }

    #[test]
    fn test_200_requires_content_map() {
        let mut map = map_with_status(200);
        assert_eq!(
            validate_url_map(&map),
            Err(ValidationError::ContentMapRequired(200))
        );
        map.content_map = Some(ContentMapId(1));
        assert_eq!(validate_url_map(&map), Ok(()));
    }

    #[test]
    fn test_redirect_statuses_require_redirect() {
        for status in [301, 302] {
            let mut map = map_with_status(status);
            assert_eq!(
                validate_url_map(&map),
                Err(ValidationError::RedirectRequired(status))
            );
            map.redirect = Some(UrlMapId(2));
            assert_eq!(validate_url_map(&map), Ok(()));
        }
    }

    #[test]
    fn test_self_redirect_rejected() {
        let mut map = map_with_status(301);
        map.id = Some(UrlMapId(1));
        map.redirect = Some(UrlMapId(1));
        assert_eq!(validate_url_map(&map), Err(ValidationError::SelfRedirect));
    }

    #[test]
    fn test_other_statuses_require_nothing() {
        for status in [204, 403, 404, 410] {
            assert_eq!(validate_url_map(&map_with_status(status)), Ok(()));
        }
    }

    #[test]
    fn test_path_length_bound() {
        let mut map = map_with_status(404);
        map.path = "x".repeat(MAX_PATH_LENGTH + 1);
        assert_eq!(
            validate_url_map(&map),
            Err(ValidationError::PathTooLong(MAX_PATH_LENGTH + 1))
        );
    }

    #[test]
    fn test_status_code_range() {
        assert_eq!(
            validate_url_map(&map_with_status(42)),
            Err(ValidationError::InvalidStatusCode(42))
        );
    }

    #[test]
    fn test_content_map_view_must_be_registered() {
        let views = BTreeSet::from(["article".to_string()]);
        assert_eq!(
            validate_content_map(&ContentMap::new("article"), &views),
            Ok(())
        );
        assert_eq!(
            validate_content_map(&ContentMap::new("nonexistent"), &views),
            Err(ValidationError::UnknownView("nonexistent".to_string()))
        );
    }
}
