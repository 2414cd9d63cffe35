/*! Id grammar, content locations and environment helpers.

Internal content ids follow the grammar `ekn:///` + 40 lowercase hex digits.
URIs handed to the domain additionally carry a host part and an optional
resource suffix (`ekn://<domain>/<hash>[/<resource>]`), or address openzim
style records as `ekn+zim:///<namespace>/<url>`.
!*/
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Error;

/// The only bundle version this crate reads (content of an `EKN_VERSION` file).
pub const SUPPORTED_BUNDLE_VERSION: &str = "3";

fn is_hash(s: &str) -> bool {
    s.len() == 40
        && s.bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Checks an id against the canonical grammar: `ekn:///` followed by exactly
/// 40 lowercase hex digits.
pub fn is_valid_id(id: &str) -> bool {
    match id.strip_prefix("ekn:///") {
        Some(hash) => is_hash(hash),
        None => false,
    }
}

/// Extracts the shard object id out of a content URI.
///
/// For `ekn://` URIs only the hash locates the record; a trailing resource
/// segment is ignored. For `ekn+zim:///` URIs the whole
/// `<namespace>/<url>` pair is the object id.
pub fn uri_object_id(uri: &str) -> Option<String> {
    if let Some(rest) = uri.strip_prefix("ekn+zim:///") {
        let (namespace, suffix) = rest.split_once('/')?;
        if namespace.chars().count() == 1 && !suffix.is_empty() {
            return Some(rest.to_string());
        }
        return None;
    }

    let rest = uri.strip_prefix("ekn://")?;
    let mut segments = rest.split('/');
    let _domain = segments.next()?;
    let hash = segments.next()?;
    if is_hash(hash) {
        Some(hash.to_string())
    } else {
        None
    }
}

/// Per-application user data directory.
pub fn data_dir(app_id: &str) -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join(app_id))
}

/// The primary subscription set of an application.
pub fn subscriptions_dir(app_id: &str) -> Option<PathBuf> {
    data_dir(app_id).map(|dir| dir.join("com.endlessm.subscriptions"))
}

fn system_data_dirs() -> Vec<PathBuf> {
    let raw = env::var("XDG_DATA_DIRS").unwrap_or_default();
    let raw = if raw.is_empty() {
        "/usr/local/share:/usr/share".to_string()
    } else {
        raw
    };
    raw.split(':')
        .filter(|segment| !segment.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Per-application content extension directories, in lookup order.
pub fn extensions_dirs(app_id: &str) -> Vec<PathBuf> {
    system_data_dirs()
        .into_iter()
        .map(|dir| dir.join("ekn").join("extensions").join(app_id))
        .collect()
}

/// Reads the bundle version marker of a subscription directory, if present.
pub fn bundle_version(dir: &Path) -> Result<Option<String>, Error> {
    let marker = dir.join("EKN_VERSION");
    if !marker.is_file() {
        return Ok(None);
    }
    let raw = fs::read_to_string(&marker)?;
    Ok(Some(raw.trim().to_string()))
}

/// Primary language of the running session as a bare ISO 639 code, or an
/// empty string when the environment declares none.
pub fn current_language() -> String {
    for var in ["LANGUAGE", "LC_ALL", "LC_MESSAGES", "LANG"] {
        let value = match env::var(var) {
            Ok(v) => v,
            Err(_) => continue,
        };
        if value.is_empty() || value == "C" || value == "POSIX" {
            continue;
        }
        let code: String = value
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        if !code.is_empty() {
            return code.to_lowercase();
        }
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_id() {
        assert!(is_valid_id(
            "ekn:///4dba9091495e8f277893e0d400e9e092f9f6f551"
        ));
    }

    #[test]
    fn invalid_ids() {
        // wrong length
        assert!(!is_valid_id("ekn:///4dba9091495e8f"));
        // uppercase hex
        assert!(!is_valid_id(
            "ekn:///4DBA9091495E8F277893E0D400E9E092F9F6F551"
        ));
        // non-hex
        assert!(!is_valid_id(
            "ekn:///zzba9091495e8f277893e0d400e9e092f9f6f551"
        ));
        // missing scheme
        assert!(!is_valid_id("4dba9091495e8f277893e0d400e9e092f9f6f551"));
        assert!(!is_valid_id(""));
    }

    #[test]
    fn object_id_from_uri() {
        let hash = "4dba9091495e8f277893e0d400e9e092f9f6f551";
        assert_eq!(
            uri_object_id(&format!("ekn:///{hash}")).as_deref(),
            Some(hash)
        );
        assert_eq!(
            uri_object_id(&format!("ekn://com.example.app/{hash}")).as_deref(),
            Some(hash)
        );
        assert_eq!(
            uri_object_id(&format!("ekn://com.example.app/{hash}/cover.jpg")).as_deref(),
            Some(hash)
        );
    }

    #[test]
    fn object_id_from_zim_uri() {
        assert_eq!(
            uri_object_id("ekn+zim:///A/Apple").as_deref(),
            Some("A/Apple")
        );
        assert_eq!(
            uri_object_id("ekn+zim:///A/fruit/Apple").as_deref(),
            Some("A/fruit/Apple")
        );
        assert_eq!(uri_object_id("ekn+zim:///A"), None);
        assert_eq!(uri_object_id("ekn+zim:///AB/Apple"), None);
    }

    #[test]
    fn object_id_rejects_garbage() {
        assert_eq!(uri_object_id("https://example.com/x"), None);
        assert_eq!(uri_object_id("ekn://domain/nothex"), None);
        assert_eq!(uri_object_id(""), None);
    }
}
