use crate::store::errors::{StoreError, StoreResult};
use crate::typ::HeaderField;

pub const ASSET_ENCODING_NO_COMPRESSION: &str = "identity";

pub const SUPPORTED_ENCODINGS: [&str; 5] = ["identity", "gzip", "compress", "deflate", "br"];

// Compressed variants are preferred over identity, smallest first.
const COMPRESSED_PREFERENCE: [&str; 4] = ["br", "gzip", "deflate", "compress"];

/// Resolves the encoding type of an upload, defaulting to identity.
pub fn get_encoding_type(encoding_type: &Option<String>) -> StoreResult<String> {
    let provided_type = encoding_type
        .clone()
        .unwrap_or_else(|| ASSET_ENCODING_NO_COMPRESSION.to_string());

    if !SUPPORTED_ENCODINGS.contains(&provided_type.as_str()) {
        return Err(StoreError::UnsupportedEncoding(provided_type));
    }

    Ok(provided_type)
}

/// Encodings the requester accepts, most preferred first.
pub fn build_encodings(headers: &[HeaderField]) -> Vec<String> {
    let accepted = match accept_encoding(headers) {
        None => return vec![ASSET_ENCODING_NO_COMPRESSION.to_string()],
        Some(accepted) => accepted,
    };

    let quality = |name: &str| -> Option<bool> {
        accepted
            .iter()
            .find(|(encoding, _)| encoding == name)
            .map(|(_, allowed)| *allowed)
    };
    let wildcard = quality("*");

    let mut encodings: Vec<String> = COMPRESSED_PREFERENCE
        .iter()
        .copied()
        .filter(|name| quality(*name).or(wildcard).unwrap_or(false))
        .map(|name| name.to_string())
        .collect();

    if quality(ASSET_ENCODING_NO_COMPRESSION).unwrap_or(true) {
        encodings.push(ASSET_ENCODING_NO_COMPRESSION.to_string());
    }

    encodings
}

// (encoding, allowed) pairs of the first Accept-Encoding header.
fn accept_encoding(headers: &[HeaderField]) -> Option<Vec<(String, bool)>> {
    let (_, value) = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("accept-encoding"))?;

    let accepted = value
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split(';');
            let name = parts.next()?.trim().to_ascii_lowercase();
            if name.is_empty() {
                return None;
            }
            let allowed = parts
                .filter_map(|param| param.trim().strip_prefix("q="))
                .all(|q| q.trim().parse::<f32>().map(|q| q > 0.0).unwrap_or(true));
            Some((name, allowed))
        })
        .collect();

    Some(accepted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accept(value: &str) -> Vec<HeaderField> {
        vec![("Accept-Encoding".to_string(), value.to_string())]
    }

    #[test]
    fn test_default_encoding_type() {
        assert_eq!(get_encoding_type(&None).unwrap(), "identity");
        assert_eq!(get_encoding_type(&Some("br".to_string())).unwrap(), "br");
        assert!(matches!(
            get_encoding_type(&Some("zstd".to_string())),
            Err(StoreError::UnsupportedEncoding(e)) if e == "zstd"
        ));
    }

    #[test]
    fn test_no_header_means_identity_only() {
        assert_eq!(build_encodings(&[]), vec!["identity"]);
    }

    #[test]
    fn test_browser_header_prefers_compressed() {
        let encodings = build_encodings(&accept("gzip, deflate, br"));
        assert_eq!(encodings, vec!["br", "gzip", "deflate", "identity"]);
    }

    #[test]
    fn test_quality_zero_excludes() {
        let encodings = build_encodings(&[(
            "accept-encoding".to_string(),
            "gzip;q=0, br;q=0.5, identity;q=0".to_string(),
        )]);
        assert_eq!(encodings, vec!["br"]);
    }

    #[test]
    fn test_wildcard() {
        let encodings = build_encodings(&accept("*"));
        assert_eq!(encodings, vec!["br", "gzip", "deflate", "compress", "identity"]);

        let encodings = build_encodings(&accept("gzip, *;q=0"));
        assert_eq!(encodings, vec!["gzip", "identity"]);
    }
}
