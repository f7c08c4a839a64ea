//! Component K: the `v<N>:<payload>` freeze codec. Version 1 is
//! deflate-then-base64url; unsupported versions round-trip as a no-op
//! decode (returns `Ok(None)`) rather than an error, per spec §4.10.

use std::io::{Read, Write};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use flate2::write::DeflateEncoder;
use flate2::read::DeflateDecoder;
use flate2::Compression;
use rig_core::{AHashMap, Error};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::Result;

const CURRENT_VERSION: u32 = 1;

/// The serializable snapshot of a `FlatConfig` that the freeze codec
/// actually round-trips: distro versions as plain strings rather than live
/// `DistroVersion` handles (those hold a finder trait object and can't be
/// deserialized back).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrozenConfig {
    pub uri: String,
    pub versions: AHashMap<String, String>,
    pub environment: AHashMap<String, Option<Vec<String>>>,
    pub aliases: AHashMap<String, AHashMap<String, FrozenAlias>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrozenAlias {
    pub cmd: serde_json::Value,
    pub environment: AHashMap<String, Option<Vec<String>>>,
}

/// Serializes `value` to JSON, deflates it, and base64url-encodes the
/// result, prefixed with `v1:`.
pub fn encode<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_vec(value).map_err(|source| {
        Error::FreezeDecode {
            reason: format!("could not serialize frozen value: {source}"),
        }
    })?;
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    let compressed = encoder.finish()?;
    let payload = URL_SAFE_NO_PAD.encode(compressed);
    Ok(format!("v{CURRENT_VERSION}:{payload}"))
}

/// Decodes a `v<digits>:<payload>` string. `Ok(None)` means the version
/// number parsed fine but this codec doesn't support it (spec: "unknown
/// supported version -> return null").
pub fn decode<T: DeserializeOwned>(frozen: &str) -> Result<Option<T>> {
    let Some((version_part, payload)) = frozen.split_once(':') else {
        return Err(Error::FreezeDecode {
            reason: "missing freeze version information (expected 'v<N>:...')".to_string(),
        });
    };
    let Some(digits) = version_part.strip_prefix('v') else {
        return Err(Error::FreezeDecode {
            reason: "missing freeze version information (expected 'v<N>:...')".to_string(),
        });
    };
    let version: u32 = digits.parse().map_err(|_| Error::FreezeDecode {
        reason: format!("version '{digits}' is not valid"),
    })?;

    if version != CURRENT_VERSION {
        return Ok(None);
    }

    let compressed = URL_SAFE_NO_PAD.decode(payload).map_err(|source| Error::FreezeDecode {
        reason: format!("invalid base64url payload: {source}"),
    })?;
    let mut decoder = DeflateDecoder::new(&compressed[..]);
    let mut json = Vec::new();
    decoder.read_to_end(&mut json)?;
    let value = serde_json::from_slice(&json).map_err(|source| Error::FreezeDecode {
        reason: format!("malformed frozen payload: {source}"),
    })?;
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FrozenConfig {
        let mut versions = AHashMap::new();
        versions.insert("maya".to_string(), "2020.0.0".to_string());
        let mut environment = AHashMap::new();
        environment.insert("HAB_URI".to_string(), Some(vec!["project_a/Sc001".to_string()]));
        let mut aliases = AHashMap::new();
        let mut linux_aliases = AHashMap::new();
        linux_aliases.insert(
            "maya".to_string(),
            FrozenAlias {
                cmd: serde_json::json!("maya"),
                environment: AHashMap::new(),
            },
        );
        aliases.insert("linux".to_string(), linux_aliases);
        FrozenConfig {
            uri: "project_a/Sc001".to_string(),
            versions,
            environment,
            aliases,
        }
    }

    #[test]
    fn round_trips_through_encode_decode() {
        let value = sample();
        let frozen = encode(&value).unwrap();
        assert!(frozen.starts_with("v1:"));
        let decoded: FrozenConfig = decode(&frozen).unwrap().unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn missing_prefix_is_an_error() {
        let err = decode::<FrozenConfig>("not-a-freeze-string").unwrap_err();
        assert!(matches!(err, Error::FreezeDecode { .. }));
    }

    #[test]
    fn non_integer_version_is_an_error() {
        let err = decode::<FrozenConfig>("vX:abc").unwrap_err();
        assert!(matches!(err, Error::FreezeDecode { .. }));
    }

    #[test]
    fn unsupported_version_decodes_to_none() {
        let result: Option<FrozenConfig> = decode("v2:abc").unwrap();
        assert!(result.is_none());
    }
}
