use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};

use crate::AHashMap;

/// One block of environment operations: `unset` removes, `set` replaces,
/// `prepend`/`append` extend a list. Values are left as raw JSON here
/// (string or array of strings) since they may still contain `{key}`
/// interpolation templates that only the formatter (in `rig-forest`) can
/// resolve, with a variable scope this crate has no access to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvOps {
    #[serde(default)]
    pub unset: Vec<String>,
    #[serde(default)]
    pub set: AHashMap<String, serde_json::Value>,
    #[serde(default)]
    pub prepend: AHashMap<String, serde_json::Value>,
    #[serde(default)]
    pub append: AHashMap<String, serde_json::Value>,
}

impl EnvOps {
    pub fn is_empty(&self) -> bool {
        self.unset.is_empty() && self.set.is_empty() && self.prepend.is_empty() && self.append.is_empty()
    }
}

const OP_KEYS: [&str; 4] = ["set", "unset", "prepend", "append"];

/// An `environment` (or `alias_mods` sub-entry) block as declared in a
/// descriptor: either directly a set of operations applying to every
/// platform, or a per-platform mapping (`"*"` is the platform wildcard,
/// evaluated before the specific platform's own block).
#[derive(Debug, Clone)]
pub enum EnvConfig {
    Agnostic(EnvOps),
    PerPlatform(AHashMap<String, EnvOps>),
}

impl EnvConfig {
    /// The ordered list of blocks to apply for `platform`: the wildcard
    /// block first (if any), then the platform-specific block (if any).
    pub fn blocks_for(&self, platform_name: &str) -> Vec<&EnvOps> {
        match self {
            EnvConfig::Agnostic(ops) => vec![ops],
            EnvConfig::PerPlatform(map) => {
                let mut blocks = Vec::new();
                if let Some(wildcard) = map.get("*") {
                    blocks.push(wildcard);
                }
                if let Some(specific) = map.get(platform_name) {
                    blocks.push(specific);
                }
                blocks
            }
        }
    }
}

impl<'de> Deserialize<'de> for EnvConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        let obj = value
            .as_object()
            .ok_or_else(|| D::Error::custom("environment block must be a JSON object"))?;
        if obj.keys().all(|k| OP_KEYS.contains(&k.as_str())) {
            let ops: EnvOps = serde_json::from_value(value).map_err(D::Error::custom)?;
            Ok(EnvConfig::Agnostic(ops))
        } else {
            let per: AHashMap<String, EnvOps> = serde_json::from_value(value).map_err(D::Error::custom)?;
            Ok(EnvConfig::PerPlatform(per))
        }
    }
}

impl Serialize for EnvConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            EnvConfig::Agnostic(ops) => ops.serialize(serializer),
            EnvConfig::PerPlatform(map) => map.serialize(serializer),
        }
    }
}

/// An alias's command, either the bare `cmd` value or a dict also carrying
/// an `environment` overlay applied only while that alias runs.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AliasValue {
    Cmd(serde_json::Value),
    Full {
        cmd: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        environment: Option<EnvOps>,
    },
}

impl AliasValue {
    pub fn cmd(&self) -> &serde_json::Value {
        match self {
            AliasValue::Cmd(v) => v,
            AliasValue::Full { cmd, .. } => cmd,
        }
    }

    pub fn environment(&self) -> Option<&EnvOps> {
        match self {
            AliasValue::Cmd(_) => None,
            AliasValue::Full { environment, .. } => environment.as_ref(),
        }
    }
}

/// Per-platform (or `"*"`) list of `(name, value)` alias definitions, in
/// declaration order — order matters for the "first definition wins"
/// duplicate-alias rule.
pub type AliasTable = AHashMap<String, Vec<(String, AliasValue)>>;

/// Per-platform (or `"*"`) ordered list of `(alias name, environment patch)`
/// modifications applied, in order, to aliases produced by other nodes or
/// distros.
pub type AliasMods = AHashMap<String, Vec<(String, EnvOps)>>;
