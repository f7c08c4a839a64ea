//! Components B and C: the `{key}`/`{key!e}`/`{;}` value formatter and the
//! unset/set/prepend/append environment merge engine, combined into one
//! module since every merge-engine operation value passes through the
//! formatter before it lands in an `EnvState`.

use rig_core::{AHashMap, EnvOps, Error, Result};
use rig_platform::{path_separator, ShellKind};

/// Interpolation names a user-supplied `variables` map may not define.
pub const RESERVED_VARIABLE_NAMES: [&str; 2] = ["relative_root", ";"];

const PATH_VAR: &str = "PATH";
const RESERVED_ENV_VAR: &str = "HAB_URI";

pub fn validate_variables(variables: &AHashMap<String, String>) -> Result<()> {
    for reserved in RESERVED_VARIABLE_NAMES {
        if variables.contains_key(reserved) {
            return Err(Error::ReservedVariableName {
                name: reserved.to_string(),
            });
        }
    }
    Ok(())
}

fn check_environment_ops(ops: &EnvOps) -> Result<()> {
    if ops.set.contains_key(PATH_VAR) {
        return Err(Error::EnvironmentRuleViolation {
            reason: "PATH cannot be set directly; use prepend/append".to_string(),
        });
    }
    if ops.unset.iter().any(|n| n == PATH_VAR) {
        return Err(Error::EnvironmentRuleViolation {
            reason: "PATH cannot be unset".to_string(),
        });
    }
    let names = ops
        .set
        .keys()
        .chain(ops.prepend.keys())
        .chain(ops.append.keys())
        .chain(ops.unset.iter());
    for name in names {
        if name == RESERVED_ENV_VAR {
            return Err(Error::EnvironmentRuleViolation {
                reason: format!("{RESERVED_ENV_VAR} is reserved and cannot appear in environment operations"),
            });
        }
    }
    Ok(())
}

/// Flattens a `set`/`prepend`/`append` operation's JSON value into the
/// ordered string fragments it contributes to a variable's list.
fn fragments_of(value: &serde_json::Value) -> Vec<String> {
    match value {
        serde_json::Value::Array(items) => items.iter().flat_map(fragments_of).collect(),
        serde_json::Value::String(s) => vec![s.clone()],
        serde_json::Value::Null => Vec::new(),
        other => vec![other.to_string()],
    }
}

/// Everything the formatter needs to resolve one operation's value: the
/// interpolation scope, the defining descriptor's `relative_root`, the
/// target shell (`Delayed` defers `{key!e}`/`{;}` to script emission), the
/// live process environment (for `expand=true` lookups), and whether
/// `expand` is in effect for this call.
pub struct FormatContext<'a> {
    pub variables: &'a AHashMap<String, String>,
    pub relative_root: &'a str,
    pub shell: ShellKind,
    pub process_env: Option<&'a AHashMap<String, String>>,
    pub expand: bool,
}

impl<'a> FormatContext<'a> {
    pub fn new(variables: &'a AHashMap<String, String>, relative_root: &'a str) -> Self {
        FormatContext {
            variables,
            relative_root,
            shell: ShellKind::Delayed,
            process_env: None,
            expand: false,
        }
    }
}

fn resolve_token(inner: &str, var_name: &str, ctx: &FormatContext) -> Result<String> {
    if inner == ";" {
        return Ok(match path_separator(ctx.shell, var_name) {
            Some(sep) => sep.to_string(),
            None => "{;}".to_string(),
        });
    }
    if let Some(key) = inner.strip_suffix("!e") {
        if ctx.expand {
            if let Some(value) = ctx.process_env.and_then(|env| env.get(key)) {
                return Ok(value.clone());
            }
        }
        return Ok(env_reference(ctx.shell, key));
    }
    if inner == "relative_root" {
        return Ok(ctx.relative_root.to_string());
    }
    ctx.variables.get(inner).cloned().ok_or_else(|| Error::EnvironmentRuleViolation {
        reason: format!("unknown interpolation variable '{{{inner}}}'"),
    })
}

fn env_reference(shell: ShellKind, key: &str) -> String {
    match shell {
        ShellKind::Batch => format!("%{key}%"),
        ShellKind::Ps => format!("$env:{key}"),
        ShellKind::Sh | ShellKind::ShWin => format!("${key}"),
        ShellKind::Delayed => format!("{{{key}!e}}"),
    }
}

/// Interpolates `{key}`, `{key!e}`, and `{;}` tokens in `template` (component
/// B). `var_name` identifies the environment variable this value is destined
/// for, so the Windows-bash `PATH` special case in `path_separator` applies.
pub fn format_value(template: &str, var_name: &str, ctx: &FormatContext) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = template[i + 1..].find('}') {
                let inner = &template[i + 1..i + 1 + end];
                if !inner.contains('{') {
                    out.push_str(&resolve_token(inner, var_name, ctx)?);
                    i += end + 2;
                    continue;
                }
            }
        }
        let ch_len = template[i..].chars().next().map(char::len_utf8).unwrap_or(1);
        out.push_str(&template[i..i + ch_len]);
        i += ch_len;
    }
    Ok(out)
}

fn format_fragments(fragments: Vec<String>, var_name: &str, ctx: &FormatContext) -> Result<Vec<String>> {
    fragments.into_iter().map(|f| format_value(&f, var_name, ctx)).collect()
}

/// One hab-managed environment variable: either an explicit unset, or an
/// ordered list of fragments joined with the target shell's path separator
/// at emission time.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvValue {
    Unset,
    List(Vec<String>),
}

/// The running state of one platform's composed environment as the merge
/// engine (component C) walks ancestor-before-child, config-before-distro
/// sources. `touched` tracks which variables have already received their
/// first hab-managed write, per the "initial-overwrite" rule (spec §4.3,
/// §9): the rule fires per composed environment, not per source file, so
/// this state threads through every source in the chain.
#[derive(Debug, Clone, Default)]
pub struct EnvState {
    vars: AHashMap<String, EnvValue>,
    touched: std::collections::HashSet<String>,
}

impl EnvState {
    pub fn new() -> Self {
        EnvState::default()
    }

    /// Seeds a variable with a pre-existing value (e.g. the current global
    /// composed value, carried in as the base for an alias's own
    /// environment overlay) and marks it touched so the next prepend/append
    /// extends rather than overwrites it.
    pub fn seed(&mut self, name: &str, value: Option<Vec<String>>) {
        self.vars.insert(
            name.to_string(),
            match value {
                Some(list) => EnvValue::List(list),
                None => EnvValue::Unset,
            },
        );
        self.touched.insert(name.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&EnvValue> {
        self.vars.get(name)
    }

    /// Applies one operations block in unset → set → prepend → append
    /// order, formatting each value against `ctx`.
    pub fn apply_ops(&mut self, ops: &EnvOps, ctx: &FormatContext) -> Result<()> {
        check_environment_ops(ops)?;

        for name in &ops.unset {
            self.vars.insert(name.clone(), EnvValue::Unset);
            self.touched.insert(name.clone());
        }
        for (name, value) in &ops.set {
            let fragments = format_fragments(fragments_of(value), name, ctx)?;
            self.vars.insert(name.clone(), EnvValue::List(fragments));
            self.touched.insert(name.clone());
        }
        for (name, value) in &ops.prepend {
            let fragments = format_fragments(fragments_of(value), name, ctx)?;
            self.apply_prepend_append(name, fragments, true);
        }
        for (name, value) in &ops.append {
            let fragments = format_fragments(fragments_of(value), name, ctx)?;
            self.apply_prepend_append(name, fragments, false);
        }
        Ok(())
    }

    fn apply_prepend_append(&mut self, name: &str, fragments: Vec<String>, prepend: bool) {
        if !self.touched.contains(name) {
            self.vars.insert(name.to_string(), EnvValue::List(fragments));
            self.touched.insert(name.to_string());
            return;
        }
        let entry = self.vars.entry(name.to_string()).or_insert_with(|| EnvValue::List(Vec::new()));
        match entry {
            EnvValue::Unset => *entry = EnvValue::List(fragments),
            EnvValue::List(list) => {
                if prepend {
                    let mut merged = fragments;
                    merged.extend(list.drain(..));
                    *list = merged;
                } else {
                    list.extend(fragments);
                }
            }
        }
    }

    /// Drains this state into the terminal environment map: `None` means
    /// "unset", `Some(list)` the ordered fragments to join at emission.
    pub fn into_map(self) -> AHashMap<String, Option<Vec<String>>> {
        self.vars
            .into_iter()
            .map(|(name, value)| {
                (
                    name,
                    match value {
                        EnvValue::Unset => None,
                        EnvValue::List(list) => Some(list),
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> (AHashMap<String, String>, FormatContext<'static>) {
        // leaked on purpose: test-only, lives for the process.
        let vars: &'static AHashMap<String, String> = Box::leak(Box::new(AHashMap::new()));
        let root: &'static str = "";
        (AHashMap::new(), FormatContext::new(vars, root))
    }

    #[test]
    fn first_prepend_on_untouched_variable_overwrites_not_concatenates() {
        let (_v, ctx) = ctx();
        let mut state = EnvState::new();
        let mut ops = EnvOps::default();
        ops.prepend.insert("APPEND".to_string(), json!("first"));
        state.apply_ops(&ops, &ctx).unwrap();
        assert_eq!(state.get("APPEND"), Some(&EnvValue::List(vec!["first".to_string()])));
    }

    #[test]
    fn ordering_scenario_parent_sets_then_child_appends() {
        let (_v, ctx) = ctx();
        let mut state = EnvState::new();
        let mut parent_ops = EnvOps::default();
        parent_ops.set.insert("APPEND".to_string(), json!("par"));
        state.apply_ops(&parent_ops, &ctx).unwrap();

        let mut child_ops = EnvOps::default();
        child_ops.append.insert("APPEND".to_string(), json!("ap"));
        state.apply_ops(&child_ops, &ctx).unwrap();

        assert_eq!(
            state.get("APPEND"),
            Some(&EnvValue::List(vec!["par".to_string(), "ap".to_string()]))
        );
    }

    #[test]
    fn path_cannot_be_set_or_unset() {
        let (_v, ctx) = ctx();
        let mut state = EnvState::new();
        let mut ops = EnvOps::default();
        ops.set.insert("PATH".to_string(), json!("/usr/bin"));
        assert!(state.apply_ops(&ops, &ctx).is_err());

        let mut ops = EnvOps::default();
        ops.unset.push("PATH".to_string());
        assert!(state.apply_ops(&ops, &ctx).is_err());
    }

    #[test]
    fn hab_uri_is_reserved() {
        let (_v, ctx) = ctx();
        let mut state = EnvState::new();
        let mut ops = EnvOps::default();
        ops.set.insert("HAB_URI".to_string(), json!("x"));
        assert!(state.apply_ops(&ops, &ctx).is_err());
    }

    #[test]
    fn delayed_shell_leaves_env_ref_and_pathsep_as_templates() {
        let (_v, ctx) = ctx();
        assert_eq!(format_value("{MAYA_VERSION!e}", "X", &ctx).unwrap(), "{MAYA_VERSION!e}");
        assert_eq!(format_value("a{;}b", "PATH", &ctx).unwrap(), "a{;}b");
    }

    #[test]
    fn sh_shell_resolves_env_ref_and_pathsep() {
        let vars = AHashMap::new();
        let mut ctx = FormatContext::new(&vars, "");
        ctx.shell = ShellKind::Sh;
        assert_eq!(format_value("{MAYA_VERSION!e}", "X", &ctx).unwrap(), "$MAYA_VERSION");
        assert_eq!(format_value("a{;}b", "PATH", &ctx).unwrap(), "a:b");
    }

    #[test]
    fn relative_root_and_plain_variable_interpolate() {
        let mut vars = AHashMap::new();
        vars.insert("tool".to_string(), "maya".to_string());
        let ctx = FormatContext::new(&vars, "/studio/configs/show");
        assert_eq!(format_value("{relative_root}/{tool}", "X", &ctx).unwrap(), "/studio/configs/show/maya");
    }

    #[test]
    fn reserved_variable_names_rejected() {
        let mut vars = AHashMap::new();
        vars.insert("relative_root".to_string(), "x".to_string());
        assert!(validate_variables(&vars).is_err());
    }
}
