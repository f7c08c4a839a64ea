//! Component J: turns a `FlatConfig` into the script files a shell sources
//! to activate, or spawns to launch, an environment.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use rig_core::{AHashMap, Result};
use rig_forest::{encode, format_value, AliasScript, FlatConfig, FormatContext};
use rig_platform::{path_separator, Platform, ShellKind};

use crate::escape::{escape_value, join_args};

/// Command-processor dialects can't define a function-like alias inline, so
/// each alias gets its own script file under `aliases/` instead (spec
/// §4.9).
fn needs_alias_files(shell: ShellKind) -> bool {
    matches!(shell, ShellKind::Batch)
}

fn comment_prefix(shell: ShellKind) -> &'static str {
    match shell {
        ShellKind::Batch => "rem",
        _ => "#",
    }
}

fn set_var_line(shell: ShellKind, name: &str, value: &str) -> String {
    match shell {
        ShellKind::Batch => format!("set \"{name}={value}\"\r\n"),
        ShellKind::Ps => format!("$env:{name} = \"{value}\"\n"),
        ShellKind::Sh | ShellKind::ShWin => format!("export {name}={}\n", escape_value(shell, value)),
        ShellKind::Delayed => format!("{name}={value}\n"),
    }
}

fn unset_var_line(shell: ShellKind, name: &str) -> String {
    match shell {
        ShellKind::Batch => format!("set \"{name}=\"\r\n"),
        ShellKind::Ps => format!("Remove-Item Env:\\{name} -ErrorAction SilentlyContinue\n"),
        _ => format!("unset {name}\n"),
    }
}

/// Resolves the remaining `{key!e}`/`{;}` delayed tokens a variable's
/// fragments may still carry (the merge engine leaves them literal until a
/// shell target is known), joins them with that shell's path separator, and
/// emits the set/unset line.
fn environment_line(shell: ShellKind, name: &str, value: &Option<Vec<String>>, variables: &AHashMap<String, String>) -> Result<String> {
    match value {
        None => Ok(unset_var_line(shell, name)),
        Some(fragments) => {
            let ctx = FormatContext {
                variables,
                relative_root: "",
                shell,
                process_env: None,
                expand: false,
            };
            let mut resolved = Vec::with_capacity(fragments.len());
            for fragment in fragments {
                resolved.push(format_value(fragment, name, &ctx)?);
            }
            let separator = path_separator(shell, name).unwrap_or(':');
            Ok(set_var_line(shell, name, &resolved.join(&separator.to_string())))
        }
    }
}

fn alias_cmd_string(shell: ShellKind, cmd: &serde_json::Value) -> String {
    match cmd {
        serde_json::Value::String(s) => escape_value(shell, s),
        serde_json::Value::Array(items) => {
            let strings: Vec<String> = items
                .iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            join_args(shell, &strings)
        }
        other => other.to_string(),
    }
}

fn alias_definition(shell: ShellKind, name: &str, alias: &AliasScript, variables: &AHashMap<String, String>) -> Result<String> {
    let mut out = String::new();
    for (var, value) in &alias.environment {
        out.push_str(&environment_line(shell, var, value, variables)?);
    }
    let cmd = alias_cmd_string(shell, &alias.cmd);
    match shell {
        ShellKind::Sh | ShellKind::ShWin => writeln!(out, "{name}() {{ {cmd} \"$@\"; }}").ok(),
        ShellKind::Ps => writeln!(out, "function {name} {{ & {cmd} @args }}").ok(),
        ShellKind::Batch => writeln!(out, "{cmd} %*").ok(),
        ShellKind::Delayed => writeln!(out, "alias {name}={cmd}").ok(),
    };
    Ok(out)
}

/// `hab_config<ext>`: sets/unsets every hab-managed variable, then defines
/// (or, for the command-processor dialect, registers a `doskey` pointing at)
/// every alias for `platform`.
pub fn config_script(flat: &FlatConfig, platform: Platform, ext: &str, current_platform: Platform) -> Result<String> {
    let shell = ShellKind::from_ext(ext, current_platform);
    let mut out = String::new();
    writeln!(out, "{} generated by rig for {}, do not edit by hand", comment_prefix(shell), flat.uri).ok();

    let mut names: Vec<&String> = flat.environment.keys().collect();
    names.sort();
    for name in names {
        out.push_str(&environment_line(shell, name, &flat.environment[name], &flat.variables)?);
    }

    let mut alias_names = flat.alias_names(platform);
    alias_names.sort();
    for name in &alias_names {
        let alias = flat.alias(platform, name)?;
        if needs_alias_files(shell) {
            writeln!(out, "doskey {name}=%~dp0aliases\\{name}{ext} $*").ok();
        } else {
            out.push_str(&alias_definition(shell, name, alias, &flat.variables)?);
        }
    }
    Ok(out)
}

/// `hab_launch<ext>`: sources the config script, sets `HAB_FREEZE`, and
/// either runs one named alias with extra arguments or drops into an
/// interactive shell (the "launch wrapper" templates from spec §4.9/§5).
pub fn launch_script(
    flat: &FlatConfig,
    ext: &str,
    current_platform: Platform,
    config_script_name: &str,
    alias: Option<&str>,
    extra_args: &[String],
    stay_open: bool,
) -> String {
    let shell = ShellKind::from_ext(ext, current_platform);
    let freeze = encode(&flat.to_frozen()).unwrap_or_default();
    let args = join_args(shell, extra_args);

    match shell {
        ShellKind::Sh | ShellKind::ShWin => {
            let mut out = format!("#!/usr/bin/env bash\nexport HAB_FREEZE='{freeze}'\nsource \"{config_script_name}\"\n");
            match alias {
                Some(name) => {
                    writeln!(out, "{name} {args}").ok();
                }
                None => out.push_str("set -e; exec bash --init-file \"$0\"\n"),
            }
            out
        }
        ShellKind::Batch => {
            let mut out = format!("@echo off\r\nset \"HAB_FREEZE={freeze}\"\r\ncall \"{config_script_name}\"\r\n");
            match alias {
                Some(name) => {
                    let _ = write!(out, "call {name} {args}\r\n");
                }
                None => out.push_str("cmd.exe /k\r\n"),
            }
            out
        }
        ShellKind::Ps => {
            let mut out = format!("$env:HAB_FREEZE = \"{freeze}\"\n. \"{config_script_name}\"\n");
            match alias {
                Some(name) => {
                    writeln!(out, "{name} {args}").ok();
                }
                None if stay_open => out.push_str("powershell.exe -ExecutionPolicy Unrestricted -NoExit\n"),
                None => out.push_str("powershell.exe -ExecutionPolicy Unrestricted -File $MyInvocation.MyCommand.Path\n"),
            }
            out
        }
        ShellKind::Delayed => String::new(),
    }
}

/// Writes `hab_config<ext>`, any per-alias files it needs, and
/// `hab_launch<ext>` into `out_dir`, returning every path written.
pub fn write_scripts(flat: &FlatConfig, platform: Platform, ext: &str, current_platform: Platform, out_dir: &Path) -> Result<Vec<PathBuf>> {
    let shell = ShellKind::from_ext(ext, current_platform);
    fs::create_dir_all(out_dir)?;
    let mut written = Vec::new();

    let config_name = format!("hab_config{ext}");
    let config_path = out_dir.join(&config_name);
    fs::write(&config_path, config_script(flat, platform, ext, current_platform)?)?;
    written.push(config_path);

    if needs_alias_files(shell) {
        let alias_dir = out_dir.join("aliases");
        fs::create_dir_all(&alias_dir)?;
        for name in flat.alias_names(platform) {
            let alias = flat.alias(platform, &name)?;
            let content = alias_definition(shell, &name, alias, &flat.variables)?;
            let path = alias_dir.join(format!("{name}{ext}"));
            fs::write(&path, content)?;
            written.push(path);
        }
    }

    let launch_path = out_dir.join(format!("hab_launch{ext}"));
    fs::write(&launch_path, launch_script(flat, ext, current_platform, &config_name, None, &[], false))?;
    written.push(launch_path);

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rig_core::Uri;

    fn sample_config() -> FlatConfig {
        let mut environment = AHashMap::new();
        environment.insert("MAYA_MODULE_PATH".to_string(), Some(vec!["/studio/modules".to_string()]));
        environment.insert("HAB_URI".to_string(), Some(vec!["project_a/Sc001".to_string()]));
        environment.insert("REMOVED".to_string(), None);
        let mut aliases = AHashMap::new();
        let mut linux = AHashMap::new();
        linux.insert(
            "maya".to_string(),
            AliasScript {
                cmd: serde_json::json!("maya"),
                environment: AHashMap::new(),
            },
        );
        aliases.insert(Platform::Linux, linux);
        FlatConfig {
            uri: Uri::parse("project_a/Sc001").unwrap(),
            name: "Sc001".to_string(),
            distros: AHashMap::new(),
            distro_order: Vec::new(),
            environment,
            aliases,
            variables: AHashMap::new(),
            min_verbosity: 0,
        }
    }

    #[test]
    fn sh_config_script_exports_and_unsets() {
        let flat = sample_config();
        let script = config_script(&flat, Platform::Linux, ".sh", Platform::Linux).unwrap();
        assert!(script.contains("export MAYA_MODULE_PATH=/studio/modules"));
        assert!(script.contains("unset REMOVED"));
        assert!(script.contains("maya() { maya \"$@\"; }"));
    }

    #[test]
    fn batch_dialect_registers_doskey_and_writes_alias_files() {
        let dir = tempfile::tempdir().unwrap();
        let flat = sample_config();
        let written = write_scripts(&flat, Platform::Linux, ".bat", Platform::Windows, dir.path()).unwrap();
        assert!(written.iter().any(|p| p.ends_with("aliases/maya.bat")));
        let config = std::fs::read_to_string(dir.path().join("hab_config.bat")).unwrap();
        assert!(config.contains("doskey maya="));
    }
}
