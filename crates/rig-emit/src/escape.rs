use rig_platform::ShellKind;

/// Escapes one value for inline use in a shell command line (spec §4.9):
/// PowerShell uses a backtick before a space, POSIX shells and the
/// command-processor dialect quote the whole value when it contains
/// whitespace.
pub fn escape_value(shell: ShellKind, value: &str) -> String {
    match shell {
        ShellKind::Ps => value.replace(' ', "` "),
        ShellKind::Batch => {
            if value.contains(' ') || value.contains('"') {
                format!("\"{}\"", value.replace('"', "\"\""))
            } else {
                value.to_string()
            }
        }
        ShellKind::Sh | ShellKind::ShWin => {
            if value.chars().any(|c| c.is_whitespace() || c == '"' || c == '$') {
                format!("'{}'", value.replace('\'', "'\\''"))
            } else {
                value.to_string()
            }
        }
        ShellKind::Delayed => value.to_string(),
    }
}

/// Joins an argument list the way the target shell's own command line would:
/// each argument escaped independently, then space-joined.
pub fn join_args(shell: ShellKind, args: &[String]) -> String {
    args.iter().map(|a| escape_value(shell, a)).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn powershell_escapes_spaces_with_a_backtick() {
        assert_eq!(escape_value(ShellKind::Ps, "Program Files"), "Program` Files");
    }

    #[test]
    fn posix_quotes_values_with_whitespace() {
        assert_eq!(escape_value(ShellKind::Sh, "a b"), "'a b'");
        assert_eq!(escape_value(ShellKind::Sh, "noSpaces"), "noSpaces");
    }

    #[test]
    fn batch_quotes_values_with_whitespace() {
        assert_eq!(escape_value(ShellKind::Batch, "a b"), "\"a b\"");
    }
}
