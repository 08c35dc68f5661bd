#![allow(clippy::module_name_repetitions)]
//! Small utilities: subprocess execution, process groups, shell quoting and tokenization.

pub mod exec;
pub mod process;

pub use exec::{ExecError, ExecOutput, ExecRequest, ExecService};

/// Render an argv as a copy-pasteable shell line (for logs and previews only).
pub fn shell_join(args: &[String]) -> String {
    args.iter()
        .map(|a| shell_escape(a))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn shell_escape(s: &str) -> String {
    if s.is_empty() {
        "''".to_string()
    } else if s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_=./:@".contains(c))
    {
        s.to_string()
    } else {
        let escaped = s.replace('\'', "'\"'\"'");
        format!("'{}'", escaped)
    }
}

/// Minimal shell-like tokenizer supporting single and double quotes.
/// Does not support escapes; quotes preserve spaces.
pub fn shell_like_split_args(s: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;

    for ch in s.chars() {
        match ch {
            '\'' if !in_double => {
                in_single = !in_single;
            }
            '"' if !in_single => {
                in_double = !in_double;
            }
            c if c.is_whitespace() && !in_single && !in_double => {
                if !current.is_empty() {
                    out.push(current.clone());
                    current.clear();
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Last `n` lines of `text`, joined with '\n'.
pub fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_escape_quotes_only_when_needed() {
        assert_eq!(shell_escape("hardhat"), "hardhat");
        assert_eq!(shell_escape("a b"), "'a b'");
        assert_eq!(shell_escape("O'Reilly"), "'O'\"'\"'Reilly'");
        assert_eq!(shell_escape(""), "''");
    }

    #[test]
    fn shell_join_preview() {
        let args = vec!["npx".to_string(), "hardhat".to_string(), "run task".to_string()];
        assert_eq!(shell_join(&args), "npx hardhat 'run task'");
    }

    #[test]
    fn split_args_respects_quotes() {
        assert_eq!(
            shell_like_split_args(r#"hardhat --network "my net" 'a b'"#),
            vec!["hardhat", "--network", "my net", "a b"]
        );
        assert!(shell_like_split_args("   ").is_empty());
    }

    #[test]
    fn tail_lines_keeps_last() {
        assert_eq!(tail_lines("a\nb\nc\n", 2), "b\nc");
        assert_eq!(tail_lines("a", 5), "a");
    }
}
