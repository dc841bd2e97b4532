/// Helper utilities for the LGD CLI

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// Resolve a possibly relative path against the current directory
pub fn absolutize<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

/// Format a local timestamp the way backup listings show it
pub fn format_timestamp(time: &DateTime<Local>) -> String {
    time.format("%Y-%m-%d %H:%M").to_string()
}

/// Truncate string with ellipsis
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Quote an argument for the POSIX shell running `vagrant ssh -c`
///
/// Plain words pass through untouched so logged commands stay readable.
pub fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '=' | '@' | ','));

    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Join already-split words into one remote command line
pub fn shell_join<S: AsRef<str>>(words: &[S]) -> String {
    words
        .iter()
        .map(|w| shell_quote(w.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("shop-local-jdoe"), "shop-local-jdoe");
        assert_eq!(shell_quote("/home/vagrant/dev/temp/dump.sql"), "/home/vagrant/dev/temp/dump.sql");
        assert_eq!(shell_quote("ldb:/tmp/dump.sql"), "ldb:/tmp/dump.sql");
        assert_eq!(shell_quote("my shop"), "'my shop'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("{{.Names}}"), "'{{.Names}}'");
    }

    #[test]
    fn test_shell_join() {
        assert_eq!(
            shell_join(&["docker", "logs", "-f", "a b"]),
            "docker logs -f 'a b'"
        );
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("a-very-long-name", 8), "a-ver...");
    }

    #[test]
    fn test_format_timestamp() {
        let t = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        assert_eq!(format_timestamp(&t), "2024-03-09 14:05");
    }

    #[test]
    fn test_absolutize_keeps_absolute() {
        assert_eq!(absolutize("/opt/x"), PathBuf::from("/opt/x"));
        assert!(absolutize("dev").is_absolute());
    }
}
