//! Statement splitting.
//!
//! The executor issues exactly one prepared statement per call, so batch
//! input has to be split (or rejected) before it reaches a driver. This
//! splitter understands single-quoted literals, double-quoted identifiers,
//! `--` line comments and `/* */` block comments; it does not understand
//! procedural blocks, which is why callers reject rather than auto-split
//! multi-statement input.

/// Split SQL on `;` delimiters, honoring literals and comments. Empty and
/// comment-only fragments are dropped; the delimiter itself is not kept.
pub fn split_statements(sql: &str) -> Vec<String> {
    let bytes = sql.as_bytes();
    let mut statements = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => {
                let quote = bytes[i];
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                i += 1;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
            }
            b';' => {
                push_fragment(&mut statements, &sql[start..i]);
                i += 1;
                start = i;
            }
            _ => {
                i += 1;
            }
        }
    }
    push_fragment(&mut statements, &sql[start..]);
    statements
}

/// True when the input holds at most one executable statement.
pub fn is_single_statement(sql: &str) -> bool {
    split_statements(sql).len() <= 1
}

fn push_fragment(statements: &mut Vec<String>, fragment: &str) {
    if !is_blank_or_comment(fragment) {
        statements.push(fragment.trim().to_string());
    }
}

fn is_blank_or_comment(fragment: &str) -> bool {
    let mut rest = fragment.trim_start();
    loop {
        if rest.is_empty() {
            return true;
        }
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.split_once('\n').map_or("", |(_, tail)| tail).trim_start();
            continue;
        }
        if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map_or("", |(_, tail)| tail).trim_start();
            continue;
        }
        return false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_statement_untouched() {
        assert_eq!(split_statements("SELECT 1"), vec!["SELECT 1"]);
        assert_eq!(split_statements("SELECT 1;"), vec!["SELECT 1"]);
        assert!(is_single_statement("SELECT 1;"));
    }

    #[test]
    fn test_splits_on_semicolons() {
        let statements = split_statements("SELECT 1; SELECT 2;\nSELECT 3");
        assert_eq!(statements, vec!["SELECT 1", "SELECT 2", "SELECT 3"]);
        assert!(!is_single_statement("SELECT 1; SELECT 2"));
    }

    #[test]
    fn test_semicolon_in_literal_and_identifier() {
        let statements = split_statements("SELECT ';' AS a, \"wei;rd\" FROM t");
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn test_comments_do_not_split_or_count() {
        let statements = split_statements("SELECT 1 -- trailing; not a delimiter\n; SELECT 2");
        assert_eq!(statements.len(), 2);

        let statements = split_statements("/* header; */ SELECT 1; -- done");
        assert_eq!(statements, vec!["/* header; */ SELECT 1"]);
    }

    #[test]
    fn test_blank_fragments_dropped() {
        assert!(split_statements("  ;;  ;").is_empty());
        assert!(split_statements("-- only a comment").is_empty());
        assert!(is_single_statement("-- only a comment"));
    }

    #[test]
    fn test_unterminated_literal_is_consumed() {
        let statements = split_statements("SELECT 'oops; no close");
        assert_eq!(statements.len(), 1);
    }
}
