//! Named-parameter SQL compilation.
//!
//! Translates `:name` placeholders into positional `?` markers while
//! recording the parameter order, so callers can bind from a name→value map.
//! PostgreSQL `::type` casts and string literals are left untouched.

use std::fmt;

/// The result of compiling a named-parameter query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedQuery {
    /// SQL with every placeholder replaced by `?`.
    pub positional_sql: String,
    /// Parameter names in positional order; index `i` binds parameter `i + 1`.
    pub param_names: Vec<String>,
}

impl fmt::Display for NamedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.positional_sql)
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Compile SQL with `:name` placeholders into positional form.
///
/// A colon starts a placeholder only when all of these hold:
/// - the scanner is outside a single-quoted string literal,
/// - the previous byte is not a colon (second half of a `::` cast),
/// - the next byte is not a colon (first half of a `::` cast),
/// - at least one name byte (`[A-Za-z0-9_]`) follows.
///
/// Everything else is copied through verbatim, so compilation never fails
/// and recompiling an already-positional query is a no-op.
pub fn compile(sql: &str) -> NamedQuery {
    let bytes = sql.as_bytes();
    let mut positional_sql = String::with_capacity(sql.len());
    let mut param_names = Vec::new();

    let mut in_literal = false;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\'' {
            in_literal = !in_literal;
            positional_sql.push('\'');
            i += 1;
            continue;
        }
        if b == b':' && !in_literal {
            let prev_is_colon = i > 0 && bytes[i - 1] == b':';
            let next_is_colon = bytes.get(i + 1) == Some(&b':');
            if !prev_is_colon && !next_is_colon {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && is_name_byte(bytes[end]) {
                    end += 1;
                }
                if end > start {
                    // Placeholder bytes are all ASCII, so the slice is valid UTF-8.
                    param_names.push(sql[start..end].to_string());
                    positional_sql.push('?');
                    i = end;
                    continue;
                }
            }
        }
        // Copy the whole UTF-8 scalar so multi-byte characters survive.
        let ch_len = utf8_len(b);
        positional_sql.push_str(&sql[i..i + ch_len]);
        i += ch_len;
    }

    NamedQuery {
        positional_sql,
        param_names,
    }
}

fn utf8_len(first_byte: u8) -> usize {
    match first_byte {
        b if b < 0x80 => 1,
        b if b >= 0xF0 => 4,
        b if b >= 0xE0 => 3,
        _ => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_placeholders() {
        let q = compile("SELECT * FROM t WHERE a = :a AND b = :b");
        assert_eq!(q.positional_sql, "SELECT * FROM t WHERE a = ? AND b = ?");
        assert_eq!(q.param_names, vec!["a", "b"]);
    }

    #[test]
    fn test_repeated_name_binds_twice() {
        let q = compile("SELECT :x + :x");
        assert_eq!(q.positional_sql, "SELECT ? + ?");
        assert_eq!(q.param_names, vec!["x", "x"]);
    }

    #[test]
    fn test_pg_cast_and_literal() {
        let q = compile(
            "SELECT :id, NULL::bigint FROM t WHERE name = ':literal' AND x = :x",
        );
        assert_eq!(
            q.positional_sql,
            "SELECT ?, NULL::bigint FROM t WHERE name = ':literal' AND x = ?"
        );
        assert_eq!(q.param_names, vec!["id", "x"]);
    }

    #[test]
    fn test_colon_without_name_passes_through() {
        let q = compile("SELECT ': ' || : FROM t");
        assert_eq!(q.positional_sql, "SELECT ': ' || : FROM t");
        assert!(q.param_names.is_empty());
    }

    #[test]
    fn test_trailing_colon() {
        let q = compile("SELECT 1:");
        assert_eq!(q.positional_sql, "SELECT 1:");
        assert!(q.param_names.is_empty());
    }

    #[test]
    fn test_numeric_and_underscore_names() {
        let q = compile("WHERE a = :p1 AND b = :my_param");
        assert_eq!(q.param_names, vec!["p1", "my_param"]);
    }

    #[test]
    fn test_literal_toggling() {
        let q = compile("SELECT ':a', :b, ''':c'");
        // The doubled quote closes and reopens the literal, so :c stays inside.
        assert_eq!(q.positional_sql, "SELECT ':a', ?, ''':c'");
        assert_eq!(q.param_names, vec!["b"]);
    }

    #[test]
    fn test_recompilation_is_idempotent() {
        let once = compile("SELECT :id, NULL::bigint FROM t WHERE x = :x");
        let twice = compile(&once.positional_sql);
        assert_eq!(twice.positional_sql, once.positional_sql);
        assert!(twice.param_names.is_empty());
    }

    #[test]
    fn test_multibyte_passthrough() {
        let q = compile("SELECT '☃' || :name");
        assert_eq!(q.positional_sql, "SELECT '☃' || ?");
        assert_eq!(q.param_names, vec!["name"]);
    }
}
