use std::collections::HashMap;

/// Rewrite `@name` parameter references in `sql` into SQL Server's
/// positional `@P1, @P2, ...` syntax. Every occurrence gets its own
/// position even if the name repeats, since `tiberius` binds strictly by
/// position (spec §4.2 step 3: "For SQL Server: named parameters via the
/// vendor driver").
pub fn rewrite_mssql_placeholders(sql: &str) -> (String, Vec<String>) {
    let mut names = Vec::new();
    let out = scan_placeholders(sql, |name| {
        names.push(name.to_string());
        format!("@P{}", names.len())
    });
    (out, names)
}

/// Rewrite `@name` parameter references into SQLite's indexed `?N`
/// placeholders, deduplicating repeated references by name and ordering
/// the returned bind list by first-occurrence (spec §4.2 step 3). A
/// repeated name reuses the same `?N` index, which SQLite resolves to the
/// single bound value — so the caller only supplies one value per distinct name.
pub fn rewrite_sqlite_placeholders(sql: &str) -> (String, Vec<String>) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut names = Vec::new();
    let out = scan_placeholders(sql, |name| {
        let index = *seen.entry(name.to_string()).or_insert_with(|| {
            names.push(name.to_string());
            names.len()
        });
        format!("?{index}")
    });
    (out, names)
}

fn scan_placeholders(sql: &str, mut on_name: impl FnMut(&str) -> String) -> String {
    let mut out = String::with_capacity(sql.len());
    let bytes = sql.as_bytes();
    let mut i = 0;
    let mut in_single_quote = false;
    let mut in_double_quote = false;

    while i < bytes.len() {
        let c = bytes[i] as char;
        if in_single_quote {
            out.push(c);
            if c == '\'' {
                in_single_quote = false;
            }
            i += 1;
            continue;
        }
        if in_double_quote {
            out.push(c);
            if c == '"' {
                in_double_quote = false;
            }
            i += 1;
            continue;
        }
        match c {
            '\'' => {
                in_single_quote = true;
                out.push(c);
                i += 1;
            }
            '"' => {
                in_double_quote = true;
                out.push(c);
                i += 1;
            }
            '@' if is_name_start(bytes.get(i + 1).copied()) => {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && is_name_continue(bytes[end]) {
                    end += 1;
                }
                out.push_str(&on_name(&sql[start..end]));
                i = end;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

fn is_name_start(byte: Option<u8>) -> bool {
    matches!(byte, Some(b) if (b as char).is_ascii_alphabetic() || b == b'_')
}

fn is_name_continue(byte: u8) -> bool {
    (byte as char).is_ascii_alphanumeric() || byte == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mssql_rewrites_every_occurrence_positionally() {
        let (sql, names) = rewrite_mssql_placeholders("SELECT * FROM t WHERE a = @a AND b = @b");
        assert_eq!(sql, "SELECT * FROM t WHERE a = @P1 AND b = @P2");
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn mssql_repeats_name_for_each_occurrence() {
        let (sql, names) = rewrite_mssql_placeholders("SELECT * FROM t WHERE a = @x OR b = @x");
        assert_eq!(sql, "SELECT * FROM t WHERE a = @P1 OR b = @P2");
        assert_eq!(names, vec!["x".to_string(), "x".to_string()]);
    }

    #[test]
    fn sqlite_rewrites_single_occurrence() {
        let (sql, names) = rewrite_sqlite_placeholders("SELECT * FROM users WHERE id = @id");
        assert_eq!(sql, "SELECT * FROM users WHERE id = ?1");
        assert_eq!(names, vec!["id".to_string()]);
    }

    #[test]
    fn sqlite_dedupes_repeated_name_to_one_bind_value() {
        let (sql, names) = rewrite_sqlite_placeholders("SELECT * FROM t WHERE a = @x OR b = @x");
        assert_eq!(sql, "SELECT * FROM t WHERE a = ?1 OR b = ?1");
        assert_eq!(names, vec!["x".to_string()]);
    }

    #[test]
    fn sqlite_orders_by_first_occurrence() {
        let (sql, names) = rewrite_sqlite_placeholders("SELECT * FROM t WHERE b = @b AND a = @a AND b2 = @b");
        assert_eq!(sql, "SELECT * FROM t WHERE b = ?1 AND a = ?2 AND b2 = ?1");
        assert_eq!(names, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn ignores_at_inside_string_literal() {
        let (sql, names) = rewrite_sqlite_placeholders("SELECT '@notaparam' WHERE id = @id");
        assert_eq!(sql, "SELECT '@notaparam' WHERE id = ?1");
        assert_eq!(names, vec!["id".to_string()]);
    }
}
