//! Lightweight classification of SQL text for log fields.

use once_cell::sync::Lazy;
use regex::Regex;

// Leading keyword, skipping any comment blocks already in front of it.
static LEADING_KEYWORD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*(?:/\*.*?\*/\s*)*([a-z]+)").expect("valid keyword regex")
});

static TABLE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:FROM|INTO|UPDATE)\s+[`"\[]?(\w+)[`"\]]?"#).expect("valid table regex")
});

/// Statement operation as reported in `db.operation`.
pub(crate) fn operation(sql: &str) -> &'static str {
    let keyword = LEADING_KEYWORD_REGEX
        .captures(sql)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_ascii_uppercase());

    match keyword.as_deref() {
        Some("SELECT") | Some("WITH") => "SELECT",
        Some("INSERT") => "INSERT",
        Some("UPDATE") => "UPDATE",
        Some("DELETE") => "DELETE",
        Some("BEGIN") | Some("START") => "BEGIN",
        Some("COMMIT") => "COMMIT",
        Some("ROLLBACK") => "ROLLBACK",
        Some(_) | None => "QUERY",
    }
}

/// Primary table targeted by `sql`, lower-cased, when it can be found.
pub(crate) fn table(sql: &str) -> Option<String> {
    TABLE_REGEX
        .captures(sql)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation() {
        assert_eq!(operation("SELECT * FROM users"), "SELECT");
        assert_eq!(operation("  with cte AS (SELECT 1) SELECT * FROM cte"), "SELECT");
        assert_eq!(operation("INSERT INTO users (name) VALUES ($1)"), "INSERT");
        assert_eq!(operation("update users SET name = $1"), "UPDATE");
        assert_eq!(operation("DELETE FROM users WHERE id = $1"), "DELETE");
        assert_eq!(operation("START TRANSACTION"), "BEGIN");
        assert_eq!(operation("VACUUM"), "QUERY");
        assert_eq!(operation(""), "QUERY");
    }

    #[test]
    fn test_operation_skips_leading_comments() {
        assert_eq!(operation("/* 2024: tag */\nSELECT 1"), "SELECT");
        assert_eq!(operation("/*\nDate: x\na\nb\n*/\nDELETE FROM t"), "DELETE");
    }

    #[test]
    fn test_table() {
        assert_eq!(table(r#"SELECT "id" FROM "Users""#), Some("users".to_string()));
        assert_eq!(table("INSERT INTO `grades` (`score`) VALUES (?)"), Some("grades".to_string()));
        assert_eq!(table("UPDATE students SET name = $1"), Some("students".to_string()));
        assert_eq!(table("DELETE FROM assignments"), Some("assignments".to_string()));
        assert_eq!(table("SELECT 1"), None);
    }
}
