//! Identifier handling for dynamically assembled SQL.

const MAX_IDENT_LEN: usize = 64;

/// Accepts plain MySQL identifiers: ASCII alphanumerics, `_` and `$`, at most 64 chars.
pub fn is_valid_ident(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_IDENT_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Backtick-quotes an identifier, doubling embedded backticks.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_identifiers() {
        assert!(is_valid_ident("users"));
        assert!(is_valid_ident("projectName"));
        assert!(is_valid_ident("db_port$2"));
        assert!(!is_valid_ident(""));
        assert!(!is_valid_ident("users; DROP TABLE bots"));
        assert!(!is_valid_ident("a-b"));
        assert!(!is_valid_ident(&"x".repeat(65)));
    }

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_ident("users"), "`users`");
        assert_eq!(quote_ident("we`ird"), "`we``ird`");
    }
}
