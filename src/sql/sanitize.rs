//! SQL identifier utilities
//!
//! Quoting and validation for the identifiers the crate writes into SQL
//! itself (junction tables and their key columns), plus the naming
//! normalization used to derive default table and column names.

/// Quote a SQL identifier to make it safe for use in queries
///
/// # Example
/// ```
/// use runtara_filter::sql::quote_identifier;
///
/// assert_eq!(quote_identifier("user_roles"), "\"user_roles\"");
/// ```
pub fn quote_identifier(identifier: &str) -> String {
    let escaped = identifier.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// Validate a bare table or column name
///
/// Rules:
/// - Must start with a lowercase letter or underscore
/// - Can only contain lowercase letters, numbers, and underscores
///
/// # Example
/// ```
/// use runtara_filter::sql::validate_identifier;
///
/// assert!(validate_identifier("user_roles").is_ok());
/// assert!(validate_identifier("user roles").is_err());
/// ```
pub fn validate_identifier(name: &str) -> Result<(), String> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err("Identifier cannot be empty".to_string());
    };

    let valid_start = first.is_ascii_lowercase() || first == '_';
    let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !valid_start || !valid_rest {
        return Err(format!(
            "Identifier '{}' is invalid. Must start with a lowercase letter or underscore and contain only lowercase letters, numbers, and underscores.",
            name
        ));
    }

    Ok(())
}

/// Normalize a name to lower snake case
///
/// Word boundaries are camelCase humps, acronym ends, spaces and hyphens.
///
/// # Example
/// ```
/// use runtara_filter::sql::to_snake_case;
///
/// assert_eq!(to_snake_case("firstName"), "first_name");
/// assert_eq!(to_snake_case("DealFilterView"), "deal_filter_view");
/// assert_eq!(to_snake_case("userID"), "user_id");
/// ```
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.trim().chars().collect();
    let mut out = String::with_capacity(chars.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c == ' ' || c == '-' || c == '_' {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }

        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let after_lower = prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit());
            let acronym_end =
                prev.is_some_and(char::is_uppercase) && next.is_some_and(char::is_lowercase);
            if (after_lower || acronym_end) && !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }

    out.trim_end_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // quote_identifier Tests
    // =========================================================================

    #[test]
    fn test_quote_identifier_simple() {
        assert_eq!(quote_identifier("user_roles"), "\"user_roles\"");
        assert_eq!(quote_identifier("a"), "\"a\"");
    }

    #[test]
    fn test_quote_identifier_escapes_quotes() {
        assert_eq!(
            quote_identifier("roles\"; DROP TABLE users; --"),
            "\"roles\"\"; DROP TABLE users; --\""
        );
    }

    // =========================================================================
    // validate_identifier Tests
    // =========================================================================

    #[test]
    fn test_validate_identifier_valid() {
        assert!(validate_identifier("user_roles").is_ok());
        assert!(validate_identifier("role_id").is_ok());
        assert!(validate_identifier("_internal").is_ok());
        assert!(validate_identifier("t1").is_ok());
    }

    #[test]
    fn test_validate_identifier_invalid() {
        assert!(validate_identifier("").unwrap_err().contains("cannot be empty"));
        assert!(validate_identifier("1roles").is_err());
        assert!(validate_identifier("UserRoles").is_err());
        assert!(validate_identifier("user-roles").is_err());
        assert!(validate_identifier("public.user_roles").is_err());
        assert!(validate_identifier("roles; --").is_err());
    }

    // =========================================================================
    // to_snake_case Tests
    // =========================================================================

    #[test]
    fn test_snake_case_camel() {
        assert_eq!(to_snake_case("userId"), "user_id");
        assert_eq!(to_snake_case("firstName"), "first_name");
        assert_eq!(to_snake_case("programBudget"), "program_budget");
        assert_eq!(to_snake_case("User"), "user");
    }

    #[test]
    fn test_snake_case_acronyms_and_separators() {
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("dealID"), "deal_id");
        assert_eq!(to_snake_case("line 2 Total"), "line_2_total");
        assert_eq!(to_snake_case("deal-status"), "deal_status");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
        assert_eq!(to_snake_case("version2Name"), "version2_name");
    }
}
