//! Status code derivation for contacts, lists and memberships

use super::field_map::STATUS_CHOICES;

/// Contact status code: first two letters, case-insensitive, looked up in the
/// status choices. Empty when absent or unrecognized.
pub fn contact_status_code(status: Option<&str>) -> String {
    let Some(status) = status.filter(|s| !s.is_empty()) else {
        return String::new();
    };
    let prefix: String = status.chars().take(2).collect::<String>().to_uppercase();
    STATUS_CHOICES
        .iter()
        .find(|(code, _)| *code == prefix)
        .map(|(code, _)| code.to_string())
        .unwrap_or_default()
}

/// List status: `AC` for anything starting with `A`, otherwise `HI`
pub fn list_status_code(status: Option<&str>) -> &'static str {
    match status {
        Some(s) if s.starts_with('A') => "AC",
        _ => "HI",
    }
}

/// Membership status: `HI` for anything starting with `H`, otherwise `AC`
pub fn membership_status_code(status: Option<&str>) -> &'static str {
    match status {
        Some(s) if s.starts_with('H') => "HI",
        _ => "AC",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_status_code() {
        assert_eq!(contact_status_code(Some("ACTIVE")), "AC");
        assert_eq!(contact_status_code(Some("non_subscriber")), "NO");
        assert_eq!(contact_status_code(Some("Optout")), "OP");
        assert_eq!(contact_status_code(Some("")), "");
        assert_eq!(contact_status_code(None), "");
        assert_eq!(contact_status_code(Some("PENDING")), "");
    }

    #[test]
    fn test_list_and_membership_status() {
        assert_eq!(list_status_code(Some("ACTIVE")), "AC");
        assert_eq!(list_status_code(Some("HIDDEN")), "HI");
        assert_eq!(membership_status_code(Some("HIDDEN")), "HI");
        assert_eq!(membership_status_code(Some("ACTIVE")), "AC");
        assert_eq!(membership_status_code(None), "AC");
    }
}
