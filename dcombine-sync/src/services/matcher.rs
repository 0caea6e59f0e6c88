//! Contact matcher
//!
//! Scores stored contacts against an email address and/or a name. Keys of
//! the result are remote contact ids.
//!
//! | Match                    | Score |
//! |--------------------------|-------|
//! | first name only          | 5     |
//! | last name only           | 10    |
//! | first and last name      | 50    |
//! | email address (additive) | +100  |

use dcombine_common::Result;
use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashSet};

const FIRST_NAME_SCORE: u32 = 5;
const LAST_NAME_SCORE: u32 = 10;
const FULL_NAME_SCORE: u32 = 50;
const EMAIL_SCORE: u32 = 100;

/// Upper-case the first character and lower-case the rest
pub fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Score stored contacts against the given criteria
///
/// Empty criteria are ignored; with none given the result is empty.
pub async fn match_contacts(
    pool: &SqlitePool,
    email: Option<&str>,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> Result<BTreeMap<i64, u32>> {
    let first_name = first_name.filter(|s| !s.is_empty());
    let last_name = last_name.filter(|s| !s.is_empty());
    let email = email.filter(|s| !s.is_empty());

    let mut results = BTreeMap::new();

    let first_matches = match first_name {
        Some(name) => ids_where(pool, "first_name", &capitalize(name)).await?,
        None => Vec::new(),
    };
    let last_matches: HashSet<i64> = match last_name {
        Some(name) => ids_where(pool, "last_name", &capitalize(name)).await?.into_iter().collect(),
        None => HashSet::new(),
    };

    for id in &first_matches {
        let score = if last_matches.contains(id) {
            FULL_NAME_SCORE
        } else {
            FIRST_NAME_SCORE
        };
        results.insert(*id, score);
    }
    for id in &last_matches {
        results.entry(*id).or_insert(LAST_NAME_SCORE);
    }

    if let Some(email) = email {
        let email_matches: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT c.cc_id
            FROM contacts c
            JOIN email_addresses e ON e.contact_id = c.guid
            WHERE e.email_address = ?
            "#,
        )
        .bind(email)
        .fetch_all(pool)
        .await?;

        for id in email_matches {
            *results.entry(id).or_insert(0) += EMAIL_SCORE;
        }
    }

    Ok(results)
}

async fn ids_where(pool: &SqlitePool, column: &str, value: &str) -> Result<Vec<i64>> {
    let sql = format!("SELECT cc_id FROM contacts WHERE {} = ?", column);
    let ids = sqlx::query_scalar(&sql).bind(value).fetch_all(pool).await?;
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("mcDONALD"), "Mcdonald");
        assert_eq!(capitalize("ann"), "Ann");
        assert_eq!(capitalize(""), "");
    }
}
