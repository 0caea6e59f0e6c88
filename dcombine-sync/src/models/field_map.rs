//! Field-mapping tables
//!
//! Every reconciled entity has a statically declared table describing how a
//! remote JSON record maps onto local columns: which remote key feeds each
//! column, how the value is interpreted, and how wide the column is. The
//! tables are checked once by [`validate_all`] when the reconciler is built.
//!
//! Columns prefixed with `cc_` hold remote values under the unprefixed remote
//! key (`cc_id` <- `id`).

use dcombine_common::{time, Error, Result};
use serde_json::Value;
use std::collections::HashSet;

/// `(code, label)` pairs; the label is matched after [`choice_key`] normalization
pub type Choices = &'static [(&'static str, &'static str)];

pub const ADDRESS_TYPE_CHOICES: Choices = &[("BU", "Business"), ("PE", "Personal")];

pub const CONFIRM_STATUS_CHOICES: Choices = &[
    ("CO", "Confirmed"),
    ("NC", "No Confirmation Required"),
];

pub const STATUS_CHOICES: Choices = &[
    ("UN", "Unconfirmed"),
    ("AC", "Active"),
    ("OP", "Optout"),
    ("RE", "Removed"),
    ("NO", "Non Subscriber"),
];

pub const OPT_IN_SOURCE_CHOICES: Choices = &[
    ("AO", "Action by Owner"),
    ("AV", "Action by Visitor"),
];

pub const LIST_STATUS_CHOICES: Choices = &[("AC", "Active"), ("HI", "Hidden")];

/// How a remote value is interpreted for a column
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// Free text with a storage width
    Text { max: usize },
    /// Enumerated value stored as its short code; unknown labels become NULL
    Choice { choices: Choices, max: usize },
    /// Extended ISO-8601 timestamp, stored normalized
    Timestamp,
    /// Unbounded text
    Body,
    /// Numeric remote identifier, sent either as a JSON number or a string
    Integer,
}

/// One local column and the remote key that feeds it
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub column: &'static str,
    pub remote: &'static str,
    pub kind: FieldKind,
    pub nullable: bool,
}

impl FieldSpec {
    const fn new(column: &'static str, remote: &'static str, kind: FieldKind) -> Self {
        Self { column, remote, kind, nullable: true }
    }

    const fn required(self) -> Self {
        Self { nullable: false, ..self }
    }
}

/// Mapping for one entity type
#[derive(Debug)]
pub struct EntityMapping {
    /// Entity name used in log and error messages
    pub entity: &'static str,
    /// Local table
    pub table: &'static str,
    /// Key of the record array in the enclosing remote document
    pub collection: &'static str,
    /// Column holding the remote sub-identifier
    pub identity: &'static str,
    pub fields: &'static [FieldSpec],
}

const fn text(column: &'static str, remote: &'static str, max: usize) -> FieldSpec {
    FieldSpec::new(column, remote, FieldKind::Text { max })
}

const fn choice(column: &'static str, remote: &'static str, choices: Choices, max: usize) -> FieldSpec {
    FieldSpec::new(column, remote, FieldKind::Choice { choices, max })
}

const fn integer(column: &'static str, remote: &'static str) -> FieldSpec {
    FieldSpec::new(column, remote, FieldKind::Integer)
}

const fn timestamp(column: &'static str, remote: &'static str) -> FieldSpec {
    FieldSpec::new(column, remote, FieldKind::Timestamp)
}

pub static ADDRESS: EntityMapping = EntityMapping {
    entity: "Address",
    table: "addresses",
    collection: "addresses",
    identity: "cc_id",
    fields: &[
        text("cc_id", "id", 36).required(),
        choice("address_type", "address_type", ADDRESS_TYPE_CHOICES, 2),
        text("city", "city", 32),
        text("country_code", "country_code", 2),
        text("line1", "line1", 100),
        text("line2", "line2", 100),
        text("line3", "line3", 100),
        text("postal_code", "postal_code", 10),
        text("state", "state", 20),
        text("state_code", "state_code", 2),
        text("sub_postal_code", "sub_postal_code", 20),
    ],
};

pub static EMAIL_ADDRESS: EntityMapping = EntityMapping {
    entity: "EmailAddress",
    table: "email_addresses",
    collection: "email_addresses",
    identity: "cc_id",
    fields: &[
        text("cc_id", "id", 36).required(),
        choice("confirm_status", "confirm_status", CONFIRM_STATUS_CHOICES, 3),
        choice("status", "status", STATUS_CHOICES, 2),
        timestamp("opt_in_date", "opt_in_date"),
        timestamp("opt_out_date", "opt_out_date"),
        text("email_address", "email_address", 254),
        choice("opt_in_source", "opt_in_source", OPT_IN_SOURCE_CHOICES, 2),
    ],
};

pub static NOTE: EntityMapping = EntityMapping {
    entity: "Note",
    table: "notes",
    collection: "notes",
    identity: "cc_id",
    fields: &[
        text("cc_id", "id", 36).required(),
        timestamp("created_date", "created_date"),
        timestamp("modified_date", "modified_date"),
        FieldSpec::new("note", "note", FieldKind::Body),
    ],
};

/// Contact scalar columns; status and confirmed are handled by the
/// reconciler directly
pub static CONTACT: EntityMapping = EntityMapping {
    entity: "Contact",
    table: "contacts",
    collection: "contacts",
    identity: "cc_id",
    fields: &[
        integer("cc_id", "id").required(),
        text("first_name", "first_name", 50),
        text("middle_name", "middle_name", 50),
        text("last_name", "last_name", 50),
        text("company_name", "company_name", 100),
        text("job_title", "job_title", 50),
        text("prefix_name", "prefix_name", 10),
        text("source", "source", 50),
        timestamp("created_date", "created_date").required(),
        timestamp("cc_modified_date", "modified_date").required(),
    ],
};

pub static REMOTE_LIST: EntityMapping = EntityMapping {
    entity: "List",
    table: "remote_lists",
    collection: "cclists",
    identity: "cc_id",
    fields: &[
        integer("cc_id", "id").required(),
        text("name", "name", 48).required(),
        timestamp("created_date", "created_date").required(),
        timestamp("modified_date", "modified_date").required(),
    ],
};

/// Sub-record mappings stored through the generic repository
pub static SUB_RECORDS: [&EntityMapping; 3] = [&ADDRESS, &EMAIL_ADDRESS, &NOTE];

/// Every declared mapping
pub static ALL_MAPPINGS: [&EntityMapping; 5] = [&ADDRESS, &EMAIL_ADDRESS, &NOTE, &CONTACT, &REMOTE_LIST];

/// Normalize a choice label or incoming value for lookup
pub fn choice_key(value: &str) -> String {
    value.to_uppercase().replace(' ', "_")
}

/// Translate an incoming enumerated value to its short code
pub fn lookup_choice(choices: Choices, value: &str) -> Option<&'static str> {
    let key = choice_key(value);
    choices
        .iter()
        .find(|(_, label)| choice_key(label) == key)
        .map(|(code, _)| *code)
}

/// Translate a short code back to the remote enumerated value
pub fn choice_label(choices: Choices, code: &str) -> Option<String> {
    choices
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, label)| choice_key(label))
}

/// Check every mapping table for internal consistency
pub fn validate_all() -> Result<()> {
    for mapping in ALL_MAPPINGS {
        mapping.validate()?;
    }
    Ok(())
}

/// Column values produced from one remote record
#[derive(Debug, Clone, PartialEq)]
pub struct MappedRow {
    pub values: Vec<(&'static str, Option<String>)>,
}

impl MappedRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(c, _)| *c == column)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.values.iter().map(|(c, _)| *c)
    }

    /// Numeric value of an `Integer` column
    pub fn get_i64(&self, column: &str) -> Result<i64> {
        self.get(column)
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| Error::InvalidInput(format!("missing numeric '{}'", column)))
    }
}

impl EntityMapping {
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for field in self.fields {
            if !seen.insert(field.column) {
                return Err(Error::Config(format!(
                    "{} maps column '{}' more than once",
                    self.entity, field.column
                )));
            }

            if let Some(stripped) = field.column.strip_prefix("cc_") {
                if field.remote != stripped {
                    return Err(Error::Config(format!(
                        "{}.{} must map from remote key '{}', not '{}'",
                        self.entity, field.column, stripped, field.remote
                    )));
                }
            }

            if let FieldKind::Choice { choices, max } = field.kind {
                if let Some((code, _)) = choices.iter().find(|(code, _)| code.len() > max) {
                    return Err(Error::Config(format!(
                        "{}.{} choice code '{}' is wider than {}",
                        self.entity, field.column, code, max
                    )));
                }
            }
        }

        let identities = self
            .fields
            .iter()
            .filter(|f| f.column == self.identity)
            .count();
        if identities != 1 {
            return Err(Error::Config(format!(
                "{} must declare identity column '{}' exactly once, found {}",
                self.entity, self.identity, identities
            )));
        }

        Ok(())
    }

    pub fn field(&self, column: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.column == column)
    }

    /// Map a remote record onto this entity's columns
    ///
    /// # Errors
    /// - `Error::FieldOverflow` when a text value is wider than its column
    /// - `Error::Format` when a timestamp is not extended ISO-8601
    /// - `Error::InvalidInput` when a required value is missing
    pub fn map_record(&self, record: &Value) -> Result<MappedRow> {
        let mut values = Vec::with_capacity(self.fields.len());

        for field in self.fields {
            let raw = scalar_text(record.get(field.remote));

            let value = match (field.kind, raw) {
                (_, None) => None,
                (FieldKind::Text { max }, Some(v)) => {
                    if v.chars().count() > max {
                        return Err(Error::overflow(self.entity, field.column, &v, max));
                    }
                    Some(v)
                }
                (FieldKind::Choice { choices, .. }, Some(v)) => {
                    lookup_choice(choices, &v).map(String::from)
                }
                (FieldKind::Timestamp, Some(v)) if v.is_empty() => None,
                (FieldKind::Timestamp, Some(v)) => Some(time::normalize_iso8601(&v)?),
                (FieldKind::Body, Some(v)) => Some(v),
                (FieldKind::Integer, Some(v)) => {
                    let id: i64 = v.trim().parse().map_err(|_| {
                        Error::InvalidInput(format!(
                            "{}.{}={:?} is not a numeric id",
                            self.entity, field.column, v
                        ))
                    })?;
                    Some(id.to_string())
                }
            };

            if value.is_none() && !field.nullable {
                return Err(Error::InvalidInput(format!(
                    "{} record has no '{}'",
                    self.entity, field.remote
                )));
            }

            values.push((field.column, value));
        }

        Ok(MappedRow { values })
    }

    /// Column and raw value to blame for a [`map_record`](Self::map_record)
    /// error, when a single field caused it
    pub fn offending_field(&self, record: &Value, err: &Error) -> Option<(&'static str, Value)> {
        match err {
            Error::FieldOverflow { field, value, .. } => Some((*field, Value::from(value.as_str()))),
            Error::Format(_) => self
                .fields
                .iter()
                .filter(|f| matches!(f.kind, FieldKind::Timestamp))
                .find_map(|f| {
                    let raw = scalar_text(record.get(f.remote)).filter(|v| !v.is_empty())?;
                    (!time::is_iso8601(&raw)).then(|| (f.column, Value::String(raw)))
                }),
            _ => None,
        }
    }
}

/// Render a JSON scalar as text; null, missing, arrays and objects are `None`
pub fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcombine_common::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_declared_tables_are_valid() {
        validate_all().unwrap();
    }

    #[test]
    fn test_cc_prefix_must_map_to_stripped_key() {
        static BAD: EntityMapping = EntityMapping {
            entity: "Bad",
            table: "bad",
            collection: "bad",
            identity: "cc_id",
            fields: &[text("cc_id", "cc_id", 36)],
        };
        let err = BAD.validate().unwrap_err();
        assert!(err.to_string().contains("must map from remote key 'id'"));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        static BAD: EntityMapping = EntityMapping {
            entity: "Bad",
            table: "bad",
            collection: "bad",
            identity: "cc_id",
            fields: &[text("cc_id", "id", 36), text("cc_id", "id", 36)],
        };
        assert!(matches!(BAD.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_choice_lookup_is_case_and_space_insensitive() {
        assert_eq!(lookup_choice(CONFIRM_STATUS_CHOICES, "NO_CONFIRMATION_REQUIRED"), Some("NC"));
        assert_eq!(lookup_choice(CONFIRM_STATUS_CHOICES, "no confirmation required"), Some("NC"));
        assert_eq!(lookup_choice(OPT_IN_SOURCE_CHOICES, "ACTION_BY_VISITOR"), Some("AV"));
        assert_eq!(lookup_choice(ADDRESS_TYPE_CHOICES, "UNKNOWN"), None);
        assert_eq!(choice_label(STATUS_CHOICES, "NO").as_deref(), Some("NON_SUBSCRIBER"));
    }

    #[test]
    fn test_map_address_record() {
        let row = ADDRESS
            .map_record(&json!({
                "id": "4c9a6f30-fd3e-11e2-9f89-d4ae529a826e",
                "address_type": "BUSINESS",
                "city": "Jacksonville",
                "line1": "1 Main St",
                "state_code": "FL",
                "postal_code": "32202",
                "country_code": "us"
            }))
            .unwrap();
        assert_eq!(row.get("cc_id"), Some("4c9a6f30-fd3e-11e2-9f89-d4ae529a826e"));
        assert_eq!(row.get("address_type"), Some("BU"));
        assert_eq!(row.get("city"), Some("Jacksonville"));
        assert_eq!(row.get("line2"), None);
        assert_eq!(row.columns().count(), ADDRESS.fields.len());
    }

    #[test]
    fn test_unknown_choice_becomes_null() {
        let row = ADDRESS
            .map_record(&json!({"id": "a1", "address_type": "SUMMER_HOME"}))
            .unwrap();
        assert_eq!(row.get("address_type"), None);
    }

    #[test]
    fn test_overflow_reports_entity_and_field() {
        let err = ADDRESS
            .map_record(&json!({"id": "a1", "state_code": "FLA"}))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FieldOverflow);
        match err {
            Error::FieldOverflow { entity, field, value, max } => {
                assert_eq!((entity, field, value.as_str(), max), ("Address", "state_code", "FLA", 2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_timestamps_normalized_and_validated() {
        let row = NOTE
            .map_record(&json!({
                "id": "n1",
                "created_date": "2013-08-04T23:38:45Z",
                "modified_date": "",
                "note": "met at the fair"
            }))
            .unwrap();
        assert_eq!(row.get("created_date"), Some("2013-08-04T23:38:45.000Z"));
        assert_eq!(row.get("modified_date"), None);

        let err = NOTE
            .map_record(&json!({"id": "n1", "created_date": "last week"}))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_offending_field_names_column_and_value() {
        let address = json!({"id": "a1", "state_code": "FLA"});
        let err = ADDRESS.map_record(&address).unwrap_err();
        assert_eq!(ADDRESS.offending_field(&address, &err), Some(("state_code", json!("FLA"))));

        let note = json!({"id": "n1", "created_date": "2013-08-04T23:38:45Z", "modified_date": "soon"});
        let err = NOTE.map_record(&note).unwrap_err();
        assert_eq!(NOTE.offending_field(&note, &err), Some(("modified_date", json!("soon"))));

        let missing = Error::InvalidInput("no id".into());
        assert_eq!(NOTE.offending_field(&note, &missing), None);
    }

    #[test]
    fn test_numeric_id_accepts_string_or_number() {
        let list = json!({"id": "1648", "name": "X", "created_date": "2013-01-01T00:00:00Z", "modified_date": "2013-01-01T00:00:00Z"});
        assert_eq!(REMOTE_LIST.map_record(&list).unwrap().get_i64("cc_id").unwrap(), 1648);

        let list = json!({"id": 1648, "name": "X", "created_date": "2013-01-01T00:00:00Z", "modified_date": "2013-01-01T00:00:00Z"});
        assert_eq!(REMOTE_LIST.map_record(&list).unwrap().get_i64("cc_id").unwrap(), 1648);

        let list = json!({"id": "abc", "name": "X", "created_date": "2013-01-01T00:00:00Z", "modified_date": "2013-01-01T00:00:00Z"});
        assert!(matches!(REMOTE_LIST.map_record(&list), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_missing_identity_is_invalid_input() {
        let err = EMAIL_ADDRESS
            .map_record(&json!({"email_address": "a@b.com"}))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
