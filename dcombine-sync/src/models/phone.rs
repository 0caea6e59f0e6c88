//! Phone number normalization
//!
//! Remote contacts carry phone numbers as free text (`"(904)-712-1983"`,
//! `"904.712.1983 x 22"`, `"7121983"`). `PhoneNumber::normalize` turns that
//! text into the `(area_code, number, extension)` triple stored locally.

use dcombine_common::{Error, Result};
use std::fmt;

/// Storage width of `phone_numbers.area_code`
pub const AREA_CODE_MAX: usize = 3;
/// Storage width of `phone_numbers.number`
pub const NUMBER_MAX: usize = 7;
/// Storage width of `phone_numbers.extension`
pub const EXTENSION_MAX: usize = 7;

/// Role a phone number plays for a contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhoneRole {
    Home,
    Work,
    Cell,
    Fax,
}

impl PhoneRole {
    /// Every role, in the order they are reconciled
    pub const ALL: [PhoneRole; 4] = [
        PhoneRole::Home,
        PhoneRole::Work,
        PhoneRole::Cell,
        PhoneRole::Fax,
    ];

    /// Remote key and local role name
    pub fn as_str(&self) -> &'static str {
        match self {
            PhoneRole::Home => "home_phone",
            PhoneRole::Work => "work_phone",
            PhoneRole::Cell => "cell_phone",
            PhoneRole::Fax => "fax",
        }
    }

    pub fn from_str_opt(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.as_str() == value)
    }
}

impl fmt::Display for PhoneRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized phone number
///
/// All parts `None` means "no phone" (the input had no digits at all).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PhoneNumber {
    pub area_code: Option<String>,
    pub number: Option<String>,
    pub extension: Option<String>,
}

impl PhoneNumber {
    /// Normalize free-text phone input
    ///
    /// # Errors
    /// `Error::Format` when the digits cannot form a phone number: more than
    /// four digit groups, a digit count of less than 7 or 8-9, or a part wider
    /// than its column.
    pub fn normalize(raw: &str) -> Result<Self> {
        let runs = digit_runs(raw);
        let lens: Vec<usize> = runs.iter().map(|r| r.len()).collect();

        let phone = match runs.len() {
            0 => PhoneNumber::default(),
            1 => group_digits(&runs[0])?,
            2 if lens == [3, 4] => PhoneNumber {
                area_code: None,
                number: Some(runs.concat()),
                extension: None,
            },
            3 if lens == [3, 3, 4] => PhoneNumber {
                area_code: Some(runs[0].clone()),
                number: Some(format!("{}{}", runs[1], runs[2])),
                extension: None,
            },
            4 if lens[..3] == [3, 3, 4] => PhoneNumber {
                area_code: Some(runs[0].clone()),
                number: Some(format!("{}{}", runs[1], runs[2])),
                extension: Some(runs[3].clone()),
            },
            2..=4 => group_digits(&runs.concat())?,
            _ => {
                return Err(Error::Format(format!(
                    "There is a problem with too many number groups in {}...maybe there is more than 1 set of numbers",
                    raw
                )))
            }
        };

        phone.check_widths()?;
        Ok(phone)
    }

    /// True when normalization found no digits
    pub fn is_empty(&self) -> bool {
        self.area_code.is_none() && self.number.is_none() && self.extension.is_none()
    }

    fn check_widths(&self) -> Result<()> {
        for (field, value, max) in [
            ("area_code", &self.area_code, AREA_CODE_MAX),
            ("number", &self.number, NUMBER_MAX),
            ("extension", &self.extension, EXTENSION_MAX),
        ] {
            if let Some(v) = value {
                if v.len() > max {
                    return Err(Error::Format(format!(
                        "'{}' is too long; {} > {}",
                        field,
                        v.len(),
                        max
                    )));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for PhoneNumber {
    /// Renders `(AAA)-NNN-NNNN x E`, omitting absent parts
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(area) = &self.area_code {
            write!(f, "({})-", area)?;
        }
        if let Some(number) = &self.number {
            let (exchange, line) = number.split_at(number.len().min(3));
            write!(f, "{}-{}", exchange, line)?;
        }
        if let Some(ext) = &self.extension {
            write!(f, " x {}", ext)?;
        }
        Ok(())
    }
}

/// Maximal runs of ASCII digits, in order of appearance
fn digit_runs(raw: &str) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current = String::new();
    for c in raw.chars() {
        if c.is_ascii_digit() {
            current.push(c);
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

/// Split one contiguous digit string into area code, number and extension
fn group_digits(digits: &str) -> Result<PhoneNumber> {
    let len = digits.len();
    if len < 7 || (7 < len && len < 10) {
        return Err(Error::Format(format!(
            "Too few numbers to be a phone number for {}, length={}",
            digits, len
        )));
    }

    if len == 7 {
        return Ok(PhoneNumber {
            area_code: None,
            number: Some(digits.to_string()),
            extension: None,
        });
    }

    let extension = &digits[10..];
    Ok(PhoneNumber {
        area_code: Some(digits[..3].to_string()),
        number: Some(digits[3..10].to_string()),
        extension: (!extension.is_empty()).then(|| extension.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phone(area: Option<&str>, number: &str, ext: Option<&str>) -> PhoneNumber {
        PhoneNumber {
            area_code: area.map(String::from),
            number: Some(number.to_string()),
            extension: ext.map(String::from),
        }
    }

    #[test]
    fn test_seven_digits_one_or_two_groups() {
        assert_eq!(PhoneNumber::normalize("7121983").unwrap(), phone(None, "7121983", None));
        assert_eq!(PhoneNumber::normalize("712-1983").unwrap(), phone(None, "7121983", None));
        assert_eq!(PhoneNumber::normalize("712 1983").unwrap(), phone(None, "7121983", None));
    }

    #[test]
    fn test_ten_digits_grouped() {
        let expected = phone(Some("904"), "7121983", None);
        assert_eq!(PhoneNumber::normalize("(904)-712-1983").unwrap(), expected);
        assert_eq!(PhoneNumber::normalize("904.712.1983").unwrap(), expected);
        assert_eq!(PhoneNumber::normalize("9047121983").unwrap(), expected);
    }

    #[test]
    fn test_extension_forms() {
        assert_eq!(
            PhoneNumber::normalize("(904) 712-1983 x 22").unwrap(),
            phone(Some("904"), "7121983", Some("22"))
        );
        assert_eq!(
            PhoneNumber::normalize("904712198322").unwrap(),
            phone(Some("904"), "7121983", Some("22"))
        );
    }

    #[test]
    fn test_irregular_groups_are_concatenated() {
        // 2 groups, not 3-4
        assert_eq!(
            PhoneNumber::normalize("90471-21983").unwrap(),
            phone(Some("904"), "7121983", None)
        );
        // 3 groups, not 3-3-4
        assert_eq!(
            PhoneNumber::normalize("1 904 7121983").unwrap(),
            phone(Some("190"), "4712198", Some("3"))
        );
    }

    #[test]
    fn test_too_few_digits_fail() {
        for raw in ["1", "12345", "123-45", "123456"] {
            let err = PhoneNumber::normalize(raw).unwrap_err();
            assert!(matches!(err, Error::Format(_)), "{} should fail", raw);
        }
    }

    #[test]
    fn test_eight_or_nine_digits_fail() {
        assert!(PhoneNumber::normalize("12345678").is_err());
        assert!(PhoneNumber::normalize("123-456-789").is_err());
    }

    #[test]
    fn test_more_than_four_groups_fail() {
        let err = PhoneNumber::normalize("904 712 1983 or 904 712 1984").unwrap_err();
        assert!(err.to_string().contains("too many number groups"));
    }

    #[test]
    fn test_extension_width_checked() {
        let err = PhoneNumber::normalize("904-712-1983 x 12345678").unwrap_err();
        assert!(err.to_string().contains("'extension' is too long; 8 > 7"));
    }

    #[test]
    fn test_no_digits_is_empty_phone() {
        let p = PhoneNumber::normalize("n/a").unwrap();
        assert!(p.is_empty());
        assert_eq!(p.to_string(), "");
    }

    #[test]
    fn test_display() {
        assert_eq!(phone(Some("904"), "7121983", Some("22")).to_string(), "(904)-712-1983 x 22");
        assert_eq!(phone(None, "7121983", None).to_string(), "712-1983");
    }

    #[test]
    fn test_role_names() {
        assert_eq!(PhoneRole::from_str_opt("work_phone"), Some(PhoneRole::Work));
        assert_eq!(PhoneRole::from_str_opt("pager"), None);
        assert_eq!(PhoneRole::Fax.to_string(), "fax");
    }
}
