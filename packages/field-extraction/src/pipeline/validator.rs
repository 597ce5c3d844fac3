//! Format checks applied to every candidate value before it is accepted.

use chrono::NaiveDate;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::pipeline::heuristics::enum_options;

static RE_CPF_FORMATTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{3}\.\d{3}\.\d{3}-\d{2}$").unwrap());
static RE_EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap());
static RE_PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\+?55)?\s*\(?\d{2}\)?\s*9?\d{4}-?\d{4}$").unwrap());

const PHONE_KEYWORDS: &[&str] = &["telefone", "celular", "phone"];
const DATE_KEYWORDS: &[&str] = &["data", "nascimento", "emissao"];
const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%Y-%m-%d"];

/// Outcome of validating one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,

    /// Normalized value, present only when valid
    pub normalized: Option<String>,
}

impl Validation {
    fn accept(value: impl Into<String>) -> Self {
        Self {
            valid: true,
            normalized: Some(value.into()),
        }
    }

    fn reject() -> Self {
        Self {
            valid: false,
            normalized: None,
        }
    }

    fn check(valid: bool, value: &str) -> Self {
        if valid {
            Self::accept(value)
        } else {
            Self::reject()
        }
    }
}

/// Field-type validator.
///
/// The field type is inferred from keywords in the field name or its
/// description; the first matching rule decides.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a text candidate. `None` and blank strings are invalid.
    pub fn validate(&self, field: &str, value: Option<&str>, description: &str) -> Validation {
        let Some(candidate) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return Validation::reject();
        };

        let field = field.to_lowercase();
        let description = description.to_lowercase();
        let mentions = |keywords: &[&str]| {
            keywords
                .iter()
                .any(|k| field.contains(k) || description.contains(k))
        };

        if mentions(&["cpf"]) {
            return match normalize_cpf(candidate) {
                Some(cpf) => Validation::accept(cpf),
                None => Validation::reject(),
            };
        }

        if mentions(&["email"]) {
            return Validation::check(RE_EMAIL.is_match(candidate), candidate);
        }

        if mentions(PHONE_KEYWORDS) {
            return Validation::check(RE_PHONE.is_match(candidate), candidate);
        }

        if mentions(DATE_KEYWORDS) {
            return Validation::check(is_calendar_date(candidate), candidate);
        }

        let options = enum_options(&description);
        if !options.is_empty() {
            let lowered = candidate.to_lowercase();
            return Validation::check(options.iter().any(|o| *o == lowered), candidate);
        }

        Validation::accept(candidate)
    }

    /// Validate a raw model value.
    ///
    /// Numbers and booleans are stringified; arrays and objects become
    /// compact JSON. `null` is invalid.
    pub fn validate_json(&self, field: &str, value: Option<&Value>, description: &str) -> Validation {
        let text = value.and_then(json_to_text);
        self.validate(field, text.as_deref(), description)
    }
}

/// Render a model value as the string the pipeline stores.
pub fn json_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value).ok(),
    }
}

/// Structural CPF check (no checksum). Returns `ddd.ddd.ddd-dd`.
fn normalize_cpf(candidate: &str) -> Option<String> {
    let digits: String = candidate.chars().filter(char::is_ascii_digit).collect();
    if !RE_CPF_FORMATTED.is_match(candidate) && digits.len() != 11 {
        return None;
    }

    let first = digits.chars().next()?;
    if digits.chars().all(|c| c == first) {
        return None;
    }

    Some(format!(
        "{}.{}.{}-{}",
        &digits[..3],
        &digits[3..6],
        &digits[6..9],
        &digits[9..11]
    ))
}

fn is_calendar_date(candidate: &str) -> bool {
    DATE_FORMATS
        .iter()
        .any(|format| NaiveDate::parse_from_str(candidate, format).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn check(field: &str, value: &str, description: &str) -> Validation {
        Validator::new().validate(field, Some(value), description)
    }

    #[test]
    fn test_cpf_normalized() {
        let v = check("cpf", "123 456 789 09", "");
        assert!(v.valid);
        assert_eq!(v.normalized.as_deref(), Some("123.456.789-09"));

        assert!(check("cpf", "123.456.789-09", "").valid);
        assert!(!check("cpf", "12345", "").valid);
    }

    #[test]
    fn test_cpf_detected_from_description() {
        assert!(!check("documento", "000.000.000-00", "CPF do titular").valid);
    }

    #[test]
    fn test_blank_is_invalid() {
        let validator = Validator::new();
        assert!(!validator.validate("nome", None, "").valid);
        assert!(!validator.validate("nome", Some("   "), "").valid);
        assert!(!validator.validate_json("nome", Some(&Value::Null), "").valid);
    }

    #[test]
    fn test_email_and_phone() {
        assert!(check("email", " jane@example.com ", "").valid);
        assert!(!check("email", "jane at example", "").valid);
        assert!(check("telefone", "(41) 99876-5432", "").valid);
        assert!(check("celular", "+55 41 998765432", "").valid);
        assert!(!check("phone", "call me", "").valid);
    }

    #[test]
    fn test_dates_must_exist() {
        assert!(check("data_emissao", "29/02/2024", "").valid);
        assert!(!check("data_emissao", "31/02/2024", "").valid);
        assert!(check("nascimento", "1990-05-17", "").valid);
        assert!(!check("nascimento", "ontem", "").valid);
    }

    #[test]
    fn test_enum_membership() {
        let desc = "Categoria, pode ser ADVOGADO, ADVOGADA ou ESTAGIARIO";
        assert!(check("categoria", "Advogada", desc).valid);
        assert!(!check("categoria", "JUIZ", desc).valid);
    }

    #[test]
    fn test_default_trims() {
        let v = check("nome", "  JOANA D'ARC ", "Nome do profissional");
        assert_eq!(v.normalized.as_deref(), Some("JOANA D'ARC"));
    }

    #[test]
    fn test_json_values_stringified() {
        let validator = Validator::new();
        let v = validator.validate_json("inscricao", Some(&json!(101943)), "");
        assert_eq!(v.normalized.as_deref(), Some("101943"));

        let v = validator.validate_json("itens", Some(&json!(["a", "b"])), "");
        assert_eq!(v.normalized.as_deref(), Some(r#"["a","b"]"#));
    }

    proptest! {
        #[test]
        fn prop_repeated_digit_cpf_invalid(d in 0u8..10, formatted in any::<bool>()) {
            let s = d.to_string().repeat(11);
            let value = if formatted {
                format!("{}.{}.{}-{}", &s[..3], &s[3..6], &s[6..9], &s[9..])
            } else {
                s
            };
            prop_assert!(!check("cpf", &value, "").valid);
        }
    }
}
