//! Regex heuristics: the cheapest way to resolve a field.
//!
//! A keyword found in the field name (or description) selects a pattern,
//! which is run case-insensitively against the document text.

use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

// =============================================================================
// Patterns
// =============================================================================

static RE_CPF: LazyLock<Regex> = LazyLock::new(|| ci(r"\b\d{3}\.\d{3}\.\d{3}-\d{2}\b"));
static RE_CNPJ: LazyLock<Regex> = LazyLock::new(|| ci(r"\b\d{2}\.\d{3}\.\d{3}/\d{4}-\d{2}\b"));
static RE_EMAIL: LazyLock<Regex> =
    LazyLock::new(|| ci(r"\b[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}\b"));
static RE_PHONE: LazyLock<Regex> =
    LazyLock::new(|| ci(r"\b(?:\+?55\s*)?\(?\d{2}\)?[\s-]*9?\d{4}[\s-]*\d{4}\b"));
static RE_DATE: LazyLock<Regex> = LazyLock::new(|| ci(r"\b\d{1,2}/\d{1,2}/\d{4}\b"));
static RE_CEP: LazyLock<Regex> = LazyLock::new(|| ci(r"\b\d{5}-?\d{3}\b"));
static RE_PLATE: LazyLock<Regex> = LazyLock::new(|| ci(r"\b[a-zA-Z]{3}-?\d{4}\b"));
static RE_AMOUNT: LazyLock<Regex> = LazyLock::new(|| ci(r"R?\$\s*\d{1,3}(?:\.\d{3})*,\d{2}"));
static RE_DOCUMENT_NUMBER: LazyLock<Regex> = LazyLock::new(|| ci(r"\b\d{6,12}\b"));
static RE_SUBSECTION: LazyLock<Regex> =
    LazyLock::new(|| ci(r"Conselho\s+Seccional\s*-\s*[^\n]+"));

static RE_ENUM_OPTIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:pode ser|opções|options|um dos|one of)\s*[:\-]?\s*(.+)").unwrap());
static RE_ENUM_SPLIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[,/]| ou | or ").unwrap());

fn ci(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .unwrap()
}

/// Phrases that mark a description as listing its allowed values.
const ENUM_HINTS: &[&str] = &["pode ser", "opções", "options", "um dos", "one of"];

/// Value shapes the matcher knows how to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Cpf,
    Cnpj,
    Email,
    Phone,
    Date,
    Cep,
    Plate,
    Amount,
    DocumentNumber,
    Subsection,
}

impl Pattern {
    fn regex(self) -> &'static Regex {
        match self {
            Self::Cpf => &RE_CPF,
            Self::Cnpj => &RE_CNPJ,
            Self::Email => &RE_EMAIL,
            Self::Phone => &RE_PHONE,
            Self::Date => &RE_DATE,
            Self::Cep => &RE_CEP,
            Self::Plate => &RE_PLATE,
            Self::Amount => &RE_AMOUNT,
            Self::DocumentNumber => &RE_DOCUMENT_NUMBER,
            Self::Subsection => &RE_SUBSECTION,
        }
    }

    /// First match in `text`, trimmed.
    pub fn find(self, text: &str) -> Option<String> {
        self.regex()
            .find(text)
            .map(|m| m.as_str().trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Keyword to pattern rules, consulted in order.
const RULES: &[(&str, Pattern)] = &[
    ("cpf", Pattern::Cpf),
    ("cnpj", Pattern::Cnpj),
    ("email", Pattern::Email),
    ("mail", Pattern::Email),
    ("telefone", Pattern::Phone),
    ("celular", Pattern::Phone),
    ("phone", Pattern::Phone),
    ("data", Pattern::Date),
    ("nascimento", Pattern::Date),
    ("emissao", Pattern::Date),
    ("cep", Pattern::Cep),
    ("placa", Pattern::Plate),
    ("valor", Pattern::Amount),
    ("total", Pattern::Amount),
    ("numero", Pattern::DocumentNumber),
    ("documento", Pattern::DocumentNumber),
    ("subsecao", Pattern::Subsection),
];

// =============================================================================
// Matcher
// =============================================================================

/// Stateless regex matcher over the rule table.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicMatcher;

impl HeuristicMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Try every rule whose keyword appears in the field name.
    pub fn by_field_name(&self, field: &str, text: &str) -> Option<String> {
        match_keywords(&field.to_lowercase(), text)
    }

    /// Try every rule whose keyword appears in the description.
    pub fn by_description(&self, description: &str, text: &str) -> Option<String> {
        match_keywords(&description.to_lowercase(), text)
    }

    /// If the description lists allowed values, return the first one that
    /// occurs in `text` as a whole word.
    pub fn enum_value(&self, description: &str, text: &str) -> Option<String> {
        for option in enum_options(description) {
            let pattern = format!(r"\b{}\b", regex::escape(&option));
            let Ok(re) = RegexBuilder::new(&pattern).case_insensitive(true).build() else {
                continue;
            };
            if let Some(m) = re.find(text) {
                return Some(m.as_str().trim().to_string());
            }
        }
        None
    }

    /// Field name, then description, then enumerated options.
    pub fn first_match(&self, field: &str, description: &str, text: &str) -> Option<String> {
        self.by_field_name(field, text)
            .or_else(|| self.by_description(description, text))
            .or_else(|| self.enum_value(description, text))
    }
}

fn match_keywords(haystack: &str, text: &str) -> Option<String> {
    RULES
        .iter()
        .filter(|(keyword, _)| haystack.contains(keyword))
        .find_map(|(_, pattern)| pattern.find(text))
}

/// Allowed values listed in a description (`pode ser A, B ou C`).
///
/// Options are lowercased; the filler `etc` is dropped. Returns an empty
/// list when the description carries no enumeration hint.
pub fn enum_options(description: &str) -> Vec<String> {
    let lowered = description.to_lowercase();
    if !ENUM_HINTS.iter().any(|hint| lowered.contains(hint)) {
        return Vec::new();
    }

    let Some(captures) = RE_ENUM_OPTIONS.captures(&lowered) else {
        return Vec::new();
    };

    RE_ENUM_SPLIT
        .split(&captures[1])
        .map(|option| option.trim_matches(|c| matches!(c, ' ' | '.' | ':' | '-')))
        .filter(|option| !option.is_empty() && *option != "etc")
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_name_selects_pattern() {
        let m = HeuristicMatcher::new();
        let text = "Contato: Jane <jane@example.com>, CPF 123.456.789-09";
        assert_eq!(m.by_field_name("email", text).as_deref(), Some("jane@example.com"));
        assert_eq!(m.by_field_name("cpf_titular", text).as_deref(), Some("123.456.789-09"));
        assert_eq!(m.by_field_name("nome", text), None);
    }

    #[test]
    fn test_description_selects_pattern() {
        let m = HeuristicMatcher::new();
        let text = "Vencimento 05/11/2024\nTotal: R$ 1.234,56";
        assert_eq!(m.by_description("Valor total da fatura", text).as_deref(), Some("R$ 1.234,56"));
        assert_eq!(m.by_description("Data de vencimento", text).as_deref(), Some("05/11/2024"));
    }

    #[test]
    fn test_rules_try_next_keyword_on_miss() {
        let m = HeuristicMatcher::new();
        let text = "Inscrição 101943";
        // no CPF in the text, so the "numero" rule answers
        assert_eq!(m.by_field_name("cpf", text), None);
        assert_eq!(m.by_field_name("cpf_numero", text).as_deref(), Some("101943"));
    }

    #[test]
    fn test_subsection_pattern() {
        let m = HeuristicMatcher::new();
        let text = "ADVOGADO\nConselho Seccional - Paraná\nOutro";
        assert_eq!(m.by_field_name("subsecao", text).as_deref(), Some("Conselho Seccional - Paraná"));
    }

    #[test]
    fn test_enum_options_parsing() {
        let options = enum_options("Categoria, pode ser ADVOGADO, ADVOGADA, SUPLEMENTAR, ESTAGIARIO, ESTAGIARIA");
        assert_eq!(
            options,
            vec!["advogado", "advogada", "suplementar", "estagiario", "estagiaria"]
        );

        let options = enum_options("one of: red / green or blue, etc.");
        assert_eq!(options, vec!["red", "green", "blue"]);

        assert!(enum_options("Nome completo").is_empty());
    }

    #[test]
    fn test_enum_value_whole_word() {
        let m = HeuristicMatcher::new();
        let desc = "pode ser ADVOGADO, ADVOGADA ou ESTAGIARIO";
        assert_eq!(m.enum_value(desc, "Situação: ADVOGADA regular").as_deref(), Some("ADVOGADA"));
        assert_eq!(m.enum_value(desc, "ADVOGADOS"), None);
    }
}
