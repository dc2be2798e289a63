//! Line classifier.
//!
//! Decides, line by line, whether extracted statement text is worth passing
//! to the agent. The decision is a pure function of the line and the
//! [`rules::Ruleset`]; rules are evaluated in a fixed order and the first
//! match wins:
//!
//! 0. too short (unless a bare currency unit) → discard
//! 1. context-header anchor → keep
//! 2. junk phrase or junk pattern → discard
//! 3. transaction signal (date + amount, amount, currency unit, operation) → keep
//! 4. enough alphabetic content → keep
//! 5. otherwise → discard

pub mod rules;

use serde::Serialize;

use crate::document::ClassifiedLine;
use rules::{Ruleset, STANDARD};

/// Why a line was kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepReason {
    /// Rule 1: structural anchor such as a daily-balance header.
    ContextHeader,
    /// Rule 3: date-like token next to a currency amount.
    DatedAmount,
    /// Rule 3: currency-formatted amount.
    Amount,
    /// Rule 3: bare currency unit split from its amount.
    CurrencyUnit,
    /// Rule 3: named operation or merchant category.
    OperationKeyword,
    /// Rule 4: fallback retain of textual content.
    Retained,
}

impl KeepReason {
    /// True for the rule 3 family.
    pub fn is_transaction_signal(self) -> bool {
        matches!(
            self,
            Self::DatedAmount | Self::Amount | Self::CurrencyUnit | Self::OperationKeyword
        )
    }
}

/// Why a line was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    /// Rule 0.
    TooShort,
    /// Rule 2, phrase list.
    JunkPhrase,
    /// Rule 2, shape list (page numbers, masked cards, barcodes...).
    JunkPattern(&'static str),
    /// Rule 5.
    Noise,
}

/// Outcome of classifying one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Keep(KeepReason),
    Discard(DiscardReason),
}

impl Verdict {
    pub fn is_keep(self) -> bool {
        matches!(self, Self::Keep(_))
    }
}

/// Classify `line` with the standard ruleset.
pub fn classify(line: &str) -> Verdict {
    Classifier::standard().classify(line)
}

/// Lower-case, trim, collapse whitespace and fold Latin accents.
pub fn normalize(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    for word in line.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        for c in word.chars().flat_map(char::to_lowercase) {
            out.push(fold_accent(c));
        }
    }
    out
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}

/// Classifier bound to a ruleset.
#[derive(Debug, Clone, Copy)]
pub struct Classifier<'r> {
    rules: &'r Ruleset,
}

impl Classifier<'static> {
    pub fn standard() -> Self {
        Self { rules: &STANDARD }
    }
}

impl<'r> Classifier<'r> {
    pub fn new(rules: &'r Ruleset) -> Self {
        Self { rules }
    }

    pub fn ruleset_version(&self) -> &'static str {
        self.rules.version
    }

    pub fn classify(&self, line: &str) -> Verdict {
        self.classify_normalized(&normalize(line))
    }

    /// Classify and package `text` as a [`ClassifiedLine`].
    pub fn classify_line(&self, text: impl Into<String>) -> ClassifiedLine {
        let text = text.into();
        let normalized = normalize(&text);
        let verdict = self.classify_normalized(&normalized);
        ClassifiedLine {
            text,
            normalized,
            verdict,
        }
    }

    fn classify_normalized(&self, normalized: &str) -> Verdict {
        let rules = self.rules;
        let currency_unit = rules.is_currency_unit(normalized);

        if normalized.chars().count() < rules.min_line_chars && !currency_unit {
            return Verdict::Discard(DiscardReason::TooShort);
        }

        if rules.context_anchors.is_match(normalized) {
            return Verdict::Keep(KeepReason::ContextHeader);
        }

        if rules.junk_phrases.is_match(normalized) {
            return Verdict::Discard(DiscardReason::JunkPhrase);
        }
        if let Some(name) = rules.junk_pattern(normalized) {
            return Verdict::Discard(DiscardReason::JunkPattern(name));
        }

        if currency_unit {
            return Verdict::Keep(KeepReason::CurrencyUnit);
        }
        if rules.amount.is_match(normalized) {
            return if rules.date.is_match(normalized) {
                Verdict::Keep(KeepReason::DatedAmount)
            } else {
                Verdict::Keep(KeepReason::Amount)
            };
        }
        if rules.operations.is_match(normalized) {
            return Verdict::Keep(KeepReason::OperationKeyword);
        }

        let alphabetic = normalized.chars().filter(|c| c.is_alphabetic()).count();
        if alphabetic >= rules.min_alpha_chars {
            return Verdict::Keep(KeepReason::Retained);
        }

        Verdict::Discard(DiscardReason::Noise)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Saldo   DISPONÍVEL \t"), "saldo disponivel");
        assert_eq!(normalize("Transferência PIX"), "transferencia pix");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_rule0_short_lines() {
        assert_eq!(classify("--"), Verdict::Discard(DiscardReason::TooShort));
        assert_eq!(classify(" a "), Verdict::Discard(DiscardReason::TooShort));
        assert_eq!(classify(""), Verdict::Discard(DiscardReason::TooShort));
    }

    #[test]
    fn test_rule0_currency_unit_survives() {
        assert_eq!(classify("R$"), Verdict::Keep(KeepReason::CurrencyUnit));
        assert_eq!(classify("$"), Verdict::Keep(KeepReason::CurrencyUnit));
        assert_eq!(classify("US$"), Verdict::Keep(KeepReason::CurrencyUnit));
    }

    #[test]
    fn test_rule1_context_header_beats_junk() {
        assert_eq!(
            classify("SALDO DO DIA"),
            Verdict::Keep(KeepReason::ContextHeader)
        );
        // anchor plus a junk keyword on the same line
        assert_eq!(
            classify("Saldo anterior - fale com a ouvidoria"),
            Verdict::Keep(KeepReason::ContextHeader)
        );
        assert_eq!(
            classify("Saldo do dia 1.234,56"),
            Verdict::Keep(KeepReason::ContextHeader)
        );
    }

    #[test]
    fn test_rule2_junk() {
        assert_eq!(
            classify("Fale com a nossa ouvidoria"),
            Verdict::Discard(DiscardReason::JunkPhrase)
        );
        assert_eq!(
            classify("SAC 24 horas"),
            Verdict::Discard(DiscardReason::JunkPhrase)
        );
        assert_eq!(
            classify("Página 1 de 3"),
            Verdict::Discard(DiscardReason::JunkPattern("page_number"))
        );
        assert_eq!(
            classify("**** **** **** 4321"),
            Verdict::Discard(DiscardReason::JunkPattern("masked_card"))
        );
    }

    #[test]
    fn test_rule2_service_number_needs_its_own_line() {
        assert_eq!(
            classify("Demais localidades 0800 727 0101"),
            Verdict::Discard(DiscardReason::JunkPattern("service_phone"))
        );
        // numbers that only look like service lines inside a transaction
        assert_eq!(
            classify("12/03/2024  PIX RECEBIDO 30031234567  R$ 150,00"),
            Verdict::Keep(KeepReason::DatedAmount)
        );
        assert_eq!(
            classify("12/03/2024  DOC 08001234567  R$ 150,00"),
            Verdict::Keep(KeepReason::DatedAmount)
        );
    }

    #[test]
    fn test_rule2_junk_wins_over_amount() {
        // boilerplate that happens to quote an amount is still boilerplate
        assert_eq!(
            classify("Aproveite: crédito pré-aprovado de R$ 5.000,00"),
            Verdict::Discard(DiscardReason::JunkPhrase)
        );
    }

    #[test]
    fn test_rule3_transaction_signals() {
        assert_eq!(
            classify("12/03/2024  PIX RECEBIDO  R$ 150,00"),
            Verdict::Keep(KeepReason::DatedAmount)
        );
        assert_eq!(classify("150,00 C"), Verdict::Keep(KeepReason::Amount));
        assert_eq!(classify("-1,234.56"), Verdict::Keep(KeepReason::Amount));
        assert_eq!(
            classify("TED ENVIADA"),
            Verdict::Keep(KeepReason::OperationKeyword)
        );
        assert_eq!(
            classify("Posto Ipiranga"),
            Verdict::Keep(KeepReason::OperationKeyword)
        );
    }

    #[test]
    fn test_rule3_ignores_unrelated_numbers() {
        // digits without currency formatting do not count as amounts
        assert_eq!(classify("0123 4567"), Verdict::Discard(DiscardReason::Noise));
        assert_eq!(
            classify("Agência 1234 Conta 56789-0"),
            Verdict::Keep(KeepReason::Retained)
        );
    }

    #[test]
    fn test_rule4_fallback_retain() {
        assert_eq!(
            classify("Maria Silva Comercio Ltda"),
            Verdict::Keep(KeepReason::Retained)
        );
    }

    #[test]
    fn test_rule5_noise() {
        assert_eq!(classify("----------"), Verdict::Discard(DiscardReason::Noise));
        assert_eq!(classify("| | | |"), Verdict::Discard(DiscardReason::Noise));
        assert_eq!(classify("ab 12 34"), Verdict::Discard(DiscardReason::Noise));
    }

    #[test]
    fn test_idempotent_and_deterministic() {
        let lines = [
            "12/03/2024  PIX RECEBIDO  R$ 150,00",
            "SALDO DO DIA",
            "Fale com a nossa ouvidoria",
            "Maria Silva Comercio Ltda",
            "R$",
        ];
        let classifier = Classifier::standard();
        for line in lines {
            let first = classifier.classify(line);
            assert_eq!(first, classifier.classify(line));
            if first.is_keep() {
                let kept = classifier.classify_line(line);
                assert_eq!(classifier.classify(&kept.text), first);
            }
        }
    }

    #[test]
    fn test_classify_line_keeps_original_text() {
        let line = Classifier::standard().classify_line("12/03/2024  PIX RECEBIDO  R$ 150,00");
        assert_eq!(line.text, "12/03/2024  PIX RECEBIDO  R$ 150,00");
        assert_eq!(line.normalized, "12/03/2024 pix recebido r$ 150,00");
        assert!(line.verdict.is_keep());
    }

    #[test]
    fn test_transaction_signal_family() {
        assert!(KeepReason::DatedAmount.is_transaction_signal());
        assert!(KeepReason::CurrencyUnit.is_transaction_signal());
        assert!(!KeepReason::ContextHeader.is_transaction_signal());
        assert!(!KeepReason::Retained.is_transaction_signal());
    }
}
