//! Declarative ruleset for the line classifier.
//!
//! Every list the classifier consults lives here, in evaluation order. The
//! phrase lists are written in their normalized form (lower case, no
//! accents) because matching always runs against [`super::normalize`]d text.
//! Bump [`RULESET_VERSION`] whenever an entry changes so reports stay
//! traceable to the rules that produced them.

use regex::Regex;
use std::sync::LazyLock;

/// Version stamped into every pipeline result.
pub const RULESET_VERSION: &str = "2025.3";

/// Rule 0: lines with fewer characters are dropped.
pub const MIN_LINE_CHARS: usize = 3;

/// Rule 4: minimum alphabetic characters for the fallback retain.
pub const MIN_ALPHA_CHARS: usize = 4;

/// Currency-unit tokens that survive rule 0 and count as a transaction signal
/// on their own (OCR often splits the unit from its amount column).
pub const CURRENCY_UNITS: &[&str] = &["r$", "$", "us$", "€", "£", "brl", "usd", "eur"];

/// Rule 1: structural anchors kept unconditionally.
pub const CONTEXT_ANCHORS: &[&str] = &[
    "saldo do dia",
    "saldo anterior",
    "saldo final",
    "saldo disponivel",
    "saldo em conta",
    "saldo total",
    "daily balance",
    "previous balance",
    "beginning balance",
    "opening balance",
    "ending balance",
    "closing balance",
];

/// Rule 2: boilerplate phrases (service channels, legal, marketing, chrome).
pub const JUNK_PHRASES: &[&str] = &[
    // service channels
    "ouvidoria",
    "fale com",
    "fale conosco",
    "sac",
    "central de atendimento",
    "central de relacionamento",
    "atendimento ao cliente",
    "deficiente auditivo",
    "deficientes auditivos",
    "deficiencia auditiva",
    "regioes metropolitanas",
    "demais localidades",
    "customer service",
    "call us",
    "visit us",
    // legal
    "termos e condicoes",
    "politica de privacidade",
    "lgpd",
    "valores sujeitos a",
    "sujeito a alteracao",
    "extrato gerado em",
    "documento emitido em",
    "este extrato",
    "this statement",
    "member fdic",
    "equal housing",
    "privacy policy",
    "terms and conditions",
    // marketing / UI chrome
    "baixe o app",
    "aproveite",
    "confira",
    "contrate",
    "conheca",
    "oferta especial",
    "saiba mais",
    "learn more",
    "imprimir",
    "voltar ao topo",
];

/// Rule 2: boilerplate shapes that are not phrases.
pub const JUNK_PATTERNS: &[(&str, &str)] = &[
    (
        "page_number",
        r"^(?:pagina|pag\.?|page|folha|fl\.?)\s*\d+\s*(?:de|of|/)\s*\d+$",
    ),
    ("bare_url", r"^(?:\S+\s)?(?:https?://|www\.)\S+$"),
    (
        "masked_card",
        r"^[\s*x•.\-]*(?:\*{4}|x{4}|•{4})[\s*x•\d.\-]*$",
    ),
    ("barcode", r"^[\d .\-]{30,}$"),
    // Only lines carrying nothing but labels and service numbers; any other
    // digit (date, amount, account) means the number is part of a transaction.
    (
        "service_phone",
        r"^\D*(?:\b(?:0800|4004|3003)[\s.\-]?\d{3}[\s.\-]?\d{3,4}\b\D*)+$",
    ),
];

/// Rule 3: named operations and merchant categories.
pub const OPERATION_KEYWORDS: &[&str] = &[
    // pt-BR operations
    "pix",
    "ted",
    "doc",
    "tev",
    "deposito",
    "transferencia",
    "transf",
    "saque",
    "compra",
    "compras",
    "pagamento",
    "pagto",
    "pgto",
    "tarifa",
    "estorno",
    "rendimento",
    "rendimentos",
    "juros",
    "iof",
    "boleto",
    "debito",
    "credito",
    "recebido",
    "recebida",
    "enviado",
    "enviada",
    "resgate",
    "aplicacao",
    "cheque",
    "anuidade",
    "parcela",
    // en operations
    "deposit",
    "transfer",
    "withdrawal",
    "purchase",
    "payment",
    "fee",
    "refund",
    "interest",
    "atm",
    "pos",
    "debit",
    "credit",
    "check",
    // merchant categories
    "supermercado",
    "mercado",
    "farmacia",
    "drogaria",
    "posto",
    "combustivel",
    "restaurante",
    "padaria",
    "uber",
    "ifood",
    "netflix",
    "spotify",
    "amazon",
];

const DATE_PATTERN: &str = r"\b(?:\d{4}-\d{2}-\d{2}|\d{1,2}[/.\-]\d{1,2}(?:[/.\-]\d{2,4})?|\d{1,2}\s?(?:de\s)?(?:jan|fev|feb|mar|abr|apr|mai|may|jun|jul|ago|aug|set|sep|out|oct|nov|dez|dec)[a-z]*)\b";

const AMOUNT_PATTERN: &str = concat!(
    r"(?:r\$|us\$|\$|€|£)\s?[-+]?\s?\d{1,3}(?:[.,\s]\d{3})*(?:[.,]\d{2})?",
    r"|\b(?:brl|usd|eur)\s?[-+]?\d",
    r"|\b\d{1,3}(?:\.\d{3})*,\d{2}\b",
    r"|\b\d{1,3}(?:,\d{3})*\.\d{2}\b",
);

/// Compiled form of the tables above.
#[derive(Debug)]
pub struct Ruleset {
    pub version: &'static str,
    pub min_line_chars: usize,
    pub min_alpha_chars: usize,
    pub currency_units: &'static [&'static str],
    pub context_anchors: Regex,
    pub junk_phrases: Regex,
    pub junk_patterns: Vec<(&'static str, Regex)>,
    pub date: Regex,
    pub amount: Regex,
    pub operations: Regex,
}

/// The ruleset used by [`super::classify`].
pub static STANDARD: LazyLock<Ruleset> = LazyLock::new(Ruleset::standard);

impl Ruleset {
    fn standard() -> Self {
        Self {
            version: RULESET_VERSION,
            min_line_chars: MIN_LINE_CHARS,
            min_alpha_chars: MIN_ALPHA_CHARS,
            currency_units: CURRENCY_UNITS,
            context_anchors: word_list(CONTEXT_ANCHORS),
            junk_phrases: word_list(JUNK_PHRASES),
            junk_patterns: JUNK_PATTERNS
                .iter()
                .map(|(name, pattern)| {
                    (*name, Regex::new(pattern).expect("valid junk pattern"))
                })
                .collect(),
            date: Regex::new(DATE_PATTERN).expect("valid date regex"),
            amount: Regex::new(AMOUNT_PATTERN).expect("valid amount regex"),
            operations: word_list(OPERATION_KEYWORDS),
        }
    }

    /// Name of the first junk pattern matching `normalized`.
    pub fn junk_pattern(&self, normalized: &str) -> Option<&'static str> {
        self.junk_patterns
            .iter()
            .find(|(_, re)| re.is_match(normalized))
            .map(|(name, _)| *name)
    }

    pub fn is_currency_unit(&self, normalized: &str) -> bool {
        self.currency_units.contains(&normalized)
    }
}

/// `\b(?:a|b|c)\b` over escaped entries.
fn word_list(entries: &[&str]) -> Regex {
    let alternation = entries
        .iter()
        .map(|entry| regex::escape(entry))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b(?:{alternation})\b")).expect("valid word list regex")
}
