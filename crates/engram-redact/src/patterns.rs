//! Compiled secret pattern table.
//!
//! Patterns are compiled once into a static table. Order matters for
//! redaction: labeled assignments and bearer schemes are rewritten before
//! the bare prefix patterns so a labeled value is never double-redacted.

use std::sync::LazyLock;

use regex::Regex;

/// How a match is rewritten by redaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    /// `key=value` / `key: value` — keep the `prefix` capture, mask the value.
    Labeled,
    /// `Bearer <token>` — keep the scheme, mask the token.
    Bearer,
    /// Bare provider token — keep the first four characters.
    Prefix,
    /// PEM block — replace the whole region.
    Block,
}

/// One compiled matcher plus its rewrite behavior.
pub struct SecretPattern {
    pub name: &'static str,
    pub kind: SecretKind,
    pub regex: Regex,
}

static PATTERNS: LazyLock<Vec<SecretPattern>> = LazyLock::new(|| {
    vec![
        SecretPattern {
            name: "labeled-assignment",
            kind: SecretKind::Labeled,
            // Value gate: at least 8 token characters, so placeholder values
            // ("password=short") do not trip the detector.
            regex: Regex::new(
                r#"(?i)\b(?P<prefix>(?:aws[_-]?secret[_-]?access[_-]?key|api[_-]?key|password|secret[_-]?(?:key|token)|auth[_-]?token)\s*[:=]\s*["']?)[A-Za-z0-9+/_.\-]{8,}"#,
            )
            .expect("labeled-assignment pattern compiles"),
        },
        SecretPattern {
            name: "pem-private-key",
            kind: SecretKind::Block,
            regex: Regex::new(
                r"(?s)-----BEGIN [A-Z ]*PRIVATE KEY-----.*?(?:-----END [A-Z ]*PRIVATE KEY-----|\z)",
            )
            .expect("pem pattern compiles"),
        },
        SecretPattern {
            name: "bearer-token",
            kind: SecretKind::Bearer,
            regex: Regex::new(r"(?i)\b(?P<prefix>bearer\s+)[A-Za-z0-9\-._~+/]{16,}=*")
                .expect("bearer pattern compiles"),
        },
        SecretPattern {
            name: "jwt",
            kind: SecretKind::Prefix,
            regex: Regex::new(r"\beyJ[A-Za-z0-9_\-]{8,}\.[A-Za-z0-9_\-]{8,}\.[A-Za-z0-9_\-]{8,}")
                .expect("jwt pattern compiles"),
        },
        SecretPattern {
            name: "openai-key",
            kind: SecretKind::Prefix,
            regex: Regex::new(r"\bsk-(?:ant-)?[A-Za-z0-9_\-]{16,}")
                .expect("openai-key pattern compiles"),
        },
        SecretPattern {
            name: "github-token",
            kind: SecretKind::Prefix,
            regex: Regex::new(r"\bgh[pous]_[A-Za-z0-9]{20,}").expect("github-token pattern compiles"),
        },
        SecretPattern {
            name: "github-pat",
            kind: SecretKind::Prefix,
            regex: Regex::new(r"\bgithub_pat_[A-Za-z0-9_]{20,}")
                .expect("github-pat pattern compiles"),
        },
        SecretPattern {
            name: "aws-access-key-id",
            kind: SecretKind::Prefix,
            regex: Regex::new(r"\bAKIA[0-9A-Z]{16}\b").expect("aws-access-key-id pattern compiles"),
        },
    ]
});

/// The full compiled pattern table, in redaction order.
pub fn all() -> &'static [SecretPattern] {
    &PATTERNS
}
