//! School categories derived from the school name.
//! Patterns are checked in a fixed priority order; the first hit wins.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Gymnasium,
    Grundschule,
    Realschule,
    Mittelschule,
    Berufsschule,
    #[serde(rename = "FOS/BOS")]
    FosBos,
    Wirtschaftsschule,
    #[serde(rename = "Förderschule")]
    Foerderschule,
    Sonstige,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Gymnasium,
        Category::Grundschule,
        Category::Realschule,
        Category::Mittelschule,
        Category::Berufsschule,
        Category::FosBos,
        Category::Wirtschaftsschule,
        Category::Foerderschule,
        Category::Sonstige,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Gymnasium => "Gymnasium",
            Self::Grundschule => "Grundschule",
            Self::Realschule => "Realschule",
            Self::Mittelschule => "Mittelschule",
            Self::Berufsschule => "Berufsschule",
            Self::FosBos => "FOS/BOS",
            Self::Wirtschaftsschule => "Wirtschaftsschule",
            Self::Foerderschule => "Förderschule",
            Self::Sonstige => "Sonstige",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown school category '{0}'")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.label() == trimmed)
            .ok_or_else(|| UnknownCategory(trimmed.to_string()))
    }
}

/// Priority-ordered (category, pattern) pairs. Patterns match against the lower-cased name.
const PATTERNS: &[(Category, &str)] = &[
    (Category::Gymnasium, "gymnasium"),
    (Category::Grundschule, "grundschule"),
    (Category::Realschule, "realschule"),
    (Category::Mittelschule, "mittelschule|hauptschule"),
    (Category::Berufsschule, "berufsschule"),
    (Category::FosBos, "fachoberschule|berufsoberschule|fos|bos"),
    (Category::Wirtschaftsschule, "wirtschaftsschule"),
    (Category::Foerderschule, "förderschule|sonderpädagogisch"),
];

fn compiled_patterns() -> &'static [(Category, Regex)] {
    static COMPILED: OnceLock<Vec<(Category, Regex)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        PATTERNS
            .iter()
            .filter_map(|(category, pattern)| match Regex::new(pattern) {
                Ok(re) => Some((*category, re)),
                Err(err) => {
                    tracing::error!(%category, pattern, %err, "invalid category pattern");
                    None
                }
            })
            .collect()
    })
}

/// Classify a school by name. Total: anything unmatched is `Sonstige`.
pub fn classify(name: &str) -> Category {
    let lower = name.to_lowercase();
    compiled_patterns()
        .iter()
        .find(|(_, re)| re.is_match(&lower))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Sonstige)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_matches_documented_examples() {
        assert_eq!(classify("Städtisches Gymnasium München"), Category::Gymnasium);
        assert_eq!(classify("Grund- und Mittelschule Dorf"), Category::Mittelschule);
        assert_eq!(classify("Rathaus"), Category::Sonstige);
        assert_eq!(classify(""), Category::Sonstige);
    }

    #[test]
    fn classify_respects_priority_order() {
        // both patterns present: the earlier entry wins
        assert_eq!(classify("Grundschule und Mittelschule Au"), Category::Grundschule);
        assert_eq!(classify("Realschule mit Gymnasium"), Category::Gymnasium);
        assert_eq!(classify("Staatliche Wirtschaftsschule Ansbach"), Category::Wirtschaftsschule);
        assert_eq!(classify("Staatliche Berufsoberschule Kempten"), Category::FosBos);
        assert_eq!(classify("FOS Erding"), Category::FosBos);
        assert_eq!(classify("Hauptschule Nord"), Category::Mittelschule);
    }

    #[test]
    fn classify_is_case_insensitive_for_umlauts() {
        assert_eq!(classify("FÖRDERSCHULE am See"), Category::Foerderschule);
        assert_eq!(
            classify("Sonderpädagogisches Förderzentrum"),
            Category::Foerderschule
        );
    }

    #[test]
    fn labels_round_trip_through_from_str() {
        for category in Category::ALL {
            assert_eq!(category.label().parse::<Category>(), Ok(category));
        }
        assert!("Hochschule".parse::<Category>().is_err());
    }

    #[test]
    fn serde_uses_labels() {
        let json = serde_json::to_string(&Category::FosBos).expect("serialize");
        assert_eq!(json, "\"FOS/BOS\"");
        let parsed: Category = serde_json::from_str("\"Förderschule\"").expect("deserialize");
        assert_eq!(parsed, Category::Foerderschule);
    }
}
