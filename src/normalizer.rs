use crate::model::{FacetCatalog, ListingIdentity};
use regex::Regex;
use std::fmt::Display;
use tracing::warn;

/// Finds the first whole-token occurrence of any vocabulary member in `text`.
///
/// All members are tried at once, so the leftmost match in the text wins.
/// When two members start at the same position the longer one is preferred,
/// which keeps the result independent of vocabulary order.
pub fn match_vocabulary<T: Display>(
    vocabulary: impl IntoIterator<Item = T>,
    text: &str,
) -> Option<String> {
    let mut alternatives: Vec<String> = vocabulary
        .into_iter()
        .map(|item| item.to_string())
        .filter(|item| !item.is_empty())
        .collect();
    if alternatives.is_empty() {
        return None;
    }
    alternatives.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    alternatives.dedup();

    let escaped: Vec<String> = alternatives.iter().map(|a| regex::escape(a)).collect();
    let pattern = format!(r"\b({})\b", escaped.join("|"));
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            warn!("Vocabulary pattern rejected: {}", e);
            return None;
        }
    };

    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Like [`match_vocabulary`] but only accepts an all-digit token.
pub fn match_year<'a>(years: impl IntoIterator<Item = &'a i32>, text: &str) -> Option<i32> {
    let token = match_vocabulary(years, text)?;
    if token.chars().all(|c| c.is_ascii_digit()) {
        token.parse().ok()
    } else {
        None
    }
}

/// Resolves model, trim and year from a listing's display name.
pub fn resolve_identity(display_name: &str, catalog: &FacetCatalog) -> ListingIdentity {
    ListingIdentity {
        model: match_vocabulary(&catalog.models, display_name),
        trim: match_vocabulary(&catalog.styles, display_name),
        year: match_year(&catalog.years, display_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> FacetCatalog {
        FacetCatalog {
            years: [2023, 2024].into_iter().collect(),
            styles: ["Sport", "Premium"].iter().map(|s| s.to_string()).collect(),
            models: ["A3", "Q3"].iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn matches_whole_tokens_only() {
        assert_eq!(
            match_vocabulary(["A3"], "Q3 Gallery A3 Sales"),
            Some("A3".to_string())
        );
        assert_eq!(match_vocabulary(["3"], "A3 Sportback"), None);
        assert_eq!(match_vocabulary(["Q"], "Q3"), None);
    }

    #[test]
    fn leftmost_occurrence_wins_regardless_of_order() {
        let text = "Q3 Gallery A3 Sales";
        assert_eq!(match_vocabulary(["A3", "Q3"], text), Some("Q3".to_string()));
        assert_eq!(match_vocabulary(["Q3", "A3"], text), Some("Q3".to_string()));
    }

    #[test]
    fn longer_member_wins_at_same_position() {
        let vocabulary = ["Q5", "Q5 Sportback"];
        assert_eq!(
            match_vocabulary(vocabulary, "2024 Q5 Sportback Premium"),
            Some("Q5 Sportback".to_string())
        );
    }

    #[test]
    fn metacharacters_are_escaped() {
        assert_eq!(
            match_vocabulary(["e-tron GT", "S.3"], "New e-tron GT quattro"),
            Some("e-tron GT".to_string())
        );
        assert_eq!(match_vocabulary(["S.3"], "SX3"), None);
    }

    #[test]
    fn empty_vocabulary_never_matches() {
        let empty: [&str; 0] = [];
        assert_eq!(match_vocabulary(empty, "anything"), None);
        assert_eq!(match_vocabulary([""], "anything"), None);
    }

    #[test]
    fn year_requires_member_token() {
        let years = [2023, 2024];
        assert_eq!(match_year(&years, "2024 Audi A3"), Some(2024));
        assert_eq!(match_year(&years, "Model 20245"), None);
        assert_eq!(match_year(&years, "2025 Audi A3"), None);
    }

    #[test]
    fn resolves_identity_within_catalog() {
        let identity = resolve_identity("2024 Audi A3 Premium", &catalog());
        assert_eq!(identity.model.as_deref(), Some("A3"));
        assert_eq!(identity.trim.as_deref(), Some("Premium"));
        assert_eq!(identity.year, Some(2024));

        let unknown = resolve_identity("2022 Audi RS 7 Prestige", &catalog());
        assert_eq!(unknown, ListingIdentity::default());
    }
}
