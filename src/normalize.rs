// 🧹 Normalizer - Comparable keys for county names
//
// "略阳县", " 略阳 ", "略阳" → "略阳"
//
// Administrative tokens are removed wherever they occur, not only at the end,
// and removal repeats until nothing changes so the result is idempotent.

use serde::{Deserialize, Serialize};

/// Default county, district and city level tokens
pub const DEFAULT_SUFFIX_TOKENS: [&str; 3] = ["县", "区", "市"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Normalizer {
    suffix_tokens: Vec<String>,
}

impl Normalizer {
    /// Create normalizer with a custom token set (empty tokens are dropped)
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let suffix_tokens = tokens
            .into_iter()
            .map(Into::into)
            .filter(|t: &String| !t.is_empty())
            .collect();

        Normalizer { suffix_tokens }
    }

    pub fn tokens(&self) -> &[String] {
        &self.suffix_tokens
    }

    /// Canonicalize a county name. Never fails; empty in, empty out.
    pub fn normalize(&self, name: &str) -> String {
        let mut current = name.trim().to_string();

        loop {
            let mut next = current.clone();
            for token in &self.suffix_tokens {
                next = next.replace(token.as_str(), "");
            }
            let next = next.trim().to_string();

            if next == current {
                return current;
            }
            current = next;
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Normalizer::new(DEFAULT_SUFFIX_TOKENS)
    }
}

/// Normalize with the default token set
pub fn normalize_county_name(name: &str) -> String {
    Normalizer::default().normalize(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_trailing_suffix() {
        assert_eq!(normalize_county_name("略阳县"), "略阳");
        assert_eq!(normalize_county_name("汉台区"), "汉台");
        assert_eq!(normalize_county_name("韩城市"), "韩城");
    }

    #[test]
    fn test_strips_tokens_anywhere() {
        // Removal is substring-wise, so inner tokens go too
        assert_eq!(normalize_county_name("县城区"), "城");
        assert_eq!(normalize_county_name("市中区"), "中");
    }

    #[test]
    fn test_trims_whitespace() {
        assert_eq!(normalize_county_name("  宁强县 "), "宁强");
        assert_eq!(normalize_county_name("宁强 县"), "宁强");
        assert_eq!(normalize_county_name("\u{3000}宁强\u{3000}"), "宁强");
    }

    #[test]
    fn test_empty_and_token_only_inputs() {
        assert_eq!(normalize_county_name(""), "");
        assert_eq!(normalize_county_name("   "), "");
        assert_eq!(normalize_county_name("县"), "");
        assert_eq!(normalize_county_name("市辖区"), "辖");
    }

    #[test]
    fn test_idempotent() {
        let normalizer = Normalizer::default();
        let samples = [
            "略阳县", "宁强", " 区 县 市 ", "峨边彝族自治县", "", "市中区", "Lueyang County",
        ];

        for sample in samples {
            let once = normalizer.normalize(sample);
            assert_eq!(normalizer.normalize(&once), once, "input: {:?}", sample);
        }
    }

    #[test]
    fn test_multi_char_tokens_reach_fixed_point() {
        // Removing "ab" from "aabb" leaves "ab", which must also go
        let normalizer = Normalizer::new(["ab"]);
        let once = normalizer.normalize("aabb");
        assert_eq!(once, "");
        assert_eq!(normalizer.normalize(&once), once);
    }

    #[test]
    fn test_empty_tokens_are_ignored() {
        let normalizer = Normalizer::new(["", "县"]);
        assert_eq!(normalizer.tokens(), &["县".to_string()]);
        assert_eq!(normalizer.normalize("略阳县"), "略阳");
    }
}
