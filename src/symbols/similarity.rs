//! Name similarity for fuzzy symbol matching.

/// Words that vary between data sources for the same issuer.
const NOISE_WORDS: &[&str] = &[
    "inc",
    "incorporated",
    "corp",
    "corporation",
    "co",
    "company",
    "ltd",
    "limited",
    "plc",
    "llc",
    "lp",
    "sa",
    "ag",
    "nv",
    "the",
];

/// Lowercase, punctuation to spaces, corporate suffixes dropped.
pub fn normalize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|word| !NOISE_WORDS.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `2 × LCS / (len(a) + len(b))` over normalized names, in `[0, 1]`.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = normalize_name(a).chars().collect();
    let b: Vec<char> = normalize_name(b).chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let lcs = longest_common_subsequence(&a, &b);
    (2 * lcs) as f64 / (a.len() + b.len()) as f64
}

fn longest_common_subsequence(a: &[char], b: &[char]) -> usize {
    let mut previous = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            current[j + 1] = if ca == cb {
                previous[j] + 1
            } else {
                current[j].max(previous[j + 1])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffixes_and_case_are_ignored() {
        assert_eq!(normalize_name("Apple Inc."), "apple");
        assert_eq!(name_similarity("APPLE INC", "Apple Inc."), 1.0);
    }

    #[test]
    fn unrelated_names_score_low() {
        assert!(name_similarity("Apple", "Vanguard Total Bond Market") < 0.5);
    }

    #[test]
    fn close_names_score_high() {
        let score = name_similarity(
            "Vanguard Total Stock Mkt ETF",
            "Vanguard Total Stock Market Index Fund ETF",
        );
        assert!(score > 0.7, "score was {score}");
    }

    #[test]
    fn empty_names_score_zero() {
        assert_eq!(name_similarity("", "Apple"), 0.0);
        assert_eq!(name_similarity("Inc.", "Corp"), 0.0);
    }
}
