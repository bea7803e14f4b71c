//! Name similarity and alias heuristics
//!
//! Both are pure functions of their inputs so the heuristics can be swapped
//! without touching merge orchestration.

use crate::rules::RuleTable;
use std::collections::BTreeSet;

/// Scores how alike two entity names are, in [0, 1]
pub trait NameSimilarity: Send + Sync {
    /// Similarity of `a` and `b`; must be symmetric
    fn similarity(&self, a: &str, b: &str) -> f64;
}

/// Ratcliff/Obershelp ratio over lower-cased characters
///
/// `2 * M / (len(a) + len(b))`, where M is the number of characters covered by
/// the recursively found longest common substrings. Two empty strings score 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceRatio;

impl NameSimilarity for SequenceRatio {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        let mut a: Vec<char> = a.to_lowercase().chars().collect();
        let mut b: Vec<char> = b.to_lowercase().chars().collect();
        // Fixed argument order keeps the score symmetric
        if a > b {
            std::mem::swap(&mut a, &mut b);
        }

        let total = a.len() + b.len();
        if total == 0 {
            return 1.0;
        }
        2.0 * matching_characters(&a, &b) as f64 / total as f64
    }
}

fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            pending.push((i + k, ahi, j + k, bhi));
        }
    }

    matched
}

/// Longest common substring of `a[alo..ahi]` and `b[blo..bhi]`
///
/// Ties go to the match starting earliest in `a`, then earliest in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo + 1;
    let mut best = (alo, blo, 0);
    let mut prev = vec![0usize; width];
    let mut cur = vec![0usize; width];

    for i in alo..ahi {
        for j in blo..bhi {
            let slot = j - blo + 1;
            if a[i] == b[j] {
                let k = prev[slot - 1] + 1;
                cur[slot] = k;
                if k > best.2 {
                    best = (i + 1 - k, j + 1 - k, k);
                }
            } else {
                cur[slot] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    best
}

/// Suffix, honorific, and transliteration rules for alias detection
#[derive(Debug, Clone)]
pub struct AliasRules {
    /// Corporate suffixes stripped from organization names
    pub company_suffixes: Vec<String>,
    /// Titles stripped from person names
    pub honorifics: Vec<String>,
    /// (latin, transliterated) name fragments that denote the same person
    pub transliterations: Vec<(String, String)>,
    /// Minimum length of a cleaned name for substring matching
    pub min_substring_len: usize,
}

impl Default for AliasRules {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            company_suffixes: owned(&[
                "公司", "集团", "科技", "Corporation", "Corp.", "Corp", "Company", "Co.", "Co",
                "Inc.", "Inc", "Ltd.", "Ltd", "Limited", "Technology", "Tech", "Group",
            ]),
            honorifics: owned(&["先生", "女士", "Mr.", "Mr", "Mrs.", "Mrs", "Ms.", "Ms", "Miss", "Dr.", "Dr"]),
            transliterations: [
                ("musk", "马斯克"),
                ("elon", "埃隆"),
                ("jobs", "乔布斯"),
                ("cook", "库克"),
                ("gates", "盖茨"),
            ]
            .iter()
            .map(|(l, t)| (l.to_string(), t.to_string()))
            .collect(),
            min_substring_len: 3,
        }
    }
}

impl AliasRules {
    /// Whether two names denote the same entity under these rules
    ///
    /// `types` is the union of both entities' type labels; it decides which
    /// cleaning rules apply.
    pub fn are_aliases(&self, a: &str, b: &str, types: &BTreeSet<String>, rules: &RuleTable) -> bool {
        let clean_a = self.clean_name(a, types, rules).to_lowercase();
        let clean_b = self.clean_name(b, types, rules).to_lowercase();

        if clean_a.is_empty() || clean_b.is_empty() {
            return false;
        }
        if clean_a == clean_b {
            return true;
        }

        let (shorter, longer) = if clean_a.chars().count() <= clean_b.chars().count() {
            (&clean_a, &clean_b)
        } else {
            (&clean_b, &clean_a)
        };
        if shorter.chars().count() >= self.min_substring_len && longer.contains(shorter.as_str()) {
            return true;
        }

        self.transliterations.iter().any(|(latin, translit)| {
            (clean_a.contains(latin.as_str()) && clean_b.contains(translit.as_str()))
                || (clean_b.contains(latin.as_str()) && clean_a.contains(translit.as_str()))
        })
    }

    /// Strip suffixes or honorifics according to the entity types
    pub fn clean_name(&self, name: &str, types: &BTreeSet<String>, rules: &RuleTable) -> String {
        let expanded = rules.expand_types(types);
        let mut cleaned = name.trim().to_string();

        if expanded.contains("organization") {
            if let Some(stripped) = self.strip_company_suffix(&cleaned) {
                cleaned = stripped;
            }
        } else if expanded.contains("person") {
            cleaned = self.strip_honorifics(&cleaned);
        }

        cleaned
    }

    fn strip_company_suffix(&self, name: &str) -> Option<String> {
        self.company_suffixes.iter().find_map(|suffix| {
            let cut = name.len().checked_sub(suffix.len())?;
            if cut == 0 || !name.is_char_boundary(cut) {
                return None;
            }
            let (head, tail) = name.split_at(cut);
            if tail.to_lowercase() != suffix.to_lowercase() {
                return None;
            }
            // Latin suffixes must stand alone as a word
            if suffix.is_ascii() && !head.ends_with(|c: char| c.is_whitespace() || c == ',') {
                return None;
            }
            Some(head.trim_end_matches(|c: char| c.is_whitespace() || c == ',').to_string())
        })
    }

    fn strip_honorifics(&self, name: &str) -> String {
        let mut cleaned = name.to_string();

        for honorific in self.honorifics.iter().filter(|h| !h.is_ascii()) {
            if let Some(rest) = cleaned.strip_suffix(honorific.as_str()) {
                cleaned = rest.trim().to_string();
            }
            if let Some(rest) = cleaned.strip_prefix(honorific.as_str()) {
                cleaned = rest.trim().to_string();
            }
        }

        cleaned
            .split_whitespace()
            .filter(|word| {
                !self
                    .honorifics
                    .iter()
                    .any(|h| h.is_ascii() && h.eq_ignore_ascii_case(word))
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
