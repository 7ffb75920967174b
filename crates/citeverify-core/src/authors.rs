//! Comparison-side author matching.
//!
//! Display names come out of [`citeverify_parsing::normalize_author_name`];
//! here they are reduced further to a comparison key in which given names
//! become initials (`"Ursula K. Le Guin"` and `"Le Guin, U. K."` both key to
//! `u k le guin`). Japanese-script names compare as whole strings.

use citeverify_parsing::names::is_surname_particle;
use citeverify_parsing::text_processing::contains_japanese;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Prefixes that start a multi-word surname, beyond the display-side particles.
static EXTRA_PREFIXES: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["al", "ibn", "ben", "bin"].into_iter().collect());

/// Name suffixes to strip.
static NAME_SUFFIXES: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["jr", "sr", "ii", "iii", "iv"].into_iter().collect());

#[derive(Debug, Clone, PartialEq, Eq)]
enum Given {
    Initial(char),
    Full(String),
}

impl Given {
    fn initial(&self) -> char {
        match self {
            Given::Initial(c) => *c,
            Given::Full(s) => s.chars().next().unwrap_or(' '),
        }
    }

    fn compatible(&self, other: &Given) -> bool {
        match (self, other) {
            (Given::Full(a), Given::Full(b)) => a == b,
            _ => self.initial() == other.initial(),
        }
    }
}

/// A name reduced for comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorKey {
    /// Lowercased, diacritic-folded surname; the whole name for Japanese script.
    surname: String,
    given: Vec<Given>,
    japanese: bool,
}

impl AuthorKey {
    /// The key as a string: given initials followed by the surname.
    pub fn canonical(&self) -> String {
        let mut parts: Vec<String> = self.given.iter().map(|g| g.initial().to_string()).collect();
        parts.push(self.surname.clone());
        parts.join(" ")
    }

    pub fn surname(&self) -> &str {
        &self.surname
    }
}

/// Whether a list entry stands for omitted co-authors.
pub fn is_et_al(name: &str) -> bool {
    let n = name.trim().trim_end_matches('.').to_lowercase();
    matches!(n.as_str(), "et al" | "et. al" | "他" | "ほか" | "and others")
}

fn fold(text: &str) -> String {
    text.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

fn is_surname_prefix(token: &str) -> bool {
    let bare = token.trim_end_matches('.');
    is_surname_particle(token) || EXTRA_PREFIXES.contains(bare.to_lowercase().as_str())
}

/// Split given-name text into initials and full names: `"G.A."` → `[g, a]`,
/// `"Jean-Paul"` → `[jean, paul]`.
fn given_tokens(text: &str) -> Vec<Given> {
    text.split(|c: char| c.is_whitespace() || c == '.' || c == '-')
        .filter(|t| !t.is_empty())
        .map(fold)
        .map(|t| {
            let mut chars = t.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Given::Initial(c),
                _ => Given::Full(t),
            }
        })
        .collect()
}

/// Reduce a display name to its comparison key. `None` for blank names and
/// "et al." markers.
pub fn author_key(name: &str) -> Option<AuthorKey> {
    let name = name.trim();
    if name.is_empty() || is_et_al(name) {
        return None;
    }

    if contains_japanese(name) {
        let whole: String = name
            .chars()
            .filter(|c| !c.is_whitespace() && !matches!(c, '・' | '／' | '/' | ',' | '，'))
            .collect();
        return Some(AuthorKey {
            surname: whole,
            given: Vec::new(),
            japanese: true,
        });
    }

    // "Last, Given"
    if let Some((last, rest)) = name.split_once(',') {
        let surname = fold(last.trim());
        if !surname.is_empty() {
            let rest: Vec<&str> = rest
                .split_whitespace()
                .filter(|t| !NAME_SUFFIXES.contains(t.trim_end_matches('.').to_lowercase().as_str()))
                .collect();
            return Some(AuthorKey {
                surname,
                given: given_tokens(&rest.join(" ")),
                japanese: false,
            });
        }
    }

    let mut parts: Vec<&str> = name.split_whitespace().collect();
    while parts.len() >= 2
        && parts
            .last()
            .is_some_and(|p| NAME_SUFFIXES.contains(p.trim_end_matches(['.', ',']).to_lowercase().as_str()))
    {
        parts.pop();
    }

    // "Smith JA" / "MILLER G A": trailing bare uppercase initials
    let is_bare_initials =
        |t: &&str| t.chars().count() <= 2 && t.chars().all(|c| c.is_uppercase());
    let trailing = parts.iter().rev().copied().take_while(is_bare_initials).count();
    if trailing >= 1 && trailing < parts.len() && parts[0].chars().count() > 2 {
        let split = parts.len() - trailing;
        let given = parts[split..]
            .iter()
            .flat_map(|t| t.chars())
            .flat_map(char::to_lowercase)
            .map(Given::Initial)
            .collect();
        return Some(AuthorKey {
            surname: fold(&parts[..split].join(" ")),
            given,
            japanese: false,
        });
    }

    let start = surname_start(&parts);
    Some(AuthorKey {
        surname: fold(&parts[start..].join(" ")),
        given: given_tokens(&parts[..start].join(" ")),
        japanese: false,
    })
}

/// Index where the surname starts: the earliest particle after the first
/// token, else the last token.
fn surname_start(parts: &[&str]) -> usize {
    (1..parts.len())
        .find(|&i| i + 1 < parts.len() && is_surname_prefix(parts[i]))
        .unwrap_or(parts.len().saturating_sub(1))
}

/// Split a display name into `(given, surname)`, keeping its case.
///
/// `"Ursula K. Le Guin"` → `("Ursula K.", "Le Guin")`. Japanese-script names
/// and single tokens come back whole as the surname.
pub fn split_name(name: &str) -> (String, String) {
    let name = name.trim();
    if contains_japanese(name) {
        return (String::new(), name.to_string());
    }
    if let Some((last, rest)) = name.split_once(',')
        && !last.trim().is_empty()
    {
        return (rest.trim().to_string(), last.trim().to_string());
    }
    let mut parts: Vec<&str> = name.split_whitespace().collect();
    while parts.len() >= 2
        && parts
            .last()
            .is_some_and(|p| NAME_SUFFIXES.contains(p.trim_end_matches(['.', ',']).to_lowercase().as_str()))
    {
        parts.pop();
    }
    let start = surname_start(&parts);
    (parts[..start].join(" "), parts[start..].join(" "))
}

/// The comparison key as a string, e.g. `"u k le guin"`. Empty for et al.
pub fn canonical_author(name: &str) -> String {
    author_key(name).map(|k| k.canonical()).unwrap_or_default()
}

/// Whether two keys denote the same person.
///
/// Surnames must match exactly. Given names are compared position by
/// position: an initial matches a full name with the same first letter, two
/// full names must be equal. A side with no given names matches on surname.
pub fn keys_equivalent(a: &AuthorKey, b: &AuthorKey) -> bool {
    if a.japanese != b.japanese || a.surname != b.surname {
        return false;
    }
    a.given
        .iter()
        .zip(b.given.iter())
        .all(|(x, y)| x.compatible(y))
}

/// Whether two display names denote the same person.
pub fn authors_equivalent(a: &str, b: &str) -> bool {
    match (author_key(a), author_key(b)) {
        (Some(a), Some(b)) => keys_equivalent(&a, &b),
        _ => false,
    }
}

/// Author similarity between parsed and candidate author lists: 100 when
/// enough parsed authors have an equivalent on the candidate side, else 0.
///
/// Enough means at least a third of the parsed authors, or at least one when
/// there are at most two. `None` when either side has no authors once
/// "et al." is ignored.
pub fn author_similarity(parsed: &[String], candidate: &[String]) -> Option<f64> {
    let parsed: Vec<AuthorKey> = parsed.iter().filter_map(|a| author_key(a)).collect();
    let candidate: Vec<AuthorKey> = candidate.iter().filter_map(|a| author_key(a)).collect();
    if parsed.is_empty() || candidate.is_empty() {
        return None;
    }

    let matched = parsed
        .iter()
        .filter(|p| candidate.iter().any(|c| keys_equivalent(p, c)))
        .count();
    let enough = if parsed.len() <= 2 {
        matched >= 1
    } else {
        matched * 3 >= parsed.len()
    };
    Some(if enough { 100.0 } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_canonical_le_guin() {
        assert_eq!(canonical_author("Ursula K. Le Guin"), "u k le guin");
        assert_eq!(canonical_author("Le Guin, U. K."), "u k le guin");
    }

    #[test]
    fn test_miller_forms_equivalent() {
        assert!(authors_equivalent("Miller, G. A.", "G. A. Miller"));
        assert!(authors_equivalent("George A. Miller", "Miller, G. A."));
        assert!(authors_equivalent("MILLER G A", "G. A. Miller"));
    }

    #[test]
    fn test_trailing_bare_initials() {
        assert_eq!(canonical_author("Smith JA"), "j a smith");
        assert_eq!(canonical_author("MILLER G A"), "g a miller");
        assert!(authors_equivalent("Smith JA", "John A. Smith"));
    }

    #[test]
    fn test_full_given_names_must_agree() {
        assert!(!authors_equivalent("George Miller", "Gregory Miller"));
        assert!(authors_equivalent("G. Miller", "Gregory Miller"));
    }

    #[test]
    fn test_surname_must_match() {
        assert!(!authors_equivalent("G. A. Miller", "G. A. Millar"));
    }

    #[test]
    fn test_diacritics_folded() {
        assert!(authors_equivalent("José García", "J. Garcia"));
    }

    #[test]
    fn test_particle_surnames() {
        assert_eq!(canonical_author("Jan van der Berg"), "j van der berg");
        assert!(authors_equivalent("Jay J. Van Bavel", "Van Bavel, J. J."));
    }

    #[test]
    fn test_suffix_stripped() {
        assert_eq!(canonical_author("Martin Luther King Jr."), "m l king");
    }

    #[test]
    fn test_split_name() {
        assert_eq!(
            split_name("Ursula K. Le Guin"),
            ("Ursula K.".to_string(), "Le Guin".to_string())
        );
        assert_eq!(
            split_name("Hall, Stuart"),
            ("Stuart".to_string(), "Hall".to_string())
        );
        assert_eq!(split_name("坂部創一"), (String::new(), "坂部創一".to_string()));
        assert_eq!(split_name("Plato"), (String::new(), "Plato".to_string()));
    }

    #[test]
    fn test_japanese_whole_string() {
        assert!(authors_equivalent("坂部創一", "坂部 創一"));
        assert!(authors_equivalent("夏目・漱石", "夏目漱石"));
        assert!(!authors_equivalent("坂部創一", "坂部創二"));
        assert!(!authors_equivalent("坂部創一", "Soichi Sakabe"));
    }

    #[test]
    fn test_et_al_ignored() {
        assert_eq!(author_key("et al."), None);
        assert_eq!(author_key("他"), None);
        assert_eq!(
            author_similarity(&s(&["A. Vaswani", "et al."]), &s(&["Ashish Vaswani"])),
            Some(100.0)
        );
        assert_eq!(author_similarity(&s(&["et al."]), &s(&["Ashish Vaswani"])), None);
    }

    #[test]
    fn test_author_similarity_third_rule() {
        let parsed = s(&["A. One", "B. Two", "C. Three", "D. Four", "E. Five", "F. Six"]);
        // 2 of 6 is a third
        assert_eq!(
            author_similarity(&parsed, &s(&["Alice One", "Bob Two"])),
            Some(100.0)
        );
        // 1 of 6 is not
        assert_eq!(author_similarity(&parsed, &s(&["Alice One"])), Some(0.0));
    }

    #[test]
    fn test_author_similarity_small_lists() {
        assert_eq!(
            author_similarity(&s(&["Stuart Hall", "X. Y"]), &s(&["S. Hall"])),
            Some(100.0)
        );
        assert_eq!(author_similarity(&s(&["Stuart Hall"]), &s(&["Bob Brown"])), Some(0.0));
        assert_eq!(author_similarity(&[], &s(&["Bob Brown"])), None);
    }
}
