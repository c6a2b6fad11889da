//! Property-based tests for domain rule matching.
//!
//! These tests verify that suggestions always come from the most specific
//! applicable rule for arbitrary hostnames and rule sets.

use instapaper_sort::model::FolderId;
use instapaper_sort::rules::{candidate_patterns, RuleSet};
use proptest::prelude::*;

// --- Arbitrary strategies ---

fn arb_label() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,8}"
}

fn arb_domain() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_label(), 2..6).prop_map(|labels| labels.join("."))
}

/// Every pattern that could apply to `domain`, paired with its specificity
/// (exact rules rank above any wildcard).
fn applicable(domain: &str) -> Vec<(String, usize)> {
    let labels: Vec<&str> = domain.split('.').collect();
    let mut out = vec![(domain.to_string(), usize::MAX)];
    for start in 0..labels.len() {
        out.push((format!(".{}", labels[start..].join(".")), labels.len() - start));
    }
    out
}

proptest! {
    /// Whatever subset of applicable rules exists, the most specific wins.
    #[test]
    fn most_specific_rule_wins(
        domain in arb_domain(),
        mask in prop::collection::vec(any::<bool>(), 8),
        noise in prop::collection::vec((arb_domain(), 1u64..100), 0..5),
    ) {
        let mut rules = RuleSet::new();
        // Labels never start with a digit, so these can never apply.
        for (other, folder) in &noise {
            rules.insert(&format!("{other}.0x"), FolderId(1000 + folder)).unwrap();
        }

        let mut best: Option<(usize, FolderId)> = None;
        for (i, (pattern, rank)) in applicable(&domain).into_iter().enumerate() {
            if mask.get(i).copied().unwrap_or(false) {
                let folder = FolderId(i as u64);
                rules.insert(&pattern, folder).unwrap();
                if best.map_or(true, |(r, _)| rank > r) {
                    best = Some((rank, folder));
                }
            }
        }

        prop_assert_eq!(rules.suggest(&domain), best.map(|(_, f)| f));
    }

    /// A wildcard matches its own domain and any subdomain of it.
    #[test]
    fn wildcard_matches_subdomains(base in arb_domain(), prefix in prop::collection::vec(arb_label(), 0..3)) {
        let mut rules = RuleSet::new();
        rules.insert(&format!(".{base}"), FolderId(1)).unwrap();

        let mut host = prefix.join(".");
        if !host.is_empty() {
            host.push('.');
        }
        host.push_str(&base);
        prop_assert_eq!(rules.suggest(&host), Some(FolderId(1)));
    }

    /// Sharing a textual suffix without a label boundary is not a match.
    #[test]
    fn wildcard_respects_label_boundary(base in arb_domain(), glue in "[a-z0-9]{1,5}") {
        let mut rules = RuleSet::new();
        rules.insert(&format!(".{base}"), FolderId(1)).unwrap();
        let lookalike = format!("{glue}{base}");
        prop_assert_eq!(rules.suggest(&lookalike), None);
    }

    /// Every candidate pattern offered for a domain actually matches it.
    #[test]
    fn candidates_all_match(domain in arb_domain()) {
        for pattern in candidate_patterns(&domain) {
            let mut rules = RuleSet::new();
            rules.insert(&pattern, FolderId(3)).unwrap();
            prop_assert_eq!(rules.suggest(&domain), Some(FolderId(3)));
        }
    }
}

#[test]
fn test_example_com_scenarios() {
    let mut rules = RuleSet::new();
    rules.insert(".example.com", FolderId(1)).unwrap();
    for host in ["example.com", "www.example.com", "a.b.example.com"] {
        assert_eq!(rules.suggest(host), Some(FolderId(1)), "{host}");
    }
    assert_eq!(rules.suggest("notexample.com"), None);
}
