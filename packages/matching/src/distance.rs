//! Token-set similarity measures.
//!
//! Every measure returns a similarity in [0, 1]; the matcher scales the
//! winning value to [0, 100] for the linkage table.

use placelink_models::DistanceKind;
use placelink_tokenize::TokenSet;

/// Scores two token sets with the selected measure.
#[must_use]
pub fn similarity(kind: DistanceKind, a: &TokenSet, b: &TokenSet) -> f64 {
    match kind {
        DistanceKind::Levenshtein => levenshtein_token_sets(a, b),
        DistanceKind::Jaccard => jaccard(a, b),
        DistanceKind::Masi => masi(a, b),
        DistanceKind::SetRatio => set_ratio(a, b),
    }
}

/// Per-token nearest-neighbor edit-distance scheme.
///
/// For every token in `a`, the minimum edit distance to any token in
/// `b`, normalized by the query token's length (0 on an exact hit).
/// The per-token minima are averaged and a length-imbalance penalty of
/// `|len(a) - len(b)| / 10` is added; a penalized distance above 1
/// clamps the similarity to 0.
fn levenshtein_token_sets(a: &TokenSet, b: &TokenSet) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let mut total = 0.0;
    for token_a in a.iter() {
        if b.contains(token_a) {
            continue;
        }
        let len_a = token_a.chars().count() as f64;
        let nearest = b
            .iter()
            .map(|token_b| strsim::levenshtein(token_a, token_b) as f64 / len_a)
            .fold(f64::INFINITY, f64::min);
        total += nearest;
    }

    let mut distance = total / a.len() as f64;
    distance += (a.len() as f64 - b.len() as f64).abs() / 10.0;

    if distance > 1.0 { 0.0 } else { 1.0 - distance }
}

fn intersection_size(a: &TokenSet, b: &TokenSet) -> usize {
    a.iter().filter(|token| b.contains(token)).count()
}

/// Jaccard similarity: `|a ∩ b| / |a ∪ b|`.
fn jaccard(a: &TokenSet, b: &TokenSet) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = intersection_size(a, b);
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// MASI set-agreement similarity: the Jaccard similarity weighted by
/// the monotonicity of the set relationship (1 for equal sets, 0.67
/// when one set contains the other, 0.33 for a partial overlap, 0 for
/// disjoint sets).
fn masi(a: &TokenSet, b: &TokenSet) -> f64 {
    let intersection = intersection_size(a, b);
    let monotonicity = if intersection == a.len() && intersection == b.len() {
        1.0
    } else if intersection == a.len() || intersection == b.len() {
        0.67
    } else if intersection > 0 {
        0.33
    } else {
        0.0
    };
    jaccard(a, b) * monotonicity
}

/// Order-insensitive similarity ratio: both sets are sorted and joined,
/// then compared with a normalized edit distance, so token order never
/// affects the score.
fn set_ratio(a: &TokenSet, b: &TokenSet) -> f64 {
    let joined = |set: &TokenSet| {
        let mut tokens: Vec<&str> = set.iter().collect();
        tokens.sort_unstable();
        tokens.join(" ")
    };
    strsim::normalized_levenshtein(&joined(a), &joined(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(words: &[&str]) -> TokenSet {
        words.iter().copied().collect()
    }

    #[test]
    fn identical_sets_score_one() {
        let a = tokens(&["main", "street"]);
        for kind in [
            DistanceKind::Levenshtein,
            DistanceKind::Jaccard,
            DistanceKind::Masi,
            DistanceKind::SetRatio,
        ] {
            assert!(
                (similarity(kind, &a, &a) - 1.0).abs() < f64::EPSILON,
                "{kind} on identical sets"
            );
        }
    }

    #[test]
    fn partial_token_match_is_strictly_between_zero_and_one() {
        let a = tokens(&["Main", "Street"]);
        let b = tokens(&["Main", "St"]);
        let score = similarity(DistanceKind::Levenshtein, &a, &b);
        assert!(score > 0.0 && score < 1.0, "got {score}");
    }

    #[test]
    fn levenshtein_averages_per_token_minima() {
        // "Street" → "St" is 4 edits over 6 chars; averaged with the
        // exact "Main" hit: (0 + 4/6) / 2 distance, no imbalance.
        let a = tokens(&["Main", "Street"]);
        let b = tokens(&["Main", "St"]);
        let expected = 1.0 - (4.0 / 6.0) / 2.0;
        let score = similarity(DistanceKind::Levenshtein, &a, &b);
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn length_imbalance_is_penalized() {
        let a = tokens(&["main"]);
        let b = tokens(&["main", "upper", "road"]);
        let score = similarity(DistanceKind::Levenshtein, &a, &b);
        assert!((score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn distances_above_one_clamp_to_zero() {
        let a = tokens(&["aaaaaa"]);
        let b = tokens(&["zzzzzz", "y", "x", "w", "v", "u"]);
        assert!(similarity(DistanceKind::Levenshtein, &a, &b).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_side_scores_zero() {
        let a = tokens(&["main"]);
        let empty = TokenSet::new();
        assert!(similarity(DistanceKind::Levenshtein, &a, &empty).abs() < f64::EPSILON);
        assert!(similarity(DistanceKind::Levenshtein, &empty, &a).abs() < f64::EPSILON);
    }

    #[test]
    fn jaccard_counts_shared_tokens() {
        let a = tokens(&["main", "street"]);
        let b = tokens(&["main", "road"]);
        let score = similarity(DistanceKind::Jaccard, &a, &b);
        assert!((score - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn masi_weights_subset_relations() {
        let a = tokens(&["main", "street"]);
        let superset = tokens(&["main", "street", "aberdeen"]);
        let overlap = tokens(&["main", "road"]);
        let disjoint = tokens(&["castle", "wynd"]);

        let subset_score = similarity(DistanceKind::Masi, &a, &superset);
        assert!((subset_score - (2.0 / 3.0) * 0.67).abs() < 1e-9);

        let overlap_score = similarity(DistanceKind::Masi, &a, &overlap);
        assert!((overlap_score - (1.0 / 3.0) * 0.33).abs() < 1e-9);

        assert!(similarity(DistanceKind::Masi, &a, &disjoint).abs() < f64::EPSILON);
    }

    #[test]
    fn set_ratio_ignores_token_order() {
        let a = tokens(&["street", "main"]);
        let b = tokens(&["main", "street"]);
        assert!((similarity(DistanceKind::SetRatio, &a, &b) - 1.0).abs() < f64::EPSILON);
    }
}
