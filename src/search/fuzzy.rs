//! Approximate title matching
//!
//! A search term matches a title when some substring of the title is within
//! a small edit distance of the term. The score combines the share of edits
//! with how far from the start of the title the match begins:
//!
//! `score = errors / term_len + start / distance`
//!
//! A match is kept when `score <= threshold`. Kept items are ranked by the
//! score weighted by title length (shorter titles rank higher on equal
//! scores), ties keep their input order.

/// Approximate matcher with a similarity threshold
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    /// 0.0 requires an exact match at the start, 1.0 matches almost anything
    threshold: f64,
    /// Characters of offset that cost a full mismatch
    distance: usize,
}

/// Outcome of scoring one text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    /// Edit operations needed
    pub errors: usize,
    /// Character offset where the matched substring starts
    pub start: usize,
    /// Combined score, lower is better
    pub score: f64,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new(0.4)
    }
}

impl FuzzyMatcher {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
            distance: 100,
        }
    }

    /// Override how quickly the match position penalty grows
    pub fn with_distance(mut self, distance: usize) -> Self {
        self.distance = distance;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Score `text` against `term`, case-insensitively
    pub fn score(&self, term: &str, text: &str) -> Option<Match> {
        let pattern: Vec<char> = term.trim().to_lowercase().chars().collect();
        let text: Vec<char> = text.to_lowercase().chars().collect();
        if pattern.is_empty() {
            return Some(Match {
                errors: 0,
                start: 0,
                score: 0.0,
            });
        }

        let best = best_substring_match(&pattern, &text, self.distance);
        if best.score <= self.threshold {
            Some(best)
        } else {
            None
        }
    }

    /// Keep the items whose key matches `term`, best first
    pub fn filter<T, F>(&self, term: &str, items: Vec<T>, key: F) -> Vec<T>
    where
        F: Fn(&T) -> &str,
    {
        let mut matched: Vec<(f64, usize, T)> = items
            .into_iter()
            .enumerate()
            .filter_map(|(position, item)| {
                let text = key(&item);
                let weighted = self
                    .score(term, text)
                    .map(|m| length_weighted(m.score, text));
                weighted.map(|w| (w, position, item))
            })
            .collect();

        matched.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        matched.into_iter().map(|(_, _, item)| item).collect()
    }
}

/// Best approximate occurrence of `pattern` anywhere in `text`.
///
/// Edit distance against every substring, computed column by column with
/// a free start position. Each cell also carries where its alignment began.
fn best_substring_match(pattern: &[char], text: &[char], distance: usize) -> Match {
    let m = pattern.len();
    // cost[i] / origin[i]: best alignment of pattern[..i] ending at the
    // current text column
    let mut cost: Vec<usize> = (0..=m).collect();
    let mut origin: Vec<usize> = vec![0; m + 1];

    let mut best = Match {
        errors: m,
        start: 0,
        score: positional_score(m, m, 0, distance),
    };

    for (j, &c) in text.iter().enumerate() {
        let mut prev_cost = cost[0];
        let mut prev_origin = origin[0];
        // empty prefix matches anywhere for free
        cost[0] = 0;
        origin[0] = j + 1;

        for i in 1..=m {
            let substitute = prev_cost + usize::from(pattern[i - 1] != c);
            let skip_text = cost[i] + 1;
            let skip_pattern = cost[i - 1] + 1;

            let (next_cost, next_origin) = if substitute <= skip_text && substitute <= skip_pattern {
                (substitute, prev_origin)
            } else if skip_pattern <= skip_text {
                (skip_pattern, origin[i - 1])
            } else {
                (skip_text, origin[i])
            };

            prev_cost = cost[i];
            prev_origin = origin[i];
            cost[i] = next_cost;
            origin[i] = next_origin;
        }

        let candidate = Match {
            errors: cost[m],
            start: origin[m],
            score: positional_score(cost[m], m, origin[m], distance),
        };
        if candidate.score < best.score {
            best = candidate;
        }
    }

    best
}

fn positional_score(errors: usize, pattern_len: usize, start: usize, distance: usize) -> f64 {
    let accuracy = errors as f64 / pattern_len as f64;
    if distance == 0 {
        return if start == 0 { accuracy } else { 1.0 };
    }
    accuracy + start as f64 / distance as f64
}

/// Rank adjustment for longer titles: a match in a short title is worth more
fn length_weighted(score: f64, text: &str) -> f64 {
    let tokens = text.split_whitespace().count().max(1);
    let norm = ((1.0 / (tokens as f64).sqrt()) * 1000.0).round() / 1000.0;
    let base = if score == 0.0 { f64::EPSILON } else { score };
    base.powf(norm)
}
