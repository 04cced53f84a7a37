//! Approximate matching of OCR text against requirement names.
//!
//! OCR on the shop list produces small per-character errors (a wrong stroke,
//! two glyphs merged into one). Exact lookup would silently skip real items,
//! so each row is compared with every requirement name using the
//! Ratcliff/Obershelp similarity ratio and accepted above a tuned threshold.

/// Default acceptance threshold for [`FuzzyMatcher`].
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.72;

/// Result of matching one piece of text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult<'k> {
    /// Best key scoring above the threshold, if any.
    pub key: Option<&'k str>,
    /// Score of `key`, or 0.0 when nothing matched.
    pub score: f64,
}

/// Picks the requirement name closest to a noisy OCR string.
#[derive(Debug, Clone, Copy)]
pub struct FuzzyMatcher {
    threshold: f64,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl FuzzyMatcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Returns the key with the highest similarity to `text`.
    ///
    /// Only Han characters of `text` take part in the comparison. A key must
    /// score strictly above the threshold; on equal scores the key seen
    /// first wins. Text made only of digits never matches, since the shop
    /// renders quantity labels right next to item names.
    pub fn find<'k, I>(&self, keys: I, text: &str) -> MatchResult<'k>
    where
        I: IntoIterator<Item = &'k str>,
    {
        let mut best = MatchResult {
            key: None,
            score: 0.0,
        };
        if is_numeric(text) {
            return best;
        }

        let filtered: Vec<char> = chinese_only(text).chars().collect();
        let mut floor = self.threshold;
        for key in keys {
            let key_chars: Vec<char> = key.chars().collect();
            let score = similarity(&filtered, &key_chars);
            if score > floor {
                best = MatchResult {
                    key: Some(key),
                    score,
                };
                floor = score;
            }
        }
        best
    }
}

/// True for a non-empty string made only of decimal digits.
pub fn is_numeric(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

/// True for the CJK unified ideographs used by item names.
pub fn is_han(c: char) -> bool {
    ('\u{4e00}'..='\u{9fa5}').contains(&c)
}

/// Drops every character that is not a Han ideograph.
pub fn chinese_only(text: &str) -> String {
    text.chars().filter(|&c| is_han(c)).collect()
}

/// Ratcliff/Obershelp ratio: `2 * M / (len(a) + len(b))`.
///
/// Two empty sequences are considered identical.
pub fn similarity<T: PartialEq>(a: &[T], b: &[T]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_size(a, b) as f64 / total as f64
}

/// Sum of the sizes of all matching blocks, found by repeatedly taking the
/// longest common run and recursing on both sides of it.
fn matching_size<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    let mut total = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        total += k;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            pending.push((i + k, ahi, j + k, bhi));
        }
    }
    total
}

/// Longest common run inside `a[alo..ahi]` and `b[blo..bhi]`.
///
/// Returns `(i, j, size)`; ties resolve to the earliest `i`, then the
/// earliest `j`.
fn longest_match<T: PartialEq>(
    a: &[T],
    b: &[T],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    // run_lengths[j - blo] = length of the common run ending at (i - 1, j)
    let width = bhi.saturating_sub(blo);
    let mut prev = vec![0usize; width + 1];
    let mut curr = vec![0usize; width + 1];

    for i in alo..ahi {
        for j in blo..bhi {
            let idx = j - blo + 1;
            curr[idx] = if a[i] == b[j] { prev[idx - 1] + 1 } else { 0 };
            if curr[idx] > best_size {
                best_size = curr[idx];
                best_i = i + 1 - best_size;
                best_j = j + 1 - best_size;
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    (best_i, best_j, best_size)
}
