//! Context budget trimming.
//!
//! Fits an ordered sequence of text units (oldest or least relevant first)
//! into a token budget by keeping the longest suffix that fits. Items are
//! kept whole or dropped, never truncated.

/// Maps text to a token count for budgeting.
pub trait Tokenizer {
    /// Number of tokens `text` costs.
    fn count_tokens(&self, text: &str) -> usize;
}

impl<F> Tokenizer for F
where
    F: Fn(&str) -> usize,
{
    fn count_tokens(&self, text: &str) -> usize {
        self(text)
    }
}

/// Counts whitespace-separated words.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

/// Approximates tokens as one per `chars_per_token` characters, rounded up.
#[derive(Debug, Clone, Copy)]
pub struct CharRatioTokenizer {
    /// Characters per token. At least 1.
    pub chars_per_token: usize,
}

impl Default for CharRatioTokenizer {
    fn default() -> Self {
        Self { chars_per_token: 4 }
    }
}

impl Tokenizer for CharRatioTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token.max(1))
    }
}

/// Keep the newest items of `items` that fit in `max_tokens`.
///
/// Walks from the end, stopping at the first item that would overflow the
/// budget or once `max_items` are kept (`None` = no item limit). Returns a
/// suffix of `items` in original order; if the newest item alone is over
/// budget, or `max_items` is `Some(0)`, the result is empty.
pub fn trim<'a, T, K>(items: &'a [T], max_tokens: usize, max_items: Option<usize>, tokenizer: &K) -> &'a [T]
where
    T: AsRef<str>,
    K: Tokenizer + ?Sized,
{
    let max_items = max_items.unwrap_or(usize::MAX);
    let mut used = 0_usize;
    let mut start = items.len();

    for item in items.iter().rev() {
        if items.len() - start >= max_items {
            break;
        }
        let cost = tokenizer.count_tokens(item.as_ref());
        match used.checked_add(cost) {
            Some(total) if total <= max_tokens => {
                used = total;
                start -= 1;
            }
            _ => break,
        }
    }

    &items[start..]
}

/// Total tokens of `items` under `tokenizer`.
pub fn total_tokens<T, K>(items: &[T], tokenizer: &K) -> usize
where
    T: AsRef<str>,
    K: Tokenizer + ?Sized,
{
    items.iter().map(|i| tokenizer.count_tokens(i.as_ref())).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Items whose text is their own token cost.
    fn costed(costs: &[usize]) -> Vec<String> {
        costs.iter().map(ToString::to_string).collect()
    }

    fn by_value(text: &str) -> usize {
        text.parse().unwrap_or(0)
    }

    #[test]
    fn keeps_newest_that_fit() {
        let items = costed(&[10, 20, 15, 5]);
        let kept = trim(&items, 30, None, &by_value);
        assert_eq!(kept, &["15".to_string(), "5".to_string()]);
        assert!(total_tokens(kept, &by_value) <= 30);
    }

    #[test]
    fn stops_at_first_overflow() {
        // 5 fits, 40 overflows; the older 1 is not considered
        let items = costed(&[1, 40, 5]);
        assert_eq!(trim(&items, 10, None, &by_value), &["5".to_string()]);
    }

    #[test]
    fn newest_over_budget_gives_empty() {
        let items = costed(&[1, 2, 50]);
        assert!(trim(&items, 10, None, &by_value).is_empty());
    }

    #[test]
    fn item_limit_applies() {
        let items = costed(&[1, 1, 1, 1]);
        assert_eq!(trim(&items, 100, Some(2), &by_value).len(), 2);
        assert_eq!(trim(&items, 100, None, &by_value).len(), 4);
    }

    #[test]
    fn zero_item_limit_keeps_nothing() {
        let items = ["a", "b", "c"];
        assert!(trim(&items, 100, Some(0), &|_: &str| 1_usize).is_empty());
    }

    #[test]
    fn exact_fit_is_kept() {
        let items = costed(&[10, 20]);
        assert_eq!(trim(&items, 30, None, &by_value).len(), 2);
    }

    #[test]
    fn empty_input() {
        let items: Vec<String> = Vec::new();
        assert!(trim(&items, 10, Some(3), &WhitespaceTokenizer).is_empty());
    }

    #[test]
    fn tokenizers_count() {
        assert_eq!(WhitespaceTokenizer.count_tokens("the  red door\n"), 3);
        assert_eq!(CharRatioTokenizer::default().count_tokens("abcdefghi"), 3);
        assert_eq!(CharRatioTokenizer::default().count_tokens(""), 0);
        assert_eq!(CharRatioTokenizer { chars_per_token: 0 }.count_tokens("ab"), 2);
    }

    #[test]
    fn works_with_str_slices() {
        let lines = ["Mara: hello", "Tom: who goes there", "Mara: a friend"];
        let kept = trim(&lines, 6, None, &WhitespaceTokenizer);
        assert_eq!(kept, &["Mara: a friend"]);
    }
}
