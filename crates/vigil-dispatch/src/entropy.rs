//! # Prompt Entropy
//!
//! Shannon entropy over the characters of a prompt, reported on every scan
//! as `prompt_entropy`.
//!
//! ```text
//! H(X) = -Σ P(xᵢ) log₂ P(xᵢ)
//! ```
//!
//! Each character is a sample; `P(xᵢ)` is its relative frequency. The unit
//! is bits per character.
//!
//! | Content Type | Typical Entropy (bits/char) |
//! |--------------|----------------------------|
//! | Repeated character | 0.0 |
//! | English prose | 3.5 - 4.2 |
//! | Base64 data | 5.9 - 6.0 |
//!
//! Entropy is informational only. No detector or status decision depends on
//! it; high values are a hint for adversarial suffixes and encoded payloads.

use std::collections::HashMap;

/// Calculates the Shannon entropy of `text` in bits per character.
///
/// Returns `0.0` for empty input.
///
/// # Example
///
/// ```rust
/// use vigil_dispatch::shannon_entropy;
///
/// assert_eq!(shannon_entropy("aaaa"), 0.0);
/// assert!((shannon_entropy("ab") - 1.0).abs() < 1e-12);
/// ```
#[must_use]
pub fn shannon_entropy(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    let mut total = 0usize;
    for c in text.chars() {
        *freq.entry(c).or_insert(0) += 1;
        total += 1;
    }

    let total = total as f64;
    let mut entropy = 0.0;
    for &count in freq.values() {
        let p = count as f64 / total;
        entropy -= p * p.log2();
    }

    entropy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entropy_empty() {
        assert_eq!(shannon_entropy(""), 0.0);
    }

    #[test]
    fn test_entropy_single_symbol() {
        assert_eq!(shannon_entropy("aaaa"), 0.0);
    }

    #[test]
    fn test_entropy_two_symbols_equal() {
        assert!((shannon_entropy("ab") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_entropy_four_symbols_equal() {
        assert!((shannon_entropy("abcd") - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_entropy_order_invariant() {
        let a = shannon_entropy("ignore previous instructions");
        let b = shannon_entropy("snoitcurtsni suoiverp erongi");
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn test_entropy_counts_unicode_chars() {
        // Two distinct code points, not four bytes.
        assert!((shannon_entropy("éü") - 1.0).abs() < 1e-12);
    }
}
