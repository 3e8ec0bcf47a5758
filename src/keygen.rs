//! Salt and passphrase generation.
//!
//! Passphrases are drawn without replacement from a character pool that
//! cycles the allowed alphabet up to a token budget. The pool is never
//! materialised: index `i` of the cycled pool is `alphabet[i % len]`, so
//! only the sampled indices are allocated.

use rand::TryRngCore;
use rand::rngs::OsRng;
use rand::seq::index;
use tracing::warn;

use crate::cipher::Salt;
use crate::config::{ASCII_LOWERCASE, ASCII_UPPERCASE, DEFAULT_SALT_BYTES, DIGITS, MAX_CAPACITY, MAX_TOKENS, MIN_PASSPHRASE_LENGTH, PUNCTUATION, WHITESPACE};
use crate::error::{CipherError, Result};
use crate::options::KeyOptions;
use crate::secret::Secret;

/// Every character a passphrase may contain, in cycling order.
fn all_chars() -> String {
    [DIGITS, ASCII_LOWERCASE, ASCII_UPPERCASE, PUNCTUATION].concat()
}

/// Resolves a named exclusion preset.
///
/// Returns `None` for anything that is not a preset name; such values are
/// then treated as a literal set of characters.
pub fn exclusion_preset(name: &str) -> Option<String> {
    let parts: &[&str] = match name {
        "digits" => &[DIGITS],
        "punct" => &[PUNCTUATION],
        "ascii" => &[ASCII_LOWERCASE, ASCII_UPPERCASE],
        "digits_punct" => &[DIGITS, PUNCTUATION],
        "ascii_punct" => &[ASCII_LOWERCASE, ASCII_UPPERCASE, PUNCTUATION],
        "ascii_lower_punct" => &[ASCII_LOWERCASE, PUNCTUATION],
        "ascii_upper_punct" => &[ASCII_UPPERCASE, PUNCTUATION],
        "digits_ascii" => &[DIGITS, ASCII_LOWERCASE, ASCII_UPPERCASE],
        "digits_ascii_lower" => &[DIGITS, ASCII_LOWERCASE],
        "digits_ascii_upper" => &[DIGITS, ASCII_UPPERCASE],
        "digits_ascii_lower_punct" => &[DIGITS, ASCII_LOWERCASE, PUNCTUATION],
        "digits_ascii_upper_punct" => &[DIGITS, ASCII_UPPERCASE, PUNCTUATION],
        _ => return None,
    };
    Some(parts.concat())
}

/// Non-fatal recommendation returned next to a generated passphrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAdvisory {
    /// The token budget that was configured.
    pub configured: u64,
    /// The larger budget used for this call and recommended going forward.
    pub recommended: u64,
}

/// A generated passphrase plus an optional token-budget advisory.
#[derive(Debug, Clone)]
pub struct GeneratedKey {
    pub key: Secret,
    pub advisory: Option<TokenAdvisory>,
}

/// Compares the requested length against the token budget.
///
/// When they differ by more than [`MAX_TOKENS`] the larger of the two (and
/// never less than `MAX_TOKENS`) is recommended.
fn token_advisory(key_length: u64, max_tokens: u64) -> Option<TokenAdvisory> {
    if key_length.abs_diff(max_tokens) <= MAX_TOKENS {
        return None;
    }
    Some(TokenAdvisory { configured: max_tokens, recommended: key_length.max(max_tokens).max(MAX_TOKENS) })
}

/// Generates `count` salts of `byte_size` bytes (default 32).
///
/// # Errors
///
/// Validation error for `count == 0`, capacity error when `count` or
/// `byte_size` reaches the capacity ceiling.
pub fn generate_salts(count: usize, byte_size: Option<usize>) -> Result<Vec<Salt>> {
    if count == 0 {
        return Err(CipherError::Validation("the number of salts must be at least 1".to_owned()));
    }

    let byte_size = byte_size.filter(|&size| size > 0).unwrap_or(DEFAULT_SALT_BYTES);
    if count as u64 >= MAX_CAPACITY || byte_size as u64 >= MAX_CAPACITY {
        return Err(CipherError::Capacity(format!("salt request surpasses the computational capacity (count: {count}, bytes: {byte_size}, max: {MAX_CAPACITY})")));
    }

    if count as u64 >= MAX_TOKENS {
        warn!(count, "a salt count of 2 <= x <= 5 is recommended; large counts slow down every derivation");
    }

    (0..count).map(|_| Salt::random(byte_size)).collect()
}

/// Builds the alphabet a passphrase is sampled from.
fn alphabet(options: &KeyOptions) -> Result<Vec<char>> {
    let removed: String = match options.exclude_chars.as_deref() {
        Some(exclude) => exclusion_preset(exclude).unwrap_or_else(|| exclude.to_owned()),
        None if options.include_all_chars => String::new(),
        None => PUNCTUATION.to_owned(),
    };

    let chars: Vec<char> = all_chars().chars().filter(|c| !WHITESPACE.contains(*c) && !removed.contains(*c)).collect();
    if chars.is_empty() {
        return Err(CipherError::Validation("the exclusions leave no characters to generate a passphrase from".to_owned()));
    }
    Ok(chars)
}

/// Size of the pool left after cycling the full alphabet (`total` chars) to
/// `budget` tokens and dropping everything outside `alphabet`.
fn pool_length(budget: u64, total: usize, alphabet: &[char]) -> u64 {
    let full = budget / total as u64;
    let rest = (budget % total as u64) as usize;
    let kept_in_rest = all_chars().chars().take(rest).filter(|c| alphabet.contains(c)).count();
    full * alphabet.len() as u64 + kept_in_rest as u64
}

/// Generates a passphrase with the OS CSPRNG.
///
/// # Errors
///
/// - [`CipherError::Configuration`] when `exclude_chars` and
///   `include_all_chars` are both set.
/// - [`CipherError::Capacity`] when `key_length` or `max_tokens` reach the
///   capacity ceiling. Checked before any randomness is drawn.
/// - [`CipherError::Validation`] for a short length without
///   `bypass_keylength`, or exclusions that empty the alphabet.
pub fn generate_passphrase(options: &KeyOptions) -> Result<GeneratedKey> {
    if options.exclude_chars.is_some() && options.include_all_chars {
        return Err(CipherError::Configuration("cannot specify both 'exclude_chars' and 'include_all_chars'".to_owned()));
    }

    let key_length = options.key_length as u64;
    if key_length >= MAX_CAPACITY || options.max_tokens >= MAX_CAPACITY {
        return Err(CipherError::Capacity(format!(
            "the specified counts surpass the computational capacity; a key length of 32 <= x <= 256 is recommended \
             (key length: {key_length}, token budget: {}, max: {MAX_CAPACITY})",
            options.max_tokens
        )));
    }

    if options.key_length == 0 || options.max_tokens == 0 {
        return Err(CipherError::Validation("'key_length' and the token budget must be positive integers".to_owned()));
    }
    if !options.bypass_keylength && options.key_length < MIN_PASSPHRASE_LENGTH {
        return Err(CipherError::Validation(format!(
            "'key_length' must be >= {MIN_PASSPHRASE_LENGTH} unless 'bypass_keylength' is set (specified: {})",
            options.key_length
        )));
    }

    let advisory = token_advisory(key_length, options.max_tokens);
    let budget = advisory.map_or(options.max_tokens, |a| a.recommended);

    let alphabet = alphabet(options)?;
    let pool = pool_length(budget, all_chars().chars().count(), &alphabet);
    let amount = key_length.min(pool);

    let pool = usize::try_from(pool).map_err(|_| CipherError::Capacity(format!("token pool too large: {pool}")))?;
    let amount = usize::try_from(amount).map_err(|_| CipherError::Capacity(format!("key length too large: {amount}")))?;

    let mut rng = OsRng.unwrap_err();
    let key: String = index::sample(&mut rng, pool, amount).into_iter().map(|i| alphabet[i % alphabet.len()]).collect();

    Ok(GeneratedKey { key: Secret::from_string(key), advisory })
}

/// Checks a caller-supplied passphrase.
///
/// # Errors
///
/// Validation error if it is empty, contains characters outside digits,
/// ASCII letters and punctuation, or is shorter than 32 characters without
/// `bypass_keylength`.
pub fn validate_passphrase(passphrase: &Secret, bypass_keylength: bool) -> Result<()> {
    if passphrase.is_empty() {
        return Err(CipherError::Validation("the passphrase must not be empty".to_owned()));
    }

    let allowed = all_chars();
    if !passphrase.expose_secret().chars().all(|c| allowed.contains(c)) {
        return Err(CipherError::Validation("the passphrase contains illegal characters; only digits, ASCII letters and punctuation are allowed".to_owned()));
    }

    if !bypass_keylength && passphrase.len() < MIN_PASSPHRASE_LENGTH {
        return Err(CipherError::Validation(format!(
            "the passphrase must be at least {MIN_PASSPHRASE_LENGTH} characters long; set 'bypass_keylength' for a shorter one"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_generate_salts() {
        let salts = generate_salts(3, None).unwrap();
        assert_eq!(salts.len(), 3);
        assert!(salts.iter().all(|s| s.len() == DEFAULT_SALT_BYTES));
        assert_ne!(salts[0], salts[1]);

        assert_eq!(generate_salts(1, Some(8)).unwrap()[0].len(), 8);
        assert_eq!(generate_salts(1, Some(0)).unwrap()[0].len(), DEFAULT_SALT_BYTES);
    }

    #[test]
    fn test_generate_salts_limits() {
        assert!(matches!(generate_salts(0, None), Err(CipherError::Validation(_))));
        assert!(matches!(generate_salts(1, Some(MAX_CAPACITY as usize)), Err(CipherError::Capacity(_))));
    }

    #[test]
    fn test_default_pool_has_no_punctuation() {
        let generated = generate_passphrase(&KeyOptions::default().with_key_length(64)).unwrap();
        let key = generated.key.expose_secret();
        assert_eq!(key.chars().count(), 64);
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(generated.advisory.is_none());
    }

    #[test]
    fn test_include_all_chars() {
        let options = KeyOptions::default().with_key_length(2_000).with_include_all_chars(true);
        let key = generate_passphrase(&options).unwrap().key;
        assert!(key.expose_secret().chars().any(|c| PUNCTUATION.contains(c)));
    }

    #[test]
    fn test_exclude_preset_and_literal() {
        let digits_only = KeyOptions::default().with_key_length(100).with_exclude_chars("ascii_punct");
        let key = generate_passphrase(&digits_only).unwrap().key;
        assert!(key.expose_secret().chars().all(|c| c.is_ascii_digit()));

        let literal = KeyOptions::default().with_key_length(500).with_exclude_chars("aA!");
        let key = generate_passphrase(&literal).unwrap().key;
        assert!(!key.expose_secret().contains(['a', 'A', '!']));
    }

    #[test]
    fn test_conflicting_options() {
        let options = KeyOptions::default().with_exclude_chars("!").with_include_all_chars(true);
        assert!(matches!(generate_passphrase(&options), Err(CipherError::Configuration(_))));
    }

    #[test]
    fn test_capacity() {
        let options = KeyOptions::default().with_key_length(MAX_CAPACITY as usize);
        assert!(matches!(generate_passphrase(&options), Err(CipherError::Capacity(_))));

        let options = KeyOptions::default().with_max_tokens(MAX_CAPACITY);
        assert!(matches!(generate_passphrase(&options), Err(CipherError::Capacity(_))));
    }

    #[test]
    fn test_short_key_requires_bypass() {
        let short = KeyOptions::default().with_key_length(8);
        assert!(matches!(generate_passphrase(&short), Err(CipherError::Validation(_))));

        let bypass = short.with_bypass_keylength(true);
        assert_eq!(generate_passphrase(&bypass).unwrap().key.len(), 8);
    }

    #[test]
    fn test_exclusions_emptying_alphabet() {
        let options = KeyOptions::default().with_exclude_chars("digits_ascii_lower_punct").with_key_length(32);
        assert!(generate_passphrase(&options).is_ok());

        let everything = format!("{DIGITS}{ASCII_LOWERCASE}{ASCII_UPPERCASE}{PUNCTUATION}");
        let options = KeyOptions::default().with_exclude_chars(everything);
        assert!(matches!(generate_passphrase(&options), Err(CipherError::Validation(_))));
    }

    #[test]
    fn test_advisory_for_large_lengths() {
        let options = KeyOptions::default().with_key_length(250_000).with_include_all_chars(true);
        let generated = generate_passphrase(&options).unwrap();
        let advisory = generated.advisory.unwrap();
        assert_eq!(advisory.configured, MAX_TOKENS);
        assert_eq!(advisory.recommended, 250_000);
        assert_eq!(generated.key.len(), 250_000);
    }

    #[test]
    fn test_sampling_without_replacement_caps_length() {
        // Ten cycles of the 94 characters keep 620 alphanumerics.
        let options = KeyOptions::default().with_key_length(1_000).with_max_tokens(940);
        let key = generate_passphrase(&options).unwrap().key;
        assert_eq!(key.len(), 620);
    }

    #[test]
    fn test_pool_length() {
        let alnum: Vec<char> = format!("{DIGITS}{ASCII_LOWERCASE}{ASCII_UPPERCASE}").chars().collect();
        assert_eq!(pool_length(94, 94, &alnum), 62);
        assert_eq!(pool_length(10, 94, &alnum), 10);
        assert_eq!(pool_length(94 * 3 + 70, 94, &alnum), 62 * 3 + 62);
    }

    #[test]
    fn test_presets() {
        assert_eq!(exclusion_preset("digits").unwrap(), DIGITS);
        assert!(exclusion_preset("xyz").is_none());
        let names = [
            "digits", "punct", "ascii", "digits_punct", "ascii_punct", "ascii_lower_punct", "ascii_upper_punct",
            "digits_ascii", "digits_ascii_lower", "digits_ascii_upper", "digits_ascii_lower_punct", "digits_ascii_upper_punct",
        ];
        let distinct: HashSet<String> = names.iter().filter_map(|n| exclusion_preset(n)).collect();
        assert_eq!(distinct.len(), names.len());
    }

    #[test]
    fn test_validate_passphrase() {
        assert!(validate_passphrase(&Secret::new(&"a".repeat(40)), false).is_ok());
        assert!(validate_passphrase(&Secret::new("short"), false).is_err());
        assert!(validate_passphrase(&Secret::new("short"), true).is_ok());
        assert!(validate_passphrase(&Secret::new(""), true).is_err());
        assert!(validate_passphrase(&Secret::new(&format!("{} tail", "a".repeat(40))), false).is_err());
        assert!(validate_passphrase(&Secret::new("ünïcödé"), true).is_err());
    }
}
