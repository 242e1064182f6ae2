//! Process-wide tunables for the dispatch layer.
//!
//! Contexts read the global instance when they are initialised; nothing here
//! is consulted per call. Install a custom instance with [`Config::install`]
//! before the first context is created, otherwise the defaults are used.

use std::sync::OnceLock;

use crate::error::ConfigError;

static GLOBAL_CONFIG: OnceLock<Config> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct Config {
    // ============================================
    // MODE ENGINE
    // ============================================

    /// Largest number of bytes handed to a single mode pass.
    /// Larger inputs are split into several passes over the same IV state.
    pub chunk_limit: usize,

    /// Whether block modes (ECB/CBC) apply PKCS#7 padding by default
    pub default_padding: bool,

    // ============================================
    // RSA
    // ============================================

    /// Modulus size used by keygen when no bits control was issued
    pub rsa_default_bits: usize,

    /// Smallest modulus accepted by keygen and `check`
    pub rsa_min_bits: usize,

    /// Largest modulus accepted by keygen and `check`
    pub rsa_max_bits: usize,

    /// Public exponent used by keygen when none was configured
    pub rsa_default_public_exponent: u64,

    // ============================================
    // AEAD
    // ============================================

    /// Tag length used when `AeadContext::init` receives 0.
    /// 0 here means "the algorithm maximum".
    pub aead_default_tag_len: usize,
}

impl Config {
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self {
            // 2^(bits_in_word - 2), the conservative bound for counter types
            chunk_limit: 1usize << (usize::BITS - 2),
            default_padding: true,

            rsa_default_bits: 2048,
            rsa_min_bits: 1024,
            rsa_max_bits: 16384,
            rsa_default_public_exponent: 65537,

            aead_default_tag_len: 0,
        }
    }

    /// Defaults overridden by `CRYPTOFRAME_*` environment variables.
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        let chunk_limit = lookup("CRYPTOFRAME_CHUNK_LIMIT").and_then(|v| v.parse::<usize>().ok());
        if let Some(parsed) = chunk_limit.filter(|&n| n > 0) {
            config.chunk_limit = parsed;
        }

        if let Some(parsed) = lookup("CRYPTOFRAME_RSA_BITS").and_then(|v| v.parse().ok()) {
            config.rsa_default_bits = parsed;
        }

        if let Some(parsed) = lookup("CRYPTOFRAME_RSA_MIN_BITS").and_then(|v| v.parse().ok()) {
            config.rsa_min_bits = parsed;
        }

        if let Some(val) = lookup("CRYPTOFRAME_PADDING") {
            match val.trim() {
                "0" | "false" | "off" => config.default_padding = false,
                "1" | "true" | "on" => config.default_padding = true,
                _ => {}
            }
        }

        config
    }

    /// The installed configuration, or the defaults on first use.
    pub fn global() -> &'static Config {
        GLOBAL_CONFIG.get_or_init(Config::default)
    }

    /// Install `config` as the process-wide instance.
    ///
    /// # Errors
    ///
    /// `AlreadyInstalled` once any configuration is in place, including the
    /// defaults [`global`](Self::global) falls back to.
    pub fn install(config: Config) -> Result<(), ConfigError> {
        GLOBAL_CONFIG
            .set(config)
            .map_err(|_| ConfigError::AlreadyInstalled)
    }

    pub fn is_installed() -> bool {
        GLOBAL_CONFIG.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.chunk_limit, 1usize << (usize::BITS - 2));
        assert!(config.default_padding);
        assert_eq!(config.aead_default_tag_len, 0);
    }

    #[test]
    fn test_rsa_bounds_are_consistent() {
        let config = Config::default();
        assert!(config.rsa_min_bits <= config.rsa_default_bits);
        assert!(config.rsa_default_bits <= config.rsa_max_bits);
        assert_eq!(config.rsa_default_public_exponent, 65537);
    }

    #[test]
    fn test_chunk_limit_is_word_aligned() {
        let config = Config::default();
        // every supported block size divides the default limit
        for bs in [1usize, 8, 16] {
            assert_eq!(config.chunk_limit % bs, 0);
        }
    }

    #[test]
    fn test_environment_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("CRYPTOFRAME_CHUNK_LIMIT", "4096"),
            ("CRYPTOFRAME_RSA_BITS", "3072"),
            ("CRYPTOFRAME_PADDING", "off"),
        ]));
        assert_eq!(config.chunk_limit, 4096);
        assert_eq!(config.rsa_default_bits, 3072);
        assert!(!config.default_padding);
        assert_eq!(config.rsa_min_bits, 1024);
    }

    #[test]
    fn test_bad_environment_values_are_ignored() {
        let config = Config::from_lookup(lookup(&[
            ("CRYPTOFRAME_CHUNK_LIMIT", "0"),
            ("CRYPTOFRAME_RSA_MIN_BITS", "lots"),
            ("CRYPTOFRAME_PADDING", "maybe"),
        ]));
        let defaults = Config::default();
        assert_eq!(config.chunk_limit, defaults.chunk_limit);
        assert_eq!(config.rsa_min_bits, defaults.rsa_min_bits);
        assert!(config.default_padding);
    }
}
