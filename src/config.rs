//! Parser configuration (ambient stack §2.3 of SPEC_FULL.md).

/// Tuning knobs shared by the single-threaded and threaded parser variants.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Lower watermark (in tokens) before the producer thread hands a batch
    /// off to the consumer (spec §4.5, §5).
    pub min_token_size: usize,
    /// Upper watermark above which the producer blocks rather than growing
    /// its pending batch further (spec §4.5, §5).
    pub max_token_size: usize,
    /// When true, attributes/elements the format handler doesn't recognize
    /// are logged at `debug` level instead of silently skipped (spec §9
    /// "Duck-typed unused fields").
    pub debug_unknown_attributes: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig { min_token_size: 256, max_token_size: 4096, debug_unknown_attributes: false }
    }
}

/// Whether the ODS format handler should use the threaded SAX parser
/// variant for `content.xml`, per the `ORCUS_ODS_USE_THREADS` environment
/// variable (spec §6 "Environment variables").
pub fn ods_use_threads() -> bool {
    match std::env::var("ORCUS_ODS_USE_THREADS") {
        Ok(v) => v.eq_ignore_ascii_case("true"),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_watermarks() {
        let cfg = ParserConfig::default();
        assert!(cfg.min_token_size < cfg.max_token_size);
    }
}
