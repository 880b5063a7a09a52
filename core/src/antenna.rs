//! Antenna configuration validation
//!
//! Normalizes user-entered gain and elevation text into a validated
//! configuration record. Input is forgiving by design: unparseable or
//! out-of-range values are clamped to safe defaults instead of being
//! surfaced as errors. Text arrives locale-formatted; grouping and decimal
//! separators are normalized before numeric parsing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest accepted antenna gain in dBi
pub const MIN_GAIN_DBI: f64 = 1.0;
/// Highest accepted antenna gain in dBi
pub const MAX_GAIN_DBI: f64 = 15.0;

/// Known antenna profiles; only `Custom` has an editable gain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AntennaProfile {
    Custom,
    HeliumUs,
    HeliumEu,
    RakUs,
    RakEu,
    NebraIndoor,
    NebraOutdoor,
    Bobcat,
    Syncrobit,
}

impl AntennaProfile {
    pub const ALL: [AntennaProfile; 9] = [
        AntennaProfile::Custom,
        AntennaProfile::HeliumUs,
        AntennaProfile::HeliumEu,
        AntennaProfile::RakUs,
        AntennaProfile::RakEu,
        AntennaProfile::NebraIndoor,
        AntennaProfile::NebraOutdoor,
        AntennaProfile::Bobcat,
        AntennaProfile::Syncrobit,
    ];

    /// Stable identifier, also the translation key suffix
    pub fn id(&self) -> &'static str {
        match self {
            AntennaProfile::Custom => "custom",
            AntennaProfile::HeliumUs => "helium_us",
            AntennaProfile::HeliumEu => "helium_eu",
            AntennaProfile::RakUs => "rak_us",
            AntennaProfile::RakEu => "rak_eu",
            AntennaProfile::NebraIndoor => "nebra_indoor",
            AntennaProfile::NebraOutdoor => "nebra_outdoor",
            AntennaProfile::Bobcat => "bobcat",
            AntennaProfile::Syncrobit => "syncrobit",
        }
    }

    /// Factory gain in dBi
    pub fn gain_dbi(&self) -> f64 {
        match self {
            AntennaProfile::Custom => 1.0,
            AntennaProfile::HeliumUs => 1.2,
            AntennaProfile::HeliumEu => 2.3,
            AntennaProfile::RakUs => 2.3,
            AntennaProfile::RakEu => 2.8,
            AntennaProfile::NebraIndoor => 3.0,
            AntennaProfile::NebraOutdoor => 3.0,
            AntennaProfile::Bobcat => 4.0,
            AntennaProfile::Syncrobit => 1.2,
        }
    }

    /// Whether the gain field may be edited for this profile
    pub fn is_custom(&self) -> bool {
        matches!(self, AntennaProfile::Custom)
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.id() == id)
    }
}

impl fmt::Display for AntennaProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Locale separators used when normalizing numeric text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleFormat {
    pub group_separator: char,
    pub decimal_separator: char,
}

impl Default for LocaleFormat {
    fn default() -> Self {
        Self {
            group_separator: ',',
            decimal_separator: '.',
        }
    }
}

impl LocaleFormat {
    /// Comma-decimal locales (de, fr, es, ...)
    pub fn comma_decimal() -> Self {
        Self {
            group_separator: '.',
            decimal_separator: ',',
        }
    }

    /// Strip grouping separators and rewrite the decimal separator to `.`
    pub fn normalize(&self, raw: &str) -> String {
        raw.trim()
            .chars()
            .filter(|c| *c != self.group_separator)
            .map(|c| if c == self.decimal_separator { '.' } else { c })
            .collect()
    }
}

/// Validated antenna configuration
///
/// Gain is stored at full precision; [`AntennaConfig::display_gain`] rounds
/// to one decimal for presentation. Elevation may be negative (below-grade
/// installs); parsing never rejects it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AntennaConfig {
    pub gain_dbi: f64,
    pub elevation_m: i32,
}

impl Default for AntennaConfig {
    fn default() -> Self {
        Self {
            gain_dbi: MIN_GAIN_DBI,
            elevation_m: 0,
        }
    }
}

impl AntennaConfig {
    /// Gain rounded to one decimal place for display
    pub fn display_gain(&self) -> String {
        format!("{:.1}", self.gain_dbi)
    }
}

/// Leading numeric prefix of `s`, mirroring lenient text-field parsing:
/// trailing units ("5.8 dBi") are ignored rather than rejected.
fn leading_float(s: &str) -> Option<f64> {
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    for (i, c) in s.char_indices() {
        match c {
            '+' | '-' if i == 0 => end = i + 1,
            '0'..='9' => {
                seen_digit = true;
                end = i + 1;
            }
            '.' if !seen_dot => {
                seen_dot = true;
                end = i + 1;
            }
            _ => break,
        }
    }
    if !seen_digit {
        return None;
    }
    s[..end].parse().ok()
}

fn leading_int(s: &str) -> Option<i32> {
    let mut end = 0;
    let mut seen_digit = false;
    for (i, c) in s.char_indices() {
        match c {
            '+' | '-' if i == 0 => end = i + 1,
            '0'..='9' => {
                seen_digit = true;
                end = i + 1;
            }
            _ => break,
        }
    }
    if !seen_digit {
        return None;
    }
    s[..end].parse().ok()
}

/// Parse locale-formatted gain text, clamped to `[MIN_GAIN_DBI, MAX_GAIN_DBI]`
///
/// Unparseable, empty, or non-positive input yields the minimum.
pub fn parse_gain(locale: LocaleFormat, raw: &str) -> f64 {
    let normalized = locale.normalize(raw);
    match leading_float(&normalized) {
        Some(v) if v.is_finite() && v > MIN_GAIN_DBI => v.min(MAX_GAIN_DBI),
        _ => MIN_GAIN_DBI,
    }
}

/// Parse locale-formatted elevation text; unparseable or empty input is 0
pub fn parse_elevation(locale: LocaleFormat, raw: &str) -> i32 {
    let normalized = locale.normalize(raw);
    leading_int(&normalized).unwrap_or(0)
}

/// Editing-session owner for an antenna configuration
///
/// Applying a fixed profile copies its gain verbatim; direct edits go
/// through the clamping parsers above. Gain editability is exposed via
/// [`gain_editable`](Self::gain_editable) so the presentation layer can
/// lock the field for non-custom profiles.
#[derive(Debug, Clone)]
pub struct AntennaConfigValidator {
    locale: LocaleFormat,
    profile: AntennaProfile,
    config: AntennaConfig,
}

impl AntennaConfigValidator {
    pub fn new(locale: LocaleFormat) -> Self {
        Self {
            locale,
            profile: AntennaProfile::Custom,
            config: AntennaConfig::default(),
        }
    }

    pub fn profile(&self) -> AntennaProfile {
        self.profile
    }

    pub fn config(&self) -> &AntennaConfig {
        &self.config
    }

    pub fn gain_editable(&self) -> bool {
        self.profile.is_custom()
    }

    /// Select a profile, copying its factory gain verbatim
    pub fn apply_profile(&mut self, profile: AntennaProfile) -> AntennaConfig {
        self.profile = profile;
        self.config.gain_dbi = profile.gain_dbi();
        self.config
    }

    /// Apply edited gain text
    pub fn edit_gain(&mut self, raw: &str) -> AntennaConfig {
        self.config.gain_dbi = parse_gain(self.locale, raw);
        self.config
    }

    /// Apply edited elevation text
    pub fn edit_elevation(&mut self, raw: &str) -> AntennaConfig {
        self.config.elevation_m = parse_elevation(self.locale, raw);
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_gain_empty_is_minimum() {
        assert_eq!(parse_gain(LocaleFormat::default(), ""), 1.0);
    }

    #[test]
    fn test_gain_garbage_is_minimum() {
        assert_eq!(parse_gain(LocaleFormat::default(), "abc"), 1.0);
    }

    #[test]
    fn test_gain_above_max_clamps() {
        assert_eq!(parse_gain(LocaleFormat::default(), "20"), 15.0);
    }

    #[test]
    fn test_gain_at_or_below_one_clamps_to_minimum() {
        assert_eq!(parse_gain(LocaleFormat::default(), "1"), 1.0);
        assert_eq!(parse_gain(LocaleFormat::default(), "0.4"), 1.0);
        assert_eq!(parse_gain(LocaleFormat::default(), "-3"), 1.0);
        assert_eq!(parse_gain(LocaleFormat::default(), "0"), 1.0);
    }

    #[test]
    fn test_gain_in_range_kept_at_full_precision() {
        assert_eq!(parse_gain(LocaleFormat::default(), "5.85"), 5.85);
    }

    #[test]
    fn test_gain_trailing_unit_ignored() {
        assert_eq!(parse_gain(LocaleFormat::default(), "5.8 dBi"), 5.8);
    }

    #[test]
    fn test_gain_comma_decimal_locale() {
        let locale = LocaleFormat::comma_decimal();
        assert_eq!(parse_gain(locale, "5,8"), 5.8);
        assert_eq!(parse_gain(locale, "1.234,5"), 15.0); // 1234.5 clamps
    }

    #[test]
    fn test_gain_grouped_input() {
        assert_eq!(parse_gain(LocaleFormat::default(), "1,234.5"), 15.0);
    }

    #[test]
    fn test_elevation_empty_and_garbage_are_zero() {
        assert_eq!(parse_elevation(LocaleFormat::default(), ""), 0);
        assert_eq!(parse_elevation(LocaleFormat::default(), "abc"), 0);
        assert_eq!(parse_elevation(LocaleFormat::default(), "0"), 0);
    }

    #[test]
    fn test_elevation_negative_permitted() {
        assert_eq!(parse_elevation(LocaleFormat::default(), "-5"), -5);
    }

    #[test]
    fn test_elevation_truncates_at_decimal() {
        assert_eq!(parse_elevation(LocaleFormat::default(), "12.7"), 12);
    }

    #[test]
    fn test_elevation_grouped_input() {
        assert_eq!(parse_elevation(LocaleFormat::default(), "1,200"), 1200);
    }

    #[test]
    fn test_display_gain_rounds_to_one_decimal() {
        let config = AntennaConfig {
            gain_dbi: 5.85,
            elevation_m: 0,
        };
        assert_eq!(config.display_gain(), "5.9");
    }

    #[test]
    fn test_apply_profile_copies_gain_verbatim() {
        let mut validator = AntennaConfigValidator::new(LocaleFormat::default());
        let config = validator.apply_profile(AntennaProfile::Bobcat);
        assert_eq!(config.gain_dbi, 4.0);
        assert!(!validator.gain_editable());
    }

    #[test]
    fn test_reapplying_profile_is_idempotent() {
        let mut validator = AntennaConfigValidator::new(LocaleFormat::default());
        let first = validator.apply_profile(AntennaProfile::HeliumEu);
        let second = validator.apply_profile(AntennaProfile::HeliumEu);
        assert_eq!(first.gain_dbi, second.gain_dbi);
    }

    #[test]
    fn test_custom_profile_gain_editable() {
        let mut validator = AntennaConfigValidator::new(LocaleFormat::default());
        validator.apply_profile(AntennaProfile::Custom);
        assert!(validator.gain_editable());

        let config = validator.edit_gain("7.2");
        assert_eq!(config.gain_dbi, 7.2);
    }

    #[test]
    fn test_elevation_edit_kept_alongside_gain() {
        let mut validator = AntennaConfigValidator::new(LocaleFormat::default());
        validator.edit_gain("3.5");
        let config = validator.edit_elevation("12");
        assert_eq!(config.gain_dbi, 3.5);
        assert_eq!(config.elevation_m, 12);
    }

    #[test]
    fn test_profile_id_round_trip() {
        for profile in AntennaProfile::ALL {
            assert_eq!(AntennaProfile::from_id(profile.id()), Some(profile));
        }
        assert_eq!(AntennaProfile::from_id("no_such"), None);
    }

    proptest! {
        #[test]
        fn prop_gain_always_within_bounds(raw in ".{0,24}") {
            let gain = parse_gain(LocaleFormat::default(), &raw);
            prop_assert!((MIN_GAIN_DBI..=MAX_GAIN_DBI).contains(&gain));
        }

        #[test]
        fn prop_elevation_never_panics(raw in ".{0,24}") {
            let _ = parse_elevation(LocaleFormat::default(), &raw);
        }

        #[test]
        fn prop_in_range_gain_round_trips(v in 1.1f64..15.0) {
            let text = format!("{v}");
            let gain = parse_gain(LocaleFormat::default(), &text);
            prop_assert!((gain - v).abs() < 1e-9);
        }
    }
}
