//! Metric Kind - quality indicators reported per iteration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Standard multi-objective quality indicators.
///
/// Values are computed by the algorithm workers; the tracker only stores them.
/// Serialized by variant name, e.g. `"GenerationalDistance"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetricKind {
    /// Hypervolume (HV)
    Hypervolume,
    /// Generational distance (GD)
    GenerationalDistance,
    /// Generational distance plus (GD+)
    GenerationalDistancePlus,
    /// Inverted generational distance (IGD)
    InvertedGenerationalDistance,
    /// Inverted generational distance plus (IGD+)
    InvertedGenerationalDistancePlus,
    /// Additive epsilon indicator (EPS)
    AdditiveEpsilonIndicator,
    /// Maximum Pareto front error (MPFE)
    MaximumParetoFrontError,
    /// Spacing
    Spacing,
    /// Contribution
    Contribution,
    /// R1 indicator
    R1Indicator,
    /// R2 indicator
    R2Indicator,
    /// R3 indicator
    R3Indicator,
}

impl MetricKind {
    /// Every indicator.
    pub const ALL: [Self; 12] = [
        Self::Hypervolume,
        Self::GenerationalDistance,
        Self::GenerationalDistancePlus,
        Self::InvertedGenerationalDistance,
        Self::InvertedGenerationalDistancePlus,
        Self::AdditiveEpsilonIndicator,
        Self::MaximumParetoFrontError,
        Self::Spacing,
        Self::Contribution,
        Self::R1Indicator,
        Self::R2Indicator,
        Self::R3Indicator,
    ];

    /// Full indicator name (matches the serialized form).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Hypervolume => "Hypervolume",
            Self::GenerationalDistance => "GenerationalDistance",
            Self::GenerationalDistancePlus => "GenerationalDistancePlus",
            Self::InvertedGenerationalDistance => "InvertedGenerationalDistance",
            Self::InvertedGenerationalDistancePlus => "InvertedGenerationalDistancePlus",
            Self::AdditiveEpsilonIndicator => "AdditiveEpsilonIndicator",
            Self::MaximumParetoFrontError => "MaximumParetoFrontError",
            Self::Spacing => "Spacing",
            Self::Contribution => "Contribution",
            Self::R1Indicator => "R1Indicator",
            Self::R2Indicator => "R2Indicator",
            Self::R3Indicator => "R3Indicator",
        }
    }

    /// Short code used in reports.
    #[must_use]
    pub const fn short_code(self) -> &'static str {
        match self {
            Self::Hypervolume => "HV",
            Self::GenerationalDistance => "GD",
            Self::GenerationalDistancePlus => "GD+",
            Self::InvertedGenerationalDistance => "IGD",
            Self::InvertedGenerationalDistancePlus => "IGD+",
            Self::AdditiveEpsilonIndicator => "EPS",
            Self::MaximumParetoFrontError => "MPFE",
            Self::Spacing => "SPACING",
            Self::Contribution => "CONTRIBUTION",
            Self::R1Indicator => "R1",
            Self::R2Indicator => "R2",
            Self::R3Indicator => "R3",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_code())
    }
}

impl FromStr for MetricKind {
    type Err = crate::Error;

    /// Accepts the full name or the short code, case-insensitively.
    fn from_str(s: &str) -> crate::Result<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s) || kind.short_code().eq_ignore_ascii_case(s))
            .ok_or_else(|| crate::Error::Validation(format!("unknown metric kind: {s}")))
    }
}
