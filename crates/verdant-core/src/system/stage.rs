//! # Growth Stages
//!
//! ## Stage Definitions
//!
//! | Stage | Label | Progress | Terminal |
//! |-------|-------|----------|----------|
//! | Planted | `planted` | 25 | no |
//! | Growing | `growing` | 60 | no |
//! | Harvested | `harvested` | 100 | yes |
//!
//! A plantation's stage normally only moves forward. The model itself does
//! not enforce that: the bulk coordinator and administrative overrides may
//! set any stage, including an earlier one, to correct mistakes.

use crate::types::{Plantation, PlantationId, VerdantError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// STAGE PROGRESS WEIGHTS
// =============================================================================

/// Progress weight for `Planted`.
pub const PLANTED_PROGRESS: u8 = 25;

/// Progress weight for `Growing`.
pub const GROWING_PROGRESS: u8 = 60;

/// Progress weight for `Harvested`.
pub const HARVESTED_PROGRESS: u8 = 100;

// =============================================================================
// STAGE ENUM
// =============================================================================

/// Growth stages, declared in lifecycle order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum GrowthStage {
    #[default]
    Planted,
    Growing,
    Harvested,
}

impl GrowthStage {
    /// All stages in lifecycle order.
    #[must_use]
    pub const fn order() -> [GrowthStage; 3] {
        [
            GrowthStage::Planted,
            GrowthStage::Growing,
            GrowthStage::Harvested,
        ]
    }

    /// Get the stage name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            GrowthStage::Planted => "Planted",
            GrowthStage::Growing => "Growing",
            GrowthStage::Harvested => "Harvested",
        }
    }

    /// Lowercase label used on the command line and in JSON.
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            GrowthStage::Planted => "planted",
            GrowthStage::Growing => "growing",
            GrowthStage::Harvested => "harvested",
        }
    }

    /// Get the stage that follows this one.
    ///
    /// `Harvested` is terminal and returns itself, so repeated calls are
    /// idempotent at the boundary.
    #[must_use]
    pub fn next_stage(&self) -> GrowthStage {
        match self {
            GrowthStage::Planted => GrowthStage::Growing,
            GrowthStage::Growing => GrowthStage::Harvested,
            GrowthStage::Harvested => GrowthStage::Harvested,
        }
    }

    /// Get the previous stage, if any.
    #[must_use]
    pub fn previous(&self) -> Option<GrowthStage> {
        match self {
            GrowthStage::Planted => None,
            GrowthStage::Growing => Some(GrowthStage::Planted),
            GrowthStage::Harvested => Some(GrowthStage::Growing),
        }
    }

    /// Progress weight used by the health scorer.
    #[must_use]
    pub fn progress(&self) -> u8 {
        match self {
            GrowthStage::Planted => PLANTED_PROGRESS,
            GrowthStage::Growing => GROWING_PROGRESS,
            GrowthStage::Harvested => HARVESTED_PROGRESS,
        }
    }

    /// Check if this stage is terminal (Harvested).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, GrowthStage::Harvested)
    }
}

impl fmt::Display for GrowthStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GrowthStage {
    type Err = VerdantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "planted" => Ok(GrowthStage::Planted),
            "growing" => Ok(GrowthStage::Growing),
            "harvested" => Ok(GrowthStage::Harvested),
            _ => Err(VerdantError::UnknownStage(s.to_string())),
        }
    }
}

// =============================================================================
// SUGGESTED TARGET
// =============================================================================

/// Suggest a bulk target stage for a selection.
///
/// Picks the stage one past the furthest-advanced selected plantation. This is
/// a hint for the caller only; the coordinator accepts any target.
/// Ids that do not resolve are ignored; an empty selection suggests the
/// successor of the initial stage.
#[must_use]
pub fn suggested_target_stage(
    plantations: &[Plantation],
    selected_ids: &BTreeSet<PlantationId>,
) -> GrowthStage {
    plantations
        .iter()
        .filter(|p| selected_ids.contains(&p.id))
        .map(|p| p.stage)
        .max()
        .unwrap_or_default()
        .next_stage()
}

// =============================================================================
// TESTS
// =============================================================================
