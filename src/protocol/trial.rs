//! Trial identifiers and randomized trial blocks

use crate::config::constants::scoring::MVC_PERCENT_LEVELS;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Grip type, shared by trial identifiers and calibration motions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GripType {
    IndexPinch,
    MiddlePinch,
    FullGrasp,
}

impl GripType {
    pub const ALL: [GripType; 3] = [GripType::IndexPinch, GripType::MiddlePinch, GripType::FullGrasp];

    /// Column order of the calibration tables
    pub const MOTION_ORDER: [GripType; 3] = [GripType::FullGrasp, GripType::IndexPinch, GripType::MiddlePinch];

    /// Prefix used in trial identifiers
    pub fn trial_prefix(self) -> &'static str {
        match self {
            GripType::IndexPinch => "IndexPinch",
            GripType::MiddlePinch => "MiddlePinch",
            GripType::FullGrasp => "FullGrasp",
        }
    }

    /// Column / motion name used by the calibration tables
    pub fn motion_label(self) -> &'static str {
        match self {
            GripType::FullGrasp => "Full Grasp (Grip)",
            GripType::IndexPinch => "Pinch (Index Finger)",
            GripType::MiddlePinch => "Pinch (Middle Finger)",
        }
    }

    pub fn from_motion_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.motion_label() == label)
    }
}

impl fmt::Display for GripType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.trial_prefix())
    }
}

/// Target level as a percentage of MVC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct MvcLevel(u8);

impl MvcLevel {
    pub fn all() -> impl Iterator<Item = MvcLevel> {
        MVC_PERCENT_LEVELS.into_iter().map(MvcLevel)
    }

    pub fn new(percent: u8) -> Result<Self, TrialParseError> {
        if MVC_PERCENT_LEVELS.contains(&percent) {
            Ok(MvcLevel(percent))
        } else {
            Err(TrialParseError::UnsupportedLevel(percent))
        }
    }

    pub fn percent(self) -> u8 {
        self.0
    }

    /// Target force as a fraction of MVC, e.g. 0.4 for 40 %
    pub fn fraction(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl TryFrom<u8> for MvcLevel {
    type Error = TrialParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        MvcLevel::new(value)
    }
}

impl From<MvcLevel> for u8 {
    fn from(level: MvcLevel) -> u8 {
        level.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrialParseError {
    #[error("unknown grip in trial id {0:?}")]
    UnknownGrip(String),
    #[error("missing or malformed MVC level in trial id {0:?}")]
    MalformedLevel(String),
    #[error("unsupported MVC level {0}%")]
    UnsupportedLevel(u8),
}

/// One trial: a grip type at a target %MVC. Displays as `"FullGrasp40"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrialSpec {
    pub grip: GripType,
    pub level: MvcLevel,
}

impl TrialSpec {
    pub fn new(grip: GripType, level: MvcLevel) -> Self {
        Self { grip, level }
    }

    pub fn target_fraction(&self) -> f64 {
        self.level.fraction()
    }
}

impl fmt::Display for TrialSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.grip.trial_prefix(), self.level.percent())
    }
}

impl FromStr for TrialSpec {
    type Err = TrialParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let grip = GripType::ALL
            .into_iter()
            .find(|g| s.starts_with(g.trial_prefix()))
            .ok_or_else(|| TrialParseError::UnknownGrip(s.to_string()))?;
        let digits = &s[grip.trial_prefix().len()..];
        let percent: u8 = digits
            .parse()
            .map_err(|_| TrialParseError::MalformedLevel(s.to_string()))?;
        Ok(TrialSpec::new(grip, MvcLevel::new(percent)?))
    }
}

/// Ordered, immutable sequence of trials
#[derive(Debug, Clone, PartialEq)]
pub struct TrialBlock {
    trials: Vec<TrialSpec>,
}

impl TrialBlock {
    /// Every grip × level condition `repeats` times, shuffled once
    pub fn generate<R: Rng + ?Sized>(repeats: usize, rng: &mut R) -> Self {
        let mut trials = Vec::with_capacity(repeats * GripType::ALL.len() * MVC_PERCENT_LEVELS.len());
        for grip in GripType::ALL {
            for level in MvcLevel::all() {
                for _ in 0..repeats {
                    trials.push(TrialSpec::new(grip, level));
                }
            }
        }
        trials.shuffle(rng);
        Self { trials }
    }

    pub fn from_trials(trials: Vec<TrialSpec>) -> Self {
        Self { trials }
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<TrialSpec> {
        self.trials.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrialSpec> {
        self.trials.iter()
    }

    /// Identifier strings in order, as written to the trial-order dump
    pub fn ids(&self) -> Vec<String> {
        self.trials.iter().map(ToString::to_string).collect()
    }
}
