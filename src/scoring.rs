// src/scoring.rs
//! Force normalization against a participant's MVC reference

use crate::config::constants::scoring::MVC_PERCENT_LEVELS;
use crate::config::ScoringConfig;
use crate::persistence::MvcRecord;
use crate::protocol::GripType;
use std::fmt::Write as _;
use tracing::{info, warn};

/// Where an [`MvcReference`] came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceSource {
    Measured { participant_id: String },
    /// No calibration was available
    Placeholder,
}

/// Per-grip MVC baselines in Newtons, read once per session
#[derive(Debug, Clone, PartialEq)]
pub struct MvcReference {
    full_grasp: f64,
    index_pinch: f64,
    middle_pinch: f64,
    placeholder: f64,
    min_force: f64,
    source: ReferenceSource,
    fallbacks: Vec<GripType>,
}

impl MvcReference {
    /// Placeholder reference for every grip
    pub fn placeholder(config: &ScoringConfig) -> Self {
        let p = config.placeholder_mvc_newtons;
        warn!(placeholder_newtons = p, "no MVC data found, normalizing against placeholder");
        Self {
            full_grasp: p,
            index_pinch: p,
            middle_pinch: p,
            placeholder: p,
            min_force: config.min_force_newtons,
            source: ReferenceSource::Placeholder,
            fallbacks: GripType::MOTION_ORDER.to_vec(),
        }
    }

    /// Reference from a stored calibration. Missing, non-finite or
    /// non-positive values fall back to the placeholder for that grip.
    pub fn from_record(record: &MvcRecord, config: &ScoringConfig) -> Self {
        let placeholder = config.placeholder_mvc_newtons;
        let min_force = config.min_force_newtons;
        let mut fallbacks = Vec::new();

        let mut pick = |grip: GripType| match record.value(grip) {
            Some(v) if v.is_finite() && v > min_force => v,
            other => {
                warn!(
                    grip = grip.motion_label(),
                    value = ?other,
                    placeholder_newtons = placeholder,
                    "invalid MVC value, using placeholder"
                );
                fallbacks.push(grip);
                placeholder
            }
        };
        let full_grasp = pick(GripType::FullGrasp);
        let index_pinch = pick(GripType::IndexPinch);
        let middle_pinch = pick(GripType::MiddlePinch);

        info!(participant = %record.participant_id, full_grasp, index_pinch, middle_pinch, "loaded MVC reference");
        Self {
            full_grasp,
            index_pinch,
            middle_pinch,
            placeholder,
            min_force,
            source: ReferenceSource::Measured {
                participant_id: record.participant_id.clone(),
            },
            fallbacks,
        }
    }

    /// [`from_record`](Self::from_record) when a record exists, the placeholder otherwise
    pub fn from_last_record(record: Option<&MvcRecord>, config: &ScoringConfig) -> Self {
        match record {
            Some(record) => Self::from_record(record, config),
            None => Self::placeholder(config),
        }
    }

    pub fn source(&self) -> &ReferenceSource {
        &self.source
    }

    pub fn participant_id(&self) -> Option<&str> {
        match &self.source {
            ReferenceSource::Measured { participant_id } => Some(participant_id),
            ReferenceSource::Placeholder => None,
        }
    }

    /// Grips normalized against the placeholder instead of a measurement
    pub fn fallbacks(&self) -> &[GripType] {
        &self.fallbacks
    }

    pub fn is_placeholder(&self) -> bool {
        self.source == ReferenceSource::Placeholder
    }

    pub fn for_grip(&self, grip: GripType) -> f64 {
        match grip {
            GripType::FullGrasp => self.full_grasp,
            GripType::IndexPinch => self.index_pinch,
            GripType::MiddlePinch => self.middle_pinch,
        }
    }

    /// Raw force as a fraction of the grip's MVC, clamped to `[0, 1]`.
    /// NaN input and unusable references map to 0.
    pub fn normalize(&self, raw: f64, grip: GripType) -> f64 {
        if raw.is_nan() {
            return 0.0;
        }
        let usable = |d: f64| d.is_finite() && d > 0.0;
        let mut denominator = self.for_grip(grip) - self.min_force;
        if !usable(denominator) {
            denominator = self.placeholder - self.min_force;
        }
        if !usable(denominator) {
            return 0.0;
        }
        ((raw - self.min_force) / denominator).clamp(0.0, 1.0)
    }

    /// Operator display text
    pub fn summary(&self) -> String {
        let mut text = String::new();
        if let Some(participant) = self.participant_id() {
            let _ = writeln!(text, "Participant: {}", participant);
        } else {
            text.push_str("No MVC data found.\n");
        }
        let _ = write!(
            text,
            "Full Grasp: {} N, \nIndex Pinch: {} N, \nMiddle Pinch: {} N \n",
            self.full_grasp, self.index_pinch, self.middle_pinch
        );
        text
    }
}

/// 20/40/60/80 % of one motion's MVC
#[derive(Debug, Clone, PartialEq)]
pub struct MotionPercentages {
    pub motion: GripType,
    /// `None` when the record has no usable value for the motion
    pub values: Option<[f64; 4]>,
}

/// Target forces for every motion, in table order
#[derive(Debug, Clone, PartialEq)]
pub struct MvcPercentages {
    pub motions: Vec<MotionPercentages>,
}

impl MvcPercentages {
    pub fn from_record(record: &MvcRecord) -> Self {
        let motions = GripType::MOTION_ORDER
            .into_iter()
            .map(|motion| MotionPercentages {
                motion,
                values: record
                    .value(motion)
                    .filter(|v| v.is_finite())
                    .map(|mvc| MVC_PERCENT_LEVELS.map(|p| mvc * (p as f64 / 100.0))),
            })
            .collect();
        Self { motions }
    }

    pub fn get(&self, motion: GripType) -> Option<[f64; 4]> {
        self.motions
            .iter()
            .find(|m| m.motion == motion)
            .and_then(|m| m.values)
    }

    /// Column labels, `"20%"` etc.
    pub fn level_labels() -> [String; 4] {
        MVC_PERCENT_LEVELS.map(|p| format!("{}%", p))
    }
}
