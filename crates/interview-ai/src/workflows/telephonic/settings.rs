use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::clock::Clock;
use super::domain::JobId;
use super::error::InterviewError;
use super::repository::InterviewRepository;

pub const DEFAULT_MINIMUM_QUALIFYING_SCORE: u8 = 70;
pub const DEFAULT_DURATION_MINUTES: u32 = 30;

/// Per-dimension weights in percent. A valid set sums to exactly 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub communication: u8,
    pub technical_knowledge: u8,
    pub problem_solving: u8,
    pub enthusiasm: u8,
    pub clarity: u8,
    pub professionalism: u8,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            communication: 30,
            technical_knowledge: 25,
            problem_solving: 20,
            enthusiasm: 10,
            clarity: 10,
            professionalism: 5,
        }
    }
}

impl ScoringWeights {
    pub fn total(&self) -> u32 {
        [
            self.communication,
            self.technical_knowledge,
            self.problem_solving,
            self.enthusiasm,
            self.clarity,
            self.professionalism,
        ]
        .iter()
        .map(|weight| u32::from(*weight))
        .sum()
    }

    pub fn validate(&self) -> Result<(), InterviewError> {
        let total = self.total();
        if total != 100 {
            return Err(InterviewError::Validation(format!(
                "Scoring weights must sum to 100 (got {total})"
            )));
        }
        Ok(())
    }
}

/// Scoring and recording configuration of one job's telephonic round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewSettings {
    pub job_id: JobId,
    pub weights: ScoringWeights,
    pub minimum_qualifying_score: u8,
    pub default_duration_minutes: u32,
    pub enable_recording: bool,
    pub enable_transcription: bool,
    pub enable_ai_analysis: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InterviewSettings {
    pub fn defaults(job_id: JobId, now: DateTime<Utc>) -> Self {
        Self {
            job_id,
            weights: ScoringWeights::default(),
            minimum_qualifying_score: DEFAULT_MINIMUM_QUALIFYING_SCORE,
            default_duration_minutes: DEFAULT_DURATION_MINUTES,
            enable_recording: true,
            enable_transcription: true,
            enable_ai_analysis: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the patched copy, or the first rule it breaks. `self` is left untouched.
    pub fn patched(&self, patch: &SettingsPatch) -> Result<Self, InterviewError> {
        let mut next = self.clone();
        let weights = &mut next.weights;
        if let Some(value) = patch.communication_weight {
            weights.communication = value;
        }
        if let Some(value) = patch.technical_knowledge_weight {
            weights.technical_knowledge = value;
        }
        if let Some(value) = patch.problem_solving_weight {
            weights.problem_solving = value;
        }
        if let Some(value) = patch.enthusiasm_weight {
            weights.enthusiasm = value;
        }
        if let Some(value) = patch.clarity_weight {
            weights.clarity = value;
        }
        if let Some(value) = patch.professionalism_weight {
            weights.professionalism = value;
        }
        next.weights.validate()?;

        if let Some(score) = patch.minimum_qualifying_score {
            if score > 100 {
                return Err(InterviewError::Validation(
                    "Minimum qualifying score must be between 0 and 100".to_string(),
                ));
            }
            next.minimum_qualifying_score = score;
        }
        if let Some(minutes) = patch.default_duration_minutes {
            if minutes == 0 {
                return Err(InterviewError::Validation(
                    "Default duration must be at least one minute".to_string(),
                ));
            }
            next.default_duration_minutes = minutes;
        }
        if let Some(flag) = patch.enable_recording {
            next.enable_recording = flag;
        }
        if let Some(flag) = patch.enable_transcription {
            next.enable_transcription = flag;
        }
        if let Some(flag) = patch.enable_ai_analysis {
            next.enable_ai_analysis = flag;
        }
        Ok(next)
    }
}

/// Partial settings update as accepted from recruiters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsPatch {
    pub communication_weight: Option<u8>,
    pub technical_knowledge_weight: Option<u8>,
    pub problem_solving_weight: Option<u8>,
    pub enthusiasm_weight: Option<u8>,
    pub clarity_weight: Option<u8>,
    pub professionalism_weight: Option<u8>,
    pub minimum_qualifying_score: Option<u8>,
    pub default_duration_minutes: Option<u32>,
    pub enable_recording: Option<bool>,
    pub enable_transcription: Option<bool>,
    pub enable_ai_analysis: Option<bool>,
}

/// Lazily provisions and validates per-job settings.
pub struct SettingsStore {
    repository: Arc<dyn InterviewRepository>,
    clock: Arc<dyn Clock>,
}

impl SettingsStore {
    pub fn new(repository: Arc<dyn InterviewRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    pub fn settings_for(&self, job_id: &JobId) -> Result<InterviewSettings, InterviewError> {
        if let Some(settings) = self.repository.settings_for_job(job_id)? {
            return Ok(settings);
        }
        let created = self
            .repository
            .create_default_settings(job_id, self.clock.now())?;
        info!(job_id = %job_id, "provisioned default interview settings");
        Ok(created)
    }

    pub fn update(
        &self,
        job_id: &JobId,
        patch: &SettingsPatch,
    ) -> Result<InterviewSettings, InterviewError> {
        let current = self.settings_for(job_id)?;
        let mut next = current.patched(patch)?;
        next.updated_at = self.clock.now();
        let stored = self.repository.update_settings(next)?;
        info!(
            job_id = %job_id,
            minimum_qualifying_score = stored.minimum_qualifying_score,
            "interview settings updated"
        );
        Ok(stored)
    }
}
