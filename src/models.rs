use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

// ---------------------------------------------------------------------------
// Language
// ---------------------------------------------------------------------------

/// Output language of an analysis. Unknown codes resolve to English.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ko,
    Uz,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::En, Language::Ko, Language::Uz];

    /// Resolve a request language code. Never fails: anything outside the
    /// supported set falls back to `en`.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "ko" => Language::Ko,
            "uz" => Language::Uz,
            _ => Language::En,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ko => "ko",
            Language::Uz => "uz",
        }
    }
}

// ---------------------------------------------------------------------------
// Urgency
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    MonitorAtHome,
    SeeDoctorSoon,
    EmergencyCare,
}

impl UrgencyLevel {
    /// Lenient parse of a model-provided level: case-insensitive, and
    /// spaces or hyphens are accepted in place of underscores.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();
        match normalized.as_str() {
            "monitor_at_home" => Some(UrgencyLevel::MonitorAtHome),
            "see_doctor_soon" => Some(UrgencyLevel::SeeDoctorSoon),
            "emergency_care" => Some(UrgencyLevel::EmergencyCare),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UrgencyLevel::MonitorAtHome => "monitor_at_home",
            UrgencyLevel::SeeDoctorSoon => "see_doctor_soon",
            UrgencyLevel::EmergencyCare => "emergency_care",
        }
    }

    /// Localized label shown next to the urgency badge.
    pub fn label(self, language: Language) -> &'static str {
        match (language, self) {
            (Language::En, UrgencyLevel::MonitorAtHome) => "Monitor at Home",
            (Language::En, UrgencyLevel::SeeDoctorSoon) => "See Doctor Soon",
            (Language::En, UrgencyLevel::EmergencyCare) => "Emergency Care",
            (Language::Ko, UrgencyLevel::MonitorAtHome) => "집에서 관찰",
            (Language::Ko, UrgencyLevel::SeeDoctorSoon) => "곧 의사 방문",
            (Language::Ko, UrgencyLevel::EmergencyCare) => "응급 치료",
            (Language::Uz, UrgencyLevel::MonitorAtHome) => "Uyda kuzatish",
            (Language::Uz, UrgencyLevel::SeeDoctorSoon) => "Tez orada shifokorga",
            (Language::Uz, UrgencyLevel::EmergencyCare) => "Shoshilinch yordam",
        }
    }
}

// ---------------------------------------------------------------------------
// Symptom request
// ---------------------------------------------------------------------------

/// Wire body of `POST /api/analyze-symptoms`. Both fields are optional on the
/// wire so that a missing `symptoms` can be answered with the contract's 400.
/// A field of the wrong JSON type reads as absent instead of failing the body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AnalyzeRequest {
    #[serde(default, deserialize_with = "string_or_none")]
    pub symptoms: Option<String>,
    #[serde(default, deserialize_with = "string_or_none")]
    pub language: Option<String>,
}

fn string_or_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_str().map(str::to_string))
}

/// A validated submission: trimmed, non-empty symptom text plus a resolved language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymptomRequest {
    symptom_text: String,
    language: Language,
}

impl SymptomRequest {
    /// Returns `None` when the symptom text is absent or blank after trimming.
    pub fn new(symptoms: Option<&str>, language: Option<&str>) -> Option<Self> {
        let text = symptoms.map(str::trim).filter(|s| !s.is_empty())?;
        Some(Self {
            symptom_text: text.to_string(),
            language: language.map(Language::from_code).unwrap_or_default(),
        })
    }

    pub fn symptom_text(&self) -> &str {
        &self.symptom_text
    }

    pub fn language(&self) -> Language {
        self.language
    }
}

// ---------------------------------------------------------------------------
// Analysis result (canonical shape)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct PrimaryAnalysis {
    pub presenting_symptoms: Vec<String>,
    pub clinical_impression: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct DifferentialDiagnosis {
    pub condition: String,
    pub likelihood: String,
    pub explanation: String,
    pub key_features: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UrgencyAssessment {
    pub level: UrgencyLevel,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub timeframe: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Recommendations {
    pub immediate: Vec<String>,
    pub monitoring: Vec<String>,
    pub lifestyle: Vec<String>,
    pub follow_up: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SpecialistReferral {
    pub recommended: bool,
    pub specialty: String,
    pub reasoning: String,
    pub specific_conditions: Vec<String>,
    pub when_to_see: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct EducationalContent {
    pub overview: String,
    pub what_to_expect: String,
    pub prevention: String,
}

/// The structured payload delivered to the UI. Always carries a valid
/// urgency level and a non-empty disclaimer once it leaves the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub primary_analysis: PrimaryAnalysis,
    pub differential_diagnosis: Vec<DifferentialDiagnosis>,
    pub urgency_assessment: UrgencyAssessment,
    pub recommendations: Recommendations,
    pub specialist_referral: SpecialistReferral,
    pub educational_content: EducationalContent,
    pub disclaimer: String,
}

/// How the delivered result was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    /// Parsed from model output with every canonical field present.
    Model,
    /// Parsed from model output, with holes patched from the template.
    Repaired,
    /// No object could be recovered; the language template was substituted.
    Fallback,
}

// ---------------------------------------------------------------------------
// Response envelopes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub data: AnalysisResult,
    pub source: ResultSource,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalyzeErrorResponse {
    pub success: bool,
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<AnalysisResult>,
    pub timestamp: String,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProviderInfo {
    pub name: String,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub app: String,
    pub uptime_seconds: u64,
    pub providers: Vec<ProviderInfo>,
}

/// ISO-8601 timestamp with millisecond precision, UTC (`2024-01-01T00:00:00.000Z`).
pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
