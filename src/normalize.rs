//! Schema normalization: every object leaving this module is a complete
//! [`AnalysisResult`].
//!
//! A missing candidate becomes the language template. A present candidate
//! keeps every canonical field it got right; each missing or wrongly-typed
//! field is patched from the template. `recommendations` is patched per
//! category and `urgencyAssessment.level` on its own, one level deep only.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::extract::JsonObject;
use crate::models::{
    AnalysisResult, Language, Recommendations, ResultSource, UrgencyAssessment, UrgencyLevel,
};
use crate::templates::fallback_template;

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub result: AnalysisResult,
    pub source: ResultSource,
    /// Dotted paths of fields taken from the template.
    pub patched: Vec<String>,
}

/// Normalize an extracted candidate (or its absence). Never fails.
pub fn normalize(candidate: Option<JsonObject>, language: Language) -> Normalized {
    let template = fallback_template(language);

    let Some(mut obj) = candidate else {
        tracing::warn!("normalize: no object recovered, using {} fallback template", language.code());
        return Normalized {
            result: template,
            source: ResultSource::Fallback,
            patched: Vec::new(),
        };
    };

    let mut patched = Vec::new();

    let primary_analysis =
        take_field(&mut obj, "primaryAnalysis").unwrap_or_else(|| {
            patched.push("primaryAnalysis".to_string());
            template.primary_analysis.clone()
        });

    let differential_diagnosis = take_field::<Vec<_>>(&mut obj, "differentialDiagnosis")
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| {
            patched.push("differentialDiagnosis".to_string());
            template.differential_diagnosis.clone()
        });

    let urgency_assessment = take_urgency(&mut obj, &template.urgency_assessment, &mut patched);

    let recommendations = take_recommendations(&mut obj, &template.recommendations, &mut patched);

    let specialist_referral = take_field(&mut obj, "specialistReferral").unwrap_or_else(|| {
        patched.push("specialistReferral".to_string());
        template.specialist_referral.clone()
    });

    let educational_content = take_field(&mut obj, "educationalContent").unwrap_or_else(|| {
        patched.push("educationalContent".to_string());
        template.educational_content.clone()
    });

    let disclaimer = take_field::<String>(&mut obj, "disclaimer")
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| {
            patched.push("disclaimer".to_string());
            template.disclaimer.clone()
        });

    if !obj.is_empty() {
        tracing::debug!(
            "normalize: dropping non-canonical fields {:?}",
            obj.keys().collect::<Vec<_>>()
        );
    }

    let source = if patched.is_empty() {
        ResultSource::Model
    } else {
        tracing::info!("normalize: patched {:?} from {} template", patched, language.code());
        ResultSource::Repaired
    };

    Normalized {
        result: AnalysisResult {
            primary_analysis,
            differential_diagnosis,
            urgency_assessment,
            recommendations,
            specialist_referral,
            educational_content,
            disclaimer,
        },
        source,
        patched,
    }
}

/// Remove `key` and deserialize it; `None` when absent, null or mistyped.
fn take_field<T: DeserializeOwned>(obj: &mut Map<String, Value>, key: &str) -> Option<T> {
    let value = obj.remove(key)?;
    if value.is_null() {
        return None;
    }
    match serde_json::from_value(value) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!("normalize: field {} has wrong shape: {}", key, e);
            None
        }
    }
}

fn take_urgency(
    obj: &mut Map<String, Value>,
    fallback: &UrgencyAssessment,
    patched: &mut Vec<String>,
) -> UrgencyAssessment {
    let Some(Value::Object(mut urgency)) = obj.remove("urgencyAssessment") else {
        patched.push("urgencyAssessment".to_string());
        return fallback.clone();
    };

    let level = urgency
        .remove("level")
        .and_then(|v| v.as_str().and_then(UrgencyLevel::parse))
        .unwrap_or_else(|| {
            patched.push("urgencyAssessment.level".to_string());
            fallback.level
        });
    urgency.insert("level".to_string(), Value::String(level.as_str().to_string()));

    match serde_json::from_value(Value::Object(urgency)) {
        Ok(assessment) => assessment,
        Err(e) => {
            tracing::debug!("normalize: urgencyAssessment has wrong shape: {}", e);
            patched.push("urgencyAssessment".to_string());
            UrgencyAssessment {
                level,
                ..fallback.clone()
            }
        }
    }
}

fn take_recommendations(
    obj: &mut Map<String, Value>,
    fallback: &Recommendations,
    patched: &mut Vec<String>,
) -> Recommendations {
    let Some(Value::Object(mut recs)) = obj.remove("recommendations") else {
        patched.push("recommendations".to_string());
        return fallback.clone();
    };

    let mut category = |key: &str, default: &[String]| -> Vec<String> {
        take_field(&mut recs, key).unwrap_or_else(|| {
            patched.push(format!("recommendations.{key}"));
            default.to_vec()
        })
    };

    Recommendations {
        immediate: category("immediate", &fallback.immediate),
        monitoring: category("monitoring", &fallback.monitoring),
        lifestyle: category("lifestyle", &fallback.lifestyle),
        follow_up: category("followUp", &fallback.follow_up),
    }
}
