//! Prompt construction for symptom analysis.
//!
//! The model is instructed, not constrained: nothing here guarantees the
//! answer is valid JSON. `extract` and `normalize` deal with what comes back.

use crate::models::{Language, SymptomRequest};

struct LanguageInstructions {
    intro: &'static str,
    language_note: &'static str,
}

fn instructions(language: Language) -> LanguageInstructions {
    match language {
        Language::Ko => LanguageInstructions {
            intro: "당신은 증상 분석을 위해 설계된 고급 의료 AI 어시스턴트인 아비센나입니다. 포괄적인 의학 지식을 보유하고 있으며 증거 기반 임상 추론 프로토콜을 따릅니다.",
            language_note: "중요: 환자가 한국어로 증상을 설명했습니다. 한국어 입력을 이해하고 모든 응답을 한국어로 제공해야 합니다. 한국어를 이해할 수 없더라도 한국어로 응답하세요.",
        },
        Language::Uz => LanguageInstructions {
            intro: "Siz simptomlarni tahlil qilish uchun mo'ljallangan ilg'or tibbiy AI yordamchisi Avicennasiz. Keng qamrovli tibbiy bilimga egasiz va dalillarga asoslangan klinik mulohaza protokollariga amal qilasiz.",
            language_note: "Muhim: Bemor o'zbek tilida simptomlarini tasvirlagan. O'zbek tilini tushunishingiz va barcha javoblarni o'zbek tilida berishingiz kerak. O'zbek tilini tushunmasangiz ham, o'zbek tilida javob bering.",
        },
        Language::En => LanguageInstructions {
            intro: "You are Avicenna, an advanced medical AI assistant designed for symptom analysis. You possess comprehensive medical knowledge and follow evidence-based clinical reasoning protocols.",
            language_note: "Important: The patient has described symptoms in English. Provide all responses in English. If you cannot understand the input, still respond in English.",
        },
    }
}

/// Literal shape the model is asked to emit. Must stay in sync with
/// [`crate::models::AnalysisResult`].
const RESPONSE_SCHEMA: &str = r#"{
  "primaryAnalysis": {
    "presentingSymptoms": ["list of key symptoms identified"],
    "clinicalImpression": "Professional assessment of symptom pattern"
  },
  "differentialDiagnosis": [
    {
      "condition": "Condition Name",
      "likelihood": "high|moderate|low",
      "explanation": "Clinical reasoning and symptom correlation",
      "keyFeatures": ["Supporting symptoms/signs"]
    }
  ],
  "urgencyAssessment": {
    "level": "monitor_at_home|see_doctor_soon|emergency_care",
    "reasoning": "Clinical justification for urgency level",
    "redFlags": ["Warning signs to watch for"],
    "timeframe": "When to seek care (e.g., 'within 24 hours', 'if worsening')"
  },
  "recommendations": {
    "immediate": ["Actions to take now"],
    "monitoring": ["Signs and symptoms to watch"],
    "lifestyle": ["Self-care measures"],
    "followUp": ["When and why to seek medical care"]
  },
  "specialistReferral": {
    "recommended": true,
    "specialty": "Type of specialist if needed",
    "reasoning": "Why this specialist is recommended",
    "specificConditions": ["Specific conditions this specialist treats"],
    "whenToSee": "When to schedule appointment (e.g., 'within 1 week', 'as soon as possible')"
  },
  "educationalContent": {
    "overview": "Brief explanation of most likely condition",
    "whatToExpect": "Natural course and expected timeline",
    "prevention": "How to prevent similar issues"
  },
  "disclaimer": "This AI analysis is for informational purposes only and does not replace professional medical diagnosis or treatment. Seek immediate medical attention for severe symptoms or if condition worsens."
}"#;

/// Build the instruction string for one submission.
pub fn build_prompt(request: &SymptomRequest) -> String {
    let lang = instructions(request.language());

    format!(
        r#"{intro}

{note}

OUTPUT LANGUAGE: {display} ({code})

PATIENT PRESENTATION:
"""
{symptoms}
"""

CLINICAL ANALYSIS FRAMEWORK:
1. Perform systematic symptom analysis using differential diagnosis approach
2. Consider common conditions first, but don't ignore serious possibilities
3. Assess urgency based on established medical criteria
4. Provide evidence-based recommendations
5. Use appropriate medical terminology with clear explanations

RESPONSE REQUIREMENTS:
- Be thorough but concise
- Consider patient safety as top priority
- Include red flag symptoms assessment
- Provide actionable guidance
- Explain medical reasoning

Respond with this exact JSON structure:
{schema}

CRITICAL INSTRUCTIONS:
- Return only valid JSON. No additional text, no prose, no markdown code fences.
- "urgencyAssessment.level" must be exactly one of: monitor_at_home, see_doctor_soon, emergency_care.
- ALL text in the JSON response MUST be in {display}.
- If you cannot understand the symptoms, still respond in {display}."#,
        intro = lang.intro,
        note = lang.language_note,
        display = language_name_en(request.language()),
        code = request.language().code(),
        symptoms = request.symptom_text(),
        schema = RESPONSE_SCHEMA,
    )
}

fn language_name_en(language: Language) -> &'static str {
    match language {
        Language::En => "English",
        Language::Ko => "Korean",
        Language::Uz => "Uzbek",
    }
}
