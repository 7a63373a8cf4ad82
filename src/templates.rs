//! Per-language fallback analyses.
//!
//! A template is a complete, valid [`AnalysisResult`]: it is substituted
//! wholesale when no object can be recovered from model output, used to patch
//! individual holes in a partial object, and attached to overload responses.

use crate::models::{
    AnalysisResult, DifferentialDiagnosis, EducationalContent, Language, PrimaryAnalysis,
    Recommendations, SpecialistReferral, UrgencyAssessment, UrgencyLevel,
};

struct TemplateText {
    presenting: &'static str,
    impression: &'static str,
    condition: &'static str,
    explanation: &'static str,
    features: &'static [&'static str],
    urgency_reason: &'static str,
    red_flags: &'static [&'static str],
    timeframe: &'static str,
    immediate: &'static [&'static str],
    monitoring: &'static [&'static str],
    lifestyle: &'static [&'static str],
    follow_up: &'static [&'static str],
    specialty: &'static str,
    specialty_reason: &'static str,
    specialty_conditions: &'static [&'static str],
    when_to_see: &'static str,
    edu_overview: &'static str,
    edu_expect: &'static str,
    edu_prevention: &'static str,
    disclaimer: &'static str,
}

const EN: TemplateText = TemplateText {
    presenting: "Symptom analysis requested",
    impression: "AI analysis indicates the need for professional medical evaluation",
    condition: "Medical Evaluation Needed",
    explanation: "Based on the symptoms described, professional medical assessment is recommended",
    features: &["Patient-reported symptoms require clinical evaluation"],
    urgency_reason: "Symptoms require professional medical evaluation for proper diagnosis",
    red_flags: &["Worsening symptoms", "New concerning symptoms"],
    timeframe: "within 24-48 hours or sooner if symptoms worsen",
    immediate: &["Monitor symptoms closely"],
    monitoring: &["Watch for worsening or new symptoms"],
    lifestyle: &["Rest and maintain good hydration"],
    follow_up: &["Schedule appointment with healthcare provider"],
    specialty: "General Practitioner",
    specialty_reason: "Start with primary care evaluation",
    specialty_conditions: &["General health concerns"],
    when_to_see: "within 1 week",
    edu_overview: "Professional medical evaluation is recommended for proper symptom assessment",
    edu_expect: "Healthcare provider will perform thorough evaluation",
    edu_prevention: "Follow medical advice for prevention",
    disclaimer: "This AI analysis is for informational purposes only and does not replace professional medical diagnosis or treatment. Seek immediate medical attention for severe symptoms or if condition worsens.",
};

const KO: TemplateText = TemplateText {
    presenting: "증상 분석 요청됨",
    impression: "AI 분석 결과 전문적인 의학적 평가가 필요함을 시사합니다",
    condition: "의학적 평가 필요",
    explanation: "제시된 증상을 바탕으로 전문적인 의학적 평가가 권장됩니다",
    features: &["환자가 보고한 증상은 임상적 평가가 필요합니다"],
    urgency_reason: "정확한 진단을 위해 증상에 대한 전문적인 의학적 평가가 필요합니다",
    red_flags: &["증상 악화", "새로운 우려되는 증상"],
    timeframe: "24-48시간 이내 또는 증상이 악화될 경우 더 빨리",
    immediate: &["증상을 면밀히 관찰하십시오"],
    monitoring: &["증상 악화 또는 새로운 증상에 주의하십시오"],
    lifestyle: &["충분한 휴식과 수분 섭취를 유지하십시오"],
    follow_up: &["의료 서비스 제공자와 진료 예약을 하십시오"],
    specialty: "일반의",
    specialty_reason: "1차 진료 평가부터 시작하십시오",
    specialty_conditions: &["일반 건강 문제"],
    when_to_see: "1주일 이내",
    edu_overview: "정확한 증상 평가를 위해 전문적인 의학적 평가가 권장됩니다",
    edu_expect: "의료 서비스 제공자가 철저한 평가를 수행할 것입니다",
    edu_prevention: "예방을 위해 의학적 조언을 따르십시오",
    disclaimer: "이 AI 분석은 정보 제공 목적으로만 제공되며 전문적인 의학적 진단이나 치료를 대체하지 않습니다. 심각한 증상이 있거나 상태가 악화될 경우 즉시 의료 지원을 받으십시오.",
};

const UZ: TemplateText = TemplateText {
    presenting: "Simptomlar tahlili so'ralgan",
    impression: "AI tahlili professional tibbiy baholash zarurligini ko'rsatadi",
    condition: "Tibbiy baholash talab etiladi",
    explanation: "Taqdim etilgan alomatlarga asoslanib, professional tibbiy baholash tavsiya etiladi",
    features: &["Bemor tomonidan bildirilgan alomatlar klinik baholashni talab qiladi"],
    urgency_reason: "To'g'ri tashxis qo'yish uchun alomatlar professional tibbiy baholashni talab qiladi",
    red_flags: &["Alomatlarning yomonlashishi", "Yangi tashvishli alomatlar"],
    timeframe: "24-48 soat ichida yoki alomatlar yomonlashsa, undan ham ertaroq",
    immediate: &["Alomatlarni diqqat bilan kuzatib boring"],
    monitoring: &["Alomatlarning yomonlashishi yoki yangi alomatlarga e'tibor bering"],
    lifestyle: &["Dam oling va yetarli suyuqlik iching"],
    follow_up: &["Tibbiy yordam ko'rsatuvchi bilan uchrashuv belgilang"],
    specialty: "Umumiy amaliyot shifokori",
    specialty_reason: "Birlamchi tibbiy yordam baholashidan boshlang",
    specialty_conditions: &["Umumiy sog'liq muammolari"],
    when_to_see: "1 hafta ichida",
    edu_overview: "To'g'ri alomatlarni baholash uchun professional tibbiy ko'rikdan o'tish tavsiya etiladi",
    edu_expect: "Tibbiy yordam ko'rsatuvchi provayder to'liq baholashni amalga oshiradi",
    edu_prevention: "Oldini olish uchun tibbiy maslahatlarga rioya qiling",
    disclaimer: "Ushbu AI tahlili faqat ma'lumot berish uchun mo'ljallangan va professional tibbiy diagnostika yoki davolanishni o'rnini bosmaydi. Qattiq alomatlar yoki ahvol yomonlashgan taqdirda darhol tibbiy yordamga murojaat qiling.",
};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Fallback analysis for `language`.
pub fn fallback_template(language: Language) -> AnalysisResult {
    let t = match language {
        Language::En => &EN,
        Language::Ko => &KO,
        Language::Uz => &UZ,
    };

    AnalysisResult {
        primary_analysis: PrimaryAnalysis {
            presenting_symptoms: vec![t.presenting.to_string()],
            clinical_impression: t.impression.to_string(),
        },
        differential_diagnosis: vec![DifferentialDiagnosis {
            condition: t.condition.to_string(),
            likelihood: "high".to_string(),
            explanation: t.explanation.to_string(),
            key_features: strings(t.features),
        }],
        urgency_assessment: UrgencyAssessment {
            level: UrgencyLevel::SeeDoctorSoon,
            reasoning: t.urgency_reason.to_string(),
            red_flags: strings(t.red_flags),
            timeframe: t.timeframe.to_string(),
        },
        recommendations: Recommendations {
            immediate: strings(t.immediate),
            monitoring: strings(t.monitoring),
            lifestyle: strings(t.lifestyle),
            follow_up: strings(t.follow_up),
        },
        specialist_referral: SpecialistReferral {
            recommended: false,
            specialty: t.specialty.to_string(),
            reasoning: t.specialty_reason.to_string(),
            specific_conditions: strings(t.specialty_conditions),
            when_to_see: t.when_to_see.to_string(),
        },
        educational_content: EducationalContent {
            overview: t.edu_overview.to_string(),
            what_to_expect: t.edu_expect.to_string(),
            prevention: t.edu_prevention.to_string(),
        },
        disclaimer: t.disclaimer.to_string(),
    }
}
