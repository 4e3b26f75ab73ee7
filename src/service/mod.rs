//! Medical AI service — the façade route handlers call into.
//!
//! Each operation builds a task-specific prompt, resolves it through the
//! completion dispatcher (with its four-tier fallback), then normalizes the
//! reply into a guaranteed-shape result. Failures follow one policy: a
//! typed `ServiceError` carrying the static user-facing message plus the
//! loggable detail, never a raw upstream error; operations with a domain
//! fallback (treatment plans) degrade instead of erroring.

pub mod knowledge;
pub mod prompts;
pub mod treatment;
pub mod vision;

pub use knowledge::{GuidelineResult, KnowledgeSearchResult, MedicalLink};
pub use treatment::{TreatmentPlan, TreatmentPlanSet};
pub use vision::{resolve_vision_kind, VisionAnalysis, VisionKind};

use std::sync::mpsc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

use crate::completion::{
    ChatMessage, CompletionDispatcher, CompletionError, CompletionRequest, MessageContent, Role,
    SseStreamTransport, StreamTransport,
};
use crate::config;
use crate::parsers::{
    classify_emergency_reply, parse_diagnosis_reply, parse_drug_response, parse_symptom_response,
    parse_tcm_inquiry_response, parse_tcm_pulse_response, parse_tcm_vision_response,
    DiagnosisChatResult, DrugRecommendation, EmergencyAssessment, SymptomAnalysis, TcmImage,
    TcmImageKind, TcmInquiryAnalysis, TcmPulseAnalysis, TcmVisionAnalysis,
};
use crate::record::{
    ensure_disclaimer, sanitize_record_html, sanitize_record_strict, sanitize_record_values,
};
use crate::text::to_plain_text;

/// Operation failure surfaced to callers. The display string is the static
/// user-facing message; the source chain carries the detail for logs.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{message}")]
    Unavailable {
        message: &'static str,
        #[source]
        source: CompletionError,
    },

    #[error("{0}")]
    EmptyInput(&'static str),
}

impl ServiceError {
    fn unavailable(message: &'static str) -> impl FnOnce(CompletionError) -> ServiceError {
        move |source| {
            error!(error = %source, "{message}");
            ServiceError::Unavailable { message, source }
        }
    }

    /// Loggable detail (the underlying failure chain), empty for input errors.
    pub fn detail(&self) -> String {
        match self {
            ServiceError::Unavailable { source, .. } => source.to_string(),
            ServiceError::EmptyInput(_) => String::new(),
        }
    }
}

/// Free-form consultation reply.
#[derive(Debug, Clone, Serialize)]
pub struct Consultation {
    pub response: String,
    pub model_used: String,
}

/// Static reply offered when consultation is unavailable.
pub const CONSULTATION_FALLBACK: &str =
    "感谢您的咨询。建议您详细记录症状情况，如有需要请及时就医咨询专业医生。";

/// A generated (and sanitized) record.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedRecord {
    pub html: String,
    pub model_used: String,
    pub generated_at: String,
}

/// Record-generation options.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordOptions {
    /// Use the field-extraction sanitizer variant instead of the regex
    /// rule table.
    pub strict_grounding: bool,
}

/// Patient basics for TCM inquiry.
#[derive(Debug, Clone, Default)]
pub struct TcmPatientInfo {
    pub age: Option<u32>,
    /// "male" / "female" per the inbound API contract.
    pub gender: Option<String>,
}

/// Pulse characteristics for TCM pulse analysis.
#[derive(Debug, Clone, Default)]
pub struct PulseCharacteristics {
    pub rate: Option<String>,
    pub strength: Option<String>,
    pub form: Option<String>,
    pub description: Option<String>,
}

pub struct MedicalAiService {
    dispatcher: CompletionDispatcher,
    streamer: Box<dyn StreamTransport>,
    text_model: String,
    vision_model: String,
}

impl MedicalAiService {
    /// Service wired from environment configuration.
    pub fn from_config() -> Self {
        Self::new(
            CompletionDispatcher::from_config(),
            Box::new(SseStreamTransport::from_config()),
            config::text_model(),
            config::vision_model(),
        )
    }

    /// Fully injected constructor — the test seam.
    pub fn new(
        dispatcher: CompletionDispatcher,
        streamer: Box<dyn StreamTransport>,
        text_model: impl Into<String>,
        vision_model: impl Into<String>,
    ) -> Self {
        Self {
            dispatcher,
            streamer,
            text_model: text_model.into(),
            vision_model: vision_model.into(),
        }
    }

    fn text_request(
        &self,
        messages: Vec<ChatMessage>,
        temperature: f32,
        max_tokens: u32,
    ) -> CompletionRequest {
        CompletionRequest::new(&self.text_model, messages, temperature, max_tokens)
    }

    fn vision_request(
        &self,
        messages: Vec<ChatMessage>,
        temperature: f32,
        max_tokens: u32,
    ) -> CompletionRequest {
        CompletionRequest::new(&self.vision_model, messages, temperature, max_tokens)
    }

    // ── Text operations ─────────────────────────────────────

    /// Analyze a symptom description: model advice + rule-table triage.
    pub fn analyze_symptoms(
        &self,
        symptoms: &str,
        patient_info: Option<&Value>,
    ) -> Result<SymptomAnalysis, ServiceError> {
        if symptoms.trim().is_empty() {
            return Err(ServiceError::EmptyInput("症状描述不能为空"));
        }

        let request = self.text_request(
            vec![
                ChatMessage::system(prompts::SYMPTOM_ANALYSIS_SYSTEM_PROMPT),
                ChatMessage::user(prompts::symptom_user_message(symptoms, patient_info)),
            ],
            0.3,
            1500,
        );

        let outcome = self
            .dispatcher
            .dispatch(&request)
            .map_err(ServiceError::unavailable("AI分析服务暂时不可用"))?;

        let advice = to_plain_text(&outcome.text);
        Ok(parse_symptom_response(&advice, symptoms, &outcome.model_used))
    }

    /// Recommend OTC drugs for the symptoms, wrapped in the fixed envelope.
    pub fn recommend_drugs(
        &self,
        symptoms: &str,
        medical_history: Option<&Value>,
    ) -> Result<DrugRecommendation, ServiceError> {
        if symptoms.trim().is_empty() {
            return Err(ServiceError::EmptyInput("症状描述不能为空"));
        }

        let request = self.text_request(
            vec![
                ChatMessage::system(prompts::DRUG_RECOMMENDATION_SYSTEM_PROMPT),
                ChatMessage::user(prompts::drug_user_message(symptoms, medical_history)),
            ],
            0.2,
            1200,
        );

        let outcome = self
            .dispatcher
            .dispatch(&request)
            .map_err(ServiceError::unavailable("药物推荐服务暂时不可用"))?;

        let advice = to_plain_text(&outcome.text);
        Ok(parse_drug_response(&advice, &outcome.model_used))
    }

    /// Free-form health consultation with caller-supplied history.
    pub fn health_consultation(
        &self,
        question: &str,
        context: &[ChatMessage],
    ) -> Result<Consultation, ServiceError> {
        if question.trim().is_empty() {
            return Err(ServiceError::EmptyInput("问题不能为空"));
        }

        let mut messages = vec![ChatMessage::system(prompts::HEALTH_CONSULTATION_SYSTEM_PROMPT)];
        // History is caller-supplied: only user/assistant turns with scalar
        // non-empty content pass through, order preserved.
        messages.extend(
            context
                .iter()
                .filter(|m| m.role != Role::System)
                .filter(|m| matches!(&m.content, MessageContent::Text(t) if !t.trim().is_empty()))
                .cloned(),
        );
        messages.push(ChatMessage::user(question));

        let request = self.text_request(messages, 0.4, 1000);
        let outcome = self
            .dispatcher
            .dispatch(&request)
            .map_err(ServiceError::unavailable("咨询服务暂时不可用"))?;

        Ok(Consultation {
            response: to_plain_text(&outcome.text),
            model_used: outcome.model_used,
        })
    }

    // ── Record operations ───────────────────────────────────

    /// Generate a structured record from the brief, sanitized so that no
    /// clinical datum survives unless traceable to the brief.
    pub fn generate_record(
        &self,
        brief: &str,
        profile: Option<&Value>,
        options: RecordOptions,
    ) -> Result<GeneratedRecord, ServiceError> {
        if brief.trim().is_empty() {
            return Err(ServiceError::EmptyInput("请输入关键信息"));
        }

        let request = self.text_request(
            vec![
                ChatMessage::system(prompts::RECORD_SYSTEM_PROMPT),
                ChatMessage::user(prompts::record_user_message(brief, profile)),
            ],
            0.3,
            2000,
        );

        let outcome = self
            .dispatcher
            .dispatch(&request)
            .map_err(ServiceError::unavailable("病历生成失败，请稍后重试"))?;

        let sanitized = if options.strict_grounding {
            sanitize_record_strict(brief, &outcome.text)
        } else {
            sanitize_record_html(brief, &outcome.text)
        };

        info!(model = %outcome.model_used, "record generated and sanitized");
        Ok(GeneratedRecord {
            html: ensure_disclaimer(&sanitized),
            model_used: outcome.model_used,
            generated_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Merge new findings into an existing record. Only the value-level
    /// sanitization rules apply — the merged history is legitimate content.
    pub fn append_record(
        &self,
        brief: &str,
        existing_html: &str,
        profile: Option<&Value>,
    ) -> Result<GeneratedRecord, ServiceError> {
        if brief.trim().is_empty() {
            return Err(ServiceError::EmptyInput("请输入关键信息"));
        }

        let request = self.text_request(
            vec![
                ChatMessage::system(prompts::RECORD_APPEND_SYSTEM_PROMPT),
                ChatMessage::user(prompts::record_append_user_message(
                    brief,
                    existing_html,
                    profile,
                )),
            ],
            0.3,
            2500,
        );

        let outcome = self
            .dispatcher
            .dispatch(&request)
            .map_err(ServiceError::unavailable("追加病历生成失败，请稍后重试"))?;

        Ok(GeneratedRecord {
            html: ensure_disclaimer(&sanitize_record_values(&outcome.text)),
            model_used: outcome.model_used,
            generated_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Stream a record generation as raw text deltas; returns the
    /// accumulated full text when the stream ends. Sanitization is a
    /// non-streaming concern — callers re-sanitize on save.
    pub fn stream_record(
        &self,
        brief: &str,
        profile: Option<&Value>,
        chunk_tx: mpsc::Sender<String>,
    ) -> Result<String, ServiceError> {
        if brief.trim().is_empty() {
            return Err(ServiceError::EmptyInput("请输入关键信息"));
        }

        let request = self.text_request(
            vec![
                ChatMessage::system(prompts::RECORD_STREAM_SYSTEM_PROMPT),
                ChatMessage::user(prompts::record_stream_user_message(brief, profile)),
            ],
            0.2,
            1600,
        );

        self.streamer.stream(&request, chunk_tx).map_err(|e| {
            error!(error = %e, "streaming record generation failed");
            ServiceError::Unavailable {
                message: "病历生成失败，请稍后重试",
                source: CompletionError::Exhausted {
                    attempts: 1,
                    last: e,
                },
            }
        })
    }

    /// Generate ranked treatment plans from a record. A reply without
    /// usable JSON degrades to the preset plans rather than erroring.
    pub fn generate_treatment_plans(
        &self,
        record: &str,
        profile: Option<&Value>,
        num_plans: usize,
    ) -> Result<TreatmentPlanSet, ServiceError> {
        if record.trim().is_empty() {
            return Err(ServiceError::EmptyInput("病历内容不能为空"));
        }
        let num_plans = if (1..=5).contains(&num_plans) { num_plans } else { 3 };

        let request = self.text_request(
            vec![
                ChatMessage::system(prompts::TREATMENT_PLAN_SYSTEM_PROMPT),
                ChatMessage::user(prompts::treatment_user_message(record, profile, num_plans)),
            ],
            0.3,
            2000,
        );

        let outcome = self
            .dispatcher
            .dispatch(&request)
            .map_err(ServiceError::unavailable("治疗方案生成失败，请稍后重试"))?;

        Ok(treatment::parse_treatment_plans(
            &outcome.text,
            num_plans,
            &outcome.model_used,
        ))
    }

    // ── Conversational operations ───────────────────────────

    /// One diagnosis-chat turn. Stateless server-side; `context` is the
    /// caller-retained history.
    pub fn diagnosis_chat(
        &self,
        user_input: &str,
        context: &[ChatMessage],
    ) -> Result<DiagnosisChatResult, ServiceError> {
        if user_input.trim().is_empty() {
            return Err(ServiceError::EmptyInput("问题不能为空"));
        }

        let mut messages = vec![ChatMessage::system(prompts::DIAGNOSIS_CHAT_SYSTEM_PROMPT)];
        messages.extend(
            context
                .iter()
                .filter(|m| m.role != Role::System)
                .filter(|m| matches!(&m.content, MessageContent::Text(t) if !t.trim().is_empty()))
                .cloned(),
        );
        messages.push(ChatMessage::user(user_input));

        let request = self.text_request(messages, 0.3, 1000);
        let outcome = self
            .dispatcher
            .dispatch(&request)
            .map_err(ServiceError::unavailable("问诊暂不可用"))?;

        Ok(parse_diagnosis_reply(&outcome.text))
    }

    // ── Vision operations ───────────────────────────────────

    /// Analyze a drug package / report / skin photo. The caller's `kind`
    /// string is resolved through the alias table; unknown kinds fall back
    /// to the skin task.
    pub fn vision_analyze(
        &self,
        image_data_url: &str,
        kind: &str,
        note: &str,
    ) -> Result<VisionAnalysis, ServiceError> {
        if image_data_url.trim().is_empty() {
            return Err(ServiceError::EmptyInput("图片数据不能为空"));
        }

        let resolved = resolve_vision_kind(kind);
        let messages =
            vision::build_vision_messages(prompts::vision_task_prompt(resolved), image_data_url, note);

        let request = self.vision_request(messages, 0.2, 1800);
        let outcome = self
            .dispatcher
            .dispatch(&request)
            .map_err(ServiceError::unavailable("图像分析失败，请稍后重试"))?;

        // HTML kept as generated — the front-end renders it directly.
        Ok(VisionAnalysis {
            kind: resolved,
            html: outcome.text,
            model_used: outcome.model_used,
        })
    }

    /// Quick emergency triage of symptoms via the model, classified by the
    /// fixed token table.
    pub fn emergency_assessment(
        &self,
        symptoms: &str,
    ) -> Result<EmergencyAssessment, ServiceError> {
        if symptoms.trim().is_empty() {
            return Err(ServiceError::EmptyInput("症状描述不能为空"));
        }

        let request = self.vision_request(
            vec![
                ChatMessage::system(prompts::EMERGENCY_SYSTEM_PROMPT),
                ChatMessage::user(prompts::emergency_user_message(symptoms)),
            ],
            0.1,
            500,
        );

        let outcome = self
            .dispatcher
            .dispatch(&request)
            .map_err(ServiceError::unavailable("无法评估，建议咨询医生"))?;

        Ok(classify_emergency_reply(&to_plain_text(&outcome.text)))
    }

    // ── TCM operations ──────────────────────────────────────

    /// Facial/tongue image analysis; strict JSON first, keyword fallback.
    pub fn tcm_vision_analyze(
        &self,
        images: &[TcmImage],
    ) -> Result<TcmVisionAnalysis, ServiceError> {
        if images.is_empty() {
            return Err(ServiceError::EmptyInput("请提供面诊或舌诊图像"));
        }

        let mut parts = Vec::new();
        for img in images {
            let caption = match img.kind {
                TcmImageKind::Face => {
                    format!("请分析这张面部图像的中医特征：{}", img.description)
                }
                TcmImageKind::Tongue => {
                    format!("请分析这张舌象图像的中医特征：{}", img.description)
                }
            };
            parts.push(crate::completion::ContentPart::Text { text: caption });
            parts.push(crate::completion::ContentPart::ImageUrl {
                image_url: crate::completion::ImageUrl {
                    url: img.data_url.clone(),
                },
            });
        }
        parts.push(crate::completion::ContentPart::Text {
            text: prompts::TCM_VISION_JSON_INSTRUCTION.to_string(),
        });

        let request = self.vision_request(
            vec![
                ChatMessage::system(prompts::TCM_VISION_SYSTEM_PROMPT),
                ChatMessage::user_parts(parts),
            ],
            0.3,
            1200,
        );

        let outcome = self
            .dispatcher
            .dispatch(&request)
            .map_err(ServiceError::unavailable("中医望诊分析暂不可用"))?;

        Ok(parse_tcm_vision_response(&outcome.text, images))
    }

    /// Inquiry-based syndrome differentiation.
    pub fn tcm_inquiry_analyze(
        &self,
        patient: &TcmPatientInfo,
        symptoms: &[String],
    ) -> Result<TcmInquiryAnalysis, ServiceError> {
        let gender = match patient.gender.as_deref() {
            Some("male") => "男性",
            _ => "女性",
        };

        let request = self.vision_request(
            vec![
                ChatMessage::system(prompts::TCM_INQUIRY_SYSTEM_PROMPT),
                ChatMessage::user(prompts::tcm_inquiry_user_message(
                    patient.age,
                    gender,
                    symptoms,
                )),
            ],
            0.3,
            1200,
        );

        let outcome = self
            .dispatcher
            .dispatch(&request)
            .map_err(ServiceError::unavailable("中医问诊分析暂不可用"))?;

        Ok(parse_tcm_inquiry_response(&outcome.text))
    }

    /// Pulse-reading analysis from described characteristics.
    pub fn tcm_pulse_analyze(
        &self,
        pulse: &PulseCharacteristics,
    ) -> Result<TcmPulseAnalysis, ServiceError> {
        let mut parts = Vec::new();
        if let Some(rate) = &pulse.rate {
            parts.push(format!("脉率：{rate}"));
        }
        if let Some(strength) = &pulse.strength {
            parts.push(format!("脉力：{strength}"));
        }
        if let Some(form) = &pulse.form {
            parts.push(format!("脉形：{form}"));
        }
        if let Some(description) = &pulse.description {
            parts.push(format!("详细描述：{description}"));
        }
        let pulse_text = if parts.is_empty() {
            "脉象信息不完整".to_string()
        } else {
            parts.join("、")
        };

        let request = self.vision_request(
            vec![
                ChatMessage::system(prompts::TCM_PULSE_SYSTEM_PROMPT),
                ChatMessage::user(format!(
                    "患者脉象特征：{pulse_text}\n\n请进行专业的中医脉诊分析。"
                )),
            ],
            0.3,
            1000,
        );

        let outcome = self
            .dispatcher
            .dispatch(&request)
            .map_err(ServiceError::unavailable("中医脉诊分析暂不可用"))?;

        Ok(parse_tcm_pulse_response(&outcome.text))
    }

    // ── Knowledge operations ────────────────────────────────

    /// Evidence lookup with whitelisted citations.
    pub fn knowledge_search(&self, query: &str) -> Result<KnowledgeSearchResult, ServiceError> {
        if query.trim().is_empty() {
            return Err(ServiceError::EmptyInput("查询内容不能为空"));
        }

        let request = self.text_request(
            vec![
                ChatMessage::system(prompts::KNOWLEDGE_SEARCH_SYSTEM_PROMPT),
                ChatMessage::user(prompts::knowledge_user_message(query)),
            ],
            0.3,
            2000,
        );

        let outcome = self
            .dispatcher
            .dispatch(&request)
            .map_err(ServiceError::unavailable("医学文献查询暂不可用"))?;

        Ok(knowledge::build_knowledge_result(
            query,
            &outcome.text,
            &outcome.model_used,
        ))
    }

    /// Guideline lookup, focused per category.
    pub fn guidelines_search(
        &self,
        query: &str,
        category: &str,
    ) -> Result<GuidelineResult, ServiceError> {
        if query.trim().is_empty() {
            return Err(ServiceError::EmptyInput("查询内容不能为空"));
        }

        let request = self.text_request(
            vec![
                ChatMessage::system(prompts::guidelines_system_prompt(category)),
                ChatMessage::user(prompts::guidelines_user_message(query)),
            ],
            0.2,
            1500,
        );

        let outcome = self
            .dispatcher
            .dispatch(&request)
            .map_err(ServiceError::unavailable("医学指南查询暂不可用"))?;

        Ok(knowledge::build_guideline_result(
            query,
            category,
            &outcome.text,
            &outcome.model_used,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{ScriptedTransport, TransportError};
    use crate::parsers::UrgencyLevel;

    /// Streaming stub that replays scripted deltas.
    struct ScriptedStream {
        deltas: Vec<String>,
    }

    impl StreamTransport for ScriptedStream {
        fn stream(
            &self,
            _request: &CompletionRequest,
            chunk_tx: mpsc::Sender<String>,
        ) -> Result<String, TransportError> {
            let mut full = String::new();
            for delta in &self.deltas {
                full.push_str(delta);
                let _ = chunk_tx.send(delta.clone());
            }
            Ok(full)
        }
    }

    fn service_replying(reply: &str) -> (MedicalAiService, std::sync::Arc<ScriptedTransport>) {
        let transport = std::sync::Arc::new(ScriptedTransport::always("sdk", reply));
        let service = MedicalAiService::new(
            CompletionDispatcher::new(
                vec![Box::new(SharedTransport(transport.clone()))],
                config::FALLBACK_MODEL,
            ),
            Box::new(ScriptedStream { deltas: vec![] }),
            "qwen-plus",
            "qwen-vl-max",
        );
        (service, transport)
    }

    /// Wrapper so tests can keep a handle on the scripted transport after
    /// it moves into the dispatcher.
    struct SharedTransport(std::sync::Arc<ScriptedTransport>);

    impl crate::completion::CompletionTransport for SharedTransport {
        fn label(&self) -> &'static str {
            self.0.label()
        }
        fn complete(&self, request: &CompletionRequest) -> Result<String, TransportError> {
            self.0.complete(request)
        }
    }

    fn failing_service() -> MedicalAiService {
        MedicalAiService::new(
            CompletionDispatcher::new(
                vec![Box::new(ScriptedTransport::with_script(
                    "sdk",
                    vec![
                        Err(TransportError::Network("down".into())),
                        Err(TransportError::Network("down".into())),
                    ],
                ))],
                config::FALLBACK_MODEL,
            ),
            Box::new(ScriptedStream { deltas: vec![] }),
            "qwen-plus",
            "qwen-vl-max",
        )
    }

    // ── Symptom analysis ──

    #[test]
    fn analyze_symptoms_cleans_markdown_and_triages() {
        let (service, _) = service_replying("## 分析\n**可能为上呼吸道感染**");
        let analysis = service.analyze_symptoms("持续发烧三天", None).unwrap();
        assert_eq!(analysis.diagnosis_advice, "分析\n可能为上呼吸道感染");
        assert_eq!(analysis.urgency.level, UrgencyLevel::Urgent);
        assert_eq!(analysis.model_used, "qwen-plus");
    }

    #[test]
    fn analyze_symptoms_rejects_empty_input() {
        let (service, transport) = service_replying("ok");
        let err = service.analyze_symptoms("  ", None).unwrap_err();
        assert!(matches!(err, ServiceError::EmptyInput(_)));
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn analyze_symptoms_unavailable_carries_static_message() {
        let service = failing_service();
        let err = service.analyze_symptoms("发热", None).unwrap_err();
        assert_eq!(err.to_string(), "AI分析服务暂时不可用");
        assert!(err.detail().contains("exhausted"));
    }

    // ── Drug recommendation ──

    #[test]
    fn recommend_drugs_wraps_envelope() {
        let (service, transport) = service_replying("对乙酰氨基酚，成人每次500mg");
        let rec = service.recommend_drugs("发热头痛", None).unwrap();
        assert!(rec.detailed_advice.contains("对乙酰氨基酚"));
        assert_eq!(rec.warnings.len(), 3);
        // Temperature for drug advice is the conservative 0.2
        let req = &transport.requests()[0];
        assert!((req.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(req.max_tokens, 1200);
    }

    // ── Consultation ──

    #[test]
    fn consultation_preserves_caller_history_order() {
        let (service, transport) = service_replying("好的，建议多休息。");
        let context = vec![
            ChatMessage::user("我最近睡不好"),
            ChatMessage::assistant("可以先调整作息"),
            ChatMessage::system("应被滤除"),
            ChatMessage::user(""),
        ];
        service.health_consultation("还有什么建议？", &context).unwrap();

        let req = &transport.requests()[0];
        // system prompt + 2 surviving history turns + the question
        assert_eq!(req.messages.len(), 4);
        assert_eq!(req.messages[1].content.as_text(), Some("我最近睡不好"));
        assert_eq!(req.messages[2].role, Role::Assistant);
        assert_eq!(req.messages[3].content.as_text(), Some("还有什么建议？"));
    }

    // ── Records ──

    #[test]
    fn generate_record_sanitizes_and_adds_disclaimer() {
        let fabricated = "<h3>主诉</h3><p>发热2天</p>\
                          <h3>现病史</h3><p>模型编造的盗汗与咯血史</p>\
                          <h3>体格检查</h3><p>体温39.2℃，双肺湿啰音</p>";
        let (service, _) = service_replying(fabricated);
        let record = service
            .generate_record("患者男，35岁，发热2天", None, RecordOptions::default())
            .unwrap();
        assert!(!record.html.contains("盗汗"));
        assert!(!record.html.contains("39.2"));
        assert!(record.html.contains("依据当前描述：患者男，35岁，发热2天"));
        assert!(record.html.contains("本病历仅供参考"));
    }

    #[test]
    fn generate_record_strict_uses_field_extraction() {
        let fabricated = "<h3>现病史</h3><p>模型自由发挥</p>";
        let (service, _) = service_replying(fabricated);
        let record = service
            .generate_record(
                "患者女，28岁，咳嗽",
                None,
                RecordOptions { strict_grounding: true },
            )
            .unwrap();
        assert!(record.html.contains("患者女28岁，主诉：咳嗽。"));
        assert!(!record.html.contains("自由发挥"));
    }

    #[test]
    fn append_record_keeps_merged_sections() {
        let merged = "<h3>既往史</h3><p>高血压病史五年</p><h3>辅助检查</h3><p>复查体温38℃</p>";
        let (service, _) = service_replying(merged);
        let record = service
            .append_record("复诊：体温回落", "<h3>既往史</h3><p>高血压病史五年</p>", None)
            .unwrap();
        // Merged history survives; fabricated vitals still neutralized
        assert!(record.html.contains("高血压病史五年"));
        assert!(record.html.contains("体温：待查"));
    }

    #[test]
    fn stream_record_forwards_deltas_and_returns_full_text() {
        let service = MedicalAiService::new(
            CompletionDispatcher::new(vec![], config::FALLBACK_MODEL),
            Box::new(ScriptedStream {
                deltas: vec!["<h3>".into(), "主诉".into(), "</h3>".into()],
            }),
            "qwen-plus",
            "qwen-vl-max",
        );

        let (tx, rx) = mpsc::channel();
        let full = service.stream_record("发热", None, tx).unwrap();
        assert_eq!(full, "<h3>主诉</h3>");
        let received: Vec<String> = rx.try_iter().collect();
        assert_eq!(received, vec!["<h3>", "主诉", "</h3>"]);
    }

    // ── Treatment plans ──

    #[test]
    fn treatment_plans_ranked_from_model_json() {
        let reply = r#"{"plans": [
            {"name": "A", "score": 60, "reason": "r", "html": "<h3>治疗目标</h3>"},
            {"name": "B", "score": 85, "reason": "r", "html": "<h3>治疗目标</h3>"},
            {"name": "C", "score": 75, "reason": "r", "html": "<h3>治疗目标</h3>"}
        ]}"#;
        let (service, _) = service_replying(reply);
        let set = service
            .generate_treatment_plans("<p>病历</p>", None, 3)
            .unwrap();
        let scores: Vec<u8> = set.plans.iter().map(|p| p.score).collect();
        assert_eq!(scores, vec![85, 75, 60]);
    }

    #[test]
    fn treatment_plan_count_out_of_range_defaults_to_three() {
        let (service, transport) = service_replying(r#"{"plans": []}"#);
        service.generate_treatment_plans("<p>x</p>", None, 9).unwrap();
        let req = &transport.requests()[0];
        match req.messages[1].content.as_text() {
            Some(text) => assert!(text.contains("请生成3个治疗方案")),
            None => panic!("expected scalar user content"),
        }
    }

    #[test]
    fn treatment_plans_degrade_to_presets_on_bad_json() {
        let (service, _) = service_replying("无法生成JSON");
        let set = service
            .generate_treatment_plans("<p>病历</p>", None, 2)
            .unwrap();
        assert_eq!(set.model_used, "fallback");
        assert_eq!(set.plans.len(), 2);
    }

    // ── Diagnosis chat ──

    #[test]
    fn diagnosis_chat_routes_ask() {
        let (service, _) = service_replying(r#"{"status":"ask","ask":{"question":"疼了几天？"}}"#);
        let result = service.diagnosis_chat("肚子疼", &[]).unwrap();
        assert_eq!(
            result,
            DiagnosisChatResult::Ask {
                question: "疼了几天？".into()
            }
        );
    }

    #[test]
    fn diagnosis_chat_non_json_degrades_to_unparsed() {
        let (service, _) = service_replying("建议尽快就诊，注意休息。");
        let result = service.diagnosis_chat("胸闷", &[]).unwrap();
        assert!(matches!(result, DiagnosisChatResult::Unparsed { .. }));
    }

    // ── Vision ──

    #[test]
    fn vision_analyze_resolves_pill_to_drug_and_picks_drug_prompt() {
        let (service, transport) = service_replying("<h3>药品名称</h3><p>布洛芬</p>");
        let analysis = service
            .vision_analyze("data:image/jpeg;base64,AAAA", "pill", "")
            .unwrap();
        assert_eq!(analysis.kind, VisionKind::Drug);
        let prompt = transport.first_system_prompt().unwrap();
        assert!(prompt.contains("药品名称"));
        // Vision tasks go to the vision model
        assert_eq!(transport.requests()[0].model, "qwen-vl-max");
    }

    #[test]
    fn vision_analyze_resolves_chinese_report_alias() {
        let (service, transport) = service_replying("<h3>报告信息</h3>");
        let analysis = service
            .vision_analyze("data:image/jpeg;base64,AAAA", "检验", "")
            .unwrap();
        assert_eq!(analysis.kind, VisionKind::Report);
        assert!(transport.first_system_prompt().unwrap().contains("关键指标"));
    }

    #[test]
    fn vision_analyze_unknown_kind_defaults_to_skin() {
        let (service, transport) = service_replying("<h3>可能疾病（按优先级）</h3>");
        let analysis = service
            .vision_analyze("data:image/jpeg;base64,AAAA", "auto", "")
            .unwrap();
        assert_eq!(analysis.kind, VisionKind::Skin);
        assert!(transport.first_system_prompt().unwrap().contains("可能疾病"));
    }

    // ── Emergency ──

    #[test]
    fn emergency_assessment_classifies_reply_tokens() {
        let (service, _) = service_replying("评估结果：紧急，请立即就医");
        let assessment = service.emergency_assessment("剧烈胸痛").unwrap();
        assert_eq!(assessment.urgency_level, UrgencyLevel::Emergency);
    }

    // ── TCM ──

    #[test]
    fn tcm_vision_sends_images_and_json_instruction() {
        let (service, transport) = service_replying(r#"{"face":{"analysis":"气色尚可"}}"#);
        let images = vec![TcmImage {
            kind: TcmImageKind::Face,
            data_url: "data:image/jpeg;base64,AAAA".into(),
            description: "自然光".into(),
        }];
        let analysis = service.tcm_vision_analyze(&images).unwrap();
        assert_eq!(analysis.face.unwrap().analysis, "气色尚可");

        let req = &transport.requests()[0];
        match &req.messages[1].content {
            MessageContent::Parts(parts) => {
                // caption + image + trailing JSON instruction
                assert_eq!(parts.len(), 3);
            }
            other => panic!("expected parts, got {other:?}"),
        }
    }

    #[test]
    fn tcm_pulse_composes_description() {
        let (service, transport) = service_replying("脉象分析：脉滑");
        let pulse = PulseCharacteristics {
            rate: Some("90次/分".into()),
            strength: Some("有力".into()),
            form: None,
            description: None,
        };
        let analysis = service.tcm_pulse_analyze(&pulse).unwrap();
        assert!(analysis.pulse_analysis.contains("脉滑"));

        let text = transport.requests()[0].messages[1]
            .content
            .as_text()
            .unwrap()
            .to_string();
        assert!(text.contains("脉率：90次/分、脉力：有力"));
    }

    // ── Knowledge ──

    #[test]
    fn knowledge_search_cleans_and_links() {
        let (service, _) =
            service_replying("**糖尿病**管理指南见 https://www.who.int/health-topics/diabetes");
        let result = service.knowledge_search("糖尿病").unwrap();
        assert!(!result.content.contains("**"));
        assert!(result.links.iter().any(|l| l.url.contains("who.int")));
    }
}
