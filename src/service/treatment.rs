//! Treatment-plan parsing, validation, and ranking.
//!
//! The model is asked for strict JSON (`{"plans": [...]}`); each plan must
//! carry name/score/reason/html to count. Valid plans are clamped, ranked
//! descending by score, and topped up from the built-in default plans when
//! the model produced fewer than requested. A reply with no parseable JSON
//! degrades to the default set outright.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::text::extract_json;

/// One ranked treatment plan. `confidence` is always `score / 100`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreatmentPlan {
    pub name: String,
    pub score: u8,
    pub reason: String,
    pub html: String,
    pub confidence: f32,
}

/// Result set returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct TreatmentPlanSet {
    pub plans: Vec<TreatmentPlan>,
    pub total_plans: usize,
    pub model_used: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Note attached when the whole set is the preset fallback.
pub const FALLBACK_PLAN_NOTE: &str = "由于AI服务暂时不可用，使用预设方案";

fn clamp_score(raw: i64) -> u8 {
    raw.clamp(0, 100) as u8
}

fn validate_plan(value: &Value) -> Option<TreatmentPlan> {
    let name = value.get("name")?.as_str()?.to_string();
    let score = clamp_score(value.get("score")?.as_i64()?);
    let reason = value.get("reason")?.as_str()?.to_string();
    let html = value.get("html")?.as_str()?.to_string();

    Some(TreatmentPlan {
        name,
        score,
        reason,
        html: ensure_plan_structure(&html),
        confidence: f32::from(score) / 100.0,
    })
}

/// Guarantee the plan HTML carries section structure — replies that return
/// bare prose get the generic skeleton instead.
fn ensure_plan_structure(html: &str) -> String {
    if html.contains("<h3>") {
        return html.to_string();
    }
    generic_plan_html()
}

fn generic_plan_html() -> String {
    "<h3>治疗目标</h3>\
     <p>根据患者病情，制定个性化的治疗目标。</p>\
     <h3>药物治疗</h3>\
     <p><strong>治疗原则：</strong>根据患者具体情况选择合适的药物治疗方案。</p>\
     <p><strong>推荐药物：</strong>医生将根据患者病情开具处方药物。</p>\
     <h3>非药物治疗</h3>\
     <ul><li>生活方式调整：保持规律作息，适量运动</li>\
     <li>饮食指导：清淡饮食，避免刺激性食物</li>\
     <li>心理支持：保持良好心态，避免过度焦虑</li></ul>\
     <h3>复诊与随访</h3>\
     <ul><li>建议1-2周后复诊，评估治疗效果</li>\
     <li>根据病情变化及时调整治疗方案</li></ul>\
     <h3>预警信号</h3>\
     <ul><li>症状加重或出现新症状</li><li>药物不良反应</li></ul>"
        .to_string()
}

fn conservative_plan() -> TreatmentPlan {
    TreatmentPlan {
        name: "保守治疗方案".to_string(),
        score: 75,
        reason: "适合大多数患者，风险较低".to_string(),
        html: "<h3>治疗目标</h3>\
               <p>缓解症状，改善生活质量，避免过度医疗干预。</p>\
               <h3>药物治疗</h3>\
               <p><strong>治疗原则：</strong>优先选择相对安全的药物，从小剂量开始。</p>\
               <h3>非药物治疗</h3>\
               <ul><li>休息：保证充足睡眠，避免过度劳累</li>\
               <li>饮食：清淡饮食，多喝水</li></ul>\
               <h3>复诊与随访</h3>\
               <ul><li>1周后复诊评估症状改善情况</li>\
               <li>如症状无改善或加重，及时就医</li></ul>\
               <h3>预警信号</h3>\
               <ul><li>症状持续加重</li><li>出现新的严重症状</li></ul>"
            .to_string(),
        confidence: 0.75,
    }
}

fn aggressive_plan() -> TreatmentPlan {
    TreatmentPlan {
        name: "积极治疗方案".to_string(),
        score: 60,
        reason: "针对症状较重的患者，疗效更快但风险稍高".to_string(),
        html: "<h3>治疗目标</h3>\
               <p>快速缓解症状，尽快恢复正常生活和工作。</p>\
               <h3>药物治疗</h3>\
               <p><strong>治疗原则：</strong>采用更积极的药物治疗策略，争取快速见效。</p>\
               <h3>非药物治疗</h3>\
               <ul><li>休息：适当休息，避免剧烈活动</li>\
               <li>饮食：营养丰富，促进恢复</li></ul>\
               <h3>复诊与随访</h3>\
               <ul><li>3-5天后复诊，评估治疗效果</li></ul>\
               <h3>预警信号</h3>\
               <ul><li>治疗无效或症状加重</li><li>药物不良反应</li></ul>"
            .to_string(),
        confidence: 0.60,
    }
}

fn comprehensive_plan() -> TreatmentPlan {
    TreatmentPlan {
        name: "综合治疗方案".to_string(),
        score: 85,
        reason: "结合药物和非药物治疗，全面改善".to_string(),
        html: "<h3>治疗目标</h3>\
               <p>全面改善症状，提高整体健康水平，预防复发。</p>\
               <h3>药物治疗</h3>\
               <p><strong>治疗原则：</strong>药物治疗结合非药物治疗，形成综合治疗体系。</p>\
               <h3>非药物治疗</h3>\
               <ul><li>生活方式干预：改善作息、饮食和运动习惯</li>\
               <li>心理支持：必要时寻求心理咨询</li></ul>\
               <h3>复诊与随访</h3>\
               <ul><li>定期复诊，监测治疗效果</li>\
               <li>长期随访，预防疾病复发</li></ul>\
               <h3>预警信号</h3>\
               <ul><li>症状反复或加重</li><li>出现并发症迹象</li></ul>"
            .to_string(),
        confidence: 0.85,
    }
}

/// The three preset plans, in their fixed order.
pub fn default_plans(count: usize) -> Vec<TreatmentPlan> {
    let mut plans = vec![conservative_plan(), aggressive_plan(), comprehensive_plan()];
    plans.truncate(count);
    plans
}

/// Preset set used when the model reply had no usable JSON at all.
pub fn fallback_plan_set(count: usize) -> TreatmentPlanSet {
    let plans = default_plans(count);
    TreatmentPlanSet {
        total_plans: plans.len(),
        plans,
        model_used: "fallback".to_string(),
        note: Some(FALLBACK_PLAN_NOTE.to_string()),
    }
}

/// Parse a treatment-plan reply into a validated, ranked set.
pub fn parse_treatment_plans(
    reply: &str,
    num_plans: usize,
    model_used: &str,
) -> TreatmentPlanSet {
    let Some(map) = extract_json(reply) else {
        warn!("treatment-plan reply had no parseable JSON — using preset plans");
        return fallback_plan_set(num_plans);
    };

    let raw_plans = map
        .get("plans")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    let mut plans: Vec<TreatmentPlan> = raw_plans
        .iter()
        .take(num_plans)
        .filter_map(validate_plan)
        .collect();

    plans.sort_by(|a, b| b.score.cmp(&a.score));

    // Top up with presets after ranking — preset order is preserved, the
    // combined list is not re-sorted.
    if plans.len() < num_plans {
        plans.extend(default_plans(num_plans - plans.len()));
    }

    TreatmentPlanSet {
        total_plans: plans.len(),
        plans,
        model_used: model_used.to_string(),
        note: None,
    }
}
