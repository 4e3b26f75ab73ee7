//! Medical knowledge / guideline search post-processing.
//!
//! Replies are flattened to plain text (tables and markdown stripped) and
//! any embedded links are filtered against a fixed whitelist of
//! authoritative medical domains — the model is never trusted to invent
//! citations. When no link survives, a curated default set is returned.

use chrono::Utc;
use regex::Regex;
use reqwest::Url;
use serde::Serialize;

/// Authoritative medical domains — the only link targets ever surfaced.
pub const AUTHORITATIVE_DOMAINS: [&str; 21] = [
    "pubmed.ncbi.nlm.nih.gov",
    "www.ncbi.nlm.nih.gov",
    "www.who.int",
    "www.cdc.gov",
    "www.nccn.org",
    "www.csco.org.cn",
    "www.cma.org.cn",
    "www.uptodate.com",
    "www.mayoclinic.org",
    "www.webmd.com",
    "www.nih.gov",
    "www.nejm.org",
    "www.thelancet.com",
    "www.bmj.com",
    "www.jamanetwork.com",
    "guideline.gov",
    "clinicaltrials.gov",
    "www.fda.gov",
    "www.ema.europa.eu",
    "www.cfda.gov.cn",
    "www.cde.org.cn",
];

/// One surfaced citation link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MedicalLink {
    pub url: String,
    pub title: String,
    #[serde(rename = "type")]
    pub link_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeSearchResult {
    pub title: String,
    pub content: String,
    pub source: String,
    pub confidence: String,
    pub citations: Vec<String>,
    pub links: Vec<MedicalLink>,
    pub model_used: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GuidelineResult {
    pub title: String,
    pub content: String,
    pub category: String,
    pub authority: String,
    pub version: String,
    pub recommendations: Vec<String>,
    pub links: Vec<MedicalLink>,
    pub model_used: String,
}

/// Flatten a markdown-decorated reply to plain text: tables, headers,
/// links (text kept), emphasis, blockquotes, and code fences removed;
/// unordered bullets become `• `; blank runs collapse to one.
pub fn clean_medical_content(content: &str) -> String {
    if content.is_empty() {
        return String::new();
    }

    let table_row = Regex::new(r"\|.*\|").expect("static regex");
    let header = Regex::new(r"(?m)^#{1,6}\s+").expect("static regex");
    let link = Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("static regex");
    let bold = Regex::new(r"\*\*([^*]+)\*\*").expect("static regex");
    let italic = Regex::new(r"\*([^*]+)\*").expect("static regex");
    let bullet = Regex::new(r"(?m)^\s*[-*+]\s+").expect("static regex");
    let ordered = Regex::new(r"(?m)^\s*\d+\.\s+").expect("static regex");
    let blanks = Regex::new(r"\n{3,}").expect("static regex");
    let quote = Regex::new(r"(?m)^>\s*").expect("static regex");
    let fence_open = Regex::new(r"```[^\n]*\n").expect("static regex");

    let t = table_row.replace_all(content, "");
    let t = header.replace_all(&t, "");
    let t = link.replace_all(&t, "$1");
    let t = bold.replace_all(&t, "$1");
    let t = italic.replace_all(&t, "$1");
    let t = bullet.replace_all(&t, "• ");
    let t = ordered.replace_all(&t, "");
    let t = blanks.replace_all(&t, "\n\n");
    let t = quote.replace_all(&t, "");
    let t = fence_open.replace_all(&t, "");
    let t = t.replace("```", "");

    t.trim().to_string()
}

fn is_authoritative(url: &Url) -> bool {
    let Some(domain) = url.domain() else {
        return false;
    };
    let domain = domain.to_lowercase();
    AUTHORITATIVE_DOMAINS
        .iter()
        .any(|auth| domain == *auth || domain.ends_with(&format!(".{auth}")))
}

/// Basic plausibility: http(s), a real host, shallow path, no binary
/// download extensions (truncated model output often ends mid-path).
fn is_plausible(url: &Url) -> bool {
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    match url.domain() {
        Some(d) if d.len() >= 3 => {}
        _ => return false,
    }

    let path = url.path();
    if path.is_empty() || path == "/" {
        return true;
    }
    let depth = path.split('/').filter(|p| !p.is_empty()).count();
    if depth > 4 {
        return false;
    }
    const SUSPICIOUS: [&str; 6] = [".exe", ".zip", ".rar", ".pdf", ".doc", ".docx"];
    let lowered = path.to_lowercase();
    !SUSPICIOUS.iter().any(|ext| lowered.contains(ext))
}

fn link_info(url: &Url) -> MedicalLink {
    let domain = url.domain().unwrap_or_default().to_lowercase();

    let (link_type, title) = if domain.contains("pubmed") {
        ("database", "PubMed医学文献数据库".to_string())
    } else if domain.contains("who.int") {
        ("guideline", "WHO医学指南".to_string())
    } else if domain.contains("cdc.gov") {
        ("guideline", "CDC疾病控制指南".to_string())
    } else if domain.contains("nccn.org") {
        ("guideline", "NCCN临床实践指南".to_string())
    } else if domain.contains("csco.org.cn") {
        ("guideline", "中国临床肿瘤学会指南".to_string())
    } else if domain.contains("cma.org.cn") {
        ("guideline", "中华医学会临床指南".to_string())
    } else if domain.contains("uptodate.com") {
        ("clinical", "UpToDate临床决策支持".to_string())
    } else if domain.contains("clinicaltrials.gov") {
        ("research", "ClinicalTrials临床试验数据库".to_string())
    } else if domain.contains("fda.gov") {
        ("guideline", "FDA药品指南".to_string())
    } else {
        let from_path: Vec<&str> = url.path().split('/').filter(|p| !p.is_empty()).collect();
        let title = if from_path.is_empty() {
            domain.clone()
        } else {
            from_path[..from_path.len().min(2)].join(" ").replace('-', " ")
        };
        ("reference", title)
    };

    // Bound the title for display
    let title = if title.chars().count() > 50 {
        let cut: String = title.chars().take(50).collect();
        format!("{cut}...")
    } else {
        title
    };

    MedicalLink {
        url: url.to_string(),
        title,
        link_type: link_type.to_string(),
    }
}

/// Extract whitelisted links from reply text; curated defaults when none
/// survive the filters.
pub fn extract_authoritative_links(content: &str) -> Vec<MedicalLink> {
    let url_re = Regex::new(r#"https?://[^\s<>"{}|\\^`\[\]]+"#).expect("static regex");

    let mut links = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for m in url_re.find_iter(content) {
        let raw = m.as_str().trim_end_matches(['.', '，', '。', ')', '）']);
        if raw.len() < 10 || !seen.insert(raw.to_string()) {
            continue;
        }
        let Ok(url) = Url::parse(raw) else { continue };
        if is_authoritative(&url) && is_plausible(&url) {
            links.push(link_info(&url));
        }
    }

    if links.is_empty() {
        default_authoritative_links()
    } else {
        links
    }
}

/// The curated always-valid citation set.
pub fn default_authoritative_links() -> Vec<MedicalLink> {
    vec![
        MedicalLink {
            url: "https://pubmed.ncbi.nlm.nih.gov/".to_string(),
            title: "PubMed医学文献数据库".to_string(),
            link_type: "database".to_string(),
        },
        MedicalLink {
            url: "https://www.who.int/health-topics".to_string(),
            title: "WHO卫生主题".to_string(),
            link_type: "guideline".to_string(),
        },
        MedicalLink {
            url: "https://www.cdc.gov/".to_string(),
            title: "美国疾病控制中心".to_string(),
            link_type: "guideline".to_string(),
        },
        MedicalLink {
            url: "https://www.nccn.org/".to_string(),
            title: "NCCN临床实践指南".to_string(),
            link_type: "guideline".to_string(),
        },
        MedicalLink {
            url: "https://www.cma.org.cn/".to_string(),
            title: "中华医学会".to_string(),
            link_type: "guideline".to_string(),
        },
    ]
}

/// Assemble the knowledge-search result from a cleaned reply.
pub fn build_knowledge_result(query: &str, reply: &str, model_used: &str) -> KnowledgeSearchResult {
    let content = clean_medical_content(reply);
    let links = extract_authoritative_links(&content);
    KnowledgeSearchResult {
        title: format!("医学文献查询：{query}"),
        content,
        source: "医疗AI知识库".to_string(),
        confidence: "高".to_string(),
        citations: vec![
            "基于最新医学证据和临床指南".to_string(),
            "参考国际权威医学文献".to_string(),
            format!("数据更新时间：{}", Utc::now().format("%Y-%m-%d")),
        ],
        links,
        model_used: model_used.to_string(),
    }
}

/// Assemble the guideline-search result from a cleaned reply.
pub fn build_guideline_result(
    query: &str,
    category: &str,
    reply: &str,
    model_used: &str,
) -> GuidelineResult {
    let content = clean_medical_content(reply);
    let links = extract_authoritative_links(&content);
    GuidelineResult {
        title: format!("医学指南查询：{query}"),
        content,
        category: category.to_string(),
        authority: "医疗AI指南库".to_string(),
        version: "最新版".to_string(),
        recommendations: vec![
            "基于最新医学证据".to_string(),
            "参考权威临床指南".to_string(),
            format!("数据更新时间：{}", Utc::now().format("%Y-%m-%d")),
        ],
        links,
        model_used: model_used.to_string(),
    }
}
