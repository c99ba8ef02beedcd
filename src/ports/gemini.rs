//! Scoring adapter backed by the Gemini `generateContent` endpoint.

use super::{ScoringPort, ScoringRequest};
use crate::error::PortError;
use crate::metrics;
use crate::model::{ClientConfig, ScoreRecord, SessionConfig, SubScores};
use rand::seq::SliceRandom;
use reqwest::Client;
use serde::Deserialize;

type Result<T> = std::result::Result<T, PortError>;

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Shape the model is asked to return. Every field is required.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScores {
    posture: f64,
    technique: f64,
    agility: f64,
    consistency: f64,
    efficiency: f64,
    total_score: f64,
    average_score: f64,
    strengths: String,
    weaknesses: String,
    suggestions: String,
}

pub struct GeminiScorer {
    client: Client,
    base_url: String,
    model: String,
    api_keys: Vec<String>,
}

impl GeminiScorer {
    pub fn new(cfg: &ClientConfig) -> Result<Self> {
        if cfg.gemini_api_keys.is_empty() {
            return Err(PortError::Rejected("no Gemini API key configured".into()));
        }
        let client = Client::builder()
            .timeout(cfg.request_timeout)
            .user_agent(cfg.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.gemini_base_url.trim_end_matches('/').to_string(),
            model: cfg.gemini_model.clone(),
            api_keys: cfg.gemini_api_keys.clone(),
        })
    }

    /// Spread load across the configured keys.
    fn pick_key(&self) -> &str {
        self.api_keys
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or_default()
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait::async_trait]
impl ScoringPort for GeminiScorer {
    async fn score(&self, request: ScoringRequest<'_>) -> Result<ScoreRecord> {
        let body = build_request(&request);
        tracing::info!(
            model = %self.model,
            video_bytes = request.video.byte_len,
            mime = %request.video.mime_type,
            sport = request.config.sport.display_name(),
            "sending video for scoring"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, self.pick_key())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PortError::Status {
                status: status.as_u16(),
                body: error_text.chars().take(300).collect(),
            });
        }

        let text = response.text().await?;
        let record = parse_response(&text)?;
        tracing::info!(
            total = record.total_score,
            average = record.average_score,
            "scoring complete"
        );
        Ok(record)
    }
}

pub(crate) fn build_prompt(config: SessionConfig, student_name: &str) -> String {
    format!(
        "คุณคือผู้เชี่ยวชาญด้านกีฬาและครูพละระดับมัธยมศึกษา\n\
         วิเคราะห์วิดีโอการฝึกทักษะกีฬา: {sport} ({phase}) ของนักเรียนชื่อ {student_name}\n\
         ประเมิน 5 ด้าน (คะแนนเต็มด้านละ 10 คะแนน):\n\
         1. ท่าทาง (Posture)\n\
         2. เทคนิค (Technique)\n\
         3. ความคล่องแคล่ว (Agility)\n\
         4. ความสม่ำเสมอต่อเนื่อง (Consistency)\n\
         5. ประสิทธิภาพ (Efficiency)\n\n\
         ให้คะแนนรวมเต็ม 50 และคำนวณค่าเฉลี่ย\n\
         กรุณาตอบเป็น JSON ภาษาไทยที่มีโครงสร้างตามที่กำหนดไว้เท่านั้น",
        sport = config.sport.thai_label(),
        phase = config.test_phase.thai_label(),
    )
}

fn response_schema() -> serde_json::Value {
    let number = |description: &str| serde_json::json!({ "type": "NUMBER", "description": description });
    let text = |description: &str| serde_json::json!({ "type": "STRING", "description": description });
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "posture": number("คะแนนท่าทาง"),
            "technique": number("คะแนนเทคนิค"),
            "agility": number("คะแนนความคล่องแคล่ว"),
            "consistency": number("คะแนนความสม่ำเสมอ"),
            "efficiency": number("คะแนนประสิทธิภาพ"),
            "totalScore": number("คะแนนรวม"),
            "averageScore": number("คะแนนเฉลี่ย"),
            "strengths": text("จุดเด่น"),
            "weaknesses": text("จุดควรปรับปรุง"),
            "suggestions": text("คำแนะนำเพิ่มเติม"),
        },
        "required": [
            "posture", "technique", "agility", "consistency", "efficiency",
            "totalScore", "averageScore", "strengths", "weaknesses", "suggestions",
        ],
    })
}

pub(crate) fn build_request(request: &ScoringRequest<'_>) -> serde_json::Value {
    serde_json::json!({
        "contents": [{
            "parts": [
                {
                    "inlineData": {
                        "mimeType": request.video.mime_type,
                        "data": request.video.base64,
                    }
                },
                { "text": build_prompt(request.config, request.student_name) },
            ]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": response_schema(),
        },
    })
}

/// Extract and validate the score sheet from a raw `generateContent` body.
pub(crate) fn parse_response(body: &str) -> Result<ScoreRecord> {
    let parsed: GenerateResponse = serde_json::from_str(body)?;

    let Some(candidate) = parsed.candidates.into_iter().next() else {
        let reason = parsed
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates".into());
        return Err(PortError::Rejected(reason));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "empty".into());
        return Err(PortError::Malformed(format!(
            "model returned no text (finish reason: {reason})"
        )));
    }

    let raw: RawScores = serde_json::from_str(strip_code_fence(&text))
        .map_err(|e| PortError::Malformed(format!("score JSON: {e}")))?;

    let record = ScoreRecord::new(
        SubScores {
            posture: raw.posture,
            technique: raw.technique,
            agility: raw.agility,
            consistency: raw.consistency,
            efficiency: raw.efficiency,
        },
        raw.strengths,
        raw.weaknesses,
        raw.suggestions,
    )
    .map_err(PortError::Malformed)?;

    if !metrics::agrees(raw.total_score, record.total_score)
        || !metrics::agrees(raw.average_score, record.average_score)
    {
        tracing::warn!(
            reported_total = raw.total_score,
            reported_average = raw.average_score,
            total = record.total_score,
            average = record.average_score,
            "model totals disagree with sub-scores; using computed values"
        );
    }

    Ok(record)
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => trimmed,
    }
}
