//! Client for the spreadsheet web-app script that holds the student roster
//! and receives analysis rows.

use super::{PersistencePort, StudentDirectory};
use crate::error::PortError;
use crate::model::{ClientConfig, CompositeRecord, EncodedMedia, PersistenceOutcome, StudentRecord};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Deserializer};

type Result<T> = std::result::Result<T, PortError>;

const STATUS_SUCCESS: &str = "success";

#[derive(Debug, Deserialize)]
struct LookupResponse {
    status: String,
    #[serde(default)]
    student: Option<RawStudent>,
}

/// Sheet cells arrive as strings or numbers depending on column formatting.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStudent {
    #[serde(deserialize_with = "cell_text")]
    student_id: String,
    #[serde(deserialize_with = "cell_text")]
    full_name: String,
    #[serde(deserialize_with = "cell_text")]
    grade_class: String,
    #[serde(deserialize_with = "cell_text")]
    number: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveResponse {
    status: String,
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn cell_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected text or number, got {other}"
        ))),
    }
}

pub struct SheetClient {
    client: Client,
    script_url: String,
}

impl SheetClient {
    pub fn new(cfg: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(cfg.request_timeout)
            .user_agent(cfg.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            script_url: cfg.script_url.clone(),
        })
    }

    async fn read_body(response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(PortError::Status {
                status: status.as_u16(),
                body: truncate(&body, 200),
            });
        }
        Ok(body)
    }
}

#[async_trait::async_trait]
impl StudentDirectory for SheetClient {
    async fn lookup(&self, identifier: &str) -> Result<Option<StudentRecord>> {
        tracing::info!(student_id = identifier, "looking up student");
        let response = self
            .client
            .get(&self.script_url)
            .query(&[("action", "getStudent"), ("studentId", identifier)])
            .send()
            .await?;
        let body = Self::read_body(response).await?;
        parse_lookup(&body)
    }
}

#[async_trait::async_trait]
impl PersistencePort for SheetClient {
    async fn persist(
        &self,
        record: &CompositeRecord,
        video: Option<&EncodedMedia>,
    ) -> Result<PersistenceOutcome> {
        let body = serde_json::to_string(&save_body(record, video))?;
        tracing::info!(
            student_id = %record.student.student_id,
            with_video = video.is_some(),
            payload_bytes = body.len(),
            "saving analysis row"
        );
        // The script reads the raw post body; text/plain keeps it untouched.
        let response = self
            .client
            .post(&self.script_url)
            .header(CONTENT_TYPE, "text/plain;charset=utf-8")
            .body(body)
            .send()
            .await?;
        let body = Self::read_body(response).await?;
        parse_save(&body)
    }
}

pub(crate) fn save_body(record: &CompositeRecord, video: Option<&EncodedMedia>) -> serde_json::Value {
    let video_file = video.map(|v| {
        serde_json::json!({
            "base64": v.base64,
            "mimeType": v.mime_type,
        })
    });
    serde_json::json!({
        "action": "saveAnalysis",
        "data": record,
        "videoFile": video_file,
    })
}

pub(crate) fn parse_lookup(body: &str) -> Result<Option<StudentRecord>> {
    let parsed: LookupResponse = serde_json::from_str(body)?;
    if parsed.status != STATUS_SUCCESS {
        return Ok(None);
    }
    let raw = parsed
        .student
        .ok_or_else(|| PortError::Malformed("success response without student".into()))?;
    Ok(Some(StudentRecord {
        student_id: raw.student_id,
        full_name: raw.full_name,
        grade_class: raw.grade_class,
        number: raw.number,
    }))
}

pub(crate) fn parse_save(body: &str) -> Result<PersistenceOutcome> {
    let parsed: SaveResponse = serde_json::from_str(body)?;
    let success = parsed.status == STATUS_SUCCESS;
    Ok(PersistenceOutcome {
        success,
        stored_video_reference: parsed.video_url.filter(|u| !u.trim().is_empty()),
        detail: if success {
            None
        } else {
            Some(parsed.message.unwrap_or(parsed.status))
        },
    })
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_chars).collect();
    format!("{cut}…")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ScoreRecord, SubScores, VIDEO_LINK_PLACEHOLDER};

    #[test]
    fn lookup_success_accepts_numeric_cells() {
        let body = r#"{"status":"success","student":{"studentId":12345,"fullName":"Somchai Jaidee","gradeClass":"M.4/2","number":7}}"#;
        let s = parse_lookup(body).unwrap().unwrap();
        assert_eq!(s.student_id, "12345");
        assert_eq!(s.full_name, "Somchai Jaidee");
        assert_eq!(s.number, "7");
    }

    #[test]
    fn lookup_not_found_is_none() {
        let body = r#"{"status":"error","message":"Student not found"}"#;
        assert!(parse_lookup(body).unwrap().is_none());
    }

    #[test]
    fn lookup_garbage_is_error_not_missing() {
        assert!(matches!(
            parse_lookup("<html>Script error</html>"),
            Err(PortError::Malformed(_))
        ));
        assert!(matches!(
            parse_lookup(r#"{"status":"success"}"#),
            Err(PortError::Malformed(_))
        ));
    }

    #[test]
    fn save_response_mapping() {
        let ok = parse_save(r#"{"status":"success","videoUrl":"https://example/video123"}"#).unwrap();
        assert!(ok.success);
        assert_eq!(
            ok.stored_video_reference.as_deref(),
            Some("https://example/video123")
        );
        assert!(ok.detail.is_none());

        let failed = parse_save(r#"{"status":"error","message":"quota"}"#).unwrap();
        assert!(!failed.success);
        assert_eq!(failed.detail.as_deref(), Some("quota"));

        let blank_url = parse_save(r#"{"status":"success","videoUrl":""}"#).unwrap();
        assert!(blank_url.stored_video_reference.is_none());
    }

    #[test]
    fn save_body_carries_optional_video() {
        let record = CompositeRecord {
            student: StudentRecord {
                student_id: "1".into(),
                full_name: "A".into(),
                grade_class: "M.1/1".into(),
                number: "1".into(),
            },
            scores: ScoreRecord::new(
                SubScores {
                    posture: 5.0,
                    technique: 5.0,
                    agility: 5.0,
                    consistency: 5.0,
                    efficiency: 5.0,
                },
                String::new(),
                String::new(),
                String::new(),
            )
            .unwrap(),
            sport: "ฟุตซอล".into(),
            test_type: "ก่อนเรียน".into(),
            timestamp: "1/1/2568 08:00:00".into(),
            video_link: VIDEO_LINK_PLACEHOLDER.into(),
        };

        let without = save_body(&record, None);
        assert_eq!(without["action"], "saveAnalysis");
        assert!(without["videoFile"].is_null());
        assert_eq!(without["data"]["fullName"], "A");

        let video = EncodedMedia {
            base64: "AAAA".into(),
            mime_type: "video/mp4".into(),
            byte_len: 3,
        };
        let with = save_body(&record, Some(&video));
        assert_eq!(with["videoFile"]["base64"], "AAAA");
        assert_eq!(with["videoFile"]["mimeType"], "video/mp4");
    }
}
