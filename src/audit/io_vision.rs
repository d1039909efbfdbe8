// Extraction of a page through a multimodal model (Gemini generateContent API).

use std::env;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use snafu::prelude::*;

use crate::audit::*;

/// The only environment variable read by the extraction.
pub const API_KEY_VAR: &str = "API_KEY";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 120;

pub fn api_key_present() -> bool {
    env::var(API_KEY_VAR).map(|k| !k.is_empty()).unwrap_or(false)
}

fn instruction(candidates: &[String]) -> String {
    format!(
        "이 이미지는 제21대 대통령선거 개표상황표의 한 페이지입니다. \
         심사·집계부 표에서 다음 정보를 추출하세요.\n\
         - district: 투표구명\n\
         - votingType: 투표유형 (관내사전, 선거일, 관외사전, 재외투표, 거소/선상 중 하나)\n\
         - candidateVotes: 후보자별 분류된 투표지(classifiedVotes), 재확인대상 투표지(reconfirmVotes), 계(totalVotes)\n\
         - validVotes: 유효투표수, invalidVotes: 무효투표수, totalVotes: 투표수 계\n\
         대상 후보자: {}.\n\
         숫자는 쉼표 없이 정수로 쓰고, 읽을 수 없는 값은 0으로 쓰세요. \
         표에 없는 후보자는 candidateVotes에서 제외하세요.",
        candidates.join(", ")
    )
}

fn response_schema() -> JSValue {
    let int = json!({"type": "INTEGER"});
    json!({
        "type": "OBJECT",
        "properties": {
            "district": {"type": "STRING"},
            "votingType": {"type": "STRING"},
            "candidateVotes": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "candidateName": {"type": "STRING"},
                        "classifiedVotes": int,
                        "reconfirmVotes": int,
                        "totalVotes": int,
                    },
                    "required": ["candidateName", "classifiedVotes", "reconfirmVotes", "totalVotes"],
                },
            },
            "validVotes": int,
            "invalidVotes": int,
            "totalVotes": int,
        },
        "required": ["district", "votingType", "candidateVotes", "validVotes", "invalidVotes", "totalVotes"],
    })
}

fn request_body(image: &[u8], candidates: &[String]) -> JSValue {
    json!({
        "contents": [{
            "parts": [
                {"inline_data": {"mime_type": "image/png", "data": BASE64.encode(image)}},
                {"text": instruction(candidates)},
            ]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": response_schema(),
        }
    })
}

/// The text of the first candidate answer, all parts joined.
fn response_text(js: &JSValue) -> Option<String> {
    let parts = js["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Reads the record out of the model answer.
///
/// The answer must be a non-empty JSON object. Missing numbers are read as 0.
pub fn parse_page_record(text: &str) -> AuditResult<PageRecord> {
    let js: JSValue = serde_json::from_str(text.trim()).context(ParsingExtractionSnafu { text })?;
    match js.as_object() {
        Some(obj) if !obj.is_empty() => {}
        _ => return EmptyResponseSnafu {}.fail(),
    }
    let mut rec: PageRecord =
        serde_json::from_value(js).context(ParsingExtractionSnafu { text })?;
    // The page number belongs to the pipeline.
    rec.page_number = None;
    Ok(rec)
}

pub fn parse_generate_response(js: &JSValue) -> AuditResult<PageRecord> {
    let text = response_text(js).context(EmptyResponseSnafu {})?;
    debug!("parse_generate_response: {}", text);
    parse_page_record(&text)
}

pub struct VisionExtractor {
    client: reqwest::blocking::Client,
    url: String,
    candidates: Vec<String>,
}

impl VisionExtractor {
    pub fn new(settings: &ModelSettings, candidates: &[String]) -> AuditResult<VisionExtractor> {
        let timeout = settings.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS);
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .context(HttpRequestSnafu {})?;
        let endpoint = settings.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT);
        let model = settings.model.as_deref().unwrap_or(DEFAULT_MODEL);
        let url = format!(
            "{}/models/{}:generateContent",
            endpoint.trim_end_matches('/'),
            model
        );
        info!("VisionExtractor: using {}", url);
        Ok(VisionExtractor {
            client,
            url,
            candidates: candidates.to_vec(),
        })
    }
}

impl PageExtractor for VisionExtractor {
    type Error = AuditError;

    fn extract(&self, image: &[u8]) -> AuditResult<PageRecord> {
        // Read at every call, so that the key can be provided while running.
        let api_key = env::var(API_KEY_VAR)
            .ok()
            .filter(|k| !k.is_empty())
            .context(MissingApiKeySnafu { var: API_KEY_VAR })?;

        let resp = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", api_key)
            .json(&request_body(image, &self.candidates))
            .send()
            .context(HttpRequestSnafu {})?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return ApiStatusSnafu {
                status: status.as_u16(),
                body,
            }
            .fail();
        }
        let js: JSValue = resp.json().context(HttpRequestSnafu {})?;
        parse_generate_response(&js)
    }
}
