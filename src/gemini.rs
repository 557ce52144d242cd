use crate::error::AppError;
use crate::outreach::{ContactDetails, FormalEmail, OutreachResult, Source};
use crate::prompts;
use crate::settings::AppSettings;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// The remote collaborator the controller talks to.
#[async_trait]
pub trait IntelligenceService: Send + Sync {
    async fn generate_outreach(&self, query: &str) -> Result<OutreachResult, AppError>;
    async fn transcribe_audio(&self, audio: &[u8], mime_type: &str) -> Result<String, AppError>;
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
    // Thinking models interleave thought summaries with the answer
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
struct WebChunk {
    uri: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// The generation payload as declared in the response schema.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutreachPayload {
    research_summary: String,
    #[serde(default)]
    contact_details: Option<ContactDetails>,
    formal_email: FormalEmail,
    social_message: String,
    elevator_pitch: String,
}

fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "researchSummary": {
                "type": "STRING",
                "description": "A comprehensive summary of findings about the person/topic from various sources, emphasizing recent hooks."
            },
            "contactDetails": {
                "type": "OBJECT",
                "description": "Publicly listed professional contact points, only when found in sources.",
                "properties": {
                    "email": { "type": "STRING" },
                    "linkedIn": { "type": "STRING" },
                    "twitter": { "type": "STRING" }
                }
            },
            "formalEmail": {
                "type": "OBJECT",
                "properties": {
                    "subject": { "type": "STRING" },
                    "body": { "type": "STRING", "description": "Plain text, no markup." }
                },
                "required": ["subject", "body"]
            },
            "socialMessage": { "type": "STRING" },
            "elevatorPitch": { "type": "STRING" }
        },
        "required": ["researchSummary", "formalEmail", "socialMessage", "elevatorPitch"]
    })
}

fn outreach_request(query: &str, date_context: &str) -> GeminiRequest {
    GeminiRequest {
        system_instruction: Some(Content {
            role: None,
            parts: vec![Part::Text {
                text: prompts::system_instruction(),
            }],
        }),
        contents: vec![Content {
            role: Some("user"),
            parts: vec![Part::Text {
                text: prompts::research_prompt(query, date_context),
            }],
        }],
        tools: vec![Tool {
            google_search: GoogleSearch {},
        }],
        generation_config: Some(GenerationConfig {
            temperature: None,
            max_output_tokens: None,
            response_mime_type: Some("application/json"),
            response_schema: Some(response_schema()),
        }),
    }
}

fn transcription_request(audio: &[u8], mime_type: &str) -> GeminiRequest {
    GeminiRequest {
        system_instruction: None,
        contents: vec![Content {
            role: Some("user"),
            parts: vec![
                Part::Text {
                    text: prompts::TRANSCRIPTION_PROMPT.to_string(),
                },
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type: mime_type.to_string(),
                        data: general_purpose::STANDARD.encode(audio),
                    },
                },
            ],
        }],
        tools: Vec::new(),
        generation_config: Some(GenerationConfig {
            temperature: Some(0.0),
            max_output_tokens: Some(8192),
            response_mime_type: None,
            response_schema: None,
        }),
    }
}

/// Joined answer text of the first candidate, `None` when it carries no text.
fn first_candidate_text(response: &GeminiResponse) -> Result<Option<String>, AppError> {
    if let Some(block_reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.as_ref())
    {
        return Err(AppError::remote(format!(
            "Gemini API blocked the request: {}",
            block_reason
        )));
    }

    let Some(candidate) = response.candidates.as_ref().and_then(|c| c.first()) else {
        return Ok(None);
    };

    if let Some(reason) = &candidate.finish_reason {
        debug!("Gemini finish reason: {}", reason);
    }

    let text: String = candidate
        .content
        .as_ref()
        .map(|content| {
            content
                .parts
                .iter()
                .filter(|part| !part.thought)
                .filter_map(|part| part.text.as_deref())
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(text))
    }
}

/// Grounded answers occasionally arrive wrapped in a Markdown fence.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn require(field: &str, value: String) -> Result<String, AppError> {
    if value.trim().is_empty() {
        Err(AppError::remote(format!(
            "The intelligence response is missing the required field '{}'",
            field
        )))
    } else {
        Ok(value)
    }
}

fn parse_outreach_response(response: GeminiResponse) -> Result<OutreachResult, AppError> {
    let text = first_candidate_text(&response)?
        .ok_or_else(|| AppError::remote("The intelligence service returned an empty response"))?;

    let payload: OutreachPayload = serde_json::from_str(strip_code_fence(&text)).map_err(|e| {
        warn!("Generation response did not match the declared schema: {}", e);
        AppError::remote(format!(
            "The intelligence response did not match the expected format: {}",
            e
        ))
    })?;

    let contact_details = payload
        .contact_details
        .map(|details| ContactDetails {
            email: non_blank(details.email),
            linked_in: non_blank(details.linked_in),
            twitter: non_blank(details.twitter),
        })
        .filter(|details| !details.is_empty());

    let sources = response
        .candidates
        .into_iter()
        .flatten()
        .next()
        .and_then(|candidate| candidate.grounding_metadata)
        .map(|metadata| {
            metadata
                .grounding_chunks
                .into_iter()
                .filter_map(|chunk| chunk.web)
                .filter_map(|web| {
                    web.uri.map(|uri| Source {
                        uri,
                        title: web.title.unwrap_or_default(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(OutreachResult {
        research_summary: require("researchSummary", payload.research_summary)?,
        contact_details,
        formal_email: FormalEmail {
            subject: require("formalEmail.subject", payload.formal_email.subject)?,
            body: require("formalEmail.body", payload.formal_email.body)?,
        },
        social_message: require("socialMessage", payload.social_message)?,
        elevator_pitch: require("elevatorPitch", payload.elevator_pitch)?,
        sources,
    })
}

/// Prefer the message from Google's error envelope over the raw body.
fn upstream_error_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match (envelope.error.message, envelope.error.status) {
            (Some(message), _) if !message.trim().is_empty() => message,
            (_, Some(code)) => format!("Gemini API request failed ({}): {}", status, code),
            _ => format!("Gemini API request failed with status {}", status),
        },
        Err(_) if body.trim().is_empty() => {
            format!("Gemini API request failed with status {}", status)
        }
        Err(_) => format!("Gemini API request failed with status {}: {}", status, body.trim()),
    }
}

pub struct GeminiClient {
    http: reqwest::Client,
    settings: AppSettings,
}

impl GeminiClient {
    pub fn new(settings: AppSettings) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(settings.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| AppError::remote(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http, settings })
    }

    async fn generate_content(
        &self,
        model: &str,
        request: &GeminiRequest,
    ) -> Result<GeminiResponse, AppError> {
        let api_key = self.settings.effective_api_key().ok_or_else(|| {
            AppError::remote(
                "Gemini API key is not configured. Set GEMINI_API_KEY or add a key in settings.",
            )
        })?;

        let url = format!(
            "{}/models/{}:generateContent",
            self.settings.effective_base_url(),
            model
        );
        debug!("Sending Gemini request to: {}", url);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = upstream_error_message(status, &error_text);
            warn!("Gemini request failed ({}): {}", status, message);
            return Err(AppError::RemoteService(message));
        }

        Ok(response.json::<GeminiResponse>().await?)
    }
}

#[async_trait]
impl IntelligenceService for GeminiClient {
    async fn generate_outreach(&self, query: &str) -> Result<OutreachResult, AppError> {
        debug!(
            "Generating outreach with {} (query: {} chars)",
            self.settings.generation_model,
            query.len()
        );
        let request = outreach_request(query, &self.settings.date_context);
        let response = self
            .generate_content(&self.settings.generation_model, &request)
            .await?;
        let result = parse_outreach_response(response)?;
        debug!(
            "Outreach generated with {} grounding sources",
            result.sources.len()
        );
        Ok(result)
    }

    async fn transcribe_audio(&self, audio: &[u8], mime_type: &str) -> Result<String, AppError> {
        if audio.is_empty() {
            debug!("Skipping transcription of empty audio");
            return Ok(String::new());
        }

        debug!(
            "Transcribing {} bytes of {} with {}",
            audio.len(),
            mime_type,
            self.settings.transcription_model
        );
        let request = transcription_request(audio, mime_type);
        let response = self
            .generate_content(&self.settings.transcription_model, &request)
            .await?;

        Ok(first_candidate_text(&response)?
            .map(|text| text.trim().to_string())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::thread::JoinHandle;

    struct Captured {
        url: String,
        api_key: Option<String>,
        body: Value,
    }

    /// Serve exactly one canned response and hand back what the client sent.
    fn serve_once(status: u16, body: &'static str) -> (String, JoinHandle<Captured>) {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let handle = std::thread::spawn(move || {
            let mut request = server.recv().unwrap();
            let mut raw = String::new();
            request.as_reader().read_to_string(&mut raw).unwrap();
            let api_key = request
                .headers()
                .iter()
                .find(|h| h.field.equiv("x-goog-api-key"))
                .map(|h| h.value.as_str().to_string());
            let captured = Captured {
                url: request.url().to_string(),
                api_key,
                body: serde_json::from_str(&raw).unwrap(),
            };
            let header = "Content-Type: application/json"
                .parse::<tiny_http::Header>()
                .unwrap();
            request
                .respond(
                    tiny_http::Response::from_string(body)
                        .with_status_code(status)
                        .with_header(header),
                )
                .unwrap();
            captured
        });
        (format!("http://{}", addr), handle)
    }

    fn client_for(base_url: String) -> GeminiClient {
        GeminiClient::new(AppSettings {
            api_key: Some("test-key".to_string()),
            api_base_url: base_url,
            request_timeout_secs: 10,
            ..Default::default()
        })
        .unwrap()
    }

    fn response_from(json: &str) -> GeminiResponse {
        serde_json::from_str(json).unwrap()
    }

    const GROUNDED_RESPONSE: &str = r#"{
        "candidates": [{
            "content": {"parts": [{"text": "{\"researchSummary\": \"Recent **summit** remarks.\", \"contactDetails\": {\"email\": \"\", \"linkedIn\": \"https://linkedin.com/in/target\"}, \"formalEmail\": {\"subject\": \"Subject: Partnership\", \"body\": \"Dear Sir,\"}, \"socialMessage\": \"Hello!\", \"elevatorPitch\": \"80% back.\"}"}]},
            "finishReason": "STOP",
            "groundingMetadata": {"groundingChunks": [
                {"web": {"uri": "https://a.example/1", "title": "First"}},
                {"retrievedContext": {"uri": "ignored"}},
                {"web": {"uri": "https://b.example/2"}}
            ]}
        }]
    }"#;

    #[test]
    fn outreach_request_declares_schema_and_search_tool() {
        let request = serde_json::to_value(outreach_request("MeitY", "February 21, 2026")).unwrap();
        assert_eq!(request["tools"][0]["google_search"], json!({}));
        assert_eq!(
            request["generation_config"]["response_mime_type"],
            "application/json"
        );
        let required = &request["generation_config"]["response_schema"]["required"];
        assert_eq!(
            required,
            &json!(["researchSummary", "formalEmail", "socialMessage", "elevatorPitch"])
        );
        let system = request["system_instruction"]["parts"][0]["text"]
            .as_str()
            .unwrap();
        assert!(system.contains("googleSearch"));
        let prompt = request["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.contains("\"MeitY\""));
    }

    #[test]
    fn transcription_request_inlines_base64_audio() {
        let request = serde_json::to_value(transcription_request(b"abc", "audio/wav")).unwrap();
        let parts = &request["contents"][0]["parts"];
        assert_eq!(parts[1]["inline_data"]["mime_type"], "audio/wav");
        assert_eq!(parts[1]["inline_data"]["data"], "YWJj");
        assert!(request.get("tools").is_none());
    }

    #[test]
    fn parse_keeps_grounding_order_and_drops_blank_contacts() {
        let result = parse_outreach_response(response_from(GROUNDED_RESPONSE)).unwrap();
        assert_eq!(result.formal_email.subject, "Subject: Partnership");
        assert_eq!(
            result.sources,
            vec![
                Source {
                    uri: "https://a.example/1".to_string(),
                    title: "First".to_string()
                },
                Source {
                    uri: "https://b.example/2".to_string(),
                    title: String::new()
                },
            ]
        );
        let contacts = result.contact_details.unwrap();
        assert_eq!(contacts.email, None);
        assert_eq!(
            contacts.linked_in.as_deref(),
            Some("https://linkedin.com/in/target")
        );
    }

    #[test]
    fn parse_rejects_missing_required_field() {
        let response = response_from(
            r#"{"candidates": [{"content": {"parts": [{"text": "{\"researchSummary\": \"x\", \"formalEmail\": {\"subject\": \"s\", \"body\": \"b\"}, \"socialMessage\": \"m\"}"}]}}]}"#,
        );
        let err = parse_outreach_response(response).unwrap_err();
        assert!(matches!(err, AppError::RemoteService(ref m) if m.contains("elevatorPitch")));
    }

    #[test]
    fn parse_rejects_blank_required_field() {
        let response = response_from(
            r#"{"candidates": [{"content": {"parts": [{"text": "{\"researchSummary\": \" \", \"formalEmail\": {\"subject\": \"s\", \"body\": \"b\"}, \"socialMessage\": \"m\", \"elevatorPitch\": \"p\"}"}]}}]}"#,
        );
        let err = parse_outreach_response(response).unwrap_err();
        assert_eq!(
            err,
            AppError::remote("The intelligence response is missing the required field 'researchSummary'")
        );
    }

    #[test]
    fn parse_accepts_fenced_json_and_skips_thoughts() {
        let response = response_from(
            r#"{"candidates": [{"content": {"parts": [
                {"text": "planning the search", "thought": true},
                {"text": "```json\n{\"researchSummary\": \"r\", \"formalEmail\": {\"subject\": \"s\", \"body\": \"b\"}, \"socialMessage\": \"m\", \"elevatorPitch\": \"p\"}\n```"}
            ]}}]}"#,
        );
        let result = parse_outreach_response(response).unwrap();
        assert_eq!(result.research_summary, "r");
        assert!(result.sources.is_empty());
        assert!(result.contact_details.is_none());
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let response = response_from(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#);
        let err = first_candidate_text(&response).unwrap_err();
        assert_eq!(err, AppError::remote("Gemini API blocked the request: SAFETY"));
    }

    #[test]
    fn upstream_error_message_prefers_envelope() {
        let status = reqwest::StatusCode::BAD_REQUEST;
        let body = r#"{"error": {"code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT"}}"#;
        assert_eq!(upstream_error_message(status, body), "API key not valid.");
        assert_eq!(
            upstream_error_message(reqwest::StatusCode::BAD_GATEWAY, ""),
            "Gemini API request failed with status 502 Bad Gateway"
        );
    }

    #[tokio::test]
    async fn generate_outreach_round_trip() {
        let (base_url, server) = serve_once(200, GROUNDED_RESPONSE);
        let client = client_for(base_url);

        let result = client.generate_outreach("NITI Aayog AI Policy").await.unwrap();
        let captured = server.join().unwrap();

        assert_eq!(captured.url, "/models/gemini-3-pro-preview:generateContent");
        assert!(captured.api_key.is_some());
        assert!(captured.body["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("NITI Aayog AI Policy"));
        assert_eq!(result.sources.len(), 2);
        assert_eq!(result.social_message, "Hello!");
    }

    #[tokio::test]
    async fn generate_outreach_surfaces_upstream_message() {
        let (base_url, server) = serve_once(
            429,
            r#"{"error": {"code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED"}}"#,
        );
        let client = client_for(base_url);

        let err = client.generate_outreach("MeitY").await.unwrap_err();
        server.join().unwrap();
        assert_eq!(err, AppError::remote("Resource has been exhausted"));
    }

    #[tokio::test]
    async fn transcribe_returns_trimmed_text() {
        let (base_url, server) = serve_once(
            200,
            r#"{"candidates": [{"content": {"parts": [{"text": "  MeitY IndiaAI Mission \n"}]}}]}"#,
        );
        let client = client_for(base_url);

        let text = client.transcribe_audio(b"RIFF", "audio/wav").await.unwrap();
        let captured = server.join().unwrap();
        assert_eq!(text, "MeitY IndiaAI Mission");
        assert_eq!(
            captured.url,
            "/models/gemini-3-flash-preview:generateContent"
        );
    }

    #[tokio::test]
    async fn transcribe_without_candidates_is_empty() {
        let (base_url, server) = serve_once(200, r#"{"candidates": []}"#);
        let client = client_for(base_url);

        let text = client.transcribe_audio(b"RIFF", "audio/wav").await.unwrap();
        server.join().unwrap();
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn transcribe_empty_audio_skips_request() {
        // Nothing listens here; a request would fail.
        let client = client_for("http://127.0.0.1:9".to_string());
        let text = client.transcribe_audio(&[], "audio/wav").await.unwrap();
        assert_eq!(text, "");
    }
}
