//! Vocabulary lookup through the Gemini `generateContent` REST API.
//!
//! The model is asked for a bare JSON object; anything it returns that does
//! not parse is passed through as the definition text.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::GeminiConfig;

const DEFINE_PROMPT: &str = r#"Analyze the following English text: "{text}"

Provide a vocabulary analysis. Respond ONLY with a valid JSON object.
Do not add any explanation or markdown formatting like ```json.
The JSON object must have the following keys: "definition", "synonyms", "antonyms", "turkish_meaning".

- "definition": A concise definition of the text.
- "synonyms": A list of up to 5 relevant synonyms.
- "antonyms": A list of up to 5 relevant antonyms.
- "turkish_meaning": The closest single word or short phrase Turkish equivalent.

If a field is not applicable or cannot be found (e.g., no antonyms for a proper noun),
return an empty list [] for "synonyms" and "antonyms", or an empty string "" for other fields.

Example for the word "happy":
{
  "definition": "Feeling or showing pleasure or contentment.",
  "synonyms": ["content", "joyful", "cheerful", "pleased", "gleeful"],
  "antonyms": ["sad", "unhappy", "miserable", "depressed"],
  "turkish_meaning": "mutlu"
}"#;

const NO_DEFINITION: &str = "Could not generate a definition.";
const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    pub selected_text: String,
    pub definition: String,
    pub synonyms: Vec<String>,
    pub antonyms: Vec<String>,
    pub turkish_meaning: String,
}

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("AI service request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("AI service returned status {status}: {body}")]
    Status { status: StatusCode, body: String },
}

#[async_trait]
pub trait Dictionary: Send + Sync {
    async fn define(&self, text: &str) -> Result<Definition, DefinitionError>;
}

pub struct GeminiDictionary {
    host: String,
    model: String,
    api_key: String,
    client: Client,
}

impl GeminiDictionary {
    pub fn new(config: &GeminiConfig, api_key: String) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            host: config.host.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            client,
        })
    }

    /// Dictionary from config, or `None` when no API key is set.
    pub fn from_config(config: &GeminiConfig) -> Result<Option<Self>, reqwest::Error> {
        match config.api_key() {
            Some(key) => Self::new(config, key).map(Some),
            None => {
                warn!("{} is not set; definitions are disabled", config.api_key_env);
                Ok(None)
            }
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String, DefinitionError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.host, self.model);
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DefinitionError::Status { status, body });
        }

        let data: Value = resp.json().await?;
        Ok(response_text(&data))
    }
}

#[async_trait]
impl Dictionary for GeminiDictionary {
    async fn define(&self, text: &str) -> Result<Definition, DefinitionError> {
        let t_start = Instant::now();
        let prompt = DEFINE_PROMPT.replace("{text}", text);

        debug!("Sending definition prompt to Gemini model '{}' for '{text}'", self.model);
        let raw = self.generate(&prompt).await?;
        info!(
            "Gemini answered for '{text}' in {:.0}ms ({} chars)",
            t_start.elapsed().as_secs_f64() * 1000.0,
            raw.len()
        );

        Ok(parse_definition(text, &raw))
    }
}

/// Concatenated text parts of the first candidate.
fn response_text(data: &Value) -> String {
    data["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<String>()
        })
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn code_fences() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^```json\s*|\s*```$").expect("valid regex"))
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn string_field(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => NOT_AVAILABLE.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Build a definition from model output, falling back to the raw text.
pub fn parse_definition(selected_text: &str, raw: &str) -> Definition {
    let stripped = code_fences().replace_all(raw, "");

    match serde_json::from_str::<Value>(stripped.trim()) {
        Ok(Value::Object(fields)) => Definition {
            selected_text: selected_text.to_string(),
            definition: string_field(fields.get("definition")),
            synonyms: fields.get("synonyms").map(string_list).unwrap_or_default(),
            antonyms: fields.get("antonyms").map(string_list).unwrap_or_default(),
            turkish_meaning: string_field(fields.get("turkish_meaning")),
        },
        _ => {
            warn!("Could not parse Gemini response as JSON for '{selected_text}', using raw text");
            Definition {
                selected_text: selected_text.to_string(),
                definition: if raw.is_empty() {
                    NO_DEFINITION.to_string()
                } else {
                    raw.to_string()
                },
                synonyms: Vec::new(),
                antonyms: Vec::new(),
                turkish_meaning: String::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};

    #[test]
    fn parses_plain_json() {
        let raw = r#"{"definition": "Feeling pleasure.", "synonyms": ["glad"], "antonyms": ["sad"], "turkish_meaning": "mutlu"}"#;
        let def = parse_definition("happy", raw);
        assert_eq!(
            def,
            Definition {
                selected_text: "happy".into(),
                definition: "Feeling pleasure.".into(),
                synonyms: vec!["glad".into()],
                antonyms: vec!["sad".into()],
                turkish_meaning: "mutlu".into(),
            }
        );
    }

    #[test]
    fn strips_markdown_fences() {
        let raw = "```json\n{\"definition\": \"A large sea creature.\", \"synonyms\": [], \"antonyms\": []}\n```";
        let def = parse_definition("whale", raw);
        assert_eq!(def.definition, "A large sea creature.");
        assert_eq!(def.turkish_meaning, "N/A");
        assert!(def.synonyms.is_empty());
    }

    #[test]
    fn missing_keys_get_defaults() {
        let def = parse_definition("x", "{}");
        assert_eq!(def.definition, "N/A");
        assert_eq!(def.turkish_meaning, "N/A");
        assert!(def.antonyms.is_empty());
    }

    #[test]
    fn unparseable_output_becomes_the_definition() {
        let def = parse_definition("quixotic", "Exceedingly idealistic.");
        assert_eq!(def.definition, "Exceedingly idealistic.");
        assert_eq!(def.turkish_meaning, "");

        let def = parse_definition("quixotic", "");
        assert_eq!(def.definition, "Could not generate a definition.");
    }

    #[test]
    fn json_array_is_not_a_definition() {
        let def = parse_definition("x", r#"["not", "an", "object"]"#);
        assert_eq!(def.definition, r#"["not", "an", "object"]"#);
    }

    async fn fake_gemini(reply: &'static str) -> String {
        let app = Router::new().route(
            "/v1beta/models/{model}",
            post(move |headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["x-goog-api-key"], "test-key");
                let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap_or_default();
                assert!(prompt.contains("\"serendipity\""));
                Json(json!({
                    "candidates": [{ "content": { "parts": [{ "text": reply }] } }]
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn defines_through_the_rest_api() {
        let host = fake_gemini(
            r#"{"definition": "Finding good things by chance.", "synonyms": ["luck"], "antonyms": [], "turkish_meaning": "mutlu tesadüf"}"#,
        )
        .await;
        let config = GeminiConfig {
            host,
            ..GeminiConfig::default()
        };
        let dictionary = GeminiDictionary::new(&config, "test-key".into()).unwrap();

        let def = dictionary.define("serendipity").await.unwrap();
        assert_eq!(def.selected_text, "serendipity");
        assert_eq!(def.definition, "Finding good things by chance.");
        assert_eq!(def.synonyms, vec!["luck"]);
        assert_eq!(def.turkish_meaning, "mutlu tesadüf");
    }

    #[test]
    fn response_text_joins_parts() {
        let data = json!({
            "candidates": [{ "content": { "parts": [{ "text": " {\"a\":" }, { "text": "1} " }] } }]
        });
        assert_eq!(response_text(&data), "{\"a\":1}");
        assert_eq!(response_text(&json!({})), "");
    }
}
