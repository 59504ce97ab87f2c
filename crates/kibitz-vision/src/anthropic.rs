//! Messages-API client for the perception service.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use kibitz_core::Perspective;
use log::{debug, info};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::prompt::{board_prompt, explain_prompt};
use crate::{BoardImage, PerceptionError, PerceptionService};

const API_VERSION: &str = "2023-06-01";
const EXPLAIN_MAX_TOKENS: u32 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            model: "claude-opus-4-20250514".to_string(),
            max_tokens: 2000,
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            timeout_secs: 120,
        }
    }
}

pub struct AnthropicVision {
    client: Client,
    config: VisionConfig,
    api_key: String,
}

impl AnthropicVision {
    /// Reads the API key from `config.api_key_env`.
    pub fn from_env(config: VisionConfig) -> Result<Self, PerceptionError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| PerceptionError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(config, api_key)
    }

    pub fn new(config: VisionConfig, api_key: String) -> Result<Self, PerceptionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    fn post(&self, body: &Value) -> Result<String, PerceptionError> {
        let res = self
            .client
            .post(&self.config.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send()?;
        let status = res.status();
        let text = res.text()?;
        if !status.is_success() {
            return Err(PerceptionError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        first_text(&text)
    }
}

impl PerceptionService for AnthropicVision {
    fn describe_board(
        &self,
        image: &BoardImage,
        perspective: Perspective,
    ) -> Result<String, PerceptionError> {
        info!(
            "sending {} board image ({} bytes) to {}",
            image.media_type(),
            image.bytes().len(),
            self.config.model
        );
        let body = board_request(&self.config, image, perspective);
        let text = self.post(&body)?;
        debug!("perception response:\n{text}");
        Ok(text)
    }

    fn explain_move(&self, fen: &str, san: &str) -> Result<String, PerceptionError> {
        let body = json!({
            "model": self.config.model,
            "max_tokens": EXPLAIN_MAX_TOKENS.min(self.config.max_tokens),
            "messages": [{ "role": "user", "content": explain_prompt(fen, san) }],
        });
        self.post(&body)
    }
}

fn board_request(config: &VisionConfig, image: &BoardImage, perspective: Perspective) -> Value {
    json!({
        "model": config.model,
        "max_tokens": config.max_tokens,
        "messages": [{
            "role": "user",
            "content": [
                {
                    "type": "image",
                    "source": {
                        "type": "base64",
                        "media_type": image.media_type().as_str(),
                        "data": STANDARD.encode(image.bytes()),
                    },
                },
                { "type": "text", "text": board_prompt(perspective) },
            ],
        }],
    })
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

/// First text block of a messages response, trimmed.
fn first_text(body: &str) -> Result<String, PerceptionError> {
    let response: MessagesResponse =
        serde_json::from_str(body).map_err(|_| PerceptionError::EmptyResponse)?;
    response
        .content
        .into_iter()
        .find_map(|block| match block {
            ContentBlock::Text { text } if !text.trim().is_empty() => Some(text.trim().to_string()),
            _ => None,
        })
        .ok_or(PerceptionError::EmptyResponse)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png() -> BoardImage {
        BoardImage::from_bytes(b"\x89PNG\r\n\x1a\nrest".to_vec()).unwrap()
    }

    #[test]
    fn board_request_carries_image_and_prompt() {
        let body = board_request(&VisionConfig::default(), &png(), Perspective::BLACK);
        assert_eq!(body["model"], "claude-opus-4-20250514");
        assert_eq!(body["max_tokens"], 2000);
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["source"]["media_type"], "image/png");
        assert_eq!(content[0]["source"]["data"], STANDARD.encode(png().bytes()));
        assert!(
            content[1]["text"]
                .as_str()
                .unwrap()
                .starts_with("You are viewing from BLACK's perspective.")
        );
    }

    #[test]
    fn picks_the_first_text_block() {
        let body = r#"{"id":"msg_1","content":[
            {"type":"thinking","thinking":"..."},
            {"type":"text","text":"  8:rnbqkbnr\n7:pppppppp\n"}
        ]}"#;
        assert_eq!(first_text(body).unwrap(), "8:rnbqkbnr\n7:pppppppp");
    }

    #[test]
    fn empty_or_malformed_responses_are_errors() {
        assert!(matches!(
            first_text(r#"{"content":[]}"#),
            Err(PerceptionError::EmptyResponse)
        ));
        assert!(matches!(first_text("<html>"), Err(PerceptionError::EmptyResponse)));
    }

    #[test]
    fn missing_key_is_reported_by_variable_name() {
        let config = VisionConfig {
            api_key_env: "KIBITZ_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..VisionConfig::default()
        };
        match AnthropicVision::from_env(config) {
            Err(PerceptionError::MissingApiKey(name)) => {
                assert_eq!(name, "KIBITZ_TEST_KEY_THAT_IS_NEVER_SET");
            }
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("key unexpectedly present"),
        }
    }
}
