// ============================================================
// Layer 6 — HTTP Oracle
// ============================================================
// Talks to any OpenAI-compatible chat endpoint (vLLM, llama.cpp
// server, Ollama's /v1, hosted APIs):
//
//   POST {base_url}/chat/completions
//   {
//     "model": "elyza-llama3-8b",
//     "messages": [{"role": "user", "content": "<prompt>"}],
//     "temperature": 0, "top_p": 1, "seed": 0     ← deterministic mode
//   }
//
//   200 → choices[0].message.content
//
// The request carries a timeout; hitting it is reported as
// OracleError::TimedOut so the stage can fail open.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::domain::traits::{Oracle, OracleError, SamplingMode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpOracleSettings {
    /// e.g. "http://localhost:8000/v1"
    pub base_url:     String,
    pub model:        String,
    pub timeout_secs: u64,
    /// Environment variable holding a bearer token, if any
    pub api_key_env:  Option<String>,
    pub seed:         u64,
}

impl Default for HttpOracleSettings {
    fn default() -> Self {
        Self {
            base_url:     "http://localhost:8000/v1".to_string(),
            model:        "elyza/Llama-3-ELYZA-JP-8B".to_string(),
            timeout_secs: 120,
            api_key_env:  None,
            seed:         0,
        }
    }
}

pub struct HttpOracle {
    http:     reqwest::blocking::Client,
    url:      String,
    model:    String,
    seed:     u64,
    api_key:  Option<String>,
}

impl HttpOracle {
    pub fn new(settings: &HttpOracleSettings) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Cannot build HTTP client")?;

        let api_key = match &settings.api_key_env {
            Some(var) => Some(
                std::env::var(var).with_context(|| format!("API key variable '{var}' is not set"))?,
            ),
            None => None,
        };

        Ok(Self {
            http,
            url: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            model: settings.model.clone(),
            seed: settings.seed,
            api_key,
        })
    }

    fn body(&self, prompt: &str, mode: SamplingMode) -> Value {
        let mut body = json!({
            "model":    self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if mode == SamplingMode::Deterministic {
            body["temperature"] = json!(0);
            body["top_p"]       = json!(1);
            body["seed"]        = json!(self.seed);
        }
        body
    }
}

fn transport(e: reqwest::Error) -> OracleError {
    if e.is_timeout() {
        OracleError::TimedOut
    } else {
        OracleError::Transport(e.to_string())
    }
}

impl Oracle for HttpOracle {
    fn query(&self, prompt: &str, mode: SamplingMode) -> std::result::Result<String, OracleError> {
        let mut request = self.http.post(&self.url).json(&self.body(prompt, mode));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp   = request.send().map_err(transport)?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(OracleError::Transport(format!("HTTP {}: {}", status.as_u16(), text.trim())));
        }

        let body: Value = resp.json().map_err(|e| {
            if e.is_timeout() {
                OracleError::TimedOut
            } else {
                OracleError::BadResponse(e.to_string())
            }
        })?;

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| OracleError::BadResponse("no choices[0].message.content".to_string()))?;

        tracing::debug!("Oracle answered {} chars", content.chars().count());
        Ok(content.to_string())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn oracle_for(server: &MockServer, timeout_secs: u64) -> HttpOracle {
        HttpOracle::new(&HttpOracleSettings {
            base_url: server.url("/v1"),
            timeout_secs,
            ..HttpOracleSettings::default()
        })
        .unwrap()
    }

    #[test]
    fn test_deterministic_body_disables_sampling() {
        let oracle = HttpOracle::new(&HttpOracleSettings::default()).unwrap();
        let body = oracle.body("p", SamplingMode::Deterministic);
        assert_eq!(body["temperature"], json!(0));
        assert_eq!(body["top_p"], json!(1));
        assert_eq!(body["messages"][0]["content"], json!("p"));

        let sampled = oracle.body("p", SamplingMode::Sampled);
        assert!(sampled.get("temperature").is_none());
    }

    #[test]
    fn test_reads_first_choice_content() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(json!({
                "choices": [{ "message": { "role": "assistant", "content": "思考：…\n回答:2" } }]
            }));
        });

        let answer = oracle_for(&server, 5).query("時", SamplingMode::Deterministic).unwrap();
        assert!(answer.ends_with("回答:2"));
    }

    #[test]
    fn test_http_error_is_transport_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(503).body("overloaded");
        });

        let err = oracle_for(&server, 5).query("時", SamplingMode::Deterministic).unwrap_err();
        assert!(matches!(err, OracleError::Transport(ref m) if m.contains("503")));
    }

    #[test]
    fn test_missing_content_is_bad_response() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(json!({ "choices": [] }));
        });

        let err = oracle_for(&server, 5).query("時", SamplingMode::Deterministic).unwrap_err();
        assert!(matches!(err, OracleError::BadResponse(_)));
    }

    #[test]
    fn test_slow_server_times_out() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200)
                .delay(Duration::from_secs(3))
                .json_body(json!({ "choices": [] }));
        });

        let err = oracle_for(&server, 1).query("時", SamplingMode::Deterministic).unwrap_err();
        assert!(matches!(err, OracleError::TimedOut));
    }
}
