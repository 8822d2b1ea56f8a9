//! Ollama API client for completions, embeddings and model lifecycle

use std::time::Duration;

use futures_util::stream::StreamExt;
use serde::Deserialize;

/// Response from Ollama's generate endpoint with metadata
#[derive(Debug, Clone, Default)]
pub struct GenerateResponse {
    /// The generated text
    pub response: String,
    /// Number of tokens generated
    pub eval_count: u32,
    /// Number of tokens in the prompt
    pub prompt_eval_count: u32,
    /// Time spent generating tokens (nanoseconds)
    pub eval_duration_ns: u64,
}

/// Error type for all Ollama operations
#[derive(Debug)]
pub enum OllamaError {
    /// Transport failure (connection refused, timeout, ...)
    Request(reqwest::Error),
    /// Response body was not the JSON we expected
    Parse(serde_json::Error),
    /// Non-2xx HTTP status
    Status { status: u16, body: String },
    /// Ollama reported an error inside a 200 response
    Server(String),
    /// Response body was empty
    EmptyResponse,
}

impl std::fmt::Display for OllamaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OllamaError::Request(e) => write!(f, "Request error: {}", e),
            OllamaError::Parse(e) => write!(f, "Parse error: {}", e),
            OllamaError::Status { status, body } => write!(f, "HTTP {}: {}", status, body),
            OllamaError::Server(msg) => write!(f, "Ollama error: {}", msg),
            OllamaError::EmptyResponse => write!(f, "Empty response from Ollama"),
        }
    }
}

impl std::error::Error for OllamaError {}

impl From<reqwest::Error> for OllamaError {
    fn from(e: reqwest::Error) -> Self {
        OllamaError::Request(e)
    }
}

impl From<serde_json::Error> for OllamaError {
    fn from(e: serde_json::Error) -> Self {
        OllamaError::Parse(e)
    }
}

/// Build a reqwest client with an overall request timeout
pub(crate) fn http_client(timeout: Option<Duration>) -> Result<reqwest::Client, OllamaError> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// Turn a non-2xx response into [`OllamaError::Status`]
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, OllamaError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(OllamaError::Status {
        status: status.as_u16(),
        body,
    })
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Client for interacting with Ollama's HTTP API
#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the Ollama server (e.g., "http://localhost:11434")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: trim_base_url(base_url.into()),
            client: reqwest::Client::new(),
        }
    }

    /// Create a client whose requests give up after `timeout`
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, OllamaError> {
        Ok(Self {
            base_url: trim_base_url(base_url.into()),
            client: http_client(Some(timeout))?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Generate a complete response from Ollama
    ///
    /// The endpoint streams newline-delimited JSON; lines are reassembled
    /// across network chunks and the tokens concatenated.
    ///
    /// # Arguments
    /// * `prompt` - The input prompt for the LLM
    /// * `model` - The model name (e.g., "dolphin-mistral:latest")
    ///
    /// # Returns
    /// GenerateResponse with the text and token/timing metadata
    pub async fn generate(
        &self,
        prompt: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<GenerateResponse, OllamaError> {
        let endpoint = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&endpoint)
            .json(&serde_json::json!({
                "model": model.into(),
                "prompt": prompt.into(),
                "stream": true
            }))
            .send()
            .await?;
        let mut bytes_stream = check_status(response).await?.bytes_stream();

        let mut result = GenerateResponse::default();
        let mut lines = LineBuffer::default();

        while let Some(chunk_result) = bytes_stream.next().await {
            for line in lines.push(&chunk_result?) {
                absorb_generate_line(&line, &mut result)?;
            }
        }
        absorb_generate_line(&lines.finish(), &mut result)?;

        Ok(result)
    }

    /// Embed a batch of texts with an embedding model
    pub async fn embed(&self, model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>, OllamaError> {
        let endpoint = format!("{}/api/embed", self.base_url);

        let response = self
            .client
            .post(&endpoint)
            .json(&serde_json::json!({
                "model": model,
                "input": inputs,
            }))
            .send()
            .await?;

        let text = check_status(response).await?.text().await?;
        if text.is_empty() {
            return Err(OllamaError::EmptyResponse);
        }
        let parsed: EmbedResponse = serde_json::from_str(&text)?;
        Ok(parsed.embeddings)
    }

    /// Ask Ollama to evict a model from memory right away
    pub async fn unload(&self, model: &str) -> Result<(), OllamaError> {
        let endpoint = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&endpoint)
            .json(&serde_json::json!({
                "model": model,
                "keep_alive": 0
            }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

fn trim_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// Reassembles newline-delimited lines from arbitrarily split byte chunks
///
/// Lines are kept as bytes until complete, so a multi-byte character cut by
/// a chunk boundary decodes intact.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append a chunk and return every line it completed (newline included)
    fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            lines.push(self.pending.drain(..=newline).collect());
        }
        lines
    }

    /// Whatever followed the last newline
    fn finish(self) -> Vec<u8> {
        self.pending
    }
}

/// Fold one NDJSON line of a generate stream into the accumulated response
fn absorb_generate_line(line: &[u8], acc: &mut GenerateResponse) -> Result<(), OllamaError> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return Ok(());
    }

    let data: serde_json::Value = serde_json::from_str(line)?;
    if let Some(err) = data["error"].as_str() {
        return Err(OllamaError::Server(err.to_string()));
    }

    if let Some(token) = data["response"].as_str() {
        acc.response.push_str(token);
    }

    // Ollama sends metadata only in the final message
    if data["done"].as_bool() == Some(true) {
        acc.eval_count = data["eval_count"].as_u64().unwrap_or(0) as u32;
        acc.prompt_eval_count = data["prompt_eval_count"].as_u64().unwrap_or(0) as u32;
        acc.eval_duration_ns = data["eval_duration"].as_u64().unwrap_or(0);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absorb_tokens_and_metadata() {
        let mut acc = GenerateResponse::default();
        absorb_generate_line(br#"{"response":"Hel","done":false}"#, &mut acc).unwrap();
        absorb_generate_line(b"\n", &mut acc).unwrap();
        absorb_generate_line(
            br#"{"response":"lo","done":true,"eval_count":2,"prompt_eval_count":7,"eval_duration":99}"#,
            &mut acc,
        )
        .unwrap();
        assert_eq!(acc.response, "Hello");
        assert_eq!(acc.eval_count, 2);
        assert_eq!(acc.prompt_eval_count, 7);
        assert_eq!(acc.eval_duration_ns, 99);
    }

    /// Feed chunks through the line buffer the way `generate` does
    fn assemble(chunks: &[&[u8]]) -> Result<GenerateResponse, OllamaError> {
        let mut acc = GenerateResponse::default();
        let mut lines = LineBuffer::default();
        for chunk in chunks {
            for line in lines.push(chunk) {
                absorb_generate_line(&line, &mut acc)?;
            }
        }
        absorb_generate_line(&lines.finish(), &mut acc)?;
        Ok(acc)
    }

    #[test]
    fn test_line_split_inside_multibyte_char() {
        let stream = "{\"response\":\"caf\u{e9} \",\"done\":false}\n{\"response\":\"\u{1F600}\",\"done\":true,\"eval_count\":2}\n";
        let bytes = stream.as_bytes();
        // Cut inside the two-byte 'é' and inside the four-byte emoji
        let e_acute = stream.find('\u{e9}').unwrap() + 1;
        let emoji = stream.find('\u{1F600}').unwrap() + 2;
        let chunks: [&[u8]; 3] = [&bytes[..e_acute], &bytes[e_acute..emoji], &bytes[emoji..]];

        let acc = assemble(&chunks).unwrap();
        assert_eq!(acc.response, "caf\u{e9} \u{1F600}");
        assert_eq!(acc.eval_count, 2);
    }

    #[test]
    fn test_line_buffer_keeps_unterminated_tail() {
        let mut lines = LineBuffer::default();
        assert!(lines.push(b"{\"respon").is_empty());
        let done = lines.push(b"se\":\"a\"}\n{\"response\":\"b\"}");
        assert_eq!(done, vec![b"{\"response\":\"a\"}\n".to_vec()]);
        assert_eq!(lines.finish(), b"{\"response\":\"b\"}".to_vec());

        let chunks: [&[u8]; 2] = [b"{\"response\":\"x\"}\n{\"resp", b"onse\":\"y\"}"];
        let acc = assemble(&chunks).unwrap();
        assert_eq!(acc.response, "xy");
    }

    #[test]
    fn test_absorb_server_error() {
        let mut acc = GenerateResponse::default();
        let err = absorb_generate_line(br#"{"error":"model not found"}"#, &mut acc).unwrap_err();
        assert!(matches!(err, OllamaError::Server(ref m) if m == "model not found"));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/");
        assert_eq!(client.base_url(), "http://localhost:11434");
    }
}
