// A chat-completion client for the Groq API, rotating between several API
// keys when they hit their rate limits.

use std::env;
use std::time::Duration;

use coaching_tracker::comments::clean_output;
use coaching_tracker::{ChatMessage, Completer, CompletionError};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::tracker::config_reader::LlmSettings;
use crate::tracker::*;

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_KEY_PREFIX: &str = "GROQ_API_KEY_";
pub const DEFAULT_MAX_KEYS: usize = 20;
const DEFAULT_TEMPERATURE: f64 = 0.2;
const DEFAULT_MAX_TOKENS: u32 = 220;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const PROBE_TIMEOUT_SECS: u64 = 5;

const RATE_LIMIT_PATTERNS: &[&str] = &[
    "rate limit",
    "quota",
    "limit exceeded",
    "too many requests",
    "429",
    "insufficient_quota",
];

pub fn is_rate_limit_error(msg: &str) -> bool {
    let m = msg.to_lowercase();
    RATE_LIMIT_PATTERNS.iter().any(|p| m.contains(p))
}

/// Reads the keys `<prefix>1` to `<prefix><max_keys>` from the environment.
/// Blank values and duplicates are skipped.
pub fn load_api_keys(prefix: &str, max_keys: usize) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for i in 1..=max_keys {
        if let Ok(v) = env::var(format!("{}{}", prefix, i)) {
            let v = v.trim();
            if !v.is_empty() && !keys.iter().any(|k| k == v) {
                keys.push(v.to_string());
            }
        }
    }
    debug!("load_api_keys: {} keys found for {}*", keys.len(), prefix);
    keys
}

/// The position in the list of keys, and the keys known to be rate limited.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct KeyRotation {
    keys: Vec<String>,
    current: usize,
    limited: Vec<bool>,
}

impl KeyRotation {
    pub fn new(keys: Vec<String>) -> KeyRotation {
        let limited = vec![false; keys.len()];
        KeyRotation {
            keys,
            current: 0,
            limited,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn key(&self, idx: usize) -> &str {
        self.keys[idx].as_str()
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// The keys to try, starting from the current one and wrapping around.
    pub fn candidates(&self) -> Vec<usize> {
        let n = self.keys.len();
        (0..n)
            .map(|offset| (self.current + offset) % n)
            .filter(|idx| !self.limited[*idx])
            .collect()
    }

    pub fn set_current(&mut self, idx: usize) {
        self.current = idx;
    }

    pub fn mark_limited(&mut self, idx: usize) {
        self.limited[idx] = true;
    }

    pub fn all_limited(&self) -> bool {
        self.limited.iter().all(|l| *l)
    }

    pub fn reset(&mut self) {
        self.limited.iter_mut().for_each(|l| *l = false);
        self.current = 0;
    }
}

// ********* Wire structures ***********

#[derive(Serialize, Debug)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize, Debug)]
struct ChatResponseMessage {
    content: Option<String>,
}

pub struct GroqClient {
    client: Client,
    rotation: KeyRotation,
    base_url: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    probe_keys: bool,
}

impl GroqClient {
    /// A client for the keys found in the environment, `None` without any key.
    pub fn from_settings(settings: &LlmSettings) -> TrackerResult<Option<GroqClient>> {
        let prefix = settings
            .key_env_prefix
            .clone()
            .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string());
        let keys = load_api_keys(&prefix, settings.max_keys.unwrap_or(DEFAULT_MAX_KEYS));
        if keys.is_empty() {
            return Ok(None);
        }
        let rotation = KeyRotation::new(keys);
        info!("Using {} API keys", rotation.len());
        let timeout = Duration::from_secs(settings.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context(HttpClientSnafu {})?;
        Ok(Some(GroqClient {
            client,
            rotation,
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: settings
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: settings.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: settings.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            probe_keys: settings.probe_keys.unwrap_or(true),
        }))
    }

    /// Cheap request checking that a key answers.
    fn probe(&self, idx: usize) -> Result<(), String> {
        let resp = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(self.rotation.key(idx))
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .send()
            .map_err(|e| e.to_string())?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(format!("HTTP {}: {}", status, resp.text().unwrap_or_default()))
        }
    }

    /// Picks the key for the next request.
    ///
    /// When every key is rate limited, the flags are cleared and the selection
    /// starts over from the first key, once per completion.
    fn select_key(&mut self, reset_done: &mut bool) -> Option<usize> {
        loop {
            for idx in self.rotation.candidates() {
                if !self.probe_keys {
                    self.rotation.set_current(idx);
                    return Some(idx);
                }
                match self.probe(idx) {
                    Ok(()) => {
                        self.rotation.set_current(idx);
                        return Some(idx);
                    }
                    Err(msg) if is_rate_limit_error(&msg) => {
                        warn!("select_key: key #{} is rate limited: {}", idx + 1, msg);
                        self.rotation.mark_limited(idx);
                    }
                    Err(msg) => {
                        warn!("select_key: key #{} failed the probe: {}", idx + 1, msg);
                    }
                }
            }
            if *reset_done || !self.rotation.all_limited() {
                return None;
            }
            info!("select_key: all keys are rate limited, starting over");
            self.rotation.reset();
            *reset_done = true;
        }
    }

    fn send(&self, idx: usize, messages: &[ChatMessage]) -> Result<String, String> {
        let body = ChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: &m.role,
                    content: &m.content,
                })
                .collect(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.rotation.key(idx))
            .json(&body)
            .send()
            .map_err(|e| e.to_string())?;
        let status = resp.status();
        let text = resp.text().map_err(|e| e.to_string())?;
        if !status.is_success() {
            return Err(format!("HTTP {}: {}", status, text));
        }
        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| e.to_string())?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| "the response contains no completion".to_string())
    }
}

impl Completer for GroqClient {
    fn complete(&mut self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        if self.rotation.is_empty() {
            return Err(CompletionError::Unavailable);
        }
        let mut reset_done = false;
        let mut last_limit: Option<String> = None;
        loop {
            let idx = match self.select_key(&mut reset_done) {
                Some(idx) => idx,
                None => break,
            };
            match self.send(idx, messages) {
                Ok(text) => return Ok(clean_output(text.trim())),
                Err(msg) if is_rate_limit_error(&msg) => {
                    warn!("complete: key #{} is rate limited, rotating: {}", idx + 1, msg);
                    self.rotation.mark_limited(idx);
                    last_limit = Some(msg);
                }
                Err(msg) => {
                    warn!("complete: request failed with key #{}: {}", idx + 1, msg);
                    return Err(CompletionError::Failed(msg));
                }
            }
        }
        match last_limit {
            Some(msg) => Err(CompletionError::RateLimited(msg)),
            None => Err(CompletionError::Failed("no usable API key".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};
    use std::thread;

    type Seen = Arc<Mutex<Vec<String>>>;

    /// A local HTTP server. `respond` gets the request line (`POST /chat/completions`)
    /// and the bearer key, and returns the status and the JSON body. Every request
    /// is recorded as `<request line> <key>`.
    fn stub_server<F>(respond: F) -> (String, Seen)
    where
        F: Fn(&str, &str) -> (u16, String) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let seen_srv = seen.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let mut stream = match stream {
                    Ok(s) => s,
                    Err(_) => break,
                };
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut request_line = String::new();
                reader.read_line(&mut request_line).unwrap();
                let mut key = String::new();
                let mut content_length = 0;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    let line = line.trim_end();
                    if line.is_empty() {
                        break;
                    }
                    let (name, value) = line.split_once(':').unwrap_or((line, ""));
                    match name.to_lowercase().as_str() {
                        "authorization" => {
                            key = value.trim().trim_start_matches("Bearer ").to_string();
                        }
                        "content-length" => content_length = value.trim().parse().unwrap(),
                        _ => (),
                    }
                }
                let mut body = vec![0u8; content_length];
                reader.read_exact(&mut body).unwrap();

                let target: Vec<&str> = request_line.split_whitespace().take(2).collect();
                let target = target.join(" ");
                seen_srv.lock().unwrap().push(format!("{} {}", target, key));
                let (status, body) = respond(&target, &key);
                let reason = if status == 200 { "OK" } else { "Too Many Requests" };
                write!(
                    stream,
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    reason,
                    body.len(),
                    body
                )
                .unwrap();
                stream.flush().unwrap();
            }
        });
        (format!("http://{}", addr), seen)
    }

    fn completion(text: &str) -> (u16, String) {
        let body = json!({"choices": [{"message": {"role": "assistant", "content": text}}]});
        (200, body.to_string())
    }

    fn rate_limited() -> (u16, String) {
        let body = json!({"error": {"message": "Rate limit reached for model", "code": "rate_limit_exceeded"}});
        (429, body.to_string())
    }

    fn stub_client(prefix: &str, keys: &[&str], base_url: &str, probe_keys: bool) -> GroqClient {
        for (i, k) in keys.iter().enumerate() {
            env::set_var(format!("{}{}", prefix, i + 1), k);
        }
        let settings = LlmSettings {
            key_env_prefix: Some(prefix.to_string()),
            base_url: Some(base_url.to_string()),
            timeout_secs: Some(5),
            probe_keys: Some(probe_keys),
            ..LlmSettings::default()
        };
        GroqClient::from_settings(&settings).unwrap().unwrap()
    }

    fn seen_list(seen: &Seen) -> Vec<String> {
        seen.lock().unwrap().clone()
    }

    #[test]
    fn rate_limit_messages() {
        assert!(is_rate_limit_error("Rate limit reached for model"));
        assert!(is_rate_limit_error("HTTP 429 Too Many Requests: {}"));
        assert!(is_rate_limit_error("You exceeded your current quota"));
        assert!(is_rate_limit_error("error: insufficient_quota"));
        assert!(!is_rate_limit_error("HTTP 401 Unauthorized: invalid api key"));
        assert!(!is_rate_limit_error("connection refused"));
    }

    #[test]
    fn load_keys_from_env() {
        env::set_var("QATRACK_TEST_LOAD_1", " key-a ");
        env::set_var("QATRACK_TEST_LOAD_2", "");
        env::set_var("QATRACK_TEST_LOAD_3", "key-b");
        env::set_var("QATRACK_TEST_LOAD_4", "key-a");
        env::set_var("QATRACK_TEST_LOAD_6", "key-c");
        assert_eq!(
            load_api_keys("QATRACK_TEST_LOAD_", 20),
            vec!["key-a".to_string(), "key-b".to_string(), "key-c".to_string()]
        );
        assert_eq!(load_api_keys("QATRACK_TEST_LOAD_", 3).len(), 2);
        assert!(load_api_keys("QATRACK_TEST_NOTHING_", 20).is_empty());
    }

    #[test]
    fn rotation_skips_limited_keys() {
        let mut r = KeyRotation::new(vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        assert_eq!(r.candidates(), vec![0, 1, 2]);
        r.mark_limited(0);
        assert_eq!(r.candidates(), vec![1, 2]);
        r.set_current(2);
        assert_eq!(r.candidates(), vec![2, 1]);
        r.mark_limited(1);
        r.mark_limited(2);
        assert!(r.all_limited());
        assert!(r.candidates().is_empty());
        r.reset();
        assert_eq!(r.current(), 0);
        assert_eq!(r.candidates(), vec![0, 1, 2]);
        assert_eq!(r.key(1), "b");
    }

    #[test]
    fn no_keys_no_client() {
        let settings = LlmSettings {
            key_env_prefix: Some("QATRACK_TEST_ABSENT_".to_string()),
            ..LlmSettings::default()
        };
        assert!(GroqClient::from_settings(&settings).unwrap().is_none());
    }

    #[test]
    fn unreachable_server_fails_without_rotation() {
        env::set_var("QATRACK_TEST_UNREACHABLE_1", "key-a");
        env::set_var("QATRACK_TEST_UNREACHABLE_2", "key-b");
        let settings = LlmSettings {
            key_env_prefix: Some("QATRACK_TEST_UNREACHABLE_".to_string()),
            base_url: Some("http://127.0.0.1:9/".to_string()),
            timeout_secs: Some(2),
            probe_keys: Some(false),
            ..LlmSettings::default()
        };
        let mut client = GroqClient::from_settings(&settings).unwrap().unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:9");
        let res = client.complete(&[ChatMessage::user("hello")]);
        assert!(matches!(res, Err(CompletionError::Failed(_))));
        assert_eq!(client.rotation.current(), 0);
    }

    #[test]
    fn rate_limited_key_rotates_to_the_next_one() {
        let (url, seen) = stub_server(|_, key| {
            if key == "key-a" {
                rate_limited()
            } else {
                completion("Here are the areas to improve: Confirm the ticket number.")
            }
        });
        let mut client = stub_client("QATRACK_TEST_ROTATE_", &["key-a", "key-b"], &url, false);

        let first = client.complete(&[ChatMessage::user("hello")]);
        assert_eq!(first, Ok("Confirm the ticket number.".to_string()));
        assert_eq!(client.rotation.current(), 1);

        // The next completion starts from the key that worked.
        let second = client.complete(&[ChatMessage::user("hello again")]);
        assert_eq!(second, Ok("Confirm the ticket number.".to_string()));
        assert_eq!(client.rotation.current(), 1);
        assert_eq!(
            seen_list(&seen),
            vec![
                "POST /chat/completions key-a",
                "POST /chat/completions key-b",
                "POST /chat/completions key-b",
            ]
        );
    }

    #[test]
    fn rate_limited_key_check_marks_the_key() {
        let (url, seen) = stub_server(|target, key| match (target, key) {
            ("GET /models", "key-a") => rate_limited(),
            ("GET /models", _) => (200, json!({"data": []}).to_string()),
            _ => completion("Confirm the ticket number."),
        });
        let mut client = stub_client("QATRACK_TEST_CHECKED_", &["key-a", "key-b"], &url, true);

        let res = client.complete(&[ChatMessage::user("hello")]);
        assert_eq!(res, Ok("Confirm the ticket number.".to_string()));
        assert_eq!(client.rotation.limited, vec![true, false]);
        assert_eq!(client.rotation.current(), 1);
        assert_eq!(
            seen_list(&seen),
            vec![
                "GET /models key-a",
                "GET /models key-b",
                "POST /chat/completions key-b",
            ]
        );
    }

    #[test]
    fn all_keys_limited_start_over_once() {
        let (url, seen) = stub_server(|_, _| rate_limited());
        let mut client = stub_client("QATRACK_TEST_EXHAUSTED_", &["key-a", "key-b"], &url, false);

        let res = client.complete(&[ChatMessage::user("hello")]);
        assert!(matches!(res, Err(CompletionError::RateLimited(_))));
        // Each key is tried once before the reset and once after it.
        assert_eq!(
            seen_list(&seen),
            vec![
                "POST /chat/completions key-a",
                "POST /chat/completions key-b",
                "POST /chat/completions key-a",
                "POST /chat/completions key-b",
            ]
        );
        assert!(client.rotation.all_limited());
    }

    #[test]
    fn probe_failures_leave_no_key() {
        env::set_var("QATRACK_TEST_PROBE_1", "key-a");
        let settings = LlmSettings {
            key_env_prefix: Some("QATRACK_TEST_PROBE_".to_string()),
            base_url: Some("http://127.0.0.1:9".to_string()),
            timeout_secs: Some(2),
            ..LlmSettings::default()
        };
        let mut client = GroqClient::from_settings(&settings).unwrap().unwrap();
        let res = client.complete(&[ChatMessage::user("hello")]);
        assert_eq!(
            res,
            Err(CompletionError::Failed("no usable API key".to_string()))
        );
    }
}
