#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use qa_agent::agent::QaAgent;
use qa_agent::config::{Config, EmptyBatchPolicy};
use qa_agent::embedding::EmbeddingProvider;
use qa_agent::error::{EmbeddingError, ModelError};
use qa_agent::llm::LanguageModel;
use qa_agent::models::UploadedFile;
use tempfile::TempDir;

pub const DIMS: usize = 64;

/// Bag-of-words vectors: each lowercase word is hashed into one of
/// [`DIMS`] buckets. Identical texts get identical vectors.
pub struct HashEmbedder;

pub fn hash_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in word.to_lowercase().bytes() {
            h ^= b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        v[(h % DIMS as u64) as usize] += 1.0;
    }
    v
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn provider_name(&self) -> &str {
        "test"
    }
    fn model_name(&self) -> &str {
        "hash-bow"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| hash_vector(t)).collect())
    }
}

/// Turns each non-empty context line into a table row and records prompts.
#[derive(Default)]
pub struct EchoModel {
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl EchoModel {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> String {
        self.prompts
            .lock()
            .unwrap()
            .last()
            .cloned()
            .unwrap_or_default()
    }
}

fn section<'a>(prompt: &'a str, start: &str, end: &str) -> &'a str {
    let Some(from) = prompt.find(start) else {
        return "";
    };
    let rest = &prompt[from + start.len()..];
    match rest.find(end) {
        Some(to) => &rest[..to],
        None => rest,
    }
}

#[async_trait]
impl LanguageModel for EchoModel {
    fn model_name(&self) -> &str {
        "echo"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        if prompt.contains("Write a Python Selenium script") {
            let rules = section(prompt, "RULES: ", "\nHTML:");
            return Ok(format!("```python\n# rules: {}\n```", rules.trim()));
        }

        let context = section(prompt, "CONTEXT:\n", "\n\nUSER REQUEST:");
        let mut table = String::from(
            "| Test_ID | Feature | Test_Scenario | Expected_Result | Grounded_In |\n|---|---|---|---|---|\n",
        );
        for (i, line) in context.lines().filter(|l| !l.trim().is_empty()).enumerate() {
            table.push_str(&format!(
                "| TC-{:03} | Feature | Check | Passes | {} |\n",
                i + 1,
                line.trim()
            ));
        }
        Ok(table)
    }
}

/// Always fails like a provider rejecting the request.
pub struct FailingModel;

#[async_trait]
impl LanguageModel for FailingModel {
    fn model_name(&self) -> &str {
        "failing"
    }
    async fn generate(&self, _prompt: &str) -> Result<String, ModelError> {
        Err(ModelError::Api {
            status: 429,
            body: "quota exceeded".to_string(),
        })
    }
}

pub fn test_config(tmp: &TempDir, policy: EmptyBatchPolicy) -> Config {
    let mut config = Config::default();
    config.store.path = tmp.path().join("knowledge_base");
    config.embedding.provider = "disabled".to_string();
    config.chunking.chunk_size = 200;
    config.chunking.chunk_overlap = 40;
    config.ingest.empty_batch_policy = policy;
    config
}

pub fn agent_with(
    tmp: &TempDir,
    policy: EmptyBatchPolicy,
    model: Arc<dyn LanguageModel>,
) -> QaAgent {
    QaAgent::new(test_config(tmp, policy), Arc::new(HashEmbedder)).with_language_model(model)
}

pub fn specs_md() -> UploadedFile {
    UploadedFile::new(
        "product_specs.md",
        "# Product Specs\n\nDiscount code SAVE15 applies 15% off the cart total.\n\nThe discount field rejects expired codes.\n",
    )
}

pub fn style_txt() -> UploadedFile {
    UploadedFile::new(
        "ui_ux_guide.txt",
        "The Pay Now button must be green.\nError messages are shown in red text below the field.\n",
    )
}

pub fn shipping_json() -> UploadedFile {
    UploadedFile::new(
        "api_endpoints.json",
        r#"{"shipping": {"standard": "free", "express": "10 dollars"}}"#,
    )
}

pub const CHECKOUT_HTML: &str = r#"<html><head><title>Checkout</title></head>
<body><h1>Checkout</h1><input id="discount-code"><button id="apply-discount">Apply</button>
<button id="pay-now" style="background:green">Pay Now</button></body></html>"#;

pub fn checkout_html() -> UploadedFile {
    UploadedFile::new("checkout.html", CHECKOUT_HTML)
}
