//! Engine backend that serves a GGUF model through a local `llama-server` process

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::config::FlowConfig;

use super::{LoadedModel, ModelBackend, ModelRef};

const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(250);
const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_MAX_TOKENS: u32 = 1024;

pub struct LlamaServerBackend {
    binary: String,
    context_size: u32,
    max_tokens: u32,
    startup_timeout: Duration,
    client: reqwest::Client,
}

impl LlamaServerBackend {
    pub fn new(binary: impl Into<String>, context_size: u32) -> Self {
        Self {
            binary: binary.into(),
            context_size,
            max_tokens: DEFAULT_MAX_TOKENS,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &FlowConfig) -> Self {
        Self::new(config.llama_server_bin.clone(), config.context_size)
    }

    fn resolve_binary(&self) -> Result<PathBuf> {
        which::which(&self.binary)
            .with_context(|| format!("'{}' not found in PATH", self.binary))
    }

    async fn wait_until_healthy(&self, base_url: &str, child: &mut Child) -> Result<()> {
        let deadline = tokio::time::Instant::now() + self.startup_timeout;
        let health_url = format!("{}/health", base_url);

        loop {
            if let Some(status) = child.try_wait()? {
                bail!("llama-server exited during startup ({})", status);
            }

            match self.client.get(&health_url).send().await {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => {
                    tracing::debug!(status = %response.status(), "llama-server not ready yet");
                }
                Err(e) => tracing::debug!(error = %e, "llama-server not reachable yet"),
            }

            if tokio::time::Instant::now() >= deadline {
                bail!(
                    "llama-server did not become healthy within {}s",
                    self.startup_timeout.as_secs()
                );
            }
            tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl ModelBackend for LlamaServerBackend {
    async fn load(&self, model: &ModelRef) -> Result<Arc<dyn LoadedModel>> {
        if !model.path.exists() {
            bail!("Model file not found: {:?}", model.path);
        }

        let binary = self.resolve_binary()?;
        let port = free_port()?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut child = Command::new(&binary)
            .arg("-m")
            .arg(&model.path)
            .args(["--host", "127.0.0.1"])
            .arg("--port")
            .arg(port.to_string())
            .arg("--ctx-size")
            .arg(self.context_size.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {:?}", binary))?;

        tracing::info!(engine = %model.name, port, "Started llama-server");

        if let Err(e) = self.wait_until_healthy(&base_url, &mut child).await {
            let _ = child.kill().await;
            return Err(e);
        }

        Ok(Arc::new(LlamaServerModel {
            name: model.name.clone(),
            base_url,
            max_tokens: self.max_tokens,
            client: self.client.clone(),
            child: Mutex::new(Some(child)),
        }))
    }
}

struct LlamaServerModel {
    name: String,
    base_url: String,
    max_tokens: u32,
    client: reqwest::Client,
    child: Mutex<Option<Child>>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    content: String,
}

#[async_trait]
impl LoadedModel for LlamaServerModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/completion", self.base_url))
            .json(&json!({
                "prompt": prompt,
                "n_predict": self.max_tokens,
                "temperature": 0.2,
                "cache_prompt": true,
            }))
            .send()
            .await
            .context("Completion request failed")?
            .error_for_status()
            .context("llama-server rejected the completion request")?;

        let body: CompletionResponse = response
            .json()
            .await
            .context("Malformed completion response")?;
        tracing::debug!(engine = %self.name, chars = body.content.len(), "Generated completion");
        Ok(body.content)
    }

    async fn release(&self) -> Result<()> {
        if let Some(mut child) = self.child.lock().await.take() {
            child.kill().await.context("Failed to stop llama-server")?;
        }
        Ok(())
    }
}

/// Ask the OS for an unused local port.
fn free_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("No free local port")?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_port_is_nonzero() {
        assert_ne!(free_port().unwrap(), 0);
    }

    #[tokio::test]
    async fn missing_model_file_fails_before_spawning() {
        let backend = LlamaServerBackend::new("llama-server", 2048);
        let err = backend
            .load(&ModelRef::new("ghost", "/nonexistent/ghost.gguf"))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("Model file not found"));
    }

    #[tokio::test]
    async fn missing_binary_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("m.gguf");
        std::fs::write(&model, b"gguf").unwrap();

        let backend = LlamaServerBackend::new("definitely-not-a-real-llama-binary", 2048);
        let err = backend
            .load(&ModelRef::new("m", model))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("not found in PATH"));
    }
}
