//! Captcha challenge acquisition.
//!
//! The portal issues a challenge as base64 PNG inside a JSON body, together
//! with a server-side key and a correlation id that the login request must
//! echo back. Acquisition handles the in-flight-conflict responses the
//! endpoint is known to emit, keeps one challenge cached for its observed
//! validity window, and always persists the raw image so an operator can
//! read it by eye when recognition fails.
//!
//! Recognition itself sits behind [`CaptchaSolver`]; the shipped
//! implementation pipes the normalized image through an external command.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{GrayImage, Luma};
use regex::Regex;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{AppError, Result};
use crate::models::CaptchaConfig;
use crate::services::transport::{Transport, TransportRequest, TransportResponse};
use crate::utils::env::{is_placeholder, resolve_map};

/// A solved challenge, ready to be injected into the login request.
#[derive(Debug, Clone)]
pub struct CaptchaChallenge {
    /// Recognized text
    pub text: String,
    /// Server-side challenge key, echoed in the login payload
    pub key: Option<String>,
    /// Correlation id, echoed as a login query parameter
    pub rs_id: Option<String>,
    /// Cookies set by the challenge response; the login request must carry
    /// them so the portal pairs challenge and attempt
    pub cookies: Vec<(String, String)>,
}

/// Turns a challenge image into text.
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    async fn solve(&self, image: &[u8]) -> Result<String>;
}

/// Solver that pipes the image to an external command.
///
/// The image arrives on stdin, the recognized text is read from stdout.
pub struct CommandSolver {
    command: Vec<String>,
}

impl CommandSolver {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

#[async_trait]
impl CaptchaSolver for CommandSolver {
    async fn solve(&self, image: &[u8]) -> Result<String> {
        let Some((program, args)) = self.command.split_first() else {
            return Err(AppError::config(
                "captcha.solver_command is empty; configure a recognizer or set the captcha value override",
            ));
        };
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::data("captcha solver stdin unavailable"))?;
        stdin.write_all(image).await?;
        drop(stdin);

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(AppError::auth(format!(
                "captcha solver exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

struct CachedChallenge {
    challenge: CaptchaChallenge,
    fetched_at: Instant,
}

/// Fetches, recognizes and caches captcha challenges.
pub struct CaptchaProvider {
    config: CaptchaConfig,
    transport: Arc<dyn Transport>,
    solver: Arc<dyn CaptchaSolver>,
    cache: Option<CachedChallenge>,
}

impl CaptchaProvider {
    pub fn new(
        config: CaptchaConfig,
        transport: Arc<dyn Transport>,
        solver: Arc<dyn CaptchaSolver>,
    ) -> Self {
        Self {
            config,
            transport,
            solver,
            cache: None,
        }
    }

    /// Produce a challenge, or `None` when captchas are disabled.
    ///
    /// Resolution order: manual env override, then the cached challenge if
    /// still within its lifetime (skipped on `force_refresh`), then a fresh
    /// fetch-and-recognize round.
    pub async fn acquire(&mut self, force_refresh: bool) -> Result<Option<CaptchaChallenge>> {
        if !self.config.enabled {
            return Ok(None);
        }
        if let Some(challenge) = self.override_from_env() {
            log::info!(
                "Using captcha value from ${} override",
                self.config.value_env_key
            );
            return Ok(Some(challenge));
        }
        if !force_refresh {
            if let Some(cached) = &self.cache {
                if cached.fetched_at.elapsed() < self.ttl() {
                    log::debug!("Reusing cached captcha challenge");
                    return Ok(Some(cached.challenge.clone()));
                }
            }
        }

        let challenge = self.fetch_challenge().await?;
        self.cache = Some(CachedChallenge {
            challenge: challenge.clone(),
            fetched_at: Instant::now(),
        });
        Ok(Some(challenge))
    }

    /// Drop the cached challenge, forcing the next acquire to fetch.
    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    fn ttl(&self) -> Duration {
        let secs = std::env::var(&self.config.ttl_env_key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.config.cache_ttl_secs);
        Duration::from_secs(secs)
    }

    fn override_from_env(&self) -> Option<CaptchaChallenge> {
        let text = env_value(&self.config.value_env_key)?;
        Some(CaptchaChallenge {
            text,
            key: env_value(&self.config.key_env_key),
            rs_id: env_value(&self.config.rs_id_env_key),
            cookies: Vec::new(),
        })
    }

    async fn fetch_challenge(&self) -> Result<CaptchaChallenge> {
        let headers = resolve_map(&self.config.headers);
        // Params whose env var is unset stay `${NAME}` after resolution and
        // are omitted rather than sent literally.
        let query: BTreeMap<String, String> = resolve_map(&self.config.params)
            .into_iter()
            .filter(|(_, value)| !is_placeholder(value))
            .collect();
        let request = TransportRequest::get(
            &self.config.url,
            headers,
            Duration::from_secs(self.config.timeout_secs),
        )
        .with_query(query);

        let response = self.request_challenge(&request).await?;
        let body = response.json()?;

        let raw_image = body
            .get(&self.config.image_field)
            .and_then(Value::as_str)
            .unwrap_or("");
        if raw_image.is_empty() {
            return Err(AppError::data(format!(
                "captcha response missing field '{}'",
                self.config.image_field
            )));
        }

        let image_bytes = decode_challenge_image(raw_image)?;
        self.save_debug_image(&image_bytes).await?;

        let normalized = normalize_captcha_image(&image_bytes)?;
        let text = self.solver.solve(&normalized).await?.trim().to_string();
        if text.is_empty() {
            return Err(AppError::auth(format!(
                "captcha not recognized; inspect the saved image at {}",
                self.config.save_path
            )));
        }
        log::info!("Captcha recognized ({} chars)", text.chars().count());

        Ok(CaptchaChallenge {
            text,
            key: field_string(&body, &self.config.key_field),
            rs_id: field_string(&body, &self.config.rs_id_field),
            cookies: response.set_cookies,
        })
    }

    /// One challenge request with fixed-sleep retries.
    ///
    /// The endpoint answers 409 while a previous challenge is still open;
    /// that and transient failures are retried, everything else surfaces.
    async fn request_challenge(&self, request: &TransportRequest) -> Result<TransportResponse> {
        let attempts = self.config.retries.max(1);
        for attempt in 1..=attempts {
            let error = match self.transport.execute(request).await {
                Ok(response) if response.is_success() => return Ok(response),
                Ok(response) => AppError::status(response.status, &request.url),
                Err(error) => error,
            };
            let conflict = error.http_status() == Some(409);
            if (!error.is_transient() && !conflict) || attempt == attempts {
                return Err(error);
            }
            log::warn!(
                "Captcha request failed (attempt {}/{}): {}. Retrying in {}s",
                attempt,
                attempts,
                error,
                self.config.retry_sleep_secs
            );
            tokio::time::sleep(Duration::from_secs(self.config.retry_sleep_secs)).await;
        }
        Err(AppError::data("no captcha attempts configured"))
    }

    async fn save_debug_image(&self, bytes: &[u8]) -> Result<()> {
        if self.config.save_path.is_empty() {
            return Ok(());
        }
        let path = Path::new(&self.config.save_path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await?;
        log::debug!("Saved captcha image to {}", path.display());
        Ok(())
    }
}

fn env_value(key: &str) -> Option<String> {
    if key.is_empty() {
        return None;
    }
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn field_string(body: &Value, field: &str) -> Option<String> {
    body.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|v| !v.is_empty())
}

/// Decode the challenge image, accepting both bare base64 and the
/// `data:image/...;base64,` form the portal sometimes wraps it in.
fn decode_challenge_image(raw: &str) -> Result<Vec<u8>> {
    let payload = Regex::new(r"^data:image/\w+;base64,(.*)$")
        .ok()
        .and_then(|re| re.captures(raw))
        .and_then(|caps| caps.get(1))
        .map_or(raw, |m| m.as_str());
    Ok(STANDARD.decode(payload.trim())?)
}

/// Normalize a challenge image for recognition: grayscale, invert, 3x3
/// median filter, binary threshold, re-encoded as PNG. Deterministic, so
/// the same challenge always produces the same solver input.
pub fn normalize_captcha_image(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut gray = image::load_from_memory(bytes)?.to_luma8();
    image::imageops::invert(&mut gray);
    let filtered = median_filter_3x3(&gray);

    let (width, height) = filtered.dimensions();
    let mut binary = GrayImage::new(width, height);
    for (x, y, pixel) in filtered.enumerate_pixels() {
        binary.put_pixel(x, y, Luma([if pixel[0] >= 128 { 255 } else { 0 }]));
    }

    let mut out = Vec::new();
    binary.write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)?;
    Ok(out)
}

/// Median filter over the 3x3 neighborhood; border pixels use the median of
/// the neighbors that exist.
fn median_filter_3x3(img: &GrayImage) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let mut neighborhood = [0u8; 9];
            let mut count = 0;
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if nx >= 0 && ny >= 0 && nx < width as i64 && ny < height as i64 {
                        neighborhood[count] = img.get_pixel(nx as u32, ny as u32)[0];
                        count += 1;
                    }
                }
            }
            let cells = &mut neighborhood[..count];
            cells.sort_unstable();
            out.put_pixel(x, y, Luma([cells[count / 2]]));
        }
    }
    out
}
