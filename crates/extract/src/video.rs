//! Video metadata through `ffprobe`.
//!
//! A video has no text to read, so the "extraction" is a short description
//! of the container and its streams that the model can reason about.

use async_trait::async_trait;
use serde::Deserialize;
use talkback_core::attachment::{Artifact, Extractable, MediaKind};
use talkback_core::error::ExtractionError;

use crate::process::run_with_input;

pub struct FfprobeMetadata {
    bin: String,
}

impl FfprobeMetadata {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    fn args() -> Vec<String> {
        [
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            "-i",
            "pipe:0",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn summarize(name: &str, probe: &ProbeOutput) -> String {
        let mut lines = vec![format!("[Video metadata: {name}]")];

        if let Some(format) = &probe.format {
            if let Some(container) = format.format_long_name.as_ref().or(format.format_name.as_ref()) {
                lines.push(format!("Container: {container}"));
            }
            if let Some(secs) = format.duration.as_deref().and_then(|d| d.parse::<f64>().ok()) {
                lines.push(format!("Duration: {secs:.1} s"));
            }
        }

        for stream in &probe.streams {
            let mut line = format!(
                "Stream {}: {} {}",
                stream.index,
                stream.codec_type.as_deref().unwrap_or("unknown"),
                stream.codec_name.as_deref().unwrap_or("?"),
            );
            if let (Some(w), Some(h)) = (stream.width, stream.height) {
                line.push_str(&format!(" {w}x{h}"));
            }
            lines.push(line);
        }

        lines.join("\n")
    }
}

#[async_trait]
impl Extractable for FfprobeMetadata {
    fn name(&self) -> &str {
        "ffprobe"
    }

    fn kind(&self) -> MediaKind {
        MediaKind::Video
    }

    async fn extract(&self, artifact: &Artifact) -> Result<String, ExtractionError> {
        let stdout = run_with_input(self.name(), &self.bin, &Self::args(), artifact.data.clone()).await?;
        let probe: ProbeOutput =
            serde_json::from_slice(&stdout).map_err(|e| ExtractionError::BackendError {
                backend: "ffprobe".into(),
                reason: format!("unreadable probe output: {e}"),
            })?;
        Ok(Self::summarize(&artifact.name, &probe))
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: Option<ProbeFormat>,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    format_name: Option<String>,
    #[serde(default)]
    format_long_name: Option<String>,
    #[serde(default)]
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    codec_name: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}
