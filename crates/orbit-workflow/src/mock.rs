//! Deterministic stand-ins for the AI and embedding services.
//!
//! Used by mock mode in the server and by the scripted test services.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use orbit_config::AnalysisType;
use serde_json::{Value, json};

use crate::collaborators::{BlobStore, EmbedRequest, EmbedResult, ImageAnalysis, ImageServices};
use crate::error::Result;

/// Model version reported by mock analysis.
pub const MOCK_MODEL_VERSION: &str = "mock-v1.0";

/// A fixed analysis for `image_url`.
pub fn mock_analysis(image_url: &str, analysis_type: AnalysisType) -> ImageAnalysis {
    let kind = analysis_type.as_str();
    let (objects, setting) = match analysis_type {
        AnalysisType::Product => (["product", "packaging", "label", "brand"], "studio"),
        AnalysisType::Lifestyle => (["person", "environment", "activity", "lifestyle"], "outdoor"),
    };
    let mut title = kind.to_string();
    if let Some(first) = title.get_mut(0..1) {
        first.make_ascii_uppercase();
    }

    ImageAnalysis {
        analysis_type,
        metadata: json!({
            "title": format!("{title} Image Analysis"),
            "description": format!("Mock analysis for {kind} image from {image_url}"),
            "tags": ["mock", "test", kind, "ai-generated"],
            "colors": ["#FF5733", "#33FF57", "#3357FF", "#FFD700"],
            "objects": objects,
            "scene": {
                "setting": setting,
                "lighting": "professional",
                "mood": "positive",
                "composition": "centered"
            },
            "technical": {
                "resolution": "1920x1080",
                "quality": "high",
                "format": "JPEG"
            }
        }),
        confidence: 0.94,
        model_version: MOCK_MODEL_VERSION.to_string(),
    }
}

/// The analysis as the `ai_analyze_image` tool returns it.
pub fn mock_analysis_payload(image_url: &str, analysis_type: AnalysisType) -> Value {
    let analysis = mock_analysis(image_url, analysis_type);
    json!({
        "analysis_type": analysis.analysis_type,
        "metadata": analysis.metadata,
        "confidence": analysis.confidence,
        "model_version": analysis.model_version,
        "timestamp": Utc::now().to_rfc3339(),
    })
}

/// Top-level metadata keys, sorted.
pub fn embedded_fields(metadata: &Value) -> Vec<String> {
    let mut fields: Vec<String> = metadata
        .as_object()
        .map(|m| m.keys().cloned().collect())
        .unwrap_or_default();
    fields.sort();
    fields
}

/// The result of a successful mock embed.
pub fn mock_embed_result(request: &EmbedRequest) -> EmbedResult {
    EmbedResult {
        processed_path: request.output_path.clone(),
        embedded_fields: embedded_fields(&request.metadata),
    }
}

/// The embed result as the `embed_metadata` tool returns it.
pub fn mock_embed_payload(request: &EmbedRequest, original_size: Option<u64>) -> Value {
    let result = mock_embed_result(request);
    json!({
        "processed_path": result.processed_path,
        "original_size": original_size,
        "compression_quality": request.compression_quality,
        "format": "JPEG",
        "embedded_fields": result.embedded_fields,
        "timestamp": Utc::now().to_rfc3339(),
    })
}

/// Local image services for mock mode.
///
/// Analysis is the fixed [`mock_analysis`]; embedding copies the original
/// to the output path so downstream verification sees a real artifact.
pub struct MockImageServices {
    blobs: Arc<dyn BlobStore>,
}

impl MockImageServices {
    /// Services writing artifacts into `blobs`.
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Embed and report the payload the `embed_metadata` tool returns.
    pub async fn embed_payload(&self, request: &EmbedRequest) -> Result<Value> {
        self.embed(request).await?;
        let size = self
            .blobs
            .list(parent_folder(&request.source_path))
            .await
            .ok()
            .and_then(|entries| {
                entries
                    .into_iter()
                    .find(|e| e.path == request.source_path)
                    .and_then(|e| e.size)
            });
        Ok(mock_embed_payload(request, size))
    }
}

fn parent_folder(path: &str) -> &str {
    path.rsplit_once('/').map(|(folder, _)| folder).unwrap_or("")
}

#[async_trait]
impl ImageServices for MockImageServices {
    async fn analyze(&self, image_url: &str, analysis_type: AnalysisType) -> Result<ImageAnalysis> {
        tracing::debug!(image_url, "mock analysis");
        Ok(mock_analysis(image_url, analysis_type))
    }

    async fn embed(&self, request: &EmbedRequest) -> Result<EmbedResult> {
        tracing::debug!(source = %request.source_path, output = %request.output_path, "mock embed");
        self.blobs
            .copy(&request.source_path, &request.output_path)
            .await?;
        Ok(mock_embed_result(request))
    }
}
