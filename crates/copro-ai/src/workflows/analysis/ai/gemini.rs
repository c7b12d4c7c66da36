//! Gemini-backed implementation of the document analyzer.
//!
//! Documents travel inline (base64) with a JSON-only response instruction so
//! both calls come back as machine-readable payloads. HTTP 429 maps to
//! [`AnalyzerError::RateLimited`]; the retry policy lives with the caller.

use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{AnalyzerError, Classification, DocumentAnalyzer, ExtractionDocument};
use crate::config::AnalysisConfig;
use crate::workflows::analysis::domain::{AnalysisContext, DocumentCategory, DossierId};

const REQUEST_TIMEOUT_SECS: u64 = 120;

pub struct GeminiAnalyzer {
    endpoint: String,
    model: String,
    api_key: String,
    client: Client,
}

impl GeminiAnalyzer {
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, AnalyzerError> {
        let api_key = config
            .ai_api_key
            .clone()
            .ok_or_else(|| AnalyzerError::NotConfigured("APP_AI_API_KEY is not set".into()))?;

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|err| AnalyzerError::Network(err.to_string()))?;

        Ok(Self {
            endpoint: config.ai_endpoint.trim_end_matches('/').to_string(),
            model: config.ai_model.clone(),
            api_key,
            client,
        })
    }

    fn api_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.endpoint, self.model, self.api_key
        )
    }

    async fn generate(&self, parts: Vec<ContentPart>) -> Result<String, AnalyzerError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: Some(GenerationConfig {
                temperature: Some(0.0),
                response_mime_type: Some("application/json".to_string()),
            }),
        };

        let response = self
            .client
            .post(self.api_url())
            .json(&request)
            .send()
            .await
            .map_err(|err| AnalyzerError::Network(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            if status.as_u16() == 429 {
                return Err(AnalyzerError::RateLimited);
            }
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyzerError::Api(format!("{status}: {body}")));
        }

        let payload: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| AnalyzerError::Malformed(err.to_string()))?;

        payload
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .and_then(|part| match part {
                ContentPart::Text { text } => Some(text),
                ContentPart::InlineData { .. } => None,
            })
            .ok_or_else(|| AnalyzerError::Malformed("response carried no text part".into()))
    }
}

fn inline_part(mime_type: &str, content: &[u8]) -> ContentPart {
    ContentPart::InlineData {
        inline_data: InlineData {
            mime_type: mime_type.to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(content),
        },
    }
}

fn mime_for(filename: &str) -> &'static str {
    match filename.rsplit('.').next().map(str::to_ascii_lowercase) {
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "txt" => "text/plain",
        _ => "application/pdf",
    }
}

fn classification_prompt(filename: &str) -> String {
    let categories = [
        DocumentCategory::ReglementCopropriete,
        DocumentCategory::EtatDescriptifDivision,
        DocumentCategory::FicheSynthetique,
        DocumentCategory::ProcesVerbalAssemblee,
        DocumentCategory::CarnetEntretien,
        DocumentCategory::AppelDeFonds,
        DocumentCategory::ReleveCharges,
        DocumentCategory::PreEtatDate,
        DocumentCategory::DiagnosticTechniqueGlobal,
        DocumentCategory::DiagnosticPerformanceEnergetique,
        DocumentCategory::DiagnosticAmiante,
        DocumentCategory::DiagnosticPlomb,
        DocumentCategory::DiagnosticElectricite,
        DocumentCategory::DiagnosticGaz,
        DocumentCategory::EtatRisquesPollutions,
        DocumentCategory::AttestationCarrez,
        DocumentCategory::Autre,
    ]
    .map(|category| format!("\"{}\"", category_name(category)))
    .join(", ");

    format!(
        "Classify this French co-ownership disclosure document (original name: {filename}). \
         Reply with a JSON object: {{\"category\": one of [{categories}], \
         \"confidence\": number between 0 and 1, \
         \"covered_diagnostics\": array of categories when one file bundles several technical diagnostics, \
         \"energy_certificate_id\": the DPE certificate number if present, else null, \
         \"document_date\": the document date if present, else null}}."
    )
}

fn extraction_prompt(context: &AnalysisContext) -> String {
    let questionnaire = serde_json::to_string(&context.questionnaire).unwrap_or_default();
    format!(
        "Extract the co-ownership disclosure data from the attached documents into one JSON \
         object with groups: property, co_ownership, financial, legal, diagnostics, and meta \
         (meta holds missing_data and alerts arrays). Use null for anything the documents do \
         not support. Known lot number: {lot}. Known address: {address}. \
         Seller questionnaire: {questionnaire}.",
        lot = context.lot_number.as_deref().unwrap_or("unknown"),
        address = context.property_address.as_deref().unwrap_or("unknown"),
    )
}

fn category_name(category: DocumentCategory) -> String {
    // serde's snake_case name, without the surrounding quotes.
    serde_json::to_string(&category)
        .map(|quoted| quoted.trim_matches('"').to_string())
        .unwrap_or_else(|_| "autre".to_string())
}

#[async_trait::async_trait]
impl DocumentAnalyzer for GeminiAnalyzer {
    async fn classify(
        &self,
        content: &[u8],
        filename: &str,
        dossier_id: &DossierId,
    ) -> Result<Classification, AnalyzerError> {
        tracing::debug!(%dossier_id, filename, bytes = content.len(), "classification request");

        let parts = vec![
            inline_part(mime_for(filename), content),
            ContentPart::Text {
                text: classification_prompt(filename),
            },
        ];
        let text = self.generate(parts).await?;

        let payload: ClassifyPayload = serde_json::from_str(&text)
            .map_err(|err| AnalyzerError::Malformed(format!("classification payload: {err}")))?;
        let raw_payload: Value = serde_json::from_str(&text)
            .map_err(|err| AnalyzerError::Malformed(format!("classification payload: {err}")))?;

        Ok(Classification {
            category: payload.category,
            confidence: payload.confidence.clamp(0.0, 1.0),
            raw_payload,
            covered_diagnostics: payload.covered_diagnostics,
            detected_energy_certificate_id: payload.energy_certificate_id,
            document_date: payload.document_date,
        })
    }

    async fn extract(
        &self,
        documents: &[ExtractionDocument],
        dossier_id: &DossierId,
        context: &AnalysisContext,
    ) -> Result<Value, AnalyzerError> {
        tracing::debug!(%dossier_id, documents = documents.len(), "extraction request");

        let mut parts: Vec<ContentPart> = documents
            .iter()
            .map(|doc| inline_part(&doc.mime_type, &doc.content))
            .collect();
        parts.push(ContentPart::Text {
            text: extraction_prompt(context),
        });

        let text = self.generate(parts).await?;
        serde_json::from_str(&text)
            .map_err(|err| AnalyzerError::Malformed(format!("extraction payload: {err}")))
    }
}

// Wire types, after the Gemini generateContent schema.

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<ContentPart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum ContentPart {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct ClassifyPayload {
    category: DocumentCategory,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    covered_diagnostics: Vec<DocumentCategory>,
    #[serde(default)]
    energy_certificate_id: Option<String>,
    #[serde(default)]
    document_date: Option<String>,
}
