use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::ai_service::{GenerativeService, Generation};
use crate::models::{DishImage, EditRequest, IngredientQuery, Recipe};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

const RECIPE_SYSTEM_INSTRUCTION: &str =
    "당신은 세계적인 요리사입니다. 레시피를 제목, 재료 리스트, 조리 순서, 팁으로 구성된 JSON 형식으로 응답하세요.";

const SQUARE: &str = "1:1";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_config: Option<ImageConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: String,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
    #[serde(default)]
    thought: Option<bool>,
}

impl GenerateContentResponse {
    fn first_parts(&self) -> &[ResponsePart] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or_default()
    }

    /// Text of the first candidate, thought parts excluded. None if there is no text at all.
    fn text(&self) -> Option<String> {
        let texts: Vec<&str> = self
            .first_parts()
            .iter()
            .filter(|p| !p.thought.unwrap_or(false))
            .filter_map(|p| p.text.as_deref())
            .collect();

        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    }

    /// First inline image of the first candidate.
    fn first_image(&self) -> Option<DishImage> {
        self.first_parts()
            .iter()
            .find_map(|p| p.inline_data.as_ref())
            .map(|d| DishImage::new(d.mime_type.clone(), d.data.clone()))
    }
}

fn recipe_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING" },
            "ingredients": { "type": "ARRAY", "items": { "type": "STRING" } },
            "steps": { "type": "ARRAY", "items": { "type": "STRING" } },
            "tips": { "type": "STRING" }
        },
        "required": ["title", "ingredients", "steps", "tips"]
    })
}

fn square_image_config() -> GenerationConfig {
    GenerationConfig {
        image_config: Some(ImageConfig {
            aspect_ratio: SQUARE.to_string(),
        }),
        ..Default::default()
    }
}

/// Parses the model's JSON answer. Empty or malformed text is not an error here.
fn parse_recipe(text: Option<&str>) -> Option<Recipe> {
    let text = text?;
    if text.is_empty() {
        return None;
    }

    match serde_json::from_str::<Recipe>(text) {
        Ok(recipe) => Some(recipe),
        Err(e) => {
            log::error!("Failed to parse recipe JSON: {}", e);
            None
        }
    }
}

/// Google Gemini client covering recipe text, dish images and image edits
pub struct GeminiService {
    api_key: String,
    api_base: String,
    text_model: String,
    image_model: String,
    client: reqwest::Client,
}

impl GeminiService {
    pub fn new(api_key: String, text_model: String, image_model: String) -> Self {
        Self {
            api_key,
            api_base: DEFAULT_API_BASE.to_string(),
            text_model,
            image_model,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.api_base, model)
    }

    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        log::info!("🤖 Sending request to Gemini with model: {}", model);
        log::debug!("📤 Request payload size: {} bytes", serde_json::to_string(request)?.len());

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        log::debug!("📥 Gemini response status: {}", status);

        if !status.is_success() {
            let error_text = response.text().await?;
            log::error!("❌ Gemini API error response: {}", error_text);
            anyhow::bail!("Gemini API error ({}): {}", status, error_text);
        }

        let response_text = response.text().await?;
        log::debug!("📄 Raw Gemini response size: {} bytes", response_text.len());

        Ok(serde_json::from_str(&response_text)?)
    }

    async fn request_recipe(&self, query: &IngredientQuery) -> Result<Option<Recipe>> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::Text {
                    text: format!(
                        "다음 재료들을 활용한 추천 레시피를 하나 알려주세요: {}",
                        query.as_str()
                    ),
                }],
            }],
            system_instruction: Some(Content {
                parts: vec![Part::Text {
                    text: RECIPE_SYSTEM_INSTRUCTION.to_string(),
                }],
            }),
            generation_config: GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(recipe_schema()),
                ..Default::default()
            },
        };

        let response = self.generate_content(&self.text_model, &request).await?;
        Ok(parse_recipe(response.text().as_deref()))
    }

    async fn request_image(&self, subject: &str) -> Result<Option<DishImage>> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::Text {
                    text: format!(
                        "A high-quality, professional food photography of {}, beautifully plated on a modern table, natural lighting.",
                        subject
                    ),
                }],
            }],
            system_instruction: None,
            generation_config: square_image_config(),
        };

        let response = self.generate_content(&self.image_model, &request).await?;
        Ok(response.first_image())
    }

    async fn request_edit(&self, edit: EditRequest) -> Result<Option<DishImage>> {
        let EditRequest {
            source_image,
            instruction,
        } = edit;

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: source_image.mime_type,
                            data: source_image.data,
                        },
                    },
                    Part::Text {
                        text: format!(
                            "Modify this food image as requested: {}. Maintain the original dish structure but apply the edits naturally.",
                            instruction
                        ),
                    },
                ],
            }],
            system_instruction: None,
            generation_config: square_image_config(),
        };

        let response = self.generate_content(&self.image_model, &request).await?;
        Ok(response.first_image())
    }
}

#[async_trait::async_trait]
impl GenerativeService for GeminiService {
    async fn generate_recipe(&self, query: &IngredientQuery) -> Generation<Recipe> {
        log::info!("🍳 Requesting recipe for: {}", query.as_str());
        let outcome = Generation::from_result(self.request_recipe(query).await);
        if let Generation::Ready(recipe) = &outcome {
            log::info!("✅ Recipe received: {}", recipe.title);
        }
        outcome
    }

    async fn generate_image(&self, subject: &str) -> Generation<DishImage> {
        log::info!("📸 Requesting dish image for: {}", subject);
        let outcome = Generation::from_result(self.request_image(subject).await);
        if let Generation::Ready(image) = &outcome {
            log::debug!("🖼️ Image received: {} ({} base64 chars)", image.mime_type, image.data.len());
        }
        outcome
    }

    async fn edit_image(&self, request: EditRequest) -> Generation<DishImage> {
        log::info!("🎨 Requesting image edit: {}", request.instruction);
        Generation::from_result(self.request_edit(request).await)
    }
}
