use anyhow::Result;
use base64::{engine::general_purpose, Engine};
use serde::{Deserialize, Serialize};

/// Free-form ingredient text typed by the user ("달걀, 대파, 우유...")
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngredientQuery(String);

impl IngredientQuery {
    /// Returns None for empty or whitespace-only input. The text itself is kept verbatim.
    pub fn parse(text: &str) -> Option<Self> {
        if text.trim().is_empty() {
            None
        } else {
            Some(Self(text.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub title: String,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    pub tips: String,
}

/// A complete generated image. Travels as a `data:<mime>;base64,<payload>` URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct DishImage {
    pub mime_type: String,
    pub data: String, // base64, passed through untouched
}

impl DishImage {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Splits a data URI back into MIME type and payload.
    pub fn parse_data_uri(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| anyhow::anyhow!("Not a data URI"))?;
        let (header, data) = rest
            .split_once(',')
            .ok_or_else(|| anyhow::anyhow!("Data URI has no payload separator"))?;
        let mime_type = header.split(';').next().unwrap_or_default();

        if mime_type.is_empty() {
            anyhow::bail!("Data URI has no MIME type");
        }

        Ok(Self::new(mime_type, data))
    }

    pub fn decoded_bytes(&self) -> Result<Vec<u8>> {
        Ok(general_purpose::STANDARD.decode(&self.data)?)
    }
}

impl From<DishImage> for String {
    fn from(image: DishImage) -> Self {
        image.to_data_uri()
    }
}

impl TryFrom<String> for DishImage {
    type Error = anyhow::Error;

    fn try_from(uri: String) -> Result<Self> {
        Self::parse_data_uri(&uri)
    }
}

/// One edit round: consumed by the adapter, never stored.
#[derive(Debug, Clone)]
pub struct EditRequest {
    pub source_image: DishImage,
    pub instruction: String,
}

impl EditRequest {
    pub fn new(source_image: DishImage, instruction: &str) -> Option<Self> {
        if instruction.trim().is_empty() {
            return None;
        }

        Some(Self {
            source_image,
            instruction: instruction.to_string(),
        })
    }
}
