use crate::models::{DishImage, EditRequest, IngredientQuery, Recipe};

/// Result of one call to the generative service.
///
/// `Empty` means the call went through but produced nothing usable (unparseable
/// recipe, no image part). `TransportError` is reserved for network, auth and
/// HTTP-level failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation<T> {
    Ready(T),
    Empty,
    TransportError(String),
}

impl<T> Generation<T> {
    /// Folds the adapter's internal `Result<Option<T>>` into the three-way outcome.
    pub fn from_result(result: anyhow::Result<Option<T>>) -> Self {
        match result {
            Ok(Some(value)) => Generation::Ready(value),
            Ok(None) => Generation::Empty,
            Err(e) => Generation::TransportError(format!("{:#}", e)),
        }
    }
}

/// Trait for generative AI backends (Gemini, test doubles, ...)
#[async_trait::async_trait]
pub trait GenerativeService: Send + Sync {
    async fn generate_recipe(&self, query: &IngredientQuery) -> Generation<Recipe>;
    async fn generate_image(&self, subject: &str) -> Generation<DishImage>;
    async fn edit_image(&self, request: EditRequest) -> Generation<DishImage>;
}
