use std::sync::Arc;
use tokio::sync::watch;

use crate::handlers::Notifier;
use crate::models::{DishImage, EditRequest, IngredientQuery, Recipe};
use crate::services::{GenerativeService, Generation};

pub const RECOMMEND_FAILED_NOTICE: &str = "추천을 불러오는 중 오류가 발생했습니다.";
pub const EDIT_FAILED_NOTICE: &str = "이미지 편집 중 오류가 발생했습니다.";

/// Progress of the recommend workflow.
///
/// `FetchingImage` is only entered once a recipe has been stored, so an image
/// fetch without a recipe on screen cannot be expressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecommendStatus {
    #[default]
    Idle,
    FetchingRecipe,
    FetchingImage,
    SoftFailed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EditStatus {
    #[default]
    Idle,
    Editing,
    SoftFailed,
}

/// Everything the page renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KitchenState {
    pub ingredients: String,
    pub recipe: Option<Recipe>,
    pub image: Option<DishImage>,
    pub edit_prompt: String,
    pub recommend: RecommendStatus,
    pub edit: EditStatus,
}

impl KitchenState {
    pub fn is_loading(&self) -> bool {
        matches!(
            self.recommend,
            RecommendStatus::FetchingRecipe | RecommendStatus::FetchingImage
        )
    }

    pub fn is_image_loading(&self) -> bool {
        self.recommend == RecommendStatus::FetchingImage
    }

    pub fn is_editing(&self) -> bool {
        self.edit == EditStatus::Editing
    }

    /// Edit input and button are shown and enabled
    pub fn edit_enabled(&self) -> bool {
        self.image.is_some() && !self.is_editing()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowOutcome {
    Completed,
    SoftFailure,
    Failed,
}

/// Puts a workflow status back to rest when dropped, on every exit path.
struct StatusReset<'a> {
    state: &'a watch::Sender<KitchenState>,
    apply: fn(&mut KitchenState, bool),
    soft_failed: bool,
}

impl Drop for StatusReset<'_> {
    fn drop(&mut self) {
        let (apply, soft_failed) = (self.apply, self.soft_failed);
        self.state.send_modify(|s| apply(s, soft_failed));
    }
}

fn rest_recommend(state: &mut KitchenState, soft_failed: bool) {
    state.recommend = if soft_failed {
        RecommendStatus::SoftFailed
    } else {
        RecommendStatus::Idle
    };
}

fn rest_edit(state: &mut KitchenState, soft_failed: bool) {
    state.edit = if soft_failed {
        EditStatus::SoftFailed
    } else {
        EditStatus::Idle
    };
}

/// Owns the kitchen UI state and runs the recommend / edit-image workflows
pub struct KitchenOrchestrator {
    service: Arc<dyn GenerativeService>,
    notifier: Arc<dyn Notifier>,
    state: watch::Sender<KitchenState>,
}

impl KitchenOrchestrator {
    pub fn new(service: Arc<dyn GenerativeService>, notifier: Arc<dyn Notifier>) -> Self {
        let (state, _) = watch::channel(KitchenState::default());
        Self {
            service,
            notifier,
            state,
        }
    }

    pub fn snapshot(&self) -> KitchenState {
        self.state.borrow().clone()
    }

    /// Receives a fresh snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<KitchenState> {
        self.state.subscribe()
    }

    pub fn set_ingredients(&self, text: impl Into<String>) {
        let text = text.into();
        self.state.send_modify(|s| s.ingredients = text);
    }

    pub fn set_edit_prompt(&self, text: impl Into<String>) {
        let text = text.into();
        self.state.send_modify(|s| s.edit_prompt = text);
    }

    /// Recipe for the query, then a photo of the dish.
    ///
    /// Publishes the cleared, busy state before its first await, so a subscriber
    /// taken beforehand always sees at least one change. Blank input never gets
    /// here: `IngredientQuery::parse` rejects it.
    pub async fn recommend(&self, query: IngredientQuery) -> WorkflowOutcome {
        self.state.send_modify(|s| {
            s.recipe = None;
            s.image = None;
            s.recommend = RecommendStatus::FetchingRecipe;
        });

        let mut reset = StatusReset {
            state: &self.state,
            apply: rest_recommend,
            soft_failed: false,
        };

        let outcome = self.run_recommend(&query).await;
        reset.soft_failed = outcome == WorkflowOutcome::SoftFailure;
        outcome
    }

    async fn run_recommend(&self, query: &IngredientQuery) -> WorkflowOutcome {
        let recipe = match self.service.generate_recipe(query).await {
            Generation::Ready(recipe) => recipe,
            Generation::Empty => {
                log::warn!("⚠️ Recipe response had no usable content");
                return WorkflowOutcome::SoftFailure;
            }
            Generation::TransportError(detail) => {
                return self
                    .fail("Error generating recommendation", &detail, RECOMMEND_FAILED_NOTICE)
                    .await;
            }
        };

        let title = recipe.title.clone();
        self.state.send_modify(|s| {
            s.recipe = Some(recipe);
            s.recommend = RecommendStatus::FetchingImage;
        });

        match self.service.generate_image(&title).await {
            Generation::Ready(image) => {
                self.state.send_modify(|s| s.image = Some(image));
                log::info!("✅ Recommendation ready: {}", title);
                WorkflowOutcome::Completed
            }
            Generation::Empty => {
                log::warn!("⚠️ No image part returned for: {}", title);
                WorkflowOutcome::SoftFailure
            }
            Generation::TransportError(detail) => {
                self.fail("Error generating recommendation", &detail, RECOMMEND_FAILED_NOTICE)
                    .await
            }
        }
    }

    /// Applies an edit instruction to the image it carries.
    ///
    /// Publishes the editing state before its first await.
    pub async fn edit_image(&self, request: EditRequest) -> WorkflowOutcome {
        self.state.send_modify(|s| s.edit = EditStatus::Editing);

        let mut reset = StatusReset {
            state: &self.state,
            apply: rest_edit,
            soft_failed: false,
        };

        let outcome = match self.service.edit_image(request).await {
            Generation::Ready(image) => {
                self.state.send_modify(|s| {
                    s.image = Some(image);
                    s.edit_prompt.clear();
                });
                log::info!("✅ Image edited");
                WorkflowOutcome::Completed
            }
            Generation::Empty => {
                log::warn!("⚠️ Edit returned no image, keeping the previous one");
                WorkflowOutcome::SoftFailure
            }
            Generation::TransportError(detail) => {
                self.fail("Error editing image", &detail, EDIT_FAILED_NOTICE).await
            }
        };

        reset.soft_failed = outcome == WorkflowOutcome::SoftFailure;
        outcome
    }

    async fn fail(&self, context: &str, detail: &str, notice: &str) -> WorkflowOutcome {
        log::error!("❌ {}: {}", context, detail);
        self.notifier.notify(notice).await;
        WorkflowOutcome::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::NoticeBoard;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    /// Test double that answers from queues and records what it was asked.
    #[derive(Default)]
    struct ScriptedService {
        recipes: Mutex<VecDeque<Generation<Recipe>>>,
        images: Mutex<VecDeque<Generation<DishImage>>>,
        edits: Mutex<VecDeque<Generation<DishImage>>>,
        calls: Mutex<Vec<String>>,
        recipe_entered: Mutex<Option<oneshot::Sender<()>>>,
        recipe_gate: Mutex<Option<oneshot::Receiver<()>>>,
    }

    impl ScriptedService {
        fn push_recipe(&self, outcome: Generation<Recipe>) {
            self.recipes.lock().unwrap().push_back(outcome);
        }

        fn push_image(&self, outcome: Generation<DishImage>) {
            self.images.lock().unwrap().push_back(outcome);
        }

        fn push_edit(&self, outcome: Generation<DishImage>) {
            self.edits.lock().unwrap().push_back(outcome);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl GenerativeService for ScriptedService {
        async fn generate_recipe(&self, query: &IngredientQuery) -> Generation<Recipe> {
            self.calls.lock().unwrap().push(format!("recipe:{}", query.as_str()));

            let entered = self.recipe_entered.lock().unwrap().take();
            if let Some(entered) = entered {
                let _ = entered.send(());
            }
            let gate = self.recipe_gate.lock().unwrap().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }

            self.recipes.lock().unwrap().pop_front().unwrap_or(Generation::Empty)
        }

        async fn generate_image(&self, subject: &str) -> Generation<DishImage> {
            self.calls.lock().unwrap().push(format!("image:{}", subject));
            self.images.lock().unwrap().pop_front().unwrap_or(Generation::Empty)
        }

        async fn edit_image(&self, request: EditRequest) -> Generation<DishImage> {
            self.calls.lock().unwrap().push(format!(
                "edit:{}:{}",
                request.source_image.data, request.instruction
            ));
            self.edits.lock().unwrap().pop_front().unwrap_or(Generation::Empty)
        }
    }

    fn kimchi_rice() -> Recipe {
        Recipe {
            title: "Kimchi Fried Rice".to_string(),
            ingredients: vec!["rice".to_string(), "kimchi".to_string()],
            steps: vec!["fry kimchi".to_string(), "add rice".to_string()],
            tips: "use day-old rice".to_string(),
        }
    }

    fn query(text: &str) -> IngredientQuery {
        IngredientQuery::parse(text).unwrap()
    }

    /// Edit request for the image currently on screen, if any
    fn edit_for(kitchen: &KitchenOrchestrator, instruction: &str) -> Option<EditRequest> {
        kitchen.set_edit_prompt(instruction);
        kitchen
            .snapshot()
            .image
            .and_then(|image| EditRequest::new(image, instruction))
    }

    fn setup() -> (Arc<ScriptedService>, Arc<NoticeBoard>, Arc<KitchenOrchestrator>) {
        let service = Arc::new(ScriptedService::default());
        let notices = Arc::new(NoticeBoard::new());
        let kitchen = Arc::new(KitchenOrchestrator::new(service.clone(), notices.clone()));
        (service, notices, kitchen)
    }

    /// Kitchen that already shows a recipe and its photo
    async fn served_kitchen() -> (Arc<ScriptedService>, Arc<NoticeBoard>, Arc<KitchenOrchestrator>) {
        let (service, notices, kitchen) = setup();
        service.push_recipe(Generation::Ready(kimchi_rice()));
        service.push_image(Generation::Ready(DishImage::new("image/png", "AAAA")));
        kitchen.set_ingredients("kimchi, rice");
        assert_eq!(kitchen.recommend(query("kimchi, rice")).await, WorkflowOutcome::Completed);
        (service, notices, kitchen)
    }

    #[tokio::test]
    async fn test_recommend_success() {
        let (service, notices, kitchen) = served_kitchen().await;

        let state = kitchen.snapshot();
        assert_eq!(state.recipe, Some(kimchi_rice()));
        assert_eq!(state.image, Some(DishImage::new("image/png", "AAAA")));
        assert!(!state.is_loading());
        assert!(!state.is_image_loading());
        assert_eq!(
            service.calls(),
            vec!["recipe:kimchi, rice", "image:Kimchi Fried Rice"]
        );
        assert!(notices.take_all().is_empty());
    }

    #[tokio::test]
    async fn test_recommend_uses_given_query_not_shared_text() {
        let (service, _notices, kitchen) = setup();
        service.push_recipe(Generation::Ready(kimchi_rice()));
        service.push_image(Generation::Ready(DishImage::new("image/png", "AAAA")));

        // A later request blanked the shared text before this run started
        kitchen.set_ingredients("   ");
        let mut rx = kitchen.subscribe();

        assert_eq!(kitchen.recommend(query("kimchi, rice")).await, WorkflowOutcome::Completed);

        assert!(rx.has_changed().unwrap());
        assert_eq!(
            service.calls(),
            vec!["recipe:kimchi, rice", "image:Kimchi Fried Rice"]
        );
    }

    #[tokio::test]
    async fn test_recommend_clears_previous_result_before_call_resolves() {
        let (service, _notices, kitchen) = served_kitchen().await;

        let (entered_tx, entered_rx) = oneshot::channel();
        let (gate_tx, gate_rx) = oneshot::channel();
        *service.recipe_entered.lock().unwrap() = Some(entered_tx);
        *service.recipe_gate.lock().unwrap() = Some(gate_rx);
        service.push_recipe(Generation::Empty);

        kitchen.set_ingredients("egg");
        let running = tokio::spawn({
            let kitchen = kitchen.clone();
            async move { kitchen.recommend(query("egg")).await }
        });

        entered_rx.await.unwrap();
        let during = kitchen.snapshot();
        assert!(during.recipe.is_none());
        assert!(during.image.is_none());
        assert!(during.is_loading());
        assert!(!during.is_image_loading());
        assert!(!during.edit_enabled());

        gate_tx.send(()).unwrap();
        assert_eq!(running.await.unwrap(), WorkflowOutcome::SoftFailure);
    }

    #[tokio::test]
    async fn test_recommend_empty_recipe_skips_image() {
        let (service, notices, kitchen) = setup();
        service.push_recipe(Generation::Empty);

        assert_eq!(kitchen.recommend(query("stone")).await, WorkflowOutcome::SoftFailure);

        let state = kitchen.snapshot();
        assert!(state.recipe.is_none());
        assert_eq!(state.recommend, RecommendStatus::SoftFailed);
        assert!(!state.is_loading());
        assert_eq!(service.calls(), vec!["recipe:stone"]);
        assert!(notices.take_all().is_empty());
    }

    #[tokio::test]
    async fn test_recommend_keeps_recipe_when_image_missing() {
        let (service, _notices, kitchen) = setup();
        service.push_recipe(Generation::Ready(kimchi_rice()));
        service.push_image(Generation::Empty);

        assert_eq!(kitchen.recommend(query("kimchi")).await, WorkflowOutcome::SoftFailure);

        let state = kitchen.snapshot();
        assert_eq!(state.recipe, Some(kimchi_rice()));
        assert!(state.image.is_none());
        assert!(!state.is_image_loading());
    }

    #[tokio::test]
    async fn test_recommend_transport_error() {
        let (service, notices, kitchen) = setup();
        service.push_recipe(Generation::TransportError("connection refused".to_string()));

        assert_eq!(kitchen.recommend(query("egg, milk")).await, WorkflowOutcome::Failed);

        let state = kitchen.snapshot();
        assert!(state.recipe.is_none());
        assert!(state.image.is_none());
        assert!(!state.is_loading());
        assert!(!state.is_image_loading());
        assert_eq!(state.recommend, RecommendStatus::Idle);
        assert_eq!(service.calls(), vec!["recipe:egg, milk"]);
        assert_eq!(notices.take_all(), vec![RECOMMEND_FAILED_NOTICE]);
    }

    #[tokio::test]
    async fn test_recommend_image_transport_error_keeps_recipe() {
        let (service, notices, kitchen) = setup();
        service.push_recipe(Generation::Ready(kimchi_rice()));
        service.push_image(Generation::TransportError("quota exceeded".to_string()));

        assert_eq!(kitchen.recommend(query("kimchi")).await, WorkflowOutcome::Failed);

        let state = kitchen.snapshot();
        assert_eq!(state.recipe, Some(kimchi_rice()));
        assert!(state.image.is_none());
        assert!(!state.is_loading());
        assert_eq!(notices.take_all(), vec![RECOMMEND_FAILED_NOTICE]);
    }

    #[tokio::test]
    async fn test_edit_needs_image_and_instruction() {
        let (_service, _notices, kitchen) = setup();
        assert!(edit_for(&kitchen, "파슬리 가루 뿌려줘").is_none());
        assert!(!kitchen.snapshot().edit_enabled());

        let (_service, _notices, kitchen) = served_kitchen().await;
        assert!(edit_for(&kitchen, " \t ").is_none());
        assert!(kitchen.snapshot().edit_enabled());
    }

    #[tokio::test]
    async fn test_edit_replaces_image_and_clears_prompt() {
        let (service, _notices, kitchen) = served_kitchen().await;
        service.push_edit(Generation::Ready(DishImage::new("image/jpeg", "BBBB")));

        let request = edit_for(&kitchen, "더 매콤하게 보여줘").unwrap();
        assert_eq!(kitchen.edit_image(request).await, WorkflowOutcome::Completed);

        let state = kitchen.snapshot();
        assert_eq!(state.image, Some(DishImage::new("image/jpeg", "BBBB")));
        assert!(state.edit_prompt.is_empty());
        assert!(!state.is_editing());
        assert_eq!(service.calls()[2], "edit:AAAA:더 매콤하게 보여줘");
    }

    #[tokio::test]
    async fn test_edit_soft_failure_keeps_image() {
        let (service, notices, kitchen) = served_kitchen().await;
        service.push_edit(Generation::Empty);

        let request = edit_for(&kitchen, "add basil").unwrap();
        assert_eq!(kitchen.edit_image(request).await, WorkflowOutcome::SoftFailure);

        let state = kitchen.snapshot();
        assert_eq!(state.image, Some(DishImage::new("image/png", "AAAA")));
        assert_eq!(state.edit_prompt, "add basil");
        assert_eq!(state.edit, EditStatus::SoftFailed);
        assert!(!state.is_editing());
        assert!(notices.take_all().is_empty());
    }

    #[tokio::test]
    async fn test_edit_transport_error() {
        let (service, notices, kitchen) = served_kitchen().await;
        service.push_edit(Generation::TransportError("timeout".to_string()));

        let request = edit_for(&kitchen, "add basil").unwrap();
        assert_eq!(kitchen.edit_image(request).await, WorkflowOutcome::Failed);

        let state = kitchen.snapshot();
        assert_eq!(state.image, Some(DishImage::new("image/png", "AAAA")));
        assert!(!state.is_editing());
        assert_eq!(notices.take_all(), vec![EDIT_FAILED_NOTICE]);
    }

    #[test]
    fn test_edit_enabled_gate() {
        let mut state = KitchenState::default();
        assert!(!state.edit_enabled());

        state.image = Some(DishImage::new("image/png", "AAAA"));
        assert!(state.edit_enabled());

        state.edit = EditStatus::Editing;
        assert!(!state.edit_enabled());

        state.edit = EditStatus::SoftFailed;
        assert!(state.edit_enabled());
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let (service, _notices, kitchen) = setup();
        let mut rx = kitchen.subscribe();
        service.push_recipe(Generation::Ready(kimchi_rice()));
        service.push_image(Generation::Ready(DishImage::new("image/png", "AAAA")));

        kitchen.set_ingredients("kimchi");
        kitchen.recommend(query("kimchi")).await;

        assert!(rx.has_changed().unwrap());
        let latest = rx.borrow_and_update().clone();
        assert_eq!(latest.recipe.map(|r| r.title), Some("Kimchi Fried Rice".to_string()));
        assert!(latest.image.is_some());
    }
}
