//! Reviews users leave each other
//!
//! Every write recomputes the rated user's `avgRating` and `ratingQty` from
//! their approved reviews.

use super::notification::{NotificationKind, notify};
use super::user::{User, UsernameResolver};
use super::end_users;
use crate::core::auth::AuthPolicy;
use crate::core::context::CallerBinding;
use crate::core::error::{ApiResult, HookError};
use crate::core::filter::FilterPredicate;
use crate::core::hooks::{Cleanup, SideEffect};
use crate::core::populate::PopulateSpec;
use crate::core::projection::StandardView;
use crate::core::resource::{Resource, ResourceDescriptor, WritePhase, WritePolicy};
use crate::core::store::{DocumentStore, FindOptions};
use crate::resource_fields;
use crate::server::{AppState, ResourceRoutes, guarded};
use async_trait::async_trait;
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use validator::Validate;

resource_fields! {
    pub enum ReviewField {
        Stars => "stars",
        Comment => "comment",
        Rated => "rated",
        Rater => "rater",
        Status => "status",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    #[default]
    Approved,
    Disapproved,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Review {
    #[validate(range(min = 1, max = 5, message = "stars must be between 1 and 5"))]
    pub stars: u8,

    #[serde(default)]
    pub comment: Option<String>,

    /// Reviewed user
    #[validate(length(min = 1, message = "rated is required"))]
    pub rated: String,

    /// Author
    #[validate(length(min = 1, message = "rater is required"))]
    pub rater: String,

    #[serde(default)]
    pub status: ReviewStatus,
}

impl Resource for Review {
    type Field = ReviewField;

    const NAME: &'static str = "review";
    const COLLECTION: &'static str = "reviews";

    fn prepare(&mut self, _phase: WritePhase) {
        self.comment = self.comment.as_ref().map(|comment| comment.trim().to_string());
    }
}

/// Average of approved stars rounded to one decimal, and their count
pub fn rating_of(reviews: &[Value]) -> (f64, usize) {
    let stars: Vec<f64> = reviews
        .iter()
        .filter_map(|review| review.get("stars").and_then(Value::as_f64))
        .collect();
    if stars.is_empty() {
        return (0.0, 0);
    }
    let average = stars.iter().sum::<f64>() / stars.len() as f64;
    ((average * 10.0).round() / 10.0, stars.len())
}

/// Recompute the rating of a user from their approved reviews
pub async fn recalculate(store: &dyn DocumentStore, user: &str) -> ApiResult<(f64, usize)> {
    let approved = FilterPredicate::eq("rated", user).and(FilterPredicate::eq("status", "approved"));
    let reviews = store
        .find(Review::COLLECTION, &approved, &FindOptions::default())
        .await?;
    let (average, quantity) = rating_of(&reviews);

    let mut fields = Map::new();
    fields.insert("avgRating".to_string(), json!(average));
    fields.insert("ratingQty".to_string(), json!(quantity));
    store
        .set_fields(User::COLLECTION, &FilterPredicate::id(user), fields)
        .await?;

    tracing::debug!(user, average, quantity, "rating recalculated");
    Ok((average, quantity))
}

struct Recalculate {
    store: Arc<dyn DocumentStore>,
}

impl Recalculate {
    async fn refresh(&self, document: &Value) -> Result<(), HookError> {
        let Some(rated) = document.get("rated").and_then(Value::as_str) else {
            return Ok(());
        };
        recalculate(self.store.as_ref(), rated)
            .await
            .map(|_| ())
            .map_err(|e| HookError::Failed {
                hook: "recalculate_rating".to_string(),
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl SideEffect for Recalculate {
    fn name(&self) -> &'static str {
        "recalculate_rating"
    }

    async fn run(&self, document: &Value) -> Result<(), HookError> {
        self.refresh(document).await
    }
}

#[async_trait]
impl Cleanup for Recalculate {
    fn name(&self) -> &'static str {
        "recalculate_rating"
    }

    async fn run(&self, document: &Value) -> Result<(), HookError> {
        self.refresh(document).await
    }
}

/// Tells the rated user who reviewed them
struct NotifyRated {
    store: Arc<dyn DocumentStore>,
}

#[async_trait]
impl SideEffect for NotifyRated {
    fn name(&self) -> &'static str {
        "notify_rated_user"
    }

    async fn run(&self, document: &Value) -> Result<(), HookError> {
        let (Some(rated), Some(rater)) = (
            document.get("rated").and_then(Value::as_str),
            document.get("rater").and_then(Value::as_str),
        ) else {
            return Ok(());
        };

        let rater = self
            .store
            .find_one(User::COLLECTION, &FilterPredicate::id(rater))
            .await?
            .unwrap_or(Value::Null);
        let name = rater.get("name").and_then(Value::as_str).unwrap_or_default();

        let data = json!({
            "image": rater.get("image").cloned().unwrap_or(Value::Null),
            "message": {
                "fr": format!("Vous avez un nouvel avis de {}", name),
                "ar": format!("لديك تقييم جديد من {}", name),
            }
        });
        notify(&self.store, NotificationKind::Review, rated, data)
            .await
            .map(|_| ())
            .map_err(|e| HookError::Failed {
                hook: self.name().to_string(),
                message: e.to_string(),
            })
    }
}

pub fn descriptor(store: Arc<dyn DocumentStore>) -> ResourceDescriptor<Review> {
    let party = |path: &str| {
        PopulateSpec::reference(path, User::COLLECTION).select(&["name", "username", "image"])
    };
    let recalculate = Arc::new(Recalculate {
        store: store.clone(),
    });

    ResourceDescriptor::new()
        .write_policy(WritePolicy::deny(&[ReviewField::Status]))
        .search(&["comment"])
        .user_filter("status", "approved")
        .populate(party("rater"))
        .populate(party("rated"))
        .projector(StandardView::new().shared())
        .after_create(Arc::new(NotifyRated { store }))
        .after_write(recalculate.clone())
        .on_delete(recalculate)
}

pub struct ReviewRoutes;

#[async_trait]
impl ResourceRoutes for ReviewRoutes {
    fn resource_name(&self) -> &str {
        Review::NAME
    }

    fn plural(&self) -> &str {
        Review::COLLECTION
    }

    fn build_routes(&self, state: &AppState) -> Router {
        let handlers = state.handlers(descriptor(state.store.clone()));

        let mine = Router::new()
            .route("/gotten", handlers.bound(CallerBinding::Query("rated")).get_all())
            .route("/given", handlers.bound(CallerBinding::Query("rater")).get_all());

        let write = handlers
            .bound(CallerBinding::Body("rater"))
            .resolving(Arc::new(UsernameResolver::new(state.store.clone(), "rated")))
            .create_one();

        let admin = Router::new().route("/", handlers.get_all()).route(
            "/{id}",
            handlers
                .get_one()
                .merge(handlers.update_one())
                .merge(handlers.delete_one()),
        );

        Router::new()
            .route("/user/{id}", handlers.get_all_matching("rated"))
            .merge(guarded(mine.route("/", write), end_users()))
            .merge(guarded(admin, AuthPolicy::AdminOnly))
    }
}
