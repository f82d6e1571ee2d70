//! Employee profiles
//!
//! One profile per employee account, created with the user. The public
//! listing runs through an aggregation so that only employees whose account
//! is active are shown, with city and service names in the caller's language.

use super::user::{self, User};
use crate::core::auth::AuthPolicy;
use crate::core::context::Scope;
use crate::core::error::ApiResult;
use crate::core::factory::AggregatePlan;
use crate::core::filter::FilterPredicate;
use crate::core::pipeline::{Projection, Stage};
use crate::core::populate::PopulateSpec;
use crate::core::projection::StandardView;
use crate::core::resource::{Resource, ResourceDescriptor, WritePolicy};
use crate::core::store::SortSpec;
use crate::resource_fields;
use crate::server::{AppState, ResourceRoutes, guarded};
use async_trait::async_trait;
use axum::Router;
use serde::{Deserialize, Serialize};
use validator::Validate;

resource_fields! {
    pub enum EmployeeField {
        User => "user",
        Age => "age",
        Service => "service",
        Experience => "experience",
        Description => "description",
        IsAvailable => "isAvailable",
        WorkIn => "workIn",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    /// Owning user account
    #[validate(length(min = 1, message = "user is required"))]
    pub user: String,

    #[serde(default)]
    #[validate(range(min = 14, max = 150, message = "age must be between 14 and 150"))]
    pub age: Option<u32>,

    /// Service (trade) id
    #[serde(default)]
    pub service: Option<String>,

    /// Years of experience
    #[serde(default)]
    #[validate(range(min = 1, max = 100, message = "experience must be between 1 and 100"))]
    pub experience: Option<u32>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default = "available")]
    pub is_available: bool,

    /// Ids of the cities the employee works in
    #[serde(default)]
    pub work_in: Vec<String>,
}

fn available() -> bool {
    true
}

impl Employee {
    /// Fresh profile of a new employee account, working in its home city
    pub fn for_user(user: &str, city: Option<&str>) -> Self {
        Self {
            user: user.to_string(),
            age: None,
            service: None,
            experience: None,
            description: None,
            is_available: true,
            work_in: city.map(|c| vec![c.to_string()]).unwrap_or_default(),
        }
    }
}

impl Resource for Employee {
    type Field = EmployeeField;

    const NAME: &'static str = "employee";
    const COLLECTION: &'static str = "employees";
}

pub fn descriptor() -> ResourceDescriptor<Employee> {
    ResourceDescriptor::new()
        .write_policy(WritePolicy::deny(&[EmployeeField::User]))
        .search(&["user.name", "user.username"])
        .populate(PopulateSpec::reference("workIn", "cities").select(&["name"]))
        .populate(PopulateSpec::reference("service", "services").select(&["name"]))
        .populate(
            PopulateSpec::reference("user", User::COLLECTION)
                .nested(PopulateSpec::reference("city", "cities").select(&["name"])),
        )
        .projector(
            StandardView::new()
                .name_of("workIn")
                .name_of("service")
                .name_of("user.city")
                .shared(),
        )
        .unique("user")
}

/// Public listing: active employees with their names resolved
pub fn listing() -> AggregatePlan {
    AggregatePlan::new(|language| {
        Projection::new()
            .field("id", "user._id")
            .localized("workIn", "workIn.name", language)
            .field("name", "user.name")
            .localized("city", "user.city.name", language)
            .field("username", "user.username")
            .field("avgRating", "user.avgRating")
            .field("ratingQty", "user.ratingQty")
            .field("isAvailable", "isAvailable")
            .field("image", "user.image")
            .localized("service", "service.name", language)
    })
    .lead(Stage::lookup(User::COLLECTION, "user", "_id", "user"))
    .lead(Stage::unwind("user"))
    .lead(Stage::Match(FilterPredicate::eq("user.status", "active")))
    .then(Stage::lookup("services", "service", "_id", "service"))
    .then(Stage::unwind("service"))
    .then(Stage::lookup("cities", "workIn", "_id", "workIn"))
    .then(Stage::lookup("cities", "user.city", "_id", "user.city"))
    .then(Stage::Unwind {
        path: "user.city".to_string(),
        preserve_empty: true,
    })
    .then(Stage::Sort(SortSpec::descending("user.createdAt")))
}

pub struct EmployeeRoutes;

#[async_trait]
impl ResourceRoutes for EmployeeRoutes {
    fn resource_name(&self) -> &str {
        Employee::NAME
    }

    fn plural(&self) -> &str {
        Employee::COLLECTION
    }

    fn build_routes(&self, state: &AppState) -> Router {
        let handlers = state.handlers(descriptor());

        // employee pages are user documents with the profile merged in
        let by_username = state
            .handlers(user::descriptor(state.store.clone()))
            .scoped(
                Scope::new()
                    .constrain("type", "employee")
                    .constrain("status", "active"),
            )
            .get_one_by("username");

        let admin = Router::new().route(
            "/{id}",
            handlers.get_one().merge(handlers.update_one()),
        );

        Router::new()
            .route("/", handlers.get_all_aggregate(listing()))
            .route("/username/{username}", by_username)
            .merge(guarded(admin, AuthPolicy::AdminOnly))
    }

    async fn ensure_indexes(&self, state: &AppState) -> ApiResult<()> {
        state.factory(descriptor()).ensure_indexes().await
    }
}
