//! Marketplace user accounts
//!
//! Every account is either an employee or a client. Creating an account
//! provisions the matching profile ([`Profile`]) and sends a welcome
//! notification; deleting it removes the profile again. Non-admin callers see
//! the profile fields merged into the account.
//!
//! Accounts are also the way other resources address people: appointment and
//! review bodies name their target by username, resolved here by
//! [`UsernameResolver`].

use super::client::{self, Client};
use super::employee::{self, Employee, EmployeeField};
use super::notification::{NotificationKind, notify};
use super::end_users;
use crate::core::auth::{AuthPolicy, UserKind};
use crate::core::context::{CallerBinding, JsonBody, RequestContext, Scope};
use crate::core::document::document_id;
use crate::core::error::{ApiResult, HookError, RequestError, ResourceError};
use crate::core::factory::{Reply, ResourceFactory};
use crate::core::filter::FilterPredicate;
use crate::core::hooks::{Cleanup, SideEffect};
use crate::core::populate::PopulateSpec;
use crate::core::projection::{View, expose_ids, flatten_name, omit};
use crate::core::resource::{Resource, ResourceDescriptor, ResourceField, WritePhase, WritePolicy, slugify};
use crate::core::store::DocumentStore;
use crate::resource_fields;
use crate::server::{AppState, BodyResolver, ResourceRoutes, guarded};
use async_trait::async_trait;
use axum::Router;
use axum::routing::{MethodRouter, patch};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::{Arc, LazyLock};
use uuid::Uuid;
use validator::Validate;

static MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<[a-z]+(\s)*.*\s*>[a-zA-Z0-9\s\n]*</[a-z]*>").expect("markup pattern compiles")
});

static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\(?(212|0)\)?[5-7]?([0-9]{8})$").expect("phone pattern compiles")
});

pub const DEFAULT_AVATAR: &str = "https://storage.googleapis.com/allom3allem1/users/avatar.png";

resource_fields! {
    pub enum UserField {
        Name => "name",
        Username => "username",
        Phone => "phone",
        City => "city",
        Kind => "type",
        Image => "image",
        Sexe => "sexe",
        AvgRating => "avgRating",
        RatingQty => "ratingQty",
        Status => "status",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    #[default]
    Desactive,
    Blocked,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Sexe {
    #[serde(rename = "m")]
    Male,
    #[serde(rename = "f")]
    Female,
    #[default]
    #[serde(rename = "none")]
    Unspecified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[validate(
        length(min = 3, max = 50, message = "name must be between 3 and 50 characters"),
        custom(function = "no_markup")
    )]
    pub name: String,

    /// Generated on create
    #[serde(default)]
    pub username: Option<String>,

    #[validate(
        length(min = 10, max = 13, message = "phone must be between 10 and 13 characters"),
        custom(function = "moroccan_phone")
    )]
    pub phone: String,

    /// City id
    #[validate(length(min = 1, message = "city is required"))]
    pub city: String,

    #[serde(rename = "type")]
    pub kind: UserKind,

    #[serde(default = "default_avatar")]
    pub image: String,

    #[serde(default)]
    pub sexe: Sexe,

    #[serde(default)]
    #[validate(range(min = 0.0, max = 5.0, message = "avgRating must be between 0 and 5"))]
    pub avg_rating: f64,

    #[serde(default)]
    pub rating_qty: u32,

    #[serde(default)]
    pub status: UserStatus,
}

fn default_avatar() -> String {
    DEFAULT_AVATAR.to_string()
}

fn no_markup(name: &str) -> Result<(), validator::ValidationError> {
    if MARKUP.is_match(name) {
        let mut error = validator::ValidationError::new("markup");
        error.message = Some("name must not contain markup".into());
        return Err(error);
    }
    Ok(())
}

fn moroccan_phone(phone: &str) -> Result<(), validator::ValidationError> {
    if !PHONE.is_match(phone) {
        let mut error = validator::ValidationError::new("phone");
        error.message = Some("phone must be a Moroccan number".into());
        return Err(error);
    }
    Ok(())
}

impl User {
    /// `e-`/`c-`, the slug of the name and four random digits
    pub fn generate_username(&self) -> String {
        let prefix = match self.kind {
            UserKind::Employee => "e",
            UserKind::Client => "c",
        };
        let digits = Uuid::new_v4().as_u128() % 10_000;
        format!("{}-{}-{:04}", prefix, slugify(&self.name, '-'), digits)
    }
}

impl Resource for User {
    type Field = UserField;

    const NAME: &'static str = "user";
    const COLLECTION: &'static str = "users";

    fn prepare(&mut self, phase: WritePhase) {
        self.name = self.name.trim().to_string();
        if phase == WritePhase::Create || self.username.is_none() {
            self.username = Some(self.generate_username());
        }
        self.avg_rating = (self.avg_rating * 10.0).round() / 10.0;
    }
}

/// The profile owned by an account, by account type
#[derive(Debug, Clone, PartialEq)]
pub enum Profile {
    Employee(Employee),
    Client(Client),
}

impl Profile {
    /// Fresh profile for a stored account
    pub fn for_account(kind: UserKind, user: &str, city: Option<&str>) -> Self {
        match kind {
            UserKind::Employee => Profile::Employee(Employee::for_user(user, city)),
            UserKind::Client => Profile::Client(Client {
                user: user.to_string(),
            }),
        }
    }

    pub fn collection(kind: UserKind) -> &'static str {
        match kind {
            UserKind::Employee => Employee::COLLECTION,
            UserKind::Client => Client::COLLECTION,
        }
    }

    pub async fn insert(self, store: &Arc<dyn DocumentStore>) -> ApiResult<Value> {
        match self {
            Profile::Employee(profile) => {
                ResourceFactory::new(store.clone(), employee::descriptor())
                    .insert(profile)
                    .await
            }
            Profile::Client(profile) => {
                ResourceFactory::new(store.clone(), client::descriptor())
                    .insert(profile)
                    .await
            }
        }
    }
}

impl Profile {
    /// The profile populated under the account's type key
    ///
    /// Reference fields may already hold display names instead of ids.
    fn populated(kind: UserKind, account: &Value) -> Option<Self> {
        let profile = account.get(kind.field())?.clone();
        let parsed = match kind {
            UserKind::Employee => serde_json::from_value(profile).map(Profile::Employee),
            UserKind::Client => serde_json::from_value(profile).map(Profile::Client),
        };
        match parsed {
            Ok(profile) => Some(profile),
            Err(error) => {
                tracing::debug!(%error, "populated profile left out of the account view");
                None
            }
        }
    }

    /// Copy the public profile fields onto the account view
    ///
    /// Profile values win over account values of the same name; unset
    /// optional fields are left out.
    pub fn merge_into(self, account: &mut Map<String, Value>) {
        let mut put = |field: EmployeeField, value: Value| {
            account.insert(field.as_str().to_string(), value);
        };

        match self {
            Profile::Employee(Employee {
                user: _,
                age,
                service,
                experience,
                description,
                is_available,
                work_in,
            }) => {
                if let Some(age) = age {
                    put(EmployeeField::Age, json!(age));
                }
                if let Some(service) = service {
                    put(EmployeeField::Service, json!(service));
                }
                if let Some(experience) = experience {
                    put(EmployeeField::Experience, json!(experience));
                }
                if let Some(description) = description {
                    put(EmployeeField::Description, json!(description));
                }
                put(EmployeeField::IsAvailable, json!(is_available));
                put(EmployeeField::WorkIn, json!(work_in));
            }
            // a client profile only links back to its account
            Profile::Client(Client { user: _ }) => {}
        }
    }
}

fn account_kind(document: &Value) -> Option<UserKind> {
    document
        .get(UserField::Kind.as_str())
        .cloned()
        .and_then(|kind| serde_json::from_value(kind).ok())
}

/// Creates the employee or client profile of a new account
struct ProvisionProfile {
    store: Arc<dyn DocumentStore>,
}

#[async_trait]
impl SideEffect for ProvisionProfile {
    fn name(&self) -> &'static str {
        "provision_profile"
    }

    async fn run(&self, document: &Value) -> Result<(), HookError> {
        let (Some(id), Some(kind)) = (document_id(document), account_kind(document)) else {
            return Ok(());
        };
        let city = document.get(UserField::City.as_str()).and_then(Value::as_str);

        Profile::for_account(kind, id, city)
            .insert(&self.store)
            .await
            .map(|_| ())
            .map_err(|e| HookError::Failed {
                hook: self.name().to_string(),
                message: e.to_string(),
            })
    }
}

struct Welcome {
    store: Arc<dyn DocumentStore>,
}

#[async_trait]
impl SideEffect for Welcome {
    fn name(&self) -> &'static str {
        "welcome_notification"
    }

    async fn run(&self, document: &Value) -> Result<(), HookError> {
        let Some(id) = document_id(document) else {
            return Ok(());
        };
        let name = document
            .get(UserField::Name.as_str())
            .and_then(Value::as_str)
            .unwrap_or_default();

        let data = json!({
            "message": {
                "fr": format!("Bienvenu {} sur AlloM3allem", name),
                "ar": format!("مرحبًا بك {} في الومعلم", name),
            }
        });
        notify(&self.store, NotificationKind::Welcome, id, data)
            .await
            .map(|_| ())
            .map_err(|e| HookError::Failed {
                hook: self.name().to_string(),
                message: e.to_string(),
            })
    }
}

/// Deletes the profile of a removed account
struct RemoveProfile {
    store: Arc<dyn DocumentStore>,
}

#[async_trait]
impl Cleanup for RemoveProfile {
    fn name(&self) -> &'static str {
        "remove_profile"
    }

    async fn run(&self, document: &Value) -> Result<(), HookError> {
        let (Some(id), Some(kind)) = (document_id(document), account_kind(document)) else {
            return Ok(());
        };

        self.store
            .delete_one(Profile::collection(kind), &FilterPredicate::eq("user", id))
            .await?;
        Ok(())
    }
}

/// Account view: names flattened, profile merged in for non-admins
fn project(document: &Value, view: &View) -> Value {
    let mut out = document.clone();
    if let Some(language) = view.language {
        for path in ["city", "employee.workIn", "employee.service"] {
            flatten_name(&mut out, path, language);
        }
    }
    expose_ids(&mut out);

    if view.is_admin {
        return out;
    }

    let profile = account_kind(&out).and_then(|kind| Profile::populated(kind, &out));
    let mut out = omit(out, &["status", "updatedAt", "employee", "client"]);

    if let (Some(profile), Value::Object(account)) = (profile, &mut out) {
        profile.merge_into(account);
    }
    out
}

pub fn descriptor(store: Arc<dyn DocumentStore>) -> ResourceDescriptor<User> {
    let profile_names = |spec: PopulateSpec| {
        spec.nested(PopulateSpec::reference("workIn", "cities").select(&["name"]))
            .nested(PopulateSpec::reference("service", "services").select(&["name"]))
    };

    ResourceDescriptor::new()
        .write_policy(WritePolicy::deny(&[
            UserField::Status,
            UserField::AvgRating,
            UserField::RatingQty,
            UserField::Kind,
            UserField::Username,
        ]))
        .search(&["name", "username", "phone", "city", "type", "status"])
        .populate(PopulateSpec::reference("city", "cities").select(&["name"]))
        .populate(profile_names(PopulateSpec::reverse(
            "employee",
            Employee::COLLECTION,
            "user",
            true,
        )))
        .populate(PopulateSpec::reverse("client", Client::COLLECTION, "user", true))
        .projector(Arc::new(project))
        .after_create(Arc::new(ProvisionProfile {
            store: store.clone(),
        }))
        .after_create(Arc::new(Welcome {
            store: store.clone(),
        }))
        .on_delete(Arc::new(RemoveProfile { store }))
        .unique("phone")
        .unique("username")
}

/// Replaces a `username` in the body by the id of that user
///
/// The resolved id is written under `target`. Addressing yourself is
/// rejected.
pub struct UsernameResolver {
    store: Arc<dyn DocumentStore>,
    target: &'static str,
}

impl UsernameResolver {
    pub fn new(store: Arc<dyn DocumentStore>, target: &'static str) -> Self {
        Self { store, target }
    }
}

#[async_trait]
impl BodyResolver for UsernameResolver {
    async fn resolve(
        &self,
        context: &RequestContext,
        mut body: Map<String, Value>,
    ) -> ApiResult<Map<String, Value>> {
        let username = match body.remove(UserField::Username.as_str()) {
            Some(Value::String(username)) => username,
            _ => {
                return Err(RequestError::InvalidBody {
                    message: "username is required".to_string(),
                }
                .into());
            }
        };

        let filter = FilterPredicate::eq(UserField::Username.as_str(), username.as_str());
        let id = self
            .store
            .find_one(User::COLLECTION, &filter)
            .await?
            .as_ref()
            .and_then(document_id)
            .map(str::to_string)
            .ok_or_else(|| ResourceError::NotFound {
                resource: User::NAME.to_string(),
                key: username.clone(),
            })?;

        let (caller, _) = CallerBinding::caller(&context.auth)?;
        if caller == id {
            return Err(RequestError::InvalidBody {
                message: "a request cannot target its own author".to_string(),
            }
            .into());
        }

        body.insert(self.target.to_string(), Value::String(id));
        Ok(body)
    }
}

/// Update the caller's account and, for employees, their profile
///
/// Both writes go through their resource's write policy, so each keeps only
/// the fields it owns.
pub async fn update_profile(
    users: &ResourceFactory<User>,
    employees: &ResourceFactory<Employee>,
    context: &RequestContext,
    body: Map<String, Value>,
) -> ApiResult<Reply> {
    let (user_id, kind) = CallerBinding::caller(&context.auth)?;

    if kind == UserKind::Employee {
        let profile = employees
            .store()
            .find_one(Employee::COLLECTION, &FilterPredicate::eq("user", user_id))
            .await?;
        if let Some(profile_id) = profile.as_ref().and_then(document_id) {
            employees
                .update_one(
                    context,
                    profile_id,
                    body.clone(),
                    &Scope::new().constrain("user", user_id),
                )
                .await?;
        }
    }

    users.update_one(context, user_id, body, &Scope::new()).await
}

fn update_me(users: ResourceFactory<User>, employees: ResourceFactory<Employee>) -> MethodRouter {
    patch(move |context: RequestContext, JsonBody(body): JsonBody| {
        let users = users.clone();
        let employees = employees.clone();
        async move {
            update_profile(&users, &employees, &context, body)
                .await
                .map_err(|e| context.localize(e))
        }
    })
}

pub struct UserRoutes;

#[async_trait]
impl ResourceRoutes for UserRoutes {
    fn resource_name(&self) -> &str {
        User::NAME
    }

    fn plural(&self) -> &str {
        User::COLLECTION
    }

    fn build_routes(&self, state: &AppState) -> Router {
        let handlers = state.handlers(descriptor(state.store.clone()));

        let me = Router::new().route(
            "/me",
            handlers.get_own().merge(update_me(
                handlers.factory().clone(),
                state.factory(employee::descriptor()),
            )),
        );

        let by_username = handlers
            .scoped(Scope::new().constrain(UserField::Status.as_str(), "active"))
            .get_one_by("username");

        let admin = Router::new()
            .route("/", handlers.get_all().merge(handlers.create_one()))
            .route(
                "/{id}",
                handlers
                    .get_one()
                    .merge(handlers.update_one())
                    .merge(handlers.delete_one()),
            );

        Router::new()
            .route("/by-username/{username}", by_username)
            .merge(guarded(me, end_users()))
            .merge(guarded(admin, AuthPolicy::AdminOnly))
    }

    async fn ensure_indexes(&self, state: &AppState) -> ApiResult<()> {
        state
            .factory(descriptor(state.store.clone()))
            .ensure_indexes()
            .await
    }
}
