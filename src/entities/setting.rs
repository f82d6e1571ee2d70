//! Site-wide settings
//!
//! A single document, stored under [`SETTINGS_ID`]. It is created once by an
//! administrator, read publicly and updated in place; there is no listing.

use super::admin_panel;
use crate::core::error::ApiResult;
use crate::core::locale::Localized;
use crate::core::projection::StandardView;
use crate::core::resource::{Resource, ResourceDescriptor};
use crate::resource_fields;
use crate::server::{AppState, ResourceRoutes, guard};
use async_trait::async_trait;
use axum::Router;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Storage id of the settings document
pub const SETTINGS_ID: &str = "settings";

resource_fields! {
    pub enum SettingField {
        Title => "title",
        Description => "description",
        Email => "email",
        Address => "address",
        Phone => "phone",
        Logo => "logo",
        Icon => "icon",
        Socials => "socials",
        MaintenanceMode => "maintenance_mode",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Socials {
    #[serde(default)]
    pub facebook: Option<String>,
    #[serde(default)]
    pub instagram: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Setting {
    #[serde(default)]
    #[validate(nested)]
    pub title: Option<Localized>,

    #[serde(default)]
    #[validate(nested)]
    pub description: Option<Localized>,

    #[serde(default)]
    #[validate(email(message = "email must be a valid address"))]
    pub email: Option<String>,

    #[serde(default)]
    #[validate(nested)]
    pub address: Option<Localized>,

    #[serde(default)]
    pub phone: Option<String>,

    /// Image URLs
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,

    #[serde(default)]
    pub socials: Socials,

    #[serde(default)]
    pub maintenance_mode: bool,
}

impl Resource for Setting {
    type Field = SettingField;

    const NAME: &'static str = "setting";
    const COLLECTION: &'static str = "settings";

    fn new_id(&self) -> String {
        SETTINGS_ID.to_string()
    }
}

pub fn descriptor() -> ResourceDescriptor<Setting> {
    ResourceDescriptor::new().projector(
        StandardView::new()
            .localized("title")
            .localized("description")
            .localized("address")
            .shared(),
    )
}

pub struct SettingRoutes;

#[async_trait]
impl ResourceRoutes for SettingRoutes {
    fn resource_name(&self) -> &str {
        Setting::NAME
    }

    fn plural(&self) -> &str {
        Setting::COLLECTION
    }

    fn build_routes(&self, state: &AppState) -> Router {
        let handlers = state.handlers(descriptor());

        Router::new().route(
            "/",
            handlers
                .get_fixed(SETTINGS_ID)
                .merge(guard(handlers.create_one(), admin_panel()))
                .merge(guard(handlers.update_fixed(SETTINGS_ID), admin_panel())),
        )
    }

    async fn ensure_indexes(&self, state: &AppState) -> ApiResult<()> {
        state.factory(descriptor()).ensure_indexes().await
    }
}
