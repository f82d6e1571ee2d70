//! Bilingual content pages (about, terms, FAQ, ...)
//!
//! Pages are addressed publicly by the slug of their French title; inactive
//! pages are hidden from everyone but administrators.

use super::admin_panel;
use crate::core::error::ApiResult;
use crate::core::locale::Localized;
use crate::core::projection::StandardView;
use crate::core::resource::{Resource, ResourceDescriptor, WritePhase, slugify};
use crate::resource_fields;
use crate::server::{AppState, ResourceRoutes, guard, guarded};
use async_trait::async_trait;
use axum::Router;
use serde::{Deserialize, Serialize};
use validator::Validate;

resource_fields! {
    pub enum PageField {
        Title => "title",
        Slug => "slug",
        Body => "body",
        IsActive => "isActive",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[validate(nested)]
    pub title: Localized,

    /// Derived from the French title
    #[serde(default)]
    pub slug: String,

    #[validate(nested)]
    pub body: Localized,

    #[serde(default = "active")]
    pub is_active: bool,
}

fn active() -> bool {
    true
}

impl Resource for Page {
    type Field = PageField;

    const NAME: &'static str = "page";
    const COLLECTION: &'static str = "pages";

    fn prepare(&mut self, _phase: WritePhase) {
        self.slug = slugify(&self.title.fr, '-');
    }
}

pub fn descriptor() -> ResourceDescriptor<Page> {
    ResourceDescriptor::new()
        .search(&["title.fr", "title.ar"])
        .user_filter("isActive", true)
        .projector(
            StandardView::new()
                .localized("title")
                .localized("body")
                .hidden(&["isActive", "updatedAt"])
                .shared(),
        )
        .unique("slug")
}

pub struct PageRoutes;

#[async_trait]
impl ResourceRoutes for PageRoutes {
    fn resource_name(&self) -> &str {
        Page::NAME
    }

    fn plural(&self) -> &str {
        Page::COLLECTION
    }

    fn build_routes(&self, state: &AppState) -> Router {
        let handlers = state.handlers(descriptor());

        let admin = Router::new().route(
            "/{id}",
            handlers
                .get_one()
                .merge(handlers.update_one())
                .merge(handlers.delete_one()),
        );

        Router::new()
            .route("/slug/{slug}", handlers.get_one_by("slug"))
            .route(
                "/",
                handlers
                    .get_all()
                    .merge(guard(handlers.create_one(), admin_panel())),
            )
            .merge(guarded(admin, admin_panel()))
    }

    async fn ensure_indexes(&self, state: &AppState) -> ApiResult<()> {
        state.factory(descriptor()).ensure_indexes().await
    }
}
