//! Cities the marketplace operates in

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
    pub enum CityField {
        Key => "key",
        Name => "name",
        IsActive => "isActive",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct City {
    /// URL keys, derived from the name
    #[serde(default)]
    pub key: Localized,

    #[validate(nested)]
    pub name: Localized,

    #[serde(default = "active")]
    pub is_active: bool,
}

fn active() -> bool {
    true
}

impl Resource for City {
    type Field = CityField;

    const NAME: &'static str = "city";
    const COLLECTION: &'static str = "cities";

    /// Cities are addressed by the slug of their French name
    fn new_id(&self) -> String {
        slugify(&self.name.fr, '_')
    }

    fn prepare(&mut self, _phase: WritePhase) {
        self.key = Localized::new(slugify(&self.name.fr, '_'), slugify(&self.name.ar, '_'));
    }
}

pub fn descriptor() -> ResourceDescriptor<City> {
    ResourceDescriptor::new()
        .search(&["name.fr", "name.ar"])
        .user_filter("isActive", true)
        .projector(
            StandardView::new()
                .localized("name")
                .localized("key")
                .public_fields(&["id", "name"])
                .shared(),
        )
        .unique("name.ar")
}

pub struct CityRoutes;

#[async_trait]
impl ResourceRoutes for CityRoutes {
    fn resource_name(&self) -> &str {
        City::NAME
    }

    fn plural(&self) -> &str {
        City::COLLECTION
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::UserKind;
    use crate::core::context::Scope;
    use crate::core::factory::{Lookup, ResourceFactory};
    use crate::core::locale::Language;
    use crate::core::query::QueryParams;
    use crate::config::PaginationConfig;
    use crate::entities::testing::{admin, body, store, user};
    use serde_json::json;

    fn factory() -> ResourceFactory<City> {
        ResourceFactory::new(store(), descriptor())
    }

    #[test]
    fn test_prepare_derives_keys_and_id() {
        let mut city = City {
            key: Localized::default(),
            name: Localized::new("Fès El Bali", "فاس البالي"),
            is_active: true,
        };
        city.prepare(WritePhase::Create);

        assert_eq!(city.new_id(), "fes_el_bali");
        assert_eq!(city.key, Localized::new("fes_el_bali", "فاس_البالي"));
    }

    #[tokio::test]
    async fn test_create_is_addressed_by_slug() {
        let factory = factory();
        let reply = factory
            .create_one(
                &admin(),
                body(json!({"name": {"fr": "Casablanca", "ar": "الدار البيضاء"}})),
                &Scope::new(),
            )
            .await
            .unwrap();

        assert_eq!(reply.body.data["id"], "casablanca");
        assert_eq!(reply.body.data["isActive"], true);
        assert_eq!(reply.body.data["key"]["ar"], "الدار_البيضاء");

        let duplicate = factory
            .create_one(
                &admin(),
                body(json!({"name": {"fr": "Casablanca", "ar": "كازا"}})),
                &Scope::new(),
            )
            .await;
        assert!(duplicate.is_err());
    }

    #[tokio::test]
    async fn test_users_only_see_active_cities_by_name() {
        let factory = factory();
        for (fr, ar, active) in [("Rabat", "الرباط", true), ("Tanger", "طنجة", false)] {
            factory
                .create_one(
                    &admin(),
                    body(json!({"name": {"fr": fr, "ar": ar}, "isActive": active})),
                    &Scope::new(),
                )
                .await
                .unwrap();
        }

        let params = QueryParams::new(&PaginationConfig::default());
        let visitor = user("u-1", UserKind::Client, Language::Ar);
        let reply = factory.get_all(&visitor, &params, &Scope::new()).await.unwrap();
        assert_eq!(reply.body.data, json!([{"id": "rabat", "name": "الرباط"}]));

        let reply = factory.get_all(&admin(), &params, &Scope::new()).await.unwrap();
        assert_eq!(reply.body.data.as_array().map(Vec::len), Some(2));

        let hidden = factory
            .get_one(&visitor, &Lookup::id("tanger"), &Scope::new())
            .await;
        assert!(hidden.is_err());
    }
}
