//! Messages sent through the public contact form

use super::admin_panel;
use crate::core::auth::AuthPolicy;
use crate::core::resource::{Resource, ResourceDescriptor, WritePhase};
use crate::resource_fields;
use crate::server::{AppState, ResourceRoutes, guard, guarded};
use axum::Router;
use serde::{Deserialize, Serialize};
use validator::Validate;

resource_fields! {
    pub enum ContactField {
        Name => "name",
        Subject => "subject",
        Message => "message",
        Email => "email",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Contact {
    #[validate(length(min = 1, max = 100, message = "name is required"))]
    pub name: String,

    #[validate(length(min = 1, max = 200, message = "subject is required"))]
    pub subject: String,

    #[validate(length(min = 1, max = 5000, message = "message is required"))]
    pub message: String,

    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
}

impl Resource for Contact {
    type Field = ContactField;

    const NAME: &'static str = "contact";
    const COLLECTION: &'static str = "contacts";

    fn prepare(&mut self, _phase: WritePhase) {
        self.name = self.name.trim().to_string();
        self.subject = self.subject.trim().to_string();
    }
}

pub fn descriptor() -> ResourceDescriptor<Contact> {
    ResourceDescriptor::new().search(&["subject", "message", "name", "email"])
}

pub struct ContactRoutes;

impl ResourceRoutes for ContactRoutes {
    fn resource_name(&self) -> &str {
        Contact::NAME
    }

    fn plural(&self) -> &str {
        Contact::COLLECTION
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
                    .create_one()
                    .merge(guard(handlers.get_all(), AuthPolicy::AdminOnly)),
            )
            .merge(guarded(admin, admin_panel()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PaginationConfig;
    use crate::core::auth::AuthContext;
    use crate::core::context::{RequestContext, Scope};
    use crate::core::factory::ResourceFactory;
    use crate::core::locale::Language;
    use crate::core::query::QueryParams;
    use crate::entities::testing::{admin, body, store};
    use serde_json::json;

    #[tokio::test]
    async fn test_contact_form_is_searchable_by_admins() {
        let factory = ResourceFactory::new(store(), descriptor());
        let visitor = RequestContext::new(AuthContext::Anonymous, None, Language::Fr);

        for (name, subject) in [("Youssef", "Partenariat"), ("Nadia", "Problème de compte")] {
            let reply = factory
                .create_one(
                    &visitor,
                    body(json!({
                        "name": name,
                        "subject": subject,
                        "message": "Bonjour, pouvez-vous me rappeler ?",
                        "email": "contact@example.ma",
                        "_id": "forged"
                    })),
                    &Scope::new(),
                )
                .await
                .unwrap();
            assert_ne!(reply.body.data["id"], "forged");
        }

        let params = QueryParams::from_pairs(
            vec![("search".to_string(), "COMPTE".to_string())],
            &PaginationConfig::default(),
        )
        .unwrap();
        let reply = factory.get_all(&admin(), &params, &Scope::new()).await.unwrap();
        assert_eq!(reply.body.data.as_array().map(Vec::len), Some(1));
        assert_eq!(reply.body.data[0]["name"], "Nadia");
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let factory = ResourceFactory::new(store(), descriptor());
        let result = factory
            .create_one(
                &admin(),
                body(json!({"name": "Nadia", "subject": "x", "message": "", "email": "n@example.ma"})),
                &Scope::new(),
            )
            .await;
        assert!(result.is_err());
    }
}
