//! Marketplace resources
//!
//! Each module holds one resource: its typed model, field enum, descriptor,
//! hooks and routes.

pub mod macros;

pub mod appointment;
pub mod city;
pub mod client;
pub mod contact;
pub mod contract;
pub mod employee;
pub mod notification;
pub mod page;
pub mod report;
pub mod review;
pub mod service;
pub mod setting;
pub mod user;

use crate::core::auth::{AdminRole, AuthPolicy, UserKind};
use crate::server::ResourceRoutes;

pub use appointment::Appointment;
pub use city::City;
pub use client::Client;
pub use contact::Contact;
pub use contract::Contract;
pub use employee::Employee;
pub use notification::{Notification, NotificationKind, notify};
pub use page::Page;
pub use report::{Report, ReportKind};
pub use review::Review;
pub use service::{AssetStore, NoopAssetStore, Service};
pub use setting::Setting;
pub use user::User;

/// Every marketplace resource, in mount order
pub fn all() -> Vec<Box<dyn ResourceRoutes>> {
    vec![
        Box::new(city::CityRoutes),
        Box::new(service::ServiceRoutes::default()),
        Box::new(user::UserRoutes),
        Box::new(employee::EmployeeRoutes),
        Box::new(client::ClientRoutes),
        Box::new(appointment::AppointmentRoutes),
        Box::new(contract::ContractRoutes),
        Box::new(review::ReviewRoutes),
        Box::new(notification::NotificationRoutes),
        Box::new(page::PageRoutes),
        Box::new(report::ReportRoutes),
        Box::new(contact::ContactRoutes),
        Box::new(setting::SettingRoutes),
    ]
}

/// Super admins and admins of the panel
pub(crate) fn admin_panel() -> AuthPolicy {
    AuthPolicy::AdminRoles(vec![AdminRole::SuperAdmin, AdminRole::Admin])
}

/// Any logged-in employee or client
pub(crate) fn end_users() -> AuthPolicy {
    AuthPolicy::UserKinds(vec![UserKind::Employee, UserKind::Client])
}

pub(crate) fn employees() -> AuthPolicy {
    AuthPolicy::UserKinds(vec![UserKind::Employee])
}

pub(crate) fn clients() -> AuthPolicy {
    AuthPolicy::UserKinds(vec![UserKind::Client])
}
