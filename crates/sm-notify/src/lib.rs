//! # sm-notify — Notification Composer
//!
//! Turns detected transitions into notices for the case subject.
//!
//! - **Event** (`event.rs`): `NotificationEvent`, `Priority`, `SourceActor`.
//! - **Template** (`template.rs`): per-case-type `NoticePolicy`, the
//!   validated `TemplateCatalog`, and `{placeholder}` rendering.
//! - **Composer** (`composer.rs`): `NotificationComposer::compose`.
//!
//! Dispatching and storing notices is the coordinator's job (`sm-engine`).

pub mod composer;
pub mod event;
pub mod template;

pub use composer::NotificationComposer;
pub use event::{NotificationEvent, Priority, SourceActor, SYSTEM_ACTOR};
pub use template::{
    render, CompiledPolicy, MessageTemplate, NoticePolicy, TemplateCatalog, TemplateRule,
};
