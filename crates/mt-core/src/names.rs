//! Strongly-typed identifiers for projects and the entities they own.

use crate::newtype_string::define_identifier;

define_identifier! {
    /// Name of a project: the namespace that owns models, views and jobs.
    pub struct ProjectName => "project";
}

define_identifier! {
    /// Name of a predictive model within a project.
    pub struct ModelName => "model";
}

define_identifier! {
    /// Name of a scheduled job within a project.
    pub struct JobName => "job";
}

define_identifier! {
    /// Name of a stored view within a project.
    pub struct ViewName => "view";
}
