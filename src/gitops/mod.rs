//! GitOps bootstrap: Quick Start profiles rendered into a user's repository and the Flux operator
//! that keeps the cluster in sync with it

pub mod apply;
pub mod flux;
pub mod processor;
pub mod profile;

pub use apply::Applier;
pub use flux::Installer;
pub use processor::{File, TemplateParameters, TemplateProcessor};
pub use profile::Profile;
