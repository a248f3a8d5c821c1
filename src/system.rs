use crate::config::{Defaults, Paths};
use crate::files::ConfigFiles;
use crate::firewall::Firewall;
use crate::interface::Host;
use crate::provision::Provisioner;
use crate::services::ServiceManager;

/// The collaborators and configuration every engine operation works against.
///
/// Built once by the entry point and passed down by reference; tests build
/// one from in-memory fakes.
pub struct System<'a> {
    pub firewall: &'a dyn Firewall,
    pub services: &'a dyn ServiceManager,
    pub files: &'a dyn ConfigFiles,
    pub host: &'a dyn Host,
    pub provisioner: &'a dyn Provisioner,
    pub paths: &'a Paths,
    pub defaults: &'a Defaults,
}
