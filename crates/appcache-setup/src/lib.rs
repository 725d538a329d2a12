//! `AppCache-Lock` service installer.
//!
//! Installs the `appcache-lock` binary, its configuration directory and a
//! systemd oneshot unit that preloads directories at boot.

pub mod cmd;
pub mod escalate;
pub mod install;
pub mod templates;
