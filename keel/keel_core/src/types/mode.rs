//! Process type and running mode.
//!
//! The process type is fixed for the life of a controller and decides which
//! initialization hooks run during boot. The running mode can change at
//! runtime and decides which operations are accepted.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of process hosting the controller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessType {
    /// A standalone server.
    #[default]
    StandaloneServer,

    /// A server embedded in another process.
    EmbeddedServer,

    /// A server managed by a host controller.
    DomainServer,

    /// A host controller managing servers.
    HostController,

    /// A client-side process with a management model.
    ApplicationClient,
}

impl ProcessType {
    /// Whether this process type is a full server.
    pub fn is_server(&self) -> bool {
        matches!(
            self,
            Self::StandaloneServer | Self::EmbeddedServer | Self::DomainServer
        )
    }
}

impl fmt::Display for ProcessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StandaloneServer => write!(f, "standalone-server"),
            Self::EmbeddedServer => write!(f, "embedded-server"),
            Self::DomainServer => write!(f, "domain-server"),
            Self::HostController => write!(f, "host-controller"),
            Self::ApplicationClient => write!(f, "application-client"),
        }
    }
}

/// Operating mode of a running controller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunningMode {
    /// All operations are accepted.
    #[default]
    Normal,

    /// Only configuration changes are accepted; runtime services are not
    /// started.
    AdminOnly,

    /// The process is suspended; only reads are accepted.
    Suspended,
}

impl RunningMode {
    /// Whether an operation with the given flags is accepted in this mode.
    ///
    /// # Arguments
    ///
    /// * `read_only` - The operation does not modify the model.
    /// * `runtime_only` - The operation only affects runtime services.
    pub fn permits(&self, read_only: bool, runtime_only: bool) -> bool {
        match self {
            Self::Normal => true,
            Self::AdminOnly => !runtime_only,
            Self::Suspended => read_only,
        }
    }
}

impl fmt::Display for RunningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "NORMAL"),
            Self::AdminOnly => write!(f, "ADMIN_ONLY"),
            Self::Suspended => write!(f, "SUSPENDED"),
        }
    }
}
