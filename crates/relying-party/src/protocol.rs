//! OpenID protocol versions and message vocabulary.
//!
//! Every OpenID message parameter lives under the [`PARAMETER_PREFIX`]
//! namespace. The version of an inbound message is inferred from its
//! `openid.ns` parameter: OpenID 2.0 messages declare [`OPENID2_NAMESPACE`],
//! while OpenID 1.x messages carry no namespace at all.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::query::QueryParameters;

/// Prefix shared by every protocol-reserved parameter.
pub const PARAMETER_PREFIX: &str = "openid.";

/// Namespace URI declared by OpenID 2.0 messages.
pub const OPENID2_NAMESPACE: &str = "http://specs.openid.net/auth/2.0";

/// Namespace URI some OpenID 1.1 implementations declare.
pub const OPENID11_NAMESPACE: &str = "http://openid.net/signon/1.1";

/// Values carried by the `openid.mode` parameter.
pub mod mode {
    /// Interactive authentication request.
    pub const CHECKID_SETUP: &str = "checkid_setup";
    /// Non-interactive authentication request.
    pub const CHECKID_IMMEDIATE: &str = "checkid_immediate";
    /// Positive assertion (and, in 1.x, the setup-needed reply).
    pub const ID_RES: &str = "id_res";
    /// The user declined to authenticate.
    pub const CANCEL: &str = "cancel";
    /// OpenID 2.0 reply to an immediate request that needs interaction.
    pub const SETUP_NEEDED: &str = "setup_needed";
    /// Indirect error reply.
    pub const ERROR: &str = "error";
}

/// A supported protocol revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProtocolVersion {
    /// OpenID Authentication 1.1.
    #[serde(rename = "1.1")]
    V11,
    /// OpenID Authentication 2.0.
    #[serde(rename = "2.0")]
    V20,
}

impl ProtocolVersion {
    /// Returns the version number as written in documentation (`"2.0"`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V11 => "1.1",
            Self::V20 => "2.0",
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message vocabulary for one protocol revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Protocol {
    version: ProtocolVersion,
}

impl Protocol {
    /// OpenID Authentication 1.1.
    pub const V11: Protocol = Protocol { version: ProtocolVersion::V11 };
    /// OpenID Authentication 2.0.
    pub const V20: Protocol = Protocol { version: ProtocolVersion::V20 };

    /// Returns the vocabulary for `version`.
    #[must_use]
    pub fn new(version: ProtocolVersion) -> Self {
        Self { version }
    }

    /// Infers the protocol revision of an inbound message.
    ///
    /// Messages declaring the 2.0 namespace are 2.0; anything else,
    /// including a message without `openid.ns`, is treated as 1.1.
    #[must_use]
    pub fn detect(query: &QueryParameters) -> Self {
        match query.get(Self::V20.ns_key()) {
            Some(ns) if ns == OPENID2_NAMESPACE => Self::V20,
            _ => Self::V11,
        }
    }

    /// Returns the protocol revision.
    #[must_use]
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Namespace URI this revision declares, if it declares one.
    #[must_use]
    pub fn namespace(&self) -> Option<&'static str> {
        match self.version {
            ProtocolVersion::V11 => None,
            ProtocolVersion::V20 => Some(OPENID2_NAMESPACE),
        }
    }

    /// Key whose presence marks a message as an OpenID message.
    #[must_use]
    pub fn mode_key(&self) -> &'static str {
        "openid.mode"
    }

    /// Key carrying the namespace declaration.
    #[must_use]
    pub fn ns_key(&self) -> &'static str {
        "openid.ns"
    }

    /// Key naming the realm the user is asked to trust.
    ///
    /// OpenID 1.1 called the realm a trust root.
    #[must_use]
    pub fn realm_key(&self) -> &'static str {
        match self.version {
            ProtocolVersion::V11 => "openid.trust_root",
            ProtocolVersion::V20 => "openid.realm",
        }
    }

    /// Mode a provider uses to tell the relying party that an immediate
    /// request needs user interaction.
    #[must_use]
    pub fn setup_needed_mode(&self) -> &'static str {
        match self.version {
            ProtocolVersion::V11 => mode::ID_RES,
            ProtocolVersion::V20 => mode::SETUP_NEEDED,
        }
    }

    /// Returns `true` if `key` is reserved by the protocol.
    #[must_use]
    pub fn is_reserved_key(key: &str) -> bool {
        key.starts_with(PARAMETER_PREFIX)
    }
}
