//! Association type shared between a relying party and its store.
//!
//! An association is a shared secret negotiated with an OpenID provider.
//! Relying parties that keep associations can verify positive assertions
//! locally instead of asking the provider to verify every signature.

use std::{fmt, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// The signature algorithm an association secret is used with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssociationKind {
    /// `HMAC-SHA1`, 160-bit secret.
    #[serde(rename = "HMAC-SHA1")]
    HmacSha1,
    /// `HMAC-SHA256`, 256-bit secret.
    #[serde(rename = "HMAC-SHA256")]
    HmacSha256,
}

impl AssociationKind {
    /// Returns the wire name of the association type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HmacSha1 => "HMAC-SHA1",
            Self::HmacSha256 => "HMAC-SHA256",
        }
    }

    /// Returns the secret length in bits required by this association type.
    #[must_use]
    pub fn secret_bits(self) -> u32 {
        match self {
            Self::HmacSha1 => 160,
            Self::HmacSha256 => 256,
        }
    }
}

impl fmt::Display for AssociationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A shared secret negotiated with a single provider endpoint.
///
/// The secret is wrapped in [`Zeroizing`] so it is scrubbed from memory when
/// the association is dropped, and it is redacted from `Debug` output.
///
/// # Serialization
///
/// Associations serialize to a self-describing form (secret as standard
/// base64, lifetime as a humantime string) so external stores can persist
/// them as JSON documents.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use openid_rp_storage::{Association, AssociationKind};
///
/// let association = Association::builder()
///     .handle("{HMAC-SHA256}{5f1a}")
///     .secret(vec![7u8; 32])
///     .kind(AssociationKind::HmacSha256)
///     .lifetime(Duration::from_secs(14 * 24 * 3600))
///     .build();
///
/// assert!(!association.is_expired());
/// assert_eq!(association.secret_bits(), 256);
/// ```
#[derive(Clone, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct Association {
    /// Provider-assigned handle, unique per provider endpoint.
    #[builder(into)]
    pub handle: String,

    /// The shared MAC secret.
    #[serde(with = "secret_base64")]
    #[builder(into)]
    pub secret: Zeroizing<Vec<u8>>,

    /// Signature algorithm the secret is used with.
    pub kind: AssociationKind,

    /// When the provider issued the association.
    #[builder(default = Utc::now())]
    pub issued_at: DateTime<Utc>,

    /// How long the association stays valid after `issued_at`.
    #[serde(with = "humantime_serde")]
    pub lifetime: Duration,
}

impl Association {
    /// Returns the instant at which this association expires.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        let lifetime = TimeDelta::from_std(self.lifetime).unwrap_or(TimeDelta::MAX);
        self.issued_at.checked_add_signed(lifetime).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Returns `true` if the association has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    /// Returns `true` if the association has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Returns how long the association remains valid, or zero if expired.
    #[must_use]
    pub fn time_remaining(&self) -> Duration {
        (self.expires_at() - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }

    /// Returns the secret length in bits.
    #[must_use]
    pub fn secret_bits(&self) -> u32 {
        u32::try_from(self.secret.len()).map_or(u32::MAX, |len| len.saturating_mul(8))
    }
}

impl fmt::Debug for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Association")
            .field("handle", &self.handle)
            .field("secret", &"<redacted>")
            .field("kind", &self.kind)
            .field("issued_at", &self.issued_at)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

/// Constraints a caller places on which association may be used.
///
/// Security settings usually forbid secrets shorter than a given length
/// (for example to refuse `HMAC-SHA1`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AssociationRequirements {
    /// Smallest acceptable secret length in bits.
    pub min_hash_bits: u32,
    /// Largest acceptable secret length in bits.
    pub max_hash_bits: u32,
}

impl AssociationRequirements {
    /// Creates requirements accepting secrets within `[min_hash_bits, max_hash_bits]`.
    #[must_use]
    pub fn new(min_hash_bits: u32, max_hash_bits: u32) -> Self {
        Self { min_hash_bits, max_hash_bits }
    }

    /// Returns `true` if `association` satisfies these requirements.
    #[must_use]
    pub fn allows(&self, association: &Association) -> bool {
        let bits = association.secret_bits();
        bits >= self.min_hash_bits && bits <= self.max_hash_bits
    }
}

impl Default for AssociationRequirements {
    fn default() -> Self {
        Self::new(AssociationKind::HmacSha1.secret_bits(), AssociationKind::HmacSha256.secret_bits())
    }
}

mod secret_base64 {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use zeroize::Zeroizing;

    pub(super) fn serialize<S>(secret: &Zeroizing<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let encoded = Zeroizing::new(STANDARD.encode(secret.as_slice()));
        serializer.serialize_str(&encoded)
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Zeroizing<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = Zeroizing::new(String::deserialize(deserializer)?);
        STANDARD.decode(encoded.as_bytes()).map(Zeroizing::new).map_err(D::Error::custom)
    }
}
