//! Factor-instance ownership validation.
//!
//! A client presenting a factor-instance identifier (e.g. "verify TOTP
//! device 42") must not be able to replay another user's instance. The
//! validator checks that the identifier actually belongs to the
//! authenticated user, and fails closed: any lookup miss, storage error
//! or malformed input yields `false`, never an error a caller could
//! mistake for consent.

use crate::error::{FactorGateError, Result};
use async_trait::async_trait;

/// Trait for the store that knows which user owns a factor instance.
///
/// Instance identifiers are namespaced by factor type; the same numeric
/// id can exist under both `totp` and `email`.
#[async_trait]
pub trait OwnershipStore: Send + Sync {
    /// Owning user for an instance within the named factor type's
    /// namespace, or `None` if no such record exists.
    async fn find_owner(&self, factor_type: &str, instance_id: i64) -> Result<Option<String>>;
}

/// Validates factor-instance ownership against an [`OwnershipStore`].
pub struct OwnershipValidator<S: OwnershipStore> {
    store: S,
}

impl<S: OwnershipStore> OwnershipValidator<S> {
    /// Create a validator over a store.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// `true` iff the instance exists and is owned by exactly this user.
    ///
    /// Pure read, no side effects. Malformed factor type names are
    /// rejected before any lookup; storage errors deny and are logged.
    pub async fn is_owned_by(&self, factor_type: &str, instance_id: i64, user_id: &str) -> bool {
        if let Err(err) = validate_factor_type(factor_type) {
            tracing::warn!(
                target: "mfa.ownership.rejected",
                factor_type = %factor_type,
                error = %err,
                "Rejected malformed factor type name"
            );
            return false;
        }

        match self.store.find_owner(factor_type, instance_id).await {
            Ok(Some(owner)) => {
                let owned = owner == user_id;
                if !owned {
                    tracing::warn!(
                        target: "mfa.ownership.mismatch",
                        factor_type = %factor_type,
                        instance_id = instance_id,
                        user_id = %user_id,
                        "Factor instance belongs to a different user"
                    );
                }
                owned
            }
            Ok(None) => false,
            Err(err) => {
                tracing::warn!(
                    target: "mfa.ownership.lookup_failed",
                    factor_type = %factor_type,
                    instance_id = instance_id,
                    error = %err,
                    "Ownership lookup failed, denying"
                );
                false
            }
        }
    }
}

/// Check that a factor type name is a lowercase identifier: ASCII
/// letters, digits and underscores, starting with a letter.
pub fn validate_factor_type(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {
            chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(FactorGateError::validation(format!(
            "invalid factor type name: {name:?}"
        )))
    }
}
