use boson_primitives::{
    AuthContext, ConcreteResource, InstanceId, ReservationId, ReservationState, UnixMillis,
};
use boson_storage::table;
use serde::{Deserialize, Serialize};

/// A reservation of a signed delta against a concrete reservable resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRecord {
    pub id: ReservationId,
    /// Shared by every reservation of the batch that created it.
    pub correlation_id: String,
    pub resource: ConcreteResource,
    pub delta: i64,
    /// Principal allowed to commit or roll back.
    pub auth: AuthContext,
    /// Service instance the delta is attributed to on commit.
    pub instance: InstanceId,
    pub state: ReservationState,
    pub created_at: UnixMillis,
    pub expires_at: UnixMillis,
    /// When the reservation left the pending state.
    pub resolved_at: Option<UnixMillis>,
}

impl ReservationRecord {
    /// Whether the reservation is past its deadline at `now`.
    pub fn is_expired(&self, now: UnixMillis) -> bool {
        now >= self.expires_at
    }

    /// Key of the reservation document.
    pub fn storage_key(&self) -> String {
        self.id.storage_key()
    }

    /// Key of the reservation's entry in [`PendingExpiries`].
    pub fn expiry_key(&self) -> String {
        format!("{:020}/{}", self.expires_at, self.id)
    }

    /// Key of the reservation's entry in [`ResourceExpiries`].
    pub fn resource_expiry_key(&self) -> String {
        format!("{}{}", resource_expiry_prefix(&self.resource), self.expiry_key())
    }

    /// Mark the reservation resolved.
    pub(crate) fn resolve(&mut self, state: ReservationState, now: UnixMillis) {
        self.state = state;
        self.resolved_at = Some(now);
    }
}

table!(
    /// Reservations, keyed by id.
    pub Reservations, "reservations", ReservationRecord
);

table!(
    /// Pending reservations ordered by deadline, keyed by
    /// `zero-padded expires_at/id`.
    pub PendingExpiries, "pending_expiries", ReservationId
);

table!(
    /// Pending reservations of each concrete resource ordered by deadline,
    /// keyed by `resource key#zero-padded expires_at/id`.
    pub ResourceExpiries, "resource_expiries", ReservationId
);

/// Prefix of every [`ResourceExpiries`] key of `resource`.
pub(crate) fn resource_expiry_prefix(resource: &ConcreteResource) -> String {
    format!("{}#", resource.storage_key())
}
