use boson_primitives::{Limit, ResourceKey, UnixMillis};
use boson_storage::table;
use serde::{Deserialize, Serialize};

use crate::QuotaScope;

/// A quota on an abstract resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRecord {
    pub resource: ResourceKey,
    pub scope: QuotaScope,
    pub limit: Limit,
    pub created_at: UnixMillis,
    pub updated_at: UnixMillis,
}

table!(
    /// Quotas, keyed by `service/name#scope`.
    pub Quotas, "quotas", QuotaRecord
);
