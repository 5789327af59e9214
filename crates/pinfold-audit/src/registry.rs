//! TTL-bounded read-through cache of on-chain participant records.

use std::sync::Arc;

use tracing::{debug, warn};

use pinfold_core::audit::CachedParticipant;
use pinfold_core::traits::LedgerReader;
use pinfold_core::types::{abbrev, now_ts};
use pinfold_store::StateStore;

pub struct ParticipantCache {
    store: Arc<StateStore>,
    queries: Arc<dyn LedgerReader>,
    ttl_seconds: u64,
}

impl ParticipantCache {
    pub fn new(store: Arc<StateStore>, queries: Arc<dyn LedgerReader>, ttl_seconds: u64) -> Self {
        Self {
            store,
            queries,
            ttl_seconds,
        }
    }

    /// Participant node details, served from cache while fresh, refetched
    /// from the ledger on miss or expiry.
    pub async fn get(&self, address: &str) -> Option<CachedParticipant> {
        match self.store.get_cached_participant(address) {
            Ok(Some(cached)) if !self.is_expired(&cached) => return Some(cached),
            Ok(_) => {}
            Err(e) => warn!(address = abbrev(address, 16), error = %e, "participant cache read failed"),
        }
        self.refresh(address).await
    }

    /// Force a refetch from the ledger.
    pub async fn refresh(&self, address: &str) -> Option<CachedParticipant> {
        let participant = self.queries.participant(address).await?;
        let info = CachedParticipant {
            address: participant.address,
            node_id: participant.node_id,
            multiaddr: participant.multiaddr,
            active: participant.active,
            cached_at: now_ts(),
        };
        if let Err(e) = self.store.cache_participant(&info) {
            warn!(address = abbrev(address, 16), error = %e, "participant cache write failed");
        }
        debug!(
            address = abbrev(address, 16),
            node = abbrev(&info.node_id, 16),
            "cached participant"
        );
        Some(info)
    }

    fn is_expired(&self, info: &CachedParticipant) -> bool {
        now_ts() - info.cached_at > self.ttl_seconds as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pinfold_core::records::{ParticipantInfo, SlotInfo};
    use pinfold_core::types::{Amount, SlotId};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingQueries {
        lookups: AtomicU32,
        known: bool,
    }

    #[async_trait]
    impl LedgerReader for CountingQueries {
        async fn wallet_balance(&self, _address: &str) -> Amount {
            0
        }
        async fn slot(&self, _slot: SlotId) -> Option<SlotInfo> {
            None
        }
        async fn is_slot_expired(&self, _slot: SlotId) -> Option<bool> {
            None
        }
        async fn participant(&self, address: &str) -> Option<ParticipantInfo> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.known.then(|| ParticipantInfo {
                address: address.to_string(),
                node_id: "12D3KooWPeer".into(),
                multiaddr: "/ip4/9.9.9.9/tcp/4001".into(),
                active: true,
                flags: 0,
                min_price: 100,
                pins_completed: 1,
                staked: 1_000_000,
                joined_at: 0,
            })
        }
        async fn join_fee(&self) -> Option<Amount> {
            None
        }
        async fn stake_amount(&self) -> Option<Amount> {
            None
        }
    }

    fn cache(known: bool, ttl: u64) -> (tempfile::TempDir, ParticipantCache, Arc<CountingQueries>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(StateStore::open(dir.path()).unwrap());
        let queries = Arc::new(CountingQueries {
            lookups: AtomicU32::new(0),
            known,
        });
        let cache = ParticipantCache::new(store, queries.clone(), ttl);
        (dir, cache, queries)
    }

    #[tokio::test]
    async fn fresh_entries_are_served_without_a_lookup() {
        let (_dir, cache, queries) = cache(true, 3600);
        assert!(cache.get("ADDR").await.is_some());
        assert!(cache.get("ADDR").await.is_some());
        assert_eq!(queries.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entries_are_refetched() {
        let (_dir, cache, queries) = cache(true, 0);
        assert!(cache.get("ADDR").await.is_some());
        // ttl 0 plus the strict comparison means a second get one second
        // later refetches; force it through refresh directly.
        assert!(cache.refresh("ADDR").await.is_some());
        assert_eq!(queries.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unknown_participants_resolve_to_none() {
        let (_dir, cache, _queries) = cache(false, 3600);
        assert!(cache.get("ADDR").await.is_none());
    }
}
