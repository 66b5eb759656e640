use crate::{
    error::ProxyResult,
    melon::{chart::parse_chart, client::ChartSource},
    storage::{CacheEntry, ChartCache},
};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

/// Outcome of one refresh, shared by every request that joined it.
type Flight = Arc<OnceCell<ProxyResult<Arc<CacheEntry>>>>;

/// Serves the chart from the cache while it is fresh and refreshes it from
/// the source otherwise. Concurrent misses share a single fetch and its result.
#[derive(Clone)]
pub struct ChartService {
    source: Arc<dyn ChartSource>,
    cache: ChartCache,
    in_flight: Arc<Mutex<Option<Flight>>>,
}

impl ChartService {
    pub fn new(source: Arc<dyn ChartSource>, cache: ChartCache) -> Self {
        Self {
            source,
            cache,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    pub fn cache(&self) -> &ChartCache {
        &self.cache
    }

    pub async fn current(&self) -> ProxyResult<Arc<CacheEntry>> {
        self.current_at(Utc::now()).await
    }

    pub async fn current_at(&self, now: DateTime<Utc>) -> ProxyResult<Arc<CacheEntry>> {
        if let Some(entry) = self.fresh_entry(now) {
            return Ok(entry);
        }

        let flight = {
            let mut in_flight = self.in_flight_slot();
            match in_flight.as_ref() {
                Some(flight) => flight.clone(),
                None => {
                    // A refresh may have completed between the first check and taking the slot.
                    if let Some(entry) = self.fresh_entry(now) {
                        return Ok(entry);
                    }
                    let flight = Flight::default();
                    *in_flight = Some(flight.clone());
                    flight
                }
            }
        };

        flight
            .get_or_init(|| async {
                let result = self.refresh(now).await;
                if let Err(e) = &result {
                    error!("Could not refresh melon chart. {e}");
                }
                self.finish_flight(&flight);
                result
            })
            .await
            .clone()
    }

    fn in_flight_slot(&self) -> std::sync::MutexGuard<'_, Option<Flight>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Later requests start a new refresh instead of reusing this outcome.
    fn finish_flight(&self, flight: &Flight) {
        let mut in_flight = self.in_flight_slot();
        if in_flight
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, flight))
        {
            *in_flight = None;
        }
    }

    fn fresh_entry(&self, now: DateTime<Utc>) -> Option<Arc<CacheEntry>> {
        if !self.cache.is_fresh(now) {
            return None;
        }
        let entry = self.cache.get()?;
        debug!(
            "Serving melon chart cached at {} (ttl {:?})",
            entry.timestamp,
            self.cache.ttl()
        );
        Some(entry)
    }

    async fn refresh(&self, now: DateTime<Utc>) -> ProxyResult<Arc<CacheEntry>> {
        let page = self.source.fetch().await?;
        let records = parse_chart(&page)?;
        info!("Melon chart refreshed with {} entries", records.len());
        Ok(self.cache.put(records, now))
    }
}
