//! Per-fingerprint single-flight coordination.
//!
//! The first miss on a fingerprint becomes the leader and computes the
//! result set; concurrent renders of the same configuration join as
//! followers and receive the leader's result over a watch channel, without
//! going back to the store. A leader that fails or is dropped closes the
//! channel and its followers compute on their own.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;
use wpp_widget_types::PopularPost;

use super::keys::Fingerprint;

type Slot = watch::Sender<Option<Vec<PopularPost>>>;

#[derive(Default, Clone)]
pub struct SingleFlight {
    slots: Arc<DashMap<Fingerprint, Slot>>,
}

/// Role handed out by [`SingleFlight::join`].
pub enum Flight {
    Leader(FlightLease),
    Follower(FlightWaiter),
}

impl SingleFlight {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
        }
    }

    /// Lead the computation of `key`, or follow the render already leading it.
    pub fn join(&self, key: &Fingerprint) -> Flight {
        match self.slots.entry(key.clone()) {
            Entry::Occupied(slot) => Flight::Follower(FlightWaiter {
                receiver: slot.get().subscribe(),
            }),
            Entry::Vacant(slot) => {
                let (sender, _) = watch::channel(None);
                slot.insert(sender);
                Flight::Leader(FlightLease {
                    key: key.clone(),
                    slots: Arc::clone(&self.slots),
                })
            }
        }
    }

    /// Whether a leader currently holds `key`.
    pub fn is_in_flight(&self, key: &Fingerprint) -> bool {
        self.slots.contains_key(key)
    }

    pub fn in_flight(&self) -> usize {
        self.slots.len()
    }
}

/// Leadership over one fingerprint; the slot is released on drop.
pub struct FlightLease {
    key: Fingerprint,
    slots: Arc<DashMap<Fingerprint, Slot>>,
}

impl FlightLease {
    /// Hand `posts` to every current and later follower of this flight.
    pub fn publish(&self, posts: &[PopularPost]) {
        if let Some(slot) = self.slots.get(&self.key) {
            slot.send_replace(Some(posts.to_vec()));
        }
    }
}

impl Drop for FlightLease {
    fn drop(&mut self) {
        self.slots.remove(&self.key);
    }
}

/// Follower side of a flight.
pub struct FlightWaiter {
    receiver: watch::Receiver<Option<Vec<PopularPost>>>,
}

impl FlightWaiter {
    /// The leader's result, or `None` when the leader gave up without one.
    pub async fn recv(mut self) -> Option<Vec<PopularPost>> {
        match self.receiver.wait_for(Option::is_some).await {
            Ok(published) => published.clone(),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use time::macros::datetime;
    use wpp_widget_types::WidgetConfig;

    use super::super::keys::derive_key;
    use super::*;

    fn key(limit: u32) -> Fingerprint {
        derive_key(&WidgetConfig {
            limit,
            ..Default::default()
        })
    }

    fn post(id: u64) -> PopularPost {
        PopularPost {
            id,
            title: format!("Post {id}"),
            permalink: format!("https://example.com/?p={id}"),
            author_id: 1,
            date: datetime!(2024-03-01 9:30 UTC),
            comment_count: 0,
            pageviews: id,
            avg_views: 0.0,
            thumbnail_url: None,
        }
    }

    fn lead(flights: &SingleFlight, fingerprint: &Fingerprint) -> FlightLease {
        match flights.join(fingerprint) {
            Flight::Leader(lease) => lease,
            Flight::Follower(_) => panic!("expected to lead"),
        }
    }

    fn follow(flights: &SingleFlight, fingerprint: &Fingerprint) -> FlightWaiter {
        match flights.join(fingerprint) {
            Flight::Follower(waiter) => waiter,
            Flight::Leader(_) => panic!("expected to follow"),
        }
    }

    #[tokio::test]
    async fn lease_is_released_on_drop() {
        let flights = SingleFlight::new();
        let fingerprint = key(10);

        let lease = lead(&flights, &fingerprint);
        assert!(flights.is_in_flight(&fingerprint));
        drop(lease);

        assert!(!flights.is_in_flight(&fingerprint));
        assert_eq!(flights.in_flight(), 0);
        let _next = lead(&flights, &fingerprint);
    }

    #[tokio::test]
    async fn followers_receive_the_published_result() {
        let flights = SingleFlight::new();
        let fingerprint = key(10);

        let lease = lead(&flights, &fingerprint);
        let early = tokio::spawn(follow(&flights, &fingerprint).recv());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!early.is_finished());

        lease.publish(&[post(1)]);
        let late = follow(&flights, &fingerprint);
        drop(lease);

        assert_eq!(early.await.expect("follower joins"), Some(vec![post(1)]));
        assert_eq!(late.recv().await, Some(vec![post(1)]));
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn abandoned_lease_releases_followers_empty_handed() {
        let flights = SingleFlight::new();
        let fingerprint = key(10);

        let lease = lead(&flights, &fingerprint);
        let waiter = follow(&flights, &fingerprint);
        drop(lease);

        assert_eq!(waiter.recv().await, None);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_share_a_flight() {
        let flights = SingleFlight::new();
        let _first = lead(&flights, &key(1));
        let _second = lead(&flights, &key(2));
        assert_eq!(flights.in_flight(), 2);
    }
}
