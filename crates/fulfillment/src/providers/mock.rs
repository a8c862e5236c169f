//! Scripted in-memory provider for tests and local runs.

use std::collections::VecDeque;
use std::sync::RwLock;

use common::GeoPoint;

use crate::providers::{PlacedOrder, ProviderClient, ProviderRequest, StatusSnapshot};
use crate::{FulfillmentError, Result};

/// A [`ProviderClient`] that answers from a script.
///
/// `create_order` hands out sequential external ids and the configured
/// initial status. Each `get_order` pops the next scripted snapshot;
/// once the script runs dry the last snapshot repeats, so a worker
/// polling past the end keeps seeing the final status. Failures can be
/// injected on either call to exercise retry paths.
pub struct MockProviderClient {
    prefix: String,
    provider: String,
    state: RwLock<MockState>,
}

struct MockState {
    create_status: String,
    script: VecDeque<(String, Option<GeoPoint>)>,
    last: Option<(String, Option<GeoPoint>)>,
    fail_on_create: bool,
    fail_next_gets: u32,
    create_count: u32,
    get_count: u32,
    created: Vec<ProviderRequest>,
}

impl MockProviderClient {
    pub fn new(provider: &str) -> Self {
        Self {
            prefix: provider.to_uppercase(),
            provider: provider.to_string(),
            state: RwLock::new(MockState {
                create_status: "not started".to_string(),
                script: VecDeque::new(),
                last: None,
                fail_on_create: false,
                fail_next_gets: 0,
                create_count: 0,
                get_count: 0,
                created: Vec::new(),
            }),
        }
    }

    /// A mock kitchen. Newly placed orders report "not started".
    pub fn restaurant(provider: &str) -> Self {
        Self::new(provider)
    }

    /// A mock courier. Newly booked rides report "not started".
    pub fn delivery(provider: &str) -> Self {
        Self::new(provider)
    }

    /// Overrides the status returned by `create_order`.
    pub fn set_create_status(&self, status: &str) {
        self.state.write().unwrap().create_status = status.to_string();
    }

    /// Appends a scripted poll answer without a location.
    pub fn script_poll(&self, status: &str) {
        self.script_poll_with(status, None);
    }

    /// Appends a scripted poll answer with a rider location.
    pub fn script_poll_at(&self, status: &str, location: GeoPoint) {
        self.script_poll_with(status, Some(location));
    }

    fn script_poll_with(&self, status: &str, location: Option<GeoPoint>) {
        self.state
            .write()
            .unwrap()
            .script
            .push_back((status.to_string(), location));
    }

    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create = fail;
    }

    /// Makes the next `count` calls to `get_order` fail before the
    /// script resumes.
    pub fn fail_next_gets(&self, count: u32) {
        self.state.write().unwrap().fail_next_gets = count;
    }

    pub fn create_count(&self) -> u32 {
        self.state.read().unwrap().create_count
    }

    pub fn get_count(&self) -> u32 {
        self.state.read().unwrap().get_count
    }

    /// Every request `create_order` has accepted, in call order.
    pub fn created_requests(&self) -> Vec<ProviderRequest> {
        self.state.read().unwrap().created.clone()
    }

    fn failure(&self, reason: &str) -> FulfillmentError {
        FulfillmentError::ExternalCall {
            provider: self.provider.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl ProviderClient for MockProviderClient {
    async fn create_order(&self, request: ProviderRequest) -> Result<PlacedOrder> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_create {
            return Err(self.failure("simulated create failure"));
        }
        state.create_count += 1;
        state.created.push(request);
        Ok(PlacedOrder {
            external_id: format!("{}-{:04}", self.prefix, state.create_count),
            status: state.create_status.clone(),
            location: None,
        })
    }

    async fn get_order(&self, _external_id: &str) -> Result<StatusSnapshot> {
        let mut state = self.state.write().unwrap();
        state.get_count += 1;
        if state.fail_next_gets > 0 {
            state.fail_next_gets -= 1;
            return Err(self.failure("simulated poll failure"));
        }
        let (status, location) = match state.script.pop_front() {
            Some(next) => {
                state.last = Some(next.clone());
                next
            }
            None => state
                .last
                .clone()
                .unwrap_or((state.create_status.clone(), None)),
        };
        Ok(StatusSnapshot { status, location })
    }
}
