//! Step definitions shared by every scenario file.

pub mod group_cycle;
pub mod referrals;
pub mod trust;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use circles::config::Config;
use circles::model::{EarlyPayoutRequest, FeePayment, Member, NewGroup, NewMember};
use circles::{Circles, EngineError, ManualClock};
use cucumber::{given, then, when, World};
use uuid::Uuid;

/// Test context for circles scenarios.
#[derive(Debug, World)]
#[world(init = Self::new)]
pub struct CirclesWorld {
    pub clock: Arc<ManualClock>,
    pub circles: Option<Circles>,
    pub members: HashMap<String, Member>,
    pub groups: HashMap<String, Uuid>,
    pub fee_payments: Vec<FeePayment>,
    pub last_request: Option<EarlyPayoutRequest>,
    pub last_error: Option<EngineError>,
}

impl CirclesWorld {
    fn new() -> Self {
        Self {
            clock: Arc::new(ManualClock::on(parse_date("2026-01-01"))),
            circles: None,
            members: HashMap::new(),
            groups: HashMap::new(),
            fee_payments: Vec::new(),
            last_request: None,
            last_error: None,
        }
    }

    pub fn engine(&self) -> &Circles {
        self.circles.as_ref().expect("Engine not started")
    }

    pub fn member_id(&self, username: &str) -> Uuid {
        self.members
            .get(username)
            .unwrap_or_else(|| panic!("Unknown member {username}"))
            .id
    }

    pub fn member(&self, username: &str) -> &Member {
        self.members
            .get(username)
            .unwrap_or_else(|| panic!("Unknown member {username}"))
    }

    pub fn group_id(&self, name: &str) -> Uuid {
        *self
            .groups
            .get(name)
            .unwrap_or_else(|| panic!("Unknown group {name}"))
    }

    /// Keep the value on success, remember the error otherwise.
    pub fn capture<T>(&mut self, result: Result<T, EngineError>) -> Option<T> {
        match result {
            Ok(value) => {
                self.last_error = None;
                Some(value)
            }
            Err(e) => {
                self.last_error = Some(e);
                None
            }
        }
    }

    pub async fn add_customer(&mut self, username: &str, phone: &str) -> Member {
        let member = self
            .engine()
            .register_member(NewMember::customer(username, username, phone), None)
            .await
            .expect("Failed to register member");
        self.members.insert(username.to_string(), member.clone());
        member
    }

    pub async fn add_group(&mut self, name: &str, max_members: u32, monthly_amount: i64) -> Uuid {
        let group = self
            .engine()
            .create_group(NewGroup::new(name, monthly_amount).with_max_members(max_members))
            .await
            .expect("Failed to create group");
        self.groups.insert(name.to_string(), group.id);
        group.id
    }
}

pub fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("Dates are written YYYY-MM-DD")
}

// ==========================================================================
// Background
// ==========================================================================

#[given(expr = "a circles engine on {string}")]
async fn given_engine(world: &mut CirclesWorld, day: String) {
    world.clock.set_date(parse_date(&day));
    let circles = Circles::builder(Config::for_test())
        .with_clock(world.clock.clone())
        .build()
        .await
        .expect("Failed to open engine");
    world.circles = Some(circles);
}

#[given(expr = "the date is {string}")]
async fn given_date(world: &mut CirclesWorld, day: String) {
    world.clock.set_date(parse_date(&day));
}

#[when(expr = "the date is {string}")]
async fn when_date(world: &mut CirclesWorld, day: String) {
    world.clock.set_date(parse_date(&day));
}

#[given(expr = "a customer {string} with phone {string}")]
async fn given_customer(world: &mut CirclesWorld, username: String, phone: String) {
    world.add_customer(&username, &phone).await;
}

#[given(expr = "{string} has UPI ID {string}")]
async fn given_upi(world: &mut CirclesWorld, username: String, upi: String) {
    let id = world.member_id(&username);
    let member = world
        .engine()
        .update_payment_handle(id, Some(&upi))
        .await
        .expect("Failed to set UPI ID");
    world.members.insert(username, member);
}

#[given(expr = "a group {string} of {int} members paying {int} a month")]
async fn given_group(world: &mut CirclesWorld, name: String, max_members: u32, amount: i64) {
    world.add_group(&name, max_members, amount).await;
}

// ==========================================================================
// Outcomes
// ==========================================================================

#[then(expr = "the operation is rejected with {string}")]
async fn then_rejected_with(world: &mut CirclesWorld, reason: String) {
    let err = world.last_error.as_ref().expect("Expected a rejection");
    assert_eq!(err.to_string(), reason);
}

#[then("the operation is rejected")]
async fn then_rejected(world: &mut CirclesWorld) {
    let err = world.last_error.as_ref().expect("Expected a rejection");
    assert!(err.is_rejection(), "unexpected failure: {err}");
}
