//! Trust score and early payout step definitions.

use chrono::Duration;
use circles::model::{KycDocument, PayoutDecision, PayoutRequestStatus};
use circles::{Clock, EngineError};
use cucumber::{given, then, when};

use super::CirclesWorld;

#[given(expr = "{string} paid on time for {int} cycles in {string}")]
async fn given_on_time(world: &mut CirclesWorld, username: String, cycles: u32, group: String) {
    let (group_id, member_id) = (world.group_id(&group), world.member_id(&username));
    let today = world.clock.today();
    for cycle in 1..=cycles {
        let due = today - Duration::days(30 * cycle as i64);
        let paid_at = due.and_hms_opt(10, 0, 0).unwrap().and_utc();
        world
            .engine()
            .record_contribution(member_id, group_id, due, paid_at, true)
            .await
            .expect("Failed to record contribution");
    }
}

#[given(expr = "{string} missed a payment in {string}")]
async fn given_missed(world: &mut CirclesWorld, username: String, group: String) {
    let (group_id, member_id) = (world.group_id(&group), world.member_id(&username));
    let due = world.clock.today();
    world
        .engine()
        .record_missed_payment(member_id, group_id, due)
        .await
        .expect("Failed to record missed payment");
}

#[given(expr = "{string} has an identity proof on file")]
async fn given_kyc(world: &mut CirclesWorld, username: String) {
    let member_id = world.member_id(&username);
    world
        .engine()
        .record_kyc_document(member_id, KycDocument::IdentityProof)
        .await
        .expect("Failed to record KYC document");
}

#[then(expr = "the trust score of {string} is {int}")]
async fn then_score(world: &mut CirclesWorld, username: String, expected: i32) {
    let score = world
        .engine()
        .get_trust_score(world.member_id(&username))
        .await
        .unwrap();
    assert_eq!(score.score, expected);
    assert!((0..=100).contains(&score.score));
}

#[when(expr = "{string} asks for an early payout from {string}")]
async fn when_request(world: &mut CirclesWorld, username: String, group: String) {
    let (group_id, member_id) = (world.group_id(&group), world.member_id(&username));
    let result = world
        .engine()
        .request_early_payout(member_id, group_id, "Family emergency")
        .await;
    world.last_request = world.capture(result);
}

#[when(expr = "the deposit is paid with reference {string}")]
async fn when_deposit_paid(world: &mut CirclesWorld, utr: String) {
    let request_id = world.last_request.as_ref().expect("No request").id;
    let result = world.engine().submit_deposit(request_id, &utr).await;
    if let Some(request) = world.capture(result) {
        world.last_request = Some(request);
    }
}

#[when(expr = "an admin verifies the deposit with reference {string}")]
async fn when_deposit_verified(world: &mut CirclesWorld, utr: String) {
    let request_id = world.last_request.as_ref().expect("No request").id;
    let result = world.engine().verify_deposit(request_id, &utr).await;
    if let Some(request) = world.capture(result) {
        world.last_request = Some(request);
    }
}

#[when("an admin approves the request")]
async fn when_approved(world: &mut CirclesWorld) {
    let request_id = world.last_request.as_ref().expect("No request").id;
    let result = world
        .engine()
        .decide_early_payout(request_id, PayoutDecision::Approve, None)
        .await;
    if let Some(request) = world.capture(result) {
        world.last_request = Some(request);
    }
}

#[then("the request is refused only for the trust score")]
async fn then_refused_for_score(world: &mut CirclesWorld) {
    assert!(world.last_request.is_none());
    match world.last_error.as_ref() {
        Some(EngineError::Ineligible(reasons)) => {
            assert_eq!(reasons.len(), 1, "{reasons:?}");
            assert!(reasons[0].starts_with("Trust score"));
        }
        other => panic!("Expected an eligibility failure, got {other:?}"),
    }
}

#[then(expr = "a deposit of {int} is requested")]
async fn then_deposit_amount(world: &mut CirclesWorld, amount: i64) {
    let request = world.last_request.as_ref().expect("Request should exist");
    assert_eq!(request.status, PayoutRequestStatus::PendingDeposit);
    assert_eq!(request.deposit_amount, amount);
}

#[then(expr = "the request is {word}")]
async fn then_request_status(world: &mut CirclesWorld, status: String) {
    let request = world.last_request.as_ref().expect("Request should exist");
    assert_eq!(request.status.as_str(), status);
}
