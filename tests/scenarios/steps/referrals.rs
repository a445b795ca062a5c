//! Referral ledger and fee reconciliation step definitions.

use circles::model::{NewMember, Referral, ReferralStatus};
use circles::Clock;
use cucumber::{given, then, when};

use super::CirclesWorld;

const FEEDER_GROUP: &str = "Feeder";

async fn register(world: &mut CirclesWorld, username: &str, phone: &str, code: &str) {
    let result = world
        .engine()
        .register_member(NewMember::customer(username, username, phone), Some(code))
        .await;
    if let Some(member) = world.capture(result) {
        world.members.insert(username.to_string(), member);
    }
}

async fn feeder_group(world: &mut CirclesWorld) -> uuid::Uuid {
    match world.groups.get(FEEDER_GROUP) {
        Some(id) => *id,
        None => world.add_group(FEEDER_GROUP, 50, 100).await,
    }
}

#[when(expr = "{string} registers with phone {string} using the code of {string}")]
async fn when_register_with_code_of(
    world: &mut CirclesWorld,
    username: String,
    phone: String,
    referrer: String,
) {
    let code = world.member(&referrer).referral_code.clone();
    register(world, &username, &phone, &code).await;
}

#[when(expr = "{string} registers with phone {string} using the code {string}")]
async fn when_register_with_code(world: &mut CirclesWorld, username: String, phone: String, code: String) {
    register(world, &username, &phone, &code).await;
}

#[then(expr = "{string} has {int} pending referral(s)")]
async fn then_pending_referrals(world: &mut CirclesWorld, username: String, count: usize) {
    let referrals = world
        .engine()
        .referrals_made(world.member_id(&username))
        .await
        .unwrap();
    assert_eq!(referrals.len(), count);
    assert!(referrals.iter().all(|r| r.status == ReferralStatus::Pending));
}

#[then(expr = "no member {string} exists")]
async fn then_not_registered(world: &mut CirclesWorld, username: String) {
    assert!(!world.members.contains_key(&username));
}

#[when(expr = "{string} joins a group and pays a first fee")]
async fn when_qualified(world: &mut CirclesWorld, username: String) {
    let group_id = feeder_group(world).await;
    let member_id = world.member_id(&username);
    world
        .engine()
        .on_membership_joined(group_id, member_id)
        .await
        .expect("Failed to join");
    world
        .engine()
        .verify_fee_payment(member_id)
        .await
        .expect("Failed to verify fee");
}

async fn referral_of(world: &CirclesWorld, referred: &str) -> Referral {
    let referred_id = world.member_id(referred);
    for member in world.members.values() {
        let made = world.engine().referrals_made(member.id).await.unwrap();
        if let Some(referral) = made.into_iter().find(|r| r.referred_id == referred_id) {
            return referral;
        }
    }
    panic!("No referral for {referred}");
}

#[when(expr = "the referral of {string} gets credited")]
async fn when_credit(world: &mut CirclesWorld, referred: String) {
    let referral_id = referral_of(world, &referred).await.id;
    let result = world.engine().credit_referral(referral_id).await;
    world.capture(result);
}

#[then(expr = "the referral of {string} is {word}")]
async fn then_referral_status(world: &mut CirclesWorld, referred: String, status: String) {
    let referral = referral_of(world, &referred).await;
    assert_eq!(referral.status.as_str(), status);
}

#[given(expr = "{string} has {int} credited referrals")]
async fn given_credited_referrals(world: &mut CirclesWorld, username: String, count: usize) {
    let code = world.member(&username).referral_code.clone();
    let group_id = feeder_group(world).await;
    for i in 0..count {
        let friend = format!("{username}-friend-{i}");
        let referred = world
            .engine()
            .register_member(
                NewMember::customer(friend.as_str(), "Friend", format!("70000000{i:02}")),
                Some(&code),
            )
            .await
            .expect("Failed to register referred member");
        world
            .engine()
            .on_membership_joined(group_id, referred.id)
            .await
            .expect("Failed to join");
        world
            .engine()
            .verify_fee_payment(referred.id)
            .await
            .expect("Failed to verify fee");
        world.members.insert(friend, referred);
    }
    let referrer_id = world.member_id(&username);
    for referral in world.engine().referrals_made(referrer_id).await.unwrap() {
        world
            .engine()
            .credit_referral(referral.id)
            .await
            .expect("Failed to credit referral");
    }
}

#[then(expr = "{string} could save {int} on a fee of {int}")]
async fn then_preview(world: &mut CirclesWorld, username: String, credit: i64, gross: i64) {
    let preview = world
        .engine()
        .preview_credit_for_month(world.member_id(&username), gross)
        .await
        .unwrap();
    assert_eq!(preview, credit);
}

#[when(expr = "{string} pays the monthly fee")]
async fn when_fee_paid(world: &mut CirclesWorld, username: String) {
    let member_id = world.member_id(&username);
    let result = world.engine().verify_fee_payment(member_id).await;
    if let Some(payment) = world.capture(result) {
        world.fee_payments.push(payment);
    }
}

#[then(expr = "the fee is {int} gross, {int} credit and {int} net")]
async fn then_fee(world: &mut CirclesWorld, gross: i64, credit: i64, net: i64) {
    let payment = world.fee_payments.last().expect("No fee payment");
    assert_eq!(payment.gross, gross);
    assert_eq!(payment.credit_applied, credit);
    assert_eq!(payment.net, net);
    assert_eq!(payment.month, world.clock.current_month());
}

#[then("both fee records match")]
async fn then_fee_records_match(world: &mut CirclesWorld) {
    assert_eq!(world.fee_payments.len(), 2);
    assert_eq!(world.fee_payments[0], world.fee_payments[1]);
}

#[then(expr = "{int} referral credits of {string} are used this month")]
async fn then_credits_used(world: &mut CirclesWorld, count: usize, username: String) {
    let month = world.clock.current_month();
    let used = world
        .engine()
        .referrals_made(world.member_id(&username))
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.credit_used && r.credit_used_month == Some(month))
        .count();
    assert_eq!(used, count);
}
