//! Group cycle step definitions.

use circles::model::{GroupStatus, NewGroup};
use cucumber::{then, when};

use super::{parse_date, CirclesWorld};

#[when(expr = "{string} joins {string}")]
async fn when_joins(world: &mut CirclesWorld, username: String, group: String) {
    let (group_id, member_id) = (world.group_id(&group), world.member_id(&username));
    let result = world.engine().on_membership_joined(group_id, member_id).await;
    world.capture(result);
}

#[when(expr = "{string} starts a group {string} of {int} members paying {int} a month")]
async fn when_member_creates_group(
    world: &mut CirclesWorld,
    username: String,
    group: String,
    max_members: u32,
    amount: i64,
) {
    let member_id = world.member_id(&username);
    let new_group = NewGroup::new(group.as_str(), amount).with_max_members(max_members);
    let result = world.engine().create_member_group(member_id, new_group).await;
    if let Some(outcome) = world.capture(result) {
        world.groups.insert(group, outcome.group.id);
    }
}

#[when(expr = "{string} is picked to receive the payout of {string}")]
async fn when_receiver_selected(world: &mut CirclesWorld, username: String, group: String) {
    let (group_id, member_id) = (world.group_id(&group), world.member_id(&username));
    let result = world
        .engine()
        .select_payout_receiver(group_id, member_id)
        .await;
    world.capture(result);
}

#[then(expr = "group {string} is still forming")]
async fn then_forming(world: &mut CirclesWorld, group: String) {
    let group = world.engine().get_group(world.group_id(&group)).await.unwrap();
    assert_eq!(group.status, GroupStatus::Formation);
    assert!(group.schedule.is_none());
}

#[then(expr = "group {string} is active since {string} with the first payout due {string}")]
async fn then_active(world: &mut CirclesWorld, group: String, since: String, due: String) {
    let group = world.engine().get_group(world.group_id(&group)).await.unwrap();
    assert_eq!(group.status, GroupStatus::Active);
    let schedule = group.schedule.expect("Active group must be scheduled");
    assert_eq!(schedule.activated_on, parse_date(&since));
    assert_eq!(schedule.next_due_date, parse_date(&due));
}

#[then(expr = "group {string} pays out to {string}")]
async fn then_pays_out_to(world: &mut CirclesWorld, group: String, upi: String) {
    assert!(world.last_error.is_none(), "{:?}", world.last_error);
    let group = world.engine().get_group(world.group_id(&group)).await.unwrap();
    let receiver = group.receiver.expect("Receiver should be selected");
    assert_eq!(receiver.upi_id, upi);
}

#[then(expr = "group {string} has no payout receiver")]
async fn then_no_receiver(world: &mut CirclesWorld, group: String) {
    let group = world.engine().get_group(world.group_id(&group)).await.unwrap();
    assert!(group.receiver.is_none());
}
