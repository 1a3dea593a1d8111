//! Private messages from alpha to beta's seed user

use super::{expect_rejection, scenario};
use fedsuite_harness::assertions::{ensure, ensure_eq};
use fedsuite_harness::{scenario_body, Result, Scenario, ScenarioContext};

pub(super) fn scenarios() -> Vec<Scenario> {
    vec![scenario(
        "private_message_lifecycle",
        "Private message lifecycle",
        "Send, edit, delete and restore a message to a user on another instance",
        scenario_body!(message_lifecycle),
    )
    .with_tags(vec!["private_message"])]
}

async fn message_lifecycle(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;

    let recipient = ctx
        .waiter()
        .wait_for_some(
            "beta's seed user reaches alpha",
            || alpha.resolve_person(beta.person_locator()),
            |_| true,
        )
        .await?;
    ensure(!recipient.person.local, "recipient is remote on alpha")?;

    let sent = alpha.create_private_message(recipient.person.id).await?;
    let message = &sent.private_message;
    ensure(message.local, "message is local on alpha")?;
    ensure_eq(&sent.recipient.ap_id, &recipient.person.ap_id, "recipient")?;
    ensure_eq(sent.creator.name.as_str(), alpha.username(), "sender")?;

    let content = "A private message edit";
    let edited = alpha.edit_private_message(message.id, content).await?;
    ensure_eq(edited.private_message.content.as_str(), content, "edited content")?;
    ensure_eq(&edited.private_message.ap_id, &message.ap_id, "message reference")?;

    let deleted = alpha.delete_private_message(message.id, true).await?;
    ensure(deleted.private_message.deleted, "message marked deleted")?;
    let restored = alpha.delete_private_message(message.id, false).await?;
    ensure(!restored.private_message.deleted, "message restored")?;
    ensure_eq(restored.private_message.content.as_str(), content, "content after restore")?;

    // Only the sender may rewrite a message.
    let other = alpha.register_user().await?;
    expect_rejection(
        other.edit_private_message(message.id, "rewritten").await,
        "edit_private_message_not_allowed",
    )?;
    Ok(())
}
