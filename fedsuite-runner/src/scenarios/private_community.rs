//! Private communities: approval-gated follows and member-only content

use super::{expect_rejection, scenario};
use fedsuite_core::views::{CommunityView, CommunityVisibility};
use fedsuite_core::{PersonId, SubscribedType};
use fedsuite_harness::assertions::{ensure, ensure_eq};
use fedsuite_harness::factory::NewCommunity;
use fedsuite_harness::{scenario_body, Error, Result, Scenario, ScenarioContext, Session};

pub(super) fn scenarios() -> Vec<Scenario> {
    vec![
        scenario(
            "private_follow_approval",
            "Private community follow approval",
            "A follow from beta waits for approval and becomes Subscribed once approved",
            scenario_body!(follow_requires_approval),
        )
        .with_tags(vec!["private_community", "follow"]),
        scenario(
            "private_follow_rejected",
            "Private community follow rejection",
            "A rejected follow request falls back to NotSubscribed",
            scenario_body!(follow_rejected),
        )
        .with_tags(vec!["private_community", "follow"]),
        scenario(
            "private_content_visibility",
            "Private content visibility",
            "Posts and comments are hidden from non-followers and readable after approval",
            scenario_body!(content_visible_after_approval),
        )
        .with_tags(vec!["private_community"]),
        scenario(
            "private_only_followers_post",
            "Only followers post in private communities",
            "A non-follower is rejected with private_community until approved",
            scenario_body!(only_followers_post),
        )
        .with_tags(vec!["private_community"]),
    ]
}

/// A private community on alpha and a fresh user on beta who can see it.
struct PrivateSetup {
    home: CommunityView,
    user: Session,
    on_beta: CommunityView,
}

async fn private_setup(ctx: &ScenarioContext) -> Result<PrivateSetup> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;

    let home = alpha
        .create_community_with(NewCommunity {
            visibility: Some(CommunityVisibility::Private),
            ..Default::default()
        })
        .await?;
    ensure_eq(
        home.community.visibility,
        CommunityVisibility::Private,
        "visibility of the new community",
    )?;

    let user = beta.register_user().await?;
    let on_beta = ctx
        .waiter()
        .wait_for_some(
            "private community reaches beta",
            || user.resolve_community(&home.community.ap_id),
            |_| true,
        )
        .await?;
    Ok(PrivateSetup {
        home,
        user,
        on_beta,
    })
}

/// Wait for `user`'s request to show up on alpha and return the follower id.
async fn pending_follower(ctx: &ScenarioContext, alpha: &Session, setup: &PrivateSetup) -> Result<PersonId> {
    let me = setup.user.my_user().await?;
    let ap_id = me.local_user_view.person.ap_id;
    let pending = ctx
        .waiter()
        .wait_until(
            "follow request reaches alpha",
            || alpha.list_pending_follows(),
            |list| {
                list.items.iter().any(|item| {
                    item.person.ap_id == ap_id && item.community.ap_id == setup.home.community.ap_id
                })
            },
        )
        .await?;
    pending
        .items
        .into_iter()
        .find(|item| item.person.ap_id == ap_id)
        .map(|item| item.person.id)
        .ok_or_else(|| Error::assertion("pending follow vanished between polls"))
}

async fn follow_requires_approval(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let setup = private_setup(ctx).await?;
    let before = alpha.pending_follows_count().await?;

    let requested = ctx.follow(&setup.user, setup.on_beta.community.id).await?;
    ensure_eq(
        requested.subscribed(),
        SubscribedType::ApprovalRequired,
        "follow state before approval",
    )?;

    let follower = pending_follower(ctx, &alpha, &setup).await?;
    ensure_eq(alpha.pending_follows_count().await?, before + 1, "pending follows on alpha")?;

    alpha
        .approve_pending_follow(setup.home.community.id, follower, true)
        .await?;
    let approved = ctx.await_approval(&setup.user, setup.on_beta.community.id).await?;
    ensure_eq(approved.subscribed(), SubscribedType::Subscribed, "follow state after approval")?;
    ensure_eq(alpha.pending_follows_count().await?, before, "pending follows after approval")
}

async fn follow_rejected(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let setup = private_setup(ctx).await?;
    let before = alpha.pending_follows_count().await?;

    ctx.follow(&setup.user, setup.on_beta.community.id).await?;
    let follower = pending_follower(ctx, &alpha, &setup).await?;
    alpha
        .approve_pending_follow(setup.home.community.id, follower, false)
        .await?;

    let rejected = ctx
        .await_rejection(&setup.user, setup.on_beta.community.id)
        .await?;
    ensure_eq(rejected.subscribed(), SubscribedType::NotSubscribed, "follow state after rejection")?;
    ensure_eq(alpha.pending_follows_count().await?, before, "pending follows after rejection")
}

async fn content_visible_after_approval(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let setup = private_setup(ctx).await?;
    let post = alpha.create_post(setup.home.community.id).await?;
    let comment = alpha.create_comment(post.post.id, None).await?;

    match setup.user.resolve_post(&post.post.ap_id).await {
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e),
        Ok(found) => {
            return Err(Error::assertion(format!(
                "non-follower resolved a private post (found: {})",
                found.is_some()
            )))
        }
    }

    ctx.follow(&setup.user, setup.on_beta.community.id).await?;
    let follower = pending_follower(ctx, &alpha, &setup).await?;
    alpha
        .approve_pending_follow(setup.home.community.id, follower, true)
        .await?;
    ctx.await_approval(&setup.user, setup.on_beta.community.id).await?;

    let visible = ctx
        .waiter()
        .wait_for_some(
            "private post readable after approval",
            || setup.user.resolve_post(&post.post.ap_id),
            |_| true,
        )
        .await?;
    ensure_eq(visible.post.ap_id.clone(), post.post.ap_id.clone(), "post reference")?;

    ctx.waiter()
        .wait_until(
            "private comment readable after approval",
            || setup.user.get_comments(visible.post.id),
            |comments| comments.iter().any(|c| c.comment.ap_id == comment.comment.ap_id),
        )
        .await?;

    // Stays readable once granted.
    let again = setup.user.get_post(visible.post.id).await?;
    ensure_eq(again.post.ap_id, post.post.ap_id, "post reference on re-read")
}

async fn only_followers_post(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let setup = private_setup(ctx).await?;

    let err = expect_rejection(
        setup.user.create_post(setup.on_beta.community.id).await,
        "private_community",
    )?;
    ensure(err.is_permission(), "private_community is a permission error")?;

    ctx.follow(&setup.user, setup.on_beta.community.id).await?;
    let follower = pending_follower(ctx, &alpha, &setup).await?;
    alpha
        .approve_pending_follow(setup.home.community.id, follower, true)
        .await?;
    ctx.await_approval(&setup.user, setup.on_beta.community.id).await?;

    let post = setup.user.create_post(setup.on_beta.community.id).await?;
    ctx.waiter()
        .wait_for_some(
            "follower's post reaches alpha",
            || alpha.resolve_post(&post.post.ap_id),
            |_| true,
        )
        .await?;
    Ok(())
}
