//! Community discovery, attributes and deletion across instances

use super::{expect_rejection, main_community_on, scenario, wait_for_post};
use fedsuite_core::{random_string, SubscribedType};
use fedsuite_harness::assertions::{assert_community_federation, ensure, ensure_eq};
use fedsuite_harness::{scenario_body, Result, Scenario, ScenarioContext};
use serde_json::json;

pub(super) fn scenarios() -> Vec<Scenario> {
    vec![
        scenario(
            "community_main_posts_after_follow",
            "Main community posts arrive after a follow",
            "Alpha's main community shows no posts on beta until beta subscribes",
            scenario_body!(main_posts_after_follow),
        )
        .with_tags(vec!["community", "follow", "smoke"]),
        scenario(
            "community_attributes",
            "Remote community attributes",
            "A community resolved from beta matches its home copy",
            scenario_body!(remote_attributes),
        )
        .with_tags(vec!["community"]),
        scenario(
            "community_delete",
            "Delete and restore a community",
            "Deletion and restore of a community reach a following instance",
            scenario_body!(delete_and_restore),
        )
        .with_tags(vec!["community", "follow"]),
        scenario(
            "community_edit",
            "Edit a community",
            "Title and description changes on alpha reach beta",
            scenario_body!(edit_community),
        )
        .with_tags(vec!["community"]),
        scenario(
            "community_remove",
            "Remove and restore a community",
            "A removal by the home admin reaches beta and blocks posting; a remote admin's removal stays local",
            scenario_body!(remove_and_restore),
        )
        .with_tags(vec!["community", "moderation"]),
    ]
}

async fn main_posts_after_follow(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;

    let home = alpha.get_community_by_name(ctx.main_community()).await?;
    let on_beta = main_community_on(ctx, &beta, "alpha").await?;
    ensure_eq(on_beta.community.ap_id.clone(), home.community.ap_id.clone(), "main community reference")?;
    ensure_eq(on_beta.post_count(), 0, "posts on beta before any subscriber")?;

    let followed = ctx.follow(&beta, on_beta.community.id).await?;
    ensure_eq(followed.subscribed(), SubscribedType::Subscribed, "beta's follow state")?;

    let post = alpha.create_post(home.community.id).await?;
    wait_for_post(ctx, &beta, &post.post).await?;
    let counted = ctx
        .waiter()
        .wait_until(
            "post counted on beta",
            || beta.get_community(on_beta.community.id),
            |view| view.post_count() == 1,
        )
        .await?;
    ctx.note("posts_on_beta", json!(counted.post_count()));
    Ok(())
}

async fn remote_attributes(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;

    let community = alpha.create_community().await?;
    ensure(community.community.local, "new community is local on alpha")?;
    ensure_eq(
        community.subscribed(),
        SubscribedType::Subscribed,
        "creator follows its community",
    )?;

    let on_beta = ctx
        .waiter()
        .wait_for_some(
            "community reaches beta",
            || beta.resolve_community(&community.community.ap_id),
            |_| true,
        )
        .await?;
    ensure(!on_beta.community.local, "beta's copy is remote")?;
    assert_community_federation(&community, &on_beta)
}

async fn delete_and_restore(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;

    let community = alpha.create_community().await?;
    let on_beta = ctx
        .waiter()
        .wait_for_some(
            "community reaches beta",
            || beta.resolve_community(&community.community.ap_id),
            |_| true,
        )
        .await?;
    ctx.follow(&beta, on_beta.community.id).await?;

    let deleted = alpha.delete_community(community.community.id, true).await?;
    ensure(deleted.community.deleted, "alpha marks the community deleted")?;
    ctx.waiter()
        .wait_until(
            "community deletion reaches beta",
            || beta.get_community(on_beta.community.id),
            |view| view.community.deleted,
        )
        .await?;

    let restored = alpha.delete_community(community.community.id, false).await?;
    ensure(!restored.community.deleted, "alpha restores the community")?;
    let back = ctx
        .waiter()
        .wait_until(
            "community restore reaches beta",
            || beta.get_community(on_beta.community.id),
            |view| !view.community.deleted,
        )
        .await?;
    assert_community_federation(&restored, &back)?;
    assert_community_federation(&on_beta, &back)
}

async fn edit_community(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;

    let community = alpha.create_community().await?;
    ctx.waiter()
        .wait_for_some(
            "community reaches beta",
            || beta.resolve_community(&community.community.ap_id),
            |_| true,
        )
        .await?;

    let title = format!("Edited {}", random_string(6));
    let description = random_string(20);
    let edited = alpha
        .update_community_text(community.community.id, &title, &description)
        .await?;
    ensure_eq(edited.community.title.as_str(), title.as_str(), "title on alpha")?;

    let on_beta = ctx
        .waiter()
        .wait_for_some(
            "community edit reaches beta",
            || beta.resolve_community(&community.community.ap_id),
            |view| view.community.title == title,
        )
        .await?;
    assert_community_federation(&edited, &on_beta)
}

async fn remove_and_restore(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;

    let community = alpha.create_community().await?;
    let on_beta = ctx
        .waiter()
        .wait_for_some(
            "community reaches beta",
            || beta.resolve_community(&community.community.ap_id),
            |_| true,
        )
        .await?;

    let removed = alpha.remove_community(community.community.id, true).await?;
    ensure(removed.community.removed, "alpha marks the community removed")?;
    ctx.waiter()
        .wait_until(
            "community removal reaches beta",
            || beta.get_community(on_beta.community.id),
            |view| view.community.removed,
        )
        .await?;
    expect_rejection(beta.create_post(on_beta.community.id).await, "deleted")?;

    alpha.remove_community(community.community.id, false).await?;
    let back = ctx
        .waiter()
        .wait_until(
            "community restore reaches beta",
            || beta.get_community(on_beta.community.id),
            |view| !view.community.removed,
        )
        .await?;
    assert_community_federation(&on_beta, &back)?;

    // Beta's admin only hides beta's copy of a community homed on alpha.
    let hidden = beta.remove_community(on_beta.community.id, true).await?;
    ensure(hidden.community.removed, "beta marks its copy removed")?;
    let home = alpha.get_community(community.community.id).await?;
    ensure(!home.community.removed, "a remote admin removed the community at its home")?;
    let shown = beta.remove_community(on_beta.community.id, false).await?;
    assert_community_federation(&home, &shown)
}
