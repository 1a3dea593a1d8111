//! Activities from alpha relayed by beta's community to gamma
//!
//! Gamma never talks to alpha directly in these scenarios: it only reads
//! its own copies, which reach it through beta's announce.

use super::scenario;
use fedsuite_core::views::{CommunityView, Post, PostView};
use fedsuite_core::ObjectRef;
use fedsuite_harness::assertions::{assert_post_federation, ensure};
use fedsuite_harness::{scenario_body, Result, Scenario, ScenarioContext, Session};

pub(super) fn scenarios() -> Vec<Scenario> {
    vec![
        scenario(
            "remote_post_relayed",
            "Post relayed to a third instance",
            "Alpha posts in beta's community and gamma reads its own copy",
            scenario_body!(post_relayed),
        )
        .with_tags(vec!["remote_home_remote", "follow"]),
        scenario(
            "remote_feature_relayed",
            "Feature relayed to a third instance",
            "A remote moderator on alpha features a post and gamma sees the flag",
            scenario_body!(feature_relayed),
        )
        .with_tags(vec!["remote_home_remote", "moderation"])
        .known_failure("featured flag set by a remote moderator is not announced to other subscribers"),
        scenario(
            "remote_distinguish_relayed",
            "Distinguished comment relayed to a third instance",
            "A remote moderator on alpha distinguishes a comment and gamma sees the flag",
            scenario_body!(distinguish_relayed),
        )
        .with_tags(vec!["remote_home_remote", "moderation"])
        .known_failure("distinguished flag set by a remote moderator is not announced to other subscribers"),
    ]
}

/// Follow the copy of a beta community on `session`'s instance.
async fn follow_copy(ctx: &mut ScenarioContext, session: &Session, ap_id: &ObjectRef) -> Result<CommunityView> {
    let copy = ctx
        .waiter()
        .wait_for_some(
            &format!("community reaches {}", session.name()),
            || session.resolve_community(ap_id),
            |_| true,
        )
        .await?;
    ctx.follow(session, copy.community.id).await?;
    Ok(copy)
}

/// A fresh community on beta followed from alpha and gamma; returns
/// alpha's copy.
async fn relay_community(ctx: &mut ScenarioContext, with_alpha_moderator: bool) -> Result<CommunityView> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;
    let gamma = ctx.session("gamma")?;

    let home = beta.create_community().await?;
    let on_alpha = follow_copy(ctx, &alpha, &home.community.ap_id).await?;
    follow_copy(ctx, &gamma, &home.community.ap_id).await?;

    if with_alpha_moderator {
        let moderator = ctx
            .waiter()
            .wait_for_some(
                "alpha's seed user reaches beta",
                || beta.resolve_person(alpha.person_locator()),
                |_| true,
            )
            .await?;
        beta.add_mod(home.community.id, moderator.person.id).await?;
    }
    Ok(on_alpha)
}

/// Wait with the relay budget until gamma holds its own copy of `post`.
async fn relayed_to_gamma(ctx: &ScenarioContext, gamma: &Session, post: &Post) -> Result<PostView> {
    ctx.relay_waiter()
        .wait_for_some(
            "post relayed to gamma",
            || gamma.find_local_post(post),
            |_| true,
        )
        .await
}

async fn post_relayed(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let gamma = ctx.session("gamma")?;
    let community = relay_community(ctx, false).await?;

    let post = alpha.create_post(community.community.id).await?;
    let on_gamma = relayed_to_gamma(ctx, &gamma, &post.post).await?;
    ensure(!on_gamma.post.local, "gamma's copy is remote")?;
    assert_post_federation(&post, &on_gamma)
}

async fn feature_relayed(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let gamma = ctx.session("gamma")?;
    let community = relay_community(ctx, true).await?;

    let post = alpha.create_post(community.community.id).await?;
    relayed_to_gamma(ctx, &gamma, &post.post).await?;

    let featured = alpha.feature_post(post.post.id, true).await?;
    ensure(featured.post.featured_community, "alpha features the post")?;
    ctx.relay_waiter()
        .wait_for_some(
            "feature relayed to gamma",
            || gamma.find_local_post(&post.post),
            |view| view.post.featured_community,
        )
        .await?;
    Ok(())
}

async fn distinguish_relayed(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let gamma = ctx.session("gamma")?;
    let community = relay_community(ctx, true).await?;

    let post = alpha.create_post(community.community.id).await?;
    let comment = alpha.create_comment(post.post.id, None).await?;
    let post_on_gamma = relayed_to_gamma(ctx, &gamma, &post.post).await?;
    ctx.relay_waiter()
        .wait_until(
            "comment relayed to gamma",
            || gamma.get_comments(post_on_gamma.post.id),
            |comments| comments.iter().any(|c| c.comment.ap_id == comment.comment.ap_id),
        )
        .await?;

    let distinguished = alpha.distinguish_comment(comment.comment.id, true).await?;
    ensure(distinguished.comment.distinguished, "alpha distinguishes the comment")?;
    ctx.relay_waiter()
        .wait_until(
            "distinguish relayed to gamma",
            || gamma.get_comments(post_on_gamma.post.id),
            |comments| {
                comments
                    .iter()
                    .any(|c| c.comment.ap_id == comment.comment.ap_id && c.comment.distinguished)
            },
        )
        .await?;
    Ok(())
}
