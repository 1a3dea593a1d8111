//! Posts created on alpha in beta's main community

use super::{beta_main, expect_rejection, scenario, wait_for_post};
use fedsuite_core::views::{PostReportView, ReportView};
use fedsuite_core::{random_string, CommunityId};
use fedsuite_harness::assertions::{assert_post_federation, ensure, ensure_eq};
use fedsuite_harness::{scenario_body, Error, Result, Scenario, ScenarioContext, Session};
use serde_json::json;

pub(super) fn scenarios() -> Vec<Scenario> {
    vec![
        scenario(
            "post_create",
            "Create a post",
            "Post on alpha in beta's community reaches beta; delta does not federate with alpha",
            scenario_body!(create_post),
        )
        .with_tags(vec!["post", "smoke"]),
        scenario(
            "post_missing_community",
            "Post in a missing community",
            "Creating a post in an unknown community is a not-found rejection",
            scenario_body!(create_post_in_missing_community),
        )
        .with_tags(vec!["post"]),
        scenario(
            "post_vote",
            "Vote on a post",
            "Votes and vote removal change the score seen on beta",
            scenario_body!(vote_on_post),
        )
        .with_tags(vec!["post"]),
        scenario(
            "post_update",
            "Update a post",
            "Edits propagate and only the creator may edit",
            scenario_body!(update_post),
        )
        .with_tags(vec!["post"]),
        scenario(
            "post_delete",
            "Delete and restore a post",
            "Deletion hides the post on beta and undeletion restores it",
            scenario_body!(delete_post),
        )
        .with_tags(vec!["post"]),
        scenario(
            "post_lock",
            "Lock a post",
            "A lock set by beta's moderator blocks comments from alpha",
            scenario_body!(lock_post),
        )
        .with_tags(vec!["post", "moderation"]),
        scenario(
            "post_feature",
            "Feature a post",
            "A post featured in beta's community shows as featured on alpha",
            scenario_body!(feature_post),
        )
        .with_tags(vec!["post", "moderation"]),
        scenario(
            "post_community_ban",
            "Ban from community",
            "A community ban removes the poster's content and blocks new posts until lifted",
            scenario_body!(community_ban),
        )
        .with_tags(vec!["post", "moderation"]),
        scenario(
            "post_announced_to_gamma",
            "Announce to a subscriber",
            "A post from alpha reaches gamma through beta's community",
            scenario_body!(announce_to_gamma),
        )
        .with_tags(vec!["post"]),
        scenario(
            "post_remove_remote_admin",
            "Remove a post as a remote admin",
            "Alpha's admin hides its copy of a post in beta's community without affecting beta",
            scenario_body!(remove_as_remote_admin),
        )
        .with_tags(vec!["post", "moderation"]),
        scenario(
            "post_remove_home_admin",
            "Remove a post as the community's admin",
            "A removal by beta's admin and its revert reach the post's home on alpha",
            scenario_body!(remove_as_home_admin),
        )
        .with_tags(vec!["post", "moderation"]),
        scenario(
            "post_site_ban_local_user",
            "Site ban by the user's home",
            "Alpha bans its own user: content removal and the ban reach beta, login is refused until unbanned",
            scenario_body!(site_ban_local_user),
        )
        .with_tags(vec!["post", "moderation", "ban"]),
        scenario(
            "post_site_ban_federated_user",
            "Site ban by a remote instance",
            "Beta bans a user from alpha: content in beta's community is removed, alpha keeps the user unbanned",
            scenario_body!(site_ban_federated_user),
        )
        .with_tags(vec!["post", "moderation", "ban"]),
        scenario(
            "post_report",
            "Report a post",
            "A report filed on gamma reaches the community's home and the post's home",
            scenario_body!(report_post),
        )
        .with_tags(vec!["post", "report"]),
    ]
}

async fn create_post(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;
    let delta = ctx.session("delta")?;

    let community = beta_main(ctx, &alpha).await?;
    let post = alpha.create_post(community.community.id).await?;
    ensure(post.post.local, "new post is local on alpha")?;
    ensure_eq(post.score(), 1, "score of a new post")?;
    ctx.note("post", json!(post.post.ap_id.to_string()));

    let on_beta = wait_for_post(ctx, &beta, &post.post).await?;
    ensure(!on_beta.post.local, "beta's copy is remote")?;
    ensure_eq(on_beta.score(), 1, "score on beta")?;
    assert_post_federation(&post, &on_beta)?;

    // Delta only accepts activities from beta.
    let on_delta = delta.resolve_post(&post.post.ap_id).await?;
    ensure(on_delta.is_none(), "delta resolved a post from alpha")
}

async fn create_post_in_missing_community(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let err = expect_rejection(
        alpha.create_post(CommunityId(-2)).await,
        "couldnt_find_community",
    )?;
    ensure(err.is_not_found(), "missing community is a not-found error")
}

async fn vote_on_post(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;

    let community = beta_main(ctx, &alpha).await?;
    let post = alpha.create_post(community.community.id).await?;
    let on_beta = wait_for_post(ctx, &beta, &post.post).await?;

    let liked = beta.like_post(on_beta.post.id, Some(true)).await?;
    ensure_eq(liked.score(), 2, "score after beta's upvote")?;

    let unliked = alpha.like_post(post.post.id, None).await?;
    ensure_eq(unliked.score(), 1, "score after alpha removes its vote")?;
    ctx.waiter()
        .wait_for_some(
            "vote removal reaches beta",
            || beta.find_local_post(&post.post),
            |view| view.score() == 1,
        )
        .await?;
    Ok(())
}

async fn update_post(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;

    let community = beta_main(ctx, &alpha).await?;
    let post = alpha.create_post(community.community.id).await?;
    wait_for_post(ctx, &beta, &post.post).await?;

    let updated = alpha.edit_post(post.post.id).await?;
    ensure(updated.post.name != post.post.name, "edit changed the title")?;
    let on_beta = wait_for_post(ctx, &beta, &updated.post).await?;
    assert_post_federation(&updated, &on_beta)?;

    expect_rejection(beta.edit_post(on_beta.post.id).await, "no_post_edit_allowed")?;
    Ok(())
}

async fn delete_post(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;

    let community = beta_main(ctx, &alpha).await?;
    let post = alpha.create_post(community.community.id).await?;
    let on_beta = wait_for_post(ctx, &beta, &post.post).await?;

    let deleted = alpha.delete_post(post.post.id, true).await?;
    ensure(deleted.post.deleted, "alpha marks the post deleted")?;
    ctx.waiter()
        .wait_until(
            "deletion reaches beta",
            || beta.find_local_post(&post.post),
            |found| found.as_ref().map_or(true, |view| view.post.deleted),
        )
        .await?;

    let restored = alpha.delete_post(post.post.id, false).await?;
    ensure(!restored.post.deleted, "alpha restores the post")?;
    let on_beta_restored = ctx
        .waiter()
        .wait_for_some(
            "restore reaches beta",
            || beta.find_local_post(&post.post),
            |view| !view.post.deleted,
        )
        .await?;
    assert_post_federation(&restored, &on_beta_restored)?;
    // Undeletion brings back the content beta held before the delete.
    assert_post_federation(&on_beta, &on_beta_restored)?;

    expect_rejection(
        beta.delete_post(on_beta.post.id, true).await,
        "no_post_edit_allowed",
    )?;
    Ok(())
}

async fn lock_post(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;

    let community = beta_main(ctx, &alpha).await?;
    let post = alpha.create_post(community.community.id).await?;
    let on_beta = wait_for_post(ctx, &beta, &post.post).await?;

    let locked = beta.lock_post(on_beta.post.id, true).await?;
    ensure(locked.post.locked, "beta locks the post")?;
    ctx.waiter()
        .wait_until(
            "lock reaches alpha",
            || alpha.get_post(post.post.id),
            |view| view.post.locked,
        )
        .await?;
    expect_rejection(alpha.create_comment(post.post.id, None).await, "locked")?;

    beta.lock_post(on_beta.post.id, false).await?;
    ctx.waiter()
        .wait_until(
            "unlock reaches alpha",
            || alpha.get_post(post.post.id),
            |view| !view.post.locked,
        )
        .await?;
    alpha.create_comment(post.post.id, None).await?;
    Ok(())
}

async fn feature_post(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;

    let community = beta_main(ctx, &alpha).await?;
    let post = alpha.create_post(community.community.id).await?;
    let on_beta = wait_for_post(ctx, &beta, &post.post).await?;

    let featured = beta.feature_post(on_beta.post.id, true).await?;
    ensure(featured.post.featured_community, "beta features the post")?;
    ctx.waiter()
        .wait_until(
            "feature reaches alpha",
            || alpha.get_post(post.post.id),
            |view| view.post.featured_community,
        )
        .await?;

    beta.feature_post(on_beta.post.id, false).await?;
    ctx.waiter()
        .wait_until(
            "unfeature reaches alpha",
            || alpha.get_post(post.post.id),
            |view| !view.post.featured_community,
        )
        .await?;
    Ok(())
}

async fn community_ban(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;

    let community = beta_main(ctx, &alpha).await?;
    ctx.follow(&alpha, community.community.id).await?;
    let post = alpha.create_post(community.community.id).await?;
    wait_for_post(ctx, &beta, &post.post).await?;

    let alpha_user = ctx
        .waiter()
        .wait_for_some(
            "alpha's seed user reaches beta",
            || beta.resolve_person(alpha.person_locator()),
            |_| true,
        )
        .await?;
    let home = beta.get_community_by_name(ctx.main_community()).await?;

    let banned = beta
        .ban_from_community(alpha_user.person.id, home.community.id, true, true)
        .await?;
    ensure(banned.banned, "beta reports the ban")?;
    ctx.waiter()
        .wait_until(
            "content removal reaches alpha",
            || alpha.get_post(post.post.id),
            |view| view.post.removed,
        )
        .await?;
    let err = expect_rejection(
        alpha.create_post(community.community.id).await,
        "banned_from_community",
    )?;
    ensure(err.is_permission(), "ban is a permission error")?;

    beta.ban_from_community(alpha_user.person.id, home.community.id, false, true)
        .await?;
    ctx.waiter()
        .wait_until(
            "content restore reaches alpha",
            || alpha.get_post(post.post.id),
            |view| !view.post.removed,
        )
        .await?;
    let after = alpha.create_post(community.community.id).await?;
    wait_for_post(ctx, &beta, &after.post).await?;
    Ok(())
}

async fn announce_to_gamma(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;
    let gamma = ctx.session("gamma")?;

    let on_alpha = beta_main(ctx, &alpha).await?;
    let on_gamma = beta_main(ctx, &gamma).await?;
    ctx.follow(&gamma, on_gamma.community.id).await?;

    let post = alpha.create_post(on_alpha.community.id).await?;
    wait_for_post(ctx, &beta, &post.post).await?;
    let relayed = ctx
        .relay_waiter()
        .wait_for_some(
            "post announced to gamma",
            || gamma.find_local_post(&post.post),
            |_| true,
        )
        .await?;
    assert_post_federation(&post, &relayed)
}

async fn remove_as_remote_admin(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;
    let gamma = ctx.session("gamma")?;

    let community = beta_main(ctx, &gamma).await?;
    let post = gamma.create_post(community.community.id).await?;
    let on_alpha = ctx
        .waiter()
        .wait_for_some(
            "alpha resolves gamma's post",
            || alpha.resolve_post(&post.post.ap_id),
            |_| true,
        )
        .await?;

    let removed = alpha.remove_post(on_alpha.post.id, true).await?;
    ensure(removed.post.removed, "alpha marks its copy removed")?;

    // The community lives on beta, so alpha's removal stays on alpha.
    let on_beta = wait_for_post(ctx, &beta, &post.post).await?;
    ensure(!on_beta.post.removed, "beta's copy was removed by a remote admin")?;

    let restored = alpha.remove_post(on_alpha.post.id, false).await?;
    ensure(!restored.post.removed, "alpha restores its copy")?;
    assert_post_federation(&restored, &on_beta)
}

async fn remove_as_home_admin(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;

    let community = beta_main(ctx, &alpha).await?;
    ctx.follow(&alpha, community.community.id).await?;
    let post = alpha.create_post(community.community.id).await?;
    let on_beta = wait_for_post(ctx, &beta, &post.post).await?;

    let removed = beta.remove_post(on_beta.post.id, true).await?;
    ensure(removed.post.removed, "beta marks the post removed")?;
    ctx.waiter()
        .wait_until(
            "removal reaches alpha",
            || alpha.get_post(post.post.id),
            |view| view.post.removed,
        )
        .await?;

    let restored = beta.remove_post(on_beta.post.id, false).await?;
    let on_alpha = ctx
        .waiter()
        .wait_until(
            "restore reaches alpha",
            || alpha.get_post(post.post.id),
            |view| !view.post.removed,
        )
        .await?;
    assert_post_federation(&restored, &on_alpha)
}

async fn site_ban_local_user(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;

    let user = alpha.register_user().await?;
    let community = beta_main(ctx, &user).await?;
    let post = user.create_post(community.community.id).await?;
    wait_for_post(ctx, &beta, &post.post).await?;
    let person = user.my_user().await?.local_user_view.person;

    let banned = alpha.ban_from_site(person.id, true, true).await?;
    ensure(banned.person.banned, "alpha reports the ban")?;
    ctx.waiter()
        .wait_for_some(
            "ban and content removal reach beta",
            || beta.find_local_post(&post.post),
            |view| view.post.removed && view.creator.banned,
        )
        .await?;
    let err = expect_rejection(user.relogin().await, "site_ban")?;
    ensure(err.is_permission(), "site ban is a permission error")?;

    let unbanned = alpha.ban_from_site(person.id, false, true).await?;
    ensure(!unbanned.person.banned, "alpha lifts the ban")?;
    ctx.waiter()
        .wait_for_some(
            "unban reaches beta",
            || beta.find_local_post(&post.post),
            |view| !view.post.removed && !view.creator.banned,
        )
        .await?;

    // The ban revoked every token the user held.
    let user = user.relogin().await?;
    let after = user.create_post(community.community.id).await?;
    wait_for_post(ctx, &beta, &after.post).await?;
    Ok(())
}

async fn site_ban_federated_user(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;

    let user = alpha.register_user().await?;
    let community = beta_main(ctx, &user).await?;
    let post = user.create_post(community.community.id).await?;
    wait_for_post(ctx, &beta, &post.post).await?;
    let on_beta = ctx
        .waiter()
        .wait_for_some(
            "user reaches beta",
            || beta.resolve_person(user.person_locator()),
            |_| true,
        )
        .await?;

    let banned = beta.ban_from_site(on_beta.person.id, true, true).await?;
    ensure(banned.person.banned, "beta reports the ban")?;
    ctx.waiter()
        .wait_for_some(
            "content removal on beta",
            || beta.find_local_post(&post.post),
            |view| view.post.removed,
        )
        .await?;

    let me = user
        .site()
        .await?
        .my_user
        .ok_or_else(|| Error::assertion("alpha does not recognize its own user"))?;
    ensure(
        !me.local_user_view.person.banned,
        "a remote ban leaked into the user's home",
    )?;
    let home = user.get_community_by_name(ctx.main_community()).await?;
    user.create_post(home.community.id).await?;

    beta.ban_from_site(on_beta.person.id, false, true).await?;
    ctx.waiter()
        .wait_for_some(
            "content restore on beta",
            || beta.find_local_post(&post.post),
            |view| !view.post.removed,
        )
        .await?;
    Ok(())
}

/// Post report with `reason` as listed to `session`'s actor.
async fn find_post_report(session: &Session, reason: &str) -> Result<Option<PostReportView>> {
    Ok(session
        .list_reports()
        .await?
        .into_iter()
        .find_map(|report| match report {
            ReportView::Post(view) if view.post_report.reason == reason => Some(view),
            _ => None,
        }))
}

async fn report_post(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;
    let gamma = ctx.session("gamma")?;

    let community = beta_main(ctx, &alpha).await?;
    let post = alpha.create_post(community.community.id).await?;
    let on_gamma = ctx
        .waiter()
        .wait_for_some(
            "gamma resolves the post",
            || gamma.resolve_post(&post.post.ap_id),
            |_| true,
        )
        .await?;

    let reason = random_string(10);
    let filed = gamma.report_post(on_gamma.post.id, &reason).await?;
    ensure_eq(filed.post_report.original_post_name.as_str(), post.post.name.as_str(), "reported title")?;
    ensure(!filed.post_report.resolved, "new report is unresolved")?;

    for session in [&beta, &alpha] {
        let listed = ctx
            .waiter()
            .wait_for_some(
                &format!("report reaches {}", session.name()),
                || find_post_report(session, &reason),
                |_| true,
            )
            .await?;
        ensure_eq(listed.post.ap_id.clone(), post.post.ap_id.clone(), "reported post")?;
        ensure_eq(
            &listed.post_report.original_post_name,
            &filed.post_report.original_post_name,
            "original title",
        )?;
        ensure_eq(
            &listed.post_report.original_post_body,
            &filed.post_report.original_post_body,
            "original body",
        )?;
        ensure(!listed.post_report.resolved, "listed report is unresolved")?;
    }
    Ok(())
}
