//! Comments on alpha's posts in beta's main community

use super::{beta_main, expect_rejection, scenario, wait_for_post};
use fedsuite_core::views::{CommentReportView, CommentView, NotificationKind, PostView, ReportView};
use fedsuite_core::{random_string, ObjectRef, PostId};
use fedsuite_harness::assertions::{assert_comment_federation, ensure, ensure_eq};
use fedsuite_harness::{scenario_body, Result, Scenario, ScenarioContext, Session};

pub(super) fn scenarios() -> Vec<Scenario> {
    vec![
        scenario(
            "comment_create",
            "Create a comment",
            "A comment made on alpha is readable on beta with equal content",
            scenario_body!(create_comment),
        )
        .with_tags(vec!["comment", "smoke"]),
        scenario(
            "comment_update",
            "Update a comment",
            "Comment edits propagate to beta",
            scenario_body!(update_comment),
        )
        .with_tags(vec!["comment"]),
        scenario(
            "comment_delete",
            "Delete and restore a comment",
            "Deletion and undeletion propagate and only the creator may delete",
            scenario_body!(delete_comment),
        )
        .with_tags(vec!["comment"]),
        scenario(
            "comment_reply",
            "Reply to a comment",
            "A reply made on beta is threaded under the parent on alpha",
            scenario_body!(reply_to_comment),
        )
        .with_tags(vec!["comment"]),
        scenario(
            "comment_vote",
            "Vote on a comment",
            "An upvote from beta counts on alpha",
            scenario_body!(vote_on_comment),
        )
        .with_tags(vec!["comment"]),
        scenario(
            "comment_remove_remote_admin",
            "Remove a comment as a remote admin",
            "Beta's admin hides its copy of a comment in alpha's community; alpha's copy is untouched",
            scenario_body!(remove_as_remote_admin),
        )
        .with_tags(vec!["comment", "moderation"]),
        scenario(
            "comment_mention",
            "Mention a remote user",
            "A mention written on alpha shows up in the mentioned user's notifications on beta",
            scenario_body!(mention_remote_user),
        )
        .with_tags(vec!["comment", "notification"]),
        scenario(
            "comment_relayed_to_third_instance",
            "Comment relayed through the community",
            "A comment from gamma on beta's post reaches alpha through beta's community",
            scenario_body!(relay_to_third_instance),
        )
        .with_tags(vec!["comment"]),
        scenario(
            "comment_report",
            "Report a comment",
            "A report filed on gamma reaches the community's home and the comment's home",
            scenario_body!(report_comment),
        )
        .with_tags(vec!["comment", "report"]),
    ]
}

/// A post by alpha in beta's main community with one comment by alpha.
async fn commented_post(ctx: &ScenarioContext, alpha: &Session) -> Result<(PostView, CommentView)> {
    let community = beta_main(ctx, alpha).await?;
    let post = alpha.create_post(community.community.id).await?;
    let comment = alpha.create_comment(post.post.id, None).await?;
    Ok((post, comment))
}

async fn wait_for_comment(
    ctx: &ScenarioContext,
    session: &Session,
    comment: &CommentView,
) -> Result<CommentView> {
    ctx.waiter()
        .wait_for_some(
            &format!("comment {} reaches {}", comment.comment.ap_id, session.name()),
            || session.resolve_comment(&comment.comment.ap_id),
            |_| true,
        )
        .await
}

async fn create_comment(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;

    let (post, comment) = commented_post(ctx, &alpha).await?;
    ensure(comment.comment.local, "new comment is local on alpha")?;
    ensure_eq(comment.comment.post_id, post.post.id, "post of the comment")?;
    ensure_eq(comment.score(), 1, "score of a new comment")?;

    let on_beta = wait_for_comment(ctx, &beta, &comment).await?;
    ensure(!on_beta.comment.local, "beta's copy is remote")?;
    assert_comment_federation(&comment, &on_beta)
}

async fn update_comment(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;

    let (_post, comment) = commented_post(ctx, &alpha).await?;
    wait_for_comment(ctx, &beta, &comment).await?;

    let content = "Federated comment update";
    let updated = alpha.edit_comment(comment.comment.id, content).await?;
    ensure_eq(updated.comment.content.as_str(), content, "edited content")?;

    let on_beta = ctx
        .waiter()
        .wait_for_some(
            "comment edit reaches beta",
            || beta.resolve_comment(&comment.comment.ap_id),
            |view| view.comment.content == content,
        )
        .await?;
    assert_comment_federation(&updated, &on_beta)
}

async fn delete_comment(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;

    let (_post, comment) = commented_post(ctx, &alpha).await?;
    let on_beta = wait_for_comment(ctx, &beta, &comment).await?;

    let deleted = alpha.delete_comment(comment.comment.id, true).await?;
    ensure(deleted.comment.deleted, "alpha marks the comment deleted")?;
    ctx.waiter()
        .wait_for_some(
            "comment deletion reaches beta",
            || beta.resolve_comment(&comment.comment.ap_id),
            |view| view.comment.deleted,
        )
        .await?;

    let restored = alpha.delete_comment(comment.comment.id, false).await?;
    let on_beta_restored = ctx
        .waiter()
        .wait_for_some(
            "comment restore reaches beta",
            || beta.resolve_comment(&comment.comment.ap_id),
            |view| !view.comment.deleted,
        )
        .await?;
    assert_comment_federation(&restored, &on_beta_restored)?;
    assert_comment_federation(&on_beta, &on_beta_restored)?;

    expect_rejection(
        beta.delete_comment(on_beta.comment.id, true).await,
        "no_comment_edit_allowed",
    )?;
    Ok(())
}

async fn reply_to_comment(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;

    let (_post, comment) = commented_post(ctx, &alpha).await?;
    let parent_on_beta = wait_for_comment(ctx, &beta, &comment).await?;

    let reply = beta
        .create_comment(parent_on_beta.post.id, Some(parent_on_beta.comment.id))
        .await?;
    ensure_eq(reply.comment.parent_id(), Some(parent_on_beta.comment.id), "parent on beta")?;

    let on_alpha = wait_for_comment(ctx, &alpha, &reply).await?;
    ensure_eq(on_alpha.comment.parent_id(), Some(comment.comment.id), "parent on alpha")?;
    assert_comment_federation(&reply, &on_alpha)?;

    ctx.waiter()
        .wait_for_some(
            "reply notification reaches alpha",
            || find_notification(&alpha, NotificationKind::Reply, &reply.comment.ap_id),
            |_| true,
        )
        .await?;
    Ok(())
}

async fn vote_on_comment(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;

    let (_post, comment) = commented_post(ctx, &alpha).await?;
    let on_beta = wait_for_comment(ctx, &beta, &comment).await?;

    let liked = beta.like_comment(on_beta.comment.id, Some(true)).await?;
    ensure_eq(liked.score(), 2, "score after beta's upvote")?;
    ctx.waiter()
        .wait_for_some(
            "comment vote reaches alpha",
            || alpha.resolve_comment(&comment.comment.ap_id),
            |view| view.score() == 2,
        )
        .await?;
    Ok(())
}

async fn remove_as_remote_admin(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;

    let community = alpha.create_community().await?;
    let post = alpha.create_post(community.community.id).await?;
    let comment = alpha.create_comment(post.post.id, None).await?;
    let on_beta = wait_for_comment(ctx, &beta, &comment).await?;

    let removed = beta.remove_comment(on_beta.comment.id, true).await?;
    ensure(removed.comment.removed, "beta marks its copy removed")?;

    let on_alpha = wait_for_comment(ctx, &alpha, &comment).await?;
    ensure(!on_alpha.comment.removed, "alpha's copy was removed by a remote admin")?;

    let restored = beta.remove_comment(on_beta.comment.id, false).await?;
    ensure(!restored.comment.removed, "beta restores its copy")?;
    assert_comment_federation(&on_alpha, &restored)
}

/// Notification of `kind` about the comment `ap_id`, as seen by `session`'s actor.
async fn find_notification(
    session: &Session,
    kind: NotificationKind,
    ap_id: &ObjectRef,
) -> Result<Option<CommentView>> {
    Ok(session
        .notifications(kind)
        .await?
        .iter()
        .filter_map(|n| n.comment())
        .find(|view| view.comment.ap_id == *ap_id)
        .cloned())
}

async fn mention_remote_user(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;

    let community = beta_main(ctx, &alpha).await?;
    let post = alpha.create_post(community.community.id).await?;
    let content = format!("A test mention of {}", beta.person_locator());
    let comment = alpha
        .create_comment_with(post.post.id, None, content)
        .await?;

    let mention = ctx
        .waiter()
        .wait_for_some(
            "mention reaches beta",
            || find_notification(&beta, NotificationKind::Mention, &comment.comment.ap_id),
            |_| true,
        )
        .await?;
    ensure(mention.community.local, "beta's community is local in the mention")?;
    ensure(!mention.creator.local, "the mentioning user is remote on beta")?;
    assert_comment_federation(&comment, &mention)
}

/// Comment `ap_id` among the comments `session` already holds for `post_id`.
async fn find_held_comment(
    session: &Session,
    post_id: PostId,
    ap_id: &ObjectRef,
) -> Result<Option<CommentView>> {
    Ok(session
        .get_comments(post_id)
        .await?
        .into_iter()
        .find(|view| view.comment.ap_id == *ap_id))
}

async fn relay_to_third_instance(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;
    let gamma = ctx.session("gamma")?;

    let on_alpha = beta_main(ctx, &alpha).await?;
    let on_gamma = beta_main(ctx, &gamma).await?;
    ctx.follow(&alpha, on_alpha.community.id).await?;
    ctx.follow(&gamma, on_gamma.community.id).await?;

    let home = beta_main(ctx, &beta).await?;
    let post = beta.create_post(home.community.id).await?;
    let post_on_gamma = wait_for_post(ctx, &gamma, &post.post).await?;
    let post_on_alpha = wait_for_post(ctx, &alpha, &post.post).await?;

    let comment = gamma.create_comment(post_on_gamma.post.id, None).await?;
    // Alpha never fetches the comment; it has to arrive through beta.
    let relayed = ctx
        .relay_waiter()
        .wait_for_some(
            "gamma's comment reaches alpha",
            || find_held_comment(&alpha, post_on_alpha.post.id, &comment.comment.ap_id),
            |_| true,
        )
        .await?;
    assert_comment_federation(&comment, &relayed)
}

/// Comment report with `reason` as listed to `session`'s actor.
async fn find_comment_report(session: &Session, reason: &str) -> Result<Option<CommentReportView>> {
    Ok(session
        .list_reports()
        .await?
        .into_iter()
        .find_map(|report| match report {
            ReportView::Comment(view) if view.comment_report.reason == reason => Some(view),
            _ => None,
        }))
}

async fn report_comment(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;
    let gamma = ctx.session("gamma")?;

    let (_post, comment) = commented_post(ctx, &alpha).await?;
    let on_gamma = wait_for_comment(ctx, &gamma, &comment).await?;

    let reason = random_string(10);
    let filed = gamma.report_comment(on_gamma.comment.id, &reason).await?;
    ensure_eq(
        filed.comment_report.original_comment_text.as_str(),
        comment.comment.content.as_str(),
        "reported text",
    )?;

    for session in [&beta, &alpha] {
        let listed = ctx
            .waiter()
            .wait_for_some(
                &format!("comment report reaches {}", session.name()),
                || find_comment_report(session, &reason),
                |_| true,
            )
            .await?;
        ensure_eq(listed.comment.ap_id.clone(), comment.comment.ap_id.clone(), "reported comment")?;
        ensure_eq(
            &listed.comment_report.original_comment_text,
            &filed.comment_report.original_comment_text,
            "original text",
        )?;
        ensure(!listed.comment_report.resolved, "listed report is unresolved")?;
    }
    Ok(())
}
