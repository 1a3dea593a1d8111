//! Community tags and their use on posts

use super::{expect_rejection, scenario};
use fedsuite_core::views::CommunityTag;
use fedsuite_harness::assertions::{ensure, ensure_eq};
use fedsuite_harness::{scenario_body, Result, Scenario, ScenarioContext};

pub(super) fn scenarios() -> Vec<Scenario> {
    vec![
        scenario(
            "tag_community_crud",
            "Manage community tags",
            "A moderator creates, renames and deletes a tag of its community",
            scenario_body!(community_tag_crud),
        )
        .with_tags(vec!["tag"]),
        scenario(
            "tag_post_update",
            "Tag a post",
            "Tags set on a post by its author are seen on beta; foreign tags are rejected",
            scenario_body!(post_tags),
        )
        .with_tags(vec!["tag", "post"]),
    ]
}

async fn community_tag_crud(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let community = alpha.create_community().await?;
    let id = community.community.id;

    let tag = alpha.create_community_tag(id, "news").await?;
    ensure_eq(tag.community_id, id, "community of the tag")?;
    let names = |tags: Vec<CommunityTag>| {
        tags.into_iter().map(|t| t.name).collect::<Vec<_>>()
    };
    ensure_eq(names(alpha.list_community_tags(id).await?), vec!["news".to_string()], "tags after create")?;

    let renamed = alpha.update_community_tag(tag.id, "breaking").await?;
    ensure_eq(renamed.id, tag.id, "renamed tag id")?;
    ensure_eq(
        names(alpha.list_community_tags(id).await?),
        vec!["breaking".to_string()],
        "tags after rename",
    )?;

    let deleted = alpha.delete_community_tag(tag.id).await?;
    ensure(deleted.deleted, "deleted tag is marked deleted")?;
    ensure(
        alpha.list_community_tags(id).await?.is_empty(),
        "deleted tag is still listed",
    )
}

async fn post_tags(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;

    let community = alpha.create_community().await?;
    let id = community.community.id;
    let news = alpha.create_community_tag(id, "news").await?;
    let meta = alpha.create_community_tag(id, "meta").await?;
    let post = alpha.create_post(id).await?;

    let tagged = alpha
        .update_post_tags(post.post.id, vec![news.id, meta.id])
        .await?;
    ensure_eq(tagged.tag_names(), vec!["meta", "news"], "tags on alpha")?;
    ctx.waiter()
        .wait_for_some(
            "post tags reach beta",
            || beta.resolve_post(&post.post.ap_id),
            |view| view.tag_names() == ["meta", "news"],
        )
        .await?;

    let retagged = alpha.update_post_tags(post.post.id, vec![news.id]).await?;
    ensure_eq(retagged.tag_names(), vec!["news"], "tags after removing one")?;
    ctx.waiter()
        .wait_for_some(
            "tag removal reaches beta",
            || beta.resolve_post(&post.post.ap_id),
            |view| view.tag_names() == ["news"],
        )
        .await?;

    let other = alpha.create_community().await?;
    let foreign = alpha.create_community_tag(other.community.id, "news").await?;
    expect_rejection(
        alpha.update_post_tags(post.post.id, vec![foreign.id]).await,
        "tag_not_in_community",
    )?;
    Ok(())
}
