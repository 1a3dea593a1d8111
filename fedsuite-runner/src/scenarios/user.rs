//! Profiles and account deletion seen from other instances

use super::{beta_main, scenario, wait_for_post};
use fedsuite_core::{random_string, Jwt};
use fedsuite_harness::assertions::{assert_person_federation, ensure, ensure_eq};
use fedsuite_harness::factory::ProfileUpdate;
use fedsuite_harness::{scenario_body, Result, Scenario, ScenarioContext};

pub(super) fn scenarios() -> Vec<Scenario> {
    vec![
        scenario(
            "user_profile_update",
            "Update a profile",
            "Display name and bio changes on alpha are visible on beta",
            scenario_body!(profile_update),
        )
        .with_tags(vec!["user"]),
        scenario(
            "user_delete_account",
            "Delete an account",
            "Deleting an account with its content hides the user's posts on beta",
            scenario_body!(delete_account),
        )
        .with_tags(vec!["user"]),
        scenario(
            "user_invalid_auth",
            "Unusable token",
            "A request with a token the server never issued is served as anonymous",
            scenario_body!(invalid_auth),
        )
        .with_tags(vec!["user"]),
    ]
}

async fn profile_update(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;

    let user = alpha.register_user().await?;
    let display_name = format!("user{}", random_string(6));
    let bio = format!("A federated bio {}", random_string(8));
    user.save_user_settings(ProfileUpdate {
        display_name: Some(display_name.clone()),
        bio: Some(bio.clone()),
    })
    .await?;

    let me = user.my_user().await?;
    let person = me.local_user_view.person;
    ensure_eq(person.display_name.as_deref(), Some(display_name.as_str()), "display name on alpha")?;
    let on_alpha = alpha.get_person(person.id).await?;

    let on_beta = ctx
        .waiter()
        .wait_for_some(
            "profile reaches beta",
            || beta.resolve_person(user.person_locator()),
            |view| view.person.bio.as_deref() == Some(bio.as_str()),
        )
        .await?;
    ensure(!on_beta.person.local, "beta's copy is remote")?;
    assert_person_federation(&on_alpha, &on_beta)
}

async fn delete_account(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;
    let beta = ctx.session("beta")?;

    let user = alpha.register_user().await?;
    let community = beta_main(ctx, &user).await?;
    let post = user.create_post(community.community.id).await?;
    wait_for_post(ctx, &beta, &post.post).await?;

    user.delete_account().await?;
    ctx.waiter()
        .wait_until(
            "account deletion reaches beta",
            || beta.find_local_post(&post.post),
            |found| found.as_ref().map_or(true, |view| view.post.deleted),
        )
        .await?;
    Ok(())
}

async fn invalid_auth(ctx: &mut ScenarioContext) -> Result<()> {
    let alpha = ctx.session("alpha")?;

    let site = alpha.site().await?;
    let me = site.my_user.map(|me| me.local_user_view.person.name);
    ensure_eq(me.as_deref(), Some(alpha.username()), "user behind a valid token")?;

    let stranger = alpha.with_jwt(Jwt::new("foobar"));
    let site = stranger.site().await?;
    ensure(site.my_user.is_none(), "an invalid token was attributed to a user")?;
    ensure(!site.version.is_empty(), "site version is reported")?;
    ensure(!site.admins.is_empty(), "site admins are listed")?;
    stranger.get_posts(None).await?;
    Ok(())
}
