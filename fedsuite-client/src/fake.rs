//! In-memory federation of fake instances for tests
//!
//! Objects live in one shared world. A remote instance sees an object only
//! once the propagation delay has elapsed and either pulled it by resolving
//! its `ap_id` or has a subscriber of the object's community (push
//! delivery). Instance allow lists and private communities are honoured.
//! Time is measured with `tokio::time::Instant`, so paused-clock tests
//! observe propagation deterministically.

use crate::api::FederatedApi;
use crate::forms::*;
use async_trait::async_trait;
use chrono::Utc;
use fedsuite_core::config::SuiteConfig;
use fedsuite_core::instance::Jwt;
use fedsuite_core::object::{
    CommentId, CommunityId, InstanceId, NotificationId, ObjectRef, PersonId, PostId,
    PrivateMessageId, ReportId, TagId,
};
use fedsuite_core::subscription::SubscribedType;
use fedsuite_core::views::*;
use fedsuite_core::{Error, Locator, Result};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

fn reject(operation: &str, kind: &str) -> Error {
    Error::from_remote(operation, 400, kind)
}

struct Host {
    name: String,
    domain: String,
    allowed: BTreeSet<String>,
}

impl Host {
    fn host(&self) -> &str {
        self.domain.split(':').next().unwrap_or(&self.domain)
    }
}

struct Account {
    person: Person,
    instance: String,
    password: String,
    admin: bool,
    /// Bumped by a home site ban; older tokens stop authenticating.
    token_gen: u32,
}

struct Hosted<T> {
    value: T,
    home: String,
    created: Instant,
    fetched_by: HashSet<String>,
    /// Instances whose admins removed their own copy only.
    removed_on: HashSet<String>,
}

impl<T> Hosted<T> {
    fn new(value: T, home: &str) -> Self {
        Self {
            value,
            home: home.to_string(),
            created: Instant::now(),
            fetched_by: HashSet::new(),
            removed_on: HashSet::new(),
        }
    }
}

struct FakePost {
    post: Post,
    votes: HashMap<PersonId, i64>,
    tags: Vec<TagId>,
}

struct FakeComment {
    comment: Comment,
    votes: HashMap<PersonId, i64>,
}

enum FakeReport {
    Post(PostReport),
    Comment(CommentReport),
}

struct FakeNotification {
    id: NotificationId,
    recipient: PersonId,
    kind: NotificationKind,
    comment: CommentId,
}

struct Follow {
    state: SubscribedType,
    accept_at: Option<Instant>,
}

#[derive(Default)]
struct World {
    delay: Duration,
    hosts: Vec<Host>,
    accounts: Vec<Account>,
    communities: Vec<Hosted<Community>>,
    posts: Vec<Hosted<FakePost>>,
    comments: Vec<Hosted<FakeComment>>,
    messages: Vec<Hosted<PrivateMessage>>,
    follows: HashMap<(PersonId, CommunityId), Follow>,
    moderators: HashSet<(PersonId, CommunityId)>,
    community_bans: HashSet<(PersonId, CommunityId)>,
    /// Site bans as `(banning instance, person)`.
    site_bans: HashSet<(String, PersonId)>,
    tags: Vec<Hosted<CommunityTag>>,
    reports: Vec<Hosted<FakeReport>>,
    notifications: Vec<Hosted<FakeNotification>>,
    calls: HashMap<(String, String), usize>,
    next_id: i64,
}

impl World {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn host(&self, name: &str) -> Result<&Host> {
        self.hosts
            .iter()
            .find(|h| h.name == name)
            .ok_or_else(|| Error::Internal(format!("unknown fake instance {}", name)))
    }

    fn domain_of(&self, name: &str) -> String {
        self.host(name)
            .map(|h| h.domain.clone())
            .unwrap_or_default()
    }

    fn url(&self, instance: &str, path: String) -> Result<ObjectRef> {
        let raw = format!("http://{}/{}", self.domain_of(instance), path);
        Ok(ObjectRef::new(Url::parse(&raw)?))
    }

    /// Whether `to` accepts activities from instance `from`.
    fn federates(&self, from: &str, to: &str) -> bool {
        if from == to {
            return true;
        }
        match (self.host(from), self.host(to)) {
            (Ok(from), Ok(to)) => to.allowed.is_empty() || to.allowed.contains(from.host()),
            _ => false,
        }
    }

    fn arrived<T>(&self, hosted: &Hosted<T>, now: Instant) -> bool {
        now >= hosted.created + self.delay
    }

    fn record(&mut self, instance: &str, operation: &str) {
        *self
            .calls
            .entry((instance.to_string(), operation.to_string()))
            .or_default() += 1;
    }

    /// Account behind `auth`; unusable tokens are treated as anonymous.
    fn caller(&self, instance: &str, auth: Option<&Jwt>) -> Option<usize> {
        let (id, generation) = auth?.as_str().strip_prefix("fake:")?.split_once(':')?;
        let id = PersonId(id.parse().ok()?);
        let generation: u32 = generation.parse().ok()?;
        self.accounts.iter().position(|a| {
            a.person.id == id
                && a.instance == instance
                && a.token_gen == generation
                && !a.person.deleted
        })
    }

    fn viewer(&self, instance: &str, auth: Option<&Jwt>) -> Option<PersonId> {
        self.caller(instance, auth).map(|idx| self.person_id(idx))
    }

    fn require(&self, operation: &str, instance: &str, auth: Option<&Jwt>) -> Result<usize> {
        self.caller(instance, auth)
            .ok_or_else(|| Error::from_remote(operation, 401, "not_logged_in"))
    }

    fn home_of(&self, person: PersonId) -> Option<&str> {
        self.accounts
            .iter()
            .find(|a| a.person.id == person)
            .map(|a| a.instance.as_str())
    }

    /// Banned by the person's home instance or by `on` itself.
    fn site_banned(&self, person: PersonId, on: &str) -> bool {
        let home = self.home_of(person).unwrap_or_default();
        self.site_bans
            .iter()
            .any(|(instance, p)| *p == person && (instance == home || instance == on))
    }

    fn community_home(&self, community: CommunityId) -> &str {
        self.communities
            .iter()
            .find(|c| c.value.id == community)
            .map(|c| c.home.as_str())
            .unwrap_or_default()
    }

    /// Whether a removal by `caller` on `on` applies to every instance.
    ///
    /// Moderators and admins of the community's home act for the community;
    /// other admins only hide their own instance's copy.
    fn removes_globally(&self, caller: usize, community: CommunityId, on: &str) -> bool {
        self.is_mod(self.person_id(caller), community) || self.community_home(community) == on
    }

    fn require_admin(&self, operation: &str, instance: &str, auth: Option<&Jwt>) -> Result<usize> {
        let idx = self.require(operation, instance, auth)?;
        if !self.accounts[idx].admin {
            return Err(reject(operation, "not_an_admin"));
        }
        Ok(idx)
    }

    fn person_id(&self, idx: usize) -> PersonId {
        self.accounts[idx].person.id
    }

    fn person(&self, id: PersonId, on: &str) -> Result<Person> {
        let account = self
            .accounts
            .iter()
            .find(|a| a.person.id == id)
            .ok_or_else(|| reject("get_person", "couldnt_find_person"))?;
        let mut person = account.person.clone();
        person.local = account.instance == on;
        person.banned = self.site_banned(id, on);
        Ok(person)
    }

    fn person_view(&self, id: PersonId, on: &str) -> Result<PersonView> {
        let is_admin = self
            .accounts
            .iter()
            .any(|a| a.person.id == id && a.admin);
        Ok(PersonView {
            person: self.person(id, on)?,
            is_admin,
        })
    }

    fn community_idx(&self, operation: &str, id: CommunityId) -> Result<usize> {
        self.communities
            .iter()
            .position(|c| c.value.id == id)
            .ok_or_else(|| reject(operation, "couldnt_find_community"))
    }

    fn post_idx(&self, operation: &str, id: PostId) -> Result<usize> {
        self.posts
            .iter()
            .position(|p| p.value.post.id == id)
            .ok_or_else(|| reject(operation, "couldnt_find_post"))
    }

    fn comment_idx(&self, operation: &str, id: CommentId) -> Result<usize> {
        self.comments
            .iter()
            .position(|c| c.value.comment.id == id)
            .ok_or_else(|| reject(operation, "couldnt_find_comment"))
    }

    fn message_idx(&self, operation: &str, id: PrivateMessageId) -> Result<usize> {
        self.messages
            .iter()
            .position(|m| m.value.id == id)
            .ok_or_else(|| reject(operation, "couldnt_find_private_message"))
    }

    fn follow_state(&self, person: PersonId, community: CommunityId, now: Instant) -> SubscribedType {
        match self.follows.get(&(person, community)) {
            Some(Follow {
                state: SubscribedType::Pending,
                accept_at: Some(at),
            }) if now >= *at => SubscribedType::Subscribed,
            Some(follow) => follow.state,
            None => SubscribedType::NotSubscribed,
        }
    }

    fn is_mod(&self, person: PersonId, community: CommunityId) -> bool {
        self.moderators.contains(&(person, community))
    }

    fn require_mod(&self, operation: &str, caller: usize, community: CommunityId) -> Result<()> {
        let account = &self.accounts[caller];
        if self.is_mod(account.person.id, community) || account.admin {
            Ok(())
        } else {
            Err(reject(operation, "not_a_moderator"))
        }
    }

    /// Member-only content of a private community is hidden from others.
    fn may_read(&self, viewer: Option<PersonId>, community: CommunityId, now: Instant) -> bool {
        let Some(c) = self.communities.iter().find(|c| c.value.id == community) else {
            return false;
        };
        if c.value.visibility != CommunityVisibility::Private {
            return true;
        }
        viewer.is_some_and(|p| {
            self.is_mod(p, community) || self.follow_state(p, community, now) == SubscribedType::Subscribed
        })
    }

    fn has_subscriber_on(&self, instance: &str, community: CommunityId, now: Instant) -> bool {
        self.accounts
            .iter()
            .filter(|a| a.instance == instance)
            .any(|a| self.follow_state(a.person.id, community, now) == SubscribedType::Subscribed)
    }

    fn community_known_on(&self, idx: usize, on: &str, now: Instant) -> bool {
        let c = &self.communities[idx];
        c.home == on || (self.arrived(c, now) && self.federates(&c.home, on))
    }

    fn post_known_on(&self, idx: usize, on: &str, now: Instant) -> bool {
        let p = &self.posts[idx];
        if p.home == on {
            return true;
        }
        let community = p.value.post.community_id;
        let community_home = self
            .communities
            .iter()
            .find(|c| c.value.id == community)
            .map(|c| c.home.as_str())
            .unwrap_or_default();
        if community_home == on {
            return self.arrived(p, now);
        }
        self.arrived(p, now)
            && self.federates(&p.home, on)
            && self.federates(community_home, on)
            && (p.fetched_by.contains(on) || self.has_subscriber_on(on, community, now))
    }

    fn comment_known_on(&self, idx: usize, on: &str, now: Instant) -> bool {
        let c = &self.comments[idx];
        if c.home == on {
            return true;
        }
        let Ok(post_idx) = self.post_idx("get_comment", c.value.comment.post_id) else {
            return false;
        };
        self.arrived(c, now)
            && self.federates(&c.home, on)
            && (c.fetched_by.contains(on) || self.post_known_on(post_idx, on, now))
    }

    fn community_view(
        &self,
        idx: usize,
        on: &str,
        viewer: Option<PersonId>,
        now: Instant,
    ) -> CommunityView {
        let hosted = &self.communities[idx];
        let mut community = hosted.value.clone();
        community.local = hosted.home == on;
        community.removed |= hosted.removed_on.contains(on);
        let posts = (0..self.posts.len())
            .filter(|&i| {
                let p = &self.posts[i].value.post;
                p.community_id == community.id
                    && !p.deleted
                    && !self.post_removed_on(i, on)
                    && self.post_known_on(i, on, now)
            })
            .count() as i64;
        let subscribers = self
            .follows
            .keys()
            .filter(|(person, c)| {
                *c == community.id
                    && self.follow_state(*person, *c, now) == SubscribedType::Subscribed
            })
            .count() as i64;
        let subscribed = viewer.map(|p| self.follow_state(p, community.id, now));
        CommunityView {
            community,
            subscribed,
            community_actions: None,
            counts: Some(CommunityCounts {
                subscribers,
                posts,
                comments: 0,
            }),
        }
    }

    fn post_removed_on(&self, idx: usize, on: &str) -> bool {
        let hosted = &self.posts[idx];
        hosted.value.post.removed || hosted.removed_on.contains(on)
    }

    fn post_view(&self, idx: usize, on: &str) -> Result<PostView> {
        let hosted = &self.posts[idx];
        let mut post = hosted.value.post.clone();
        post.local = hosted.home == on;
        post.removed = self.post_removed_on(idx, on);
        let score: i64 = hosted.value.votes.values().sum();
        post.score = Some(score);
        let community_idx = self.community_idx("get_post", post.community_id)?;
        let mut community = self.communities[community_idx].value.clone();
        community.local = self.communities[community_idx].home == on;
        community.removed |= self.communities[community_idx].removed_on.contains(on);
        let tags = hosted
            .value
            .tags
            .iter()
            .filter_map(|id| self.tags.iter().find(|t| t.value.id == *id))
            .filter(|t| !t.value.deleted)
            .map(|t| t.value.clone())
            .collect();
        Ok(PostView {
            creator: self.person(post.creator_id, on)?,
            counts: Some(PostCounts {
                score,
                upvotes: hosted.value.votes.values().filter(|v| **v > 0).count() as i64,
                downvotes: hosted.value.votes.values().filter(|v| **v < 0).count() as i64,
                comments: self
                    .comments
                    .iter()
                    .filter(|c| c.value.comment.post_id == post.id)
                    .count() as i64,
            }),
            post,
            community,
            tags,
        })
    }

    fn comment_view(&self, idx: usize, on: &str) -> Result<CommentView> {
        let hosted = &self.comments[idx];
        let mut comment = hosted.value.comment.clone();
        comment.local = hosted.home == on;
        comment.removed |= hosted.removed_on.contains(on);
        let score: i64 = hosted.value.votes.values().sum();
        comment.score = Some(score);
        let post_view = self.post_view(self.post_idx("get_comment", comment.post_id)?, on)?;
        Ok(CommentView {
            creator: self.person(comment.creator_id, on)?,
            counts: Some(CommentCounts {
                score,
                upvotes: hosted.value.votes.values().filter(|v| **v > 0).count() as i64,
                downvotes: hosted.value.votes.values().filter(|v| **v < 0).count() as i64,
            }),
            comment,
            post: post_view.post,
            community: post_view.community,
        })
    }

    fn message_view(&self, idx: usize, on: &str) -> Result<PrivateMessageView> {
        let hosted = &self.messages[idx];
        let mut message = hosted.value.clone();
        message.local = hosted.home == on;
        Ok(PrivateMessageView {
            creator: self.person(message.creator_id, on)?,
            recipient: self.person(message.recipient_id, on)?,
            private_message: message,
        })
    }

    fn create_account(
        &mut self,
        instance: &str,
        name: &str,
        password: &str,
        admin: bool,
    ) -> Result<usize> {
        let id = PersonId(self.next_id());
        let ap_id = self.url(instance, format!("u/{}", name))?;
        let instance_id = self
            .hosts
            .iter()
            .position(|h| h.name == instance)
            .map(|i| InstanceId(i as i64 + 1))
            .unwrap_or_default();
        self.accounts.push(Account {
            person: Person {
                id,
                name: name.to_string(),
                display_name: None,
                bio: None,
                ap_id,
                local: true,
                deleted: false,
                banned: false,
                instance_id,
                published_at: Some(Utc::now()),
            },
            instance: instance.to_string(),
            password: password.to_string(),
            admin,
            token_gen: 0,
        });
        Ok(self.accounts.len() - 1)
    }

    fn jwt_for(&self, idx: usize) -> Jwt {
        let account = &self.accounts[idx];
        Jwt::new(format!("fake:{}:{}", account.person.id, account.token_gen))
    }

    fn my_user_info(&self, idx: usize, on: &str, now: Instant) -> Result<MyUserInfo> {
        let me = self.person_id(idx);
        let person = self.person(me, on)?;
        let follows = (0..self.communities.len())
            .filter(|&i| {
                self.follow_state(me, self.communities[i].value.id, now)
                    != SubscribedType::NotSubscribed
            })
            .map(|i| CommunityFollowerView {
                community: self.community_view(i, on, Some(me), now).community,
                follower: person.clone(),
            })
            .collect();
        Ok(MyUserInfo {
            local_user_view: LocalUserView { person },
            follows,
        })
    }

    /// Mention and reply notifications for a freshly created comment.
    fn notify(&mut self, comment_idx: usize, parent: Option<CommentId>) -> Result<()> {
        let (content, author, home, comment) = {
            let c = &self.comments[comment_idx];
            (
                c.value.comment.content.clone(),
                c.value.comment.creator_id,
                c.home.clone(),
                c.value.comment.id,
            )
        };
        let mut recipients: Vec<(PersonId, NotificationKind)> = Vec::new();
        for word in content.split_whitespace() {
            let Ok(Locator::Person { name, domain }) = word.parse::<Locator>() else {
                continue;
            };
            if let Some(a) = self
                .accounts
                .iter()
                .find(|a| a.person.name == name && self.domain_of(&a.instance) == domain)
            {
                recipients.push((a.person.id, NotificationKind::Mention));
            }
        }
        if let Some(parent) = parent {
            let idx = self.comment_idx("create_comment", parent)?;
            recipients.push((self.comments[idx].value.comment.creator_id, NotificationKind::Reply));
        }
        let mut seen = HashSet::new();
        for (recipient, kind) in recipients {
            if recipient == author || !seen.insert(recipient) {
                continue;
            }
            let id = NotificationId(self.next_id());
            self.notifications.push(Hosted::new(
                FakeNotification {
                    id,
                    recipient,
                    kind,
                    comment,
                },
                &home,
            ));
        }
        Ok(())
    }

    /// Whether `on` has received `report`, either as the reporter's home or
    /// as home of the reported object or its community.
    fn report_known_on(&self, idx: usize, on: &str, now: Instant) -> bool {
        let hosted = &self.reports[idx];
        if hosted.home == on {
            return true;
        }
        let (object_home, community) = match &hosted.value {
            FakeReport::Post(r) => match self.post_idx("list_reports", r.post_id) {
                Ok(i) => (self.posts[i].home.as_str(), self.posts[i].value.post.community_id),
                Err(_) => return false,
            },
            FakeReport::Comment(r) => {
                let Ok(i) = self.comment_idx("list_reports", r.comment_id) else {
                    return false;
                };
                let Ok(p) = self.post_idx("list_reports", self.comments[i].value.comment.post_id)
                else {
                    return false;
                };
                (self.comments[i].home.as_str(), self.posts[p].value.post.community_id)
            }
        };
        (object_home == on || self.community_home(community) == on)
            && self.arrived(hosted, now)
            && self.federates(&hosted.home, on)
    }

    fn report_view(&self, idx: usize, on: &str) -> Result<(CommunityId, ReportView)> {
        match &self.reports[idx].value {
            FakeReport::Post(report) => {
                let view = self.post_view(self.post_idx("list_reports", report.post_id)?, on)?;
                Ok((
                    view.community.id,
                    ReportView::Post(PostReportView {
                        post_report: report.clone(),
                        post: view.post,
                        community: view.community,
                    }),
                ))
            }
            FakeReport::Comment(report) => {
                let view =
                    self.comment_view(self.comment_idx("list_reports", report.comment_id)?, on)?;
                Ok((
                    view.community.id,
                    ReportView::Comment(CommentReportView {
                        comment_report: report.clone(),
                        comment: view.comment,
                        community: view.community,
                    }),
                ))
            }
        }
    }

    fn tag_idx(&self, operation: &str, id: TagId) -> Result<usize> {
        self.tags
            .iter()
            .position(|t| t.value.id == id)
            .ok_or_else(|| reject(operation, "couldnt_find_tag"))
    }

    fn resolve(
        &mut self,
        on: &str,
        viewer: Option<PersonId>,
        q: &str,
        now: Instant,
    ) -> Result<ResolvedObject> {
        const OP: &str = "resolve_object";
        let locator: Locator = q.parse().map_err(|_| reject(OP, "couldnt_find_object"))?;

        match locator {
            Locator::Community { name, domain } => {
                let idx = self
                    .communities
                    .iter()
                    .position(|c| c.value.name == name && self.domain_of(&c.home) == domain)
                    .ok_or_else(|| reject(OP, "couldnt_find_object"))?;
                if !self.community_known_on(idx, on, now) {
                    return Err(reject(OP, "couldnt_find_object"));
                }
                Ok(ResolvedObject::Community(self.community_view(idx, on, viewer, now)))
            }
            Locator::Person { name, domain } => {
                let account = self
                    .accounts
                    .iter()
                    .find(|a| a.person.name == name && self.domain_of(&a.instance) == domain)
                    .ok_or_else(|| reject(OP, "couldnt_find_object"))?;
                let federates = self.federates(&account.instance, on);
                let id = account.person.id;
                if !federates {
                    return Err(reject(OP, "couldnt_find_object"));
                }
                Ok(ResolvedObject::Person(self.person_view(id, on)?))
            }
            Locator::Uri(url) => {
                let ap_id = ObjectRef::new(url);
                if let Some(idx) = self.posts.iter().position(|p| p.value.post.ap_id == ap_id) {
                    let community = self.posts[idx].value.post.community_id;
                    if !self.may_read(viewer, community, now) {
                        return Err(reject(OP, "not_found"));
                    }
                    let home = self.posts[idx].home.clone();
                    if home != on && !(self.arrived(&self.posts[idx], now) && self.federates(&home, on)) {
                        return Err(reject(OP, "couldnt_find_object"));
                    }
                    self.posts[idx].fetched_by.insert(on.to_string());
                    return Ok(ResolvedObject::Post(self.post_view(idx, on)?));
                }
                if let Some(idx) = self
                    .comments
                    .iter()
                    .position(|c| c.value.comment.ap_id == ap_id)
                {
                    let post_idx = self.post_idx(OP, self.comments[idx].value.comment.post_id)?;
                    let community = self.posts[post_idx].value.post.community_id;
                    if !self.may_read(viewer, community, now) {
                        return Err(reject(OP, "not_found"));
                    }
                    let home = self.comments[idx].home.clone();
                    if home != on
                        && !(self.arrived(&self.comments[idx], now) && self.federates(&home, on))
                    {
                        return Err(reject(OP, "couldnt_find_object"));
                    }
                    self.comments[idx].fetched_by.insert(on.to_string());
                    self.posts[post_idx].fetched_by.insert(on.to_string());
                    return Ok(ResolvedObject::Comment(self.comment_view(idx, on)?));
                }
                if let Some(idx) = self
                    .communities
                    .iter()
                    .position(|c| c.value.ap_id == ap_id)
                {
                    if !self.community_known_on(idx, on, now) {
                        return Err(reject(OP, "couldnt_find_object"));
                    }
                    return Ok(ResolvedObject::Community(
                        self.community_view(idx, on, viewer, now),
                    ));
                }
                if let Some(account) = self.accounts.iter().find(|a| a.person.ap_id == ap_id) {
                    let id = account.person.id;
                    if !self.federates(&account.instance, on) {
                        return Err(reject(OP, "couldnt_find_object"));
                    }
                    return Ok(ResolvedObject::Person(self.person_view(id, on)?));
                }
                Err(reject(OP, "couldnt_find_object"))
            }
        }
    }
}

/// A set of fake instances sharing one world.
#[derive(Clone, Default)]
pub struct FakeFederation {
    world: Arc<Mutex<World>>,
}

impl FakeFederation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Federation with every instance of `config`, each with an admin seed user.
    pub fn from_config(config: &SuiteConfig) -> Result<Self> {
        let federation = Self::new();
        for instance in &config.instances {
            federation.add_instance(
                &instance.name,
                &instance.domain,
                &instance.seed_user,
                &config.password,
            )?;
        }
        Ok(federation)
    }

    pub fn with_propagation_delay(self, delay: Duration) -> Self {
        if let Ok(mut world) = self.world.lock() {
            world.delay = delay;
        }
        self
    }

    fn world(&self) -> Result<MutexGuard<'_, World>> {
        self.world
            .lock()
            .map_err(|_| Error::Internal("fake federation lock poisoned".to_string()))
    }

    pub fn add_instance(
        &self,
        name: &str,
        domain: &str,
        seed_user: &str,
        password: &str,
    ) -> Result<()> {
        let mut world = self.world()?;
        world.hosts.push(Host {
            name: name.to_string(),
            domain: domain.to_string(),
            allowed: BTreeSet::new(),
        });
        world.create_account(name, seed_user, password, true)?;
        Ok(())
    }

    /// API handle for one instance.
    pub fn instance(&self, name: &str) -> Arc<FakeInstance> {
        Arc::new(FakeInstance {
            name: name.to_string(),
            world: self.world.clone(),
        })
    }

    /// Number of calls of `operation` made against `instance`.
    pub fn calls(&self, instance: &str, operation: &str) -> usize {
        self.world()
            .map(|w| {
                w.calls
                    .get(&(instance.to_string(), operation.to_string()))
                    .copied()
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Hosts on the allow list of `instance`.
    pub fn allowed_instances(&self, instance: &str) -> Vec<String> {
        self.world()
            .ok()
            .and_then(|w| w.host(instance).ok().map(|h| h.allowed.iter().cloned().collect()))
            .unwrap_or_default()
    }

    pub fn post_count(&self) -> usize {
        self.world().map(|w| w.posts.len()).unwrap_or_default()
    }

    /// Overwrite the stored state of a follow, as a misbehaving server would.
    pub fn force_follow_state(
        &self,
        person: PersonId,
        community: CommunityId,
        state: SubscribedType,
    ) -> Result<()> {
        let mut world = self.world()?;
        if state == SubscribedType::NotSubscribed {
            world.follows.remove(&(person, community));
        } else {
            world.follows.insert(
                (person, community),
                Follow {
                    state,
                    accept_at: None,
                },
            );
        }
        Ok(())
    }
}

/// One fake instance, implementing the API the harness consumes.
pub struct FakeInstance {
    name: String,
    world: Arc<Mutex<World>>,
}

impl FakeInstance {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn world(&self, operation: &str) -> Result<MutexGuard<'_, World>> {
        let mut world = self
            .world
            .lock()
            .map_err(|_| Error::Internal("fake federation lock poisoned".to_string()))?;
        world.record(&self.name, operation);
        Ok(world)
    }
}

#[async_trait]
impl FederatedApi for FakeInstance {
    async fn login(&self, form: &Login) -> Result<LoginResponse> {
        let world = self.world("login")?;
        let idx = world
            .accounts
            .iter()
            .position(|a| {
                a.instance == self.name
                    && a.person.name == form.username_or_email
                    && a.password == form.password
                    && !a.person.deleted
            })
            .ok_or_else(|| reject("login", "incorrect_login"))?;
        if world.site_banned(world.person_id(idx), &self.name) {
            return Err(reject("login", "site_ban"));
        }
        Ok(LoginResponse {
            jwt: Some(world.jwt_for(idx)),
            ..Default::default()
        })
    }

    async fn register(&self, form: &Register) -> Result<LoginResponse> {
        let mut world = self.world("register")?;
        if form.password != form.password_verify {
            return Err(reject("register", "passwords_dont_match"));
        }
        if world
            .accounts
            .iter()
            .any(|a| a.instance == self.name && a.person.name == form.username)
        {
            return Err(reject("register", "user_already_exists"));
        }
        let idx = world.create_account(&self.name, &form.username, &form.password, false)?;
        Ok(LoginResponse {
            jwt: Some(world.jwt_for(idx)),
            registration_created: false,
            verify_email_sent: false,
        })
    }

    async fn get_my_user(&self, auth: Option<&Jwt>) -> Result<MyUserInfo> {
        let world = self.world("get_my_user")?;
        let idx = world.require("get_my_user", &self.name, auth)?;
        world.my_user_info(idx, &self.name, Instant::now())
    }

    async fn save_user_settings(
        &self,
        auth: Option<&Jwt>,
        form: &SaveUserSettings,
    ) -> Result<SuccessResponse> {
        let mut world = self.world("save_user_settings")?;
        let idx = world.require("save_user_settings", &self.name, auth)?;
        let person = &mut world.accounts[idx].person;
        if let Some(bio) = &form.bio {
            person.bio = Some(bio.clone());
        }
        if let Some(display_name) = &form.display_name {
            person.display_name = Some(display_name.clone());
        }
        Ok(SuccessResponse { success: true })
    }

    async fn delete_account(
        &self,
        auth: Option<&Jwt>,
        form: &DeleteAccount,
    ) -> Result<SuccessResponse> {
        let mut world = self.world("delete_account")?;
        let idx = world.require("delete_account", &self.name, auth)?;
        if world.accounts[idx].password != form.password {
            return Err(reject("delete_account", "incorrect_login"));
        }
        let me = world.person_id(idx);
        world.accounts[idx].person.deleted = true;
        if form.delete_content {
            for post in world.posts.iter_mut().filter(|p| p.value.post.creator_id == me) {
                post.value.post.deleted = true;
            }
            for comment in world
                .comments
                .iter_mut()
                .filter(|c| c.value.comment.creator_id == me)
            {
                comment.value.comment.deleted = true;
            }
        }
        Ok(SuccessResponse { success: true })
    }

    async fn get_site(&self, auth: Option<&Jwt>) -> Result<GetSiteResponse> {
        let world = self.world("get_site")?;
        let my_user = world
            .caller(&self.name, auth)
            .map(|idx| world.my_user_info(idx, &self.name, Instant::now()))
            .transpose()?;
        let admins = world
            .accounts
            .iter()
            .filter(|a| a.instance == self.name && a.admin)
            .map(|a| world.person_view(a.person.id, &self.name))
            .collect::<Result<Vec<_>>>()?;
        Ok(GetSiteResponse {
            version: "fake".to_string(),
            admins,
            my_user,
        })
    }

    async fn edit_site(&self, auth: Option<&Jwt>, _form: &EditSite) -> Result<SiteResponse> {
        let world = self.world("edit_site")?;
        world.require_admin("edit_site", &self.name, auth)?;
        Ok(SiteResponse::default())
    }

    async fn admin_allow_instance(
        &self,
        auth: Option<&Jwt>,
        form: &AdminAllowInstance,
    ) -> Result<SuccessResponse> {
        let mut world = self.world("admin_allow_instance")?;
        world.require_admin("admin_allow_instance", &self.name, auth)?;
        let name = self.name.clone();
        let host = world
            .hosts
            .iter_mut()
            .find(|h| h.name == name)
            .ok_or_else(|| Error::Internal(format!("unknown fake instance {}", name)))?;
        if form.allow {
            if !host.allowed.insert(form.instance.clone()) {
                return Err(reject("admin_allow_instance", "instance_already_allowed"));
            }
        } else {
            host.allowed.remove(&form.instance);
        }
        Ok(SuccessResponse { success: true })
    }

    async fn ban_person(&self, auth: Option<&Jwt>, form: &BanPerson) -> Result<PersonResponse> {
        let mut world = self.world("ban_person")?;
        world.require_admin("ban_person", &self.name, auth)?;
        world.person(form.person_id, &self.name)?;
        let key = (self.name.clone(), form.person_id);
        if form.ban {
            world.site_bans.insert(key);
            let name = self.name.clone();
            if let Some(account) = world
                .accounts
                .iter_mut()
                .find(|a| a.person.id == form.person_id && a.instance == name)
            {
                account.token_gen += 1;
            }
        } else {
            world.site_bans.remove(&key);
        }
        if form.remove_or_restore_data {
            for post in world
                .posts
                .iter_mut()
                .filter(|p| p.value.post.creator_id == form.person_id)
            {
                post.value.post.removed = form.ban;
            }
            for comment in world
                .comments
                .iter_mut()
                .filter(|c| c.value.comment.creator_id == form.person_id)
            {
                comment.value.comment.removed = form.ban;
            }
        }
        Ok(PersonResponse {
            person_view: world.person_view(form.person_id, &self.name)?,
        })
    }

    async fn purge_post(&self, auth: Option<&Jwt>, form: &PurgePost) -> Result<SuccessResponse> {
        let mut world = self.world("purge_post")?;
        world.require_admin("purge_post", &self.name, auth)?;
        let idx = world.post_idx("purge_post", form.post_id)?;
        world.posts.remove(idx);
        world
            .comments
            .retain(|c| c.value.comment.post_id != form.post_id);
        Ok(SuccessResponse { success: true })
    }

    async fn list_reports(
        &self,
        auth: Option<&Jwt>,
        form: &ListReports,
    ) -> Result<ListReportsResponse> {
        const OP: &str = "list_reports";
        let world = self.world(OP)?;
        let caller = world.require(OP, &self.name, auth)?;
        let me = world.person_id(caller);
        let admin = world.accounts[caller].admin;
        let now = Instant::now();
        let mut reports = Vec::new();
        for i in (0..world.reports.len()).rev() {
            if !world.report_known_on(i, &self.name, now) {
                continue;
            }
            let (community, view) = world.report_view(i, &self.name)?;
            let resolved = match &view {
                ReportView::Post(v) => v.post_report.resolved,
                ReportView::Comment(v) => v.comment_report.resolved,
                ReportView::Unsupported => false,
            };
            if form.unresolved_only == Some(true) && resolved {
                continue;
            }
            if admin || world.is_mod(me, community) {
                reports.push(view);
            }
        }
        Ok(ListReportsResponse { reports })
    }

    async fn resolve_object(
        &self,
        auth: Option<&Jwt>,
        form: &ResolveObject,
    ) -> Result<ResolveObjectResponse> {
        let mut world = self.world("resolve_object")?;
        let viewer = world.viewer(&self.name, auth);
        let resolved = world.resolve(&self.name, viewer, &form.q, Instant::now())?;
        Ok(ResolveObjectResponse {
            results: vec![resolved],
        })
    }

    async fn search(&self, auth: Option<&Jwt>, form: &Search) -> Result<SearchResponse> {
        let world = self.world("search")?;
        let viewer = world.viewer(&self.name, auth);
        let now = Instant::now();
        let mut results = Vec::new();
        if matches!(form.type_, SearchType::Posts | SearchType::All) {
            for i in 0..world.posts.len() {
                let post = &world.posts[i].value.post;
                if post.name == form.q
                    && !post.deleted
                    && world.post_known_on(i, &self.name, now)
                    && world.may_read(viewer, post.community_id, now)
                {
                    results.push(ResolvedObject::Post(world.post_view(i, &self.name)?));
                }
            }
        }
        Ok(SearchResponse { results })
    }

    async fn get_community(
        &self,
        auth: Option<&Jwt>,
        form: &GetCommunity,
    ) -> Result<GetCommunityResponse> {
        let world = self.world("get_community")?;
        let viewer = world.viewer(&self.name, auth);
        let now = Instant::now();
        let idx = match (&form.id, &form.name) {
            (Some(id), _) => world.community_idx("get_community", *id)?,
            (None, Some(name)) => world
                .communities
                .iter()
                .position(|c| c.home == self.name && &c.value.name == name)
                .ok_or_else(|| reject("get_community", "couldnt_find_community"))?,
            (None, None) => return Err(reject("get_community", "no_id_given")),
        };
        if !world.community_known_on(idx, &self.name, now) {
            return Err(reject("get_community", "couldnt_find_community"));
        }
        Ok(GetCommunityResponse {
            community_view: world.community_view(idx, &self.name, viewer, now),
        })
    }

    async fn create_community(
        &self,
        auth: Option<&Jwt>,
        form: &CreateCommunity,
    ) -> Result<CommunityResponse> {
        let mut world = self.world("create_community")?;
        let idx = world.require("create_community", &self.name, auth)?;
        let me = world.person_id(idx);
        if world
            .communities
            .iter()
            .any(|c| c.home == self.name && c.value.name == form.name)
        {
            return Err(reject("create_community", "community_already_exists"));
        }
        let id = CommunityId(world.next_id());
        let ap_id = world.url(&self.name, format!("c/{}", form.name))?;
        let community = Community {
            id,
            name: form.name.clone(),
            title: form.title.clone(),
            description: form.description.clone(),
            ap_id,
            local: true,
            visibility: form.visibility.unwrap_or_default(),
            icon: None,
            banner: None,
            nsfw: false,
            removed: false,
            deleted: false,
            instance_id: InstanceId::default(),
            published_at: Some(Utc::now()),
        };
        world.communities.push(Hosted::new(community, &self.name));
        world.moderators.insert((me, id));
        world.follows.insert(
            (me, id),
            Follow {
                state: SubscribedType::Subscribed,
                accept_at: None,
            },
        );
        let idx = world.communities.len() - 1;
        Ok(CommunityResponse {
            community_view: world.community_view(idx, &self.name, Some(me), Instant::now()),
        })
    }

    async fn edit_community(
        &self,
        auth: Option<&Jwt>,
        form: &EditCommunity,
    ) -> Result<CommunityResponse> {
        let mut world = self.world("edit_community")?;
        let caller = world.require("edit_community", &self.name, auth)?;
        let me = world.person_id(caller);
        let idx = world.community_idx("edit_community", form.community_id)?;
        world.require_mod("edit_community", caller, form.community_id)?;
        let community = &mut world.communities[idx].value;
        if let Some(title) = &form.title {
            community.title = title.clone();
        }
        if let Some(description) = &form.description {
            community.description = Some(description.clone());
        }
        if let Some(visibility) = form.visibility {
            community.visibility = visibility;
        }
        Ok(CommunityResponse {
            community_view: world.community_view(idx, &self.name, Some(me), Instant::now()),
        })
    }

    async fn follow_community(
        &self,
        auth: Option<&Jwt>,
        form: &FollowCommunity,
    ) -> Result<CommunityResponse> {
        let mut world = self.world("follow_community")?;
        let caller = world.require("follow_community", &self.name, auth)?;
        let me = world.person_id(caller);
        let idx = world.community_idx("follow_community", form.community_id)?;
        let now = Instant::now();
        let key = (me, form.community_id);
        if !form.follow {
            world.follows.remove(&key);
        } else if world.follow_state(me, form.community_id, now) == SubscribedType::NotSubscribed {
            let hosted = &world.communities[idx];
            let follow = if hosted.value.visibility == CommunityVisibility::Private {
                Follow {
                    state: SubscribedType::ApprovalRequired,
                    accept_at: None,
                }
            } else if hosted.home == self.name {
                Follow {
                    state: SubscribedType::Subscribed,
                    accept_at: None,
                }
            } else {
                Follow {
                    state: SubscribedType::Pending,
                    accept_at: Some(now + world.delay),
                }
            };
            world.follows.insert(key, follow);
        }
        Ok(CommunityResponse {
            community_view: world.community_view(idx, &self.name, Some(me), now),
        })
    }

    async fn delete_community(
        &self,
        auth: Option<&Jwt>,
        form: &DeleteCommunity,
    ) -> Result<CommunityResponse> {
        let mut world = self.world("delete_community")?;
        let caller = world.require("delete_community", &self.name, auth)?;
        let me = world.person_id(caller);
        let idx = world.community_idx("delete_community", form.community_id)?;
        if !world.is_mod(me, form.community_id) {
            return Err(reject("delete_community", "no_community_edit_allowed"));
        }
        world.communities[idx].value.deleted = form.deleted;
        Ok(CommunityResponse {
            community_view: world.community_view(idx, &self.name, Some(me), Instant::now()),
        })
    }

    async fn remove_community(
        &self,
        auth: Option<&Jwt>,
        form: &RemoveCommunity,
    ) -> Result<CommunityResponse> {
        let mut world = self.world("remove_community")?;
        let caller = world.require_admin("remove_community", &self.name, auth)?;
        let me = world.person_id(caller);
        let idx = world.community_idx("remove_community", form.community_id)?;
        if world.communities[idx].home == self.name {
            world.communities[idx].value.removed = form.removed;
        } else if form.removed {
            world.communities[idx].removed_on.insert(self.name.clone());
        } else {
            world.communities[idx].removed_on.remove(&self.name);
        }
        Ok(CommunityResponse {
            community_view: world.community_view(idx, &self.name, Some(me), Instant::now()),
        })
    }

    async fn ban_from_community(
        &self,
        auth: Option<&Jwt>,
        form: &BanFromCommunity,
    ) -> Result<BanFromCommunityResponse> {
        let mut world = self.world("ban_from_community")?;
        let caller = world.require("ban_from_community", &self.name, auth)?;
        world.community_idx("ban_from_community", form.community_id)?;
        world.require_mod("ban_from_community", caller, form.community_id)?;
        let key = (form.person_id, form.community_id);
        if form.ban {
            world.community_bans.insert(key);
        } else {
            world.community_bans.remove(&key);
        }
        if form.remove_or_restore_data {
            for post in world.posts.iter_mut().filter(|p| {
                p.value.post.creator_id == form.person_id
                    && p.value.post.community_id == form.community_id
            }) {
                post.value.post.removed = form.ban;
            }
        }
        Ok(BanFromCommunityResponse {
            person_view: world.person_view(form.person_id, &self.name)?,
            banned: form.ban,
        })
    }

    async fn add_mod_to_community(
        &self,
        auth: Option<&Jwt>,
        form: &AddModToCommunity,
    ) -> Result<AddModToCommunityResponse> {
        let mut world = self.world("add_mod_to_community")?;
        let caller = world.require("add_mod_to_community", &self.name, auth)?;
        world.community_idx("add_mod_to_community", form.community_id)?;
        world.require_mod("add_mod_to_community", caller, form.community_id)?;
        let key = (form.person_id, form.community_id);
        if form.added {
            world.moderators.insert(key);
        } else {
            world.moderators.remove(&key);
        }
        let moderators = world
            .moderators
            .iter()
            .filter(|(_, c)| *c == form.community_id)
            .map(|(p, _)| serde_json::json!({ "moderator_id": p }))
            .collect();
        Ok(AddModToCommunityResponse { moderators })
    }

    async fn list_pending_follows(
        &self,
        auth: Option<&Jwt>,
        form: &ListPendingFollows,
    ) -> Result<ListPendingFollowsResponse> {
        let world = self.world("list_pending_follows")?;
        let caller = world.require("list_pending_follows", &self.name, auth)?;
        let me = world.person_id(caller);
        let mut items = Vec::new();
        for ((person, community), follow) in &world.follows {
            if follow.state != SubscribedType::ApprovalRequired || !world.is_mod(me, *community) {
                continue;
            }
            let idx = world.community_idx("list_pending_follows", *community)?;
            items.push(PendingFollow {
                person: world.person(*person, &self.name)?,
                community: world.communities[idx].value.clone(),
                follow_state: Some(fedsuite_core::CommunityFollowerState::ApprovalRequired),
            });
        }
        items.sort_by_key(|i| i.person.id);
        items.truncate(form.limit.max(0) as usize);
        Ok(ListPendingFollowsResponse { items })
    }

    async fn pending_follows_count(
        &self,
        auth: Option<&Jwt>,
    ) -> Result<PendingFollowsCountResponse> {
        let world = self.world("pending_follows_count")?;
        let caller = world.require("pending_follows_count", &self.name, auth)?;
        let me = world.person_id(caller);
        let count = world
            .follows
            .iter()
            .filter(|((_, c), f)| {
                f.state == SubscribedType::ApprovalRequired && world.is_mod(me, *c)
            })
            .count() as i64;
        Ok(PendingFollowsCountResponse { count })
    }

    async fn approve_pending_follow(
        &self,
        auth: Option<&Jwt>,
        form: &ApprovePendingFollow,
    ) -> Result<SuccessResponse> {
        let mut world = self.world("approve_pending_follow")?;
        let caller = world.require("approve_pending_follow", &self.name, auth)?;
        world.require_mod("approve_pending_follow", caller, form.community_id)?;
        let key = (form.follower_id, form.community_id);
        match world.follows.get(&key).map(|f| f.state) {
            Some(SubscribedType::ApprovalRequired) => {}
            _ => return Err(reject("approve_pending_follow", "couldnt_find_object")),
        }
        if form.approve {
            world.follows.insert(
                key,
                Follow {
                    state: SubscribedType::Subscribed,
                    accept_at: None,
                },
            );
        } else {
            world.follows.remove(&key);
        }
        Ok(SuccessResponse { success: true })
    }

    async fn get_post(&self, auth: Option<&Jwt>, form: &GetPost) -> Result<GetPostResponse> {
        let world = self.world("get_post")?;
        let viewer = world.viewer(&self.name, auth);
        let now = Instant::now();
        let idx = world
            .post_idx("get_post", form.id)
            .map_err(|_| reject("get_post", "not_found"))?;
        if !world.post_known_on(idx, &self.name, now)
            || !world.may_read(viewer, world.posts[idx].value.post.community_id, now)
        {
            return Err(reject("get_post", "not_found"));
        }
        Ok(GetPostResponse {
            post_view: world.post_view(idx, &self.name)?,
        })
    }

    async fn get_posts(&self, auth: Option<&Jwt>, form: &GetPosts) -> Result<GetPostsResponse> {
        let world = self.world("get_posts")?;
        let viewer = world.viewer(&self.name, auth);
        let now = Instant::now();
        let limit = form.limit.unwrap_or(50).max(0) as usize;
        let mut posts = Vec::new();
        for i in (0..world.posts.len()).rev() {
            let post = &world.posts[i].value.post;
            if form.community_id.is_some_and(|c| c != post.community_id) {
                continue;
            }
            if form.type_ == Some(ListingType::Local) && world.posts[i].home != self.name {
                continue;
            }
            if post.deleted
                || world.post_removed_on(i, &self.name)
                || !world.post_known_on(i, &self.name, now)
                || !world.may_read(viewer, post.community_id, now)
            {
                continue;
            }
            posts.push(world.post_view(i, &self.name)?);
            if posts.len() >= limit {
                break;
            }
        }
        Ok(GetPostsResponse { posts })
    }

    async fn create_post(&self, auth: Option<&Jwt>, form: &CreatePost) -> Result<PostResponse> {
        const OP: &str = "create_post";
        let mut world = self.world(OP)?;
        let caller = world.require(OP, &self.name, auth)?;
        let me = world.person_id(caller);
        let community_idx = world.community_idx(OP, form.community_id)?;
        let now = Instant::now();
        if world.site_banned(me, &self.name) {
            return Err(reject(OP, "site_ban"));
        }
        if world.community_bans.contains(&(me, form.community_id)) {
            return Err(reject(OP, "banned_from_community"));
        }
        if !world.may_read(Some(me), form.community_id, now) {
            return Err(reject(OP, "private_community"));
        }
        let hosted = &world.communities[community_idx];
        if hosted.value.deleted || hosted.value.removed || hosted.removed_on.contains(&self.name) {
            return Err(reject(OP, "deleted"));
        }
        let id = PostId(world.next_id());
        let ap_id = world.url(&self.name, format!("post/{}", id))?;
        let post = Post {
            id,
            name: form.name.clone(),
            body: form.body.clone(),
            url: form.url.clone(),
            alt_text: form.alt_text.clone(),
            ap_id,
            community_id: form.community_id,
            creator_id: me,
            local: true,
            locked: false,
            removed: false,
            deleted: false,
            nsfw: false,
            featured_community: false,
            featured_local: false,
            embed_title: None,
            embed_description: None,
            embed_video_url: None,
            score: None,
            published_at: Some(Utc::now()),
        };
        let mut votes = HashMap::new();
        votes.insert(me, 1);
        world
            .posts
            .push(Hosted::new(
                FakePost {
                    post,
                    votes,
                    tags: Vec::new(),
                },
                &self.name,
            ));
        let idx = world.posts.len() - 1;
        Ok(PostResponse {
            post_view: world.post_view(idx, &self.name)?,
        })
    }

    async fn edit_post(&self, auth: Option<&Jwt>, form: &EditPost) -> Result<PostResponse> {
        let mut world = self.world("edit_post")?;
        let caller = world.require("edit_post", &self.name, auth)?;
        let me = world.person_id(caller);
        let idx = world.post_idx("edit_post", form.post_id)?;
        let post = &mut world.posts[idx].value.post;
        if post.creator_id != me {
            return Err(reject("edit_post", "no_post_edit_allowed"));
        }
        if let Some(name) = &form.name {
            post.name = name.clone();
        }
        if let Some(body) = &form.body {
            post.body = Some(body.clone());
        }
        Ok(PostResponse {
            post_view: world.post_view(idx, &self.name)?,
        })
    }

    async fn delete_post(&self, auth: Option<&Jwt>, form: &DeletePost) -> Result<PostResponse> {
        let mut world = self.world("delete_post")?;
        let caller = world.require("delete_post", &self.name, auth)?;
        let me = world.person_id(caller);
        let idx = world.post_idx("delete_post", form.post_id)?;
        let post = &mut world.posts[idx].value.post;
        if post.creator_id != me {
            return Err(reject("delete_post", "no_post_edit_allowed"));
        }
        post.deleted = form.deleted;
        Ok(PostResponse {
            post_view: world.post_view(idx, &self.name)?,
        })
    }

    async fn remove_post(&self, auth: Option<&Jwt>, form: &RemovePost) -> Result<PostResponse> {
        let mut world = self.world("remove_post")?;
        let caller = world.require("remove_post", &self.name, auth)?;
        let idx = world.post_idx("remove_post", form.post_id)?;
        let community = world.posts[idx].value.post.community_id;
        world.require_mod("remove_post", caller, community)?;
        let global = world.removes_globally(caller, community, &self.name);
        let hosted = &mut world.posts[idx];
        if global {
            hosted.value.post.removed = form.removed;
        } else if form.removed {
            hosted.removed_on.insert(self.name.clone());
        } else {
            hosted.removed_on.remove(&self.name);
        }
        Ok(PostResponse {
            post_view: world.post_view(idx, &self.name)?,
        })
    }

    async fn lock_post(&self, auth: Option<&Jwt>, form: &LockPost) -> Result<PostResponse> {
        let mut world = self.world("lock_post")?;
        let caller = world.require("lock_post", &self.name, auth)?;
        let idx = world.post_idx("lock_post", form.post_id)?;
        let community = world.posts[idx].value.post.community_id;
        world.require_mod("lock_post", caller, community)?;
        world.posts[idx].value.post.locked = form.locked;
        Ok(PostResponse {
            post_view: world.post_view(idx, &self.name)?,
        })
    }

    async fn feature_post(&self, auth: Option<&Jwt>, form: &FeaturePost) -> Result<PostResponse> {
        let mut world = self.world("feature_post")?;
        let caller = world.require("feature_post", &self.name, auth)?;
        let idx = world.post_idx("feature_post", form.post_id)?;
        let community = world.posts[idx].value.post.community_id;
        world.require_mod("feature_post", caller, community)?;
        let post = &mut world.posts[idx].value.post;
        match form.feature_type {
            FeatureType::Community => post.featured_community = form.featured,
            FeatureType::Local => post.featured_local = form.featured,
        }
        Ok(PostResponse {
            post_view: world.post_view(idx, &self.name)?,
        })
    }

    async fn like_post(&self, auth: Option<&Jwt>, form: &CreatePostLike) -> Result<PostResponse> {
        let mut world = self.world("like_post")?;
        let caller = world.require("like_post", &self.name, auth)?;
        let me = world.person_id(caller);
        let idx = world.post_idx("like_post", form.post_id)?;
        let votes = &mut world.posts[idx].value.votes;
        match form.is_upvote {
            Some(true) => votes.insert(me, 1),
            Some(false) => votes.insert(me, -1),
            None => votes.remove(&me),
        };
        Ok(PostResponse {
            post_view: world.post_view(idx, &self.name)?,
        })
    }

    async fn report_post(
        &self,
        auth: Option<&Jwt>,
        form: &CreatePostReport,
    ) -> Result<PostReportResponse> {
        const OP: &str = "report_post";
        let mut world = self.world(OP)?;
        let caller = world.require(OP, &self.name, auth)?;
        let me = world.person_id(caller);
        let idx = world.post_idx(OP, form.post_id)?;
        let post = &world.posts[idx].value.post;
        let (original_post_name, original_post_body) = (post.name.clone(), post.body.clone());
        let report = PostReport {
            id: ReportId(world.next_id()),
            post_id: form.post_id,
            creator_id: me,
            reason: form.reason.clone(),
            original_post_name,
            original_post_body,
            resolved: false,
            published_at: Some(Utc::now()),
        };
        world
            .reports
            .push(Hosted::new(FakeReport::Post(report.clone()), &self.name));
        let view = world.post_view(idx, &self.name)?;
        Ok(PostReportResponse {
            post_report_view: PostReportView {
                post_report: report,
                post: view.post,
                community: view.community,
            },
        })
    }

    async fn update_post_tags(
        &self,
        auth: Option<&Jwt>,
        form: &UpdatePostTags,
    ) -> Result<PostResponse> {
        const OP: &str = "update_post_tags";
        let mut world = self.world(OP)?;
        let caller = world.require(OP, &self.name, auth)?;
        let me = world.person_id(caller);
        let idx = world.post_idx(OP, form.post_id)?;
        let post = &world.posts[idx].value.post;
        let community = post.community_id;
        if post.creator_id != me {
            world.require_mod(OP, caller, community)?;
        }
        for id in &form.tags {
            let tag = &world.tags[world.tag_idx(OP, *id)?].value;
            if tag.community_id != community || tag.deleted {
                return Err(reject(OP, "tag_not_in_community"));
            }
        }
        world.posts[idx].value.tags = form.tags.clone();
        Ok(PostResponse {
            post_view: world.post_view(idx, &self.name)?,
        })
    }

    async fn create_community_tag(
        &self,
        auth: Option<&Jwt>,
        form: &CreateCommunityTag,
    ) -> Result<CommunityTag> {
        const OP: &str = "create_community_tag";
        let mut world = self.world(OP)?;
        let caller = world.require(OP, &self.name, auth)?;
        let idx = world.community_idx(OP, form.community_id)?;
        world.require_mod(OP, caller, form.community_id)?;
        let path = format!("c/{}/tag/{}", world.communities[idx].value.name, form.id_slug);
        let home = world.communities[idx].home.clone();
        let tag = CommunityTag {
            id: TagId(world.next_id()),
            name: form.name.clone(),
            community_id: form.community_id,
            ap_id: Some(world.url(&home, path)?),
            deleted: false,
        };
        world.tags.push(Hosted::new(tag.clone(), &home));
        Ok(tag)
    }

    async fn update_community_tag(
        &self,
        auth: Option<&Jwt>,
        form: &UpdateCommunityTag,
    ) -> Result<CommunityTag> {
        const OP: &str = "update_community_tag";
        let mut world = self.world(OP)?;
        let caller = world.require(OP, &self.name, auth)?;
        let idx = world.tag_idx(OP, form.tag_id)?;
        world.require_mod(OP, caller, world.tags[idx].value.community_id)?;
        world.tags[idx].value.name = form.name.clone();
        Ok(world.tags[idx].value.clone())
    }

    async fn delete_community_tag(
        &self,
        auth: Option<&Jwt>,
        form: &DeleteCommunityTag,
    ) -> Result<CommunityTag> {
        const OP: &str = "delete_community_tag";
        let mut world = self.world(OP)?;
        let caller = world.require(OP, &self.name, auth)?;
        let idx = world.tag_idx(OP, form.tag_id)?;
        world.require_mod(OP, caller, world.tags[idx].value.community_id)?;
        world.tags[idx].value.deleted = true;
        Ok(world.tags[idx].value.clone())
    }

    async fn list_community_tags(
        &self,
        _auth: Option<&Jwt>,
        form: &ListCommunityTags,
    ) -> Result<ListCommunityTagsResponse> {
        const OP: &str = "list_community_tags";
        let world = self.world(OP)?;
        let idx = world.community_idx(OP, form.community_id)?;
        if !world.community_known_on(idx, &self.name, Instant::now()) {
            return Err(reject(OP, "couldnt_find_community"));
        }
        let tags = world
            .tags
            .iter()
            .filter(|t| t.value.community_id == form.community_id && !t.value.deleted)
            .map(|t| t.value.clone())
            .collect();
        Ok(ListCommunityTagsResponse { tags })
    }

    async fn get_comments(
        &self,
        auth: Option<&Jwt>,
        form: &GetComments,
    ) -> Result<GetCommentsResponse> {
        let world = self.world("get_comments")?;
        let viewer = world.viewer(&self.name, auth);
        let now = Instant::now();
        let mut comments = Vec::new();
        let Ok(post_idx) = world.post_idx("get_comments", form.post_id) else {
            return Ok(GetCommentsResponse { comments });
        };
        if !world.may_read(viewer, world.posts[post_idx].value.post.community_id, now) {
            return Ok(GetCommentsResponse { comments });
        }
        for i in (0..world.comments.len()).rev() {
            if world.comments[i].value.comment.post_id == form.post_id
                && world.comment_known_on(i, &self.name, now)
            {
                comments.push(world.comment_view(i, &self.name)?);
            }
        }
        comments.truncate(form.limit.max(0) as usize);
        Ok(GetCommentsResponse { comments })
    }

    async fn create_comment(
        &self,
        auth: Option<&Jwt>,
        form: &CreateComment,
    ) -> Result<CommentResponse> {
        const OP: &str = "create_comment";
        let mut world = self.world(OP)?;
        let caller = world.require(OP, &self.name, auth)?;
        let me = world.person_id(caller);
        let post_idx = world.post_idx(OP, form.post_id)?;
        let community = world.posts[post_idx].value.post.community_id;
        let now = Instant::now();
        if world.site_banned(me, &self.name) {
            return Err(reject(OP, "site_ban"));
        }
        if world.community_bans.contains(&(me, community)) {
            return Err(reject(OP, "banned_from_community"));
        }
        if !world.may_read(Some(me), community, now) {
            return Err(reject(OP, "private_community"));
        }
        if world.posts[post_idx].value.post.locked {
            return Err(reject(OP, "locked"));
        }
        let parent_path = match form.parent_id {
            Some(parent) => {
                let parent_idx = world.comment_idx(OP, parent)?;
                world.comments[parent_idx].value.comment.path.clone()
            }
            None => "0".to_string(),
        };
        let id = CommentId(world.next_id());
        let ap_id = world.url(&self.name, format!("comment/{}", id))?;
        let comment = Comment {
            id,
            content: form.content.clone(),
            ap_id,
            post_id: form.post_id,
            creator_id: me,
            path: format!("{}.{}", parent_path, id),
            local: true,
            removed: false,
            deleted: false,
            distinguished: false,
            score: None,
            published_at: Some(Utc::now()),
        };
        let mut votes = HashMap::new();
        votes.insert(me, 1);
        world
            .comments
            .push(Hosted::new(FakeComment { comment, votes }, &self.name));
        let idx = world.comments.len() - 1;
        world.notify(idx, form.parent_id)?;
        Ok(CommentResponse {
            comment_view: world.comment_view(idx, &self.name)?,
        })
    }

    async fn edit_comment(
        &self,
        auth: Option<&Jwt>,
        form: &EditComment,
    ) -> Result<CommentResponse> {
        let mut world = self.world("edit_comment")?;
        let caller = world.require("edit_comment", &self.name, auth)?;
        let me = world.person_id(caller);
        let idx = world.comment_idx("edit_comment", form.comment_id)?;
        let comment = &mut world.comments[idx].value.comment;
        if comment.creator_id != me {
            return Err(reject("edit_comment", "no_comment_edit_allowed"));
        }
        comment.content = form.content.clone();
        Ok(CommentResponse {
            comment_view: world.comment_view(idx, &self.name)?,
        })
    }

    async fn delete_comment(
        &self,
        auth: Option<&Jwt>,
        form: &DeleteComment,
    ) -> Result<CommentResponse> {
        let mut world = self.world("delete_comment")?;
        let caller = world.require("delete_comment", &self.name, auth)?;
        let me = world.person_id(caller);
        let idx = world.comment_idx("delete_comment", form.comment_id)?;
        let comment = &mut world.comments[idx].value.comment;
        if comment.creator_id != me {
            return Err(reject("delete_comment", "no_comment_edit_allowed"));
        }
        comment.deleted = form.deleted;
        Ok(CommentResponse {
            comment_view: world.comment_view(idx, &self.name)?,
        })
    }

    async fn remove_comment(
        &self,
        auth: Option<&Jwt>,
        form: &RemoveComment,
    ) -> Result<CommentResponse> {
        let mut world = self.world("remove_comment")?;
        let caller = world.require("remove_comment", &self.name, auth)?;
        let idx = world.comment_idx("remove_comment", form.comment_id)?;
        let post_idx = world.post_idx("remove_comment", world.comments[idx].value.comment.post_id)?;
        let community = world.posts[post_idx].value.post.community_id;
        world.require_mod("remove_comment", caller, community)?;
        let global = world.removes_globally(caller, community, &self.name);
        let hosted = &mut world.comments[idx];
        if global {
            hosted.value.comment.removed = form.removed;
        } else if form.removed {
            hosted.removed_on.insert(self.name.clone());
        } else {
            hosted.removed_on.remove(&self.name);
        }
        Ok(CommentResponse {
            comment_view: world.comment_view(idx, &self.name)?,
        })
    }

    async fn distinguish_comment(
        &self,
        auth: Option<&Jwt>,
        form: &DistinguishComment,
    ) -> Result<CommentResponse> {
        let mut world = self.world("distinguish_comment")?;
        let caller = world.require("distinguish_comment", &self.name, auth)?;
        let idx = world.comment_idx("distinguish_comment", form.comment_id)?;
        let post_idx =
            world.post_idx("distinguish_comment", world.comments[idx].value.comment.post_id)?;
        let community = world.posts[post_idx].value.post.community_id;
        world.require_mod("distinguish_comment", caller, community)?;
        world.comments[idx].value.comment.distinguished = form.distinguished;
        Ok(CommentResponse {
            comment_view: world.comment_view(idx, &self.name)?,
        })
    }

    async fn like_comment(
        &self,
        auth: Option<&Jwt>,
        form: &CreateCommentLike,
    ) -> Result<CommentResponse> {
        let mut world = self.world("like_comment")?;
        let caller = world.require("like_comment", &self.name, auth)?;
        let me = world.person_id(caller);
        let idx = world.comment_idx("like_comment", form.comment_id)?;
        let votes = &mut world.comments[idx].value.votes;
        match form.is_upvote {
            Some(true) => votes.insert(me, 1),
            Some(false) => votes.insert(me, -1),
            None => votes.remove(&me),
        };
        Ok(CommentResponse {
            comment_view: world.comment_view(idx, &self.name)?,
        })
    }

    async fn report_comment(
        &self,
        auth: Option<&Jwt>,
        form: &CreateCommentReport,
    ) -> Result<CommentReportResponse> {
        const OP: &str = "report_comment";
        let mut world = self.world(OP)?;
        let caller = world.require(OP, &self.name, auth)?;
        let me = world.person_id(caller);
        let idx = world.comment_idx(OP, form.comment_id)?;
        let report = CommentReport {
            id: ReportId(world.next_id()),
            comment_id: form.comment_id,
            creator_id: me,
            reason: form.reason.clone(),
            original_comment_text: world.comments[idx].value.comment.content.clone(),
            resolved: false,
            published_at: Some(Utc::now()),
        };
        world
            .reports
            .push(Hosted::new(FakeReport::Comment(report.clone()), &self.name));
        let view = world.comment_view(idx, &self.name)?;
        Ok(CommentReportResponse {
            comment_report_view: CommentReportView {
                comment_report: report,
                comment: view.comment,
                community: view.community,
            },
        })
    }

    async fn create_private_message(
        &self,
        auth: Option<&Jwt>,
        form: &CreatePrivateMessage,
    ) -> Result<PrivateMessageResponse> {
        const OP: &str = "create_private_message";
        let mut world = self.world(OP)?;
        let caller = world.require(OP, &self.name, auth)?;
        let me = world.person_id(caller);
        world.person(form.recipient_id, &self.name)?;
        let id = PrivateMessageId(world.next_id());
        let ap_id = world.url(&self.name, format!("private_message/{}", id))?;
        let message = PrivateMessage {
            id,
            content: form.content.clone(),
            ap_id,
            creator_id: me,
            recipient_id: form.recipient_id,
            deleted: false,
            local: true,
            published_at: Some(Utc::now()),
        };
        world.messages.push(Hosted::new(message, &self.name));
        let idx = world.messages.len() - 1;
        Ok(PrivateMessageResponse {
            private_message_view: world.message_view(idx, &self.name)?,
        })
    }

    async fn edit_private_message(
        &self,
        auth: Option<&Jwt>,
        form: &EditPrivateMessage,
    ) -> Result<PrivateMessageResponse> {
        const OP: &str = "edit_private_message";
        let mut world = self.world(OP)?;
        let caller = world.require(OP, &self.name, auth)?;
        let me = world.person_id(caller);
        let idx = world.message_idx(OP, form.private_message_id)?;
        if world.messages[idx].value.creator_id != me {
            return Err(reject(OP, "edit_private_message_not_allowed"));
        }
        world.messages[idx].value.content = form.content.clone();
        Ok(PrivateMessageResponse {
            private_message_view: world.message_view(idx, &self.name)?,
        })
    }

    async fn delete_private_message(
        &self,
        auth: Option<&Jwt>,
        form: &DeletePrivateMessage,
    ) -> Result<PrivateMessageResponse> {
        const OP: &str = "delete_private_message";
        let mut world = self.world(OP)?;
        let caller = world.require(OP, &self.name, auth)?;
        let me = world.person_id(caller);
        let idx = world.message_idx(OP, form.private_message_id)?;
        if world.messages[idx].value.creator_id != me {
            return Err(reject(OP, "edit_private_message_not_allowed"));
        }
        world.messages[idx].value.deleted = form.deleted;
        Ok(PrivateMessageResponse {
            private_message_view: world.message_view(idx, &self.name)?,
        })
    }

    async fn list_notifications(
        &self,
        auth: Option<&Jwt>,
        form: &ListNotifications,
    ) -> Result<ListNotificationsResponse> {
        const OP: &str = "list_notifications";
        let world = self.world(OP)?;
        let caller = world.require(OP, &self.name, auth)?;
        let me = world.person_id(caller);
        let now = Instant::now();
        let mut notifications = Vec::new();
        for hosted in world.notifications.iter().rev() {
            let n = &hosted.value;
            if n.recipient != me || form.type_.is_some_and(|kind| kind != n.kind) {
                continue;
            }
            let arrived = hosted.home == self.name
                || (world.arrived(hosted, now) && world.federates(&hosted.home, &self.name));
            let Ok(idx) = world.comment_idx(OP, n.comment) else {
                continue;
            };
            if arrived {
                notifications.push(NotificationView {
                    notification: Notification {
                        id: n.id,
                        kind: n.kind,
                        read: false,
                    },
                    data: NotificationData::Comment(world.comment_view(idx, &self.name)?),
                });
            }
        }
        Ok(ListNotificationsResponse { notifications })
    }

    async fn get_person_details(
        &self,
        auth: Option<&Jwt>,
        form: &GetPersonDetails,
    ) -> Result<GetPersonDetailsResponse> {
        let world = self.world("get_person_details")?;
        world.caller(&self.name, auth);
        Ok(GetPersonDetailsResponse {
            person_view: world.person_view(form.person_id, &self.name)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn federation(delay: Duration) -> FakeFederation {
        FakeFederation::from_config(&SuiteConfig::default())
            .unwrap()
            .with_propagation_delay(delay)
    }

    async fn login(instance: &FakeInstance, user: &str) -> Jwt {
        instance
            .login(&Login {
                username_or_email: user.to_string(),
                password: "lemmylemmy".to_string(),
            })
            .await
            .unwrap()
            .jwt
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_reaches_subscribed_instance_after_delay() {
        let fed = federation(Duration::from_secs(1));
        let alpha = fed.instance("alpha");
        let beta = fed.instance("beta");
        let alpha_jwt = login(&alpha, "lemmy_alpha").await;
        let beta_jwt = login(&beta, "lemmy_beta").await;

        let community = beta
            .create_community(
                Some(&beta_jwt),
                &CreateCommunity {
                    name: "main".into(),
                    title: "main".into(),
                    description: None,
                    visibility: None,
                },
            )
            .await
            .unwrap()
            .community_view
            .community;

        tokio::time::sleep(Duration::from_secs(1)).await;
        let post = alpha
            .create_post(
                Some(&alpha_jwt),
                &CreatePost {
                    name: "hello".into(),
                    community_id: community.id,
                    url: None,
                    body: None,
                    alt_text: None,
                },
            )
            .await
            .unwrap()
            .post_view;
        assert!(!post.community.local);
        assert_eq!(post.score(), 1);

        let search = Search {
            q: "hello".into(),
            type_: SearchType::Posts,
            listing_type: ListingType::All,
        };
        assert!(beta.search(None, &search).await.unwrap().results.is_empty());

        tokio::time::sleep(Duration::from_secs(1)).await;
        let results = beta.search(None, &search).await.unwrap().results;
        assert_eq!(results.len(), 1);
        let on_beta = results[0].clone().into_post().unwrap();
        assert_eq!(on_beta.post.ap_id, post.post.ap_id);
        assert!(on_beta.community.local);
        assert!(!on_beta.creator.local);
    }

    #[tokio::test]
    async fn test_allow_list_blocks_resolution() {
        let fed = federation(Duration::ZERO);
        let alpha = fed.instance("alpha");
        let delta = fed.instance("delta");
        let delta_jwt = login(&delta, "lemmy_delta").await;
        delta
            .admin_allow_instance(
                Some(&delta_jwt),
                &AdminAllowInstance {
                    instance: "lemmy-beta".into(),
                    allow: true,
                    reason: "allow".into(),
                },
            )
            .await
            .unwrap();

        let alpha_jwt = login(&alpha, "lemmy_alpha").await;
        alpha
            .create_community(
                Some(&alpha_jwt),
                &CreateCommunity {
                    name: "main".into(),
                    title: "main".into(),
                    description: None,
                    visibility: None,
                },
            )
            .await
            .unwrap();

        let err = delta
            .resolve_object(
                None,
                &ResolveObject {
                    q: "!main@lemmy-alpha:8541".into(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.remote_kind().unwrap(), &"couldnt_find_object");
        assert_eq!(fed.allowed_instances("delta"), vec!["lemmy-beta".to_string()]);
    }

    #[tokio::test]
    async fn test_wrong_password_is_auth_error() {
        let fed = federation(Duration::ZERO);
        let err = fed
            .instance("alpha")
            .login(&Login {
                username_or_email: "lemmy_alpha".into(),
                password: "wrong".into(),
            })
            .await
            .unwrap_err();
        assert!(err.is_auth());
        assert_eq!(fed.calls("alpha", "login"), 1);
    }

    async fn community(instance: &FakeInstance, jwt: &Jwt, name: &str) -> Community {
        instance
            .create_community(
                Some(jwt),
                &CreateCommunity {
                    name: name.into(),
                    title: name.into(),
                    description: None,
                    visibility: None,
                },
            )
            .await
            .unwrap()
            .community_view
            .community
    }

    async fn post_in(instance: &FakeInstance, jwt: &Jwt, community: CommunityId) -> PostView {
        instance
            .create_post(
                Some(jwt),
                &CreatePost {
                    name: "tagged".into(),
                    community_id: community,
                    url: None,
                    body: Some("body".into()),
                    alt_text: None,
                },
            )
            .await
            .unwrap()
            .post_view
    }

    #[tokio::test]
    async fn test_unusable_token_is_anonymous() {
        let fed = federation(Duration::ZERO);
        let alpha = fed.instance("alpha");
        let jwt = login(&alpha, "lemmy_alpha").await;

        let site = alpha.get_site(Some(&jwt)).await.unwrap();
        let me = site.my_user.unwrap().local_user_view.person;
        assert_eq!(me.name, "lemmy_alpha");

        let bogus = Jwt::new("foobar");
        let site = alpha.get_site(Some(&bogus)).await.unwrap();
        assert!(site.my_user.is_none());
        assert_eq!(site.admins.len(), 1);

        let err = alpha.get_my_user(Some(&bogus)).await.unwrap_err();
        assert_eq!(err.remote_kind().unwrap(), &"not_logged_in");
    }

    #[tokio::test]
    async fn test_remote_admin_removal_stays_local() {
        let fed = federation(Duration::ZERO);
        let alpha = fed.instance("alpha");
        let beta = fed.instance("beta");
        let alpha_jwt = login(&alpha, "lemmy_alpha").await;
        let beta_jwt = login(&beta, "lemmy_beta").await;
        let main = community(&beta, &beta_jwt, "main").await;
        let post = post_in(&alpha, &alpha_jwt, main.id).await;

        let removed = alpha
            .remove_post(
                Some(&alpha_jwt),
                &RemovePost {
                    post_id: post.post.id,
                    removed: true,
                    reason: "remove".into(),
                },
            )
            .await
            .unwrap()
            .post_view;
        assert!(removed.post.removed);
        let on_beta = beta
            .get_post(None, &GetPost { id: post.post.id })
            .await
            .unwrap()
            .post_view;
        assert!(!on_beta.post.removed);

        beta.remove_post(
            Some(&beta_jwt),
            &RemovePost {
                post_id: post.post.id,
                removed: true,
                reason: "remove".into(),
            },
        )
        .await
        .unwrap();
        let on_alpha = alpha
            .get_post(None, &GetPost { id: post.post.id })
            .await
            .unwrap()
            .post_view;
        assert!(on_alpha.post.removed);
    }

    #[tokio::test]
    async fn test_home_site_ban_revokes_login() {
        let fed = federation(Duration::ZERO);
        let alpha = fed.instance("alpha");
        let beta = fed.instance("beta");
        let admin = login(&alpha, "lemmy_alpha").await;
        let user = alpha
            .register(&Register {
                username: "banned_user".into(),
                password: "lemmylemmy".into(),
                password_verify: "lemmylemmy".into(),
                show_nsfw: None,
            })
            .await
            .unwrap()
            .jwt
            .unwrap();
        let person = alpha.get_my_user(Some(&user)).await.unwrap().local_user_view.person;
        let ban = |ban: bool| BanPerson {
            person_id: person.id,
            ban,
            remove_or_restore_data: false,
            reason: "ban".into(),
        };

        let view = alpha.ban_person(Some(&admin), &ban(true)).await.unwrap();
        assert!(view.person_view.person.banned);
        assert!(alpha.get_my_user(Some(&user)).await.unwrap_err().is_auth());
        let err = alpha
            .login(&Login {
                username_or_email: "banned_user".into(),
                password: "lemmylemmy".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.remote_kind().unwrap(), &"site_ban");
        let on_beta = beta
            .get_person_details(None, &GetPersonDetails { person_id: person.id })
            .await
            .unwrap();
        assert!(on_beta.person_view.person.banned);

        alpha.ban_person(Some(&admin), &ban(false)).await.unwrap();
        let fresh = login(&alpha, "banned_user").await;
        assert!(alpha.get_my_user(Some(&fresh)).await.is_ok());
    }

    #[tokio::test]
    async fn test_remote_site_ban_is_not_seen_at_home() {
        let fed = federation(Duration::ZERO);
        let alpha = fed.instance("alpha");
        let beta = fed.instance("beta");
        let alpha_jwt = login(&alpha, "lemmy_alpha").await;
        let beta_jwt = login(&beta, "lemmy_beta").await;
        let alpha_id = alpha.get_my_user(Some(&alpha_jwt)).await.unwrap().local_user_view.person.id;
        let alpha_main = community(&alpha, &alpha_jwt, "main").await;

        beta.ban_person(
            Some(&beta_jwt),
            &BanPerson {
                person_id: alpha_id,
                ban: true,
                remove_or_restore_data: false,
                reason: "ban".into(),
            },
        )
        .await
        .unwrap();

        let me = alpha.get_my_user(Some(&alpha_jwt)).await.unwrap();
        assert!(!me.local_user_view.person.banned);
        post_in(&alpha, &alpha_jwt, alpha_main.id).await;
        let on_beta = beta
            .get_person_details(None, &GetPersonDetails { person_id: alpha_id })
            .await
            .unwrap();
        assert!(on_beta.person_view.person.banned);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mention_notification_arrives_after_delay() {
        let fed = federation(Duration::from_secs(1));
        let alpha = fed.instance("alpha");
        let beta = fed.instance("beta");
        let alpha_jwt = login(&alpha, "lemmy_alpha").await;
        let beta_jwt = login(&beta, "lemmy_beta").await;
        let main = community(&alpha, &alpha_jwt, "main").await;
        let post = post_in(&alpha, &alpha_jwt, main.id).await;

        let comment = alpha
            .create_comment(
                Some(&alpha_jwt),
                &CreateComment {
                    content: "hello @lemmy_beta@lemmy-beta:8551 and @nobody@lemmy-beta:8551".into(),
                    post_id: post.post.id,
                    parent_id: None,
                },
            )
            .await
            .unwrap()
            .comment_view;
        let mentions = ListNotifications {
            type_: Some(NotificationKind::Mention),
            unread_only: false,
        };
        let listed = beta
            .list_notifications(Some(&beta_jwt), &mentions)
            .await
            .unwrap();
        assert!(listed.notifications.is_empty());

        tokio::time::sleep(Duration::from_secs(1)).await;
        let listed = beta
            .list_notifications(Some(&beta_jwt), &mentions)
            .await
            .unwrap()
            .notifications;
        assert_eq!(listed.len(), 1);
        let view = listed[0].comment().unwrap();
        assert_eq!(view.comment.ap_id, comment.comment.ap_id);
        assert!(!view.creator.local);

        let replies = ListNotifications {
            type_: Some(NotificationKind::Reply),
            unread_only: false,
        };
        let listed = beta.list_notifications(Some(&beta_jwt), &replies).await.unwrap();
        assert!(listed.notifications.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_reaches_community_home() {
        let fed = federation(Duration::from_secs(1));
        let alpha = fed.instance("alpha");
        let beta = fed.instance("beta");
        let gamma = fed.instance("gamma");
        let alpha_jwt = login(&alpha, "lemmy_alpha").await;
        let beta_jwt = login(&beta, "lemmy_beta").await;
        let gamma_jwt = login(&gamma, "lemmy_gamma").await;
        let main = community(&beta, &beta_jwt, "main").await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        let post = post_in(&alpha, &alpha_jwt, main.id).await;

        let filed = gamma
            .report_post(
                Some(&gamma_jwt),
                &CreatePostReport {
                    post_id: post.post.id,
                    reason: "spam".into(),
                },
            )
            .await
            .unwrap()
            .post_report_view;
        assert_eq!(filed.post_report.original_post_name, "tagged");
        assert_eq!(filed.post_report.original_post_body.as_deref(), Some("body"));

        let on_gamma = gamma
            .list_reports(Some(&gamma_jwt), &ListReports::default())
            .await
            .unwrap();
        assert_eq!(on_gamma.reports.len(), 1);
        let on_beta = beta
            .list_reports(Some(&beta_jwt), &ListReports::default())
            .await
            .unwrap();
        assert!(on_beta.reports.is_empty());

        tokio::time::sleep(Duration::from_secs(1)).await;
        let on_beta = beta
            .list_reports(Some(&beta_jwt), &ListReports::default())
            .await
            .unwrap()
            .reports;
        assert_eq!(on_beta.len(), 1);
        assert_eq!(on_beta[0].reason(), Some("spam"));
        assert_eq!(on_beta[0].as_post().unwrap().post.ap_id, post.post.ap_id);
    }

    #[tokio::test]
    async fn test_post_tags_must_belong_to_its_community() {
        let fed = federation(Duration::ZERO);
        let alpha = fed.instance("alpha");
        let jwt = login(&alpha, "lemmy_alpha").await;
        let main = community(&alpha, &jwt, "main").await;
        let other = community(&alpha, &jwt, "other").await;
        let tag = |community_id: CommunityId, name: &str| CreateCommunityTag {
            community_id,
            name: name.into(),
            id_slug: name.into(),
        };
        let news = alpha.create_community_tag(Some(&jwt), &tag(main.id, "news")).await.unwrap();
        let foreign = alpha.create_community_tag(Some(&jwt), &tag(other.id, "news")).await.unwrap();
        let post = post_in(&alpha, &jwt, main.id).await;

        let tagged = alpha
            .update_post_tags(
                Some(&jwt),
                &UpdatePostTags {
                    post_id: post.post.id,
                    tags: vec![news.id],
                },
            )
            .await
            .unwrap()
            .post_view;
        assert_eq!(tagged.tag_names(), vec!["news"]);

        let err = alpha
            .update_post_tags(
                Some(&jwt),
                &UpdatePostTags {
                    post_id: post.post.id,
                    tags: vec![foreign.id],
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.remote_kind().unwrap(), &"tag_not_in_community");

        alpha
            .delete_community_tag(Some(&jwt), &DeleteCommunityTag { tag_id: news.id })
            .await
            .unwrap();
        let view = alpha
            .get_post(None, &GetPost { id: post.post.id })
            .await
            .unwrap()
            .post_view;
        assert!(view.tags.is_empty());
    }
}
