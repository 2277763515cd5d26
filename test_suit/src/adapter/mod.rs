//! Repository scenarios shared by every backend. Each backend module builds
//! a fresh store and runs these against it.

use std::collections::BTreeSet;

use chrono::{Duration, TimeZone, Utc};
use trackstore::{
    AnyEntity, Error, JunctionManager, JunctionTable, Store, Value,
    entity::{Client, Project, Tag, Task, TeamGroup, TeamMember, TeamRole, User, Workspace},
    fields,
};

pub mod test_postgres;
pub mod test_sqlite;

fn set<I: IntoIterator<Item = String>>(ids: I) -> BTreeSet<String> {
    ids.into_iter().collect()
}

pub(crate) async fn add_workspace(store: &Store, name: &str) -> Workspace {
    store
        .repository::<Workspace>()
        .await
        .unwrap()
        .add(Workspace {
            name: name.to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
}

pub(crate) async fn add_member(store: &Store, workspace: &Workspace, rate: f64) -> TeamMember {
    store
        .repository::<TeamMember>()
        .await
        .unwrap()
        .add(TeamMember {
            billable_rate: rate,
            workspace_id: Some(workspace.id.clone()),
            ..Default::default()
        })
        .await
        .unwrap()
}

pub(crate) async fn round_trip_every_kind(store: &Store) {
    let user = store
        .users()
        .await
        .unwrap()
        .add(User {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            username: "ada".into(),
            password: "s3cret".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(user.id.starts_with("u_"));
    assert_eq!(store.users().await.unwrap().get(&user.id).await.unwrap(), user);

    let workspace = add_workspace(store, "O'Reilly & Sons").await;
    assert!(workspace.id.starts_with("w_"));
    assert_eq!(
        store
            .repository::<Workspace>()
            .await
            .unwrap()
            .get(&workspace.id)
            .await
            .unwrap(),
        workspace
    );

    let clients = store.repository::<Client>().await.unwrap();
    let client = clients
        .add(Client {
            name: "Acme".into(),
            address: "1 Main St".into(),
            note: String::new(),
            is_archived: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(clients.get(&client.id).await.unwrap(), client);

    let projects = store.repository::<Project>().await.unwrap();
    let project = projects
        .add(Project {
            name: "Website".into(),
            color_tag: "#ff0000".into(),
            is_public: true,
            tracked_hours: 12.75,
            tracked_amount: 1530.5,
            progress_percentage: 33.3,
            client_id: Some(client.id.clone()),
            workspace_id: Some(workspace.id.clone()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(projects.get(&project.id).await.unwrap(), project);

    let tags = store.repository::<Tag>().await.unwrap();
    let tag = tags
        .add(Tag {
            name: "urgent".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(tag.id.starts_with("ta_"));
    assert_eq!(tags.get(&tag.id).await.unwrap(), tag);

    let start = Utc.with_ymd_and_hms(2023, 3, 14, 9, 26, 53).unwrap()
        + Duration::microseconds(589_793);
    let tasks = store.repository::<Task>().await.unwrap();
    let task = tasks
        .add(Task {
            description: "write report".into(),
            billable: true,
            start_time: start,
            end_time: start + Duration::hours(2),
            date: Utc.with_ymd_and_hms(2023, 3, 14, 0, 0, 0).unwrap(),
            is_active: false,
            project_id: Some(project.id.clone()),
            tags: vec![tag.id.clone()],
            ..Default::default()
        })
        .await
        .unwrap();
    let fetched = tasks.get(&task.id).await.unwrap();
    assert_eq!(fetched, task);
    assert_eq!(fetched.start_time, start);

    let roles = store.repository::<TeamRole>().await.unwrap();
    let role = roles
        .add(TeamRole {
            role: "admin".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(roles.get(&role.id).await.unwrap(), role);

    let members = store.repository::<TeamMember>().await.unwrap();
    let member = members
        .add(TeamMember {
            billable_rate: 42.5,
            workspace_id: Some(workspace.id.clone()),
            user_id: Some(user.id.clone()),
            team_role_id: Some(role.id.clone()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(members.get(&member.id).await.unwrap(), member);

    let groups = store.repository::<TeamGroup>().await.unwrap();
    let group = groups
        .add(TeamGroup {
            name: "Core".into(),
            workspace_id: None,
            team_members: vec![member.id.clone()],
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(groups.get(&group.id).await.unwrap(), group);

    // the member now sees the group from the child side
    let member = members.get(&member.id).await.unwrap();
    assert_eq!(member.team_groups, vec![group.id.clone()]);
}

pub(crate) async fn project_team_member_lifecycle(store: &Store) {
    let workspace = add_workspace(store, "W1").await;
    let projects = store.repository::<Project>().await.unwrap();
    let project = projects
        .add(Project {
            name: "P1".into(),
            workspace_id: Some(workspace.id.clone()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(
        projects.get(&project.id).await.unwrap().workspace_id,
        Some(workspace.id.clone())
    );

    let a = add_member(store, &workspace, 10.0).await;
    let b = add_member(store, &workspace, 20.0).await;

    let updated = projects
        .update(
            &project.id,
            fields! { "team_members" => format!("{},{}", a.id, b.id) },
        )
        .await
        .unwrap();
    assert_eq!(
        set(updated.team_members),
        set([a.id.clone(), b.id.clone()])
    );
    assert_eq!(
        set(store
            .list_children(JunctionTable::ProjectTeamMember, &project.id)
            .await
            .unwrap()),
        set([a.id.clone(), b.id.clone()])
    );

    projects.delete(&project.id).await.unwrap();
    assert!(
        store
            .list_children(JunctionTable::ProjectTeamMember, &project.id)
            .await
            .unwrap()
            .is_empty()
    );

    let err = projects.get(&project.id).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.status_code(), 404);

    // members were only children; they stay
    let members = store.repository::<TeamMember>().await.unwrap();
    assert!(members.get(&a.id).await.is_ok());
    assert!(members.get(&b.id).await.is_ok());
}

pub(crate) async fn empty_update_changes_nothing(store: &Store) {
    let workspace = add_workspace(store, "W1").await;
    let member = add_member(store, &workspace, 15.25).await;
    let groups = store.repository::<TeamGroup>().await.unwrap();
    let group = groups
        .add(TeamGroup {
            name: "Design".into(),
            workspace_id: Some(workspace.id.clone()),
            team_members: vec![member.id.clone()],
            ..Default::default()
        })
        .await
        .unwrap();

    let before = groups.get(&group.id).await.unwrap();
    let after = groups.update(&group.id, fields! {}).await.unwrap();
    assert_eq!(before, after);
    assert_eq!(after, groups.get(&group.id).await.unwrap());
}

pub(crate) async fn scalar_and_relation_update(store: &Store) {
    let workspace = add_workspace(store, "W1").await;
    let tags = store.repository::<Tag>().await.unwrap();
    let red = tags.add(Tag { name: "red".into(), ..Default::default() }).await.unwrap();
    let blue = tags.add(Tag { name: "blue".into(), ..Default::default() }).await.unwrap();

    let tasks = store.repository::<Task>().await.unwrap();
    let task = tasks
        .add(Task {
            description: "draft".into(),
            tags: vec![red.id.clone()],
            ..Default::default()
        })
        .await
        .unwrap();

    let end = Utc.with_ymd_and_hms(2024, 1, 1, 17, 0, 0).unwrap();
    let updated = tasks
        .update(
            &task.id,
            fields! {
                "description" => "final",
                "end_time" => end,
                "is_active" => true,
                "tags" => Value::List(vec![Value::Text(blue.id.clone())]),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.description, "final");
    assert_eq!(updated.end_time, end);
    assert!(updated.is_active);
    assert_eq!(updated.tags, vec![blue.id.clone()]);

    // integers are accepted for float columns
    let member = add_member(store, &workspace, 1.0).await;
    let member = store
        .repository::<TeamMember>()
        .await
        .unwrap()
        .update(&member.id, fields! { "billable_rate" => 75 })
        .await
        .unwrap();
    assert_eq!(member.billable_rate, 75.0);

    let err = tasks
        .update(&task.id, fields! { "_id" => "t_other" })
        .await
        .unwrap_err();
    assert!(matches!(err.root(), Error::Validation(_)));

    let err = tasks
        .update("t_missing", fields! { "description" => "x" })
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(
        err.to_string(),
        "UpdateTask: task with id t_missing not found"
    );
}

pub(crate) async fn filters_track_adds_and_deletes(store: &Store) {
    let tags = store.repository::<Tag>().await.unwrap();
    assert!(tags.get_all().await.unwrap().is_empty());

    let mut added = Vec::new();
    for name in ["a", "b", "c", "d"] {
        added.push(
            tags.add(Tag {
                name: name.into(),
                ..Default::default()
            })
            .await
            .unwrap(),
        );
    }
    tags.delete(&added[1].id).await.unwrap();

    let expected = set(
        added
            .iter()
            .filter(|t| t.id != added[1].id)
            .map(|t| t.id.clone()),
    );
    let all = tags.get_with_filters(&fields! {}).await.unwrap();
    assert_eq!(set(all.into_iter().map(|t| t.id)), expected);
    assert_eq!(
        set(tags.get_all().await.unwrap().into_iter().map(|t| t.id)),
        expected
    );

    let only_c = tags.get_with_filters(&fields! { "name" => "c" }).await.unwrap();
    assert_eq!(only_c.len(), 1);
    assert_eq!(only_c[0].name, "c");

    let err = tags.delete(&added[1].id).await.unwrap_err();
    assert!(err.is_not_found());
}

pub(crate) async fn null_and_conjunctive_filters(store: &Store) {
    let workspace = add_workspace(store, "W1").await;
    let projects = store.repository::<Project>().await.unwrap();
    let inside = projects
        .add(Project {
            name: "inside".into(),
            is_public: true,
            workspace_id: Some(workspace.id.clone()),
            ..Default::default()
        })
        .await
        .unwrap();
    let loose = projects
        .add(Project {
            name: "loose".into(),
            is_public: true,
            ..Default::default()
        })
        .await
        .unwrap();

    let found = projects
        .get_with_filters(&fields! { "workspace_id" => Value::Null })
        .await
        .unwrap();
    assert_eq!(found, vec![loose.clone()]);

    let found = projects
        .get_with_filters(&fields! { "is_public" => true, "workspace_id" => workspace.id.clone() })
        .await
        .unwrap();
    assert_eq!(found, vec![inside]);

    let err = projects
        .get_with_filters(&fields! { "owner" => "u_1" })
        .await
        .unwrap_err();
    assert!(matches!(err.root(), Error::UnknownColumn { table: "project", .. }));
    assert_eq!(err.status_code(), 400);
}

pub(crate) async fn junction_add_is_idempotent(store: &Store) {
    let adapter = store.adapter().await.unwrap();
    let junctions = JunctionManager::new(adapter.builder());

    let mut session = adapter.begin().await.unwrap();
    assert!(
        junctions
            .add(session.as_mut(), JunctionTable::TaskTag, "t_1", "ta_1")
            .await
            .unwrap()
    );
    assert!(
        !junctions
            .add(session.as_mut(), JunctionTable::TaskTag, "t_1", "ta_1")
            .await
            .unwrap()
    );
    session.commit().await.unwrap();

    assert_eq!(
        store
            .list_children(JunctionTable::TaskTag, "t_1")
            .await
            .unwrap(),
        vec!["ta_1".to_string()]
    );
}

pub(crate) async fn replace_all_yields_exactly_new_children(store: &Store) {
    let adapter = store.adapter().await.unwrap();
    let junctions = JunctionManager::new(adapter.builder());
    let old: Vec<String> = vec!["tm_1".into(), "tm_2".into(), "tm_3".into()];
    let new: Vec<String> = vec!["tm_3".into(), "tm_4".into(), "tm_4".into()];

    let mut session = adapter.begin().await.unwrap();
    for child in &old {
        junctions
            .add(session.as_mut(), JunctionTable::ProjectTeamMember, "p_1", child)
            .await
            .unwrap();
    }
    junctions
        .add(session.as_mut(), JunctionTable::ProjectTeamMember, "p_2", "tm_1")
        .await
        .unwrap();
    junctions
        .replace_all(session.as_mut(), JunctionTable::ProjectTeamMember, "p_1", &new)
        .await
        .unwrap();

    let children = junctions
        .list_children(session.as_mut(), JunctionTable::ProjectTeamMember, "p_1")
        .await
        .unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(set(children), set(["tm_3".to_string(), "tm_4".to_string()]));

    let parents = junctions
        .list_parents(session.as_mut(), JunctionTable::ProjectTeamMember, "tm_1")
        .await
        .unwrap();
    assert_eq!(parents, vec!["p_2".to_string()]);
    session.commit().await.unwrap();
}

pub(crate) async fn delete_cleans_both_junction_sides(store: &Store) {
    let workspace = add_workspace(store, "W1").await;
    let a = add_member(store, &workspace, 1.0).await;
    let b = add_member(store, &workspace, 2.0).await;

    let groups = store.repository::<TeamGroup>().await.unwrap();
    let group = groups
        .add(TeamGroup {
            name: "Ops".into(),
            team_members: vec![a.id.clone(), b.id.clone()],
            ..Default::default()
        })
        .await
        .unwrap();
    let projects = store.repository::<Project>().await.unwrap();
    let project = projects
        .add(Project {
            name: "P".into(),
            team_members: vec![a.id.clone()],
            team_groups: vec![group.id.clone()],
            ..Default::default()
        })
        .await
        .unwrap();

    // deleting a child removes it everywhere it was linked
    let members = store.repository::<TeamMember>().await.unwrap();
    members.delete(&a.id).await.unwrap();
    assert_eq!(groups.get(&group.id).await.unwrap().team_members, vec![b.id.clone()]);
    assert!(projects.get(&project.id).await.unwrap().team_members.is_empty());

    // deleting a parent leaves its children alone
    groups.delete(&group.id).await.unwrap();
    let b = members.get(&b.id).await.unwrap();
    assert!(b.team_groups.is_empty());
    assert!(projects.get(&project.id).await.unwrap().team_groups.is_empty());
    assert!(
        store
            .list_children(JunctionTable::TeamGroupTeamMember, &group.id)
            .await
            .unwrap()
            .is_empty()
    );
}

pub(crate) async fn deleting_client_keeps_projects(store: &Store) {
    let clients = store.repository::<Client>().await.unwrap();
    let client = clients
        .add(Client {
            name: "Acme".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    let projects = store.repository::<Project>().await.unwrap();
    let project = projects
        .add(Project {
            name: "P".into(),
            client_id: Some(client.id.clone()),
            ..Default::default()
        })
        .await
        .unwrap();

    clients.delete(&client.id).await.unwrap();
    let project = projects.get(&project.id).await.unwrap();
    assert_eq!(project.client_id, Some(client.id));
}

pub(crate) async fn references_are_validated(store: &Store) {
    let workspace = add_workspace(store, "W1").await;
    let projects = store.repository::<Project>().await.unwrap();

    let err = projects
        .add(Project {
            name: "wrong kind".into(),
            client_id: Some(workspace.id.clone()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err.root(), Error::InvalidReference { column, .. } if column == "client_id"));

    let err = projects
        .add(Project {
            name: "dangling".into(),
            workspace_id: Some("w_nope".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err.root(), Error::InvalidReference { .. }));
    assert!(projects.get_all().await.unwrap().is_empty());

    // a failed relation update leaves the previous links untouched
    let member = add_member(store, &workspace, 1.0).await;
    let project = projects
        .add(Project {
            name: "P".into(),
            team_members: vec![member.id.clone()],
            ..Default::default()
        })
        .await
        .unwrap();
    let err = projects
        .update(
            &project.id,
            fields! { "name" => "renamed", "team_members" => "tm_ghost" },
        )
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);

    let project = projects.get(&project.id).await.unwrap();
    assert_eq!(project.name, "P");
    assert_eq!(project.team_members, vec![member.id]);
}

pub(crate) async fn duplicate_identities_are_rejected(store: &Store) {
    let users = store.users().await.unwrap();
    let first = users
        .add(User {
            name: "A".into(),
            email: "a@example.com".into(),
            username: "alpha".into(),
            password: "pw".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    let err = users
        .add(User {
            email: "a@example.com".into(),
            username: "other".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err.root(), Error::DuplicateIdentity(_)));
    assert_eq!(err.status_code(), 400);
    assert!(err.to_string().starts_with("AddUser: "));

    let second = users
        .add(User {
            email: "b@example.com".into(),
            username: "beta".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    let err = users
        .update(&second.id, fields! { "username" => "alpha" })
        .await
        .unwrap_err();
    assert!(matches!(err.root(), Error::DuplicateIdentity(_)));

    // rewriting your own value is not a conflict
    users
        .update(&first.id, fields! { "username" => "alpha", "name" => "A2" })
        .await
        .unwrap();

    let workspace = add_workspace(store, "W1").await;
    let members = store.repository::<TeamMember>().await.unwrap();
    let member = TeamMember {
        workspace_id: Some(workspace.id.clone()),
        user_id: Some(first.id.clone()),
        ..Default::default()
    };
    members.add(member.clone()).await.unwrap();
    let err = members.add(member).await.unwrap_err();
    assert!(matches!(err.root(), Error::DuplicateIdentity(_)));
}

pub(crate) async fn login_by_email_or_username(store: &Store) {
    let users = store.users().await.unwrap();
    let user = users
        .add(User {
            name: "User".into(),
            email: "user@x.com".into(),
            username: "userx".into(),
            password: "Secret".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(users.check_login("user@x.com", "secret").await.unwrap(), user);
    assert_eq!(users.check_login("userx", "SECRET").await.unwrap(), user);

    let err = users.check_login("user@x.com", "wrong").await.unwrap_err();
    assert!(matches!(err.root(), Error::InvalidCredentials));
    assert_eq!(err.status_code(), 401);

    let err = users.check_login("nobody@x.com", "secret").await.unwrap_err();
    assert_eq!(err.status_code(), 401);

    assert_eq!(users.find_by_identity("userx").await.unwrap(), Some(user));
    assert_eq!(users.find_by_identity("user@y.com").await.unwrap(), None);
}

pub(crate) async fn attach_adds_without_replacing(store: &Store) {
    let workspace = add_workspace(store, "W1").await;
    let member = add_member(store, &workspace, 1.0).await;
    let groups = store.repository::<TeamGroup>().await.unwrap();
    let g1 = groups.add(TeamGroup { name: "g1".into(), ..Default::default() }).await.unwrap();
    let g2 = groups.add(TeamGroup { name: "g2".into(), ..Default::default() }).await.unwrap();

    let members = store.repository::<TeamMember>().await.unwrap();
    members
        .attach(&member.id, "team_groups", &[g1.id.clone()])
        .await
        .unwrap();
    let member = members
        .attach(&member.id, "team_groups", &[g2.id.clone(), g1.id.clone()])
        .await
        .unwrap();
    assert_eq!(set(member.team_groups), set([g1.id.clone(), g2.id.clone()]));
    assert_eq!(groups.get(&g1.id).await.unwrap().team_members, vec![member.id.clone()]);

    let err = members
        .attach(&member.id, "tags", &[])
        .await
        .unwrap_err();
    assert!(matches!(err.root(), Error::Validation(_)));
    assert!(err.to_string().starts_with("AddTeamMemberTags: "));
}

pub(crate) async fn entities_serialize_for_the_http_layer(store: &Store) {
    let workspace = add_workspace(store, "W1").await;
    let json = serde_json::to_value(&workspace).unwrap();
    assert_eq!(json["_id"], serde_json::json!(workspace.id));
    assert_eq!(json["name"], "W1");
}

pub(crate) async fn nanosecond_timestamps_round_trip(store: &Store) {
    let start = Utc.with_ymd_and_hms(2024, 11, 2, 7, 15, 0).unwrap()
        + Duration::nanoseconds(123_456_789);
    let tasks = store.repository::<Task>().await.unwrap();
    let task = tasks
        .add(Task {
            description: "fine grained".into(),
            start_time: start,
            end_time: start + Duration::nanoseconds(1),
            date: start,
            ..Default::default()
        })
        .await
        .unwrap();

    let fetched = tasks.get(&task.id).await.unwrap();
    assert_eq!(fetched, task);
    assert_eq!(fetched.start_time, start);
    assert_eq!(fetched.end_time - fetched.start_time, Duration::nanoseconds(1));

    // the stored text is what filters compare against
    let by_start = tasks
        .get_with_filters(&fields! { "start_time" => start })
        .await
        .unwrap();
    assert_eq!(by_start, vec![task]);
}

pub(crate) async fn empty_reference_clears_it(store: &Store) {
    let workspace = add_workspace(store, "W1").await;
    let projects = store.repository::<Project>().await.unwrap();
    let project = projects
        .add(Project {
            name: "P1".into(),
            workspace_id: Some(workspace.id.clone()),
            ..Default::default()
        })
        .await
        .unwrap();

    let cleared = projects
        .update(&project.id, fields! { "workspace_id" => "" })
        .await
        .unwrap();
    assert_eq!(cleared.workspace_id, None);
    assert_eq!(projects.get(&project.id).await.unwrap().workspace_id, None);

    let unassigned = projects
        .get_with_filters(&fields! { "workspace_id" => "" })
        .await
        .unwrap();
    assert_eq!(unassigned, vec![cleared]);
    assert!(
        projects
            .get_with_filters(&fields! { "workspace_id" => workspace.id.as_str() })
            .await
            .unwrap()
            .is_empty()
    );
}

pub(crate) async fn child_side_relation_update(store: &Store) {
    let workspace = add_workspace(store, "W1").await;
    let member = add_member(store, &workspace, 5.0).await;
    let groups = store.repository::<TeamGroup>().await.unwrap();
    let g1 = groups.add(TeamGroup { name: "g1".into(), ..Default::default() }).await.unwrap();
    let g2 = groups.add(TeamGroup { name: "g2".into(), ..Default::default() }).await.unwrap();
    let g3 = groups.add(TeamGroup { name: "g3".into(), ..Default::default() }).await.unwrap();

    let members = store.repository::<TeamMember>().await.unwrap();
    let member = members
        .update(
            &member.id,
            fields! { "team_groups" => format!("{},{}", g1.id, g2.id) },
        )
        .await
        .unwrap();
    assert_eq!(set(member.team_groups.clone()), set([g1.id.clone(), g2.id.clone()]));

    let member = members
        .update(&member.id, fields! { "team_groups" => g3.id.as_str() })
        .await
        .unwrap();
    assert_eq!(member.team_groups, vec![g3.id.clone()]);
    assert!(groups.get(&g1.id).await.unwrap().team_members.is_empty());
    assert!(groups.get(&g2.id).await.unwrap().team_members.is_empty());
    assert_eq!(groups.get(&g3.id).await.unwrap().team_members, vec![member.id.clone()]);
    assert_eq!(
        store
            .list_children(JunctionTable::TeamGroupTeamMember, &g3.id)
            .await
            .unwrap(),
        vec![member.id.clone()]
    );
}

pub(crate) async fn expanded_reads_follow_links(store: &Store) {
    let workspace = add_workspace(store, "W1").await;
    let client = store
        .repository::<Client>()
        .await
        .unwrap()
        .add(Client { name: "Acme".into(), ..Default::default() })
        .await
        .unwrap();
    let member = add_member(store, &workspace, 30.0).await;
    let group = store
        .repository::<TeamGroup>()
        .await
        .unwrap()
        .add(TeamGroup {
            name: "Core".into(),
            team_members: vec![member.id.clone()],
            ..Default::default()
        })
        .await
        .unwrap();
    let member = store
        .repository::<TeamMember>()
        .await
        .unwrap()
        .get(&member.id)
        .await
        .unwrap();

    let projects = store.repository::<Project>().await.unwrap();
    let project = projects
        .add(Project {
            name: "P1".into(),
            client_id: Some(client.id.clone()),
            workspace_id: Some(workspace.id.clone()),
            team_members: vec![member.id.clone()],
            team_groups: vec![group.id.clone()],
            ..Default::default()
        })
        .await
        .unwrap();

    let expanded = projects.get_expanded(&project.id).await.unwrap();
    assert_eq!(expanded.entity, project);
    assert_eq!(expanded.references["client_id"], AnyEntity::Client(client.clone()));
    assert_eq!(
        expanded.references["workspace_id"],
        AnyEntity::Workspace(workspace.clone())
    );
    assert_eq!(
        expanded.related["team_members"],
        vec![AnyEntity::TeamMember(member.clone())]
    );
    assert_eq!(expanded.related["team_groups"], vec![AnyEntity::TeamGroup(group)]);

    let json = serde_json::to_value(&expanded).unwrap();
    assert_eq!(json["_id"], serde_json::json!(project.id));
    assert_eq!(json["references"]["client_id"]["name"], "Acme");

    // a deleted client drops out of the expansion but the id stays on the row
    store
        .repository::<Client>()
        .await
        .unwrap()
        .delete(&client.id)
        .await
        .unwrap();
    let listed = projects
        .get_with_filters_expanded(&fields! { "workspace_id" => workspace.id.as_str() })
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].entity.client_id, Some(client.id.clone()));
    assert!(!listed[0].references.contains_key("client_id"));
    assert_eq!(listed[0].references["workspace_id"].id(), workspace.id);

    let err = projects.get_expanded("p_missing").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().starts_with("GetProjectExpanded: "));
}
