#[cfg(test)]
use std::sync::Arc;

#[cfg(test)]
use super::*;
#[cfg(test)]
use trackstore::{Adapter, adapters::sqlite::SqliteAdapter};

#[cfg(test)]
async fn store() -> Store {
    let adapter = match SqliteAdapter::new_memory().await {
        Ok(adapter) => adapter,
        Err(err) => panic!("Failed to open SQLite: {}", err),
    };
    Store::from_adapter(Arc::new(adapter))
}

#[tokio::test]
async fn test_init_schema_is_idempotent() {
    let adapter = SqliteAdapter::new_memory().await.unwrap();

    if let Err(err) = adapter.init_schema().await {
        panic!("Error: {:#?}", err);
    }
    if let Err(err) = adapter.init_schema().await {
        panic!("Error: {:#?}", err);
    }
}

#[tokio::test]
async fn test_round_trip_every_kind() {
    round_trip_every_kind(&store().await).await;
}

#[tokio::test]
async fn test_project_team_member_lifecycle() {
    project_team_member_lifecycle(&store().await).await;
}

#[tokio::test]
async fn test_empty_update_changes_nothing() {
    empty_update_changes_nothing(&store().await).await;
}

#[tokio::test]
async fn test_scalar_and_relation_update() {
    scalar_and_relation_update(&store().await).await;
}

#[tokio::test]
async fn test_filters_track_adds_and_deletes() {
    filters_track_adds_and_deletes(&store().await).await;
}

#[tokio::test]
async fn test_null_and_conjunctive_filters() {
    null_and_conjunctive_filters(&store().await).await;
}

#[tokio::test]
async fn test_junction_add_is_idempotent() {
    junction_add_is_idempotent(&store().await).await;
}

#[tokio::test]
async fn test_replace_all_yields_exactly_new_children() {
    replace_all_yields_exactly_new_children(&store().await).await;
}

#[tokio::test]
async fn test_delete_cleans_both_junction_sides() {
    delete_cleans_both_junction_sides(&store().await).await;
}

#[tokio::test]
async fn test_deleting_client_keeps_projects() {
    deleting_client_keeps_projects(&store().await).await;
}

#[tokio::test]
async fn test_references_are_validated() {
    references_are_validated(&store().await).await;
}

#[tokio::test]
async fn test_duplicate_identities_are_rejected() {
    duplicate_identities_are_rejected(&store().await).await;
}

#[tokio::test]
async fn test_login_by_email_or_username() {
    login_by_email_or_username(&store().await).await;
}

#[tokio::test]
async fn test_attach_adds_without_replacing() {
    attach_adds_without_replacing(&store().await).await;
}

#[tokio::test]
async fn test_entities_serialize_for_the_http_layer() {
    entities_serialize_for_the_http_layer(&store().await).await;
}

#[tokio::test]
async fn test_nanosecond_timestamps_round_trip() {
    nanosecond_timestamps_round_trip(&store().await).await;
}

#[tokio::test]
async fn test_empty_reference_clears_it() {
    empty_reference_clears_it(&store().await).await;
}

#[tokio::test]
async fn test_child_side_relation_update() {
    child_side_relation_update(&store().await).await;
}

#[tokio::test]
async fn test_expanded_reads_follow_links() {
    expanded_reads_follow_links(&store().await).await;
}
