//! Entity repositories.
//!
//! [`Repository`] composes the statement builder and the junction manager
//! into the six CRUD operations for any [`Entity`]. Every write runs inside
//! one transaction; reads use a plain pooled connection. [`Expanded`] reads
//! also load the entities behind references and relations.

use std::{collections::BTreeMap, marker::PhantomData, ops::Deref, sync::Arc};

use serde::Serialize;

use crate::{
    adapters::{Adapter, Session},
    entity::{
        AnyEntity, Client, Entity, Project, Relation, Side, Tag, Task, TeamGroup, TeamMember,
        TeamRole, User, Workspace,
    },
    error::{Error, ResultExt},
    fields,
    junction::JunctionManager,
    schema::{ColumnType, EntityKind, ID_COLUMN, JunctionTable},
    statement::{StatementBuilder, coerce},
    value::{FieldMap, Value},
};

/// An entity together with the rows its references and relations point at.
/// Ids that no longer resolve are left out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expanded<E> {
    #[serde(flatten)]
    pub entity: E,
    /// Keyed by reference column, e.g. `client_id`.
    pub references: BTreeMap<&'static str, AnyEntity>,
    /// Keyed by relation, e.g. `team_members`.
    pub related: BTreeMap<&'static str, Vec<AnyEntity>>,
}

pub struct Repository<E: Entity> {
    adapter: Arc<dyn Adapter>,
    builder: StatementBuilder,
    junctions: JunctionManager,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            adapter: Arc::clone(&self.adapter),
            builder: self.builder,
            junctions: self.junctions,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Repository<E> {
    pub fn new(adapter: Arc<dyn Adapter>) -> Self {
        let builder = adapter.builder();
        Self {
            adapter,
            builder,
            junctions: JunctionManager::new(builder),
            _entity: PhantomData,
        }
    }

    fn op(verb: &str) -> String {
        format!("{}{}", verb, E::KIND.type_name())
    }

    /// Assigns a fresh id, inserts the row and links every related id.
    pub async fn add(&self, entity: E) -> Result<E, Error> {
        self.add_inner(entity).await.context(Self::op("Add"))
    }

    async fn add_inner(&self, mut entity: E) -> Result<E, Error> {
        entity.set_id(E::KIND.new_id());
        let values = entity.field_map();

        let mut session = self.adapter.begin().await?;
        self.ensure_unique(session.as_mut(), entity.id(), &values, None)
            .await?;
        self.ensure_references(session.as_mut(), &values).await?;

        session
            .execute(&self.builder.insert_entity(&entity)?)
            .await?;

        for relation in E::RELATIONS {
            let ids = entity.related(relation.key).to_vec();
            self.link(session.as_mut(), relation, entity.id(), &ids)
                .await?;
        }

        session.commit().await?;
        tracing::info!(kind = %E::KIND, id = entity.id(), "added");
        Ok(entity)
    }

    /// Fetches one entity with its relation fields hydrated.
    pub async fn get(&self, id: &str) -> Result<E, Error> {
        self.get_inner(id).await.context(Self::op("Get"))
    }

    async fn get_inner(&self, id: &str) -> Result<E, Error> {
        let mut session = self.adapter.acquire().await?;
        let mut found = self
            .read(session.as_mut(), &fields! { ID_COLUMN => id })
            .await?;

        if found.len() > 1 {
            tracing::warn!(kind = %E::KIND, id, rows = found.len(), "duplicate id rows");
        }
        if found.is_empty() {
            return Err(Error::NotFound {
                kind: E::KIND,
                id: id.to_string(),
            });
        }
        Ok(found.swap_remove(0))
    }

    pub async fn get_all(&self) -> Result<Vec<E>, Error> {
        self.get_with_filters_inner(&FieldMap::new())
            .await
            .context(format!("GetAll{}s", E::KIND.type_name()))
    }

    /// Conjunctive equality filters over persisted columns. An empty map
    /// returns every row.
    pub async fn get_with_filters(&self, filters: &FieldMap) -> Result<Vec<E>, Error> {
        self.get_with_filters_inner(filters)
            .await
            .context(format!("Get{}sWithFilters", E::KIND.type_name()))
    }

    async fn get_with_filters_inner(&self, filters: &FieldMap) -> Result<Vec<E>, Error> {
        let mut session = self.adapter.acquire().await?;
        self.read(session.as_mut(), filters).await
    }

    /// Like [`get`](Self::get), with referenced and related entities loaded.
    pub async fn get_expanded(&self, id: &str) -> Result<Expanded<E>, Error> {
        self.get_expanded_inner(id)
            .await
            .context(format!("Get{}Expanded", E::KIND.type_name()))
    }

    async fn get_expanded_inner(&self, id: &str) -> Result<Expanded<E>, Error> {
        let entity = self.get_inner(id).await?;
        let mut session = self.adapter.acquire().await?;
        self.expand(session.as_mut(), entity).await
    }

    pub async fn get_with_filters_expanded(
        &self,
        filters: &FieldMap,
    ) -> Result<Vec<Expanded<E>>, Error> {
        self.get_with_filters_expanded_inner(filters)
            .await
            .context(format!("Get{}sWithFiltersExpanded", E::KIND.type_name()))
    }

    async fn get_with_filters_expanded_inner(
        &self,
        filters: &FieldMap,
    ) -> Result<Vec<Expanded<E>>, Error> {
        let mut session = self.adapter.acquire().await?;
        let entities = self.read(session.as_mut(), filters).await?;

        let mut expanded = Vec::with_capacity(entities.len());
        for entity in entities {
            expanded.push(self.expand(session.as_mut(), entity).await?);
        }
        Ok(expanded)
    }

    /// Applies a partial update. Relation keys replace the whole relation;
    /// the remaining keys update columns. An empty map changes nothing.
    pub async fn update(&self, id: &str, updates: FieldMap) -> Result<E, Error> {
        self.update_inner(id, updates)
            .await
            .context(Self::op("Update"))
    }

    async fn update_inner(&self, id: &str, mut updates: FieldMap) -> Result<E, Error> {
        let mut relations = Vec::new();
        for relation in E::RELATIONS {
            if let Some(value) = updates.remove(relation.key) {
                relations.push((relation, parse_id_list(relation.key, value)?));
            }
        }

        let mut session = self.adapter.begin().await?;
        let current = self.fetch_one(session.as_mut(), id).await?;

        if updates.contains_key(ID_COLUMN) {
            return Err(Error::Validation(format!(
                "{} of {} cannot change",
                ID_COLUMN,
                E::KIND
            )));
        }
        for (name, value) in updates.iter_mut() {
            if let Some(column) = E::KIND.table().column(name) {
                *value = coerce(column.name, column.ty, value.clone())?;
            }
        }
        self.ensure_references(session.as_mut(), &updates).await?;

        let mut merged = current.field_map();
        merged.extend(updates.clone());
        self.ensure_unique(session.as_mut(), id, &merged, Some(&updates))
            .await?;

        if let Some(statement) = self.builder.update(E::KIND.table(), id, &updates)? {
            session.execute(&statement).await?;
        }

        for (relation, ids) in &relations {
            self.replace(session.as_mut(), relation, id, ids).await?;
        }

        session.commit().await?;
        if !updates.is_empty() || !relations.is_empty() {
            tracing::info!(kind = %E::KIND, id, "updated");
        }

        self.get(id).await
    }

    /// Deletes the row and every junction link that mentions it. Entities
    /// that reference it are left alone.
    pub async fn delete(&self, id: &str) -> Result<(), Error> {
        self.delete_inner(id).await.context(Self::op("Delete"))
    }

    async fn delete_inner(&self, id: &str) -> Result<(), Error> {
        let mut session = self.adapter.begin().await?;
        let deleted = session
            .execute(
                &self
                    .builder
                    .delete(E::KIND.table(), &fields! { ID_COLUMN => id })?,
            )
            .await?;
        if deleted == 0 {
            return Err(Error::NotFound {
                kind: E::KIND,
                id: id.to_string(),
            });
        }

        for junction in JunctionTable::ALL {
            if junction.parent_kind() == E::KIND {
                self.junctions
                    .remove_parent(session.as_mut(), junction, id)
                    .await?;
            }
            if junction.child_kind() == E::KIND {
                self.junctions
                    .remove_child(session.as_mut(), junction, id)
                    .await?;
            }
        }

        session.commit().await?;
        tracing::info!(kind = %E::KIND, id, "deleted");
        Ok(())
    }

    /// Adds links on relation `key` without dropping existing ones.
    pub async fn attach(&self, id: &str, key: &str, ids: &[String]) -> Result<E, Error> {
        self.attach_inner(id, key, ids)
            .await
            .context(format!("Add{}{}", E::KIND.type_name(), relation_label(key)))
    }

    async fn attach_inner(&self, id: &str, key: &str, ids: &[String]) -> Result<E, Error> {
        let relation = E::relation(key).ok_or_else(|| {
            Error::Validation(format!("{} has no relation {}", E::KIND, key))
        })?;

        let mut session = self.adapter.begin().await?;
        self.fetch_one(session.as_mut(), id).await?;
        self.link(session.as_mut(), relation, id, ids).await?;
        session.commit().await?;

        self.get(id).await
    }

    async fn read(&self, session: &mut dyn Session, filters: &FieldMap) -> Result<Vec<E>, Error> {
        let table = E::KIND.table();
        let records = session
            .fetch_all(&self.builder.select(table, filters)?, table)
            .await?;

        let mut entities = Vec::with_capacity(records.len());
        for record in &records {
            let mut entity = E::from_record(record)?;
            self.hydrate(session, &mut entity).await?;
            entities.push(entity);
        }
        Ok(entities)
    }

    async fn hydrate<O: Entity>(
        &self,
        session: &mut dyn Session,
        entity: &mut O,
    ) -> Result<(), Error> {
        for relation in O::RELATIONS {
            let ids = match relation.side {
                Side::Parent => {
                    self.junctions
                        .list_children(session, relation.junction, entity.id())
                        .await?
                }
                Side::Child => {
                    self.junctions
                        .list_parents(session, relation.junction, entity.id())
                        .await?
                }
            };
            entity.set_related(relation.key, ids);
        }
        Ok(())
    }

    async fn expand(&self, session: &mut dyn Session, entity: E) -> Result<Expanded<E>, Error> {
        let values = entity.field_map();

        let mut references = BTreeMap::new();
        for column in E::KIND.table().columns {
            let ColumnType::Ref(kind) = column.ty else {
                continue;
            };
            let Some(Value::Text(id)) = values.get(column.name) else {
                continue;
            };
            match self.load_any(session, kind, id).await? {
                Some(found) => {
                    references.insert(column.name, found);
                }
                None => {
                    tracing::debug!(kind = %E::KIND, column = column.name, id = %id, "dangling reference");
                }
            }
        }

        let mut related = BTreeMap::new();
        for relation in E::RELATIONS {
            let mut loaded = Vec::new();
            for other in entity.related(relation.key) {
                if let Some(found) = self.load_any(session, relation.other_kind(), other).await? {
                    loaded.push(found);
                }
            }
            related.insert(relation.key, loaded);
        }

        Ok(Expanded {
            entity,
            references,
            related,
        })
    }

    async fn load_any(
        &self,
        session: &mut dyn Session,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<AnyEntity>, Error> {
        if !kind.owns_id(id) {
            return Ok(None);
        }
        Ok(match kind {
            EntityKind::User => self.load::<User>(session, id).await?.map(AnyEntity::User),
            EntityKind::Workspace => self
                .load::<Workspace>(session, id)
                .await?
                .map(AnyEntity::Workspace),
            EntityKind::Client => self.load::<Client>(session, id).await?.map(AnyEntity::Client),
            EntityKind::Project => self
                .load::<Project>(session, id)
                .await?
                .map(AnyEntity::Project),
            EntityKind::Tag => self.load::<Tag>(session, id).await?.map(AnyEntity::Tag),
            EntityKind::Task => self.load::<Task>(session, id).await?.map(AnyEntity::Task),
            EntityKind::TeamRole => self
                .load::<TeamRole>(session, id)
                .await?
                .map(AnyEntity::TeamRole),
            EntityKind::TeamGroup => self
                .load::<TeamGroup>(session, id)
                .await?
                .map(AnyEntity::TeamGroup),
            EntityKind::TeamMember => self
                .load::<TeamMember>(session, id)
                .await?
                .map(AnyEntity::TeamMember),
        })
    }

    async fn load<O: Entity>(
        &self,
        session: &mut dyn Session,
        id: &str,
    ) -> Result<Option<O>, Error> {
        let table = O::KIND.table();
        let statement = self.builder.select(table, &fields! { ID_COLUMN => id })?;
        let Some(record) = session.fetch_all(&statement, table).await?.into_iter().next() else {
            return Ok(None);
        };
        let mut entity = O::from_record(&record)?;
        self.hydrate(session, &mut entity).await?;
        Ok(Some(entity))
    }

    /// Unhydrated row, or `NotFound`.
    async fn fetch_one(&self, session: &mut dyn Session, id: &str) -> Result<E, Error> {
        let table = E::KIND.table();
        let statement = self.builder.select(table, &fields! { ID_COLUMN => id })?;
        let record = session
            .fetch_all(&statement, table)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound {
                kind: E::KIND,
                id: id.to_string(),
            })?;
        E::from_record(&record)
    }

    async fn link(
        &self,
        session: &mut dyn Session,
        relation: &Relation,
        id: &str,
        ids: &[String],
    ) -> Result<(), Error> {
        for other in ids {
            ensure_exists(self.builder, session, relation.key, relation.other_kind(), other)
                .await?;
            match relation.side {
                Side::Parent => {
                    self.junctions
                        .add(session, relation.junction, id, other)
                        .await?
                }
                Side::Child => {
                    self.junctions
                        .add(session, relation.junction, other, id)
                        .await?
                }
            };
        }
        Ok(())
    }

    async fn replace(
        &self,
        session: &mut dyn Session,
        relation: &Relation,
        id: &str,
        ids: &[String],
    ) -> Result<(), Error> {
        for other in ids {
            ensure_exists(self.builder, session, relation.key, relation.other_kind(), other)
                .await?;
        }
        match relation.side {
            Side::Parent => {
                self.junctions
                    .replace_all(session, relation.junction, id, ids)
                    .await
            }
            Side::Child => {
                self.junctions
                    .replace_parents(session, relation.junction, id, ids)
                    .await
            }
        }
    }

    /// Every non-null reference column must name an existing entity of the
    /// referenced kind.
    async fn ensure_references(
        &self,
        session: &mut dyn Session,
        values: &FieldMap,
    ) -> Result<(), Error> {
        for (name, value) in values {
            let Some(column) = E::KIND.table().column(name) else {
                continue;
            };
            let ColumnType::Ref(kind) = column.ty else {
                continue;
            };
            match value {
                Value::Null => {}
                Value::Text(id) => {
                    ensure_exists(self.builder, session, column.name, kind, id).await?
                }
                other => {
                    return Err(Error::UnsupportedValueType {
                        column: name.clone(),
                        found: other.type_name(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Checks each uniqueness group against rows other than `id`. With
    /// `changed`, only groups touching a changed column are checked.
    async fn ensure_unique(
        &self,
        session: &mut dyn Session,
        id: &str,
        values: &FieldMap,
        changed: Option<&FieldMap>,
    ) -> Result<(), Error> {
        let table = E::KIND.table();
        for group in E::UNIQUE {
            if let Some(changed) = changed {
                if !group.iter().any(|column| changed.contains_key(*column)) {
                    continue;
                }
            }

            let mut filters = FieldMap::new();
            for column in group.iter() {
                match values.get(*column) {
                    Some(value) if !value.is_null() => {
                        filters.insert(column.to_string(), value.clone());
                    }
                    _ => break,
                }
            }
            if filters.len() != group.len() {
                continue;
            }

            let taken = session
                .fetch_all(&self.builder.select(table, &filters)?, table)
                .await?
                .iter()
                .any(|record| record.text(ID_COLUMN).is_ok_and(|other| other != id));
            if taken {
                return Err(Error::DuplicateIdentity(format!(
                    "{} with this {} already exists",
                    E::KIND,
                    group.join(" and ")
                )));
            }
        }
        Ok(())
    }
}

async fn ensure_exists(
    builder: StatementBuilder,
    session: &mut dyn Session,
    column: &str,
    kind: EntityKind,
    id: &str,
) -> Result<(), Error> {
    let invalid = || Error::InvalidReference {
        column: column.to_string(),
        id: id.to_string(),
    };
    if !kind.owns_id(id) {
        return Err(invalid());
    }

    let table = kind.table();
    let rows = session
        .fetch_all(&builder.select(table, &fields! { ID_COLUMN => id })?, table)
        .await?;
    if rows.is_empty() {
        return Err(invalid());
    }
    Ok(())
}

/// Relation update values: comma separated text, a list of texts, or null
/// for "no links".
fn parse_id_list(key: &str, value: Value) -> Result<Vec<String>, Error> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Text(text) => Ok(text
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()),
        Value::List(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Text(id) => Ok(id.trim().to_string()),
                other => Err(Error::UnsupportedValueType {
                    column: key.to_string(),
                    found: other.type_name(),
                }),
            })
            .filter(|id| !matches!(id, Ok(id) if id.is_empty()))
            .collect(),
        other => Err(Error::UnsupportedValueType {
            column: key.to_string(),
            found: other.type_name(),
        }),
    }
}

/// `team_groups` -> `TeamGroups`
fn relation_label(key: &str) -> String {
    key.split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// User repository with the login lookups used by the auth layer.
#[derive(Clone)]
pub struct UserRepository {
    inner: Repository<User>,
}

impl UserRepository {
    pub fn new(adapter: Arc<dyn Adapter>) -> Self {
        Self {
            inner: Repository::new(adapter),
        }
    }

    /// Looks a user up by email when `identity` contains `@`, by username
    /// otherwise.
    pub async fn find_by_identity(&self, identity: &str) -> Result<Option<User>, Error> {
        let column = if identity.contains('@') {
            "email"
        } else {
            "username"
        };
        let users = self
            .inner
            .get_with_filters_inner(&fields! { column => identity })
            .await
            .context("GetUserWithIdentity")?;
        Ok(users.into_iter().next())
    }

    /// Case-insensitive password match. Unknown identities and wrong
    /// passwords fail the same way.
    pub async fn check_login(&self, identity: &str, password: &str) -> Result<User, Error> {
        let user = self
            .find_by_identity(identity)
            .await
            .context("CheckUserLogin")?;

        match user {
            Some(user) if user.password.to_lowercase() == password.to_lowercase() => Ok(user),
            _ => Err(Error::InvalidCredentials).context("CheckUserLogin"),
        }
    }
}

impl Deref for UserRepository {
    type Target = Repository<User>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
