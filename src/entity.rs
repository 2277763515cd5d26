//! Domain entities and their persisted shape.
//!
//! Each entity lists its columns explicitly: [`Entity::values`] yields one
//! value per registered column, in registry order, and
//! [`Entity::from_record`] reads them back by name. Relation lists are not
//! columns; they live in junction tables and are described by
//! [`Entity::RELATIONS`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    adapters::Record,
    error::Error,
    schema::{EntityKind, ID_COLUMN, JunctionTable},
    value::{FieldMap, ToValue, Value},
};

/// Which end of a junction table an entity sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Parent,
    Child,
}

/// A many-to-many relation field backed by a junction table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    /// Field name, also accepted as an update key.
    pub key: &'static str,
    pub junction: JunctionTable,
    pub side: Side,
}

impl Relation {
    /// Junction column holding the owning entity's id.
    pub fn own_column(&self) -> &'static str {
        match self.side {
            Side::Parent => self.junction.parent_column(),
            Side::Child => self.junction.child_column(),
        }
    }

    /// Junction column holding the related ids.
    pub fn other_column(&self) -> &'static str {
        match self.side {
            Side::Parent => self.junction.child_column(),
            Side::Child => self.junction.parent_column(),
        }
    }

    pub fn other_kind(&self) -> EntityKind {
        match self.side {
            Side::Parent => self.junction.child_kind(),
            Side::Child => self.junction.parent_kind(),
        }
    }
}

pub trait Entity: Clone + Send + Sync + Sized + 'static {
    const KIND: EntityKind;

    const RELATIONS: &'static [Relation] = &[];

    /// Column groups whose combined values must be unique across the table.
    const UNIQUE: &'static [&'static [&'static str]] = &[];

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    /// One value per registered column, in column order.
    fn values(&self) -> Vec<Value>;

    fn from_record(record: &Record) -> Result<Self, Error>;

    fn related(&self, _key: &str) -> &[String] {
        &[]
    }

    fn set_related(&mut self, _key: &str, _ids: Vec<String>) {}

    fn relation(key: &str) -> Option<&'static Relation> {
        Self::RELATIONS.iter().find(|r| r.key == key)
    }

    /// Persisted columns as a map, keyed by column name.
    fn field_map(&self) -> FieldMap {
        Self::KIND
            .table()
            .columns
            .iter()
            .zip(self.values())
            .map(|(column, value)| (column.name.to_string(), value))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub username: String,
    pub password: String,
}

impl Entity for User {
    const KIND: EntityKind = EntityKind::User;
    const UNIQUE: &'static [&'static [&'static str]] = &[&["email"], &["username"]];

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.id.to_value(),
            self.name.to_value(),
            self.email.to_value(),
            self.username.to_value(),
            self.password.to_value(),
        ]
    }

    fn from_record(record: &Record) -> Result<Self, Error> {
        Ok(Self {
            id: record.text(ID_COLUMN)?,
            name: record.text("name")?,
            email: record.text("email")?,
            username: record.text("username")?,
            password: record.text("password")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Workspace {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

impl Entity for Workspace {
    const KIND: EntityKind = EntityKind::Workspace;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn values(&self) -> Vec<Value> {
        vec![self.id.to_value(), self.name.to_value()]
    }

    fn from_record(record: &Record) -> Result<Self, Error> {
        Ok(Self {
            id: record.text(ID_COLUMN)?,
            name: record.text("name")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Client {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub address: String,
    pub note: String,
    pub is_archived: bool,
}

impl Entity for Client {
    const KIND: EntityKind = EntityKind::Client;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.id.to_value(),
            self.name.to_value(),
            self.address.to_value(),
            self.note.to_value(),
            self.is_archived.to_value(),
        ]
    }

    fn from_record(record: &Record) -> Result<Self, Error> {
        Ok(Self {
            id: record.text(ID_COLUMN)?,
            name: record.text("name")?,
            address: record.text("address")?,
            note: record.text("note")?,
            is_archived: record.bool("is_archived")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub color_tag: String,
    pub is_public: bool,
    pub tracked_hours: f64,
    pub tracked_amount: f64,
    pub progress_percentage: f64,
    pub client_id: Option<String>,
    pub workspace_id: Option<String>,
    pub team_members: Vec<String>,
    pub team_groups: Vec<String>,
}

impl Entity for Project {
    const KIND: EntityKind = EntityKind::Project;
    const RELATIONS: &'static [Relation] = &[
        Relation {
            key: "team_members",
            junction: JunctionTable::ProjectTeamMember,
            side: Side::Parent,
        },
        Relation {
            key: "team_groups",
            junction: JunctionTable::ProjectTeamGroup,
            side: Side::Parent,
        },
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.id.to_value(),
            self.name.to_value(),
            self.color_tag.to_value(),
            self.is_public.to_value(),
            self.tracked_hours.to_value(),
            self.tracked_amount.to_value(),
            self.progress_percentage.to_value(),
            self.client_id.to_value(),
            self.workspace_id.to_value(),
        ]
    }

    fn from_record(record: &Record) -> Result<Self, Error> {
        Ok(Self {
            id: record.text(ID_COLUMN)?,
            name: record.text("name")?,
            color_tag: record.text("color_tag")?,
            is_public: record.bool("is_public")?,
            tracked_hours: record.float("tracked_hours")?,
            tracked_amount: record.float("tracked_amount")?,
            progress_percentage: record.float("progress_percentage")?,
            client_id: record.reference("client_id")?,
            workspace_id: record.reference("workspace_id")?,
            team_members: Vec::new(),
            team_groups: Vec::new(),
        })
    }

    fn related(&self, key: &str) -> &[String] {
        match key {
            "team_members" => &self.team_members,
            "team_groups" => &self.team_groups,
            _ => &[],
        }
    }

    fn set_related(&mut self, key: &str, ids: Vec<String>) {
        match key {
            "team_members" => self.team_members = ids,
            "team_groups" => self.team_groups = ids,
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tag {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

impl Entity for Tag {
    const KIND: EntityKind = EntityKind::Tag;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn values(&self) -> Vec<Value> {
        vec![self.id.to_value(), self.name.to_value()]
    }

    fn from_record(record: &Record) -> Result<Self, Error> {
        Ok(Self {
            id: record.text(ID_COLUMN)?,
            name: record.text("name")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Task {
    #[serde(rename = "_id")]
    pub id: String,
    pub description: String,
    pub billable: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub date: DateTime<Utc>,
    pub is_active: bool,
    pub project_id: Option<String>,
    pub tags: Vec<String>,
}

impl Entity for Task {
    const KIND: EntityKind = EntityKind::Task;
    const RELATIONS: &'static [Relation] = &[Relation {
        key: "tags",
        junction: JunctionTable::TaskTag,
        side: Side::Parent,
    }];

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.id.to_value(),
            self.description.to_value(),
            self.billable.to_value(),
            self.start_time.to_value(),
            self.end_time.to_value(),
            self.date.to_value(),
            self.is_active.to_value(),
            self.project_id.to_value(),
        ]
    }

    fn from_record(record: &Record) -> Result<Self, Error> {
        Ok(Self {
            id: record.text(ID_COLUMN)?,
            description: record.text("description")?,
            billable: record.bool("billable")?,
            start_time: record.timestamp("start_time")?,
            end_time: record.timestamp("end_time")?,
            date: record.timestamp("date")?,
            is_active: record.bool("is_active")?,
            project_id: record.reference("project_id")?,
            tags: Vec::new(),
        })
    }

    fn related(&self, key: &str) -> &[String] {
        match key {
            "tags" => &self.tags,
            _ => &[],
        }
    }

    fn set_related(&mut self, key: &str, ids: Vec<String>) {
        if key == "tags" {
            self.tags = ids;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamRole {
    #[serde(rename = "_id")]
    pub id: String,
    pub role: String,
}

impl Entity for TeamRole {
    const KIND: EntityKind = EntityKind::TeamRole;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn values(&self) -> Vec<Value> {
        vec![self.id.to_value(), self.role.to_value()]
    }

    fn from_record(record: &Record) -> Result<Self, Error> {
        Ok(Self {
            id: record.text(ID_COLUMN)?,
            role: record.text("role")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamGroup {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub workspace_id: Option<String>,
    pub team_members: Vec<String>,
}

impl Entity for TeamGroup {
    const KIND: EntityKind = EntityKind::TeamGroup;
    const RELATIONS: &'static [Relation] = &[Relation {
        key: "team_members",
        junction: JunctionTable::TeamGroupTeamMember,
        side: Side::Parent,
    }];

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.id.to_value(),
            self.name.to_value(),
            self.workspace_id.to_value(),
        ]
    }

    fn from_record(record: &Record) -> Result<Self, Error> {
        Ok(Self {
            id: record.text(ID_COLUMN)?,
            name: record.text("name")?,
            workspace_id: record.reference("workspace_id")?,
            team_members: Vec::new(),
        })
    }

    fn related(&self, key: &str) -> &[String] {
        match key {
            "team_members" => &self.team_members,
            _ => &[],
        }
    }

    fn set_related(&mut self, key: &str, ids: Vec<String>) {
        if key == "team_members" {
            self.team_members = ids;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamMember {
    #[serde(rename = "_id")]
    pub id: String,
    pub billable_rate: f64,
    pub workspace_id: Option<String>,
    pub user_id: Option<String>,
    pub team_role_id: Option<String>,
    pub team_groups: Vec<String>,
}

impl Entity for TeamMember {
    const KIND: EntityKind = EntityKind::TeamMember;
    const RELATIONS: &'static [Relation] = &[Relation {
        key: "team_groups",
        junction: JunctionTable::TeamGroupTeamMember,
        side: Side::Child,
    }];
    const UNIQUE: &'static [&'static [&'static str]] = &[&["workspace_id", "user_id"]];

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.id.to_value(),
            self.billable_rate.to_value(),
            self.workspace_id.to_value(),
            self.user_id.to_value(),
            self.team_role_id.to_value(),
        ]
    }

    fn from_record(record: &Record) -> Result<Self, Error> {
        Ok(Self {
            id: record.text(ID_COLUMN)?,
            billable_rate: record.float("billable_rate")?,
            workspace_id: record.reference("workspace_id")?,
            user_id: record.reference("user_id")?,
            team_role_id: record.reference("team_role_id")?,
            team_groups: Vec::new(),
        })
    }

    fn related(&self, key: &str) -> &[String] {
        match key {
            "team_groups" => &self.team_groups,
            _ => &[],
        }
    }

    fn set_related(&mut self, key: &str, ids: Vec<String>) {
        if key == "team_groups" {
            self.team_groups = ids;
        }
    }
}

/// An entity of any kind, as returned by reads that follow references
/// across tables. Serializes as the inner entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnyEntity {
    User(User),
    Workspace(Workspace),
    Client(Client),
    Project(Project),
    Tag(Tag),
    Task(Task),
    TeamRole(TeamRole),
    TeamGroup(TeamGroup),
    TeamMember(TeamMember),
}

impl AnyEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            AnyEntity::User(_) => EntityKind::User,
            AnyEntity::Workspace(_) => EntityKind::Workspace,
            AnyEntity::Client(_) => EntityKind::Client,
            AnyEntity::Project(_) => EntityKind::Project,
            AnyEntity::Tag(_) => EntityKind::Tag,
            AnyEntity::Task(_) => EntityKind::Task,
            AnyEntity::TeamRole(_) => EntityKind::TeamRole,
            AnyEntity::TeamGroup(_) => EntityKind::TeamGroup,
            AnyEntity::TeamMember(_) => EntityKind::TeamMember,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            AnyEntity::User(e) => e.id(),
            AnyEntity::Workspace(e) => e.id(),
            AnyEntity::Client(e) => e.id(),
            AnyEntity::Project(e) => e.id(),
            AnyEntity::Tag(e) => e.id(),
            AnyEntity::Task(e) => e.id(),
            AnyEntity::TeamRole(e) => e.id(),
            AnyEntity::TeamGroup(e) => e.id(),
            AnyEntity::TeamMember(e) => e.id(),
        }
    }
}
