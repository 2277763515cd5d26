//! Schema registry.
//!
//! Every persisted entity kind and join table is described by a static
//! [`Table`]: its name and its ordered column list. The column order is the
//! single source of truth for insert value order, row decoding and DDL.

use std::{collections::HashMap, fmt::Display, str::FromStr};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::{entity::Entity, error::Error, statement::Dialect};

/// Primary key column shared by every entity table.
pub const ID_COLUMN: &str = "_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Bool,
    Float,
    Timestamp,
    /// Nullable id of another entity kind.
    Ref(EntityKind),
}

impl ColumnType {
    fn sql_type(&self, dialect: Dialect) -> &'static str {
        match (self, dialect) {
            (ColumnType::Text | ColumnType::Ref(_) | ColumnType::Timestamp, _) => "TEXT",
            (ColumnType::Bool, _) => "BOOLEAN",
            (ColumnType::Float, Dialect::Postgres) => "DOUBLE PRECISION",
            (ColumnType::Float, Dialect::Sqlite) => "REAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
}

const fn col(name: &'static str, ty: ColumnType) -> Column {
    Column { name, ty }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    /// Whether the first column is the entity primary key.
    pub keyed: bool,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&'static Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this table.
    pub fn create_sql(&self, dialect: Dialect) -> String {
        let columns = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let mut def = format!("{} {}", quote_ident(c.name), c.ty.sql_type(dialect));
                if self.keyed && i == 0 {
                    def.push_str(" PRIMARY KEY");
                } else if !matches!(c.ty, ColumnType::Ref(_)) {
                    def.push_str(" NOT NULL");
                }
                def
            })
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(self.name),
            columns
        )
    }
}

pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Workspace,
    Client,
    Project,
    Tag,
    Task,
    TeamRole,
    TeamGroup,
    TeamMember,
}

use ColumnType::*;

static USER: Table = Table {
    name: "user",
    keyed: true,
    columns: &[
        col(ID_COLUMN, Text),
        col("name", Text),
        col("email", Text),
        col("username", Text),
        col("password", Text),
    ],
};

static WORKSPACE: Table = Table {
    name: "workspace",
    keyed: true,
    columns: &[col(ID_COLUMN, Text), col("name", Text)],
};

static CLIENT: Table = Table {
    name: "client",
    keyed: true,
    columns: &[
        col(ID_COLUMN, Text),
        col("name", Text),
        col("address", Text),
        col("note", Text),
        col("is_archived", Bool),
    ],
};

static PROJECT: Table = Table {
    name: "project",
    keyed: true,
    columns: &[
        col(ID_COLUMN, Text),
        col("name", Text),
        col("color_tag", Text),
        col("is_public", Bool),
        col("tracked_hours", Float),
        col("tracked_amount", Float),
        col("progress_percentage", Float),
        col("client_id", Ref(EntityKind::Client)),
        col("workspace_id", Ref(EntityKind::Workspace)),
    ],
};

static TAG: Table = Table {
    name: "tag",
    keyed: true,
    columns: &[col(ID_COLUMN, Text), col("name", Text)],
};

static TASK: Table = Table {
    name: "task",
    keyed: true,
    columns: &[
        col(ID_COLUMN, Text),
        col("description", Text),
        col("billable", Bool),
        col("start_time", Timestamp),
        col("end_time", Timestamp),
        col("date", Timestamp),
        col("is_active", Bool),
        col("project_id", Ref(EntityKind::Project)),
    ],
};

static TEAM_ROLE: Table = Table {
    name: "team_role",
    keyed: true,
    columns: &[col(ID_COLUMN, Text), col("role", Text)],
};

static TEAM_GROUP: Table = Table {
    name: "team_group",
    keyed: true,
    columns: &[
        col(ID_COLUMN, Text),
        col("name", Text),
        col("workspace_id", Ref(EntityKind::Workspace)),
    ],
};

static TEAM_MEMBER: Table = Table {
    name: "team_member",
    keyed: true,
    columns: &[
        col(ID_COLUMN, Text),
        col("billable_rate", Float),
        col("workspace_id", Ref(EntityKind::Workspace)),
        col("user_id", Ref(EntityKind::User)),
        col("team_role_id", Ref(EntityKind::TeamRole)),
    ],
};

impl EntityKind {
    pub const ALL: [EntityKind; 9] = [
        EntityKind::User,
        EntityKind::Workspace,
        EntityKind::Client,
        EntityKind::Project,
        EntityKind::Tag,
        EntityKind::Task,
        EntityKind::TeamRole,
        EntityKind::TeamGroup,
        EntityKind::TeamMember,
    ];

    pub fn table(&self) -> &'static Table {
        match self {
            EntityKind::User => &USER,
            EntityKind::Workspace => &WORKSPACE,
            EntityKind::Client => &CLIENT,
            EntityKind::Project => &PROJECT,
            EntityKind::Tag => &TAG,
            EntityKind::Task => &TASK,
            EntityKind::TeamRole => &TEAM_ROLE,
            EntityKind::TeamGroup => &TEAM_GROUP,
            EntityKind::TeamMember => &TEAM_MEMBER,
        }
    }

    pub fn table_name(&self) -> &'static str {
        self.table().name
    }

    /// Name used in operation labels, e.g. `AddTeamMember`.
    pub fn type_name(&self) -> &'static str {
        match self {
            EntityKind::User => "User",
            EntityKind::Workspace => "Workspace",
            EntityKind::Client => "Client",
            EntityKind::Project => "Project",
            EntityKind::Tag => "Tag",
            EntityKind::Task => "Task",
            EntityKind::TeamRole => "TeamRole",
            EntityKind::TeamGroup => "TeamGroup",
            EntityKind::TeamMember => "TeamMember",
        }
    }

    /// Type tag carried by every id of this kind.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            EntityKind::User => "u",
            EntityKind::Workspace => "w",
            EntityKind::Client => "c",
            EntityKind::Project => "p",
            EntityKind::Tag => "ta",
            EntityKind::Task => "t",
            EntityKind::TeamRole => "tr",
            EntityKind::TeamGroup => "tg",
            EntityKind::TeamMember => "tm",
        }
    }

    pub fn new_id(&self) -> String {
        format!("{}_{}", self.id_prefix(), uuid::Uuid::now_v7())
    }

    /// Whether `id` carries this kind's type tag. Prefixes overlap (`t_` and
    /// `tm_`), so the separator is part of the check.
    pub fn owns_id(&self, id: &str) -> bool {
        id.strip_prefix(self.id_prefix())
            .and_then(|rest| rest.strip_prefix('_'))
            .is_some_and(|rest| !rest.is_empty())
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

static KINDS_BY_NAME: Lazy<HashMap<&'static str, EntityKind>> = Lazy::new(|| {
    EntityKind::ALL
        .iter()
        .map(|kind| (kind.table_name(), *kind))
        .collect()
});

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        KINDS_BY_NAME
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))
    }
}

/// Table name registered for an entity kind name such as `"team_member"`.
pub fn table_name_for(kind: &str) -> Result<&'static str, Error> {
    kind.parse::<EntityKind>().map(|k| k.table_name())
}

/// Persisted column names of an entity value, in storage order.
pub fn column_names_for<E: Entity>(_entity: &E) -> Vec<&'static str> {
    E::KIND.table().column_names()
}

/// Two-column tables recording many-to-many links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JunctionTable {
    ProjectTeamMember,
    ProjectTeamGroup,
    TeamGroupTeamMember,
    TaskTag,
}

static PROJECT_TEAM_MEMBER: Table = Table {
    name: "project_team_member",
    keyed: false,
    columns: &[
        col("project_id", Text),
        col("team_member_id", Text),
    ],
};

static PROJECT_TEAM_GROUP: Table = Table {
    name: "project_team_group",
    keyed: false,
    columns: &[col("project_id", Text), col("team_group_id", Text)],
};

static TEAM_GROUP_TEAM_MEMBER: Table = Table {
    name: "team_group_team_member",
    keyed: false,
    columns: &[
        col("team_group_id", Text),
        col("team_member_id", Text),
    ],
};

static TASK_TAG: Table = Table {
    name: "task_tag",
    keyed: false,
    columns: &[col("task_id", Text), col("tag_id", Text)],
};

impl JunctionTable {
    pub const ALL: [JunctionTable; 4] = [
        JunctionTable::ProjectTeamMember,
        JunctionTable::ProjectTeamGroup,
        JunctionTable::TeamGroupTeamMember,
        JunctionTable::TaskTag,
    ];

    pub fn table(&self) -> &'static Table {
        match self {
            JunctionTable::ProjectTeamMember => &PROJECT_TEAM_MEMBER,
            JunctionTable::ProjectTeamGroup => &PROJECT_TEAM_GROUP,
            JunctionTable::TeamGroupTeamMember => &TEAM_GROUP_TEAM_MEMBER,
            JunctionTable::TaskTag => &TASK_TAG,
        }
    }

    pub fn name(&self) -> &'static str {
        self.table().name
    }

    pub fn parent_column(&self) -> &'static str {
        self.table().columns[0].name
    }

    pub fn child_column(&self) -> &'static str {
        self.table().columns[1].name
    }

    pub fn parent_kind(&self) -> EntityKind {
        match self {
            JunctionTable::ProjectTeamMember | JunctionTable::ProjectTeamGroup => {
                EntityKind::Project
            }
            JunctionTable::TeamGroupTeamMember => EntityKind::TeamGroup,
            JunctionTable::TaskTag => EntityKind::Task,
        }
    }

    pub fn child_kind(&self) -> EntityKind {
        match self {
            JunctionTable::ProjectTeamMember | JunctionTable::TeamGroupTeamMember => {
                EntityKind::TeamMember
            }
            JunctionTable::ProjectTeamGroup => EntityKind::TeamGroup,
            JunctionTable::TaskTag => EntityKind::Tag,
        }
    }
}

/// DDL for every base and junction table, in creation order.
pub fn bootstrap_sql(dialect: Dialect) -> Vec<String> {
    EntityKind::ALL
        .iter()
        .map(|k| k.table())
        .chain(JunctionTable::ALL.iter().map(|j| j.table()))
        .map(|t| t.create_sql(dialect))
        .collect()
}
