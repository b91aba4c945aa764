//! Shared fixtures: an in-memory session that records what it is asked to
//! do, and the record types used across the insert tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use strum::{Display, EnumString, FromRepr};
use uuid::Uuid;

use cql_mapper::{
    BoundStatement, ColumnMapping, ColumnType, FnConverter, Mapper, MapperError,
    MappingDefinition, Poco, PreparedStatement, PropertyBag, PropertySource, PropertyValue,
    Result, RowSet, Scalar, Session, StaticDefinitions,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Session double. Prepares always succeed unless `failing_prepare` is set;
/// executes pop queued responses and fall back to an empty row set.
#[derive(Default)]
pub struct RecordingSession {
    prepares: AtomicUsize,
    prepare_delay: Duration,
    execute_delay: Duration,
    prepare_error: Option<String>,
    responses: Mutex<VecDeque<anyhow::Result<RowSet>>>,
    executed: Mutex<Vec<BoundStatement>>,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prepare_delay(mut self, delay: Duration) -> Self {
        self.prepare_delay = delay;
        self
    }

    pub fn with_execute_delay(mut self, delay: Duration) -> Self {
        self.execute_delay = delay;
        self
    }

    pub fn failing_prepare(mut self, message: &str) -> Self {
        self.prepare_error = Some(message.to_string());
        self
    }

    pub fn respond(self, response: anyhow::Result<RowSet>) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn prepares(&self) -> usize {
        self.prepares.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<BoundStatement> {
        self.executed.lock().unwrap().clone()
    }

    pub fn last_executed(&self) -> BoundStatement {
        self.executed
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("nothing executed")
    }
}

#[async_trait]
impl Session for RecordingSession {
    async fn prepare(&self, cql: &str) -> anyhow::Result<PreparedStatement> {
        let n = self.prepares.fetch_add(1, Ordering::SeqCst);
        if !self.prepare_delay.is_zero() {
            tokio::time::sleep(self.prepare_delay).await;
        }
        if let Some(message) = &self.prepare_error {
            anyhow::bail!("{message}");
        }
        Ok(PreparedStatement::new(n.to_be_bytes().to_vec(), cql))
    }

    async fn execute(&self, statement: BoundStatement) -> anyhow::Result<RowSet> {
        if !self.execute_delay.is_zero() {
            tokio::time::sleep(self.execute_delay).await;
        }
        self.executed.lock().unwrap().push(statement);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RowSet::empty()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    pub id: Option<Uuid>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub release_date: Option<DateTime<Utc>>,
}

impl PropertySource for Song {
    fn property(&self, key: &str) -> Option<PropertyValue<'_>> {
        match key {
            "Id" => Some(PropertyValue::opt(self.id)),
            "Title" => Some(PropertyValue::opt(self.title.clone())),
            "Artist" => Some(PropertyValue::opt(self.artist.clone())),
            "ReleaseDate" => Some(PropertyValue::opt(self.release_date)),
            _ => None,
        }
    }
}

impl Poco for Song {
    fn from_properties(mut bag: PropertyBag) -> Result<Self> {
        Ok(Self {
            id: bag.take("Id")?,
            title: bag.take("Title")?,
            artist: bag.take("Artist")?,
            release_date: bag.take("ReleaseDate")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Album {
    pub id: Uuid,
    pub name: Option<String>,
    pub publishing_date: DateTime<Utc>,
    pub songs: Option<Vec<Song>>,
}

impl PropertySource for Album {
    fn property(&self, key: &str) -> Option<PropertyValue<'_>> {
        match key {
            "Id" => Some(PropertyValue::scalar(self.id)),
            "Name" => Some(PropertyValue::opt(self.name.clone())),
            "PublishingDate" => Some(PropertyValue::scalar(self.publishing_date)),
            "Songs" => Some(PropertyValue::opt_list(
                self.songs
                    .as_ref()
                    .map(|songs| songs.iter().map(|s| PropertyValue::record(s))),
            )),
            _ => None,
        }
    }
}

impl Poco for Album {
    fn from_properties(mut bag: PropertyBag) -> Result<Self> {
        Ok(Self {
            id: bag.take("Id")?.unwrap_or_default(),
            name: bag.take("Name")?,
            publishing_date: bag.take("PublishingDate")?.unwrap_or_default(),
            songs: bag.take_records("Songs")?,
        })
    }
}

/// Mapped to `users` with renamed columns.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub name: Option<String>,
}

impl PropertySource for User {
    fn property(&self, key: &str) -> Option<PropertyValue<'_>> {
        match key {
            "Id" => Some(PropertyValue::scalar(self.id)),
            "Name" => Some(PropertyValue::opt(self.name.clone())),
            _ => None,
        }
    }
}

impl Poco for User {
    fn from_properties(mut bag: PropertyBag) -> Result<Self> {
        Ok(Self {
            id: bag.take("Id")?.unwrap_or_default(),
            name: bag.take("Name")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, FromRepr)]
#[repr(i32)]
pub enum RainbowColor {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Indigo,
    Violet,
}

/// Mapped to `users` with every collection kind and an enum stored as text.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertUser {
    pub id: Uuid,
    pub name: Option<String>,
    pub age: i32,
    pub is_active: bool,
    pub login_history: Vec<DateTime<Utc>>,
    pub lucky_numbers: BTreeSet<i32>,
    pub children_ages: BTreeMap<String, i32>,
    pub favorite_color: RainbowColor,
}

impl PropertySource for InsertUser {
    fn property(&self, key: &str) -> Option<PropertyValue<'_>> {
        match key {
            "Id" => Some(PropertyValue::scalar(self.id)),
            "Name" => Some(PropertyValue::opt(self.name.clone())),
            "Age" => Some(PropertyValue::scalar(self.age)),
            "IsActive" => Some(PropertyValue::scalar(self.is_active)),
            "LoginHistory" => Some(PropertyValue::list(
                self.login_history.iter().map(|t| PropertyValue::scalar(*t)),
            )),
            "LuckyNumbers" => Some(PropertyValue::list(
                self.lucky_numbers.iter().map(|n| PropertyValue::scalar(*n)),
            )),
            "ChildrenAges" => Some(PropertyValue::map(self.children_ages.iter().map(
                |(name, age)| (PropertyValue::scalar(name.as_str()), PropertyValue::scalar(*age)),
            ))),
            "FavoriteColor" => Some(PropertyValue::scalar(self.favorite_color as i32)),
            _ => None,
        }
    }
}

impl Poco for InsertUser {
    fn from_properties(mut bag: PropertyBag) -> Result<Self> {
        let color: i32 = bag.take("FavoriteColor")?.unwrap_or_default();
        Ok(Self {
            id: bag.take("Id")?.unwrap_or_default(),
            name: bag.take("Name")?,
            age: bag.take("Age")?.unwrap_or_default(),
            is_active: bag.take("IsActive")?.unwrap_or_default(),
            login_history: bag.take_list("LoginHistory")?.unwrap_or_default(),
            lucky_numbers: bag
                .take_list("LuckyNumbers")?
                .unwrap_or_default()
                .into_iter()
                .collect(),
            children_ages: bag
                .take_map("ChildrenAges")?
                .unwrap_or_default()
                .into_iter()
                .collect(),
            favorite_color: RainbowColor::from_repr(color).ok_or_else(|| {
                MapperError::MappingConversion {
                    property: "FavoriteColor".into(),
                    column: "favorite_color".into(),
                    reason: format!("{color} is not a color"),
                }
            })?,
        })
    }
}

/// Stores `RainbowColor` discriminants as their names.
pub fn color_converter() -> FnConverter {
    FnConverter::new(
        |s| match s {
            Scalar::Int(n) => RainbowColor::from_repr(n)
                .map(|c| Scalar::Text(c.to_string()))
                .ok_or_else(|| format!("{n} is not a color")),
            other => Err(format!("expected color, found {}", other.type_name())),
        },
        |s| match s {
            Scalar::Text(name) => RainbowColor::from_str(&name)
                .map(|c| Scalar::Int(c as i32))
                .map_err(|e| format!("{name}: {e}")),
            other => Err(format!("expected color name, found {}", other.type_name())),
        },
    )
}

pub fn insert_user_definition() -> MappingDefinition {
    MappingDefinition::new::<InsertUser>(
        "users",
        vec![
            ColumnMapping::new("Id", "userid", ColumnType::Uuid).primary_key(),
            ColumnMapping::new("Name", "name", ColumnType::Text),
            ColumnMapping::new("Age", "age", ColumnType::Int),
            ColumnMapping::new("IsActive", "is_active", ColumnType::Boolean),
            ColumnMapping::new(
                "LoginHistory",
                "login_history",
                ColumnType::list(ColumnType::Timestamp),
            ),
            ColumnMapping::new("LuckyNumbers", "lucky_numbers", ColumnType::set(ColumnType::Int)),
            ColumnMapping::new(
                "ChildrenAges",
                "children_ages",
                ColumnType::map(ColumnType::Text, ColumnType::Int),
            ),
            ColumnMapping::new("FavoriteColor", "favorite_color", ColumnType::Text)
                .with_converter(Arc::new(color_converter())),
        ],
    )
}

pub fn song_definition() -> MappingDefinition {
    MappingDefinition::new::<Song>(
        "Song",
        vec![
            ColumnMapping::new("Id", "Id", ColumnType::Uuid).primary_key(),
            ColumnMapping::new("Title", "Title", ColumnType::Text),
            ColumnMapping::new("Artist", "Artist", ColumnType::Text),
            ColumnMapping::new("ReleaseDate", "ReleaseDate", ColumnType::Timestamp),
        ],
    )
}

pub fn album_definition() -> MappingDefinition {
    MappingDefinition::new::<Album>(
        "Album",
        vec![
            ColumnMapping::new("Id", "Id", ColumnType::Uuid).primary_key(),
            ColumnMapping::new("Name", "Name", ColumnType::Text),
            ColumnMapping::new("PublishingDate", "PublishingDate", ColumnType::Timestamp),
            ColumnMapping::new("Songs", "Songs", ColumnType::list(ColumnType::udt::<Song>())),
        ],
    )
}

pub fn user_definition() -> MappingDefinition {
    MappingDefinition::new::<User>(
        "users",
        vec![
            ColumnMapping::new("Id", "userid", ColumnType::Uuid).primary_key(),
            ColumnMapping::new("Name", "name", ColumnType::Text),
        ],
    )
}

pub fn definitions() -> StaticDefinitions {
    StaticDefinitions::new()
        .with(song_definition())
        .with(album_definition())
        .with(user_definition())
        .with(insert_user_definition())
}

pub fn mapper_with(session: RecordingSession) -> (Mapper, Arc<RecordingSession>) {
    init_tracing();
    let session = Arc::new(session);
    let mapper = Mapper::new(session.clone(), Arc::new(definitions()));
    (mapper, session)
}

pub fn publishing_date() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_400_000_000, 0).unwrap_or_default()
}

pub fn album_without_name() -> Album {
    Album {
        id: Uuid::new_v4(),
        name: None,
        publishing_date: publishing_date(),
        songs: None,
    }
}
