//! Persisted entity payloads and the descriptor that tags them with their type.
//!
//! The orchestrator never looks inside a payload; only backend handlers do.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumIter,
)]
pub enum EntityType {
    #[strum(serialize = "server")]
    Server,

    #[strum(serialize = "scheduler")]
    Scheduler,

    #[strum(serialize = "queue")]
    Queue,

    #[strum(serialize = "node")]
    Node,

    #[strum(serialize = "mominfo_time")]
    MomInfoTimestamp,

    #[strum(serialize = "job")]
    Job,

    #[strum(serialize = "job_script")]
    JobScript,

    #[strum(serialize = "reservation")]
    Reservation,
}

impl EntityType {
    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DbAttribute {
    pub name: String,
    #[serde(default)]
    pub resource: Option<String>,
    pub value: String,
    #[serde(default)]
    pub flags: i32,
}

impl DbAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    fn same_key(&self, other: &DbAttribute) -> bool {
        self.name == other.name && self.resource == other.resource
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeList {
    attributes: Vec<DbAttribute>,
}

impl AttributeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, attribute: DbAttribute) {
        self.attributes.push(attribute);
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DbAttribute> {
        self.attributes.iter()
    }

    pub fn get(&self, name: &str) -> Option<&DbAttribute> {
        self.attributes.iter().find(|x| x.name == name)
    }

    pub fn clear(&mut self) {
        self.attributes.clear();
    }

    /// Insert or replace every attribute of `other`, keyed by name and resource.
    pub fn merge(&mut self, other: &AttributeList) {
        for attribute in other.iter() {
            match self.attributes.iter_mut().find(|x| x.same_key(attribute)) {
                Some(existing) => *existing = attribute.clone(),
                None => self.attributes.push(attribute.clone()),
            }
        }
    }

    /// Remove every attribute matching an entry of `names`, returns how many were removed.
    ///
    /// An entry without a resource removes all resources of that attribute.
    pub fn remove_matching(&mut self, names: &AttributeList) -> usize {
        let before = self.attributes.len();

        self.attributes.retain(|attribute| {
            !names.iter().any(|x| {
                x.name == attribute.name
                    && (x.resource.is_none() || x.resource == attribute.resource)
            })
        });

        before - self.attributes.len()
    }
}

impl FromIterator<DbAttribute> for AttributeList {
    fn from_iter<I: IntoIterator<Item = DbAttribute>>(iter: I) -> Self {
        Self {
            attributes: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServerRecord {
    pub name: String,
    pub job_id_sequence: i64,
    #[serde(default)]
    pub attributes: AttributeList,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchedulerRecord {
    pub name: String,
    #[serde(default)]
    pub attributes: AttributeList,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueueRecord {
    pub name: String,
    pub queue_type: i32,
    #[serde(default)]
    pub attributes: AttributeList,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    pub mom_name: String,
    pub index: i32,
    #[serde(default)]
    pub attributes: AttributeList,
}

/// Last time the set of mom (execution host) definitions changed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MomInfoTime {
    pub time: i64,
    pub generation: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub state: i32,
    pub substate: i32,
    pub server_flags: i32,
    pub start_time: i64,
    pub queue: String,
    pub destination: String,
    pub exit_status: i32,
    pub queue_time: i64,
    pub queue_rank: i64,
    #[serde(default)]
    pub attributes: AttributeList,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobScript {
    pub job_id: String,
    pub script: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReservationRecord {
    pub resv_id: String,
    pub queue: String,
    pub state: i32,
    pub substate: i32,
    pub start: i64,
    pub end: i64,
    pub duration: i64,
    #[serde(default)]
    pub attributes: AttributeList,
}

/// A persisted entity, tagged with its type. The payload is owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectDescriptor {
    Server(ServerRecord),
    Scheduler(SchedulerRecord),
    Queue(QueueRecord),
    Node(NodeRecord),
    MomInfoTimestamp(MomInfoTime),
    Job(JobRecord),
    JobScript(JobScript),
    Reservation(ReservationRecord),
}

impl ObjectDescriptor {
    /// An empty payload of the given type, ready to be filled by a load or used as a find filter.
    pub fn empty(kind: EntityType) -> Self {
        match kind {
            EntityType::Server => Self::Server(Default::default()),
            EntityType::Scheduler => Self::Scheduler(Default::default()),
            EntityType::Queue => Self::Queue(Default::default()),
            EntityType::Node => Self::Node(Default::default()),
            EntityType::MomInfoTimestamp => Self::MomInfoTimestamp(Default::default()),
            EntityType::Job => Self::Job(Default::default()),
            EntityType::JobScript => Self::JobScript(Default::default()),
            EntityType::Reservation => Self::Reservation(Default::default()),
        }
    }

    pub fn kind(&self) -> EntityType {
        match self {
            Self::Server(_) => EntityType::Server,
            Self::Scheduler(_) => EntityType::Scheduler,
            Self::Queue(_) => EntityType::Queue,
            Self::Node(_) => EntityType::Node,
            Self::MomInfoTimestamp(_) => EntityType::MomInfoTimestamp,
            Self::Job(_) => EntityType::Job,
            Self::JobScript(_) => EntityType::JobScript,
            Self::Reservation(_) => EntityType::Reservation,
        }
    }

    /// Key of the object within its type. Singletons use a fixed key.
    pub fn id(&self) -> &str {
        match self {
            Self::Server(x) => &x.name,
            Self::Scheduler(x) => &x.name,
            Self::Queue(x) => &x.name,
            Self::Node(x) => &x.name,
            Self::MomInfoTimestamp(_) => "mominfo_time",
            Self::Job(x) => &x.job_id,
            Self::JobScript(x) => &x.job_id,
            Self::Reservation(x) => &x.resv_id,
        }
    }

    /// Owning queue, for types that live inside one.
    pub fn parent(&self) -> Option<&str> {
        match self {
            Self::Job(x) if !x.queue.is_empty() => Some(&x.queue),
            Self::Reservation(x) if !x.queue.is_empty() => Some(&x.queue),
            _ => None,
        }
    }

    /// Ordering key used when several objects of one type are found.
    pub fn rank(&self) -> i64 {
        match self {
            Self::Job(x) => x.queue_rank,
            Self::Node(x) => x.index as i64,
            Self::Reservation(x) => x.start,
            _ => 0,
        }
    }

    pub fn attributes(&self) -> Option<&AttributeList> {
        match self {
            Self::Server(x) => Some(&x.attributes),
            Self::Scheduler(x) => Some(&x.attributes),
            Self::Queue(x) => Some(&x.attributes),
            Self::Node(x) => Some(&x.attributes),
            Self::Job(x) => Some(&x.attributes),
            Self::Reservation(x) => Some(&x.attributes),
            Self::MomInfoTimestamp(_) | Self::JobScript(_) => None,
        }
    }

    pub fn attributes_mut(&mut self) -> Option<&mut AttributeList> {
        match self {
            Self::Server(x) => Some(&mut x.attributes),
            Self::Scheduler(x) => Some(&mut x.attributes),
            Self::Queue(x) => Some(&mut x.attributes),
            Self::Node(x) => Some(&mut x.attributes),
            Self::Job(x) => Some(&mut x.attributes),
            Self::Reservation(x) => Some(&mut x.attributes),
            Self::MomInfoTimestamp(_) | Self::JobScript(_) => None,
        }
    }

    /// Release everything the payload owns, keeping only its type.
    pub fn reset(&mut self) {
        *self = Self::empty(self.kind());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// Write the whole record, creating it if needed.
    Full,
    /// Write only the fields carried by the payload into an existing record.
    Quick,
}

/// Outcome of a write that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbOutcome {
    Applied,
    NoRowsAffected,
}

impl DbOutcome {
    pub fn status_code(self) -> i32 {
        match self {
            DbOutcome::Applied => 0,
            DbOutcome::NoRowsAffected => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    NotFound,
}

/// Status code reported upward for any dispatch result: `0` applied, `1` no rows affected,
/// `-1` failure, and the matched row count for finds.
pub trait StatusCode {
    fn status_code(&self) -> i64;
}

impl StatusCode for kura_core::types::Result<DbOutcome> {
    fn status_code(&self) -> i64 {
        match self {
            Ok(outcome) => outcome.status_code() as i64,
            Err(_) => -1,
        }
    }
}

impl StatusCode for kura_core::types::Result<LoadOutcome> {
    fn status_code(&self) -> i64 {
        match self {
            Ok(LoadOutcome::Loaded) => 0,
            Ok(LoadOutcome::NotFound) => 1,
            Err(_) => -1,
        }
    }
}

impl StatusCode for kura_core::types::Result<usize> {
    fn status_code(&self) -> i64 {
        match self {
            Ok(count) => *count as i64,
            Err(_) => -1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub flags: u32,
    pub modified_since: Option<NaiveDateTime>,
}

impl QueryOptions {
    pub const FIND_JOBS_BY_QUEUE: u32 = 1;

    pub fn with_flags(flags: u32) -> Self {
        Self {
            flags,
            ..Default::default()
        }
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }
}
