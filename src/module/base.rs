use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::module::data::{Data, Item, Request, Response};
use crate::module::mid::{Mid, ModuleType};

/// Snapshot of a module's call counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub called: u64,
    pub accepted: u64,
    pub completed: u64,
    pub handling: u64,
}

/// Load-balancing score of a counter snapshot; lower is preferred
pub type CalculateScore = fn(&Counts) -> u64;

/// Default score: in-flight work weighs most, then completed, accepted and
/// raw call counts
pub fn calculate_score_simple(counts: &Counts) -> u64 {
    counts.called
        + (counts.accepted << 1)
        + (counts.completed << 2)
        + (counts.handling << 4)
}

/// Per-module report used in scheduler summaries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSummary {
    pub id: Mid,
    pub called: u64,
    pub accepted: u64,
    pub completed: u64,
    pub handling: u64,
}

/// Identity and counters shared by every module implementation
pub struct ModuleBase {
    mid: Mid,
    module_type: ModuleType,
    addr: Option<SocketAddr>,
    score: AtomicU64,
    score_calculator: CalculateScore,
    called: AtomicU64,
    accepted: AtomicU64,
    completed: AtomicU64,
    handling: AtomicU64,
}

impl ModuleBase {
    /// Create the base for a module with the given ID. Falls back to
    /// `calculate_score_simple` when no calculator is given.
    pub fn new(mid: Mid, score_calculator: Option<CalculateScore>) -> Result<Self> {
        let (module_type, _, addr) = mid.split()?;
        Ok(Self {
            mid,
            module_type,
            addr,
            score: AtomicU64::new(0),
            score_calculator: score_calculator.unwrap_or(calculate_score_simple),
            called: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            handling: AtomicU64::new(0),
        })
    }

    pub fn id(&self) -> &Mid {
        &self.mid
    }

    /// Category encoded in the module ID
    pub fn module_type(&self) -> ModuleType {
        self.module_type
    }

    pub fn addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    pub fn score(&self) -> u64 {
        self.score.load(Ordering::Acquire)
    }

    pub fn set_score(&self, score: u64) {
        self.score.store(score, Ordering::Release);
    }

    pub fn score_calculator(&self) -> CalculateScore {
        self.score_calculator
    }

    /// Recompute the score from a fresh counter snapshot. Returns whether it
    /// changed.
    pub fn refresh_score(&self) -> bool {
        let new_score = (self.score_calculator)(&self.counts());
        self.score.swap(new_score, Ordering::AcqRel) != new_score
    }

    pub fn incr_called(&self) {
        self.called.fetch_add(1, Ordering::AcqRel);
    }

    pub fn incr_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::AcqRel);
    }

    pub fn incr_completed(&self) {
        self.completed.fetch_add(1, Ordering::AcqRel);
    }

    /// Count one call as in flight until the returned guard is dropped
    pub fn start_handling(&self) -> HandlingGuard<'_> {
        self.handling.fetch_add(1, Ordering::AcqRel);
        HandlingGuard { base: self }
    }

    pub fn handling(&self) -> u64 {
        self.handling.load(Ordering::Acquire)
    }

    pub fn counts(&self) -> Counts {
        Counts {
            called: self.called.load(Ordering::Acquire),
            accepted: self.accepted.load(Ordering::Acquire),
            completed: self.completed.load(Ordering::Acquire),
            handling: self.handling.load(Ordering::Acquire),
        }
    }

    /// Reset every counter except the in-flight count
    pub fn clear(&self) {
        self.called.store(0, Ordering::Release);
        self.accepted.store(0, Ordering::Release);
        self.completed.store(0, Ordering::Release);
    }

    pub fn summary(&self) -> ModuleSummary {
        let counts = self.counts();
        ModuleSummary {
            id: self.mid.clone(),
            called: counts.called,
            accepted: counts.accepted,
            completed: counts.completed,
            handling: counts.handling,
        }
    }
}

impl std::fmt::Debug for ModuleBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleBase")
            .field("mid", &self.mid)
            .field("score", &self.score())
            .field("counts", &self.counts())
            .finish()
    }
}

/// Decrements the in-flight count on drop
#[derive(Debug)]
pub struct HandlingGuard<'a> {
    base: &'a ModuleBase,
}

impl Drop for HandlingGuard<'_> {
    fn drop(&mut self) {
        self.base.handling.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Common surface of every crawl module
pub trait Module: Send + Sync {
    fn base(&self) -> &ModuleBase;

    fn id(&self) -> &Mid {
        self.base().id()
    }

    fn counts(&self) -> Counts {
        self.base().counts()
    }

    fn score(&self) -> u64 {
        self.base().score()
    }

    fn set_score(&self, score: u64) {
        self.base().set_score(score)
    }

    fn summary(&self) -> ModuleSummary {
        self.base().summary()
    }
}

/// Fetches requests
#[async_trait]
pub trait Downloader: Module {
    async fn download(&self, request: Request) -> Result<Response>;
}

/// Response parsing function: gets the response and its depth
pub type ResponseParser = Arc<dyn Fn(&Response, u32) -> (Vec<Data>, Vec<Error>) + Send + Sync>;

/// Turns responses into follow-up requests and items
#[async_trait]
pub trait Analyzer: Module {
    /// Configured response parsers
    fn parsers(&self) -> Vec<ResponseParser>;

    async fn analyze(&self, response: Response) -> (Vec<Data>, Vec<Error>);
}

/// Item processing step: returns the (possibly rewritten) item
pub type ItemProcessor = Arc<dyn Fn(Item) -> Result<Item> + Send + Sync>;

/// Consumes items
#[async_trait]
pub trait Pipeline: Module {
    /// Configured item processors, in order
    fn processors(&self) -> Vec<ItemProcessor>;

    /// Whether a failing processor stops the rest for that item
    fn fail_fast(&self) -> bool;

    fn set_fail_fast(&self, fail_fast: bool);

    async fn send(&self, item: Item) -> Vec<Error>;
}

/// A registered module instance, tagged with its runtime category
#[derive(Clone)]
pub enum ModuleHandle {
    Downloader(Arc<dyn Downloader>),
    Analyzer(Arc<dyn Analyzer>),
    Pipeline(Arc<dyn Pipeline>),
}

impl ModuleHandle {
    /// Runtime category, from the variant rather than the ID
    pub fn module_type(&self) -> ModuleType {
        match self {
            Self::Downloader(_) => ModuleType::Downloader,
            Self::Analyzer(_) => ModuleType::Analyzer,
            Self::Pipeline(_) => ModuleType::Pipeline,
        }
    }

    pub fn base(&self) -> &ModuleBase {
        match self {
            Self::Downloader(m) => m.base(),
            Self::Analyzer(m) => m.base(),
            Self::Pipeline(m) => m.base(),
        }
    }

    pub fn id(&self) -> &Mid {
        self.base().id()
    }

    pub fn as_downloader(&self) -> Option<&Arc<dyn Downloader>> {
        match self {
            Self::Downloader(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_analyzer(&self) -> Option<&Arc<dyn Analyzer>> {
        match self {
            Self::Analyzer(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_pipeline(&self) -> Option<&Arc<dyn Pipeline>> {
        match self {
            Self::Pipeline(m) => Some(m),
            _ => None,
        }
    }
}

impl std::fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.module_type(), self.id())
    }
}

impl From<Arc<dyn Downloader>> for ModuleHandle {
    fn from(module: Arc<dyn Downloader>) -> Self {
        Self::Downloader(module)
    }
}

impl From<Arc<dyn Analyzer>> for ModuleHandle {
    fn from(module: Arc<dyn Analyzer>) -> Self {
        Self::Analyzer(module)
    }
}

impl From<Arc<dyn Pipeline>> for ModuleHandle {
    fn from(module: Arc<dyn Pipeline>) -> Self {
        Self::Pipeline(module)
    }
}
