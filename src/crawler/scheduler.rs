use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::crawler::args::{Args, DataArgs, ModuleArgs, ModuleArgsSummary, RequestArgs};
use crate::crawler::filter::{primary_domain, RequestFilter};
use crate::crawler::status::{check_status, Status};
use crate::crawler::summary::{ModulesSummary, PoolSummary, SchedSummary};
use crate::errors::{CrawlerError, Error, ErrorKind, Result};
use crate::module::{Data, Item, Mid, Module, ModuleHandle, ModuleType, Registrar, Request, Response};
use crate::storage::Pool;

/// Arguments accepted by the last successful `init`
#[derive(Debug, Clone)]
struct SchedArgs {
    request: RequestArgs,
    data: DataArgs,
    modules: ModuleArgsSummary,
}

/// Drives a crawl: pulls requests, responses and items out of their pools,
/// hands them to registered modules and feeds the results back in.
pub struct Scheduler {
    /// Lifecycle state, only changed through check-and-set
    status: RwLock<Status>,

    /// Registered module instances
    registrar: Arc<Registrar>,

    /// Pools, filter and cancellation of the current crawl
    crawl: RwLock<Option<Arc<CrawlState>>>,

    args: RwLock<Option<SchedArgs>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            status: RwLock::new(Status::Uninitialized),
            registrar: Arc::new(Registrar::new()),
            crawl: RwLock::new(None),
            args: RwLock::new(None),
        }
    }

    /// Validate the arguments, build fresh pools and register every module.
    ///
    /// The status goes back to what it was if anything fails.
    pub fn init(
        &self,
        request_args: RequestArgs,
        data_args: DataArgs,
        module_args: ModuleArgs,
    ) -> Result<()> {
        info!("Initializing scheduler");
        let old_status = self.check_and_set_status(Status::Initializing)?;

        match self.build(request_args, data_args, module_args) {
            Ok(()) => {
                self.set_status(Status::Initialized);
                info!("Scheduler has been initialized");
                Ok(())
            }
            Err(e) => {
                warn!("Scheduler initialization failed: {}", e);
                self.set_status(old_status);
                Err(e)
            }
        }
    }

    fn build(
        &self,
        request_args: RequestArgs,
        data_args: DataArgs,
        module_args: ModuleArgs,
    ) -> Result<()> {
        request_args.check()?;
        data_args.check()?;
        module_args.check()?;
        debug!(?request_args, ?data_args, ?module_args, "Scheduler arguments are valid");

        if let Some(previous) = self.crawl_state() {
            previous.shutdown();
        }
        self.registrar.clear();

        let crawl = CrawlState::new(&request_args, &data_args, Arc::clone(&self.registrar))?;
        self.register_modules(&module_args)?;

        *self.crawl.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(crawl));
        *self.args.write().unwrap_or_else(PoisonError::into_inner) = Some(SchedArgs {
            request: request_args,
            data: data_args,
            modules: module_args.summary(),
        });
        Ok(())
    }

    fn register_modules(&self, module_args: &ModuleArgs) -> Result<()> {
        let handles = module_args
            .downloaders
            .iter()
            .cloned()
            .map(ModuleHandle::from)
            .chain(module_args.analyzers.iter().cloned().map(ModuleHandle::from))
            .chain(module_args.pipelines.iter().cloned().map(ModuleHandle::from));

        for handle in handles {
            if !self.registrar.register(handle.clone())? {
                return Err(Error::illegal_parameter(format!(
                    "couldn't register {} instance with MID {:?}",
                    handle.module_type(),
                    handle.id().as_str()
                )));
            }
        }

        let summary = module_args.summary();
        debug!(
            downloaders = summary.downloader_list_size,
            analyzers = summary.analyzer_list_size,
            pipelines = summary.pipeline_list_size,
            "All modules have been registered"
        );
        Ok(())
    }

    /// Launch the worker loops and enqueue `first_request` at depth 0.
    ///
    /// Must be called from within a Tokio runtime. A panic while starting
    /// is reported as an error and the status is rolled back.
    pub fn start(&self, first_request: Request) -> Result<()> {
        info!("Starting scheduler");
        let old_status = self.check_and_set_status(Status::Starting)?;

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.launch(first_request)))
            .unwrap_or_else(|payload| {
                let message = format!("fatal scheduler error: {}", panic_message(&*payload));
                error!("{}", message);
                Err(CrawlerError::new(ErrorKind::Scheduler, message).into())
            });

        match result {
            Ok(()) => {
                self.set_status(Status::Started);
                info!("Scheduler has been started");
                Ok(())
            }
            Err(e) => {
                warn!("Scheduler start failed: {}", e);
                self.set_status(old_status);
                Err(e)
            }
        }
    }

    fn launch(&self, first_request: Request) -> Result<()> {
        let crawl = self
            .crawl_state()
            .ok_or_else(|| Error::illegal_parameter("no crawl state to start"))?;

        let host = first_request
            .host()
            .ok_or_else(|| Error::illegal_parameter(format!("first request has no host: {}", first_request.url)))?;
        let domain = primary_domain(host)?;
        info!("Primary domain: {}", domain);
        crawl.filter.add_domain(&domain);

        crawl.check_pools_open()?;
        for module_type in ModuleType::ALL {
            self.registrar.get_all_by_type(module_type).map_err(|e| {
                Error::illegal_parameter(format!("no {} to start with: {}", module_type, e))
            })?;
        }

        let first_request = first_request.with_depth(0);
        let admission = crawl.filter.admit(&first_request);
        if !admission.is_accepted() {
            return Err(Error::illegal_parameter(format!(
                "first request {} is not crawlable: {}",
                first_request.url, admission
            )));
        }

        crawl.spawn_stage("download", Arc::clone(&crawl.req_pool), |crawl, request| async move {
            crawl.download_one(request).await
        });
        crawl.spawn_stage("analyze", Arc::clone(&crawl.resp_pool), |crawl, response| async move {
            crawl.analyze_one(response).await
        });
        crawl.spawn_stage("pick", Arc::clone(&crawl.item_pool), |crawl, item| async move {
            crawl.pick_one(item).await
        });

        crawl.enqueue(&crawl.req_pool, first_request, "request");
        Ok(())
    }

    /// Signal every worker loop to exit and close all pools
    pub fn stop(&self) -> Result<()> {
        info!("Stopping scheduler");
        self.check_and_set_status(Status::Stopping)?;

        if let Some(crawl) = self.crawl_state() {
            crawl.shutdown();
        }

        self.set_status(Status::Stopped);
        info!("Scheduler has been stopped");
        Ok(())
    }

    pub fn status(&self) -> Status {
        *self.status.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// True when no module call is in flight and every pool is empty
    pub fn idle(&self) -> bool {
        let modules_busy = self
            .registrar
            .get_all()
            .values()
            .any(|module| module.base().handling() > 0);
        if modules_busy {
            return false;
        }

        match self.crawl_state() {
            Some(crawl) => crawl.idle(),
            None => true,
        }
    }

    /// Receiver of crawl-time errors.
    ///
    /// Returns `None` when there is no running crawl to report on. The
    /// receiver closes once the scheduler stops. Errors stay in the error
    /// pool while no receiver is listening, so dropping one and asking again
    /// loses nothing. Must be called from within a Tokio runtime.
    pub fn error_chan(&self) -> Option<mpsc::Receiver<CrawlerError>> {
        let crawl = self.crawl_state()?;
        if crawl.error_pool.closed() {
            return None;
        }

        let capacity = crawl.error_pool.buffer_cap().max(1) as usize;
        let (tx, rx) = mpsc::channel(capacity);
        let pool = Arc::clone(&crawl.error_pool);
        let mut shutdown_rx = crawl.shutdown_tx.subscribe();

        tokio::spawn(async move {
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }
                // An error leaves the pool only once there is room to deliver it
                let permit = tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    permit = tx.reserve() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };
                let crawler_error = tokio::select! {
                    biased;
                    _ = tx.closed() => break,
                    _ = shutdown_rx.changed() => break,
                    got = pool.get() => match got {
                        Ok(crawler_error) => crawler_error,
                        Err(_) => break,
                    },
                };
                permit.send(crawler_error);
            }
            debug!("Error channel closed");
        });

        Some(rx)
    }

    pub fn summary(&self) -> SchedSummary {
        let args = self.args.read().unwrap_or_else(PoisonError::into_inner).clone();
        let crawl = self.crawl_state();

        SchedSummary {
            status: self.status(),
            request_args: args.as_ref().map(|a| a.request.clone()),
            data_args: args.as_ref().map(|a| a.data),
            module_args: args.as_ref().map(|a| a.modules),
            modules: ModulesSummary::of(&self.registrar),
            request_pool: crawl.as_ref().map(|c| PoolSummary::of(&*c.req_pool)).unwrap_or_default(),
            response_pool: crawl.as_ref().map(|c| PoolSummary::of(&*c.resp_pool)).unwrap_or_default(),
            item_pool: crawl.as_ref().map(|c| PoolSummary::of(&*c.item_pool)).unwrap_or_default(),
            error_pool: crawl.as_ref().map(|c| PoolSummary::of(&*c.error_pool)).unwrap_or_default(),
            num_urls: crawl.as_ref().map(|c| c.filter.seen_count()).unwrap_or(0),
        }
    }

    pub fn registrar(&self) -> &Registrar {
        &self.registrar
    }

    fn crawl_state(&self) -> Option<Arc<CrawlState>> {
        self.crawl.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn check_and_set_status(&self, wanted: Status) -> Result<Status> {
        let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
        let old_status = *status;
        check_status(old_status, wanted)?;
        *status = wanted;
        Ok(old_status)
    }

    fn set_status(&self, status: Status) {
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = status;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Everything one crawl shares between its worker tasks
struct CrawlState {
    filter: RequestFilter,
    registrar: Arc<Registrar>,
    req_pool: Arc<Pool<Request>>,
    resp_pool: Arc<Pool<Response>>,
    item_pool: Arc<Pool<Item>>,
    error_pool: Arc<Pool<CrawlerError>>,
    shutdown_tx: watch::Sender<bool>,

    /// Units sent to a pool whose handling has not finished yet
    in_flight: AtomicU64,
}

impl CrawlState {
    fn new(request_args: &RequestArgs, data_args: &DataArgs, registrar: Arc<Registrar>) -> Result<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        let crawl = Self {
            filter: RequestFilter::new(request_args.max_depth, &request_args.accepted_domains),
            registrar,
            req_pool: Arc::new(Pool::new(data_args.req_buffer_cap, data_args.req_max_buffer_number)?),
            resp_pool: Arc::new(Pool::new(data_args.resp_buffer_cap, data_args.resp_max_buffer_number)?),
            item_pool: Arc::new(Pool::new(data_args.item_buffer_cap, data_args.item_max_buffer_number)?),
            error_pool: Arc::new(Pool::new(data_args.error_buffer_cap, data_args.error_max_buffer_number)?),
            shutdown_tx,
            in_flight: AtomicU64::new(0),
        };
        debug!(
            accepted_domains = ?request_args.accepted_domains,
            max_depth = request_args.max_depth,
            "Built buffer pools"
        );
        Ok(crawl)
    }

    fn check_pools_open(&self) -> Result<()> {
        let closed = [
            ("request", self.req_pool.closed()),
            ("response", self.resp_pool.closed()),
            ("item", self.item_pool.closed()),
            ("error", self.error_pool.closed()),
        ];
        match closed.iter().find(|(_, closed)| *closed) {
            Some((name, _)) => {
                warn!("The {} buffer pool is closed", name);
                Err(Error::ClosedPool)
            }
            None => Ok(()),
        }
    }

    fn cancelled(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        self.req_pool.close();
        self.resp_pool.close();
        self.item_pool.close();
        self.error_pool.close();
    }

    fn idle(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) == 0
            && self.req_pool.total() == 0
            && self.resp_pool.total() == 0
            && self.item_pool.total() == 0
            && self.error_pool.total() == 0
    }

    /// Run one dispatch loop: take units from `source` and handle each in
    /// its own task until shutdown or until the pool closes.
    fn spawn_stage<T, F, Fut>(self: &Arc<Self>, stage: &'static str, source: Arc<Pool<T>>, handle: F)
    where
        T: Send + 'static,
        F: Fn(Arc<CrawlState>, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let crawl = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }
                let unit = tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    got = source.get() => match got {
                        Ok(unit) => unit,
                        Err(e) => {
                            debug!(stage, "Source pool unavailable: {}", e);
                            break;
                        }
                    },
                };

                let crawl = Arc::clone(&crawl);
                let work = handle(Arc::clone(&crawl), unit);
                tokio::spawn(async move {
                    let _settle = Settle(&crawl.in_flight);
                    work.await;
                });
            }
            debug!(stage, "Worker loop exited");
        });
    }

    async fn download_one(self: Arc<Self>, request: Request) {
        let handle = match self.registrar.get(ModuleType::Downloader) {
            Ok(handle) => handle,
            Err(e) => {
                self.send_error(Error::illegal_parameter(format!("couldn't get a downloader: {}", e)), None);
                return;
            }
        };
        let Some(downloader) = handle.as_downloader() else {
            self.send_error(Error::illegal_parameter(format!("{} is not a downloader", handle.id())), None);
            return;
        };

        debug!(downloader = %downloader.id(), depth = request.depth, "Downloading {}", request.url);
        match downloader.download(request).await {
            Ok(response) => {
                if !self.cancelled() {
                    self.enqueue(&self.resp_pool, response, "response");
                }
            }
            Err(e) => self.send_error(e, Some(downloader.id())),
        }
    }

    async fn analyze_one(self: Arc<Self>, response: Response) {
        let handle = match self.registrar.get(ModuleType::Analyzer) {
            Ok(handle) => handle,
            Err(e) => {
                self.send_error(Error::illegal_parameter(format!("couldn't get an analyzer: {}", e)), None);
                return;
            }
        };
        let Some(analyzer) = handle.as_analyzer() else {
            self.send_error(Error::illegal_parameter(format!("{} is not an analyzer", handle.id())), None);
            return;
        };

        let depth = response.depth;
        let (data, errors) = analyzer.analyze(response).await;
        if self.cancelled() {
            return;
        }
        for datum in data {
            match datum {
                // Derived requests sit one level below their response
                Data::Request(request) => self.send_request(request.with_depth(depth.saturating_add(1))),
                Data::Item(item) => self.enqueue(&self.item_pool, item, "item"),
            }
        }
        for e in errors {
            self.send_error(e, Some(analyzer.id()));
        }
    }

    async fn pick_one(self: Arc<Self>, item: Item) {
        let handle = match self.registrar.get(ModuleType::Pipeline) {
            Ok(handle) => handle,
            Err(e) => {
                self.send_error(Error::illegal_parameter(format!("couldn't get a pipeline: {}", e)), None);
                return;
            }
        };
        let Some(pipeline) = handle.as_pipeline() else {
            self.send_error(Error::illegal_parameter(format!("{} is not a pipeline", handle.id())), None);
            return;
        };

        let errors = pipeline.send(item).await;
        if self.cancelled() {
            return;
        }
        for e in errors {
            self.send_error(e, Some(pipeline.id()));
        }
    }

    /// Filter a derived request and queue it when admitted
    fn send_request(self: &Arc<Self>, request: Request) {
        if self.filter.admit(&request).is_accepted() {
            self.enqueue(&self.req_pool, request, "request");
        }
    }

    /// Put a unit into a pool from its own task. The unit counts as in
    /// flight until the worker that picks it up is done with it.
    fn enqueue<T: Send + 'static>(self: &Arc<Self>, pool: &Arc<Pool<T>>, unit: T, what: &'static str) {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let crawl = Arc::clone(self);
        let pool = Arc::clone(pool);

        tokio::spawn(async move {
            if let Err(e) = pool.put(unit).await {
                debug!("Dropped {}: {}", what, e);
                crawl.in_flight.fetch_sub(1, Ordering::AcqRel);
            }
        });
    }

    /// Classify an error by the category of the module that reported it
    /// and put it into the error pool.
    fn send_error(self: &Arc<Self>, e: Error, mid: Option<&Mid>) {
        let kind = match mid.and_then(Mid::module_type) {
            Some(ModuleType::Downloader) => ErrorKind::Downloader,
            Some(ModuleType::Analyzer) => ErrorKind::Analyzer,
            Some(ModuleType::Pipeline) => ErrorKind::Pipeline,
            None => ErrorKind::Scheduler,
        };
        let crawler_error = e.into_crawler_error(kind);
        warn!(module = ?mid.map(Mid::as_str), "{}", crawler_error);

        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let crawl = Arc::clone(self);
        tokio::spawn(async move {
            let _settle = Settle(&crawl.in_flight);
            if let Err(e) = crawl.error_pool.put(crawler_error).await {
                debug!("Dropped crawler error: {}", e);
            }
        });
    }
}

/// Marks one in-flight unit as settled on drop
struct Settle<'a>(&'a AtomicU64);

impl Drop for Settle<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::crawler::status::StatusError;
    use crate::module::{Analyzer, Downloader, ItemProcessor, ModuleBase, Pipeline, ProcessorPipeline};

    struct EchoDownloader {
        base: ModuleBase,
    }

    impl Module for EchoDownloader {
        fn base(&self) -> &ModuleBase {
            &self.base
        }
    }

    #[async_trait]
    impl Downloader for EchoDownloader {
        async fn download(&self, request: Request) -> Result<Response> {
            let _handling = self.base.start_handling();
            self.base.incr_called();
            Ok(Response {
                url: request.url,
                status: 200,
                headers: Default::default(),
                body: Vec::new(),
                depth: request.depth,
            })
        }
    }

    struct FailingAnalyzer {
        base: ModuleBase,
    }

    impl Module for FailingAnalyzer {
        fn base(&self) -> &ModuleBase {
            &self.base
        }
    }

    #[async_trait]
    impl Analyzer for FailingAnalyzer {
        fn parsers(&self) -> Vec<crate::module::ResponseParser> {
            Vec::new()
        }

        async fn analyze(&self, _response: Response) -> (Vec<Data>, Vec<Error>) {
            (Vec::new(), vec![Error::illegal_parameter("unparsable page")])
        }
    }

    fn module_args() -> ModuleArgs {
        let downloader: Arc<dyn Downloader> = Arc::new(EchoDownloader {
            base: ModuleBase::new(Mid::from("D1"), None).unwrap(),
        });
        let analyzer: Arc<dyn Analyzer> = Arc::new(FailingAnalyzer {
            base: ModuleBase::new(Mid::from("A1"), None).unwrap(),
        });
        let keep: ItemProcessor = Arc::new(|item: Item| -> Result<Item> { Ok(item) });
        let pipeline: Arc<dyn Pipeline> =
            Arc::new(ProcessorPipeline::new(Mid::from("P1"), vec![keep], None).unwrap());
        ModuleArgs {
            downloaders: vec![downloader],
            analyzers: vec![analyzer],
            pipelines: vec![pipeline],
        }
    }

    fn request_args() -> RequestArgs {
        RequestArgs {
            accepted_domains: vec!["example.com".to_string()],
            max_depth: 1,
        }
    }

    #[test]
    fn test_start_before_init() {
        let scheduler = Scheduler::new();
        let err = scheduler
            .start(Request::parse("https://example.com/", 0).unwrap())
            .unwrap_err();
        assert_eq!(err, Error::Status(StatusError::NotInitialized));
        assert_eq!(scheduler.status(), Status::Uninitialized);
    }

    #[test]
    fn test_failed_init_rolls_back() {
        let scheduler = Scheduler::new();
        let err = scheduler
            .init(request_args(), DataArgs::default(), ModuleArgs::default())
            .unwrap_err();
        assert!(matches!(err, Error::IllegalParameter(_)));
        assert_eq!(scheduler.status(), Status::Uninitialized);
    }

    #[test]
    fn test_stop_before_start() {
        let scheduler = Scheduler::new();
        scheduler
            .init(request_args(), DataArgs::default(), module_args())
            .unwrap();
        assert_eq!(scheduler.stop(), Err(Error::Status(StatusError::NotStarted)));
        assert_eq!(scheduler.status(), Status::Initialized);
    }

    #[test]
    fn test_start_outside_runtime_is_reported() {
        let scheduler = Scheduler::new();
        scheduler
            .init(request_args(), DataArgs::default(), module_args())
            .unwrap();

        let err = scheduler
            .start(Request::parse("https://example.com/", 0).unwrap())
            .unwrap_err();
        match err {
            Error::Crawler(e) => assert_eq!(e.kind(), ErrorKind::Scheduler),
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(scheduler.status(), Status::Initialized);
    }

    #[tokio::test]
    async fn test_analyzer_errors_reach_error_chan() {
        let scheduler = Scheduler::new();
        scheduler
            .init(request_args(), DataArgs::default(), module_args())
            .unwrap();
        scheduler
            .start(Request::parse("https://www.example.com/", 0).unwrap())
            .unwrap();
        assert_eq!(scheduler.status(), Status::Started);

        let mut errors = scheduler.error_chan().unwrap();
        let crawler_error = tokio::time::timeout(Duration::from_secs(5), errors.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(crawler_error.kind(), ErrorKind::Analyzer);
        assert_eq!(crawler_error.message(), "illegal parameter: unparsable page");

        scheduler.stop().unwrap();
        assert_eq!(scheduler.status(), Status::Stopped);
        assert!(scheduler.error_chan().is_none());
        assert!(tokio::time::timeout(Duration::from_secs(5), errors.recv())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_errors_wait_for_a_live_receiver() {
        let scheduler = Scheduler::new();
        scheduler
            .init(request_args(), DataArgs::default(), module_args())
            .unwrap();
        drop(scheduler.error_chan().unwrap());

        scheduler
            .start(Request::parse("https://example.com/", 0).unwrap())
            .unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while scheduler.summary().error_pool.total == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(scheduler.summary().error_pool.total, 1);

        let mut errors = scheduler.error_chan().unwrap();
        let crawler_error = tokio::time::timeout(Duration::from_secs(5), errors.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(crawler_error.kind(), ErrorKind::Analyzer);
        assert_eq!(scheduler.summary().error_pool.total, 0);
        scheduler.stop().unwrap();
    }

    #[tokio::test]
    async fn test_restart_needs_init() {
        let scheduler = Scheduler::new();
        scheduler
            .init(request_args(), DataArgs::default(), module_args())
            .unwrap();
        scheduler
            .start(Request::parse("https://example.com/", 0).unwrap())
            .unwrap();
        scheduler.stop().unwrap();

        assert_eq!(
            scheduler.start(Request::parse("https://example.com/", 0).unwrap()),
            Err(Error::ClosedPool)
        );
        assert_eq!(scheduler.status(), Status::Stopped);

        scheduler
            .init(request_args(), DataArgs::default(), module_args())
            .unwrap();
        scheduler
            .start(Request::parse("https://example.com/", 0).unwrap())
            .unwrap();
        assert_eq!(scheduler.summary().num_urls, 1);
        scheduler.stop().unwrap();
    }

    #[tokio::test]
    async fn test_rejects_uncrawlable_first_request() {
        let scheduler = Scheduler::new();
        scheduler
            .init(request_args(), DataArgs::default(), module_args())
            .unwrap();
        let err = scheduler
            .start(Request::parse("ftp://example.com/file", 0).unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::IllegalParameter(_)));
        assert_eq!(scheduler.status(), Status::Initialized);
    }

    #[tokio::test]
    async fn test_summary_reports_modules() {
        let scheduler = Scheduler::new();
        assert_eq!(scheduler.summary().status, Status::Uninitialized);

        scheduler
            .init(request_args(), DataArgs::default(), module_args())
            .unwrap();
        let summary = scheduler.summary();
        assert_eq!(summary.status, Status::Initialized);
        assert_eq!(summary.modules.downloaders.len(), 1);
        assert_eq!(summary.modules.analyzers[0].id, Mid::from("A1"));
        assert_eq!(summary.request_pool.buffer_number, 1);
        assert_eq!(summary.error_pool.max_buffer_number, 1);
        assert_eq!(summary, scheduler.summary());
        assert!(scheduler.idle());
    }
}
