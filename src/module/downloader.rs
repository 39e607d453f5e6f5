use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::errors::{CrawlerError, ErrorKind, Error, Result};
use crate::module::base::{CalculateScore, Downloader, Module, ModuleBase};
use crate::module::data::{Request, Response};
use crate::module::mid::{Mid, ModuleType};

/// Downloader backed by a reqwest client
pub struct HttpDownloader {
    base: ModuleBase,
    client: Client,
}

impl HttpDownloader {
    pub fn new(mid: Mid, client: Client, score_calculator: Option<CalculateScore>) -> Result<Self> {
        let base = ModuleBase::new(mid, score_calculator)?;
        if base.module_type() != ModuleType::Downloader {
            return Err(Error::illegal_parameter(format!(
                "not a downloader ID: {}",
                base.id()
            )));
        }
        Ok(Self { base, client })
    }
}

impl Module for HttpDownloader {
    fn base(&self) -> &ModuleBase {
        &self.base
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, request: Request) -> Result<Response> {
        let _handling = self.base.start_handling();
        self.base.incr_called();

        let scheme = request.url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(Error::illegal_parameter(format!(
                "unsupported URL scheme: {}",
                request.url
            )));
        }
        self.base.incr_accepted();

        debug!(url = %request.url, depth = request.depth, "Downloading");
        let http_response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .send()
            .await
            .map_err(|e| CrawlerError::new(ErrorKind::Downloader, e.to_string()))?;

        let status = http_response.status().as_u16();
        let headers = http_response.headers().clone();
        let body = http_response
            .bytes()
            .await
            .map_err(|e| CrawlerError::new(ErrorKind::Downloader, e.to_string()))?;

        self.base.incr_completed();

        Ok(Response {
            url: request.url,
            status,
            headers,
            body: body.to_vec(),
            depth: request.depth,
        })
    }
}
