use async_trait::async_trait;
use tracing::debug;

use crate::errors::{Error, Result};
use crate::module::base::{Analyzer, CalculateScore, Module, ModuleBase, ResponseParser};
use crate::module::data::{Data, Response};
use crate::module::mid::{Mid, ModuleType};

/// Analyzer running every configured response parser over each response
pub struct ParserAnalyzer {
    base: ModuleBase,
    parsers: Vec<ResponseParser>,
}

impl ParserAnalyzer {
    pub fn new(
        mid: Mid,
        parsers: Vec<ResponseParser>,
        score_calculator: Option<CalculateScore>,
    ) -> Result<Self> {
        let base = ModuleBase::new(mid, score_calculator)?;
        if base.module_type() != ModuleType::Analyzer {
            return Err(Error::illegal_parameter(format!(
                "not an analyzer ID: {}",
                base.id()
            )));
        }
        if parsers.is_empty() {
            return Err(Error::illegal_parameter("empty response parser list"));
        }
        Ok(Self { base, parsers })
    }
}

impl Module for ParserAnalyzer {
    fn base(&self) -> &ModuleBase {
        &self.base
    }
}

#[async_trait]
impl Analyzer for ParserAnalyzer {
    fn parsers(&self) -> Vec<ResponseParser> {
        self.parsers.clone()
    }

    async fn analyze(&self, response: Response) -> (Vec<Data>, Vec<Error>) {
        let _handling = self.base.start_handling();
        self.base.incr_called();
        self.base.incr_accepted();

        debug!(url = %response.url, depth = response.depth, "Parsing response");

        let mut data_list = Vec::new();
        let mut errors = Vec::new();
        for parser in &self.parsers {
            let (parsed, parse_errors) = parser(&response, response.depth);
            data_list.extend(parsed.into_iter().map(|data| place_below(data, response.depth)));
            errors.extend(parse_errors);
        }

        if errors.is_empty() {
            self.base.incr_completed();
        }
        (data_list, errors)
    }
}

/// Requests derived from a response always sit one level below it
fn place_below(data: Data, response_depth: u32) -> Data {
    match data {
        Data::Request(request) if request.depth != response_depth + 1 => {
            Data::Request(request.with_depth(response_depth + 1))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use reqwest::header::HeaderMap;
    use url::Url;

    use super::*;
    use crate::module::data::{Item, Request};

    fn response(depth: u32) -> Response {
        Response {
            url: Url::parse("https://example.com/").unwrap(),
            status: 200,
            headers: HeaderMap::new(),
            body: b"body".to_vec(),
            depth,
        }
    }

    #[test]
    fn test_requires_parsers() {
        assert!(ParserAnalyzer::new(Mid::from("A1"), Vec::new(), None).is_err());
    }

    #[tokio::test]
    async fn test_fixes_derived_request_depth() {
        let parser: ResponseParser = Arc::new(|_resp: &Response, _depth: u32| {
            let request = Request::parse("https://example.com/child", 0).unwrap();
            let mut item = Item::new();
            item.insert("k".into(), "v".into());
            (vec![Data::Request(request), Data::Item(item)], Vec::new())
        });
        let analyzer = ParserAnalyzer::new(Mid::from("A1"), vec![parser], None).unwrap();

        let (data, errors) = analyzer.analyze(response(3)).await;
        assert!(errors.is_empty());
        assert_eq!(data.len(), 2);
        match &data[0] {
            Data::Request(request) => assert_eq!(request.depth, 4),
            other => panic!("expected a request, got {:?}", other),
        }
        assert_eq!(analyzer.counts().completed, 1);
        assert_eq!(analyzer.counts().handling, 0);
    }

    #[tokio::test]
    async fn test_parser_errors_are_collected() {
        let failing: ResponseParser = Arc::new(|_resp: &Response, _depth: u32| {
            (Vec::new(), vec![Error::illegal_parameter("bad html")])
        });
        let quiet: ResponseParser =
            Arc::new(|_resp: &Response, _depth: u32| (Vec::new(), Vec::new()));
        let analyzer = ParserAnalyzer::new(Mid::from("A2"), vec![failing, quiet], None).unwrap();
        assert_eq!(analyzer.parsers().len(), 2);

        let (data, errors) = analyzer.analyze(response(0)).await;
        assert!(data.is_empty());
        assert_eq!(errors.len(), 1);

        let counts = analyzer.counts();
        assert_eq!((counts.called, counts.accepted, counts.completed), (1, 1, 0));
    }
}
