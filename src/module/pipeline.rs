use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::debug;

use crate::errors::{Error, Result};
use crate::module::base::{CalculateScore, ItemProcessor, Module, ModuleBase, Pipeline};
use crate::module::data::Item;
use crate::module::mid::{Mid, ModuleType};

/// Pipeline passing each item through its processors in order
pub struct ProcessorPipeline {
    base: ModuleBase,
    processors: Vec<ItemProcessor>,
    fail_fast: AtomicBool,
}

impl ProcessorPipeline {
    pub fn new(
        mid: Mid,
        processors: Vec<ItemProcessor>,
        score_calculator: Option<CalculateScore>,
    ) -> Result<Self> {
        let base = ModuleBase::new(mid, score_calculator)?;
        if base.module_type() != ModuleType::Pipeline {
            return Err(Error::illegal_parameter(format!(
                "not a pipeline ID: {}",
                base.id()
            )));
        }
        if processors.is_empty() {
            return Err(Error::illegal_parameter("empty item processor list"));
        }
        Ok(Self {
            base,
            processors,
            fail_fast: AtomicBool::new(false),
        })
    }
}

impl Module for ProcessorPipeline {
    fn base(&self) -> &ModuleBase {
        &self.base
    }
}

#[async_trait]
impl Pipeline for ProcessorPipeline {
    fn processors(&self) -> Vec<ItemProcessor> {
        self.processors.clone()
    }

    fn fail_fast(&self) -> bool {
        self.fail_fast.load(Ordering::Acquire)
    }

    fn set_fail_fast(&self, fail_fast: bool) {
        self.fail_fast.store(fail_fast, Ordering::Release);
    }

    async fn send(&self, item: Item) -> Vec<Error> {
        let _handling = self.base.start_handling();
        self.base.incr_called();
        self.base.incr_accepted();

        let mut errors = Vec::new();
        let mut current = item;
        for (index, processor) in self.processors.iter().enumerate() {
            // A failing processor leaves the item as it was
            match processor(current.clone()) {
                Ok(processed) => current = processed,
                Err(e) => {
                    debug!(processor = index, "Item processor failed: {}", e);
                    errors.push(e);
                    if self.fail_fast() {
                        break;
                    }
                }
            }
        }

        if errors.is_empty() {
            self.base.incr_completed();
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use super::*;

    fn counting(counter: Arc<AtomicUsize>) -> ItemProcessor {
        Arc::new(move |item: Item| -> Result<Item> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(item)
        })
    }

    fn failing() -> ItemProcessor {
        Arc::new(|_item: Item| -> Result<Item> { Err(Error::illegal_parameter("rejected item")) })
    }

    #[test]
    fn test_requires_processors() {
        assert!(ProcessorPipeline::new(Mid::from("P1"), Vec::new(), None).is_err());
    }

    #[tokio::test]
    async fn test_processors_run_in_order() {
        let add_tag: ItemProcessor = Arc::new(|mut item: Item| -> Result<Item> {
            item.insert("tag".into(), "seen".into());
            Ok(item)
        });
        let check_tag: ItemProcessor = Arc::new(|item: Item| -> Result<Item> {
            if item.contains_key("tag") {
                Ok(item)
            } else {
                Err(Error::illegal_parameter("missing tag"))
            }
        });
        let pipeline = ProcessorPipeline::new(Mid::from("P1"), vec![add_tag, check_tag], None).unwrap();

        assert!(pipeline.send(Item::new()).await.is_empty());
        assert_eq!(pipeline.counts().completed, 1);
    }

    #[tokio::test]
    async fn test_fail_fast_stops_remaining_processors() {
        let counter = Arc::new(AtomicUsize::new(0));
        let pipeline = ProcessorPipeline::new(
            Mid::from("P1"),
            vec![failing(), counting(counter.clone())],
            None,
        )
        .unwrap();

        assert_eq!(pipeline.send(Item::new()).await.len(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        pipeline.set_fail_fast(true);
        assert!(pipeline.fail_fast());
        assert_eq!(pipeline.send(Item::new()).await.len(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.counts().completed, 0);
    }
}
