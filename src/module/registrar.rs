use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use crate::errors::{Error, Result};
use crate::module::base::ModuleHandle;
use crate::module::mid::{Mid, ModuleType};

/// Registry of module instances, grouped by category
#[derive(Debug, Default)]
pub struct Registrar {
    modules: RwLock<HashMap<ModuleType, HashMap<Mid, ModuleHandle>>>,
}

impl Registrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module instance.
    ///
    /// The category encoded in the module's ID must match its runtime
    /// category. Registering an ID twice returns `Ok(false)`.
    pub fn register(&self, module: ModuleHandle) -> Result<bool> {
        let mid = module.id().clone();
        let (encoded_type, _, _) = mid.split()?;
        if encoded_type != module.module_type() {
            return Err(Error::illegal_parameter(format!(
                "incorrect module type: {} (MID: {})",
                module.module_type(),
                mid
            )));
        }

        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        let instances = modules.entry(encoded_type).or_default();
        if instances.contains_key(&mid) {
            return Ok(false);
        }
        debug!(mid = %mid, "Registered {} instance", encoded_type);
        instances.insert(mid, module);

        Ok(true)
    }

    /// Remove the instance with the given ID. Returns whether one was removed.
    pub fn unregister(&self, mid: &Mid) -> Result<bool> {
        let (module_type, _, _) = mid.split()?;

        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        let removed = modules
            .get_mut(&module_type)
            .map(|instances| instances.remove(mid).is_some())
            .unwrap_or(false);

        Ok(removed)
    }

    /// Pick the least loaded instance of a category.
    ///
    /// Every candidate's score is recomputed from its counters first. Among
    /// equal scores the first one seen wins; map iteration order makes that
    /// choice arbitrary.
    pub fn get(&self, module_type: ModuleType) -> Result<ModuleHandle> {
        let modules = self.get_all_by_type(module_type)?;

        let mut selected: Option<(u64, ModuleHandle)> = None;
        for module in modules.into_values() {
            module.base().refresh_score();
            let score = module.base().score();
            match &selected {
                Some((min_score, _)) if score >= *min_score => {}
                _ => selected = Some((score, module)),
            }
        }

        selected
            .map(|(_, module)| module)
            .ok_or(Error::ModuleNotFound)
    }

    /// All instances of a category; fails with `ModuleNotFound` if there
    /// are none
    pub fn get_all_by_type(&self, module_type: ModuleType) -> Result<HashMap<Mid, ModuleHandle>> {
        let modules = self.modules.read().unwrap_or_else(PoisonError::into_inner);
        match modules.get(&module_type) {
            Some(instances) if !instances.is_empty() => Ok(instances.clone()),
            _ => Err(Error::ModuleNotFound),
        }
    }

    /// Every registered instance
    pub fn get_all(&self) -> HashMap<Mid, ModuleHandle> {
        let modules = self.modules.read().unwrap_or_else(PoisonError::into_inner);
        modules
            .values()
            .flat_map(|instances| instances.iter())
            .map(|(mid, module)| (mid.clone(), module.clone()))
            .collect()
    }

    /// Drop every registration
    pub fn clear(&self) {
        self.modules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::module::base::{Downloader, Module, ModuleBase, Pipeline, ItemProcessor};
    use crate::module::data::{Item, Request, Response};

    struct FakeDownloader {
        base: ModuleBase,
    }

    impl Module for FakeDownloader {
        fn base(&self) -> &ModuleBase {
            &self.base
        }
    }

    #[async_trait]
    impl Downloader for FakeDownloader {
        async fn download(&self, _request: Request) -> Result<Response> {
            Err(Error::illegal_parameter("not used"))
        }
    }

    struct FakePipeline {
        base: ModuleBase,
    }

    impl Module for FakePipeline {
        fn base(&self) -> &ModuleBase {
            &self.base
        }
    }

    #[async_trait]
    impl Pipeline for FakePipeline {
        fn processors(&self) -> Vec<ItemProcessor> {
            Vec::new()
        }

        fn fail_fast(&self) -> bool {
            false
        }

        fn set_fail_fast(&self, _fail_fast: bool) {}

        async fn send(&self, _item: Item) -> Vec<Error> {
            Vec::new()
        }
    }

    fn downloader(mid: &str) -> (Arc<FakeDownloader>, ModuleHandle) {
        let module = Arc::new(FakeDownloader {
            base: ModuleBase::new(Mid::from(mid), None).unwrap(),
        });
        let handle = ModuleHandle::Downloader(module.clone());
        (module, handle)
    }

    #[test]
    fn test_register_and_reregister() {
        let registrar = Registrar::new();
        let (_, handle) = downloader("D1");

        assert_eq!(registrar.register(handle.clone()), Ok(true));
        assert_eq!(registrar.register(handle), Ok(false));
        assert_eq!(registrar.get_all().len(), 1);
    }

    #[test]
    fn test_register_rejects_category_mismatch() {
        let registrar = Registrar::new();

        // A pipeline posing as a downloader by ID
        let module = Arc::new(FakePipeline {
            base: ModuleBase::new(Mid::from("D2"), None).unwrap(),
        });
        let result = registrar.register(ModuleHandle::Pipeline(module));

        assert!(matches!(result, Err(Error::IllegalParameter(_))));
        assert!(registrar.get_all().is_empty());
    }

    #[test]
    fn test_unregister() {
        let registrar = Registrar::new();
        let (_, handle) = downloader("D1");
        registrar.register(handle).unwrap();

        assert_eq!(registrar.unregister(&Mid::from("D1")), Ok(true));
        assert_eq!(registrar.unregister(&Mid::from("D1")), Ok(false));
        assert!(registrar.unregister(&Mid::from("nope")).is_err());
    }

    #[test]
    fn test_missing_category() {
        let registrar = Registrar::new();
        assert_eq!(
            registrar.get_all_by_type(ModuleType::Analyzer).err(),
            Some(Error::ModuleNotFound)
        );
        assert_eq!(
            registrar.get(ModuleType::Analyzer).err(),
            Some(Error::ModuleNotFound)
        );
    }

    #[test]
    fn test_get_rotates_away_from_busy_instance() {
        let registrar = Registrar::new();
        let modules: Vec<_> = (1..=3).map(|i| downloader(&format!("D{}", i))).collect();
        for (_, handle) in &modules {
            registrar.register(handle.clone()).unwrap();
        }

        let mut picked = Vec::new();
        for _ in 0..3 {
            let selected = registrar.get(ModuleType::Downloader).unwrap();
            // Simulate work on whatever was handed out
            selected.base().incr_called();
            selected.base().incr_accepted();
            picked.push(selected.id().clone());
        }

        picked.sort();
        picked.dedup();
        assert_eq!(picked.len(), 3, "each instance should be picked once");
    }

    #[test]
    fn test_get_prefers_idle_over_in_flight() {
        let registrar = Registrar::new();
        let (busy, busy_handle) = downloader("D1");
        let (_, idle_handle) = downloader("D2");
        registrar.register(busy_handle).unwrap();
        registrar.register(idle_handle).unwrap();

        let _guard = busy.base().start_handling();
        for _ in 0..5 {
            let selected = registrar.get(ModuleType::Downloader).unwrap();
            assert_eq!(selected.id().as_str(), "D2");
        }
    }

    #[test]
    fn test_clear() {
        let registrar = Registrar::new();
        registrar.register(downloader("D1").1).unwrap();
        registrar.clear();
        assert!(registrar.get_all().is_empty());
    }
}
