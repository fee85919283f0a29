//! Explicit application context shared by every chart widget.

use std::rc::Rc;

use charter_config::Config;

use crate::registry::ChartRegistry;
use crate::render::ChartLibrary;
use crate::scheduler::Scheduler;
use crate::sync::coordinator::SyncCoordinator;

/// Everything a widget needs from its environment: the rendering library,
/// a scheduler for deferred work, configuration, the chart registry and the
/// viewport coordinator.
///
/// Built once by the application and passed to each widget. Cloning shares
/// the same registry and coordinator.
#[derive(Clone)]
pub struct ChartContext {
    library: Option<Rc<dyn ChartLibrary>>,
    scheduler: Rc<dyn Scheduler>,
    config: Rc<Config>,
    registry: Rc<ChartRegistry>,
    coordinator: Rc<SyncCoordinator>,
}

impl ChartContext {
    /// `library` is `None` when no renderer is available; widgets then fail
    /// to create with `LibraryUnavailable`.
    pub fn new(library: Option<Rc<dyn ChartLibrary>>, scheduler: Rc<dyn Scheduler>, config: Config) -> Self {
        let coordinator = SyncCoordinator::new(config.sync.clone());
        Self {
            library,
            scheduler,
            config: Rc::new(config),
            registry: Rc::new(ChartRegistry::new()),
            coordinator,
        }
    }

    pub fn library(&self) -> Option<Rc<dyn ChartLibrary>> {
        self.library.clone()
    }

    pub fn scheduler(&self) -> Rc<dyn Scheduler> {
        Rc::clone(&self.scheduler)
    }

    pub fn config(&self) -> Rc<Config> {
        Rc::clone(&self.config)
    }

    pub fn registry(&self) -> &Rc<ChartRegistry> {
        &self.registry
    }

    pub fn coordinator(&self) -> &Rc<SyncCoordinator> {
        &self.coordinator
    }
}
