//! Handle to one series owned by a chart widget.

use std::fmt;
use std::rc::Rc;

use charter_core::SeriesData;

use crate::render::{SeriesApi, SeriesKind, SeriesOptions};

/// A renderer series together with the kind and options it was created with.
///
/// Cloning shares the underlying series; identity is pointer identity.
#[derive(Clone)]
pub struct SeriesHandle {
    kind: SeriesKind,
    options: SeriesOptions,
    api: Rc<dyn SeriesApi>,
}

impl SeriesHandle {
    pub fn new(kind: SeriesKind, options: SeriesOptions, api: Rc<dyn SeriesApi>) -> Self {
        Self { kind, options, api }
    }

    pub fn kind(&self) -> SeriesKind {
        self.kind
    }

    /// Options the series was created with.
    pub fn options(&self) -> &SeriesOptions {
        &self.options
    }

    pub fn api(&self) -> &Rc<dyn SeriesApi> {
        &self.api
    }

    pub fn set_data(&self, data: &SeriesData) -> anyhow::Result<()> {
        self.api.set_data(data)
    }

    pub fn apply_options(&self, options: &SeriesOptions) -> anyhow::Result<()> {
        self.api.apply_options(options)
    }

    pub fn ptr_eq(&self, other: &SeriesHandle) -> bool {
        Rc::ptr_eq(&self.api, &other.api)
    }
}

impl fmt::Debug for SeriesHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeriesHandle")
            .field("kind", &self.kind)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
