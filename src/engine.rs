//! Publication of assembled documents to concurrent readers.
//!
//! The engine owns the catalog and the builder. In one-shot mode the first
//! request builds the document and every later one shares it. In live mode
//! each request assembles a new document against a fresh registry and swaps
//! it in. Readers only ever hold a complete `Arc`, so a swap never exposes a
//! partially built document.

use crate::config::Config;
use crate::descriptor::TypeCatalog;
use crate::error::Degradation;
use crate::openapi_builder::{OpenApiBuilder, OpenApiDocument};
use log::{debug, info};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// One published build.
#[derive(Debug)]
pub struct Build {
    pub document: Arc<OpenApiDocument>,
    pub degradations: Vec<Degradation>,
    /// 1 for the first build, incremented on every rebuild
    pub generation: usize,
}

pub struct DocsEngine {
    catalog: TypeCatalog,
    builder: OpenApiBuilder,
    live: bool,
    published: RwLock<Option<Arc<Build>>>,
    generations: AtomicUsize,
}

impl DocsEngine {
    /// Engine over `catalog`; live mode comes from `config.live`.
    pub fn new(catalog: TypeCatalog, config: Config) -> Self {
        let live = config.live;
        Self {
            catalog,
            builder: OpenApiBuilder::from_config(config),
            live,
            published: RwLock::new(None),
            generations: AtomicUsize::new(0),
        }
    }

    pub fn with_live(mut self, live: bool) -> Self {
        self.live = live;
        self
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    /// The current document, building or rebuilding it as the mode requires.
    pub fn document(&self) -> Arc<OpenApiDocument> {
        Arc::clone(&self.build().document)
    }

    /// The current build with its degradations.
    pub fn build(&self) -> Arc<Build> {
        if self.live {
            return self.rebuild();
        }

        if let Some(build) = self.published() {
            return build;
        }

        let mut slot = self.published.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have built while we waited for the lock
        if let Some(build) = slot.as_ref() {
            return Arc::clone(build);
        }
        let build = self.assemble();
        *slot = Some(Arc::clone(&build));
        build
    }

    /// Assemble a new document and publish it, replacing the previous one.
    ///
    /// Assembly runs outside the lock; the write lock is held only for the swap.
    pub fn rebuild(&self) -> Arc<Build> {
        let build = self.assemble();
        let mut slot = self.published.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::clone(&build));
        debug!("Published document generation {}", build.generation);
        build
    }

    /// How many documents have been assembled so far
    pub fn generations(&self) -> usize {
        self.generations.load(Ordering::SeqCst)
    }

    /// The last published build, if any, without building.
    pub fn published(&self) -> Option<Arc<Build>> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn assemble(&self) -> Arc<Build> {
        let assembly = self.builder.build(&self.catalog);
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            "Built document generation {} ({} degradations)",
            generation,
            assembly.degradations.len()
        );
        Arc::new(Build {
            document: Arc::new(assembly.document),
            degradations: assembly.degradations,
            generation,
        })
    }
}
