//! Collaborators shared by every download of a session.
//!
//! One [`Context`] is built per session and borrowed by the engine and the
//! orchestrators; there is no process-wide state.

use std::sync::Arc;

use crate::{
    catalog::{Catalog, MediaApi},
    config::{ResolvePolicy, Secrets},
    convert::Converter,
    events::{Event, Reporter},
    fetch::Fetcher,
    inflight::InFlight,
    resolver::Resolver,
    tagging::Tagger,
};

#[derive(Clone)]
pub struct Context {
    pub catalog: Arc<dyn Catalog>,
    pub media: Arc<dyn MediaApi>,
    pub fetcher: Arc<dyn Fetcher>,
    pub tagger: Arc<dyn Tagger>,
    pub converter: Arc<dyn Converter>,
    pub reporter: Arc<dyn Reporter>,
    pub in_flight: InFlight,
    pub secrets: Secrets,
    pub resolve: ResolvePolicy,
}

impl Context {
    #[must_use]
    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(self.media.as_ref(), &self.secrets, self.resolve)
    }

    pub fn report(&self, event: &Event) {
        self.reporter.report(event);
    }
}
