// This file is part of LaminaDB.
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::constants::{KIND_FIELD, STREAM_ID_FIELD};
use crate::error::{Error, Result};

/// Identity of a stored document, the handle used for replace-in-place.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentLink(u64);

impl fmt::Display for DocumentLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "docs/{}", self.0)
    }
}

/// A document body together with its store identity.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub link: DocumentLink,
    pub body: Value,
}

/// Document operations available inside one atomic scope.
///
/// Every write performed through a scope is either committed as a whole or
/// discarded as a whole: [`commit`](StoreScope::commit) applies them,
/// dropping the scope without committing discards them. This is the
/// contract the append procedure relies on for rollback.
///
/// `create` and `replace` distinguish "not accepted" (the store is out of
/// throughput; `None`/`false`) from hard failure (`Err`), matching how
/// partitioned document stores report capacity exhaustion.
pub trait StoreScope {
    /// Equality-filtered lookup by stream id and record-kind discriminator.
    /// Observes writes staged earlier in this scope.
    fn query(&mut self, stream_id: &str, kind: &str) -> Result<Vec<StoredDocument>>;

    /// Stages a new document. Returns its link, or `None` if the store
    /// refused the write.
    fn create(&mut self, body: Value) -> Result<Option<DocumentLink>>;

    /// Stages a replace of an existing document. Returns `false` if the
    /// store refused the write; replacing an unknown link is a hard error.
    fn replace(&mut self, link: &DocumentLink, body: Value) -> Result<bool>;

    /// Applies every staged write. Consumes the scope.
    fn commit(self) -> Result<()>;
}

/// A container that can open atomic scopes.
pub trait Container {
    type Scope<'a>: StoreScope
    where
        Self: 'a;

    fn begin(&mut self) -> Result<Self::Scope<'_>>;
}

/// Configuration for [`MemoryContainer`].
#[derive(Debug, Clone, Default)]
pub struct MemoryConfig {
    /// Per-scope write budget; each accepted create/replace consumes one
    /// unit. `None` means unlimited. Exhaustion surfaces as "not accepted",
    /// the same signal a throttled document store gives.
    pub request_units: Option<u64>,
    /// When set, every lookup fails with a store error.
    pub fail_lookups: bool,
}

/// In-memory document container.
///
/// Holds one container's committed documents and hands out write scopes
/// with staged-write semantics. Doubles as the simulated store for fault
/// testing: see [`MemoryConfig::request_units`] and
/// [`MemoryConfig::fail_lookups`].
#[derive(Debug, Default)]
pub struct MemoryContainer {
    docs: BTreeMap<u64, Value>,
    next_link: u64,
    config: MemoryConfig,
}

impl MemoryContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MemoryConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Number of committed documents.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Committed documents matching the given stream id and kind, in
    /// creation order. Reads only committed state; staged writes in an open
    /// scope are not visible here.
    pub fn find(&self, stream_id: &str, kind: &str) -> Vec<StoredDocument> {
        self.docs
            .iter()
            .filter(|(_, body)| matches(body, stream_id, kind))
            .map(|(id, body)| StoredDocument {
                link: DocumentLink(*id),
                body: body.clone(),
            })
            .collect()
    }

    /// Adjusts the per-scope write budget for scopes opened after this call.
    pub fn set_request_units(&mut self, units: Option<u64>) {
        self.config.request_units = units;
    }

    /// Makes subsequent lookups fail with a store error.
    pub fn set_fail_lookups(&mut self, fail: bool) {
        self.config.fail_lookups = fail;
    }
}

impl Container for MemoryContainer {
    type Scope<'a>
        = MemoryScope<'a>
    where
        Self: 'a;

    fn begin(&mut self) -> Result<MemoryScope<'_>> {
        let units_left = self.config.request_units;
        Ok(MemoryScope {
            container: self,
            staged: Vec::new(),
            fresh_links: 0,
            units_left,
        })
    }
}

/// One atomic scope over a [`MemoryContainer`].
///
/// Mutably borrows the container for its lifetime, so at most one scope is
/// open at a time. This is the single-threaded execution a partitioned
/// store guarantees its procedures, enforced here by the borrow checker.
pub struct MemoryScope<'a> {
    container: &'a mut MemoryContainer,
    staged: Vec<(u64, Value)>,
    fresh_links: u64,
    units_left: Option<u64>,
}

impl MemoryScope<'_> {
    fn charge_unit(&mut self) -> bool {
        match self.units_left {
            None => true,
            Some(0) => false,
            Some(n) => {
                self.units_left = Some(n - 1);
                true
            }
        }
    }

    fn knows_link(&self, id: u64) -> bool {
        self.container.docs.contains_key(&id) || self.staged.iter().any(|(sid, _)| *sid == id)
    }
}

impl StoreScope for MemoryScope<'_> {
    fn query(&mut self, stream_id: &str, kind: &str) -> Result<Vec<StoredDocument>> {
        if self.container.config.fail_lookups {
            return Err(Error::Store("lookup failed".to_string()));
        }
        let mut merged: BTreeMap<u64, &Value> = self
            .container
            .docs
            .iter()
            .map(|(id, body)| (*id, body))
            .collect();
        for (id, body) in &self.staged {
            merged.insert(*id, body);
        }
        Ok(merged
            .into_iter()
            .filter(|(_, body)| matches(body, stream_id, kind))
            .map(|(id, body)| StoredDocument {
                link: DocumentLink(id),
                body: body.clone(),
            })
            .collect())
    }

    fn create(&mut self, body: Value) -> Result<Option<DocumentLink>> {
        if !self.charge_unit() {
            return Ok(None);
        }
        let id = self.container.next_link + self.fresh_links;
        self.fresh_links += 1;
        self.staged.push((id, body));
        Ok(Some(DocumentLink(id)))
    }

    fn replace(&mut self, link: &DocumentLink, body: Value) -> Result<bool> {
        if !self.knows_link(link.0) {
            return Err(Error::Store(format!("replace target {link} not found")));
        }
        if !self.charge_unit() {
            return Ok(false);
        }
        self.staged.push((link.0, body));
        Ok(true)
    }

    fn commit(self) -> Result<()> {
        for (id, body) in self.staged {
            self.container.docs.insert(id, body);
        }
        self.container.next_link += self.fresh_links;
        Ok(())
    }
}

fn matches(body: &Value, stream_id: &str, kind: &str) -> bool {
    body.get(STREAM_ID_FIELD).and_then(Value::as_str) == Some(stream_id)
        && body.get(KIND_FIELD).and_then(Value::as_str) == Some(kind)
}
