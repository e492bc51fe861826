//! Tuple-keyed connection table.

use std::fmt;
use std::net::Ipv4Addr;

use dashmap::DashMap;
use dashmap::mapref::one::RefMut;

use crate::connection::ConnRecord;

/// Addressing tuple identifying one emulated TCP stream.
///
/// Unique at any instant; a tuple may be reused after the previous
/// connection closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub src_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_ip: Ipv4Addr,
    pub dst_port: u16,
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} -> {}:{}", self.src_ip, self.src_port, self.dst_ip, self.dst_port)
    }
}

/// Connection records keyed by flow tuple.
///
/// Insertion, removal and lookup must stay safe under concurrent arrival and
/// teardown events; the map shards internally, and callers never hold a
/// guard across an await point.
#[derive(Debug, Default)]
pub(crate) struct ConnTable {
    inner: DashMap<FlowKey, ConnRecord>,
}

impl ConnTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, key: FlowKey, record: ConnRecord) {
        self.inner.insert(key, record);
    }

    pub(crate) fn remove(&self, key: &FlowKey) -> Option<ConnRecord> {
        self.inner.remove(key).map(|(_key, record)| record)
    }

    pub(crate) fn get_mut(&self, key: &FlowKey) -> Option<RefMut<'_, FlowKey, ConnRecord>> {
        self.inner.get_mut(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.len()
    }
}
