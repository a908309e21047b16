//! Zerograph Graph — batched client for Zerograph graph services.
//!
//! A [`Graph`] owns one connection to a graph database served by Zerograph.
//! Requests are pipelined through a [`Batch`]; each appended request yields a
//! [`Pointer`] that later requests in the same batch may use in place of an
//! entity id. Replies are hydrated into [`Node`], [`Relationship`] and
//! [`Path`] proxies that are identity-mapped per graph: two results carrying
//! the same remote id are the same local object.

pub mod batch;
mod cache;
pub mod client;
pub mod cypher;
pub mod entity;
pub mod hydrate;
pub mod mutations;
pub mod queries;
pub mod sync;
pub mod transport;
pub mod value;

pub use batch::{Batch, Reply, Response, Results, Target};
pub use client::Graph;
pub use entity::{
    Bindable, Binding, Entity, Node, Path, PathElement, PropertyHolder, Relationship, Segment,
};
pub use sync::{CreateBatch, DeleteBatch, PullBatch, PushBatch};
pub use transport::{Frame, MemoryTransport, Transport, ZmqTransport};
pub use value::{GraphAddress, Table, Value};

pub use zerograph_core::{
    ClientConfig, GraphError, Method, Pointer, PropertySet, RemoteError, Request, Resource,
    Result, Status,
};
