// ledgerdesk-api: async REST client, query descriptors, and real-time topics

pub mod client;
pub mod error;
pub mod query;
pub mod realtime;
pub mod resource;
pub mod transport;

pub use client::ApiClient;
pub use error::{Error, FieldErrors};
pub use query::{
    FilterDataType, FilterDescriptor, FilterField, FilterMode, PageInfo, PageQuery, Paginated,
    SortDescriptor, SortDirection, SortField,
};
pub use realtime::{
    EventKind, RealtimeHandle, RealtimeStatus, ReconnectConfig, Scope, Topic, TopicEvent,
};
pub use resource::Resource;
pub use transport::{TlsMode, TransportConfig};
