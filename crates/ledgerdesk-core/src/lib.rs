// ledgerdesk-core: query cache, CRUD data layer, table and form state between ledgerdesk-api and consumers (CLI).

pub mod bridge;
pub mod config;
pub mod data_layer;
pub mod draft;
pub mod error;
pub mod form;
pub mod key;
pub mod model;
pub mod mutation;
pub mod notify;
pub mod query;
pub mod query_client;
pub mod session;
pub mod table;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bridge::{InvalidationBridge, Subscription};
pub use config::{ClientConfig, TlsVerification};
pub use data_layer::{DataLayer, DataLayerConfig};
pub use draft::{DraftRow, DraftRows, DraftState, RowId};
pub use error::{CoreError, ErrorKind};
pub use form::{EntityForm, FormActivity, FormMode, FormProps};
pub use key::QueryKey;
pub use mutation::{Mutation, MutationOptions, invalidate_lists};
pub use notify::{Notifier, RecordingNotifier, Toast, ToastLevel, TracingNotifier};
pub use query::{Query, QueryOptions, QueryResult, QueryStatus};
pub use query_client::{CacheEvent, FetchOptions, MutationTicket, QueryClient, QueryClientConfig};
pub use session::{ConnectionState, Session};
pub use table::{PaginationState, RowSelection, TablePreferences, TableState, Updater};

pub use model::{
    AccountSummary, EntityId, Holiday, HolidayRequest, Record, UserSummary, Voucher, VoucherEntry,
    VoucherEntryRequest, VoucherRequest, VoucherStatus,
};

// Wire-level query types consumers need alongside the data layer.
pub use ledgerdesk_api::{
    FilterDataType, FilterDescriptor, FilterField, FilterMode, PageQuery, Paginated,
    SortDescriptor, SortDirection, Topic, TopicEvent,
};
