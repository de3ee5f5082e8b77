mod errors;
mod scheduler;
mod traits;
pub mod types;

pub use errors::{DropzoneError, Result, ValidationError};
pub use scheduler::IntervalTicker;
pub use traits::{RecordStore, Ticker};
pub use types::{
    FetchParams,
    FieldParams,
    Lookup,
    MutationResponse,
    PagingInfo,
    RecordId,
    RecordResult,
    RecordsParams,
    DeleteParams,
    FetchResponse,
    GetResponse,
    OrderBy,
    WhereClause,
};
