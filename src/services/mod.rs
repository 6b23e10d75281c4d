//! Portal-facing services: transport, paginated listing, export download.

pub mod export;
pub mod listing;
pub mod transport;

pub use export::ExportDownloader;
pub use listing::ListingFetcher;
pub use transport::{
    HttpMethod, HttpTransport, RetryPolicy, Transport, TransportRequest, TransportResponse,
    send_with_retry,
};
