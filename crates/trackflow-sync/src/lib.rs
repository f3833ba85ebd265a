//! Sync layer: offline queue drain, connectivity watching, rate cache, HTTP delivery.

pub mod connectivity;
pub mod engine;
pub mod rates;
pub mod recognition;
pub mod remote;

#[cfg(feature = "http")]
pub mod http;

pub use connectivity::{Connectivity, ConnectivityEvents, Transition};
pub use engine::{DrainOutcome, SkipReason, SubmitError, SyncEngine};
pub use rates::{RateCache, RateError, RateProvider};
pub use recognition::{PlainText, RecognitionError, TextRecognizer, scan_receipt};
pub use remote::{DeliveryError, ExpenseRemote};

#[cfg(feature = "http")]
pub use http::{ExpenseClient, HttpRateProvider};
