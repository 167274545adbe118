//! Wire protocol handling.
//!
//! # Data Flow
//! ```text
//! WireEvent (transport)
//!     → detect.rs (variant chosen once per connection)
//!     → sails.rs (build draft from event fields)
//!     → handler.rs (validate, emit PendingRequest)
//!     → ConnectionManager → Pipeline
//!     → Reply closure (serialize {body, headers, statusCode})
//! ```

pub mod detect;
pub mod handler;
pub mod sails;
pub mod types;

pub use detect::{detect_variant, Detection, ProtocolVariant};
pub use handler::{
    DeferredReply, Dispatcher, DraftRequest, Handler, HandlerState, PendingRequest, Rejection,
    Reply, RequestSink, ValidationError,
};
pub use sails::SailsHandler;
pub use types::{lower_keys, HeaderValues, Headers, Method, Request, Response, ResponseHeaders};
