//! HTTP middleware for routes reachable from sockets.

pub mod socket_access;

pub use socket_access::{
    attach_socket_origin, enforce_socket_access, SocketAccess, SocketAccessState, SocketOrigin,
};
