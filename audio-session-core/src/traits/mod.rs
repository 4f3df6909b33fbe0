pub mod capture_provider;
pub mod hands_free;
pub mod playback_sink;
pub mod route_provider;
pub mod session_delegate;
