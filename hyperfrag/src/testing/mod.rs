//! Testing utilities
//!
//! - [`TestServer`] - wrapper around `axum-test` built from an [`AppState`](crate::state::AppState)
//! - [`FragmentFixture`] - temporary template directories plus matching state
//! - assertion helpers for the signaling headers
//!
//! # Example
//!
//! ```rust,ignore
//! let fixture = FragmentFixture::new();
//! fixture.write("demo.hm.php", "<p>demo</p>");
//!
//! let server = TestServer::for_state(fixture.state()).unwrap();
//! let response = server.get("/wp-html/v1/demo").await;
//! assert_no_error_signal(&response);
//! ```

pub mod assertions;
pub mod fixture;
pub mod server;

pub use assertions::*;
pub use fixture::FragmentFixture;
pub use server::TestServer;
