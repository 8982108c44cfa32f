//! Integration tests for scriptmirror-remote
//!
//! Uses wiremock to simulate the repository API and the script server and
//! verifies request shapes, response decoding and error mapping.

mod common;

mod test_script_server;
mod test_source_repository;
