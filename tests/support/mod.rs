pub mod apkg_builder;
pub mod mock_datastore;
pub mod mock_object_store;

pub use apkg_builder::{build_apkg, TestNote};
pub use mock_datastore::MockDatastore;
pub use mock_object_store::MockObjectStore;

/// Initialize tracing for tests with proper test output handling
#[allow(dead_code)]
pub fn tracing_init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
