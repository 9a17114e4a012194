use std::sync::Mutex;

use mnemo_import::object_store::{ObjectStore, ObjectStoreError};

/// In-memory object store recording every upload.
#[derive(Default)]
pub struct MockObjectStore {
    pub uploads: Mutex<Vec<(String, String)>>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        MockObjectStore::default()
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl ObjectStore for MockObjectStore {
    async fn upload(
        &self,
        _data: &[u8],
        filename: &str,
        mime_type: &str,
        folder: &str,
    ) -> Result<String, ObjectStoreError> {
        self.uploads
            .lock()
            .unwrap()
            .push((filename.to_string(), mime_type.to_string()));
        Ok(format!("https://cdn.test/{}/{}", folder, filename))
    }
}
