use std::sync::Arc;
use travelogue::{
    error::ApiError,
    storage::{MockStorageService, StorageService, StorageState, get_as_data_url},
};

#[tokio::test]
async fn put_then_get_returns_the_same_bytes() {
    let storage = MockStorageService::new();
    let bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];

    let reference = storage.put(bytes.clone(), "image/jpeg").await.unwrap();
    assert!(reference.starts_with("uploads/"));
    assert!(reference.ends_with(".jpg"));

    let fetched = storage.get(&reference).await.unwrap();
    assert_eq!(fetched, Some(bytes));
}

#[tokio::test]
async fn extension_follows_content_type() {
    let storage = MockStorageService::new();
    let png = storage.put(vec![1], "image/png").await.unwrap();
    let gif = storage.put(vec![2], "image/gif").await.unwrap();
    let other = storage.put(vec![3], "video/mp4").await.unwrap();

    assert!(png.ends_with(".png"));
    assert!(gif.ends_with(".gif"));
    assert!(other.ends_with(".bin"));
}

#[tokio::test]
async fn missing_object_is_none_not_an_error() {
    let storage = MockStorageService::new();
    assert_eq!(storage.get("uploads/nothing-here.png").await.unwrap(), None);
}

#[tokio::test]
async fn failing_store_surfaces_storage_unavailable() {
    let storage = MockStorageService::new_failing();
    assert!(matches!(
        storage.put(vec![1, 2, 3], "image/png").await,
        Err(ApiError::StorageUnavailable)
    ));
    assert!(matches!(
        storage.get("uploads/any.png").await,
        Err(ApiError::StorageUnavailable)
    ));
}

#[tokio::test]
async fn data_url_rendering_encodes_and_types_the_bytes() {
    let storage = MockStorageService::new();
    // "hi" -> aGk= in base64.
    storage.seed("uploads/greeting.png", b"hi".to_vec());
    let state: StorageState = Arc::new(storage);

    let url = get_as_data_url(&state, "uploads/greeting.png")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(url, "data:image/png;base64,aGk=");
}

#[tokio::test]
async fn data_url_for_missing_object_is_none() {
    let state: StorageState = Arc::new(MockStorageService::new());
    assert_eq!(get_as_data_url(&state, "uploads/ghost.jpg").await.unwrap(), None);
}

#[tokio::test]
async fn data_url_propagates_store_failures() {
    let state: StorageState = Arc::new(MockStorageService::new_failing());
    assert!(matches!(
        get_as_data_url(&state, "uploads/any.jpg").await,
        Err(ApiError::StorageUnavailable)
    ));
}
