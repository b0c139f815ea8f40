//! Knowledge-base document lifecycle against the in-memory index.

mod common;

#[tokio::test]
async fn document_lifecycle_add_list_delete() {
    let h = common::harness();
    let (family_id, child_id) = h.seed_family();

    let record = h
        .service
        .add_document(&family_id, &child_id, "iep-notes.txt", "Sam's IEP notes: reading goals.")
        .await
        .unwrap();
    assert_eq!(record.metadata.filename, "iep-notes.txt");
    assert_eq!(record.metadata.child_id, child_id);

    let listed = h.service.list_documents(&family_id, &child_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, record.id);
    assert!(listed[0].metadata.content_preview.contains("reading goals"));

    h.service
        .delete_document(&family_id, &child_id, &record.id)
        .await
        .unwrap();

    // The vector entry was the only copy; after delete nothing lists.
    let listed = h.service.list_documents(&family_id, &child_id).await.unwrap();
    assert!(listed.is_empty());
    assert_eq!(h.index.len("knowledge"), 0);
}

#[tokio::test]
async fn listing_is_scoped_per_child() {
    let h = common::harness();
    let (family_id, child_id) = h.seed_family();
    let sibling = h
        .service
        .create_child(&family_id, "Riley", 12, Some("c"), None, Some("g"))
        .unwrap();

    h.service
        .add_document(&family_id, &child_id, "a.txt", "notes for Sam")
        .await
        .unwrap();
    h.service
        .add_document(&family_id, &sibling.id, "b.txt", "notes for Riley")
        .await
        .unwrap();

    let listed = h.service.list_documents(&family_id, &child_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].metadata.filename, "a.txt");
}

#[tokio::test]
async fn empty_content_is_rejected() {
    let h = common::harness();
    let (family_id, child_id) = h.seed_family();

    let err = h
        .service
        .add_document(&family_id, &child_id, "empty.txt", "   ")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn documents_are_scoped_to_the_owning_family() {
    let h = common::harness();
    let (_family_id, child_id) = h.seed_family();
    let other_family = h
        .service
        .create_family("Casey", "casey@example.com", None)
        .unwrap();

    let err = h
        .service
        .add_document(&other_family, &child_id, "a.txt", "content")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);
}
