//! Lookup, listing and create against a recorded bucket.

mod common;

use common::{bucket_fs, Call, Op, RecordingStore};
use s3fs_daemon::fs::{DirEntry, Node, NodeKind};
use s3fs_daemon::{FlushMode, FsError};

fn entry(name: &str, kind: NodeKind) -> DirEntry {
    DirEntry {
        name: name.to_string(),
        kind,
    }
}

#[tokio::test]
async fn test_directory_wins_over_same_named_object() {
    let store = RecordingStore::with_keys(&["a", "a/b.txt"]);
    let fs = bucket_fs(&store, FlushMode::default());

    let node = fs.root().lookup("a").await.unwrap();
    assert!(matches!(node, Node::Directory(ref dir) if dir.path() == "a"));
}

#[tokio::test]
async fn test_lookup_file() {
    let store = RecordingStore::with_keys(&["a/b.txt"]);
    let fs = bucket_fs(&store, FlushMode::default());

    let dir = fs.directory("a");
    let node = dir.lookup("b.txt").await.unwrap();
    assert_eq!(node.kind(), NodeKind::File);
    assert_eq!(node.path(), "a/b.txt");

    // one listing, no caching of the answer
    assert_eq!(store.calls(), vec![Call::List("a/b.txt".to_string())]);
    dir.lookup("b.txt").await.unwrap();
    assert_eq!(store.ops(), vec![Op::List, Op::List]);
}

#[tokio::test]
async fn test_lookup_missing_is_not_found() {
    let store = RecordingStore::with_keys(&["a/b.txt"]);
    let fs = bucket_fs(&store, FlushMode::default());

    let err = fs.directory("a").lookup("zzz").await.unwrap_err();
    assert!(matches!(err, FsError::NotFound(ref p) if p == "a/zzz"));
    assert_eq!(err.errno(), libc::ENOENT);
}

#[tokio::test]
async fn test_lookup_ignores_siblings_sharing_a_prefix() {
    let store = RecordingStore::with_keys(&["a/bc", "a/b.d/e"]);
    let fs = bucket_fs(&store, FlushMode::default());

    let err = fs.directory("a").lookup("b").await.unwrap_err();
    assert!(matches!(err, FsError::NotFound(_)));
}

#[tokio::test]
async fn test_lookup_rejects_bad_names_without_store_calls() {
    let store = RecordingStore::with_keys(&["a/b.txt"]);
    let fs = bucket_fs(&store, FlushMode::default());

    for name in ["", ".", "..", "x/y"] {
        let err = fs.root().lookup(name).await.unwrap_err();
        assert_eq!(err.errno(), libc::EINVAL, "name {:?}", name);
    }
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_lookup_store_failure_is_io_error() {
    let store = RecordingStore::with_keys(&["a/b.txt"]);
    store.fail(Op::List);
    let fs = bucket_fs(&store, FlushMode::default());

    let err = fs.root().lookup("a").await.unwrap_err();
    assert!(matches!(err, FsError::Store(_)));
    assert_eq!(err.errno(), libc::EIO);
}

#[tokio::test]
async fn test_classification_follows_the_store() {
    let store = RecordingStore::new();
    let fs = bucket_fs(&store, FlushMode::default());

    assert!(fs.resolve("x").await.is_err());
    store.insert("x", b"data");
    assert_eq!(fs.resolve("x").await.unwrap().kind(), NodeKind::File);
    store.insert("x/inner", b"data");
    assert_eq!(fs.resolve("x").await.unwrap().kind(), NodeKind::Directory);
}

#[tokio::test]
async fn test_list_children() {
    let store = RecordingStore::with_keys(&["a/b.txt", "a/c.txt", "a/d/e.txt", "other.txt"]);
    let fs = bucket_fs(&store, FlushMode::default());

    let children = fs.directory("a").list_children().await.unwrap();
    assert_eq!(
        children,
        vec![
            entry("b.txt", NodeKind::File),
            entry("c.txt", NodeKind::File),
            entry("d", NodeKind::Directory),
        ]
    );
    assert_eq!(store.calls(), vec![Call::List("a/".to_string())]);
}

#[tokio::test]
async fn test_list_root() {
    let store = RecordingStore::with_keys(&["top.txt", "a/b.txt", "z/y/x"]);
    let fs = bucket_fs(&store, FlushMode::default());

    let children = fs.root().list_children().await.unwrap();
    assert_eq!(
        children,
        vec![
            entry("a", NodeKind::Directory),
            entry("top.txt", NodeKind::File),
            entry("z", NodeKind::Directory),
        ]
    );
    assert_eq!(store.calls(), vec![Call::List(String::new())]);
}

#[tokio::test]
async fn test_list_reports_key_and_prefix_with_same_name() {
    let store = RecordingStore::with_keys(&["a/d", "a/d/e.txt"]);
    let fs = bucket_fs(&store, FlushMode::default());

    let children = fs.directory("a").list_children().await.unwrap();
    assert_eq!(
        children,
        vec![entry("d", NodeKind::Directory), entry("d", NodeKind::File)]
    );
}

#[tokio::test]
async fn test_list_skips_directory_marker() {
    let store = RecordingStore::with_keys(&["a/", "a/b.txt"]);
    let fs = bucket_fs(&store, FlushMode::default());

    let children = fs.directory("a").list_children().await.unwrap();
    assert_eq!(children, vec![entry("b.txt", NodeKind::File)]);
}

#[tokio::test]
async fn test_directory_attributes_need_no_store_call() {
    let store = RecordingStore::with_keys(&["a/b.txt"]);
    let fs = bucket_fs(&store, FlushMode::default());

    let attrs = fs.directory("a").attributes();
    assert_eq!(attrs.kind, NodeKind::Directory);
    assert_eq!(attrs.perm, 0o755);
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_create_in_root_strips_leading_slash() {
    let store = RecordingStore::new();
    let fs = bucket_fs(&store, FlushMode::default());

    let file = fs.root().create("f.txt").await.unwrap();
    assert_eq!(file.path(), "f.txt");
    assert_eq!(
        store.calls(),
        vec![Call::Put {
            key: "f.txt".to_string(),
            size: 0
        }]
    );
    assert_eq!(store.object("f.txt").unwrap().len(), 0);
}

#[tokio::test]
async fn test_create_then_attributes() {
    let store = RecordingStore::new();
    let fs = bucket_fs(&store, FlushMode::default());

    let file = fs.directory("docs").create("f.txt").await.unwrap();
    let attrs = file.attributes().await.unwrap();

    assert_eq!(attrs.kind, NodeKind::File);
    assert_eq!(attrs.size, 0);
    assert_eq!(attrs.perm, 0o666);
    assert!(attrs.mtime > std::time::UNIX_EPOCH);
    assert_eq!(store.ops(), vec![Op::Put, Op::Head]);
}

#[tokio::test]
async fn test_create_failure_propagates() {
    let store = RecordingStore::new();
    store.fail(Op::Put);
    let fs = bucket_fs(&store, FlushMode::default());

    let err = fs.root().create("f.txt").await.unwrap_err();
    assert_eq!(err.errno(), libc::EIO);
    assert!(store.object("f.txt").is_none());
}

#[tokio::test]
async fn test_file_attributes_failure_is_not_masked() {
    let store = RecordingStore::with_keys(&["f.txt"]);
    let fs = bucket_fs(&store, FlushMode::default());

    let Node::File(file) = fs.resolve("f.txt").await.unwrap() else {
        panic!("expected a file");
    };
    file.write(b"buffered", 0).await.unwrap();

    // no fallback to the buffered size
    store.fail(Op::Head);
    let err = file.attributes().await.unwrap_err();
    assert_eq!(err.errno(), libc::EIO);
}
