//! Integration tests for lazy nodes, placeholders and persisted uploads

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use stowage::context;
use stowage::filesystem::{Filesystem, FilesystemProvider, FilesystemRegistry, MemoryFilesystem};
use stowage::generator::PathGeneratorRegistry;
use stowage::namer::Namer;
use stowage::node::{
    FilesystemSource, LazyNode, Node, NodeKind, PathSource, PendingFile, Placeholder,
    UploadedFile,
};
use stowage::persist::persist;
use stowage::StowageError;

fn mounted() -> (MemoryFilesystem, Arc<dyn FilesystemProvider>) {
    let public = MemoryFilesystem::new("public");
    let provider: Arc<dyn FilesystemProvider> = Arc::new(
        FilesystemRegistry::new()
            .mount(public.clone())
            .mount(MemoryFilesystem::new("private"))
            .with_default("public"),
    );
    (public, provider)
}

#[test]
fn test_persisted_upload_is_reachable_lazily() {
    let (public, provider) = mounted();
    let upload = PendingFile::from_upload(UploadedFile::new(
        "Quarterly Report.PDF",
        "application/pdf",
        b"%PDF-1.7 report".to_vec(),
    ))
    .unwrap();

    let stored = persist(
        &public,
        &PathGeneratorRegistry::new(),
        &Namer::expression("reports/{year}/{name}{ext}"),
        &upload,
        &context! { "year" => 2024 },
    )
    .unwrap();
    let stored_path = stored.path().unwrap();
    upload.dispose().unwrap();

    let lazy = LazyNode::file(stored_path.as_str())
        .unwrap()
        .with_filesystem(FilesystemSource::provider(Arc::clone(&provider), None));

    assert_eq!(lazy.path().unwrap().as_str(), "reports/2024/quarterly-report.pdf");
    assert!(!lazy.is_resolved());
    assert!(lazy.exists().unwrap());
    assert!(!lazy.is_resolved());

    let file = lazy.ensure_file().unwrap();
    assert_eq!(file.contents().unwrap(), b"%PDF-1.7 report");
    assert_eq!(file.size().unwrap(), 15);
    assert!(lazy.is_resolved());
    assert_eq!(lazy.filesystem_name().unwrap().as_deref(), Some("public"));
}

#[test]
fn test_named_filesystem_is_looked_up_once() {
    let (_, provider) = mounted();
    provider
        .get("private")
        .unwrap()
        .write("keys/a.pem", b"secret")
        .unwrap();

    let lookups = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&lookups);
    let lazy = LazyNode::file("keys/a.pem").unwrap().with_filesystem(FilesystemSource::deferred(
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            provider.get("private")
        },
    ));

    assert_eq!(lookups.load(Ordering::SeqCst), 0);
    assert_eq!(lazy.ensure_file().unwrap().read_to_string().unwrap(), "secret");
    assert!(lazy.exists().unwrap());
    assert_eq!(lookups.load(Ordering::SeqCst), 1);
}

#[test]
fn test_typed_lazy_rejects_wrong_kind() {
    let (public, provider) = mounted();
    public.write("photos/cat.txt", b"meow").unwrap();

    let lazy = LazyNode::directory("photos/cat.txt")
        .unwrap()
        .with_filesystem(FilesystemSource::provider(provider, Some("public")));
    // The declared kind is trusted until the node is fetched
    let directory = lazy.ensure_directory().unwrap();
    assert!(!lazy.is_resolved());
    assert!(matches!(
        directory.children(),
        Err(StowageError::TypeMismatch { expected: "directory", .. })
    ));
}

#[test]
fn test_lazy_directory_lists_children() {
    let (public, _) = mounted();
    public.write("gallery/a.txt", b"a").unwrap();
    public.write("gallery/b.txt", b"b").unwrap();

    let shared: Arc<dyn Filesystem> = Arc::new(public);
    let lazy = LazyNode::directory("gallery").unwrap().with_filesystem(shared);
    let mut names: Vec<String> = lazy
        .ensure_directory()
        .unwrap()
        .children()
        .unwrap()
        .iter()
        .map(|child| child.name().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, vec!["a.txt", "b.txt"]);
    assert_eq!(lazy.kind().unwrap(), NodeKind::Directory);
}

#[test]
fn test_reattach_rules() {
    let (public, provider) = mounted();
    public.write("a.txt", b"a").unwrap();

    let mut lazy = LazyNode::new("a.txt").unwrap();
    assert!(matches!(lazy.exists(), Err(StowageError::Usage(_))));

    lazy.set_filesystem(FilesystemSource::provider(Arc::clone(&provider), Some("private")))
        .unwrap();
    lazy.set_filesystem(FilesystemSource::provider(Arc::clone(&provider), Some("public")))
        .unwrap();
    assert!(lazy.exists().unwrap());

    assert!(lazy
        .set_filesystem(FilesystemSource::provider(provider, Some("private")))
        .unwrap_err()
        .is_usage());
    assert!(lazy.set_path(PathSource::literal("b.txt").unwrap()).is_err());
}

#[test]
fn test_placeholder_in_place_of_missing_association() {
    fn describe(node: &dyn Node) -> String {
        if node.exists().unwrap_or(false) {
            node.name().unwrap_or_default()
        } else {
            "none".to_string()
        }
    }

    let (public, _) = mounted();
    let avatar = public.write("avatars/1.png", b"png").unwrap();

    assert_eq!(describe(avatar.as_ref()), "1.png");
    assert_eq!(describe(&Placeholder::image()), "none");
    assert!(matches!(
        Placeholder::image().ensure_file().unwrap().contents(),
        Err(StowageError::Placeholder(_))
    ));
}

#[test]
fn test_stored_node_is_handed_to_another_thread() {
    let (public, _) = mounted();
    let upload = PendingFile::from_bytes("notes.txt", b"thread safe").unwrap();
    let stored = persist(
        &public,
        &PathGeneratorRegistry::new(),
        &Namer::slugify(),
        &upload,
        &context! {},
    )
    .unwrap();

    let name = std::thread::spawn(move || stored.name().unwrap())
        .join()
        .unwrap();
    assert_eq!(name, "notes.txt");
}
