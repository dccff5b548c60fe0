//! Integration tests for path naming
//!
//! Namers dispatched through the registry against uploads, stored nodes and
//! application objects.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use stowage::config::StowageConfig;
use stowage::context;
use stowage::expression::ExpressionEngine;
use stowage::generator::{PathGeneratorRegistry, TemplatePathGenerator};
use stowage::namer::Namer;
use stowage::node::{
    ChecksumAlgorithm, File, Node, NodeKind, NodePath, PendingFile, Placeholder, Visibility,
};
use stowage::value::{AccessorTable, Context, Value};
use stowage::{Accessible, StowageError, StowageResult};

const CRAZY_MD5: &str = "f75b8179e4bbe7e2b4a074dcef62de95";

/// A file whose checksum is known without reading contents
#[derive(Debug)]
struct KnownFile {
    path: NodePath,
}

impl KnownFile {
    fn crazy() -> Self {
        Self {
            path: NodePath::new("uploads/some CRazy file.pNg").unwrap(),
        }
    }
}

impl Node for KnownFile {
    fn path(&self) -> StowageResult<NodePath> {
        Ok(self.path.clone())
    }

    fn kind(&self) -> StowageResult<NodeKind> {
        Ok(NodeKind::File)
    }

    fn exists(&self) -> StowageResult<bool> {
        Ok(true)
    }

    fn last_modified(&self) -> StowageResult<DateTime<Utc>> {
        Ok(DateTime::<Utc>::UNIX_EPOCH)
    }

    fn visibility(&self) -> StowageResult<Visibility> {
        Ok(Visibility::Public)
    }

    fn filesystem_name(&self) -> StowageResult<Option<String>> {
        Ok(None)
    }

    fn as_file(&self) -> Option<&dyn File> {
        Some(self)
    }
}

impl File for KnownFile {
    fn size(&self) -> StowageResult<u64> {
        Ok(0)
    }

    fn checksum(&self, _algorithm: Option<ChecksumAlgorithm>) -> StowageResult<String> {
        Ok(CRAZY_MD5.to_string())
    }

    fn mime_type(&self) -> StowageResult<String> {
        Ok("image/png".to_string())
    }

    fn contents(&self) -> StowageResult<Vec<u8>> {
        Ok(Vec::new())
    }
}

#[derive(Accessible)]
#[accessible(methods(slug))]
pub struct Article {
    pub id: u32,
    pub title: String,
    #[accessible(skip)]
    pub secret: String,
}

impl Article {
    fn slug(&self) -> String {
        self.title.to_lowercase().replace(' ', "-")
    }
}

fn article() -> Value {
    Value::object(Article {
        id: 7,
        title: "Hello World".to_string(),
        secret: "hidden".to_string(),
    })
}

#[test]
fn test_checksum_and_name() {
    let registry = PathGeneratorRegistry::new();
    let path = registry
        .generate(
            &Namer::expression("foo/{checksum}-{name}{ext}"),
            &KnownFile::crazy(),
            &Context::new(),
        )
        .unwrap();
    assert_eq!(path, format!("foo/{CRAZY_MD5}-some-crazy-file.png"));
}

#[test]
fn test_context_variable() {
    let registry = PathGeneratorRegistry::new();
    let path = registry
        .generate(
            &Namer::expression("foo/{objectId}-{name}{ext}"),
            &KnownFile::crazy(),
            &context! { "objectId" => 1 },
        )
        .unwrap();
    assert_eq!(path, "foo/1-some-crazy-file.png");
}

#[test]
fn test_upload_uses_original_name() {
    let registry = PathGeneratorRegistry::new();
    let upload = PendingFile::from_bytes("some CRazy file.pNg", b"bytes").unwrap();
    let path = registry
        .generate(&Namer::slugify(), &upload, &Context::new())
        .unwrap();
    assert_eq!(path, "some-crazy-file.png");
}

#[test]
fn test_upload_name_drops_client_directories() {
    let registry = PathGeneratorRegistry::new();
    let namer = Namer::expression("avatars/{id}/{name}{ext}");

    let nested = PendingFile::from_bytes("nested/dir/photo.png", b"bytes").unwrap();
    assert_eq!(
        registry.generate(&namer, &nested, &context! { "id" => 1 }).unwrap(),
        "avatars/1/photo.png"
    );
    assert_eq!(
        registry.generate(&Namer::slugify(), &nested, &Context::new()).unwrap(),
        "photo.png"
    );

    let browser = PendingFile::from_bytes("C:\\fakepath\\photo.png", b"bytes").unwrap();
    assert_eq!(
        registry.generate(&namer, &browser, &context! { "id" => 1 }).unwrap(),
        "avatars/1/photo.png"
    );
}

#[test]
fn test_truncated_checksum_of_upload() {
    let registry = PathGeneratorRegistry::new();
    let upload = PendingFile::from_bytes("a.txt", b"hello").unwrap();
    let path = registry
        .generate(
            &Namer::checksum(Some(ChecksumAlgorithm::Sha256), Some(8)),
            &upload,
            &Context::new(),
        )
        .unwrap();
    assert_eq!(path, "2cf24dba.txt");
}

#[test]
fn test_default_expression_shape() {
    let upload = PendingFile::from_bytes("Photo.JPG", b"bytes").unwrap();
    let engine = ExpressionEngine::new();
    let generated = engine.evaluate(None, &upload, &Context::new()).unwrap();
    let (name, rest) = generated.split_once('-').unwrap();
    assert_eq!(name, "photo");
    assert_eq!(rest.len(), 6 + ".jpg".len());
    assert!(rest.ends_with(".jpg"));
}

#[test]
fn test_derived_object_properties() {
    let registry = PathGeneratorRegistry::new();
    let namer = Namer::expression("articles/{this.id}/{this.slug}{ext}").with_value("this", article());
    let path = registry
        .generate(&namer, &KnownFile::crazy(), &Context::new())
        .unwrap();
    assert_eq!(path, "articles/7/hello-world.png");
}

#[test]
fn test_skipped_field_is_unresolvable() {
    let registry = PathGeneratorRegistry::new();
    let namer = Namer::expression("{this.secret}").with_value("this", article());
    let err = registry
        .generate(&namer, &KnownFile::crazy(), &Context::new())
        .unwrap_err();
    assert!(matches!(err, StowageError::Resolution { ref token, .. } if token == "this.secret"));
}

#[test]
fn test_accessor_table_with_arguments() {
    struct Album {
        title: String,
    }

    let table = Arc::new(
        AccessorTable::new("Album")
            .field("title", |a: &Album| Value::from(a.title.clone()))
            .method("initials", |a: &Album, args| {
                let n = args.first().and_then(|n| n.parse().ok()).unwrap_or(1);
                Ok(Value::from(a.title.chars().take(n).collect::<String>()))
            }),
    );
    let album = AccessorTable::bind(
        &table,
        Album {
            title: "Blue Train".to_string(),
        },
    );

    let registry = PathGeneratorRegistry::new();
    let path = registry
        .generate(
            &Namer::expression("{album.initials(4)|lower}/{album.title|slug}"),
            &KnownFile::crazy(),
            &context! { "album" => Value::object(album) },
        )
        .unwrap();
    assert_eq!(path, "blue/blue-train");
}

#[test]
fn test_handlebars_namer() {
    let registry = PathGeneratorRegistry::new();
    let namer = Namer::template("handlebars", "{{section}}/{{node.name_without_extension}}.{{node.extension}}");
    let path = registry
        .generate(&namer, &KnownFile::crazy(), &context! { "section" => "art" })
        .unwrap();
    assert_eq!(path, "art/some CRazy file.pNg");
}

#[test]
fn test_custom_template_engine_scheme() {
    handlebars::handlebars_helper!(shout: |s: str| s.to_uppercase());
    let mut handlebars = handlebars::Handlebars::new();
    handlebars.register_helper("shout", Box::new(shout));

    let registry = PathGeneratorRegistry::builder()
        .template_engine("hbs", TemplatePathGenerator::with_registry(handlebars))
        .build();
    let path = registry
        .generate(
            &Namer::template("hbs", "{{shout node.name}}"),
            &KnownFile::crazy(),
            &Context::new(),
        )
        .unwrap();
    assert_eq!(path, "SOME CRAZY FILE.PNG");
}

#[test]
fn test_configured_namers() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        r#"
[naming]
default_expression = "{name}{ext}"
slugger = "ascii"

[namers.cover]
id = "expression:covers/{albumId}/{name|upper}{ext}"
context = { albumId = 3 }

[namers.fallback]
id = "expression"
"#,
    )
    .unwrap();

    let config = StowageConfig::load_from(config_path.to_str().unwrap()).unwrap();
    let registry = PathGeneratorRegistry::builder_from_config(&config).build();
    let upload = PendingFile::from_bytes("Crème Brûlée.png", b"bytes").unwrap();

    let cover = config.namer("cover").unwrap();
    assert_eq!(
        registry.generate(&cover, &upload, &Context::new()).unwrap(),
        "covers/3/CREME-BRULEE.png"
    );
    assert_eq!(
        registry
            .generate(&cover, &upload, &context! { "albumId" => 9 })
            .unwrap(),
        "covers/9/CREME-BRULEE.png"
    );

    // "expression" without a colon is not a scheme and nothing is registered under it
    let fallback = config.namer("fallback").unwrap();
    assert!(matches!(
        registry.generate(&fallback, &upload, &Context::new()),
        Err(StowageError::Config(_))
    ));
}

#[test]
fn test_checksum_of_placeholder_fails() {
    let registry = PathGeneratorRegistry::new();
    let err = registry
        .generate(&Namer::checksum(None, None), &Placeholder::file(), &Context::new())
        .unwrap_err();
    assert!(matches!(err, StowageError::Placeholder(_)));
}
