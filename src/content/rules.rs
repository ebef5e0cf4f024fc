//! Content rules - one per validation layer.
//!
//! Rules never short-circuit each other: each receives the loaded document
//! and appends its own findings.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::links::{classify_image, classify_link, resolve_internal, ImageRef, LinkClass, LinkResolution};
use super::{CheckContext, Findings, FolderState, LoadedDocument, MetaState, RealizedFile};
use crate::markdown::{headings, Token, TokenKind};
use crate::metadata::DOC_KIND;
use crate::slots::{scan_slots, resolve_asset, ASSET_REF_PREFIX};
use crate::validation::{ValidationViolation, ViolationCode};

/// Minimum body length, in characters, once headings are removed.
pub const MIN_CONTENT_CHARS: usize = 50;

#[async_trait]
pub trait ContentRule: Send + Sync {
    fn name(&self) -> &'static str;
    async fn check(&self, doc: &LoadedDocument, ctx: &CheckContext<'_>, findings: &mut Findings);
}

fn file_location(doc: &LoadedDocument, file: &RealizedFile, line: Option<usize>) -> String {
    match line {
        Some(line) => format!("{} ({}.md:{line})", doc.path, file.locale),
        None => format!("{} ({}.md)", doc.path, file.locale),
    }
}

// --- Layer 1: existence ---

pub struct ExistenceRule;

#[async_trait]
impl ContentRule for ExistenceRule {
    fn name(&self) -> &'static str {
        "existence"
    }

    async fn check(&self, doc: &LoadedDocument, ctx: &CheckContext<'_>, findings: &mut Findings) {
        let dir = ctx.layout.doc_dir(&doc.path);
        match doc.folder {
            FolderState::Missing => {
                findings.push(
                    ValidationViolation::fatal(
                        ViolationCode::DocFolderMissing,
                        &doc.path,
                        format!("Document folder {} does not exist", dir.display()),
                    )
                    .with_suggestion("Generate the document before validating it"),
                );
                return;
            }
            FolderState::NotDirectory => {
                findings.push(ValidationViolation::fatal(
                    ViolationCode::DocPathNotDirectory,
                    &doc.path,
                    format!("{} is not a directory", dir.display()),
                ));
                return;
            }
            FolderState::Present => {}
        }

        let primary = &ctx.layout.primary_locale;
        let mut default_locale = primary.clone();
        let mut source_locale = primary.clone();

        match &doc.meta {
            MetaState::Missing => findings.push(
                ValidationViolation::fatal(
                    ViolationCode::MissingMeta,
                    &doc.path,
                    "Metadata sidecar .meta.yaml is missing",
                )
                .with_suggestion("Re-save the document so its metadata is written"),
            ),
            MetaState::Invalid(reason) => findings.push(ValidationViolation::fatal(
                ViolationCode::InvalidMeta,
                &doc.path,
                format!("Metadata sidecar cannot be read: {reason}"),
            )),
            MetaState::Loaded(meta) => {
                for field in meta.missing_fields() {
                    findings.push(ValidationViolation::fatal(
                        ViolationCode::MetaFieldMissing,
                        &doc.path,
                        format!("Metadata field `{field}` is missing"),
                    ));
                }
                if !meta.kind.is_empty() && meta.kind != DOC_KIND {
                    findings.push(ValidationViolation::fatal(
                        ViolationCode::InvalidMetaKind,
                        &doc.path,
                        format!("Metadata kind is `{}`, expected `{DOC_KIND}`", meta.kind),
                    ));
                }
                if !meta.source.is_empty() && &meta.source != primary {
                    findings.push(
                        ValidationViolation::fatal(
                            ViolationCode::SourceLocaleMismatch,
                            &doc.path,
                            format!(
                                "Document source locale `{}` differs from workspace locale `{primary}`",
                                meta.source
                            ),
                        )
                        .with_suggestion("Regenerate the document from the primary locale"),
                    );
                }
                if !meta.default.is_empty() {
                    default_locale = meta.default.clone();
                }
                if !meta.source.is_empty() {
                    source_locale = meta.source.clone();
                }
            }
        }

        let mut reported: Vec<&str> = Vec::new();
        let required = std::iter::once(default_locale.as_str())
            .chain(std::iter::once(source_locale.as_str()))
            .chain(ctx.layout.translate_languages.iter().map(String::as_str));
        for locale in required {
            if reported.contains(&locale) || doc.has_locale(locale) {
                continue;
            }
            reported.push(locale);
            let code = if locale == default_locale {
                ViolationCode::MissingDefaultLanguageFile
            } else if locale == source_locale {
                ViolationCode::MissingSourceLanguageFile
            } else {
                ViolationCode::MissingTranslationFile
            };
            findings.push(
                ValidationViolation::fatal(code, &doc.path, format!("Missing {locale}.md"))
                    .with_target(locale),
            );
        }
    }
}

// --- Layer 2: structural content ---

pub struct StructuralRule;

/// Characters of body text: heading spans removed, whitespace collapsed.
fn body_length(content: &str, tokens: &[Token]) -> usize {
    let mut body = String::with_capacity(content.len());
    let mut cursor = 0;
    for token in tokens.iter().filter(|t| matches!(t.kind, TokenKind::Heading { .. })) {
        if token.range.start < cursor {
            continue;
        }
        body.push_str(&content[cursor..token.range.start]);
        body.push(' ');
        cursor = token.range.end;
    }
    body.push_str(&content[cursor.min(content.len())..]);
    body.split_whitespace().collect::<Vec<_>>().join(" ").chars().count()
}

#[async_trait]
impl ContentRule for StructuralRule {
    fn name(&self) -> &'static str {
        "structure"
    }

    async fn check(&self, doc: &LoadedDocument, _ctx: &CheckContext<'_>, findings: &mut Findings) {
        for file in &doc.files {
            let length = body_length(&file.content, &file.tokens);
            if length < MIN_CONTENT_CHARS {
                findings.push(
                    ValidationViolation::fatal(
                        ViolationCode::EmptyDocument,
                        file_location(doc, file, None),
                        format!("Document body has {length} characters (minimum {MIN_CONTENT_CHARS})"),
                    )
                    .with_suggestion("Regenerate the document content"),
                );
            }

            let mut previous: Option<u8> = None;
            for (level, text, line) in headings(&file.tokens) {
                if let Some(prev) = previous {
                    if level > prev + 1 {
                        let expected = prev + 1;
                        findings.push(
                            ValidationViolation::fatal(
                                ViolationCode::HeadingLevelSkip,
                                file_location(doc, file, Some(line)),
                                format!("Heading `{text}` jumps from level {prev} to {level}"),
                            )
                            .with_suggestion(format!(
                                "Use level {expected}: `{} {text}`",
                                "#".repeat(usize::from(expected))
                            )),
                        );
                    }
                }
                previous = Some(level);
            }
        }
    }
}

// --- Layer 3: links and images ---

pub struct LinkRule;

#[async_trait]
impl ContentRule for LinkRule {
    fn name(&self) -> &'static str {
        "links"
    }

    async fn check(&self, doc: &LoadedDocument, ctx: &CheckContext<'_>, findings: &mut Findings) {
        for file in &doc.files {
            for token in &file.tokens {
                let TokenKind::Link { dest } = &token.kind else { continue };
                let LinkClass::Internal(target) = classify_link(dest) else { continue };
                findings.stats.links_checked += 1;
                let location = file_location(doc, file, Some(token.line));

                match resolve_internal(&doc.path, &target) {
                    LinkResolution::ExceedsRoot => {
                        findings.stats.broken_links += 1;
                        findings.push(
                            ValidationViolation::fatal(
                                ViolationCode::LinkExceedsRoot,
                                location,
                                format!("Link `{dest}` climbs above the documentation root"),
                            )
                            .with_target(target),
                        );
                    }
                    LinkResolution::HasFileSuffix(folder) => {
                        findings.stats.broken_links += 1;
                        findings.push(
                            ValidationViolation::fatal(
                                ViolationCode::LinkHasFileSuffix,
                                location,
                                format!("Link `{dest}` points at a content file"),
                            )
                            .with_suggestion(format!("Link to the document path `{folder}`"))
                            .with_target(folder),
                        );
                    }
                    LinkResolution::Resolved(resolved) if !ctx.registered.contains(&resolved) => {
                        findings.stats.broken_links += 1;
                        findings.push(
                            ValidationViolation::fatal(
                                ViolationCode::BrokenLink,
                                location,
                                format!("Link `{dest}` targets unknown document `{resolved}`"),
                            )
                            .with_suggestion("Link to a path listed in the document structure")
                            .with_target(resolved),
                        );
                    }
                    LinkResolution::Resolved(_) => {}
                }
            }
        }
    }
}

pub struct ImageRule;

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file())
}

#[async_trait]
impl ContentRule for ImageRule {
    fn name(&self) -> &'static str {
        "images"
    }

    async fn check(&self, doc: &LoadedDocument, ctx: &CheckContext<'_>, findings: &mut Findings) {
        let doc_dir = ctx.layout.doc_dir(&doc.path);
        for file in &doc.files {
            for token in &file.tokens {
                let TokenKind::Image { dest } = &token.kind else { continue };
                let location = file_location(doc, file, Some(token.line));

                match classify_image(dest) {
                    ImageRef::Skip | ImageRef::SlotAsset(_) => {}
                    ImageRef::Remote(url) => {
                        let Some(probe) = ctx.probe else { continue };
                        findings.stats.images_checked += 1;
                        if !probe.check(&url).await {
                            findings.push(ValidationViolation::warning(
                                ViolationCode::RemoteImageUnreachable,
                                location,
                                format!("Remote image {url} could not be reached"),
                            ).with_target(url));
                        }
                    }
                    ImageRef::Virtual(rest) => {
                        findings.stats.images_checked += 1;
                        let mut found = false;
                        for root in &ctx.layout.source_roots {
                            if is_file(&root.join(&rest)).await {
                                found = true;
                                break;
                            }
                        }
                        if !found {
                            findings.stats.missing_images += 1;
                            findings.push(
                                ValidationViolation::fatal(
                                    ViolationCode::ImageNotFoundInSources,
                                    location,
                                    format!("Image `{dest}` is not in any source root"),
                                )
                                .with_suggestion("Check the path against the configured sourcesPath")
                                .with_target(rest),
                            );
                        }
                    }
                    ImageRef::Absolute(p) | ImageRef::Relative(p) => {
                        findings.stats.images_checked += 1;
                        let full = if Path::new(&p).is_absolute() {
                            PathBuf::from(&p)
                        } else {
                            doc_dir.join(&p)
                        };
                        if !is_file(&full).await {
                            findings.stats.missing_images += 1;
                            findings.push(
                                ValidationViolation::fatal(
                                    ViolationCode::ImageNotFound,
                                    location,
                                    format!("Image `{dest}` not found at {}", full.display()),
                                )
                                .with_target(p),
                            );
                        }
                    }
                }
            }
        }
    }
}

// --- Layer 4: slots ---

pub struct SlotRule;

#[async_trait]
impl ContentRule for SlotRule {
    fn name(&self) -> &'static str {
        "slots"
    }

    async fn check(&self, doc: &LoadedDocument, ctx: &CheckContext<'_>, findings: &mut Findings) {
        if !ctx.request.check_slots {
            return;
        }
        let primary = &ctx.layout.primary_locale;

        for file in &doc.files {
            let scan = scan_slots(&file.content, &doc.path);
            for bad in &scan.malformed {
                findings.push(ValidationViolation::fatal(
                    ViolationCode::InvalidImageSlot,
                    file_location(doc, file, None),
                    format!("Slot marker is missing {}: {}", bad.missing.join(", "), bad.raw),
                ));
            }
            for slot in &scan.slots {
                findings.stats.slots_checked += 1;
                if resolve_asset(ctx.layout, &slot.key, &file.locale, primary).await.is_none() {
                    findings.push(
                        ValidationViolation::fatal(
                            ViolationCode::UnreplacedImageSlot,
                            file_location(doc, file, None),
                            format!("Image slot `{}` (key `{}`) has no generated asset", slot.id, slot.key),
                        )
                        .with_suggestion("Generate the image for this slot")
                        .with_target(slot.id.clone()),
                    );
                }
            }

            for token in &file.tokens {
                let TokenKind::Image { dest } = &token.kind else { continue };
                let ImageRef::SlotAsset(reference) = classify_image(dest) else { continue };
                let relative = reference.trim_start_matches(ASSET_REF_PREFIX);
                if !is_file(&ctx.layout.assets_dir.join(relative)).await {
                    findings.stats.missing_images += 1;
                    findings.push(
                        ValidationViolation::fatal(
                            ViolationCode::MissingSlotImage,
                            file_location(doc, file, Some(token.line)),
                            format!("Slot image `{reference}` does not exist"),
                        )
                        .with_target(reference.clone()),
                    );
                }
            }
        }
    }
}
