//! Document text extraction for PDF and EPUB.
//!
//! Text is advisory evidence, so every failure degrades to an empty string.
//! Parsing is CPU-bound; async callers should run it on the blocking pool.

use std::io::{Cursor, Read};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

/// Cap for general-purpose extraction.
pub const TEXT_CAP_GENERAL: usize = 10_000;
/// Cap when the text is only used as moderation evidence.
pub const TEXT_CAP_MODERATION: usize = 5_000;

const PDF_MIME: &str = "application/pdf";
const EPUB_MIME: &str = "application/epub+zip";

/// Upper bound on a single EPUB member we are willing to inflate.
const MAX_EPUB_ENTRY_BYTES: u64 = 8 * 1024 * 1024;

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b.*?</script\s*>").expect("valid regex"));
static STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b.*?</style\s*>").expect("valid regex"));
static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static ROOTFILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"full-path\s*=\s*"([^"]+)""#).expect("valid regex"));
static ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(?:\w+:)?item\b[^>]*>").expect("valid regex"));
static ITEMREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<(?:\w+:)?itemref\b[^>]*\bidref\s*=\s*"([^"]+)""#).expect("valid regex")
});
static ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([\w:-]+)\s*=\s*"([^"]*)""#).expect("valid regex"));

/// Extract plain text from a PDF or EPUB buffer, truncated to `cap` characters.
///
/// Returns an empty string for unsupported mime types and unparseable input.
pub fn extract_text(bytes: &[u8], mime_type: &str, cap: usize) -> String {
    if bytes.is_empty() {
        return String::new();
    }

    let mime = mime_type.trim().to_ascii_lowercase();
    // Third-party parsers can panic on hostile input; treat that as a parse failure.
    let raw = catch_unwind(AssertUnwindSafe(|| match mime.as_str() {
        PDF_MIME => extract_pdf(bytes),
        EPUB_MIME => extract_epub(bytes),
        _ => None,
    }));

    let text = match raw {
        Ok(Some(text)) => collapse_whitespace(&text),
        Ok(None) => String::new(),
        Err(_) => {
            warn!(mime = %mime, "Document parser panicked, returning empty text");
            String::new()
        }
    };

    let truncated = truncate_chars(&text, cap);
    debug!(
        mime = %mime,
        chars = truncated.chars().count(),
        "Extracted document text"
    );
    truncated
}

fn extract_pdf(bytes: &[u8]) -> Option<String> {
    let doc = match lopdf::Document::load_mem(bytes) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(error = %e, "Failed to parse PDF");
            return None;
        }
    };

    let mut pages = Vec::new();
    for page_number in doc.get_pages().keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(text) => pages.push(text),
            Err(e) => debug!(page = page_number, error = %e, "Skipping unreadable PDF page"),
        }
    }

    Some(pages.join(" "))
}

fn extract_epub(bytes: &[u8]) -> Option<String> {
    let mut archive = match zip::ZipArchive::new(Cursor::new(bytes)) {
        Ok(archive) => archive,
        Err(e) => {
            warn!(error = %e, "Failed to open EPUB container");
            return None;
        }
    };

    let spine = spine_documents(&mut archive).unwrap_or_default();
    let mut parts = read_documents(&mut archive, &spine);
    if parts.is_empty() {
        if !spine.is_empty() {
            debug!(entries = spine.len(), "No spine document readable, using archive order");
        }
        let mut names: Vec<String> = archive
            .file_names()
            .filter(|name| is_markup_file(name))
            .map(str::to_string)
            .collect();
        names.sort();
        parts = read_documents(&mut archive, &names);
    }

    Some(parts.join(" "))
}

fn read_documents(archive: &mut zip::ZipArchive<Cursor<&[u8]>>, names: &[String]) -> Vec<String> {
    names
        .iter()
        .filter_map(|name| read_entry(archive, name))
        .map(|markup| strip_markup(&markup))
        .collect()
}

/// Content documents in reading order, from `container.xml` and the OPF spine.
fn spine_documents(archive: &mut zip::ZipArchive<Cursor<&[u8]>>) -> Option<Vec<String>> {
    let container = read_entry(archive, "META-INF/container.xml")?;
    let opf_path = ROOTFILE_RE.captures(&container)?.get(1)?.as_str().to_string();
    let opf = read_entry(archive, &opf_path)?;
    let base = match opf_path.rfind('/') {
        Some(idx) => &opf_path[..idx],
        None => "",
    };

    let manifest: Vec<(String, String)> = ITEM_RE
        .find_iter(&opf)
        .filter_map(|tag| {
            let mut id = None;
            let mut href = None;
            for attr in ATTR_RE.captures_iter(tag.as_str()) {
                match &attr[1] {
                    "id" => id = Some(attr[2].to_string()),
                    "href" => href = Some(attr[2].to_string()),
                    _ => {}
                }
            }
            Some((id?, href?))
        })
        .collect();

    let documents: Vec<String> = ITEMREF_RE
        .captures_iter(&opf)
        .filter_map(|cap| {
            let idref = &cap[1];
            manifest
                .iter()
                .find(|(id, _)| id == idref)
                .map(|(_, href)| resolve_href(base, href))
        })
        .collect();

    Some(documents)
}

/// Archive path for a manifest `href` relative to the OPF directory `base`.
///
/// Drops any fragment, percent-decodes, and folds `.` and `..` segments.
fn resolve_href(base: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or_default();
    let decoded = urlencoding::decode(href)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| href.to_string());

    let mut segments: Vec<&str> = Vec::new();
    for segment in base.split('/').chain(decoded.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

fn read_entry(archive: &mut zip::ZipArchive<Cursor<&[u8]>>, name: &str) -> Option<String> {
    let file = archive.by_name(name).ok()?;
    let mut buf = Vec::new();
    file.take(MAX_EPUB_ENTRY_BYTES).read_to_end(&mut buf).ok()?;
    Some(String::from_utf8_lossy(&buf).into_owned())
}

fn is_markup_file(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".xhtml") || lower.ends_with(".html") || lower.ends_with(".htm")
}

/// Drop scripts, styles, comments and tags, then decode common entities.
fn strip_markup(markup: &str) -> String {
    let text = SCRIPT_RE.replace_all(markup, " ");
    let text = STYLE_RE.replace_all(&text, " ");
    let text = COMMENT_RE.replace_all(&text, " ");
    let text = TAG_RE.replace_all(&text, " ");
    decode_entities(&text)
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}

fn truncate_chars(text: &str, cap: usize) -> String {
    match text.char_indices().nth(cap) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_epub(files: &[(&str, &str)]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            let options = SimpleFileOptions::default();
            for (name, content) in files {
                writer.start_file(*name, options).unwrap();
                writer.write_all(content.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    fn sample_epub() -> Vec<u8> {
        build_epub(&[
            ("mimetype", "application/epub+zip"),
            (
                "META-INF/container.xml",
                r#"<container><rootfiles><rootfile full-path="OEBPS/content.opf"/></rootfiles></container>"#,
            ),
            (
                "OEBPS/content.opf",
                r#"<package><manifest>
                    <item id="c2" href="ch2.xhtml" media-type="application/xhtml+xml"/>
                    <item href="ch1.xhtml" id="c1" media-type="application/xhtml+xml"/>
                  </manifest><spine><itemref idref="c1"/><itemref idref="c2"/></spine></package>"#,
            ),
            (
                "OEBPS/ch1.xhtml",
                "<html><head><style>p{color:red}</style><script>alert(1)</script></head>\
                 <body><p>Chapter   one &amp; intro</p></body></html>",
            ),
            ("OEBPS/ch2.xhtml", "<html><body><!-- note --><p>Chapter two</p></body></html>"),
        ])
    }

    #[test]
    fn test_epub_text_in_spine_order() {
        let text = extract_text(&sample_epub(), EPUB_MIME, TEXT_CAP_GENERAL);
        assert_eq!(text, "Chapter one & intro Chapter two");
    }

    #[test]
    fn test_epub_without_container_falls_back_to_archive_order() {
        let epub = build_epub(&[
            ("b.html", "<p>second</p>"),
            ("a.html", "<p>first</p>"),
            ("style.css", "body{}"),
        ]);
        assert_eq!(extract_text(&epub, EPUB_MIME, 100), "first second");
    }

    fn epub_with_opf(opf_path: &str, href: &str, entry: &str) -> Vec<u8> {
        let container = format!(
            r#"<container><rootfiles><rootfile full-path="{}"/></rootfiles></container>"#,
            opf_path
        );
        let opf = format!(
            r#"<package><manifest><item id="c1" href="{}" media-type="application/xhtml+xml"/></manifest><spine><itemref idref="c1"/></spine></package>"#,
            href
        );
        build_epub(&[
            ("META-INF/container.xml", &container),
            (opf_path, &opf),
            (entry, "<html><body><p>Real chapter text</p></body></html>"),
        ])
    }

    #[test]
    fn test_epub_percent_encoded_href() {
        let epub = epub_with_opf(
            "OEBPS/content.opf",
            "Text/chapter%201.xhtml#start",
            "OEBPS/Text/chapter 1.xhtml",
        );
        assert_eq!(extract_text(&epub, EPUB_MIME, 100), "Real chapter text");
    }

    #[test]
    fn test_epub_parent_relative_href() {
        let epub = epub_with_opf("OEBPS/opf/content.opf", "../Text/./ch1.xhtml", "OEBPS/Text/ch1.xhtml");
        assert_eq!(extract_text(&epub, EPUB_MIME, 100), "Real chapter text");
    }

    #[test]
    fn test_epub_unresolvable_spine_falls_back_to_archive_order() {
        let epub = epub_with_opf("OEBPS/content.opf", "missing.xhtml", "OEBPS/present.xhtml");
        assert_eq!(extract_text(&epub, EPUB_MIME, 100), "Real chapter text");
    }

    #[test]
    fn test_resolve_href() {
        assert_eq!(resolve_href("OEBPS", "ch1.xhtml"), "OEBPS/ch1.xhtml");
        assert_eq!(resolve_href("", "ch1.xhtml"), "ch1.xhtml");
        assert_eq!(resolve_href("a/b", "../c%20d.html#x"), "a/c d.html");
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let epub = sample_epub();
        let first = extract_text(&epub, EPUB_MIME, TEXT_CAP_MODERATION);
        let second = extract_text(&epub, EPUB_MIME, TEXT_CAP_MODERATION);
        assert_eq!(first, second);
    }

    #[test]
    fn test_cap_is_in_characters() {
        let epub = build_epub(&[("a.html", "<p>ééééé ééééé</p>")]);
        assert_eq!(extract_text(&epub, EPUB_MIME, 3), "ééé");
    }

    #[test]
    fn test_garbage_returns_empty() {
        assert_eq!(extract_text(b"definitely not a pdf", PDF_MIME, 100), "");
        assert_eq!(extract_text(b"PK\x03\x04 broken", EPUB_MIME, 100), "");
        assert_eq!(extract_text(b"", PDF_MIME, 100), "");
    }

    #[test]
    fn test_unsupported_mime_returns_empty() {
        assert_eq!(extract_text(b"hello", "text/plain", 100), "");
    }

    #[test]
    fn test_strip_markup() {
        let stripped = strip_markup("<div>a&lt;b</div><SCRIPT type=x>bad()</SCRIPT>c");
        assert_eq!(collapse_whitespace(&stripped), "a<b c");
    }

    #[test]
    fn test_pdf_text() {
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Document, Object, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal("Hello moderation")]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();

        let text = extract_text(&bytes, PDF_MIME, TEXT_CAP_GENERAL);
        assert!(text.contains("Hello moderation"), "got {text:?}");
    }
}
