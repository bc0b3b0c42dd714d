//! Path template resolver
//!
//! Expands `[[placeholder]]` tokens in file path and URL templates from the
//! owning record's state. Resolution never fails: unknown placeholders are
//! kept verbatim and missing values resolve to an empty string.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;
use ub_core::{path_info, PathRoots, Record};

use crate::model::AttachmentPolicy;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([A-Za-z0-9_/]+)\]\]").expect("valid placeholder pattern"));

/// Number of single-character directory levels produced by `[[id_path]]`
pub const ID_PATH_DEPTH: usize = 10;

/// A span of a template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    /// Placeholder name, without the surrounding brackets
    Placeholder(&'a str),
}

/// Split a template into literal and placeholder spans
pub fn tokenize(template: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            segments.push(Segment::Literal(&template[last..whole.start()]));
        }
        segments.push(Segment::Placeholder(name.as_str()));
        last = whole.end();
    }

    if last < template.len() {
        segments.push(Segment::Literal(&template[last..]));
    }
    segments
}

/// Everything a template can draw on
#[derive(Clone, Copy)]
pub struct ResolveContext<'a> {
    pub record: &'a dyn Record,
    /// Attachment attribute whose value supplies the file placeholders
    pub attribute: &'a str,
    pub parent_relation_attribute: Option<&'a str>,
    pub roots: &'a PathRoots,
    /// Thumbnail profile, only set when resolving thumbnail templates
    pub profile: Option<&'a str>,
}

impl<'a> ResolveContext<'a> {
    pub fn new(record: &'a dyn Record, policy: &'a AttachmentPolicy, roots: &'a PathRoots) -> Self {
        Self {
            record,
            attribute: &policy.attribute,
            parent_relation_attribute: policy.parent_relation_attribute.as_deref(),
            roots,
            profile: None,
        }
    }

    pub fn with_profile(self, profile: &'a str) -> Self {
        Self {
            profile: Some(profile),
            ..self
        }
    }
}

/// Name parts of the attachment attribute's current value
#[derive(Debug, Default)]
struct FileParts {
    filename: String,
    extension: String,
}

impl FileParts {
    fn of(value: &str) -> Self {
        let (filename, extension) = path_info(value);
        Self {
            filename: filename.to_string(),
            extension: extension.map(str::to_lowercase).unwrap_or_default(),
        }
    }

    fn basename(&self) -> String {
        if self.extension.is_empty() {
            self.filename.clone()
        } else {
            format!("{}.{}", self.filename, self.extension)
        }
    }
}

type PlaceholderFn = fn(&ResolveContext<'_>, &FileParts) -> String;

fn extension(_: &ResolveContext<'_>, file: &FileParts) -> String {
    file.extension.clone()
}

fn filename(_: &ResolveContext<'_>, file: &FileParts) -> String {
    file.filename.clone()
}

fn basename(_: &ResolveContext<'_>, file: &FileParts) -> String {
    file.basename()
}

fn app_root(ctx: &ResolveContext<'_>, _: &FileParts) -> String {
    ctx.roots.app_root.clone()
}

fn web_root(ctx: &ResolveContext<'_>, _: &FileParts) -> String {
    ctx.roots.web_root.clone()
}

fn base_url(ctx: &ResolveContext<'_>, _: &FileParts) -> String {
    ctx.roots.base_url.clone()
}

fn model(ctx: &ResolveContext<'_>, _: &FileParts) -> String {
    let name = ctx.record.model_name();
    let short = name.rsplit(|c: char| c == ':' || c == '\\').next().unwrap_or(name);
    lcfirst(short)
}

fn attribute(ctx: &ResolveContext<'_>, _: &FileParts) -> String {
    lcfirst(ctx.attribute)
}

fn primary_key(ctx: &ResolveContext<'_>, _: &FileParts) -> String {
    lcfirst(&ctx.record.primary_key().join("_"))
}

fn id_path_of(ctx: &ResolveContext<'_>, _: &FileParts) -> String {
    id_path(&ctx.record.primary_key())
}

fn parent_id(ctx: &ResolveContext<'_>, _: &FileParts) -> String {
    ctx.parent_relation_attribute
        .map(|attr| ctx.record.text(attr))
        .unwrap_or_default()
}

const NAMED: &[(&str, PlaceholderFn)] = &[
    ("extension", extension),
    ("filename", filename),
    ("basename", basename),
    ("app_root", app_root),
    ("web_root", web_root),
    ("base_url", base_url),
    ("model", model),
    ("attribute", attribute),
    ("id", primary_key),
    ("pk", primary_key),
    ("id_path", id_path_of),
    ("parent_id", parent_id),
];

const MD5_ATTRIBUTE_PREFIX: &str = "md5_attribute_";
const ATTRIBUTE_PREFIX: &str = "attribute_";

fn is_field_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn resolve_placeholder(name: &str, ctx: &ResolveContext<'_>, file: &FileParts) -> Option<String> {
    if let Some((_, f)) = NAMED.iter().find(|(n, _)| *n == name) {
        return Some(f(ctx, file));
    }

    if name == "profile" {
        return ctx.profile.map(str::to_string);
    }

    if let Some(field) = name.strip_prefix(MD5_ATTRIBUTE_PREFIX).filter(|f| is_field_name(f)) {
        return Some(format!("{:x}", md5::compute(ctx.record.text(field))));
    }

    if let Some(field) = name.strip_prefix(ATTRIBUTE_PREFIX).filter(|f| is_field_name(f)) {
        return Some(ctx.record.text(field));
    }

    None
}

/// Resolve a template against the record in `ctx`
pub fn resolve(template: &str, ctx: &ResolveContext<'_>) -> String {
    let expanded = ctx.roots.expand(template);
    let file = FileParts::of(&ctx.record.text(ctx.attribute));

    let mut resolved = String::with_capacity(expanded.len());
    for segment in tokenize(&expanded) {
        match segment {
            Segment::Literal(text) => resolved.push_str(text),
            Segment::Placeholder(name) => match resolve_placeholder(name, ctx, &file) {
                Some(value) => resolved.push_str(&value),
                None => {
                    resolved.push_str("[[");
                    resolved.push_str(name);
                    resolved.push_str("]]");
                }
            },
        }
    }

    trace!(template, resolved = %resolved, "Template resolved");
    resolved
}

/// Shard a primary key into single-character directories.
///
/// Key components are concatenated and right-padded with `0` to
/// [`ID_PATH_DEPTH`] characters. Longer keys are not truncated and yield one
/// level per character.
pub fn id_path(key: &[String]) -> String {
    let mut id: String = key.concat();
    let len = id.chars().count();
    if len < ID_PATH_DEPTH {
        id.extend(std::iter::repeat('0').take(ID_PATH_DEPTH - len));
    }

    let mut path = String::with_capacity(id.len() * 2);
    for (i, c) in id.chars().enumerate() {
        if i > 0 {
            path.push('/');
        }
        path.push(c);
    }
    path
}

/// Lower-case the first character (ASCII only)
fn lcfirst(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ub_core::{AttributeValue, MemoryRecord, PendingUpload};

    fn roots() -> PathRoots {
        PathRoots::new("/srv/app", "/srv/app/web", "https://example.com")
    }

    fn post(image: &str) -> MemoryRecord {
        MemoryRecord::new("BlogPost")
            .set("id", 42)
            .set("image", image)
            .set("slug", "Hello-World")
            .set("album_id", 7)
    }

    fn resolve_for(record: &MemoryRecord, template: &str) -> String {
        let policy = AttachmentPolicy::new("image").parent_relation("album_id");
        let roots = roots();
        resolve(template, &ResolveContext::new(record, &policy, &roots))
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("/a/[[pk]].[[extension]]"),
            vec![
                Segment::Literal("/a/"),
                Segment::Placeholder("pk"),
                Segment::Literal("."),
                Segment::Placeholder("extension"),
            ]
        );
        assert!(tokenize("").is_empty());
        assert_eq!(tokenize("[[a b]]"), vec![Segment::Literal("[[a b]]")]);
        assert_eq!(
            tokenize("[[[x]]]"),
            vec![
                Segment::Literal("["),
                Segment::Placeholder("x"),
                Segment::Literal("]"),
            ]
        );
    }

    #[test]
    fn test_no_placeholders_only_alias_expansion() {
        let record = post("photo.jpg");
        assert_eq!(resolve_for(&record, "/static/logo.png"), "/static/logo.png");
        assert_eq!(resolve_for(&record, "@webroot/static/x y"), "/srv/app/web/static/x y");
        assert_eq!(resolve_for(&record, "[[ not a token ]]"), "[[ not a token ]]");
    }

    #[test]
    fn test_file_placeholders() {
        let record = post("photo.JPG");
        assert_eq!(resolve_for(&record, "[[extension]]"), "jpg");
        assert_eq!(resolve_for(&record, "[[filename]]"), "photo");
        assert_eq!(resolve_for(&record, "[[basename]]"), "photo.jpg");
    }

    #[test]
    fn test_basename_without_extension() {
        let record = post("README");
        assert_eq!(resolve_for(&record, "[[basename]]"), "README");
        assert_eq!(resolve_for(&record, "[[extension]]"), "");
    }

    #[test]
    fn test_missing_file_resolves_empty() {
        let record = MemoryRecord::new("Post").set("id", 1);
        assert_eq!(resolve_for(&record, "/u/[[pk]].[[extension]]"), "/u/1.");
        assert_eq!(resolve_for(&record, "[[filename]][[basename]]"), "");
    }

    #[test]
    fn test_pending_upload_supplies_file_parts() {
        let record = MemoryRecord::new("Post")
            .set("id", 3)
            .set("image", AttributeValue::from(PendingUpload::new("/tmp/x", "Scan.PNG", 1)));
        assert_eq!(resolve_for(&record, "[[pk]].[[extension]]"), "3.png");
    }

    #[test]
    fn test_root_placeholders() {
        let record = post("a.png");
        assert_eq!(
            resolve_for(&record, "[[app_root]]|[[web_root]]|[[base_url]]"),
            "/srv/app|/srv/app/web|https://example.com"
        );
    }

    #[test]
    fn test_record_placeholders() {
        let record = post("a.png");
        assert_eq!(resolve_for(&record, "[[model]]/[[attribute]]"), "blogPost/image");
        assert_eq!(resolve_for(&record, "[[id]]-[[pk]]"), "42-42");
        assert_eq!(resolve_for(&record, "[[parent_id]]"), "7");
        assert_eq!(resolve_for(&record, "[[attribute_slug]]"), "Hello-World");
        assert_eq!(resolve_for(&record, "[[attribute_missing]]"), "");
    }

    #[test]
    fn test_model_short_name() {
        let record = MemoryRecord::new("app::models::Gallery").set("id", 1);
        assert_eq!(resolve_for(&record, "[[model]]"), "gallery");
    }

    #[test]
    fn test_composite_key() {
        let record = MemoryRecord::with_key("Line", &["order", "line"])
            .set("order", "A7")
            .set("line", 3);
        assert_eq!(resolve_for(&record, "[[pk]]"), "a7_3");
        assert_eq!(resolve_for(&record, "[[id_path]]"), "A/7/3/0/0/0/0/0/0/0");
    }

    #[test]
    fn test_md5_attribute() {
        let record = post("a.png");
        assert_eq!(
            resolve_for(&record, "[[md5_attribute_slug]]"),
            format!("{:x}", md5::compute("Hello-World"))
        );
        assert_eq!(
            resolve_for(&record, "[[md5_attribute_missing]]"),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
    }

    #[test]
    fn test_unrecognized_placeholders_round_trip() {
        let record = post("a.png");
        assert_eq!(resolve_for(&record, "/x/[[bogus]]/y"), "/x/[[bogus]]/y");
        assert_eq!(resolve_for(&record, "[[attribute_a/b]]"), "[[attribute_a/b]]");
        assert_eq!(resolve_for(&record, "[[attribute_]]"), "[[attribute_]]");
        assert_eq!(resolve_for(&record, "[[Extension]]"), "[[Extension]]");
    }

    #[test]
    fn test_profile_only_in_thumbnail_context() {
        let record = post("a.png");
        let policy = AttachmentPolicy::new("image");
        let roots = roots();
        let ctx = ResolveContext::new(&record, &policy, &roots);

        assert_eq!(resolve("[[profile]]_[[pk]]", &ctx), "[[profile]]_42");
        assert_eq!(resolve("[[profile]]_[[pk]]", &ctx.with_profile("small")), "small_42");
    }

    #[test]
    fn test_id_path() {
        assert_eq!(id_path(&["42".to_string()]), "4/2/0/0/0/0/0/0/0/0");
        assert_eq!(id_path(&["abc".to_string()]), "a/b/c/0/0/0/0/0/0/0");
        assert_eq!(id_path(&[]), "0/0/0/0/0/0/0/0/0/0");
        assert_eq!(
            id_path(&["12345".to_string(), "678901".to_string()]),
            "1/2/3/4/5/6/7/8/9/0/1"
        );
    }

    #[test]
    fn test_id_path_placeholder() {
        let record = post("a.png");
        assert_eq!(
            resolve_for(&record, "@webroot/[[id_path]]/[[basename]]"),
            "/srv/app/web/4/2/0/0/0/0/0/0/0/0/a.png"
        );
    }

    #[test]
    fn test_lcfirst() {
        assert_eq!(lcfirst("Post"), "post");
        assert_eq!(lcfirst("ÉTÉ"), "ÉTÉ");
        assert_eq!(lcfirst(""), "");
    }
}
