//! manifest
//!
//! Reading and writing the declarative manifest: the set of remotes,
//! repo entries, and default attribute values that describes one
//! project configuration.
//!
//! The manifest is an XML file with a single `<manifest>` root holding
//! `<default>`, `<remote>`, and `<repo>` elements (`<project>` is
//! accepted as an alias for `<repo>` on read). Writes are deterministic:
//! remotes and entries are emitted in key order with a fixed attribute
//! order, so manifest diffs stay meaningful to the version control
//! system that tracks the file.
//!
//! Two read forms exist:
//! - [`read`] merges defaults into every entry (entry attributes
//!   override `<default>` attributes override built-in fallbacks), which
//!   is what checkout/update/publish operate on.
//! - [`read_raw`] returns the unmerged form for editing, so `add`,
//!   `remove`, and `remote_add` can rewrite the file without baking
//!   defaults into it.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::error::{Result, RugError};

/// Name of the manifest file inside the manifest repository.
pub const MANIFEST_FILE: &str = "manifest.xml";

/// Built-in fallback revision when neither the entry nor `<default>`
/// specifies one.
pub const FALLBACK_REVISION: &str = "master";

/// Built-in fallback vcs kind.
pub const FALLBACK_VCS: &str = "git";

/// A named remote: base URL that entry names are joined onto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    pub name: String,
    pub fetch: String,
}

/// Attribute values applied to entries that do not specify their own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestDefault {
    pub revision: Option<String>,
    pub remote: Option<String>,
    pub vcs: Option<String>,
}

impl ManifestDefault {
    /// The built-in fallback defaults applied below `<default>`.
    pub fn fallback() -> Self {
        Self {
            revision: Some(FALLBACK_REVISION.to_string()),
            remote: None,
            vcs: Some(FALLBACK_VCS.to_string()),
        }
    }

    /// Layer `self` on top of `under`: values present in `self` win.
    pub fn over(&self, under: &ManifestDefault) -> ManifestDefault {
        ManifestDefault {
            revision: self.revision.clone().or_else(|| under.revision.clone()),
            remote: self.remote.clone().or_else(|| under.remote.clone()),
            vcs: self.vcs.clone().or_else(|| under.vcs.clone()),
        }
    }
}

/// A repo entry as written in the manifest file (nothing merged in).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    pub path: String,
    pub name: Option<String>,
    pub remote: Option<String>,
    pub revision: Option<String>,
    pub vcs: Option<String>,
    pub unpublished: bool,
}

/// A repo entry with defaults merged in.
///
/// `revision` and `vcs` always resolve (built-in fallbacks exist);
/// `name` and `remote` may still be absent, in which case checkout
/// fails for that entry only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: String,
    pub name: Option<String>,
    pub remote: Option<String>,
    pub revision: String,
    pub vcs: String,
    pub unpublished: bool,
}

/// The unmerged manifest: what the file literally says.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawManifest {
    pub remotes: BTreeMap<String, Remote>,
    pub entries: BTreeMap<String, RawEntry>,
    pub default: ManifestDefault,
}

/// The merged manifest used by project operations.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub remotes: BTreeMap<String, Remote>,
    pub entries: BTreeMap<String, Entry>,
    pub default: ManifestDefault,
}

impl RawManifest {
    /// Merge defaults into every entry. `fallback` sits below the
    /// manifest's own `<default>` element.
    pub fn merge(&self, fallback: &ManifestDefault) -> Manifest {
        let default = self.default.over(fallback);
        let entries = self
            .entries
            .iter()
            .map(|(path, raw)| {
                let entry = Entry {
                    path: raw.path.clone(),
                    name: raw.name.clone(),
                    remote: raw.remote.clone().or_else(|| default.remote.clone()),
                    revision: raw
                        .revision
                        .clone()
                        .or_else(|| default.revision.clone())
                        .unwrap_or_else(|| FALLBACK_REVISION.to_string()),
                    vcs: raw
                        .vcs
                        .clone()
                        .or_else(|| default.vcs.clone())
                        .unwrap_or_else(|| FALLBACK_VCS.to_string()),
                    unpublished: raw.unpublished,
                };
                (path.clone(), entry)
            })
            .collect();

        Manifest {
            remotes: self.remotes.clone(),
            entries,
            default: self.default.clone(),
        }
    }
}

/// Read the manifest at `path` with defaults merged into every entry.
pub fn read(path: &Path, fallback: &ManifestDefault) -> Result<Manifest> {
    Ok(read_raw(path)?.merge(fallback))
}

/// Read the manifest at `path` without merging defaults.
pub fn read_raw(path: &Path) -> Result<RawManifest> {
    let text = fs::read_to_string(path)?;
    read_raw_str(&text)
}

/// Parse an unmerged manifest from XML text.
pub fn read_raw_str(xml: &str) -> Result<RawManifest> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut manifest = RawManifest::default();
    let mut saw_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let tag = e.name();
                let tag = tag.as_ref();
                if !saw_root {
                    if tag != b"manifest" {
                        return Err(RugError::malformed("no manifest element"));
                    }
                    saw_root = true;
                    continue;
                }
                match tag {
                    b"default" => {
                        // Later default elements layer over earlier ones.
                        let node = ManifestDefault {
                            revision: get_attr(e, b"revision")?,
                            remote: get_attr(e, b"remote")?,
                            vcs: get_attr(e, b"vcs")?,
                        };
                        manifest.default = node.over(&manifest.default);
                    }
                    b"remote" => {
                        let remote = Remote {
                            name: require_attr(e, b"name")?,
                            fetch: require_attr(e, b"fetch")?,
                        };
                        manifest.remotes.insert(remote.name.clone(), remote);
                    }
                    b"repo" | b"project" => {
                        let entry = RawEntry {
                            path: require_attr(e, b"path")?,
                            name: get_attr(e, b"name")?,
                            remote: get_attr(e, b"remote")?,
                            revision: get_attr(e, b"revision")?,
                            vcs: get_attr(e, b"vcs")?,
                            unpublished: get_attr(e, b"unpublished")?
                                .map(|v| v == "true" || v == "1")
                                .unwrap_or(false),
                        };
                        if manifest.entries.contains_key(&entry.path) {
                            return Err(RugError::DuplicatePath {
                                first: entry.path.clone(),
                                second: entry.path,
                            });
                        }
                        manifest.entries.insert(entry.path.clone(), entry);
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(RugError::malformed(format!("xml parse error: {}", e))),
        }
    }

    if !saw_root {
        return Err(RugError::malformed("no manifest element"));
    }

    Ok(manifest)
}

/// Write the manifest to `path`, deterministically.
pub fn write(path: &Path, manifest: &RawManifest) -> Result<()> {
    let text = write_str(manifest)?;
    fs::write(path, text)?;
    Ok(())
}

/// Serialize an unmerged manifest to XML text.
///
/// Remotes and entries are emitted in key order, attributes in a fixed
/// order, absent attributes omitted.
pub fn write_str(manifest: &RawManifest) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b'\t', 1);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(write_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("manifest")))
        .map_err(write_err)?;

    let mut default = BytesStart::new("default");
    if let Some(revision) = &manifest.default.revision {
        default.push_attribute(("revision", revision.as_str()));
    }
    if let Some(remote) = &manifest.default.remote {
        default.push_attribute(("remote", remote.as_str()));
    }
    if let Some(vcs) = &manifest.default.vcs {
        default.push_attribute(("vcs", vcs.as_str()));
    }
    writer
        .write_event(Event::Empty(default))
        .map_err(write_err)?;

    for remote in manifest.remotes.values() {
        let mut node = BytesStart::new("remote");
        node.push_attribute(("name", remote.name.as_str()));
        node.push_attribute(("fetch", remote.fetch.as_str()));
        writer.write_event(Event::Empty(node)).map_err(write_err)?;
    }

    for entry in manifest.entries.values() {
        let mut node = BytesStart::new("repo");
        node.push_attribute(("path", entry.path.as_str()));
        if let Some(name) = &entry.name {
            node.push_attribute(("name", name.as_str()));
        }
        if let Some(remote) = &entry.remote {
            node.push_attribute(("remote", remote.as_str()));
        }
        if let Some(revision) = &entry.revision {
            node.push_attribute(("revision", revision.as_str()));
        }
        if let Some(vcs) = &entry.vcs {
            node.push_attribute(("vcs", vcs.as_str()));
        }
        if entry.unpublished {
            node.push_attribute(("unpublished", "true"));
        }
        writer.write_event(Event::Empty(node)).map_err(write_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("manifest")))
        .map_err(write_err)?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    String::from_utf8(bytes).map_err(|e| RugError::malformed(format!("manifest not utf-8: {}", e)))
}

fn write_err(e: std::io::Error) -> RugError {
    RugError::malformed(format!("xml write error: {}", e))
}

fn get_attr(e: &BytesStart, name: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| RugError::malformed(format!("invalid attribute: {}", e)))?;
        if attr.key.as_ref() == name {
            let value = attr
                .unescape_value()
                .map_err(|e| RugError::malformed(format!("invalid attribute value: {}", e)))?;
            return Ok(Some(value.to_string()));
        }
    }
    Ok(None)
}

fn require_attr(e: &BytesStart, name: &[u8]) -> Result<String> {
    get_attr(e, name)?.ok_or_else(|| {
        RugError::malformed(format!(
            "missing required attribute: {}",
            String::from_utf8_lossy(name)
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<manifest>
	<default remote="origin" revision="dev"/>
	<remote name="origin" fetch="git://example.com/base"/>
	<remote name="mirror" fetch="git://mirror.example.com"/>
	<repo path="libs/foo" name="foo"/>
	<repo path="tools" name="tools" revision="stable" vcs="rug" unpublished="true"/>
</manifest>
"#;

    #[test]
    fn parses_remotes_entries_and_defaults() {
        let raw = read_raw_str(SAMPLE).unwrap();
        assert_eq!(raw.remotes.len(), 2);
        assert_eq!(raw.remotes["origin"].fetch, "git://example.com/base");
        assert_eq!(raw.default.revision.as_deref(), Some("dev"));
        assert_eq!(raw.default.remote.as_deref(), Some("origin"));
        assert_eq!(raw.default.vcs, None);

        let foo = &raw.entries["libs/foo"];
        assert_eq!(foo.name.as_deref(), Some("foo"));
        assert_eq!(foo.revision, None);
        assert!(!foo.unpublished);

        let tools = &raw.entries["tools"];
        assert_eq!(tools.revision.as_deref(), Some("stable"));
        assert_eq!(tools.vcs.as_deref(), Some("rug"));
        assert!(tools.unpublished);
    }

    #[test]
    fn merge_applies_entry_over_default_over_fallback() {
        let raw = read_raw_str(SAMPLE).unwrap();
        let merged = raw.merge(&ManifestDefault::fallback());

        let foo = &merged.entries["libs/foo"];
        assert_eq!(foo.revision, "dev"); // from <default>
        assert_eq!(foo.vcs, "git"); // built-in fallback
        assert_eq!(foo.remote.as_deref(), Some("origin"));

        let tools = &merged.entries["tools"];
        assert_eq!(tools.revision, "stable"); // entry wins
        assert_eq!(tools.vcs, "rug");
    }

    #[test]
    fn project_is_an_alias_for_repo() {
        let raw = read_raw_str(
            r#"<manifest><project path="a" name="a"/><repo path="b" name="b"/></manifest>"#,
        )
        .unwrap();
        assert_eq!(raw.entries.len(), 2);
    }

    #[test]
    fn missing_root_is_malformed() {
        let err = read_raw_str("<mainfest></mainfest>").unwrap_err();
        assert!(matches!(err, RugError::MalformedManifest { .. }));
        let err = read_raw_str("").unwrap_err();
        assert!(matches!(err, RugError::MalformedManifest { .. }));
    }

    #[test]
    fn missing_required_keys_are_malformed() {
        let err = read_raw_str(r#"<manifest><remote fetch="url"/></manifest>"#).unwrap_err();
        assert!(matches!(err, RugError::MalformedManifest { .. }));
        let err = read_raw_str(r#"<manifest><repo name="x"/></manifest>"#).unwrap_err();
        assert!(matches!(err, RugError::MalformedManifest { .. }));
    }

    #[test]
    fn duplicate_entry_paths_are_rejected() {
        let err = read_raw_str(
            r#"<manifest><repo path="a" name="x"/><repo path="a" name="y"/></manifest>"#,
        )
        .unwrap_err();
        assert!(matches!(err, RugError::DuplicatePath { .. }));
    }

    #[test]
    fn write_is_deterministic_and_readable_back() {
        let raw = read_raw_str(SAMPLE).unwrap();
        let once = write_str(&raw).unwrap();
        let twice = write_str(&read_raw_str(&once).unwrap()).unwrap();
        assert_eq!(once, twice);
        assert_eq!(read_raw_str(&once).unwrap(), raw);
    }

    #[test]
    fn attribute_values_survive_escaping() {
        let mut raw = RawManifest::default();
        raw.remotes.insert(
            "origin".to_string(),
            Remote {
                name: "origin".to_string(),
                fetch: "git://example.com/a&b \"c\"".to_string(),
            },
        );
        let text = write_str(&raw).unwrap();
        let back = read_raw_str(&text).unwrap();
        assert_eq!(back, raw);
    }

    fn ident() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_-]{0,7}"
    }

    fn path_strategy() -> impl Strategy<Value = String> {
        prop::collection::vec(ident(), 1..3).prop_map(|segments| segments.join("/"))
    }

    fn raw_entry(path: String) -> impl Strategy<Value = RawEntry> {
        (
            prop::option::of(ident()),
            prop::option::of(ident()),
            prop::option::of(ident()),
            prop::option::of(ident()),
            any::<bool>(),
        )
            .prop_map(move |(name, remote, revision, vcs, unpublished)| RawEntry {
                path: path.clone(),
                name,
                remote,
                revision,
                vcs,
                unpublished,
            })
    }

    fn raw_manifest() -> impl Strategy<Value = RawManifest> {
        let remotes = prop::collection::btree_map(ident(), "[a-z0-9:/._-]{1,20}", 0..4).prop_map(
            |m| -> BTreeMap<String, Remote> {
                m.into_iter()
                    .map(|(name, fetch)| (name.clone(), Remote { name, fetch }))
                    .collect()
            },
        );
        let entries = prop::collection::btree_set(path_strategy(), 0..5).prop_flat_map(|paths| {
            let strategies: Vec<_> = paths.into_iter().map(raw_entry).collect();
            strategies.prop_map(|entries| {
                entries
                    .into_iter()
                    .map(|e| (e.path.clone(), e))
                    .collect::<BTreeMap<_, _>>()
            })
        });
        let default = (
            prop::option::of(ident()),
            prop::option::of(ident()),
            prop::option::of(ident()),
        )
            .prop_map(|(revision, remote, vcs)| ManifestDefault {
                revision,
                remote,
                vcs,
            });

        (remotes, entries, default).prop_map(|(remotes, entries, default)| RawManifest {
            remotes,
            entries,
            default,
        })
    }

    proptest! {
        #[test]
        fn round_trip(manifest in raw_manifest()) {
            let text = write_str(&manifest).unwrap();
            let back = read_raw_str(&text).unwrap();
            prop_assert_eq!(back, manifest);
        }
    }
}
