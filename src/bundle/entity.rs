//! Archived entity records.
//!
//! Each entity kind has a self-contained JSON record stored under its own
//! directory in the archive. The closed [`ArchivedEntity`] enum ties kinds
//! to their directory and (de)serializer, so adding a kind forces every
//! match over it to be revisited.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::identity::ContentIdentity;
use crate::models::{Analysis, Document, Grouping, Profile};

use super::error::BundleResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Document,
    Grouping,
    Profile,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [
        EntityKind::Document,
        EntityKind::Grouping,
        EntityKind::Profile,
    ];

    /// Archive directory holding records of this kind.
    pub fn dir(&self) -> &'static str {
        match self {
            EntityKind::Document => "documents",
            EntityKind::Grouping => "groupings",
            EntityKind::Profile => "profiles",
        }
    }

    pub fn entry_name(&self, archived_id: &str) -> String {
        format!("{}/{}.json", self.dir(), archived_id)
    }

    /// Classify an archive entry name like `documents/<id>.json`.
    pub fn from_entry_name(name: &str) -> Option<(EntityKind, &str)> {
        let (dir, file) = name.split_once('/')?;
        let id = file.strip_suffix(".json")?;
        if id.is_empty() || id.contains('/') {
            return None;
        }
        let kind = EntityKind::ALL.into_iter().find(|k| k.dir() == dir)?;
        Some((kind, id))
    }
}

/// Snapshot of one document at export time.
///
/// `text`, `pages`, and `analyses` serialize as `null` when not exported, so
/// an importer can tell "not exported" from "exported empty".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedDocument {
    pub id: String,
    pub content_hash: ContentIdentity,
    pub filename: String,
    pub file_path: Option<String>,
    pub file_size: i64,
    pub mime_type: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub year: Option<i64>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub report_type: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub text: Option<String>,
    pub pages: Option<Vec<String>>,
    /// Analysis kind → payload.
    pub analyses: Option<BTreeMap<String, serde_json::Value>>,
    /// Entry name under `sourcefiles/` holding this document's bytes.
    #[serde(default)]
    pub source_file: Option<String>,
    pub created_at: i64,
}

impl ArchivedDocument {
    /// Snapshot `doc`. `analyses` is `None` when analysis is not exported.
    pub fn from_live(doc: &Document, analyses: Option<&[Analysis]>, include_text: bool) -> Self {
        Self {
            id: doc.id.clone(),
            content_hash: doc.content_hash.clone(),
            filename: doc.filename.clone(),
            file_path: doc.file_path.clone(),
            file_size: doc.file_size,
            mime_type: doc.mime_type.clone(),
            title: doc.title.clone(),
            organization: doc.organization.clone(),
            year: doc.year,
            domain: doc.domain.clone(),
            country: doc.country.clone(),
            report_type: doc.report_type.clone(),
            metadata: doc.metadata.clone(),
            text: if include_text { doc.text.clone() } else { None },
            pages: if include_text { doc.pages.clone() } else { None },
            analyses: analyses.map(|list| {
                list.iter()
                    .map(|a| (a.kind.clone(), a.payload.clone()))
                    .collect()
            }),
            source_file: None,
            created_at: doc.created_at,
        }
    }

    /// Build a new live document (and its analyses) under a fresh identifier.
    pub fn into_live(
        self,
        new_id: &str,
        workspace_id: &str,
        file_path: Option<String>,
        now: i64,
    ) -> (Document, Vec<Analysis>) {
        let analyses = self
            .analyses
            .unwrap_or_default()
            .into_iter()
            .map(|(kind, payload)| Analysis {
                document_id: new_id.to_string(),
                kind,
                payload,
                created_at: now,
            })
            .collect();

        let metadata = if self.metadata.is_null() {
            serde_json::json!({})
        } else {
            self.metadata
        };

        let doc = Document {
            id: new_id.to_string(),
            workspace_id: workspace_id.to_string(),
            content_hash: self.content_hash,
            filename: self.filename,
            file_path: file_path.or(self.file_path),
            file_size: self.file_size,
            mime_type: self.mime_type,
            title: self.title,
            organization: self.organization,
            year: self.year,
            domain: self.domain,
            country: self.country,
            report_type: self.report_type,
            metadata,
            text: self.text,
            pages: self.pages,
            created_at: now,
        };
        (doc, analyses)
    }
}

/// Snapshot of a grouping. `document_ids` are the exporting workspace's
/// document identifiers and must be translated before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedGrouping {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub document_ids: Vec<String>,
    pub created_at: i64,
}

impl ArchivedGrouping {
    pub fn from_live(grouping: &Grouping) -> Self {
        Self {
            id: grouping.id.clone(),
            name: grouping.name.clone(),
            description: grouping.description.clone(),
            color: grouping.color.clone(),
            document_ids: grouping.document_ids.clone(),
            created_at: grouping.created_at,
        }
    }

    /// Build a live grouping from already-translated member ids.
    pub fn into_live(
        self,
        new_id: &str,
        workspace_id: &str,
        members: Vec<String>,
        now: i64,
    ) -> Grouping {
        Grouping {
            id: new_id.to_string(),
            workspace_id: workspace_id.to_string(),
            name: self.name,
            description: self.description,
            color: self.color,
            document_ids: members,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub is_active: bool,
    pub created_at: i64,
}

impl ArchivedProfile {
    pub fn from_live(profile: &Profile) -> Self {
        Self {
            id: profile.id.clone(),
            name: profile.name.clone(),
            description: profile.description.clone(),
            config: profile.config.clone(),
            is_active: profile.is_active,
            created_at: profile.created_at,
        }
    }

    /// Imported profiles are always inactive so they never displace the
    /// target workspace's current profile.
    pub fn into_live(self, new_id: &str, workspace_id: &str, now: i64) -> Profile {
        Profile {
            id: new_id.to_string(),
            workspace_id: workspace_id.to_string(),
            name: self.name,
            description: self.description,
            config: self.config,
            is_active: false,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArchivedEntity {
    Document(ArchivedDocument),
    Grouping(ArchivedGrouping),
    Profile(ArchivedProfile),
}

impl ArchivedEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            ArchivedEntity::Document(_) => EntityKind::Document,
            ArchivedEntity::Grouping(_) => EntityKind::Grouping,
            ArchivedEntity::Profile(_) => EntityKind::Profile,
        }
    }

    pub fn archived_id(&self) -> &str {
        match self {
            ArchivedEntity::Document(d) => &d.id,
            ArchivedEntity::Grouping(g) => &g.id,
            ArchivedEntity::Profile(p) => &p.id,
        }
    }

    pub fn entry_name(&self) -> String {
        self.kind().entry_name(self.archived_id())
    }

    pub fn to_json(&self) -> BundleResult<Vec<u8>> {
        let bytes = match self {
            ArchivedEntity::Document(d) => serde_json::to_vec_pretty(d)?,
            ArchivedEntity::Grouping(g) => serde_json::to_vec_pretty(g)?,
            ArchivedEntity::Profile(p) => serde_json::to_vec_pretty(p)?,
        };
        Ok(bytes)
    }

    pub fn from_json(kind: EntityKind, bytes: &[u8]) -> BundleResult<Self> {
        let entity = match kind {
            EntityKind::Document => ArchivedEntity::Document(serde_json::from_slice(bytes)?),
            EntityKind::Grouping => ArchivedEntity::Grouping(serde_json::from_slice(bytes)?),
            EntityKind::Profile => ArchivedEntity::Profile(serde_json::from_slice(bytes)?),
        };
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn live_doc() -> Document {
        Document {
            id: "doc-a".into(),
            workspace_id: "ws".into(),
            content_hash: ContentIdentity::from_bytes(b"report"),
            filename: "report.pdf".into(),
            file_path: Some("/data/report.pdf".into()),
            file_size: 6,
            mime_type: "application/pdf".into(),
            title: Some("Annual report".into()),
            organization: Some("ACME".into()),
            year: Some(2021),
            domain: None,
            country: Some("NL".into()),
            report_type: Some("annual".into()),
            metadata: json!({"pages": 12}),
            text: Some("full text".into()),
            pages: Some(vec!["page one".into()]),
            created_at: 100,
        }
    }

    fn analysis(kind: &str) -> Analysis {
        Analysis {
            document_id: "doc-a".into(),
            kind: kind.into(),
            payload: json!({"score": 0.5}),
            created_at: 100,
        }
    }

    #[test]
    fn omitted_fields_are_null_not_empty() {
        let archived = ArchivedDocument::from_live(&live_doc(), None, false);
        let value = serde_json::to_value(&archived).unwrap();
        assert!(value["text"].is_null());
        assert!(value["pages"].is_null());
        assert!(value["analyses"].is_null());
        assert!(value.as_object().unwrap().contains_key("text"));
    }

    #[test]
    fn exported_empty_text_survives_as_empty() {
        let mut doc = live_doc();
        doc.text = Some(String::new());
        let archived = ArchivedDocument::from_live(&doc, Some(&[][..]), true);
        let back: ArchivedDocument =
            serde_json::from_slice(&serde_json::to_vec(&archived).unwrap()).unwrap();
        assert_eq!(back.text.as_deref(), Some(""));
        assert_eq!(back.analyses, Some(BTreeMap::new()));
    }

    #[test]
    fn into_live_uses_fresh_id_and_reattaches_analyses() {
        let list = vec![analysis("sentiment"), analysis("topics")];
        let archived = ArchivedDocument::from_live(&live_doc(), Some(list.as_slice()), true);
        let (doc, analyses) = archived.into_live("new-id", "target", None, 500);

        assert_eq!(doc.id, "new-id");
        assert_eq!(doc.workspace_id, "target");
        assert_eq!(doc.file_path.as_deref(), Some("/data/report.pdf"));
        assert_eq!(doc.created_at, 500);
        assert_eq!(analyses.len(), 2);
        assert!(analyses.iter().all(|a| a.document_id == "new-id"));
        assert_eq!(analyses[0].kind, "sentiment");
    }

    #[test]
    fn imported_profile_is_never_active() {
        let archived = ArchivedProfile {
            id: "p1".into(),
            name: "Strict".into(),
            description: None,
            config: json!({"threshold": 3}),
            is_active: true,
            created_at: 1,
        };
        let profile = archived.into_live("p-new", "target", 9);
        assert!(!profile.is_active);
        assert_eq!(profile.config["threshold"], 3);
    }

    #[test]
    fn entry_names_round_trip_through_kind() {
        for kind in EntityKind::ALL {
            let name = kind.entry_name("abc-123");
            assert_eq!(EntityKind::from_entry_name(&name), Some((kind, "abc-123")));
        }
        assert_eq!(EntityKind::from_entry_name("manifest.json"), None);
        assert_eq!(EntityKind::from_entry_name("sourcefiles/a.json"), None);
        assert_eq!(EntityKind::from_entry_name("documents/.json"), None);
        assert_eq!(EntityKind::from_entry_name("documents/x/y.json"), None);
    }

    #[test]
    fn malformed_record_is_an_error() {
        let err = ArchivedEntity::from_json(EntityKind::Document, br#"{"id": 5}"#);
        assert!(err.is_err());

        let grouping = ArchivedEntity::from_json(
            EntityKind::Grouping,
            br#"{"id": "g1", "name": "Climate", "created_at": 3}"#,
        )
        .unwrap();
        assert_eq!(grouping.kind(), EntityKind::Grouping);
        assert_eq!(grouping.entry_name(), "groupings/g1.json");
    }
}
