//! Loading API definitions from YAML or JSON files.
//!
//! A source directory holds any number of `*.yaml`, `*.yml` or `*.json`
//! documents. Each may declare an `api` header, `media_types` and
//! `resources`; all documents are merged into one [`ApiDefinition`].
//!
//! ```yaml
//! api:
//!   name: hello
//!   version: "1.0"
//! media_types:
//!   - identifier: application/vnd.hello
//!     attributes:
//!       - { name: id, type: integer, required: true }
//!       - { name: text, type: string, min_length: 1 }
//!     views:
//!       - { name: default, fields: [id, text] }
//! resources:
//!   - name: hello
//!     prefix: /hello
//!     media_type: application/vnd.hello
//!     actions:
//!       - name: show
//!         route: GET /{id}
//!         params:
//!           - { name: id, type: integer, required: true }
//!         responses:
//!           ok: { status: 200 }
//!           notFound: { status: 404 }
//! ```
//!
//! Problems in any document are collected; the load fails with a single
//! [`DefinitionError`] listing all of them.

use anyhow::{Context, Result};
use http::Method;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use super::action::{Action, ResponseSpec};
use super::api::ApiDefinition;
use super::attribute::{Attribute, Constraints, Pattern};
use super::media_type::{MediaType, ViewField};
use super::resource::Resource;
use super::types::{AttributeType, Primitive};
use crate::error::{DefinitionError, DefinitionIssue};

/// Deserialize a mapping into key/value pairs, keeping document order.
fn ordered_map<'de, D, T>(deserializer: D) -> Result<Vec<(String, T)>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    struct OrderedVisitor<T>(PhantomData<T>);

    impl<'de, T: Deserialize<'de>> Visitor<'de> for OrderedVisitor<T> {
        type Value = Vec<(String, T)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a mapping")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::new();
            while let Some(entry) = map.next_entry()? {
                entries.push(entry);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(OrderedVisitor(PhantomData))
}

#[derive(Debug, Default, Deserialize)]
struct Document {
    #[serde(default)]
    api: Option<ApiHeader>,
    #[serde(default)]
    media_types: Vec<MediaTypeDoc>,
    #[serde(default)]
    resources: Vec<ResourceDoc>,
}

#[derive(Debug, Deserialize)]
struct ApiHeader {
    name: String,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TypeDoc {
    String,
    Integer,
    Float,
    Boolean,
    #[serde(alias = "date_time")]
    Datetime,
    Any,
    Object {
        attributes: Vec<AttributeDoc>,
    },
    Array {
        items: Box<TypeDoc>,
    },
    MediaType {
        media_type: String,
    },
}

impl TypeDoc {
    fn into_type(self) -> AttributeType {
        match self {
            TypeDoc::String => AttributeType::primitive(Primitive::String),
            TypeDoc::Integer => AttributeType::primitive(Primitive::Integer),
            TypeDoc::Float => AttributeType::primitive(Primitive::Float),
            TypeDoc::Boolean => AttributeType::primitive(Primitive::Boolean),
            TypeDoc::Datetime => AttributeType::primitive(Primitive::DateTime),
            TypeDoc::Any => AttributeType::primitive(Primitive::Any),
            TypeDoc::Object { attributes } => {
                AttributeType::composite(attributes.into_iter().map(AttributeDoc::into_attribute).collect())
            }
            TypeDoc::Array { items } => AttributeType::collection(items.into_type()),
            TypeDoc::MediaType { media_type } => AttributeType::media_type(media_type),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AttributeDoc {
    name: String,
    #[serde(flatten)]
    ty: TypeDoc,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    min_length: Option<usize>,
    #[serde(default)]
    max_length: Option<usize>,
    #[serde(default)]
    minimum: Option<f64>,
    #[serde(default)]
    maximum: Option<f64>,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default, rename = "enum")]
    allowed: Option<Vec<Value>>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    view: Option<String>,
}

impl AttributeDoc {
    fn into_attribute(self) -> Attribute {
        let mut attr = Attribute::new(self.name, self.ty.into_type());
        attr.constraints = Constraints {
            required: self.required,
            min_length: self.min_length,
            max_length: self.max_length,
            minimum: self.minimum,
            maximum: self.maximum,
            pattern: self.pattern.map(Pattern::new),
            allowed: self.allowed,
        };
        attr.description = self.description;
        attr.view = self.view;
        attr
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ViewFieldDoc {
    Name(String),
    Detailed {
        attribute: String,
        #[serde(default)]
        view: Option<String>,
    },
}

impl From<ViewFieldDoc> for ViewField {
    fn from(doc: ViewFieldDoc) -> Self {
        match doc {
            ViewFieldDoc::Name(name) => ViewField::new(name),
            ViewFieldDoc::Detailed { attribute, view } => ViewField {
                attribute,
                view,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ViewDoc {
    name: String,
    fields: Vec<ViewFieldDoc>,
}

#[derive(Debug, Deserialize)]
struct MediaTypeDoc {
    identifier: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    attributes: Vec<AttributeDoc>,
    #[serde(default)]
    views: Vec<ViewDoc>,
}

#[derive(Debug, Deserialize)]
struct ResponseDoc {
    status: u16,
    #[serde(default)]
    media_type: Option<String>,
    #[serde(default)]
    view: Option<String>,
    #[serde(default, deserialize_with = "ordered_map")]
    headers: Vec<(String, String)>,
    #[serde(default)]
    multipart: bool,
}

#[derive(Debug, Deserialize)]
struct ActionDoc {
    name: String,
    /// `METHOD path`, e.g. `GET /{id}`
    route: String,
    #[serde(default)]
    params: Vec<AttributeDoc>,
    #[serde(default)]
    payload: Option<Vec<AttributeDoc>>,
    #[serde(deserialize_with = "ordered_map")]
    responses: Vec<(String, ResponseDoc)>,
    #[serde(default)]
    timeout_ms: Option<u64>,
    #[serde(default)]
    multipart: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResourceDoc {
    name: String,
    #[serde(default)]
    prefix: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    media_type: Option<String>,
    #[serde(default)]
    actions: Vec<ActionDoc>,
}

fn parse_route(route: &str) -> Result<(Method, String), String> {
    let mut parts = route.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| "route is empty".to_string())?;
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| format!("`{method}` is not an HTTP method"))?;
    let path = parts.next().unwrap_or("").to_string();
    if parts.next().is_some() {
        return Err(format!("route `{route}` must look like `METHOD /path`"));
    }
    Ok((method, path))
}

fn build_resource(doc: ResourceDoc) -> Result<Resource, Vec<DefinitionIssue>> {
    let location = format!("resource:{}", doc.name);
    let mut issues = Vec::new();
    let mut builder = Resource::builder(doc.name).prefix(doc.prefix);
    if let Some(version) = doc.version {
        builder = builder.version(version);
    }
    if let Some(media_type) = doc.media_type {
        builder = builder.media_type(media_type);
    }
    for action in doc.actions {
        let (method, path) = match parse_route(&action.route) {
            Ok(route) => route,
            Err(e) => {
                issues.push(DefinitionIssue::new(
                    format!("{location}/action:{}", action.name),
                    "invalid_route",
                    e,
                ));
                continue;
            }
        };
        let mut ab = Action::builder(action.name).route(method, path);
        for p in action.params {
            ab = ab.param(p.into_attribute());
        }
        if let Some(payload) = action.payload {
            ab = ab.payload(payload.into_iter().map(AttributeDoc::into_attribute).collect());
        }
        for (key, r) in action.responses {
            let mut spec = ResponseSpec::status(r.status);
            spec.media_type = r.media_type;
            spec.view = r.view;
            spec.multipart = r.multipart;
            for (name, template) in r.headers {
                spec = spec.header(name, template);
            }
            ab = ab.response(key, spec);
        }
        if let Some(ms) = action.timeout_ms {
            ab = ab.timeout(Duration::from_millis(ms));
        }
        if let Some(m) = action.multipart {
            ab = ab.multipart(m);
        }
        builder = builder.action(ab);
    }
    match builder.build() {
        Ok(resource) if issues.is_empty() => Ok(resource),
        Ok(_) => Err(issues),
        Err(e) => {
            issues.extend(e.issues);
            Err(issues)
        }
    }
}

fn build_media_type(doc: MediaTypeDoc) -> Result<MediaType, DefinitionError> {
    let mut builder = MediaType::builder(doc.identifier);
    if let Some(d) = doc.description {
        builder = builder.describe(d);
    }
    for a in doc.attributes {
        builder = builder.attribute(a.into_attribute());
    }
    for v in doc.views {
        builder = builder.view(v.name, v.fields);
    }
    builder.build()
}

fn parse_document(name: &str, text: &str) -> Result<Document, String> {
    if name.ends_with(".json") {
        serde_json::from_str(text).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str::<Option<Document>>(text)
            .map(Option::unwrap_or_default)
            .map_err(|e| e.to_string())
    }
}

/// Build an API definition from in-memory documents. `name` decides the
/// format (`.json` or YAML) and labels diagnostics.
pub fn load_documents(
    default_name: &str,
    documents: &[(String, String)],
) -> Result<ApiDefinition, DefinitionError> {
    let mut issues = Vec::new();
    let mut header: Option<ApiHeader> = None;
    let mut media_types = Vec::new();
    let mut resources = Vec::new();
    let mut failed_types = HashSet::new();

    for (name, text) in documents {
        let doc = match parse_document(name, text) {
            Ok(doc) => doc,
            Err(e) => {
                issues.push(DefinitionIssue::new(format!("file:{name}"), "parse_error", e));
                continue;
            }
        };
        debug!(
            file = %name,
            media_types = doc.media_types.len(),
            resources = doc.resources.len(),
            "Definition document parsed"
        );
        if let Some(h) = doc.api {
            if let Some(existing) = &header {
                issues.push(DefinitionIssue::new(
                    format!("file:{name}"),
                    "duplicate_api_header",
                    format!("api header already declared as `{}`", existing.name),
                ));
            } else {
                header = Some(h);
            }
        }
        for mt in doc.media_types {
            let id = mt.identifier.clone();
            match build_media_type(mt) {
                Ok(mt) => media_types.push(mt),
                Err(e) => {
                    failed_types.insert(id);
                    issues.extend(e.issues);
                }
            }
        }
        for r in doc.resources {
            match build_resource(r) {
                Ok(r) => resources.push(r),
                Err(mut e) => issues.append(&mut e),
            }
        }
    }

    let (name, version) = match header {
        Some(h) => (h.name, h.version),
        None => (default_name.to_string(), None),
    };
    let mut api = ApiDefinition::builder(name);
    if let Some(v) = version {
        api = api.version(v);
    }
    for mt in media_types {
        api = api.media_type(mt);
    }
    for r in resources {
        api = api.resource(r);
    }

    match api.build() {
        Ok(api) if issues.is_empty() => Ok(api),
        Ok(_) => Err(DefinitionError::new(issues)),
        Err(e) => {
            // references to media types that failed locally were already reported
            issues.extend(e.issues.into_iter().filter(|i| {
                !(i.kind == "unknown_media_type"
                    && failed_types
                        .iter()
                        .any(|id| i.message.contains(&format!("`{id}`"))))
            }));
            Err(DefinitionError::new(issues))
        }
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("reading definition directory {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if hidden {
            continue;
        }
        if path.is_dir() {
            collect_files(&path, out)?;
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml" | "json")
        ) {
            out.push(path);
        }
    }
    Ok(())
}

/// Load and check every definition document under `dir`, recursively, in
/// path order. Hidden files and directories are skipped.
///
/// I/O problems are returned as plain errors; definition problems as a
/// [`DefinitionError`] inside the `anyhow::Error`, listing every issue.
pub fn load_dir(dir: &Path) -> Result<ApiDefinition> {
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();

    let mut documents = Vec::with_capacity(files.len());
    for path in &files {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading definition file {}", path.display()))?;
        let name = path
            .strip_prefix(dir)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned();
        documents.push((name, text));
    }

    let default_name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "api".to_string());

    info!(
        source = %dir.display(),
        files = documents.len(),
        "Loading API definition"
    );

    Ok(load_documents(&default_name, &documents)?)
}
