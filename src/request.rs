//! Request and response adapter
//!
//! Hosts hand blocks a [`Request`] built from their own request object and turn
//! the returned [`Response`] back into theirs. Headers live in a CGI-style
//! `meta` map (`HTTP_ACCEPT`, `CONTENT_TYPE`, ...) and [`HeaderView`] exposes
//! them under their HTTP names.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Cursor};
use std::ops::{Deref, DerefMut};

/// Meta keys that carry a header without the `HTTP_` prefix
pub const UNPREFIXED_HEADERS: [&str; 2] = ["CONTENT_TYPE", "CONTENT_LENGTH"];

/// Meta key holding the request path
pub const PATH_INFO: &str = "PATH_INFO";

const FORM_METHODS: [&str; 3] = ["POST", "PUT", "PATCH"];

/// Request errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Expected one value for {key}, found {count}")]
    MultipleValues { key: String, count: usize },

    #[error("Not a form request: {0}")]
    NotAForm(String),
}

/// Header name to meta key: `Content-Type` -> `CONTENT_TYPE`, `Accept` -> `HTTP_ACCEPT`
pub fn meta_name(header: &str) -> String {
    let name = header.to_uppercase().replace('-', "_");
    if UNPREFIXED_HEADERS.contains(&name.as_str()) {
        name
    } else {
        format!("HTTP_{}", name)
    }
}

/// Meta key to header name, title-cased
pub fn header_name(meta_key: &str) -> String {
    let bare = meta_key.strip_prefix("HTTP_").unwrap_or(meta_key);
    let mut out = String::with_capacity(bare.len());
    let mut word_start = true;
    for c in bare.chars() {
        let c = if c == '_' { '-' } else { c };
        if c.is_alphabetic() {
            if word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            word_start = false;
        } else {
            out.push(c);
            word_start = true;
        }
    }
    out
}

fn is_header_key(meta_key: &str) -> bool {
    UNPREFIXED_HEADERS.contains(&meta_key) || meta_key.starts_with("HTTP_")
}

/// HTTP-header view of a meta map
///
/// Works over a shared or a mutable borrow; the mutating methods need the
/// latter.
#[derive(Debug)]
pub struct HeaderView<M> {
    meta: M,
}

impl<M> HeaderView<M>
where
    M: Deref<Target = BTreeMap<String, String>>,
{
    pub fn new(meta: M) -> Self {
        Self { meta }
    }

    /// Header value, by case-insensitive name
    pub fn get(&self, header: &str) -> Option<&str> {
        self.meta.get(&meta_name(header)).map(String::as_str)
    }

    pub fn contains(&self, header: &str) -> bool {
        self.meta.contains_key(&meta_name(header))
    }

    /// Header names present in the meta map; other meta keys are skipped
    pub fn names(&self) -> impl Iterator<Item = String> + '_ {
        self.meta
            .keys()
            .filter(|key| is_header_key(key))
            .map(|key| header_name(key))
    }

    pub fn len(&self) -> usize {
        self.meta.keys().filter(|key| is_header_key(key)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<M> HeaderView<M>
where
    M: DerefMut<Target = BTreeMap<String, String>>,
{
    pub fn insert(&mut self, header: &str, value: impl Into<String>) -> Option<String> {
        self.meta.insert(meta_name(header), value.into())
    }

    pub fn remove(&mut self, header: &str) -> Result<String, RequestError> {
        self.meta
            .remove(&meta_name(header))
            .ok_or_else(|| RequestError::KeyNotFound(header.to_string()))
    }
}

/// Ordered mapping from keys to one or more values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiDict<V> {
    items: Vec<(String, V)>,
}

impl<V> Default for MultiDict<V> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<V> MultiDict<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten per-key value lists, keeping key order then value order
    pub fn from_lists<I, K, L>(lists: I) -> Self
    where
        I: IntoIterator<Item = (K, L)>,
        K: Into<String>,
        L: IntoIterator<Item = V>,
    {
        let mut dict = Self::new();
        for (key, values) in lists {
            let key = key.into();
            for value in values {
                dict.items.push((key.clone(), value));
            }
        }
        dict
    }

    pub fn add(&mut self, key: impl Into<String>, value: V) {
        self.items.push((key.into(), value));
    }

    /// Last value stored under `key`
    pub fn get(&self, key: &str) -> Option<&V> {
        self.items
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn get_all(&self, key: &str) -> Vec<&V> {
        self.items
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v)
            .collect()
    }

    /// The single value under `key`
    pub fn get_one(&self, key: &str) -> Result<&V, RequestError> {
        match self.get_all(key).as_slice() {
            [] => Err(RequestError::KeyNotFound(key.to_string())),
            [value] => Ok(*value),
            values => Err(RequestError::MultipleValues {
                key: key.to_string(),
                count: values.len(),
            }),
        }
    }

    /// Distinct keys, in first-seen order
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for (key, _) in &self.items {
            if !keys.contains(&key.as_str()) {
                keys.push(key);
            }
        }
        keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of stored values, duplicates included
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn map_values<W>(&self, wrap: impl Fn(&V) -> W) -> MultiDict<W> {
        MultiDict {
            items: self.items.iter().map(|(k, v)| (k.clone(), wrap(v))).collect(),
        }
    }

    fn extend(&mut self, other: MultiDict<V>) {
        self.items.extend(other.items);
    }
}

/// An uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Name of the form input the file was uploaded through
    pub name: String,
    /// Name of the file on the client
    pub filename: String,
    pub content_type: Option<String>,
    pub content: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            filename: filename.into(),
            content_type: None,
            content,
        }
    }

    pub fn reader(&self) -> impl io::Read + '_ {
        Cursor::new(self.content.as_slice())
    }
}

/// One value of a form submission
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Text(String),
    File(UploadedFile),
}

impl FormValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FormValue::Text(text) => Some(text),
            FormValue::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&UploadedFile> {
        match self {
            FormValue::File(file) => Some(file),
            FormValue::Text(_) => None,
        }
    }
}

/// Form parameters of a request
#[derive(Debug, Clone, PartialEq)]
pub enum PostParams {
    /// The method does not carry a form; holds the reason
    NotAForm(&'static str),
    Form(MultiDict<FormValue>),
}

impl PostParams {
    pub fn is_form(&self) -> bool {
        matches!(self, PostParams::Form(_))
    }

    /// The form values, or an error for non-form requests
    pub fn into_form(self) -> Result<MultiDict<FormValue>, RequestError> {
        match self {
            PostParams::Form(form) => Ok(form),
            PostParams::NotAForm(reason) => Err(RequestError::NotAForm(reason.to_string())),
        }
    }
}

/// A host request, as seen by block handlers
#[derive(Debug, Clone, Default)]
pub struct Request {
    method: String,
    path_info: String,
    meta: BTreeMap<String, String>,
    query: MultiDict<String>,
    form: MultiDict<String>,
    files: MultiDict<UploadedFile>,
    body: Vec<u8>,
}

impl Request {
    pub fn new(method: impl Into<String>, path_info: impl Into<String>) -> Self {
        Self {
            method: method.into().to_uppercase(),
            path_info: path_info.into(),
            ..Self::default()
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn with_header(mut self, header: &str, value: impl Into<String>) -> Self {
        self.headers_mut().insert(header, value);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.add(key, value.into());
        self
    }

    pub fn with_form(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.add(key, value.into());
        self
    }

    pub fn with_file(mut self, file: UploadedFile) -> Self {
        self.files.add(file.name.clone(), file);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path_info(&self) -> &str {
        &self.path_info
    }

    pub fn meta(&self) -> &BTreeMap<String, String> {
        &self.meta
    }

    pub fn headers(&self) -> HeaderView<&BTreeMap<String, String>> {
        HeaderView::new(&self.meta)
    }

    pub fn headers_mut(&mut self) -> HeaderView<&mut BTreeMap<String, String>> {
        HeaderView::new(&mut self.meta)
    }

    /// Query string parameters
    pub fn get_params(&self) -> &MultiDict<String> {
        &self.query
    }

    /// Form fields followed by uploaded files
    ///
    /// Only POST, PUT and PATCH carry a form.
    pub fn post_params(&self) -> PostParams {
        if !FORM_METHODS.contains(&self.method.as_str()) {
            return PostParams::NotAForm("Not a form request");
        }
        let mut params = self.form.map_values(|v| FormValue::Text(v.clone()));
        params.extend(self.files.map_values(|f| FormValue::File(f.clone())));
        PostParams::Form(params)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body as a reader
    pub fn body_file(&self) -> impl io::Read + '_ {
        Cursor::new(self.body.as_slice())
    }

    /// The body parsed as JSON
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// CGI-style environment: the meta map plus `PATH_INFO`
    pub fn environ(&self) -> BTreeMap<String, String> {
        let mut environ = self.meta.clone();
        environ.insert(PATH_INFO.to_string(), self.path_info.clone());
        environ
    }
}

/// A handler's answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub content_type: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8".to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self {
            content_type: "text/plain; charset=utf-8".to_string(),
            body: body.into().into_bytes(),
            ..Self::default()
        }
    }

    pub fn json(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(Self {
            content_type: "application/json".to_string(),
            body: serde_json::to_vec(value)?,
            ..Self::default()
        })
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Header list for the host response
    ///
    /// Starts with `Content-Type`; each header then replaces any earlier one
    /// with the same case-insensitive name, keeping its position.
    pub fn host_headers(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> =
            vec![("Content-Type".to_string(), self.content_type.clone())];
        for (name, value) in &self.headers {
            match out.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
                Some(slot) => slot.1 = value.clone(),
                None => out.push((name.clone(), value.clone())),
            }
        }
        out
    }
}
