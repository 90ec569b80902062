// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Request metadata types

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Opaque id of an in-flight request, unique within a registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Create a request id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// How the requested resource will be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    MainFrame,
    SubFrame,
    Stylesheet,
    Script,
    Image,
    Object,
    ObjectSubrequest,
    #[serde(rename = "xmlhttprequest")]
    XmlHttpRequest,
    Xbl,
    Xslt,
    Ping,
    Beacon,
    XmlDtd,
    Font,
    Media,
    Websocket,
    CspReport,
    Imageset,
    WebManifest,
    Other,
}

impl ResourceType {
    /// All resource types
    pub const ALL: [ResourceType; 20] = [
        ResourceType::MainFrame,
        ResourceType::SubFrame,
        ResourceType::Stylesheet,
        ResourceType::Script,
        ResourceType::Image,
        ResourceType::Object,
        ResourceType::ObjectSubrequest,
        ResourceType::XmlHttpRequest,
        ResourceType::Xbl,
        ResourceType::Xslt,
        ResourceType::Ping,
        ResourceType::Beacon,
        ResourceType::XmlDtd,
        ResourceType::Font,
        ResourceType::Media,
        ResourceType::Websocket,
        ResourceType::CspReport,
        ResourceType::Imageset,
        ResourceType::WebManifest,
        ResourceType::Other,
    ];

    /// Wire name of the type
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::MainFrame => "main_frame",
            ResourceType::SubFrame => "sub_frame",
            ResourceType::Stylesheet => "stylesheet",
            ResourceType::Script => "script",
            ResourceType::Image => "image",
            ResourceType::Object => "object",
            ResourceType::ObjectSubrequest => "object_subrequest",
            ResourceType::XmlHttpRequest => "xmlhttprequest",
            ResourceType::Xbl => "xbl",
            ResourceType::Xslt => "xslt",
            ResourceType::Ping => "ping",
            ResourceType::Beacon => "beacon",
            ResourceType::XmlDtd => "xml_dtd",
            ResourceType::Font => "font",
            ResourceType::Media => "media",
            ResourceType::Websocket => "websocket",
            ResourceType::CspReport => "csp_report",
            ResourceType::Imageset => "imageset",
            ResourceType::WebManifest => "web_manifest",
            ResourceType::Other => "other",
        }
    }

    /// Check if this loads a document into a frame
    pub fn is_document(self) -> bool {
        matches!(self, ResourceType::MainFrame | ResourceType::SubFrame)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::other(format!("Unknown resource type: {}", s)))
    }
}

/// Point in the request lifecycle where observers are notified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestStage {
    BeforeRequest,
    BeforeSendHeaders,
    SendHeaders,
    HeadersReceived,
    AuthRequired,
    ResponseStarted,
    BeforeRedirect,
    Completed,
    ErrorOccurred,
}

impl RequestStage {
    /// Options an observer of this stage may ask for
    pub fn supported_options(self) -> &'static [ExtraInfoSpec] {
        use ExtraInfoSpec::*;
        match self {
            RequestStage::BeforeRequest => &[Blocking, RequestBody],
            RequestStage::BeforeSendHeaders => &[RequestHeaders, Blocking],
            RequestStage::SendHeaders => &[RequestHeaders],
            RequestStage::HeadersReceived => &[Blocking, ResponseHeaders],
            RequestStage::AuthRequired => &[ResponseHeaders, Blocking, AsyncBlocking],
            RequestStage::ResponseStarted
            | RequestStage::BeforeRedirect
            | RequestStage::Completed => &[ResponseHeaders],
            RequestStage::ErrorOccurred => &[],
        }
    }

    /// Check every requested option against the stage
    pub fn validate_options(self, options: &[ExtraInfoSpec]) -> crate::error::Result<()> {
        let supported = self.supported_options();
        match options.iter().find(|o| !supported.contains(o)) {
            Some(option) => Err(Error::config(format!(
                "Option {:?} is not supported for {:?}",
                option, self
            ))),
            None => Ok(()),
        }
    }

    /// Check if an observer can alter the request at this stage
    pub fn can_block(self) -> bool {
        self.supported_options().contains(&ExtraInfoSpec::Blocking)
    }
}

/// Extra information an observer asks for at subscription time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExtraInfoSpec {
    Blocking,
    AsyncBlocking,
    RequestBody,
    RequestHeaders,
    ResponseHeaders,
}

/// One HTTP header, value given as UTF-8 or raw bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpHeader {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_value: Option<Vec<u8>>,
}

impl HttpHeader {
    /// Header with a UTF-8 value
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            binary_value: None,
        }
    }

    /// Header with a raw byte value
    pub fn binary(name: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            value: None,
            binary_value: Some(value),
        }
    }

    /// Case-insensitive name comparison
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// One element of an unparsed request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadData {
    /// Copy of the data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<Vec<u8>>,
    /// Path of an uploaded file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl UploadData {
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: Some(data.into()),
            file: None,
        }
    }

    pub fn file(path: impl Into<String>) -> Self {
        Self {
            bytes: None,
            file: Some(path.into()),
        }
    }
}

/// Request body data, only reported with [`ExtraInfoSpec::RequestBody`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    /// Why the body could not be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Parsed form fields, every value per key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_data: Option<HashMap<String, Vec<String>>>,
    /// Body elements not parsed as form data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Vec<UploadData>>,
}

impl RequestBody {
    /// Body of a url-encoded or multipart form
    pub fn form(fields: HashMap<String, Vec<String>>) -> Self {
        Self {
            form_data: Some(fields),
            ..Default::default()
        }
    }

    /// Unparsed body elements
    pub fn raw(elements: Vec<UploadData>) -> Self {
        Self {
            raw: Some(elements),
            ..Default::default()
        }
    }

    /// Body that could not be read
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Details of an in-flight request, as seen by observers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetails {
    /// Request id
    pub request_id: RequestId,
    /// Request URL
    pub url: String,
    /// HTTP method
    pub method: String,
    /// 0 for the main frame, positive for subframes
    pub frame_id: i64,
    /// -1 if no parent frame exists
    pub parent_frame_id: i64,
    /// URL of the resource that triggered the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_url: Option<String>,
    /// URL of the document the resource loads into
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_url: Option<String>,
    /// -1 if the request isn't related to a tab
    pub tab_id: i64,
    /// Window of the tab, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_id: Option<i64>,
    /// How the resource will be used
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    /// Milliseconds since the epoch
    pub time_stamp: i64,
    /// Body of a POST or PUT request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
}

impl RequestDetails {
    /// Create details for a top-level request not tied to a tab
    pub fn new(
        request_id: impl Into<RequestId>,
        url: impl Into<String>,
        method: impl Into<String>,
        resource_type: ResourceType,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            url: url.into(),
            method: method.into(),
            frame_id: 0,
            parent_frame_id: -1,
            origin_url: None,
            document_url: None,
            tab_id: -1,
            window_id: None,
            resource_type,
            time_stamp: chrono::Utc::now().timestamp_millis(),
            request_body: None,
        }
    }

    /// Set tab and window
    pub fn with_tab(mut self, tab_id: i64, window_id: Option<i64>) -> Self {
        self.tab_id = tab_id;
        self.window_id = window_id;
        self
    }

    /// Set frame ids
    pub fn with_frame(mut self, frame_id: i64, parent_frame_id: i64) -> Self {
        self.frame_id = frame_id;
        self.parent_frame_id = parent_frame_id;
        self
    }

    /// Set origin URL
    pub fn with_origin_url(mut self, url: impl Into<String>) -> Self {
        self.origin_url = Some(url.into());
        self
    }

    /// Set document URL
    pub fn with_document_url(mut self, url: impl Into<String>) -> Self {
        self.document_url = Some(url.into());
        self
    }

    /// Set request body data
    pub fn with_request_body(mut self, body: RequestBody) -> Self {
        self.request_body = Some(body);
        self
    }

    /// Check if the request belongs to a tab
    pub fn in_tab(&self) -> bool {
        self.tab_id >= 0
    }

    /// Host of the request URL
    pub fn host(&self) -> Option<String> {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(String::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_names() {
        for t in ResourceType::ALL {
            assert_eq!(t.as_str().parse::<ResourceType>().unwrap(), t);
            assert_eq!(serde_json::to_string(&t).unwrap(), format!("\"{}\"", t.as_str()));
        }
        assert!(ResourceType::SubFrame.is_document());
        assert!(!ResourceType::Script.is_document());
    }

    #[test]
    fn test_stage_options() {
        assert!(RequestStage::BeforeRequest.can_block());
        assert!(!RequestStage::SendHeaders.can_block());
        assert!(RequestStage::HeadersReceived
            .validate_options(&[ExtraInfoSpec::Blocking, ExtraInfoSpec::ResponseHeaders])
            .is_ok());
        assert!(RequestStage::Completed
            .validate_options(&[ExtraInfoSpec::Blocking])
            .is_err());
        assert!(RequestStage::ErrorOccurred.supported_options().is_empty());
    }

    #[test]
    fn test_request_details_json() {
        let details = RequestDetails::new("42", "https://example.com/app.js", "GET", ResourceType::Script)
            .with_tab(3, Some(1));

        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["requestId"], "42");
        assert_eq!(json["type"], "script");
        assert_eq!(json["tabId"], 3);
        assert_eq!(json["parentFrameId"], -1);
        assert!(json.get("originUrl").is_none());
        assert_eq!(details.host().as_deref(), Some("example.com"));
    }

    #[test]
    fn test_request_body_json() {
        let mut fields = HashMap::new();
        fields.insert("tag".to_string(), vec!["a".to_string(), "b".to_string()]);
        let form = RequestDetails::new("7", "https://example.com/submit", "POST", ResourceType::MainFrame)
            .with_request_body(RequestBody::form(fields));

        let json = serde_json::to_value(&form).unwrap();
        assert_eq!(json["requestBody"]["formData"]["tag"][1], "b");
        assert!(json["requestBody"].get("raw").is_none());

        let upload = RequestBody::raw(vec![UploadData::bytes(&b"{}"[..]), UploadData::file("/tmp/a.png")]);
        let json = serde_json::to_value(&upload).unwrap();
        assert_eq!(json["raw"][0]["bytes"][0], 123);
        assert_eq!(json["raw"][1]["file"], "/tmp/a.png");

        let parsed: RequestDetails = serde_json::from_str(
            r#"{"requestId":"8","url":"https://example.com/","method":"PUT","frameId":0,"parentFrameId":-1,
                "tabId":-1,"type":"xmlhttprequest","timeStamp":0,"requestBody":{"error":"too large"}}"#,
        )
        .unwrap();
        assert_eq!(parsed.request_body, Some(RequestBody::failed("too large")));
        assert!(RequestDetails::new("9", "https://example.com/", "GET", ResourceType::Other)
            .request_body
            .is_none());
    }

    #[test]
    fn test_http_header() {
        let header = HttpHeader::new("Content-Type", "text/html");
        assert!(header.is("content-type"));

        let raw = HttpHeader::binary("x-raw", vec![0xff, 0x00]);
        let json = serde_json::to_value(&raw).unwrap();
        assert_eq!(json["binaryValue"][0], 255);
        assert!(json.get("value").is_none());
    }
}
