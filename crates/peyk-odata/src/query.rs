//! Query descriptors and request-target building.
//!
//! A [`Query`] either describes a fresh request (`$select`, `$filter`,
//! `$orderby`, `$top`, `$skip`, `$expand` plus per-call headers) or
//! carries an opaque continuation cursor. A cursor fully determines the
//! next request: when `next_link` is set, every other field is ignored.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Formatted-display annotation requested via `Prefer`.
pub const FORMATTED_VALUE_ANNOTATION: &str = "OData.Community.Display.V1.FormattedValue";

/// Characters escaped in free-text filter literals.
///
/// Mirrors `encodeURIComponent`: alphanumerics and `- _ . ! ~ * ' ( )`
/// pass through, everything else is percent-encoded.
const LITERAL_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Escapes a free-text literal for embedding in a `$filter` expression.
///
/// Percent-encodes the text and doubles embedded single quotes.
#[must_use]
pub fn escape_literal(text: &str) -> String {
    utf8_percent_encode(text, LITERAL_ESCAPE)
        .to_string()
        .replace('\'', "''")
}

/// Abstract query descriptor for one OData request.
#[derive(Debug, Clone, Default)]
pub struct Query {
    select: Vec<String>,
    filter: Option<String>,
    order_by: Option<String>,
    top: Option<u32>,
    skip: Option<u32>,
    expand: Option<String>,
    prefer: Vec<String>,
    headers: Vec<(String, String)>,
    next_link: Option<String>,
}

impl Query {
    /// Starts a fresh query descriptor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an opaque continuation cursor from a previous response.
    ///
    /// All other descriptor fields are ignored when a cursor is set.
    #[must_use]
    pub fn from_cursor(next_link: impl Into<String>) -> Self {
        Self {
            next_link: Some(next_link.into()),
            ..Self::default()
        }
    }

    /// Adds `$select` columns.
    #[must_use]
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Sets the `$filter` expression. Empty filters are dropped.
    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        let filter = filter.into();
        self.filter = (!filter.is_empty()).then_some(filter);
        self
    }

    /// Sets the `$orderby` expression.
    #[must_use]
    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    /// Sets `$top`.
    #[must_use]
    pub fn top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }

    /// Sets `$skip`.
    #[must_use]
    pub fn skip(mut self, skip: u32) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Sets the `$expand` expression.
    #[must_use]
    pub fn expand(mut self, expand: impl Into<String>) -> Self {
        self.expand = Some(expand.into());
        self
    }

    /// Attaches an opaque per-call header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Requests server-driven paging with the given page size.
    #[must_use]
    pub fn prefer_max_page_size(mut self, page_size: u32) -> Self {
        self.prefer.push(format!("odata.maxpagesize={page_size}"));
        self
    }

    /// Requests formatted-display annotations on lookup columns.
    #[must_use]
    pub fn prefer_formatted_values(mut self) -> Self {
        self.prefer.push(format!(
            "odata.include-annotations=\"{FORMATTED_VALUE_ANNOTATION}\""
        ));
        self
    }

    /// Requests every annotation the server can emit.
    #[must_use]
    pub fn prefer_all_annotations(mut self) -> Self {
        self.prefer
            .push("odata.include-annotations=\"*\"".to_string());
        self
    }

    /// Continuation cursor, if this descriptor carries one.
    #[must_use]
    pub fn cursor(&self) -> Option<&str> {
        self.next_link.as_deref()
    }

    /// Builds the request target URL.
    ///
    /// A cursor wins unconditionally: the remote already encoded the
    /// whole query into it and re-appending options is undefined.
    #[must_use]
    pub fn target(&self, base_url: &str, entity: &str) -> String {
        if let Some(next_link) = &self.next_link {
            return next_link.clone();
        }

        let mut params = Vec::new();
        if !self.select.is_empty() {
            params.push(format!("$select={}", self.select.join(",")));
        }
        if let Some(filter) = &self.filter {
            params.push(format!("$filter={filter}"));
        }
        if let Some(order_by) = &self.order_by {
            params.push(format!("$orderby={order_by}"));
        }
        if let Some(top) = self.top {
            params.push(format!("$top={top}"));
        }
        if let Some(skip) = self.skip {
            params.push(format!("$skip={skip}"));
        }
        if let Some(expand) = &self.expand {
            params.push(format!("$expand={expand}"));
        }

        let mut url = format!("{}/{entity}", base_url.trim_end_matches('/'));
        if !params.is_empty() {
            url.push('?');
            url.push_str(&params.join("&"));
        }
        url
    }

    /// Per-call headers, with `Prefer` hints folded into one header.
    #[must_use]
    pub fn request_headers(&self) -> Vec<(String, String)> {
        let mut headers = self.headers.clone();
        if !self.prefer.is_empty() {
            headers.push(("Prefer".to_string(), self.prefer.join(",")));
        }
        headers
    }
}
