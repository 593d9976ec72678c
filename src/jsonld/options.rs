//! Serializer-wide configuration knobs.

/// Caps on the streaming serializer: an optional record
/// count and an optional per-record serialized-byte limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamLimits {
    pub max_records: Option<usize>,
    pub max_record_size: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    Rfc3339,
}

impl Default for DateFormat {
    fn default() -> Self {
        DateFormat::Rfc3339
    }
}

/// Recognized options for [`crate::jsonld::serializer::Serializer`].
#[derive(Debug, Clone)]
pub struct SerializerOptions {
    pub omit_empty_fields: bool,
    pub use_iri_enums: bool,
    pub include_deprecated: bool,
    pub pretty_print: bool,
    pub date_format: DateFormat,
    pub user_id_field: Option<String>,
    pub id_prefix: String,
    pub stream_limits: StreamLimits,
}

impl Default for SerializerOptions {
    fn default() -> Self {
        Self {
            omit_empty_fields: true,
            use_iri_enums: false,
            include_deprecated: true,
            pretty_print: false,
            date_format: DateFormat::default(),
            user_id_field: None,
            id_prefix: "urn:focus:cost:".to_string(),
            stream_limits: StreamLimits::default(),
        }
    }
}

impl SerializerOptions {
    pub fn builder() -> SerializerOptionsBuilder {
        SerializerOptionsBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct SerializerOptionsBuilder {
    opts: OptionsOverride,
}

#[derive(Debug, Default)]
struct OptionsOverride {
    omit_empty_fields: Option<bool>,
    use_iri_enums: Option<bool>,
    include_deprecated: Option<bool>,
    pretty_print: Option<bool>,
    user_id_field: Option<String>,
    id_prefix: Option<String>,
    stream_limits: Option<StreamLimits>,
}

impl SerializerOptionsBuilder {
    pub fn omit_empty_fields(mut self, v: bool) -> Self {
        self.opts.omit_empty_fields = Some(v);
        self
    }

    pub fn use_iri_enums(mut self, v: bool) -> Self {
        self.opts.use_iri_enums = Some(v);
        self
    }

    pub fn include_deprecated(mut self, v: bool) -> Self {
        self.opts.include_deprecated = Some(v);
        self
    }

    pub fn pretty_print(mut self, v: bool) -> Self {
        self.opts.pretty_print = Some(v);
        self
    }

    pub fn user_id_field(mut self, field: impl Into<String>) -> Self {
        self.opts.user_id_field = Some(field.into());
        self
    }

    pub fn id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.opts.id_prefix = Some(prefix.into());
        self
    }

    pub fn max_records(mut self, limit: usize) -> Self {
        let mut limits = self.opts.stream_limits.unwrap_or_default();
        limits.max_records = Some(limit);
        self.opts.stream_limits = Some(limits);
        self
    }

    pub fn max_record_size(mut self, bytes: usize) -> Self {
        let mut limits = self.opts.stream_limits.unwrap_or_default();
        limits.max_record_size = Some(bytes);
        self.opts.stream_limits = Some(limits);
        self
    }

    pub fn build(self) -> SerializerOptions {
        let defaults = SerializerOptions::default();
        SerializerOptions {
            omit_empty_fields: self.opts.omit_empty_fields.unwrap_or(defaults.omit_empty_fields),
            use_iri_enums: self.opts.use_iri_enums.unwrap_or(defaults.use_iri_enums),
            include_deprecated: self.opts.include_deprecated.unwrap_or(defaults.include_deprecated),
            pretty_print: self.opts.pretty_print.unwrap_or(defaults.pretty_print),
            date_format: defaults.date_format,
            user_id_field: self.opts.user_id_field.or(defaults.user_id_field),
            id_prefix: self.opts.id_prefix.unwrap_or(defaults.id_prefix),
            stream_limits: self.opts.stream_limits.unwrap_or(defaults.stream_limits),
        }
    }
}
