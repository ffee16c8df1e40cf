use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::encoding::KvEncoding;
use super::reader::BoundedReader;
use crate::context::SourceContext;
use crate::error::{SourceError, SourceResult};
use crate::format::{FormatLibrary, TextLineFormat};
use crate::split::{SplitHandle, SplitPlanner};
use crate::types::{Overrides, RecordKind, TypeTag};

/// Immutable description of what to read: a resource in some format, optionally narrowed to
/// a single split.
///
/// Sources are never mutated. Fan-out ([`BoundedSource::split_into_bundles`]) clones the
/// source once per discovered split, each clone carrying its own handle.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundedSource {
    resource: Option<String>,
    format: Option<String>,
    key_type: Option<TypeTag>,
    value_type: Option<TypeTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    split: Option<SplitHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output_encoding: Option<KvEncoding>,
    #[serde(default, skip_serializing_if = "Overrides::is_empty")]
    overrides: Overrides,
}

impl BoundedSource {
    pub fn new(
        resource: impl Into<String>,
        format: impl Into<String>,
        key_type: TypeTag,
        value_type: TypeTag,
    ) -> Self {
        Self {
            resource: Some(resource.into()),
            format: Some(format.into()),
            key_type: Some(key_type),
            value_type: Some(value_type),
            ..Self::default()
        }
    }

    /// `(offset, line)` source over `resource` using the built-in text format.
    pub fn text(resource: impl Into<String>) -> Self {
        Self::new(
            resource,
            TextLineFormat::NAME,
            TypeTag::Record(RecordKind::Long),
            TypeTag::Record(RecordKind::Text),
        )
    }

    pub fn builder() -> BoundedSourceBuilder {
        BoundedSourceBuilder::default()
    }

    /// Copy of this source restricted to one split.
    pub fn with_split(&self, split: SplitHandle) -> Self {
        Self {
            split: Some(split),
            ..self.clone()
        }
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    pub fn key_type(&self) -> Option<&TypeTag> {
        self.key_type.as_ref()
    }

    pub fn value_type(&self) -> Option<&TypeTag> {
        self.value_type.as_ref()
    }

    pub fn split(&self) -> Option<&SplitHandle> {
        self.split.as_ref()
    }

    pub fn output_encoding(&self) -> Option<&KvEncoding> {
        self.output_encoding.as_ref()
    }

    pub fn overrides(&self) -> &Overrides {
        &self.overrides
    }

    /// Fails on the first unset required field, in declaration order.
    pub fn validate(&self) -> SourceResult<()> {
        if self.resource.as_deref().is_none_or(str::is_empty) {
            return Err(SourceError::Configuration { field: "resource" });
        }
        if self.format.as_deref().is_none_or(str::is_empty) {
            return Err(SourceError::Configuration { field: "format" });
        }
        if self.key_type.is_none() {
            return Err(SourceError::Configuration { field: "key type" });
        }
        if self.value_type.is_none() {
            return Err(SourceError::Configuration { field: "value type" });
        }
        Ok(())
    }

    /// Resource after validation. Only call once `validate` passed.
    fn resource_str(&self) -> &str {
        self.resource.as_deref().unwrap_or_default()
    }

    pub(crate) fn library(&self, ctx: &SourceContext) -> SourceResult<Arc<dyn FormatLibrary>> {
        let name = self.format.as_deref().unwrap_or_default();
        ctx.formats().get(name).ok_or_else(|| {
            SourceError::planning(
                format!(
                    "format {name} is not registered (known: {})",
                    ctx.formats().names().join(", ")
                ),
                None,
            )
        })
    }

    /// One source per discovered split, each at least the context's minimum bundle size.
    /// A source already holding a split comes back unchanged, as its only bundle.
    pub fn split_into_bundles(
        &self,
        desired_bundle_size_bytes: u64,
        ctx: &SourceContext,
    ) -> SourceResult<Vec<BoundedSource>> {
        if self.split.is_some() {
            debug!("Source already holds a split, not splitting further");
            return Ok(vec![self.clone()]);
        }
        self.validate()?;
        let library = self.library(ctx)?;
        let handles = SplitPlanner::new(ctx).plan(
            library.as_ref(),
            self.resource_str(),
            &self.overrides,
            desired_bundle_size_bytes,
        )?;
        Ok(handles
            .into_iter()
            .map(|handle| self.with_split(handle))
            .collect())
    }

    /// Total bytes the resource lists as, or 0 when that cannot be determined.
    ///
    /// Never fails: listing errors are logged and reported as 0. With remote listing
    /// suppressed in `ctx`, returns 0 without touching the resource.
    pub fn estimated_size_bytes(&self, ctx: &SourceContext) -> u64 {
        if ctx.suppress_remote_listing() {
            debug!("Remote listing suppressed, estimating 0 bytes");
            return 0;
        }
        match self.try_estimate(ctx) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("{e}");
                0
            }
        }
    }

    fn try_estimate(&self, ctx: &SourceContext) -> SourceResult<u64> {
        let resource = self.resource.clone().unwrap_or_default();
        let estimation = |source: std::io::Error| SourceError::Estimation {
            resource: resource.clone(),
            source,
        };
        let library = self.library(ctx).map_err(|e| {
            estimation(std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()))
        })?;
        let files = library
            .listing(&resource, &self.overrides)
            .map_err(estimation)?;
        Ok(files.iter().map(|file| file.len).sum())
    }

    /// The explicit output encoding, else one derived from the key and value types.
    pub fn default_output_encoding(&self) -> SourceResult<KvEncoding> {
        if let Some(encoding) = self.output_encoding {
            return Ok(encoding);
        }
        let key = self
            .key_type
            .as_ref()
            .ok_or(SourceError::Configuration { field: "key type" })?;
        let value = self
            .value_type
            .as_ref()
            .ok_or(SourceError::Configuration { field: "value type" })?;
        KvEncoding::for_types(key, value)
    }

    pub fn produces_sorted_output(&self) -> bool {
        false
    }

    pub fn create_reader<'a>(&'a self, ctx: &'a SourceContext) -> SourceResult<BoundedReader<'a>> {
        self.validate()?;
        let library = self.library(ctx)?;
        Ok(BoundedReader::new(self, ctx, library))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Builds a [`BoundedSource`]. Nothing is checked until `validate()` or a read operation.
#[derive(Clone, Debug, Default)]
pub struct BoundedSourceBuilder {
    source: BoundedSource,
}

impl BoundedSourceBuilder {
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.source.resource = Some(resource.into());
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.source.format = Some(format.into());
        self
    }

    pub fn key_type(mut self, tag: TypeTag) -> Self {
        self.source.key_type = Some(tag);
        self
    }

    pub fn value_type(mut self, tag: TypeTag) -> Self {
        self.source.value_type = Some(tag);
        self
    }

    pub fn output_encoding(mut self, encoding: KvEncoding) -> Self {
        self.source.output_encoding = Some(encoding);
        self
    }

    pub fn override_conf(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.source.overrides.insert(key.into(), value.into());
        self
    }

    pub fn overrides(mut self, overrides: Overrides) -> Self {
        self.source.overrides.extend(overrides);
        self
    }

    pub fn build(self) -> BoundedSource {
        self.source
    }
}
