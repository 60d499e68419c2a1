//! 中间件配置：构建器式的 [`RdfHandlerConfig`] 与可反序列化的 [`RdfHandlerSettings`]。

use std::{borrow::Cow, fmt, sync::Arc};

use async_trait::async_trait;
use http::{HeaderMap, Method, Uri, request::Parts};
use serde::Deserialize;
use thiserror::Error;

use crate::{
    codec::{CodecDirectory, CodecMap},
    error::{CodecError, codes},
    media_type::MediaType,
    model::{DatasetFactory, GraphFactory},
    negotiation::OverridePolicy,
};

/// 中间件的自描述信息，供日志与宿主诊断使用。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MiddlewareDescriptor {
    name: Cow<'static, str>,
    category: Cow<'static, str>,
    summary: Cow<'static, str>,
}

impl MiddlewareDescriptor {
    /// 构造新的描述对象。
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        category: impl Into<Cow<'static, str>>,
        summary: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            summary: summary.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }
}

/// 计算基准 IRI 所需的请求元信息。
///
/// 请求体之外的部分在安装时复制一份，读取能力可能在处理器返回后才被驱动。
#[derive(Clone, Debug)]
pub struct RequestMeta {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

impl RequestMeta {
    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
        }
    }

    /// 还原请求的绝对 URL，去掉查询串。
    ///
    /// 主机取自 `Host` 头，缺失时退回 URI 自带的 authority；协议缺省为 `http`。两者都缺失时返回 `None`。
    pub fn absolute_url(&self) -> Option<String> {
        let host = self
            .headers
            .get(http::header::HOST)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .or_else(|| self.uri.authority().map(|authority| authority.as_str()))?;
        let scheme = self.uri.scheme_str().unwrap_or("http");
        Some(format!("{scheme}://{host}{}", self.uri.path()))
    }
}

/// 自定义基准 IRI 计算。
///
/// 返回 `Ok(None)` 表示不使用基准 IRI；返回 `Err` 会作为读取流的第一个故障交付。
#[async_trait]
pub trait BaseIriResolver: Send + Sync + 'static {
    async fn resolve(&self, request: &RequestMeta) -> Result<Option<String>, CodecError>;
}

struct FnResolver<F>(F);

#[async_trait]
impl<F> BaseIriResolver for FnResolver<F>
where
    F: Fn(&RequestMeta) -> Option<String> + Send + Sync + 'static,
{
    async fn resolve(&self, request: &RequestMeta) -> Result<Option<String>, CodecError> {
        Ok((self.0)(request))
    }
}

/// 基准 IRI 策略。
#[derive(Clone, Default)]
pub enum BaseIriPolicy {
    /// 不传递基准 IRI。
    #[default]
    None,
    /// 使用请求的绝对 URL（不含查询串）。
    FromRequest,
    /// 交给自定义解析器计算，可以是异步的。
    Custom(Arc<dyn BaseIriResolver>),
}

impl BaseIriPolicy {
    pub fn custom(resolver: impl BaseIriResolver) -> Self {
        Self::Custom(Arc::new(resolver))
    }

    /// 以同步闭包定制。
    pub fn from_fn<F>(resolve: F) -> Self
    where
        F: Fn(&RequestMeta) -> Option<String> + Send + Sync + 'static,
    {
        Self::custom(FnResolver(resolve))
    }

    /// 依据策略计算基准 IRI。
    pub async fn resolve(&self, request: &RequestMeta) -> Result<Option<String>, CodecError> {
        match self {
            Self::None => Ok(None),
            Self::FromRequest => request.absolute_url().map(Some).ok_or_else(|| {
                CodecError::new(
                    codes::BASE_IRI,
                    "request carries neither a Host header nor an absolute URI",
                )
            }),
            Self::Custom(resolver) => resolver.resolve(request).await,
        }
    }
}

impl fmt::Debug for BaseIriPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::FromRequest => f.write_str("FromRequest"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// RDF 内容协商中间件配置。
///
/// # 教案式说明
/// - **意图（Why）**：图工厂、编解码目录、默认媒体类型与基准 IRI 策略因部署而异，外部化后中间件本身保持无状态；
/// - **结构（How）**：泛型参数 `F` 决定物化读取产出的图类型，默认 [`DatasetFactory`]；
///   `codecs` 以 `Arc<dyn CodecDirectory>` 共享给每次交换；
/// - **契约（What）**：
///   - `default_media_type`：请求缺少 `Content-Type` 时的解析类型，也是响应协商的最后退路；
///   - `triples_only`：写出前丢弃图名，单次写出可通过 `WriteOptions::triples_only` 覆盖；
///   - `override_policy`：显式媒体类型是否需要在序列化目录中存在；
/// - **风险提示（Trade-offs）**：`OverridePolicy::Trust` 下写错的覆盖值会以序列化失败的形式暴露，
///   此时响应头可能已经提交。
pub struct RdfHandlerConfig<F = DatasetFactory> {
    pub descriptor: MiddlewareDescriptor,
    pub factory: Arc<F>,
    pub codecs: Arc<dyn CodecDirectory>,
    pub default_media_type: Option<MediaType>,
    pub base_iri: BaseIriPolicy,
    pub triples_only: bool,
    pub override_policy: OverridePolicy,
}

impl<F> Clone for RdfHandlerConfig<F> {
    fn clone(&self) -> Self {
        Self {
            descriptor: self.descriptor.clone(),
            factory: Arc::clone(&self.factory),
            codecs: Arc::clone(&self.codecs),
            default_media_type: self.default_media_type.clone(),
            base_iri: self.base_iri.clone(),
            triples_only: self.triples_only,
            override_policy: self.override_policy,
        }
    }
}

impl RdfHandlerConfig<DatasetFactory> {
    /// 以给定编解码目录和默认图工厂构造。
    pub fn new(codecs: impl CodecDirectory) -> Self {
        Self {
            descriptor: default_descriptor(),
            factory: Arc::new(DatasetFactory),
            codecs: Arc::new(codecs),
            default_media_type: None,
            base_iri: BaseIriPolicy::None,
            triples_only: false,
            override_policy: OverridePolicy::Trust,
        }
    }
}

impl Default for RdfHandlerConfig<DatasetFactory> {
    fn default() -> Self {
        Self::new(CodecMap::new())
    }
}

fn default_descriptor() -> MiddlewareDescriptor {
    MiddlewareDescriptor::new(
        "rdf.handler",
        "content-negotiation",
        "按媒体类型解析请求图数据并协商序列化响应",
    )
}

impl<F: GraphFactory> RdfHandlerConfig<F> {
    /// 替换图工厂。
    pub fn with_factory<G: GraphFactory>(self, factory: G) -> RdfHandlerConfig<G> {
        RdfHandlerConfig {
            descriptor: self.descriptor,
            factory: Arc::new(factory),
            codecs: self.codecs,
            default_media_type: self.default_media_type,
            base_iri: self.base_iri,
            triples_only: self.triples_only,
            override_policy: self.override_policy,
        }
    }

    pub fn with_codecs(mut self, codecs: impl CodecDirectory) -> Self {
        self.codecs = Arc::new(codecs);
        self
    }

    pub fn with_descriptor(mut self, descriptor: MiddlewareDescriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    pub fn with_default_media_type(mut self, media_type: MediaType) -> Self {
        self.default_media_type = Some(media_type);
        self
    }

    pub fn with_base_iri(mut self, policy: BaseIriPolicy) -> Self {
        self.base_iri = policy;
        self
    }

    pub fn with_triples_only(mut self, triples_only: bool) -> Self {
        self.triples_only = triples_only;
        self
    }

    pub fn with_override_policy(mut self, policy: OverridePolicy) -> Self {
        self.override_policy = policy;
        self
    }

    /// 叠加声明式设置；未出现的字段保持当前值。
    ///
    /// `base_iri = "none"` 与 `"request"` 会替换当前策略，包括之前设置的自定义解析器。
    pub fn with_settings(mut self, settings: &RdfHandlerSettings) -> Result<Self, ConfigError> {
        if let Some(raw) = settings.default_media_type.as_deref() {
            let media_type =
                MediaType::parse(raw).ok_or_else(|| ConfigError::InvalidMediaType(raw.to_owned()))?;
            self.default_media_type = Some(media_type);
        }
        if let Some(mode) = settings.base_iri {
            self.base_iri = match mode {
                BaseIriMode::None => BaseIriPolicy::None,
                BaseIriMode::Request => BaseIriPolicy::FromRequest,
            };
        }
        if let Some(triples_only) = settings.triples_only {
            self.triples_only = triples_only;
        }
        if let Some(policy) = settings.override_policy {
            self.override_policy = policy;
        }
        Ok(self)
    }
}

impl<F> fmt::Debug for RdfHandlerConfig<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RdfHandlerConfig")
            .field("descriptor", &self.descriptor)
            .field("parsers", &self.codecs.parser_media_types())
            .field("serializers", &self.codecs.serializer_media_types())
            .field("default_media_type", &self.default_media_type)
            .field("base_iri", &self.base_iri)
            .field("triples_only", &self.triples_only)
            .field("override_policy", &self.override_policy)
            .finish()
    }
}

/// 声明式设置中的基准 IRI 模式。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseIriMode {
    None,
    Request,
}

/// 可从 TOML/JSON 加载的配置子集。
///
/// 闭包与编解码目录无法声明式表达，仍需通过 [`RdfHandlerConfig`] 的构建方法设置。
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RdfHandlerSettings {
    pub default_media_type: Option<String>,
    pub base_iri: Option<BaseIriMode>,
    pub triples_only: Option<bool>,
    pub override_policy: Option<OverridePolicy>,
}

/// 应用声明式设置时的错误。
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// `default_media_type` 不是合法的 `type/subtype`。
    #[error("invalid default media type `{0}`")]
    InvalidMediaType(String),
}
