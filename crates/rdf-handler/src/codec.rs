//! 编解码目录：媒体类型到解析器与序列化器的映射。
//!
//! # 设计背景（Why）
//! - 中间件本身不定义任何 RDF 语法，只按媒体类型查找外部提供的解析器与序列化器；
//! - 目录随配置传入，不存在进程级全局注册表，便于测试替换与多实例并存。
//!
//! # 逻辑解析（How）
//! - [`CodecDirectory`] 是中间件依赖的唯一接口，区分“存在性查询”与“导入”两类操作；
//! - [`CodecMap`] 是保持注册顺序的参考实现，顺序即协商时的平局决胜顺序；
//! - [`Parser`]/[`Serializer`] 为闭包提供了覆盖实现，测试可以直接注册闭包。
//!
//! # 契约说明（What）
//! - `import_*` 必须立即返回流；找不到实现或编解码故障都以流内 `Err` 项交付；
//! - 同一媒体类型重复注册时，后注册者替换先注册者但保留原有位置。

use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::{
    error::{CodecError, codes},
    media_type::MediaType,
    stream::{ByteStream, ElementStream, byte_fault, fault},
};

/// 传递给解析器的选项。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// 解析相对 IRI 的基准；`None` 表示不做解析。
    pub base_iri: Option<String>,
    /// 原样转发给解析器的自由属性。
    pub properties: BTreeMap<String, String>,
}

impl ParseOptions {
    pub fn with_base_iri(mut self, base_iri: impl Into<String>) -> Self {
        self.base_iri = Some(base_iri.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// 传递给序列化器的选项。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SerializeOptions {
    pub properties: BTreeMap<String, String>,
}

impl SerializeOptions {
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// 把字节流转换为元素流。
pub trait Parser: Send + Sync + 'static {
    fn parse(&self, body: ByteStream, options: ParseOptions) -> ElementStream;
}

impl<F> Parser for F
where
    F: Fn(ByteStream, ParseOptions) -> ElementStream + Send + Sync + 'static,
{
    fn parse(&self, body: ByteStream, options: ParseOptions) -> ElementStream {
        self(body, options)
    }
}

/// 把元素流转换为字节流。
pub trait Serializer: Send + Sync + 'static {
    fn serialize(&self, elements: ElementStream, options: SerializeOptions) -> ByteStream;
}

impl<F> Serializer for F
where
    F: Fn(ElementStream, SerializeOptions) -> ByteStream + Send + Sync + 'static,
{
    fn serialize(&self, elements: ElementStream, options: SerializeOptions) -> ByteStream {
        self(elements, options)
    }
}

/// 中间件依赖的编解码目录接口。
pub trait CodecDirectory: Send + Sync + 'static {
    fn has_parser(&self, media_type: &MediaType) -> bool;

    fn has_serializer(&self, media_type: &MediaType) -> bool;

    /// 按注册顺序列出解析器媒体类型。
    fn parser_media_types(&self) -> Vec<MediaType>;

    /// 按注册顺序列出序列化器媒体类型。
    fn serializer_media_types(&self) -> Vec<MediaType>;

    fn import_parse(
        &self,
        media_type: &MediaType,
        body: ByteStream,
        options: ParseOptions,
    ) -> ElementStream;

    fn import_serialize(
        &self,
        media_type: &MediaType,
        elements: ElementStream,
        options: SerializeOptions,
    ) -> ByteStream;
}

/// 保持注册顺序的编解码目录。
#[derive(Clone, Default)]
pub struct CodecMap {
    parsers: Vec<(MediaType, Arc<dyn Parser>)>,
    serializers: Vec<(MediaType, Arc<dyn Serializer>)>,
}

impl CodecMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册解析器。
    pub fn register_parser(&mut self, media_type: MediaType, parser: Arc<dyn Parser>) {
        upsert(&mut self.parsers, media_type, parser);
    }

    /// 注册序列化器。
    pub fn register_serializer(&mut self, media_type: MediaType, serializer: Arc<dyn Serializer>) {
        upsert(&mut self.serializers, media_type, serializer);
    }

    /// 以闭包注册解析器并返回自身，便于链式构建。
    pub fn with_parser<F>(mut self, media_type: MediaType, parser: F) -> Self
    where
        F: Fn(ByteStream, ParseOptions) -> ElementStream + Send + Sync + 'static,
    {
        self.register_parser(media_type, Arc::new(parser));
        self
    }

    /// 以闭包注册序列化器并返回自身。
    pub fn with_serializer<F>(mut self, media_type: MediaType, serializer: F) -> Self
    where
        F: Fn(ElementStream, SerializeOptions) -> ByteStream + Send + Sync + 'static,
    {
        self.register_serializer(media_type, Arc::new(serializer));
        self
    }

    /// 合并另一个目录，`other` 中的同名条目覆盖本目录。
    pub fn merge(mut self, other: CodecMap) -> Self {
        for (media_type, parser) in other.parsers {
            upsert(&mut self.parsers, media_type, parser);
        }
        for (media_type, serializer) in other.serializers {
            upsert(&mut self.serializers, media_type, serializer);
        }
        self
    }

    fn parser(&self, media_type: &MediaType) -> Option<&Arc<dyn Parser>> {
        lookup(&self.parsers, media_type)
    }

    fn serializer(&self, media_type: &MediaType) -> Option<&Arc<dyn Serializer>> {
        lookup(&self.serializers, media_type)
    }
}

fn upsert<T>(entries: &mut Vec<(MediaType, T)>, media_type: MediaType, value: T) {
    match entries.iter_mut().find(|(existing, _)| *existing == media_type) {
        Some(slot) => slot.1 = value,
        None => entries.push((media_type, value)),
    }
}

fn lookup<'a, T>(entries: &'a [(MediaType, T)], media_type: &MediaType) -> Option<&'a T> {
    entries
        .iter()
        .find(|(existing, _)| existing == media_type)
        .map(|(_, value)| value)
}

fn missing(kind: &str, media_type: &MediaType) -> CodecError {
    CodecError::new(
        codes::CODEC_MISSING,
        format!("no {kind} registered for `{media_type}`"),
    )
}

impl CodecDirectory for CodecMap {
    fn has_parser(&self, media_type: &MediaType) -> bool {
        self.parser(media_type).is_some()
    }

    fn has_serializer(&self, media_type: &MediaType) -> bool {
        self.serializer(media_type).is_some()
    }

    fn parser_media_types(&self) -> Vec<MediaType> {
        self.parsers.iter().map(|(media_type, _)| media_type.clone()).collect()
    }

    fn serializer_media_types(&self) -> Vec<MediaType> {
        self.serializers
            .iter()
            .map(|(media_type, _)| media_type.clone())
            .collect()
    }

    fn import_parse(
        &self,
        media_type: &MediaType,
        body: ByteStream,
        options: ParseOptions,
    ) -> ElementStream {
        match self.parser(media_type) {
            Some(parser) => parser.parse(body, options),
            None => fault(missing("parser", media_type)),
        }
    }

    fn import_serialize(
        &self,
        media_type: &MediaType,
        elements: ElementStream,
        options: SerializeOptions,
    ) -> ByteStream {
        match self.serializer(media_type) {
            Some(serializer) => serializer.serialize(elements, options),
            None => byte_fault(missing("serializer", media_type)),
        }
    }
}

impl fmt::Debug for CodecMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecMap")
            .field("parsers", &self.parser_media_types())
            .field("serializers", &self.serializer_media_types())
            .finish()
    }
}
